//! Live video/audio compositing pipeline assembly.
//!
//! `livemix` builds per-source processing sub-graphs, attaches them to a shared mixing stage,
//! places them on a canvas through a declarative layout table, and drives the pipeline
//! lifecycle. The media engine itself is reached only through the [`Engine`] capability traits;
//! [`MemoryEngine`] records the graph in process and, with the `gstreamer` feature,
//! `GstEngine` runs it on GStreamer.
#![forbid(unsafe_code)]

mod compositor;
mod config;
mod display;
mod engine;
mod foundation;
mod layout;
mod mixer;
mod source;

pub use compositor::{Compositor, bus::BusEvent};
pub use config::{CompositorConfig, SceneSpec, SourceSpec};
pub use display::{VirtualDisplay, Xvfb, XvfbConfig};
#[cfg(feature = "gstreamer")]
pub use engine::gst::GstEngine;
pub use engine::{
    Bus, BusMessage, BusRef, Caps, Element, ElementRef, Engine, MessageKind, Pad,
    PadAddedCallback, PadRef, PadTemplate, Pipeline, PipelineRef, PropertyValue,
    memory::{ElementSnapshot, GraphSnapshot, MemoryEngine},
};
pub use foundation::core::{
    BorderEdges, Canvas, EngineState, LinkStatus, PipelineState, SourceId,
};
pub use foundation::error::{MixError, MixResult};
pub use foundation::ids::NodeIds;
pub use layout::table::{Layout, LayoutRule, LayoutSlot, Placeable, apply_rule};
pub use mixer::{MixerNode, MixingStage, PortLink};
pub use source::{
    factory::SourceFactory,
    media::{MediaSource, OutputContinuation, SourceGeometry, SourceStatus},
    topology::{Codec, SourceKind},
};
