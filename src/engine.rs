//! Capability interface over the external media engine.
//!
//! The compositor never talks to a concrete engine directly: it builds graphs through
//! [`Engine`], [`Pipeline`], [`Element`], [`Pad`] and [`Bus`] trait objects. Two engines ship with
//! the crate: [`MemoryEngine`](crate::MemoryEngine), an in-process recorder used by tests and
//! dry runs, and (behind the `gstreamer` feature) a GStreamer-backed engine.

use std::{any::Any, fmt, sync::Arc, time::Duration};

use bytes::Bytes;

use crate::foundation::{
    core::{EngineState, LinkStatus},
    error::MixResult,
};

#[cfg(feature = "gstreamer")]
pub(crate) mod gst;
pub(crate) mod memory;
pub(crate) mod value;

pub use value::{Caps, PropertyValue};

/// Shared handle to an engine element.
pub type ElementRef = Arc<dyn Element>;
/// Shared handle to an engine pad.
pub type PadRef = Arc<dyn Pad>;
/// Shared handle to an engine pipeline.
pub type PipelineRef = Arc<dyn Pipeline>;
/// Shared handle to a pipeline bus.
pub type BusRef = Arc<dyn Bus>;

/// Invoked by the engine, on its own thread, when an element exposes a new pad.
pub type PadAddedCallback = Arc<dyn Fn(&ElementRef, &PadRef) + Send + Sync>;

/// Node factory.
pub trait Engine: Send + Sync {
    /// Create an empty pipeline.
    fn new_pipeline(&self, name: &str) -> MixResult<PipelineRef>;
    /// Instantiate an element from a named factory.
    fn make_element(&self, factory: &str, name: &str) -> MixResult<ElementRef>;
}

/// One pipeline instance.
pub trait Pipeline: Send + Sync {
    /// Pipeline name.
    fn name(&self) -> String;
    /// Add an element; `false` when the engine refuses.
    fn add(&self, element: &ElementRef) -> bool;
    /// Remove an element; `false` when the engine refuses.
    fn remove(&self, element: &ElementRef) -> bool;
    /// Request a state change; `false` when the engine refuses.
    fn set_state(&self, state: EngineState) -> bool;
    /// State last reached by the engine.
    fn current_state(&self) -> EngineState;
    /// Send end-of-stream downstream; `false` when the event was not handled.
    fn send_eos(&self) -> bool;
    /// Message bus of this pipeline.
    fn bus(&self) -> Option<BusRef>;
}

/// Name of a request-pad template, e.g. `sink_%u`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PadTemplate {
    /// Template name.
    pub name: String,
}

/// One processing node.
pub trait Element: Send + Sync {
    /// Unique element name.
    fn name(&self) -> String;
    /// Factory the element was created from.
    fn factory_name(&self) -> String;
    /// Link this element's output to `target`'s input.
    fn link(&self, target: &ElementRef) -> bool;
    /// Undo [`Element::link`].
    fn unlink(&self, target: &ElementRef) -> bool;
    /// Always-present pad by name.
    fn static_pad(&self, name: &str) -> MixResult<PadRef>;
    /// Request-pad template by name.
    fn pad_template(&self, name: &str) -> MixResult<PadTemplate>;
    /// Allocate a new pad from `template`.
    fn request_pad(&self, template: &PadTemplate) -> MixResult<PadRef>;
    /// Return a pad obtained from [`Element::request_pad`].
    fn release_request_pad(&self, pad: &PadRef) -> bool;
    /// Set an element property.
    fn set_property(&self, name: &str, value: PropertyValue);
    /// Register a callback for dynamically exposed pads.
    fn connect_pad_added(&self, callback: PadAddedCallback);
    /// Inject an encoded buffer (push-mode source elements only).
    fn push_buffer(&self, data: Bytes) -> MixResult<()>;
    /// Downcast hook for engine implementations.
    fn as_any(&self) -> &dyn Any;
}

/// A typed connection point on an element.
pub trait Pad: Send + Sync {
    /// Pad name.
    fn name(&self) -> String;
    /// Name of the owning element.
    fn parent_name(&self) -> Option<String>;
    /// Link this (source) pad to `sink`.
    fn link(&self, sink: &PadRef) -> LinkStatus;
    /// Undo [`Pad::link`].
    fn unlink(&self, sink: &PadRef) -> bool;
    /// Set a pad property (mixer pads carry `xpos`, `ypos`, `alpha`, ...).
    fn set_property(&self, name: &str, value: PropertyValue);
    /// Caps currently flowing or offered on the pad (first structure only), if known.
    fn caps(&self) -> Option<Caps>;
    /// Media type of [`Pad::caps`].
    fn media_type(&self) -> Option<String> {
        self.caps().map(|c| c.media_type().to_string())
    }
    /// Downcast hook for engine implementations.
    fn as_any(&self) -> &dyn Any;
}

/// Message channel surfaced by a pipeline.
pub trait Bus: Send + Sync {
    /// `true` when a message is waiting.
    fn have_pending(&self) -> bool;
    /// Take the next message without blocking.
    fn pop(&self) -> Option<BusMessage>;
    /// Wait up to `timeout` for the next message.
    fn timed_pop(&self, timeout: Duration) -> Option<BusMessage>;
}

/// Kind of a bus message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageKind {
    /// An element failed.
    Error,
    /// Recoverable problem.
    Warning,
    /// Informational.
    Info,
    /// End-of-stream reached the sinks.
    Eos,
    /// An element (or the pipeline) changed state.
    StateChanged {
        /// Previous state.
        old: EngineState,
        /// New state.
        new: EngineState,
    },
    /// Any other engine message, by type name.
    Other(String),
}

/// A message drained from a [`Bus`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusMessage {
    /// Message kind.
    pub kind: MessageKind,
    /// Path or name of the emitting object.
    pub source: Option<String>,
    /// Human readable detail.
    pub detail: String,
}

impl BusMessage {
    /// Build a message.
    pub fn new(kind: MessageKind, source: Option<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            source,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for BusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(src) => write!(f, "{:?} from {src}: {}", self.kind, self.detail),
            None => write!(f, "{:?}: {}", self.kind, self.detail),
        }
    }
}
