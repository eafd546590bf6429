use std::{any::Any, sync::Arc, time::Duration};

use bytes::Bytes;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;

use crate::{
    engine::{
        Bus, BusMessage, BusRef, Caps, Element, ElementRef, Engine, MessageKind, Pad,
        PadAddedCallback, PadRef, PadTemplate, Pipeline, PipelineRef, PropertyValue,
    },
    foundation::{
        core::{EngineState, LinkStatus},
        error::{MixError, MixResult},
    },
};

/// Engine backed by GStreamer.
#[derive(Clone, Debug)]
pub struct GstEngine {
    _private: (),
}

impl GstEngine {
    /// Initialize GStreamer. Safe to call more than once.
    pub fn new() -> MixResult<Self> {
        gst::init().map_err(|e| MixError::construction(format!("gstreamer init failed: {e}")))?;
        Ok(Self { _private: () })
    }

    /// Handle usable wherever an `Arc<dyn Engine>` is expected.
    pub fn handle(&self) -> Arc<dyn Engine> {
        Arc::new(self.clone())
    }
}

impl Engine for GstEngine {
    fn new_pipeline(&self, name: &str) -> MixResult<PipelineRef> {
        Ok(Arc::new(GstPipeline {
            pipeline: gst::Pipeline::with_name(name),
        }))
    }

    fn make_element(&self, factory: &str, name: &str) -> MixResult<ElementRef> {
        let element = gst::ElementFactory::make(factory)
            .name(name)
            .build()
            .map_err(|e| MixError::construction(format!("failed to create {factory}: {e}")))?;
        Ok(Arc::new(GstElement { element }))
    }
}

fn engine_state(state: gst::State) -> EngineState {
    match state {
        gst::State::Playing => EngineState::Playing,
        gst::State::Paused => EngineState::Paused,
        _ => EngineState::Null,
    }
}

fn gst_state(state: EngineState) -> gst::State {
    match state {
        EngineState::Null => gst::State::Null,
        EngineState::Paused => gst::State::Paused,
        EngineState::Playing => gst::State::Playing,
    }
}

/// Set a property through its string form; GStreamer parses it against the property type,
/// which covers integers, enums, booleans, strings and caps alike.
fn set_object_property(object: &impl IsA<gst::Object>, name: &str, value: &PropertyValue) {
    if object.find_property(name).is_none() {
        tracing::warn!(object = %object.name(), property = name, "no such property");
        return;
    }
    object.set_property_from_str(name, &value.to_string());
}

struct GstPipeline {
    pipeline: gst::Pipeline,
}

impl Pipeline for GstPipeline {
    fn name(&self) -> String {
        self.pipeline.name().to_string()
    }

    fn add(&self, element: &ElementRef) -> bool {
        gst_element(element).is_some_and(|e| self.pipeline.add(e).is_ok())
    }

    fn remove(&self, element: &ElementRef) -> bool {
        gst_element(element).is_some_and(|el| {
            // A removed element keeps its state; park it in Null so it can be re-added.
            if let Err(err) = el.set_state(gst::State::Null) {
                tracing::warn!(element = %el.name(), error = %err, "could not stop removed element");
            }
            self.pipeline.remove(el).is_ok()
        })
    }

    fn set_state(&self, state: EngineState) -> bool {
        match self.pipeline.set_state(gst_state(state)) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(pipeline = %self.pipeline.name(), error = %e, "state change failed");
                false
            }
        }
    }

    fn current_state(&self) -> EngineState {
        engine_state(self.pipeline.current_state())
    }

    fn send_eos(&self) -> bool {
        self.pipeline.send_event(gst::event::Eos::new())
    }

    fn bus(&self) -> Option<BusRef> {
        self.pipeline
            .bus()
            .map(|bus| Arc::new(GstBus { bus }) as BusRef)
    }
}

struct GstElement {
    element: gst::Element,
}

fn gst_element(element: &ElementRef) -> Option<&gst::Element> {
    element
        .as_any()
        .downcast_ref::<GstElement>()
        .map(|e| &e.element)
}

fn gst_pad(pad: &PadRef) -> Option<&gst::Pad> {
    pad.as_any().downcast_ref::<GstPad>().map(|p| &p.pad)
}

impl Element for GstElement {
    fn name(&self) -> String {
        self.element.name().to_string()
    }

    fn factory_name(&self) -> String {
        self.element
            .factory()
            .map(|f| f.name().to_string())
            .unwrap_or_default()
    }

    fn link(&self, target: &ElementRef) -> bool {
        gst_element(target).is_some_and(|t| self.element.link(t).is_ok())
    }

    fn unlink(&self, target: &ElementRef) -> bool {
        match gst_element(target) {
            Some(t) => {
                self.element.unlink(t);
                true
            }
            None => false,
        }
    }

    fn static_pad(&self, name: &str) -> MixResult<PadRef> {
        self.element
            .static_pad(name)
            .map(|pad| Arc::new(GstPad { pad }) as PadRef)
            .ok_or_else(|| {
                MixError::graph(format!(
                    "element '{}' has no static pad '{name}'",
                    self.element.name()
                ))
            })
    }

    fn pad_template(&self, name: &str) -> MixResult<PadTemplate> {
        self.element
            .pad_template(name)
            .map(|t| PadTemplate {
                name: t.name_template().to_string(),
            })
            .ok_or_else(|| {
                MixError::construction(format!(
                    "element '{}' has no pad template '{name}'",
                    self.element.name()
                ))
            })
    }

    fn request_pad(&self, template: &PadTemplate) -> MixResult<PadRef> {
        let templ = self.element.pad_template(&template.name).ok_or_else(|| {
            MixError::construction(format!(
                "element '{}' has no pad template '{}'",
                self.element.name(),
                template.name
            ))
        })?;
        self.element
            .request_pad(&templ, None, None)
            .map(|pad| Arc::new(GstPad { pad }) as PadRef)
            .ok_or_else(|| {
                MixError::construction(format!(
                    "element '{}' refused to allocate a '{}' pad",
                    self.element.name(),
                    template.name
                ))
            })
    }

    fn release_request_pad(&self, pad: &PadRef) -> bool {
        match gst_pad(pad) {
            Some(p) if p.parent_element().as_ref() == Some(&self.element) => {
                self.element.release_request_pad(p);
                true
            }
            _ => false,
        }
    }

    fn set_property(&self, name: &str, value: PropertyValue) {
        set_object_property(&self.element, name, &value);
    }

    fn connect_pad_added(&self, callback: PadAddedCallback) {
        self.element.connect_pad_added(move |element, pad| {
            let element: ElementRef = Arc::new(GstElement {
                element: element.clone(),
            });
            let pad: PadRef = Arc::new(GstPad { pad: pad.clone() });
            callback(&element, &pad);
        });
    }

    fn push_buffer(&self, data: Bytes) -> MixResult<()> {
        let appsrc = self
            .element
            .downcast_ref::<gst_app::AppSrc>()
            .ok_or_else(|| {
                MixError::push(format!(
                    "element '{}' does not accept buffers",
                    self.element.name()
                ))
            })?;
        appsrc
            .push_buffer(gst::Buffer::from_slice(data))
            .map(|_| ())
            .map_err(|e| MixError::push(format!("appsrc '{}': {e:?}", self.element.name())))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct GstPad {
    pad: gst::Pad,
}

impl Pad for GstPad {
    fn name(&self) -> String {
        self.pad.name().to_string()
    }

    fn parent_name(&self) -> Option<String> {
        self.pad.parent_element().map(|e| e.name().to_string())
    }

    fn link(&self, sink: &PadRef) -> LinkStatus {
        let Some(sink) = gst_pad(sink) else {
            return LinkStatus::WrongHierarchy;
        };
        match self.pad.link(sink) {
            Ok(_) => LinkStatus::Ok,
            Err(gst::PadLinkError::WrongHierarchy) => LinkStatus::WrongHierarchy,
            Err(gst::PadLinkError::WasLinked) => LinkStatus::WasLinked,
            Err(gst::PadLinkError::WrongDirection) => LinkStatus::WrongDirection,
            Err(gst::PadLinkError::Noformat) => LinkStatus::NoFormat,
            Err(gst::PadLinkError::Nosched) => LinkStatus::NoSched,
            Err(_) => LinkStatus::Refused,
        }
    }

    fn unlink(&self, sink: &PadRef) -> bool {
        gst_pad(sink).is_some_and(|s| self.pad.unlink(s).is_ok())
    }

    fn set_property(&self, name: &str, value: PropertyValue) {
        set_object_property(&self.pad, name, &value);
    }

    fn caps(&self) -> Option<Caps> {
        let caps = self
            .pad
            .current_caps()
            .unwrap_or_else(|| self.pad.query_caps(None));
        let s = caps.structure(0)?;
        let mut out = Caps::new(s.name().as_str());
        for (key, value) in s.iter() {
            if let Ok(text) = value.serialize() {
                out = out.field(key.as_str(), text);
            }
        }
        Some(out)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct GstBus {
    bus: gst::Bus,
}

fn bus_message(msg: &gst::Message) -> BusMessage {
    use gst::MessageView;

    let source = msg.src().map(|s| s.path_string().to_string());
    match msg.view() {
        MessageView::Error(e) => BusMessage::new(
            MessageKind::Error,
            source,
            match e.debug() {
                Some(debug) => format!("{} ({debug})", e.error()),
                None => e.error().to_string(),
            },
        ),
        MessageView::Warning(w) => {
            BusMessage::new(MessageKind::Warning, source, w.error().to_string())
        }
        MessageView::Info(i) => BusMessage::new(MessageKind::Info, source, i.error().to_string()),
        MessageView::Eos(_) => BusMessage::new(MessageKind::Eos, source, "end of stream"),
        MessageView::StateChanged(s) => BusMessage::new(
            MessageKind::StateChanged {
                old: engine_state(s.old()),
                new: engine_state(s.current()),
            },
            source,
            format!("{:?} -> {:?}", s.old(), s.current()),
        ),
        _ => BusMessage::new(
            MessageKind::Other(format!("{:?}", msg.type_())),
            source,
            String::new(),
        ),
    }
}

impl Bus for GstBus {
    fn have_pending(&self) -> bool {
        self.bus.have_pending()
    }

    fn pop(&self) -> Option<BusMessage> {
        self.bus.pop().as_ref().map(bus_message)
    }

    fn timed_pop(&self, timeout: Duration) -> Option<BusMessage> {
        let ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.bus
            .timed_pop(gst::ClockTime::from_mseconds(ms))
            .as_ref()
            .map(bus_message)
    }
}
