use std::{
    any::Any,
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    sync::Arc,
    time::Duration,
};

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};

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

/// Factories whose output pads only appear after the incoming stream has been examined.
const DYNAMIC_FACTORIES: &[&str] = &["rtspsrc", "decodebin", "uridecodebin"];
/// Factories exposing `sink_%u` request pads.
const MIXER_FACTORIES: &[&str] = &["compositor", "videomixer", "audiomixer"];

/// In-process engine that records the graph instead of moving media.
///
/// Every element, pad, link, property and state request is kept in a shared table that tests
/// (and the `plan` command) can inspect. Dynamic-pad factories (`rtspsrc`, `decodebin`,
/// `uridecodebin`) expose no output pad until [`MemoryEngine::emit_pad_added`] is called, which
/// runs the registered pad-added callbacks on the calling thread. Faults can be injected to
/// exercise every refusal path.
///
/// Cloning shares the underlying graph.
#[derive(Clone, Default)]
pub struct MemoryEngine {
    graph: Arc<Mutex<Graph>>,
}

#[derive(Default)]
struct Graph {
    elements: HashMap<String, ElementRecord>,
    pipelines: HashMap<String, PipelineRecord>,
    faults: Faults,
    remove_hooks: HashMap<String, RemoveHook>,
}

type RemoveHook = Arc<dyn Fn() + Send + Sync>;

struct ElementRecord {
    factory: String,
    pipeline: Option<String>,
    properties: BTreeMap<String, PropertyValue>,
    pads: BTreeMap<String, PadRecord>,
    templates: Vec<String>,
    next_request: u32,
    callbacks: Vec<PadAddedCallback>,
    pushed: Vec<Bytes>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Src,
    Sink,
}

struct PadRecord {
    direction: Direction,
    requested: bool,
    caps: Option<Caps>,
    peer: Option<(String, String)>,
    properties: BTreeMap<String, PropertyValue>,
}

impl PadRecord {
    fn new(direction: Direction) -> Self {
        Self {
            direction,
            requested: false,
            caps: None,
            peer: None,
            properties: BTreeMap::new(),
        }
    }
}

struct PipelineRecord {
    state: EngineState,
    eos_sent: bool,
    bus: Arc<MemoryBus>,
}

#[derive(Default)]
struct Faults {
    missing_factories: HashSet<String>,
    refuse_add: HashSet<String>,
    refuse_remove: HashSet<String>,
    refuse_link: HashSet<(String, String)>,
    refuse_request_pads: HashSet<String>,
    forced_pad_status: HashMap<String, LinkStatus>,
    refuse_state: bool,
    refuse_eos: bool,
}

/// Serializable view of one pipeline, used by the `plan` command.
#[derive(Clone, Debug, serde::Serialize)]
pub struct GraphSnapshot {
    /// Pipeline name.
    pub pipeline: String,
    /// Last requested engine state.
    pub state: EngineState,
    /// Elements in the pipeline, sorted by name.
    pub elements: Vec<ElementSnapshot>,
    /// Pad links as `element.pad -> element.pad`, sorted.
    pub links: Vec<String>,
}

/// Serializable view of one element.
#[derive(Clone, Debug, serde::Serialize)]
pub struct ElementSnapshot {
    /// Element name.
    pub name: String,
    /// Factory name.
    pub factory: String,
    /// Element properties rendered as strings.
    pub properties: BTreeMap<String, String>,
    /// Pad properties rendered as strings (pads without properties are omitted).
    pub pad_properties: BTreeMap<String, BTreeMap<String, String>>,
}

impl MemoryEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle usable wherever an `Arc<dyn Engine>` is expected. Shares this engine's graph.
    pub fn handle(&self) -> Arc<dyn Engine> {
        Arc::new(self.clone())
    }

    /// Announce a new output pad on a dynamic element and run its pad-added callbacks.
    ///
    /// `caps` is a caps string such as `video/x-raw` or `application/x-rtp,media=video`.
    pub fn emit_pad_added(&self, element: &str, pad: &str, caps: &str) -> MixResult<()> {
        let caps = Caps::parse(caps)?;
        let callbacks = {
            let mut graph = self.graph.lock();
            let record = graph.elements.get_mut(element).ok_or_else(|| {
                MixError::validation(format!("unknown element '{element}'"))
            })?;
            if record.pads.contains_key(pad) {
                return Err(MixError::validation(format!(
                    "element '{element}' already has pad '{pad}'"
                )));
            }
            let mut rec = PadRecord::new(Direction::Src);
            rec.caps = Some(caps);
            record.pads.insert(pad.to_string(), rec);
            record.callbacks.clone()
        };

        let element_ref: ElementRef = Arc::new(MemoryElement {
            name: element.to_string(),
            graph: self.graph.clone(),
        });
        let pad_ref: PadRef = Arc::new(MemoryPad {
            element: element.to_string(),
            name: pad.to_string(),
            graph: self.graph.clone(),
        });
        for cb in callbacks {
            cb(&element_ref, &pad_ref);
        }
        Ok(())
    }

    /// Post a message on a pipeline's bus.
    pub fn post_message(&self, pipeline: &str, message: BusMessage) -> MixResult<()> {
        let bus = self
            .graph
            .lock()
            .pipelines
            .get(pipeline)
            .map(|p| p.bus.clone())
            .ok_or_else(|| MixError::validation(format!("unknown pipeline '{pipeline}'")))?;
        bus.post(message);
        Ok(())
    }

    /// Names of the elements currently in `pipeline`, sorted.
    pub fn elements_in(&self, pipeline: &str) -> Vec<String> {
        let graph = self.graph.lock();
        let mut names: Vec<String> = graph
            .elements
            .iter()
            .filter(|(_, e)| e.pipeline.as_deref() == Some(pipeline))
            .map(|(n, _)| n.clone())
            .collect();
        names.sort();
        names
    }

    /// Pipeline holding `element`, if any.
    pub fn pipeline_of(&self, element: &str) -> Option<String> {
        self.graph
            .lock()
            .elements
            .get(element)
            .and_then(|e| e.pipeline.clone())
    }

    /// `true` when any output pad of `upstream` is linked to a pad of `downstream`.
    pub fn is_linked(&self, upstream: &str, downstream: &str) -> bool {
        let graph = self.graph.lock();
        graph.elements.get(upstream).is_some_and(|e| {
            e.pads.values().any(|p| {
                p.direction == Direction::Src
                    && p.peer.as_ref().is_some_and(|(el, _)| el == downstream)
            })
        })
    }

    /// Element property value.
    pub fn property(&self, element: &str, name: &str) -> Option<PropertyValue> {
        self.graph
            .lock()
            .elements
            .get(element)
            .and_then(|e| e.properties.get(name).cloned())
    }

    /// Pad property value.
    pub fn pad_property(&self, element: &str, pad: &str, name: &str) -> Option<PropertyValue> {
        self.graph
            .lock()
            .elements
            .get(element)
            .and_then(|e| e.pads.get(pad))
            .and_then(|p| p.properties.get(name).cloned())
    }

    /// Peer `(element, pad)` of a pad.
    pub fn pad_peer(&self, element: &str, pad: &str) -> Option<(String, String)> {
        self.graph
            .lock()
            .elements
            .get(element)
            .and_then(|e| e.pads.get(pad))
            .and_then(|p| p.peer.clone())
    }

    /// Currently allocated request pads of `element`, sorted.
    pub fn request_pads(&self, element: &str) -> Vec<String> {
        self.graph
            .lock()
            .elements
            .get(element)
            .map(|e| {
                e.pads
                    .iter()
                    .filter(|(_, p)| p.requested)
                    .map(|(n, _)| n.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Buffers pushed into `element`, in push order.
    pub fn pushed_buffers(&self, element: &str) -> Vec<Bytes> {
        self.graph
            .lock()
            .elements
            .get(element)
            .map(|e| e.pushed.clone())
            .unwrap_or_default()
    }

    /// Last state requested on `pipeline`.
    pub fn state_of(&self, pipeline: &str) -> Option<EngineState> {
        self.graph.lock().pipelines.get(pipeline).map(|p| p.state)
    }

    /// `true` once end-of-stream was accepted by `pipeline`.
    pub fn eos_sent(&self, pipeline: &str) -> bool {
        self.graph
            .lock()
            .pipelines
            .get(pipeline)
            .is_some_and(|p| p.eos_sent)
    }

    /// Serializable view of `pipeline`.
    pub fn snapshot(&self, pipeline: &str) -> MixResult<GraphSnapshot> {
        let graph = self.graph.lock();
        let record = graph
            .pipelines
            .get(pipeline)
            .ok_or_else(|| MixError::validation(format!("unknown pipeline '{pipeline}'")))?;

        let mut elements = Vec::new();
        let mut links = Vec::new();
        for (name, e) in graph
            .elements
            .iter()
            .filter(|(_, e)| e.pipeline.as_deref() == Some(pipeline))
        {
            let mut pad_properties = BTreeMap::new();
            for (pad_name, pad) in &e.pads {
                if pad.direction == Direction::Src
                    && let Some((peer_el, peer_pad)) = &pad.peer
                {
                    links.push(format!("{name}.{pad_name} -> {peer_el}.{peer_pad}"));
                }
                if !pad.properties.is_empty() {
                    pad_properties.insert(pad_name.clone(), render_props(&pad.properties));
                }
            }
            elements.push(ElementSnapshot {
                name: name.clone(),
                factory: e.factory.clone(),
                properties: render_props(&e.properties),
                pad_properties,
            });
        }
        elements.sort_by(|a, b| a.name.cmp(&b.name));
        links.sort();

        Ok(GraphSnapshot {
            pipeline: pipeline.to_string(),
            state: record.state,
            elements,
            links,
        })
    }

    /// Make `make_element` fail for `factory`.
    pub fn fail_factory(&self, factory: &str) {
        self.graph
            .lock()
            .faults
            .missing_factories
            .insert(factory.to_string());
    }

    /// Make pipelines refuse to add `element`.
    pub fn refuse_add(&self, element: &str) {
        self.graph
            .lock()
            .faults
            .refuse_add
            .insert(element.to_string());
    }

    /// Make pipelines refuse to remove `element`.
    pub fn refuse_remove(&self, element: &str) {
        self.graph
            .lock()
            .faults
            .refuse_remove
            .insert(element.to_string());
    }

    /// Make the element link `upstream -> downstream` fail.
    pub fn refuse_link(&self, upstream: &str, downstream: &str) {
        self.graph
            .lock()
            .faults
            .refuse_link
            .insert((upstream.to_string(), downstream.to_string()));
    }

    /// Make `request_pad` fail on `element` (resource exhaustion).
    pub fn refuse_request_pads(&self, element: &str) {
        self.graph
            .lock()
            .faults
            .refuse_request_pads
            .insert(element.to_string());
    }

    /// Force every pad link into a pad of `sink_element` to report `status`.
    pub fn force_pad_link_status(&self, sink_element: &str, status: LinkStatus) {
        self.graph
            .lock()
            .faults
            .forced_pad_status
            .insert(sink_element.to_string(), status);
    }

    /// Refuse (or accept again) every state change request.
    pub fn refuse_state_changes(&self, refuse: bool) {
        self.graph.lock().faults.refuse_state = refuse;
    }

    /// Refuse (or accept again) end-of-stream events.
    pub fn refuse_eos(&self, refuse: bool) {
        self.graph.lock().faults.refuse_eos = refuse;
    }

    /// Run `hook` each time a pipeline is about to remove `element`, on the removing thread and
    /// with no graph lock held. Models engines whose removal waits for streaming threads.
    pub fn before_remove(&self, element: &str, hook: impl Fn() + Send + Sync + 'static) {
        self.graph
            .lock()
            .remove_hooks
            .insert(element.to_string(), Arc::new(hook));
    }

    /// Drop every injected fault.
    pub fn clear_faults(&self) {
        self.graph.lock().faults = Faults::default();
    }
}

impl Engine for MemoryEngine {
    fn new_pipeline(&self, name: &str) -> MixResult<PipelineRef> {
        let mut graph = self.graph.lock();
        if graph.pipelines.contains_key(name) {
            return Err(MixError::construction(format!(
                "pipeline '{name}' already exists"
            )));
        }
        let bus = Arc::new(MemoryBus::default());
        graph.pipelines.insert(
            name.to_string(),
            PipelineRecord {
                state: EngineState::Null,
                eos_sent: false,
                bus: bus.clone(),
            },
        );
        Ok(Arc::new(MemoryPipeline {
            name: name.to_string(),
            graph: self.graph.clone(),
            bus,
        }))
    }

    fn make_element(&self, factory: &str, name: &str) -> MixResult<ElementRef> {
        let mut graph = self.graph.lock();
        if graph.faults.missing_factories.contains(factory) {
            return Err(MixError::construction(format!(
                "no element factory '{factory}'"
            )));
        }
        if graph.elements.contains_key(name) {
            return Err(MixError::construction(format!(
                "element name '{name}' is already taken"
            )));
        }
        graph
            .elements
            .insert(name.to_string(), new_element_record(factory));
        Ok(Arc::new(MemoryElement {
            name: name.to_string(),
            graph: self.graph.clone(),
        }))
    }
}

fn new_element_record(factory: &str) -> ElementRecord {
    let mut pads = BTreeMap::new();
    let mut templates = Vec::new();
    let dynamic = DYNAMIC_FACTORIES.contains(&factory);
    let is_source = factory.ends_with("src") || factory == "uridecodebin";
    let is_sink = factory.ends_with("sink");

    if MIXER_FACTORIES.contains(&factory) {
        templates.push("sink_%u".to_string());
    } else if !is_source {
        pads.insert("sink".to_string(), PadRecord::new(Direction::Sink));
    }
    if !dynamic && !is_sink {
        pads.insert("src".to_string(), PadRecord::new(Direction::Src));
    }

    ElementRecord {
        factory: factory.to_string(),
        pipeline: None,
        properties: BTreeMap::new(),
        pads,
        templates,
        next_request: 0,
        callbacks: Vec::new(),
        pushed: Vec::new(),
    }
}

fn render_props(props: &BTreeMap<String, PropertyValue>) -> BTreeMap<String, String> {
    props
        .iter()
        .map(|(k, v)| (k.clone(), v.to_string()))
        .collect()
}

fn memory_name(element: &ElementRef) -> Option<String> {
    element
        .as_any()
        .downcast_ref::<MemoryElement>()
        .map(|e| e.name.clone())
}

fn memory_pad(pad: &PadRef) -> Option<(String, String)> {
    pad.as_any()
        .downcast_ref::<MemoryPad>()
        .map(|p| (p.element.clone(), p.name.clone()))
}

impl Graph {
    fn same_pipeline(&self, a: &str, b: &str) -> bool {
        match (self.elements.get(a), self.elements.get(b)) {
            (Some(ea), Some(eb)) => ea.pipeline.is_some() && ea.pipeline == eb.pipeline,
            _ => false,
        }
    }

    fn set_peer(&mut self, pad: &(String, String), peer: Option<(String, String)>) {
        if let Some(p) = self
            .elements
            .get_mut(&pad.0)
            .and_then(|e| e.pads.get_mut(&pad.1))
        {
            p.peer = peer;
        }
    }

    fn allocate_request_pad(&mut self, element: &str) -> Option<String> {
        let record = self.elements.get_mut(element)?;
        let template = record.templates.first()?.clone();
        let name = template.replace("%u", &record.next_request.to_string());
        record.next_request += 1;
        let mut pad = PadRecord::new(Direction::Sink);
        pad.requested = true;
        record.pads.insert(name.clone(), pad);
        Some(name)
    }

    fn link_pads(&mut self, src: &(String, String), sink: &(String, String)) -> LinkStatus {
        if let Some(status) = self.faults.forced_pad_status.get(&sink.0) {
            return *status;
        }
        let src_pad = self.elements.get(&src.0).and_then(|e| e.pads.get(&src.1));
        let sink_pad = self.elements.get(&sink.0).and_then(|e| e.pads.get(&sink.1));
        let (Some(src_pad), Some(sink_pad)) = (src_pad, sink_pad) else {
            return LinkStatus::Refused;
        };
        if src_pad.direction != Direction::Src || sink_pad.direction != Direction::Sink {
            return LinkStatus::WrongDirection;
        }
        if src_pad.peer.is_some() || sink_pad.peer.is_some() {
            return LinkStatus::WasLinked;
        }
        if !self.same_pipeline(&src.0, &sink.0) {
            return LinkStatus::WrongHierarchy;
        }
        self.set_peer(src, Some(sink.clone()));
        self.set_peer(sink, Some(src.clone()));
        LinkStatus::Ok
    }

    fn unlink_element_pads(&mut self, element: &str) {
        let peers: Vec<(String, String)> = self
            .elements
            .get(element)
            .map(|e| e.pads.values().filter_map(|p| p.peer.clone()).collect())
            .unwrap_or_default();
        for peer in peers {
            self.set_peer(&peer, None);
        }
        if let Some(e) = self.elements.get_mut(element) {
            for pad in e.pads.values_mut() {
                pad.peer = None;
            }
        }
    }
}

struct MemoryPipeline {
    name: String,
    graph: Arc<Mutex<Graph>>,
    bus: Arc<MemoryBus>,
}

impl Pipeline for MemoryPipeline {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn add(&self, element: &ElementRef) -> bool {
        let Some(el) = memory_name(element) else {
            return false;
        };
        let mut graph = self.graph.lock();
        if graph.faults.refuse_add.contains(&el) {
            return false;
        }
        match graph.elements.get_mut(&el) {
            Some(record) if record.pipeline.is_none() => {
                record.pipeline = Some(self.name.clone());
                true
            }
            _ => false,
        }
    }

    fn remove(&self, element: &ElementRef) -> bool {
        let Some(el) = memory_name(element) else {
            return false;
        };
        let hook = self.graph.lock().remove_hooks.get(&el).cloned();
        if let Some(hook) = hook {
            hook();
        }
        let mut graph = self.graph.lock();
        if graph.faults.refuse_remove.contains(&el) {
            return false;
        }
        let member = graph
            .elements
            .get(&el)
            .is_some_and(|r| r.pipeline.as_deref() == Some(self.name.as_str()));
        if !member {
            return false;
        }
        graph.unlink_element_pads(&el);
        if let Some(record) = graph.elements.get_mut(&el) {
            record.pipeline = None;
        }
        true
    }

    fn set_state(&self, state: EngineState) -> bool {
        let old = {
            let mut graph = self.graph.lock();
            if graph.faults.refuse_state {
                return false;
            }
            let Some(record) = graph.pipelines.get_mut(&self.name) else {
                return false;
            };
            std::mem::replace(&mut record.state, state)
        };
        self.bus.post(BusMessage::new(
            MessageKind::StateChanged { old, new: state },
            Some(self.name.clone()),
            format!("{old:?} -> {state:?}"),
        ));
        true
    }

    fn current_state(&self) -> EngineState {
        self.graph
            .lock()
            .pipelines
            .get(&self.name)
            .map(|p| p.state)
            .unwrap_or(EngineState::Null)
    }

    fn send_eos(&self) -> bool {
        {
            let mut graph = self.graph.lock();
            if graph.faults.refuse_eos {
                return false;
            }
            let Some(record) = graph.pipelines.get_mut(&self.name) else {
                return false;
            };
            record.eos_sent = true;
        }
        self.bus.post(BusMessage::new(
            MessageKind::Eos,
            Some(self.name.clone()),
            "end of stream",
        ));
        true
    }

    fn bus(&self) -> Option<BusRef> {
        Some(self.bus.clone())
    }
}

struct MemoryElement {
    name: String,
    graph: Arc<Mutex<Graph>>,
}

impl MemoryElement {
    fn pad_ref(&self, pad: &str) -> PadRef {
        Arc::new(MemoryPad {
            element: self.name.clone(),
            name: pad.to_string(),
            graph: self.graph.clone(),
        })
    }
}

impl Element for MemoryElement {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn factory_name(&self) -> String {
        self.graph
            .lock()
            .elements
            .get(&self.name)
            .map(|e| e.factory.clone())
            .unwrap_or_default()
    }

    fn link(&self, target: &ElementRef) -> bool {
        let Some(target) = memory_name(target) else {
            return false;
        };
        let mut graph = self.graph.lock();
        if graph
            .faults
            .refuse_link
            .contains(&(self.name.clone(), target.clone()))
        {
            return false;
        }
        if !graph.same_pipeline(&self.name, &target) {
            return false;
        }
        let has_free_src = graph
            .elements
            .get(&self.name)
            .and_then(|e| e.pads.get("src"))
            .is_some_and(|p| p.peer.is_none());
        if !has_free_src {
            return false;
        }
        let static_sink_free = graph
            .elements
            .get(&target)
            .and_then(|e| e.pads.get("sink"))
            .map(|p| p.peer.is_none() && !p.requested);
        let sink_pad = match static_sink_free {
            Some(true) => Some("sink".to_string()),
            Some(false) => None,
            None => graph.allocate_request_pad(&target),
        };
        let Some(sink_pad) = sink_pad else {
            return false;
        };
        graph.link_pads(
            &(self.name.clone(), "src".to_string()),
            &(target, sink_pad),
        ) == LinkStatus::Ok
    }

    fn unlink(&self, target: &ElementRef) -> bool {
        let Some(target) = memory_name(target) else {
            return false;
        };
        let mut graph = self.graph.lock();
        let linked: Vec<((String, String), (String, String))> = graph
            .elements
            .get(&self.name)
            .map(|e| {
                e.pads
                    .iter()
                    .filter(|(_, p)| p.direction == Direction::Src)
                    .filter_map(|(n, p)| {
                        p.peer
                            .clone()
                            .filter(|(el, _)| *el == target)
                            .map(|peer| ((self.name.clone(), n.clone()), peer))
                    })
                    .collect()
            })
            .unwrap_or_default();
        for (src, sink) in &linked {
            graph.set_peer(src, None);
            graph.set_peer(sink, None);
        }
        !linked.is_empty()
    }

    fn static_pad(&self, name: &str) -> MixResult<PadRef> {
        let graph = self.graph.lock();
        let exists = graph
            .elements
            .get(&self.name)
            .and_then(|e| e.pads.get(name))
            .is_some_and(|p| !p.requested);
        if !exists {
            return Err(MixError::graph(format!(
                "element '{}' has no static pad '{name}'",
                self.name
            )));
        }
        Ok(self.pad_ref(name))
    }

    fn pad_template(&self, name: &str) -> MixResult<PadTemplate> {
        let graph = self.graph.lock();
        let found = graph
            .elements
            .get(&self.name)
            .is_some_and(|e| e.templates.iter().any(|t| t == name));
        if !found {
            return Err(MixError::construction(format!(
                "element '{}' has no pad template '{name}'",
                self.name
            )));
        }
        Ok(PadTemplate {
            name: name.to_string(),
        })
    }

    fn request_pad(&self, template: &PadTemplate) -> MixResult<PadRef> {
        let mut graph = self.graph.lock();
        if graph.faults.refuse_request_pads.contains(&self.name) {
            return Err(MixError::construction(format!(
                "element '{}' refused to allocate a '{}' pad",
                self.name, template.name
            )));
        }
        let known = graph
            .elements
            .get(&self.name)
            .is_some_and(|e| e.templates.contains(&template.name));
        if !known {
            return Err(MixError::construction(format!(
                "element '{}' has no pad template '{}'",
                self.name, template.name
            )));
        }
        let pad = graph.allocate_request_pad(&self.name).ok_or_else(|| {
            MixError::construction(format!("element '{}' vanished", self.name))
        })?;
        drop(graph);
        Ok(self.pad_ref(&pad))
    }

    fn release_request_pad(&self, pad: &PadRef) -> bool {
        let Some((owner, pad)) = memory_pad(pad) else {
            return false;
        };
        if owner != self.name {
            return false;
        }
        let mut graph = self.graph.lock();
        let peer = match graph.elements.get(&owner).and_then(|e| e.pads.get(&pad)) {
            Some(p) if p.requested => p.peer.clone(),
            _ => return false,
        };
        if let Some(peer) = peer {
            graph.set_peer(&peer, None);
        }
        if let Some(e) = graph.elements.get_mut(&owner) {
            e.pads.remove(&pad);
        }
        true
    }

    fn set_property(&self, name: &str, value: PropertyValue) {
        if let Some(e) = self.graph.lock().elements.get_mut(&self.name) {
            e.properties.insert(name.to_string(), value);
        }
    }

    fn connect_pad_added(&self, callback: PadAddedCallback) {
        if let Some(e) = self.graph.lock().elements.get_mut(&self.name) {
            e.callbacks.push(callback);
        }
    }

    fn push_buffer(&self, data: Bytes) -> MixResult<()> {
        let mut graph = self.graph.lock();
        let record = graph
            .elements
            .get_mut(&self.name)
            .ok_or_else(|| MixError::push(format!("unknown element '{}'", self.name)))?;
        if record.factory != "appsrc" {
            return Err(MixError::push(format!(
                "element '{}' ({}) does not accept buffers",
                self.name, record.factory
            )));
        }
        if record.pipeline.is_none() {
            return Err(MixError::push(format!(
                "element '{}' is not in a pipeline",
                self.name
            )));
        }
        record.pushed.push(data);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct MemoryPad {
    element: String,
    name: String,
    graph: Arc<Mutex<Graph>>,
}

impl Pad for MemoryPad {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn parent_name(&self) -> Option<String> {
        Some(self.element.clone())
    }

    fn link(&self, sink: &PadRef) -> LinkStatus {
        let Some(sink) = memory_pad(sink) else {
            return LinkStatus::WrongHierarchy;
        };
        self.graph
            .lock()
            .link_pads(&(self.element.clone(), self.name.clone()), &sink)
    }

    fn unlink(&self, sink: &PadRef) -> bool {
        let Some(sink) = memory_pad(sink) else {
            return false;
        };
        let me = (self.element.clone(), self.name.clone());
        let mut graph = self.graph.lock();
        let linked = graph
            .elements
            .get(&me.0)
            .and_then(|e| e.pads.get(&me.1))
            .is_some_and(|p| p.peer.as_ref() == Some(&sink));
        if linked {
            graph.set_peer(&me, None);
            graph.set_peer(&sink, None);
        }
        linked
    }

    fn set_property(&self, name: &str, value: PropertyValue) {
        if let Some(p) = self
            .graph
            .lock()
            .elements
            .get_mut(&self.element)
            .and_then(|e| e.pads.get_mut(&self.name))
        {
            p.properties.insert(name.to_string(), value);
        }
    }

    fn caps(&self) -> Option<Caps> {
        self.graph
            .lock()
            .elements
            .get(&self.element)
            .and_then(|e| e.pads.get(&self.name))
            .and_then(|p| p.caps.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Default)]
struct MemoryBus {
    queue: Mutex<VecDeque<BusMessage>>,
    ready: Condvar,
}

impl MemoryBus {
    fn post(&self, message: BusMessage) {
        self.queue.lock().push_back(message);
        self.ready.notify_all();
    }
}

impl Bus for MemoryBus {
    fn have_pending(&self) -> bool {
        !self.queue.lock().is_empty()
    }

    fn pop(&self) -> Option<BusMessage> {
        self.queue.lock().pop_front()
    }

    fn timed_pop(&self, timeout: Duration) -> Option<BusMessage> {
        let mut queue = self.queue.lock();
        if queue.is_empty() {
            let _ = self
                .ready
                .wait_while_for(&mut queue, |q| q.is_empty(), timeout);
        }
        queue.pop_front()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/engine/memory.rs"]
mod tests;
