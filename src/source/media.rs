use std::{
    fmt,
    sync::{Arc, Weak},
    time::{Duration, Instant},
};

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};

use crate::{
    engine::{Caps, ElementRef, PadRef, PipelineRef, PropertyValue},
    foundation::{
        core::{BorderEdges, EngineState, LinkStatus, SourceId},
        error::{MixError, MixResult},
    },
    layout::table::Placeable,
    source::topology::{SourceKind, Topology},
};

/// Connection progress of a source.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub enum SourceStatus {
    /// Not part of any pipeline.
    Unbound,
    /// In a pipeline, waiting for deferred edges.
    Bound,
    /// Every internal edge is linked; the output can be linked to a mixing port.
    Connected,
    /// Output linked to a mixing port.
    Linked,
    /// A deferred edge or a release failed.
    Failed(String),
}

/// Runs once the source becomes [`SourceStatus::Connected`].
pub type OutputContinuation = Box<dyn FnOnce(&MediaSource) + Send>;

/// Geometry last requested on a source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct SourceGeometry {
    /// Position on the canvas; `None` until a layout or caller sets it.
    pub position: Option<(i32, i32)>,
    /// Picture size.
    pub size: (u32, u32),
    /// Values pushed to the framing node as `[top, right, bottom, left]`.
    pub borders: [i32; 4],
}

struct SourceState {
    pipeline: Option<PipelineRef>,
    status: SourceStatus,
    /// Completion flag per topology edge.
    completed: Vec<bool>,
    output: Option<PadRef>,
    continuation: Option<OutputContinuation>,
    geometry: SourceGeometry,
}

pub(crate) struct SourceInner {
    id: SourceId,
    topology: Topology,
    state: Mutex<SourceState>,
    changed: Condvar,
}

/// One incoming stream and its private processing sub-graph.
///
/// Cloning yields another handle to the same source.
#[derive(Clone)]
pub struct MediaSource {
    inner: Arc<SourceInner>,
}

impl fmt::Debug for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaSource")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.topology.kind)
            .field("status", &self.status())
            .finish()
    }
}

impl MediaSource {
    pub(crate) fn new(id: SourceId, topology: Topology, width: u32, height: u32) -> Self {
        let inner = Arc::new(SourceInner {
            id,
            topology,
            state: Mutex::new(SourceState {
                pipeline: None,
                status: SourceStatus::Unbound,
                completed: Vec::new(),
                output: None,
                continuation: None,
                geometry: SourceGeometry::default(),
            }),
            changed: Condvar::new(),
        });

        for (idx, edge) in inner.topology.edges.iter().enumerate() {
            if edge.deferred.is_none() {
                continue;
            }
            let weak: Weak<SourceInner> = Arc::downgrade(&inner);
            inner
                .topology
                .element(edge.from)
                .connect_pad_added(Arc::new(move |_element, pad| {
                    if let Some(inner) = weak.upgrade() {
                        MediaSource { inner }.complete_deferred(idx, pad);
                    }
                }));
        }

        let source = Self { inner };
        source.set_size(width, height);
        source
    }

    /// Stable identifier.
    pub fn id(&self) -> SourceId {
        self.inner.id
    }

    /// Variant of this source.
    pub fn kind(&self) -> SourceKind {
        self.inner.topology.kind
    }

    /// Current connection progress.
    pub fn status(&self) -> SourceStatus {
        self.inner.state.lock().status.clone()
    }

    /// `true` once every internal edge is linked.
    pub fn is_connected(&self) -> bool {
        matches!(
            self.inner.state.lock().status,
            SourceStatus::Connected | SourceStatus::Linked
        )
    }

    /// Name of the pipeline this source is bound to.
    pub fn pipeline_name(&self) -> Option<String> {
        self.inner.state.lock().pipeline.as_ref().map(|p| p.name())
    }

    /// Names of the internal nodes, upstream first.
    pub fn node_names(&self) -> Vec<String> {
        self.inner
            .topology
            .nodes
            .iter()
            .map(|n| n.element.name())
            .collect()
    }

    /// Framing node; its `src` pad is the source output.
    pub fn output_element(&self) -> ElementRef {
        self.inner
            .topology
            .element(self.inner.topology.framing)
            .clone()
    }

    /// Mixing port the output is linked to.
    pub fn output_port(&self) -> Option<PadRef> {
        self.inner.state.lock().output.clone()
    }

    /// Geometry last requested.
    pub fn geometry(&self) -> SourceGeometry {
        self.inner.state.lock().geometry
    }

    /// Add every internal node to `pipeline` and link the static edges.
    ///
    /// A source already bound elsewhere is first released from its old pipeline. Deferred edges
    /// complete later, from the engine's pad-added notifications. When any add or link is
    /// refused, the nodes added so far are removed again and the source is left unbound.
    #[tracing::instrument(skip_all, fields(source = %self.inner.id, pipeline = %pipeline.name()))]
    pub fn bind(&self, pipeline: &PipelineRef) -> MixResult<()> {
        self.release()?;

        let topology = &self.inner.topology;
        let mut state = self.inner.state.lock();
        let mut added: Vec<&ElementRef> = Vec::with_capacity(topology.nodes.len());
        for node in &topology.nodes {
            if !pipeline.add(&node.element) {
                roll_back(pipeline, &added);
                return Err(MixError::graph(format!(
                    "pipeline '{}' refused to add '{}'",
                    pipeline.name(),
                    node.element.name()
                )));
            }
            added.push(&node.element);
        }

        let mut completed = vec![false; topology.edges.len()];
        for (idx, edge) in topology.edges.iter().enumerate() {
            if edge.deferred.is_some() {
                continue;
            }
            let (from, to) = (topology.element(edge.from), topology.element(edge.to));
            if !from.link(to) {
                roll_back(pipeline, &added);
                return Err(MixError::graph(format!(
                    "failed to link '{}' -> '{}'",
                    from.name(),
                    to.name()
                )));
            }
            completed[idx] = true;
        }

        state.pipeline = Some(pipeline.clone());
        state.completed = completed;
        state.status = if topology.has_deferred() {
            SourceStatus::Bound
        } else {
            SourceStatus::Connected
        };
        self.inner.changed.notify_all();
        tracing::debug!(status = ?state.status, "source bound");
        Ok(())
    }

    /// Release every node from the current pipeline. No-op when unbound.
    #[tracing::instrument(skip_all, fields(source = %self.inner.id))]
    pub fn unbind(&self) -> MixResult<()> {
        self.release()
    }

    /// The state lock only covers taking the binding. Unlinks and removals run without it, so
    /// pad-added callbacks arriving meanwhile find the source unbound and return.
    fn release(&self) -> MixResult<()> {
        let (pipeline, port) = {
            let mut state = self.inner.state.lock();
            let Some(pipeline) = state.pipeline.take() else {
                return Ok(());
            };
            state.completed.clear();
            state.continuation = None;
            state.status = SourceStatus::Unbound;
            (pipeline, state.output.take())
        };
        let topology = &self.inner.topology;
        let framing = topology.element(topology.framing);

        if let Some(port) = port
            && let Ok(src) = framing.static_pad("src")
        {
            src.unlink(&port);
        }
        if let Some(prev) = topology.framing_predecessor() {
            prev.unlink(framing);
        }

        let refused: Vec<String> = topology
            .nodes
            .iter()
            .rev()
            .filter(|n| !pipeline.remove(&n.element))
            .map(|n| n.element.name())
            .collect();

        let mut state = self.inner.state.lock();
        if !refused.is_empty() {
            let reason = format!(
                "pipeline '{}' refused to remove {}",
                pipeline.name(),
                refused.join(", ")
            );
            state.pipeline = Some(pipeline);
            state.status = SourceStatus::Failed(reason.clone());
            self.inner.changed.notify_all();
            return Err(MixError::graph(reason));
        }

        self.inner.changed.notify_all();
        tracing::debug!(pipeline = %pipeline.name(), "source released");
        Ok(())
    }

    /// Mark a bound source failed and wake waiters. Its nodes stay put until released.
    pub(crate) fn fail(&self, reason: String) {
        let mut state = self.inner.state.lock();
        if state.pipeline.is_none() {
            return;
        }
        state.status = SourceStatus::Failed(reason);
        state.continuation = None;
        self.inner.changed.notify_all();
    }

    /// Link the framing node's `src` pad to `port`.
    ///
    /// Only valid once the source is connected. A non-ok status is returned as-is; the caller
    /// decides what a refusal means. On success the stored position is replayed onto the port.
    pub fn link_output(&self, port: &PadRef) -> MixResult<LinkStatus> {
        let mut state = self.inner.state.lock();
        match &state.status {
            SourceStatus::Connected | SourceStatus::Linked => {}
            SourceStatus::Unbound => {
                return Err(MixError::graph(format!("{} is not bound", self.inner.id)));
            }
            SourceStatus::Bound => {
                return Err(MixError::graph(format!(
                    "{} is still waiting for deferred links",
                    self.inner.id
                )));
            }
            SourceStatus::Failed(reason) => return Err(MixError::graph(reason.clone())),
        }

        let src = self.output_element().static_pad("src")?;
        let status = src.link(port);
        if status.is_ok() {
            if let Some((x, y)) = state.geometry.position {
                port.set_property("xpos", PropertyValue::from(x));
                port.set_property("ypos", PropertyValue::from(y));
            }
            state.output = Some(port.clone());
            state.status = SourceStatus::Linked;
            self.inner.changed.notify_all();
        }
        Ok(status)
    }

    /// Run `next` once the source is connected: immediately when it already is, otherwise
    /// from the deferred-link notification that completes the last internal edge.
    ///
    /// A pending continuation is dropped when the source is released.
    pub fn when_connected(&self, next: OutputContinuation) -> MixResult<()> {
        let mut state = self.inner.state.lock();
        let status = state.status.clone();
        match status {
            SourceStatus::Connected => {
                drop(state);
                next(self);
                Ok(())
            }
            SourceStatus::Bound => {
                state.continuation = Some(next);
                Ok(())
            }
            SourceStatus::Linked => Err(MixError::graph(format!(
                "{} output is already linked",
                self.inner.id
            ))),
            SourceStatus::Unbound => Err(MixError::graph(format!("{} is not bound", self.inner.id))),
            SourceStatus::Failed(reason) => Err(MixError::graph(reason)),
        }
    }

    /// Block until every internal edge is linked, the source fails, or `timeout` elapses.
    pub fn wait_connected(&self, timeout: Duration) -> MixResult<()> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        loop {
            match &state.status {
                SourceStatus::Connected | SourceStatus::Linked => return Ok(()),
                SourceStatus::Failed(reason) => return Err(MixError::graph(reason.clone())),
                SourceStatus::Unbound => {
                    return Err(MixError::graph(format!("{} is not bound", self.inner.id)));
                }
                SourceStatus::Bound => {}
            }
            if self
                .inner
                .changed
                .wait_until(&mut state, deadline)
                .timed_out()
                && state.status == SourceStatus::Bound
            {
                return Err(MixError::lifecycle(format!(
                    "{} not connected after {timeout:?}",
                    self.inner.id
                )));
            }
        }
    }

    /// Inject one encoded frame into a live-push source.
    ///
    /// Accepted only while the bound pipeline is playing; buffers keep their push order.
    pub fn push(&self, data: Bytes) -> MixResult<()> {
        if !matches!(self.inner.topology.kind, SourceKind::LivePush(_)) {
            return Err(MixError::push(format!(
                "{} ({:?}) does not accept buffers",
                self.inner.id, self.inner.topology.kind
            )));
        }
        let pipeline = self
            .inner
            .state
            .lock()
            .pipeline
            .clone()
            .ok_or_else(|| MixError::push(format!("{} is not bound", self.inner.id)))?;
        if pipeline.current_state() != EngineState::Playing {
            return Err(MixError::push(format!(
                "pipeline '{}' is not playing",
                pipeline.name()
            )));
        }
        let topology = &self.inner.topology;
        topology.element(topology.entry).push_buffer(data)
    }

    fn complete_deferred(&self, edge_idx: usize, pad: &PadRef) {
        let topology = &self.inner.topology;
        let edge = topology.edges[edge_idx];
        let Some(filter) = edge.deferred else {
            return;
        };
        let caps = pad.caps();
        let from = topology.element(edge.from).name();

        let continuation = {
            let mut state = self.inner.state.lock();
            if state.pipeline.is_none() || state.completed.get(edge_idx).copied().unwrap_or(true) {
                tracing::debug!(source = %self.inner.id, element = %from, pad = %pad.name(), "pad ignored, edge not pending");
                return;
            }
            if !caps.as_ref().is_some_and(|c| filter.accepts(c)) {
                let caps = caps.as_ref().map(Caps::to_string).unwrap_or_default();
                tracing::debug!(source = %self.inner.id, element = %from, caps = %caps, "pad ignored, unexpected media");
                return;
            }

            let target = topology.element(edge.to);
            let status = match target.static_pad("sink") {
                Ok(sink) => pad.link(&sink),
                Err(err) => {
                    tracing::warn!(source = %self.inner.id, error = %err, "deferred link target has no sink pad");
                    LinkStatus::Refused
                }
            };
            if !status.is_ok() {
                let reason = format!(
                    "deferred link '{from}.{}' -> '{}' refused ({status:?})",
                    pad.name(),
                    target.name()
                );
                tracing::warn!(source = %self.inner.id, "{reason}");
                state.status = SourceStatus::Failed(reason);
                state.continuation = None;
                self.inner.changed.notify_all();
                return;
            }

            state.completed[edge_idx] = true;
            tracing::debug!(source = %self.inner.id, element = %from, pad = %pad.name(), "deferred link completed");
            if state.completed.iter().any(|done| !done) {
                return;
            }
            state.status = SourceStatus::Connected;
            let next = state.continuation.take();
            if next.is_none() {
                self.inner.changed.notify_all();
            }
            next
        };

        // Waiters wake once the continuation has linked or failed the source.
        if let Some(next) = continuation {
            next(self);
            self.inner.changed.notify_all();
        }
    }
}

fn roll_back(pipeline: &PipelineRef, added: &[&ElementRef]) {
    for element in added.iter().rev() {
        if !pipeline.remove(element) {
            tracing::warn!(element = %element.name(), pipeline = %pipeline.name(), "rollback could not remove node");
        }
    }
}

const EDGES: [BorderEdges; 4] = [
    BorderEdges::TOP,
    BorderEdges::RIGHT,
    BorderEdges::BOTTOM,
    BorderEdges::LEFT,
];

impl Placeable for MediaSource {
    /// Stored; pushed to the mixing port as `xpos`/`ypos` once the output is linked.
    fn set_position(&self, x: i32, y: i32) {
        let mut state = self.inner.state.lock();
        state.geometry.position = Some((x, y));
        if let Some(port) = &state.output {
            port.set_property("xpos", PropertyValue::from(x));
            port.set_property("ypos", PropertyValue::from(y));
        }
    }

    fn set_size(&self, width: u32, height: u32) {
        let topology = &self.inner.topology;
        self.inner.state.lock().geometry.size = (width, height);
        topology
            .element(topology.size)
            .set_property("caps", PropertyValue::from(Caps::raw_video(width, height)));
    }

    fn set_border(&self, edges: BorderEdges, value: i32) {
        let mut state = self.inner.state.lock();
        for (idx, edge) in EDGES.into_iter().enumerate() {
            if edges.contains(edge) {
                state.geometry.borders[idx] = value;
            }
        }
        let framing = self.output_element();
        for name in edges.property_names() {
            framing.set_property(name, PropertyValue::from(value));
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/source/media.rs"]
mod tests;
