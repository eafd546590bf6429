//! Pipeline orchestrator: one pipeline, its mixing stage and the ordered set of sources.

use std::{sync::Arc, time::Duration};

use crossbeam_channel::Receiver;

use crate::{
    config::CompositorConfig,
    engine::{ElementRef, Engine, PadRef, PipelineRef},
    foundation::{
        core::{EngineState, PipelineState, SourceId},
        error::{MixError, MixResult},
        ids::NodeIds,
    },
    layout::table::Layout,
    mixer::MixingStage,
    source::{factory::SourceFactory, media::MediaSource},
};

pub(crate) mod bus;

use bus::{BusEvent, BusMonitor};

/// Owns one pipeline instance, the mixing stage, the attached sources and the active layout.
///
/// Mutating operations take `&mut self`; callers serialize access to one compositor.
pub struct Compositor {
    engine: Arc<dyn Engine>,
    ids: NodeIds,
    config: CompositorConfig,
    pipeline: PipelineRef,
    mixer: MixingStage,
    sources: Vec<MediaSource>,
    layout: Option<Layout>,
    state: PipelineState,
    monitor: Option<BusMonitor>,
}

impl Compositor {
    /// Build the pipeline and mixing stage with a private node counter.
    pub fn new(engine: Arc<dyn Engine>, config: CompositorConfig) -> MixResult<Self> {
        Self::with_ids(engine, config, NodeIds::new())
    }

    /// Build with an injected node counter, e.g. one shared by several compositors on the
    /// same engine.
    pub fn with_ids(
        engine: Arc<dyn Engine>,
        config: CompositorConfig,
        ids: NodeIds,
    ) -> MixResult<Self> {
        config.validate()?;
        let pipeline = engine.new_pipeline(&format!("pipeline_{}", ids.next()))?;
        let mixer = MixingStage::new(engine.as_ref(), &ids, &config)?;
        mixer.install(&pipeline)?;

        let monitor = match pipeline.bus() {
            Some(bus) => Some(BusMonitor::spawn(
                pipeline.name(),
                bus,
                Duration::from_millis(config.bus_poll_ms),
                config.bus_capacity,
            )?),
            None => {
                tracing::warn!(pipeline = %pipeline.name(), "pipeline has no bus; errors will not be observed");
                None
            }
        };

        tracing::info!(pipeline = %pipeline.name(), canvas = ?config.canvas, "compositor created");
        Ok(Self {
            engine,
            ids,
            config,
            pipeline,
            mixer,
            sources: Vec::new(),
            layout: None,
            state: PipelineState::Stopped,
            monitor,
        })
    }

    /// Source factory on this compositor's engine and node counter.
    pub fn source_factory(&self) -> SourceFactory {
        SourceFactory::with_ids(self.engine.clone(), self.ids.clone())
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &PipelineRef {
        &self.pipeline
    }

    pub fn pipeline_name(&self) -> String {
        self.pipeline.name()
    }

    pub fn mixer(&self) -> &MixingStage {
        &self.mixer
    }

    /// Local lifecycle state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Attached sources, in attachment order.
    pub fn sources(&self) -> &[MediaSource] {
        &self.sources
    }

    pub fn source(&self, id: SourceId) -> Option<&MediaSource> {
        self.sources.iter().find(|s| s.id() == id)
    }

    pub fn layout(&self) -> Option<&Layout> {
        self.layout.as_ref()
    }

    /// Classified bus events, if the pipeline has a bus.
    pub fn bus_events(&self) -> Option<Receiver<BusEvent>> {
        self.monitor.as_ref().map(BusMonitor::events)
    }

    /// Bind `source` into the pipeline, link it to the video mixer, append it and re-apply the
    /// layout.
    ///
    /// For sources with deferred edges the mixer link runs once they complete. On failure the
    /// source is released again and the source list is unchanged. A source bound to another
    /// pipeline is refused; detach it from its compositor first.
    #[tracing::instrument(skip_all, fields(pipeline = %self.pipeline.name(), source = %source.id()))]
    pub fn attach_source(&mut self, source: MediaSource) -> MixResult<SourceId> {
        let id = source.id();
        if self.source(id).is_some() {
            return Err(MixError::validation(format!("{id} is already attached")));
        }
        if let Some(owner) = source.pipeline_name()
            && owner != self.pipeline.name()
        {
            return Err(MixError::validation(format!(
                "{id} is bound to pipeline '{owner}'; detach it first"
            )));
        }

        source.bind(&self.pipeline)?;
        let link = match self.mixer.link_source(&source) {
            Ok(link) => link,
            Err(err) => {
                if let Err(cleanup) = source.unbind() {
                    tracing::warn!(error = %cleanup, "could not release source after failed attach");
                }
                return Err(err);
            }
        };

        self.sources.push(source);
        self.reapply_layout();
        tracing::info!(?link, count = self.sources.len(), "source attached");
        Ok(id)
    }

    /// Unlink and release a source, give its mixing port back and re-apply the layout.
    #[tracing::instrument(skip(self), fields(pipeline = %self.pipeline.name()))]
    pub fn detach_source(&mut self, id: SourceId) -> MixResult<MediaSource> {
        let idx = self
            .sources
            .iter()
            .position(|s| s.id() == id)
            .ok_or_else(|| MixError::validation(format!("{id} is not attached")))?;
        if let Some(owner) = self.sources[idx].pipeline_name()
            && owner != self.pipeline.name()
        {
            return Err(MixError::validation(format!(
                "{id} is bound to pipeline '{owner}', not '{}'",
                self.pipeline.name()
            )));
        }

        let port = self.sources[idx].output_port();
        self.sources[idx].unbind()?;
        if let Some(port) = port {
            self.mixer.video().release_port(&port);
        }

        let source = self.sources.remove(idx);
        self.reapply_layout();
        tracing::info!(count = self.sources.len(), "source detached");
        Ok(source)
    }

    /// Add `element` to the pipeline and link its `src` pad to a fresh audio mixer port.
    #[tracing::instrument(skip_all, fields(pipeline = %self.pipeline.name(), element = %element.name()))]
    pub fn attach_audio(&mut self, element: ElementRef) -> MixResult<PadRef> {
        self.add(&element)?;
        match self.mixer.link_audio(&element) {
            Ok(port) => Ok(port),
            Err(err) => {
                if !self.pipeline.remove(&element) {
                    tracing::warn!("could not remove audio element after failed link");
                }
                Err(err)
            }
        }
    }

    /// Add an element outside the mixing stage (encoders, muxers, sinks).
    pub fn add(&self, element: &ElementRef) -> MixResult<()> {
        if !self.pipeline.add(element) {
            return Err(MixError::graph(format!(
                "pipeline '{}' refused to add '{}'",
                self.pipeline.name(),
                element.name()
            )));
        }
        Ok(())
    }

    /// Link the mixed video output to an element already added with [`Compositor::add`].
    pub fn link_video_sink(&self, element: &ElementRef) -> MixResult<()> {
        link_output(self.mixer.video_output(), element)
    }

    /// Link the mixed audio output to an element already added with [`Compositor::add`].
    pub fn link_audio_sink(&self, element: &ElementRef) -> MixResult<()> {
        link_output(self.mixer.audio_output(), element)
    }

    /// Store `layout` and apply it to the current sources.
    ///
    /// The layout stays stored even when it has no rule for the current count; the resolution
    /// error is returned so the caller knows nothing moved.
    #[tracing::instrument(skip_all, fields(pipeline = %self.pipeline.name()))]
    pub fn set_layout(&mut self, layout: Layout) -> MixResult<()> {
        if layout.canvas() != self.config.canvas {
            tracing::warn!(layout = ?layout.canvas(), compositor = ?self.config.canvas, "layout canvas differs from compositor canvas");
        }
        let layout = self.layout.insert(layout);
        if self.sources.is_empty() {
            return Ok(());
        }
        layout.apply(&self.sources)
    }

    fn reapply_layout(&self) {
        let Some(layout) = &self.layout else {
            return;
        };
        if self.sources.is_empty() {
            return;
        }
        if let Err(err) = layout.apply(&self.sources) {
            tracing::warn!(error = %err, "layout not applied");
        }
    }

    /// Request `Playing`. Ignored once end-of-stream was sent.
    #[tracing::instrument(skip(self), fields(pipeline = %self.pipeline.name()))]
    pub fn start(&mut self) -> MixResult<()> {
        if self.state == PipelineState::EndOfStream {
            tracing::debug!("start ignored after end of stream");
            return Ok(());
        }
        self.transition(EngineState::Playing)
    }

    /// Request `Paused`. Ignored once end-of-stream was sent.
    #[tracing::instrument(skip(self), fields(pipeline = %self.pipeline.name()))]
    pub fn pause(&mut self) -> MixResult<()> {
        if self.state == PipelineState::EndOfStream {
            tracing::debug!("pause ignored after end of stream");
            return Ok(());
        }
        self.transition(EngineState::Paused)
    }

    /// Request `Null`. After end-of-stream the request still releases engine resources but the
    /// local state stays terminal.
    #[tracing::instrument(skip(self), fields(pipeline = %self.pipeline.name()))]
    pub fn stop(&mut self) -> MixResult<()> {
        if self.state == PipelineState::EndOfStream {
            if !self.pipeline.set_state(EngineState::Null) {
                return Err(self.refused(EngineState::Null));
            }
            return Ok(());
        }
        self.transition(EngineState::Null)
    }

    /// Signal end-of-stream. The local state becomes terminal even when the engine refuses the
    /// event; the refusal is still returned.
    #[tracing::instrument(skip(self), fields(pipeline = %self.pipeline.name()))]
    pub fn send_eos(&mut self) -> MixResult<()> {
        let accepted = self.pipeline.send_eos();
        self.state = PipelineState::EndOfStream;
        if !accepted {
            tracing::warn!("engine did not handle end of stream");
            return Err(MixError::lifecycle(format!(
                "pipeline '{}' refused end of stream",
                self.pipeline.name()
            )));
        }
        tracing::info!("end of stream sent");
        Ok(())
    }

    fn transition(&mut self, target: EngineState) -> MixResult<()> {
        if !self.pipeline.set_state(target) {
            return Err(self.refused(target));
        }
        let previous = std::mem::replace(&mut self.state, target.into());
        tracing::info!(from = ?previous, to = ?self.state, "pipeline state changed");
        Ok(())
    }

    fn refused(&self, target: EngineState) -> MixError {
        MixError::lifecycle(format!(
            "pipeline '{}' refused state {target:?}",
            self.pipeline.name()
        ))
    }
}

fn link_output(output: &ElementRef, element: &ElementRef) -> MixResult<()> {
    if !output.link(element) {
        return Err(MixError::graph(format!(
            "failed to link '{}' -> '{}'",
            output.name(),
            element.name()
        )));
    }
    Ok(())
}

impl Drop for Compositor {
    fn drop(&mut self) {
        if let Some(mut monitor) = self.monitor.take() {
            monitor.shutdown();
        }
        if self.state != PipelineState::Stopped && !self.pipeline.set_state(EngineState::Null) {
            tracing::warn!(pipeline = %self.pipeline.name(), "pipeline refused Null on teardown");
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/compositor/orchestrator.rs"]
mod tests;
