//! Shared mixing nodes and port allocation.

use crate::{
    config::CompositorConfig,
    engine::{Caps, ElementRef, Engine, PadRef, PadTemplate, PipelineRef, PropertyValue},
    foundation::{
        error::{MixError, MixResult},
        ids::NodeIds,
    },
    source::media::{MediaSource, SourceStatus},
};

/// One mixing node and the request-pad template its input ports come from.
#[derive(Clone)]
pub struct MixerNode {
    element: ElementRef,
    template: PadTemplate,
}

impl MixerNode {
    fn new(engine: &dyn Engine, factory: &str, name: &str, template: &str) -> MixResult<Self> {
        let element = engine.make_element(factory, name)?;
        let template = element.pad_template(template)?;
        Ok(Self { element, template })
    }

    /// The mixing element.
    pub fn element(&self) -> &ElementRef {
        &self.element
    }

    /// Request a fresh input port.
    pub fn allocate_port(&self) -> MixResult<PadRef> {
        self.element.request_pad(&self.template)
    }

    /// Give a port back to the mixer. Refusals are logged.
    pub fn release_port(&self, port: &PadRef) {
        if !self.element.release_request_pad(port) {
            tracing::warn!(
                mixer = %self.element.name(),
                port = %port.name(),
                "mixer refused to release port"
            );
        }
    }
}

/// How a source ended up on the mixer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortLink {
    /// The output is linked to a mixing port.
    Linked,
    /// The source still waits for deferred links; the port is linked once they complete.
    Deferred,
}

/// Video mixer, its output caps filter, and the audio mixer.
pub struct MixingStage {
    video: MixerNode,
    filter: ElementRef,
    audio: MixerNode,
}

impl MixingStage {
    pub(crate) fn new(
        engine: &dyn Engine,
        ids: &NodeIds,
        config: &CompositorConfig,
    ) -> MixResult<Self> {
        let id = ids.next();
        let video = MixerNode::new(
            engine,
            &config.video_mixer,
            &format!("videomixer_{id}"),
            &config.pad_template,
        )?;
        video
            .element
            .set_property("background", PropertyValue::from(config.background));

        let filter = engine.make_element("capsfilter", &format!("filter_{id}"))?;
        filter.set_property(
            "caps",
            PropertyValue::from(Caps::raw_video(config.canvas.width, config.canvas.height)),
        );

        let audio = MixerNode::new(
            engine,
            &config.audio_mixer,
            &format!("audiomixer_{id}"),
            &config.pad_template,
        )?;
        Ok(Self {
            video,
            filter,
            audio,
        })
    }

    /// Add the mixing nodes to `pipeline` and link the video mixer to its caps filter.
    pub(crate) fn install(&self, pipeline: &PipelineRef) -> MixResult<()> {
        for element in [&self.video.element, &self.filter, &self.audio.element] {
            if !pipeline.add(element) {
                return Err(MixError::graph(format!(
                    "pipeline '{}' refused to add '{}'",
                    pipeline.name(),
                    element.name()
                )));
            }
        }
        if !self.video.element.link(&self.filter) {
            return Err(MixError::graph(format!(
                "failed to link '{}' -> '{}'",
                self.video.element.name(),
                self.filter.name()
            )));
        }
        Ok(())
    }

    pub fn video(&self) -> &MixerNode {
        &self.video
    }

    pub fn audio(&self) -> &MixerNode {
        &self.audio
    }

    /// Element carrying the mixed, canvas-sized video.
    pub fn video_output(&self) -> &ElementRef {
        &self.filter
    }

    /// Element carrying the mixed audio.
    pub fn audio_output(&self) -> &ElementRef {
        &self.audio.element
    }

    /// Link `source` to a fresh video port.
    ///
    /// A source still waiting for deferred links gets the link registered as its completion
    /// continuation; nothing is requested from the mixer before then.
    pub fn link_source(&self, source: &MediaSource) -> MixResult<PortLink> {
        match source.status() {
            SourceStatus::Connected => {
                link_video(&self.video, source)?;
                Ok(PortLink::Linked)
            }
            SourceStatus::Bound => {
                let video = self.video.clone();
                source.when_connected(Box::new(move |source| {
                    if let Err(err) = link_video(&video, source) {
                        tracing::error!(source = %source.id(), error = %err, "deferred mixer link failed");
                        source.fail(format!("mixer link failed: {err}"));
                    }
                }))?;
                tracing::debug!(source = %source.id(), "mixer link deferred");
                Ok(PortLink::Deferred)
            }
            other => Err(MixError::graph(format!(
                "{} cannot be mixed while {other:?}",
                source.id()
            ))),
        }
    }

    /// Link `element`'s `src` pad to a fresh audio port.
    pub fn link_audio(&self, element: &ElementRef) -> MixResult<PadRef> {
        let src = element.static_pad("src")?;
        let port = self.audio.allocate_port()?;
        let status = src.link(&port);
        if !status.is_ok() {
            self.audio.release_port(&port);
            return Err(MixError::link_refused(
                format!("'{}' -> audio port '{}'", element.name(), port.name()),
                status,
            ));
        }
        Ok(port)
    }
}

fn link_video(video: &MixerNode, source: &MediaSource) -> MixResult<()> {
    let port = video.allocate_port()?;
    port.set_property("alpha", PropertyValue::from(1.0));
    let status = match source.link_output(&port) {
        Ok(status) => status,
        Err(err) => {
            video.release_port(&port);
            return Err(err);
        }
    };
    if !status.is_ok() {
        video.release_port(&port);
        return Err(MixError::link_refused(
            format!("{} -> video port '{}'", source.id(), port.name()),
            status,
        ));
    }
    tracing::debug!(source = %source.id(), port = %port.name(), "source linked to mixer");
    Ok(())
}

#[cfg(test)]
#[path = "../tests/unit/mixer.rs"]
mod tests;
