use std::sync::Arc;

use crate::{
    engine::{ElementRef, Engine},
    foundation::{
        core::SourceId,
        error::{MixError, MixResult},
        ids::NodeIds,
    },
    source::{
        media::MediaSource,
        topology::{Codec, Topology},
    },
};

/// Builds media sources on one engine, numbering their nodes from a shared counter.
///
/// A compositor hands out a factory sharing its own counter (see
/// [`crate::Compositor::source_factory`]), so node names never collide within a pipeline.
#[derive(Clone)]
pub struct SourceFactory {
    engine: Arc<dyn Engine>,
    ids: NodeIds,
}

impl SourceFactory {
    /// Factory with a fresh counter.
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self::with_ids(engine, NodeIds::new())
    }

    pub(crate) fn with_ids(engine: Arc<dyn Engine>, ids: NodeIds) -> Self {
        Self { engine, ids }
    }

    /// `factory → videobox`; the size is set as caps on the producer itself.
    pub fn raw(&self, factory: &str, width: u32, height: u32) -> MixResult<MediaSource> {
        check_size(width, height)?;
        let id = self.ids.next();
        let topology = Topology::raw(self.engine.as_ref(), id, factory)?;
        Ok(MediaSource::new(SourceId(id), topology, width, height))
    }

    /// Test pattern generator; `pattern` selects the engine's pattern enum value.
    pub fn test(&self, width: u32, height: u32, pattern: Option<i32>) -> MixResult<MediaSource> {
        check_size(width, height)?;
        let id = self.ids.next();
        let topology = Topology::test(self.engine.as_ref(), id, pattern)?;
        Ok(MediaSource::new(SourceId(id), topology, width, height))
    }

    /// Source fed with encoded RTP frames through [`MediaSource::push`].
    pub fn live_push(&self, codec: Codec, width: u32, height: u32) -> MixResult<MediaSource> {
        check_size(width, height)?;
        let id = self.ids.next();
        let topology = Topology::live_push(self.engine.as_ref(), id, codec)?;
        Ok(MediaSource::new(SourceId(id), topology, width, height))
    }

    /// RTSP camera.
    pub fn rtsp(
        &self,
        location: &str,
        latency_ms: u32,
        width: u32,
        height: u32,
    ) -> MixResult<MediaSource> {
        check_size(width, height)?;
        if location.trim().is_empty() {
            return Err(MixError::validation("rtsp location must be non-empty"));
        }
        let id = self.ids.next();
        let topology = Topology::rtsp(self.engine.as_ref(), id, location, latency_ms)?;
        Ok(MediaSource::new(SourceId(id), topology, width, height))
    }

    /// Any URI the engine can decode.
    pub fn uri(&self, uri: &str, width: u32, height: u32) -> MixResult<MediaSource> {
        check_size(width, height)?;
        if !uri.contains("://") {
            return Err(MixError::validation(format!(
                "'{uri}' is not an absolute uri"
            )));
        }
        let id = self.ids.next();
        let topology = Topology::uri(self.engine.as_ref(), id, uri)?;
        Ok(MediaSource::new(SourceId(id), topology, width, height))
    }

    /// Wrap a caller-built producer element.
    pub fn from_element(
        &self,
        element: ElementRef,
        width: u32,
        height: u32,
    ) -> MixResult<MediaSource> {
        check_size(width, height)?;
        let id = self.ids.next();
        let topology = Topology::from_element(self.engine.as_ref(), id, element)?;
        Ok(MediaSource::new(SourceId(id), topology, width, height))
    }
}

fn check_size(width: u32, height: u32) -> MixResult<()> {
    if width == 0 || height == 0 {
        return Err(MixError::validation("source width/height must be non-zero"));
    }
    Ok(())
}
