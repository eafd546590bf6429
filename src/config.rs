use std::{fs::File, io::BufReader, path::Path, sync::Arc};

use anyhow::Context as _;

use crate::{
    compositor::Compositor,
    engine::Engine,
    foundation::{
        core::Canvas,
        error::{MixError, MixResult},
    },
    layout::table::Layout,
    source::{factory::SourceFactory, media::MediaSource, topology::Codec},
};

/// Compositor settings. Every field has a default, so `{}` is a valid config.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Output canvas; also the caps forced after the video mixer.
    pub canvas: Canvas,
    /// Video mixer `background` enum value (1 = black).
    pub background: i32,
    /// Video mixing factory.
    pub video_mixer: String,
    /// Audio mixing factory.
    pub audio_mixer: String,
    /// Request-pad template on both mixers.
    pub pad_template: String,
    /// Longest wait of one bus read, in milliseconds.
    pub bus_poll_ms: u64,
    /// Capacity of the classified bus event channel; events are dropped when it is full.
    pub bus_capacity: usize,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            canvas: Canvas::default(),
            background: 1,
            video_mixer: "compositor".to_string(),
            audio_mixer: "audiomixer".to_string(),
            pad_template: "sink_%u".to_string(),
            bus_poll_ms: 1000,
            bus_capacity: 256,
        }
    }
}

impl CompositorConfig {
    pub fn validate(&self) -> MixResult<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(MixError::validation("canvas width/height must be > 0"));
        }
        for (what, name) in [
            ("video_mixer", &self.video_mixer),
            ("audio_mixer", &self.audio_mixer),
            ("pad_template", &self.pad_template),
        ] {
            if name.trim().is_empty() {
                return Err(MixError::validation(format!("{what} must be non-empty")));
            }
        }
        if self.bus_poll_ms == 0 {
            return Err(MixError::validation("bus_poll_ms must be > 0"));
        }
        if self.bus_capacity == 0 {
            return Err(MixError::validation("bus_capacity must be > 0"));
        }
        Ok(())
    }
}

/// One source in a scene file.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceSpec {
    Test {
        width: u32,
        height: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<i32>,
    },
    Raw {
        factory: String,
        width: u32,
        height: u32,
    },
    LivePush {
        codec: Codec,
        width: u32,
        height: u32,
    },
    Rtsp {
        location: String,
        #[serde(default = "default_latency_ms")]
        latency_ms: u32,
        width: u32,
        height: u32,
    },
    Uri {
        uri: String,
        width: u32,
        height: u32,
    },
}

fn default_latency_ms() -> u32 {
    200
}

impl SourceSpec {
    pub fn build(&self, factory: &SourceFactory) -> MixResult<MediaSource> {
        match self {
            SourceSpec::Test {
                width,
                height,
                pattern,
            } => factory.test(*width, *height, *pattern),
            SourceSpec::Raw {
                factory: element,
                width,
                height,
            } => factory.raw(element, *width, *height),
            SourceSpec::LivePush {
                codec,
                width,
                height,
            } => factory.live_push(*codec, *width, *height),
            SourceSpec::Rtsp {
                location,
                latency_ms,
                width,
                height,
            } => factory.rtsp(location, *latency_ms, *width, *height),
            SourceSpec::Uri { uri, width, height } => factory.uri(uri, *width, *height),
        }
    }
}

/// A compositor config, an optional layout and the sources to attach, in order.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SceneSpec {
    #[serde(default)]
    pub compositor: CompositorConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<Layout>,
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
}

impl SceneSpec {
    pub fn from_json_str(s: &str) -> MixResult<Self> {
        serde_json::from_str(s).map_err(|e| MixError::config(format!("parse scene JSON: {e}")))
    }

    pub fn from_json_file(path: &Path) -> MixResult<Self> {
        let f = File::open(path).with_context(|| format!("open scene '{}'", path.display()))?;
        serde_json::from_reader(BufReader::new(f))
            .map_err(|e| MixError::config(format!("parse scene '{}': {e}", path.display())))
    }

    pub fn validate(&self) -> MixResult<()> {
        self.compositor.validate()?;
        if let Some(layout) = &self.layout
            && layout.canvas() != self.compositor.canvas
        {
            return Err(MixError::validation(format!(
                "layout canvas {}x{} differs from compositor canvas {}x{}",
                layout.canvas().width,
                layout.canvas().height,
                self.compositor.canvas.width,
                self.compositor.canvas.height
            )));
        }
        Ok(())
    }

    /// Build a compositor on `engine`, attach every source in order, then set the layout.
    ///
    /// A missing rule for the final source count is not an error; the sources simply keep
    /// their default geometry.
    pub fn assemble(&self, engine: Arc<dyn Engine>) -> MixResult<Compositor> {
        self.validate()?;
        let mut compositor = Compositor::new(engine, self.compositor.clone())?;
        let factory = compositor.source_factory();
        for spec in &self.sources {
            let source = spec.build(&factory)?;
            compositor.attach_source(source)?;
        }
        if let Some(layout) = &self.layout {
            match compositor.set_layout(layout.clone()) {
                Err(err) if err.is_layout_resolution() => {
                    tracing::warn!(error = %err, "scene layout has no rule for its source count");
                }
                other => other?,
            }
        }
        Ok(compositor)
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
