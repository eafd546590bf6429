use std::fmt;

/// Output canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Create a canvas of `width` x `height` pixels.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Outcome of linking two pads, mirroring the engine's link return codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LinkStatus {
    /// Link succeeded.
    Ok,
    /// Pads have no common grandparent.
    WrongHierarchy,
    /// One of the pads was already linked.
    WasLinked,
    /// Pads have the wrong direction.
    WrongDirection,
    /// Pads do not have a common format.
    NoFormat,
    /// Pads cannot cooperate in scheduling.
    NoSched,
    /// Refused for some other reason.
    Refused,
}

impl LinkStatus {
    /// `true` when the link succeeded.
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

/// Orchestrator-visible pipeline state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PipelineState {
    /// Not running; engine resources released.
    #[default]
    Stopped,
    /// Prerolled, clock stopped.
    Paused,
    /// Media is flowing.
    Playing,
    /// Terminal: end-of-stream was signaled.
    EndOfStream,
}

/// State requested from the engine. End-of-stream is an event, not a state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EngineState {
    /// Release all resources.
    Null,
    /// Preroll and hold.
    Paused,
    /// Run.
    Playing,
}

impl From<EngineState> for PipelineState {
    fn from(value: EngineState) -> Self {
        match value {
            EngineState::Null => PipelineState::Stopped,
            EngineState::Paused => PipelineState::Paused,
            EngineState::Playing => PipelineState::Playing,
        }
    }
}

/// Set of framing edges, combinable with `|`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BorderEdges(u8);

impl BorderEdges {
    /// No edge.
    pub const NONE: Self = Self(0);
    /// Top edge.
    pub const TOP: Self = Self(1);
    /// Right edge.
    pub const RIGHT: Self = Self(1 << 1);
    /// Bottom edge.
    pub const BOTTOM: Self = Self(1 << 2);
    /// Left edge.
    pub const LEFT: Self = Self(1 << 3);
    /// Left and right.
    pub const HORIZONTAL: Self = Self(Self::LEFT.0 | Self::RIGHT.0);
    /// Top and bottom.
    pub const VERTICAL: Self = Self(Self::TOP.0 | Self::BOTTOM.0);
    /// All four edges.
    pub const ALL: Self = Self(Self::HORIZONTAL.0 | Self::VERTICAL.0);

    /// `true` when every edge of `other` is in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// `true` when no edge is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Framing property names for the edges in this set, in top/right/bottom/left order.
    pub fn property_names(self) -> impl Iterator<Item = &'static str> {
        [
            (Self::TOP, "top"),
            (Self::RIGHT, "right"),
            (Self::BOTTOM, "bottom"),
            (Self::LEFT, "left"),
        ]
        .into_iter()
        .filter(move |(edge, _)| self.contains(*edge))
        .map(|(_, name)| name)
    }
}

impl std::ops::BitOr for BorderEdges {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Stable identifier of a media source within one process.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct SourceId(pub u64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
