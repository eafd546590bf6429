use crate::foundation::core::LinkStatus;

/// Convenience result type used across livemix.
pub type MixResult<T> = Result<T, MixError>;

/// Error taxonomy for graph assembly and pipeline lifecycle.
#[derive(thiserror::Error, Debug)]
pub enum MixError {
    /// The engine refused to create or configure a node.
    #[error("construction error: {0}")]
    Construction(String),

    /// The engine refused an add/remove/link on the graph.
    #[error("graph mutation error: {0}")]
    GraphMutation(String),

    /// No layout rule is registered for the current source count.
    #[error("layout resolution error: no matching rule for {count} input sources")]
    LayoutResolution {
        /// Number of sources the resolution was attempted for.
        count: usize,
    },

    /// A mixing port link returned a non-ok status.
    #[error("link refused: {context} ({status:?})")]
    LinkRefusal {
        /// What was being linked.
        context: String,
        /// Status reported by the engine.
        status: LinkStatus,
    },

    /// A state transition or end-of-stream signal was refused.
    #[error("lifecycle error: {0}")]
    Lifecycle(String),

    /// A buffer could not be injected into a live source.
    #[error("push error: {0}")]
    Push(String),

    /// Invalid caller-provided data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Virtual display bootstrap failure.
    #[error("display error: {0}")]
    Display(String),

    /// Something already answers on the display the launcher was asked to start.
    #[error("display error: {display} is already running")]
    DisplayAlreadyRunning {
        /// Display name, e.g. `:99`.
        display: String,
    },

    /// Errors while loading or parsing configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MixError {
    /// Build a [`MixError::Construction`] value.
    pub fn construction(msg: impl Into<String>) -> Self {
        Self::Construction(msg.into())
    }

    /// Build a [`MixError::GraphMutation`] value.
    pub fn graph(msg: impl Into<String>) -> Self {
        Self::GraphMutation(msg.into())
    }

    /// Build a [`MixError::LinkRefusal`] value.
    pub fn link_refused(context: impl Into<String>, status: LinkStatus) -> Self {
        Self::LinkRefusal {
            context: context.into(),
            status,
        }
    }

    /// Build a [`MixError::Lifecycle`] value.
    pub fn lifecycle(msg: impl Into<String>) -> Self {
        Self::Lifecycle(msg.into())
    }

    /// Build a [`MixError::Push`] value.
    pub fn push(msg: impl Into<String>) -> Self {
        Self::Push(msg.into())
    }

    /// Build a [`MixError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`MixError::Display`] value.
    pub fn display(msg: impl Into<String>) -> Self {
        Self::Display(msg.into())
    }

    /// Build a [`MixError::DisplayAlreadyRunning`] value.
    pub fn display_already_running(display: impl Into<String>) -> Self {
        Self::DisplayAlreadyRunning {
            display: display.into(),
        }
    }

    /// Build a [`MixError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// `true` for failures the caller may treat as non-fatal (layout skipped for this count).
    pub fn is_layout_resolution(&self) -> bool {
        matches!(self, Self::LayoutResolution { .. })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
