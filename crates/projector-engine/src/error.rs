use thiserror::Error;

/// Failures surfaced by the field registry, the scene store and the renderers.
///
/// Everything except [`OverlayError::RenderBackend`] is recoverable and is
/// returned to the caller as a plain value. The frame loop logs and moves on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OverlayError {
    /// Degenerate or wrongly wound field corner set.
    #[error("invalid field geometry: {0}")]
    InvalidGeometry(String),

    /// Unknown field, entity or drawing id.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// Conversion requested between frames that are not both registered.
    #[error("no transform from '{from}' to '{to}'")]
    TransformUnavailable { from: String, to: String },

    /// Backend could not acquire a display surface or graphics context.
    #[error("render backend failure: {0}")]
    RenderBackend(String),

    /// A single draw call was rejected; the frame continues.
    #[error("draw skipped: {0}")]
    RenderSkipped(String),

    /// Request arguments could not be decoded or violate a precondition.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Mutations are no longer accepted.
    #[error("overlay is shutting down")]
    ShuttingDown,
}

impl OverlayError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }

    pub fn transform_unavailable(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::TransformUnavailable { from: from.into(), to: to.into() }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::RenderSkipped(reason.into())
    }

    /// Only backend initialization failures abort the process.
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RenderBackend(_))
    }

    /// Short machine-readable tag used by the command surface.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidGeometry(_) => "invalid_geometry",
            Self::NotFound { .. } => "not_found",
            Self::TransformUnavailable { .. } => "transform_unavailable",
            Self::RenderBackend(_) => "render_backend",
            Self::RenderSkipped(_) => "render_skipped",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::ShuttingDown => "shutting_down",
        }
    }
}

pub type Result<T> = std::result::Result<T, OverlayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_backend_errors_are_fatal() {
        assert!(OverlayError::RenderBackend("no adapter".into()).is_fatal());
        assert!(!OverlayError::skipped("nan radius").is_fatal());
        assert!(!OverlayError::not_found("entity", "r1").is_fatal());
        assert!(!OverlayError::InvalidGeometry("collinear".into()).is_fatal());
    }

    #[test]
    fn display_names_the_missing_item() {
        let e = OverlayError::not_found("field", "table");
        assert_eq!(e.to_string(), "field 'table' not found");
        assert_eq!(e.code(), "not_found");
    }
}
