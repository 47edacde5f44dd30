//! Error types shared by every stage of a vision request.

use thiserror::Error;

/// Everything that can go wrong between picking an image and drawing its overlay.
#[derive(Error, Debug)]
pub enum VisionError {
    /// Natural or displayed dimensions are zero or not yet known
    #[error(
        "Degenerate geometry: natural {natural_width}x{natural_height}, displayed {displayed_width}x{displayed_height}"
    )]
    DegenerateGeometry {
        natural_width: f32,
        natural_height: f32,
        displayed_width: f32,
        displayed_height: f32,
    },

    /// Reply body could not be parsed or lacks the expected structure
    #[error("Malformed response: {message}")]
    MalformedResponse {
        /// Description of what was wrong with the body
        message: String,
    },

    /// Reply was valid but held no annotations of the requested kind
    #[error("No {kind} found")]
    NoAnnotationsFound {
        /// Annotation kind that was expected
        kind: String,
    },

    /// Network failure or non-success HTTP status
    #[error("{message}")]
    Transport {
        /// HTTP status code, if a response arrived at all
        status: Option<u16>,
        /// Human readable detail, `<status>:<reason>` for HTTP failures
        message: String,
    },

    /// Input rejected before anything was sent
    #[error("{0}")]
    InvalidUserInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl VisionError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    pub fn no_annotations(kind: impl Into<String>) -> Self {
        Self::NoAnnotationsFound { kind: kind.into() }
    }

    /// Transport failure for a reply that carried a non-success status.
    pub fn http_status(status: u16, reason: &str) -> Self {
        Self::Transport {
            status: Some(status),
            message: format!("{status}:{reason}"),
        }
    }

    /// Transport failure where no reply arrived.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidUserInput(message.into())
    }

    /// HTTP status code carried by a transport failure.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, VisionError>;
