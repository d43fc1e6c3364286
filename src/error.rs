//! Error types shared by extraction, diffing and export

use serde::{Deserialize, Serialize};

/// Machine-readable error code carried on the worker protocol
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    EmptyText,
    TooLarge,
    TooDissimilar,
}

impl ErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EmptyText => "EMPTY_TEXT",
            Self::TooLarge => "TOO_LARGE",
            Self::TooDissimilar => "TOO_DISSIMILAR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from a comparison run
#[derive(Debug, thiserror::Error)]
pub enum CompareError {
    /// One of the documents has no extractable text
    #[error("{message}")]
    EmptyText { message: String },

    /// The documents share too little text to be worth aligning
    #[error("{message}")]
    TooDissimilar { message: String },

    /// The worker reported a failure without a known code
    #[error("diff worker: {message}")]
    Worker { message: String },

    /// The worker thread went away mid-run
    #[error("diff worker disconnected")]
    Disconnected,

    #[error("comparison cancelled")]
    Cancelled,

    #[error("extraction: {detail}")]
    Extraction { detail: String },

    #[cfg(feature = "pdf")]
    #[error("PDF engine: {0}")]
    Pdf(#[from] mupdf::error::Error),

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("PNG encoding: {0}")]
    Png(#[from] png::EncodingError),
}

impl CompareError {
    pub fn extraction(detail: impl Into<String>) -> Self {
        Self::Extraction {
            detail: detail.into(),
        }
    }

    /// Rebuild an error from a worker `error` message
    pub fn from_worker(message: impl Into<String>, code: Option<ErrorCode>) -> Self {
        let message = message.into();
        match code {
            Some(ErrorCode::EmptyText) => Self::EmptyText { message },
            Some(ErrorCode::TooDissimilar) => Self::TooDissimilar { message },
            Some(ErrorCode::TooLarge) | None => Self::Worker { message },
        }
    }

    #[must_use]
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::EmptyText { .. } => Some(ErrorCode::EmptyText),
            Self::TooDissimilar { .. } => Some(ErrorCode::TooDissimilar),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type Result<T, E = CompareError> = std::result::Result<T, E>;
