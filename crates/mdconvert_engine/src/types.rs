use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Client-side task identifier; mirrors the tracker's id.
pub type TaskId = u64;

pub const STATE_SUCCESS: &str = "SUCCESS";
pub const STATE_FAILURE: &str = "FAILURE";

/// Answer of the upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SubmitReceipt {
    pub id: String,
    #[serde(default)]
    pub message: String,
}

/// Answer of the status endpoint, as sent by the backend.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RemoteStatus {
    pub state: String,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl RemoteStatus {
    pub fn is_terminal(&self) -> bool {
        self.state == STATE_SUCCESS || self.state == STATE_FAILURE
    }

    /// Progress as a whole percentage in `0..=100`.
    pub fn percent(&self) -> u8 {
        if self.progress.is_nan() {
            return 0;
        }
        self.progress.round().clamp(0.0, 100.0) as u8
    }
}

pub type BatchStatus = HashMap<String, RemoteStatus>;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MarkdownPreview {
    pub content: String,
    #[serde(default)]
    pub filename: String,
}

/// A file to upload. Content is read from `path` at submission time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Submitted {
        task_id: TaskId,
        result: Result<SubmitReceipt, ApiError>,
    },
    Polled {
        task_id: TaskId,
        result: Result<RemoteStatus, ApiError>,
    },
    BatchPolled {
        result: Result<BatchStatus, ApiError>,
    },
    HistoryCleared {
        result: Result<(), ApiError>,
    },
    PreviewFetched {
        task_id: TaskId,
        result: Result<MarkdownPreview, ApiError>,
    },
    Downloaded {
        task_id: TaskId,
        result: Result<PathBuf, ApiError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
}

impl ApiError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            // Backend messages are meant for the user as they are.
            FailureKind::HttpStatus(_) => write!(f, "{}", self.message),
            _ => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for ApiError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Decode,
    SourceUnavailable,
    Storage,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Decode => write!(f, "unexpected response body"),
            FailureKind::SourceUnavailable => write!(f, "source file unavailable"),
            FailureKind::Storage => write!(f, "storage error"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}
