//! Error types for capture, upload and the recorder lifecycle

use thiserror::Error;

/// Failure while opening or running the input stream
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Microphone access was denied")]
    PermissionDenied,

    #[error("No usable input device: {0}")]
    DeviceUnavailable(String),

    #[error("Input stream failed: {0}")]
    Stream(String),
}

/// Failure while sending an artifact to the backend
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("Server rejected upload with status {0}")]
    Status(u16),

    #[error("Upload failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for UploadError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => UploadError::Status(status.as_u16()),
            None => UploadError::Transport(e.to_string()),
        }
    }
}

/// Errors surfaced by the recorder controller
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("Microphone access was denied. Allow access and try again.")]
    PermissionDenied,

    #[error("No microphone available: {0}")]
    DeviceUnavailable(String),

    #[error("A recording session is already active")]
    Busy,

    #[error("Could not prepare recording: {0}")]
    Artifact(#[from] std::io::Error),

    #[error("Upload failed, record again to retry: {0}")]
    UploadFailed(#[from] UploadError),
}

impl From<CaptureError> for RecorderError {
    fn from(e: CaptureError) -> Self {
        match e {
            CaptureError::PermissionDenied => RecorderError::PermissionDenied,
            CaptureError::DeviceUnavailable(reason) | CaptureError::Stream(reason) => {
                RecorderError::DeviceUnavailable(reason)
            }
        }
    }
}
