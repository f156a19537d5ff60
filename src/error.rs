//! Error types for camscan operations

use thiserror::Error;

/// Result type alias using camscan's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Fallback text shown when a setup failure carries no message of its own
pub const DEFAULT_START_FAILURE: &str = "Camera could not be started.";

/// Main error type for camscan operations
#[derive(Error, Debug)]
pub enum Error {
    /// No decoding backend is configured or it cannot be constructed
    #[error("Barcode decoder is not available")]
    DecoderUnavailable,

    /// Device enumeration (including the fallback) produced no cameras
    #[error("No camera found")]
    NoCameraFound,

    /// The platform refused camera access
    #[error("Camera permission denied")]
    PermissionDenied,

    /// The platform reported the requested camera as missing
    #[error("Camera device not found: {0}")]
    CameraNotFound(String),

    /// Camera-related errors
    #[error("{0}")]
    Camera(String),

    /// Failed to capture frame from camera
    #[error("Frame capture failed: {0}")]
    FrameCapture(String),

    /// No barcode visible in the sampled frame
    #[error("No barcode found in frame")]
    NoCodeInFrame,

    /// A barcode was detected but could not be decoded
    #[error("Failed to decode barcode: {0}")]
    Decode(String),

    /// `start` was called while a scan is starting or active
    #[error("Scanner is already running")]
    AlreadyScanning,

    /// `stop` was called while `start` was still setting up
    #[error("Scan start was cancelled")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image processing error
    #[error("Image processing error: {0}")]
    Image(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map an I/O error raised while touching a camera node onto the scanner's error kinds.
    pub fn from_camera_io(context: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Error::PermissionDenied,
            std::io::ErrorKind::NotFound => Error::CameraNotFound(context.to_string()),
            _ => Error::Camera(format!("{context}: {err}")),
        }
    }

    /// Message presented to the user when `start` fails.
    pub fn user_message(&self) -> String {
        match self {
            Error::PermissionDenied => {
                "Camera permission denied. Please allow camera access in your settings."
                    .to_string()
            }
            Error::CameraNotFound(_) => "Camera not found.".to_string(),
            Error::NoCameraFound => "No camera found.".to_string(),
            Error::DecoderUnavailable => "Barcode decoder is not available.".to_string(),
            other => {
                let message = other.to_string();
                if message.trim().is_empty() {
                    DEFAULT_START_FAILURE.to_string()
                } else {
                    message
                }
            }
        }
    }
}

/// Error as reported by a platform camera API, identified by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformError {
    /// Error identity, e.g. `NotAllowedError`
    pub name: String,
    /// Free-form message supplied by the platform
    pub message: String,
}

impl PlatformError {
    /// Build a platform error from its name and message
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl From<PlatformError> for Error {
    fn from(err: PlatformError) -> Self {
        match err.name.as_str() {
            "NotAllowedError" => Error::PermissionDenied,
            "NotFoundError" => Error::CameraNotFound(err.message),
            _ => Error::Camera(err.message),
        }
    }
}

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        Error::Image(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Other(format!("JSON error: {}", e))
    }
}
