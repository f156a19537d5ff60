//! Decoding backends
//!
//! A backend supplies two capabilities: a [`Decoder`] that lists cameras and
//! turns a camera's frames into a stream of decode outcomes, and a
//! [`MediaDeviceProvider`] used as the fallback device enumeration.

mod frame;

#[cfg(feature = "camera")]
#[cfg_attr(docsrs, doc(cfg(feature = "camera")))]
pub mod live;

pub use frame::FrameDecoder;

use crate::device::{MediaDevice, VideoDevice};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Capacity of the per-session frame outcome channel
pub const FRAME_CHANNEL_CAPACITY: usize = 16;

/// Text decoded from a single frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Decoded barcode contents
    pub text: String,
}

impl ScanResult {
    /// Wrap decoded text
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Outcome of one frame attempt. `Err(Error::NoCodeInFrame)` is the normal
/// result for frames without a visible barcode.
pub type FrameOutcome = Result<ScanResult>;

/// Receiving half of a decode loop
pub struct FrameStream {
    rx: mpsc::Receiver<FrameOutcome>,
}

impl FrameStream {
    /// Create a connected sender/stream pair
    pub fn channel() -> (FrameSender, FrameStream) {
        let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        (FrameSender { tx }, FrameStream { rx })
    }

    /// Wait for the next frame outcome. `None` once the decoder has been reset.
    pub async fn next(&mut self) -> Option<FrameOutcome> {
        self.rx.recv().await
    }
}

/// Sending half of a decode loop, owned by the backend's capture task
#[derive(Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<FrameOutcome>,
}

impl FrameSender {
    /// Deliver an outcome; returns `false` once the consumer went away
    pub async fn send(&self, outcome: FrameOutcome) -> bool {
        self.tx.send(outcome).await.is_ok()
    }

    /// Blocking variant of [`FrameSender::send`] for capture threads
    pub fn blocking_send(&self, outcome: FrameOutcome) -> bool {
        self.tx.blocking_send(outcome).is_ok()
    }

    /// True once the stream has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A decoder handle bound to one scan session
#[async_trait]
pub trait Decoder: Send + Sync {
    /// Video input devices the decoder can open
    async fn list_video_input_devices(&self) -> Result<Vec<VideoDevice>>;

    /// Start the continuous decode loop on `device_id`, rendering preview to `target`
    async fn decode_from_video_device(&self, device_id: &str, target: &str)
    -> Result<FrameStream>;

    /// Stop the decode loop and release the camera
    fn reset(&self);
}

/// Builds a fresh [`Decoder`] for every scan session
pub trait DecoderFactory: Send + Sync {
    /// Construct a decoder, failing with [`Error::DecoderUnavailable`] when the backend is missing
    fn create(&self) -> Result<Arc<dyn Decoder>>;
}

/// Generic platform device enumeration
#[async_trait]
pub trait MediaDeviceProvider: Send + Sync {
    /// Every media device the platform knows about
    async fn enumerate_devices(&self) -> Result<Vec<MediaDevice>>;
}

/// Media provider for platforms without generic enumeration
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMediaDevices;

#[async_trait]
impl MediaDeviceProvider for NoMediaDevices {
    async fn enumerate_devices(&self) -> Result<Vec<MediaDevice>> {
        Ok(Vec::new())
    }
}

/// The collaborators a scanner needs from its environment
#[derive(Clone)]
pub struct ScanBackend {
    /// Decoder source; `None` when no decoding library is available
    pub decoders: Option<Arc<dyn DecoderFactory>>,
    /// Fallback device enumeration
    pub media: Arc<dyn MediaDeviceProvider>,
}

impl ScanBackend {
    /// Backend with both capabilities present
    pub fn new(decoders: Arc<dyn DecoderFactory>, media: Arc<dyn MediaDeviceProvider>) -> Self {
        Self {
            decoders: Some(decoders),
            media,
        }
    }

    /// Backend lacking a decoder; every `start` fails with [`Error::DecoderUnavailable`]
    pub fn without_decoder(media: Arc<dyn MediaDeviceProvider>) -> Self {
        Self {
            decoders: None,
            media,
        }
    }

    /// Build a decoder for a new session
    pub fn create_decoder(&self) -> Result<Arc<dyn Decoder>> {
        self.decoders
            .as_ref()
            .ok_or(Error::DecoderUnavailable)?
            .create()
    }

    /// Live V4L2 backend
    #[cfg(feature = "camera")]
    pub fn v4l(config: crate::camera::CameraConfig) -> Self {
        Self::new(
            Arc::new(live::V4lDecoderFactory::new(config)),
            Arc::new(live::V4lMediaDevices),
        )
    }
}
