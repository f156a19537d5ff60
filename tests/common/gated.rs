//! Decoder whose listing and camera open block until the test releases them

use async_trait::async_trait;
use camscan::decoder::{Decoder, DecoderFactory, FrameStream, NoMediaDevices};
use camscan::{Result, ScanBackend, ScanResult, VideoDevice};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, watch};

/// A point the decoder parks at until [`Gate::open`] is called
pub struct Gate {
    open: watch::Sender<bool>,
    reached: Notify,
}

impl Gate {
    fn new(open: bool) -> Self {
        Self {
            open: watch::channel(open).0,
            reached: Notify::new(),
        }
    }

    pub fn open(&self) {
        self.open.send_replace(true);
    }

    /// Resolves once the decoder has arrived at this gate
    pub async fn reached(&self) {
        self.reached.notified().await;
    }

    async fn pass(&self) {
        self.reached.notify_one();
        let mut rx = self.open.subscribe();
        let _ = rx.wait_for(|open| *open).await;
    }
}

pub struct GatedState {
    devices: Vec<VideoDevice>,
    pub listing: Gate,
    pub opening: Gate,
    queued: Mutex<Vec<ScanResult>>,
    opened: Mutex<Vec<String>>,
    resets: AtomicUsize,
}

/// Backend with a single shared decoder handle
#[derive(Clone)]
pub struct Gated {
    state: Arc<GatedState>,
}

impl Gated {
    /// Both gates start open; close one with [`Gated::hold_listing`] or [`Gated::hold_opening`].
    pub fn new(devices: Vec<VideoDevice>) -> Self {
        Self {
            state: Arc::new(GatedState {
                devices,
                listing: Gate::new(true),
                opening: Gate::new(true),
                queued: Mutex::new(Vec::new()),
                opened: Mutex::new(Vec::new()),
                resets: AtomicUsize::new(0),
            }),
        }
    }

    pub fn hold_listing(self) -> Self {
        self.state.listing.open.send_replace(false);
        self
    }

    pub fn hold_opening(self) -> Self {
        self.state.opening.open.send_replace(false);
        self
    }

    /// Results already sitting in the stream when the camera opens
    pub fn with_queued(self, text: &str) -> Self {
        self.state.queued.lock().unwrap().push(ScanResult::new(text));
        self
    }

    pub fn listing(&self) -> &Gate {
        &self.state.listing
    }

    pub fn opening(&self) -> &Gate {
        &self.state.opening
    }

    pub fn opened(&self) -> Vec<String> {
        self.state.opened.lock().unwrap().clone()
    }

    pub fn resets(&self) -> usize {
        self.state.resets.load(Ordering::SeqCst)
    }

    pub fn backend(&self) -> ScanBackend {
        ScanBackend::new(Arc::new(self.clone()), Arc::new(NoMediaDevices))
    }
}

impl DecoderFactory for Gated {
    fn create(&self) -> Result<Arc<dyn Decoder>> {
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl Decoder for Gated {
    async fn list_video_input_devices(&self) -> Result<Vec<VideoDevice>> {
        self.state.listing.pass().await;
        Ok(self.state.devices.clone())
    }

    async fn decode_from_video_device(&self, device_id: &str, _target: &str) -> Result<FrameStream> {
        self.state.opening.pass().await;
        self.state.opened.lock().unwrap().push(device_id.to_string());

        let (tx, stream) = FrameStream::channel();
        let queued: Vec<ScanResult> = self.state.queued.lock().unwrap().drain(..).collect();
        for result in queued {
            tx.send(Ok(result)).await;
        }
        // The sender is dropped here; queued results stay readable.
        Ok(stream)
    }

    fn reset(&self) {
        self.state.resets.fetch_add(1, Ordering::SeqCst);
    }
}
