//! Live backend: V4L2 capture feeding the frame decoder

use crate::camera::{self, Camera, CameraConfig};
use crate::decoder::{
    Decoder, DecoderFactory, FrameDecoder, FrameSender, FrameStream, MediaDeviceProvider,
    ScanResult,
};
use crate::device::{MediaDevice, VideoDevice};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Creates [`V4lDecoder`]s sharing one capture configuration
#[derive(Debug, Clone)]
pub struct V4lDecoderFactory {
    config: CameraConfig,
}

impl V4lDecoderFactory {
    /// Factory opening cameras with `config`
    pub fn new(config: CameraConfig) -> Self {
        Self { config }
    }
}

impl DecoderFactory for V4lDecoderFactory {
    fn create(&self) -> Result<Arc<dyn Decoder>> {
        Ok(Arc::new(V4lDecoder::new(self.config.clone())))
    }
}

/// Decoder handle owning at most one capture thread
pub struct V4lDecoder {
    config: CameraConfig,
    running: Mutex<Option<Arc<AtomicBool>>>,
}

impl V4lDecoder {
    /// Decoder that has not opened a camera yet
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            running: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Decoder for V4lDecoder {
    async fn list_video_input_devices(&self) -> Result<Vec<VideoDevice>> {
        let devices = tokio::task::spawn_blocking(camera::list_devices)
            .await
            .map_err(|e| Error::Other(format!("device listing task failed: {e}")))??;
        Ok(devices.iter().map(VideoDevice::from).collect())
    }

    async fn decode_from_video_device(
        &self,
        device_id: &str,
        target: &str,
    ) -> Result<FrameStream> {
        // One capture thread per handle.
        self.reset();

        let path = device_id.to_string();
        let config = self.config.clone();
        let camera = tokio::task::spawn_blocking(move || {
            let info = camera::find_device_by_path(&path)?;
            Camera::open(info, config)
        })
        .await
        .map_err(|e| Error::Other(format!("camera open task failed: {e}")))??;

        tracing::info!(device = %device_id, %target, "decode loop started");

        let (tx, stream) = FrameStream::channel();
        let running = Arc::new(AtomicBool::new(true));
        if let Ok(mut slot) = self.running.lock() {
            *slot = Some(Arc::clone(&running));
        }

        let idle = Duration::from_millis(self.config.idle_interval_ms);
        tokio::task::spawn_blocking(move || capture_loop(camera, tx, running, idle));

        Ok(stream)
    }

    fn reset(&self) {
        if let Ok(mut slot) = self.running.lock() {
            if let Some(flag) = slot.take() {
                flag.store(false, Ordering::SeqCst);
                tracing::debug!("capture loop signalled to stop");
            }
        }
    }
}

impl Drop for V4lDecoder {
    fn drop(&mut self) {
        self.reset();
    }
}

/// Consecutive capture failures after which the device is treated as gone
const MAX_CAPTURE_FAILURES: u32 = 5;

fn capture_loop(mut camera: Camera, tx: FrameSender, running: Arc<AtomicBool>, idle: Duration) {
    let decoder = FrameDecoder::new();
    let device = camera.info().path.clone();

    pump_frames(
        || {
            camera
                .capture_frame()
                .and_then(|frame| decoder.decode(&frame))
        },
        &tx,
        &running,
        idle,
    );

    tracing::debug!(%device, "capture loop finished, releasing camera");
}

/// Forward frame outcomes until the flag drops, the stream closes or the
/// camera keeps failing. Sleeps `idle` after every unsuccessful frame.
fn pump_frames<F>(mut next_frame: F, tx: &FrameSender, running: &AtomicBool, idle: Duration)
where
    F: FnMut() -> Result<ScanResult>,
{
    let mut capture_failures = 0;

    while running.load(Ordering::SeqCst) && !tx.is_closed() {
        let outcome = next_frame();
        match &outcome {
            Err(Error::FrameCapture(_)) => capture_failures += 1,
            _ => capture_failures = 0,
        }
        let failed = outcome.is_err();

        if !tx.blocking_send(outcome) {
            break;
        }
        if capture_failures >= MAX_CAPTURE_FAILURES {
            tracing::error!(
                failures = capture_failures,
                "camera stopped delivering frames, ending capture"
            );
            break;
        }
        if failed {
            std::thread::sleep(idle);
        }
    }
}

/// Generic enumeration over every V4L2 node
#[derive(Debug, Default, Clone, Copy)]
pub struct V4lMediaDevices;

#[async_trait]
impl MediaDeviceProvider for V4lMediaDevices {
    async fn enumerate_devices(&self) -> Result<Vec<MediaDevice>> {
        tokio::task::spawn_blocking(camera::media_devices)
            .await
            .map_err(|e| Error::Other(format!("device enumeration task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::FrameOutcome;

    async fn drain(mut stream: FrameStream) -> Vec<FrameOutcome> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = stream.next().await {
            outcomes.push(outcome);
        }
        outcomes
    }

    #[tokio::test]
    async fn test_dead_camera_ends_capture() {
        let (tx, stream) = FrameStream::channel();
        let running = Arc::new(AtomicBool::new(true));
        let attempts = Arc::new(std::sync::atomic::AtomicU32::new(0));

        let counter = Arc::clone(&attempts);
        let pump = tokio::task::spawn_blocking(move || {
            pump_frames(
                || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(Error::FrameCapture("No such device".to_string()))
                },
                &tx,
                &running,
                Duration::from_millis(1),
            )
        });

        let outcomes = drain(stream).await;
        pump.await.expect("pump thread");

        assert_eq!(outcomes.len(), MAX_CAPTURE_FAILURES as usize);
        assert!(
            outcomes
                .iter()
                .all(|o| matches!(o, Err(Error::FrameCapture(_))))
        );
        assert_eq!(attempts.load(Ordering::SeqCst), MAX_CAPTURE_FAILURES);
    }

    #[tokio::test]
    async fn test_failures_pause_between_frames() {
        let (tx, stream) = FrameStream::channel();
        let running = Arc::new(AtomicBool::new(true));
        let idle = Duration::from_millis(20);

        let started = std::time::Instant::now();
        let pump = tokio::task::spawn_blocking(move || {
            pump_frames(
                || Err(Error::FrameCapture("timeout".to_string())),
                &tx,
                &running,
                idle,
            )
        });
        drain(stream).await;
        pump.await.expect("pump thread");

        // One pause after each failure except the last.
        assert!(started.elapsed() >= idle * (MAX_CAPTURE_FAILURES - 1));
    }

    #[tokio::test]
    async fn test_recovered_capture_resets_failure_count() {
        let (tx, stream) = FrameStream::channel();
        let running = Arc::new(AtomicBool::new(true));

        let mut frame = 0;
        let pump = tokio::task::spawn_blocking(move || {
            pump_frames(
                || {
                    frame += 1;
                    match frame {
                        4 => Err(Error::NoCodeInFrame),
                        9 => Ok(ScanResult::new("4006381333931")),
                        _ => Err(Error::FrameCapture("busy".to_string())),
                    }
                },
                &tx,
                &running,
                Duration::from_millis(1),
            )
        });

        let outcomes = drain(stream).await;
        pump.await.expect("pump thread");

        // 3 failures, a miss, 4 failures, the barcode, then 5 failures.
        assert_eq!(outcomes.len(), 14);
        assert!(matches!(&outcomes[8], Ok(r) if r.text == "4006381333931"));
    }

    #[tokio::test]
    async fn test_cleared_flag_stops_pump() {
        let (tx, stream) = FrameStream::channel();
        let running = Arc::new(AtomicBool::new(true));

        let flag = Arc::clone(&running);
        let pump = tokio::task::spawn_blocking(move || {
            pump_frames(
                || {
                    flag.store(false, Ordering::SeqCst);
                    Err(Error::NoCodeInFrame)
                },
                &tx,
                &running,
                Duration::from_millis(1),
            )
        });

        let outcomes = drain(stream).await;
        pump.await.expect("pump thread");
        assert_eq!(outcomes.len(), 1);
    }
}
