//! Scripted backend replaying prerecorded frame outcomes
//!
//! Script format, one directive per line (`#` starts a comment):
//!
//! ```text
//! device front Front Camera
//! device back  Back Camera
//! miss
//! error glare on lens
//! code 4006381333931
//! ```
//!
//! Additional directives shape the setup path:
//!
//! - `interval <ms>`: pause before each frame (default 100)
//! - `list-fails`: the decoder cannot list devices, forcing the media fallback
//! - `media <kind> <id> <label>`: device returned by the fallback enumeration
//! - `start-fails <ErrorName> <message>`: opening the camera raises a platform error

use crate::decoder::{Decoder, DecoderFactory, FrameStream, MediaDeviceProvider, ScanResult};
use crate::device::{DeviceKind, MediaDevice, VideoDevice};
use crate::error::{Error, PlatformError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// One scripted frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedFrame {
    /// A barcode is decoded
    Code(String),
    /// Nothing visible in the frame
    Miss,
    /// The decoder reports a non-fatal error
    Error(String),
}

/// A parsed replay script
#[derive(Debug, Clone)]
pub struct ReplayScript {
    /// Devices the decoder lists
    pub devices: Vec<VideoDevice>,
    /// Devices the fallback enumeration returns
    pub media: Vec<MediaDevice>,
    /// Whether the decoder's own device listing fails
    pub list_fails: bool,
    /// Error raised when the decode loop is started
    pub start_error: Option<PlatformError>,
    /// Frames replayed in order after the loop starts
    pub frames: Vec<ScriptedFrame>,
    /// Pause before each frame
    pub interval: Duration,
}

impl Default for ReplayScript {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            media: Vec::new(),
            list_fails: false,
            start_error: None,
            frames: Vec::new(),
            interval: Duration::from_millis(100),
        }
    }
}

impl ReplayScript {
    /// Load a script file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read script {}: {e}", path.display()))
        })?;
        Self::parse(&contents)
    }

    /// Parse script text
    pub fn parse(contents: &str) -> Result<Self> {
        let mut script = Self::default();

        for (lineno, raw) in contents.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let (directive, rest) = split_word(line);
            let bad = |what: &str| Error::Config(format!("line {}: {what}", lineno + 1));

            match directive {
                "device" => {
                    let (id, label) = split_word(rest);
                    if id.is_empty() {
                        return Err(bad("device needs an id"));
                    }
                    script.devices.push(VideoDevice::new(id, label));
                }
                "media" => {
                    let (kind, rest) = split_word(rest);
                    let (id, label) = split_word(rest);
                    let kind = parse_kind(kind).ok_or_else(|| bad("unknown media kind"))?;
                    if id.is_empty() {
                        return Err(bad("media needs an id"));
                    }
                    script.media.push(MediaDevice {
                        id: id.to_string(),
                        label: label.to_string(),
                        kind,
                    });
                }
                "interval" => {
                    let ms = rest
                        .parse::<u64>()
                        .map_err(|_| bad("interval expects milliseconds"))?;
                    script.interval = Duration::from_millis(ms);
                }
                "list-fails" => script.list_fails = true,
                "start-fails" => {
                    let (name, message) = split_word(rest);
                    if name.is_empty() {
                        return Err(bad("start-fails needs an error name"));
                    }
                    script.start_error = Some(PlatformError::new(name, message));
                }
                "code" => {
                    if rest.is_empty() {
                        return Err(bad("code needs a value"));
                    }
                    script.frames.push(ScriptedFrame::Code(rest.to_string()));
                }
                "miss" => script.frames.push(ScriptedFrame::Miss),
                "error" => script.frames.push(ScriptedFrame::Error(rest.to_string())),
                other => return Err(bad(&format!("unknown directive '{other}'"))),
            }
        }

        Ok(script)
    }
}

fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim();
    match s.split_once(char::is_whitespace) {
        Some((head, tail)) => (head, tail.trim()),
        None => (s, ""),
    }
}

fn parse_kind(value: &str) -> Option<DeviceKind> {
    match value.to_ascii_lowercase().as_str() {
        "videoinput" | "video" => Some(DeviceKind::VideoInput),
        "audioinput" | "audio" => Some(DeviceKind::AudioInput),
        "audiooutput" => Some(DeviceKind::AudioOutput),
        "other" => Some(DeviceKind::Other),
        _ => None,
    }
}

#[derive(Debug, Default)]
struct ReplayLog {
    decoders_created: usize,
    started: Vec<(String, String)>,
    resets: usize,
}

/// Shared state between a [`Replay`] and the decoders it hands out
struct Shared {
    script: ReplayScript,
    log: Mutex<ReplayLog>,
}

impl Shared {
    fn log(&self) -> std::sync::MutexGuard<'_, ReplayLog> {
        self.log.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Scripted backend; acts as both decoder factory and media provider
#[derive(Clone)]
pub struct Replay {
    shared: Arc<Shared>,
}

impl Replay {
    /// Backend replaying `script`
    pub fn new(script: ReplayScript) -> Self {
        Self {
            shared: Arc::new(Shared {
                script,
                log: Mutex::new(ReplayLog::default()),
            }),
        }
    }

    /// Load a script file into a backend
    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::new(ReplayScript::from_file(path)?))
    }

    /// Scanner backend built from this replay
    pub fn backend(&self) -> crate::decoder::ScanBackend {
        crate::decoder::ScanBackend::new(Arc::new(self.clone()), Arc::new(self.clone()))
    }

    /// Device ids passed to `decode_from_video_device`, in order
    pub fn started_devices(&self) -> Vec<String> {
        self.shared
            .log()
            .started
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Preview targets passed to `decode_from_video_device`, in order
    pub fn preview_targets(&self) -> Vec<String> {
        self.shared
            .log()
            .started
            .iter()
            .map(|(_, target)| target.clone())
            .collect()
    }

    /// Number of decoder handles handed out
    pub fn decoders_created(&self) -> usize {
        self.shared.log().decoders_created
    }

    /// Number of `reset` calls that released a running loop
    pub fn resets(&self) -> usize {
        self.shared.log().resets
    }
}

impl DecoderFactory for Replay {
    fn create(&self) -> Result<Arc<dyn Decoder>> {
        self.shared.log().decoders_created += 1;
        Ok(Arc::new(ReplayDecoder {
            shared: Arc::clone(&self.shared),
            feeder: Mutex::new(None),
        }))
    }
}

#[async_trait]
impl MediaDeviceProvider for Replay {
    async fn enumerate_devices(&self) -> Result<Vec<MediaDevice>> {
        Ok(self.shared.script.media.clone())
    }
}

/// Decoder handle feeding scripted frames from a background task
pub struct ReplayDecoder {
    shared: Arc<Shared>,
    feeder: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl Decoder for ReplayDecoder {
    async fn list_video_input_devices(&self) -> Result<Vec<VideoDevice>> {
        if self.shared.script.list_fails {
            return Err(Error::Camera(
                "device listing is not supported by this decoder".to_string(),
            ));
        }
        Ok(self.shared.script.devices.clone())
    }

    async fn decode_from_video_device(
        &self,
        device_id: &str,
        target: &str,
    ) -> Result<FrameStream> {
        let script = &self.shared.script;
        if let Some(err) = &script.start_error {
            return Err(err.clone().into());
        }

        self.shared
            .log()
            .started
            .push((device_id.to_string(), target.to_string()));

        let (tx, stream) = FrameStream::channel();
        let frames = script.frames.clone();
        let interval = script.interval;

        let feeder = tokio::spawn(async move {
            for frame in frames {
                tokio::time::sleep(interval).await;
                let outcome = match frame {
                    ScriptedFrame::Code(text) => Ok(ScanResult::new(text)),
                    ScriptedFrame::Miss => Err(Error::NoCodeInFrame),
                    ScriptedFrame::Error(message) => Err(Error::Decode(message)),
                };
                if !tx.send(outcome).await {
                    return;
                }
            }
            // A real camera keeps streaming; hold the stream open until reset.
            std::future::pending::<()>().await;
        });

        let mut slot = self.feeder.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(previous) = slot.replace(feeder) {
            previous.abort();
        }
        Ok(stream)
    }

    fn reset(&self) {
        let feeder = self.feeder.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(feeder) = feeder {
            feeder.abort();
            self.shared.log().resets += 1;
        }
    }
}

impl Drop for ReplayDecoder {
    fn drop(&mut self) {
        self.reset();
    }
}
