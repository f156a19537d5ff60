//! Start/stop lifecycle of a camera scan session
//!
//! `start` walks Idle → Starting → Active, `stop` always lands back in Idle.
//! Frame outcomes arrive on a [`FrameStream`] consumed by a spawned listener.
//! Every event is checked against the session generation before it is acted
//! upon, so outcomes still in flight when `stop` runs are dropped.

use crate::decoder::{Decoder, FrameStream, ScanBackend, ScanResult};
use crate::device::{DEFAULT_REAR_KEYWORDS, UserAgent, VideoDevice, select_device, video_inputs};
use crate::error::{Error, Result};
use crate::ui::{ScannerUi, TriggerState};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

/// Lifecycle state of the scanner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    /// No camera open
    #[default]
    Idle,
    /// Enumerating devices and opening the camera
    Starting,
    /// Decode loop running
    Active,
}

/// Resolved scanner behaviour
#[derive(Debug, Clone)]
pub struct ScanSettings {
    /// Client identity used by the device selection policy
    pub user_agent: UserAgent,
    /// Label keywords marking a rear-facing camera
    pub rear_keywords: Vec<String>,
    /// Element (or sink) the decoder renders its preview into
    pub preview_target: String,
    /// Wait between a successful decode and form submission
    pub submit_delay: Duration,
    /// Wait before refocusing the input field after `stop`
    pub refocus_delay: Duration,
    /// Vibration pattern in milliseconds, empty to disable
    pub vibration_pattern: Vec<u64>,
    /// Device id that overrides the selection policy
    pub forced_device: Option<String>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            user_agent: UserAgent::host(),
            rear_keywords: DEFAULT_REAR_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            preview_target: "preview".to_string(),
            submit_delay: Duration::from_millis(1500),
            refocus_delay: Duration::from_millis(300),
            vibration_pattern: vec![200, 100, 200],
            forced_device: None,
        }
    }
}

impl ScanSettings {
    /// Pick the device to open from a non-empty list
    pub fn choose_device<'a>(&self, devices: &'a [VideoDevice]) -> Result<&'a VideoDevice> {
        if let Some(id) = &self.forced_device {
            return devices
                .iter()
                .find(|d| &d.id == id)
                .ok_or_else(|| Error::CameraNotFound(id.clone()));
        }

        select_device(devices, &self.user_agent, self.rear_keywords.as_slice())
            .ok_or(Error::NoCameraFound)
    }
}

#[derive(Default)]
struct Session {
    state: ScanState,
    generation: u64,
    id: Option<Uuid>,
    decoder: Option<Arc<dyn Decoder>>,
    listener: Option<JoinHandle<()>>,
    device: Option<VideoDevice>,
}

impl Session {
    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && self.state != ScanState::Idle
    }
}

struct Inner {
    backend: ScanBackend,
    ui: Arc<dyn ScannerUi>,
    settings: ScanSettings,
    session: Mutex<Session>,
}

impl Inner {
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Release the decoder and restore the UI. Caller holds the session lock.
    fn stop_locked(&self, session: &mut Session, abort_listener: bool) {
        if let Some(decoder) = session.decoder.take() {
            decoder.reset();
        }
        if let Some(listener) = session.listener.take() {
            if abort_listener {
                listener.abort();
            }
        }
        if session.state != ScanState::Idle {
            tracing::info!(session = ?session.id, "scanner stopped");
        }
        session.state = ScanState::Idle;
        session.generation += 1;

        self.ui.hide_camera();
        self.ui.set_trigger(TriggerState::Idle);
        self.ui.hide_result();

        let ui = Arc::clone(&self.ui);
        let delay = self.settings.refocus_delay;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    ui.focus_input();
                });
            }
            Err(_) => ui.focus_input(),
        }
    }

    fn on_decoded(&self, generation: u64, result: ScanResult) {
        let mut session = self.session();
        if !session.is_current(generation) {
            tracing::debug!("ignoring decode that arrived after stop");
            return;
        }

        tracing::info!(code = %result.text, "barcode decoded");

        if !self.settings.vibration_pattern.is_empty()
            && !self.ui.vibrate(&self.settings.vibration_pattern)
        {
            tracing::trace!("haptic feedback unsupported");
        }
        self.ui.show_result(&result.text);
        self.ui.set_input(&result.text);

        // Runs on the listener task itself, so it must not abort it.
        self.stop_locked(&mut session, false);
        drop(session);

        let ui = Arc::clone(&self.ui);
        let delay = self.settings.submit_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            ui.submit_form();
        });
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let session = self
            .session
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(decoder) = session.decoder.take() {
            decoder.reset();
        }
        if let Some(listener) = session.listener.take() {
            listener.abort();
        }
    }
}

/// Camera barcode scanner bound to one UI surface.
///
/// Cloning yields another handle to the same session. The UI implementation
/// must not call back into the scanner from its methods.
#[derive(Clone)]
pub struct CameraScanner {
    inner: Arc<Inner>,
}

impl CameraScanner {
    /// Create an idle scanner
    pub fn new(backend: ScanBackend, ui: Arc<dyn ScannerUi>, settings: ScanSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                ui,
                settings,
                session: Mutex::new(Session::default()),
            }),
        }
    }

    /// Settings this scanner was built with
    pub fn settings(&self) -> &ScanSettings {
        &self.inner.settings
    }

    /// Current lifecycle state
    pub fn state(&self) -> ScanState {
        self.inner.session().state
    }

    /// True while a decode loop is active
    pub fn is_scanning(&self) -> bool {
        self.state() == ScanState::Active
    }

    /// Device chosen by the most recent session that got past enumeration
    pub fn selected_device(&self) -> Option<VideoDevice> {
        self.inner.session().device.clone()
    }

    /// Identifier of the most recent session
    pub fn session_id(&self) -> Option<Uuid> {
        self.inner.session().id
    }

    /// Open a camera and begin decoding.
    ///
    /// Fails with [`Error::AlreadyScanning`] without side effects when a scan
    /// is already starting or running. Any other failure has been shown to
    /// the user through [`ScannerUi::alert`] and the scanner is Idle again.
    pub async fn start(&self) -> Result<()> {
        let (generation, id) = {
            let mut session = self.inner.session();
            if session.state != ScanState::Idle {
                return Err(Error::AlreadyScanning);
            }
            self.begin_locked(&mut session)
        };
        self.run_start(generation, id).await
    }

    /// Start when Idle, otherwise stop. A start that is still setting up is
    /// cancelled by the next toggle.
    ///
    /// The start runs on a spawned task whose handle is returned.
    pub fn toggle(&self) -> Option<JoinHandle<Result<()>>> {
        let mut session = self.inner.session();
        if session.state != ScanState::Idle {
            self.inner.stop_locked(&mut session, true);
            return None;
        }

        let (generation, id) = self.begin_locked(&mut session);
        drop(session);

        let scanner = self.clone();
        Some(tokio::spawn(async move {
            scanner.run_start(generation, id).await
        }))
    }

    fn begin_locked(&self, session: &mut Session) -> (u64, Uuid) {
        session.state = ScanState::Starting;
        session.generation += 1;
        session.device = None;
        let id = Uuid::new_v4();
        session.id = Some(id);

        self.inner.ui.show_camera();
        self.inner.ui.set_trigger(TriggerState::Starting);
        (session.generation, id)
    }

    async fn run_start(&self, generation: u64, id: Uuid) -> Result<()> {
        let span = tracing::info_span!("scan_session", %id);
        let result = self.setup(generation).instrument(span.clone()).await;

        match result {
            Ok(()) => Ok(()),
            Err(Error::Cancelled) => {
                tracing::debug!(parent: &span, "start superseded by stop");
                Err(Error::Cancelled)
            }
            Err(err) => {
                if !self.inner.session().is_current(generation) {
                    tracing::debug!(parent: &span, error = %err, "setup failed after stop");
                    return Err(Error::Cancelled);
                }
                tracing::error!(parent: &span, error = %err, "failed to start camera");
                self.inner.ui.alert(&err.user_message());
                self.stop();
                Err(err)
            }
        }
    }

    async fn setup(&self, generation: u64) -> Result<()> {
        let inner = &self.inner;

        let decoder = inner.backend.create_decoder()?;
        {
            let mut session = inner.session();
            if !session.is_current(generation) {
                return Err(Error::Cancelled);
            }
            session.decoder = Some(Arc::clone(&decoder));
        }

        let devices = match decoder.list_video_input_devices().await {
            Ok(devices) => devices,
            Err(err) => {
                tracing::info!(error = %err, "decoder could not list cameras, using platform enumeration");
                video_inputs(inner.backend.media.enumerate_devices().await?)
            }
        };

        if devices.is_empty() {
            return Err(Error::NoCameraFound);
        }

        let device = inner.settings.choose_device(&devices)?.clone();
        {
            let mut session = inner.session();
            if !session.is_current(generation) {
                return Err(Error::Cancelled);
            }
            session.device = Some(device.clone());
        }
        tracing::info!(
            device = %device,
            candidates = devices.len(),
            mobile = inner.settings.user_agent.is_mobile(),
            "starting camera"
        );

        let stream = decoder
            .decode_from_video_device(&device.id, &inner.settings.preview_target)
            .await?;

        let mut session = inner.session();
        if !session.is_current(generation) {
            drop(session);
            decoder.reset();
            return Err(Error::Cancelled);
        }

        session.state = ScanState::Active;
        inner.ui.set_trigger(TriggerState::Active);
        inner.ui.reveal_camera();

        let listener = listen(Arc::downgrade(inner), generation, stream)
            .instrument(tracing::Span::current());
        session.listener = Some(tokio::spawn(listener));

        Ok(())
    }

    /// Release the camera and restore the UI. Safe to call at any time.
    pub fn stop(&self) {
        let mut session = self.inner.session();
        self.inner.stop_locked(&mut session, true);
    }

    /// Stop and release this handle
    pub fn dispose(self) {
        self.stop();
    }
}

async fn listen(inner: Weak<Inner>, generation: u64, mut stream: FrameStream) {
    while let Some(outcome) = stream.next().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        if !inner.session().is_current(generation) {
            tracing::debug!("dropping frame outcome after stop");
            return;
        }

        match outcome {
            Ok(result) => {
                inner.on_decoded(generation, result);
                return;
            }
            Err(Error::NoCodeInFrame) => {}
            Err(err) => tracing::warn!(error = %err, "frame decode error"),
        }
    }

    tracing::debug!("frame stream closed");
}
