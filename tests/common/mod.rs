//! Shared fixtures for scanner integration tests

#![allow(dead_code)]

pub mod gated;

use camscan::simulator::{Replay, ReplayScript};
use camscan::{CameraScanner, ScanBackend, ScanSettings, ScannerUi, TriggerState, UserAgent};
use std::sync::{Arc, Mutex};

pub const IPHONE: &str =
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15";
pub const DESKTOP: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// One observed UI interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCall {
    ShowCamera,
    HideCamera,
    RevealCamera,
    Trigger(TriggerState),
    ShowResult(String),
    HideResult,
    SetInput(String),
    FocusInput,
    Vibrate(Vec<u64>),
    Alert(String),
    Submit(String),
}

/// UI surface that records every call in order
#[derive(Default)]
pub struct RecordingUi {
    calls: Mutex<Vec<UiCall>>,
    input: Mutex<String>,
}

impl RecordingUi {
    pub fn calls(&self) -> Vec<UiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn input(&self) -> String {
        self.input.lock().unwrap().clone()
    }

    pub fn position(&self, call: &UiCall) -> Option<usize> {
        self.calls().iter().position(|c| c == call)
    }

    pub fn last_position(&self, call: &UiCall) -> Option<usize> {
        self.calls().iter().rposition(|c| c == call)
    }

    pub fn count(&self, call: &UiCall) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                UiCall::Alert(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn submissions(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                UiCall::Submit(value) => Some(value),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: UiCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ScannerUi for RecordingUi {
    fn show_camera(&self) {
        self.record(UiCall::ShowCamera);
    }

    fn hide_camera(&self) {
        self.record(UiCall::HideCamera);
    }

    fn reveal_camera(&self) {
        self.record(UiCall::RevealCamera);
    }

    fn set_trigger(&self, state: TriggerState) {
        self.record(UiCall::Trigger(state));
    }

    fn show_result(&self, text: &str) {
        self.record(UiCall::ShowResult(text.to_string()));
    }

    fn hide_result(&self) {
        self.record(UiCall::HideResult);
    }

    fn set_input(&self, value: &str) {
        *self.input.lock().unwrap() = value.to_string();
        self.record(UiCall::SetInput(value.to_string()));
    }

    fn focus_input(&self) {
        self.record(UiCall::FocusInput);
    }

    fn vibrate(&self, pattern: &[u64]) -> bool {
        self.record(UiCall::Vibrate(pattern.to_vec()));
        true
    }

    fn alert(&self, message: &str) {
        self.record(UiCall::Alert(message.to_string()));
    }

    fn submit_form(&self) {
        let value = self.input();
        self.record(UiCall::Submit(value));
    }
}

/// Scanner wired to a scripted backend and a recording UI
pub struct Harness {
    pub scanner: CameraScanner,
    pub replay: Replay,
    pub ui: Arc<RecordingUi>,
}

pub fn harness(script: &str, user_agent: &str) -> Harness {
    let replay = Replay::new(ReplayScript::parse(script).expect("valid script"));
    let ui = Arc::new(RecordingUi::default());
    let settings = ScanSettings {
        user_agent: UserAgent::new(user_agent),
        ..Default::default()
    };
    let scanner = CameraScanner::new(replay.backend(), ui.clone(), settings);
    Harness {
        scanner,
        replay,
        ui,
    }
}

/// Scanner over an arbitrary backend with a recording UI
pub fn scanner_with(backend: ScanBackend, user_agent: &str) -> (CameraScanner, Arc<RecordingUi>) {
    let ui = Arc::new(RecordingUi::default());
    let settings = ScanSettings {
        user_agent: UserAgent::new(user_agent),
        ..Default::default()
    };
    (CameraScanner::new(backend, ui.clone(), settings), ui)
}
