//! Terminal rendition of the scanner UI and structured scan events

#[cfg(target_family = "unix")]
pub mod unix;

use crate::ui::{ScannerUi, TriggerState};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[cfg(target_family = "unix")]
use unix::UnixBroadcast;

/// Structured event published for every visible UI change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScanEvent {
    /// Camera view opened
    CameraShown,
    /// Camera view closed
    CameraHidden,
    /// Trigger control changed
    Trigger {
        /// New control state
        state: TriggerState,
        /// Caption on the control
        label: String,
        /// Whether the control accepts input
        enabled: bool,
    },
    /// A barcode was decoded and shown in the result panel
    Decoded {
        /// Decoded text
        text: String,
    },
    /// The form was submitted with the given barcode value
    Submitted {
        /// Value of the barcode input at submission time
        barcode: String,
    },
    /// A blocking notification was raised
    Error {
        /// User-facing message
        message: String,
    },
}

impl ScanEvent {
    /// One-line human rendition, `None` for events not worth printing
    pub fn human(&self) -> Option<String> {
        match self {
            ScanEvent::CameraShown => Some("Camera view opened".to_string()),
            ScanEvent::CameraHidden => None,
            ScanEvent::Trigger { state, label, .. } => match state {
                TriggerState::Idle => Some(format!("[{label}] press Enter to scan")),
                _ => Some(format!("[{label}]")),
            },
            ScanEvent::Decoded { text } => Some(format!("Scanned: {text}")),
            ScanEvent::Submitted { barcode } => Some(format!("Submitted barcode {barcode}")),
            ScanEvent::Error { message } => Some(format!("Error: {message}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Console {
    Stdout,
    Stderr,
}

/// Scanner UI rendered on stdout.
///
/// The "form" is the barcode value last written by the scanner; submitting it
/// emits a `submitted` event and hands the value to the receiver returned by
/// [`TerminalUi::new`].
pub struct TerminalUi {
    json: bool,
    #[cfg(target_family = "unix")]
    unix: Option<Arc<UnixBroadcast>>,
    input: Mutex<String>,
    submissions: mpsc::UnboundedSender<String>,
}

impl TerminalUi {
    /// Create the UI and the channel submitted barcodes arrive on
    pub fn new(json: bool) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (submissions, rx) = mpsc::unbounded_channel();
        (
            Self {
                json,
                #[cfg(target_family = "unix")]
                unix: None,
                input: Mutex::new(String::new()),
                submissions,
            },
            rx,
        )
    }

    /// Also publish every event on a Unix domain socket
    #[cfg(target_family = "unix")]
    pub fn with_unix(mut self, unix: Arc<UnixBroadcast>) -> Self {
        self.unix = Some(unix);
        self
    }

    /// Current value of the barcode input
    pub fn input(&self) -> String {
        self.input.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Where an event is printed. JSON lines all go to stdout; in human mode
    /// errors go to stderr.
    fn route(&self, event: &ScanEvent) -> Option<(Console, String)> {
        if self.json {
            return match serde_json::to_string(event) {
                Ok(line) => Some((Console::Stdout, line)),
                Err(err) => {
                    tracing::warn!("Failed to serialize scan event: {err}");
                    None
                }
            };
        }
        let line = event.human()?;
        match event {
            ScanEvent::Error { .. } => Some((Console::Stderr, line)),
            _ => Some((Console::Stdout, line)),
        }
    }

    fn emit(&self, event: ScanEvent) {
        match self.route(&event) {
            Some((Console::Stdout, line)) => println!("{line}"),
            Some((Console::Stderr, line)) => eprintln!("{line}"),
            None => {}
        }

        #[cfg(target_family = "unix")]
        if let Some(unix) = &self.unix {
            if let Err(err) = unix.send_event(&event) {
                tracing::debug!("No Unix socket listeners for event: {err}");
            }
        }
    }
}

impl ScannerUi for TerminalUi {
    fn show_camera(&self) {
        self.emit(ScanEvent::CameraShown);
    }

    fn hide_camera(&self) {
        self.emit(ScanEvent::CameraHidden);
    }

    fn set_trigger(&self, state: TriggerState) {
        self.emit(ScanEvent::Trigger {
            state,
            label: state.label().to_string(),
            enabled: state.enabled(),
        });
    }

    fn show_result(&self, text: &str) {
        self.emit(ScanEvent::Decoded {
            text: text.to_string(),
        });
    }

    fn hide_result(&self) {}

    fn set_input(&self, value: &str) {
        *self.input.lock().unwrap_or_else(|p| p.into_inner()) = value.to_string();
    }

    fn focus_input(&self) {
        tracing::trace!("input focused");
    }

    fn vibrate(&self, _pattern: &[u64]) -> bool {
        if self.json {
            return false;
        }
        // Terminal bell stands in for haptics.
        let mut stdout = std::io::stdout();
        stdout.write_all(b"\x07").is_ok() && stdout.flush().is_ok()
    }

    fn alert(&self, message: &str) {
        self.emit(ScanEvent::Error {
            message: message.to_string(),
        });
    }

    fn submit_form(&self) {
        let barcode = self.input();
        self.emit(ScanEvent::Submitted {
            barcode: barcode.clone(),
        });
        if self.submissions.send(barcode).is_err() {
            tracing::debug!("submission receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ui() -> (TerminalUi, mpsc::UnboundedReceiver<String>) {
        TerminalUi::new(true)
    }

    #[test]
    fn test_event_json_shape() {
        let event = ScanEvent::Trigger {
            state: TriggerState::Starting,
            label: TriggerState::Starting.label().to_string(),
            enabled: false,
        };
        let value = serde_json::to_value(&event).expect("json");
        assert_eq!(value["event"], "trigger");
        assert_eq!(value["state"], "starting");
        assert_eq!(value["enabled"], false);

        let submitted = serde_json::to_value(ScanEvent::Submitted {
            barcode: "8690504000011".to_string(),
        })
        .expect("json");
        assert_eq!(submitted["event"], "submitted");
        assert_eq!(submitted["barcode"], "8690504000011");
    }

    #[test]
    fn test_submit_uses_input_value() {
        let (ui, mut rx) = ui();
        ui.set_input("5901234123457");
        ui.submit_form();
        assert_eq!(rx.try_recv().ok().as_deref(), Some("5901234123457"));
    }

    #[test]
    fn test_human_lines() {
        assert_eq!(
            ScanEvent::Decoded {
                text: "ABC-123".to_string()
            }
            .human()
            .as_deref(),
            Some("Scanned: ABC-123")
        );
        assert!(ScanEvent::CameraHidden.human().is_none());
    }

    #[test]
    fn test_alert_printed_once() {
        let alert = ScanEvent::Error {
            message: "No camera found.".to_string(),
        };

        let (human, _rx) = TerminalUi::new(false);
        assert_eq!(
            human.route(&alert),
            Some((Console::Stderr, "Error: No camera found.".to_string()))
        );
        assert_eq!(
            human.route(&ScanEvent::CameraShown).map(|(console, _)| console),
            Some(Console::Stdout)
        );

        let (json, _rx) = ui();
        let (console, line) = json.route(&alert).expect("json line");
        assert_eq!(console, Console::Stdout);
        assert!(line.contains("\"event\":\"error\""));
    }
}
