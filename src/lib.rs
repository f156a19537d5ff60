//! camscan - camera barcode scanner that fills and submits a lookup form
//!
//! The scanner opens a camera through a pluggable decoding backend, listens
//! to per-frame decode outcomes, and on the first decoded barcode writes it
//! into the UI's input field, stops the camera and submits the form.
//!
//! # Features
//!
//! - **Camera Integration**: V4L2 capture decoding QR (rqrr) and 1D product barcodes (rxing) (`camera` feature)
//! - **Device Selection**: rear-camera preference for mobile clients
//! - **Simulator**: scripted backend for demos and tests
//! - **Event Output**: terminal, JSON lines and Unix socket fan-out
//!
//! # Example
//!
//! ```no_run
//! use camscan::output::TerminalUi;
//! use camscan::simulator::{Replay, ReplayScript};
//! use camscan::{CameraScanner, ScanSettings};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let script = ReplayScript::parse("device cam0 USB Camera\nmiss\ncode 4006381333931")?;
//!     let (ui, mut submissions) = TerminalUi::new(false);
//!
//!     let scanner = CameraScanner::new(
//!         Replay::new(script).backend(),
//!         Arc::new(ui),
//!         ScanSettings::default(),
//!     );
//!     scanner.start().await?;
//!
//!     let barcode = submissions.recv().await;
//!     println!("Submitted: {:?}", barcode);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs, rust_2024_compatibility)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod decoder;
pub mod device;
pub mod error;
pub mod logging;
pub mod output;
pub mod scanner;
pub mod simulator;
pub mod ui;

#[cfg(feature = "camera")]
#[cfg_attr(docsrs, doc(cfg(feature = "camera")))]
pub mod camera;

// Re-exports for convenience
pub use error::{Error, PlatformError, Result};

#[cfg(feature = "camera")]
pub use camera::{CameraConfig, CameraDevice};

pub use config::{
    ApiOptions, CameraOptions, CamscanConfig, LogRotation, LoggingOptions, ScannerOptions,
};
pub use decoder::{
    Decoder, DecoderFactory, FrameStream, MediaDeviceProvider, ScanBackend, ScanResult,
};
pub use device::{DeviceKind, MediaDevice, UserAgent, VideoDevice, select_device};
pub use scanner::{CameraScanner, ScanSettings, ScanState};
pub use ui::{ScannerUi, TriggerState};
