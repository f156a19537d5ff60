//! Run one scan session against a simulated phone with two cameras
//!
//! Usage: cargo run --example scan_barcode

use camscan::output::TerminalUi;
use camscan::simulator::{Replay, ReplayScript};
use camscan::{CameraScanner, ScanSettings, UserAgent};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const SCRIPT: &str = "
device front Front Camera
device back Back Camera
interval 250
miss
miss
error motion blur
code 4006381333931
";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("camscan demo");
    println!("============\n");

    let replay = Replay::new(ReplayScript::parse(SCRIPT)?);
    let (ui, mut submissions) = TerminalUi::new(false);

    let settings = ScanSettings {
        user_agent: UserAgent::new("Mozilla/5.0 (Linux; Android 14; Pixel 8)"),
        submit_delay: Duration::from_millis(500),
        ..Default::default()
    };
    let scanner = CameraScanner::new(replay.backend(), Arc::new(ui), settings);

    scanner.start().await?;
    println!("Scanning with {:?}\n", scanner.selected_device());

    if let Some(barcode) = submissions.recv().await {
        println!("\nForm submitted with barcode {barcode}");
    }
    println!("Cameras opened: {:?}", replay.started_devices());

    Ok(())
}
