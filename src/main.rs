//! camscan command-line entrypoint

use camscan::output::TerminalUi;
#[cfg(target_family = "unix")]
use camscan::output::unix::UnixBroadcast;
use camscan::simulator::Replay;
use camscan::{CameraScanner, CamscanConfig, Error, Result, ScanBackend, logging};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "camscan",
    version,
    about = "Scan barcodes with a camera and submit them to a lookup form"
)]
struct Cli {
    /// Optional configuration file (toml/yaml). Defaults to camscan.{toml,yaml} in cwd/XDG config.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Open this device id instead of applying the selection policy
    #[arg(long, value_name = "ID")]
    device: Option<String>,

    /// User-agent string used by the device selection policy
    #[arg(long, value_name = "UA")]
    user_agent: Option<String>,

    /// Start scanning immediately and exit after the first submitted barcode
    #[arg(long)]
    once: bool,

    /// Print scan events as JSON lines instead of human-readable text
    #[arg(long)]
    json: bool,

    /// Publish scan events over the specified Unix domain socket path
    #[arg(long, value_name = "PATH")]
    unix_socket: Option<PathBuf>,

    /// List detected cameras and exit
    #[arg(long)]
    list_cameras: bool,

    /// Replay a scripted session instead of using a live camera
    #[arg(long, value_name = "PATH")]
    simulator: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = CamscanConfig::load(cli.config.as_deref())?;

    if let Some(ref device) = cli.device {
        config.scanner.device = Some(device.clone());
    }

    if let Some(ref ua) = cli.user_agent {
        config.scanner.user_agent = Some(ua.clone());
    }

    logging::init(&config.logging)?;

    let backend = match cli.simulator.as_deref() {
        Some(path) => {
            info!(script = %path.display(), "Using simulated camera");
            Replay::from_file(path)?.backend()
        }
        None => live_backend(&config)?,
    };

    if cli.list_cameras {
        return list_cameras(&backend).await;
    }

    let settings = config.scan_settings()?;
    info!(
        user_agent = settings.user_agent.as_str(),
        mobile = settings.user_agent.is_mobile(),
        "Starting camscan"
    );

    let (ui, mut submissions) = TerminalUi::new(cli.json);

    #[cfg(target_family = "unix")]
    let ui = match cli.unix_socket.clone().or_else(|| config.api.unix_socket.clone()) {
        Some(path) => ui.with_unix(UnixBroadcast::bind(&path).await?),
        None => ui,
    };

    #[cfg(not(target_family = "unix"))]
    if cli.unix_socket.is_some() {
        return Err(Error::Config(
            "Unix sockets are not supported on this platform".to_string(),
        ));
    }

    let scanner = CameraScanner::new(backend, Arc::new(ui), settings);

    if cli.once {
        scanner.start().await?;
        let barcode = submissions.recv().await;
        info!(?barcode, "Scan complete");
        return Ok(());
    }

    run_interactive(&scanner, &mut submissions).await?;
    scanner.dispose();
    Ok(())
}

#[cfg(feature = "camera")]
fn live_backend(config: &CamscanConfig) -> Result<ScanBackend> {
    let camera_config = config.camera_config()?;
    info!(?camera_config, "Using V4L2 camera");
    Ok(ScanBackend::v4l(camera_config))
}

#[cfg(not(feature = "camera"))]
fn live_backend(_config: &CamscanConfig) -> Result<ScanBackend> {
    Ok(ScanBackend::without_decoder(Arc::new(
        camscan::decoder::NoMediaDevices,
    )))
}

async fn list_cameras(backend: &ScanBackend) -> Result<()> {
    let decoder = backend.create_decoder()?;
    let devices = decoder.list_video_input_devices().await?;

    if devices.is_empty() {
        println!("No cameras detected");
    } else {
        println!("Discovered cameras:");
        for dev in devices {
            println!("  {dev}");
        }
    }
    decoder.reset();
    Ok(())
}

/// Enter toggles the scanner, `q` quits.
async fn run_interactive(
    scanner: &CameraScanner,
    submissions: &mut tokio::sync::mpsc::UnboundedReceiver<String>,
) -> Result<()> {
    println!("Press Enter to start or stop the camera, q to quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.map_err(Error::Io)? else {
                    break;
                };
                match line.trim() {
                    "q" | "quit" => break,
                    _ => {
                        // Failures were already shown to the user.
                        if let Some(starting) = scanner.toggle() {
                            tokio::spawn(async move {
                                if let Ok(Err(err)) = starting.await {
                                    tracing::debug!(error = %err, "start did not complete");
                                }
                            });
                        }
                    }
                }
            }
            Some(barcode) = submissions.recv() => {
                info!(%barcode, "Barcode submitted");
            }
        }
    }

    Ok(())
}
