//! V4L2 camera interface for Linux
//!
//! Enumerates `/dev/video*` nodes and streams frames from the one the
//! scanner selected.

mod config;
mod device;

pub use config::{CameraConfig, PixelFormat};
pub use device::{Camera, CameraDevice};

use crate::device::{DeviceKind, MediaDevice};
use crate::error::{Error, Result};

/// Highest `/dev/videoN` index probed during enumeration
const MAX_VIDEO_NODES: usize = 16;

/// Probe every V4L2 node, capture-capable or not
pub fn probe_nodes() -> Result<Vec<(CameraDevice, bool)>> {
    let mut nodes = Vec::new();
    let mut denied = false;

    for index in 0..MAX_VIDEO_NODES {
        let path = format!("/dev/video{index}");

        let dev = match v4l::Device::new(index) {
            Ok(dev) => dev,
            Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => {
                tracing::debug!(%path, "permission denied while probing");
                denied = true;
                continue;
            }
            Err(_) => continue,
        };

        let caps = match dev.query_caps() {
            Ok(caps) => caps,
            Err(err) => {
                tracing::debug!(%path, error = %err, "failed to query capabilities");
                continue;
            }
        };

        let capture = caps
            .capabilities
            .contains(v4l::capability::Flags::VIDEO_CAPTURE);
        nodes.push((
            CameraDevice {
                index,
                path,
                name: caps.card,
                driver: caps.driver,
                bus_info: caps.bus,
            },
            capture,
        ));
    }

    if nodes.is_empty() && denied {
        return Err(Error::PermissionDenied);
    }

    Ok(nodes)
}

/// List available V4L2 capture devices
pub fn list_devices() -> Result<Vec<CameraDevice>> {
    let devices: Vec<CameraDevice> = probe_nodes()?
        .into_iter()
        .filter_map(|(dev, capture)| capture.then_some(dev))
        .collect();

    if devices.is_empty() {
        return Err(Error::CameraNotFound(
            "No V4L2 capture devices found".to_string(),
        ));
    }

    Ok(devices)
}

/// Every V4L2 node as a generic media device
pub fn media_devices() -> Result<Vec<MediaDevice>> {
    Ok(probe_nodes()?
        .into_iter()
        .map(|(dev, capture)| MediaDevice {
            id: dev.path,
            label: dev.name,
            kind: if capture {
                DeviceKind::VideoInput
            } else {
                DeviceKind::Other
            },
        })
        .collect())
}

/// Find a capture device by its node path (e.g. `/dev/video2`)
pub fn find_device_by_path(path: &str) -> Result<CameraDevice> {
    list_devices()?
        .into_iter()
        .find(|d| d.path == path)
        .ok_or_else(|| Error::CameraNotFound(path.to_string()))
}
