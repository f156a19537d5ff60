//! Video device descriptions and the camera selection policy

use serde::{Deserialize, Serialize};
use std::fmt;

/// Label keywords identifying a rear-facing camera on mobile devices
pub const DEFAULT_REAR_KEYWORDS: [&str; 3] = ["back", "rear", "environment"];

/// A video input device as reported by the decoding backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDevice {
    /// Backend-specific identifier used to open the device
    pub id: String,
    /// Human-readable label, may be empty when the platform hides it
    pub label: String,
}

impl VideoDevice {
    /// Create a device description
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }

    /// Case-insensitive check of the label against a set of keywords
    pub fn label_matches<S: AsRef<str>>(&self, keywords: &[S]) -> bool {
        if self.label.is_empty() {
            return false;
        }
        let label = self.label.to_lowercase();
        keywords
            .iter()
            .any(|keyword| label.contains(&keyword.as_ref().to_lowercase()))
    }
}

impl fmt::Display for VideoDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.label.is_empty() {
            write!(f, "{}", self.id)
        } else {
            write!(f, "{} ({})", self.label, self.id)
        }
    }
}

/// Kind discriminator of a platform media device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Camera or other video capture source
    VideoInput,
    /// Microphone
    AudioInput,
    /// Speaker or headset
    AudioOutput,
    /// Anything the platform exposes that is neither of the above
    Other,
}

/// A device returned by generic platform enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDevice {
    /// Platform identifier
    pub id: String,
    /// Human-readable label
    pub label: String,
    /// What the device does
    pub kind: DeviceKind,
}

impl From<MediaDevice> for VideoDevice {
    fn from(device: MediaDevice) -> Self {
        VideoDevice {
            id: device.id,
            label: device.label,
        }
    }
}

/// Keep only the video inputs of a generic enumeration
pub fn video_inputs(devices: Vec<MediaDevice>) -> Vec<VideoDevice> {
    devices
        .into_iter()
        .filter(|d| d.kind == DeviceKind::VideoInput)
        .map(VideoDevice::from)
        .collect()
}

/// User-agent string of the client driving the scanner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAgent(String);

impl UserAgent {
    /// Wrap a raw user-agent string
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Derive a user agent from the host operating system
    pub fn host() -> Self {
        match std::env::consts::OS {
            "android" => Self::new("Android"),
            "ios" => Self::new("iPhone"),
            os => Self::new(os),
        }
    }

    /// Raw string value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// iPad, iPhone or iPod (case-sensitive, as browsers report them)
    pub fn is_ios(&self) -> bool {
        ["iPad", "iPhone", "iPod"]
            .iter()
            .any(|needle| self.0.contains(needle))
    }

    /// Android, any casing
    pub fn is_android(&self) -> bool {
        self.0.to_ascii_lowercase().contains("android")
    }

    /// True for iOS and Android clients
    pub fn is_mobile(&self) -> bool {
        self.is_ios() || self.is_android()
    }
}

impl Default for UserAgent {
    fn default() -> Self {
        Self::host()
    }
}

/// Pick the camera to scan with.
///
/// Mobile clients with several cameras prefer one whose label names the rear
/// camera, then the last listed device. Everyone else gets the first device.
pub fn select_device<'a, S: AsRef<str>>(
    devices: &'a [VideoDevice],
    user_agent: &UserAgent,
    rear_keywords: &[S],
) -> Option<&'a VideoDevice> {
    let first = devices.first()?;

    if user_agent.is_mobile() && devices.len() > 1 {
        return devices
            .iter()
            .find(|d| d.label_matches(rear_keywords))
            .or_else(|| devices.last());
    }

    Some(first)
}
