//! Runtime configuration handling

#[cfg(feature = "camera")]
use crate::camera::{CameraConfig, PixelFormat};
use crate::device::{DEFAULT_REAR_KEYWORDS, UserAgent};
use crate::error::{Error, Result};
use crate::scanner::ScanSettings;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment lookup, `std::env::var` outside of tests
pub type Vars<'a> = &'a dyn Fn(&str) -> Option<String>;

fn parse_var<T>(vars: Vars<'_>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    vars(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Invalid {key}='{raw}': {e}")))
        })
        .transpose()
}

/// Top-level configuration structure persisted to disk or environment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CamscanConfig {
    /// Camera capture overrides
    pub camera: CameraOptions,
    /// Scan session behaviour
    pub scanner: ScannerOptions,
    /// Logging configuration
    pub logging: LoggingOptions,
    /// Event publishing
    pub api: ApiOptions,
}

impl CamscanConfig {
    /// Load configuration from an explicit path or fall back to discovered defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = explicit_path {
            Self::from_file(path)?
        } else if let Some(path) = Self::discover_file()? {
            tracing::info!("Using configuration file: {}", path.display());
            Self::from_file(&path)?
        } else {
            tracing::debug!("No camscan.toml / camscan.yaml found, using defaults");
            Self::default()
        };

        config.apply_env_overrides(&|key: &str| env::var(key).ok())?;
        Ok(config)
    }

    /// Attempt to locate a configuration file in common locations.
    fn discover_file() -> Result<Option<PathBuf>> {
        let cwd =
            env::current_dir().map_err(|e| Error::Config(format!("Failed to read cwd: {e}")))?;
        let local = ["camscan.toml", "camscan.yaml", "camscan.yml"].map(|name| cwd.join(name));

        let xdg = env::var_os("XDG_CONFIG_HOME")
            .map(|dir| PathBuf::from(dir).join("camscan"))
            .map(|base| ["config.toml", "config.yaml"].map(|name| base.join(name)));

        Ok(local
            .into_iter()
            .chain(xdg.into_iter().flatten())
            .find(|path| path.exists()))
    }

    /// Read configuration from a concrete file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        Self::parse(&contents, &extension)
            .map_err(|e| Error::Config(format!("{} ({})", e, path.display())))
    }

    /// Parse configuration text in the given format (`toml`, `yaml` or `yml`).
    pub fn parse(contents: &str, format: &str) -> std::result::Result<Self, String> {
        match format {
            "toml" => toml::from_str(contents).map_err(|e| format!("Failed to parse TOML: {e}")),
            "yaml" | "yml" => {
                serde_yaml::from_str(contents).map_err(|e| format!("Failed to parse YAML: {e}"))
            }
            other => Err(format!(
                "Unsupported config format '{other}', expected toml/yaml"
            )),
        }
    }

    /// Apply `CAMSCAN_*` overrides after file/default loading. Values that do
    /// not parse are rejected instead of replacing the file's setting.
    pub fn apply_env_overrides(&mut self, vars: Vars<'_>) -> Result<()> {
        self.camera.apply_env_overrides(vars)?;
        self.scanner.apply_env_overrides(vars)?;
        self.logging.apply_env_overrides(vars)?;
        self.api.apply_env_overrides(vars);
        Ok(())
    }

    /// Capture configuration ready to open a V4L2 device.
    #[cfg(feature = "camera")]
    pub fn camera_config(&self) -> Result<CameraConfig> {
        self.camera.to_camera_config()
    }

    /// Scanner settings with every default filled in.
    pub fn scan_settings(&self) -> Result<ScanSettings> {
        self.scanner.to_scan_settings()
    }
}

/// Camera overrides merged on top of a preset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraOptions {
    /// Base preset (`default`, `compatible`, `high_detail`)
    pub preset: Option<String>,
    /// Desired frame width in pixels
    pub width: Option<u32>,
    /// Desired frame height in pixels
    pub height: Option<u32>,
    /// Desired frames per second
    pub fps: Option<u32>,
    /// Pixel format string (mjpeg/yuyv/rgb24)
    pub format: Option<String>,
    /// Number of V4L2 buffers to allocate
    pub buffer_count: Option<u32>,
    /// Pause after frames without a barcode, in milliseconds
    pub idle_interval_ms: Option<u64>,
}

impl CameraOptions {
    pub(crate) fn apply_env_overrides(&mut self, vars: Vars<'_>) -> Result<()> {
        if let Some(preset) = vars("CAMSCAN_CAMERA_PRESET") {
            self.preset = Some(preset);
        }
        if let Some(width) = parse_var(vars, "CAMSCAN_CAMERA_WIDTH")? {
            self.width = Some(width);
        }
        if let Some(height) = parse_var(vars, "CAMSCAN_CAMERA_HEIGHT")? {
            self.height = Some(height);
        }
        if let Some(fps) = parse_var(vars, "CAMSCAN_CAMERA_FPS")? {
            self.fps = Some(fps);
        }
        if let Some(format) = vars("CAMSCAN_CAMERA_FORMAT") {
            self.format = Some(format);
        }
        if let Some(buffers) = parse_var(vars, "CAMSCAN_CAMERA_BUFFERS")? {
            self.buffer_count = Some(buffers);
        }
        Ok(())
    }

    /// Merge overrides onto the selected preset.
    #[cfg(feature = "camera")]
    pub fn to_camera_config(&self) -> Result<CameraConfig> {
        let mut config = match &self.preset {
            Some(name) => CameraConfig::preset(name).ok_or_else(|| {
                Error::Config(format!(
                    "Unknown camera preset '{name}'. Use default, compatible, or high_detail"
                ))
            })?,
            None => CameraConfig::default(),
        };

        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(fps) = self.fps {
            config.fps = fps.max(1);
        }
        if let Some(format) = &self.format {
            config.format = PixelFormat::parse(format).ok_or_else(|| {
                Error::Config(format!(
                    "Unknown pixel format '{format}'. Use mjpeg, yuyv, or rgb24"
                ))
            })?;
        }
        if let Some(buffers) = self.buffer_count {
            config.buffer_count = buffers.max(2);
        }
        if let Some(idle) = self.idle_interval_ms {
            config.idle_interval_ms = idle;
        }

        Ok(config)
    }
}

/// Scan session overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerOptions {
    /// User-agent string; defaults to the host operating system
    pub user_agent: Option<String>,
    /// Device id forced regardless of the selection policy
    pub device: Option<String>,
    /// Label keywords identifying a rear camera
    pub rear_keywords: Vec<String>,
    /// Preview target handed to the decoder
    pub preview_target: String,
    /// Delay before form submission after a decode
    pub submit_delay_ms: u64,
    /// Delay before the input field is refocused after stopping
    pub refocus_delay_ms: u64,
    /// Haptic pattern in milliseconds; empty disables vibration
    pub vibration_pattern: Vec<u64>,
}

impl Default for ScannerOptions {
    fn default() -> Self {
        Self {
            user_agent: None,
            device: None,
            rear_keywords: DEFAULT_REAR_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            preview_target: "preview".to_string(),
            submit_delay_ms: 1500,
            refocus_delay_ms: 300,
            vibration_pattern: vec![200, 100, 200],
        }
    }
}

impl ScannerOptions {
    pub(crate) fn apply_env_overrides(&mut self, vars: Vars<'_>) -> Result<()> {
        if let Some(ua) = vars("CAMSCAN_USER_AGENT") {
            self.user_agent = Some(ua);
        }
        if let Some(device) = vars("CAMSCAN_DEVICE") {
            self.device = if device.trim().is_empty() {
                None
            } else {
                Some(device)
            };
        }
        if let Some(keywords) = vars("CAMSCAN_REAR_KEYWORDS") {
            self.rear_keywords = split_list(&keywords);
        }
        if let Some(delay) = parse_var(vars, "CAMSCAN_SUBMIT_DELAY_MS")? {
            self.submit_delay_ms = delay;
        }
        if let Some(delay) = parse_var(vars, "CAMSCAN_REFOCUS_DELAY_MS")? {
            self.refocus_delay_ms = delay;
        }
        Ok(())
    }

    /// Resolve into the settings a scanner runs with.
    pub fn to_scan_settings(&self) -> Result<ScanSettings> {
        let rear_keywords: Vec<String> = self
            .rear_keywords
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        if rear_keywords.is_empty() {
            return Err(Error::Config(
                "scanner.rear_keywords must contain at least one keyword".to_string(),
            ));
        }

        if self.preview_target.trim().is_empty() {
            return Err(Error::Config(
                "scanner.preview_target must not be empty".to_string(),
            ));
        }

        Ok(ScanSettings {
            user_agent: self
                .user_agent
                .as_deref()
                .map(UserAgent::new)
                .unwrap_or_else(UserAgent::host),
            rear_keywords,
            preview_target: self.preview_target.trim().to_string(),
            submit_delay: Duration::from_millis(self.submit_delay_ms),
            refocus_delay: Duration::from_millis(self.refocus_delay_ms),
            vibration_pattern: self.vibration_pattern.clone(),
            forced_device: self.device.clone(),
        })
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Structured logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// Default log level (overridable via `CAMSCAN_LOG_LEVEL`)
    pub level: String,
    /// Optional log file path for teeing structured logs
    pub file: Option<PathBuf>,
    /// Force ANSI colors in terminal logging
    pub color: bool,
    /// Optional log rotation strategy applied to `file`
    pub rotation: Option<LogRotation>,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            color: true,
            rotation: None,
        }
    }
}

impl LoggingOptions {
    pub(crate) fn apply_env_overrides(&mut self, vars: Vars<'_>) -> Result<()> {
        if let Some(level) = vars("CAMSCAN_LOG_LEVEL") {
            self.level = level;
        }
        if let Some(file) = vars("CAMSCAN_LOG_FILE") {
            self.file = Some(PathBuf::from(file));
        }
        if let Some(color) = vars("CAMSCAN_LOG_COLOR") {
            self.color = match color.to_ascii_lowercase().as_str() {
                "0" | "false" | "off" => false,
                "1" | "true" | "on" => true,
                _ => {
                    return Err(Error::Config(format!(
                        "Invalid CAMSCAN_LOG_COLOR='{color}', expected true or false"
                    )));
                }
            };
        }
        if let Some(rotation) = vars("CAMSCAN_LOG_ROTATION") {
            let parsed = LogRotation::parse(&rotation).ok_or_else(|| {
                Error::Config(format!(
                    "Invalid CAMSCAN_LOG_ROTATION='{rotation}', expected hourly or daily"
                ))
            })?;
            self.rotation = Some(parsed);
        }
        Ok(())
    }
}

/// Supported log rotation policies for file sinks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    /// Rotate log files once per hour
    Hourly,
    /// Rotate log files once per day
    Daily,
}

impl LogRotation {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "hourly" => Some(Self::Hourly),
            "daily" => Some(Self::Daily),
            _ => None,
        }
    }
}

/// Where scan events are published besides the terminal
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiOptions {
    /// Unix domain socket path for streaming structured events
    pub unix_socket: Option<PathBuf>,
}

impl ApiOptions {
    pub(crate) fn apply_env_overrides(&mut self, vars: Vars<'_>) {
        if let Some(socket) = vars("CAMSCAN_UNIX_SOCKET") {
            self.unix_socket = if socket.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(socket))
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn apply(config: &mut CamscanConfig, pairs: &[(&str, &str)]) -> Result<()> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config.apply_env_overrides(&|key: &str| vars.get(key).cloned())
    }

    #[test]
    fn test_parse_toml() {
        let config = CamscanConfig::parse(
            r#"
            [scanner]
            user_agent = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)"
            submit_delay_ms = 0
            rear_keywords = ["back", "world"]

            [logging]
            level = "debug"
            rotation = "daily"
            "#,
            "toml",
        )
        .expect("toml");

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.rotation, Some(LogRotation::Daily));

        let settings = config.scan_settings().expect("settings");
        assert!(settings.user_agent.is_mobile());
        assert_eq!(settings.submit_delay, Duration::ZERO);
        assert_eq!(settings.refocus_delay, Duration::from_millis(300));
        assert_eq!(settings.rear_keywords, vec!["back", "world"]);
    }

    #[test]
    fn test_parse_yaml() {
        let config = CamscanConfig::parse(
            "scanner:\n  device: /dev/video2\n  vibration_pattern: []\napi:\n  unix_socket: /tmp/camscan.sock\n",
            "yaml",
        )
        .expect("yaml");

        let settings = config.scan_settings().expect("settings");
        assert_eq!(settings.forced_device.as_deref(), Some("/dev/video2"));
        assert!(settings.vibration_pattern.is_empty());
        assert_eq!(
            config.api.unix_socket,
            Some(PathBuf::from("/tmp/camscan.sock"))
        );
    }

    #[test]
    fn test_rejects_unknown_format() {
        assert!(CamscanConfig::parse("", "ini").is_err());
    }

    #[test]
    fn test_rejects_empty_keywords() {
        let options = ScannerOptions {
            rear_keywords: vec![" ".to_string()],
            ..Default::default()
        };
        assert!(options.to_scan_settings().is_err());
    }

    #[cfg(feature = "camera")]
    #[test]
    fn test_camera_overrides() {
        let options = CameraOptions {
            preset: Some("compatible".to_string()),
            fps: Some(0),
            format: Some("mjpg".to_string()),
            buffer_count: Some(1),
            ..Default::default()
        };
        let config = options.to_camera_config().expect("camera config");
        assert_eq!(config.width, 640);
        assert_eq!(config.fps, 1);
        assert_eq!(config.format, PixelFormat::Mjpeg);
        assert_eq!(config.buffer_count, 2);

        let bad = CameraOptions {
            format: Some("h264".to_string()),
            ..Default::default()
        };
        assert!(bad.to_camera_config().is_err());
    }

    #[test]
    fn test_env_overrides_replace_file_values() {
        let mut config = CamscanConfig::default();
        config.camera.width = Some(1920);

        apply(
            &mut config,
            &[
                ("CAMSCAN_CAMERA_WIDTH", "640"),
                ("CAMSCAN_SUBMIT_DELAY_MS", "250"),
                ("CAMSCAN_LOG_ROTATION", "hourly"),
                ("CAMSCAN_DEVICE", " "),
            ],
        )
        .expect("overrides");

        assert_eq!(config.camera.width, Some(640));
        assert_eq!(config.scanner.submit_delay_ms, 250);
        assert_eq!(config.logging.rotation, Some(LogRotation::Hourly));
        assert_eq!(config.scanner.device, None);
    }

    #[test]
    fn test_invalid_env_values_are_rejected() {
        let mut config = CamscanConfig::default();
        config.camera.width = Some(1920);

        let err = apply(&mut config, &[("CAMSCAN_CAMERA_WIDTH", "wide")]).expect_err("width");
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("CAMSCAN_CAMERA_WIDTH")));
        assert_eq!(config.camera.width, Some(1920), "file value kept");

        for (key, value) in [
            ("CAMSCAN_CAMERA_FPS", "-1"),
            ("CAMSCAN_CAMERA_BUFFERS", "many"),
            ("CAMSCAN_SUBMIT_DELAY_MS", "soon"),
            ("CAMSCAN_REFOCUS_DELAY_MS", "1.5"),
            ("CAMSCAN_LOG_COLOR", "sometimes"),
            ("CAMSCAN_LOG_ROTATION", "weekly"),
        ] {
            let mut config = CamscanConfig::default();
            assert!(
                apply(&mut config, &[(key, value)]).is_err(),
                "{key}={value} should be rejected"
            );
        }
    }
}
