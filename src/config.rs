// ABOUTME: Device configuration profile loaded from a gammurc-style INI file
// ABOUTME: Locates the file among the explicit path and the system, home and executable-directory candidates

use crate::client::error::{GsmError, GsmResult};
use crate::client::types::SubmitOptions;
use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Base name used for every configuration candidate.
pub const CONFIG_NAME: &str = "gsm-sender";

/// Baud rate used when the connection is plain `at`.
pub const DEFAULT_BAUD_RATE: u32 = 19200;

fn default_connection() -> String {
    "at".to_string()
}

fn default_reply_timeout() -> u64 {
    5
}

/// Settings needed to reach the modem. Read from the `[gammu]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// Serial device path, e.g. `/dev/ttyUSB0`
    #[serde(alias = "port")]
    pub device: String,
    /// `at` or `at<baud>`, e.g. `at115200`
    #[serde(default = "default_connection")]
    pub connection: String,
    /// Model hint; only logged
    #[serde(default)]
    pub model: Option<String>,
    /// Seconds to wait for the reply to a command
    #[serde(default = "default_reply_timeout")]
    pub reply_timeout: u64,
    /// Seconds to wait for a send status before giving up; unbounded if absent
    #[serde(default)]
    pub submit_timeout: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    gammu: DeviceConfig,
}

impl DeviceConfig {
    /// Minimal profile for `device` with every default applied.
    pub fn new(device: impl Into<String>) -> Self {
        DeviceConfig {
            device: device.into(),
            connection: default_connection(),
            model: None,
            reply_timeout: default_reply_timeout(),
            submit_timeout: None,
        }
    }

    /// Reads and validates the profile in `path`.
    pub fn from_file(path: &Path) -> GsmResult<Self> {
        if !path.is_file() {
            return Err(GsmError::ConfigNotFound(path.display().to_string()));
        }

        let parse_error = |reason: String| GsmError::ConfigParse {
            path: path.display().to_string(),
            reason,
        };

        let file: ConfigFile = Config::builder()
            .add_source(File::from(path).format(FileFormat::Ini))
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| parse_error(e.to_string()))?;

        file.gammu.validate().map_err(parse_error)?;
        debug!(path = %path.display(), device = %file.gammu.device, "configuration loaded");

        Ok(file.gammu)
    }

    fn validate(&self) -> Result<(), String> {
        if self.device.trim().is_empty() {
            return Err("device is empty".to_string());
        }
        if parse_baud_rate(&self.connection).is_none() {
            return Err(format!("unsupported connection {:?}", self.connection));
        }
        if self.reply_timeout == 0 {
            return Err("reply_timeout must be at least 1 second".to_string());
        }
        Ok(())
    }

    pub fn baud_rate(&self) -> u32 {
        parse_baud_rate(&self.connection).unwrap_or(DEFAULT_BAUD_RATE)
    }

    pub fn model_hint(&self) -> Option<&str> {
        self.model.as_deref().filter(|m| !m.trim().is_empty())
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout)
    }

    pub fn submit_options(&self) -> SubmitOptions {
        match self.submit_timeout {
            Some(secs) => SubmitOptions::default().with_timeout(Duration::from_secs(secs)),
            None => SubmitOptions::default(),
        }
    }
}

fn parse_baud_rate(connection: &str) -> Option<u32> {
    let rest = connection.trim().to_ascii_lowercase();
    let rest = rest.strip_prefix("at")?;
    if rest.is_empty() {
        return Some(DEFAULT_BAUD_RATE);
    }
    rest.parse().ok().filter(|&baud| baud > 0)
}

/// Finds the configuration file.
///
/// An explicit path is authoritative: when given, it is the only candidate.
/// Otherwise the system, home and executable-directory locations are tried in
/// that order and the first existing file wins.
#[derive(Debug, Clone, Default)]
pub struct ConfigLocator {
    explicit: Option<PathBuf>,
    system_dir: Option<PathBuf>,
    home_dir: Option<PathBuf>,
    exe_dir: Option<PathBuf>,
}

impl ConfigLocator {
    /// Locator with no candidate directories.
    pub fn new(explicit: Option<PathBuf>) -> Self {
        ConfigLocator {
            explicit,
            ..Default::default()
        }
    }

    /// Locator for the running process: `/etc`, the user's home and the
    /// directory holding the executable.
    pub fn from_env(explicit: Option<PathBuf>) -> Self {
        ConfigLocator {
            explicit,
            system_dir: Some(PathBuf::from("/etc")),
            home_dir: dirs::home_dir(),
            exe_dir: std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf)),
        }
    }

    pub fn system_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.system_dir = Some(dir.into());
        self
    }

    pub fn home_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(dir.into());
        self
    }

    pub fn exe_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.exe_dir = Some(dir.into());
        self
    }

    /// Candidate paths in the order they are tried.
    pub fn candidates(&self) -> Vec<PathBuf> {
        if let Some(explicit) = &self.explicit {
            return vec![explicit.clone()];
        }

        let file_name = format!("{CONFIG_NAME}.conf");
        let mut candidates = Vec::with_capacity(3);
        if let Some(dir) = &self.system_dir {
            candidates.push(dir.join(&file_name));
        }
        if let Some(dir) = &self.home_dir {
            candidates.push(dir.join(format!(".{file_name}")));
        }
        if let Some(dir) = &self.exe_dir {
            candidates.push(dir.join(&file_name));
        }
        candidates
    }

    /// First existing candidate, or `ConfigNotFound` listing what was tried.
    pub fn resolve(&self) -> GsmResult<PathBuf> {
        let candidates = self.candidates();
        for candidate in &candidates {
            if candidate.is_file() {
                debug!(path = %candidate.display(), "using configuration");
                return Ok(candidate.clone());
            }
        }

        let tried = candidates
            .iter()
            .map(|c| c.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(GsmError::ConfigNotFound(tried))
    }
}
