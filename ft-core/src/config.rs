//! User configuration
//!
//! A small JSON file; every field has a default so a missing file or a
//! partial file both work.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ft_error::{FwtapError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants::{defaults, paths, usb};
use crate::usb::DeviceSignature;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// adb executable
    pub adb_path: PathBuf,
    /// lsusb executable, used when sysfs is unavailable
    pub lsusb_path: PathBuf,
    /// USB device registry root
    pub usb_sysfs_root: PathBuf,
    /// Deadline for short bridge commands
    pub command_timeout_secs: u64,
    /// Deadline for the whole streamed copy; unlimited when absent
    pub copy_timeout_secs: Option<u64>,
    /// Size assumed for progress reporting when discovery fails
    pub fallback_partition_size: u64,
    /// Partition paths to try, most specific first
    pub partition_candidates: Vec<String>,
    /// USB vendor id of the device in DFU mode
    pub dfu_vendor_id: u16,
    /// USB product id of the device in DFU mode
    pub dfu_product_id: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            adb_path: PathBuf::from(paths::ADB),
            lsusb_path: PathBuf::from(paths::LSUSB),
            usb_sysfs_root: PathBuf::from(paths::USB_SYSFS_ROOT),
            command_timeout_secs: defaults::COMMAND_TIMEOUT_SECS,
            copy_timeout_secs: None,
            fallback_partition_size: defaults::FALLBACK_PARTITION_SIZE,
            partition_candidates: paths::MODEM_PARTITIONS.iter().map(|s| s.to_string()).collect(),
            dfu_vendor_id: usb::APPLE_VID,
            dfu_product_id: usb::DFU_PID,
        }
    }
}

impl Config {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn copy_timeout(&self) -> Option<Duration> {
        self.copy_timeout_secs.map(Duration::from_secs)
    }

    pub fn dfu_signature(&self) -> DeviceSignature {
        DeviceSignature::new(self.dfu_vendor_id, self.dfu_product_id)
    }

    /// Check value ranges after loading
    pub fn validate(&self) -> Result<()> {
        if self.command_timeout_secs == 0 {
            return Err(FwtapError::config("command_timeout_secs must be greater than 0"));
        }
        if self.copy_timeout_secs == Some(0) {
            return Err(FwtapError::config("copy_timeout_secs must be greater than 0 when set"));
        }
        if self.fallback_partition_size == 0 {
            return Err(FwtapError::config("fallback_partition_size must be greater than 0"));
        }
        if self.partition_candidates.is_empty() {
            return Err(FwtapError::config("partition_candidates must not be empty"));
        }
        if self.partition_candidates.len() > 64 {
            return Err(FwtapError::config("too many partition_candidates (max 64)"));
        }
        for (i, candidate) in self.partition_candidates.iter().enumerate() {
            crate::bridge::validate_remote_path(candidate).map_err(|e| {
                FwtapError::config(format!("partition_candidates[{}]: {}", i, e))
            })?;
        }
        Ok(())
    }
}

/// Default config location.
///
/// `FWTAP_CONFIG` wins, then `$XDG_CONFIG_HOME/fwtap`, then `~/.config/fwtap`,
/// then the platform config dir.
pub fn config_path() -> PathBuf {
    if let Ok(explicit) = env::var("FWTAP_CONFIG") {
        return PathBuf::from(explicit);
    }
    let base = if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg)
    } else if let Ok(home) = env::var("HOME") {
        Path::new(&home).join(".config")
    } else {
        dirs::config_dir().unwrap_or_else(|| PathBuf::from("/etc"))
    };
    base.join(paths::APP_DIR).join(paths::CONFIG_FILE)
}

/// Load and validate a config file; a missing file yields the defaults
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        debug!(path = %path.display(), "No config file, using defaults");
        return Ok(Config::default());
    }
    let data = fs::read_to_string(path).map_err(|e| FwtapError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let config: Config = serde_json::from_str(&data)?;
    config.validate()?;
    info!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Write a config file, creating its directory
pub fn save_config(path: &Path, config: &Config) -> Result<()> {
    config.validate()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json).map_err(|e| FwtapError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })
}
