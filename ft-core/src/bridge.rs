//! Debug bridge access
//!
//! Two seams sit between the orchestration code and a real device:
//!
//! - [`ShellBridge`]: run a command on the device and capture its text output
//! - [`BlockCopier`]: stream the raw bytes of a device path into a local file
//!
//! [`AdbBridge`] implements both on top of the `adb` executable. Tests swap in
//! mocks so no device is needed.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use ft_error::{FwtapError, Result};
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::process::{self, ProcessOutput};

/// Captured text output of a device-side command.
///
/// `success` reflects the exit status; a command that ran but failed is
/// `Ok` with `success == false`, while a bridge that could not run it at all
/// is an `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutput {
    pub success: bool,
    pub stdout: String,
}

impl ShellOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self { success: true, stdout: stdout.into() }
    }
}

/// Run a command on the attached device
#[cfg_attr(test, mockall::automock)]
pub trait ShellBridge {
    fn shell(&self, command: &str) -> Result<ShellOutput>;
}

/// Completion status reported by a block copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyStatus {
    pub success: bool,
    pub bytes: u64,
    pub detail: String,
}

/// Stream a device path into a local file
pub trait BlockCopier {
    fn copy(
        &self,
        source: &str,
        destination: &Path,
        progress: &mut dyn FnMut(u64),
    ) -> Result<CopyStatus>;
}

/// Reject device paths that are unsafe to splice into a remote shell command
pub fn validate_remote_path(path: &str) -> Result<()> {
    if !path.starts_with('/') {
        return Err(FwtapError::invalid_path(path, "must be absolute"));
    }
    if path.len() > 256 {
        return Err(FwtapError::invalid_path(path, "too long"));
    }
    if path.split('/').any(|seg| seg == "..") {
        return Err(FwtapError::invalid_path(path, "contains '..'"));
    }
    let safe = path
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | ':' | '@' | '+' | ','));
    if !safe {
        return Err(FwtapError::invalid_path(path, "contains shell metacharacters"));
    }
    Ok(())
}

/// `adb`-backed bridge
#[derive(Debug, Clone)]
pub struct AdbBridge {
    adb: PathBuf,
    serial: Option<String>,
    timeout: Duration,
    copy_timeout: Option<Duration>,
    cancel: CancelToken,
}

impl AdbBridge {
    pub fn new(config: &Config, serial: Option<String>, cancel: CancelToken) -> Self {
        Self {
            adb: config.adb_path.clone(),
            serial,
            timeout: config.command_timeout(),
            copy_timeout: config.copy_timeout(),
            cancel,
        }
    }

    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    /// Target a specific device for subsequent commands
    pub fn with_serial(mut self, serial: Option<String>) -> Self {
        self.serial = serial;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.adb);
        if let Some(serial) = &self.serial {
            cmd.args(["-s", serial]);
        }
        cmd
    }

    fn run(&self, args: &[&str]) -> Result<ProcessOutput> {
        let mut cmd = self.command();
        cmd.args(args);
        process::run_with_timeout(cmd, self.timeout)
    }

    /// Check that the adb executable runs at all
    pub fn check_available(&self) -> Result<String> {
        let out = self.run(&["version"])?;
        if !out.success {
            return Err(FwtapError::BridgeUnavailable(out.stderr.trim().to_string()));
        }
        let text = String::from_utf8_lossy(&out.stdout);
        Ok(text.lines().next().unwrap_or_default().trim().to_string())
    }

    /// Raw `adb devices -l` listing
    pub fn devices_listing(&self) -> Result<String> {
        let out = self.run(&["devices", "-l"])?;
        if !out.success {
            return Err(FwtapError::command("adb devices -l", out.stderr.trim().to_string()));
        }
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }
}

impl ShellBridge for AdbBridge {
    fn shell(&self, command: &str) -> Result<ShellOutput> {
        self.cancel.check()?;
        let out = self.run(&["shell", command])?;
        let stdout = String::from_utf8_lossy(&out.stdout).trim_end().to_string();
        debug!(command, success = out.success, "adb shell");
        Ok(ShellOutput { success: out.success, stdout })
    }
}

impl BlockCopier for AdbBridge {
    fn copy(
        &self,
        source: &str,
        destination: &Path,
        progress: &mut dyn FnMut(u64),
    ) -> Result<CopyStatus> {
        validate_remote_path(source)?;
        // exec-out keeps the byte stream untouched; `shell` may rewrite line endings
        let remote = format!("su -c 'dd if={}' 2>/dev/null", source);
        let mut cmd = self.command();
        cmd.args(["exec-out", &remote]);

        let file = File::create(destination).map_err(|e| FwtapError::FileWrite {
            path: destination.to_path_buf(),
            source: e,
        })?;
        let mut sink = BufWriter::new(file);

        info!(source, destination = %destination.display(), "Streaming partition");
        let outcome = process::stream_to_writer(cmd, &mut sink, self.copy_timeout, &self.cancel, progress)?;
        Ok(CopyStatus {
            success: outcome.success,
            bytes: outcome.bytes,
            detail: outcome.stderr.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_remote_path_accepts_block_paths() {
        for p in crate::constants::paths::MODEM_PARTITIONS {
            assert!(validate_remote_path(p).is_ok(), "{}", p);
        }
        assert!(validate_remote_path("/dev/block/mmcblk0p12").is_ok());
    }

    #[test]
    fn test_validate_remote_path_rejects_injection() {
        assert!(validate_remote_path("dev/block/modem").is_err());
        assert!(validate_remote_path("/dev/block/modem; rm -rf /").is_err());
        assert!(validate_remote_path("/dev/block/$(id)").is_err());
        assert!(validate_remote_path("/dev/block/'modem'").is_err());
        assert!(validate_remote_path("/dev/../etc/passwd").is_err());
    }

    #[test]
    fn test_adb_bridge_serial_selection() {
        let config = Config::default();
        let bridge = AdbBridge::new(&config, None, CancelToken::new());
        assert_eq!(bridge.serial(), None);
        let bridge = bridge.with_serial(Some("R58M".into()));
        assert_eq!(bridge.serial(), Some("R58M"));
        let cmd = bridge.command();
        assert_eq!(process::describe(&cmd), "adb -s R58M");
    }

    #[test]
    fn test_missing_adb_is_reported() {
        let config = Config {
            adb_path: PathBuf::from("/nonexistent/fwtap-adb"),
            ..Config::default()
        };
        let bridge = AdbBridge::new(&config, None, CancelToken::new());
        assert!(matches!(
            bridge.shell("id"),
            Err(FwtapError::BridgeUnavailable(_))
        ));
    }
}
