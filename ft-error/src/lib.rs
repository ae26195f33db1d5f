//! Error type shared by the fwtap crates
//!
//! Every failure the core can report is a variant here, grouped by the stage
//! that raises it. [`FwtapError::hint`] carries the next step to suggest.

use std::io;
use std::path::PathBuf;

/// Result type alias using FwtapError
pub type Result<T> = std::result::Result<T, FwtapError>;

/// Unified error type for all fwtap operations
#[derive(thiserror::Error, Debug)]
pub enum FwtapError {
    // ============================================================================
    // Identification Errors
    // ============================================================================
    #[error("Unknown device CPID: 0x{cpid:04X}")]
    UnknownDevice { cpid: u16 },

    #[error("Device {name} (CPID 0x{cpid:04X}) is NOT vulnerable")]
    NotVulnerable { cpid: u16, name: String },

    #[error("No device matching {vendor_id:04x}:{product_id:04x} is attached")]
    DeviceNotPresent { vendor_id: u16, product_id: u16 },

    #[error("A credential is required to continue")]
    CredentialRequired,

    #[error("Authentication failed: {0}")]
    AuthenticationFailure(String),

    // ============================================================================
    // Extraction Errors
    // ============================================================================
    #[error("No candidate partition exists on the device (tried {})", tried.join(", "))]
    ResourceNotFound { tried: Vec<String> },

    #[error("Root access required on device (`id` returned: {id_output:?})")]
    InsufficientPrivilege { id_output: String },

    #[error("Could not determine size of {partition}: {reason}")]
    SizeDiscoveryFailed { partition: String, reason: String },

    #[error("Copy of {source_path} failed: {reason}")]
    CopyFailed { source_path: String, reason: String },

    #[error("Copy reported success but {0} is missing or empty")]
    EmptyOutputAfterCopy(PathBuf),

    // ============================================================================
    // Analysis Errors
    // ============================================================================
    #[error("File is too short for a header: {actual} bytes (need {expected})")]
    TruncatedHeader { expected: usize, actual: usize },

    // ============================================================================
    // Bridge and Process Errors
    // ============================================================================
    #[error("Debug bridge unavailable: {0}")]
    BridgeUnavailable(String),

    #[error("Command `{command}` failed: {reason}")]
    CommandFailed { command: String, reason: String },

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Operation cancelled")]
    Cancelled,

    // ============================================================================
    // I/O, Path and Configuration Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Invalid path {path}: {reason}")]
    InvalidPath {
        path: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl FwtapError {
    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid path error
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a command failure from a command line and a reason
    pub fn command(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Next-step guidance shown to the user alongside the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::UnknownDevice { .. } => {
                Some("Run `fwtap chips --all` to see every known CPID")
            }
            Self::NotVulnerable { .. } => {
                Some("This chip has a patched boot ROM; nothing further can be done")
            }
            Self::DeviceNotPresent { .. } => Some(
                "To enter DFU mode:\n    1. Connect device to computer\n    2. Hold Power + Home (or Volume Down on newer)\n    3. Release Power after 10 seconds\n    4. Keep holding Home/Volume for 5 more seconds",
            ),
            Self::CredentialRequired => Some("Supply a credential with --key"),
            Self::AuthenticationFailure(_) => Some("Check the credential passed with --key"),
            Self::ResourceNotFound { .. } => Some("Try specifying the partition with -p <path>"),
            Self::InsufficientPrivilege { .. } => Some("Try: adb shell su"),
            Self::SizeDiscoveryFailed { .. } => None,
            Self::CopyFailed { .. } | Self::EmptyOutputAfterCopy(_) => {
                Some("Check that the device is still connected and `adb exec-out` works")
            }
            Self::TruncatedHeader { .. } => Some("The file does not look like a complete dump"),
            Self::BridgeUnavailable(_) => Some(
                "Check `adb devices`. Pass -s <serial> when several are attached; install Android platform-tools if `adb` is missing",
            ),
            Self::Timeout(_) => Some("Raise command_timeout_secs in the config file"),
            _ => None,
        }
    }
}
