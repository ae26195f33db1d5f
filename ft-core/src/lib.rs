//! fwtap Core Library
//!
//! Chip identification and firmware partition extraction.
//!
//! # Features
//!
//! - **Capability Registry**: Static table of known chips and their boot ROM status
//! - **Presence Detection**: USB enumeration for a device in DFU mode
//! - **Partition Discovery**: First-match probing of candidate paths over adb
//! - **Extraction**: Privileged streamed copy with size discovery and verification
//! - **Analysis**: Header decoding and printable string scanning of a dump
//!
//! # Module Structure
//!
//! - `registry`, `identify`, `capability` - Chip identification
//! - `usb` - Device presence detection
//! - `bridge`, `process`, `locator`, `extract`, `props` - Device access over adb
//! - `analyze` - Offline dump analysis
//!
//! # Example
//!
//! ```no_run
//! use ft_core::{analyze, assess};
//!
//! println!("{}", assess(0x8010).message());
//! let report = analyze(std::path::Path::new("modem.bin")).unwrap();
//! println!("{} strings", report.string_count);
//! ```

pub mod analyze;
pub mod bridge;
pub mod cancel;
pub mod capability;
pub mod config;
pub mod constants;
pub mod extract;
pub mod identify;
pub mod locator;
pub mod process;
pub mod props;
pub mod registry;
pub mod usb;

// Re-export error types
pub use ft_error::{FwtapError, Result};

// Re-export identification
pub use capability::{CapabilityGate, Credential, DecryptedPayload, PayloadCipher, UnlinkedCipher};
pub use identify::{identify, require_vulnerable, IdentifyOutcome};
pub use registry::{assess, is_vulnerable, lookup, parse_cpid, Assessment, CapabilityRecord};

// Re-export presence detection
pub use usb::{
    detect_presence, find_device, DeviceEnumerator, DeviceSignature, DfuIdentity,
    PlatformEnumerator, UsbDeviceEntry,
};

// Re-export device access
pub use bridge::{AdbBridge, BlockCopier, CopyStatus, ShellBridge, ShellOutput};
pub use cancel::CancelToken;
pub use extract::{ExtractProgress, ExtractionReport, Extractor, NoProgress, SizeSource, Stage};
pub use locator::{locate, locate_or_err};
pub use props::{list_bridge_devices, select_serial, BridgeDevice, ModemInfo, SecurityInfo};

// Re-export analysis
pub use analyze::{analyze, AnalysisReport, BinaryHeader, StringRun};

// Re-export config
pub use config::{config_path, load_config, save_config, Config};
