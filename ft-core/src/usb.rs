//! USB device presence detection
//!
//! Finds a device in a given mode (for example DFU) by its vendor/product
//! signature among everything currently attached.
//!
//! # Enumeration sources
//!
//! - **Linux sysfs**: `/sys/bus/usb/devices/*/idVendor`, `idProduct`, `serial`
//! - **lsusb**: text fallback, matching `ID vvvv:pppp` tokens
//!
//! Presence checks are best-effort and single-shot. An enumeration failure
//! reads as "not present"; callers that want to wait retry on their own.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use std::time::Duration;

use ft_error::Result;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::process;

/// Vendor/product pair identifying a device mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DeviceSignature {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl DeviceSignature {
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self { vendor_id, product_id }
    }
}

impl fmt::Display for DeviceSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

/// One enumerated device. Ids are optional because some registry entries
/// (hubs' interfaces, half-initialised devices) do not expose them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsbDeviceEntry {
    pub location: String,
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    pub serial: Option<String>,
}

impl UsbDeviceEntry {
    pub fn matches(&self, signature: DeviceSignature) -> bool {
        self.vendor_id == Some(signature.vendor_id) && self.product_id == Some(signature.product_id)
    }
}

/// Source of attached-device listings
pub trait DeviceEnumerator {
    fn enumerate(&self) -> Result<Vec<UsbDeviceEntry>>;
}

/// Reads the Linux USB device registry
#[derive(Debug, Clone)]
pub struct SysfsEnumerator {
    root: PathBuf,
}

impl SysfsEnumerator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn is_available(&self) -> bool {
        self.root.is_dir()
    }
}

fn read_attr(dir: &Path, name: &str) -> Option<String> {
    fs::read_to_string(dir.join(name))
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn read_hex_attr(dir: &Path, name: &str) -> Option<u16> {
    read_attr(dir, name).and_then(|s| u16::from_str_radix(&s, 16).ok())
}

impl DeviceEnumerator for SysfsEnumerator {
    fn enumerate(&self) -> Result<Vec<UsbDeviceEntry>> {
        let mut devices = Vec::new();
        trace!("Scanning USB devices in {:?}", self.root);

        for entry in fs::read_dir(&self.root)? {
            // One unreadable entry must not sink the scan
            let Ok(entry) = entry else { continue };
            let dir = entry.path();
            let device = UsbDeviceEntry {
                location: entry.file_name().to_string_lossy().into_owned(),
                vendor_id: read_hex_attr(&dir, "idVendor"),
                product_id: read_hex_attr(&dir, "idProduct"),
                serial: read_attr(&dir, "serial"),
            };
            trace!(location = %device.location, vendor = ?device.vendor_id, product = ?device.product_id, "USB entry");
            devices.push(device);
        }

        debug!("Enumerated {} USB registry entries", devices.len());
        Ok(devices)
    }
}

/// Parses `lsusb` output
#[derive(Debug, Clone)]
pub struct LsusbEnumerator {
    program: PathBuf,
    timeout: Duration,
}

impl LsusbEnumerator {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self { program: program.into(), timeout }
    }
}

fn lsusb_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\bID ([0-9A-Fa-f]{4}):([0-9A-Fa-f]{4})\b").expect("static regex is valid")
    })
}

/// Extract devices from `lsusb` text. Lines without an `ID` token are skipped.
pub fn parse_lsusb(output: &str) -> Vec<UsbDeviceEntry> {
    output
        .lines()
        .filter_map(|line| {
            let caps = lsusb_id_regex().captures(line)?;
            let location = line.split_once(": ID").map(|(loc, _)| loc.trim()).unwrap_or("");
            Some(UsbDeviceEntry {
                location: location.to_string(),
                vendor_id: u16::from_str_radix(&caps[1], 16).ok(),
                product_id: u16::from_str_radix(&caps[2], 16).ok(),
                serial: None,
            })
        })
        .collect()
}

impl DeviceEnumerator for LsusbEnumerator {
    fn enumerate(&self) -> Result<Vec<UsbDeviceEntry>> {
        let out = process::run_with_timeout(Command::new(&self.program), self.timeout)?;
        let text = String::from_utf8_lossy(&out.stdout);
        Ok(parse_lsusb(&text))
    }
}

/// sysfs when the registry is mounted, `lsusb` otherwise
#[derive(Debug, Clone)]
pub struct PlatformEnumerator {
    sysfs: SysfsEnumerator,
    lsusb: LsusbEnumerator,
}

impl PlatformEnumerator {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sysfs: SysfsEnumerator::new(&config.usb_sysfs_root),
            lsusb: LsusbEnumerator::new(&config.lsusb_path, config.command_timeout()),
        }
    }
}

impl DeviceEnumerator for PlatformEnumerator {
    fn enumerate(&self) -> Result<Vec<UsbDeviceEntry>> {
        if self.sysfs.is_available() {
            self.sysfs.enumerate()
        } else {
            debug!("USB sysfs registry not available, falling back to lsusb");
            self.lsusb.enumerate()
        }
    }
}

/// First attached device matching `signature`
pub fn find_device(enumerator: &dyn DeviceEnumerator, signature: DeviceSignature) -> Option<UsbDeviceEntry> {
    let devices = match enumerator.enumerate() {
        Ok(devices) => devices,
        Err(e) => {
            warn!("USB enumeration failed: {}", e);
            return None;
        }
    };
    let found = devices.into_iter().find(|d| d.matches(signature));
    if let Some(device) = &found {
        info!(%signature, location = %device.location, "Found device");
    }
    found
}

/// Whether a device matching `signature` is attached right now
pub fn detect_presence(enumerator: &dyn DeviceEnumerator, signature: DeviceSignature) -> bool {
    find_device(enumerator, signature).is_some()
}

/// Identity fields a DFU-mode device advertises in its USB serial string, e.g.
/// `CPID:8010 CPRV:11 CPFM:03 SCEP:01 BDID:08 ECID:001A2B3C4D5E6F70 IBFL:3C SRTG:[iBoot-2696.0.0.1.33]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DfuIdentity {
    pub cpid: u16,
    pub cprv: Option<u8>,
    pub ecid: Option<u64>,
    pub srtg: Option<String>,
}

impl DfuIdentity {
    /// `None` unless the string carries a CPID
    pub fn parse(serial: &str) -> Option<Self> {
        let mut cpid = None;
        let mut cprv = None;
        let mut ecid = None;
        let mut srtg = None;

        for token in serial.split_whitespace() {
            let Some((key, value)) = token.split_once(':') else { continue };
            match key {
                "CPID" => cpid = u16::from_str_radix(value, 16).ok(),
                "CPRV" => cprv = u8::from_str_radix(value, 16).ok(),
                "ECID" => ecid = u64::from_str_radix(value, 16).ok(),
                "SRTG" => {
                    srtg = Some(value.trim_start_matches('[').trim_end_matches(']').to_string())
                }
                _ => {}
            }
        }

        cpid.map(|cpid| Self { cpid, cprv, ecid, srtg })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::TempDir;

    const DFU: DeviceSignature = DeviceSignature::new(0x05ac, 0x1227);

    fn add_device(root: &Path, name: &str, ids: Option<(&str, &str)>, serial: Option<&str>) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        if let Some((vid, pid)) = ids {
            fs::write(dir.join("idVendor"), format!("{}\n", vid)).unwrap();
            fs::write(dir.join("idProduct"), format!("{}\n", pid)).unwrap();
        }
        if let Some(serial) = serial {
            fs::write(dir.join("serial"), serial).unwrap();
        }
    }

    struct FailingEnumerator;

    impl DeviceEnumerator for FailingEnumerator {
        fn enumerate(&self) -> Result<Vec<UsbDeviceEntry>> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no access").into())
        }
    }

    struct CountingEnumerator {
        devices: Vec<UsbDeviceEntry>,
        calls: Cell<usize>,
    }

    impl DeviceEnumerator for CountingEnumerator {
        fn enumerate(&self) -> Result<Vec<UsbDeviceEntry>> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.devices.clone())
        }
    }

    #[test]
    fn test_sysfs_detects_dfu_device() {
        let root = TempDir::new().unwrap();
        add_device(root.path(), "usb1", Some(("1d6b", "0002")), None);
        add_device(root.path(), "1-1", Some(("05ac", "1227")), Some("CPID:8010 CPRV:11 ECID:001A2B3C4D5E6F70"));
        let enumerator = SysfsEnumerator::new(root.path());
        assert!(detect_presence(&enumerator, DFU));

        let device = find_device(&enumerator, DFU).unwrap();
        assert_eq!(device.location, "1-1");
        assert!(device.serial.unwrap().starts_with("CPID:8010"));
    }

    #[test]
    fn test_sysfs_skips_entries_without_ids() {
        let root = TempDir::new().unwrap();
        add_device(root.path(), "1-1:1.0", None, None);
        add_device(root.path(), "1-2", Some(("zzzz", "1227")), None);
        add_device(root.path(), "1-3", Some(("05ac", "12a8")), None);
        let enumerator = SysfsEnumerator::new(root.path());

        let devices = enumerator.enumerate().unwrap();
        assert_eq!(devices.len(), 3);
        assert!(devices.iter().any(|d| d.vendor_id.is_none()));
        assert!(!detect_presence(&enumerator, DFU));
    }

    #[test]
    fn test_missing_registry_is_not_present() {
        let enumerator = SysfsEnumerator::new("/nonexistent/fwtap/usb");
        assert!(!enumerator.is_available());
        assert!(!detect_presence(&enumerator, DFU));
    }

    #[test]
    fn test_enumeration_failure_is_not_fatal() {
        assert!(!detect_presence(&FailingEnumerator, DFU));
    }

    #[test]
    fn test_single_attempt_per_check() {
        let enumerator = CountingEnumerator { devices: Vec::new(), calls: Cell::new(0) };
        assert!(!detect_presence(&enumerator, DFU));
        assert_eq!(enumerator.calls.get(), 1);
    }

    #[test]
    fn test_parse_lsusb() {
        let text = "\
Bus 002 Device 001: ID 1d6b:0003 Linux Foundation 3.0 root hub
Bus 001 Device 007: ID 05ac:1227 Apple, Inc. Mobile Device (DFU Mode)
garbage line without identifiers
";
        let devices = parse_lsusb(text);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[1].location, "Bus 001 Device 007");
        assert!(devices[1].matches(DFU));
        assert!(!devices[0].matches(DFU));
    }

    #[test]
    fn test_parse_lsusb_is_case_insensitive_on_hex() {
        let devices = parse_lsusb("Bus 001 Device 003: ID 05AC:1227 Apple");
        assert!(devices[0].matches(DFU));
    }

    #[test]
    fn test_signature_display() {
        assert_eq!(DFU.to_string(), "05ac:1227");
    }

    #[test]
    fn test_dfu_identity_parse() {
        let id = DfuIdentity::parse(
            "CPID:8010 CPRV:11 CPFM:03 SCEP:01 BDID:08 ECID:001A2B3C4D5E6F70 IBFL:3C SRTG:[iBoot-2696.0.0.1.33]",
        )
        .unwrap();
        assert_eq!(id.cpid, 0x8010);
        assert_eq!(id.cprv, Some(0x11));
        assert_eq!(id.ecid, Some(0x001A2B3C4D5E6F70));
        assert_eq!(id.srtg.as_deref(), Some("iBoot-2696.0.0.1.33"));
    }

    #[test]
    fn test_dfu_identity_requires_cpid() {
        assert!(DfuIdentity::parse("ECID:0011 SRTG:[iBoot]").is_none());
        assert!(DfuIdentity::parse("").is_none());
    }
}
