//! Attached-device listing and property snapshots

use ft_error::{FwtapError, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::bridge::{AdbBridge, ShellBridge};

/// One line of `adb devices -l`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BridgeDevice {
    pub serial: String,
    pub state: String,
    pub model: Option<String>,
    pub product: Option<String>,
    pub authorized: bool,
}

/// Parse `adb devices -l` output.
///
/// The first line is a banner; each following line is
/// `serial state key:value...`.
pub fn parse_devices(listing: &str) -> Vec<BridgeDevice> {
    listing
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next()?;
            let state = parts.next()?;
            let mut device = BridgeDevice {
                serial: serial.to_string(),
                state: state.to_string(),
                model: None,
                product: None,
                authorized: state == "device",
            };
            for part in parts {
                if let Some(model) = part.strip_prefix("model:") {
                    device.model = Some(model.to_string());
                } else if let Some(product) = part.strip_prefix("product:") {
                    device.product = Some(product.to_string());
                }
            }
            Some(device)
        })
        .collect()
}

pub fn list_bridge_devices(bridge: &AdbBridge) -> Result<Vec<BridgeDevice>> {
    let devices = parse_devices(&bridge.devices_listing()?);
    debug!(count = devices.len(), "Listed bridge devices");
    Ok(devices)
}

/// Serial to target: the requested one, or the only authorized device
pub fn select_serial(devices: &[BridgeDevice], requested: Option<&str>) -> Result<String> {
    if let Some(serial) = requested {
        return match devices.iter().find(|d| d.serial == serial) {
            Some(d) if !d.authorized => Err(FwtapError::BridgeUnavailable(format!(
                "device {} is {}",
                d.serial, d.state
            ))),
            Some(d) => Ok(d.serial.clone()),
            None => Err(FwtapError::BridgeUnavailable(format!("device {} is not attached", serial))),
        };
    }
    let authorized: Vec<&BridgeDevice> = devices.iter().filter(|d| d.authorized).collect();
    match authorized.as_slice() {
        [only] => {
            info!(serial = %only.serial, "Auto-selected device");
            Ok(only.serial.clone())
        }
        [] if devices.is_empty() => Err(FwtapError::BridgeUnavailable("no device attached".into())),
        [] => Err(FwtapError::BridgeUnavailable(format!(
            "no authorized device ({} attached, accept the debugging prompt on the device)",
            devices.len()
        ))),
        _ => Err(FwtapError::BridgeUnavailable(format!(
            "{} devices attached, choose one with -s",
            authorized.len()
        ))),
    }
}

/// Value of a system property; unset, empty and failed reads are `None`
pub fn getprop(bridge: &dyn ShellBridge, name: &str) -> Option<String> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if !valid {
        return None;
    }
    match bridge.shell(&format!("getprop {}", name)) {
        Ok(out) if out.success => {
            let value = out.stdout.trim();
            (!value.is_empty()).then(|| value.to_string())
        }
        Ok(_) => None,
        Err(e) => {
            debug!(property = name, "getprop failed: {}", e);
            None
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModemInfo {
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub baseband_version: Option<String>,
    pub ril_version: Option<String>,
}

impl ModemInfo {
    pub fn collect(bridge: &dyn ShellBridge) -> Self {
        Self {
            manufacturer: getprop(bridge, "ro.product.manufacturer"),
            model: getprop(bridge, "ro.product.model"),
            baseband_version: getprop(bridge, "gsm.version.baseband"),
            ril_version: getprop(bridge, "gsm.version.ril-impl"),
        }
    }

    pub fn rows(&self) -> Vec<(&'static str, Option<&str>)> {
        vec![
            ("Manufacturer", self.manufacturer.as_deref()),
            ("Model", self.model.as_deref()),
            ("Baseband", self.baseband_version.as_deref()),
            ("RIL", self.ril_version.as_deref()),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SecurityInfo {
    pub fingerprint: Option<String>,
    pub verified_boot: Option<String>,
    pub flash_locked: Option<String>,
    pub warranty_bit: Option<String>,
    pub selinux: Option<String>,
    pub debuggable: Option<String>,
    pub secure: Option<String>,
}

impl SecurityInfo {
    pub fn collect(bridge: &dyn ShellBridge) -> Self {
        Self {
            fingerprint: getprop(bridge, "ro.build.fingerprint"),
            verified_boot: getprop(bridge, "ro.boot.verifiedbootstate"),
            flash_locked: getprop(bridge, "ro.boot.flash.locked"),
            warranty_bit: getprop(bridge, "ro.boot.warranty_bit"),
            selinux: getprop(bridge, "ro.build.selinux"),
            debuggable: getprop(bridge, "ro.debuggable"),
            secure: getprop(bridge, "ro.secure"),
        }
    }

    pub fn rows(&self) -> Vec<(&'static str, Option<&str>)> {
        vec![
            ("Build", self.fingerprint.as_deref()),
            ("Verified Boot", self.verified_boot.as_deref()),
            ("Bootloader Locked", self.flash_locked.as_deref()),
            ("Warranty", self.warranty_bit.as_deref()),
            ("SELinux", self.selinux.as_deref()),
            ("Debuggable", self.debuggable.as_deref()),
            ("Secure", self.secure.as_deref()),
        ]
    }
}
