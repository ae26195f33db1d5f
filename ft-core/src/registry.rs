//! Capability registry
//!
//! Static table of known application-processor chips keyed by CPID, with
//! whether the boot ROM is exploitable and which OS versions it shipped with.
//! The table is a plain `static` slice: built at compile time, never mutated,
//! safe to read from any thread.

use serde::Serialize;

/// One known chip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilityRecord {
    pub cpid: u16,
    pub name: &'static str,
    pub vulnerable: bool,
    pub ios_range: &'static str,
}

const fn chip(cpid: u16, name: &'static str, vulnerable: bool, ios_range: &'static str) -> CapabilityRecord {
    CapabilityRecord { cpid, name, vulnerable, ios_range }
}

// The slice bound is the terminator; CPID 0 is not a chip and never matches.
static CHIPS: &[CapabilityRecord] = &[
    chip(0x8960, "A7 (iPhone 5s)", true, "7.0 - 12.5.7"),
    chip(0x7000, "A8 (iPhone 6)", true, "8.0 - 12.5.7"),
    chip(0x7001, "A8X (iPad Air 2)", true, "8.1 - 12.5.7"),
    chip(0x8000, "A9 (iPhone 6s)", true, "9.0 - 14.8.1"),
    chip(0x8003, "A9 (iPhone SE)", true, "9.3 - 14.8.1"),
    chip(0x8001, "A9X (iPad Pro)", true, "9.1 - 14.8.1"),
    chip(0x8010, "A10 (iPhone 7)", true, "10.0 - 15.7.1"),
    chip(0x8011, "A10X (iPad Pro 2)", true, "10.3 - 15.7.1"),
    chip(0x8015, "A11 (iPhone X)", true, "11.0 - 16.7"),
    chip(0x8020, "A12 (iPhone XS)", false, "N/A - Patched"),
    chip(0x8030, "A13 (iPhone 11)", false, "N/A - Patched"),
];

/// Every known chip, in table order
pub fn records() -> &'static [CapabilityRecord] {
    CHIPS
}

/// Known chips with an exploitable boot ROM
pub fn vulnerable_records() -> impl Iterator<Item = &'static CapabilityRecord> {
    CHIPS.iter().filter(|r| r.vulnerable)
}

/// Find a chip by CPID
pub fn lookup(cpid: u16) -> Option<&'static CapabilityRecord> {
    CHIPS.iter().find(|r| r.cpid == cpid)
}

/// `None` for an unknown chip, otherwise its vulnerability flag
pub fn is_vulnerable(cpid: u16) -> Option<bool> {
    lookup(cpid).map(|r| r.vulnerable)
}

/// The three outcomes of checking a CPID against the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assessment {
    Unknown(u16),
    Patched(&'static CapabilityRecord),
    Vulnerable(&'static CapabilityRecord),
}

impl Assessment {
    /// User-facing summary; each outcome reads differently
    pub fn message(&self) -> String {
        match self {
            Assessment::Unknown(cpid) => format!("Unknown device CPID: 0x{:04X}", cpid),
            Assessment::Patched(r) => {
                format!("Device {} (CPID 0x{:04X}) is NOT vulnerable", r.name, r.cpid)
            }
            Assessment::Vulnerable(r) => format!(
                "Device {} (CPID 0x{:04X}) is vulnerable (iOS {})",
                r.name, r.cpid, r.ios_range
            ),
        }
    }
}

/// Classify a CPID
pub fn assess(cpid: u16) -> Assessment {
    match lookup(cpid) {
        None => Assessment::Unknown(cpid),
        Some(r) if r.vulnerable => Assessment::Vulnerable(r),
        Some(r) => Assessment::Patched(r),
    }
}

/// Parse a CPID given as `8010`, `0x8010` or `0X8010`
pub fn parse_cpid(s: &str) -> Option<u16> {
    let s = s.trim();
    let hex = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if hex.is_empty() || hex.len() > 4 {
        return None;
    }
    u16::from_str_radix(hex, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_lookup_returns_matching_identifier() {
        for record in records() {
            let found = lookup(record.cpid).expect("present");
            assert_eq!(found.cpid, record.cpid);
        }
    }

    #[test]
    fn test_lookup_unknown_is_none() {
        let known: HashSet<u16> = records().iter().map(|r| r.cpid).collect();
        for cpid in (0..=u16::MAX).step_by(7).filter(|c| !known.contains(c)) {
            assert!(lookup(cpid).is_none(), "0x{:04X} should be unknown", cpid);
        }
    }

    #[test]
    fn test_terminator_never_matches() {
        assert!(lookup(0).is_none());
        assert_eq!(is_vulnerable(0), None);
    }

    #[test]
    fn test_identifiers_are_unique() {
        let ids: HashSet<u16> = records().iter().map(|r| r.cpid).collect();
        assert_eq!(ids.len(), records().len());
    }

    #[test]
    fn test_lookup_is_idempotent() {
        assert_eq!(lookup(0x8010), lookup(0x8010));
        assert_eq!(assess(0x8010), assess(0x8010));
    }

    #[test]
    fn test_a9_is_vulnerable() {
        let r = lookup(0x8000).unwrap();
        assert_eq!(r.name, "A9 (iPhone 6s)");
        assert_eq!(r.ios_range, "9.0 - 14.8.1");
        assert_eq!(is_vulnerable(0x8000), Some(true));
        assert!(matches!(assess(0x8000), Assessment::Vulnerable(_)));
    }

    #[test]
    fn test_a12_is_patched_not_unknown() {
        assert_eq!(is_vulnerable(0x8020), Some(false));
        assert!(matches!(assess(0x8020), Assessment::Patched(_)));
        assert!(matches!(assess(0xBEEF), Assessment::Unknown(0xBEEF)));
    }

    #[test]
    fn test_messages_are_distinct() {
        let a = assess(0xBEEF).message();
        let b = assess(0x8020).message();
        let c = assess(0x8000).message();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert!(b.contains("NOT vulnerable"));
    }

    #[test]
    fn test_vulnerable_records_excludes_patched() {
        assert!(vulnerable_records().all(|r| r.vulnerable));
        assert_eq!(vulnerable_records().count(), 9);
    }

    #[test]
    fn test_parse_cpid() {
        assert_eq!(parse_cpid("8010"), Some(0x8010));
        assert_eq!(parse_cpid("0x8010"), Some(0x8010));
        assert_eq!(parse_cpid(" 0X8960 "), Some(0x8960));
        assert_eq!(parse_cpid("0x"), None);
        assert_eq!(parse_cpid("12345"), None);
        assert_eq!(parse_cpid("zz"), None);
    }
}
