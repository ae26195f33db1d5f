//! Chip identification workflow
//!
//! Registry verdict first; the payload cipher is only reached for a chip
//! with an exploitable boot ROM.

use ft_error::{FwtapError, Result};
use tracing::{info, warn};

use crate::capability::{CapabilityGate, DecryptedPayload, PayloadCipher};
use crate::registry::{self, Assessment, CapabilityRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifyOutcome {
    /// Vulnerable chip, but no credential was supplied
    CredentialRequired(&'static CapabilityRecord),
    /// Vulnerable chip and the payload was unlocked
    PayloadReady {
        record: &'static CapabilityRecord,
        payload: DecryptedPayload,
    },
}

impl IdentifyOutcome {
    pub fn record(&self) -> &'static CapabilityRecord {
        match self {
            Self::CredentialRequired(r) => r,
            Self::PayloadReady { record, .. } => record,
        }
    }
}

/// Record for `cpid` if its boot ROM is exploitable.
///
/// Unknown and patched chips end here; nothing downstream may run for them.
pub fn require_vulnerable(cpid: u16) -> Result<&'static CapabilityRecord> {
    match registry::assess(cpid) {
        Assessment::Unknown(cpid) => {
            warn!("Unknown CPID 0x{:04X}", cpid);
            Err(FwtapError::UnknownDevice { cpid })
        }
        Assessment::Patched(r) => {
            Err(FwtapError::NotVulnerable { cpid: r.cpid, name: r.name.to_string() })
        }
        Assessment::Vulnerable(r) => Ok(r),
    }
}

pub fn identify(
    cpid: u16,
    gate: &CapabilityGate,
    cipher: &dyn PayloadCipher,
    payload: &[u8],
) -> Result<IdentifyOutcome> {
    let record = require_vulnerable(cpid)?;
    info!(chip = record.name, "Identified vulnerable chip");

    match gate.apply(cipher, payload) {
        Ok(payload) => Ok(IdentifyOutcome::PayloadReady { record, payload }),
        Err(FwtapError::CredentialRequired) => Ok(IdentifyOutcome::CredentialRequired(record)),
        Err(e) => Err(e),
    }
}
