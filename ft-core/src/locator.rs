//! Partition discovery on the attached device
//!
//! Candidates are checked in list order and the first one that exists wins.
//! List order is the only priority; nothing after the winner is checked.

use ft_error::{FwtapError, Result};
use tracing::{debug, info, warn};

use crate::bridge::{validate_remote_path, ShellBridge};
use crate::constants::remote;

/// Whether `path` exists on the device, judged by an `ls` scoped to it
pub fn candidate_exists(bridge: &dyn ShellBridge, path: &str) -> bool {
    if let Err(e) = validate_remote_path(path) {
        warn!("Skipping candidate: {}", e);
        return false;
    }
    match bridge.shell(&format!("ls {} 2>/dev/null", path)) {
        Ok(out) => {
            let text = out.stdout.trim();
            let exists = !text.is_empty() && !text.contains(remote::ABSENT_MARKER);
            debug!(path, exists, "Checked candidate");
            exists
        }
        Err(e) => {
            warn!(path, "Existence check failed: {}", e);
            false
        }
    }
}

/// First existing candidate, if any
pub fn locate<S: AsRef<str>>(bridge: &dyn ShellBridge, candidates: &[S]) -> Option<String> {
    for candidate in candidates {
        let candidate = candidate.as_ref();
        if candidate_exists(bridge, candidate) {
            info!(partition = candidate, "Located partition");
            return Some(candidate.to_string());
        }
    }
    None
}

/// [`locate`], with exhaustion reported as `ResourceNotFound`
pub fn locate_or_err<S: AsRef<str>>(bridge: &dyn ShellBridge, candidates: &[S]) -> Result<String> {
    locate(bridge, candidates).ok_or_else(|| FwtapError::ResourceNotFound {
        tried: candidates.iter().map(|c| c.as_ref().to_string()).collect(),
    })
}
