//! Privileged partition extraction
//!
//! Pipeline, each step a distinct failure point:
//!
//! 1. **Privilege check** - the device must grant a root shell
//! 2. **Size discovery** - read the partition size from `/proc/partitions`;
//!    on failure fall back to a configured estimate used for progress only
//! 3. **Streamed copy** - raw `dd` of the whole partition into the local file
//! 4. **Verification** - the local file must exist and be non-empty,
//!    whatever exit status the copy reported
//!
//! Nothing is kept between calls; each extraction is independent.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use ft_error::{FwtapError, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::bridge::{validate_remote_path, BlockCopier, ShellBridge};
use crate::cancel::CancelToken;
use crate::constants::{paths, remote};

/// Pipeline stage, reported to progress observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PrivilegeCheck,
    SizeDiscovery,
    Copy,
    Verify,
}

/// Where the expected size came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeSource {
    Discovered,
    Estimated,
}

/// Observer for a running extraction
pub trait ExtractProgress {
    fn stage(&mut self, _stage: Stage) {}
    fn size_known(&mut self, _expected: u64, _source: SizeSource) {}
    fn bytes(&mut self, _written: u64) {}
}

/// Progress observer that ignores everything
pub struct NoProgress;

impl ExtractProgress for NoProgress {}

/// Outcome of a successful extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionReport {
    pub source: String,
    pub destination: PathBuf,
    pub bytes_written: u64,
    pub expected_size: u64,
    pub size_source: SizeSource,
    pub sha256: String,
}

struct ExtractionJob<'p> {
    source: &'p str,
    destination: &'p Path,
    expected_size: Option<u64>,
}

/// Runs the extraction pipeline against injected bridge implementations
pub struct Extractor<'a> {
    shell: &'a dyn ShellBridge,
    copier: &'a dyn BlockCopier,
    fallback_size: u64,
    cancel: CancelToken,
}

impl<'a> Extractor<'a> {
    pub fn new(shell: &'a dyn ShellBridge, copier: &'a dyn BlockCopier, fallback_size: u64) -> Self {
        Self {
            shell,
            copier,
            fallback_size,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Copy `source` on the device into `destination`
    pub fn extract(
        &self,
        source: &str,
        destination: &Path,
        progress: &mut dyn ExtractProgress,
    ) -> Result<ExtractionReport> {
        validate_remote_path(source)?;
        let mut job = ExtractionJob { source, destination, expected_size: None };
        info!(source, destination = %destination.display(), "Starting extraction");

        self.cancel.check()?;
        progress.stage(Stage::PrivilegeCheck);
        check_privilege(self.shell)?;

        self.cancel.check()?;
        progress.stage(Stage::SizeDiscovery);
        let size_source = match discover_size(self.shell, job.source) {
            Ok(size) => {
                job.expected_size = Some(size);
                SizeSource::Discovered
            }
            Err(e) => {
                warn!("{}; assuming {} bytes for progress", e, self.fallback_size);
                SizeSource::Estimated
            }
        };
        let expected = job.expected_size.unwrap_or(self.fallback_size);
        info!(expected_mb = expected / (1024 * 1024), ?size_source, "Partition size");
        progress.size_known(expected, size_source);

        self.cancel.check()?;
        progress.stage(Stage::Copy);
        let copied = self
            .copier
            .copy(job.source, job.destination, &mut |n| progress.bytes(n))
            .map_err(|e| match e {
                FwtapError::CommandFailed { reason, .. } => FwtapError::CopyFailed {
                    source_path: source.to_string(),
                    reason,
                },
                other => other,
            })
            .and_then(|status| {
                if status.success {
                    return Ok(status);
                }
                let reason = if status.detail.is_empty() {
                    "copy process exited with failure".to_string()
                } else {
                    status.detail
                };
                Err(FwtapError::CopyFailed { source_path: source.to_string(), reason })
            });
        let status = match copied {
            Ok(status) => status,
            Err(e) => {
                discard_partial(job.destination);
                return Err(e);
            }
        };
        debug!(reported = status.bytes, "Copy finished");

        progress.stage(Stage::Verify);
        let bytes_written = verify_output(job.destination)?;
        let sha256 = sha256_file(job.destination)?;
        info!(bytes_written, %sha256, "Dump complete");

        Ok(ExtractionReport {
            source: source.to_string(),
            destination: destination.to_path_buf(),
            bytes_written,
            expected_size: expected,
            size_source,
            sha256,
        })
    }
}

/// Require a root identity on the device
pub fn check_privilege(shell: &dyn ShellBridge) -> Result<()> {
    let out = shell.shell(remote::PRIVILEGE_CHECK)?;
    if out.stdout.contains(remote::ROOT_MARKER) {
        debug!("Root access confirmed");
        Ok(())
    } else {
        Err(FwtapError::InsufficientPrivilege { id_output: out.stdout.trim().to_string() })
    }
}

/// Size in bytes of the partition named `name` in a `/proc/partitions` table.
///
/// The table is `major minor #blocks name` with 1 KiB blocks; the name column
/// must match exactly.
pub fn parse_partition_size(table: &str, name: &str) -> Option<u64> {
    table.lines().find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [_major, _minor, blocks, part] if *part == name => blocks
                .parse::<u64>()
                .ok()
                .map(|b| b.saturating_mul(remote::PARTITION_BLOCK_SIZE)),
            _ => None,
        }
    })
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Discover the size of `source` on the device.
///
/// by-name entries are symlinks to the real block node, so the resolved
/// name is tried before the link name.
pub fn discover_size(shell: &dyn ShellBridge, source: &str) -> Result<u64> {
    let failed = |reason: &str| FwtapError::SizeDiscoveryFailed {
        partition: source.to_string(),
        reason: reason.to_string(),
    };

    let mut names = Vec::new();
    if let Ok(out) = shell.shell(&format!("readlink -f {} 2>/dev/null", source)) {
        let resolved = out.stdout.trim();
        if out.success && resolved.starts_with('/') {
            names.push(basename(resolved).to_string());
        }
    }
    let own = basename(source).to_string();
    if !names.contains(&own) {
        names.push(own);
    }

    let table = shell
        .shell(&format!("cat {}", paths::PROC_PARTITIONS))
        .map_err(|e| failed(&e.to_string()))?;
    if table.stdout.trim().is_empty() {
        return Err(failed("partition table is empty"));
    }

    for name in &names {
        match parse_partition_size(&table.stdout, name) {
            Some(0) => return Err(failed("partition reports zero size")),
            Some(size) => {
                debug!(name = %name, size, "Discovered partition size");
                return Ok(size);
            }
            None => continue,
        }
    }
    Err(failed(&format!("no entry named {}", names.join(" or "))))
}

/// Remove whatever a failed copy left behind
fn discard_partial(destination: &Path) {
    match fs::remove_file(destination) {
        Ok(()) => debug!(path = %destination.display(), "Removed partial dump"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %destination.display(), "Could not remove partial dump: {}", e),
    }
}

/// Size of the written file; missing or empty is a failed dump
pub fn verify_output(destination: &Path) -> Result<u64> {
    match fs::metadata(destination) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(meta.len()),
        _ => Err(FwtapError::EmptyOutputAfterCopy(destination.to_path_buf())),
    }
}

/// Lowercase hex SHA-256 of a file's contents
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| FwtapError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
