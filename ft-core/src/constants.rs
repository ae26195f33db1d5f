//! Constants and configuration defaults for fwtap
//!
//! Centralizes magic numbers, paths, and default values.
//! Add new values here rather than inlining them at the call site.

/// System and device paths
pub mod paths {
    /// Linux USB device registry
    pub const USB_SYSFS_ROOT: &str = "/sys/bus/usb/devices";

    /// Listing utility used when sysfs is not available
    pub const LSUSB: &str = "lsusb";

    /// Debug bridge executable
    pub const ADB: &str = "adb";

    /// Config file name inside the config directory
    pub const CONFIG_FILE: &str = "config.json";

    /// Application directory name under the user config dir
    pub const APP_DIR: &str = "fwtap";

    /// Kernel partition accounting table on the device
    pub const PROC_PARTITIONS: &str = "/proc/partitions";

    /// Candidate modem partition paths, most specific first
    pub const MODEM_PARTITIONS: &[&str] = &[
        "/dev/block/by-name/modem",
        "/dev/block/by-name/modem_a",
        "/dev/block/by-name/radio",
        "/dev/block/bootdevice/by-name/modem",
        "/dev/block/platform/soc/1da4000.ufshc/by-name/modem",
    ];
}

/// USB identifiers
pub mod usb {
    /// Apple vendor ID
    pub const APPLE_VID: u16 = 0x05AC;

    /// Apple DFU mode product ID
    pub const DFU_PID: u16 = 0x1227;
}

/// Remote command fragments and output markers
pub mod remote {
    /// Privilege check. Always exits 0 so the marker check decides.
    pub const PRIVILEGE_CHECK: &str = "su -c 'id' 2>/dev/null || echo 'no root'";

    /// Marker for an elevated identity in `id` output
    pub const ROOT_MARKER: &str = "uid=0";

    /// Marker `ls` prints for a path that does not exist
    pub const ABSENT_MARKER: &str = "No such";

    /// Size of one block in /proc/partitions
    pub const PARTITION_BLOCK_SIZE: u64 = 1024;
}

/// Timing and size defaults
pub mod defaults {
    /// Partition size assumed for progress when discovery fails (256 MiB)
    pub const FALLBACK_PARTITION_SIZE: u64 = 256 * 1024 * 1024;

    /// Timeout for short bridge commands
    pub const COMMAND_TIMEOUT_SECS: u64 = 30;

    /// Poll interval while waiting on a child process
    pub const PROCESS_POLL_MS: u64 = 20;

    /// Read size for streamed copies
    pub const COPY_CHUNK_SIZE: usize = 64 * 1024;

    /// How long to wait for stderr after an unbounded stream has ended
    pub const STDERR_GRACE_MS: u64 = 2_000;
}

/// Binary analysis parameters
pub mod analysis {
    /// Bytes read per scan chunk
    pub const CHUNK_SIZE: usize = 4096;

    /// Shortest printable run counted as a string
    pub const MIN_STRING_LEN: usize = 8;

    /// Longest run measured from one starting offset
    pub const MAX_STRING_LEN: usize = 32;

    /// Number of strings reported verbatim
    pub const REPORTED_STRINGS: usize = 10;

    /// Length of the build id field in the header
    pub const BUILD_ID_LEN: usize = 64;
}

/// Credential format
pub mod credential {
    /// Expected credential length in characters (256-bit key in hex)
    pub const KEY_LEN: usize = 64;
}
