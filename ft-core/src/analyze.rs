//! Structural analysis of a dumped firmware image
//!
//! Decodes the fixed 80-byte little-endian header, then scans the whole file
//! for printable ASCII runs. The scan never modifies the file.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use ft_error::{FwtapError, Result};
use serde::{Serialize, Serializer};
use tracing::{debug, info};

use crate::constants::analysis;

/// Size of the on-disk header
pub const HEADER_LEN: usize = 16 + analysis::BUILD_ID_LEN;

/// Leading header of a firmware image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinaryHeader {
    pub magic: u32,
    pub version: u32,
    pub size: u32,
    pub entry_point: u32,
    #[serde(serialize_with = "serialize_build_id")]
    pub build_id: [u8; analysis::BUILD_ID_LEN],
}

fn serialize_build_id<S: Serializer>(id: &[u8; analysis::BUILD_ID_LEN], s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&build_id_text(id))
}

fn build_id_text(id: &[u8]) -> String {
    let end = id.iter().position(|&b| b == 0).unwrap_or(id.len());
    String::from_utf8_lossy(&id[..end]).into_owned()
}

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

impl BinaryHeader {
    /// Decode from the start of `bytes`
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(FwtapError::TruncatedHeader { expected: HEADER_LEN, actual: bytes.len() });
        }
        let mut build_id = [0u8; analysis::BUILD_ID_LEN];
        build_id.copy_from_slice(&bytes[16..HEADER_LEN]);
        Ok(Self {
            magic: le_u32(bytes, 0),
            version: le_u32(bytes, 4),
            size: le_u32(bytes, 8),
            entry_point: le_u32(bytes, 12),
            build_id,
        })
    }

    /// Build id up to the first NUL, lossily decoded
    pub fn build_id(&self) -> String {
        build_id_text(&self.build_id)
    }
}

/// One printable ASCII run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StringRun {
    pub offset: u64,
    pub text: String,
}

fn is_printable(b: u8) -> bool {
    (0x20..=0x7E).contains(&b)
}

/// Incremental printable-run counter.
///
/// Bytes may arrive in chunks of any size; a run split across two chunks is
/// found once. Runs do not overlap: once a run ends, scanning resumes at the
/// byte after it.
#[derive(Debug, Default)]
pub struct StringScanner {
    run: Vec<u8>,
    run_start: u64,
    position: u64,
    count: u64,
    first: Vec<StringRun>,
}

impl StringScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        for &b in chunk {
            if is_printable(b) {
                if self.run.is_empty() {
                    self.run_start = self.position;
                }
                self.run.push(b);
                if self.run.len() == analysis::MAX_STRING_LEN {
                    self.end_run();
                }
            } else {
                self.end_run();
            }
            self.position += 1;
        }
    }

    fn end_run(&mut self) {
        if self.run.len() >= analysis::MIN_STRING_LEN {
            self.count += 1;
            if self.first.len() < analysis::REPORTED_STRINGS {
                self.first.push(StringRun {
                    offset: self.run_start,
                    text: String::from_utf8_lossy(&self.run).into_owned(),
                });
            }
        }
        self.run.clear();
    }

    /// Close any open run and return `(total, first runs)`
    pub fn finish(mut self) -> (u64, Vec<StringRun>) {
        self.end_run();
        (self.count, self.first)
    }
}

/// Scan an in-memory buffer
pub fn scan_bytes(bytes: &[u8]) -> (u64, Vec<StringRun>) {
    let mut scanner = StringScanner::new();
    scanner.feed(bytes);
    scanner.finish()
}

/// Scan a reader in fixed-size chunks
pub fn scan_reader<R: Read>(mut reader: R) -> Result<(u64, Vec<StringRun>)> {
    let mut scanner = StringScanner::new();
    let mut buf = [0u8; analysis::CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        scanner.feed(&buf[..n]);
    }
    Ok(scanner.finish())
}

/// Result of [`analyze`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisReport {
    pub file_size: u64,
    pub header: BinaryHeader,
    pub string_count: u64,
    pub first_strings: Vec<StringRun>,
}

/// Decode the header of `path` and count its strings
pub fn analyze(path: &Path) -> Result<AnalysisReport> {
    let open = || {
        File::open(path).map_err(|e| FwtapError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })
    };

    let file = open()?;
    let file_size = file.metadata()?.len();
    let mut head = Vec::with_capacity(HEADER_LEN);
    file.take(HEADER_LEN as u64).read_to_end(&mut head)?;
    let header = BinaryHeader::parse(&head)?;
    debug!(magic = header.magic, version = header.version, "Decoded header");

    let (string_count, first_strings) = scan_reader(BufReader::new(open()?))?;
    info!(path = %path.display(), file_size, string_count, "Analysis complete");

    Ok(AnalysisReport { file_size, header, string_count, first_strings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::NamedTempFile;
    use std::io::Write;

    fn header_bytes() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0xFEEDFACEu32.to_le_bytes());
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&0x0010_0000u32.to_le_bytes());
        bytes.extend_from_slice(&0x8000_0000u32.to_le_bytes());
        let mut id = [0u8; 64];
        id[..10].copy_from_slice(b"MPSS.HI.42");
        bytes.extend_from_slice(&id);
        bytes
    }

    #[test]
    fn test_header_decodes_little_endian() {
        let header = BinaryHeader::parse(&header_bytes()).unwrap();
        assert_eq!(header.magic, 0xFEEDFACE);
        assert_eq!(header.version, 3);
        assert_eq!(header.size, 0x0010_0000);
        assert_eq!(header.entry_point, 0x8000_0000);
        assert_eq!(header.build_id(), "MPSS.HI.42");
    }

    #[test]
    fn test_short_header_is_truncated() {
        let err = BinaryHeader::parse(&[0u8; 79]).unwrap_err();
        assert!(matches!(err, FwtapError::TruncatedHeader { expected: 80, actual: 79 }));
    }

    #[test]
    fn test_single_eight_byte_run() {
        let (count, runs) = scan_bytes(b"\x01\x02ABCDEFGH\xff\x00");
        assert_eq!(count, 1);
        assert_eq!(runs, vec![StringRun { offset: 2, text: "ABCDEFGH".into() }]);
    }

    #[test]
    fn test_seven_byte_run_is_ignored() {
        assert_eq!(scan_bytes(b"\x00ABCDEFG\x00").0, 0);
    }

    #[test]
    fn test_runs_do_not_overlap() {
        // 12 printable bytes would start five overlapping windows of length >= 8
        assert_eq!(scan_bytes(b"\x00hello world!\x00").0, 1);
    }

    #[test]
    fn test_long_run_splits_at_cap() {
        let long = vec![b'A'; 40];
        let (count, runs) = scan_bytes(&long);
        assert_eq!(count, 2);
        assert_eq!(runs[0].text.len(), 32);
        assert_eq!(runs[1].offset, 32);
        assert_eq!(runs[1].text.len(), 8);
    }

    #[test]
    fn test_run_at_end_of_input_counts() {
        assert_eq!(scan_bytes(b"\x00\x00trailing").0, 1);
    }

    #[test]
    fn test_run_across_chunk_boundary_counts_once() {
        let mut data = vec![0u8; analysis::CHUNK_SIZE - 4];
        data.extend_from_slice(b"SPLITRUN");
        data.extend_from_slice(&[0u8; 16]);
        let (count, runs) = scan_reader(Cursor::new(&data)).unwrap();
        assert_eq!(count, 1);
        assert_eq!(runs[0].offset, (analysis::CHUNK_SIZE - 4) as u64);
        assert_eq!(runs[0].text, "SPLITRUN");
    }

    #[test]
    fn test_only_first_ten_reported() {
        let mut data = Vec::new();
        for i in 0..15 {
            data.extend_from_slice(format!("string-{:02}", i).as_bytes());
            data.push(0);
        }
        let (count, runs) = scan_bytes(&data);
        assert_eq!(count, 15);
        assert_eq!(runs.len(), 10);
        assert_eq!(runs[9].text, "string-09");
    }

    #[test]
    fn test_analyze_file() {
        let mut file = NamedTempFile::new().unwrap();
        let mut data = header_bytes();
        data.extend_from_slice(b"\x00\x00QUALCOMM modem\x00");
        file.write_all(&data).unwrap();

        let report = analyze(file.path()).unwrap();
        assert_eq!(report.file_size, data.len() as u64);
        assert_eq!(report.header.magic, 0xFEEDFACE);
        // the build id inside the header is a string too
        assert_eq!(report.string_count, 2);
        assert_eq!(report.first_strings[1].text, "QUALCOMM modem");

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["header"]["build_id"], "MPSS.HI.42");
    }

    #[test]
    fn test_analyze_short_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 10]).unwrap();
        assert!(matches!(
            analyze(file.path()),
            Err(FwtapError::TruncatedHeader { actual: 10, .. })
        ));
    }

    #[test]
    fn test_analyze_missing_file() {
        let err = analyze(Path::new("/nonexistent/fwtap/dump.bin")).unwrap_err();
        assert!(matches!(err, FwtapError::FileRead { .. }));
    }
}
