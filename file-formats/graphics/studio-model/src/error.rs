use std::io;
use thiserror::Error;

/// Error types for studio model decoding
///
/// Any of these aborts the whole parse: offsets are chained, so nothing read
/// after a bad offset can be trusted.
#[derive(Error, Debug)]
pub enum StudioError {
    /// I/O error while loading a file from disk
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid magic identifier at the start of the file
    #[error("Invalid magic: expected '{expected}', got '{actual}'")]
    InvalidMagic { expected: String, actual: String },

    /// File version outside the supported range
    #[error("Unsupported {format} version {version} (supported: {supported})")]
    UnsupportedVersion {
        format: &'static str,
        version: i32,
        supported: &'static str,
    },

    /// A resolved offset points outside the buffer
    #[error("{structure}.{field}: offset {offset} is outside the buffer (length {len})")]
    OffsetOutOfRange {
        structure: &'static str,
        field: &'static str,
        offset: i64,
        len: u64,
    },

    /// A table count is negative
    #[error("{structure}.{field}: invalid count {count} at offset {offset:#x}")]
    InvalidCount {
        structure: &'static str,
        field: &'static str,
        count: i64,
        offset: u64,
    },

    /// A count or length exceeds the configured parse limits
    #[error("{structure}.{field}: value {value} exceeds limit {limit}")]
    LimitExceeded {
        structure: &'static str,
        field: &'static str,
        value: u64,
        limit: u64,
    },

    /// A bone's parent index does not name an earlier bone
    #[error("Bone {bone} has parent index {parent}, outside 0..{bone} (bone count {bone_count})")]
    BoneIndexOutOfRange {
        bone: usize,
        parent: i32,
        bone_count: usize,
    },

    /// An animation value run with an impossible length
    #[error("Invalid animation value run at offset {offset:#x}: valid {valid}, total {total}")]
    InvalidRunLength { offset: u64, valid: u8, total: u8 },

    /// Not enough bytes left to read a field
    #[error(
        "Truncated buffer reading {} at offset {offset:#x}: need {needed} bytes, buffer length {len}",
        .structure.unwrap_or("data")
    )]
    TruncatedBuffer {
        structure: Option<&'static str>,
        offset: u64,
        needed: usize,
        len: u64,
    },

    /// An index field refers past the end of the table it indexes
    #[error("Invalid reference: {structure}.{field} value {value} exceeds maximum {max}")]
    InvalidReference {
        structure: &'static str,
        field: &'static str,
        value: i64,
        max: i64,
    },

    /// A frame maps to a section slot whose keyed chains were read for zero frames
    #[error("Frame {frame} of '{animation}' maps to section {section}, which has no keyed frames")]
    EmptySection {
        animation: String,
        frame: u32,
        section: usize,
    },

    /// A companion file was built for a different model
    #[error("{format} checksum {actual:#010x} does not match model checksum {expected:#010x}")]
    ChecksumMismatch {
        format: &'static str,
        expected: i32,
        actual: i32,
    },

    /// A companion file's hierarchy does not mirror the model's
    #[error("{structure} {index}: expected {expected} entries, found {actual}")]
    HierarchyMismatch {
        structure: &'static str,
        index: String,
        expected: usize,
        actual: usize,
    },
}

impl StudioError {
    /// Attach the record kind to a truncation raised by a primitive read.
    ///
    /// Errors that already name a structure are returned unchanged.
    pub(crate) fn within(self, record: &'static str) -> Self {
        match self {
            Self::TruncatedBuffer {
                structure: None,
                offset,
                needed,
                len,
            } => Self::TruncatedBuffer {
                structure: Some(record),
                offset,
                needed,
                len,
            },
            other => other,
        }
    }
}

/// Result type using StudioError
pub type Result<T> = std::result::Result<T, StudioError>;
