use thiserror::Error;

use crate::fourcc::FourCC;

/// Errors produced by [`ByteScanner`](crate::ByteScanner).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("index out of bounds: need {needed} bytes at offset {offset}, buffer length is {len}")]
    IndexOutOfBounds {
        offset: usize,
        needed: usize,
        len: usize,
    },

    #[error("invalid string data at offset {offset}")]
    InvalidStringData { offset: usize },
}

/// Errors produced while decoding a library.
///
/// Every error is fatal; decoding never yields a partially populated
/// [`Archive`](crate::Archive).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArchiveError {
    #[error("invalid file header")]
    InvalidHeader,

    #[error(
        "invalid function list offset (offset {offset}, size {size}, file size {file_size})"
    )]
    InvalidFunctionListOffset {
        offset: u64,
        size: u64,
        file_size: u64,
    },

    #[error("invalid tag group size at offset {offset}")]
    InvalidTagGroupSize { offset: usize },

    #[error("unexpected function list ending {found}, expected ENDT")]
    UnexpectedFunctionListEnding { found: FourCC },

    #[error("unexpected file size (header declares {declared} bytes, buffer has {actual})")]
    UnexpectedFileSize { declared: u64, actual: usize },

    #[error("unexpected size for tag \"{tag}\" (expected {expected} bytes, got {actual})")]
    UnexpectedTagContentSize {
        tag: FourCC,
        expected: usize,
        actual: usize,
    },

    #[error("incomplete info for function {index}: missing {missing} tag")]
    IncompleteFunctionInfo { index: usize, missing: FourCC },

    #[error("incomplete info for source archive {index}: missing SARC tag")]
    IncompleteSourceArchiveInfo { index: usize },

    #[error("unexpected bitcode size")]
    UnexpectedBitcodeSize,

    #[error("unexpected library type: {0}")]
    UnexpectedLibraryType(u8),

    #[error("unexpected target platform: {0:#06x}")]
    UnexpectedTargetPlatform(u16),

    #[error("unexpected OS type: {0:#04x}")]
    UnexpectedOperatingSystemType(u8),

    #[error("invalid bitcode hash for function {index} ({name})")]
    InvalidBitcodeHash { index: usize, name: String },

    #[error(transparent)]
    Scan(#[from] ScanError),
}

impl ArchiveError {
    /// Returns the tag name carried by the error, if any.
    pub fn tag(&self) -> Option<FourCC> {
        match self {
            ArchiveError::UnexpectedTagContentSize { tag, .. } => Some(*tag),
            ArchiveError::IncompleteFunctionInfo { missing, .. } => Some(*missing),
            ArchiveError::UnexpectedFunctionListEnding { found } => Some(*found),
            _ => None,
        }
    }
}
