//! A safe, validating decoder for compiled shader library containers (`MTLB`).
//!
//! A library holds compiled GPU bitcode for a set of functions, per-function
//! metadata stored as tag groups, and optionally embedded source archives.
//! This crate decodes a complete library buffer into an owned [`Archive`]:
//!
//! - every offset and size read from the buffer is bounds-checked before use,
//! - the declared file size must match the buffer,
//! - each function's bitcode is verified against its stored SHA-256.
//!
//! Inputs are treated as **untrusted**; malformed data yields an
//! [`ArchiveError`], never a panic or a partially decoded archive.
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("default.metallib")?;
//! let archive = metallib_archive::Archive::decode(&bytes)?;
//! for function in archive.functions() {
//!     println!("{} ({} bytes of bitcode)", function.name, function.bitcode.len());
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

mod archive;
mod bitcode;
mod error;
mod fourcc;
mod function;
mod platform;
mod scanner;
mod source_archive;
mod tag;
mod version;

/// Helpers for building synthetic libraries in tests.
///
/// This module is only available when compiling this crate's own tests, or when
/// the `test-utils` feature is enabled. It is **not** a general-purpose encoder
/// and not part of the stable decoding API.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use crate::archive::{Archive, DecodeOptions, HEADER_LEN, METALLIB_MAGIC};
pub use crate::bitcode::BitcodeIndex;
pub use crate::error::{ArchiveError, ScanError};
pub use crate::fourcc::FourCC;
pub use crate::function::{Function, FunctionType};
pub use crate::platform::{DeploymentTarget, LibraryType, OperatingSystem, TargetPlatform};
pub use crate::scanner::ByteScanner;
pub use crate::source_archive::{SourceArchive, SourceRecording};
pub use crate::tag::{find_tag, Tag, TagLengthWidth};
pub use crate::version::{AirVersion, LanguageVersion, LibraryVersion, OsVersion};
