use sha2::{Digest, Sha256};

use crate::bitcode::BitcodeIndex;
use crate::error::{ArchiveError, ScanError};
use crate::fourcc::FourCC;
use crate::function::{Function, FunctionType};
use crate::platform::{DeploymentTarget, LibraryType, OperatingSystem, TargetPlatform};
use crate::scanner::{to_usize, ByteScanner};
use crate::source_archive::{decode_source_archives, SourceArchive, SourceRecording};
use crate::tag::{find_tag, Tag, TagLengthWidth};
use crate::version::{AirVersion, LanguageVersion, LibraryVersion, OsVersion};

/// Magic bytes at the start of every library.
pub const METALLIB_MAGIC: FourCC = FourCC(*b"MTLB");

/// Size of the fixed header, in bytes.
pub const HEADER_LEN: usize = 88;

const HASH_LEN: usize = 32;
const MDSZ_LEN: usize = 8;
const TYPE_LEN: usize = 1;
const OFFT_LEN: usize = 24;
const VERS_LEN: usize = 8;

/// Knobs for [`Archive::decode_with_options`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Decode each function's public and private metadata tag groups.
    ///
    /// When disabled, [`Function::public_metadata_tags`] and
    /// [`Function::private_metadata_tags`] are left empty.
    pub metadata_tags: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            metadata_tags: true,
        }
    }
}

impl DecodeOptions {
    pub fn metadata_tags(mut self, enabled: bool) -> Self {
        self.metadata_tags = enabled;
        self
    }
}

/// A decoded shader library.
///
/// The archive owns copies of everything it exposes and has no mutation API.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Archive {
    functions: Vec<Function>,
    header_extension_tags: Vec<Tag>,
    library_type: LibraryType,
    target_platform: TargetPlatform,
    deployment_target: Option<DeploymentTarget>,
    source_archives: Vec<SourceArchive>,
    source_recording: Option<SourceRecording>,
    version: LibraryVersion,
}

impl Archive {
    /// Decodes a complete library buffer with default options.
    ///
    /// The input is treated as untrusted: every offset and size is validated
    /// and every function's bitcode is checked against its stored SHA-256.
    pub fn decode(bytes: &[u8]) -> Result<Archive, ArchiveError> {
        Self::decode_with_options(bytes, &DecodeOptions::default())
    }

    pub fn decode_with_options(
        bytes: &[u8],
        options: &DecodeOptions,
    ) -> Result<Archive, ArchiveError> {
        let mut s = ByteScanner::new(bytes);
        let header = read_header(&mut s)?;

        let invalid_function_list = ArchiveError::InvalidFunctionListOffset {
            offset: header.function_list_offset,
            size: header.function_list_size,
            file_size: header.file_size,
        };
        let function_list_end = header
            .function_list_offset
            .checked_add(header.function_list_size)
            .filter(|end| *end < header.file_size && header.function_list_offset > 0)
            .ok_or_else(|| invalid_function_list.clone())?;

        if header.function_list_size > 0 {
            s.seek(to_usize(function_list_end, s.offset())?)?;
            let marker = s.scan_data(4)?;
            if marker != FourCC::ENDT.0 {
                return Err(ArchiveError::UnexpectedFunctionListEnding {
                    found: FourCC([marker[0], marker[1], marker[2], marker[3]]),
                });
            }
        }

        // The 4 bytes after the function list hold `ENDT`, or a zero
        // placeholder when the list is empty.
        let extension_start = function_list_end
            .checked_add(4)
            .ok_or(invalid_function_list)?;
        let header_extension_tags = if extension_start != header.public_metadata_offset {
            s.seek(to_usize(extension_start, s.offset())?)?;
            s.scan_tags(TagLengthWidth::U16)?
        } else {
            Vec::new()
        };

        if header.function_list_size == 0 {
            tracing::debug!(
                library_type = %header.library_type,
                target_platform = %header.target_platform,
                "decoded library without functions"
            );
            return Ok(Archive {
                functions: Vec::new(),
                header_extension_tags,
                library_type: header.library_type,
                target_platform: header.target_platform,
                deployment_target: header.deployment_target,
                source_archives: Vec::new(),
                source_recording: None,
                version: header.version,
            });
        }

        if header.bitcode_size == 0 {
            return Err(ArchiveError::UnexpectedBitcodeSize);
        }

        s.seek(to_usize(header.function_list_offset, s.offset())?)?;
        let function_count = s.scan_u32()?;
        let mut entries = Vec::new();
        for index in 0..function_count as usize {
            let group_offset = s.offset();
            let group_size = s.scan_u32()?;
            if group_size == 0 {
                return Err(ArchiveError::InvalidTagGroupSize {
                    offset: group_offset,
                });
            }
            let tags = s.scan_tags(TagLengthWidth::U16)?;
            entries.push(FunctionEntry::from_tags(index, tags)?);
        }

        let mut functions = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            let bitcode_start = header
                .bitcode_offset
                .checked_add(entry.bitcode_offset)
                .ok_or(ScanError::IndexOutOfBounds {
                    offset: s.offset(),
                    needed: usize::MAX,
                    len: bytes.len(),
                })?;
            s.seek(to_usize(bitcode_start, s.offset())?)?;
            let bitcode = s.scan_data(to_usize(entry.bitcode_size, s.offset())?)?;
            if Sha256::digest(bitcode).as_slice() != entry.hash.as_slice() {
                return Err(ArchiveError::InvalidBitcodeHash {
                    index,
                    name: entry.name,
                });
            }

            let (public_metadata_tags, private_metadata_tags) = if options.metadata_tags {
                (
                    read_metadata_group(
                        &mut s,
                        header.public_metadata_offset,
                        header.public_metadata_size,
                        entry.public_metadata_offset,
                    )?,
                    read_metadata_group(
                        &mut s,
                        header.private_metadata_offset,
                        header.private_metadata_size,
                        entry.private_metadata_offset,
                    )?,
                )
            } else {
                (Vec::new(), Vec::new())
            };

            tracing::trace!(
                index,
                name = %entry.name,
                bitcode_len = bitcode.len(),
                "decoded function"
            );

            functions.push(Function {
                name: entry.name,
                function_type: entry.function_type,
                language_version: entry.language_version,
                air_version: entry.air_version,
                tags: entry.tags,
                public_metadata_tags,
                private_metadata_tags,
                bitcode: bitcode.to_vec(),
                bitcode_hash: entry.hash,
            });
        }

        let (source_recording, source_archives) =
            match decode_source_archives(&mut s, &header_extension_tags)? {
                Some((recording, archives)) => (Some(recording), archives),
                None => (None, Vec::new()),
            };

        tracing::debug!(
            functions = functions.len(),
            header_extension_tags = header_extension_tags.len(),
            source_archives = source_archives.len(),
            library_type = %header.library_type,
            target_platform = %header.target_platform,
            "decoded library"
        );

        Ok(Archive {
            functions,
            header_extension_tags,
            library_type: header.library_type,
            target_platform: header.target_platform,
            deployment_target: header.deployment_target,
            source_archives,
            source_recording,
            version: header.version,
        })
    }

    /// Functions in on-disk order.
    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Returns the first function named `name`.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|function| function.name == name)
    }

    pub fn header_extension_tags(&self) -> &[Tag] {
        &self.header_extension_tags
    }

    pub fn header_extension_tag(&self, name: FourCC) -> Option<&Tag> {
        find_tag(&self.header_extension_tags, name)
    }

    pub fn library_type(&self) -> LibraryType {
        self.library_type
    }

    /// Coarse platform family. See [`TargetPlatform`].
    pub fn target_platform(&self) -> TargetPlatform {
        self.target_platform
    }

    pub fn deployment_target(&self) -> Option<DeploymentTarget> {
        self.deployment_target
    }

    pub fn source_archives(&self) -> &[SourceArchive] {
        &self.source_archives
    }

    /// Table-level fields of the embedded source archive table, if present.
    pub fn source_recording(&self) -> Option<&SourceRecording> {
        self.source_recording.as_ref()
    }

    /// Library container format version.
    pub fn version(&self) -> LibraryVersion {
        self.version
    }

    /// Groups functions by byte-identical bitcode.
    pub fn bitcode_index(&self) -> BitcodeIndex {
        BitcodeIndex::new(&self.functions)
    }
}

impl TryFrom<&[u8]> for Archive {
    type Error = ArchiveError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Archive::decode(bytes)
    }
}

struct Header {
    target_platform: TargetPlatform,
    version: LibraryVersion,
    library_type: LibraryType,
    deployment_target: Option<DeploymentTarget>,
    file_size: u64,
    function_list_offset: u64,
    function_list_size: u64,
    public_metadata_offset: u64,
    public_metadata_size: u64,
    private_metadata_offset: u64,
    private_metadata_size: u64,
    bitcode_offset: u64,
    bitcode_size: u64,
}

/// Reads the fixed header. The declared file size is checked against the
/// buffer as soon as it is read, before the section table that follows it.
fn read_header(s: &mut ByteScanner<'_>) -> Result<Header, ArchiveError> {
    fn field<T>(value: Result<T, ScanError>) -> Result<T, ArchiveError> {
        value.map_err(|_| ArchiveError::InvalidHeader)
    }

    let magic = field(s.scan_four_char_code())?;
    if magic != METALLIB_MAGIC {
        return Err(ArchiveError::InvalidHeader);
    }

    let raw_platform = field(s.scan_u16())?;
    let target_platform = TargetPlatform::from_raw(raw_platform)
        .ok_or(ArchiveError::UnexpectedTargetPlatform(raw_platform))?;

    let version = LibraryVersion::new(field(s.scan_u16())?, field(s.scan_u16())?);

    let raw_library_type = field(s.scan_u8())?;
    let library_type = LibraryType::from_raw(raw_library_type)
        .ok_or(ArchiveError::UnexpectedLibraryType(raw_library_type))?;

    let raw_os = field(s.scan_u8())?;
    let os_version = OsVersion::new(field(s.scan_u16())?, field(s.scan_u16())?);
    let deployment_target = match raw_os {
        0 => None,
        raw => Some(DeploymentTarget {
            operating_system: OperatingSystem::from_raw(raw)
                .ok_or(ArchiveError::UnexpectedOperatingSystemType(raw))?,
            version: os_version,
        }),
    };

    let file_size = field(s.scan_u64())?;
    if file_size != s.len() as u64 {
        return Err(ArchiveError::UnexpectedFileSize {
            declared: file_size,
            actual: s.len(),
        });
    }

    Ok(Header {
        target_platform,
        version,
        library_type,
        deployment_target,
        file_size,
        function_list_offset: field(s.scan_u64())?,
        function_list_size: field(s.scan_u64())?,
        public_metadata_offset: field(s.scan_u64())?,
        public_metadata_size: field(s.scan_u64())?,
        private_metadata_offset: field(s.scan_u64())?,
        private_metadata_size: field(s.scan_u64())?,
        bitcode_offset: field(s.scan_u64())?,
        bitcode_size: field(s.scan_u64())?,
    })
}

/// Reads one function's tag group from a metadata section.
///
/// Sections with a zero size in the header are treated as absent.
fn read_metadata_group(
    s: &mut ByteScanner<'_>,
    section_offset: u64,
    section_size: u64,
    relative_offset: u64,
) -> Result<Vec<Tag>, ArchiveError> {
    if section_size == 0 {
        return Ok(Vec::new());
    }
    let start = section_offset
        .checked_add(relative_offset)
        .ok_or(ScanError::IndexOutOfBounds {
            offset: s.offset(),
            needed: usize::MAX,
            len: s.len(),
        })?;
    s.seek(to_usize(start, s.offset())?)?;
    let group_offset = s.offset();
    if s.scan_u32()? == 0 {
        return Err(ArchiveError::InvalidTagGroupSize {
            offset: group_offset,
        });
    }
    Ok(s.scan_tags(TagLengthWidth::U16)?)
}

/// Fields of a function table entry, before its bitcode is sliced.
struct FunctionEntry {
    name: String,
    function_type: Option<FunctionType>,
    language_version: LanguageVersion,
    air_version: AirVersion,
    bitcode_size: u64,
    public_metadata_offset: u64,
    private_metadata_offset: u64,
    bitcode_offset: u64,
    hash: [u8; HASH_LEN],
    tags: Vec<Tag>,
}

impl FunctionEntry {
    fn from_tags(index: usize, tags: Vec<Tag>) -> Result<FunctionEntry, ArchiveError> {
        let missing = |name: FourCC| ArchiveError::IncompleteFunctionInfo {
            index,
            missing: name,
        };

        let bitcode_size = sized_tag(&tags, FourCC::MDSZ, MDSZ_LEN)?;
        let function_type = sized_tag(&tags, FourCC::TYPE, TYPE_LEN)?;
        let hash = sized_tag(&tags, FourCC::HASH, HASH_LEN)?;
        let offsets = sized_tag(&tags, FourCC::OFFT, OFFT_LEN)?;
        let versions = sized_tag(&tags, FourCC::VERS, VERS_LEN)?;

        let name = find_tag(&tags, FourCC::NAME).ok_or_else(|| missing(FourCC::NAME))?;
        let name_bytes = match name.content.split_last() {
            Some((&0, rest)) => rest,
            _ => &name.content[..],
        };
        // A name that is not UTF-8 counts as no name at all.
        let name = String::from_utf8(name_bytes.to_vec()).map_err(|_| missing(FourCC::NAME))?;

        let bitcode_size = bitcode_size.ok_or_else(|| missing(FourCC::MDSZ))?.scan_u64()?;
        let mut offsets = offsets.ok_or_else(|| missing(FourCC::OFFT))?;
        let public_metadata_offset = offsets.scan_u64()?;
        let private_metadata_offset = offsets.scan_u64()?;
        let bitcode_offset = offsets.scan_u64()?;

        let mut hash_bytes = [0u8; HASH_LEN];
        hash_bytes.copy_from_slice(hash.ok_or_else(|| missing(FourCC::HASH))?.scan_data(HASH_LEN)?);

        let mut versions = versions.ok_or_else(|| missing(FourCC::VERS))?;
        let air_version = AirVersion::new(versions.scan_u16()?, versions.scan_u16()?);
        let language_version = LanguageVersion::new(versions.scan_u16()?, versions.scan_u16()?);

        let function_type = match function_type {
            Some(mut content) => FunctionType::from_raw(content.scan_u8()?),
            None => None,
        };

        Ok(FunctionEntry {
            name,
            function_type,
            language_version,
            air_version,
            bitcode_size,
            public_metadata_offset,
            private_metadata_offset,
            bitcode_offset,
            hash: hash_bytes,
            tags,
        })
    }
}

/// Looks up `name` and checks its content length, returning a scanner over the content.
fn sized_tag(
    tags: &[Tag],
    name: FourCC,
    expected: usize,
) -> Result<Option<ByteScanner<'_>>, ArchiveError> {
    match find_tag(tags, name) {
        Some(tag) if tag.content.len() != expected => Err(ArchiveError::UnexpectedTagContentSize {
            tag: name,
            expected,
            actual: tag.content.len(),
        }),
        Some(tag) => Ok(Some(ByteScanner::new(&tag.content))),
        None => Ok(None),
    }
}
