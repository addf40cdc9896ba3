//! Embedded source archive table, reached through the `HSRD`/`HSRC` header
//! extension tag.

use core::fmt;

use crate::error::ArchiveError;
use crate::fourcc::FourCC;
use crate::scanner::{to_usize, ByteScanner};
use crate::tag::{find_tag, Tag, TagLengthWidth};

const SOURCE_TABLE_TAG_LEN: usize = 16;

/// One embedded source bundle (bzip2-compressed, returned verbatim).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SourceArchive {
    pub id: String,
    pub data: Vec<u8>,
}

impl fmt::Debug for SourceArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceArchive")
            .field("id", &self.id)
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// Fields stored ahead of the archives in the source archive table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceRecording {
    /// The extension tag that pointed at the table (`HSRD` or `HSRC`).
    pub tag: FourCC,
    pub link_options: String,
    /// Only recorded by the `HSRD` layout.
    pub working_directory: Option<String>,
}

/// Decodes the source archive table, if the header extension references one.
pub(crate) fn decode_source_archives(
    s: &mut ByteScanner<'_>,
    header_extension_tags: &[Tag],
) -> Result<Option<(SourceRecording, Vec<SourceArchive>)>, ArchiveError> {
    let Some(table_tag) = header_extension_tags
        .iter()
        .find(|tag| tag.name == FourCC::HSRD || tag.name == FourCC::HSRC)
    else {
        return Ok(None);
    };

    if table_tag.content.len() != SOURCE_TABLE_TAG_LEN {
        return Err(ArchiveError::UnexpectedTagContentSize {
            tag: table_tag.name,
            expected: SOURCE_TABLE_TAG_LEN,
            actual: table_tag.content.len(),
        });
    }
    // Second u64 is reserved.
    let table_offset = ByteScanner::new(&table_tag.content).scan_u64()?;

    s.seek(to_usize(table_offset, s.offset())?)?;
    let archive_count = s.scan_u32()?;
    let link_options = s.scan_cstring()?.to_owned();
    let working_directory = if table_tag.name == FourCC::HSRD {
        Some(s.scan_cstring()?.to_owned())
    } else {
        None
    };

    let mut archives = Vec::new();
    for index in 0..archive_count as usize {
        let group_offset = s.offset();
        if s.scan_u32()? == 0 {
            return Err(ArchiveError::InvalidTagGroupSize {
                offset: group_offset,
            });
        }
        let tags = s.scan_tags(TagLengthWidth::U32)?;
        let sarc = find_tag(&tags, FourCC::SARC)
            .ok_or(ArchiveError::IncompleteSourceArchiveInfo { index })?;
        let archive = parse_sarc(sarc)?;
        tracing::trace!(
            index,
            id = %archive.id,
            data_len = archive.data.len(),
            "decoded source archive"
        );
        archives.push(archive);
    }

    Ok(Some((
        SourceRecording {
            tag: table_tag.name,
            link_options,
            working_directory,
        },
        archives,
    )))
}

/// `SARC` content is a NUL-terminated id followed by the archive bytes.
fn parse_sarc(tag: &Tag) -> Result<SourceArchive, ArchiveError> {
    let mut content = ByteScanner::new(&tag.content);
    let id = content.scan_cstring()?;
    let data = content.scan_data_to_end()?;

    // Guard only: the payload runs to the end of the content, so this holds
    // whenever both scans succeed.
    let consumed = id.len() + 1 + data.len();
    if consumed != tag.content.len() {
        return Err(ArchiveError::UnexpectedTagContentSize {
            tag: FourCC::SARC,
            expected: consumed,
            actual: tag.content.len(),
        });
    }

    Ok(SourceArchive {
        id: id.to_owned(),
        data: data.to_vec(),
    })
}
