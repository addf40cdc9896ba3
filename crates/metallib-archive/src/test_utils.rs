use core::ops::Range;

use sha2::{Digest, Sha256};

use crate::{FourCC, Tag, HEADER_LEN, METALLIB_MAGIC};

/// A function entry for [`LibraryBuilder`].
///
/// The required tags (`NAME`, `TYPE`, `MDSZ`, `OFFT`, `HASH`, `VERS`) are
/// generated from the fields; [`TestFunction::omit_tag`] and
/// [`TestFunction::replace_tag`] allow producing malformed entries.
#[derive(Debug, Clone)]
pub struct TestFunction {
    pub name: String,
    /// Raw `TYPE` byte; `None` omits the tag.
    pub function_type: Option<u8>,
    pub air_version: (u16, u16),
    pub language_version: (u16, u16),
    pub bitcode: Vec<u8>,
    /// Stored in `HASH` instead of the real SHA-256 when set.
    pub hash_override: Option<Vec<u8>>,
    /// Appended after the generated tags.
    pub extra_tags: Vec<Tag>,
    pub public_metadata_tags: Vec<Tag>,
    pub private_metadata_tags: Vec<Tag>,
    omitted: Vec<FourCC>,
    replaced: Vec<Tag>,
}

impl TestFunction {
    pub fn new(name: &str, bitcode: &[u8]) -> Self {
        TestFunction {
            name: name.to_owned(),
            function_type: Some(2),
            air_version: (2, 6),
            language_version: (3, 0),
            bitcode: bitcode.to_vec(),
            hash_override: None,
            extra_tags: Vec::new(),
            public_metadata_tags: Vec::new(),
            private_metadata_tags: Vec::new(),
            omitted: Vec::new(),
            replaced: Vec::new(),
        }
    }

    pub fn function_type(mut self, raw: Option<u8>) -> Self {
        self.function_type = raw;
        self
    }

    pub fn language_version(mut self, major: u16, minor: u16) -> Self {
        self.language_version = (major, minor);
        self
    }

    pub fn air_version(mut self, major: u16, minor: u16) -> Self {
        self.air_version = (major, minor);
        self
    }

    pub fn hash(mut self, hash: &[u8]) -> Self {
        self.hash_override = Some(hash.to_vec());
        self
    }

    pub fn tag(mut self, name: FourCC, content: &[u8]) -> Self {
        self.extra_tags.push(Tag::new(name, content));
        self
    }

    pub fn public_metadata_tag(mut self, name: FourCC, content: &[u8]) -> Self {
        self.public_metadata_tags.push(Tag::new(name, content));
        self
    }

    pub fn private_metadata_tag(mut self, name: FourCC, content: &[u8]) -> Self {
        self.private_metadata_tags.push(Tag::new(name, content));
        self
    }

    /// Leaves the generated tag `name` out of the entry.
    pub fn omit_tag(mut self, name: FourCC) -> Self {
        self.omitted.push(name);
        self
    }

    /// Writes `content` instead of the generated content for tag `name`.
    pub fn replace_tag(mut self, name: FourCC, content: &[u8]) -> Self {
        self.replaced.push(Tag::new(name, content));
        self
    }

    fn entry_tags(&self, offsets: [u64; 3]) -> Vec<Tag> {
        let mut name = self.name.as_bytes().to_vec();
        name.push(0);

        let hash = match &self.hash_override {
            Some(hash) => hash.clone(),
            None => Sha256::digest(&self.bitcode).to_vec(),
        };

        let mut offt = Vec::with_capacity(24);
        for offset in offsets {
            offt.extend_from_slice(&offset.to_le_bytes());
        }

        let mut vers = Vec::with_capacity(8);
        for v in [
            self.air_version.0,
            self.air_version.1,
            self.language_version.0,
            self.language_version.1,
        ] {
            vers.extend_from_slice(&v.to_le_bytes());
        }

        let mut tags = vec![Tag::new(FourCC::NAME, name)];
        if let Some(raw) = self.function_type {
            tags.push(Tag::new(FourCC::TYPE, [raw]));
        }
        tags.push(Tag::new(FourCC::HASH, hash));
        tags.push(Tag::new(
            FourCC::MDSZ,
            (self.bitcode.len() as u64).to_le_bytes(),
        ));
        tags.push(Tag::new(FourCC::OFFT, offt));
        tags.push(Tag::new(FourCC::VERS, vers));

        tags.retain(|tag| !self.omitted.contains(&tag.name));
        for tag in &mut tags {
            if let Some(replacement) = self.replaced.iter().find(|r| r.name == tag.name) {
                tag.content = replacement.content.clone();
            }
        }
        tags.extend(self.extra_tags.iter().cloned());
        tags
    }
}

/// Source archive table for [`LibraryBuilder`].
#[derive(Debug, Clone)]
pub struct TestSourceTable {
    /// `HSRD` (writes a working directory) or `HSRC`.
    pub tag: FourCC,
    pub link_options: String,
    pub working_directory: String,
    /// `(id, payload)` pairs written as `SARC` tags.
    pub archives: Vec<(String, Vec<u8>)>,
}

impl TestSourceTable {
    pub fn new(tag: FourCC) -> Self {
        TestSourceTable {
            tag,
            link_options: String::new(),
            working_directory: "/tmp/build".to_owned(),
            archives: Vec::new(),
        }
    }

    pub fn archive(mut self, id: &str, data: &[u8]) -> Self {
        self.archives.push((id.to_owned(), data.to_vec()));
        self
    }
}

/// Offsets of the sections written by [`LibraryBuilder::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryLayout {
    pub function_list: Range<usize>,
    pub header_extension_offset: usize,
    pub public_metadata: Range<usize>,
    pub private_metadata: Range<usize>,
    pub source_table_offset: Option<usize>,
    pub bitcode: Range<usize>,
    /// Absolute range of each function's bitcode.
    pub function_bitcode: Vec<Range<usize>>,
}

#[derive(Debug, Clone)]
pub struct BuiltLibrary {
    pub bytes: Vec<u8>,
    pub layout: LibraryLayout,
}

/// Builds structurally valid synthetic libraries.
///
/// Layout: header, function list, end marker (`ENDT`, or four zero bytes for an
/// empty list), header extension tags, public metadata, private metadata,
/// source archive table, bitcode.
#[derive(Debug, Clone)]
pub struct LibraryBuilder {
    pub target_platform: u16,
    pub version: (u16, u16),
    pub library_type: u8,
    pub operating_system: u8,
    pub os_version: (u16, u16),
    pub functions: Vec<TestFunction>,
    pub header_extension_tags: Vec<Tag>,
    pub source_table: Option<TestSourceTable>,
}

impl Default for LibraryBuilder {
    fn default() -> Self {
        LibraryBuilder {
            target_platform: 0x8001,
            version: (1, 2),
            library_type: 0,
            operating_system: 0x81,
            os_version: (13, 0),
            functions: Vec::new(),
            header_extension_tags: Vec::new(),
            source_table: None,
        }
    }
}

impl LibraryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target_platform(mut self, raw: u16) -> Self {
        self.target_platform = raw;
        self
    }

    pub fn library_type(mut self, raw: u8) -> Self {
        self.library_type = raw;
        self
    }

    pub fn deployment_target(mut self, raw_os: u8, major: u16, minor: u16) -> Self {
        self.operating_system = raw_os;
        self.os_version = (major, minor);
        self
    }

    pub fn function(mut self, function: TestFunction) -> Self {
        self.functions.push(function);
        self
    }

    pub fn header_extension_tag(mut self, name: FourCC, content: &[u8]) -> Self {
        self.header_extension_tags.push(Tag::new(name, content));
        self
    }

    pub fn source_table(mut self, table: TestSourceTable) -> Self {
        self.source_table = Some(table);
        self
    }

    pub fn build_bytes(&self) -> Vec<u8> {
        self.build().bytes
    }

    pub fn build(&self) -> BuiltLibrary {
        let mut public_metadata = Vec::new();
        let mut private_metadata = Vec::new();
        let mut bitcode = Vec::new();
        let mut relative_offsets = Vec::with_capacity(self.functions.len());
        for function in &self.functions {
            let public = public_metadata.len() as u64;
            write_sized_group(&mut public_metadata, &function.public_metadata_tags);
            let private = private_metadata.len() as u64;
            write_sized_group(&mut private_metadata, &function.private_metadata_tags);
            let code = bitcode.len() as u64;
            bitcode.extend_from_slice(&function.bitcode);
            relative_offsets.push([public, private, code]);
        }

        let mut function_list = Vec::new();
        if !self.functions.is_empty() {
            let count = u32::try_from(self.functions.len()).expect("too many test functions");
            function_list.extend_from_slice(&count.to_le_bytes());
            for (function, offsets) in self.functions.iter().zip(&relative_offsets) {
                write_sized_group(&mut function_list, &function.entry_tags(*offsets));
            }
        }

        let mut out = vec![0u8; HEADER_LEN];
        let function_list_offset = out.len();
        out.extend_from_slice(&function_list);
        let function_list_end = out.len();
        if self.functions.is_empty() {
            out.extend_from_slice(&[0u8; 4]);
        } else {
            out.extend_from_slice(&FourCC::ENDT.0);
        }

        let header_extension_offset = out.len();
        let mut extension_tags = self.header_extension_tags.clone();
        if let Some(table) = &self.source_table {
            extension_tags.push(Tag::new(table.tag, [0u8; 16]));
        }
        let mut source_tag_content_pos = None;
        if !extension_tags.is_empty() {
            for tag in &extension_tags {
                out.extend_from_slice(&tag.name.0);
                let len = u16::try_from(tag.content.len()).expect("tag too large");
                out.extend_from_slice(&len.to_le_bytes());
                if self.source_table.as_ref().map(|t| t.tag) == Some(tag.name) {
                    source_tag_content_pos = Some(out.len());
                }
                out.extend_from_slice(&tag.content);
            }
            out.extend_from_slice(&FourCC::ENDT.0);
        }

        let public_start = out.len();
        out.extend_from_slice(&public_metadata);
        let public_range = public_start..out.len();

        let private_start = out.len();
        out.extend_from_slice(&private_metadata);
        let private_range = private_start..out.len();

        let mut source_table_offset = None;
        if let Some(table) = &self.source_table {
            let table_offset = out.len();
            source_table_offset = Some(table_offset);
            let count = u32::try_from(table.archives.len()).expect("too many test archives");
            out.extend_from_slice(&count.to_le_bytes());
            push_cstring(&mut out, &table.link_options);
            if table.tag == FourCC::HSRD {
                push_cstring(&mut out, &table.working_directory);
            }
            for (id, data) in &table.archives {
                let mut group = Vec::new();
                let mut content = Vec::new();
                push_cstring(&mut content, id);
                content.extend_from_slice(data);
                group.extend_from_slice(&FourCC::SARC.0);
                group.extend_from_slice(&(content.len() as u32).to_le_bytes());
                group.extend_from_slice(&content);
                group.extend_from_slice(&FourCC::ENDT.0);
                out.extend_from_slice(&(group.len() as u32).to_le_bytes());
                out.extend_from_slice(&group);
            }
            if let Some(pos) = source_tag_content_pos {
                out[pos..pos + 8].copy_from_slice(&(table_offset as u64).to_le_bytes());
            }
        }

        let bitcode_start = out.len();
        out.extend_from_slice(&bitcode);
        let bitcode_range = bitcode_start..out.len();
        let function_bitcode = relative_offsets
            .iter()
            .zip(&self.functions)
            .map(|(offsets, function)| {
                let start = bitcode_start + offsets[2] as usize;
                start..start + function.bitcode.len()
            })
            .collect();

        let mut header = Vec::with_capacity(HEADER_LEN);
        header.extend_from_slice(&METALLIB_MAGIC.0);
        header.extend_from_slice(&self.target_platform.to_le_bytes());
        header.extend_from_slice(&self.version.0.to_le_bytes());
        header.extend_from_slice(&self.version.1.to_le_bytes());
        header.push(self.library_type);
        header.push(self.operating_system);
        header.extend_from_slice(&self.os_version.0.to_le_bytes());
        header.extend_from_slice(&self.os_version.1.to_le_bytes());
        for value in [
            out.len(),
            function_list_offset,
            function_list.len(),
            public_range.start,
            public_range.len(),
            private_range.start,
            private_range.len(),
            bitcode_range.start,
            bitcode_range.len(),
        ] {
            header.extend_from_slice(&(value as u64).to_le_bytes());
        }
        assert_eq!(header.len(), HEADER_LEN);
        out[..HEADER_LEN].copy_from_slice(&header);

        BuiltLibrary {
            bytes: out,
            layout: LibraryLayout {
                function_list: function_list_offset..function_list_end,
                header_extension_offset,
                public_metadata: public_range,
                private_metadata: private_range,
                source_table_offset,
                bitcode: bitcode_range,
                function_bitcode,
            },
        }
    }
}

/// Writes `u32 size`, the tags with 16-bit lengths, then `ENDT`.
fn write_sized_group(out: &mut Vec<u8>, tags: &[Tag]) {
    let mut group = Vec::new();
    for tag in tags {
        group.extend_from_slice(&tag.name.0);
        let len = u16::try_from(tag.content.len()).expect("tag too large");
        group.extend_from_slice(&len.to_le_bytes());
        group.extend_from_slice(&tag.content);
    }
    group.extend_from_slice(&FourCC::ENDT.0);
    out.extend_from_slice(&(group.len() as u32).to_le_bytes());
    out.extend_from_slice(&group);
}

fn push_cstring(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}
