use core::fmt;

use crate::fourcc::FourCC;
use crate::tag::{find_tag, Tag};
use crate::version::{AirVersion, LanguageVersion};

/// Entry point kind stored in a function's `TYPE` tag.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FunctionType {
    Vertex,
    Fragment,
    Kernel,
    Unqualified,
    Visible,
    Extern,
    Intersection,
}

impl FunctionType {
    pub const ALL: [FunctionType; 7] = [
        FunctionType::Vertex,
        FunctionType::Fragment,
        FunctionType::Kernel,
        FunctionType::Unqualified,
        FunctionType::Visible,
        FunctionType::Extern,
        FunctionType::Intersection,
    ];

    /// Maps the on-disk byte. Unknown values are not an error; newer
    /// compilers add function kinds.
    pub fn from_raw(raw: u8) -> Option<Self> {
        Self::ALL.get(usize::from(raw)).copied()
    }

    pub fn raw(self) -> u8 {
        match self {
            FunctionType::Vertex => 0,
            FunctionType::Fragment => 1,
            FunctionType::Kernel => 2,
            FunctionType::Unqualified => 3,
            FunctionType::Visible => 4,
            FunctionType::Extern => 5,
            FunctionType::Intersection => 6,
        }
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FunctionType::Vertex => "Vertex",
            FunctionType::Fragment => "Fragment",
            FunctionType::Kernel => "Kernel",
            FunctionType::Unqualified => "Unqualified",
            FunctionType::Visible => "Visible",
            FunctionType::Extern => "Extern",
            FunctionType::Intersection => "Intersection",
        })
    }
}

/// One compiled function of a library.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Function {
    /// Function name as stored in `NAME`, without the trailing NUL.
    pub name: String,
    /// `None` when the `TYPE` tag is absent or holds an unknown value.
    pub function_type: Option<FunctionType>,
    pub language_version: LanguageVersion,
    pub air_version: AirVersion,
    /// Every tag of the function entry in on-disk order, including the ones
    /// decoded into the fields above.
    pub tags: Vec<Tag>,
    pub public_metadata_tags: Vec<Tag>,
    pub private_metadata_tags: Vec<Tag>,
    /// Compiled bitcode. Different functions may carry identical bytes.
    pub bitcode: Vec<u8>,
    /// SHA-256 of [`Function::bitcode`], as stored in `HASH` and verified at decode time.
    pub bitcode_hash: [u8; 32],
}

impl Function {
    /// Returns the first entry tag named `name`.
    pub fn tag(&self, name: FourCC) -> Option<&Tag> {
        find_tag(&self.tags, name)
    }

    pub fn public_metadata_tag(&self, name: FourCC) -> Option<&Tag> {
        find_tag(&self.public_metadata_tags, name)
    }

    pub fn private_metadata_tag(&self, name: FourCC) -> Option<&Tag> {
        find_tag(&self.private_metadata_tags, name)
    }

    /// Whether the compiler recorded source for this function (`SOFF` present).
    pub fn is_source_included(&self) -> bool {
        self.tag(FourCC::SOFF).is_some()
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("function_type", &self.function_type)
            .field("language_version", &self.language_version)
            .field("air_version", &self.air_version)
            .field("tags", &self.tags)
            .field("public_metadata_tags", &self.public_metadata_tags)
            .field("private_metadata_tags", &self.private_metadata_tags)
            .field("bitcode_len", &self.bitcode.len())
            .finish()
    }
}
