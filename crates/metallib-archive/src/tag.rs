use core::fmt;

use crate::fourcc::FourCC;

/// A named, length-prefixed record: the atomic unit of the library format.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    /// The tag name.
    pub name: FourCC,
    /// Raw tag content, copied out of the library buffer.
    pub content: Vec<u8>,
}

impl Tag {
    pub fn new(name: FourCC, content: impl Into<Vec<u8>>) -> Self {
        Tag {
            name,
            content: content.into(),
        }
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tag")
            .field("name", &self.name)
            .field("content_len", &self.content.len())
            .finish()
    }
}

/// Width of the content-length field that follows each tag name.
///
/// Function and header extension groups use 16-bit lengths; source archive
/// groups use 32-bit lengths.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TagLengthWidth {
    U16,
    U32,
}

/// Returns the first tag named `name`.
///
/// Tag groups are small, so this is a linear scan in on-disk order.
pub fn find_tag(tags: &[Tag], name: FourCC) -> Option<&Tag> {
    tags.iter().find(|tag| tag.name == name)
}
