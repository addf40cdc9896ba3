use core::fmt;

/// A four-character code naming a tag (e.g. `NAME`, `HASH`, `ENDT`).
///
/// Codes are stored as the raw on-disk bytes. The scanner only produces codes
/// whose bytes are ASCII, but codes built by hand may hold anything.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Terminates every tag group.
    pub const ENDT: FourCC = FourCC(*b"ENDT");
    /// Function name, NUL-terminated UTF-8.
    pub const NAME: FourCC = FourCC(*b"NAME");
    /// Bitcode size (`u64`).
    pub const MDSZ: FourCC = FourCC(*b"MDSZ");
    /// Function type (`u8`).
    pub const TYPE: FourCC = FourCC(*b"TYPE");
    /// SHA-256 of the function's bitcode.
    pub const HASH: FourCC = FourCC(*b"HASH");
    /// Public metadata, private metadata and bitcode offsets (3 x `u64`).
    pub const OFFT: FourCC = FourCC(*b"OFFT");
    /// AIR and language versions (4 x `u16`).
    pub const VERS: FourCC = FourCC(*b"VERS");
    /// Present when the function has recorded source.
    pub const SOFF: FourCC = FourCC(*b"SOFF");
    /// Tessellation info for post-tessellation vertex functions.
    pub const TESS: FourCC = FourCC(*b"TESS");
    /// Render target array index data type.
    pub const LAYR: FourCC = FourCC(*b"LAYR");
    /// Function constants (public metadata).
    pub const CNST: FourCC = FourCC(*b"CNST");
    /// Embedded source archive table (current layout, with working directory).
    pub const HSRD: FourCC = FourCC(*b"HSRD");
    /// Embedded source archive table (legacy layout).
    pub const HSRC: FourCC = FourCC(*b"HSRC");
    /// A single source archive entry.
    pub const SARC: FourCC = FourCC(*b"SARC");

    /// Returns the code as a `&str` if it is printable ASCII.
    pub fn as_str(&self) -> Option<&str> {
        if self.0.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            core::str::from_utf8(&self.0).ok()
        } else {
            None
        }
    }
}

impl From<[u8; 4]> for FourCC {
    fn from(bytes: [u8; 4]) -> Self {
        FourCC(bytes)
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => f.write_str(s),
            None => {
                for b in self.0 {
                    write!(f, "{}", core::ascii::escape_default(b))?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC(\"{self}\")")
    }
}
