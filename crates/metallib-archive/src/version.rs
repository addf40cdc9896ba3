use core::fmt;

macro_rules! version_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            pub major: u16,
            pub minor: u16,
        }

        impl $name {
            pub const fn new(major: u16, minor: u16) -> Self {
                $name { major, minor }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}.{}", self.major, self.minor)
            }
        }
    };
}

version_type!(
    /// Version of the library container format itself.
    LibraryVersion
);

version_type!(
    /// Shading language version a function was compiled with.
    LanguageVersion
);

version_type!(
    /// Version of the GPU intermediate representation a function's bitcode targets.
    AirVersion
);

version_type!(
    /// Minimum operating system version of a deployment target.
    OsVersion
);
