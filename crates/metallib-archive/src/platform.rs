//! Library-wide classification: library type, target platform and deployment target.
//!
//! On-disk codes map through plain `match` tables; an unknown code yields
//! `None` and the decoder decides whether that is fatal.

use core::fmt;

use crate::version::OsVersion;

/// Kind of library stored in the container.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LibraryType {
    Executable,
    CoreImage,
    Dynamic,
    SymbolCompanion,
}

impl LibraryType {
    pub const ALL: [LibraryType; 4] = [
        LibraryType::Executable,
        LibraryType::CoreImage,
        LibraryType::Dynamic,
        LibraryType::SymbolCompanion,
    ];

    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(LibraryType::Executable),
            1 => Some(LibraryType::CoreImage),
            2 => Some(LibraryType::Dynamic),
            3 => Some(LibraryType::SymbolCompanion),
            _ => None,
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            LibraryType::Executable => 0,
            LibraryType::CoreImage => 1,
            LibraryType::Dynamic => 2,
            LibraryType::SymbolCompanion => 3,
        }
    }
}

impl fmt::Display for LibraryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LibraryType::Executable => "Executable",
            LibraryType::CoreImage => "Core Image",
            LibraryType::Dynamic => "Dynamic",
            LibraryType::SymbolCompanion => "Symbol Companion",
        })
    }
}

/// Coarse platform family from the fixed header.
///
/// `Ios` covers every non-macOS Apple platform (tvOS, watchOS, simulators,
/// Mac Catalyst). Use [`DeploymentTarget`] for the precise OS.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TargetPlatform {
    MacOs,
    Ios,
}

impl TargetPlatform {
    pub const MACOS_RAW: u16 = 0x8001;
    pub const IOS_RAW: u16 = 0x0001;

    pub fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            Self::MACOS_RAW => Some(TargetPlatform::MacOs),
            Self::IOS_RAW => Some(TargetPlatform::Ios),
            _ => None,
        }
    }

    pub fn raw(self) -> u16 {
        match self {
            TargetPlatform::MacOs => Self::MACOS_RAW,
            TargetPlatform::Ios => Self::IOS_RAW,
        }
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TargetPlatform::MacOs => "macOS",
            TargetPlatform::Ios => "iOS",
        })
    }
}

/// Operating system named by the deployment target.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OperatingSystem {
    MacOs,
    Ios,
    TvOs,
    WatchOs,
    BridgeOs,
    MacCatalyst,
    IosSimulator,
    TvOsSimulator,
    WatchOsSimulator,
}

impl OperatingSystem {
    pub const ALL: [OperatingSystem; 9] = [
        OperatingSystem::MacOs,
        OperatingSystem::Ios,
        OperatingSystem::TvOs,
        OperatingSystem::WatchOs,
        OperatingSystem::BridgeOs,
        OperatingSystem::MacCatalyst,
        OperatingSystem::IosSimulator,
        OperatingSystem::TvOsSimulator,
        OperatingSystem::WatchOsSimulator,
    ];

    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0x81 => Some(OperatingSystem::MacOs),
            0x82 => Some(OperatingSystem::Ios),
            0x83 => Some(OperatingSystem::TvOs),
            0x84 => Some(OperatingSystem::WatchOs),
            0x85 => Some(OperatingSystem::BridgeOs),
            0x86 => Some(OperatingSystem::MacCatalyst),
            0x87 => Some(OperatingSystem::IosSimulator),
            0x88 => Some(OperatingSystem::TvOsSimulator),
            0x89 => Some(OperatingSystem::WatchOsSimulator),
            _ => None,
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            OperatingSystem::MacOs => 0x81,
            OperatingSystem::Ios => 0x82,
            OperatingSystem::TvOs => 0x83,
            OperatingSystem::WatchOs => 0x84,
            OperatingSystem::BridgeOs => 0x85,
            OperatingSystem::MacCatalyst => 0x86,
            OperatingSystem::IosSimulator => 0x87,
            OperatingSystem::TvOsSimulator => 0x88,
            OperatingSystem::WatchOsSimulator => 0x89,
        }
    }
}

impl fmt::Display for OperatingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperatingSystem::MacOs => "macOS",
            OperatingSystem::Ios => "iOS",
            OperatingSystem::TvOs => "tvOS",
            OperatingSystem::WatchOs => "watchOS",
            OperatingSystem::BridgeOs => "bridgeOS",
            OperatingSystem::MacCatalyst => "Mac Catalyst",
            OperatingSystem::IosSimulator => "iOS Simulator",
            OperatingSystem::TvOsSimulator => "tvOS Simulator",
            OperatingSystem::WatchOsSimulator => "watchOS Simulator",
        })
    }
}

/// Minimum OS the library's functions were compiled for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DeploymentTarget {
    pub operating_system: OperatingSystem,
    pub version: OsVersion,
}

impl fmt::Display for DeploymentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.operating_system, self.version)
    }
}
