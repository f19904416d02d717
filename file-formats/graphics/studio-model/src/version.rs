use std::fmt;

use crate::error::{Result, StudioError};

/// The only VVD version in circulation
pub const VVD_VERSION: i32 = 4;

/// The VTX version written by all supported compilers
pub const VTX_VERSION: i32 = 7;

/// Supported MDL format versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
#[repr(i32)]
pub enum MdlVersion {
    V44 = 44,
    V45 = 45,
    V46 = 46,
    V47 = 47,
    V48 = 48,
    /// Adds topology tables to VTX strip groups and strips
    V49 = 49,
}

impl MdlVersion {
    pub const SUPPORTED: &'static str = "44..=49";

    /// Convert a raw version number to an MdlVersion
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            44 => Some(Self::V44),
            45 => Some(Self::V45),
            46 => Some(Self::V46),
            47 => Some(Self::V47),
            48 => Some(Self::V48),
            49 => Some(Self::V49),
            _ => None,
        }
    }

    /// Like [`MdlVersion::from_raw`], reporting unknown versions as an error
    pub fn parse(raw: i32) -> Result<Self> {
        Self::from_raw(raw).ok_or(StudioError::UnsupportedVersion {
            format: "MDL",
            version: raw,
            supported: Self::SUPPORTED,
        })
    }

    pub fn to_raw(self) -> i32 {
        self as i32
    }

    pub fn min_supported() -> Self {
        Self::V44
    }

    pub fn max_supported() -> Self {
        Self::V49
    }

    /// Whether the companion VTX carries topology pairs in strip groups and strips
    pub fn has_vtx_topology(self) -> bool {
        self >= Self::V49
    }
}

impl fmt::Display for MdlVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_raw())
    }
}
