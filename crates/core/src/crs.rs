//! Coordinate Reference System handling
//!
//! Tile grids in this pipeline are always defined against a projected CRS
//! identified by an EPSG code (e.g. the continental Albers grid 6933 or a
//! UTM zone), so the representation is EPSG-first.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate reference system identified by an EPSG code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crs {
    epsg: u32,
}

impl Crs {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self { epsg: code }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Get the EPSG code
    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &Crs) -> bool {
        self.epsg == other.epsg
    }

    /// String identifier, e.g. `EPSG:6933`
    pub fn identifier(&self) -> String {
        format!("EPSG:{}", self.epsg)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_identifier() {
        let crs = Crs::from_epsg(6933);
        assert_eq!(crs.epsg(), 6933);
        assert_eq!(crs.identifier(), "EPSG:6933");
    }

    #[test]
    fn test_crs_equivalence() {
        assert!(Crs::from_epsg(4326).is_equivalent(&Crs::wgs84()));
        assert!(!Crs::from_epsg(6933).is_equivalent(&Crs::wgs84()));
    }
}
