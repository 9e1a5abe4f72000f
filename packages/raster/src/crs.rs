//! Coordinate reference systems known to the pipeline.
//!
//! Only the distinctions that change how ground area is measured are
//! modelled: geographic longitude/latitude, UTM zones (what Landsat scenes
//! are delivered in), and any other projected CRS identified by EPSG code.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::RasterError;

/// A coordinate reference system, identified by EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Crs {
    /// WGS84 longitude/latitude in degrees (EPSG:4326).
    Geographic,
    /// WGS84 / UTM zone (EPSG:326zz north, EPSG:327zz south).
    Utm {
        /// Zone number, 1–60.
        zone: u8,
        /// Northern hemisphere.
        north: bool,
    },
    /// Any other projected CRS in meters.
    Projected {
        /// EPSG code.
        epsg: u32,
    },
}

impl Crs {
    /// Builds a CRS from an EPSG code.
    #[must_use]
    pub fn from_epsg(epsg: u32) -> Self {
        match epsg {
            4326 => Self::Geographic,
            32601..=32660 => Self::Utm {
                zone: u8::try_from(epsg - 32600).unwrap_or_default(),
                north: true,
            },
            32701..=32760 => Self::Utm {
                zone: u8::try_from(epsg - 32700).unwrap_or_default(),
                north: false,
            },
            _ => Self::Projected { epsg },
        }
    }

    /// EPSG code of this CRS.
    #[must_use]
    pub fn epsg(self) -> u32 {
        match self {
            Self::Geographic => 4326,
            Self::Utm { zone, north: true } => 32600 + u32::from(zone),
            Self::Utm { zone, north: false } => 32700 + u32::from(zone),
            Self::Projected { epsg } => epsg,
        }
    }
}

impl FromStr for Crs {
    type Err = RasterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let code = trimmed
            .get(..5)
            .filter(|prefix| prefix.eq_ignore_ascii_case("EPSG:"))
            .and_then(|_| trimmed[5..].parse::<u32>().ok())
            .ok_or_else(|| RasterError::InvalidCrs(s.to_string()))?;
        Ok(Self::from_epsg(code))
    }
}

impl TryFrom<String> for Crs {
    type Error = RasterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Crs> for String {
    fn from(value: Crs) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_utm_zones() {
        assert_eq!(
            "EPSG:32616".parse::<Crs>().unwrap(),
            Crs::Utm {
                zone: 16,
                north: true
            }
        );
        assert_eq!(
            "epsg:32733".parse::<Crs>().unwrap(),
            Crs::Utm {
                zone: 33,
                north: false
            }
        );
    }

    #[test]
    fn parses_geographic_and_other_projected() {
        assert_eq!("EPSG:4326".parse::<Crs>().unwrap(), Crs::Geographic);
        assert_eq!(
            "EPSG:5070".parse::<Crs>().unwrap(),
            Crs::Projected { epsg: 5070 }
        );
    }

    #[test]
    fn rejects_malformed_identifiers() {
        assert!("32616".parse::<Crs>().is_err());
        assert!("EPSG:".parse::<Crs>().is_err());
        assert!("ESRI:102003".parse::<Crs>().is_err());
    }

    #[test]
    fn display_roundtrips_epsg() {
        for code in [4326, 32616, 32716, 5070] {
            let crs = Crs::from_epsg(code);
            assert_eq!(crs.to_string().parse::<Crs>().unwrap(), crs);
        }
    }
}
