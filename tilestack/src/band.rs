//! Processing resolutions and band identifiers.
//!
//! A run works on exactly one [`Resolution`]. Each resolution has its own
//! spectral band set; the quality layers (aerosol thickness, scene
//! classification and the mosaic map) ride along with every resolution.

use std::fmt;
use std::str::FromStr;

use crate::raster::ElementType;

/// Spatial resolution of a run, in metres per pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resolution {
    R10,
    R20,
    R60,
}

impl Resolution {
    /// Processing order used when no resolution is requested explicitly.
    pub const COARSE_TO_FINE: [Resolution; 3] = [Resolution::R60, Resolution::R20, Resolution::R10];

    /// Resolution in metres.
    pub fn meters(self) -> u32 {
        match self {
            Resolution::R10 => 10,
            Resolution::R20 => 20,
            Resolution::R60 => 60,
        }
    }

    /// Parse a resolution from metres.
    pub fn from_meters(meters: u32) -> Option<Self> {
        match meters {
            10 => Some(Resolution::R10),
            20 => Some(Resolution::R20),
            60 => Some(Resolution::R60),
            _ => None,
        }
    }

    /// Band directory name inside a granule's `IMG_DATA` (e.g. `R60m`).
    pub fn dir_name(self) -> String {
        format!("R{}m", self.meters())
    }

    /// Whether this is the finest resolution the products carry.
    pub fn is_finest(self) -> bool {
        self == Resolution::R10
    }

    /// The resolution at which quality layers missing from the finest
    /// resolution are published instead.
    pub fn quality_source(self) -> Resolution {
        match self {
            Resolution::R10 => Resolution::R20,
            other => other,
        }
    }

    /// Spectral bands staged at this resolution. `B02` is always first.
    pub fn spectral_bands(self) -> &'static [Band] {
        use Band::*;
        match self {
            Resolution::R10 => &[B02, B03, B04, B08],
            Resolution::R20 => &[B02, B03, B04, B05, B06, B07, B8A, B11, B12],
            Resolution::R60 => &[B01, B02, B03, B04, B05, B06, B07, B8A, B09, B11, B12],
        }
    }

    /// Bands written into the target product when a run finalises.
    pub fn export_bands(self) -> Vec<Band> {
        let mut bands = self.spectral_bands().to_vec();
        bands.push(Band::SCL);
        bands.push(Band::MSC);
        bands
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.meters())
    }
}

/// One raster layer of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Band {
    B01,
    B02,
    B03,
    B04,
    B05,
    B06,
    B07,
    B08,
    B8A,
    B09,
    B11,
    B12,
    /// Aerosol optical thickness.
    AOT,
    /// Scene classification map.
    SCL,
    /// Mosaic map: which pass contributed each aggregate pixel.
    MSC,
}

impl Band {
    /// The band every tile must carry; its shape defines the tile's shape.
    pub const REFERENCE: Band = Band::B02;

    /// Quality layers staged next to the spectral bands.
    pub const QUALITY: [Band; 2] = [Band::AOT, Band::SCL];

    /// Band name as it appears in file names.
    pub fn name(self) -> &'static str {
        match self {
            Band::B01 => "B01",
            Band::B02 => "B02",
            Band::B03 => "B03",
            Band::B04 => "B04",
            Band::B05 => "B05",
            Band::B06 => "B06",
            Band::B07 => "B07",
            Band::B08 => "B08",
            Band::B8A => "B8A",
            Band::B09 => "B09",
            Band::B11 => "B11",
            Band::B12 => "B12",
            Band::AOT => "AOT",
            Band::SCL => "SCL",
            Band::MSC => "MSC",
        }
    }

    /// Element type of the cached dataset.
    pub fn element_type(self) -> ElementType {
        match self {
            Band::SCL | Band::MSC => ElementType::U8,
            _ => ElementType::U16,
        }
    }

    /// Whether the band is a quality layer rather than a spectral channel.
    pub fn is_quality(self) -> bool {
        matches!(self, Band::AOT | Band::SCL | Band::MSC)
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Band {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let band = match s.to_ascii_uppercase().as_str() {
            "B01" => Band::B01,
            "B02" => Band::B02,
            "B03" => Band::B03,
            "B04" => Band::B04,
            "B05" => Band::B05,
            "B06" => Band::B06,
            "B07" => Band::B07,
            "B08" => Band::B08,
            "B8A" => Band::B8A,
            "B09" => Band::B09,
            "B11" => Band::B11,
            "B12" => Band::B12,
            "AOT" => Band::AOT,
            "SCL" => Band::SCL,
            "MSC" => Band::MSC,
            other => return Err(format!("unknown band: {}", other)),
        };
        Ok(band)
    }
}
