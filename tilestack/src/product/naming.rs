//! Product naming conventions.
//!
//! Level-2A products were published under two layouts over the years. They
//! differ in identifier field offsets, granule directory masks, band file
//! masks and where the scene classification map lives. Each layout is a
//! static [`LayoutTable`]; the convention is classified once per product and
//! passed along explicitly.
//!
//! Standard (long) identifier:
//! `S2A_USER_PRD_MSIL2A_PDMC_20160615T123456_R022_V20160615T101032_20160615T101032.SAFE`
//!
//! Compact identifier:
//! `S2A_MSIL2A_20170608T100431_N0205_R122_T32TQM_20170608T100435.SAFE`

use std::ops::Range;

use crate::band::Band;

/// Directory mask of Level-2A source products.
pub const SOURCE_PRODUCT_MASK: &str = "*_MSIL2A_*";

/// Directory mask of Level-3 target products.
pub const TARGET_PRODUCT_MASK: &str = "*L03_*";

/// Layout of one naming convention.
#[derive(Debug, PartialEq, Eq)]
pub struct LayoutTable {
    /// Byte range of the acquisition window start in the product identifier.
    pub window_start: Range<usize>,
    /// Byte range of the acquisition window end; equal to `window_start`
    /// when the layout records a single sensing time.
    pub window_stop: Range<usize>,
    /// Mask of granule directories inside `GRANULE/`.
    pub granule_mask: &'static str,
    /// `_`-separated field holding the footprint in a granule name.
    pub footprint_field: usize,
    /// `_`-separated field holding the orbit in a granule name.
    pub orbit_field: usize,
    /// `_`-separated field holding the sensing time in a granule name.
    pub sensing_field: usize,
    /// Mask of the tile metadata file inside a granule directory.
    pub tile_metadata_mask: &'static str,
    /// Whether the scene classification map sits in `IMG_DATA` instead of
    /// the resolution folder.
    pub classification_in_img_data: bool,
}

const STANDARD: LayoutTable = LayoutTable {
    window_start: 47..62,
    window_stop: 63..78,
    granule_mask: "*L2A_*",
    footprint_field: 9,
    orbit_field: 8,
    sensing_field: 7,
    tile_metadata_mask: "*_MTD_L2A_TL_*.xml",
    classification_in_img_data: true,
};

const COMPACT: LayoutTable = LayoutTable {
    window_start: 45..60,
    window_stop: 45..60,
    granule_mask: "L2A_*",
    footprint_field: 1,
    orbit_field: 2,
    sensing_field: 3,
    tile_metadata_mask: "MTD_TL.xml",
    classification_in_img_data: false,
};

/// The two historical product layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamingConvention {
    Standard,
    Compact,
}

impl NamingConvention {
    /// Classify a product identifier.
    ///
    /// Returns `None` for identifiers that follow neither layout.
    pub fn classify(identifier: &str) -> Option<Self> {
        let mut fields = identifier.split('_');
        let _mission = fields.next()?;
        match fields.next()? {
            "USER" => Some(NamingConvention::Standard),
            "MSIL2A" => Some(NamingConvention::Compact),
            _ => None,
        }
    }

    /// Static layout of this convention.
    pub fn layout(self) -> &'static LayoutTable {
        match self {
            NamingConvention::Standard => &STANDARD,
            NamingConvention::Compact => &COMPACT,
        }
    }

    /// Glob mask matching a band file of this convention.
    pub fn band_mask(self, band: Band, extension: &str) -> String {
        match self {
            NamingConvention::Standard => format!("*_L2A_*_{}_??m.{}", band.name(), extension),
            NamingConvention::Compact => format!("*_{}_??m.{}", band.name(), extension),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NamingConvention::Standard => "standard",
            NamingConvention::Compact => "compact",
        }
    }
}
