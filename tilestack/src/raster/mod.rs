//! In-memory 2-D rasters.
//!
//! A [`Raster`] is a row-major grid of unsigned integers. Spectral bands are
//! 16-bit; classification and mosaic maps are 8-bit.

mod median;
mod resample;

pub use median::median_filter;
pub use resample::resize_bilinear;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Element type of a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    U8,
    U16,
}

/// Pixel storage for a raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RasterData {
    U8(Vec<u8>),
    U16(Vec<u16>),
}

impl RasterData {
    /// Number of pixels held.
    pub fn len(&self) -> usize {
        match self {
            RasterData::U8(v) => v.len(),
            RasterData::U16(v) => v.len(),
        }
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element type of the buffer.
    pub fn element_type(&self) -> ElementType {
        match self {
            RasterData::U8(_) => ElementType::U8,
            RasterData::U16(_) => ElementType::U16,
        }
    }
}

/// Errors raised when building or reshaping rasters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RasterError {
    #[error("buffer of {len} pixels does not match a {rows}x{cols} raster")]
    ShapeMismatch { rows: usize, cols: usize, len: usize },

    #[error("raster dimensions {rows}x{cols} are out of range")]
    InvalidDimensions { rows: usize, cols: usize },
}

/// A row-major 2-D raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    rows: usize,
    cols: usize,
    data: RasterData,
}

impl Raster {
    /// Wrap a pixel buffer, checking that it matches the given shape.
    pub fn new(rows: usize, cols: usize, data: RasterData) -> Result<Self, RasterError> {
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(RasterError::ShapeMismatch {
                rows,
                cols,
                len: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// A raster filled with zeros.
    pub fn zeros(rows: usize, cols: usize, element_type: ElementType) -> Self {
        let data = match element_type {
            ElementType::U8 => RasterData::U8(vec![0; rows * cols]),
            ElementType::U16 => RasterData::U16(vec![0; rows * cols]),
        };
        Self { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    pub fn dims(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn element_type(&self) -> ElementType {
        self.data.element_type()
    }

    pub fn data(&self) -> &RasterData {
        &self.data
    }

    pub fn into_data(self) -> RasterData {
        self.data
    }

    /// Borrow the pixels if this is an 8-bit raster.
    pub fn as_u8(&self) -> Option<&[u8]> {
        match &self.data {
            RasterData::U8(v) => Some(v),
            RasterData::U16(_) => None,
        }
    }

    /// Borrow the pixels if this is a 16-bit raster.
    pub fn as_u16(&self) -> Option<&[u16]> {
        match &self.data {
            RasterData::U16(v) => Some(v),
            RasterData::U8(_) => None,
        }
    }

    /// Pixel value widened to 16 bits.
    ///
    /// Returns `None` outside the raster.
    pub fn get(&self, row: usize, col: usize) -> Option<u16> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        let idx = row * self.cols + col;
        Some(match &self.data {
            RasterData::U8(v) => u16::from(v[idx]),
            RasterData::U16(v) => v[idx],
        })
    }

    /// Set a pixel; 8-bit rasters saturate at 255.
    ///
    /// Returns `false` when the position is outside the raster.
    pub fn set(&mut self, row: usize, col: usize, value: u16) -> bool {
        if row >= self.rows || col >= self.cols {
            return false;
        }
        let idx = row * self.cols + col;
        match &mut self.data {
            RasterData::U8(v) => v[idx] = value.min(u16::from(u8::MAX)) as u8,
            RasterData::U16(v) => v[idx] = value,
        }
        true
    }

    /// Convert to another element type; narrowing saturates.
    pub fn to_element_type(&self, element_type: ElementType) -> Raster {
        let data = match (&self.data, element_type) {
            (RasterData::U8(v), ElementType::U8) => RasterData::U8(v.clone()),
            (RasterData::U16(v), ElementType::U16) => RasterData::U16(v.clone()),
            (RasterData::U8(v), ElementType::U16) => {
                RasterData::U16(v.iter().map(|&p| u16::from(p)).collect())
            }
            (RasterData::U16(v), ElementType::U8) => RasterData::U8(
                v.iter()
                    .map(|&p| p.min(u16::from(u8::MAX)) as u8)
                    .collect(),
            ),
        };
        Raster {
            rows: self.rows,
            cols: self.cols,
            data,
        }
    }
}
