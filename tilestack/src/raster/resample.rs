//! Order-1 (bilinear) resampling.

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, Primitive};

use super::{Raster, RasterData, RasterError};

/// Resample a raster to exactly `rows` x `cols` with bilinear interpolation.
///
/// Used to bring quality layers published at twice the pixel size onto the
/// grid of the reference band.
///
/// # Arguments
///
/// * `raster` - Source raster
/// * `rows` - Target row count
/// * `cols` - Target column count
pub fn resize_bilinear(raster: &Raster, rows: usize, cols: usize) -> Result<Raster, RasterError> {
    if raster.dims() == (rows, cols) {
        return Ok(raster.clone());
    }
    let data = match raster.data() {
        RasterData::U8(pixels) => RasterData::U8(resize_plane(pixels, raster.dims(), (rows, cols))?),
        RasterData::U16(pixels) => {
            RasterData::U16(resize_plane(pixels, raster.dims(), (rows, cols))?)
        }
    };
    Raster::new(rows, cols, data)
}

fn resize_plane<T>(
    pixels: &[T],
    (src_rows, src_cols): (usize, usize),
    (rows, cols): (usize, usize),
) -> Result<Vec<T>, RasterError>
where
    T: Primitive + 'static,
    Luma<T>: image::Pixel<Subpixel = T>,
{
    let to_u32 = |rows: usize, cols: usize| -> Result<(u32, u32), RasterError> {
        match (u32::try_from(cols), u32::try_from(rows)) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok((w, h)),
            _ => Err(RasterError::InvalidDimensions { rows, cols }),
        }
    };
    let (src_w, src_h) = to_u32(src_rows, src_cols)?;
    let (dst_w, dst_h) = to_u32(rows, cols)?;

    let source: ImageBuffer<Luma<T>, Vec<T>> = ImageBuffer::from_raw(src_w, src_h, pixels.to_vec())
        .ok_or(RasterError::ShapeMismatch {
            rows: src_rows,
            cols: src_cols,
            len: pixels.len(),
        })?;

    Ok(imageops::resize(&source, dst_w, dst_h, FilterType::Triangle).into_raw())
}
