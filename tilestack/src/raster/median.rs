//! Uniform median smoothing.

use super::{Raster, RasterData};

/// Apply a `size` x `size` median filter.
///
/// Windows are clamped at the raster edges. A size of 0 or 1 returns the
/// raster unchanged.
pub fn median_filter(raster: &Raster, size: usize) -> Raster {
    if size <= 1 || raster.rows() == 0 || raster.cols() == 0 {
        return raster.clone();
    }
    let (rows, cols) = raster.dims();
    let data = match raster.data() {
        RasterData::U8(pixels) => RasterData::U8(filter_plane(pixels, rows, cols, size)),
        RasterData::U16(pixels) => RasterData::U16(filter_plane(pixels, rows, cols, size)),
    };
    // Shape is preserved by construction.
    Raster::new(rows, cols, data).unwrap_or_else(|_| raster.clone())
}

fn filter_plane<T: Copy + Ord>(pixels: &[T], rows: usize, cols: usize, size: usize) -> Vec<T> {
    let before = size / 2;
    let after = size - 1 - before;
    let mut window = Vec::with_capacity(size * size);
    let mut out = Vec::with_capacity(pixels.len());

    for r in 0..rows {
        let r0 = r.saturating_sub(before);
        let r1 = (r + after).min(rows - 1);
        for c in 0..cols {
            let c0 = c.saturating_sub(before);
            let c1 = (c + after).min(cols - 1);

            window.clear();
            for rr in r0..=r1 {
                window.extend_from_slice(&pixels[rr * cols + c0..=rr * cols + c1]);
            }
            let mid = window.len() / 2;
            let (_, median, _) = window.select_nth_unstable(mid);
            out.push(*median);
        }
    }
    out
}
