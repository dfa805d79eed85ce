//! Synthetic raster values.
//!
//! Row-major pixel patterns whose values say where they came from, so a
//! test can tell which source pixel landed in which output pixel.

/// Values `row * width + col`.
///
/// ```
/// use test_utils::ramp_values;
///
/// let values = ramp_values(3, 4);
/// assert_eq!(values[4], 4.0); // row 1, col 0
/// assert_eq!(values[11], 11.0);
/// ```
pub fn ramp_values(height: usize, width: usize) -> Vec<f32> {
    (0..height * width).map(|i| i as f32).collect()
}

/// Constant `block` x `block` squares numbered row-major.
///
/// Downsampling by `block` reproduces `ramp_values(height / block, width / block)`
/// whatever resampling kernel is used.
pub fn block_values(height: usize, width: usize, block: usize) -> Vec<f32> {
    let blocks_per_row = width.div_ceil(block);
    let mut data = Vec::with_capacity(height * width);
    for row in 0..height {
        for col in 0..width {
            data.push(((row / block) * blocks_per_row + col / block) as f32);
        }
    }
    data
}

/// Overwrite the (col, row) positions of `data` with `fill`.
///
/// Positions outside the raster are ignored.
pub fn punch_holes(data: &mut [f32], width: usize, holes: &[(usize, usize)], fill: f32) {
    let height = if width == 0 { 0 } else { data.len() / width };
    for &(col, row) in holes {
        if col < width && row < height {
            data[row * width + col] = fill;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_values() {
        let values = ramp_values(5, 10);
        assert_eq!(values.len(), 50);
        assert_eq!(values[0], 0.0);
        assert_eq!(values[10], 10.0); // row 1, col 0
        assert_eq!(values[49], 49.0);
    }

    #[test]
    fn test_block_values() {
        let values = block_values(4, 4, 2);
        assert_eq!(values, vec![
            0.0, 0.0, 1.0, 1.0,
            0.0, 0.0, 1.0, 1.0,
            2.0, 2.0, 3.0, 3.0,
            2.0, 2.0, 3.0, 3.0,
        ]);
    }

    #[test]
    fn test_punch_holes() {
        let mut values = ramp_values(4, 4);
        punch_holes(&mut values, 4, &[(1, 2), (9, 9)], -999.0);
        assert_eq!(values[2 * 4 + 1], -999.0);
        assert_eq!(values.iter().filter(|&&v| v == -999.0).count(), 1);

        punch_holes(&mut values, 4, &[(0, 0)], f32::NAN);
        assert!(values[0].is_nan());
    }
}
