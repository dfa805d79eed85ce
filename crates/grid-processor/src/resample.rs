//! Resampling kernels over a window of source pixels.
//!
//! Source values are NaN where invalid. Coordinates are continuous pixel
//! positions relative to the window: pixel (row, col) spans
//! `[col, col + 1) x [row, row + 1)` and its centre is `(col + 0.5, row + 0.5)`.
//! Every kernel returns NaN when it has no valid data to offer.

use cube_common::ResamplingMethod;

/// Read-only view of a window of source pixels, row-major.
#[derive(Debug, Clone, Copy)]
pub struct WindowView<'a> {
    pub data: &'a [f32],
    pub height: usize,
    pub width: usize,
}

impl<'a> WindowView<'a> {
    pub fn new(data: &'a [f32], height: usize, width: usize) -> Self {
        debug_assert_eq!(data.len(), height * width);
        Self {
            data,
            height,
            width,
        }
    }

    /// Value at integer pixel (row, col); NaN outside the window.
    #[inline]
    fn at(&self, row: i64, col: i64) -> f32 {
        if row < 0 || col < 0 || row as usize >= self.height || col as usize >= self.width {
            return f32::NAN;
        }
        self.data[row as usize * self.width + col as usize]
    }
}

/// Area of one target pixel in source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelFootprint {
    pub min_u: f64,
    pub min_v: f64,
    pub max_u: f64,
    pub max_v: f64,
}

/// Sample the window at `(u, v)` with `method`.
///
/// `footprint` is needed by the area methods (mode, average); without it
/// they behave like nearest.
pub fn sample(
    method: ResamplingMethod,
    view: &WindowView,
    u: f64,
    v: f64,
    footprint: Option<&PixelFootprint>,
) -> f32 {
    match method {
        ResamplingMethod::Nearest => nearest(view, u, v),
        ResamplingMethod::Bilinear => bilinear(view, u, v),
        ResamplingMethod::Cubic => cubic(view, u, v),
        ResamplingMethod::Mode => match footprint {
            Some(fp) => mode(view, fp).unwrap_or_else(|| nearest(view, u, v)),
            None => nearest(view, u, v),
        },
        ResamplingMethod::Average => match footprint {
            Some(fp) => average(view, fp).unwrap_or_else(|| nearest(view, u, v)),
            None => nearest(view, u, v),
        },
    }
}

/// The source pixel containing the point.
pub fn nearest(view: &WindowView, u: f64, v: f64) -> f32 {
    if !u.is_finite() || !v.is_finite() {
        return f32::NAN;
    }
    view.at(v.floor() as i64, u.floor() as i64)
}

/// Four-neighbour interpolation between pixel centres.
///
/// Falls back to nearest when a neighbour is invalid or outside the window.
pub fn bilinear(view: &WindowView, u: f64, v: f64) -> f32 {
    if !u.is_finite() || !v.is_finite() {
        return f32::NAN;
    }
    let x = u - 0.5;
    let y = v - 0.5;
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let xf = (x - x0 as f64) as f32;
    let yf = (y - y0 as f64) as f32;

    let v00 = view.at(y0, x0);
    let v10 = view.at(y0, x0 + 1);
    let v01 = view.at(y0 + 1, x0);
    let v11 = view.at(y0 + 1, x0 + 1);

    if v00.is_nan() || v10.is_nan() || v01.is_nan() || v11.is_nan() {
        return nearest(view, u, v);
    }

    let top = v00 * (1.0 - xf) + v10 * xf;
    let bottom = v01 * (1.0 - xf) + v11 * xf;
    top * (1.0 - yf) + bottom * yf
}

/// Catmull-Rom interpolation over sixteen neighbours.
///
/// Falls back to bilinear when any neighbour is invalid or outside the window.
pub fn cubic(view: &WindowView, u: f64, v: f64) -> f32 {
    if !u.is_finite() || !v.is_finite() {
        return f32::NAN;
    }
    let x = u - 0.5;
    let y = v - 0.5;
    let xi = x.floor() as i64;
    let yi = y.floor() as i64;
    let xf = (x - xi as f64) as f32;
    let yf = (y - yi as f64) as f32;

    let mut values = [[0.0f32; 4]; 4];
    for j in 0..4 {
        for i in 0..4 {
            let value = view.at(yi + j as i64 - 1, xi + i as i64 - 1);
            if value.is_nan() {
                return bilinear(view, u, v);
            }
            values[j][i] = value;
        }
    }

    let mut row_values = [0.0f32; 4];
    for j in 0..4 {
        row_values[j] = cubic_1d(values[j][0], values[j][1], values[j][2], values[j][3], xf);
    }

    cubic_1d(row_values[0], row_values[1], row_values[2], row_values[3], yf)
}

/// 1D cubic interpolation using Catmull-Rom spline.
fn cubic_1d(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;

    let a = -0.5 * p0 + 1.5 * p1 - 1.5 * p2 + 0.5 * p3;
    let b = p0 - 2.5 * p1 + 2.0 * p2 - 0.5 * p3;
    let c = -0.5 * p0 + 0.5 * p2;
    let d = p1;

    a * t3 + b * t2 + c * t + d
}

/// Valid source values whose pixel centres fall inside the footprint.
fn covered_values(view: &WindowView, fp: &PixelFootprint) -> Vec<f32> {
    if ![fp.min_u, fp.min_v, fp.max_u, fp.max_v].iter().all(|c| c.is_finite()) {
        return Vec::new();
    }
    // Centre c + 0.5 lies in [min, max) for c in ceil(min - 0.5) .. ceil(max - 0.5).
    let c0 = (fp.min_u - 0.5).ceil().max(0.0) as i64;
    let c1 = ((fp.max_u - 0.5).ceil() as i64).min(view.width as i64);
    let r0 = (fp.min_v - 0.5).ceil().max(0.0) as i64;
    let r1 = ((fp.max_v - 0.5).ceil() as i64).min(view.height as i64);

    let mut values = Vec::new();
    for row in r0..r1 {
        for col in c0..c1 {
            let value = view.at(row, col);
            if !value.is_nan() {
                values.push(value);
            }
        }
    }
    values
}

/// Most frequent valid value under the footprint; ties go to the smallest.
pub fn mode(view: &WindowView, fp: &PixelFootprint) -> Option<f32> {
    let mut values = covered_values(view, fp);
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));

    let mut best = values[0];
    let mut best_count = 0usize;
    let mut i = 0;
    while i < values.len() {
        let mut j = i;
        while j < values.len() && values[j] == values[i] {
            j += 1;
        }
        if j - i > best_count {
            best = values[i];
            best_count = j - i;
        }
        i = j;
    }
    Some(best)
}

/// Mean of the valid values under the footprint.
pub fn average(view: &WindowView, fp: &PixelFootprint) -> Option<f32> {
    let values = covered_values(view, fp);
    if values.is_empty() {
        return None;
    }
    let sum: f64 = values.iter().map(|v| *v as f64).sum();
    Some((sum / values.len() as f64) as f32)
}
