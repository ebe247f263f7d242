//! Secondary depth preparation: scale alignment and resampling.

use scan_types::is_valid_depth;

/// Relative ranges below this are treated as single-valued.
const DEGENERATE_RANGE: f32 = 1e-6;

/// Returns true if a secondary depth sample is usable.
#[inline]
#[must_use]
pub fn is_valid_secondary(depth: f32) -> bool {
    depth.is_finite() && depth > 0.0
}

fn valid_range(values: impl Iterator<Item = f32>) -> Option<(f32, f32)> {
    values.fold(None, |acc, d| match acc {
        None => Some((d, d)),
        Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
    })
}

/// Rescales `secondary` so its valid range matches the primary's.
///
/// The secondary estimate may be on an unrelated scale (relative depth from
/// a learned model). Its valid range `[smin, smax]` is mapped affinely onto
/// the primary's valid range `[pmin, pmax]`:
///
/// ```text
/// normalized = (s - smin) / (smax - smin) * (pmax - pmin) + pmin
/// ```
///
/// - Primary has no valid pixel: `secondary` is returned as-is
/// - Secondary has no valid pixel: `secondary` is returned as-is
/// - Secondary range is ~0: every pixel becomes `pmin`
/// - Invalid secondary pixels stay invalid (0)
///
/// # Example
///
/// ```
/// use scan_fusion::normalize_secondary;
///
/// let primary = [1.0, 2.0, 3.0];
/// let secondary = [10.0, 20.0, 30.0];
/// let out = normalize_secondary(&primary, &secondary, 0.1, 5.0);
/// assert_eq!(out, vec![1.0, 2.0, 3.0]);
/// ```
#[must_use]
pub fn normalize_secondary(primary: &[f32], secondary: &[f32], min_depth: f32, max_depth: f32) -> Vec<f32> {
    let Some((pmin, pmax)) = valid_range(
        primary
            .iter()
            .copied()
            .filter(|&d| is_valid_depth(d, min_depth, max_depth)),
    ) else {
        return secondary.to_vec();
    };
    let Some((smin, smax)) = valid_range(secondary.iter().copied().filter(|&d| is_valid_secondary(d))) else {
        return secondary.to_vec();
    };

    let srange = smax - smin;
    if srange <= DEGENERATE_RANGE * smax.abs().max(1.0) {
        return vec![pmin; secondary.len()];
    }

    let prange = pmax - pmin;
    secondary
        .iter()
        .map(|&s| {
            if is_valid_secondary(s) {
                (s - smin) / srange * prange + pmin
            } else {
                0.0
            }
        })
        .collect()
}

/// Bilinearly resamples a row-major depth image to a new resolution.
///
/// Pixel centers are aligned (`src = (dst + 0.5) * scale - 0.5`). Invalid
/// source samples are excluded and the remaining weights renormalized; a
/// target pixel with no valid contributor is 0.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn resample_bilinear(
    source: &[f32],
    source_width: u32,
    source_height: u32,
    target_width: u32,
    target_height: u32,
) -> Vec<f32> {
    let (sw, sh) = (source_width as usize, source_height as usize);
    let (tw, th) = (target_width as usize, target_height as usize);
    if sw == 0 || sh == 0 || source.len() != sw * sh {
        return vec![0.0; tw * th];
    }
    if sw == tw && sh == th {
        return source.to_vec();
    }

    let scale_x = sw as f32 / tw as f32;
    let scale_y = sh as f32 / th as f32;
    let axis = |dst: usize, scale: f32, len: usize| {
        let src = ((dst as f32 + 0.5) * scale - 0.5).clamp(0.0, (len - 1) as f32);
        let i0 = src.floor() as usize;
        let i1 = (i0 + 1).min(len - 1);
        (i0, i1, src - i0 as f32)
    };

    let mut out = Vec::with_capacity(tw * th);
    for y in 0..th {
        let (y0, y1, fy) = axis(y, scale_y, sh);
        for x in 0..tw {
            let (x0, x1, fx) = axis(x, scale_x, sw);
            let taps = [
                (x0, y0, (1.0 - fx) * (1.0 - fy)),
                (x1, y0, fx * (1.0 - fy)),
                (x0, y1, (1.0 - fx) * fy),
                (x1, y1, fx * fy),
            ];
            let (sum, weight) = taps.iter().fold((0.0_f32, 0.0_f32), |(sum, weight), &(sx, sy, w)| {
                let d = source[sy * sw + sx];
                if is_valid_secondary(d) && w > 0.0 {
                    (sum + d * w, weight + w)
                } else {
                    (sum, weight)
                }
            });
            out.push(if weight > 0.0 { sum / weight } else { 0.0 });
        }
    }
    out
}
