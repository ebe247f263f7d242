//! Coverage grid cells.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use scan_types::Timestamp;

/// Integer coordinate of a coverage cell.
///
/// A world point `p` lies in cell `floor(p / resolution)` per axis.
///
/// # Example
///
/// ```
/// use nalgebra::Point3;
/// use scan_coverage::CellCoord;
///
/// let c = CellCoord::from_point(&Point3::new(0.25, -0.05, 1.0), 0.1);
/// assert_eq!(c, CellCoord::new(2, -1, 10));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CellCoord {
    /// X index.
    pub x: i32,
    /// Y index.
    pub y: i32,
    /// Z index.
    pub z: i32,
}

impl CellCoord {
    /// Creates a new cell coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Cell containing `point` on a grid of the given resolution.
    ///
    /// Coordinates beyond the `i32` range saturate.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_point(point: &Point3<f64>, resolution: f64) -> Self {
        Self::new(
            (point.x / resolution).floor() as i32,
            (point.y / resolution).floor() as i32,
            (point.z / resolution).floor() as i32,
        )
    }

    /// World-space center of the cell.
    #[must_use]
    pub fn center(self, resolution: f64) -> Point3<f64> {
        Point3::new(
            (f64::from(self.x) + 0.5) * resolution,
            (f64::from(self.y) + 0.5) * resolution,
            (f64::from(self.z) + 0.5) * resolution,
        )
    }

    /// The 26 cells sharing a face, edge or corner with this one.
    #[must_use]
    pub fn neighbors(self) -> [Self; 26] {
        let mut out = [Self::default(); 26];
        let mut i = 0;
        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    if dx == 0 && dy == 0 && dz == 0 {
                        continue;
                    }
                    out[i] = Self::new(
                        self.x.saturating_add(dx),
                        self.y.saturating_add(dy),
                        self.z.saturating_add(dz),
                    );
                    i += 1;
                }
            }
        }
        out
    }
}

/// How well a cell has been observed.
///
/// Ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CoverageQuality {
    /// Never observed.
    #[default]
    None,
    /// One view.
    Poor,
    /// Two distinct views.
    Fair,
    /// Three or more distinct views.
    Good,
    /// Enough distinct views for a complete reconstruction.
    Excellent,
}

impl CoverageQuality {
    /// Quality for a number of distinct views.
    ///
    /// # Example
    ///
    /// ```
    /// use scan_coverage::CoverageQuality;
    ///
    /// assert_eq!(CoverageQuality::from_view_count(1, 5), CoverageQuality::Poor);
    /// assert_eq!(CoverageQuality::from_view_count(4, 5), CoverageQuality::Good);
    /// assert_eq!(CoverageQuality::from_view_count(5, 5), CoverageQuality::Excellent);
    /// ```
    #[must_use]
    pub const fn from_view_count(views: u32, min_views_for_excellent: u32) -> Self {
        match views {
            0 => Self::None,
            1 => Self::Poor,
            2 => Self::Fair,
            v if v >= min_views_for_excellent => Self::Excellent,
            _ => Self::Good,
        }
    }

    /// Ordinal from 0 (None) to 4 (Excellent).
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// Returns true for Fair or better.
    #[must_use]
    pub fn is_covered(self) -> bool {
        self >= Self::Fair
    }
}

/// View statistics of one grid cell.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CoverageCell {
    /// Grid coordinate.
    pub coord: CellCoord,
    /// World-space cell center.
    pub position: Point3<f64>,
    /// Number of distinct view directions recorded.
    pub view_count: u32,
    /// Recorded unit view directions (camera to point).
    pub view_directions: Vec<Vector3<f64>>,
    /// Quality derived from `view_count`.
    pub quality: CoverageQuality,
    /// When a view was last recorded.
    pub last_updated: Timestamp,
}

impl CoverageCell {
    /// Creates an unobserved cell.
    #[must_use]
    pub fn new(coord: CellCoord, resolution: f64, now: Timestamp) -> Self {
        Self {
            coord,
            position: coord.center(resolution),
            view_count: 0,
            view_directions: Vec::new(),
            quality: CoverageQuality::None,
            last_updated: now,
        }
    }

    /// Records a view direction if it differs from every recorded one by
    /// more than the threshold angle (`dot < cos_threshold`).
    ///
    /// Returns true if the view was new.
    pub fn observe(
        &mut self,
        direction: Vector3<f64>,
        cos_threshold: f64,
        min_views_for_excellent: u32,
        now: Timestamp,
    ) -> bool {
        if self
            .view_directions
            .iter()
            .any(|d| d.dot(&direction) >= cos_threshold)
        {
            return false;
        }
        self.view_directions.push(direction);
        self.view_count = self.view_count.saturating_add(1);
        self.quality = CoverageQuality::from_view_count(self.view_count, min_views_for_excellent);
        self.last_updated = now;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn floor_handles_negatives() {
        assert_eq!(
            CellCoord::from_point(&Point3::new(-0.01, 0.0, 0.099), 0.1),
            CellCoord::new(-1, 0, 0)
        );
    }

    #[test]
    fn center_inside_cell() {
        let c = CellCoord::new(-1, 0, 3);
        let p = c.center(0.1);
        assert_relative_eq!(p, Point3::new(-0.05, 0.05, 0.35), epsilon = 1e-12);
        assert_eq!(CellCoord::from_point(&p, 0.1), c);
    }

    #[test]
    fn twenty_six_distinct_neighbors() {
        let c = CellCoord::new(4, -2, 0);
        let mut n = c.neighbors().to_vec();
        n.sort();
        n.dedup();
        assert_eq!(n.len(), 26);
        assert!(!n.contains(&c));
        assert!(n.contains(&CellCoord::new(5, -1, 1)));
    }

    #[test]
    fn quality_thresholds() {
        let q: Vec<_> = (0..7).map(|v| CoverageQuality::from_view_count(v, 5)).collect();
        assert_eq!(
            q,
            vec![
                CoverageQuality::None,
                CoverageQuality::Poor,
                CoverageQuality::Fair,
                CoverageQuality::Good,
                CoverageQuality::Good,
                CoverageQuality::Excellent,
                CoverageQuality::Excellent,
            ]
        );
        assert_eq!(CoverageQuality::Excellent.ordinal(), 4);
        assert!(CoverageQuality::Fair.is_covered());
        assert!(!CoverageQuality::Poor.is_covered());
    }

    #[test]
    fn similar_views_counted_once() {
        let cos = 30.0_f64.to_radians().cos();
        let mut cell = CoverageCell::new(CellCoord::default(), 0.1, Timestamp::zero());
        assert!(cell.observe(Vector3::z(), cos, 5, Timestamp::from_millis(1)));
        // 20° away: same view.
        let near = Vector3::new(20.0_f64.to_radians().sin(), 0.0, 20.0_f64.to_radians().cos());
        assert!(!cell.observe(near, cos, 5, Timestamp::from_millis(2)));
        // 45° away: new view.
        let far = Vector3::new(1.0, 0.0, 1.0).normalize();
        assert!(cell.observe(far, cos, 5, Timestamp::from_millis(3)));
        assert_eq!(cell.view_count, 2);
        assert_eq!(cell.quality, CoverageQuality::Fair);
        assert_eq!(cell.last_updated, Timestamp::from_millis(3));
    }
}
