//! Gap detection over the coverage grid.
//!
//! A gap is a 26-connected cluster of cells that need more views: cells
//! never observed that border a covered (Fair or better) cell, together with
//! observed cells below Good quality.

use std::collections::VecDeque;

use hashbrown::{HashMap, HashSet};
use nalgebra::{Point3, Vector3};
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use scan_types::up;

use crate::cell::{CellCoord, CoverageCell, CoverageQuality};
use crate::params::CoverageParams;

/// A connected cluster of under-covered cells with a suggested viewpoint.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Gap {
    /// Mean of the member cell centers.
    pub center: Point3<f64>,
    /// Number of member cells.
    pub cell_count: usize,
    /// `cell_count` times the cell face area, in square meters.
    pub estimated_area_m2: f64,
    /// Unit direction to look along, from the suggested camera position
    /// toward the gap.
    pub suggested_view_direction: Vector3<f64>,
    /// Where the camera should move to observe the gap.
    pub suggested_camera_position: Point3<f64>,
    /// `cell_count * max(0, range - distance to camera)`.
    pub priority: f64,
}

/// Finds gaps in `cells` as seen from `camera`.
///
/// Missing cells are only considered inside the bounding box of the
/// existing cells. Clusters smaller than `min_gap_size_cells` are dropped;
/// the rest are sorted by priority (descending) and truncated to
/// `max_gaps`.
///
/// # Example
///
/// ```
/// use hashbrown::HashMap;
/// use nalgebra::Point3;
/// use scan_coverage::{CellCoord, CoverageCell, CoverageParams, detect_gaps};
/// use scan_types::Timestamp;
///
/// let params = CoverageParams::default();
/// let mut cells = HashMap::new();
/// for x in 0..3 {
///     let coord = CellCoord::new(x, 0, 0);
///     cells.insert(coord, CoverageCell::new(coord, params.grid_resolution, Timestamp::zero()));
/// }
/// // Three unobserved cells in a row form one gap.
/// let gaps = detect_gaps(&cells, &Point3::origin(), &params);
/// assert_eq!(gaps.len(), 1);
/// assert_eq!(gaps[0].cell_count, 3);
/// ```
#[must_use]
pub fn detect_gaps(
    cells: &HashMap<CellCoord, CoverageCell>,
    camera: &Point3<f64>,
    params: &CoverageParams,
) -> Vec<Gap> {
    if cells.is_empty() {
        return Vec::new();
    }

    let (lo, hi) = bounding_box(cells.keys());
    let inside = |c: &CellCoord| {
        (lo.x..=hi.x).contains(&c.x) && (lo.y..=hi.y).contains(&c.y) && (lo.z..=hi.z).contains(&c.z)
    };

    let mut candidates: HashSet<CellCoord> = HashSet::new();
    for (coord, cell) in cells {
        if cell.quality < CoverageQuality::Good {
            candidates.insert(*coord);
        }
        if cell.quality.is_covered() {
            for n in coord.neighbors() {
                if inside(&n) && !cells.contains_key(&n) {
                    candidates.insert(n);
                }
            }
        }
    }

    let mut starts: Vec<CellCoord> = candidates.iter().copied().collect();
    starts.sort_unstable();

    let mut visited: HashSet<CellCoord> = HashSet::with_capacity(candidates.len());
    let mut gaps = Vec::new();
    for start in starts {
        if !visited.insert(start) {
            continue;
        }
        let mut cluster = Vec::new();
        let mut queue = VecDeque::from([start]);
        while let Some(c) = queue.pop_front() {
            cluster.push(c);
            for n in c.neighbors() {
                if candidates.contains(&n) && visited.insert(n) {
                    queue.push_back(n);
                }
            }
        }
        if cluster.len() >= params.min_gap_size_cells {
            gaps.push(make_gap(&cluster, camera, params));
        }
    }

    let clusters = gaps.len();
    gaps.sort_by(|a, b| {
        b.priority
            .total_cmp(&a.priority)
            .then(b.cell_count.cmp(&a.cell_count))
    });
    gaps.truncate(params.max_gaps);

    debug!(
        candidates = candidates.len(),
        clusters,
        reported = gaps.len(),
        "gap detection"
    );

    gaps
}

fn bounding_box<'a>(coords: impl Iterator<Item = &'a CellCoord>) -> (CellCoord, CellCoord) {
    let mut lo = CellCoord::new(i32::MAX, i32::MAX, i32::MAX);
    let mut hi = CellCoord::new(i32::MIN, i32::MIN, i32::MIN);
    for c in coords {
        lo = CellCoord::new(lo.x.min(c.x), lo.y.min(c.y), lo.z.min(c.z));
        hi = CellCoord::new(hi.x.max(c.x), hi.y.max(c.y), hi.z.max(c.z));
    }
    (lo, hi)
}

#[allow(clippy::cast_precision_loss)]
fn make_gap(cluster: &[CellCoord], camera: &Point3<f64>, params: &CoverageParams) -> Gap {
    let count = cluster.len();
    let sum = cluster
        .iter()
        .fold(Vector3::zeros(), |acc, c| acc + c.center(params.grid_resolution).coords);
    let center = Point3::from(sum / count as f64);

    let distance = (center - camera).norm();
    let toward_camera = (camera - center).try_normalize(f64::EPSILON).unwrap_or_else(up);

    Gap {
        center,
        cell_count: count,
        estimated_area_m2: count as f64 * params.cell_area(),
        suggested_view_direction: -toward_camera,
        suggested_camera_position: center + toward_camera * params.suggested_camera_distance,
        priority: count as f64 * (params.gap_priority_range - distance).max(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use scan_types::Timestamp;

    fn cell(coord: CellCoord, views: u32) -> CoverageCell {
        let mut c = CoverageCell::new(coord, 0.1, Timestamp::zero());
        c.view_count = views;
        c.quality = CoverageQuality::from_view_count(views, 5);
        c
    }

    /// A 5×5 sheet of cells in the y = 0 layer with the given cells left out.
    fn sheet(views: u32, missing: &[(i32, i32)]) -> HashMap<CellCoord, CoverageCell> {
        let mut cells = HashMap::new();
        for x in 0..5 {
            for z in 0..5 {
                if missing.contains(&(x, z)) {
                    continue;
                }
                let coord = CellCoord::new(x, 0, z);
                cells.insert(coord, cell(coord, views));
            }
        }
        cells
    }

    #[test]
    fn empty_grid_has_no_gaps() {
        assert!(detect_gaps(&HashMap::new(), &Point3::origin(), &CoverageParams::default()).is_empty());
    }

    #[test]
    fn well_covered_sheet_has_no_gaps() {
        let gaps = detect_gaps(&sheet(3, &[]), &Point3::origin(), &CoverageParams::default());
        assert!(gaps.is_empty());
    }

    #[test]
    fn hole_in_sheet_is_a_gap() {
        let cells = sheet(3, &[(1, 1), (1, 2), (2, 1), (2, 2)]);
        let camera = Point3::new(0.2, 1.0, 0.2);
        let gaps = detect_gaps(&cells, &camera, &CoverageParams::default());

        assert_eq!(gaps.len(), 1);
        let gap = &gaps[0];
        assert_eq!(gap.cell_count, 4);
        assert_relative_eq!(gap.center, Point3::new(0.2, 0.05, 0.2), epsilon = 1e-12);
        assert_relative_eq!(gap.estimated_area_m2, 0.04, epsilon = 1e-12);
        assert_relative_eq!(gap.suggested_view_direction, -Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(
            gap.suggested_camera_position,
            Point3::new(0.2, 1.55, 0.2),
            epsilon = 1e-12
        );
        assert_relative_eq!(gap.priority, 4.0 * (5.0 - 0.95), epsilon = 1e-9);
    }

    #[test]
    fn small_clusters_dropped() {
        let cells = sheet(3, &[(2, 2)]);
        assert!(detect_gaps(&cells, &Point3::origin(), &CoverageParams::default()).is_empty());

        let params = CoverageParams::default().with_min_gap_size_cells(1);
        assert_eq!(detect_gaps(&cells, &Point3::origin(), &params).len(), 1);
    }

    #[test]
    fn poor_cells_join_missing_neighbors() {
        let mut cells = sheet(3, &[(0, 0)]);
        cells.insert(CellCoord::new(1, 0, 0), cell(CellCoord::new(1, 0, 0), 1));
        cells.insert(CellCoord::new(0, 0, 1), cell(CellCoord::new(0, 0, 1), 1));
        let gaps = detect_gaps(&cells, &Point3::origin(), &CoverageParams::default());
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].cell_count, 3);
    }

    #[test]
    fn sorted_by_priority_and_truncated() {
        // Two separate holes; the larger one is reported first.
        let cells = sheet(3, &[(0, 0), (0, 1), (0, 2), (0, 3), (4, 2), (4, 3), (4, 4)]);
        let camera = Point3::new(0.25, 0.5, 0.25);
        let gaps = detect_gaps(&cells, &camera, &CoverageParams::default());
        assert_eq!(gaps.len(), 2);
        assert_eq!(gaps[0].cell_count, 4);
        assert_eq!(gaps[1].cell_count, 3);
        assert!(gaps[0].priority >= gaps[1].priority);

        let one = detect_gaps(&cells, &camera, &CoverageParams::default().with_max_gaps(1));
        assert_eq!(one.len(), 1);
        assert_eq!(one[0], gaps[0]);
    }

    #[test]
    fn distant_gap_has_zero_priority() {
        let cells = sheet(1, &[]);
        let gaps = detect_gaps(&cells, &Point3::new(100.0, 0.0, 0.0), &CoverageParams::default());
        assert_eq!(gaps.len(), 1);
        assert_relative_eq!(gaps[0].priority, 0.0);
    }
}
