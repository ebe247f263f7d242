//! Voxel grid downsampling.
//!
//! Points are hashed into cubic cells of side `voxel_size` using
//! `floor(p / voxel_size)` per axis. Each occupied cell produces one point at
//! the mean of its members; colors, normals and confidences are averaged the
//! same way (normals re-normalized). The output is ordered by cell key, so
//! the same input set always produces the same output regardless of input
//! order.

use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};
use tracing::debug;

use scan_types::{PointCloud, up};

/// Upper bound on voxel doublings in [`downsample_to_budget`].
const MAX_DOUBLINGS: u32 = 64;

/// Integer voxel coordinate.
pub type VoxelKey = (i64, i64, i64);

/// Voxel containing `p` for cells of side `voxel_size`.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn voxel_key(p: &Point3<f64>, voxel_size: f64) -> VoxelKey {
    (
        (p.x / voxel_size).floor() as i64,
        (p.y / voxel_size).floor() as i64,
        (p.z / voxel_size).floor() as i64,
    )
}

#[derive(Debug, Clone, Copy)]
struct Accumulator {
    position: Vector3<f64>,
    color: [f64; 4],
    normal: Vector3<f64>,
    confidence: f64,
    count: usize,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            color: [0.0; 4],
            normal: Vector3::zeros(),
            confidence: 0.0,
            count: 0,
        }
    }
}

/// Replaces every occupied voxel's points with their mean.
///
/// Non-finite points are dropped. A non-positive `voxel_size` returns the
/// cloud unchanged.
///
/// # Example
///
/// ```
/// use nalgebra::Point3;
/// use scan_cloud::voxel_downsample;
/// use scan_types::{PointCloud, PointSource};
///
/// let cloud = PointCloud::from_points(
///     vec![
///         Point3::new(0.0, 0.0, 0.0),
///         Point3::new(0.005, 0.0, 0.0),
///         Point3::new(0.0, 0.0, 0.005),
///     ],
///     PointSource::Lidar,
/// );
/// let down = voxel_downsample(&cloud, 0.01);
/// assert_eq!(down.len(), 1);
/// assert!((down.points[0].x - 0.005 / 3.0).abs() < 1e-12);
/// ```
#[must_use]
pub fn voxel_downsample(cloud: &PointCloud, voxel_size: f64) -> PointCloud {
    if cloud.is_empty() || !(voxel_size.is_finite() && voxel_size > 0.0) {
        return cloud.clone();
    }

    let colors = cloud.colors.as_deref().filter(|c| c.len() == cloud.len());
    let normals = cloud.normals.as_deref().filter(|n| n.len() == cloud.len());
    let confidences = cloud.confidences.as_deref().filter(|c| c.len() == cloud.len());

    let mut cells: HashMap<VoxelKey, Accumulator> = HashMap::new();
    for (i, p) in cloud.points.iter().enumerate() {
        if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
            continue;
        }
        let acc = cells.entry(voxel_key(p, voxel_size)).or_default();
        acc.position += p.coords;
        acc.count += 1;
        if let Some(colors) = colors {
            for (sum, &c) in acc.color.iter_mut().zip(&colors[i]) {
                *sum += f64::from(c);
            }
        }
        if let Some(normals) = normals {
            acc.normal += normals[i];
        }
        if let Some(confidences) = confidences {
            acc.confidence += f64::from(confidences[i]);
        }
    }

    let mut ordered: Vec<(VoxelKey, Accumulator)> = cells.into_iter().collect();
    ordered.sort_unstable_by_key(|(key, _)| *key);

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let mean = |sum: f64, count: usize| (sum / count as f64) as f32;

    #[allow(clippy::cast_precision_loss)]
    let points = ordered
        .iter()
        .map(|(_, acc)| Point3::from(acc.position / acc.count as f64))
        .collect();

    let out_colors = colors.map(|_| {
        ordered
            .iter()
            .map(|(_, acc)| acc.color.map(|sum| mean(sum, acc.count)))
            .collect()
    });
    let out_normals = normals.map(|_| {
        ordered
            .iter()
            .map(|(_, acc)| acc.normal.try_normalize(f64::EPSILON).unwrap_or_else(up))
            .collect()
    });
    let out_confidences = confidences.map(|_| {
        ordered
            .iter()
            .map(|(_, acc)| mean(acc.confidence, acc.count))
            .collect()
    });

    PointCloud {
        points,
        confidences: out_confidences,
        colors: out_colors,
        normals: out_normals,
        timestamp: cloud.timestamp,
        source: cloud.source,
    }
}

/// Downsamples until the cloud fits `max_points`.
///
/// Clouds already within budget are returned unchanged. Otherwise the cloud
/// is voxelized at `voxel_size`, and the voxel size doubles (always from the
/// original points) until the result fits. If the budget is smaller than the number of cells the points can
/// never merge below, the sorted result is truncated.
#[must_use]
pub fn downsample_to_budget(cloud: &PointCloud, voxel_size: f64, max_points: usize) -> PointCloud {
    if cloud.len() <= max_points {
        return cloud.clone();
    }

    let mut size = voxel_size;
    let mut reduced = voxel_downsample(cloud, size);
    let mut doublings = 0;
    while reduced.len() > max_points && doublings < MAX_DOUBLINGS {
        size *= 2.0;
        doublings += 1;
        reduced = voxel_downsample(cloud, size);
    }

    if reduced.len() > max_points {
        truncate(&mut reduced, max_points);
    }

    debug!(
        input = cloud.len(),
        output = reduced.len(),
        voxel_size = size,
        "voxel downsampled point cloud"
    );
    reduced
}

fn truncate(cloud: &mut PointCloud, len: usize) {
    cloud.points.truncate(len);
    if let Some(c) = &mut cloud.confidences {
        c.truncate(len);
    }
    if let Some(c) = &mut cloud.colors {
        c.truncate(len);
    }
    if let Some(n) = &mut cloud.normals {
        n.truncate(len);
    }
}
