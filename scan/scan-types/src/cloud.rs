//! Unordered point sets.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::Timestamp;
use crate::error::{ScanError, ScanResult};

/// Where a point cloud came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PointSource {
    /// Back-projected from a depth frame or a fused depth array.
    #[default]
    Lidar,
    /// Vertices of reconstructed surface patches.
    SceneMesh,
    /// Combination of several sources.
    Merged,
}

/// An unordered set of 3D points with optional per-point attributes.
///
/// # Invariants
///
/// Every present attribute array has exactly `points.len()` entries.
///
/// # Example
///
/// ```
/// use nalgebra::Point3;
/// use scan_types::{PointCloud, PointSource};
///
/// let cloud = PointCloud::from_points(
///     vec![Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 2.0, 2.0)],
///     PointSource::SceneMesh,
/// );
/// assert_eq!(cloud.centroid(), Some(Point3::new(1.0, 1.0, 1.0)));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointCloud {
    /// Point positions in world space.
    pub points: Vec<Point3<f64>>,
    /// Optional per-point confidence in `[0, 1]`.
    pub confidences: Option<Vec<f32>>,
    /// Optional per-point RGBA color.
    pub colors: Option<Vec<[f32; 4]>>,
    /// Optional per-point unit normals.
    pub normals: Option<Vec<Vector3<f64>>>,
    /// Capture time of the source data.
    pub timestamp: Timestamp,
    /// Provenance tag.
    pub source: PointSource,
}

impl PointCloud {
    /// Creates an empty cloud with the given provenance.
    #[must_use]
    pub fn empty(source: PointSource) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }

    /// Creates a cloud from positions only.
    #[must_use]
    pub fn from_points(points: Vec<Point3<f64>>, source: PointSource) -> Self {
        Self {
            points,
            source,
            ..Self::default()
        }
    }

    /// Sets the capture timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true if the cloud has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Checks that every attribute array is parallel to `points`.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::BufferSizeMismatch`] for the first attribute
    /// array whose length differs from the point count.
    pub fn validate(&self) -> ScanResult<()> {
        let n = self.points.len();
        let lengths = [
            self.confidences.as_ref().map(Vec::len),
            self.colors.as_ref().map(Vec::len),
            self.normals.as_ref().map(Vec::len),
        ];
        match lengths.into_iter().flatten().find(|&len| len != n) {
            Some(len) => Err(ScanError::buffer_mismatch(n, len)),
            None => Ok(()),
        }
    }

    /// Axis-aligned bounds as `(min, max)`, or `None` for an empty cloud.
    #[must_use]
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = *self.points.first()?;
        Some(self.points.iter().fold((first, first), |(lo, hi), p| {
            (lo.inf(p), hi.sup(p))
        }))
    }

    /// Mean of all points, or `None` for an empty cloud.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.points.is_empty() {
            return None;
        }
        let sum = self
            .points
            .iter()
            .fold(Vector3::zeros(), |acc, p| acc + p.coords);
        Some(Point3::from(sum / self.points.len() as f64))
    }

    /// Appends another cloud.
    ///
    /// An attribute survives only if both clouds carry it (or `self` is
    /// empty). The provenance becomes [`PointSource::Merged`] when the
    /// sources differ; the later timestamp wins.
    pub fn append(&mut self, other: Self) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = other;
            return;
        }

        self.confidences = join(self.confidences.take(), other.confidences);
        self.colors = join(self.colors.take(), other.colors);
        self.normals = join(self.normals.take(), other.normals);
        self.points.extend(other.points);
        if self.source != other.source {
            self.source = PointSource::Merged;
        }
        self.timestamp = self.timestamp.max(other.timestamp);
    }
}

fn join<T>(a: Option<Vec<T>>, b: Option<Vec<T>>) -> Option<Vec<T>> {
    match (a, b) {
        (Some(mut a), Some(b)) => {
            a.extend(b);
            Some(a)
        }
        _ => None,
    }
}
