//! Property-based tests for mesh correction.
//!
//! Run with: cargo test -p scan-repair -- proptest

use nalgebra::Point3;
use proptest::prelude::*;
use scan_repair::{
    MeshAdjacency, detect_boundary_loops, fill_small_holes, laplacian_smooth, remove_degenerate_faces,
    smooth_normals,
};
use scan_types::{PatchId, SurfacePatch};

// =============================================================================
// Strategies
// =============================================================================

/// Faces over a small vertex set, including repeated and out-of-range indices.
fn arb_soup() -> impl Strategy<Value = SurfacePatch> {
    (3usize..12).prop_flat_map(|n| {
        let vertices = prop::collection::vec(
            prop::array::uniform3(-1.0..1.0f64).prop_map(|[x, y, z]| Point3::new(x, y, z)),
            n,
        );
        #[allow(clippy::cast_possible_truncation)]
        let bound = n as u32 + 2;
        let faces = prop::collection::vec(prop::array::uniform3(0..bound), 0..20);
        (vertices, faces).prop_map(|(v, f)| SurfacePatch::new(PatchId(1), v, f))
    })
}

/// A height-field grid with some faces knocked out.
fn arb_holey_grid() -> impl Strategy<Value = SurfacePatch> {
    (2u32..6, 2u32..6).prop_flat_map(|(nx, ny)| {
        let vertex_count = ((nx + 1) * (ny + 1)) as usize;
        let face_count = (nx * ny * 2) as usize;
        (
            prop::collection::vec(-0.2..0.2f64, vertex_count),
            prop::collection::vec(prop::bool::weighted(0.8), face_count),
        )
            .prop_map(move |(heights, keep)| {
                let mut vertices = Vec::with_capacity(heights.len());
                for y in 0..=ny {
                    for x in 0..=nx {
                        let h = heights[(y * (nx + 1) + x) as usize];
                        vertices.push(Point3::new(f64::from(x), f64::from(y), h));
                    }
                }
                let mut faces = Vec::new();
                for y in 0..ny {
                    for x in 0..nx {
                        let i = y * (nx + 1) + x;
                        faces.push([i, i + 1, i + nx + 2]);
                        faces.push([i, i + nx + 2, i + nx + 1]);
                    }
                }
                let faces = faces
                    .into_iter()
                    .zip(keep)
                    .filter_map(|(f, k)| k.then_some(f))
                    .collect();
                SurfacePatch::new(PatchId(2), vertices, faces)
            })
    })
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    /// Removing degenerate faces twice removes nothing the second time.
    #[test]
    fn degenerate_removal_idempotent(patch in arb_soup(), threshold in 0.0..0.1f64) {
        let (once, _) = remove_degenerate_faces(&patch, threshold);
        let (twice, removed) = remove_degenerate_faces(&once, threshold);
        prop_assert_eq!(removed, 0);
        prop_assert_eq!(once, twice);
    }

    /// Every surviving face is valid for the patch.
    #[test]
    fn degenerate_removal_leaves_valid_faces(patch in arb_soup()) {
        let (cleaned, removed) = remove_degenerate_faces(&patch, 1e-10);
        prop_assert!(cleaned.validate().is_ok());
        prop_assert_eq!(cleaned.face_count() + removed, patch.face_count());
    }

    /// A zero blend factor leaves every vertex exactly where it was.
    #[test]
    fn zero_lambda_is_noop(patch in arb_holey_grid(), iterations in 0u32..5) {
        let smoothed = laplacian_smooth(&patch, iterations, 0.0);
        prop_assert_eq!(smoothed.vertices, patch.vertices);
    }

    /// Boundary vertices never move.
    #[test]
    fn boundary_fixed(patch in arb_holey_grid(), lambda in 0.0..=1.0f64) {
        let adjacency = MeshAdjacency::build(&patch.faces, patch.vertex_count());
        let smoothed = laplacian_smooth(&patch, 3, lambda);
        for (v, (before, after)) in patch.vertices.iter().zip(&smoothed.vertices).enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let index = v as u32;
            if adjacency.is_boundary_vertex(index) || adjacency.neighbors(index).is_empty() {
                prop_assert_eq!(before, after);
            }
        }
    }

    /// Smoothed normals are unit length.
    #[test]
    fn smoothed_normals_are_unit(patch in arb_holey_grid(), iterations in 0u32..4) {
        let smoothed = smooth_normals(&patch, iterations);
        prop_assert_eq!(smoothed.normals.len(), patch.vertex_count());
        for n in &smoothed.normals {
            prop_assert!((n.norm() - 1.0).abs() < 1e-9);
        }
    }

    /// Only loops within `[3, max_hole_edges]` are filled; everything else
    /// keeps its faces.
    #[test]
    fn hole_filling_respects_bound(patch in arb_holey_grid(), max_hole_edges in 0usize..12) {
        let loops = detect_boundary_loops(&patch.faces, patch.vertex_count());
        let fillable: Vec<usize> = loops
            .iter()
            .filter(|l| l.closed && (3..=max_hole_edges).contains(&l.edge_count()))
            .map(|l| l.edge_count())
            .collect();

        let (filled, report) = fill_small_holes(&patch, max_hole_edges);
        prop_assert_eq!(report.filled, fillable.len());
        prop_assert_eq!(report.faces_added, fillable.iter().sum::<usize>());
        prop_assert_eq!(filled.vertex_count(), patch.vertex_count() + fillable.len());
        prop_assert_eq!(&filled.faces[..patch.face_count()], &patch.faces[..]);
        prop_assert_eq!(report.filled + report.skipped_large + report.skipped_open, loops.len());
    }
}
