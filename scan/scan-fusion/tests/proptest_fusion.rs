//! Property-based tests for depth fusion.
//!
//! Run with: cargo test -p scan-fusion -- proptest

use proptest::prelude::*;
use scan_fusion::{DepthFusionEngine, FusionParams, normalize_secondary};

/// Depth arrays whose pixels are all valid for the default parameters.
fn arb_depths(len: usize) -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(0.2f32..4.5, len)
}

proptest! {
    /// Without confidence and with every pixel valid, fusion is exactly the
    /// fixed weighted sum of the primary and the normalized secondary.
    #[test]
    fn fixed_weighted_sum(
        (primary, secondary) in (1usize..64).prop_flat_map(|n| (arb_depths(n), arb_depths(n)))
    ) {
        let params = FusionParams::default();
        let engine = DepthFusionEngine::new(params.clone());
        let normalized = normalize_secondary(&primary, &secondary, params.min_depth, params.max_depth);
        let fused = engine.fuse(&primary, &secondary, None);

        prop_assert_eq!(fused.len(), primary.len());
        for i in 0..primary.len() {
            let expected = primary[i] * 0.7 + normalized[i] * 0.3;
            prop_assert!((fused[i] - expected).abs() < 1e-5, "pixel {}: {} vs {}", i, fused[i], expected);
        }
    }

    /// A secondary of the wrong length leaves the primary untouched.
    #[test]
    fn mismatched_length_passthrough(primary in arb_depths(16), extra in 1usize..8) {
        let secondary = vec![1.0; 16 + extra];
        let engine = DepthFusionEngine::new(FusionParams::default());
        prop_assert_eq!(engine.fuse(&primary, &secondary, None), primary);
    }

    /// Normalized secondary values stay inside the primary's valid range.
    #[test]
    fn normalized_within_primary_range(
        (primary, secondary) in (2usize..64).prop_flat_map(|n| (arb_depths(n), prop::collection::vec(0.01f32..100.0, n)))
    ) {
        let lo = primary.iter().copied().fold(f32::INFINITY, f32::min);
        let hi = primary.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        for d in normalize_secondary(&primary, &secondary, 0.1, 5.0) {
            prop_assert!(d >= lo - 1e-4 && d <= hi + 1e-4);
        }
    }
}
