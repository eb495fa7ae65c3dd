//! Unit tests for the graph segmenter.

use std::num::NonZeroUsize;

use rstest::rstest;

use crate::{segment_graph, test_utils::height_field_graph};

fn step_field(ix: usize, _iy: usize) -> f64 {
    if ix < 4 { 0.0 } else { 1.0 }
}

#[test]
fn segmentation_partitions_the_vertex_set() {
    let graph = height_field_graph(8, 4, step_field);
    let segmentation = segment_graph(&graph, 10.0, None);

    let mut seen = vec![false; graph.vertex_count()];
    for component in segmentation.components() {
        for &member in component.members() {
            assert!(!seen[member], "vertex {member} appears twice");
            seen[member] = true;
            assert_eq!(
                segmentation.component_of(member),
                segmentation
                    .components()
                    .iter()
                    .position(|c| c.members().contains(&member))
                    .expect("member belongs to a component")
            );
        }
    }
    assert!(seen.iter().all(|&v| v), "every vertex must be covered");
}

#[test]
fn step_splits_into_two_components_for_moderate_k() {
    let graph = height_field_graph(8, 4, step_field);
    // Within each half every weight is zero; the step weight is
    // 1.0 / sqrt(2e-4) ~ 70.7, far above tau(16) = 10 / 16.
    let segmentation = segment_graph(&graph, 10.0, None);
    assert_eq!(segmentation.component_count(), 2);
    for component in segmentation.components() {
        assert_eq!(component.len(), 16);
        assert_eq!(component.internal_difference(), 0.0);
    }
}

#[rstest]
#[case(1e7, 1)]
#[case(1e-3, 32)]
fn k_controls_merge_aggressiveness(#[case] k: f64, #[case] expected_components: usize) {
    // Distinct heights per cell so every edge weight is positive.
    let graph = height_field_graph(8, 4, |ix, iy| (iy * 8 + ix) as f64 * 1e-3);
    let segmentation = segment_graph(&graph, k, None);
    assert_eq!(segmentation.component_count(), expected_components);
}

#[test]
fn segmentation_is_deterministic() {
    let graph = height_field_graph(8, 4, |ix, iy| ((ix * 7 + iy * 13) % 5) as f64 * 1e-3);
    let first = segment_graph(&graph, 0.5, None);
    let second = segment_graph(&graph, 0.5, None);
    assert_eq!(first, second);
}

#[test]
fn singleton_components_report_zero_internal_difference() {
    let graph = height_field_graph(1, 1, |_, _| 0.3);
    let segmentation = segment_graph(&graph, 300.0, None);
    assert_eq!(segmentation.component_count(), 1);
    assert_eq!(segmentation.components()[0].len(), 1);
    assert_eq!(segmentation.components()[0].internal_difference(), 0.0);
}

#[test]
fn min_size_post_pass_absorbs_small_components() {
    // A lone outlier cell in the middle of a flat field survives the main
    // pass as a singleton, then the post-pass folds it into its cheapest
    // neighbour.
    let graph = height_field_graph(5, 5, |ix, iy| if (ix, iy) == (2, 2) { 5.0 } else { 0.0 });
    let without = segment_graph(&graph, 10.0, None);
    assert_eq!(without.component_count(), 2);

    let with = segment_graph(&graph, 10.0, NonZeroUsize::new(2));
    assert_eq!(with.component_count(), 1);
}
