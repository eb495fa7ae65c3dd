//! Unit tests for the region-graph belief propagation.

use rstest::rstest;

use crate::{
    BpConfig, MixtureConfig, MixtureFit, fit_planar_mixture, run_belief_propagation,
    segment_graph, test_utils::height_field_graph,
};

fn step_fit() -> (crate::DemGraph, MixtureFit) {
    let graph = height_field_graph(8, 4, |ix, _| if ix < 4 { 0.0 } else { 1.0 });
    let segmentation = segment_graph(&graph, 10.0, None);
    let fit = fit_planar_mixture(&graph, &segmentation, &MixtureConfig::new(200, 1e-6, false))
        .expect("normal equations are well conditioned");
    (graph, fit)
}

#[rstest]
#[case::linear(false)]
#[case::log(true)]
fn labels_follow_the_regions_of_a_step(#[case] log_domain: bool) {
    let (graph, fit) = step_fit();
    let outcome = run_belief_propagation(
        &graph,
        &fit,
        &BpConfig::new(200, 1e-6, log_domain, 1.0),
    );

    assert!(outcome.converged());
    assert_eq!(outcome.labels().len(), graph.vertex_count());
    for (vertex, label) in outcome.labels().iter().enumerate() {
        assert_eq!(*label, Some(fit.assignments()[vertex]));
    }
}

#[test]
fn linear_and_log_domains_agree() {
    let (graph, fit) = step_fit();
    let linear = run_belief_propagation(&graph, &fit, &BpConfig::new(200, 1e-6, false, 1.0));
    let log = run_belief_propagation(&graph, &fit, &BpConfig::new(200, 1e-6, true, 1.0));
    assert_eq!(linear.labels(), log.labels());
}

#[test]
fn single_region_converges_immediately() {
    let graph = height_field_graph(4, 4, |_, _| 0.25);
    let segmentation = segment_graph(&graph, 1e7, None);
    let fit = fit_planar_mixture(&graph, &segmentation, &MixtureConfig::new(200, 1e-6, false))
        .expect("normal equations are well conditioned");
    assert_eq!(fit.components().len(), 1);

    let outcome = run_belief_propagation(&graph, &fit, &BpConfig::new(200, 1e-6, false, 1.0));
    assert!(outcome.converged());
    assert_eq!(outcome.iterations(), 1);
    assert!(outcome.labels().iter().all(|&label| label == Some(0)));
}

#[test]
fn zero_smoothness_reduces_to_the_unary_argmax() {
    let (graph, fit) = step_fit();
    let outcome = run_belief_propagation(&graph, &fit, &BpConfig::new(200, 1e-6, false, 0.0));
    for (vertex, label) in outcome.labels().iter().enumerate() {
        assert_eq!(*label, Some(fit.assignments()[vertex]));
    }
}

#[test]
fn propagation_is_deterministic() {
    let (graph, fit) = step_fit();
    let config = BpConfig::new(200, 1e-6, true, 1.0);
    let first = run_belief_propagation(&graph, &fit, &config);
    let second = run_belief_propagation(&graph, &fit, &config);
    assert_eq!(first, second);
}
