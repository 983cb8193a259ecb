//! Integration tests: scenario contracts against the segregated-fit model.
//!
//! Validates:
//! 1. The release worst case leaves R2 with free neighbors on both sides.
//! 2. Every scenario returns the heap to a single free span.
//! 3. Average cases take exactly 1000 samples and report sum / 1000.
//! 4. The allocation worst case prints one non-negative `allocation` record.

use wcet_core::report::parse_result_line;
use wcet_core::workload::{AVERAGE_CASE_TRIALS, prepare_release_worst_case};
use wcet_core::{
    Allocator, InspectNeighbors, MonotonicClock, ResultRecord, Scenario, SegregatedHeap,
    SizeSampler,
};

const HEAP: usize = 128 << 20;

#[test]
fn release_worst_case_construction_has_mergeable_neighbors() {
    let mut heap = SegregatedHeap::new(HEAP);
    let target = prepare_release_worst_case(&mut heap).expect("setup should succeed");

    let neighbors = heap
        .free_neighbors(&target.handle)
        .expect("R2 should still be live");
    assert!(neighbors.left_free > 0, "{neighbors:?}");
    assert!(neighbors.right_free > 0, "{neighbors:?}");
    assert!(neighbors.both_free());

    heap.release(target.handle);
    assert!(heap.is_single_free_span());
}

#[test]
fn every_scenario_leaves_no_live_regions() {
    let clock = MonotonicClock::new();
    let mut sizes = SizeSampler::new(Some(2024), 8192);
    let mut heap = SegregatedHeap::new(HEAP);

    for scenario in Scenario::ALL {
        let m = scenario
            .run(&mut heap, &clock, &mut sizes)
            .unwrap_or_else(|e| panic!("{scenario} failed: {e}"));
        assert_eq!(m.scenario, scenario);
        assert_eq!(heap.stats().used_blocks, 0, "{scenario} leaked");
        assert!(heap.is_single_free_span(), "{scenario} left fragments");
    }
}

#[test]
fn average_cases_take_exactly_one_thousand_samples() {
    let clock = MonotonicClock::new();
    let mut sizes = SizeSampler::new(Some(5), 4096);
    let mut heap = SegregatedHeap::new(HEAP);

    for scenario in [Scenario::AllocationAverageCase, Scenario::ReleaseAverageCase] {
        let m = scenario.run(&mut heap, &clock, &mut sizes).unwrap();
        assert_eq!(m.samples, AVERAGE_CASE_TRIALS);
        assert_eq!(m.failures, 0);
        let expected = m.total_ticks as f64 / AVERAGE_CASE_TRIALS as f64;
        assert!((m.mean_ticks - expected).abs() <= f64::EPSILON * expected.max(1.0));
    }
}

#[test]
fn worst_cases_take_a_single_sample() {
    let clock = MonotonicClock::new();
    let mut sizes = SizeSampler::default();
    let mut heap = SegregatedHeap::new(HEAP);

    for scenario in [Scenario::AllocationWorstCase, Scenario::ReleaseWorstCase] {
        let m = scenario.run(&mut heap, &clock, &mut sizes).unwrap();
        assert_eq!(m.samples, 1);
        assert_eq!(m.mean_ticks, m.total_ticks as f64);
    }
}

#[test]
fn allocation_worst_case_record() {
    let clock = MonotonicClock::new();
    let mut heap = SegregatedHeap::new(HEAP);
    let m = Scenario::AllocationWorstCase
        .run(&mut heap, &clock, &mut SizeSampler::default())
        .unwrap();

    let line = ResultRecord::from(&m).to_string();
    let rec = parse_result_line(&line).expect("record should parse");
    assert_eq!(rec.key, "allocation");
    assert!(rec.ticks >= 0.0);
    assert!(line.starts_with("allocation_time:"));
    assert!(line.ends_with(';'));
}
