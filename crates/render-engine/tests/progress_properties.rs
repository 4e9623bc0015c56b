use std::sync::{Arc, Mutex};
use std::time::Duration;

use captioneer_common::config::ProgressTuning;
use captioneer_render_engine::{
    ProgressCallback, ProgressEvent, ProgressReporter, ProgressStage, ProgressTracker, StagePlan,
};
use proptest::prelude::*;

/// Raw encoder samples: resets, stalls, garbage and ordinary values.
fn raw_sample() -> impl Strategy<Value = f64> {
    prop_oneof![
        Just(0.0),
        Just(1.0),
        Just(f64::NAN),
        Just(f64::INFINITY),
        -0.5f64..0.0,
        0.0f64..1.0,
        1.0f64..2.0,
    ]
}

fn raw_trace() -> impl Strategy<Value = Vec<f64>> {
    // Repeat some samples so stalls show up.
    prop::collection::vec((raw_sample(), 1usize..4), 0..40).prop_map(|items| {
        items
            .into_iter()
            .flat_map(|(value, repeat)| std::iter::repeat(value).take(repeat))
            .collect()
    })
}

/// Run a whole render's worth of events and return what the callback saw.
fn replay(trace: &[f64], poll_ms: u64, tuning: ProgressTuning) -> (Vec<f64>, Vec<ProgressEvent>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let callback: ProgressCallback = Arc::new(move |event| sink.lock().unwrap().push(event));
    let reporter = ProgressReporter::new(Some(callback));

    let plan = StagePlan::default();
    reporter.emit(plan.setup.stage, plan.setup.start);
    reporter.emit(plan.setup.stage, plan.setup.end);
    reporter.emit(plan.layout.stage, plan.layout.end);
    reporter.emit(plan.overlay.stage, plan.overlay.end);

    let mut tracker = ProgressTracker::new(plan.encode, tuning);
    let mut tracked = Vec::new();
    for (i, raw) in trace.iter().enumerate() {
        let elapsed = Duration::from_millis(poll_ms * i as u64);
        if let Some(fraction) = tracker.sample(*raw, elapsed) {
            tracked.push(fraction);
            reporter.emit(plan.encode.stage, fraction);
        }
    }
    for fraction in tracker.finishing_steps() {
        tracked.push(fraction);
        reporter.emit(plan.encode.stage, fraction);
    }
    reporter.emit(ProgressStage::Completed, 1.0);

    let events = events.lock().unwrap().clone();
    (tracked, events)
}

proptest! {
    #[test]
    fn prop_any_trace_reports_monotonic_progress_ending_at_one(
        trace in raw_trace(),
        poll_ms in 1u64..500,
    ) {
        let (tracked, events) = replay(&trace, poll_ms, ProgressTuning::default());

        // The tracker alone never goes backwards, before the reporter clamps.
        for pair in tracked.windows(2) {
            prop_assert!(pair[0] <= pair[1], "tracker regressed: {:?}", pair);
        }
        prop_assert_eq!(tracked.last().copied(), Some(1.0));

        for pair in events.windows(2) {
            prop_assert!(pair[0].fraction <= pair[1].fraction, "{:?} -> {:?}", pair[0], pair[1]);
        }
        prop_assert!(events.iter().all(|e| (0.0..=1.0).contains(&e.fraction)));
        let last = events.last().copied();
        prop_assert_eq!(last.map(|e| e.stage), Some(ProgressStage::Completed));
        prop_assert_eq!(last.map(|e| e.fraction), Some(1.0));
    }

    #[test]
    fn prop_tuning_does_not_break_monotonicity(
        trace in raw_trace(),
        ceiling in 0.0f64..1.5,
        ramp_secs in 0.0f64..20.0,
        threshold in 0.0f64..0.2,
        steps in 0u32..20,
    ) {
        let tuning = ProgressTuning {
            simulated_ceiling: ceiling,
            simulated_ramp_secs: ramp_secs,
            emit_threshold: threshold,
            finish_steps: steps,
            ..ProgressTuning::default()
        };
        let (tracked, events) = replay(&trace, 50, tuning);

        for pair in tracked.windows(2) {
            prop_assert!(pair[0] <= pair[1]);
        }
        for pair in events.windows(2) {
            prop_assert!(pair[0].fraction <= pair[1].fraction);
        }
        prop_assert_eq!(events.last().map(|e| e.fraction), Some(1.0));
    }
}

#[test]
fn empty_trace_still_finishes_at_one() {
    let (tracked, events) = replay(&[], 50, ProgressTuning::default());
    assert_eq!(tracked.len(), 10);
    assert_eq!(tracked.last().copied(), Some(1.0));
    assert!(tracked[0] > 0.6);
    assert_eq!(events.last().map(|e| e.stage), Some(ProgressStage::Completed));
}

#[test]
fn nan_samples_after_real_progress_hold_position() {
    let (tracked, _) = replay(&[0.4, f64::NAN, 0.0, f64::NAN], 50, ProgressTuning::default());
    // 0.4 of the encode span, then nothing new until the finishing ramp.
    assert!((tracked[0] - 0.76).abs() < 1e-9);
    assert!(tracked[1] > tracked[0]);
}
