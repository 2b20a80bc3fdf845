use std::time::Duration;

use ecd_core::mocks::{CeEvent, PinEvent, ScriptedPin, SpyElectrode};
use ecd_core::util::volts_to_code;
use ecd_core::{
    Direction, DisplayOutcome, EcdEngine, EcdError, Level, SegmentState, MAX_REFRESH_RETRIES,
};
use ecd_traits::clock::ManualClock;
use rstest::rstest;

type Engine = EcdEngine<ScriptedPin, SpyElectrode>;

struct Rig {
    pins: Vec<ScriptedPin>,
    ce: SpyElectrode,
    clock: ManualClock,
    engine: Engine,
}

fn rig(pins: Vec<ScriptedPin>) -> Rig {
    let ce = SpyElectrode::new();
    let clock = ManualClock::new();
    let engine = EcdEngine::builder()
        .with_segments(pins.clone())
        .with_counter_electrode(ce.clone())
        .with_clock(Box::new(clock.clone()))
        .build()
        .expect("engine build");
    Rig {
        pins,
        ce,
        clock,
        engine,
    }
}

fn pulses_of(clock: &ManualClock, ms: u64) -> usize {
    clock
        .sleeps()
        .iter()
        .filter(|d| **d == Duration::from_millis(ms))
        .count()
}

#[test]
fn requested_states_are_applied() {
    // Color samples read healthy (1000), Bleach samples healthy (100).
    let mut r = rig(vec![
        ScriptedPin::new(1000),
        ScriptedPin::new(100),
        ScriptedPin::new(0),
    ]);
    r.engine.set_segment_state(0, SegmentState::Color).unwrap();
    r.engine.set_segment_state(1, SegmentState::Bleach).unwrap();

    let report = r.engine.execute_display().unwrap();

    assert_eq!(report.outcome, DisplayOutcome::Completed);
    // Bleach phase runs first.
    assert_eq!(report.transitioned, vec![1, 0]);
    assert_eq!(r.engine.segment_state(0), Some(SegmentState::Color));
    assert_eq!(r.engine.segment_state(1), Some(SegmentState::Bleach));
    assert_eq!(r.engine.segment_state(2), Some(SegmentState::Undefined));
    assert!(!r.engine.color_required());
    assert!(!r.engine.bleach_required());
    assert!(report.color_refresh.is_none());
    assert!(report.bleach_refresh.is_none());
    assert_eq!(r.ce.last(), Some(CeEvent::Release));
    assert_eq!(r.engine.counter_electrode_code(), None);
}

#[test]
fn pipeline_drives_electrode_in_phase_order() {
    let mut r = rig(vec![ScriptedPin::new(1000), ScriptedPin::new(100)]);
    r.engine.set_segment_state(0, SegmentState::Color).unwrap();
    r.engine.set_segment_state(1, SegmentState::Bleach).unwrap();
    r.engine.execute_display().unwrap();

    // bleach 0.7 V, color 3.0 - 1.3 V, survey at mid-supply
    assert_eq!(
        r.ce.events(),
        vec![
            CeEvent::Write(239),
            CeEvent::Write(580),
            CeEvent::Write(512),
            CeEvent::Release
        ]
    );
    assert_eq!(
        r.clock.sleeps(),
        [50, 350, 50, 350, 50]
            .into_iter()
            .map(Duration::from_millis)
            .collect::<Vec<_>>()
    );
}

#[test]
fn repeated_request_applies_once() {
    let mut r = rig(vec![ScriptedPin::new(1000)]);
    r.engine.set_segment_state(0, SegmentState::Color).unwrap();
    r.engine.set_segment_state(0, SegmentState::Color).unwrap();
    assert!(r.engine.color_required());

    let report = r.engine.execute_display().unwrap();
    assert_eq!(report.transitioned, vec![0]);
    assert_eq!(r.pins[0].count(PinEvent::High), 1);

    // Already Color: a fresh request is a no-op and raises nothing.
    r.engine.set_segment_state(0, SegmentState::Color).unwrap();
    assert!(!r.engine.color_required());
    let report = r.engine.execute_display().unwrap();
    assert!(report.transitioned.is_empty());
    assert_eq!(r.pins[0].count(PinEvent::High), 1);
}

#[test]
fn begin_colors_then_bleaches_every_segment() {
    let pins: Vec<ScriptedPin> = (0..3)
        .map(|_| ScriptedPin::new(100).with_samples([1000]))
        .collect();
    let mut r = rig(pins);

    let report = r.engine.begin().unwrap();

    assert_eq!(report.outcome, DisplayOutcome::Completed);
    assert_eq!(report.transitioned, vec![0, 1, 2]);
    for (i, pin) in r.pins.iter().enumerate() {
        assert_eq!(pin.count(PinEvent::High), 1, "segment {i}");
        assert_eq!(pin.count(PinEvent::Low), 1, "segment {i}");
        let ev = pin.events();
        let hi = ev.iter().position(|e| *e == PinEvent::High).unwrap();
        let lo = ev.iter().position(|e| *e == PinEvent::Low).unwrap();
        assert!(hi < lo, "segment {i} bleached before coloring");
        assert_eq!(r.engine.segment_state(i), Some(SegmentState::Bleach));
    }
}

#[test]
fn urgent_color_segment_refreshes_until_target() {
    // survey 700 (< ColorLimitLow), then 800, then 1000 (>= ColorLimitHigh)
    let mut r = rig(vec![ScriptedPin::new(1000).with_samples([700, 800, 1000])]);
    r.engine.set_segment_state(0, SegmentState::Color).unwrap();

    let report = r.engine.execute_display().unwrap();

    let refresh = report.color_refresh.expect("color refresh ran");
    assert_eq!(refresh.direction, Direction::Color);
    assert_eq!(refresh.attempts, 2);
    assert!(refresh.converged);
    assert!(refresh.abandoned.is_empty());
    assert!(report.bleach_refresh.is_none());
    assert_eq!(r.pins[0].count(PinEvent::High), 3);
    assert_eq!(pulses_of(&r.clock, 100), 2);
    let status = r.engine.segment_status(0).unwrap();
    assert!(!status.needs_refresh);
    assert!(!status.degraded);
    assert!(!r.engine.refresh_color_needed());
    // refresh CE level is 3.0 - 1.3 V
    assert_eq!(r.ce.writes(), vec![580, 512, 580]);
}

#[test]
fn stuck_segment_is_abandoned_at_the_ceiling() {
    let mut r = rig(vec![ScriptedPin::new(700)]);
    r.engine.set_segment_state(0, SegmentState::Color).unwrap();

    let report = r.engine.execute_display().unwrap();

    assert_eq!(report.outcome, DisplayOutcome::Completed);
    let refresh = report.color_refresh.as_ref().expect("color refresh ran");
    assert_eq!(refresh.attempts, MAX_REFRESH_RETRIES);
    assert!(!refresh.converged);
    assert_eq!(refresh.abandoned, vec![0]);
    assert_eq!(report.abandoned().collect::<Vec<_>>(), vec![0]);
    assert_eq!(
        r.pins[0].count(PinEvent::High),
        1 + MAX_REFRESH_RETRIES as usize
    );
    assert_eq!(pulses_of(&r.clock, 100), MAX_REFRESH_RETRIES as usize);
    assert!(r.engine.segment_status(0).unwrap().degraded);
    assert_eq!(r.engine.segment_state(0), Some(SegmentState::Color));
}

#[rstest]
#[case(1)]
#[case(5)]
#[case(12)]
fn retry_ceiling_is_configurable(#[case] ceiling: u32) {
    let pin = ScriptedPin::new(700);
    let mut e = EcdEngine::builder()
        .with_segments([pin.clone()])
        .with_counter_electrode(SpyElectrode::new())
        .with_clock(Box::new(ManualClock::new()))
        .with_max_refresh_retries(ceiling)
        .build()
        .unwrap();
    e.set_segment_state(0, SegmentState::Color).unwrap();
    let report = e.execute_display().unwrap();
    assert_eq!(report.color_refresh.unwrap().attempts, ceiling);
    assert_eq!(pin.count(PinEvent::High), 1 + ceiling as usize);
}

#[test]
fn degraded_clears_on_next_transition() {
    let mut r = rig(vec![ScriptedPin::new(700)]);
    r.engine.set_segment_state(0, SegmentState::Color).unwrap();
    r.engine.execute_display().unwrap();
    assert!(r.engine.segment_status(0).unwrap().degraded);

    r.pins[0].set_fallback(100);
    r.engine.set_segment_state(0, SegmentState::Bleach).unwrap();
    r.engine.execute_display().unwrap();
    assert!(!r.engine.segment_status(0).unwrap().degraded);
}

#[test]
fn marginal_segment_joins_but_does_not_trigger_refresh() {
    let mut r = rig(vec![ScriptedPin::new(1000).with_samples([880])]);
    r.engine.set_segment_state(0, SegmentState::Color).unwrap();
    let report = r.engine.execute_display().unwrap();
    assert!(report.color_refresh.is_none());
    assert!(r.engine.segment_status(0).unwrap().needs_refresh);
    assert_eq!(r.pins[0].count(PinEvent::High), 1);

    // Now an urgent neighbour escalates; the marginal one rides along.
    let mut r = rig(vec![
        ScriptedPin::new(1000).with_samples([700, 800]),
        ScriptedPin::new(1000).with_samples([880]),
    ]);
    r.engine.set_all_segments_color();
    let report = r.engine.execute_display().unwrap();
    let refresh = report.color_refresh.expect("color refresh ran");
    assert_eq!(refresh.attempts, 2);
    assert!(refresh.converged);
    assert_eq!(r.pins[0].count(PinEvent::High), 3);
    assert_eq!(r.pins[1].count(PinEvent::High), 2);
}

#[test]
fn urgent_bleach_segment_refreshes_low() {
    // survey 450 (> BleachLimitHigh), then 200, then 60 (<= BleachLimitLow)
    let mut r = rig(vec![ScriptedPin::new(60).with_samples([450, 200, 60])]);
    r.engine.set_segment_state(0, SegmentState::Bleach).unwrap();

    let report = r.engine.execute_display().unwrap();

    let refresh = report.bleach_refresh.expect("bleach refresh ran");
    assert_eq!(refresh.attempts, 2);
    assert!(refresh.converged);
    assert_eq!(r.pins[0].count(PinEvent::Low), 3);
    assert_eq!(pulses_of(&r.clock, 10), 2);
    assert_eq!(r.engine.min_bleach_sample(), Some(450));
    // amplitude floor is the configured 0.7 V
    assert_eq!(r.ce.writes(), vec![239, 512, 239]);
}

#[test]
fn deep_bleach_raises_refresh_amplitude() {
    let mut r = rig(vec![
        ScriptedPin::new(60).with_samples([450, 60]),
        ScriptedPin::new(30),
    ]);
    r.engine.set_all_segments_bleach();

    let report = r.engine.execute_display().unwrap();

    assert!(report.bleach_refresh.expect("bleach refresh ran").converged);
    assert_eq!(r.engine.min_bleach_sample(), Some(30));
    let amp = r.engine.bleach_refresh_amplitude();
    // 1.5 V - 30 codes (~0.088 V)
    assert!((amp - 1.412).abs() < 0.01, "{amp}");
    assert_eq!(
        r.ce.writes().last().copied(),
        Some(volts_to_code(amp, 3.0))
    );
    // only the flagged segment is pulsed
    assert_eq!(r.pins[1].count(PinEvent::Low), 1);
}

#[test]
fn undefined_segments_are_never_flagged() {
    let mut r = rig(vec![ScriptedPin::new(0), ScriptedPin::new(1023)]);
    let report = r.engine.execute_display().unwrap();
    assert_eq!(report.outcome, DisplayOutcome::Completed);
    assert!(report.transitioned.is_empty());
    assert!(report.color_refresh.is_none() && report.bleach_refresh.is_none());
    for i in 0..2 {
        assert!(!r.engine.segment_status(i).unwrap().needs_refresh);
    }
    assert_eq!(r.engine.min_bleach_sample(), None);
}

#[test]
fn survey_releases_pins_and_samples_each_once() {
    let mut r = rig(vec![ScriptedPin::new(0), ScriptedPin::new(0)]);
    r.engine.execute_display().unwrap();
    for pin in &r.pins {
        assert_eq!(pin.events(), vec![PinEvent::Sample(0), PinEvent::Release]);
    }
}

#[test]
fn out_of_range_index_is_rejected() {
    let mut r = rig(vec![ScriptedPin::new(0)]);
    let err = r
        .engine
        .set_segment_state(4, SegmentState::Color)
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<EcdError>(),
        Some(&EcdError::SegmentIndex { index: 4, count: 1 })
    );
    assert!(!r.engine.color_required());
    assert!(r.engine.segment_status(4).is_err());
    assert_eq!(r.engine.segment_state(4), None);
}

#[test]
fn undefined_request_keeps_pending_target() {
    let mut r = rig(vec![ScriptedPin::new(1000)]);
    r.engine.set_segment_state(0, SegmentState::Color).unwrap();
    let err = r
        .engine
        .set_segment_state(0, SegmentState::Undefined)
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<EcdError>(),
        Some(&EcdError::UndefinedTarget { index: 0 })
    );
    assert_eq!(
        r.engine.segment_status(0).unwrap().next,
        SegmentState::Color
    );

    let report = r.engine.execute_display().unwrap();
    assert_eq!(report.transitioned, vec![0]);
    assert_eq!(r.engine.segment_state(0), Some(SegmentState::Color));
}

#[test]
fn sample_failure_surfaces_with_context_and_floats_electrode() {
    let mut r = rig(vec![ScriptedPin::new(0)]);
    r.pins[0].fail_sample(true);
    let err = r.engine.execute_display().unwrap_err();
    assert!(err.to_string().contains("sample segment 0"), "{err}");
    assert_eq!(
        err.downcast_ref::<EcdError>(),
        Some(&EcdError::Hardware("adc busy".into()))
    );
    assert_eq!(r.ce.last(), Some(CeEvent::Release));
}

#[test]
fn direct_drive_leaves_logical_state_alone() {
    let mut r = rig(vec![ScriptedPin::new(0), ScriptedPin::new(0)]);
    let outcome = r
        .engine
        .direct_drive_all(Level::High, Duration::from_millis(200))
        .unwrap();
    assert_eq!(outcome, DisplayOutcome::Completed);
    assert_eq!(r.ce.events(), vec![CeEvent::Write(580), CeEvent::Release]);
    for (i, pin) in r.pins.iter().enumerate() {
        assert_eq!(pin.events(), vec![PinEvent::High, PinEvent::Release]);
        assert_eq!(r.engine.segment_state(i), Some(SegmentState::Undefined));
    }
    assert_eq!(
        r.clock.sleeps(),
        vec![Duration::from_millis(50), Duration::from_millis(200)]
    );
}

#[test]
fn supply_and_config_changes_recalibrate() {
    let mut r = rig(vec![ScriptedPin::new(0)]);
    let before = *r.engine.thresholds();
    r.engine.set_supply_voltage(3.3);
    assert_eq!(r.engine.supply_voltage(), 3.3);
    assert_ne!(*r.engine.thresholds(), before);

    let mut cfg = *r.engine.config();
    cfg.thresholds.color_low_v = 1.0;
    let prev = *r.engine.thresholds();
    r.engine.set_configuration(cfg);
    assert!(r.engine.thresholds().color_limit_low > prev.color_limit_low);
    assert_eq!(r.engine.config(), &cfg);
}

#[test]
fn low_level_electrode_calls_pass_through() {
    let mut r = rig(vec![ScriptedPin::new(0)]);
    assert_eq!(r.engine.drive_counter_electrode(1.5).unwrap(), 512);
    assert_eq!(r.engine.counter_electrode_code(), Some(512));
    r.engine.release_counter_electrode().unwrap();
    assert_eq!(r.ce.events(), vec![CeEvent::Write(512), CeEvent::Release]);
}
