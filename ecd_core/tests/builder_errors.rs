use ecd_core::error::BuildError;
use ecd_core::mocks::{ScriptedPin, SpyElectrode};
use ecd_core::{EcdEngine, MAX_SEGMENTS};
use rstest::rstest;

type Engine = EcdEngine<ScriptedPin, SpyElectrode>;

#[rstest]
fn empty_pin_list_is_rejected() {
    let err = Engine::builder()
        .with_segments(Vec::new())
        .with_counter_electrode(SpyElectrode::new())
        .build()
        .expect_err("should fail with NoSegments");
    match err.downcast_ref::<BuildError>() {
        Some(BuildError::NoSegments) => {}
        other => panic!("expected NoSegments, got: {other:?}"),
    }
}

#[rstest]
#[case(1, true)]
#[case(MAX_SEGMENTS, true)]
#[case(MAX_SEGMENTS + 1, false)]
fn segment_count_limit(#[case] n: usize, #[case] ok: bool) {
    let res = Engine::builder()
        .with_segments((0..n).map(|_| ScriptedPin::new(0)))
        .with_counter_electrode(SpyElectrode::new())
        .build();
    match (res, ok) {
        (Ok(e), true) => assert_eq!(e.segment_count(), n),
        (Err(err), false) => assert_eq!(
            err.downcast_ref::<BuildError>(),
            Some(&BuildError::TooManySegments {
                count: n,
                max: MAX_SEGMENTS
            })
        ),
        (Ok(_), false) => panic!("{n} segments should be rejected"),
        (Err(err), true) => panic!("{n} segments should build: {err}"),
    }
}

#[rstest]
fn zero_retry_ceiling_is_rejected() {
    let err = Engine::builder()
        .with_segments([ScriptedPin::new(0)])
        .with_counter_electrode(SpyElectrode::new())
        .with_max_refresh_retries(0)
        .build()
        .expect_err("should fail");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
}

#[rstest]
fn nonsensical_supply_is_accepted() {
    // Threshold math is left undefined rather than refused.
    let e = Engine::builder()
        .with_segments([ScriptedPin::new(0)])
        .with_counter_electrode(SpyElectrode::new())
        .with_supply_voltage(0.0)
        .build()
        .expect("engine builds");
    assert!(!e.thresholds().color_limit_high.is_finite());
}

#[rstest]
fn settle_override_reaches_the_electrode() {
    let clock = ecd_traits::clock::ManualClock::new();
    let mut e = Engine::builder()
        .with_segments([ScriptedPin::new(0)])
        .with_counter_electrode(SpyElectrode::new())
        .with_clock(Box::new(clock.clone()))
        .with_settle_ms(5)
        .build()
        .expect("engine builds");
    e.drive_counter_electrode(1.0).expect("drive");
    assert_eq!(clock.sleeps(), vec![std::time::Duration::from_millis(5)]);
}
