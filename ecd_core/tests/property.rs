use ecd_core::mocks::{PinEvent, ScriptedPin, SpyElectrode};
use ecd_core::{DisplayPreset, EcdConfig, EcdEngine, PulseCfg, SegmentState, Thresholds};
use ecd_traits::clock::ManualClock;
use proptest::prelude::*;

proptest! {
    #[test]
    fn color_window_ordered_for_presets_across_supply(
        supply in 2.5f32..5.5,
        idx in 0usize..DisplayPreset::ALL.len(),
    ) {
        let cfg = DisplayPreset::ALL[idx].config();
        let t = Thresholds::calibrate(&cfg, supply);
        prop_assert!(t.color_limit_high > t.color_limit_low, "{t:?}");
        prop_assert!(t.color_half < t.color_limit_high);
        prop_assert!(t.color_half > t.color_limit_low);
    }

    #[test]
    fn volt_ordering_survives_code_scaling(
        supply in 0.5f32..6.0,
        refresh_color_v in 0.2f32..2.0,
        color_high_v in 0.0f32..2.0,
        color_low_v in 0.0f32..2.0,
    ) {
        // ColorLimitHigh - ColorLimitLow, in volts
        prop_assume!(supply / 2.0 - refresh_color_v + color_high_v - color_low_v > 1e-3);
        let mut cfg = EcdConfig::default();
        cfg.refresh_color = PulseCfg::new(refresh_color_v, 100);
        cfg.thresholds.color_high_v = color_high_v;
        cfg.thresholds.color_low_v = color_low_v;
        let t = Thresholds::calibrate(&cfg, supply);
        prop_assert!(t.color_limit_high > t.color_limit_low);
        prop_assert!(cfg.supports_supply(supply));
    }

    #[test]
    fn calibration_is_a_pure_function(supply in 0.5f32..6.0) {
        let cfg = EcdConfig::default();
        prop_assert_eq!(Thresholds::calibrate(&cfg, supply), Thresholds::calibrate(&cfg, supply));
    }

    #[test]
    fn refresh_terminates_within_ceiling(
        script in proptest::collection::vec(0u16..=1023, 0..64),
        fallback in 0u16..=1023,
        ceiling in 1u32..=30,
        color in any::<bool>(),
    ) {
        // First sample lands in the survey and is always out of band.
        let (state, first) = if color {
            (SegmentState::Color, 100)
        } else {
            (SegmentState::Bleach, 900)
        };
        let pin = ScriptedPin::new(fallback)
            .with_samples(std::iter::once(first).chain(script.iter().copied()));
        let mut e = EcdEngine::builder()
            .with_segments([pin.clone()])
            .with_counter_electrode(SpyElectrode::new())
            .with_clock(Box::new(ManualClock::new()))
            .with_max_refresh_retries(ceiling)
            .build()
            .unwrap();
        e.set_segment_state(0, state).unwrap();
        let report = e.execute_display().unwrap();

        let refresh = if color { report.color_refresh } else { report.bleach_refresh };
        let refresh = refresh.expect("out-of-band survey escalates");
        prop_assert!(refresh.attempts >= 1);
        prop_assert!(refresh.attempts <= ceiling);
        prop_assert!(refresh.converged || refresh.attempts == ceiling);
        prop_assert_eq!(refresh.converged, refresh.abandoned.is_empty());
        prop_assert_eq!(e.segment_status(0).unwrap().degraded, !refresh.converged);
        // one transition pulse plus one per attempt
        prop_assert_eq!(pin.drive_count(), 1 + refresh.attempts as usize);
        prop_assert_eq!(
            pin.events().iter().filter(|ev| matches!(ev, PinEvent::Sample(_))).count(),
            1 + refresh.attempts as usize
        );
    }
}
