use ecd_hardware::SimulatedPanel;
use ecd_hardware::error::HwError;
use ecd_traits::{CounterElectrode, SegmentPin};
use rstest::rstest;

type Pins = Vec<Box<dyn SegmentPin + Send>>;

fn boxed(panel: &SimulatedPanel) -> (Pins, Box<dyn CounterElectrode + Send>) {
    let pins = panel
        .segment_pins()
        .into_iter()
        .map(|p| Box::new(p) as Box<dyn SegmentPin + Send>)
        .collect();
    (pins, Box::new(panel.counter_electrode()))
}

#[test]
fn pins_work_behind_trait_objects() {
    let panel = SimulatedPanel::new(3, 3.0);
    let (mut pins, mut ce) = boxed(&panel);

    ce.write_code(239).expect("write ce"); // ~0.70 V
    for p in &mut pins {
        p.drive_low().expect("drive");
    }
    assert!(panel.any_driven());
    for p in &mut pins {
        p.release().expect("release");
    }
    assert!(!panel.any_driven());

    for i in 0..3 {
        let v = panel.potential(i).expect("cell");
        assert!((v + 0.70).abs() < 0.01, "segment {i}: {v}");
        assert_eq!(panel.pulses(i), 1);
    }
}

#[rstest]
#[case(1.0, 1.3)]
#[case(0.5, 0.65)]
#[case(0.0, 0.0)]
fn partial_response_moves_part_way(#[case] response: f32, #[case] expect_v: f32) {
    let panel = SimulatedPanel::new(1, 3.0);
    panel.set_response(0, response);
    let mut ce = panel.counter_electrode();
    ce.write_code(580).expect("write ce"); // ~1.70 V
    let mut pin = panel.segment_pins().remove(0);
    pin.drive_high().expect("drive");
    let v = panel.potential(0).expect("cell");
    assert!((v - expect_v).abs() < 0.01, "{v}");
}

#[test]
fn driven_sample_maps_to_typed_error() {
    let panel = SimulatedPanel::new(1, 3.0);
    let mut pin = panel.segment_pins().remove(0);
    pin.drive_high().expect("drive");
    let err = pin.sample().expect_err("sample while driven");
    assert_eq!(err.to_string(), "segment 0 sampled while driven");
    assert!(err.downcast_ref::<HwError>().is_some());
}

#[test]
fn samples_clamp_to_converter_range() {
    let panel = SimulatedPanel::new(2, 3.0);
    panel.set_potential(0, 5.0);
    panel.set_potential(1, -5.0);
    let mut pins = panel.segment_pins();
    assert_eq!(pins[0].sample().expect("sample"), 1023);
    assert_eq!(pins[1].sample().expect("sample"), 0);
}
