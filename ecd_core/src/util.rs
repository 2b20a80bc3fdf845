//! Voltage <-> converter-code helpers.
//!
//! The counter electrode DAC and the segment ADC share one resolution and one
//! reference (the supply rail), so a single pair of conversions serves both.

pub use ecd_traits::MAX_CODE;

/// Convert a voltage to an output code, rounded to nearest and clamped to
/// `0..=MAX_CODE`. Non-finite results (e.g. zero supply) map to 0.
#[inline]
pub fn volts_to_code(voltage: f32, supply_v: f32) -> u16 {
    let code = (f32::from(MAX_CODE) * voltage / supply_v).round();
    if !code.is_finite() || code <= 0.0 {
        0
    } else if code >= f32::from(MAX_CODE) {
        MAX_CODE
    } else {
        code as u16
    }
}

/// Convert a raw sample code back to volts against the given supply.
#[inline]
pub fn code_to_volts(code: u16, supply_v: f32) -> f32 {
    f32::from(code) * (supply_v / f32::from(MAX_CODE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mid_supply_maps_to_mid_scale() {
        assert_eq!(volts_to_code(1.5, 3.0), 512); // 511.5 rounds up
        assert_eq!(volts_to_code(0.0, 3.0), 0);
        assert_eq!(volts_to_code(3.0, 3.0), MAX_CODE);
    }

    #[test]
    fn out_of_range_is_clamped() {
        assert_eq!(volts_to_code(-0.4, 3.0), 0);
        assert_eq!(volts_to_code(4.2, 3.0), MAX_CODE);
        assert_eq!(volts_to_code(1.0, 0.0), 0);
        assert_eq!(volts_to_code(0.0, 0.0), 0);
    }

    #[test]
    fn code_round_trips_within_one_lsb() {
        let v = code_to_volts(volts_to_code(1.7, 3.0), 3.0);
        assert!((v - 1.7).abs() <= 3.0 / f32::from(MAX_CODE));
    }
}
