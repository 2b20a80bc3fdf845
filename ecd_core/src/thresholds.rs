//! Supply-dependent refresh thresholds in the raw-sample domain.
//!
//! Color segments sit above the counter electrode (CE held low-side during
//! Color drive), Bleach segments below it. Each direction gets a pair of
//! limits bracketing a healthy zone, an ambiguous zone and a refresh zone.
//! All values are recomputed from scratch whenever the supply voltage or the
//! configuration changes; nothing here is cached across calls.

use crate::config::EcdConfig;
use crate::util::MAX_CODE;

/// Code of the mid-supply reference used while sampling OCP.
pub const MID_SCALE_CODE: i32 = MAX_CODE as i32 / 2;

/// Calibrated thresholds, in converter codes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Color refresh target (sampled at the Color refresh CE level).
    pub color_limit_high: f32,
    /// Below this a Color segment needs refresh.
    pub color_limit_low: f32,
    /// Above this a Color segment is healthy.
    pub color_half: f32,
    /// Above this a Bleach segment needs refresh.
    pub bleach_limit_high: f32,
    /// Bleach refresh target (sampled at the Bleach refresh CE level).
    pub bleach_limit_low: f32,
    /// Mean distance of both Bleach limits from their CE levels.
    pub bleach_half_amplitude: f32,
}

impl Thresholds {
    /// Derive thresholds for `cfg` at `supply_v`.
    ///
    /// Values are not validated: a zero or negative supply yields non-finite
    /// or inverted limits, and those flow into classification unchanged.
    pub fn calibrate(cfg: &EcdConfig, supply_v: f32) -> Self {
        let off = &cfg.thresholds;
        let per_volt = f32::from(MAX_CODE) / supply_v;
        let refresh_color_v = cfg.refresh_color.voltage_v;
        let refresh_bleach_v = cfg.refresh_bleach.voltage_v;

        let color_limit_high = ((supply_v - refresh_color_v) + off.color_high_v) * per_volt;
        let color_limit_low = (supply_v / 2.0 + off.color_low_v) * per_volt;
        let color_half = (color_limit_high + color_limit_low) / 2.0;

        let bleach_limit_high = (supply_v / 2.0 - off.bleach_high_v) * per_volt;
        let bleach_limit_low = (refresh_bleach_v - off.bleach_low_v) * per_volt;

        // Integer LSB arithmetic, truncating like the converters do.
        let ce_refresh_code = (f32::from(MAX_CODE) * (refresh_bleach_v / supply_v)) as i32;
        let amp_high = MID_SCALE_CODE
            .saturating_sub(bleach_limit_high as i32)
            .saturating_abs();
        let amp_low = ce_refresh_code
            .saturating_sub(bleach_limit_low as i32)
            .saturating_abs();
        let bleach_half_amplitude = amp_high.saturating_add(amp_low) as f32 * 0.5;

        Self {
            color_limit_high,
            color_limit_low,
            color_half,
            bleach_limit_high,
            bleach_limit_low,
            bleach_half_amplitude,
        }
    }

    /// Absolute sample level at or above which a Bleach segment joins a
    /// refresh batch.
    #[inline]
    pub fn bleach_half_threshold(&self) -> i32 {
        MID_SCALE_CODE.saturating_sub(self.bleach_half_amplitude as i32)
    }

    /// Whether the Color window is non-empty (`high > low`).
    #[inline]
    pub fn color_window_ordered(&self) -> bool {
        self.color_limit_high > self.color_limit_low
    }
}

impl EcdConfig {
    /// Whether this configuration yields an ordered Color window at
    /// `supply_v`. The engine itself never refuses a configuration.
    pub fn supports_supply(&self, supply_v: f32) -> bool {
        supply_v > 0.0 && Thresholds::calibrate(self, supply_v).color_window_ordered()
    }
}
