//! `From` implementations bridging `ecd_config` types to `ecd_core` types.
//!
//! File values overlay the named preset (or the stock defaults); fields left
//! out of the file keep the base value.

use crate::config::{DisplayPreset, EcdConfig, PulseCfg, ThresholdOffsets};

fn overlay(base: PulseCfg, voltage_v: Option<f32>, duration_ms: Option<u64>) -> PulseCfg {
    PulseCfg {
        voltage_v: voltage_v.unwrap_or(base.voltage_v),
        duration_ms: duration_ms.unwrap_or(base.duration_ms),
    }
}

// ── ThresholdOffsets ─────────────────────────────────────────────────────────

impl ThresholdOffsets {
    fn overlaid(self, c: &ecd_config::ThresholdsCfg) -> Self {
        Self {
            color_high_v: c.color_high_v.unwrap_or(self.color_high_v),
            color_low_v: c.color_low_v.unwrap_or(self.color_low_v),
            bleach_high_v: c.bleach_high_v.unwrap_or(self.bleach_high_v),
            bleach_low_v: c.bleach_low_v.unwrap_or(self.bleach_low_v),
        }
    }
}

// ── EcdConfig ────────────────────────────────────────────────────────────────

impl From<&ecd_config::Config> for EcdConfig {
    fn from(c: &ecd_config::Config) -> Self {
        // Unknown names are rejected by validate(); fall back to defaults here.
        let base = c
            .preset
            .as_deref()
            .and_then(DisplayPreset::from_name)
            .map(DisplayPreset::config)
            .unwrap_or_default();
        let t = &c.transition;
        let r = &c.refresh;
        Self {
            color: overlay(base.color, t.color_v, t.color_ms),
            bleach: overlay(base.bleach, t.bleach_v, t.bleach_ms),
            refresh_color: overlay(base.refresh_color, r.color_v, r.color_pulse_ms),
            refresh_bleach: overlay(base.refresh_bleach, r.bleach_v, r.bleach_pulse_ms),
            thresholds: base.thresholds.overlaid(&c.thresholds),
        }
    }
}
