//! Drive configuration for the engine.
//!
//! These are the runtime configuration structs used by `EcdEngine`.
//! They are separate from the TOML-deserialized config in `ecd_config`.
//! Voltages are amplitudes in volts; threshold offsets are relative to the
//! reference levels described on [`ThresholdOffsets`], never absolute.

use std::time::Duration;

/// Upper bound on segment pins per engine.
pub const MAX_SEGMENTS: usize = 15;
/// Refresh attempts per direction before remaining segments are abandoned.
pub const MAX_REFRESH_RETRIES: u32 = 30;
/// Supply voltage assumed until the caller reports a measured one.
pub const DEFAULT_SUPPLY_VOLTAGE: f32 = 3.0;
/// Counter electrode settling time after each output change.
pub const CE_SETTLE_MS: u64 = 50;

/// Amplitude and hold time of one pulse kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseCfg {
    /// Amplitude across WE and CE in volts.
    pub voltage_v: f32,
    /// Hold time in milliseconds.
    pub duration_ms: u64,
}

impl PulseCfg {
    pub const fn new(voltage_v: f32, duration_ms: u64) -> Self {
        Self {
            voltage_v,
            duration_ms,
        }
    }

    #[inline]
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Refresh thresholds expressed as offsets from their reference points.
///
/// - `color_high_v`: added to the Color refresh CE level; target for Color refresh.
/// - `color_low_v`: added to mid supply; below it a Color segment needs refresh.
/// - `bleach_high_v`: subtracted from mid supply; above it a Bleach segment needs refresh.
/// - `bleach_low_v`: subtracted from the Bleach refresh amplitude; target for Bleach refresh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdOffsets {
    pub color_high_v: f32,
    pub color_low_v: f32,
    pub bleach_high_v: f32,
    pub bleach_low_v: f32,
}

impl Default for ThresholdOffsets {
    fn default() -> Self {
        Self {
            color_high_v: 1.1,
            color_low_v: 0.95,
            bleach_high_v: 0.3,
            bleach_low_v: 0.5,
        }
    }
}

/// Complete per-engine configuration. Replaced wholesale, never patched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EcdConfig {
    /// Color transition pulse.
    pub color: PulseCfg,
    /// Bleach transition pulse.
    pub bleach: PulseCfg,
    /// Color refresh pulse.
    pub refresh_color: PulseCfg,
    /// Bleach refresh pulse.
    pub refresh_bleach: PulseCfg,
    pub thresholds: ThresholdOffsets,
}

impl Default for EcdConfig {
    fn default() -> Self {
        Self {
            color: PulseCfg::new(1.3, 350),
            bleach: PulseCfg::new(0.7, 350),
            refresh_color: PulseCfg::new(1.3, 100),
            refresh_bleach: PulseCfg::new(0.7, 10),
            thresholds: ThresholdOffsets::default(),
        }
    }
}

/// Tuned profiles for the stock display layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayPreset {
    Single,
    SevenSegment,
    FifteenSegment,
    ThreeBars,
    SevenBars,
}

impl DisplayPreset {
    pub const ALL: [DisplayPreset; 5] = [
        DisplayPreset::Single,
        DisplayPreset::SevenSegment,
        DisplayPreset::FifteenSegment,
        DisplayPreset::ThreeBars,
        DisplayPreset::SevenBars,
    ];

    /// Number of working electrodes on this layout.
    pub const fn segment_count(self) -> usize {
        match self {
            DisplayPreset::Single => 1,
            DisplayPreset::SevenSegment => 8,
            DisplayPreset::FifteenSegment => 15,
            DisplayPreset::ThreeBars => 3,
            DisplayPreset::SevenBars => 7,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            DisplayPreset::Single => "single",
            DisplayPreset::SevenSegment => "seven_segment",
            DisplayPreset::FifteenSegment => "fifteen_segment",
            DisplayPreset::ThreeBars => "three_bars",
            DisplayPreset::SevenBars => "seven_bars",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    pub fn config(self) -> EcdConfig {
        let base = EcdConfig::default();
        match self {
            DisplayPreset::Single => EcdConfig {
                color: PulseCfg::new(1.3, 550),
                bleach: PulseCfg::new(0.7, 550),
                refresh_color: PulseCfg::new(1.3, 200),
                refresh_bleach: PulseCfg::new(0.7, 200),
                thresholds: ThresholdOffsets {
                    bleach_low_v: 0.4,
                    ..base.thresholds
                },
            },
            DisplayPreset::SevenSegment => EcdConfig {
                refresh_bleach: PulseCfg::new(0.6, 100),
                ..base
            },
            DisplayPreset::FifteenSegment => EcdConfig {
                refresh_bleach: PulseCfg::new(0.6, 100),
                thresholds: ThresholdOffsets {
                    color_low_v: 1.0,
                    bleach_low_v: 0.4,
                    ..base.thresholds
                },
                ..base
            },
            DisplayPreset::ThreeBars => EcdConfig {
                color: PulseCfg::new(1.3, 900),
                bleach: PulseCfg::new(0.7, 900),
                refresh_color: PulseCfg::new(1.3, 200),
                refresh_bleach: PulseCfg::new(0.7, 100),
                ..base
            },
            DisplayPreset::SevenBars => EcdConfig {
                bleach: PulseCfg::new(0.8, 350),
                refresh_bleach: PulseCfg::new(0.7, 200),
                thresholds: ThresholdOffsets {
                    bleach_low_v: 0.4,
                    ..base.thresholds
                },
                ..base
            },
        }
    }
}
