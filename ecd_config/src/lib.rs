#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the electrochromic display driver.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Drive parameters are all optional; anything left out comes from the
//!   named `preset` (or the stock defaults when no preset is given). The
//!   overlay itself happens where the engine config is built.
//! - Validation is structural. Physically odd but finite voltages pass.
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Upper bound on segment pins a single display may declare.
pub const MAX_SEGMENT_PINS: usize = 15;

/// Channels on the segment ADC (MCP3008).
pub const ADC_CHANNELS: u8 = 8;

/// Names accepted by `preset`.
pub const PRESET_NAMES: [&str; 5] = [
    "single",
    "seven_segment",
    "fifteen_segment",
    "three_bars",
    "seven_bars",
];

/// Names accepted by `logging.rotation`.
pub const ROTATIONS: [&str; 3] = ["never", "daily", "hourly"];

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Supply {
    /// Supply rail the converters are referenced to, in volts.
    pub voltage_v: f32,
}

impl Default for Supply {
    fn default() -> Self {
        Self { voltage_v: 3.0 }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Pins {
    /// DAC chip-select line driving the counter electrode.
    pub counter_electrode: u8,
    /// Working electrode GPIOs, in segment index order.
    pub segments: Vec<u8>,
    /// ADC channel per segment (hardware backend only).
    #[serde(default)]
    pub adc_channels: Option<Vec<u8>>,
}

#[derive(Debug, Deserialize, Clone, Copy, Default)]
#[serde(default)]
pub struct TransitionCfg {
    pub color_v: Option<f32>,
    pub color_ms: Option<u64>,
    pub bleach_v: Option<f32>,
    pub bleach_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct RefreshCfg {
    pub color_v: Option<f32>,
    pub color_pulse_ms: Option<u64>,
    pub bleach_v: Option<f32>,
    pub bleach_pulse_ms: Option<u64>,
    /// Refresh pulses per direction before flagged segments are abandoned.
    pub max_retries: u32,
}

impl Default for RefreshCfg {
    fn default() -> Self {
        Self {
            color_v: None,
            color_pulse_ms: None,
            bleach_v: None,
            bleach_pulse_ms: None,
            max_retries: 30,
        }
    }
}

/// Threshold offsets in volts, relative to their reference levels.
#[derive(Debug, Deserialize, Clone, Copy, Default)]
#[serde(default)]
pub struct ThresholdsCfg {
    pub color_high_v: Option<f32>,
    pub color_low_v: Option<f32>,
    pub bleach_high_v: Option<f32>,
    pub bleach_low_v: Option<f32>,
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Electrode {
    /// Wait after every counter electrode change (ms).
    pub settle_ms: u64,
}

impl Default for Electrode {
    fn default() -> Self {
        Self { settle_ms: 50 }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Optional base profile, see [`PRESET_NAMES`].
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub supply: Supply,
    pub pins: Pins,
    #[serde(default)]
    pub transition: TransitionCfg,
    #[serde(default)]
    pub refresh: RefreshCfg,
    #[serde(default)]
    pub thresholds: ThresholdsCfg,
    #[serde(default)]
    pub electrode: Electrode,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read and parse a config file. Does not validate.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {}: {}", path.display(), e))?;
    load_toml(&text).map_err(|e| eyre::eyre!("parse config {}: {}", path.display(), e))
}

fn check_volts(name: &str, v: Option<f32>) -> eyre::Result<()> {
    if let Some(v) = v
        && !v.is_finite()
    {
        eyre::bail!("{name} must be a finite voltage");
    }
    Ok(())
}

fn check_ms(name: &str, ms: Option<u64>) -> eyre::Result<()> {
    if let Some(ms) = ms
        && ms > 60 * 1000
    {
        eyre::bail!("{name} is unreasonably large (>60s)");
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Preset
        if let Some(p) = &self.preset
            && !PRESET_NAMES.contains(&p.as_str())
        {
            eyre::bail!(
                "preset must be one of {}, got '{p}'",
                PRESET_NAMES.join(", ")
            );
        }

        // Supply
        let vs = self.supply.voltage_v;
        if !vs.is_finite() || vs <= 0.0 {
            eyre::bail!("supply.voltage_v must be > 0");
        }

        // Pins
        let segs = &self.pins.segments;
        if segs.is_empty() || segs.len() > MAX_SEGMENT_PINS {
            eyre::bail!(
                "pins.segments must list 1..={MAX_SEGMENT_PINS} pins, got {}",
                segs.len()
            );
        }
        let mut seen = HashSet::new();
        for &p in segs {
            if !seen.insert(p) {
                eyre::bail!("pins.segments lists GPIO {p} more than once");
            }
        }
        if seen.contains(&self.pins.counter_electrode) {
            eyre::bail!(
                "pins.counter_electrode ({}) is also used as a segment pin",
                self.pins.counter_electrode
            );
        }
        if let Some(chans) = &self.pins.adc_channels {
            if chans.len() != segs.len() {
                eyre::bail!(
                    "pins.adc_channels has {} entries but pins.segments has {}",
                    chans.len(),
                    segs.len()
                );
            }
            let mut seen = HashSet::new();
            for &c in chans {
                if c >= ADC_CHANNELS {
                    eyre::bail!("pins.adc_channels entry {c} out of range (0..{ADC_CHANNELS})");
                }
                if !seen.insert(c) {
                    eyre::bail!("pins.adc_channels lists channel {c} more than once");
                }
            }
        }

        // Transition
        check_volts("transition.color_v", self.transition.color_v)?;
        check_volts("transition.bleach_v", self.transition.bleach_v)?;
        check_ms("transition.color_ms", self.transition.color_ms)?;
        check_ms("transition.bleach_ms", self.transition.bleach_ms)?;

        // Refresh
        check_volts("refresh.color_v", self.refresh.color_v)?;
        check_volts("refresh.bleach_v", self.refresh.bleach_v)?;
        check_ms("refresh.color_pulse_ms", self.refresh.color_pulse_ms)?;
        check_ms("refresh.bleach_pulse_ms", self.refresh.bleach_pulse_ms)?;
        if self.refresh.max_retries == 0 {
            eyre::bail!("refresh.max_retries must be >= 1");
        }

        // Thresholds
        check_volts("thresholds.color_high_v", self.thresholds.color_high_v)?;
        check_volts("thresholds.color_low_v", self.thresholds.color_low_v)?;
        check_volts("thresholds.bleach_high_v", self.thresholds.bleach_high_v)?;
        check_volts("thresholds.bleach_low_v", self.thresholds.bleach_low_v)?;

        // Electrode
        if self.electrode.settle_ms > 1000 {
            eyre::bail!("electrode.settle_ms must be <= 1000");
        }

        // Logging
        if let Some(r) = &self.logging.rotation
            && !ROTATIONS.contains(&r.to_ascii_lowercase().as_str())
        {
            eyre::bail!("logging.rotation must be one of never, daily, hourly");
        }
        if let Some(l) = &self.logging.level
            && !LEVELS.contains(&l.to_ascii_lowercase().as_str())
        {
            eyre::bail!("logging.level must be one of trace, debug, info, warn, error");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_takes_defaults() {
        let cfg = load_toml(
            r#"
[pins]
counter_electrode = 8
segments = [5]
"#,
        )
        .unwrap();
        assert_eq!(cfg.supply.voltage_v, 3.0);
        assert_eq!(cfg.refresh.max_retries, 30);
        assert_eq!(cfg.electrode.settle_ms, 50);
        assert!(cfg.preset.is_none());
        assert!(cfg.transition.color_v.is_none());
        cfg.validate().unwrap();
    }

    #[test]
    fn pins_table_is_required() {
        assert!(load_toml("preset = \"single\"\n").is_err());
    }
}
