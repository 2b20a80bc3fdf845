//! Backend assembly and command execution.

use crate::cli::{Commands, json_mode};
use ecd_core::{
    CancelToken, DisplayOutcome, DisplayPreset, DisplayReport, Ecd, EcdConfig, EcdEngine, Phase,
    RefreshOutcome, SegmentState, Thresholds,
};
use ecd_traits::clock::{Clock, MonotonicClock};
use ecd_traits::{CounterElectrode, SegmentPin};
use eyre::{Result, WrapErr};
use serde_json::json;
use std::time::Duration;

/// Env var holding the simulated panel's drift per sample, in volts.
#[cfg(not(all(feature = "hardware", target_os = "linux")))]
const SIM_DRIFT_ENV: &str = "ECD_SIM_DRIFT";

const WAIT_SLICE: Duration = Duration::from_millis(50);

type Backend = (
    Vec<Box<dyn SegmentPin + Send>>,
    Box<dyn CounterElectrode + Send>,
);

/// A drive call that ended because a stop was requested.
#[derive(Debug, thiserror::Error)]
#[error("stopped before the {}", phase_name(.phase))]
pub struct Interrupted {
    pub phase: Phase,
}

pub fn phase_name(phase: &Phase) -> String {
    match phase {
        Phase::Transition(d) => format!("{} transition", d.as_str()),
        Phase::Survey => "ocp survey".to_string(),
        Phase::Refresh(d) => format!("{} refresh", d.as_str()),
        Phase::DirectDrive => "direct drive".to_string(),
    }
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn open_backend(cfg: &ecd_config::Config) -> Result<Backend> {
    let (pins, dac) = ecd_hardware::rpi::open(
        &cfg.pins.segments,
        cfg.pins.adc_channels.as_deref(),
        cfg.pins.counter_electrode,
    )
    .wrap_err("open display hardware")?;
    tracing::info!(segments = pins.len(), "display hardware ready");
    let pins = pins
        .into_iter()
        .map(|p| Box::new(p) as Box<dyn SegmentPin + Send>)
        .collect();
    Ok((pins, Box::new(dac)))
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn open_backend(cfg: &ecd_config::Config) -> Result<Backend> {
    let drift_v = sim_drift()?;
    let panel = ecd_hardware::SimulatedPanel::new(cfg.pins.segments.len(), cfg.supply.voltage_v)
        .with_drift(drift_v);
    tracing::info!(
        segments = panel.segment_count(),
        drift_v,
        "using simulated panel"
    );
    let pins = panel
        .segment_pins()
        .into_iter()
        .map(|p| Box::new(p) as Box<dyn SegmentPin + Send>)
        .collect();
    Ok((pins, Box::new(panel.counter_electrode())))
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn sim_drift() -> Result<f32> {
    match std::env::var(SIM_DRIFT_ENV) {
        Ok(raw) => raw
            .trim()
            .parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| eyre::eyre!("{SIM_DRIFT_ENV} must be a number of volts, got '{raw}'")),
        Err(_) => Ok(0.0),
    }
}

/// Assemble the engine for `cfg` on the compiled-in backend.
pub fn build_engine(cfg: &ecd_config::Config, token: CancelToken) -> Result<Ecd> {
    let (pins, electrode) = open_backend(cfg)?;
    EcdEngine::builder()
        .with_segments(pins)
        .with_counter_electrode(electrode)
        .with_config(EcdConfig::from(cfg))
        .with_supply_voltage(cfg.supply.voltage_v)
        .with_max_refresh_retries(cfg.refresh.max_retries)
        .with_settle_ms(cfg.electrode.settle_ms)
        .with_cancel_token(token)
        .build()
}

pub fn run_command(cmd: &Commands, cfg: &ecd_config::Config, token: CancelToken) -> Result<()> {
    match cmd {
        Commands::Thresholds { supply } => {
            let supply_v = supply.unwrap_or(cfg.supply.voltage_v);
            let ecd_cfg = EcdConfig::from(cfg);
            let t = Thresholds::calibrate(&ecd_cfg, supply_v);
            print_thresholds(supply_v, &t, ecd_cfg.supports_supply(supply_v));
            Ok(())
        }
        Commands::SelfCheck => self_check(cfg, token),
        Commands::Init => {
            let mut engine = build_engine(cfg, token)?;
            let report = engine.begin()?;
            finish("init", &engine, &report)
        }
        Commands::Clear => {
            let mut engine = build_engine(cfg, token)?;
            engine.set_all_segments_bleach();
            let report = engine.execute_display()?;
            finish("clear", &engine, &report)
        }
        Commands::Show { color } => {
            let mut engine = build_engine(cfg, token)?;
            let report = show(&mut engine, color)?;
            finish("show", &engine, &report)
        }
        Commands::Refresh {
            color,
            cycles,
            interval_ms,
        } => {
            let mut engine = build_engine(cfg, token.clone())?;
            let report = show(&mut engine, color)?;
            finish("show", &engine, &report)?;
            let interval = Duration::from_millis(*interval_ms);
            for cycle in 1..=*cycles {
                if !wait(&token, interval) {
                    return Err(Interrupted {
                        phase: Phase::Survey,
                    }
                    .into());
                }
                tracing::debug!(cycle, "maintenance pass");
                let report = engine.execute_display()?;
                finish("refresh", &engine, &report)?;
            }
            Ok(())
        }
    }
}

fn show(engine: &mut Ecd, color: &[usize]) -> Result<DisplayReport> {
    engine.set_all_segments_bleach();
    for &i in color {
        engine
            .set_segment_state(i, SegmentState::Color)
            .wrap_err_with(|| format!("select segment {i}"))?;
    }
    engine.execute_display()
}

/// Sleep for `total` unless a stop arrives first. Returns false on stop.
fn wait(token: &CancelToken, total: Duration) -> bool {
    let clock = MonotonicClock::new();
    let start = clock.now();
    loop {
        if token.is_stop_requested() {
            return false;
        }
        let elapsed = clock.now().saturating_duration_since(start);
        if elapsed >= total {
            return true;
        }
        clock.sleep(WAIT_SLICE.min(total - elapsed));
    }
}

fn self_check(cfg: &ecd_config::Config, token: CancelToken) -> Result<()> {
    let supply_v = cfg.supply.voltage_v;
    let ecd_cfg = EcdConfig::from(cfg);
    if !ecd_cfg.supports_supply(supply_v) {
        eyre::bail!(
            "color refresh window is inverted at {supply_v} V; raise supply.voltage_v or lower refresh.color_v"
        );
    }
    if let Some(preset) = cfg.preset.as_deref().and_then(DisplayPreset::from_name)
        && preset.segment_count() != cfg.pins.segments.len()
    {
        tracing::warn!(
            preset = preset.name(),
            expected = preset.segment_count(),
            declared = cfg.pins.segments.len(),
            "segment count differs from the preset layout"
        );
    }

    let mut engine = build_engine(cfg, token)?;
    let code = engine
        .drive_counter_electrode(supply_v / 2.0)
        .wrap_err("drive counter electrode")?;
    engine
        .release_counter_electrode()
        .wrap_err("release counter electrode")?;
    // Nothing is pending, so this is a bare survey of every segment.
    let report = engine.execute_display().wrap_err("survey segments")?;
    if let DisplayOutcome::Cancelled { phase } = report.outcome {
        return Err(Interrupted { phase }.into());
    }

    if json_mode() {
        println!(
            "{}",
            json!({
                "command": "self-check",
                "ok": true,
                "segments": engine.segment_count(),
                "supply_v": supply_v,
                "mid_code": code,
            })
        );
    } else {
        println!(
            "self-check ok: {} segments, supply {supply_v:.2} V, mid-supply code {code}",
            engine.segment_count()
        );
    }
    Ok(())
}

/// Print a drive report; a cancelled call becomes an [`Interrupted`] error.
fn finish(command: &str, engine: &Ecd, report: &DisplayReport) -> Result<()> {
    if json_mode() {
        println!("{}", report_json(command, engine, report));
    } else {
        print_report(command, engine, report);
    }
    for segment in report.abandoned() {
        tracing::warn!(segment, "segment did not reach its target and is marked degraded");
    }
    match report.outcome {
        DisplayOutcome::Completed => Ok(()),
        DisplayOutcome::Cancelled { phase } => Err(Interrupted { phase }.into()),
    }
}

fn state_name(state: Option<SegmentState>) -> &'static str {
    match state {
        Some(SegmentState::Color) => "color",
        Some(SegmentState::Bleach) => "bleach",
        Some(SegmentState::Undefined) | None => "undefined",
    }
}

fn refresh_json(r: Option<&RefreshOutcome>) -> serde_json::Value {
    r.map_or(serde_json::Value::Null, |r| {
        json!({
            "attempts": r.attempts,
            "converged": r.converged,
            "abandoned": r.abandoned,
            "cancelled": r.cancelled,
        })
    })
}

fn report_json(command: &str, engine: &Ecd, report: &DisplayReport) -> serde_json::Value {
    let outcome = match report.outcome {
        DisplayOutcome::Completed => json!("completed"),
        DisplayOutcome::Cancelled { phase } => json!({ "cancelled": phase_name(&phase) }),
    };
    let states: Vec<&str> = (0..engine.segment_count())
        .map(|i| state_name(engine.segment_state(i)))
        .collect();
    json!({
        "command": command,
        "outcome": outcome,
        "transitioned": report.transitioned,
        "color_refresh": refresh_json(report.color_refresh.as_ref()),
        "bleach_refresh": refresh_json(report.bleach_refresh.as_ref()),
        "segments": states,
    })
}

fn print_report(command: &str, engine: &Ecd, report: &DisplayReport) {
    if !report.transitioned.is_empty() {
        let list: Vec<String> = report.transitioned.iter().map(ToString::to_string).collect();
        println!("transitioned: {}", list.join(", "));
    }
    for r in [&report.color_refresh, &report.bleach_refresh]
        .into_iter()
        .flatten()
    {
        let dir = r.direction.as_str();
        if r.converged {
            println!("{dir} refresh: converged after {} pulses", r.attempts);
        } else if r.cancelled {
            println!("{dir} refresh: stopped after {} pulses", r.attempts);
        } else {
            println!(
                "{dir} refresh: gave up after {} pulses, degraded {:?}",
                r.attempts, r.abandoned
            );
        }
    }
    let states: Vec<&str> = (0..engine.segment_count())
        .map(|i| state_name(engine.segment_state(i)))
        .collect();
    println!("segments: [{}]", states.join(", "));
    if !report.outcome.is_cancelled() {
        println!("{command} complete");
    }
}

fn print_thresholds(supply_v: f32, t: &Thresholds, window_ok: bool) {
    if json_mode() {
        println!(
            "{}",
            json!({
                "command": "thresholds",
                "supply_v": supply_v,
                "color_limit_high": t.color_limit_high,
                "color_limit_low": t.color_limit_low,
                "color_half": t.color_half,
                "bleach_limit_high": t.bleach_limit_high,
                "bleach_limit_low": t.bleach_limit_low,
                "bleach_half_threshold": t.bleach_half_threshold(),
                "color_window_ordered": window_ok,
            })
        );
        return;
    }
    println!("supply:              {supply_v:.3} V");
    println!("color limit high:    {:.1}", t.color_limit_high);
    println!("color half:          {:.1}", t.color_half);
    println!("color limit low:     {:.1}", t.color_limit_low);
    println!("bleach limit high:   {:.1}", t.bleach_limit_high);
    println!("bleach half:         {}", t.bleach_half_threshold());
    println!("bleach limit low:    {:.1}", t.bleach_limit_low);
    if !window_ok {
        println!("warning: color refresh window is inverted at this supply");
    }
}
