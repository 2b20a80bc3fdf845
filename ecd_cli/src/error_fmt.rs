//! Human-readable error descriptions and structured JSON error formatting.

use crate::run::{Interrupted, phase_name};
use ecd_core::error::{BuildError, EcdError};

/// Exit code for a run that stopped on request.
pub const EXIT_INTERRUPTED: i32 = 3;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(i) = err.downcast_ref::<Interrupted>() {
        return format!(
            "What happened: Stopped on request before the {}.\nLikely causes: Ctrl-C or another stop request.\nHow to fix: Re-run the command; segments already driven keep their state.",
            phase_name(&i.phase)
        );
    }

    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingSegments | BuildError::NoSegments => {
                "What happened: No segment pins were provided to the display engine.\nLikely causes: pins.segments is empty or the backend opened no pins.\nHow to fix: List the working electrode GPIOs in [pins] segments.".to_string()
            }
            BuildError::MissingCounterElectrode => {
                "What happened: No counter electrode was provided to the display engine.\nLikely causes: The DAC failed to initialize or was not wired into the builder.\nHow to fix: Check pins.counter_electrode and the SPI wiring.".to_string()
            }
            BuildError::TooManySegments { count, max } => format!(
                "What happened: The config declares {count} segments but at most {max} are supported.\nLikely causes: Extra entries in pins.segments.\nHow to fix: Trim pins.segments to {max} entries or fewer."
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(de) = err.downcast_ref::<EcdError>() {
        return match de {
            EcdError::SegmentIndex { count, .. } => format!(
                "What happened: {de}.\nLikely causes: --color names a segment the config does not declare.\nHow to fix: Use indices 0..{count}."
            ),
            EcdError::HardwareFault(_) => format!(
                "What happened: {de}.\nLikely causes: SPI or GPIO wiring, missing permissions, or the converters are unpowered.\nHow to fix: Check [pins] in the config and the ADC/DAC wiring, then run `ecd self-check`."
            ),
            _ => format!(
                "What happened: {err:#}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("read config") {
        return format!(
            "What happened: The config file could not be read.\nLikely causes: Wrong --config path or missing permissions.\nHow to fix: Pass an existing file with --config. Original: {msg}"
        );
    }

    if lower.contains("parse config") {
        return format!(
            "What happened: The config file is not valid TOML for this tool.\nLikely causes: A typo, a missing [pins] table, or a value of the wrong type.\nHow to fix: Compare the file with etc/ecd_config.toml. Original: {msg}"
        );
    }

    if lower.contains("invalid configuration") {
        let cause = err.root_cause();
        return format!(
            "What happened: Configuration is invalid ({cause}).\nLikely causes: Out-of-range or inconsistent values in the TOML.\nHow to fix: Edit the config file and try again."
        );
    }

    if lower.contains("window is inverted") {
        return format!(
            "What happened: {msg}.\nLikely causes: The supply is too low for the configured Color refresh voltage.\nHow to fix: Run `ecd thresholds` to inspect the limits and adjust the config."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stopped runs exit with [`EXIT_INTERRUPTED`]; everything else with 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<Interrupted>().is_some() {
        return EXIT_INTERRUPTED;
    }
    1
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<Interrupted>().is_some() {
        return "Interrupted";
    }
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    match err.downcast_ref::<EcdError>() {
        Some(EcdError::SegmentIndex { .. }) => "SegmentIndex",
        Some(EcdError::UndefinedTarget { .. }) => "UndefinedTarget",
        Some(EcdError::HardwareFault(_)) => "HardwareFault",
        Some(EcdError::Hardware(_)) => "Hardware",
        Some(EcdError::Config(_)) => "Config",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let reason = reason_name(err);
    let msg = humanize(err);
    let details = match (
        err.downcast_ref::<Interrupted>(),
        err.downcast_ref::<EcdError>(),
    ) {
        (Some(i), _) => Some(json!({ "phase": phase_name(&i.phase) })),
        (None, Some(EcdError::SegmentIndex { index, count })) => {
            Some(json!({ "index": index, "count": count }))
        }
        _ => None,
    };

    let obj = if let Some(d) = details {
        json!({ "reason": reason, "details": d, "message": msg })
    } else {
        json!({ "reason": reason, "message": msg })
    };
    obj.to_string()
}
