//! Maps `Box<dyn Error>` from trait boundaries to typed `EcdError`.
//!
//! The traits in `ecd_traits` use `Box<dyn Error + Send + Sync>` so any
//! backend can plug in; this module converts those to our typed error enum,
//! with an optional feature-gated path for `ecd_hardware::HwError` downcasting.

use crate::error::EcdError;

/// Map a trait-boundary error to a typed `EcdError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> EcdError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<ecd_hardware::error::HwError>() {
            return match hw {
                ecd_hardware::error::HwError::NotReleased { .. } => {
                    EcdError::Hardware(hw.to_string())
                }
                other => EcdError::HardwareFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("spi") || lower.contains("gpio") {
        EcdError::HardwareFault(s)
    } else {
        EcdError::Hardware(s)
    }
}

/// Wrap a boxed trait-boundary error into an `eyre::Report` with context.
pub(crate) fn hw_report(
    e: Box<dyn std::error::Error + Send + Sync>,
    context: impl std::fmt::Display + Send + Sync + 'static,
) -> eyre::Report {
    eyre::Report::new(map_hw_error(&*e)).wrap_err(context)
}
