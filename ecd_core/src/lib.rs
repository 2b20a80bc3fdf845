#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Electrochromic display drive and refresh engine (hardware-agnostic).
//!
//! All hardware interactions go through `ecd_traits::SegmentPin` and
//! `ecd_traits::CounterElectrode`; every wait goes through an injected
//! `ecd_traits::Clock`.
//!
//! ## Pipeline
//!
//! One call to [`EcdEngine::execute_display`] runs:
//!
//! 1. **Bleach phase**: segments requested Bleach are pulled low against the
//!    counter electrode at the Bleach voltage.
//! 2. **Color phase**: segments requested Color are pushed high against
//!    `Vsupply - color_v`.
//! 3. **OCP survey**: every segment is sampled at mid-supply and classified
//!    ([`RefreshClass`]).
//! 4. **Refresh**: flagged segments are re-driven until they reach their
//!    target or the retry ceiling is hit.
//! 5. The counter electrode is released.
//!
//! A [`CancelToken`] is polled before each hardware-changing step.
//!
//! ## Units
//!
//! Voltages are `f32` volts. Samples, limits and electrode outputs are raw
//! 10-bit converter codes referenced to the supply rail ([`util::MAX_CODE`]).

pub mod builder;
pub mod cancel;
pub mod config;
pub mod conversions;
pub mod electrode;
pub mod engine;
pub mod error;
pub mod hw_error;
pub mod mocks;
pub mod ocp;
pub mod refresh;
pub mod report;
pub mod segment;
pub mod thresholds;
pub mod transition;
pub mod util;

pub use builder::{EcdBuilder, Missing, Set};
pub use cancel::CancelToken;
pub use config::{
    CE_SETTLE_MS, DEFAULT_SUPPLY_VOLTAGE, DisplayPreset, EcdConfig, MAX_REFRESH_RETRIES,
    MAX_SEGMENTS, PulseCfg, ThresholdOffsets,
};
pub use engine::{Ecd, EcdEngine};
pub use error::{BuildError, EcdError, Report, Result};
pub use ocp::{RefreshClass, classify_bleach, classify_color};
pub use report::{Direction, DisplayOutcome, DisplayReport, Phase, RefreshOutcome};
pub use segment::{Level, SegmentState, SegmentStatus};
pub use thresholds::Thresholds;
