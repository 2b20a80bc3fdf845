//! Type-state builder for [`EcdEngine`].
//!
//! `build()` is only available once both the segment pins and the counter
//! electrode are set; `try_build()` works in any state and reports what is
//! missing.

use crate::cancel::CancelToken;
use crate::config::{
    CE_SETTLE_MS, DEFAULT_SUPPLY_VOLTAGE, EcdConfig, MAX_REFRESH_RETRIES, MAX_SEGMENTS,
};
use crate::engine::EcdEngine;
use crate::error::{BuildError, Result};
use ecd_traits::clock::{Clock, MonotonicClock};
use ecd_traits::{CounterElectrode, SegmentPin};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

// Type-state markers for the builder
pub struct Missing;
pub struct Set;

pub struct EcdBuilder<P, E, S, C> {
    segments: Option<Vec<P>>,
    electrode: Option<E>,
    config: Option<EcdConfig>,
    supply_v: Option<f32>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    cancel: Option<CancelToken>,
    max_retries: Option<u32>,
    settle_ms: Option<u64>,
    _s: PhantomData<S>,
    _c: PhantomData<C>,
}

impl<P, E> Default for EcdBuilder<P, E, Missing, Missing> {
    fn default() -> Self {
        Self {
            segments: None,
            electrode: None,
            config: None,
            supply_v: None,
            clock: None,
            cancel: None,
            max_retries: None,
            settle_ms: None,
            _s: PhantomData,
            _c: PhantomData,
        }
    }
}

impl<P: SegmentPin, E: CounterElectrode, S, C> EcdBuilder<P, E, S, C> {
    /// Fallible build available in any type-state.
    pub fn try_build(self) -> Result<EcdEngine<P, E>> {
        let EcdBuilder {
            segments,
            electrode,
            config,
            supply_v,
            clock,
            cancel,
            max_retries,
            settle_ms,
            _s: _,
            _c: _,
        } = self;

        let segments = segments.ok_or_else(|| eyre::Report::new(BuildError::MissingSegments))?;
        let electrode =
            electrode.ok_or_else(|| eyre::Report::new(BuildError::MissingCounterElectrode))?;

        if segments.is_empty() {
            return Err(eyre::Report::new(BuildError::NoSegments));
        }
        if segments.len() > MAX_SEGMENTS {
            return Err(eyre::Report::new(BuildError::TooManySegments {
                count: segments.len(),
                max: MAX_SEGMENTS,
            }));
        }

        let max_retries = max_retries.unwrap_or(MAX_REFRESH_RETRIES);
        if max_retries == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "max refresh retries must be >= 1",
            )));
        }

        let clock: Arc<dyn Clock + Send + Sync> = match clock {
            Some(b) => Arc::from(b),
            None => Arc::new(MonotonicClock::new()),
        };

        let engine = EcdEngine::from_parts(
            segments,
            electrode,
            config.unwrap_or_default(),
            supply_v.unwrap_or(DEFAULT_SUPPLY_VOLTAGE),
            clock,
            cancel.unwrap_or_default(),
            max_retries,
            Duration::from_millis(settle_ms.unwrap_or(CE_SETTLE_MS)),
        );
        tracing::debug!(
            segments = engine.segment_count(),
            supply_v = engine.supply_voltage(),
            max_retries,
            "engine built"
        );
        Ok(engine)
    }
}

impl<P, E, S, C> EcdBuilder<P, E, S, C> {
    pub fn with_config(mut self, config: EcdConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Supply voltage thresholds are calibrated against until the caller
    /// reports a measured one.
    pub fn with_supply_voltage(mut self, supply_v: f32) -> Self {
        self.supply_v = Some(supply_v);
        self
    }

    /// Provide a custom clock implementation; defaults to MonotonicClock when not provided.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Share a stop flag with other engines or a signal handler.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_max_refresh_retries(mut self, n: u32) -> Self {
        self.max_retries = Some(n);
        self
    }

    /// Counter electrode settling wait after each output change.
    pub fn with_settle_ms(mut self, ms: u64) -> Self {
        self.settle_ms = Some(ms);
        self
    }
}

// Setters that advance type-state when providing mandatory components
impl<P, E, C> EcdBuilder<P, E, Missing, C> {
    /// Working electrode pins, in segment index order.
    pub fn with_segments(self, pins: impl IntoIterator<Item = P>) -> EcdBuilder<P, E, Set, C> {
        EcdBuilder {
            segments: Some(pins.into_iter().collect()),
            electrode: self.electrode,
            config: self.config,
            supply_v: self.supply_v,
            clock: self.clock,
            cancel: self.cancel,
            max_retries: self.max_retries,
            settle_ms: self.settle_ms,
            _s: PhantomData,
            _c: PhantomData,
        }
    }
}

impl<P, E, S> EcdBuilder<P, E, S, Missing> {
    pub fn with_counter_electrode(self, electrode: E) -> EcdBuilder<P, E, S, Set> {
        EcdBuilder {
            segments: self.segments,
            electrode: Some(electrode),
            config: self.config,
            supply_v: self.supply_v,
            clock: self.clock,
            cancel: self.cancel,
            max_retries: self.max_retries,
            settle_ms: self.settle_ms,
            _s: PhantomData,
            _c: PhantomData,
        }
    }
}

impl<P: SegmentPin, E: CounterElectrode> EcdBuilder<P, E, Set, Set> {
    /// Validate and build. Only available when pins and electrode are set.
    pub fn build(self) -> Result<EcdEngine<P, E>> {
        self.try_build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{ScriptedPin, SpyElectrode};

    type B = EcdBuilder<ScriptedPin, SpyElectrode, Missing, Missing>;

    #[test]
    fn try_build_reports_missing_pins() {
        let err = B::default()
            .with_counter_electrode(SpyElectrode::new())
            .try_build()
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<BuildError>(),
            Some(&BuildError::MissingSegments)
        );
    }

    #[test]
    fn try_build_reports_missing_electrode() {
        let err = B::default()
            .with_segments([ScriptedPin::new(0)])
            .try_build()
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<BuildError>(),
            Some(&BuildError::MissingCounterElectrode)
        );
    }

    #[test]
    fn defaults_are_applied() {
        let e = B::default()
            .with_segments([ScriptedPin::new(0)])
            .with_counter_electrode(SpyElectrode::new())
            .build()
            .unwrap();
        assert_eq!(e.max_refresh_retries(), MAX_REFRESH_RETRIES);
        assert_eq!(e.supply_voltage(), DEFAULT_SUPPLY_VOLTAGE);
        assert_eq!(e.config(), &EcdConfig::default());
    }
}
