//! Closed-loop refresh with a retry ceiling.
//!
//! A refresh re-drives the segments flagged by the latest survey until each
//! one reads past its direction's target limit or the ceiling is reached.
//! Segments still flagged at the ceiling are marked degraded and left for
//! the next execution; that is not an error.

use crate::engine::EcdEngine;
use crate::error::Result;
use crate::report::{Direction, RefreshOutcome};
use crate::segment::{Level, SegmentState};
use crate::util::code_to_volts;
use ecd_traits::{CounterElectrode, SegmentPin};

impl<P: SegmentPin, E: CounterElectrode> EcdEngine<P, E> {
    /// Counter electrode level for a Bleach refresh.
    ///
    /// Never below the configured refresh amplitude, and raised to the
    /// distance of the worst surveyed segment below mid-supply. Fixed for the
    /// whole cycle.
    pub fn bleach_refresh_amplitude(&self) -> f32 {
        let floor = self.config.refresh_bleach.voltage_v;
        match self.min_bleach_sample {
            Some(min) => floor.max(self.supply_v / 2.0 - code_to_volts(min, self.supply_v)),
            None => floor,
        }
    }

    fn converged(&self, dir: Direction, sample: u16) -> bool {
        let s = f32::from(sample);
        match dir {
            Direction::Color => s >= self.thresholds.color_limit_high,
            Direction::Bleach => s <= self.thresholds.bleach_limit_low,
        }
    }

    /// Refresh every flagged segment of one direction.
    pub(crate) fn refresh(&mut self, dir: Direction) -> Result<RefreshOutcome> {
        let mut outcome = RefreshOutcome {
            direction: dir,
            attempts: 0,
            converged: false,
            abandoned: Vec::new(),
            cancelled: false,
        };
        // The electrode must not move once a stop is pending.
        if self.cancel.is_stop_requested() {
            outcome.cancelled = true;
            return Ok(outcome);
        }

        let (ce_v, level, state, pulse) = match dir {
            Direction::Color => (
                self.supply_v - self.config.refresh_color.voltage_v,
                Level::High,
                SegmentState::Color,
                self.config.refresh_color.duration(),
            ),
            Direction::Bleach => (
                self.bleach_refresh_amplitude(),
                Level::Low,
                SegmentState::Bleach,
                self.config.refresh_bleach.duration(),
            ),
        };

        let mut pending: Vec<usize> = self
            .table
            .statuses()
            .enumerate()
            .filter(|(_, s)| s.current == state && s.needs_refresh)
            .map(|(i, _)| i)
            .collect();

        let code = self.ce.drive(ce_v, self.supply_v, self.clock.as_ref())?;
        tracing::debug!(
            direction = dir.as_str(),
            ce_code = code,
            flagged = pending.len(),
            "refresh started"
        );

        while !pending.is_empty() && outcome.attempts < self.max_retries {
            if self.cancel.is_stop_requested() {
                outcome.cancelled = true;
                return Ok(outcome);
            }

            let mut guard = self.table.drive();
            for &i in &pending {
                guard.drive(i, level)?;
            }
            self.clock.sleep(pulse);
            guard.release()?;
            outcome.attempts += 1;

            let mut still = Vec::with_capacity(pending.len());
            for i in pending {
                let sample = self.table.sample(i)?;
                tracing::trace!(
                    segment = i,
                    sample,
                    attempt = outcome.attempts,
                    "refresh sample"
                );
                if self.converged(dir, sample) {
                    let status = self.table.status_mut(i)?;
                    status.needs_refresh = false;
                    status.degraded = false;
                } else {
                    still.push(i);
                }
            }
            pending = still;
        }

        match dir {
            Direction::Color => self.refresh_color_needed = false,
            Direction::Bleach => self.refresh_bleach_needed = false,
        }

        outcome.converged = pending.is_empty();
        if outcome.converged {
            tracing::info!(
                direction = dir.as_str(),
                attempts = outcome.attempts,
                "refresh converged"
            );
        } else {
            for &i in &pending {
                self.table.status_mut(i)?.degraded = true;
            }
            tracing::warn!(
                direction = dir.as_str(),
                attempts = outcome.attempts,
                abandoned = ?pending,
                "refresh retry ceiling reached"
            );
        }
        outcome.abandoned = pending;
        Ok(outcome)
    }
}
