//! Transition phases: move segments whose requested state differs from
//! their current one.

use crate::engine::EcdEngine;
use crate::error::Result;
use crate::report::Direction;
use crate::segment::{Level, SegmentState};
use ecd_traits::{CounterElectrode, SegmentPin};

impl<P: SegmentPin, E: CounterElectrode> EcdEngine<P, E> {
    /// One transition phase. The caller has already polled for a stop.
    ///
    /// Indices of segments moved are appended to `transitioned`.
    pub(crate) fn run_transition(
        &mut self,
        dir: Direction,
        transitioned: &mut Vec<usize>,
    ) -> Result<()> {
        let (pulse, ce_v, level, target) = match dir {
            Direction::Bleach => (
                self.config.bleach,
                self.config.bleach.voltage_v,
                Level::Low,
                SegmentState::Bleach,
            ),
            Direction::Color => (
                self.config.color,
                self.supply_v - self.config.color.voltage_v,
                Level::High,
                SegmentState::Color,
            ),
        };

        let code = self.ce.drive(ce_v, self.supply_v, self.clock.as_ref())?;
        tracing::debug!(direction = dir.as_str(), ce_code = code, "transition phase");

        let mut guard = self.table.drive();
        for i in 0..guard.len() {
            let wants = guard
                .status(i)
                .is_some_and(|s| s.next != s.current && s.next == target);
            if !wants {
                continue;
            }
            guard.drive(i, level)?;
            let status = guard.status_mut(i)?;
            status.current = status.next;
            status.degraded = false;
            transitioned.push(i);
            tracing::trace!(segment = i, direction = dir.as_str(), "segment driven");
        }
        self.clock.sleep(pulse.duration());
        guard.release()?;

        match dir {
            Direction::Bleach => self.bleach_required = false,
            Direction::Color => self.color_required = false,
        }
        Ok(())
    }
}
