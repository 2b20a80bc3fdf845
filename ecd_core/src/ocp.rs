//! Open-circuit potential survey and refresh classification.

use crate::engine::EcdEngine;
use crate::error::Result;
use crate::segment::SegmentState;
use crate::thresholds::Thresholds;
use ecd_traits::{CounterElectrode, SegmentPin};

/// How urgently a segment needs re-driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshClass {
    /// Comfortably inside its target band.
    Healthy,
    /// Drifting; joins a refresh batch but does not trigger one.
    Marginal,
    /// Out of band; triggers a refresh of its direction.
    Urgent,
}

impl RefreshClass {
    #[inline]
    pub fn needs_refresh(self) -> bool {
        self != RefreshClass::Healthy
    }
}

/// Classify a Color segment sampled at mid-supply.
pub fn classify_color(sample: u16, t: &Thresholds) -> RefreshClass {
    let s = f32::from(sample);
    if s > t.color_half {
        RefreshClass::Healthy
    } else if s >= t.color_limit_low {
        RefreshClass::Marginal
    } else {
        RefreshClass::Urgent
    }
}

/// Classify a Bleach segment sampled at mid-supply.
pub fn classify_bleach(sample: u16, t: &Thresholds) -> RefreshClass {
    if f32::from(sample) > t.bleach_limit_high {
        RefreshClass::Urgent
    } else if i32::from(sample) >= t.bleach_half_threshold() {
        RefreshClass::Marginal
    } else {
        RefreshClass::Healthy
    }
}

impl<P: SegmentPin, E: CounterElectrode> EcdEngine<P, E> {
    /// Sample every segment with the counter electrode at mid-supply and
    /// rebuild refresh flags from scratch.
    pub(crate) fn survey(&mut self) -> Result<()> {
        let mid = self.supply_v / 2.0;
        self.ce.drive(mid, self.supply_v, self.clock.as_ref())?;

        self.refresh_color_needed = false;
        self.refresh_bleach_needed = false;
        self.min_bleach_sample = None;

        for i in 0..self.table.len() {
            let sample = self.table.sample(i)?;
            let state = self.table.status(i).map(|s| s.current);
            let class = match state {
                Some(SegmentState::Color) => {
                    let class = classify_color(sample, &self.thresholds);
                    if class == RefreshClass::Urgent {
                        self.refresh_color_needed = true;
                    }
                    Some(class)
                }
                Some(SegmentState::Bleach) => {
                    self.min_bleach_sample =
                        Some(self.min_bleach_sample.map_or(sample, |m| m.min(sample)));
                    let class = classify_bleach(sample, &self.thresholds);
                    if class == RefreshClass::Urgent {
                        self.refresh_bleach_needed = true;
                    }
                    Some(class)
                }
                Some(SegmentState::Undefined) | None => None,
            };
            self.table.status_mut(i)?.needs_refresh = class.is_some_and(RefreshClass::needs_refresh);
            tracing::trace!(segment = i, sample, ?state, ?class, "ocp sample");
        }

        self.table.release_all()?;
        tracing::debug!(
            refresh_color = self.refresh_color_needed,
            refresh_bleach = self.refresh_bleach_needed,
            min_bleach = ?self.min_bleach_sample,
            "ocp survey complete"
        );
        Ok(())
    }
}
