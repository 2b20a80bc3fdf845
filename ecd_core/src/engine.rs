//! The display engine: command surface and per-call pipeline.

use crate::builder::{EcdBuilder, Missing};
use crate::cancel::CancelToken;
use crate::config::EcdConfig;
use crate::electrode::CounterElectrodeController;
use crate::error::{EcdError, Result};
use crate::report::{Direction, DisplayOutcome, DisplayReport, Phase};
use crate::segment::{Level, SegmentState, SegmentStatus, SegmentTable};
use crate::thresholds::Thresholds;
use ecd_traits::{Clock, CounterElectrode, SegmentPin};
use std::sync::Arc;
use std::time::Duration;

/// Drive and refresh engine for one physical display.
///
/// Owns its pins and counter electrode exclusively. Every operation is
/// blocking and must be called from one thread of control; cross-context
/// coordination goes through the [`CancelToken`] only.
pub struct EcdEngine<P, E> {
    pub(crate) table: SegmentTable<P>,
    pub(crate) ce: CounterElectrodeController<E>,
    pub(crate) config: EcdConfig,
    pub(crate) thresholds: Thresholds,
    pub(crate) supply_v: f32,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) cancel: CancelToken,
    pub(crate) max_retries: u32,
    pub(crate) color_required: bool,
    pub(crate) bleach_required: bool,
    pub(crate) refresh_color_needed: bool,
    pub(crate) refresh_bleach_needed: bool,
    pub(crate) min_bleach_sample: Option<u16>,
}

/// Engine over boxed backends, for callers choosing hardware at runtime.
pub type Ecd = EcdEngine<Box<dyn SegmentPin + Send>, Box<dyn CounterElectrode + Send>>;

impl<P, E> core::fmt::Debug for EcdEngine<P, E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EcdEngine")
            .field("segments", &self.table)
            .field("supply_v", &self.supply_v)
            .field("color_required", &self.color_required)
            .field("bleach_required", &self.bleach_required)
            .field("stop_requested", &self.cancel.is_stop_requested())
            .finish()
    }
}

impl<P: SegmentPin, E: CounterElectrode> EcdEngine<P, E> {
    /// Start building an engine.
    pub fn builder() -> EcdBuilder<P, E, Missing, Missing> {
        EcdBuilder::default()
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        pins: Vec<P>,
        electrode: E,
        config: EcdConfig,
        supply_v: f32,
        clock: Arc<dyn Clock + Send + Sync>,
        cancel: CancelToken,
        max_retries: u32,
        settle: Duration,
    ) -> Self {
        Self {
            table: SegmentTable::new(pins),
            ce: CounterElectrodeController::new(electrode, settle),
            thresholds: Thresholds::calibrate(&config, supply_v),
            config,
            supply_v,
            clock,
            cancel,
            max_retries,
            color_required: false,
            bleach_required: false,
            refresh_color_needed: false,
            refresh_bleach_needed: false,
            min_bleach_sample: None,
        }
    }

    // ── configuration ────────────────────────────────────────────────────

    /// Replace the configuration and recalibrate thresholds.
    pub fn set_configuration(&mut self, config: EcdConfig) {
        self.config = config;
        self.recalibrate();
    }

    /// Record a newly measured supply voltage and recalibrate thresholds.
    pub fn set_supply_voltage(&mut self, supply_v: f32) {
        self.supply_v = supply_v;
        self.recalibrate();
    }

    fn recalibrate(&mut self) {
        self.thresholds = Thresholds::calibrate(&self.config, self.supply_v);
        tracing::debug!(
            supply_v = self.supply_v,
            color_high = self.thresholds.color_limit_high,
            color_low = self.thresholds.color_limit_low,
            bleach_high = self.thresholds.bleach_limit_high,
            bleach_low = self.thresholds.bleach_limit_low,
            "thresholds recalibrated"
        );
    }

    // ── segment requests ─────────────────────────────────────────────────

    /// Request `state` for segment `index` at the next execution.
    ///
    /// A request matching the current state is ignored. `Undefined` is not a
    /// drive target and is rejected.
    pub fn set_segment_state(&mut self, index: usize, state: SegmentState) -> Result<()> {
        let status = self.table.status_mut(index)?;
        if state == SegmentState::Undefined {
            return Err(EcdError::UndefinedTarget { index }.into());
        }
        if status.current == state {
            return Ok(());
        }
        status.next = state;
        if state == SegmentState::Color {
            self.color_required = true;
        } else {
            self.bleach_required = true;
        }
        Ok(())
    }

    /// Request Bleach for every segment.
    pub fn set_all_segments_bleach(&mut self) {
        self.set_all(SegmentState::Bleach);
    }

    /// Request Color for every segment.
    pub fn set_all_segments_color(&mut self) {
        self.set_all(SegmentState::Color);
    }

    fn set_all(&mut self, state: SegmentState) {
        for i in 0..self.table.len() {
            // Index is in range by construction.
            let _ = self.set_segment_state(i, state);
        }
    }

    // ── execution ────────────────────────────────────────────────────────

    /// Apply pending transitions, survey every segment and refresh the ones
    /// that drifted.
    ///
    /// Only hardware faults are errors. Cancellation and convergence failure
    /// are reported in the returned [`DisplayReport`].
    pub fn execute_display(&mut self) -> Result<DisplayReport> {
        let mut report = DisplayReport::default();
        match self.run_pipeline(&mut report) {
            Ok(()) => Ok(report),
            Err(e) => {
                if let Err(re) = self.ce.release() {
                    tracing::warn!(error = %re, "counter electrode release failed after error");
                }
                Err(e)
            }
        }
    }

    fn run_pipeline(&mut self, report: &mut DisplayReport) -> Result<()> {
        for dir in [Direction::Bleach, Direction::Color] {
            if !self.transition_required(dir) {
                continue;
            }
            if self.cancel.is_stop_requested() {
                return self.stop(report, Phase::Transition(dir));
            }
            self.run_transition(dir, &mut report.transitioned)?;
        }

        if self.cancel.is_stop_requested() {
            // Escalations from an earlier survey no longer apply.
            self.refresh_color_needed = false;
            self.refresh_bleach_needed = false;
            return self.stop(report, Phase::Survey);
        }
        self.survey()?;

        for dir in [Direction::Color, Direction::Bleach] {
            if !self.refresh_needed(dir) {
                continue;
            }
            let outcome = self.refresh(dir)?;
            let cancelled = outcome.cancelled;
            match dir {
                Direction::Color => report.color_refresh = Some(outcome),
                Direction::Bleach => report.bleach_refresh = Some(outcome),
            }
            if cancelled {
                return self.stop(report, Phase::Refresh(dir));
            }
        }

        self.ce.release()?;
        report.outcome = DisplayOutcome::Completed;
        tracing::debug!(
            transitioned = report.transitioned.len(),
            "display execution complete"
        );
        Ok(())
    }

    fn stop(&mut self, report: &mut DisplayReport, phase: Phase) -> Result<()> {
        tracing::info!(?phase, "stop requested; display execution cancelled");
        report.outcome = DisplayOutcome::Cancelled { phase };
        if let Err(e) = self.ce.release() {
            tracing::warn!(error = %e, "counter electrode release failed on cancel");
        }
        Ok(())
    }

    pub(crate) fn transition_required(&self, dir: Direction) -> bool {
        match dir {
            Direction::Color => self.color_required,
            Direction::Bleach => self.bleach_required,
        }
    }

    pub(crate) fn refresh_needed(&self, dir: Direction) -> bool {
        match dir {
            Direction::Color => self.refresh_color_needed,
            Direction::Bleach => self.refresh_bleach_needed,
        }
    }

    /// Stabilise fresh hardware: Color every segment, then Bleach every
    /// segment. Returns the report of the last pass that ran.
    pub fn begin(&mut self) -> Result<DisplayReport> {
        self.set_all_segments_color();
        let first = self.execute_display()?;
        if first.outcome.is_cancelled() {
            return Ok(first);
        }
        self.set_all_segments_bleach();
        self.execute_display()
    }

    /// Clear any pending stop and bleach the whole display.
    pub fn cancel_and_bleach(&mut self) -> Result<DisplayReport> {
        self.cancel.clear();
        self.set_all_segments_bleach();
        self.execute_display()
    }

    /// Drive every pin to `level` for `hold` with the counter electrode at
    /// the matching refresh level. Logical state is left untouched.
    pub fn direct_drive_all(&mut self, level: Level, hold: Duration) -> Result<DisplayOutcome> {
        if self.cancel.is_stop_requested() {
            return Ok(DisplayOutcome::Cancelled {
                phase: Phase::DirectDrive,
            });
        }
        let ce_v = match level {
            Level::High => self.supply_v - self.config.refresh_color.voltage_v,
            Level::Low => self.config.refresh_bleach.voltage_v,
        };
        self.ce.drive(ce_v, self.supply_v, self.clock.as_ref())?;
        let mut guard = self.table.drive();
        for i in 0..guard.len() {
            guard.drive(i, level)?;
        }
        self.clock.sleep(hold);
        guard.release()?;
        self.ce.release()?;
        Ok(DisplayOutcome::Completed)
    }

    // ── counter electrode (low level) ────────────────────────────────────

    /// Drive the counter electrode to `voltage` and wait for it to settle.
    pub fn drive_counter_electrode(&mut self, voltage: f32) -> Result<u16> {
        self.ce.drive(voltage, self.supply_v, self.clock.as_ref())
    }

    pub fn release_counter_electrode(&mut self) -> Result<()> {
        self.ce.release()
    }

    // ── cancellation ─────────────────────────────────────────────────────

    pub fn request_stop(&self) {
        self.cancel.request_stop();
    }

    pub fn clear_stop(&self) {
        self.cancel.clear();
    }

    /// A handle on this engine's stop flag, for signal handlers.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    // ── accessors ────────────────────────────────────────────────────────

    pub fn segment_count(&self) -> usize {
        self.table.len()
    }

    pub fn segment_state(&self, index: usize) -> Option<SegmentState> {
        self.table.status(index).map(|s| s.current)
    }

    pub fn segment_status(&self, index: usize) -> Result<SegmentStatus> {
        self.table.status(index).copied().ok_or_else(|| {
            eyre::Report::new(EcdError::SegmentIndex {
                index,
                count: self.table.len(),
            })
        })
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn config(&self) -> &EcdConfig {
        &self.config
    }

    pub fn supply_voltage(&self) -> f32 {
        self.supply_v
    }

    pub fn color_required(&self) -> bool {
        self.color_required
    }

    pub fn bleach_required(&self) -> bool {
        self.bleach_required
    }

    pub fn refresh_color_needed(&self) -> bool {
        self.refresh_color_needed
    }

    pub fn refresh_bleach_needed(&self) -> bool {
        self.refresh_bleach_needed
    }

    /// Lowest Bleach sample seen by the latest survey, if any Bleach segment
    /// was sampled.
    pub fn min_bleach_sample(&self) -> Option<u16> {
        self.min_bleach_sample
    }

    pub fn max_refresh_retries(&self) -> u32 {
        self.max_retries
    }

    /// Counter electrode code currently output, `None` while floating.
    pub fn counter_electrode_code(&self) -> Option<u16> {
        self.ce.driven_code()
    }
}
