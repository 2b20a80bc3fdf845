//! Simulated electrochromic panel.
//!
//! Each cell keeps a potential (working electrode minus counter electrode,
//! in volts). A drive call is one pulse: the potential moves `response` of
//! the way toward the rail-to-electrode difference. Every sample reports
//! `ce + potential` as a converter code and then lets the potential relax
//! toward zero by `drift_v`.

use crate::error::HwError;
use ecd_traits::{CounterElectrode, HwResult, MAX_CODE, SegmentPin};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drive {
    Released,
    High,
    Low,
}

#[derive(Debug, Clone, Copy)]
struct Cell {
    potential_v: f32,
    response: f32,
    drive: Drive,
    pulses: u32,
}

#[derive(Debug)]
struct PanelState {
    supply_v: f32,
    drift_v: f32,
    ce_code: Option<u16>,
    cells: Vec<Cell>,
}

impl PanelState {
    fn ce_volts(&self) -> f32 {
        // A floating electrode rests near mid-supply.
        let code = self.ce_code.unwrap_or(MAX_CODE / 2);
        f32::from(code) * self.supply_v / f32::from(MAX_CODE)
    }

    fn to_code(&self, volts: f32) -> u16 {
        let code = (volts * f32::from(MAX_CODE) / self.supply_v).round();
        if !code.is_finite() || code <= 0.0 {
            0
        } else if code >= f32::from(MAX_CODE) {
            MAX_CODE
        } else {
            code as u16
        }
    }
}

/// Shared model behind the simulated pins and electrode. Clones share state.
#[derive(Debug, Clone)]
pub struct SimulatedPanel {
    state: Arc<Mutex<PanelState>>,
}

impl SimulatedPanel {
    /// A panel of `segments` fresh cells that follow each pulse fully.
    pub fn new(segments: usize, supply_v: f32) -> Self {
        let cell = Cell {
            potential_v: 0.0,
            response: 1.0,
            drive: Drive::Released,
            pulses: 0,
        };
        Self {
            state: Arc::new(Mutex::new(PanelState {
                supply_v,
                drift_v: 0.0,
                ce_code: None,
                cells: vec![cell; segments],
            })),
        }
    }

    /// Relaxation toward zero applied after every sample, in volts.
    pub fn with_drift(self, drift_v: f32) -> Self {
        if let Ok(mut st) = self.state.lock() {
            st.drift_v = drift_v.max(0.0);
        }
        self
    }

    fn lock(&self) -> HwResult<MutexGuard<'_, PanelState>> {
        self.state
            .lock()
            .map_err(|_| std::io::Error::other("simulated panel poisoned").into())
    }

    pub fn segment_count(&self) -> usize {
        self.lock().map(|st| st.cells.len()).unwrap_or(0)
    }

    /// Fraction of the remaining distance covered per pulse (0 = dead cell).
    pub fn set_response(&self, segment: usize, response: f32) {
        if let Ok(mut st) = self.state.lock()
            && let Some(c) = st.cells.get_mut(segment)
        {
            c.response = response.clamp(0.0, 1.0);
        }
    }

    pub fn set_potential(&self, segment: usize, volts: f32) {
        if let Ok(mut st) = self.state.lock()
            && let Some(c) = st.cells.get_mut(segment)
        {
            c.potential_v = volts;
        }
    }

    pub fn potential(&self, segment: usize) -> Option<f32> {
        self.state
            .lock()
            .ok()
            .and_then(|st| st.cells.get(segment).map(|c| c.potential_v))
    }

    /// Pulses applied to one segment since construction.
    pub fn pulses(&self, segment: usize) -> u32 {
        self.state
            .lock()
            .ok()
            .and_then(|st| st.cells.get(segment).map(|c| c.pulses))
            .unwrap_or(0)
    }

    /// Code currently output on the counter electrode, `None` while floating.
    pub fn counter_electrode_code(&self) -> Option<u16> {
        self.state.lock().ok().and_then(|st| st.ce_code)
    }

    /// Whether any working electrode is currently driven.
    pub fn any_driven(&self) -> bool {
        self.state
            .lock()
            .map(|st| st.cells.iter().any(|c| c.drive != Drive::Released))
            .unwrap_or(false)
    }

    /// One pin handle per segment, in index order.
    pub fn segment_pins(&self) -> Vec<SimSegmentPin> {
        (0..self.segment_count())
            .map(|index| SimSegmentPin {
                panel: self.clone(),
                index,
            })
            .collect()
    }

    pub fn counter_electrode(&self) -> SimElectrode {
        SimElectrode {
            panel: self.clone(),
        }
    }
}

/// Working electrode of one simulated cell.
#[derive(Debug, Clone)]
pub struct SimSegmentPin {
    panel: SimulatedPanel,
    index: usize,
}

impl SimSegmentPin {
    fn pulse(&mut self, drive: Drive) -> HwResult<()> {
        let mut st = self.panel.lock()?;
        let supply = st.supply_v;
        let ce = st.ce_volts();
        let cell = st
            .cells
            .get_mut(self.index)
            .ok_or_else(|| std::io::Error::other("segment out of range"))?;
        let rail = if drive == Drive::High { supply } else { 0.0 };
        let target = rail - ce;
        cell.potential_v += cell.response * (target - cell.potential_v);
        cell.drive = drive;
        cell.pulses += 1;
        tracing::trace!(
            segment = self.index,
            potential = cell.potential_v,
            "sim pulse"
        );
        Ok(())
    }
}

impl SegmentPin for SimSegmentPin {
    fn drive_high(&mut self) -> HwResult<()> {
        self.pulse(Drive::High)
    }

    fn drive_low(&mut self) -> HwResult<()> {
        self.pulse(Drive::Low)
    }

    fn release(&mut self) -> HwResult<()> {
        let mut st = self.panel.lock()?;
        if let Some(c) = st.cells.get_mut(self.index) {
            c.drive = Drive::Released;
        }
        Ok(())
    }

    fn sample(&mut self) -> HwResult<u16> {
        let mut st = self.panel.lock()?;
        let ce = st.ce_volts();
        let drift = st.drift_v;
        let potential = match st.cells.get(self.index) {
            Some(c) if c.drive != Drive::Released => {
                return Err(Box::new(HwError::NotReleased {
                    segment: self.index,
                }));
            }
            Some(c) => c.potential_v,
            None => return Err(std::io::Error::other("segment out of range").into()),
        };
        let code = st.to_code(ce + potential);
        if let Some(c) = st.cells.get_mut(self.index) {
            c.potential_v -= c.potential_v.signum() * drift.min(c.potential_v.abs());
        }
        Ok(code)
    }
}

/// Counter electrode of the simulated panel.
#[derive(Debug, Clone)]
pub struct SimElectrode {
    panel: SimulatedPanel,
}

impl CounterElectrode for SimElectrode {
    fn write_code(&mut self, code: u16) -> HwResult<()> {
        if code > MAX_CODE {
            return Err(Box::new(HwError::CodeOutOfRange(code)));
        }
        self.panel.lock()?.ce_code = Some(code);
        Ok(())
    }

    fn release(&mut self) -> HwResult<()> {
        self.panel.lock()?.ce_code = None;
        Ok(())
    }
}
