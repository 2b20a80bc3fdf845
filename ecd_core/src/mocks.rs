//! Test and helper mocks for ecd_core.
//!
//! Both mocks share their state through `Arc<Mutex<..>>`, so a test keeps a
//! clone as a probe while the engine owns the other handle.

use ecd_traits::{CounterElectrode, HwResult, SegmentPin};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Observable pin activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinEvent {
    High,
    Low,
    Release,
    Sample(u16),
}

#[derive(Debug, Default)]
struct PinState {
    script: VecDeque<u16>,
    fallback: u16,
    events: Vec<PinEvent>,
    fail_release: bool,
    fail_sample: bool,
}

/// Segment pin that replays scripted samples, then repeats a fallback value.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPin {
    state: Arc<Mutex<PinState>>,
}

impl ScriptedPin {
    pub fn new(fallback: u16) -> Self {
        let pin = Self::default();
        pin.set_fallback(fallback);
        pin
    }

    /// Samples returned in order before the fallback kicks in.
    pub fn with_samples(self, samples: impl IntoIterator<Item = u16>) -> Self {
        if let Ok(mut st) = self.state.lock() {
            st.script.extend(samples);
        }
        self
    }

    pub fn push_sample(&self, sample: u16) {
        if let Ok(mut st) = self.state.lock() {
            st.script.push_back(sample);
        }
    }

    pub fn set_fallback(&self, sample: u16) {
        if let Ok(mut st) = self.state.lock() {
            st.fallback = sample;
        }
    }

    pub fn fail_release(&self, fail: bool) {
        if let Ok(mut st) = self.state.lock() {
            st.fail_release = fail;
        }
    }

    pub fn fail_sample(&self, fail: bool) {
        if let Ok(mut st) = self.state.lock() {
            st.fail_sample = fail;
        }
    }

    pub fn events(&self) -> Vec<PinEvent> {
        self.state
            .lock()
            .map(|st| st.events.clone())
            .unwrap_or_default()
    }

    /// Number of times the pin was driven to either rail.
    pub fn drive_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, PinEvent::High | PinEvent::Low))
            .count()
    }

    pub fn count(&self, event: PinEvent) -> usize {
        self.events().iter().filter(|e| **e == event).count()
    }

    pub fn clear_events(&self) {
        if let Ok(mut st) = self.state.lock() {
            st.events.clear();
        }
    }

    fn record(&self, event: PinEvent) -> HwResult<()> {
        let mut st = self
            .state
            .lock()
            .map_err(|_| std::io::Error::other("scripted pin poisoned"))?;
        if event == PinEvent::Release && st.fail_release {
            return Err(Box::new(std::io::Error::other("release refused")));
        }
        st.events.push(event);
        Ok(())
    }
}

impl SegmentPin for ScriptedPin {
    fn drive_high(&mut self) -> HwResult<()> {
        self.record(PinEvent::High)
    }

    fn drive_low(&mut self) -> HwResult<()> {
        self.record(PinEvent::Low)
    }

    fn release(&mut self) -> HwResult<()> {
        self.record(PinEvent::Release)
    }

    fn sample(&mut self) -> HwResult<u16> {
        let mut st = self
            .state
            .lock()
            .map_err(|_| std::io::Error::other("scripted pin poisoned"))?;
        if st.fail_sample {
            return Err(Box::new(std::io::Error::other("adc busy")));
        }
        let v = match st.script.pop_front() {
            Some(v) => v,
            None => st.fallback,
        };
        st.events.push(PinEvent::Sample(v));
        Ok(v)
    }
}

/// Observable counter electrode activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CeEvent {
    Write(u16),
    Release,
}

/// Counter electrode that only records what it was told.
#[derive(Debug, Clone, Default)]
pub struct SpyElectrode {
    events: Arc<Mutex<Vec<CeEvent>>>,
}

impl SpyElectrode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CeEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn writes(&self) -> Vec<u16> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                CeEvent::Write(code) => Some(code),
                CeEvent::Release => None,
            })
            .collect()
    }

    pub fn last(&self) -> Option<CeEvent> {
        self.events().last().copied()
    }

    fn record(&self, event: CeEvent) -> HwResult<()> {
        self.events
            .lock()
            .map_err(|_| std::io::Error::other("spy electrode poisoned"))?
            .push(event);
        Ok(())
    }
}

impl CounterElectrode for SpyElectrode {
    fn write_code(&mut self, code: u16) -> HwResult<()> {
        self.record(CeEvent::Write(code))
    }

    fn release(&mut self) -> HwResult<()> {
        self.record(CeEvent::Release)
    }
}
