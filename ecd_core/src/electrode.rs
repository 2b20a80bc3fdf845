//! Counter electrode controller.

use crate::error::Result;
use crate::hw_error::hw_report;
use crate::util::volts_to_code;
use ecd_traits::{Clock, CounterElectrode};
use std::time::Duration;

/// Drives the shared counter electrode and waits for it to settle.
pub struct CounterElectrodeController<E> {
    electrode: E,
    settle: Duration,
    driven: Option<u16>,
}

impl<E> core::fmt::Debug for CounterElectrodeController<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CounterElectrodeController")
            .field("settle", &self.settle)
            .field("driven", &self.driven)
            .finish()
    }
}

impl<E: CounterElectrode> CounterElectrodeController<E> {
    pub fn new(electrode: E, settle: Duration) -> Self {
        Self {
            electrode,
            settle,
            driven: None,
        }
    }

    /// Output `voltage` (against `supply_v`) and block for the settling
    /// interval. Returns the code written.
    pub fn drive(&mut self, voltage: f32, supply_v: f32, clock: &dyn Clock) -> Result<u16> {
        let code = volts_to_code(voltage, supply_v);
        self.electrode
            .write_code(code)
            .map_err(|e| hw_report(e, format!("drive counter electrode to {voltage:.3} V")))?;
        self.driven = Some(code);
        tracing::debug!(voltage, code, "counter electrode driven");
        clock.sleep(self.settle);
        Ok(code)
    }

    /// Leave the electrode floating.
    pub fn release(&mut self) -> Result<()> {
        self.electrode
            .release()
            .map_err(|e| hw_report(e, "release counter electrode"))?;
        self.driven = None;
        Ok(())
    }

    /// Code currently output, or `None` while released.
    #[inline]
    pub fn driven_code(&self) -> Option<u16> {
        self.driven
    }

    #[inline]
    pub fn settle(&self) -> Duration {
        self.settle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{CeEvent, SpyElectrode};
    use ecd_traits::clock::ManualClock;

    #[test]
    fn drive_writes_code_then_settles() {
        let spy = SpyElectrode::new();
        let clock = ManualClock::new();
        let mut ce = CounterElectrodeController::new(spy.clone(), Duration::from_millis(50));

        let code = ce.drive(1.5, 3.0, &clock).unwrap();
        assert_eq!(code, 512);
        assert_eq!(ce.driven_code(), Some(512));
        assert_eq!(spy.events(), vec![CeEvent::Write(512)]);
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(50)]);

        ce.release().unwrap();
        assert_eq!(ce.driven_code(), None);
        assert_eq!(spy.last(), Some(CeEvent::Release));
    }
}
