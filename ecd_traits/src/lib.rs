//! Hardware seams for the electrochromic drive engine.
//!
//! The engine never touches registers or GPIO directly. A backend provides
//! one [`SegmentPin`] per working electrode and a single [`CounterElectrode`];
//! the engine sequences them.

pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Full-scale code of the 10-bit converters. The segment ADC and the counter
/// electrode DAC share it.
pub const MAX_CODE: u16 = 1023;

/// Error type used at every trait boundary. Backends box their own errors.
pub type HwResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Tri-state working-electrode pin with an analog read path.
///
/// A pin is in one of three electrical states: driven high, driven low, or
/// released (high impedance). `sample` is only meaningful while released.
pub trait SegmentPin {
    /// Push the working electrode to the supply rail (Color direction).
    fn drive_high(&mut self) -> HwResult<()>;
    /// Pull the working electrode to ground (Bleach direction).
    fn drive_low(&mut self) -> HwResult<()>;
    /// Return the pin to high impedance.
    fn release(&mut self) -> HwResult<()>;
    /// Read the electrode potential as a raw converter code.
    fn sample(&mut self) -> HwResult<u16>;
}

/// Shared counter electrode driven by an analog output.
pub trait CounterElectrode {
    /// Output a raw converter code. Settling is the caller's concern.
    fn write_code(&mut self, code: u16) -> HwResult<()>;
    /// Stop driving and leave the electrode floating.
    fn release(&mut self) -> HwResult<()>;
}

impl<T: SegmentPin + ?Sized> SegmentPin for Box<T> {
    fn drive_high(&mut self) -> HwResult<()> {
        (**self).drive_high()
    }
    fn drive_low(&mut self) -> HwResult<()> {
        (**self).drive_low()
    }
    fn release(&mut self) -> HwResult<()> {
        (**self).release()
    }
    fn sample(&mut self) -> HwResult<u16> {
        (**self).sample()
    }
}

impl<T: CounterElectrode + ?Sized> CounterElectrode for Box<T> {
    fn write_code(&mut self, code: u16) -> HwResult<()> {
        (**self).write_code(code)
    }
    fn release(&mut self) -> HwResult<()> {
        (**self).release()
    }
}
