//! Segment state table and the drive capability.
//!
//! Pins are only ever driven through a [`DriveGuard`]. The guard mutably
//! borrows the whole table, so sampling (which needs the table too) cannot
//! happen while any pin may still be driven. Dropping the guard releases
//! every pin.

use crate::error::{EcdError, Result};
use crate::hw_error::hw_report;
use ecd_traits::SegmentPin;

/// Logical optical state of one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentState {
    /// Unknown electrochemical condition (power-up).
    #[default]
    Undefined,
    Bleach,
    Color,
}

/// Output level of a driven working electrode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Supply rail (Color direction).
    High,
    /// Ground (Bleach direction).
    Low,
}

/// Per-segment bookkeeping, as observed by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentStatus {
    pub current: SegmentState,
    pub next: SegmentState,
    /// Selected for the next refresh batch by the latest OCP survey.
    pub needs_refresh: bool,
    /// Abandoned at the retry ceiling in the latest refresh of its direction.
    pub degraded: bool,
}

struct Segment<P> {
    pin: P,
    status: SegmentStatus,
}

/// Ordered segments owned by one engine.
pub struct SegmentTable<P> {
    segments: Vec<Segment<P>>,
}

impl<P> core::fmt::Debug for SegmentTable<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(self.segments.iter().map(|s| s.status))
            .finish()
    }
}

impl<P: SegmentPin> SegmentTable<P> {
    pub fn new(pins: impl IntoIterator<Item = P>) -> Self {
        Self {
            segments: pins
                .into_iter()
                .map(|pin| Segment {
                    pin,
                    status: SegmentStatus::default(),
                })
                .collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn status(&self, index: usize) -> Option<&SegmentStatus> {
        self.segments.get(index).map(|s| &s.status)
    }

    pub fn status_mut(&mut self, index: usize) -> Result<&mut SegmentStatus> {
        let count = self.segments.len();
        self.segments
            .get_mut(index)
            .map(|s| &mut s.status)
            .ok_or_else(|| eyre::Report::new(EcdError::SegmentIndex { index, count }))
    }

    pub fn statuses(&self) -> impl Iterator<Item = &SegmentStatus> {
        self.segments.iter().map(|s| &s.status)
    }

    pub fn statuses_mut(&mut self) -> impl Iterator<Item = &mut SegmentStatus> {
        self.segments.iter_mut().map(|s| &mut s.status)
    }

    /// Read one segment's potential. Pins are released whenever no guard is
    /// alive, so the read is always taken at high impedance.
    pub fn sample(&mut self, index: usize) -> Result<u16> {
        let count = self.segments.len();
        let seg = self
            .segments
            .get_mut(index)
            .ok_or_else(|| eyre::Report::new(EcdError::SegmentIndex { index, count }))?;
        seg.pin
            .sample()
            .map_err(|e| hw_report(e, format!("sample segment {index}")))
    }

    /// Release every pin. All pins are attempted; the first failure is
    /// returned.
    pub fn release_all(&mut self) -> Result<()> {
        let mut first_err = None;
        for (i, seg) in self.segments.iter_mut().enumerate() {
            if let Err(e) = seg.pin.release() {
                if first_err.is_none() {
                    first_err = Some(hw_report(e, format!("release segment {i}")));
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Take the drive capability for this table.
    pub fn drive(&mut self) -> DriveGuard<'_, P> {
        DriveGuard {
            table: self,
            armed: true,
        }
    }
}

/// Exclusive right to drive pins. Pins return to high impedance when the
/// guard is released or dropped.
pub struct DriveGuard<'a, P: SegmentPin> {
    table: &'a mut SegmentTable<P>,
    armed: bool,
}

impl<P: SegmentPin> DriveGuard<'_, P> {
    #[inline]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn status(&self, index: usize) -> Option<&SegmentStatus> {
        self.table.status(index)
    }

    pub fn status_mut(&mut self, index: usize) -> Result<&mut SegmentStatus> {
        self.table.status_mut(index)
    }

    /// Drive one working electrode to `level`.
    pub fn drive(&mut self, index: usize, level: Level) -> Result<()> {
        let count = self.table.len();
        let seg = self
            .table
            .segments
            .get_mut(index)
            .ok_or_else(|| eyre::Report::new(EcdError::SegmentIndex { index, count }))?;
        let res = match level {
            Level::High => seg.pin.drive_high(),
            Level::Low => seg.pin.drive_low(),
        };
        res.map_err(|e| hw_report(e, format!("drive segment {index} {level:?}")))
    }

    /// Release all pins and give the capability back.
    pub fn release(mut self) -> Result<()> {
        self.armed = false;
        self.table.release_all()
    }
}

impl<P: SegmentPin> Drop for DriveGuard<'_, P> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.table.release_all() {
                tracing::warn!(error = %e, "releasing segment pins failed on early exit");
            }
        }
    }
}
