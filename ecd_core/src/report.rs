//! What a drive call did. Informational only; engine state is the source of
//! truth.

/// Drive direction of a transition or refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Color,
    Bleach,
}

impl Direction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::Color => "color",
            Direction::Bleach => "bleach",
        }
    }
}

/// Step at which a cancelled call stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Transition(Direction),
    Survey,
    Refresh(Direction),
    DirectDrive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayOutcome {
    #[default]
    Completed,
    /// Stop was requested; `phase` and everything after it did not run.
    Cancelled { phase: Phase },
}

impl DisplayOutcome {
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DisplayOutcome::Cancelled { .. })
    }
}

/// Result of one refresh loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub direction: Direction,
    /// Pulses applied.
    pub attempts: u32,
    /// Every flagged segment reached its target.
    pub converged: bool,
    /// Still flagged when the loop gave up, ascending.
    pub abandoned: Vec<usize>,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DisplayReport {
    pub outcome: DisplayOutcome,
    /// Segments whose logical state changed in this call, in drive order.
    pub transitioned: Vec<usize>,
    pub color_refresh: Option<RefreshOutcome>,
    pub bleach_refresh: Option<RefreshOutcome>,
}

impl DisplayReport {
    /// Segments abandoned by either refresh direction.
    pub fn abandoned(&self) -> impl Iterator<Item = usize> + '_ {
        self.color_refresh
            .iter()
            .chain(self.bleach_refresh.iter())
            .flat_map(|r| r.abandoned.iter().copied())
    }
}
