/// Per-job tick counter.
///
/// A job either counts up forever from a starting value, or counts down from a
/// fixed budget and is exhausted once it reaches zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickCounter {
    Up { next: u64 },
    Down { remaining: u64 },
}

/// Result of advancing the counter by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    /// Value shown for this tick, read before the counter moved.
    pub shown: u64,
    /// True when this tick consumed the last unit of a countdown budget.
    pub last: bool,
}

impl TickCounter {
    pub fn counting_up(start: u64) -> Self {
        Self::Up { next: start }
    }

    pub fn countdown(budget: u64) -> Self {
        Self::Down { remaining: budget }
    }

    /// Moves the counter by one tick. Returns `None` once a countdown is exhausted.
    pub fn advance(&mut self) -> Option<Advance> {
        match self {
            Self::Up { next } => {
                let shown = *next;
                *next = next.wrapping_add(1);
                Some(Advance { shown, last: false })
            }
            Self::Down { remaining } => {
                if *remaining == 0 {
                    return None;
                }
                let shown = *remaining;
                *remaining -= 1;
                Some(Advance {
                    shown,
                    last: *remaining == 0,
                })
            }
        }
    }
}

impl Default for TickCounter {
    fn default() -> Self {
        Self::counting_up(0)
    }
}
