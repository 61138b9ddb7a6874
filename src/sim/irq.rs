//! The priority interrupt controller.
//!
//! Each of the seven interrupt levels has one pending flag.
//! The highest pending level is what gets presented to the CPU core.

/// Tracks which interrupt levels are pending and what the CPU core was last told.
///
/// ```
/// use sbc68k::sim::irq::InterruptController;
///
/// let mut irq = InterruptController::new();
/// irq.set(3);
/// irq.set(5);
/// assert_eq!(irq.highest(), 5);
/// irq.clear(5);
/// assert_eq!(irq.highest(), 3);
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InterruptController {
    // bit n = level n pending (bit 0 unused)
    pending: u8,
    highest: u8,
    signal: Option<u8>,
}

impl InterruptController {
    /// Creates a controller with nothing pending.
    pub fn new() -> Self {
        Default::default()
    }

    /// Raises the given level.
    ///
    /// The CPU core is only signalled if the flag was not already set
    /// and the level beats the current highest.
    pub fn set(&mut self, level: u8) {
        let Some(bit) = Self::bit(level) else { return };

        let old = self.pending;
        self.pending |= bit;
        if old != self.pending && level > self.highest {
            self.highest = level;
            self.signal = Some(level);
        }
    }

    /// Lowers the given level, recomputes the highest pending level, and re-signals the CPU core.
    pub fn clear(&mut self, level: u8) {
        let Some(bit) = Self::bit(level) else { return };

        self.pending &= !bit;
        self.highest = match self.pending {
            0 => 0,
            p => 7 - p.leading_zeros() as u8,
        };
        self.signal = Some(self.highest);
    }

    /// The highest pending level (0 if none).
    pub fn highest(&self) -> u8 {
        self.highest
    }

    /// Whether the given level has an unacknowledged interrupt.
    pub fn is_pending(&self, level: u8) -> bool {
        Self::bit(level).is_some_and(|b| self.pending & b != 0)
    }

    /// Takes the most recent level meant for the CPU core, if it changed since the last call.
    pub fn take_signal(&mut self) -> Option<u8> {
        self.signal.take()
    }

    fn bit(level: u8) -> Option<u8> {
        (1..=7).contains(&level).then(|| 1 << level)
    }
}
