//! Utilities to debug simulation.
//!
//! The key type here is [`Debugger`], which collects the addresses the boot loader
//! registers with `P`, `Q`, and `R` records:
//! - `P`: break at the address.
//! - `Q`: break at the address, and trace every instruction inside the dictionary entry containing it.
//! - `R`: break at the address, and report which entry is being run next each time it is hit.

use std::collections::BTreeSet;

use super::dict::{self, DictEntry};
use super::mem::AddressSpace;

/// Breakpoint and trace registrations.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Debugger {
    breakpoints: BTreeSet<u16>,
    wordtrace: Option<u16>,
    donext: BTreeSet<u16>,
    trace_range: Option<DictEntry>,
}

/// What the debugger has to say about the instruction at some PC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Hit {
    /// The PC is a breakpoint.
    pub breakpoint: bool,
    /// The PC is a do-next address.
    pub donext: bool,
    /// The PC is inside the traced entry.
    pub traced: bool,
}

impl Debugger {
    /// Creates a debugger with nothing registered.
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers a breakpoint.
    pub fn set_breakpoint(&mut self, addr: u16) {
        self.breakpoints.insert(addr);
    }

    /// Registers the word-trace address.
    ///
    /// Only one is kept. The traced range is worked out by [`Debugger::resolve_trace`].
    pub fn set_wordtrace(&mut self, addr: u16) {
        self.wordtrace = Some(addr);
        self.trace_range = None;
    }

    /// Registers a do-next address.
    pub fn set_donext(&mut self, addr: u16) {
        self.donext.insert(addr);
    }

    /// Clears all breakpoints.
    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    /// All registered breakpoints.
    pub fn breakpoints(&self) -> impl Iterator<Item = u16> + '_ {
        self.breakpoints.iter().copied()
    }

    /// The range of the traced dictionary entry, if it has been resolved.
    pub fn trace_range(&self) -> Option<&DictEntry> {
        self.trace_range.as_ref()
    }

    /// Finds the dictionary entry containing the word-trace address.
    ///
    /// This should be called whenever memory may have been reloaded.
    pub fn resolve_trace(&mut self, mem: &AddressSpace) {
        let Some(addr) = self.wordtrace else { return };

        self.trace_range = dict::lookup_by_address(mem, addr);
        match &self.trace_range {
            Some(e) => tracing::info!("tracing {} [{:04X}, {:04X})", e.name(mem), e.start, e.end),
            None => tracing::warn!("word trace address {addr:04X} is not inside any dictionary entry"),
        }
    }

    /// Checks the instruction at `pc` against everything registered.
    pub fn check(&self, pc: u32) -> Hit {
        let Ok(pc) = u16::try_from(pc) else { return Hit::default() };

        Hit {
            breakpoint: self.breakpoints.contains(&pc),
            donext: self.donext.contains(&pc),
            traced: self.trace_range.as_ref().is_some_and(|e| e.contains(pc)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Debugger, Hit};
    use crate::sim::dict::{HERE, LAST};
    use crate::sim::mem::{AddressSpace, MachineInitStrategy};

    #[test]
    fn test_registration() {
        let mut dbg = Debugger::new();
        dbg.set_breakpoint(0x1000);
        dbg.set_breakpoint(0x1000);
        dbg.set_donext(0x1200);

        assert_eq!(dbg.breakpoints().collect::<Vec<_>>(), [0x1000]);
        assert_eq!(dbg.check(0x1000), Hit { breakpoint: true, ..Default::default() });
        assert_eq!(dbg.check(0x1200), Hit { donext: true, ..Default::default() });
        assert_eq!(dbg.check(0x11000), Hit::default());

        dbg.clear_breakpoints();
        assert_eq!(dbg.check(0x1000), Hit::default());
    }

    #[test]
    fn test_trace_range() {
        let mut mem = AddressSpace::new(MachineInitStrategy::default(), None);
        // one entry "X" at 0x3000, link at 0x3002
        mem.poke(0x3000, 1);
        mem.poke(0x3001, b'X');
        mem.poke(LAST, 0x30);
        mem.poke(LAST + 1, 0x00);
        mem.poke(HERE, 0x30);
        mem.poke(HERE + 1, 0x20);

        let mut dbg = Debugger::new();
        dbg.set_wordtrace(0x3008);
        assert!(!dbg.check(0x3008).traced);

        dbg.resolve_trace(&mem);
        let range = dbg.trace_range().unwrap();
        assert_eq!((range.start, range.end), (0x3000, 0x3020));
        assert!(dbg.check(0x3000).traced);
        assert!(dbg.check(0x301E).traced);
        assert!(!dbg.check(0x3020).traced);
    }
}
