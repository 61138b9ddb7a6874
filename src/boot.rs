//! Loading boot records into memory.
//!
//! Boot images are streams of hex records (see [`lex`] for the record format).
//! The same records are also accepted one line at a time from the operator's front panel
//! once the board is running.
//!
//! The key type here is [`BootLoader`], which applies records to a [`BootTarget`].

pub mod lex;

use logos::Logos;

use crate::sim::io::Console;
use crate::sim::mem::{AddressSpace, MAX_RAM};
use lex::Token;

/// Something boot records can be applied to.
pub trait BootTarget {
    /// Writes one byte of RAM, without triggering devices.
    ///
    /// This returns whether the address was inside RAM.
    fn poke(&mut self, addr: u32, value: u8) -> bool;

    /// Reads one byte of RAM, without triggering devices.
    fn peek(&self, addr: u32) -> u8;

    /// A `P`, `Q`, or `R` record registered a breakpoint.
    fn set_breakpoint(&mut self, addr: u16);

    /// A `Q` record registered a word-trace address.
    fn set_wordtrace(&mut self, addr: u16);

    /// An `R` record registered a do-next address.
    fn set_donext(&mut self, addr: u16);
}

/// The outcome of one pass over a record stream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BootPass {
    /// Number of words written to RAM.
    pub words: usize,
    /// Number of malformed records that were skipped.
    pub skipped: usize,
    /// Whether the stream ended with an `...` marker.
    pub ended: bool,
}

/// Applies boot records.
///
/// The loader keeps a write cursor and the range of addresses written so far.
/// Both persist across calls to [`BootLoader::feed`].
///
/// ```
/// use sbc68k::boot::BootLoader;
/// use sbc68k::sim::io::BufferedConsole;
/// use sbc68k::sim::mem::{AddressSpace, MachineInitStrategy};
///
/// let mut mem = AddressSpace::new(MachineInitStrategy::default(), None);
/// let mut con = BufferedConsole::new();
///
/// let pass = BootLoader::new().feed("=0010 00FF 1234!", &mut mem, &mut con);
/// assert_eq!(pass.words, 2);
/// assert_eq!(mem.peek_word(0x12), 0x1234);
/// assert_eq!(con.diag_string(), "\n0010 00FF 1234 ");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootLoader {
    cursor: u32,
    min: u32,
    max: u32,
}
impl BootLoader {
    /// Creates a loader with the cursor at 0 and nothing written.
    pub fn new() -> Self {
        Self {
            cursor: 0,
            min: MAX_RAM + 1,
            max: 0,
        }
    }

    /// The current write cursor.
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// The range of addresses written so far (empty if nothing was written).
    pub fn written(&self) -> std::ops::Range<u32> {
        self.min..self.max
    }

    /// Applies every record in `src`, stopping at the end or at an `...` marker.
    ///
    /// Runs of one or two dots are ignored, even inside a value.
    /// A value running straight into the `...` marker (`12...`) is dropped.
    ///
    /// Dumps and breakpoint echoes go to the console's diagnostic stream.
    pub fn feed(&mut self, src: &str, target: &mut dyn BootTarget, console: &mut dyn Console) -> BootPass {
        let mut pass = BootPass::default();

        let src = lex::squeeze_dots(src);
        let mut tokens = Token::lexer(&*src).spanned().peekable();
        while let Some((result, span)) = tokens.next() {
            let token = match result {
                Ok(t) => t,
                Err(e) => {
                    tracing::trace!("skipping {:?} at {span:?}: {e}", &src[span.clone()]);
                    pass.skipped += 1;
                    continue;
                }
            };

            // a value cut off by the end marker is never applied
            if token.has_value() && matches!(tokens.peek(), Some((Ok(Token::End), next)) if next.start == span.end) {
                pass.ended = true;
                break;
            }

            match token {
                Token::Cursor(addr) => self.cursor = addr,
                Token::Mark(_) => {},
                Token::Break(addr) => {
                    console.diag(&format!("P{addr:04X}"));
                    target.set_breakpoint(addr as u16);
                },
                Token::Trace(addr) => {
                    console.diag(&format!("Q{addr:04X}"));
                    target.set_breakpoint(addr as u16);
                    target.set_wordtrace(addr as u16);
                },
                Token::DoNext(addr) => {
                    console.diag(&format!("R{addr:04X}"));
                    target.set_breakpoint(addr as u16);
                    target.set_donext(addr as u16);
                },
                Token::Data(value) => {
                    if self.poke_word(target, value) {
                        pass.words += 1;
                    }
                },
                Token::Dump => self.dump(&*target, console),
                Token::End => {
                    pass.ended = true;
                    break;
                },
            }
        }

        pass
    }

    fn poke_word(&mut self, target: &mut dyn BootTarget, value: u32) -> bool {
        if self.cursor > MAX_RAM {
            return false;
        }

        let [_, _, hi, lo] = value.to_be_bytes();
        target.poke(self.cursor, hi);
        target.poke(self.cursor + 1, lo);
        self.cursor += 2;

        self.max = self.max.max(self.cursor);
        self.min = self.min.min(self.cursor - 2);
        true
    }

    /// Prints the written range as words, eight to a line, each line prefixed by its address.
    fn dump(&self, target: &dyn BootTarget, console: &mut dyn Console) {
        if self.min >= self.max {
            return;
        }

        let mut out = String::from("\n");
        for addr in ((self.min & !0xF)..self.max).step_by(2) {
            if addr & 0xF == 0 {
                out.push_str(&format!("{addr:04X} "));
            }
            let word = u16::from_be_bytes([target.peek(addr), target.peek(addr + 1)]);
            out.push_str(&format!("{word:04X} "));
            if addr & 0xF == 0xE {
                out.push('\n');
            }
        }
        console.diag(&out);
    }
}
impl BootTarget for AddressSpace {
    fn poke(&mut self, addr: u32, value: u8) -> bool {
        AddressSpace::poke(self, addr, value)
    }

    fn peek(&self, addr: u32) -> u8 {
        AddressSpace::peek(self, addr)
    }

    // Plain memory has nowhere to keep registrations.
    fn set_breakpoint(&mut self, _addr: u16) {}
    fn set_wordtrace(&mut self, _addr: u16) {}
    fn set_donext(&mut self, _addr: u16) {}
}

impl Default for BootLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{BootLoader, BootTarget};
    use crate::sim::io::BufferedConsole;
    use crate::sim::mem::{AddressSpace, MachineInitStrategy, MAX_RAM};

    #[derive(Default)]
    struct Registrations {
        breakpoints: Vec<u16>,
        wordtrace: Vec<u16>,
        donext: Vec<u16>,
    }
    struct Target {
        mem: AddressSpace,
        regs: Registrations,
    }
    impl Target {
        fn new() -> Self {
            Self {
                mem: AddressSpace::new(MachineInitStrategy::default(), None),
                regs: Default::default(),
            }
        }
    }
    impl BootTarget for Target {
        fn poke(&mut self, addr: u32, value: u8) -> bool { self.mem.poke(addr, value) }
        fn peek(&self, addr: u32) -> u8 { self.mem.peek(addr) }
        fn set_breakpoint(&mut self, addr: u16) { self.regs.breakpoints.push(addr) }
        fn set_wordtrace(&mut self, addr: u16) { self.regs.wordtrace.push(addr) }
        fn set_donext(&mut self, addr: u16) { self.regs.donext.push(addr) }
    }

    #[test]
    fn test_load_and_dump() {
        let mut target = Target::new();
        let mut con = BufferedConsole::new();
        let mut loader = BootLoader::new();

        let pass = loader.feed("=0010 00FF 1234!", &mut target, &mut con);
        assert_eq!(pass.words, 2);
        assert!(!pass.ended);
        assert_eq!(target.mem.peek_word(0x10), 0x00FF);
        assert_eq!(target.mem.peek_word(0x12), 0x1234);
        assert_eq!(loader.cursor(), 0x14);
        assert_eq!(loader.written(), 0x10..0x14);
        assert_eq!(con.diag_string(), "\n0010 00FF 1234 ");
        assert_eq!(con.output_string(), "");
    }

    #[test]
    fn test_dump_lines() {
        let mut target = Target::new();
        let mut con = BufferedConsole::new();
        let mut loader = BootLoader::new();

        loader.feed("=0006 1 2 3 4 5 6 !", &mut target, &mut con);
        assert_eq!(
            con.diag_string(),
            "\n0000 0000 0000 0000 0001 0002 0003 0004 0005 \n0010 0006 "
        );
    }

    #[test]
    fn test_dump_nothing_written() {
        let mut target = Target::new();
        let mut con = BufferedConsole::new();
        let pass = BootLoader::new().feed("! =100 !", &mut target, &mut con);
        assert_eq!(pass.words, 0);
        assert_eq!(con.diag_string(), "");
        // no stray pokes
        assert!(target.mem.ram().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_registrations() {
        let mut target = Target::new();
        let mut con = BufferedConsole::new();

        BootLoader::new().feed("P1000 Q2000\nR3000 %4000", &mut target, &mut con);
        assert_eq!(target.regs.breakpoints, [0x1000, 0x2000, 0x3000]);
        assert_eq!(target.regs.wordtrace, [0x2000]);
        assert_eq!(target.regs.donext, [0x3000]);
        assert_eq!(con.diag_string(), "P1000Q2000R3000");
    }

    #[test]
    fn test_end_marker() {
        let mut target = Target::new();
        let mut con = BufferedConsole::new();

        let pass = BootLoader::new().feed("=20 AAAA ... BBBB", &mut target, &mut con);
        assert!(pass.ended);
        assert_eq!(pass.words, 1);
        assert_eq!(target.mem.peek_word(0x22), 0);
    }

    #[test]
    fn test_dots() {
        let mut target = Target::new();
        let mut con = BufferedConsole::new();

        let pass = BootLoader::new().feed("=1.0 12.34 5..678", &mut target, &mut con);
        assert_eq!(pass.words, 2);
        assert_eq!(target.mem.peek_word(0x10), 0x1234);
        assert_eq!(target.mem.peek_word(0x12), 0x5678);
    }

    #[test]
    fn test_value_cut_off_by_end() {
        let mut target = Target::new();
        let mut con = BufferedConsole::new();

        let pass = BootLoader::new().feed("=10 AAAA 1... BBBB", &mut target, &mut con);
        assert!(pass.ended);
        assert_eq!(pass.words, 1);
        assert_eq!(target.mem.peek_word(0x10), 0xAAAA);
        assert_eq!(target.mem.peek_word(0x12), 0);

        // a cut-off flag does nothing either
        let pass = BootLoader::new().feed("P20...", &mut target, &mut con);
        assert!(pass.ended);
        assert!(target.regs.breakpoints.is_empty());
    }

    #[test]
    fn test_malformed_skipped() {
        let mut target = Target::new();
        let mut con = BufferedConsole::new();

        let pass = BootLoader::new().feed("=40 = 1111 z 2222", &mut target, &mut con);
        assert_eq!(pass.skipped, 2);
        assert_eq!(pass.words, 2);
        assert_eq!(target.mem.peek_word(0x40), 0x1111);
        assert_eq!(target.mem.peek_word(0x42), 0x2222);
    }

    #[test]
    fn test_outside_ram() {
        let mut target = Target::new();
        let mut con = BufferedConsole::new();
        let mut loader = BootLoader::new();

        let pass = loader.feed(&format!("={:X} 1234 5678", MAX_RAM + 1), &mut target, &mut con);
        assert_eq!(pass.words, 0);
        assert_eq!(loader.cursor(), MAX_RAM + 1);
        assert!(loader.written().is_empty());
    }

    #[test]
    fn test_state_persists() {
        let mut target = Target::new();
        let mut con = BufferedConsole::new();
        let mut loader = BootLoader::new();

        loader.feed("=80 0102", &mut target, &mut con);
        loader.feed("0304", &mut target, &mut con);
        assert_eq!(target.mem.peek_word(0x82), 0x0304);
        assert_eq!(loader.written(), 0x80..0x84);
    }
}
