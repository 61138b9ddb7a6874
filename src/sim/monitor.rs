//! The debug port monitor.
//!
//! Any access to the debug port window stops the board and talks to the operator:
//! a write shows the written byte, and a read asks the operator for a value.
//! All of this goes to the console's diagnostic stream.

use super::io::Console;

/// Parses the leading hex digits of `s` (at most eight).
///
/// Parsing stops at the first character that is not a hex digit.
/// No digits at all parses as 0.
pub fn parse_hex_prefix(s: &str) -> u32 {
    s.chars()
        .map_while(|c| c.to_digit(16))
        .take(8)
        .fold(0, |acc, d| (acc << 4) | d)
}

/// The debug monitor.
///
/// The monitor remembers the address and value of the last debug port access.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DebugMonitor {
    last_addr: u32,
    last_value: u32,
}
impl DebugMonitor {
    /// Creates a new monitor.
    pub fn new() -> Self {
        Default::default()
    }

    /// Handles a read from the debug port.
    ///
    /// This blocks until the operator enters a line, and returns the hex value on it.
    /// If the console has no more input, this returns 0.
    pub fn read(&mut self, console: &mut dyn Console, addr: u32) -> u32 {
        self.last_addr = addr;
        console.diag(&format!("{addr:05X}: (NA) R\n"));
        console.diag(" IN>");

        self.last_value = console.read_line()
            .map_or(0, |line| parse_hex_prefix(&line));
        tracing::debug!(addr, value = self.last_value, "debug port read");
        self.last_value
    }

    /// Handles a write to the debug port.
    ///
    /// Only the low byte is shown. Nothing is stored.
    pub fn write(&mut self, console: &mut dyn Console, addr: u32, value: u32) {
        self.last_addr = addr;
        self.last_value = value;
        let byte = value & 0xFF;
        console.diag(&format!("{addr:05X}: {byte:02X} W\n"));
        console.diag(&format!(" OUT: {byte:02x}\n"));
    }

    /// Pauses at a breakpoint until the operator enters a line.
    pub fn pause(&mut self, console: &mut dyn Console, pc: u32) {
        console.diag(&format!("{pc:05X}: BRK\n"));
        // any line (or the end of input) resumes
        let _ = console.read_line();
    }

    /// The address of the last debug port access.
    pub fn last_addr(&self) -> u32 {
        self.last_addr
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_hex_prefix, DebugMonitor};
    use crate::sim::io::BufferedConsole;

    #[test]
    fn test_parse_hex_prefix() {
        assert_eq!(parse_hex_prefix("1f"), 0x1F);
        assert_eq!(parse_hex_prefix("Ab3"), 0xAB3);
        assert_eq!(parse_hex_prefix("12zz"), 0x12);
        assert_eq!(parse_hex_prefix(""), 0);
        assert_eq!(parse_hex_prefix("xyz"), 0);
        assert_eq!(parse_hex_prefix("123456789"), 0x12345678);
    }

    #[test]
    fn test_read() {
        let mut con = BufferedConsole::with_input("3c\n");
        let mut mon = DebugMonitor::new();
        assert_eq!(mon.read(&mut con, 0x80104), 0x3C);
        assert_eq!(con.diag_string(), "80104: (NA) R\n IN>");
        assert_eq!(con.output_string(), "");
        assert_eq!(mon.last_addr(), 0x80104);

        // end of input
        assert_eq!(mon.read(&mut con, 0x80104), 0);
    }

    #[test]
    fn test_write() {
        let mut con = BufferedConsole::new();
        let mut mon = DebugMonitor::new();
        mon.write(&mut con, 0x80100, 0x1A5);
        assert_eq!(con.diag_string(), "80100: A5 W\n OUT: a5\n");
        assert_eq!(con.output_string(), "");
    }
}
