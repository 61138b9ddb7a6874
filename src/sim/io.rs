//! Console and clock handling for the board.
//!
//! The interface for the operator console is defined with the [`Console`] trait.
//! Besides that trait, this module also includes:
//! - [`BufferedConsole`]: A `Console` that reads from an input buffer and writes to output buffers.
//! - [`StdConsole`]: A `Console` holding a threaded/channel implementation over stdin and stdout.
//! - [`Clock`]: The millisecond time source used by the devices,
//!     with [`MonotonicClock`] and [`ManualClock`] implementations.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockWriteGuard, TryLockError};
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel as cbc;

/// The operator console attached to the board.
///
/// There are two output streams:
/// - the output stream, which carries everything the emulated program writes, and
/// - the diagnostic stream, which carries messages about the board itself.
pub trait Console {
    /// Takes one pending keystroke, if there is one.
    ///
    /// This must never block.
    fn poll_key(&mut self) -> Option<u8>;

    /// Blocks until a full line is available and returns it (without the line terminator).
    ///
    /// This returns `None` if the input has ended.
    fn read_line(&mut self) -> Option<String>;

    /// Writes one byte to the output stream.
    fn put(&mut self, byte: u8);

    /// Writes a string to the output stream.
    fn print(&mut self, s: &str) {
        s.bytes().for_each(|b| self.put(b));
    }

    /// Writes a string to the diagnostic stream.
    fn diag(&mut self, s: &str);
}
impl dyn Console {} // assert Console is dyn safe

fn try_lock<T>(lock: &RwLock<T>) -> Option<RwLockWriteGuard<'_, T>> {
    match lock.try_write() {
        Ok(g) => Some(g),
        Err(TryLockError::Poisoned(e)) => Some(e.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}

/// Console that reads from an input buffer and writes to two output buffers.
///
/// The buffers can be accessed in code via [`BufferedConsole::get_input`],
/// [`BufferedConsole::get_output`], and [`BufferedConsole::get_diag`].
///
/// Note that if a lock guard is acquired from one of the locks of this console,
/// the buffer becomes temporarily inaccessible to the simulator.
/// Thus, a lock guard should never be leaked otherwise the simulator loses access to it.
#[derive(Clone, Default)]
pub struct BufferedConsole {
    input: Arc<RwLock<VecDeque<u8>>>,
    output: Arc<RwLock<Vec<u8>>>,
    diag: Arc<RwLock<String>>,
}
impl BufferedConsole {
    /// Creates a new console with empty buffers.
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates a new console whose input buffer starts with the given bytes.
    pub fn with_input(input: impl AsRef<[u8]>) -> Self {
        let con = Self::new();
        con.push_input(input);
        con
    }

    /// Appends bytes to the input buffer.
    pub fn push_input(&self, input: impl AsRef<[u8]>) {
        if let Some(mut inp) = try_lock(&self.input) {
            inp.extend(input.as_ref());
        }
    }

    /// Gets a reference to the input buffer.
    pub fn get_input(&self) -> &Arc<RwLock<VecDeque<u8>>> {
        &self.input
    }
    /// Gets a reference to the output buffer.
    pub fn get_output(&self) -> &Arc<RwLock<Vec<u8>>> {
        &self.output
    }
    /// Gets a reference to the diagnostic buffer.
    pub fn get_diag(&self) -> &Arc<RwLock<String>> {
        &self.diag
    }

    /// Copies the output stream out as a string.
    pub fn output_string(&self) -> String {
        try_lock(&self.output)
            .map(|out| String::from_utf8_lossy(&out).into_owned())
            .unwrap_or_default()
    }
    /// Copies the diagnostic stream out as a string.
    pub fn diag_string(&self) -> String {
        try_lock(&self.diag)
            .map(|d| d.clone())
            .unwrap_or_default()
    }
}
impl Console for BufferedConsole {
    fn poll_key(&mut self) -> Option<u8> {
        try_lock(&self.input)?.pop_front()
    }

    fn read_line(&mut self) -> Option<String> {
        let mut inp = try_lock(&self.input)?;
        if inp.is_empty() {
            return None;
        }

        let end = inp.iter().position(|&b| b == b'\n');
        let line: Vec<_> = match end {
            Some(n) => {
                let line = inp.drain(..n).collect();
                inp.pop_front();
                line
            },
            None => inp.drain(..).collect(),
        };
        Some(String::from_utf8_lossy(&line).trim_end_matches('\r').to_string())
    }

    fn put(&mut self, byte: u8) {
        if let Some(mut out) = try_lock(&self.output) {
            out.push(byte);
        }
    }

    fn diag(&mut self, s: &str) {
        if let Some(mut d) = try_lock(&self.diag) {
            d.push_str(s);
        }
    }
}

/// A console over stdin and stdout (with diagnostics on stderr).
///
/// Stdin is read on its own thread and handed over through a channel,
/// so [`Console::poll_key`] never blocks.
///
/// Note that due to how stdin works in terminals, data is only sent once a new line is typed.
/// Switching the terminal into raw mode is left to the host.
pub struct StdConsole {
    read_data: cbc::Receiver<u8>,
    #[allow(unused)]
    read_handler: JoinHandle<()>,
}
impl StdConsole {
    /// Creates the console and starts the stdin reader thread.
    pub fn new() -> Self {
        use std::io::{self, Read};

        let (read_tx, read_rx) = cbc::unbounded();

        let read_handler = std::thread::spawn(move || {
            let mut stdin = io::stdin().lock();
            let mut buf = [0; 1];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) | Err(_) => return,
                    Ok(_) => {
                        let Ok(()) = read_tx.send(buf[0]) else { return };
                    }
                }
            }
        });

        Self { read_data: read_rx, read_handler }
    }
}
impl Default for StdConsole {
    fn default() -> Self {
        Self::new()
    }
}
impl Console for StdConsole {
    fn poll_key(&mut self) -> Option<u8> {
        // Disconnected means stdin closed (or the reader panicked).
        // Either way, there's no key.
        self.read_data.try_recv().ok()
    }

    fn read_line(&mut self) -> Option<String> {
        let mut line = vec![];
        loop {
            match self.read_data.recv() {
                Ok(b'\n') => break,
                Ok(b) => line.push(b),
                Err(cbc::RecvError) if line.is_empty() => return None,
                Err(cbc::RecvError) => break,
            }
        }
        Some(String::from_utf8_lossy(&line).trim_end_matches('\r').to_string())
    }

    fn put(&mut self, byte: u8) {
        use std::io::Write;

        let mut stdout = std::io::stdout().lock();
        // Nowhere to report a broken stdout.
        let _ = stdout.write_all(&[byte]);
        let _ = stdout.flush();
    }

    fn print(&mut self, s: &str) {
        use std::io::Write;

        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(s.as_bytes());
        let _ = stdout.flush();
    }

    fn diag(&mut self, s: &str) {
        use std::io::Write;

        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(s.as_bytes());
        let _ = stderr.flush();
    }
}

/// A millisecond time source for device timing.
pub trait Clock {
    /// Milliseconds since some fixed starting point. Never decreases.
    fn now_ms(&self) -> u64;
}

/// A [`Clock`] backed by [`Instant`], starting at 0 when created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}
impl MonotonicClock {
    /// Starts a new clock.
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}
impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}
impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// A [`Clock`] that only moves when told to.
///
/// Clones share the same time, so a test can keep a handle after handing one to the simulator.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Arc<AtomicU64>);
impl ManualClock {
    /// Creates a clock at time 0.
    pub fn new() -> Self {
        Default::default()
    }

    /// Moves the clock forward.
    pub fn advance(&self, ms: u64) {
        self.0.fetch_add(ms, Ordering::Relaxed);
    }
}
impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::{BufferedConsole, Clock, Console, ManualClock};

    #[test]
    fn test_buffered_lines() {
        let mut con = BufferedConsole::with_input("12\r\nab\ntail");
        assert_eq!(con.read_line().as_deref(), Some("12"));
        assert_eq!(con.read_line().as_deref(), Some("ab"));
        assert_eq!(con.read_line().as_deref(), Some("tail"));
        assert_eq!(con.read_line(), None);
    }

    #[test]
    fn test_buffered_keys() {
        let mut con = BufferedConsole::with_input("xy");
        assert_eq!(con.poll_key(), Some(b'x'));
        assert_eq!(con.poll_key(), Some(b'y'));
        assert_eq!(con.poll_key(), None);
    }

    #[test]
    fn test_buffered_streams() {
        let mut con = BufferedConsole::new();
        con.put(b'A');
        con.print("BC");
        con.diag("P1234");
        assert_eq!(con.output_string(), "ABC");
        assert_eq!(con.diag_string(), "P1234");

        // clones share buffers
        let other = con.clone();
        con.put(b'D');
        assert_eq!(other.output_string(), "ABCD");
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        assert_eq!(clock.now_ms(), 0);
        handle.advance(5);
        assert_eq!(clock.now_ms(), 5);
    }
}
