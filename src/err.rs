//! Error types raised by the board.
//!
//! - [`AddressFault`]: an illegal bus access (always fatal).
//! - [`SimErr`]: anything that stops the run loop abnormally.
//! - [`BootErr`]: a boot image could not be streamed into memory.
//! - [`BootLexErr`]: a malformed boot record (recovered by skipping it).

use std::path::PathBuf;

use thiserror::Error;

use crate::cpu::Size;

/// Which store an illegal access was decoded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    /// The program ROM.
    Rom,
    /// The main RAM.
    Ram,
}
impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Region::Rom => f.write_str("ROM"),
            Region::Ram => f.write_str("RAM"),
        }
    }
}

/// An out-of-range access, or a write to ROM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AddressFault {
    /// A read decoded to an address the store does not have.
    #[error("Attempted to read {size} from {region} address {addr:08x}")]
    Read {
        /// Access width.
        size: Size,
        /// Store the access decoded to.
        region: Region,
        /// Faulting address.
        addr: u32,
    },
    /// A write decoded to an address the store does not have (or to ROM).
    #[error("Attempted to write {} to {region} address {addr:08x}", fmt_value(.size, .value))]
    Write {
        /// Access width.
        size: Size,
        /// Store the access decoded to.
        region: Region,
        /// Faulting address.
        addr: u32,
        /// Value being written.
        value: u32,
    },
}
impl AddressFault {
    /// The faulting address.
    pub fn addr(&self) -> u32 {
        match *self {
            AddressFault::Read { addr, .. } | AddressFault::Write { addr, .. } => addr,
        }
    }
}
fn fmt_value(size: &Size, value: &u32) -> String {
    let value = *value;
    match size {
        Size::Byte => format!("{:02x}", value & 0xFF),
        Size::Word => format!("{:04x}", value & 0xFFFF),
        Size::Long => format!("{value:08x}"),
    }
}

/// Errors that stop the simulator.
#[derive(Debug, Error)]
pub enum SimErr {
    /// The bus decoded an illegal access.
    #[error(transparent)]
    AddressFault(#[from] AddressFault),
}

/// Errors that occur while streaming boot images.
#[derive(Debug, Error)]
pub enum BootErr {
    /// The boot image could not be opened or read.
    #[error("Unable to open {}", .path.display())]
    Open {
        /// Path of the image.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The ROM image could not be read or is empty.
    #[error("Error reading {}", .0.display())]
    Rom(PathBuf),
}

/// Errors that end a command-line run.
#[derive(Debug, Error)]
pub enum LaunchErr {
    /// The ROM or a boot image could not be loaded.
    #[error(transparent)]
    Boot(#[from] BootErr),
    /// The program made an illegal access. This holds the full fault diagnostic.
    #[error("{0}")]
    Fault(String),
}

/// Any errors raised while tokenizing a boot record stream.
///
/// These are never fatal. The loader skips the offending characters and continues.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Error)]
pub enum BootLexErr {
    /// An address flag (`=`, `%`, `P`, `Q`, `R`) was not followed by any hex digits.
    #[error("address flag without hex digits")]
    MissingDigits,
    /// A character that does not start any boot record.
    #[default]
    #[error("unrecognized symbol")]
    InvalidSymbol,
}

#[cfg(test)]
mod tests {
    use super::{AddressFault, Region};
    use crate::cpu::Size;

    #[test]
    fn test_fault_messages() {
        let read = AddressFault::Read { size: Size::Word, region: Region::Ram, addr: 0x20000 };
        assert_eq!(read.to_string(), "Attempted to read word from RAM address 00020000");

        let write = AddressFault::Write { size: Size::Byte, region: Region::Ram, addr: 0x30001, value: 0x1241 };
        assert_eq!(write.to_string(), "Attempted to write 41 to RAM address 00030001");

        let rom = AddressFault::Write { size: Size::Long, region: Region::Rom, addr: 0x10, value: 0xDEADBEEF };
        assert_eq!(rom.to_string(), "Attempted to write deadbeef to ROM address 00000010");
    }
}
