//! Memory handling for the board.
//!
//! This module consists of:
//! - [`AddressSpace`]: RAM, the optional ROM, and the address decoder.
//! - [`AddressMap`]: The table routing non-memory addresses to [`Port`]s.
//! - [`MachineInitStrategy`]: How RAM is filled at power-on.

use rand::rngs::StdRng;
use rand::Rng;

use crate::cpu::Size;
use crate::err::{AddressFault, Region};

/// Highest valid RAM address (the board carries 128 KiB).
pub const MAX_RAM: u32 = 0x1FFFF;

/// Data register shared by the input and output devices.
pub const UART_DREG: u32 = 0x800A0;
/// Status/command register of the input device.
pub const UART_CREG: u32 = 0x800A1;

/// Mask and base selecting the debug port window.
pub const DEBUG_PORT_MASK: u32 = 0xFFF00;
/// See [`DEBUG_PORT_MASK`].
pub const DEBUG_PORT_BASE: u32 = 0x80100;

/// Trait that describes types that can be used to generate power-on RAM contents.
pub trait ByteFiller {
    /// Generate the data.
    fn generate(&mut self) -> u8;
}
impl ByteFiller for () {
    /// This creates unseeded, non-deterministic values.
    fn generate(&mut self) -> u8 {
        rand::random()
    }
}
impl ByteFiller for u8 {
    /// Sets each byte to the given value.
    fn generate(&mut self) -> u8 {
        *self
    }
}
impl ByteFiller for StdRng {
    /// This creates values from the standard random number generator.
    fn generate(&mut self) -> u8 {
        self.gen()
    }
}

/// Strategy used to fill RAM when the [`Simulator`] is created.
///
/// Real static RAM powers up with arbitrary contents;
/// the default here is all zeroes so that boot images behave reproducibly.
///
/// [`Simulator`]: super::Simulator
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MachineInitStrategy {
    /// Fills each byte randomly and non-deterministically.
    Unseeded,

    /// Fills each byte randomly and deterministically.
    Seeded {
        /// The seed the RNG was initialized with.
        seed: u64
    },

    /// Fills each byte with a known value.
    Known {
        /// The value to fill each byte with.
        value: u8
    }
}
impl Default for MachineInitStrategy {
    fn default() -> Self {
        MachineInitStrategy::Known { value: 0 }
    }
}
impl MachineInitStrategy {
    pub(super) fn generator(&self) -> impl ByteFiller {
        use rand::SeedableRng;

        match self {
            MachineInitStrategy::Unseeded => MIGenerator::Unseeded,
            MachineInitStrategy::Seeded { seed } => MIGenerator::Seeded(Box::new(StdRng::seed_from_u64(*seed))),
            MachineInitStrategy::Known { value } => MIGenerator::Known(*value),
        }
    }
}

enum MIGenerator {
    Unseeded,
    Seeded(Box<StdRng>),
    Known(u8)
}
impl ByteFiller for MIGenerator {
    fn generate(&mut self) -> u8 {
        match self {
            MIGenerator::Unseeded  => ().generate(),
            MIGenerator::Seeded(r) => r.generate(),
            MIGenerator::Known(k)  => k.generate(),
        }
    }
}

/// A memory-mapped register (anything on the bus that is not RAM or ROM).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    /// The debug monitor window.
    DebugPort,
    /// Input status (read) / input command (write).
    UartStatus,
    /// Input data (read) / output data (write).
    UartData,
}

/// How an [`AddressMap`] entry selects addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddrMatch {
    /// Exactly one address.
    Exact(u32),
    /// Every address where `addr & mask == base`.
    Window {
        /// Bits compared.
        mask: u32,
        /// Expected value of the compared bits.
        base: u32,
    },
}
impl AddrMatch {
    /// Whether this matcher selects `addr`.
    pub fn contains(&self, addr: u32) -> bool {
        match *self {
            AddrMatch::Exact(a) => a == addr,
            AddrMatch::Window { mask, base } => addr & mask == base,
        }
    }
}

/// The decode table for memory-mapped registers.
///
/// Entries are checked in order; the first match wins.
/// Anything not matched falls through to RAM.
#[derive(Debug, Clone)]
pub struct AddressMap {
    entries: Vec<(AddrMatch, Port)>
}
impl AddressMap {
    /// Creates an empty map (every access goes to RAM).
    pub fn empty() -> Self {
        Self { entries: vec![] }
    }

    /// Adds an entry to the end of the table.
    pub fn with(mut self, matcher: AddrMatch, port: Port) -> Self {
        self.entries.push((matcher, port));
        self
    }

    /// Finds the port mapped at `addr`.
    pub fn resolve(&self, addr: u32) -> Option<Port> {
        self.entries.iter()
            .find(|(m, _)| m.contains(addr))
            .map(|&(_, p)| p)
    }
}
impl Default for AddressMap {
    /// The board's memory map.
    fn default() -> Self {
        AddressMap::empty()
            .with(AddrMatch::Window { mask: DEBUG_PORT_MASK, base: DEBUG_PORT_BASE }, Port::DebugPort)
            .with(AddrMatch::Exact(UART_CREG), Port::UartStatus)
            .with(AddrMatch::Exact(UART_DREG), Port::UartData)
    }
}

/// Where an access ended up after decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// Offset into ROM.
    Rom(usize),
    /// Offset into RAM.
    Ram(usize),
    /// A memory-mapped register.
    Port(Port),
}

/// The board's storage and address decoder.
///
/// Note that this struct provides two methods of accessing memory:
/// - [`AddressSpace::peek`] and [`AddressSpace::poke`]: direct access to RAM,
///   which never reaches devices and never faults.
/// - [`AddressSpace::decode`] followed by a typed read/write: what the CPU sees.
///
/// Direct access is what the boot loader, the dictionary resolver, and the
/// disassembler use. CPU accesses go through [`Machine`], which routes ports to devices.
///
/// ```
/// use sbc68k::sim::mem::{AddressSpace, MachineInitStrategy};
///
/// let mut mem = AddressSpace::new(MachineInitStrategy::default(), None);
/// mem.poke(0x1000, 0x4E);
/// mem.poke(0x1001, 0x71);
/// assert_eq!(mem.peek_word(0x1000), 0x4E71);
/// ```
///
/// [`Machine`]: super::Machine
#[derive(Debug)]
pub struct AddressSpace {
    ram: Box<[u8]>,
    rom: Option<Box<[u8]>>,
    map: AddressMap,
}
impl AddressSpace {
    /// Creates RAM filled according to `init`, with an optional ROM image.
    pub fn new(init: MachineInitStrategy, rom: Option<Box<[u8]>>) -> Self {
        let mut filler = init.generator();
        Self {
            ram: std::iter::repeat_with(|| filler.generate())
                .take(MAX_RAM as usize + 1)
                .collect(),
            rom,
            map: AddressMap::default(),
        }
    }

    /// Installs a ROM image, replacing any previous one.
    pub fn install_rom(&mut self, rom: Box<[u8]>) {
        self.rom = Some(rom);
    }

    /// Whether a ROM image is installed.
    pub fn has_rom(&self) -> bool {
        self.rom.is_some()
    }

    /// The register decode table.
    pub fn map(&self) -> &AddressMap {
        &self.map
    }

    /// Decodes an access of `size` bytes at `addr`.
    ///
    /// `program` indicates the access came from a program-space function code.
    /// If ROM is installed, program-space accesses go to ROM; writes there always fault.
    pub fn decode(&self, addr: u32, size: Size, program: bool, write: Option<u32>) -> Result<Decoded, AddressFault> {
        if let (true, Some(rom)) = (program, &self.rom) {
            let fits = (addr as usize).checked_add(size.bytes() as usize)
                .is_some_and(|end| end <= rom.len());
            return match (write, fits) {
                (None, true) => Ok(Decoded::Rom(addr as usize)),
                (None, false) => Err(AddressFault::Read { size, region: Region::Rom, addr }),
                (Some(value), _) => Err(AddressFault::Write { size, region: Region::Rom, addr, value }),
            };
        }

        if let Some(port) = self.map.resolve(addr) {
            return Ok(Decoded::Port(port));
        }

        // The last byte of the access has to be in RAM too.
        match addr.checked_add(size.bytes() - 1) {
            Some(last) if last <= MAX_RAM => Ok(Decoded::Ram(addr as usize)),
            _ => match write {
                None => Err(AddressFault::Read { size, region: Region::Ram, addr }),
                Some(value) => Err(AddressFault::Write { size, region: Region::Ram, addr, value }),
            }
        }
    }

    /// Reads a big-endian value of `size` from ROM at a decoded offset.
    pub fn read_rom(&self, offset: usize, size: Size) -> u32 {
        self.rom.as_deref()
            .map_or(0, |rom| read_be(rom, offset, size))
    }
    /// Reads a big-endian value of `size` from RAM at a decoded offset.
    pub fn read_ram(&self, offset: usize, size: Size) -> u32 {
        read_be(&self.ram, offset, size)
    }
    /// Writes a big-endian value of `size` to RAM at a decoded offset.
    pub fn write_ram(&mut self, offset: usize, size: Size, value: u32) {
        let n = size.bytes() as usize;
        let bytes = value.to_be_bytes();
        self.ram[offset..offset + n].copy_from_slice(&bytes[4 - n..]);
    }

    /// Reads a RAM byte without side effects. Out-of-range addresses read as 0.
    pub fn peek(&self, addr: u32) -> u8 {
        self.ram.get(addr as usize).copied().unwrap_or(0)
    }
    /// Reads a big-endian RAM word without side effects.
    pub fn peek_word(&self, addr: u32) -> u16 {
        u16::from_be_bytes([self.peek(addr), self.peek(addr.wrapping_add(1))])
    }
    /// Writes a RAM byte without side effects.
    ///
    /// Returns whether the address was inside RAM (out-of-range writes are dropped).
    pub fn poke(&mut self, addr: u32, value: u8) -> bool {
        match self.ram.get_mut(addr as usize) {
            Some(b) => {
                *b = value;
                true
            },
            None => false,
        }
    }

    /// The RAM contents.
    pub fn ram(&self) -> &[u8] {
        &self.ram
    }
}

fn read_be(store: &[u8], offset: usize, size: Size) -> u32 {
    store[offset..offset + size.bytes() as usize]
        .iter()
        .fold(0, |acc, &b| (acc << 8) | u32::from(b))
}
