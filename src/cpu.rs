//! The contract between the board and a 68000 instruction core.
//!
//! The board never decodes instructions itself. Instead, it drives a core through [`CpuCore`]
//! and hands it a [`CpuBus`] to perform every memory access, function code change,
//! reset pulse, and interrupt acknowledgement on.
//!
//! The core types here are:
//! - [`CpuCore`]: The instruction core (supplied by the host).
//! - [`CpuBus`]: The callbacks the board supplies to the core.
//! - [`FunctionCode`]: The 68000 function code pins.
//! - [`IrqAck`]: The result of an interrupt acknowledge cycle.

use crate::sim::mem::AddressSpace;

/// The value of the 68000's function code pins (FC0-FC2).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionCode(pub u8);
impl FunctionCode {
    /// User data access.
    pub const USER_DATA: Self = Self(1);
    /// User program access.
    pub const USER_PROGRAM: Self = Self(2);
    /// Supervisor data access.
    pub const SUPERVISOR_DATA: Self = Self(5);
    /// Supervisor program access.
    pub const SUPERVISOR_PROGRAM: Self = Self(6);
    /// Interrupt acknowledge cycle.
    pub const CPU_SPACE: Self = Self(7);

    /// Whether this access fetches from program space.
    pub fn is_program(self) -> bool {
        self.0 & 0b010 != 0 && self.0 != Self::CPU_SPACE.0
    }
}

/// How an interrupt acknowledge cycle was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrqAck {
    /// The core derives the vector from the interrupt level.
    Autovector,
    /// No device answered the acknowledge cycle.
    Spurious,
}

/// The operand size of a bus access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Size {
    /// 8 bits.
    Byte,
    /// 16 bits.
    Word,
    /// 32 bits.
    Long,
}
impl Size {
    /// Number of bytes moved by an access of this size.
    pub fn bytes(self) -> u32 {
        match self {
            Size::Byte => 1,
            Size::Word => 2,
            Size::Long => 4,
        }
    }
}
impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Size::Byte => f.write_str("byte"),
            Size::Word => f.write_str("word"),
            Size::Long => f.write_str("long"),
        }
    }
}

/// The callbacks a core uses to reach the rest of the board.
///
/// Word and long values are big-endian. Only the low bits of a written value
/// that fit the access size are used.
pub trait CpuBus {
    /// Reads a byte, zero-extended.
    fn read_byte(&mut self, addr: u32) -> u32;
    /// Reads a word, zero-extended.
    fn read_word(&mut self, addr: u32) -> u32;
    /// Reads a long.
    fn read_long(&mut self, addr: u32) -> u32;

    /// Writes a byte.
    fn write_byte(&mut self, addr: u32, value: u32);
    /// Writes a word.
    fn write_word(&mut self, addr: u32, value: u32);
    /// Writes a long.
    fn write_long(&mut self, addr: u32, value: u32);

    /// Called whenever the core changes its function code pins.
    fn set_fc(&mut self, fc: FunctionCode);
    /// Called when the core executes `RESET`.
    fn pulse_reset(&mut self);
    /// Called when the core acknowledges an interrupt at the given level.
    fn irq_ack(&mut self, level: u8) -> IrqAck;
}
impl dyn CpuBus {} // assert CpuBus is dyn safe

/// An instruction core driven by the board.
///
/// The registration hooks (`set_breakpoint`, `set_wordtrace`, `set_donext`) are
/// forwarded from the boot loader. They default to doing nothing, since the
/// board keeps its own copy of every registered address.
pub trait CpuCore {
    /// Pulses the reset line, loading the initial stack pointer and program counter.
    fn reset(&mut self, bus: &mut dyn CpuBus);

    /// Executes exactly one instruction.
    fn step(&mut self, bus: &mut dyn CpuBus);

    /// Sets the interrupt level presented on the IPL pins (0 = none).
    fn set_irq_level(&mut self, level: u8);

    /// The program counter of the next instruction to execute.
    fn pc(&self) -> u32;

    /// The program counter of the last instruction that started executing.
    fn prev_pc(&self) -> u32;

    /// Disassembles the instruction at `pc`.
    ///
    /// This must only use effect-free accesses on `mem`.
    fn disassemble(&self, mem: &AddressSpace, pc: u32) -> String {
        format!("dc.w ${:04x}", mem.peek_word(pc))
    }

    /// A breakpoint was registered at `addr`.
    fn set_breakpoint(&mut self, _addr: u16) {}
    /// A word-trace address was registered.
    fn set_wordtrace(&mut self, _addr: u16) {}
    /// A do-next address was registered.
    fn set_donext(&mut self, _addr: u16) {}
}

#[cfg(test)]
mod tests {
    use super::FunctionCode;

    #[test]
    fn test_program_space() {
        assert!(FunctionCode::USER_PROGRAM.is_program());
        assert!(FunctionCode::SUPERVISOR_PROGRAM.is_program());
        assert!(!FunctionCode::USER_DATA.is_program());
        assert!(!FunctionCode::SUPERVISOR_DATA.is_program());
        assert!(!FunctionCode::CPU_SPACE.is_program());
    }
}
