//! Handlers for the devices connected to the board.
//!
//! The board carries three interrupt-driven devices, each on its own level:
//! - [`NmiDevice`] (level 7): the operator's non-maskable interrupt button.
//! - [`InputDevice`] (level 2): the keyboard side of the serial port.
//! - [`OutputDevice`] (level 1): the transmitter side of the serial port.
//!
//! The core types here are:
//! - [`Device`]: The capabilities every device has (reset, update, acknowledge).
//! - [`Register`]: The capabilities of devices reachable over the bus (read, write).
//! - [`DeviceCtx`]: What a device can touch while handling one of those calls.
//! - [`Devices`]: The set of devices on the board, dispatching acknowledge cycles by level.

mod input;
mod nmi;
mod output;

pub use input::{InputDevice, OperatorKey};
pub use nmi::NmiDevice;
pub use output::OutputDevice;

use crate::cpu::IrqAck;

use super::io::Console;
use super::irq::InterruptController;

/// Interrupt level of the NMI device.
pub const IRQ_NMI: u8 = 7;
/// Interrupt level of the input device.
pub const IRQ_INPUT: u8 = 2;
/// Interrupt level of the output device.
pub const IRQ_OUTPUT: u8 = 1;

/// Everything a device may touch while handling a call.
///
/// Devices share no state with each other. Anything crossing devices
/// goes through the interrupt controller or through the simulator.
pub struct DeviceCtx<'a> {
    /// The interrupt controller.
    pub irq: &'a mut InterruptController,
    /// The operator console.
    pub console: &'a mut dyn Console,
    /// The current time in milliseconds.
    pub now: u64,
}

/// A device attached to an interrupt level.
pub trait Device {
    /// The interrupt level this device raises.
    fn level(&self) -> u8;

    /// Puts the device back in its power-on state.
    fn reset(&mut self, ctx: &mut DeviceCtx<'_>);

    /// Called once after every CPU step.
    fn update(&mut self, ctx: &mut DeviceCtx<'_>);

    /// Called when the CPU acknowledges this device's interrupt level.
    fn ack(&mut self, _ctx: &mut DeviceCtx<'_>) -> IrqAck {
        IrqAck::Autovector
    }
}
impl dyn Device {} // assert Device is dyn safe

/// A device with a data register on the bus.
pub trait Register: Device {
    /// Reads the device's data register.
    fn read(&mut self, ctx: &mut DeviceCtx<'_>) -> u8;

    /// Writes the device's data register.
    fn write(&mut self, ctx: &mut DeviceCtx<'_>, value: u8);
}

/// The devices on the board.
#[derive(Debug)]
pub struct Devices {
    /// The NMI device.
    pub nmi: NmiDevice,
    /// The input device.
    pub input: InputDevice,
    /// The output device.
    pub output: OutputDevice,
}
impl Devices {
    /// Creates the board's devices, with the output device transmitting once every `output_period` ms.
    pub fn new(output_period: u64) -> Self {
        Self {
            nmi: NmiDevice::new(),
            input: InputDevice::new(),
            output: OutputDevice::new(output_period),
        }
    }

    /// Resets every device.
    pub fn reset(&mut self, ctx: &mut DeviceCtx<'_>) {
        self.nmi.reset(ctx);
        self.output.reset(ctx);
        self.input.reset(ctx);
    }

    /// Handles an interrupt acknowledge cycle at the given level.
    ///
    /// Levels without a device are spurious.
    pub fn ack(&mut self, level: u8, ctx: &mut DeviceCtx<'_>) -> IrqAck {
        let devices: [&mut dyn Device; 3] = [&mut self.nmi, &mut self.input, &mut self.output];
        devices.into_iter()
            .find(|d| d.level() == level)
            .map_or(IrqAck::Spurious, |d| d.ack(ctx))
    }

    /// The composite serial status register.
    ///
    /// Bit 0 is set when the input device has a byte ready,
    /// and bit 1 is set when the output device is idle.
    pub fn status(&self) -> u8 {
        u8::from(self.input.ready()) | u8::from(self.output.idle()) << 1
    }
}

#[cfg(test)]
mod tests {
    use super::{Device, DeviceCtx, Devices, IRQ_INPUT, IRQ_NMI, IRQ_OUTPUT};
    use crate::cpu::IrqAck;
    use crate::sim::io::BufferedConsole;
    use crate::sim::irq::InterruptController;

    #[test]
    fn test_ack_dispatch() {
        let mut irq = InterruptController::new();
        let mut con = BufferedConsole::new();
        let mut ctx = DeviceCtx { irq: &mut irq, console: &mut con, now: 0 };
        let mut devs = Devices::new(1);
        devs.reset(&mut ctx);
        assert_eq!(devs.nmi.level(), IRQ_NMI);
        assert_eq!(devs.input.level(), IRQ_INPUT);
        assert_eq!(devs.output.level(), IRQ_OUTPUT);

        for level in [IRQ_NMI, IRQ_INPUT, IRQ_OUTPUT] {
            assert_eq!(devs.ack(level, &mut ctx), IrqAck::Autovector);
        }
        for level in [0, 3, 4, 5, 6] {
            assert_eq!(devs.ack(level, &mut ctx), IrqAck::Spurious);
        }
        assert_eq!(con.output_string(), "\nNMI\n");
    }

    #[test]
    fn test_status() {
        let mut irq = InterruptController::new();
        let mut con = BufferedConsole::with_input("k");
        let mut ctx = DeviceCtx { irq: &mut irq, console: &mut con, now: 0 };
        let mut devs = Devices::new(1);
        devs.reset(&mut ctx);
        assert_eq!(devs.status(), 0b10);

        devs.input.update(&mut ctx);
        assert_eq!(devs.status(), 0b11);
    }
}
