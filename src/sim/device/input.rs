use super::{Device, DeviceCtx, Register, IRQ_INPUT};

const ESC: u8 = 0x1B;
const CTRL_F: u8 = 0x06;
const CTRL_P: u8 = 0x10;

/// A keystroke the input device handed to the simulator instead of the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKey {
    /// `ESC`: stop the simulator.
    Quit,
    /// `~`: press the NMI button.
    Nmi,
    /// `Ctrl-P`: read one boot-record line from the operator.
    FrontPanel,
    /// `Ctrl-F`: look up a dictionary entry by name.
    Lookup,
}

/// The keyboard side of the serial port.
///
/// Each update probes the console once (only while no byte is waiting)
/// and keeps the interrupt asserted for as long as a byte is waiting.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InputDevice {
    ready: bool,
    value: u8,
    last_key: Option<u8>,
    signal: Option<OperatorKey>,
}
impl InputDevice {
    /// Creates the device with nothing waiting.
    pub fn new() -> Self {
        Default::default()
    }

    /// Whether a byte is waiting to be read.
    pub fn ready(&self) -> bool {
        self.ready
    }

    /// Takes the operator key found by the last probe, if any.
    pub fn take_signal(&mut self) -> Option<OperatorKey> {
        self.signal.take()
    }

    fn probe(&mut self, ctx: &mut DeviceCtx<'_>) {
        // only the most recent key counts
        let mut key = None;
        while let Some(k) = ctx.console.poll_key() {
            key = Some(k);
        }
        let Some(key) = key else { return };

        match key {
            ESC => self.signal = Some(OperatorKey::Quit),
            b'~' => if self.last_key != Some(b'~') {
                self.signal = Some(OperatorKey::Nmi);
            },
            CTRL_P => self.signal = Some(OperatorKey::FrontPanel),
            CTRL_F => self.signal = Some(OperatorKey::Lookup),
            _ => {
                tracing::trace!(key, "input ready");
                self.ready = true;
                self.value = key;
            }
        }
        self.last_key = Some(key);
    }
}
impl Device for InputDevice {
    fn level(&self) -> u8 {
        IRQ_INPUT
    }

    fn reset(&mut self, ctx: &mut DeviceCtx<'_>) {
        self.ready = false;
        ctx.irq.clear(IRQ_INPUT);
    }

    fn update(&mut self, ctx: &mut DeviceCtx<'_>) {
        if !self.ready {
            self.probe(ctx);
        }
        if self.ready {
            ctx.irq.set(IRQ_INPUT);
        }
    }
}
impl Register for InputDevice {
    fn read(&mut self, ctx: &mut DeviceCtx<'_>) -> u8 {
        ctx.irq.clear(IRQ_INPUT);
        self.ready = false;
        self.value
    }

    fn write(&mut self, _ctx: &mut DeviceCtx<'_>, _value: u8) {}
}
