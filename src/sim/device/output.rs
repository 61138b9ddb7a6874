use super::{Device, DeviceCtx, Register, IRQ_OUTPUT};

/// The transmitter side of the serial port.
///
/// A written byte goes out immediately if the transmitter is idle.
/// The transmitter then stays busy for one period, after which it goes idle
/// and raises its interrupt. A byte written while busy is held until the
/// transmitter goes idle; writing again while busy replaces the held byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDevice {
    period: u64,
    idle: bool,
    pending: Option<u8>,
    last_output: u64,
}
impl OutputDevice {
    /// Creates an idle transmitter which stays busy for `period` ms after each byte.
    pub fn new(period: u64) -> Self {
        Self {
            period,
            idle: true,
            pending: None,
            last_output: 0,
        }
    }

    /// Whether the transmitter can take a byte right away.
    pub fn idle(&self) -> bool {
        self.idle
    }

    /// Pushes the last transmit time forward by `ms`.
    ///
    /// Used to discount time the board spent paused.
    pub fn rebaseline(&mut self, ms: u64) {
        self.last_output = self.last_output.saturating_add(ms);
    }

    fn transmit(&mut self, ctx: &mut DeviceCtx<'_>, byte: u8) {
        ctx.console.put(byte);
        self.idle = false;
        self.last_output = ctx.now;
        ctx.irq.clear(IRQ_OUTPUT);
    }
}
impl Default for OutputDevice {
    fn default() -> Self {
        Self::new(1)
    }
}
impl Device for OutputDevice {
    fn level(&self) -> u8 {
        IRQ_OUTPUT
    }

    fn reset(&mut self, ctx: &mut DeviceCtx<'_>) {
        self.last_output = ctx.now;
        self.pending = None;
        self.idle = true;
        ctx.irq.clear(IRQ_OUTPUT);
    }

    fn update(&mut self, ctx: &mut DeviceCtx<'_>) {
        if self.idle {
            if let Some(byte) = self.pending.take() {
                self.transmit(ctx, byte);
            }
        } else if ctx.now.saturating_sub(self.last_output) >= self.period {
            self.idle = true;
            ctx.irq.set(IRQ_OUTPUT);
        }
    }
}
impl Register for OutputDevice {
    fn read(&mut self, ctx: &mut DeviceCtx<'_>) -> u8 {
        ctx.irq.clear(IRQ_OUTPUT);
        0
    }

    fn write(&mut self, ctx: &mut DeviceCtx<'_>, value: u8) {
        if self.idle {
            self.transmit(ctx, value);
        } else if let Some(dropped) = self.pending.replace(value) {
            tracing::debug!(dropped, "output overrun");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::OutputDevice;
    use crate::sim::device::{Device, DeviceCtx, Register, IRQ_OUTPUT};
    use crate::sim::io::BufferedConsole;
    use crate::sim::irq::InterruptController;

    #[test]
    fn test_pacing() {
        let mut irq = InterruptController::new();
        let mut con = BufferedConsole::new();
        let mut ctx = DeviceCtx { irq: &mut irq, console: &mut con, now: 100 };
        let mut out = OutputDevice::new(1);
        out.reset(&mut ctx);

        // idle: goes out right away
        out.write(&mut ctx, b'A');
        assert!(!out.idle());

        // busy: held
        out.write(&mut ctx, b'B');
        out.update(&mut ctx);
        assert!(!out.idle());
        assert!(!ctx.irq.is_pending(IRQ_OUTPUT));

        // one period later: idle and interrupting
        ctx.now = 101;
        out.update(&mut ctx);
        assert!(out.idle());
        assert!(ctx.irq.is_pending(IRQ_OUTPUT));

        // the held byte goes out on the next update
        out.update(&mut ctx);
        assert!(!out.idle());
        assert!(!ctx.irq.is_pending(IRQ_OUTPUT));

        assert_eq!(con.output_string(), "AB");
    }

    #[test]
    fn test_overrun_drops_earlier() {
        let mut irq = InterruptController::new();
        let mut con = BufferedConsole::new();
        let mut ctx = DeviceCtx { irq: &mut irq, console: &mut con, now: 0 };
        let mut out = OutputDevice::new(1);
        out.reset(&mut ctx);

        out.write(&mut ctx, b'1');
        out.write(&mut ctx, b'2');
        out.write(&mut ctx, b'3');
        ctx.now = 1;
        out.update(&mut ctx);
        out.update(&mut ctx);

        assert_eq!(con.output_string(), "13");
    }

    #[test]
    fn test_longer_period() {
        let mut irq = InterruptController::new();
        let mut con = BufferedConsole::new();
        let mut ctx = DeviceCtx { irq: &mut irq, console: &mut con, now: 0 };
        let mut out = OutputDevice::new(10);
        out.reset(&mut ctx);

        out.write(&mut ctx, b'x');
        ctx.now = 9;
        out.update(&mut ctx);
        assert!(!out.idle());

        out.rebaseline(5);
        ctx.now = 14;
        out.update(&mut ctx);
        assert!(!out.idle());
        ctx.now = 15;
        out.update(&mut ctx);
        assert!(out.idle());
    }

    #[test]
    fn test_read_clears_interrupt() {
        let mut irq = InterruptController::new();
        let mut con = BufferedConsole::new();
        let mut ctx = DeviceCtx { irq: &mut irq, console: &mut con, now: 0 };
        let mut out = OutputDevice::new(1);
        out.reset(&mut ctx);

        out.write(&mut ctx, b'x');
        ctx.now = 1;
        out.update(&mut ctx);
        assert!(ctx.irq.is_pending(IRQ_OUTPUT));

        assert_eq!(out.read(&mut ctx), 0);
        assert!(!ctx.irq.is_pending(IRQ_OUTPUT));
        assert!(out.idle());
    }
}
