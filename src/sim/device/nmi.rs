use super::{Device, DeviceCtx, IRQ_NMI};
use crate::cpu::IrqAck;

/// The NMI button.
///
/// Pressing the button (see [`NmiDevice::raise`]) only latches a flag.
/// The interrupt is raised on the next update.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NmiDevice {
    raised: bool,
}
impl NmiDevice {
    /// Creates the device with the button released.
    pub fn new() -> Self {
        Default::default()
    }

    /// Presses the button.
    pub fn raise(&mut self) {
        self.raised = true;
    }

    /// Whether the button was pressed and not yet seen by an update.
    pub fn is_raised(&self) -> bool {
        self.raised
    }
}
impl Device for NmiDevice {
    fn level(&self) -> u8 {
        IRQ_NMI
    }

    fn reset(&mut self, _ctx: &mut DeviceCtx<'_>) {
        self.raised = false;
    }

    fn update(&mut self, ctx: &mut DeviceCtx<'_>) {
        if std::mem::take(&mut self.raised) {
            tracing::debug!("NMI raised");
            ctx.irq.set(IRQ_NMI);
        }
    }

    fn ack(&mut self, ctx: &mut DeviceCtx<'_>) -> IrqAck {
        ctx.console.print("\nNMI\n");
        ctx.irq.clear(IRQ_NMI);
        IrqAck::Autovector
    }
}
