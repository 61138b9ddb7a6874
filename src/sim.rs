//! Simulating the board around a 68000 core.
//!
//! This module is focused on everything the board does between instructions:
//! decoding bus accesses, driving devices, and raising interrupts.
//!
//! This module consists of:
//! - [`Simulator`]: The struct that runs a [`CpuCore`] against the board.
//! - [`Machine`]: The board itself, which the core sees through [`CpuBus`].
//! - [`mem`]: The module handling RAM, ROM, and address decoding.
//! - [`irq`]: The module handling the interrupt controller.
//! - [`device`]: The module handling the NMI, input, and output devices.
//! - [`monitor`]: The module handling the debug port.
//! - [`debug`]: The module handling breakpoints and word tracing.
//! - [`dict`]: The module handling lookups in the resident dictionary.
//! - [`io`]: The module handling the operator console and the clock.
//!
//! # Usage
//!
//! To simulate a program, you need a core, a console, and a clock.
//! Boot images are loaded before the core is reset:
//!
//! ```no_run
//! use sbc68k::sim::{Simulator, SimFlags};
//! use sbc68k::sim::io::{MonotonicClock, StdConsole};
//! # use sbc68k::cpu::{CpuBus, CpuCore};
//! # struct Core;
//! # impl CpuCore for Core {
//! #     fn reset(&mut self, _: &mut dyn CpuBus) {}
//! #     fn step(&mut self, _: &mut dyn CpuBus) {}
//! #     fn set_irq_level(&mut self, _: u8) {}
//! #     fn pc(&self) -> u32 { 0 }
//! #     fn prev_pc(&self) -> u32 { 0 }
//! # }
//! # fn core() -> Core { panic!("supplied by the host") }
//!
//! let mut sim = Simulator::new(core(), StdConsole::new(), MonotonicClock::new(), SimFlags::default());
//! sim.boot_files(&["monitor.hex"]).unwrap();
//! sim.reset();
//! sim.run().unwrap();
//! ```
//!
//! ## Flags
//!
//! All of the available flags can be found in [`SimFlags`].
//!
//! ## Operator keys
//!
//! While running, the console's keystrokes go to the input device, except:
//! - `ESC` stops the simulator.
//! - `~` presses the NMI button.
//! - `Ctrl-P` reads one line of boot records (prompt `;`) and applies it to live memory.
//! - `Ctrl-F` looks up a dictionary entry by name (prompt `name>`).

pub mod debug;
pub mod device;
pub mod dict;
pub mod io;
pub mod irq;
pub mod mem;
pub mod monitor;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::boot::{BootLoader, BootPass, BootTarget};
use crate::cpu::{CpuBus, CpuCore, FunctionCode, IrqAck, Size};
use crate::err::{AddressFault, BootErr, SimErr};

use self::debug::Debugger;
use self::device::{Device, DeviceCtx, Devices, OperatorKey, Register};
use self::io::{Clock, Console};
use self::irq::InterruptController;
use self::mem::{AddressSpace, Decoded, MachineInitStrategy, Port};
use self::monitor::DebugMonitor;

/// Configuration flags for [`Simulator`].
///
/// Read the field descriptions for more details.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SimFlags {
    /// How long the output device stays busy after sending a byte, in milliseconds.
    ///
    /// By default, this is `1`.
    pub output_period_ms: u64,

    /// Whether time spent waiting on the operator should be hidden from the output device.
    ///
    /// The debug port, breakpoints, and operator prompts all block the board.
    /// - **leak** (`false`): the blocked time counts towards the output device's period,
    ///     so the output device is usually idle right after the board resumes.
    /// - **rebaseline** (`true`): the output device's last transmit time is pushed forward by the blocked time.
    ///
    /// By default, this flag is `false`.
    pub rebaseline_after_pause: bool,

    /// The power-on contents of RAM.
    ///
    /// This only goes into effect in [`Simulator::new`].
    ///
    /// By default, this is [`MachineInitStrategy::default`].
    pub ram_init: MachineInitStrategy,
}

impl Default for SimFlags {
    fn default() -> Self {
        Self {
            output_period_ms: 1,
            rebaseline_after_pause: false,
            ram_init: Default::default(),
        }
    }
}

/// Reason for why execution paused if it wasn't due to an error.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum PauseCondition {
    /// The operator stopped the simulator (`ESC`), or the machine control flag was unset.
    Quit,
    /// Tripwire condition returned false.
    Tripwire,
    /// Program hit an error and did not pause successfully.
    #[default]
    Unsuccessful,
}

/// The board: memory, devices, and the interrupt controller.
///
/// This is what the core sees through [`CpuBus`].
pub struct Machine {
    /// RAM, ROM, and the address decoder.
    pub mem: AddressSpace,
    /// The interrupt controller.
    pub irq: InterruptController,
    /// The NMI, input, and output devices.
    pub devices: Devices,
    /// The debug port monitor.
    pub monitor: DebugMonitor,
    /// Breakpoint and trace registrations.
    pub debugger: Debugger,

    console: Box<dyn Console>,
    clock: Box<dyn Clock>,
    fc: FunctionCode,
    fault: Option<AddressFault>,
    rebaseline: bool,
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("irq", &self.irq)
            .field("devices", &self.devices)
            .field("monitor", &self.monitor)
            .field("debugger", &self.debugger)
            .field("fc", &self.fc)
            .field("fault", &self.fault)
            .finish_non_exhaustive()
    }
}

/// Builds a [`DeviceCtx`] out of a [`Machine`]'s fields, leaving the rest of the machine borrowable.
macro_rules! device_ctx {
    ($m:expr) => {
        DeviceCtx {
            irq: &mut $m.irq,
            console: &mut *$m.console,
            now: $m.clock.now_ms(),
        }
    };
}

impl Machine {
    fn new(console: Box<dyn Console>, clock: Box<dyn Clock>, flags: &SimFlags) -> Self {
        Self {
            mem: AddressSpace::new(flags.ram_init, None),
            irq: InterruptController::new(),
            devices: Devices::new(flags.output_period_ms),
            monitor: DebugMonitor::new(),
            debugger: Debugger::new(),
            console,
            clock,
            fc: FunctionCode::SUPERVISOR_PROGRAM,
            fault: None,
            rebaseline: flags.rebaseline_after_pause,
        }
    }

    /// The first illegal access, if one has happened.
    pub fn fault(&self) -> Option<AddressFault> {
        self.fault
    }

    /// The current function code.
    pub fn fc(&self) -> FunctionCode {
        self.fc
    }

    /// The operator console.
    pub fn console(&mut self) -> &mut dyn Console {
        &mut *self.console
    }

    /// Records an illegal access. Only the first one is kept.
    fn raise_fault(&mut self, fault: AddressFault) {
        if self.fault.is_none() {
            tracing::debug!("bus fault: {fault}");
            self.fault = Some(fault);
        }
    }

    /// Runs something that waits on the operator,
    /// hiding the time it took from the output device if configured to.
    fn blocking<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let start = self.clock.now_ms();
        let result = f(self);
        let waited = self.clock.now_ms().saturating_sub(start);

        if self.rebaseline && waited > 0 {
            tracing::debug!(waited, "rebaselining output timer");
            self.devices.output.rebaseline(waited);
        }
        result
    }

    fn reset_devices(&mut self) {
        let mut ctx = device_ctx!(self);
        self.devices.reset(&mut ctx);
    }

    fn read(&mut self, addr: u32, size: Size) -> u32 {
        if self.fault.is_some() {
            return 0;
        }

        match self.mem.decode(addr, size, self.fc.is_program(), None) {
            Ok(Decoded::Rom(offset)) => self.mem.read_rom(offset, size),
            Ok(Decoded::Ram(offset)) => self.mem.read_ram(offset, size),
            Ok(Decoded::Port(port)) => self.read_port(port, addr) & size_mask(size),
            Err(fault) => {
                self.raise_fault(fault);
                0
            }
        }
    }

    fn write(&mut self, addr: u32, size: Size, value: u32) {
        if self.fault.is_some() {
            return;
        }

        match self.mem.decode(addr, size, self.fc.is_program(), Some(value)) {
            Ok(Decoded::Ram(offset)) => self.mem.write_ram(offset, size, value),
            Ok(Decoded::Port(port)) => self.write_port(port, addr, value),
            // ROM writes are rejected by the decoder, so this can't happen.
            Ok(Decoded::Rom(_)) => {},
            Err(fault) => self.raise_fault(fault),
        }
    }

    fn read_port(&mut self, port: Port, addr: u32) -> u32 {
        match port {
            Port::DebugPort => self.blocking(|m| m.monitor.read(&mut *m.console, addr)),
            Port::UartStatus => u32::from(self.devices.status()),
            Port::UartData => {
                let mut ctx = device_ctx!(self);
                u32::from(self.devices.input.read(&mut ctx))
            },
        }
    }

    fn write_port(&mut self, port: Port, addr: u32, value: u32) {
        match port {
            Port::DebugPort => self.monitor.write(&mut *self.console, addr, value),
            Port::UartStatus => {
                let mut ctx = device_ctx!(self);
                self.devices.input.write(&mut ctx, value as u8);
            },
            Port::UartData => {
                let mut ctx = device_ctx!(self);
                self.devices.output.write(&mut ctx, value as u8);
            },
        }
    }
}

fn size_mask(size: Size) -> u32 {
    match size {
        Size::Byte => 0xFF,
        Size::Word => 0xFFFF,
        Size::Long => 0xFFFF_FFFF,
    }
}

impl CpuBus for Machine {
    fn read_byte(&mut self, addr: u32) -> u32 {
        self.read(addr, Size::Byte)
    }
    fn read_word(&mut self, addr: u32) -> u32 {
        self.read(addr, Size::Word)
    }
    fn read_long(&mut self, addr: u32) -> u32 {
        self.read(addr, Size::Long)
    }

    fn write_byte(&mut self, addr: u32, value: u32) {
        self.write(addr, Size::Byte, value & 0xFF)
    }
    fn write_word(&mut self, addr: u32, value: u32) {
        self.write(addr, Size::Word, value & 0xFFFF)
    }
    fn write_long(&mut self, addr: u32, value: u32) {
        self.write(addr, Size::Long, value)
    }

    fn set_fc(&mut self, fc: FunctionCode) {
        self.fc = fc;
    }

    fn pulse_reset(&mut self) {
        tracing::debug!("RESET pulsed");
        self.reset_devices();
    }

    fn irq_ack(&mut self, level: u8) -> IrqAck {
        let mut ctx = device_ctx!(self);
        self.devices.ack(level, &mut ctx)
    }
}

/// Where boot records land once the board is running:
/// memory plus the debugger and core registration hooks.
struct LiveTarget<'a> {
    mem: &'a mut AddressSpace,
    debugger: &'a mut Debugger,
    core: &'a mut dyn CpuCore,
}
impl BootTarget for LiveTarget<'_> {
    fn poke(&mut self, addr: u32, value: u8) -> bool {
        self.mem.poke(addr, value)
    }

    fn peek(&self, addr: u32) -> u8 {
        self.mem.peek(addr)
    }

    fn set_breakpoint(&mut self, addr: u16) {
        self.debugger.set_breakpoint(addr);
        self.core.set_breakpoint(addr);
    }

    fn set_wordtrace(&mut self, addr: u16) {
        self.debugger.set_wordtrace(addr);
        self.core.set_wordtrace(addr);
    }

    fn set_donext(&mut self, addr: u16) {
        self.debugger.set_donext(addr);
        self.core.set_donext(addr);
    }
}

/// Machine control.
///
/// If unset, the simulator stops before its next step.
pub type MCR = Arc<AtomicBool>;

/// Runs a [`CpuCore`] on the board.
pub struct Simulator<C> {
    core: C,
    machine: Machine,

    /// The front panel's loader. Its cursor persists between operator lines.
    front_panel: BootLoader,

    /// The number of instructions successfully run since this `Simulator` was initialized.
    ///
    /// This can be set to 0 to reset the counter.
    pub instructions_run: u64,

    /// Indicates the reason why the last execution (via [`Simulator::run_while`] and adjacent)
    /// had paused.
    pause_condition: PauseCondition,

    /// Machine control.
    mcr: MCR,

    /// Configuration settings for the simulator.
    flags: SimFlags,
}

impl<C: CpuCore> Simulator<C> {
    /// Creates a new simulator around the given core, console, and clock.
    ///
    /// RAM is filled according to [`SimFlags::ram_init`]. Nothing is loaded and the core is not reset.
    pub fn new(core: C, console: impl Console + 'static, clock: impl Clock + 'static, flags: SimFlags) -> Self {
        Self {
            core,
            machine: Machine::new(Box::new(console), Box::new(clock), &flags),
            front_panel: BootLoader::new(),
            instructions_run: 0,
            pause_condition: Default::default(),
            mcr: Arc::new(AtomicBool::new(false)),
            flags,
        }
    }

    /// The CPU core.
    pub fn core(&self) -> &C {
        &self.core
    }
    /// The CPU core.
    pub fn core_mut(&mut self) -> &mut C {
        &mut self.core
    }
    /// The board.
    pub fn machine(&self) -> &Machine {
        &self.machine
    }
    /// The board.
    pub fn machine_mut(&mut self) -> &mut Machine {
        &mut self.machine
    }
    /// The flags the simulator was created with.
    pub fn flags(&self) -> &SimFlags {
        &self.flags
    }
    /// A reference to the machine control flag.
    ///
    /// Anything holding this can stop the simulator (by storing `false`).
    pub fn mcr(&self) -> &MCR {
        &self.mcr
    }
    /// Why the last run stopped.
    pub fn pause_condition(&self) -> PauseCondition {
        self.pause_condition
    }

    /// Installs a ROM image. Program-space accesses are served from it from now on.
    pub fn install_rom(&mut self, rom: impl Into<Box<[u8]>>) {
        let rom = rom.into();
        tracing::info!("installed {} byte ROM", rom.len());
        self.machine.mem.install_rom(rom);
    }

    /// Reads a ROM image from a file and installs it.
    ///
    /// # Errors
    /// This fails if the file can't be read or is empty.
    pub fn load_rom(&mut self, path: impl AsRef<Path>) -> Result<(), BootErr> {
        let path = path.as_ref();
        match std::fs::read(path) {
            Ok(bytes) if !bytes.is_empty() => {
                self.install_rom(bytes);
                Ok(())
            },
            _ => Err(BootErr::Rom(path.to_path_buf())),
        }
    }

    fn live_target(&mut self) -> (LiveTarget<'_>, &mut dyn Console) {
        let target = LiveTarget {
            mem: &mut self.machine.mem,
            debugger: &mut self.machine.debugger,
            core: &mut self.core,
        };
        (target, &mut *self.machine.console)
    }

    /// Applies one boot image (as a string of records) to memory.
    ///
    /// Each image starts with a fresh write cursor at address 0.
    pub fn boot_image(&mut self, src: &str) -> BootPass {
        let (mut target, console) = self.live_target();
        BootLoader::new().feed(src, &mut target, console)
    }

    /// Loads every boot image file in order, wrapped in the boot banner.
    ///
    /// This prints the `;` prompt (on the diagnostic stream) before the first image
    /// and `run...` after the last.
    ///
    /// # Errors
    /// This stops at the first file that can't be opened.
    pub fn boot_files(&mut self, paths: &[impl AsRef<Path>]) -> Result<(), BootErr> {
        self.machine.console.diag(";");

        for path in paths {
            let path = path.as_ref();
            let bytes = std::fs::read(path).map_err(|source| BootErr::Open {
                path: PathBuf::from(path),
                source,
            })?;

            let pass = self.boot_image(&String::from_utf8_lossy(&bytes));
            tracing::info!(
                "loaded {}: {} words{}",
                path.display(),
                pass.words,
                if pass.skipped > 0 { format!(", {} malformed records skipped", pass.skipped) } else { String::new() }
            );
        }

        self.machine.console.print("\nrun...");
        self.machine.debugger.resolve_trace(&self.machine.mem);
        Ok(())
    }

    /// Resets the core and every device.
    ///
    /// Memory, breakpoints, and the front panel cursor are kept.
    pub fn reset(&mut self) {
        self.machine.fault = None;
        self.machine.irq = InterruptController::new();
        self.core.reset(&mut self.machine);
        self.machine.reset_devices();
        self.sync_irq();
        self.pause_condition = Default::default();
    }

    /// Passes the interrupt controller's latest level on to the core.
    fn sync_irq(&mut self) {
        if let Some(level) = self.machine.irq.take_signal() {
            self.core.set_irq_level(level);
        }
    }

    /// The fault diagnostic: the fault itself, then the instruction that caused it.
    ///
    /// Returns `None` if no fault has happened.
    pub fn fault_report(&self) -> Option<String> {
        let fault = self.machine.fault?;
        let ppc = self.core.prev_pc();
        let disasm = self.core.disassemble(&self.machine.mem, ppc);
        Some(format!("{fault}\nAt {ppc:04x}: {disasm}"))
    }

    fn check_debugger(&mut self) {
        let pc = self.core.pc();
        let hit = self.machine.debugger.check(pc);

        if hit.traced {
            let disasm = self.core.disassemble(&self.machine.mem, pc);
            tracing::info!("trace {pc:05X}: {disasm}");
        }
        if hit.donext {
            let word = u16::try_from(pc).ok()
                .and_then(|pc| dict::lookup_by_address(&self.machine.mem, pc))
                .map(|e| e.name(&self.machine.mem));
            tracing::info!("do-next {pc:05X} in {}", word.as_deref().unwrap_or("?"));
        }
        if hit.breakpoint {
            self.machine.blocking(|m| m.monitor.pause(&mut *m.console, pc));
        }
    }

    /// Simulate one step: execute one instruction, then update the output, input, and NMI devices.
    ///
    /// # Errors
    /// This fails if the instruction made an illegal access.
    /// The fault is kept, and every later step fails the same way.
    pub fn step(&mut self) -> Result<(), SimErr> {
        if let Some(fault) = self.machine.fault {
            return Err(fault.into());
        }

        self.check_debugger();
        self.core.step(&mut self.machine);
        self.sync_irq();
        if let Some(fault) = self.machine.fault {
            return Err(fault.into());
        }
        self.instructions_run = self.instructions_run.wrapping_add(1);

        let m = &mut self.machine;
        m.devices.output.update(&mut device_ctx!(m));
        self.sync_irq();

        let m = &mut self.machine;
        m.devices.input.update(&mut device_ctx!(m));
        self.sync_irq();
        if let Some(key) = self.machine.devices.input.take_signal() {
            self.operator_key(key);
        }

        let m = &mut self.machine;
        m.devices.nmi.update(&mut device_ctx!(m));
        self.sync_irq();

        Ok(())
    }

    fn operator_key(&mut self, key: OperatorKey) {
        tracing::debug!(?key, "operator key");
        match key {
            OperatorKey::Quit => self.mcr.store(false, Ordering::Relaxed),
            OperatorKey::Nmi => self.machine.devices.nmi.raise(),
            OperatorKey::FrontPanel => self.front_panel_line(),
            OperatorKey::Lookup => self.lookup_prompt(),
        }
    }

    /// Reads one line of boot records from the operator and applies it.
    fn front_panel_line(&mut self) {
        self.machine.console.diag(";");
        let Some(line) = self.machine.blocking(|m| m.console.read_line()) else { return };

        let mut loader = self.front_panel;
        let (mut target, console) = self.live_target();
        let pass = loader.feed(&line, &mut target, console);
        self.front_panel = loader;

        tracing::debug!(words = pass.words, "front panel line applied");
        self.machine.debugger.resolve_trace(&self.machine.mem);
    }

    /// Asks the operator for a name and prints where its dictionary entry is.
    fn lookup_prompt(&mut self) {
        self.machine.console.diag("name>");
        let name = self.machine.blocking(|m| m.console.read_line()).unwrap_or_default();

        let (start, span) = dict::lookup_by_name(&self.machine.mem, name.trim_end_matches(['\r', '\n']))
            .map_or((0, 0), |e| (e.start, e.span()));
        self.machine.console.diag(&format!("result = {start:04X}, len = {span}\n"));
    }

    /// Execute the program.
    ///
    /// This blocks until the operator quits, the machine control flag is unset,
    /// or an illegal access happens.
    pub fn run(&mut self) -> Result<(), SimErr> {
        self.run_while(|_| true)
    }

    /// Execute the program with a limit on how many steps to execute.
    pub fn run_with_limit(&mut self, max_steps: u64) -> Result<(), SimErr> {
        let i = self.instructions_run;
        self.run_while(|sim| sim.instructions_run.wrapping_sub(i) < max_steps)
    }

    /// Execute the program while the tripwire returns true.
    pub fn run_while(&mut self, mut tripwire: impl FnMut(&mut Simulator<C>) -> bool) -> Result<(), SimErr> {
        self.pause_condition = Default::default();
        self.mcr.store(true, Ordering::Relaxed);

        // run until:
        // 1. the MCR is set to false (ESC, or from outside)
        // 2. the tripwire condition returns false
        // 3. an illegal access
        let result = loop {
            if !self.mcr.load(Ordering::Relaxed) {
                break Ok(PauseCondition::Quit);
            }
            if !tripwire(self) {
                break Ok(PauseCondition::Tripwire);
            }

            if let Err(e) = self.step() {
                break Err(e);
            }
        };

        self.mcr.store(false, Ordering::Relaxed);
        self.pause_condition = result?;
        Ok(())
    }
}
