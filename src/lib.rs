//! Board emulation for a 68000 single-board computer.
//!
//! This crate is everything on the board except the CPU:
//! the bus and address decoder, the interrupt controller, the NMI button, the serial port,
//! the debug port monitor, and the hex boot loader.
//! The instruction core is plugged in through [`cpu::CpuCore`].
//!
//! # Usage
//!
//! Boot images are streams of hex records, loaded into RAM before the core is reset:
//! ```
//! use sbc68k::sim::{Simulator, SimFlags};
//! use sbc68k::sim::io::{BufferedConsole, ManualClock};
//! # use sbc68k::cpu::{CpuBus, CpuCore};
//! # struct Core;
//! # impl CpuCore for Core {
//! #     fn reset(&mut self, _: &mut dyn CpuBus) {}
//! #     fn step(&mut self, _: &mut dyn CpuBus) {}
//! #     fn set_irq_level(&mut self, _: u8) {}
//! #     fn pc(&self) -> u32 { 0 }
//! #     fn prev_pc(&self) -> u32 { 0 }
//! # }
//!
//! let console = BufferedConsole::new();
//! let mut sim = Simulator::new(Core, console.clone(), ManualClock::new(), SimFlags::default());
//!
//! // reset vectors: SSP = 0x1000, PC = 0x400
//! sim.boot_image("=0000 0000 1000 0000 0400");
//! sim.reset();
//! sim.run_with_limit(10).unwrap();
//! ```
//!
//! Hosts with a core of their own can hand the whole command line over to [`cli::launch`].
//! See the [`sim`] module for more details on running the board.
#![warn(missing_docs)]

pub mod boot;
pub mod cli;
pub mod cpu;
pub mod err;
pub mod sim;
