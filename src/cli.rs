//! The command-line front end.
//!
//! The board does not carry its own instruction core, so the host program supplies one
//! and hands control over to [`launch`]:
//!
//! ```no_run
//! # use sbc68k::cpu::{CpuBus, CpuCore};
//! # struct Core;
//! # impl CpuCore for Core {
//! #     fn reset(&mut self, _: &mut dyn CpuBus) {}
//! #     fn step(&mut self, _: &mut dyn CpuBus) {}
//! #     fn set_irq_level(&mut self, _: u8) {}
//! #     fn pc(&self) -> u32 { 0 }
//! #     fn prev_pc(&self) -> u32 { 0 }
//! # }
//! # fn my_core() -> Core { panic!("supplied by the host") }
//! fn main() -> std::process::ExitCode {
//!     sbc68k::cli::launch(my_core())
//! }
//! ```
//!
//! Usage: `<host> [OPTIONS] <IMAGES>...`

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};

use crate::cpu::CpuCore;
use crate::err::LaunchErr;
use crate::sim::io::{Clock, Console, MonotonicClock, StdConsole};
use crate::sim::mem::MachineInitStrategy;
use crate::sim::{SimFlags, Simulator};

/// Command-line arguments.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(about = "Runs a 68000 single-board computer", long_about = None)]
pub struct Args {
    /// Boot images, loaded in order before the CPU is reset
    #[arg(required = true)]
    pub images: Vec<PathBuf>,

    /// ROM image to serve program fetches from
    #[arg(long)]
    pub rom: Option<PathBuf>,

    /// How long the output device stays busy after each byte, in milliseconds
    #[arg(long, default_value_t = 1)]
    pub output_period_ms: u64,

    /// Hide time spent waiting on the operator from the output device
    #[arg(long, action = ArgAction::SetTrue)]
    pub rebaseline: bool,

    /// Fill RAM with this byte (hex) at power-on
    #[arg(long, value_parser = parse_hex_byte, conflicts_with_all = ["ram_seed", "ram_random"])]
    pub ram_fill: Option<u8>,

    /// Fill RAM with seeded random bytes at power-on
    #[arg(long, conflicts_with = "ram_random")]
    pub ram_seed: Option<u64>,

    /// Fill RAM with unseeded random bytes at power-on
    #[arg(long, action = ArgAction::SetTrue)]
    pub ram_random: bool,

    /// Log more (repeat for even more)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

fn parse_hex_byte(s: &str) -> Result<u8, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u8::from_str_radix(digits, 16)
        .map_err(|e| format!("expected a hex byte: {e}"))
}

impl Args {
    /// The simulator configuration these arguments describe.
    pub fn flags(&self) -> SimFlags {
        let ram_init = match (self.ram_fill, self.ram_seed, self.ram_random) {
            (_, _, true) => MachineInitStrategy::Unseeded,
            (_, Some(seed), _) => MachineInitStrategy::Seeded { seed },
            (Some(value), _, _) => MachineInitStrategy::Known { value },
            (None, None, false) => MachineInitStrategy::default(),
        };

        SimFlags {
            output_period_ms: self.output_period_ms,
            rebaseline_after_pause: self.rebaseline,
            ram_init,
        }
    }

    /// The log level the `-v` count asks for.
    pub fn log_level(&self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}

/// Parses the process arguments and runs the board on stdin/stdout.
pub fn launch<C: CpuCore>(core: C) -> ExitCode {
    launch_from(std::env::args_os(), core)
}

/// Parses the given arguments (including the program name) and runs the board on stdin/stdout.
pub fn launch_from<C, I, T>(args: I, core: C) -> ExitCode
    where C: CpuCore,
          I: IntoIterator<Item = T>,
          T: Into<OsString> + Clone
{
    let args = match Args::try_parse_from(args) {
        Ok(args) => args,
        Err(e) => {
            // --help and --version also land here
            let _ = e.print();
            return match e.use_stderr() {
                true  => ExitCode::FAILURE,
                false => ExitCode::SUCCESS,
            };
        }
    };

    // A host may have installed its own subscriber already.
    let _ = tracing_subscriber::fmt()
        .with_max_level(args.log_level())
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();

    match run(&args, core, StdConsole::new(), MonotonicClock::new()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Boots and runs the board until the operator quits or a fault happens.
///
/// # Errors
/// This fails if the ROM or a boot image can't be loaded,
/// or if the program makes an illegal access.
pub fn run<C: CpuCore>(
    args: &Args,
    core: C,
    console: impl Console + 'static,
    clock: impl Clock + 'static
) -> Result<(), LaunchErr> {
    let mut sim = Simulator::new(core, console, clock, args.flags());

    if let Some(rom) = &args.rom {
        sim.load_rom(rom)?;
    }
    sim.boot_files(args.images.as_slice())?;

    sim.reset();
    match sim.run() {
        Ok(()) => {
            tracing::info!("stopped after {} instructions", sim.instructions_run);
            Ok(())
        },
        Err(e) => Err(LaunchErr::Fault(sim.fault_report().unwrap_or_else(|| e.to_string()))),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser;

    use super::{run, Args};
    use crate::cpu::{CpuBus, CpuCore};
    use crate::sim::io::{BufferedConsole, ManualClock};
    use crate::sim::mem::MachineInitStrategy;

    /// Runs in place.
    struct Idle;
    impl CpuCore for Idle {
        fn reset(&mut self, _bus: &mut dyn CpuBus) {}
        fn step(&mut self, _bus: &mut dyn CpuBus) {}
        fn set_irq_level(&mut self, _level: u8) {}
        fn pc(&self) -> u32 { 0 }
        fn prev_pc(&self) -> u32 { 0 }
    }

    /// Reads above RAM on every step.
    struct Wild;
    impl CpuCore for Wild {
        fn reset(&mut self, _bus: &mut dyn CpuBus) {}
        fn step(&mut self, bus: &mut dyn CpuBus) {
            bus.read_word(0x40000);
        }
        fn set_irq_level(&mut self, _level: u8) {}
        fn pc(&self) -> u32 { 0x102 }
        fn prev_pc(&self) -> u32 { 0x100 }
    }

    fn write_image(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("sbc68k-{}-{name}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_parse() {
        let args = Args::try_parse_from(["sbc", "-vv", "--output-period-ms", "3", "--ram-fill", "e5", "a.hex", "b.hex"]).unwrap();
        assert_eq!(args.images, [PathBuf::from("a.hex"), PathBuf::from("b.hex")]);
        assert_eq!(args.verbose, 2);
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        let flags = args.flags();
        assert_eq!(flags.output_period_ms, 3);
        assert!(!flags.rebaseline_after_pause);
        assert_eq!(flags.ram_init, MachineInitStrategy::Known { value: 0xE5 });

        let args = Args::try_parse_from(["sbc", "--ram-seed", "7", "--rebaseline", "a.hex"]).unwrap();
        assert_eq!(args.flags().ram_init, MachineInitStrategy::Seeded { seed: 7 });
        assert!(args.flags().rebaseline_after_pause);
    }

    #[test]
    fn test_parse_errors() {
        // no boot images
        assert!(Args::try_parse_from(["sbc"]).is_err());
        assert!(Args::try_parse_from(["sbc", "--ram-fill", "zz", "a.hex"]).is_err());
        assert!(Args::try_parse_from(["sbc", "--ram-fill", "1", "--ram-seed", "1", "a.hex"]).is_err());
    }

    #[test]
    fn test_run_until_escape() {
        let image = write_image("boot.hex", "=0100 4E71\n");
        let args = Args::try_parse_from([PathBuf::from("sbc"), image.clone()]).unwrap();

        let con = BufferedConsole::with_input("\x1b");
        run(&args, Idle, con.clone(), ManualClock::new()).unwrap();
        assert_eq!(con.output_string(), "\nrun...");
        assert_eq!(con.diag_string(), ";");

        std::fs::remove_file(image).unwrap();
    }

    #[test]
    fn test_run_fault() {
        let image = write_image("wild.hex", "");
        let args = Args::try_parse_from([PathBuf::from("sbc"), image.clone()]).unwrap();

        let err = run(&args, Wild, BufferedConsole::new(), ManualClock::new()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Attempted to read word from RAM address 00040000\nAt 0100: dc.w $0000"
        );

        std::fs::remove_file(image).unwrap();
    }

    #[test]
    fn test_missing_image() {
        let args = Args::try_parse_from(["sbc", "/nonexistent/boot.hex"]).unwrap();
        let err = run(&args, Idle, BufferedConsole::new(), ManualClock::new()).unwrap_err();
        assert_eq!(err.to_string(), "Unable to open /nonexistent/boot.hex");
    }
}
