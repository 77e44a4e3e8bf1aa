//! RISC-V Hart Simulator CLI.
//!
//! Loads a configuration and a program image, runs the hart until it stops
//! and reports statistics. The exit status is 0 when the program ends the
//! way a passing program ends and 1 otherwise.
//!
//! # Usage
//!
//! Programs are given either as a flat binary (`--file`, loaded at
//! `--load-addr`) or as a hex image (`--hex`). The run ends on a write to
//! the to-host address, at the stop address, at the instruction limit or on
//! Ctrl-C.

use std::process;
use std::sync::{Arc, OnceLock};

use clap::Parser;

use riscv_hart_sim::config::Config;
use riscv_hart_sim::core::Core;
use riscv_hart_sim::sim::{loader, CancelToken, TraceSink, WriterSink};
use riscv_hart_sim::soc::FlatMemory;
use riscv_hart_sim::stats::SimStats;
use riscv_hart_sim::StopReason;

static CANCEL: OnceLock<CancelToken> = OnceLock::new();

/// Command-line arguments for the hart simulator.
#[derive(Parser, Debug)]
#[command(author, version, about = "RISC-V Hart Simulator")]
struct Args {
    /// TOML configuration file; defaults describe an RV32IMAFDC hart.
    #[arg(short, long)]
    config: Option<String>,

    /// Flat binary to load at `--load-addr`.
    #[arg(short, long)]
    file: Option<String>,

    /// Hex image to load.
    #[arg(long)]
    hex: Option<String>,

    #[arg(long, default_value = "0x0")]
    load_addr: String,

    /// Trace output file, `-` for stdout.
    #[arg(short, long)]
    trace: Option<String>,

    #[arg(long)]
    stop_address: Option<String>,

    /// Maximum number of instructions to execute.
    #[arg(long)]
    limit: Option<u64>,

    #[arg(long)]
    tohost: Option<String>,

    #[arg(long)]
    console_io: Option<String>,

    /// Write an instruction-frequency report (JSON) to this file.
    #[arg(long)]
    instfreq: Option<String>,

    /// Write the run statistics (JSON) to this file.
    #[arg(long)]
    stats_json: Option<String>,
}

extern "C" fn on_sigint(_sig: libc::c_int) {
    if let Some(token) = CANCEL.get() {
        token.cancel();
    }
}

fn install_sigint_handler(token: CancelToken) {
    if CANCEL.set(token).is_err() {
        return;
    }
    // SAFETY: the handler only performs an atomic store.
    unsafe {
        libc::signal(libc::SIGINT, on_sigint as libc::sighandler_t);
    }
}

fn parse_addr(name: &str, s: &str) -> Result<u64, String> {
    let digits = s.trim().trim_start_matches("0x").trim_start_matches("0X");
    u64::from_str_radix(digits, 16).map_err(|_| format!("bad {} '{}'", name, s))
}

fn parse_opt_addr(name: &str, s: &Option<String>) -> Result<Option<u64>, String> {
    s.as_deref().map(|v| parse_addr(name, v)).transpose()
}

fn fail(msg: impl std::fmt::Display) -> ! {
    log::error!("{}", msg);
    eprintln!("[!] FATAL: {}", msg);
    process::exit(1);
}

/// Main entry point for the hart simulator.
///
/// # Behavior
///
/// 1. **Configuration**: Parses arguments and loads the TOML configuration.
/// 2. **Loader**: Builds the flat memory and loads the program image.
/// 3. **Simulation**: Runs the hart until a stop condition.
/// 4. **Teardown**: Writes the reports and exits with the run status.
fn main() {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path).unwrap_or_else(|e| fail(e)),
        None => Config::default(),
    };

    let mut memory = FlatMemory::new(config.memory.base_val(), config.memory.size_val());
    let load_addr = parse_addr("load address", &args.load_addr).unwrap_or_else(|e| fail(e));
    if let Some(path) = &args.file {
        loader::load_flat(&mut memory, path, load_addr).unwrap_or_else(|e| fail(e));
    }
    if let Some(path) = &args.hex {
        loader::load_hex(&mut memory, path).unwrap_or_else(|e| fail(e));
    }

    let mut core = Core::new(&config, Box::new(memory)).unwrap_or_else(|e| fail(e));

    let tohost = parse_opt_addr("to-host address", &args.tohost).unwrap_or_else(|e| fail(e));
    if tohost.is_some() {
        core.set_tohost(tohost);
    }
    let console = parse_opt_addr("console address", &args.console_io).unwrap_or_else(|e| fail(e));
    if console.is_some() {
        core.set_console_io(console);
    }
    let stop = parse_opt_addr("stop address", &args.stop_address).unwrap_or_else(|e| fail(e));
    if stop.is_some() {
        core.set_stop_address(stop);
    }
    if args.limit.is_some() {
        core.set_instruction_limit(args.limit);
    }
    if args.instfreq.is_some() {
        core.enable_instruction_frequency(true);
    }

    let trace_path = args
        .trace
        .clone()
        .or_else(|| cfg!(feature = "always-trace").then(|| "-".to_string()));
    let sink = trace_path.map(|path| {
        Arc::new(WriterSink::open(&path).unwrap_or_else(|e| fail(format!("{}: {}", path, e))))
    });
    if let Some(sink) = &sink {
        core.set_trace_sink(Some(sink.clone() as Arc<dyn TraceSink>));
    }

    install_sigint_handler(core.cancel_token());

    log::info!("Starting at {:#x} ({}-bit)", core.pc(), core.xlen().bits());
    let reason = core.run();
    if let Some(sink) = &sink {
        sink.flush();
    }

    match &reason {
        StopReason::Stopped { message, value, .. } => {
            println!("[*] {} (value {:#x})", message, value)
        }
        StopReason::Exited { code } => println!("[*] Target exited with code {}", code),
        other => println!("[*] {:?}", other),
    }

    let stats = SimStats::from_core(&core);
    stats.print();

    if let Some(path) = &args.stats_json {
        write_json(path, serde_json::to_string_pretty(&stats));
    }
    if let (Some(path), Some(profile)) = (&args.instfreq, core.instruction_profile()) {
        write_json(path, profile.to_json());
    }

    process::exit(if reason.is_success() { 0 } else { 1 });
}

fn write_json(path: &str, json: serde_json::Result<String>) {
    let result = json
        .map_err(|e| e.to_string())
        .and_then(|text| std::fs::write(path, text).map_err(|e| e.to_string()));
    if let Err(e) = result {
        log::error!("Failed to write {}: {}", path, e);
    }
}
