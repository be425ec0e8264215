//! `rover-cli` – rover telemetry console.
//!
//! This binary is the operator's entry point.  It:
//!
//! 1. Checks for `~/.rover/config.toml`; runs a **First-Run Wizard** when the
//!    file is absent.
//! 2. Drops the user into an **interactive REPL** with slash-commands
//!    (`/scan`, `/sweep`, `/drive`, `/replay`, `/objects`, `/help`, …).
//! 3. Intercepts **Ctrl-C**: a running session is stopped (the stop byte is
//!    sent to the robot); at the prompt the CLI exits.

mod config;
mod render;
mod repl;

use colored::Colorize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

use rover_runtime::OperatorInput;

fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG filters (default "info"); ROVER_LOG_FORMAT=json for NDJSON;
    // OTEL_EXPORTER_OTLP_ENDPOINT enables span export.  User-facing output
    // still goes through println!.
    let _tracing = rover_runtime::init_tracing("rover");

    print_banner();

    // ── Shared shutdown flag and stop slot ────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let stop_slot: repl::StopSlot = Arc::new(Mutex::new(None));

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown_ctrlc = shutdown.clone();
    let stop_ctrlc = stop_slot.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        let active = stop_ctrlc
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match active {
            Some(tx) if tx.try_send(OperatorInput::Stop).is_ok() => {
                println!();
                println!("{}", "⚠  Ctrl-C – stopping the session …".yellow().bold());
            }
            _ => {
                println!();
                println!("{}", "⚠  Ctrl-C received – press Enter to exit.".yellow().bold());
                shutdown_ctrlc.store(true, Ordering::SeqCst);
            }
        }
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; sessions can only be stopped from the prompt");
    }

    // ── Configuration / First-Run Wizard ──────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => run_first_run_wizard(),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };
    println!("  Link: {} @ {} baud", cfg.port.bold(), cfg.baud_rate);

    // ── Async runtime for event rendering ─────────────────────────────────
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start async runtime".red(), e);
            std::process::exit(1);
        }
    };

    println!();
    println!(
        "  Type {} for a list of commands.\n",
        "/help".bold().cyan()
    );

    // ── Interactive REPL ──────────────────────────────────────────────────
    repl::run(&runtime, cfg, shutdown, stop_slot);
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> config::Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║        Rover First-Run Wizard        ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up the robot link.\n");

    let mut cfg = config::Config::default();

    cfg.port = repl::prompt_str(
        &format!(
            "  Serial port ({} for the simulator) [{}]: ",
            repl::SIM_PORT,
            cfg.port
        ),
        &cfg.port,
    );

    let baud = repl::prompt_str(
        &format!("  Baud rate [{}]: ", cfg.baud_rate),
        &cfg.baud_rate.to_string(),
    );
    if let Ok(b) = baud.trim().parse::<u32>() {
        cfg.baud_rate = b;
    }

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ____                      "#.bold().cyan());
    println!("{}", r#"  / __ \____ _   _____  _____"#.bold().cyan());
    println!("{}", r#" / /_/ / __ \ | / / _ \/ ___/"#.bold().cyan());
    println!("{}", r#"/ _, _/ /_/ / |/ /  __/ /    "#.bold().cyan());
    println!("{}", r#"/_/ |_|\____/|___/\___/_/     "#.bold().cyan());
    println!();
    println!("  {} {}",
        "Rover".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Serial telemetry console");
    println!();
}
