//! REPL – the interactive rover shell.
//!
//! Supported slash-commands:
//!   /scan           – ping scan, samples mapped onto the floor plan
//!   /sweep          – sensor status, sweep readings and object segments
//!   /drive          – manual drive; each typed key is sent, Enter on an
//!                     empty line (or a space) stops
//!   /replay [path]  – load an offline `degree ir sonar` table
//!   /objects        – infrared object detection over the last series
//!   /status         – last sensor status, pose and series size
//!   /clear          – drop the last series and reset the pose
//!   /settings       – edit `~/.rover/config.toml`
//!   /help           – show this list
//!   /quit | /exit   – exit the CLI

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rover_decoder::{detect_objects, replay_file};
use rover_hal::{LineReader, LineSource, SerialTransport, SimTransport};
use rover_runtime::{OperatorInput, Session, SessionReport};
use rover_types::{DriveCommand, Facing, ObjectSegment, RoverError, ScanSeries, SensorStatus, SessionMode};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::{self, Config};
use crate::render;

/// Port name that selects the built-in simulated robot.
pub const SIM_PORT: &str = "sim";

const EVENT_BUFFER: usize = 256;
const INPUT_BUFFER: usize = 32;

/// Stop channel of the running session, shared with the Ctrl-C handler.
pub type StopSlot = Arc<Mutex<Option<mpsc::Sender<OperatorInput>>>>;

type BoxedSession = Session<Box<dyn LineSource>>;

/// What the shell remembers between commands.
struct Shell<'rt> {
    runtime: &'rt Runtime,
    cfg: Config,
    stop_slot: StopSlot,
    session: Option<BoxedSession>,
    series: ScanSeries,
    segments: Vec<ObjectSegment>,
    status: SensorStatus,
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(runtime: &Runtime, cfg: Config, shutdown: Arc<AtomicBool>, stop_slot: StopSlot) {
    let mut shell = Shell {
        runtime,
        cfg,
        stop_slot,
        session: None,
        series: ScanSeries::new(),
        segments: Vec::new(),
        status: SensorStatus::default(),
    };

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "rover>".bold().cyan());
        io::stdout().flush().ok();

        let Some(line) = read_line() else { break };
        let cmd = line.trim();
        if cmd.is_empty() {
            continue;
        }

        let (name, arg) = match cmd.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, Some(arg.trim())),
            None => (cmd, None),
        };

        match name {
            "/help" => cmd_help(),
            "/scan" => shell.run_session(SessionMode::Scan),
            "/sweep" => shell.run_session(SessionMode::Sweep),
            "/drive" => shell.run_session(SessionMode::Drive),
            "/replay" => shell.cmd_replay(arg),
            "/objects" => shell.cmd_objects(),
            "/status" => shell.cmd_status(),
            "/clear" => shell.cmd_clear(),
            "/settings" => shell.cmd_settings(),
            "/quit" | "/exit" => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            other => {
                println!(
                    "{} '{}'. Type {} for available commands.",
                    "Unknown command:".red(),
                    other.yellow(),
                    "/help".bold()
                );
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "Rover Commands".bold().underline());
    println!("  {}           – ping scan mapped onto the floor plan", "/scan".bold().cyan());
    println!("  {}          – sensor status, sweep and object segments", "/sweep".bold().cyan());
    println!("  {}          – manual drive (w s a d + - p q e z; empty line stops)", "/drive".bold().cyan());
    println!("  {}  – load an offline degree/ir/sonar table", "/replay [path]".bold().cyan());
    println!("  {}        – object detection over the last series", "/objects".bold().cyan());
    println!("  {}         – last sensor status and pose", "/status".bold().cyan());
    println!("  {}          – drop the last series, reset the pose", "/clear".bold().cyan());
    println!("  {}       – edit ~/.rover/config.toml", "/settings".bold().cyan());
    println!("  {}    – exit the CLI", "/quit  /exit".bold().cyan());
    println!();
}

impl Shell<'_> {
    /// Run one session on a blocking worker while events are rendered on the
    /// runtime.  In drive mode this thread reads operator keys meanwhile.
    fn run_session(&mut self, mode: SessionMode) {
        let mut session = match self.session.take() {
            Some(session) => session,
            None => match open_session(&self.cfg) {
                Ok(session) => session,
                Err(e) => {
                    println!("{}: {}", "Cannot open link".red(), e);
                    return;
                }
            },
        };

        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (input_tx, mut input_rx) = mpsc::channel(INPUT_BUFFER);
        *self.stop_slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(input_tx.clone());

        let renderer = self.runtime.spawn(render::render_events(event_rx));
        let worker = self.runtime.spawn_blocking(move || {
            let result = session.run(mode, &event_tx, &mut input_rx);
            (session, result)
        });

        if mode == SessionMode::Drive {
            println!(
                "  {} type keys and press Enter; an empty line stops.",
                "drive:".bold()
            );
            drive_input(&input_tx, &worker);
        } else {
            println!("  {}", "waiting for END (Ctrl-C aborts) …".dimmed());
        }
        drop(input_tx);

        let joined = self.runtime.block_on(worker);
        *self.stop_slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        if let Err(e) = self.runtime.block_on(renderer) {
            warn!(error = %e, "renderer task failed");
        }

        match joined {
            Ok((session, Ok(report))) => {
                self.session = Some(session);
                render::print_report(&report);
                self.absorb(report);
            }
            Ok((_, Err(e))) => {
                // The link is gone or unusable; reopen on the next session.
                println!("{}: {}", "Session failed".red(), e);
            }
            Err(e) => println!("{}: {}", "Session worker crashed".red(), e),
        }
    }

    fn absorb(&mut self, report: SessionReport) {
        self.status = report.status;
        if report.mode != SessionMode::Drive {
            self.series = report.series;
            self.segments = report.objects;
        }
    }

    fn cmd_replay(&mut self, arg: Option<&str>) {
        let path = arg
            .filter(|a| !a.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| self.cfg.replay_file.clone());
        let mut series = ScanSeries::new();
        match replay_file(&path, &mut series) {
            Ok(count) => {
                println!(
                    "  {} {} readings from {}",
                    "✓".green().bold(),
                    count,
                    path.display().to_string().bold()
                );
                render::print_series(&series);
                self.series = series;
                self.segments.clear();
            }
            Err(e) => println!("{}: {}", "Replay failed".red(), e),
        }
    }

    fn cmd_objects(&self) {
        let detected = detect_objects(&self.series, self.cfg.object_threshold_cm);
        render::print_objects(&detected, &self.segments);
    }

    fn cmd_status(&self) {
        let pose = match &self.session {
            Some(session) => session.pose(),
            None => self.cfg.session_config().start_pose,
        };
        render::print_status(&self.status, &pose, &self.series);
    }

    fn cmd_clear(&mut self) {
        self.series.clear();
        self.segments.clear();
        self.status = SensorStatus::default();
        if let Some(session) = self.session.as_mut() {
            session.reset_pose();
        }
        println!("  {}", "✓ Cleared.".green());
    }

    fn cmd_settings(&mut self) {
        let mut cfg = self.cfg.clone();

        println!("{}", "Settings Editor".bold().underline());
        cfg.port = prompt_str(
            &format!("  Serial port ({} = simulator) [{}]: ", SIM_PORT, cfg.port),
            &cfg.port,
        );
        cfg.baud_rate = prompt_parse("  Baud rate", cfg.baud_rate);
        cfg.read_timeout_ms = prompt_parse("  Read timeout (ms)", cfg.read_timeout_ms);
        cfg.start_x = prompt_parse("  Start x (m)", cfg.start_x);
        cfg.start_y = prompt_parse("  Start y (m)", cfg.start_y);
        cfg.facing = prompt_parse::<Facing>("  Facing (N/E/S/W)", cfg.facing);
        cfg.replay_file = PathBuf::from(prompt_str(
            &format!("  Replay file [{}]: ", cfg.replay_file.display()),
            &cfg.replay_file.display().to_string(),
        ));
        cfg.object_threshold_cm = prompt_parse("  Object threshold", cfg.object_threshold_cm);

        match config::save(&cfg) {
            Ok(()) => println!(
                "{} {}",
                "✓ Settings saved to".green(),
                config::config_path().display().to_string().bold()
            ),
            Err(e) => println!("{}: {}", "Error saving config".red(), e),
        }
        // Link settings may have changed; reopen on the next session.
        self.session = None;
        self.cfg = cfg;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn open_session(cfg: &Config) -> Result<BoxedSession, RoverError> {
    let link: Box<dyn LineSource> = if cfg.port == SIM_PORT {
        info!("using simulated robot");
        Box::new(LineReader::new(demo_robot()))
    } else {
        let transport = SerialTransport::open(&cfg.port, cfg.baud_rate, cfg.read_timeout())?;
        Box::new(LineReader::new(transport))
    };
    Ok(Session::new(link, cfg.session_config()))
}

/// A scripted robot: answers the scan byte with a short ping scan and the
/// turn keys with heading reports.
fn demo_robot() -> SimTransport {
    SimTransport::new(SIM_PORT)
        .with_reply(
            DriveCommand::Space.as_byte(),
            &[
                "garbage", "DD,40", "Start,20", "DIS,120", "garbage", "DD,110", "Start,95",
                "DIS,65", "END",
            ],
        )
        .with_reply(DriveCommand::TurnLeft.as_byte(), &["anglen,-15"])
        .with_reply(DriveCommand::TurnRight.as_byte(), &["anglep,15"])
        .with_reply(DriveCommand::QuarterTurn.as_byte(), &["anglep,90"])
        .with_reply(DriveCommand::ThreeQuarterTurn.as_byte(), &["anglep,270"])
        .with_reply(DriveCommand::Forward.as_byte(), &["data,forward"])
}

/// Forward typed keys to the drive session until the operator stops or the
/// session ends on its own.
fn drive_input<T>(input: &mpsc::Sender<OperatorInput>, worker: &tokio::task::JoinHandle<T>) {
    loop {
        if worker.is_finished() {
            return;
        }
        print!("{} ", "drive>".bold().yellow());
        io::stdout().flush().ok();
        let Some(line) = read_line() else {
            let _ = input.blocking_send(OperatorInput::Stop);
            return;
        };
        if worker.is_finished() {
            return;
        }
        let keys = line.trim_end_matches(['\r', '\n']);
        if keys.is_empty() {
            let _ = input.blocking_send(OperatorInput::Stop);
            return;
        }
        for key in keys.chars() {
            match parse_key(key) {
                Some(OperatorInput::Stop) => {
                    let _ = input.blocking_send(OperatorInput::Stop);
                    return;
                }
                Some(command) => {
                    if input.blocking_send(command).is_err() {
                        return;
                    }
                }
                None => println!("  {} '{}'", "unknown key".yellow(), key),
            }
        }
    }
}

/// Space stops the drive; every other firmware key becomes a drive command.
fn parse_key(key: char) -> Option<OperatorInput> {
    match DriveCommand::from_key(key)? {
        DriveCommand::Space => Some(OperatorInput::Stop),
        command => Some(OperatorInput::Drive(command)),
    }
}

fn read_line() -> Option<String> {
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) => None, // EOF
        Ok(_) => Some(line),
        Err(e) => {
            eprintln!("{}: {}", "Read error".red(), e);
            None
        }
    }
}

/// Prompt for a parseable value.  Returns `default` on Enter or bad input.
fn prompt_parse<T>(label: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    let raw = prompt_str(&format!("{label} [{default}]: "), &default.to_string());
    match raw.parse::<T>() {
        Ok(v) => v,
        Err(_) => {
            println!(
                "  {} '{}' is not valid, keeping {}",
                "Warning:".yellow(),
                raw,
                default
            );
            default
        }
    }
}

/// Prompt for a string value.  Returns `default` when the user presses Enter.
pub fn prompt_str(msg: &str, default: &str) -> String {
    print!("{}", msg);
    io::stdout().flush().ok();

    match read_line() {
        Some(line) => {
            let trimmed = line.trim().to_string();
            if trimmed.is_empty() {
                default.to_string()
            } else {
                trimmed
            }
        }
        None => default.to_string(),
    }
}
