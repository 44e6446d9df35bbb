//! CareLoop — host entry point.
//!
//! Runs the care engine against the simulated device bridge.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SimulatedBridge   LogEventSink   JsonFileStore   SystemClock  │
//! │  (Sensor+Actuator) (EventSink)    (ConfigPort)    (ClockPort)  │
//! │  LogNotifier       stdin console                               │
//! │  (NotifierPort)    (CareCommand channel)                       │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              CareService (pure logic)                  │    │
//! │  │  Presence · Scheduler · FSM · Escalation               │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Runner (fixed-interval loop, command queue)                   │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{info, warn};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

use careloop::adapters::json_store::JsonFileStore;
use careloop::adapters::log_sink::LogEventSink;
use careloop::adapters::notifier::LogNotifier;
use careloop::adapters::simulated::SimulatedBridge;
use careloop::adapters::time::SystemClock;
use careloop::app::commands::{CareCommand, HelpSource};
use careloop::app::events::EventLog;
use careloop::app::ports::{ClockPort, ConfigPort};
use careloop::app::service::CareService;
use careloop::notify::ContactTarget;
use careloop::runner::Runner;

#[derive(Parser)]
#[command(name = "careloop", version, about = "Care automation engine (simulated device)")]
struct Args {
    /// Directory holding profile.json, schedule.json and rules.json
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Evaluation interval in milliseconds
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Number of evaluation cycles to run (0 = until stopped)
    #[arg(long, default_value_t = 0)]
    ticks: u64,

    /// Write the built-in default documents to the data directory and exit
    #[arg(long)]
    init_config: bool,

    /// Simulate presence once every N cycles (0 = never)
    #[arg(long, default_value_t = 1)]
    presence_every: u64,

    /// Simulate a fall on this cycle
    #[arg(long)]
    fall_at: Option<u64>,

    /// Simulate an SOS press on this cycle
    #[arg(long)]
    sos_at: Option<u64>,

    /// Read commands from stdin (type `help` for the list)
    #[arg(long)]
    console: bool,
}

fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    info!("CareLoop v{}", env!("CARGO_PKG_VERSION"));

    // ── 1. Configuration ──────────────────────────────────────
    let store = JsonFileStore::new(&args.data_dir);
    if args.init_config {
        let config = careloop::config::CareConfig::default();
        store
            .save_all(&config)
            .with_context(|| format!("writing defaults to {}", args.data_dir.display()))?;
        info!("Default configuration written to {}", args.data_dir.display());
        return Ok(());
    }
    let config = store.load_or_default();
    info!(
        "Caring for {} ({} medications, {} contacts)",
        config.profile.name,
        config.schedule.len(),
        config.profile.contacts.len()
    );

    // ── 2. Service + adapters ─────────────────────────────────
    let clock = SystemClock::new();
    let service = CareService::new(config, clock.now());
    let sink = (EventLog::new(), LogEventSink::new());
    let mut runner = Runner::new(
        service,
        SimulatedBridge::new(),
        LogNotifier::new(),
        sink,
        clock,
        store,
        Duration::from_millis(args.interval_ms),
    );

    // ── 3. Console ────────────────────────────────────────────
    if args.console {
        spawn_console(runner.command_sender());
    }

    // ── 4. Main loop ──────────────────────────────────────────
    let (presence_every, fall_at, sos_at) = (args.presence_every, args.fall_at, args.sos_at);
    runner.run(args.ticks, |n, hw| {
        hw.set_presence(presence_every != 0 && n % presence_every == 0);
        if fall_at == Some(n) {
            hw.trigger_fall();
        }
        if sos_at == Some(n) {
            hw.press_sos();
        }
    });

    let state = runner.service().engine_state();
    info!(
        "Final state {} after {} ticks, {} events, {} notifications",
        state.global_state.name(),
        runner.service().tick_count(),
        runner.sink().0.len(),
        runner.notifier().outbox().len()
    );
    Ok(())
}

fn spawn_console(tx: Sender<CareCommand>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_command(line) {
                Ok(cmd) => {
                    if tx.send(cmd).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Console: {e}"),
            }
        }
    });
}

const CONSOLE_HELP: &str = "taken | snooze <min> | skip | ok | silence | say <text> | \
                            led off | open <drug> | notify <priority|name> | save";

fn parse_command(line: &str) -> Result<CareCommand> {
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    let cmd = match word.to_lowercase().as_str() {
        "taken" => CareCommand::MedTaken,
        "snooze" => {
            let minutes = if rest.is_empty() {
                10
            } else {
                rest.parse().context("snooze takes whole minutes")?
            };
            CareCommand::MedSnooze { minutes }
        }
        "skip" => CareCommand::MedSkip,
        "ok" => CareCommand::CheckInOk,
        "silence" | "reset" => CareCommand::Silence,
        "say" => CareCommand::HelpRequest {
            transcript: rest.to_string(),
            source: HelpSource::Text,
        },
        "led" if rest.eq_ignore_ascii_case("off") => CareCommand::LedOff,
        "open" if !rest.is_empty() => CareCommand::OpenCompartment {
            drug: rest.to_string(),
        },
        "notify" => match rest.parse::<u32>() {
            Ok(priority) => CareCommand::NotifyContact(ContactTarget::Priority(priority)),
            Err(_) if !rest.is_empty() => {
                CareCommand::NotifyContact(ContactTarget::Name(rest.to_string()))
            }
            Err(_) => CareCommand::NotifyContact(ContactTarget::Priority(1)),
        },
        "save" => CareCommand::SaveConfig,
        _ => bail!("unknown command {line:?}; try: {CONSOLE_HELP}"),
    };
    Ok(cmd)
}
