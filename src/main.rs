//! Bridge daemon entry point
//!
//! Reads the config file, applies command-line overrides and runs the bridge
//! until Ctrl+C or until the reconnect budget is spent.

use clap::Parser;
use kefas_bridge::logging::{self, LoggingOptions};
use kefas_bridge::{Bridge, BridgeEvent, Config, ConnectionState, StrategyKind};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "kefas-bridge", version, about = "Forward ProPresenter slide text to Kefas")]
struct Args {
    /// Config file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the effective configuration to the config path and exit
    #[arg(long)]
    write_config: bool,

    /// Kefas API token
    #[arg(long, env = "KEFAS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Kefas meeting id
    #[arg(long)]
    meeting: Option<String>,

    /// ProPresenter host
    #[arg(long)]
    host: Option<String>,

    /// ProPresenter API port
    #[arg(long)]
    port: Option<u32>,

    /// How to follow slide changes
    #[arg(long, value_enum)]
    strategy: Option<StrategyKind>,

    /// ProPresenter remote password (websocket strategy)
    #[arg(long, env = "PROPRESENTER_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Use slide notes when the trigger text appears
    #[arg(long)]
    use_notes: bool,

    /// Text marking slides whose notes should be sent
    #[arg(long)]
    notes_trigger: Option<String>,

    /// Reconnect attempts before giving up (1-10)
    #[arg(long)]
    max_reconnect: Option<u32>,

    /// Delay between reconnect attempts in milliseconds
    #[arg(long)]
    reconnect_delay_ms: Option<u64>,

    /// Language of regular captions
    #[arg(long)]
    language: Option<String>,

    /// Language of captions taken from notes
    #[arg(long)]
    alternate_language: Option<String>,

    /// Directory for per-run log files
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(token) = &self.token {
            config.kefas.token = token.clone();
        }
        if let Some(meeting) = &self.meeting {
            config.kefas.meeting_id = meeting.clone();
        }
        if let Some(host) = &self.host {
            config.propresenter.host = host.clone();
        }
        if let Some(port) = self.port {
            config.propresenter.port = port;
        }
        if let Some(strategy) = self.strategy {
            config.propresenter.strategy = strategy;
        }
        if let Some(password) = &self.password {
            config.propresenter.password = password.clone();
        }
        if self.use_notes {
            config.notes.enabled = true;
        }
        if let Some(trigger) = &self.notes_trigger {
            config.notes.trigger = trigger.clone();
        }
        if let Some(max) = self.max_reconnect {
            config.reconnect.max_attempts = max;
        }
        if let Some(delay) = self.reconnect_delay_ms {
            config.reconnect.delay_ms = delay;
        }
        if let Some(language) = &self.language {
            config.languages.default = language.clone();
        }
        if let Some(language) = &self.alternate_language {
            config.languages.alternate = language.clone();
        }
        if let Some(dir) = &self.log_dir {
            config.general.log_dir = Some(dir.clone());
        }
        if self.verbose {
            config.general.log_level = "debug".to_string();
        }
    }
}

/// Print one notification. A closed stdout must not take the bridge down.
fn print_event(out: &mut impl Write, event: &BridgeEvent) {
    let _ = match event {
        BridgeEvent::Status { message } => writeln!(out, "{}", message),
        BridgeEvent::Connection(update) => {
            writeln!(out, "[{}] {}", update.status.as_str(), update.details)
        }
    };
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let (config_path, mut config) = match &args.config {
        Some(path) => (path.clone(), Config::load_from_path(path)),
        None => (Config::default_config_path(), Config::load()),
    };
    args.apply(&mut config);

    if args.write_config {
        return match config.save_to_path(&config_path) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Failed to write {}: {}", config_path.display(), e);
                ExitCode::FAILURE
            }
        };
    }

    let log_options = LoggingOptions {
        level: config.general.log_level.clone(),
        log_dir: config.general.log_dir.clone(),
    };
    match logging::init(&log_options) {
        Ok(Some(path)) => info!("Logging to {:?}", path),
        Ok(None) => {}
        Err(e) => eprintln!("Failed to open log file: {}", e),
    }

    let bridge = match Bridge::new() {
        Ok(bridge) => bridge,
        Err(e) => {
            eprintln!("Failed to create bridge: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let mut events = bridge.subscribe();
    let mut stdout = std::io::stdout();

    if let Err(e) = bridge.start(&config.to_start_request()) {
        // The rejection was also broadcast
        while let Ok(event) = events.try_recv() {
            print_event(&mut stdout, &event);
        }
        warn!(error = %e, "Bridge did not start");
        return ExitCode::from(2);
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                let _ = bridge.shutdown().await;
                while let Ok(event) = events.try_recv() {
                    print_event(&mut stdout, &event);
                }
                return ExitCode::SUCCESS;
            }
            received = events.recv() => match received {
                Ok(event) => {
                    print_event(&mut stdout, &event);
                    let ended = event.connection().map(|c| c.status)
                        == Some(ConnectionState::Disconnected);
                    if ended && !bridge.is_running() {
                        return ExitCode::FAILURE;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Dropped notifications");
                }
                Err(RecvError::Closed) => return ExitCode::FAILURE,
            },
        }
    }
}
