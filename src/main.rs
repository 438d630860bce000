use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::filter::LevelFilter;

use uartwatch_lib::{ConnectionState, DeviceEvent, DeviceManager, MonitorSettings};

#[derive(Parser, Debug)]
#[command(name = "uartwatch", version, about = "Serial status monitor for star-hash framed devices")]
struct Cli {
    /// JSON settings file
    #[arg(long, global = true, env = "UARTWATCH_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value = "info")]
    log_level: LogLevel,

    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List serial ports
    Ports,
    /// Connect to a port and stream status snapshots as JSON
    Monitor {
        port: String,

        /// Echo incoming text as it arrives
        #[arg(long)]
        raw: bool,

        /// Override the configured baud rate
        #[arg(long)]
        baud: Option<u32>,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

// stdout carries status JSON, so logs go to stderr
fn init_logging(format: LogFormat, level: LogLevel) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level.as_filter())
        .with_ansi(false)
        .with_target(false);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let mut settings = match &cli.config {
        Some(path) => MonitorSettings::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => MonitorSettings::default(),
    };

    match cli.command {
        Command::Ports => list_ports(settings),
        Command::Monitor { port, raw, baud } => {
            if let Some(baud) = baud {
                settings.baud_rate = baud;
            }
            settings.validate()?;
            monitor(settings, &port, raw).await
        }
    }
}

fn list_ports(settings: MonitorSettings) -> Result<()> {
    let manager = DeviceManager::new(settings);
    let devices = manager.discover_devices()?;

    if devices.is_empty() {
        log::info!("No serial ports found");
    }

    let mut stdout = std::io::stdout().lock();
    for device in devices {
        match (device.vid, device.pid) {
            (Some(vid), Some(pid)) => writeln!(
                stdout,
                "{}\t{:04x}:{:04x}\t{}",
                device.port_name,
                vid,
                pid,
                device.product.as_deref().unwrap_or("")
            )?,
            _ => writeln!(stdout, "{}", device.port_name)?,
        }
    }
    Ok(())
}

async fn monitor(settings: MonitorSettings, port: &str, raw: bool) -> Result<()> {
    let manager = DeviceManager::new(settings);
    let mut status_rx = manager.subscribe_status();
    let mut state_rx = manager.subscribe_state();
    let mut events_rx = manager.subscribe_events();

    let info = manager
        .connect(port)
        .await
        .with_context(|| format!("connecting to {}", port))?;
    log::info!("Session {} on {}", info.session_id, info.port_name);

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted");
                break;
            }

            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = status_rx.borrow_and_update().clone();
                println!("{}", serde_json::to_string(&*snapshot)?);
            }

            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = state_rx.borrow_and_update().clone();
                match state {
                    ConnectionState::Disconnected => {
                        log::info!("Link closed");
                        return Ok(());
                    }
                    ConnectionState::Error(message) => {
                        anyhow::bail!("link failed: {}", message);
                    }
                    _ => {}
                }
            }

            event = events_rx.recv(), if raw => match event {
                Ok(DeviceEvent::RawText { text }) => {
                    print!("{}", text);
                    std::io::stdout().flush()?;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => log::warn!("Dropped {} events", skipped),
                Err(RecvError::Closed) => break,
            },

            line = stdin.next_line() => match line? {
                Some(line) => {
                    if let Err(e) = manager.send(&line).await {
                        log::warn!("Send failed: {}", e);
                    }
                }
                None => {
                    log::info!("End of input");
                    break;
                }
            },
        }
    }

    manager.disconnect().await?;
    Ok(())
}
