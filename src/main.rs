use arduino_serial::config::{Config, ConfigLoader};
use arduino_serial::port::{highest_numbered_port, list_port_names};
use arduino_serial::{logging, BoardKind, BoardProfile, SerialSession, SessionStatus};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Talk to an Arduino-class board over a serial port.",
    long_about = "Frames the board's output into lines, waits for its READY handshake and forwards commands typed on stdin."
)]
struct Args {
    /// Configuration file to use instead of the usual lookup.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON instead of plain text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List serial ports and the one auto-selection would pick.
    Ports {
        /// Name prefix for auto-selection (defaults to the configured one).
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Show the board presets.
    Boards,
    /// Print everything the board sends and forward stdin lines as commands.
    Monitor {
        /// Port to open (defaults to the configured or highest numbered port).
        #[arg(short, long)]
        port: Option<String>,
        /// Board preset name.
        #[arg(short, long)]
        board: Option<String>,
        /// Baud rate, overriding the board preset.
        #[arg(long)]
        baud: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match args.config {
        Some(ref path) => ConfigLoader::load_from(path)?.into_config(),
        None => match ConfigLoader::load() {
            Ok(loader) => loader.into_config(),
            Err(e) => {
                eprintln!("Warning: Failed to load config, using defaults: {}", e);
                ConfigLoader::with_defaults().into_config()
            }
        },
    };
    logging::init(&config.logging);

    match args.command {
        Command::Ports { prefix } => {
            let prefix = prefix.unwrap_or_else(|| config.device.port_prefix().to_string());
            list_ports(&prefix, args.json)
        }
        Command::Boards => list_boards(args.json),
        Command::Monitor { port, board, baud } => {
            let mut config = config;
            if let Some(port) = port {
                config.device.port = Some(port);
            }
            if let Some(board) = board {
                config.device.board = board;
            }
            if baud.is_some() {
                config.device.baud_rate = baud;
            }
            monitor(config, args.json).await
        }
    }
}

fn list_ports(prefix: &str, as_json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let names = list_port_names();
    let selected = highest_numbered_port(&names, prefix);

    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "ports": names, "selected": selected }))?
        );
    } else {
        for name in &names {
            let marker = if *name == selected { "*" } else { " " };
            println!("{} {}", marker, name);
        }
        println!("auto-selected: {}", selected);
    }
    Ok(())
}

fn list_boards(as_json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let boards: Vec<BoardProfile> = BoardKind::ALL.iter().map(|k| k.profile()).collect();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&boards)?);
    } else {
        for board in &boards {
            println!("{:<6} {} baud", board.name, board.baud_rate);
        }
    }
    Ok(())
}

async fn monitor(config: Config, as_json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let session = SerialSession::new(config.device.session_config());
    let mut submissions = session.subscribe_channel();

    session.start(None)?;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut status_tick = tokio::time::interval(Duration::from_millis(100));
    let mut announced_ready = false;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            Some(text) = submissions.recv() => {
                if as_json {
                    println!("{}", json!({ "submission": text }));
                } else {
                    println!("{}", text);
                }
            }
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    let command = line.trim_end();
                    if command.is_empty() {
                        continue;
                    }
                    match session.send_command_async(command).await {
                        Ok(()) => {}
                        Err(e) if e.is_gated() => warn!("Command {:?} dropped: {}", command, e),
                        Err(e) => error!("Command {:?} failed: {}", command, e),
                    }
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!("Stopped reading stdin: {}", e);
                    stdin_open = false;
                }
            },
            _ = status_tick.tick() => match session.status() {
                SessionStatus::Closed => {
                    error!("Serial session closed unexpectedly");
                    break;
                }
                SessionStatus::Open { ready: true } if !announced_ready => {
                    announced_ready = true;
                    info!(port = %session.port_name(), "Board is ready for commands");
                }
                SessionStatus::Open { .. } => {}
            },
        }
    }

    // Stopping joins the reader thread.
    tokio::task::spawn_blocking(move || session.stop()).await?;
    Ok(())
}

// --- Graceful Shutdown Handler ---
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Signal received, closing the port");
}
