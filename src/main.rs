//! combridge - operator console for a terminal-only chat room
//!
//! Connects to a remote host over SSH, joins the resident chat room, and
//! bridges it to stdin/stdout: incoming room traffic is printed as it is
//! recovered from the terminal screen, and operator lines are routed by
//! prefix.
//!
//! # Quick start
//!
//! ```text
//! COM_USERNAME=me COM_SECRET=... combridge
//! com: hello everyone        # speak into the room
//! sh: uptime                 # run a remote shell command
//! /recent                    # replay buffered messages
//! /quit                      # leave and exit
//! ```
//!
//! Configuration lives in `~/.combridge/config.toml`; `COM_HOST`,
//! `COM_PORT`, `COM_USERNAME`, and `COM_SECRET` override it.

use std::env;
use std::io::{self, BufRead};
use std::sync::mpsc;
use std::thread;

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use combridge::{BridgeEvent, Config, RouteOutcome, SessionSupervisor};

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Command-line overrides on top of the config file.
#[derive(Default)]
struct CliArgs {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    /// Connect but stay out of the room (raw commands only).
    no_join: bool,
}

fn print_version() {
    eprintln!("combridge {}", VERSION);
}

fn print_help() {
    eprintln!("combridge {} - bridge to a terminal-only chat room", VERSION);
    eprintln!();
    eprintln!("Usage: combridge [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -H, --host <HOST>     Remote host (default: from config)");
    eprintln!("  -P, --port <PORT>     SSH port (default: 22)");
    eprintln!("  -u, --user <NAME>     Login username");
    eprintln!("  -n, --no-join         Connect without entering the room");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Input lines:");
    eprintln!("  com: <text>           Send <text> into the room");
    eprintln!("  sh: <command>         Type <command> at the remote shell");
    eprintln!("  /recent               Replay recently seen messages");
    eprintln!("  /quit                 Leave the room and exit");
    eprintln!("  anything else         Ignored (conversation, not a command)");
    eprintln!();
    eprintln!("Configuration: ~/.combridge/config.toml");
    eprintln!("Environment:   COM_HOST, COM_PORT, COM_USERNAME, COM_SECRET");
}

fn parse_args() -> Result<CliArgs, String> {
    let args: Vec<String> = env::args().collect();
    let mut cli = CliArgs::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-H" | "--host" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing host argument".to_string());
                }
                cli.host = Some(args[i].clone());
            }
            "-P" | "--port" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing port argument".to_string());
                }
                cli.port = Some(
                    args[i]
                        .parse()
                        .map_err(|_| format!("Invalid port: {}", args[i]))?,
                );
            }
            "-u" | "--user" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing user argument".to_string());
                }
                cli.username = Some(args[i].clone());
            }
            "-n" | "--no-join" => {
                cli.no_join = true;
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(cli)
}

/// Initialize logging to ~/.combridge/combridge.log (append mode).
fn init_logging() {
    let home = env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(std::path::PathBuf::from);

    let log_path = home
        .map(|h| h.join(".combridge").join("combridge.log"))
        .unwrap_or_else(|| std::path::PathBuf::from("combridge.log"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::INFO)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let cli = match parse_args() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    init_logging();
    info!("combridge {} starting", VERSION);

    let mut config = Config::load();
    if let Some(host) = cli.host {
        config.connection.host = host;
    }
    if let Some(port) = cli.port {
        config.connection.port = port;
    }
    if let Some(username) = cli.username {
        config.connection.username = username;
    }

    if config.connection.username.is_empty() {
        anyhow::bail!("no username configured; set COM_USERNAME or use --user");
    }
    if config.connection.secret.is_empty() {
        anyhow::bail!("no secret configured; set COM_SECRET or the config file");
    }

    let host = config.connection.host.clone();
    let (events_tx, events_rx) = mpsc::channel();
    let supervisor = SessionSupervisor::spawn(config, events_tx);

    // Event printer runs on its own thread so input never blocks output.
    let printer = thread::spawn(move || {
        for event in events_rx {
            match event {
                BridgeEvent::Chat(chat) => {
                    if chat.sender.is_empty() {
                        println!("-- {}", chat.text);
                    } else {
                        println!("<{}> {}", chat.sender, chat.text);
                    }
                }
                BridgeEvent::Connected => println!("** connected"),
                BridgeEvent::Disconnected => println!("** disconnected"),
                BridgeEvent::ReconnectExhausted => {
                    println!("** reconnect attempts exhausted; type /connect to retry")
                }
            }
        }
    });

    eprintln!("Connecting to {}...", host);
    supervisor.connect()?;
    if !cli.no_join {
        supervisor.enter_room()?;
        eprintln!("Joined the room. Prefix lines with com: or sh: (/quit to exit).");
    }

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        // Local commands tolerate stray whitespace; the routed line must
        // stay untouched so a leading space keeps its conversation status.
        match line.trim() {
            "" => continue,
            "/quit" => break,
            "/connect" => {
                if let Err(e) = supervisor.connect() {
                    eprintln!("connect failed: {}", e);
                }
            }
            "/recent" => match supervisor.read_recent(20) {
                Ok(events) => {
                    for chat in events {
                        println!("<{}> {}", chat.sender, chat.text);
                    }
                }
                Err(e) => eprintln!("recent failed: {}", e),
            },
            _ => match supervisor.route(&line) {
                Ok(RouteOutcome::Ignored) => {
                    eprintln!("(ignored; prefix with com: or sh: to act)");
                }
                Ok(_) => {}
                Err(e) => eprintln!("send failed: {}", e),
            },
        }
    }

    if !cli.no_join {
        let _ = supervisor.leave_room();
    }
    let _ = supervisor.disconnect();
    drop(supervisor);
    let _ = printer.join();
    info!("combridge exiting");
    Ok(())
}
