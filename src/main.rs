//! Live-chat handover core, process entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Resolve effective log level (CLI `-v` flags > env > config)
//!   4. Init logger once
//!   5. Build the live chat core (store, provider, knowledge)
//!   6. Spawn Ctrl-C → shutdown signal watcher
//!   7. Start the inactivity reaper
//!   8. With -i, run the visitor console; otherwise wait for Ctrl-C
//!   9. Cancel token + stop the reaper

use livechat_handover::config;
use livechat_handover::console;
use livechat_handover::error;
use livechat_handover::livechat::LiveChat;
use livechat_handover::logger;
use livechat_handover::session::VisitorInfo;

use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), error::AppError> {
    // Load .env if present; the file is optional.
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();

    let config = config::load(args.config_path.as_deref())?;
    logger::parse_level(&config.log_level)?;

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    let force_cli_level = args.log_level.is_some();

    logger::init(effective_log_level, force_cli_level)?;

    info!(
        bot_name = %config.bot_name,
        work_dir = %config.work_dir.display(),
        configured_log_level = %config.log_level,
        effective_log_level = %effective_log_level,
        interactive = %args.interactive,
        "config loaded"
    );

    let chat = LiveChat::from_config(&config)?;

    // Shared shutdown token. Ctrl-C cancels it and every task watches it.
    let shutdown = CancellationToken::new();

    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    let reaper = chat.start_reaper(&shutdown);

    if args.interactive {
        let visitor = VisitorInfo::new(format!("console-{}", uuid::Uuid::new_v4()), "Console");
        console::run(&chat, visitor, shutdown.clone()).await?;
    } else {
        info!("running, Ctrl-C to stop");
        shutdown.cancelled().await;
    }

    shutdown.cancel();
    if let Some(reaper) = reaper {
        reaper.stop().await;
    }

    info!("shutdown complete");
    Ok(())
}

struct CliArgs {
    log_level: Option<&'static str>,
    interactive: bool,
    config_path: Option<String>,
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut interactive = false;
    let mut config_path = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: livechat-handover [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -i, --interactive          Chat as a visitor on stdin/stdout");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                std::process::exit(0);
            }
            "-i" | "--interactive" => interactive = true,
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(path);
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => {}
        }
    }

    //   -v → warn, -vv → info, -vvv → debug, -vvvv+ → trace
    let log_level = match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    };

    CliArgs { log_level, interactive, config_path }
}
