use clap::{Parser, Subcommand};
use lib::supervisor::RunExit;

#[derive(Parser)]
#[command(name = "autoreply")]
#[command(about = "Answers incoming WhatsApp messages through a question-answer API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory, a default config file, and the session directory.
    Init {
        /// Config file path (default: AUTOREPLY_CONFIG_PATH or ~/.autoreply/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the bot (the default when no subcommand is given). Prompts for a phone number when the session is not paired yet.
    Run {
        /// Config file path (default: AUTOREPLY_CONFIG_PATH or ~/.autoreply/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Bridge WebSocket URL (default from AUTOREPLY_BRIDGE_URL or config)
        #[arg(long, value_name = "URL")]
        bridge_url: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("autoreply {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Run { config, bridge_url }) => {
            if let Err(e) = run(config, bridge_url).await {
                log::error!("bot failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            if let Err(e) = run(None, None).await {
                log::error!("bot failed: {:#}", e);
                std::process::exit(1);
            }
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let session_dir = lib::init::init_config_dir(&path)?;
    println!(
        "initialized configuration at {} (session: {})",
        path.display(),
        session_dir.display()
    );
    Ok(())
}

async fn run(
    config_path: Option<std::path::PathBuf>,
    bridge_url: Option<String>,
) -> anyhow::Result<()> {
    let (mut config, path) = lib::config::load_config(config_path)?;
    config.bridge.url = bridge_url.unwrap_or_else(|| lib::config::resolve_bridge_url(&config));
    match lib::bot::run_bot(config, &path, shutdown_signal()).await? {
        RunExit::LoggedOut => log::info!("session logged out, not reconnecting"),
        RunExit::Shutdown => log::info!("stopped"),
    }
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {}", e);
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
    log::info!("shutdown signal received");
}
