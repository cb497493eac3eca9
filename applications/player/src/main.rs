/// Fermata - music player with a remote control socket
use clap::{Parser, Subcommand};
use fermata_player::{app, Player, PlayerConfig};
use fermata_remote::RemoteAuth;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "fermata")]
#[command(about = "Fermata music player", long_about = None)]
struct Cli {
    /// Configuration file path (default: ./fermata.toml if present)
    #[arg(short, long, global = true, env = "FERMATA_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the player
    Run {
        /// JSON array of songs to play, replacing the resumed queue
        #[arg(short, long)]
        queue: Option<PathBuf>,
    },
    /// Print a credential header for remote clients
    Token,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "fermata=info,fermata_player=info,fermata_playback=info,fermata_remote=info,tower_http=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = PlayerConfig::load(cli.config.as_deref())?;
    config.validate()?;

    match cli.command {
        Commands::Run { queue } => run(config, queue).await?,
        Commands::Token => token(&config)?,
    }

    Ok(())
}

async fn run(config: PlayerConfig, queue: Option<PathBuf>) -> anyhow::Result<()> {
    tracing::info!("Starting Fermata");

    let queue = match queue {
        Some(path) => Some(app::load_queue_file(&path).await?),
        None => None,
    };

    let player = Player::start(config, queue).await?;
    if let Some(addr) = player.remote_addr() {
        tracing::info!("Remote control on ws://{}/ws", addr);
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    player.shutdown().await?;

    Ok(())
}

fn token(config: &PlayerConfig) -> anyhow::Result<()> {
    if config.remote.secret.as_deref().map_or(true, str::is_empty) {
        anyhow::bail!(
            "remote.secret is not set; a token signed with a per-run secret is useless to a running player"
        );
    }

    let auth = RemoteAuth::from_config(&config.remote);
    println!("{}", auth.credential_header()?);
    Ok(())
}
