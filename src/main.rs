//! provably-fair command line
//!
//! Plays rounds against a persisted session, rotates and reveals server seeds,
//! and verifies revealed rounds.

use clap::{Args, Parser, Subcommand};
use provably_fair::{
    hash_server_seed, persistence::PersistenceWorker, restore_engine, verify, CoinChoice,
    ConfigLoader, DiceDirection, FairnessConfig, GameOutcome, GameSession, GameType,
    MemorySessionStore, Prediction, RocksSessionStore, RoundRecord, SessionStore,
};
use provably_fair::metrics::FairnessMetrics;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "provably-fair")]
#[command(about = "Provably-fair coin flip, dice and slots", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Session database directory (overrides configuration)
    #[arg(long, global = true)]
    data_dir: Option<String>,

    /// Keep the session in memory only
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current server seed commitment and client seed
    Commit,

    /// Choose the client seed used from the next round on
    SetClientSeed { seed: String },

    /// Play one or more rounds
    Play(PlayArgs),

    /// Reveal the current server seed and commit a new one
    Rotate,

    /// Re-derive a revealed round and compare it with the claimed outcome
    Verify {
        game: String,
        #[arg(long)]
        server_seed: String,
        #[arg(long)]
        client_seed: String,
        #[arg(long)]
        nonce: u64,
        /// `heads`, `42` or `5,2,1`
        #[arg(long)]
        outcome: String,
        /// Published hash to check the revealed server seed against
        #[arg(long)]
        server_seed_hash: Option<String>,
    },

    /// Print the SHA-256 commitment of a server seed
    Hash { server_seed: String },

    /// Show persisted rounds for a game, newest first
    History {
        game: String,
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Write the effective configuration as TOML
    SampleConfig { path: String },
}

#[derive(Args, Debug)]
struct PlayArgs {
    game: String,

    #[arg(long)]
    bet: f64,

    /// Coin flip call
    #[arg(long, default_value = "heads")]
    choice: String,

    /// Dice target
    #[arg(long, default_value = "50")]
    target: u8,

    /// Dice: win above the target (default)
    #[arg(long, conflicts_with = "under")]
    over: bool,

    /// Dice: win below the target
    #[arg(long)]
    under: bool,

    /// Client seed for these rounds only
    #[arg(long)]
    client_seed: Option<String>,

    #[arg(long, default_value = "1")]
    rounds: u32,

    /// Print Prometheus counters afterwards
    #[arg(long)]
    metrics: bool,
}

impl PlayArgs {
    fn prediction(&self, game_type: GameType) -> Result<Prediction, Box<dyn std::error::Error>> {
        Ok(match game_type {
            GameType::CoinFlip => Prediction::CoinFlip {
                choice: self.choice.parse::<CoinChoice>()?,
            },
            GameType::DiceRoll => Prediction::DiceRoll {
                target: self.target,
                direction: match (self.over, self.under) {
                    (false, true) => DiceDirection::Under,
                    _ => DiceDirection::Over,
                },
            },
            GameType::Slots => Prediction::Slots,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "provably_fair=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_path(path);
    }
    let mut config = loader.load()?;
    if let Some(dir) = &cli.data_dir {
        config.storage.data_directory = dir.clone();
    }

    // Commands that need no session state
    match &cli.command {
        Command::Verify {
            game,
            server_seed,
            client_seed,
            nonce,
            outcome,
            server_seed_hash,
        } => {
            let game_type: GameType = game.parse()?;
            let claimed: GameOutcome = outcome.parse()?;
            if let Some(hash) = server_seed_hash {
                provably_fair::seeds::verify_commitment(server_seed, hash)?;
                println!("commitment: ok");
            }
            let valid = verify(game_type, server_seed, client_seed, *nonce, &claimed)?;
            println!("{}", if valid { "valid" } else { "INVALID" });
            if !valid {
                std::process::exit(1);
            }
            return Ok(());
        }
        Command::Hash { server_seed } => {
            println!("{}", hash_server_seed(server_seed));
            return Ok(());
        }
        Command::SampleConfig { path } => {
            loader.save(&config, path)?;
            println!("Wrote {}", path);
            return Ok(());
        }
        _ => {}
    }

    let store: Arc<dyn SessionStore> = if cli.ephemeral {
        Arc::new(MemorySessionStore::new())
    } else {
        std::fs::create_dir_all(&config.storage.data_directory)?;
        Arc::new(RocksSessionStore::open(&config.storage.data_directory)?)
    };

    let metrics = FairnessMetrics::new()?;
    let engine = Arc::new(restore_engine(&config, store.as_ref())?);
    let worker = PersistenceWorker::spawn(store.clone(), Some(metrics.clone()));
    let session = GameSession::new(engine, &config)
        .with_persistence(worker.handle())
        .with_metrics(metrics.clone());
    session.restore_history(store.as_ref())?;
    session.checkpoint()?;

    let result = run(&cli.command, &config, &session, store.as_ref(), &metrics);
    worker.shutdown().await;
    result
}

fn run(
    command: &Command,
    config: &FairnessConfig,
    session: &GameSession,
    store: &dyn SessionStore,
    metrics: &FairnessMetrics,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Commit => {
            let commitment = session.commitment()?;
            println!("{}", serde_json::to_string_pretty(&commitment)?);
        }
        Command::SetClientSeed { seed } => {
            session.set_client_seed(seed)?;
            println!("{}", serde_json::to_string_pretty(&session.commitment()?)?);
        }
        Command::Play(args) => {
            let game_type: GameType = args.game.parse()?;
            let prediction = args.prediction(game_type)?;
            info!(game = %game_type, rounds = args.rounds, rotation = ?config.rotation, "Playing");

            for _ in 0..args.rounds {
                let mut played = session.play(game_type, args.bet, prediction, args.client_seed.as_deref())?;
                let open_hash = session.commitment()?.server_seed_hash;
                redact_open_epoch(&mut played.record, &open_hash);
                println!("{}", serde_json::to_string(&played)?);
            }

            let stats = session.stats(game_type)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            if args.metrics {
                print!("{}", metrics.to_prometheus_format());
            }
        }
        Command::Rotate => {
            let revealed = session.rotate_seed_pair()?;
            println!("{}", serde_json::to_string_pretty(&revealed)?);
            println!("{}", serde_json::to_string_pretty(&session.commitment()?)?);
        }
        Command::History { game, limit } => {
            let game_type: GameType = game.parse()?;
            let open_hash = session.commitment()?.server_seed_hash;
            for mut record in store.recent_rounds(game_type, *limit)? {
                redact_open_epoch(&mut record, &open_hash);
                println!("{}", serde_json::to_string(&record)?);
            }
        }
        Command::Verify { .. } | Command::Hash { .. } | Command::SampleConfig { .. } => {}
    }
    Ok(())
}

/// The server seed of the open epoch stays secret until rotation
fn redact_open_epoch(record: &mut RoundRecord, open_hash: &str) {
    if record.fair.server_seed_hash == open_hash {
        record.fair.server_seed.clear();
    }
}
