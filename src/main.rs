//! Periodiq command line
//!
//! Offline driver for the resolution engine: simulate a contested round,
//! inspect winning conditions, or write a sample configuration.

use chrono::Duration as ChronoDuration;
use clap::{Parser, Subcommand};
use periodiq::{
    config::generate_sample_config,
    coordinator::InMemoryResultRepository,
    games::{split_key, GameType, SpaceRegistry},
    round::ManualClock,
    ConfigLoader, EngineFactory, EngineParts, PeriodiqConfig, RawBet, RecordOutcome, RoundKey,
};
use rand::{seq::SliceRandom, Rng};
use std::{path::PathBuf, sync::Arc};

/// Periodiq resolution engine CLI
#[derive(Parser)]
#[command(name = "periodiq")]
#[command(about = "Outcome resolution engine for periodic betting rounds")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Record random bets and resolve the round with racing workers
    Simulate {
        /// Game: wingo, k3 or 5d
        #[arg(short, long, default_value = "wingo")]
        game: GameType,

        /// Round duration in seconds
        #[arg(short, long, default_value = "30")]
        duration: u32,

        /// Number of bets to place
        #[arg(short, long, default_value = "200")]
        bets: usize,

        /// Distinct bettors placing them
        #[arg(short, long, default_value = "20")]
        users: usize,

        /// Concurrent resolver processes
        #[arg(short, long, default_value = "3")]
        workers: usize,
    },

    /// Print the bet keys that win against an outcome
    Conditions {
        #[arg(short, long, default_value = "wingo")]
        game: GameType,

        /// Outcome digits, e.g. 7, 146 or 03921
        outcome: String,
    },

    /// Write a configuration file with defaults
    SampleConfig {
        #[arg(short, long, default_value = "periodiq.toml")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let loader = match &cli.config {
        Some(path) => ConfigLoader::new().with_path(path),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load()?;
    if cli.verbose {
        config.logging.filter = "periodiq=debug".to_string();
    }
    periodiq::logging::init(&config.logging);

    match cli.command {
        Commands::Simulate {
            game,
            duration,
            bets,
            users,
            workers,
        } => simulate(config, game, duration, bets, users, workers).await,
        Commands::Conditions { game, outcome } => print_conditions(game, &outcome),
        Commands::SampleConfig { output } => {
            generate_sample_config(&output)?;
            println!("Sample configuration written to {}", output);
            Ok(())
        }
    }
}

async fn simulate(
    config: PeriodiqConfig,
    game: GameType,
    duration: u32,
    bets: usize,
    users: usize,
    workers: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let round = RoundKey::current(game, duration, "default", chrono::Utc::now());
    let clock = Arc::new(ManualClock::new(round.start_time()?));
    let repository = Arc::new(InMemoryResultRepository::new());
    let parts = EngineParts {
        clock: clock.clone(),
        repository: repository.clone(),
        ..EngineParts::in_memory()
    };

    let mut engines = Vec::with_capacity(workers.max(1));
    for worker in 0..workers.max(1) {
        let mut worker_config = config.clone();
        worker_config.coordinator.process_id = Some(format!("worker-{}", worker));
        engines.push(EngineFactory::create(worker_config, parts.clone())?);
    }

    let space = engines[0]
        .spaces
        .get(game)
        .ok_or_else(|| format!("no rules for {}", game))?;
    let keys = space.rules().all_keys();
    let mut skipped = 0usize;
    for n in 0..bets {
        let (user, key, amount) = {
            let mut rng = rand::thread_rng();
            let key = keys.choose(&mut rng).map(|k| k.to_string()).unwrap_or_default();
            (
                format!("user-{}", rng.gen_range(0..users.max(1))),
                key,
                f64::from(rng.gen_range(1..=50u32) * 10),
            )
        };
        let Some((bet_type, bet_value)) = split_key(&key) else {
            continue;
        };
        let raw = RawBet::new(&user, bet_type, bet_value, amount).for_round(round.period_id.clone());
        let engine = &engines[n % engines.len()];
        if let RecordOutcome::Skipped(_) = engine.ledger.record_bet(&round, &raw).await? {
            skipped += 1;
        }
    }

    clock.set(round.end_time()? + ChronoDuration::seconds(1));

    let handles: Vec<_> = engines
        .iter()
        .map(|engine| {
            let coordinator = engine.coordinator.clone();
            let round = round.clone();
            tokio::spawn(async move { coordinator.resolve_round(&round).await })
        })
        .collect();

    let mut published = Vec::with_capacity(handles.len());
    for handle in futures::future::join_all(handles).await {
        published.push(handle??);
    }

    let first = &published[0];
    let agreed = published.iter().all(|r| r.outcome == first.outcome);
    let computations: u64 = engines.iter().map(|e| e.metrics.computations()).sum();

    println!("Round {}", round);
    println!("Bets: {} recorded, {} skipped", bets - skipped, skipped);
    println!("{}", serde_json::to_string_pretty(first)?);
    println!(
        "Workers: {}, agreed: {}, computations: {}, saves: {}",
        published.len(),
        agreed,
        computations,
        repository.save_count()
    );
    for engine in &engines {
        println!("{}", serde_json::to_string(&engine.metrics.snapshot())?);
    }
    Ok(())
}

fn print_conditions(game: GameType, label: &str) -> Result<(), Box<dyn std::error::Error>> {
    let space = SpaceRegistry::standard()
        .get(game)
        .ok_or_else(|| format!("no rules for {}", game))?;
    let index = (0..space.len())
        .find(|i| space.outcome(*i).label() == label)
        .ok_or_else(|| format!("{} is not a {} outcome", label, game))?;

    let outcome = space.outcome(index);
    println!("{} outcome {} (index {})", game, outcome.label(), index);
    println!("{}", serde_json::to_string_pretty(&outcome.summary())?);
    for key in space.winning_condition_strings(index) {
        println!("  {}", key);
    }
    Ok(())
}
