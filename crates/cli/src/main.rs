use anyhow::{Context, Result, anyhow};
use beer_catalog::CHOOSE_A_BEER;
use clap::{Parser, Subcommand};
use colored::Colorize;
use rand::seq::IndexedRandom;
use server::{BeerRecommender, BeerRef, PredictionResult, RankedPick, RankerConfig, load_recommender};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// BrewRecs - Beer Recommendation Engine
#[derive(Parser)]
#[command(name = "brew-recs")]
#[command(about = "Query a pre-trained k-NN beer recommender from the terminal", long_about = None)]
struct Cli {
    /// Beer metadata table
    #[arg(long, env = "BEERS_PATH", default_value = "data/dump/beer_final.tsv")]
    beers_path: PathBuf,

    /// Persisted k-NN model artifact
    #[arg(long, env = "KNN_MODEL_PATH", default_value = "data/dump/knn_model.json")]
    model_path: PathBuf,

    /// Threads used to score the catalog for one ranking
    #[arg(long, env = "RANK_WORKERS")]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the beers most similar to a beer
    Neighbors {
        /// Display name, e.g. "Heady Topper;The Alchemist"
        #[arg(long)]
        beer: String,
    },

    /// Predict how a user would rate one beer
    Predict {
        #[arg(long)]
        user: String,

        /// Beer id or display name
        #[arg(long)]
        beer: String,
    },

    /// Show a user's ten best and ten worst predicted beers
    Rank {
        #[arg(long)]
        user: String,
    },

    /// Search beers by name (case-insensitive substring match)
    Search {
        #[arg(long)]
        name: String,

        /// Maximum number of results
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// List every beer display name in dropdown order
    Beers,

    /// Run benchmark to test ranking performance
    Benchmark {
        /// Number of rankings to request
        #[arg(long, default_value = "100")]
        requests: usize,

        /// Number of rankings in flight at once
        #[arg(long, default_value = "10")]
        concurrent: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    println!(
        "Loading {} and {}...",
        cli.beers_path.display(),
        cli.model_path.display()
    );
    let start = Instant::now();
    let mut ranker = RankerConfig::default();
    if let Some(workers) = cli.workers {
        ranker.workers = workers;
    }
    let recommender = Arc::new(
        load_recommender(&cli.beers_path, &cli.model_path, ranker)
            .context("Failed to load recommender artifacts")?,
    );
    println!("{} Loaded artifacts in {:?}", "✓".green(), start.elapsed());

    match cli.command {
        Commands::Neighbors { beer } => handle_neighbors(&recommender, &beer)?,
        Commands::Predict { user, beer } => handle_predict(&recommender, &user, &beer)?,
        Commands::Rank { user } => handle_rank(&recommender, &user).await?,
        Commands::Search { name, limit } => handle_search(&recommender, &name, limit),
        Commands::Beers => handle_beers(&recommender),
        Commands::Benchmark {
            requests,
            concurrent,
        } => handle_benchmark(recommender, requests, concurrent).await?,
    }

    Ok(())
}

/// Numeric input is a beer id, anything else a display name
fn parse_beer_ref(raw: &str) -> BeerRef {
    match raw.trim().parse() {
        Ok(id) => BeerRef::Id(id),
        Err(_) => BeerRef::Name(raw.to_string()),
    }
}

fn handle_neighbors(recommender: &BeerRecommender, beer: &str) -> Result<()> {
    let report = recommender.neighbor_report_by_name(beer)?;

    println!("{}", format!("Beers similar to '{}':", beer).bold().blue());
    for (rank, row) in report.iter().enumerate() {
        println!(
            "{}. {} [{}] - Mean score: {:.2}",
            (rank + 1).to_string().green(),
            row.name,
            row.style,
            row.score_mean
        );
    }
    Ok(())
}

fn handle_predict(recommender: &BeerRecommender, user: &str, beer: &str) -> Result<()> {
    let result = recommender.predict_one(user, &parse_beer_ref(beer))?;
    print_prediction(recommender, &result);
    Ok(())
}

async fn handle_rank(recommender: &BeerRecommender, user: &str) -> Result<()> {
    let start = Instant::now();
    let ranking = recommender.rank_for_user(user).await?;

    println!(
        "{}",
        format!("Top picks for '{}' ({:?}):", user, start.elapsed())
            .bold()
            .blue()
    );
    print_picks(&ranking.top);
    println!("{}", format!("Beers '{}' should avoid:", user).bold().red());
    print_picks(&ranking.bottom);
    Ok(())
}

fn handle_search(recommender: &BeerRecommender, name: &str, limit: usize) {
    let matches = recommender.catalog().search(name);

    println!(
        "{}",
        format!("Search results for '{}' ({} matches):", name, matches.len())
            .bold()
            .blue()
    );
    for beer in matches.iter().take(limit) {
        println!(
            "{}: {} [{}] mean {:.2}",
            beer.id, beer.display_name, beer.style, beer.mean_score
        );
    }
}

fn handle_beers(recommender: &BeerRecommender) {
    for name in recommender.list_display_names() {
        if name == CHOOSE_A_BEER {
            continue;
        }
        println!("{}", name);
    }
}

/// Rankings for randomly chosen known users, at most `concurrent` in flight
async fn handle_benchmark(
    recommender: Arc<BeerRecommender>,
    requests: usize,
    concurrent: usize,
) -> Result<()> {
    let users = recommender.oracle().known_users();
    if users.is_empty() {
        return Err(anyhow!("Model has no known users to benchmark with"));
    }
    if requests == 0 {
        return Err(anyhow!("Benchmark needs at least one request"));
    }

    let mut rng = rand::rng();
    let sampled: Vec<String> = (0..requests)
        .filter_map(|_| users.choose(&mut rng).cloned())
        .collect();
    tracing::info!(
        "Benchmarking {} rankings sampled from {} users",
        sampled.len(),
        users.len()
    );

    let semaphore = Arc::new(Semaphore::new(concurrent.max(1)));
    let wall = Instant::now();
    let mut handles = Vec::with_capacity(sampled.len());
    for user in sampled {
        let recommender = recommender.clone();
        let semaphore = semaphore.clone();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await?;
            let start = Instant::now();
            recommender.rank_for_user(&user).await?;
            Ok::<_, anyhow::Error>(start.elapsed())
        }));
    }

    let mut timings = Vec::with_capacity(handles.len());
    for handle in handles {
        timings.push(handle.await??);
    }
    let wall_time = wall.elapsed();

    timings.sort();
    let total: Duration = timings.iter().sum();
    let avg = total / timings.len() as u32;
    let throughput = timings.len() as f64 / wall_time.as_secs_f64();

    println!("{}", "Benchmark results:".bold().blue());
    println!("Requests: {} ({} concurrent)", timings.len(), concurrent.max(1));
    println!("Wall time: {:?}", wall_time);
    println!("Average latency: {:?}", avg);
    println!("P50 latency: {:?}", percentile(&timings, 0.50));
    println!("P95 latency: {:?}", percentile(&timings, 0.95));
    println!("P99 latency: {:?}", percentile(&timings, 0.99));
    println!("Throughput: {:.2} rankings/second", throughput);

    Ok(())
}

/// Nearest-rank percentile of sorted, non-empty timings
fn percentile(sorted: &[Duration], p: f64) -> Duration {
    let idx = ((sorted.len() as f64 * p).ceil() as usize).clamp(1, sorted.len()) - 1;
    sorted[idx]
}

fn print_prediction(recommender: &BeerRecommender, result: &PredictionResult) {
    let name = recommender
        .catalog()
        .get(result.beer_id)
        .map(|b| b.display_name.as_str())
        .unwrap_or("?");
    println!(
        "{} would rate {} ({}) {}",
        result.username.bold(),
        name,
        result.beer_id,
        format!("{:.2}", result.prediction).green()
    );
    if result.details.was_impossible {
        println!(
            "   {} {}",
            "Fallback estimate:".yellow(),
            result.details.reason.as_deref().unwrap_or("unknown reason")
        );
    } else if let Some(k) = result.details.actual_k {
        println!("   Based on {} neighbours", k);
    }
}

fn print_picks(picks: &[RankedPick]) {
    for (rank, pick) in picks.iter().enumerate() {
        println!(
            "{}. {} [{}] - Predicted: {:.2}, Mean score: {:.2}",
            (rank + 1).to_string().green(),
            pick.beer_brewery,
            pick.style,
            pick.result.prediction,
            pick.score
        );
    }
}
