//! CLI for the flux time-series store.
//!
//! Provides commands for loading samples into a store, running lookups
//! against them, and benchmarking concurrent access.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Instant;

use clap::{Args, Parser, Subcommand, ValueEnum};
use flux::{Sample, SeriesStore, StoreConfig};
use serde::Deserialize;

/// flux — Concurrent in-memory time-series store CLI.
#[derive(Parser)]
#[command(name = "flux", version, about)]
struct Cli {
    /// Path to a JSON store configuration.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Load samples from a JSON file and run a lookup against one series.
    Query {
        /// JSON array of `{series, timestamp, value, confidence}` objects.
        #[arg(long)]
        input: PathBuf,

        /// Series name to query.
        #[arg(long)]
        series: String,

        #[command(flatten)]
        lookup: Lookup,

        /// Output format.
        #[arg(long, default_value = "csv")]
        format: OutputFormat,
    },

    /// Run a concurrent append/lookup microbenchmark.
    Bench {
        /// Number of samples to append per series.
        #[arg(long, default_value = "1000000")]
        points: i64,

        /// Number of series, each with its own writer thread.
        #[arg(long, default_value = "4")]
        series: usize,

        /// Number of reader threads.
        #[arg(long, default_value = "4")]
        readers: usize,

        /// Capacity of each series.
        #[arg(long, default_value = "100000")]
        capacity: usize,
    },
}

/// Which lookup to run. Exactly one must be given.
#[derive(Args)]
#[group(required = true, multiple = false)]
struct Lookup {
    /// Sample at this timestamp, or the newest one before it.
    #[arg(long, allow_negative_numbers = true)]
    at: Option<i64>,

    /// Newest sample strictly before this timestamp.
    #[arg(long, allow_negative_numbers = true)]
    before: Option<i64>,

    /// Oldest sample strictly after this timestamp.
    #[arg(long, allow_negative_numbers = true)]
    after: Option<i64>,

    /// All samples strictly between START and END.
    #[arg(long, num_args = 2, value_names = ["START", "END"], allow_negative_numbers = true)]
    range: Option<Vec<i64>>,
}

/// Output format for query results.
#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Comma-separated values.
    Csv,
    /// JSON object with metadata and samples.
    Json,
}

/// One input record.
#[derive(Deserialize)]
struct InputPoint {
    series: String,
    timestamp: i64,
    value: f64,
    #[serde(default = "default_confidence")]
    confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Query {
            input,
            series,
            lookup,
            format,
        } => cmd_query(config, &input, &series, &lookup, &format),
        Commands::Bench {
            points,
            series,
            readers,
            capacity,
        } => cmd_bench(config, points, series, readers, capacity),
    });

    if let Err(e) = result {
        tracing::error!("{e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<StoreConfig, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::default(),
    })
}

/// Implements `flux query`.
fn cmd_query(
    config: StoreConfig,
    input: &Path,
    series_name: &str,
    lookup: &Lookup,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = std::fs::read_to_string(input)
        .map_err(|e| format!("failed to read '{}': {e}", input.display()))?;
    let points: Vec<InputPoint> = serde_json::from_str(&data)?;

    let store = SeriesStore::new(config)?;

    // Group by series and sort so every series loads as one ordered batch
    let mut grouped: BTreeMap<String, Vec<Sample>> = BTreeMap::new();
    for p in points {
        grouped
            .entry(p.series)
            .or_default()
            .push(Sample::new(p.timestamp, p.value, p.confidence));
    }
    for (name, mut samples) in grouped {
        samples.sort_by_key(|s| s.timestamp);
        let name = store.register(&name);
        store.add_points(&name, &samples)?;
    }
    tracing::info!("loaded {store} from {}", input.display());

    if !store.contains(series_name) {
        return Err(format!("Series '{series_name}' not found in input").into());
    }

    let (kind, samples) = match (lookup.at, lookup.before, lookup.after, &lookup.range) {
        (Some(t), _, _, _) => ("at", vec![store.point(series_name, t)]),
        (_, Some(t), _, _) => ("before", vec![store.point_before(series_name, t)]),
        (_, _, Some(t), _) => ("after", vec![store.point_after(series_name, t)]),
        (_, _, _, Some(range)) => ("range", store.points_in_range(series_name, range[0], range[1])),
        _ => return Err("no lookup given".into()),
    };
    let samples: Vec<Sample> = samples.into_iter().filter(Sample::is_present).collect();

    match format {
        OutputFormat::Csv => {
            println!("# series={series_name}, lookup={kind}, points={}", samples.len());
            println!("timestamp,value,confidence,status");
            for s in &samples {
                println!("{},{},{},{:?}", s.timestamp, s.value, s.confidence, s.status);
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "series": series_name,
                "lookup": kind,
                "count": samples.len(),
                "stats": store.stats(series_name),
                "data": samples,
            });

            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Implements `flux bench`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation
)] // Benchmark stats are fine with f64 precision
fn cmd_bench(
    config: StoreConfig,
    points: i64,
    series_count: usize,
    readers: usize,
    capacity: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    if series_count == 0 {
        return Err("--series must be at least 1".into());
    }

    println!("flux concurrent benchmark");
    println!("  Points per series: {points}");
    println!("  Series (writers): {series_count}");
    println!("  Readers: {readers}");
    println!("  Capacity: {capacity}");
    println!();

    let store = SeriesStore::new(StoreConfig {
        default_capacity: capacity,
        ..config
    })?;
    let names: Vec<String> = (0..series_count)
        .map(|i| store.register(&format!("metric_{i}")))
        .collect();

    let writers_done = AtomicBool::new(false);
    let lookups = AtomicU64::new(0);
    let start = Instant::now();

    let write_elapsed = thread::scope(|s| -> Result<_, flux::FluxError> {
        for r in 0..readers {
            let (store, names, writers_done, lookups) = (&store, &names, &writers_done, &lookups);
            s.spawn(move || {
                let mut count = 0u64;
                let mut t = 0i64;
                while !writers_done.load(Ordering::Relaxed) {
                    let name = &names[(r + t as usize) % names.len()];
                    let _ = store.point(name, t);
                    let _ = store.point_after(name, t);
                    t = (t + 7919) % points.max(1);
                    count += 2;
                }
                lookups.fetch_add(count, Ordering::Relaxed);
            });
        }

        let writers: Vec<_> = names
            .iter()
            .map(|name| {
                let store = &store;
                s.spawn(move || -> Result<(), flux::FluxError> {
                    for t in 0..points {
                        store.add_point(name, Sample::new(t, t as f64, 1.0))?;
                    }
                    Ok(())
                })
            })
            .collect();

        let mut outcome = Ok(());
        for writer in writers {
            if let Ok(Err(e)) = writer.join() {
                outcome = Err(e);
            }
        }
        let elapsed = start.elapsed();
        writers_done.store(true, Ordering::Relaxed);
        outcome.map(|()| elapsed)
    })?;

    let total_writes = points.max(0) as u64 * series_count as u64;
    let total_lookups = lookups.load(Ordering::Relaxed);
    let secs = write_elapsed.as_secs_f64();

    println!("Results:");
    println!("  Total writes: {total_writes}");
    println!("  Total lookups: {total_lookups}");
    println!("  Elapsed: {write_elapsed:.3?}");
    println!("  Write throughput: {:.0} writes/sec", total_writes as f64 / secs);
    println!("  Lookup throughput: {:.0} lookups/sec", total_lookups as f64 / secs);
    if let Some(name) = names.first()
        && let Some(stats) = store.stats(name)
    {
        println!("  {name}: {} kept, {} evicted", stats.len, stats.evicted);
    }

    Ok(())
}
