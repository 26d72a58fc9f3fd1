use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use hashtag_graph::export::export_edges_csv;
use hashtag_graph::graph::round_half_up;
use hashtag_graph::memory::ByteSize;
use hashtag_graph::{load_graph, CoOccurrenceGraph, HashType, IngestConfig, Shell};
use rustc_hash::FxBuildHasher;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hashtag-graph")]
#[command(about = "Hashtag co-occurrence graph over line-delimited tweet JSON", long_about = None)]
struct Args {
    /// Number of extraction threads (default: number of CPUs)
    #[arg(short = 't', long)]
    threads: Option<usize>,

    /// Hash function for the graph maps (default/siphash, fxhash/fx, ahash)
    #[arg(short = 'H', long, default_value = "fxhash")]
    hash: HashType,

    /// JSON config file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Load FILE, print a JSON summary and exit instead of starting the shell
    #[arg(long)]
    json: bool,

    /// With --json, also write the edge CSV to this path
    #[arg(long)]
    export: Option<PathBuf>,

    /// Tweets file (one JSON object per line) to load at startup
    filename: Option<PathBuf>,
}

#[derive(Serialize)]
struct Config {
    threads: usize,
    hash: String,
    filename: String,
}

/// Elapsed time as milliseconds with three decimals.
fn serialize_millis<S>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(round_half_up(elapsed.as_nanos(), 1_000_000, 3))
}

#[derive(Serialize)]
struct Results {
    records: u64,
    skipped: u64,
    observations: u64,
    nodes: usize,
    edges: usize,
    tag_sets: usize,
    average_degree: f64,
    #[serde(serialize_with = "serialize_millis")]
    load_time_ms: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    peak_memory_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    peak_memory_human: Option<String>,
}

#[derive(Serialize)]
struct OutputData {
    config: Config,
    results: Results,
}

fn run_json<S>(args: &Args, config: &IngestConfig) -> anyhow::Result<()>
where
    S: BuildHasher + Default + Send + Sync,
{
    let path = args
        .filename
        .as_ref()
        .context("--json needs an input file")?;
    let (graph, report) = load_graph::<S>(path, config)
        .with_context(|| format!("loading {}", path.display()))?;

    if let Some(export) = &args.export {
        export_edges_csv(&graph, export)
            .with_context(|| format!("exporting edges to {}", export.display()))?;
    }

    let snapshot = graph.snapshot();
    let output = OutputData {
        config: Config {
            threads: config.threads,
            hash: args.hash.name().to_string(),
            filename: path.display().to_string(),
        },
        results: Results {
            records: report.records,
            skipped: report.skipped,
            observations: report.observations,
            nodes: snapshot.node_count,
            edges: snapshot.edge_count,
            tag_sets: snapshot.tag_sets.len(),
            average_degree: graph.average_degree_with(config.decimals),
            load_time_ms: report.elapsed,
            peak_memory_bytes: report.peak_memory_bytes,
            peak_memory_human: report.peak_memory_bytes.map(|b| ByteSize(b).to_string()),
        },
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_shell<S>(args: &Args, config: IngestConfig) -> anyhow::Result<()>
where
    S: BuildHasher + Default + Send + Sync,
{
    let graph = match &args.filename {
        Some(path) => {
            let (graph, report) = load_graph::<S>(path, &config)
                .with_context(|| format!("loading {}", path.display()))?;
            println!(
                "Loaded {} records ({} skipped) in {:.2?}",
                report.records, report.skipped, report.elapsed
            );
            graph
        }
        None => CoOccurrenceGraph::new(),
    };

    println!("Hashtag graph shell. Type help for commands.");
    let mut shell = Shell::with_graph(graph, config);
    let stdin = io::stdin();
    shell.run(stdin.lock(), io::stdout())?;
    Ok(())
}

fn run_with_graph<S>(args: &Args, config: IngestConfig) -> anyhow::Result<()>
where
    S: BuildHasher + Default + Send + Sync,
{
    if args.json {
        run_json::<S>(args, &config)
    } else {
        run_shell::<S>(args, config)
    }
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays parseable in --json mode.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => IngestConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => IngestConfig::default(),
    };
    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    config.validate()?;

    match args.hash {
        HashType::FxHash => run_with_graph::<FxBuildHasher>(&args, config),
        HashType::AHash => run_with_graph::<ahash::RandomState>(&args, config),
        HashType::Default => run_with_graph::<RandomState>(&args, config),
    }
}
