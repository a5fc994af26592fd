//! lensdex CLI: index the built-in MovieLens datasets or run a YAML job.

use clap::{Args, Parser, Subcommand};
use lensdex_core::prelude::{parse_yaml_job, IndexerConfig, RunSummary};
use lensdex_exec::{job_outputs, orchestrator_from_job, prepare_index, Dataset, OutputTarget};
use lensdex_io::{build_store, IndexStore};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lensdex")]
#[command(about = "Stream delimited dataset files into a bulk document index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index one of the built-in datasets
    Index {
        /// Dataset name (see `lensdex datasets`)
        #[arg(short, long)]
        dataset: Dataset,

        /// Directory holding the dataset files
        #[arg(long)]
        datadir: PathBuf,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Execute an indexing job from a YAML file
    Run {
        /// Path to the job YAML file
        #[arg(short, long)]
        job: PathBuf,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Validate a job YAML file without touching the store
    Validate {
        /// Path to the job YAML file
        #[arg(short, long)]
        job: PathBuf,
    },

    /// List the built-in datasets and the indices they write
    Datasets,
}

/// Flags shared by `index` and `run`; they win over the job file and env.
#[derive(Args, Debug, Default, Clone)]
struct Overrides {
    /// Store URL (http://host:port, file:///dir, memory://)
    #[arg(long)]
    store: Option<String>,

    /// Delete and recreate the target indices before indexing
    #[arg(long)]
    clear: bool,

    /// Recreate the target indices and exit without indexing
    #[arg(long)]
    clear_only: bool,

    /// Primary lines per bulk write
    #[arg(long)]
    lines_per_bulk: Option<usize>,

    /// Aggregate documents per bulk write
    #[arg(long)]
    groups_per_bulk: Option<usize>,

    /// Batches that may wait per output before the reader blocks
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Members after which an open group is flushed early
    #[arg(long)]
    group_flush_threshold: Option<usize>,

    /// Do not log progress after each bulk write
    #[arg(long)]
    no_progress: bool,
}

impl Overrides {
    fn apply(&self, cfg: &mut IndexerConfig) {
        if let Some(url) = &self.store {
            cfg.store_url = url.clone();
        }
        if let Some(n) = self.lines_per_bulk {
            cfg.lines_per_bulk = n;
        }
        if let Some(n) = self.groups_per_bulk {
            cfg.groups_per_bulk = n;
        }
        if let Some(n) = self.queue_capacity {
            cfg.queue_capacity = n;
        }
        if let Some(n) = self.group_flush_threshold {
            cfg.group_flush_threshold = Some(n);
        }
        if self.no_progress {
            cfg.report_progress = false;
        }
    }

    fn clears(&self) -> bool {
        self.clear || self.clear_only
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Index {
            dataset,
            datadir,
            overrides,
        } => {
            if let Err(e) = index_dataset(dataset, &datadir, &overrides).await {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Run { job, overrides } => {
            if let Err(e) = run_job(&job, &overrides).await {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Validate { job } => {
            if let Err(e) = validate_job(&job) {
                eprintln!("Validation failed: {}", e);
                std::process::exit(1);
            }
            println!("✓ Job is valid");
        }
        Commands::Datasets => list_datasets(),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn index_dataset(
    dataset: Dataset,
    datadir: &Path,
    overrides: &Overrides,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = IndexerConfig::from_env();
    overrides.apply(&mut config);
    config.validate()?;

    let store = build_store(&config.store_url)?;
    if !prepare(&*store, &dataset.outputs(), overrides).await? {
        return Ok(());
    }
    let summary = dataset.orchestrator(datadir, config)?.run(store).await?;
    print_summary(&summary);
    Ok(())
}

async fn run_job(job_path: &Path, overrides: &Overrides) -> Result<(), Box<dyn std::error::Error>> {
    let yaml_content = fs::read_to_string(job_path)?;
    let mut job = parse_yaml_job(&yaml_content)?;
    if let Some(dir) = job_path.parent() {
        job.resolve_paths(dir);
    }

    let mut config = IndexerConfig::from_env();
    job.config.apply(&mut config);
    overrides.apply(&mut config);
    config.validate()?;

    let store = build_store(&config.store_url)?;
    if !prepare(&*store, &job_outputs(&job), overrides).await? {
        return Ok(());
    }
    let summary = orchestrator_from_job(&job, config)?.run(store).await?;
    print_summary(&summary);
    Ok(())
}

/// Recreate indices when asked. Returns false when the run should stop here.
async fn prepare(
    store: &dyn IndexStore,
    outputs: &[OutputTarget],
    overrides: &Overrides,
) -> Result<bool, Box<dyn std::error::Error>> {
    for target in outputs {
        prepare_index(store, target, overrides.clears()).await?;
    }
    if overrides.clear_only {
        println!("✓ Cleared {} index(es) on {}", outputs.len(), store.describe());
        return Ok(false);
    }
    Ok(true)
}

fn validate_job(job_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let yaml_content = fs::read_to_string(job_path)?;
    let job = parse_yaml_job(&yaml_content)?;
    let mut config = IndexerConfig::from_env();
    job.config.apply(&mut config);
    config.validate()?;
    Ok(())
}

fn list_datasets() {
    for dataset in Dataset::ALL {
        let indices: Vec<_> = dataset.outputs().into_iter().map(|t| t.index).collect();
        println!(
            "{:<14} {:<12} -> {}",
            dataset.name(),
            dataset.primary_file(),
            indices.join(", ")
        );
    }
}

fn print_summary(summary: &RunSummary) {
    println!("✓ Indexing finished");
    println!("  Run id: {}", summary.id.0);
    println!("  Duration: {}ms", summary.duration_ms());
    println!(
        "  Lines: {} read, {} skipped ({} KiB)",
        summary.lines_read,
        summary.lines_skipped,
        summary.bytes_read / 1024
    );
    for out in &summary.outputs {
        println!(
            "  {}: {} built, {} written, {} dropped in {} failed batch(es)",
            out.index,
            out.documents_built,
            out.documents_written,
            out.documents_dropped,
            out.batches_failed
        );
        if let Some(digest) = &out.payload_digest {
            println!("    payload digest: {}", digest);
        }
    }
}
