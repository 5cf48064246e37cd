use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use insarama_etl::config::EngineConfig;
use insarama_etl::logging::init_tracing;
use insarama_etl::pipeline::StarSchemaEngine;
use insarama_etl::util::env;
use tracing::{error, info, warn};

/// Every flag overrides the matching environment variable.
#[derive(Parser, Debug)]
#[command(
    name = "star_schema",
    version,
    about = "Build the review star schema from scraped documents and reference dumps"
)]
struct Cli {
    /// Scraped documents root (movies/, tvshows/, games/) [env: DOCUMENTS_DIR]
    #[arg(long)]
    documents_dir: Option<PathBuf>,
    /// Directory holding title.basics / title.principals / name.basics dumps [env: IMDB_DIR]
    #[arg(long)]
    imdb_dir: Option<PathBuf>,
    /// Where tables and graph files are written [env: OUTPUT_DIR]
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Raw rows read per dump chunk [env: CORPUS_CHUNK_SIZE]
    #[arg(long)]
    chunk_size: Option<usize>,
    /// Minimum title similarity for a reference match [env: MATCH_THRESHOLD]
    #[arg(long)]
    match_threshold: Option<f64>,
    /// Years on either side of the release year to join on [env: YEAR_WINDOW]
    #[arg(long)]
    year_window: Option<i32>,
    /// Allowed runtime difference in minutes [env: RUNTIME_TOLERANCE_MINUTES]
    #[arg(long)]
    runtime_tolerance: Option<u32>,
    /// Reject matches where neither side knows its runtime
    #[arg(long, default_value_t = false)]
    strict_runtimes: bool,
    /// Minimum token similarity for franchise / section grouping [env: CLUSTER_THRESHOLD]
    #[arg(long)]
    cluster_threshold: Option<f64>,
    /// Section types never grouped [env: SECTION_CLUSTER_BLACKLIST]
    #[arg(long, value_delimiter = ',')]
    section_blacklist: Option<Vec<String>>,
    /// Skip nodes.ndjson / edges.ndjson
    #[arg(long, default_value_t = false)]
    no_graph: bool,
    /// Compact log lines without file/line
    #[arg(long, default_value_t = false)]
    compact_logs: bool,
}

impl Cli {
    fn into_config(self, mut config: EngineConfig) -> EngineConfig {
        if let Some(v) = self.documents_dir {
            config.documents_dir = v;
        }
        if let Some(v) = self.imdb_dir {
            config.imdb_dir = v;
        }
        if let Some(v) = self.output_dir {
            config.output_dir = v;
        }
        if let Some(v) = self.chunk_size {
            config.chunk_size = v.max(1);
        }
        if let Some(v) = self.match_threshold {
            config.resolver.match_threshold = v;
        }
        if let Some(v) = self.year_window {
            config.resolver.year_window = v;
        }
        if let Some(v) = self.runtime_tolerance {
            config.resolver.runtime.tolerance_minutes = v;
        }
        if self.strict_runtimes {
            config.resolver.runtime.allow_both_unknown = false;
        }
        if let Some(v) = self.cluster_threshold {
            config.cluster_threshold = v;
        }
        if let Some(v) = self.section_blacklist {
            config.section_cluster_blacklist = v;
        }
        config
    }
}

fn run(cli: Cli) -> Result<()> {
    let write_graph = !cli.no_graph;
    let config = cli.into_config(EngineConfig::from_env());
    info!(
        documents = %config.documents_dir.display(),
        imdb = %config.imdb_dir.display(),
        output = %config.output_dir.display(),
        "starting star schema run"
    );

    let engine = StarSchemaEngine::new(config);
    let schema = engine.run()?;
    let output_dir = &engine.config().output_dir;

    let published = schema
        .write_files(output_dir, write_graph)
        .with_context(|| format!("writing {}", output_dir.display()))?;
    info!(files = published.len(), "run complete");

    let report = &schema.report;
    for title in &report.unmatched_titles {
        warn!(title = %title, "unmatched title");
    }
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

fn main() -> ExitCode {
    env::init_env();
    let cli = Cli::parse();
    if let Err(e) = init_tracing("info", cli.compact_logs) {
        eprintln!("{e:#}");
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "star schema run failed");
            ExitCode::FAILURE
        }
    }
}
