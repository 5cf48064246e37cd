//! Run configuration, read from the environment (and `.env`).

use std::path::PathBuf;

use crate::cluster::{ClusterConfig, DEFAULT_CLUSTER_THRESHOLD};
use crate::normalization::DEFAULT_MATCH_THRESHOLD;
use crate::resolver::{ResolverConfig, RuntimePolicy};
use crate::util::env::{env_flag, env_list, env_parse, env_path};

pub const TITLE_BASICS_FILE: &str = "title.basics.tsv.gz";
pub const PRINCIPALS_FILE: &str = "title.principals.tsv.gz";
pub const NAMES_FILE: &str = "name.basics.tsv.gz";

/// Raw rows per corpus chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 500_000;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub documents_dir: PathBuf,
    pub imdb_dir: PathBuf,
    pub output_dir: PathBuf,
    pub chunk_size: usize,
    pub resolver: ResolverConfig,
    pub cluster_threshold: f64,
    /// Section types excluded from section grouping.
    pub section_cluster_blacklist: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("data/documents"),
            imdb_dir: PathBuf::from("data/imdb"),
            output_dir: PathBuf::from("out"),
            chunk_size: DEFAULT_CHUNK_SIZE,
            resolver: ResolverConfig::default(),
            cluster_threshold: DEFAULT_CLUSTER_THRESHOLD,
            section_cluster_blacklist: vec!["Season".to_string()],
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            documents_dir: env_path("DOCUMENTS_DIR", "data/documents"),
            imdb_dir: env_path("IMDB_DIR", "data/imdb"),
            output_dir: env_path("OUTPUT_DIR", "out"),
            chunk_size: env_parse("CORPUS_CHUNK_SIZE", DEFAULT_CHUNK_SIZE).max(1),
            resolver: ResolverConfig {
                match_threshold: env_parse("MATCH_THRESHOLD", DEFAULT_MATCH_THRESHOLD),
                year_window: env_parse("YEAR_WINDOW", defaults.resolver.year_window),
                runtime: RuntimePolicy {
                    tolerance_minutes: env_parse(
                        "RUNTIME_TOLERANCE_MINUTES",
                        defaults.resolver.runtime.tolerance_minutes,
                    ),
                    allow_both_unknown: env_flag(
                        "ALLOW_BOTH_RUNTIMES_UNKNOWN",
                        defaults.resolver.runtime.allow_both_unknown,
                    ),
                },
                progress_every: env_parse(
                    "PROGRESS_EVERY_CHUNKS",
                    defaults.resolver.progress_every,
                ),
            },
            cluster_threshold: env_parse("CLUSTER_THRESHOLD", DEFAULT_CLUSTER_THRESHOLD),
            section_cluster_blacklist: env_list("SECTION_CLUSTER_BLACKLIST", &["Season"]),
        }
    }

    pub fn title_basics_path(&self) -> PathBuf {
        self.imdb_dir.join(TITLE_BASICS_FILE)
    }

    pub fn principals_path(&self) -> PathBuf {
        self.imdb_dir.join(PRINCIPALS_FILE)
    }

    pub fn names_path(&self) -> PathBuf {
        self.imdb_dir.join(NAMES_FILE)
    }

    pub fn media_clusters(&self) -> ClusterConfig {
        ClusterConfig {
            threshold: self.cluster_threshold,
            blacklist: Vec::new(),
        }
    }

    pub fn section_clusters(&self) -> ClusterConfig {
        ClusterConfig {
            threshold: self.cluster_threshold,
            blacklist: self.section_cluster_blacklist.clone(),
        }
    }
}
