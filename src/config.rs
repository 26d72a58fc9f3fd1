//! Ingestion and shell configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{GraphError, Result};
use crate::graph::MAX_DECIMALS;

/// Runtime configuration for bulk ingestion and the interactive shell.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Extraction worker count.
    pub threads: usize,
    /// Byte-range chunks handed to each worker.
    pub chunks_per_thread: usize,
    /// File loaded by `init` when no path is given.
    pub default_input: PathBuf,
    /// File written by `export` when no path is given.
    pub export_path: PathBuf,
    /// Edges printed by `list-all` when no count is given.
    pub list_limit: usize,
    /// Precision of `avg` when none is given.
    pub decimals: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
            chunks_per_thread: 4,
            default_input: PathBuf::from("tweets.txt"),
            export_path: PathBuf::from("edges.csv"),
            list_limit: 100,
            decimals: 3,
        }
    }
}

impl IngestConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        let config: IngestConfig = serde_json::from_str(&s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(GraphError::Config("threads must be at least 1".into()));
        }
        if self.chunks_per_thread == 0 {
            return Err(GraphError::Config(
                "chunks_per_thread must be at least 1".into(),
            ));
        }
        if self.decimals > MAX_DECIMALS {
            return Err(GraphError::Config(format!(
                "decimals must be at most {}",
                MAX_DECIMALS
            )));
        }
        Ok(())
    }
}

/// Hasher used by the graph's maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashType {
    Default, // SipHash (DoS resistant, slower)
    FxHash,  // Fast non-cryptographic hash
    AHash,   // Very fast, high-quality hash
}

impl HashType {
    pub fn name(&self) -> &'static str {
        match self {
            HashType::Default => "default",
            HashType::FxHash => "fxhash",
            HashType::AHash => "ahash",
        }
    }
}

impl std::str::FromStr for HashType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" | "siphash" => Ok(HashType::Default),
            "fxhash" | "fx" => Ok(HashType::FxHash),
            "ahash" => Ok(HashType::AHash),
            _ => Err(format!("Unknown hash type: {}", s)),
        }
    }
}
