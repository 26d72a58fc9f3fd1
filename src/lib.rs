//! # hashtag-graph
//!
//! Hashtag co-occurrence graph built from line-delimited tweet JSON:
//! - selective streaming extraction of `entities.hashtags[].text`
//!   (quoted tweets excluded)
//! - a lock-guarded aggregate of node, pair and exact-set counts
//! - parallel bulk ingestion and an average-degree statistic

pub mod config;
pub mod errors;
pub mod export;
pub mod extract;
pub mod graph;
pub mod memory;
pub mod pipeline;
pub mod shell;

pub use config::{HashType, IngestConfig};
pub use errors::{GraphError, ParseError, Result};
pub use extract::extract_hashtags;
pub use graph::{edge_key, CoOccurrenceGraph, GraphSnapshot, GraphStats, Observation, Tag};
pub use pipeline::{ingest_file, load_graph, IngestReport};
pub use shell::Shell;
