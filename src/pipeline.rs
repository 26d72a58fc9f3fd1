//! Bulk ingestion: line-delimited tweets -> parallel extraction -> graph.
//!
//! The input file is cut into byte ranges that start on line boundaries. Each
//! range is read by one rayon task, which extracts hashtags line by line and
//! hands the resulting observations to the graph in batches.

use std::fs::File;
use std::hash::BuildHasher;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::IngestConfig;
use crate::errors::Result;
use crate::extract::extract_hashtags;
use crate::graph::{CoOccurrenceGraph, Observation};
use crate::memory::PeakMemory;

/// Observations buffered per worker before taking the graph lock.
const BATCH_SIZE: usize = 4096;

/// Outcome of one bulk ingestion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// Records that parsed, with or without hashtags.
    pub records: u64,
    /// Malformed records that were logged and skipped.
    pub skipped: u64,
    /// Non-empty observations applied to the graph.
    pub observations: u64,
    pub threads: usize,
    pub chunks: usize,
    pub elapsed: Duration,
    pub peak_memory_bytes: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Chunk {
    start: u64,
    end: u64,
}

#[derive(Debug, Default)]
struct ChunkStats {
    records: u64,
    skipped: u64,
    observations: u64,
}

/// Position of the first line that starts at or after `pos`.
fn find_next_line_boundary(file: &mut File, pos: u64) -> io::Result<u64> {
    if pos == 0 {
        return Ok(0);
    }
    // A line starts at `pos` iff the byte before it is a newline.
    file.seek(SeekFrom::Start(pos - 1))?;
    let mut reader = BufReader::new(file);
    let mut rest = Vec::new();
    let bytes_read = reader.read_until(b'\n', &mut rest)?;
    Ok(pos - 1 + bytes_read as u64)
}

fn plan_chunks(path: &Path, file_size: u64, count: usize) -> io::Result<Vec<Chunk>> {
    let count = count.max(1) as u64;
    let chunk_size = file_size / count;
    let mut file = File::open(path)?;

    let mut boundaries = vec![0];
    for i in 1..count {
        boundaries.push(find_next_line_boundary(&mut file, i * chunk_size)?);
    }
    boundaries.push(file_size);

    Ok(boundaries
        .windows(2)
        .filter(|w| w[0] < w[1])
        .map(|w| Chunk {
            start: w[0],
            end: w[1],
        })
        .collect())
}

fn process_chunk<S>(
    path: &Path,
    chunk: Chunk,
    graph: &CoOccurrenceGraph<S>,
    peak: &PeakMemory,
) -> io::Result<ChunkStats>
where
    S: BuildHasher + Default,
{
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(chunk.start))?;
    let mut reader = BufReader::new(file).take(chunk.end - chunk.start);

    let mut stats = ChunkStats::default();
    let mut batch: Vec<Observation> = Vec::with_capacity(BATCH_SIZE);
    let mut line = Vec::new();
    let mut offset = chunk.start;

    loop {
        line.clear();
        let bytes_read = reader.read_until(b'\n', &mut line)?;
        if bytes_read == 0 {
            break;
        }
        let record_offset = offset;
        offset += bytes_read as u64;

        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        match extract_hashtags(&line) {
            Ok(tags) => {
                stats.records += 1;
                if !tags.is_empty() {
                    batch.push(tags);
                }
            }
            Err(e) => {
                stats.skipped += 1;
                warn!(offset = record_offset, error = %e, "skipping malformed record");
            }
        }

        if batch.len() >= BATCH_SIZE {
            stats.observations += graph.add_tweets(&batch) as u64;
            batch.clear();
            peak.update();
        }
    }

    stats.observations += graph.add_tweets(&batch) as u64;
    peak.update();
    debug!(
        start = chunk.start,
        end = chunk.end,
        records = stats.records,
        skipped = stats.skipped,
        "chunk done"
    );
    Ok(stats)
}

/// Extract every record of `path` in parallel and add it to `graph`.
///
/// Malformed records are logged and skipped. I/O errors abort the call, in
/// which case `graph` may hold part of the file; use [`load_graph`] when the
/// caller's existing graph must stay untouched on failure.
pub fn ingest_file<S>(
    path: &Path,
    graph: &CoOccurrenceGraph<S>,
    config: &IngestConfig,
) -> Result<IngestReport>
where
    S: BuildHasher + Default + Send + Sync,
{
    config.validate()?;
    let start = Instant::now();
    let peak = PeakMemory::new();

    let file_size = std::fs::metadata(path)?.len();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()?;
    let chunks = plan_chunks(path, file_size, config.threads * config.chunks_per_thread)?;
    debug!(
        path = %path.display(),
        file_size,
        chunks = chunks.len(),
        threads = config.threads,
        "planned ingestion"
    );

    let per_chunk = pool.install(|| {
        chunks
            .par_iter()
            .map(|&chunk| process_chunk(path, chunk, graph, &peak))
            .collect::<io::Result<Vec<_>>>()
    })?;

    let mut report = IngestReport {
        threads: config.threads,
        chunks: chunks.len(),
        ..IngestReport::default()
    };
    for stats in per_chunk {
        report.records += stats.records;
        report.skipped += stats.skipped;
        report.observations += stats.observations;
    }
    report.elapsed = start.elapsed();
    report.peak_memory_bytes = peak.peak_bytes();

    info!(
        path = %path.display(),
        records = report.records,
        skipped = report.skipped,
        observations = report.observations,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "ingestion finished"
    );
    Ok(report)
}

/// Build a fresh graph from `path`.
pub fn load_graph<S>(
    path: &Path,
    config: &IngestConfig,
) -> Result<(CoOccurrenceGraph<S>, IngestReport)>
where
    S: BuildHasher + Default + Send + Sync,
{
    let graph = CoOccurrenceGraph::new();
    let report = ingest_file(path, &graph, config)?;
    Ok((graph, report))
}
