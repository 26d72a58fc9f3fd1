//! Edge CSV export and JSON snapshot import/export.

use std::collections::BTreeMap;
use std::fs::File;
use std::hash::BuildHasher;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{GraphError, Result};
use crate::graph::{is_normalized_tag, CoOccurrenceGraph, Observation, KEY_SEPARATOR};

const SNAPSHOT_VERSION: u32 = 1;

/// Write one `tag1|tag2,count` line per edge.
pub fn write_edges_csv<W: Write>(edges: &BTreeMap<String, u64>, mut writer: W) -> Result<()> {
    for (key, count) in edges {
        writeln!(writer, "{},{}", key, count)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the graph's edges to `path`. Returns the number of lines written.
pub fn export_edges_csv<S>(graph: &CoOccurrenceGraph<S>, path: &Path) -> Result<usize>
where
    S: BuildHasher + Default,
{
    let edges = graph.edge_counts();
    let file = File::create(path)?;
    write_edges_csv(&edges, BufWriter::new(file))?;
    Ok(edges.len())
}

/// On-disk form of a graph: the tag-set histogram is enough to rebuild the
/// node and edge counters exactly.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    tag_sets: BTreeMap<String, u64>,
}

pub fn save_snapshot<S>(graph: &CoOccurrenceGraph<S>, path: &Path) -> Result<()>
where
    S: BuildHasher + Default,
{
    let snapshot = SnapshotFile {
        version: SNAPSHOT_VERSION,
        tag_sets: graph.tag_set_counts(),
    };
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &snapshot)?;
    writer.flush()?;
    Ok(())
}

/// Parse a stored tag-set key back into its observation.
///
/// Only keys [`save_snapshot`] could have written are accepted: normalized
/// tags in strictly ascending order.
fn parse_tag_set_key(key: &str) -> Result<Observation> {
    let mut tags = Observation::new();
    for tag in key.split(KEY_SEPARATOR) {
        if !is_normalized_tag(tag) {
            return Err(GraphError::InvalidInput(format!(
                "tag set {:?}: {:?} is not a normalized tag",
                key, tag
            )));
        }
        if tags.last().is_some_and(|last| last.as_str() >= tag) {
            return Err(GraphError::InvalidInput(format!(
                "tag set {:?} is not sorted or repeats a tag",
                key
            )));
        }
        tags.insert(tag.to_owned());
    }
    Ok(tags)
}

/// Rebuild a graph from a file written by [`save_snapshot`].
///
/// Each stored count is applied in one step, so large counts load as fast
/// as small ones.
pub fn load_snapshot<S>(path: &Path) -> Result<CoOccurrenceGraph<S>>
where
    S: BuildHasher + Default,
{
    let file = File::open(path)?;
    let snapshot: SnapshotFile = serde_json::from_reader(BufReader::new(file))?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(GraphError::InvalidInput(format!(
            "unsupported snapshot version {}",
            snapshot.version
        )));
    }

    let graph = CoOccurrenceGraph::new();
    for (key, &count) in &snapshot.tag_sets {
        let tags = parse_tag_set_key(key)?;
        if count == 0 {
            return Err(GraphError::InvalidInput(format!(
                "tag set {:?} has a zero count",
                key
            )));
        }
        graph.add_tweet_times(&tags, count);
    }
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(tags: &[&str]) -> Observation {
        tags.iter().map(|t| t.to_string()).collect()
    }

    fn sample() -> CoOccurrenceGraph {
        let g = CoOccurrenceGraph::new();
        g.add_tweet(&obs(&["gretel", "data"]));
        g.add_tweet(&obs(&["data", "startup", "privacy"]));
        g.add_tweet(&obs(&["data", "gretel"]));
        g.add_tweet(&obs(&["cats"]));
        g
    }

    #[test]
    fn csv_lines() {
        let mut out = Vec::new();
        write_edges_csv(&sample().edge_counts(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "data|gretel,2\ndata|privacy,1\ndata|startup,1\nprivacy|startup,1\n"
        );
    }

    #[test]
    fn csv_file_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edges.csv");
        assert_eq!(export_edges_csv(&sample(), &path).unwrap(), 4);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 4);
        assert!(text.starts_with("data|gretel,2\n"));
    }

    #[test]
    fn snapshot_rebuilds_graph() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        let original = sample();
        save_snapshot(&original, &path).unwrap();

        let restored: CoOccurrenceGraph = load_snapshot(&path).unwrap();
        assert_eq!(restored.snapshot(), original.snapshot());
        assert!(restored.remove_tweet(&obs(&["data", "gretel"])));
        assert!(restored.remove_tweet(&obs(&["data", "gretel"])));
        assert!(!restored.remove_tweet(&obs(&["data", "gretel"])));
    }

    #[test]
    fn snapshot_version_checked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        std::fs::write(&path, r#"{"version": 7, "tag_sets": {}}"#).unwrap();
        let result: Result<CoOccurrenceGraph> = load_snapshot(&path);
        assert!(matches!(result, Err(GraphError::InvalidInput(_))));
    }

    fn load_str(contents: &str) -> Result<CoOccurrenceGraph> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        std::fs::write(&path, contents).unwrap();
        load_snapshot(&path)
    }

    #[test]
    fn non_canonical_keys_are_rejected() {
        for key in ["B|A", "b|a", "a|a", "b|a|a", "a||b", "|", "", "a|", "Data"] {
            let contents = format!(r#"{{"version": 1, "tag_sets": {{"{}": 1}}}}"#, key);
            assert!(
                matches!(load_str(&contents), Err(GraphError::InvalidInput(_))),
                "key {:?} should be rejected",
                key
            );
        }
    }

    #[test]
    fn zero_count_is_rejected() {
        let result = load_str(r#"{"version": 1, "tag_sets": {"a|b": 0}}"#);
        assert!(matches!(result, Err(GraphError::InvalidInput(_))));
    }

    #[test]
    fn large_counts_load_in_one_step() {
        let g = load_str(r#"{"version": 1, "tag_sets": {"a|b": 1000000000000000, "c": 2}}"#)
            .unwrap();
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_weight("a", "b"), 1_000_000_000_000_000);
        assert_eq!(g.node_counts().get("c"), Some(&2));
    }

    #[test]
    fn separator_tags_survive_a_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        let original: CoOccurrenceGraph = CoOccurrenceGraph::new();
        original.add_tweet(&obs(&["x|y", "z"]));
        save_snapshot(&original, &path).unwrap();

        let restored: CoOccurrenceGraph = load_snapshot(&path).unwrap();
        assert_eq!(restored.snapshot(), original.snapshot());
        assert_eq!(restored.node_count(), 2);
        assert_eq!(restored.edge_count(), 1);
    }

    #[test]
    fn malformed_snapshot_is_serde_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        std::fs::write(&path, "{").unwrap();
        let result: Result<CoOccurrenceGraph> = load_snapshot(&path);
        assert!(matches!(result, Err(GraphError::Snapshot(_))));
    }
}
