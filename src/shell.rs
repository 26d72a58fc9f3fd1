//! Interactive command shell over a [`CoOccurrenceGraph`].
//!
//! The shell owns its graph explicitly; `init` and `load` swap in a freshly
//! built graph only once it was built successfully.

use std::hash::BuildHasher;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;

use tracing::{error, info};

use crate::config::IngestConfig;
use crate::errors::{GraphError, Result};
use crate::export::{export_edges_csv, load_snapshot, save_snapshot};
use crate::graph::{normalize_tag, CoOccurrenceGraph, Observation, MAX_DECIMALS};
use crate::memory::ByteSize;
use crate::pipeline::load_graph;

pub const HELP: &str = "Commands:
  init [path]        load tweets from a line-delimited JSON file
  add <tags>         add a tweet, e.g. add #data,#gretel
  remove <tags>      remove a previously added tweet
  list-all [n]       show the n heaviest edges (default 100)
  avg [decimals]     show the average degree (default 3 decimals)
  stats              show node, edge and tag-set totals
  export [path]      write edges as tag1|tag2,count CSV
  save <path>        write a JSON snapshot of the graph
  load <path>        replace the graph with a JSON snapshot
  help               show this message
  exit               leave the shell";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Init(Option<PathBuf>),
    Add(Observation),
    Remove(Observation),
    ListAll(Option<usize>),
    Avg(Option<u32>),
    Stats,
    Export(Option<PathBuf>),
    Save(PathBuf),
    Load(PathBuf),
    Help,
    Exit,
}

/// Whether the shell keeps reading after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Parse user-typed hashtags: separated by commas and/or whitespace, leading
/// `#` optional, case-insensitive.
pub fn parse_tags(input: &str) -> Observation {
    input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter_map(|t| normalize_tag(&t.replace('#', "")))
        .collect()
}

fn optional_arg<T: FromStr>(arg: &str, what: &str) -> Result<Option<T>> {
    if arg.is_empty() {
        return Ok(None);
    }
    arg.parse().map(Some).map_err(|_| {
        GraphError::InvalidInput(format!(
            "{} must be a non-negative integer, got {:?}",
            what, arg
        ))
    })
}

fn required_path(arg: &str, command: &str) -> Result<PathBuf> {
    if arg.is_empty() {
        return Err(GraphError::InvalidInput(format!("{} needs a path", command)));
    }
    Ok(PathBuf::from(arg))
}

fn required_tags(arg: &str, command: &str) -> Result<Observation> {
    let tags = parse_tags(arg);
    if tags.is_empty() {
        return Err(GraphError::InvalidInput(format!(
            "{} needs at least one hashtag, e.g. {} #data,#gretel",
            command, command
        )));
    }
    Ok(tags)
}

impl FromStr for Command {
    type Err = GraphError;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let (name, arg) = match line.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (line, ""),
        };

        match name.to_lowercase().as_str() {
            "init" => Ok(Command::Init(
                (!arg.is_empty()).then(|| PathBuf::from(arg)),
            )),
            "add" => Ok(Command::Add(required_tags(arg, "add")?)),
            "remove" => Ok(Command::Remove(required_tags(arg, "remove")?)),
            "list-all" | "list" => Ok(Command::ListAll(optional_arg(arg, "count")?)),
            "avg" => {
                let decimals = optional_arg(arg, "decimals")?;
                if let Some(d) = decimals {
                    if d > MAX_DECIMALS {
                        return Err(GraphError::InvalidInput(format!(
                            "decimals must be at most {}",
                            MAX_DECIMALS
                        )));
                    }
                }
                Ok(Command::Avg(decimals))
            }
            "stats" => Ok(Command::Stats),
            "export" => Ok(Command::Export(
                (!arg.is_empty()).then(|| PathBuf::from(arg)),
            )),
            "save" => Ok(Command::Save(required_path(arg, "save")?)),
            "load" => Ok(Command::Load(required_path(arg, "load")?)),
            "help" => Ok(Command::Help),
            "exit" | "quit" => Ok(Command::Exit),
            "" => Err(GraphError::InvalidInput("empty command".into())),
            other => Err(GraphError::InvalidInput(format!(
                "unknown command {:?}, type help for a list",
                other
            ))),
        }
    }
}

/// Command interpreter holding one graph.
#[derive(Debug)]
pub struct Shell<S = rustc_hash::FxBuildHasher> {
    graph: CoOccurrenceGraph<S>,
    config: IngestConfig,
}

impl<S> Shell<S>
where
    S: BuildHasher + Default + Send + Sync,
{
    pub fn new(config: IngestConfig) -> Self {
        Self::with_graph(CoOccurrenceGraph::new(), config)
    }

    pub fn with_graph(graph: CoOccurrenceGraph<S>, config: IngestConfig) -> Self {
        Shell { graph, config }
    }

    pub fn graph(&self) -> &CoOccurrenceGraph<S> {
        &self.graph
    }

    /// Read commands from `input` until `exit` or end of input.
    pub fn run<R: BufRead, W: Write>(&mut self, mut input: R, mut out: W) -> io::Result<()> {
        let mut line = String::new();
        loop {
            write!(out, "> ")?;
            out.flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                writeln!(out)?;
                return Ok(());
            }
            if line.trim().is_empty() {
                continue;
            }

            match line.parse::<Command>() {
                Ok(command) => {
                    if self.execute(command, &mut out)? == Flow::Exit {
                        return Ok(());
                    }
                }
                Err(e) => writeln!(out, "{}", e)?,
            }
        }
    }

    /// Run one command, writing its user-facing output to `out`.
    pub fn execute<W: Write>(&mut self, command: Command, out: &mut W) -> io::Result<Flow> {
        match command {
            Command::Init(path) => {
                let path = match path {
                    Some(path) => path,
                    None => {
                        let path = self.config.default_input.clone();
                        writeln!(out, "No path given, using default: {}", path.display())?;
                        path
                    }
                };
                match load_graph::<S>(&path, &self.config) {
                    Ok((graph, report)) => {
                        self.graph = graph;
                        writeln!(
                            out,
                            "Graph initialized: {} records ({} skipped), {} nodes, {} edges in {} ms",
                            report.records,
                            report.skipped,
                            self.graph.node_count(),
                            self.graph.edge_count(),
                            report.elapsed.as_millis()
                        )?;
                        if let Some(peak) = report.peak_memory_bytes {
                            writeln!(out, "Peak memory: {}", ByteSize(peak))?;
                        }
                    }
                    Err(e) => {
                        error!(path = %path.display(), error = %e, "init failed");
                        writeln!(out, "Error reading {}: {}", path.display(), e)?;
                    }
                }
            }
            Command::Add(tags) => {
                self.graph.add_tweet(&tags);
                writeln!(out, "Tweet added.")?;
            }
            Command::Remove(tags) => {
                if self.graph.remove_tweet(&tags) {
                    writeln!(out, "Tweet removed.")?;
                } else {
                    let shown: Vec<&str> = tags.iter().map(String::as_str).collect();
                    writeln!(out, "Tweet {} not found.", shown.join(","))?;
                }
            }
            Command::ListAll(limit) => {
                let limit = limit.unwrap_or(self.config.list_limit);
                let mut edges: Vec<(String, u64)> = self.graph.edge_counts().into_iter().collect();
                edges.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                writeln!(out, "Edges (co-occurring hashtags), {} total:", edges.len())?;
                for (key, count) in edges.iter().take(limit) {
                    writeln!(out, "{} -> {}", key, count)?;
                }
            }
            Command::Avg(decimals) => {
                let decimals = decimals.unwrap_or(self.config.decimals);
                let degree = self.graph.average_degree_with(decimals);
                writeln!(out, "Average Degree: {:.*}", decimals as usize, degree)?;
            }
            Command::Stats => {
                let snapshot = self.graph.snapshot();
                writeln!(
                    out,
                    "Nodes: {}, Edges: {}, Distinct tag sets: {}",
                    snapshot.node_count,
                    snapshot.edge_count,
                    snapshot.tag_sets.len()
                )?;
            }
            Command::Export(path) => {
                let path = path.unwrap_or_else(|| self.config.export_path.clone());
                match export_edges_csv(&self.graph, &path) {
                    Ok(lines) => writeln!(out, "Saved {} edges to {}", lines, path.display())?,
                    Err(e) => writeln!(out, "Error writing {}: {}", path.display(), e)?,
                }
            }
            Command::Save(path) => match save_snapshot(&self.graph, &path) {
                Ok(()) => writeln!(out, "Snapshot saved to {}", path.display())?,
                Err(e) => writeln!(out, "Error writing {}: {}", path.display(), e)?,
            },
            Command::Load(path) => match load_snapshot::<S>(&path) {
                Ok(graph) => {
                    self.graph = graph;
                    info!(path = %path.display(), "snapshot loaded");
                    writeln!(
                        out,
                        "Snapshot loaded: {} nodes, {} edges",
                        self.graph.node_count(),
                        self.graph.edge_count()
                    )?;
                }
                Err(e) => writeln!(out, "Error reading {}: {}", path.display(), e)?,
            },
            Command::Help => writeln!(out, "{}", HELP)?,
            Command::Exit => {
                writeln!(out, "Exiting...")?;
                return Ok(Flow::Exit);
            }
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell() -> Shell {
        Shell::new(IngestConfig {
            threads: 2,
            ..IngestConfig::default()
        })
    }

    fn run(shell: &mut Shell, script: &str) -> String {
        let mut out = Vec::new();
        shell.run(script.as_bytes(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn obs(tags: &[&str]) -> Observation {
        tags.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn tag_parsing() {
        assert_eq!(parse_tags("#Data,#gretel"), obs(&["data", "gretel"]));
        assert_eq!(parse_tags(" #a , b  #c,,"), obs(&["a", "b", "c"]));
        assert_eq!(parse_tags("x|y"), obs(&["xy"]));
        assert!(parse_tags(" ,# ").is_empty());
    }

    #[test]
    fn command_parsing() {
        assert_eq!("help".parse::<Command>().unwrap(), Command::Help);
        assert_eq!("INIT".parse::<Command>().unwrap(), Command::Init(None));
        assert_eq!(
            "init data/tweets.txt".parse::<Command>().unwrap(),
            Command::Init(Some(PathBuf::from("data/tweets.txt")))
        );
        assert_eq!(
            "list-all 5".parse::<Command>().unwrap(),
            Command::ListAll(Some(5))
        );
        assert_eq!("avg".parse::<Command>().unwrap(), Command::Avg(None));
        assert_eq!(
            "add #b,#a".parse::<Command>().unwrap(),
            Command::Add(obs(&["a", "b"]))
        );
    }

    #[test]
    fn invalid_input_is_reported() {
        for line in ["list-all ten", "list-all -1", "avg x", "avg 99", "add", "remove #", "save", "frobnicate"] {
            match line.parse::<Command>() {
                Err(GraphError::InvalidInput(_)) => {}
                other => panic!("{:?} parsed as {:?}", line, other),
            }
        }
    }

    #[test]
    fn scripted_session() {
        let mut shell = shell();
        let output = run(
            &mut shell,
            "add #gretel,#data\n\
             add #data #startup #privacy\n\
             add #data\n\
             add #gretel\n\
             add #rocketship,#gretel\n\
             add #cats\n\
             avg\n\
             list-all 2\n\
             stats\n\
             exit\n\
             add #never\n",
        );

        assert!(output.contains("Average Degree: 1.667"));
        assert!(output.contains("Nodes: 6, Edges: 5, Distinct tag sets: 6"));
        assert!(output.contains("Edges (co-occurring hashtags), 5 total:"));
        assert_eq!(output.matches(" -> ").count(), 2);
        assert!(output.contains("Exiting..."));
        assert_eq!(shell.graph().node_counts().get("never"), None);
    }

    #[test]
    fn remove_reports_missing_tweet() {
        let mut shell = shell();
        let output = run(&mut shell, "add #a,#b\nremove #a\nremove #b,#a\nremove #a,#b\n");
        assert!(output.contains("Tweet a not found."));
        assert!(output.contains("Tweet removed."));
        assert!(output.contains("Tweet a,b not found."));
        assert!(shell.graph().is_empty());
    }

    #[test]
    fn bad_count_leaves_graph_untouched() {
        let mut shell = shell();
        let output = run(&mut shell, "add #a,#b\nlist-all many\navg 2\n");
        assert!(output.contains("count must be a non-negative integer"));
        assert!(output.contains("Average Degree: 1.00"));
        assert_eq!(shell.graph().edge_count(), 1);
    }

    #[test]
    fn failed_init_keeps_previous_graph() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.jsonl");
        let mut shell = shell();
        let output = run(&mut shell, &format!("add #a,#b\ninit {}\n", missing.display()));
        assert!(output.contains("Error reading"));
        assert_eq!(shell.graph().edge_weight("a", "b"), 1);
    }

    #[test]
    fn init_replaces_graph() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"entities":{{"hashtags":[{{"text":"X"}},{{"text":"Y"}}]}}}}"#).unwrap();
        writeln!(file, "garbage").unwrap();

        let mut shell = shell();
        let output = run(&mut shell, &format!("add #a,#b\ninit {}\n", file.path().display()));
        assert!(output.contains("Graph initialized: 1 records (1 skipped), 2 nodes, 1 edges"));
        assert_eq!(shell.graph().edge_weight("a", "b"), 0);
        assert_eq!(shell.graph().edge_weight("x", "y"), 1);
    }

    #[test]
    fn export_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("edges.csv");
        let snap = dir.path().join("graph.json");

        let mut shell = shell();
        let output = run(
            &mut shell,
            &format!(
                "add #a,#b,#c\nexport {}\nsave {}\nremove #a,#b,#c\nload {}\n",
                csv.display(),
                snap.display(),
                snap.display()
            ),
        );
        assert!(output.contains("Saved 3 edges"));
        assert!(output.contains("Snapshot loaded: 3 nodes, 3 edges"));
        assert_eq!(
            std::fs::read_to_string(&csv).unwrap(),
            "a|b,1\na|c,1\nb|c,1\n"
        );
    }
}
