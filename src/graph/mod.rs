//! Hashtag co-occurrence aggregate.
//!
//! Three counters are kept in lock-step: how many observations contain each
//! tag (nodes), each unordered tag pair (edges), and each exact tag set. A
//! single `RwLock` guards all of them together with the distinct node/edge
//! totals, so every add/remove is applied as one indivisible multi-key update.

use std::borrow::Cow;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::BuildHasher;

use parking_lot::RwLock;
use rustc_hash::FxBuildHasher;
use serde::{Deserialize, Serialize};

pub mod degree;

pub use degree::{round_half_up, GraphStats, DEFAULT_DECIMALS, MAX_DECIMALS};

/// Normalized (lowercased, no `#`) hashtag.
pub type Tag = String;

/// The tags of one post. Sorted, so iteration order is the canonical order.
pub type Observation = BTreeSet<Tag>;

/// Joins tags inside edge and tag-set keys; never part of a tag.
pub const KEY_SEPARATOR: char = '|';

/// Lowercase `raw` and drop any [`KEY_SEPARATOR`]; `None` when nothing is left.
pub fn normalize_tag(raw: &str) -> Option<Tag> {
    let tag: String = raw
        .chars()
        .filter(|&c| c != KEY_SEPARATOR)
        .collect::<String>()
        .to_lowercase();
    if tag.is_empty() {
        None
    } else {
        Some(tag)
    }
}

/// True when `tag` is already what [`normalize_tag`] would produce.
pub fn is_normalized_tag(tag: &str) -> bool {
    if tag.is_empty() || tag.contains(KEY_SEPARATOR) {
        return false;
    }
    if tag.is_ascii() {
        !tag.bytes().any(|b| b.is_ascii_uppercase())
    } else {
        tag.to_lowercase() == tag
    }
}

/// The observation with every tag normalized. Borrows in the common case.
fn normalized(tags: &Observation) -> Cow<'_, Observation> {
    if tags.iter().all(|t| is_normalized_tag(t)) {
        Cow::Borrowed(tags)
    } else {
        Cow::Owned(tags.iter().filter_map(|t| normalize_tag(t)).collect())
    }
}

/// Canonical key of the unordered pair `{a, b}`.
pub fn edge_key(a: &str, b: &str) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut key = String::with_capacity(lo.len() + hi.len() + 1);
    key.push_str(lo);
    key.push(KEY_SEPARATOR);
    key.push_str(hi);
    key
}

/// Canonical key of an exact tag set.
pub fn tag_set_key(tags: &Observation) -> String {
    let mut key = String::new();
    for (i, tag) in tags.iter().enumerate() {
        if i > 0 {
            key.push(KEY_SEPARATOR);
        }
        key.push_str(tag);
    }
    key
}

/// Owned copy of the whole graph taken under one read lock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: BTreeMap<Tag, u64>,
    pub edges: BTreeMap<String, u64>,
    pub tag_sets: BTreeMap<String, u64>,
    pub node_count: usize,
    pub edge_count: usize,
}

struct GraphState<S> {
    nodes: HashMap<Tag, u64, S>,
    edges: HashMap<String, u64, S>,
    tag_sets: HashMap<String, u64, S>,
    node_total: usize,
    edge_total: usize,
}

/// Returns true when the key was absent before.
fn increment<S: BuildHasher>(map: &mut HashMap<String, u64, S>, key: &str, by: u64) -> bool {
    if let Some(count) = map.get_mut(key) {
        *count = count.saturating_add(by);
        false
    } else {
        map.insert(key.to_owned(), by);
        true
    }
}

/// Returns true when the key was evicted.
fn decrement<S: BuildHasher>(map: &mut HashMap<String, u64, S>, key: String) -> bool {
    match map.entry(key) {
        Entry::Occupied(mut e) if *e.get() > 1 => {
            *e.get_mut() -= 1;
            false
        }
        Entry::Occupied(e) => {
            e.remove();
            true
        }
        Entry::Vacant(_) => false,
    }
}

impl<S: BuildHasher + Default> GraphState<S> {
    fn new() -> Self {
        GraphState {
            nodes: HashMap::with_hasher(S::default()),
            edges: HashMap::with_hasher(S::default()),
            tag_sets: HashMap::with_hasher(S::default()),
            node_total: 0,
            edge_total: 0,
        }
    }

    /// Apply `times` copies of one observation. Returns false for a no-op.
    fn add(&mut self, tags: &Observation, times: u64) -> bool {
        let tags = normalized(tags);
        if tags.is_empty() || times == 0 {
            return false;
        }
        increment(&mut self.tag_sets, &tag_set_key(&tags), times);

        for tag in tags.iter() {
            if increment(&mut self.nodes, tag, times) {
                self.node_total += 1;
            }
        }

        let sorted: Vec<&Tag> = tags.iter().collect();
        for (i, a) in sorted.iter().enumerate() {
            for b in &sorted[i + 1..] {
                if increment(&mut self.edges, &edge_key(a, b), times) {
                    self.edge_total += 1;
                }
            }
        }
        self.check_totals();
        true
    }

    fn remove(&mut self, tags: &Observation) -> bool {
        let tags = normalized(tags);
        if tags.is_empty() {
            return false;
        }
        let set_key = tag_set_key(&tags);
        if !self.tag_sets.contains_key(&set_key) {
            return false;
        }
        decrement(&mut self.tag_sets, set_key);

        // Every node and pair below is present: the set was applied whole.
        for tag in tags.iter() {
            if decrement(&mut self.nodes, tag.clone()) {
                self.node_total -= 1;
            }
        }

        let sorted: Vec<&Tag> = tags.iter().collect();
        for (i, a) in sorted.iter().enumerate() {
            for b in &sorted[i + 1..] {
                if decrement(&mut self.edges, edge_key(a, b)) {
                    self.edge_total -= 1;
                }
            }
        }
        self.check_totals();
        true
    }

    fn stats(&self) -> GraphStats {
        GraphStats {
            nodes: self.node_total,
            edges: self.edge_total,
        }
    }

    fn check_totals(&self) {
        debug_assert_eq!(self.node_total, self.nodes.len());
        debug_assert_eq!(self.edge_total, self.edges.len());
    }
}

fn sorted_copy<S>(map: &HashMap<String, u64, S>) -> BTreeMap<String, u64> {
    map.iter().map(|(k, v)| (k.clone(), *v)).collect()
}

/// Concurrency-safe hashtag co-occurrence graph.
///
/// The hasher parameter only affects the internal maps; snapshots are always
/// sorted `BTreeMap`s.
pub struct CoOccurrenceGraph<S = FxBuildHasher> {
    state: RwLock<GraphState<S>>,
}

impl<S: BuildHasher + Default> Default for CoOccurrenceGraph<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> std::fmt::Debug for CoOccurrenceGraph<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("CoOccurrenceGraph")
            .field("nodes", &state.node_total)
            .field("edges", &state.edge_total)
            .field("tag_sets", &state.tag_sets.len())
            .finish()
    }
}

impl<S: BuildHasher + Default> CoOccurrenceGraph<S> {
    pub fn new() -> Self {
        CoOccurrenceGraph {
            state: RwLock::new(GraphState::new()),
        }
    }

    /// Record one observation. An empty set is a no-op.
    ///
    /// Tags are normalized first: lowercased, with any [`KEY_SEPARATOR`]
    /// dropped and tags left empty by that removed.
    pub fn add_tweet(&self, tags: &Observation) {
        self.state.write().add(tags, 1);
    }

    /// Record `times` identical observations in one step.
    pub fn add_tweet_times(&self, tags: &Observation, times: u64) {
        self.state.write().add(tags, times);
    }

    /// Record a batch of observations under a single lock acquisition.
    ///
    /// Equivalent to calling [`add_tweet`](Self::add_tweet) for each item in
    /// order. Returns the number of non-empty observations applied.
    pub fn add_tweets<'a, I>(&self, batch: I) -> usize
    where
        I: IntoIterator<Item = &'a Observation>,
    {
        let mut state = self.state.write();
        let mut applied = 0;
        for tags in batch {
            if state.add(tags, 1) {
                applied += 1;
            }
        }
        applied
    }

    /// Undo one earlier [`add_tweet`](Self::add_tweet) of exactly this set,
    /// after the same normalization.
    ///
    /// Returns `false`, leaving the graph untouched, when no such observation
    /// is currently recorded.
    pub fn remove_tweet(&self, tags: &Observation) -> bool {
        self.state.write().remove(tags)
    }

    /// Average degree rounded to [`DEFAULT_DECIMALS`].
    pub fn average_degree(&self) -> f64 {
        self.average_degree_with(DEFAULT_DECIMALS)
    }

    pub fn average_degree_with(&self, decimals: u32) -> f64 {
        self.stats().average_degree(decimals)
    }

    pub fn stats(&self) -> GraphStats {
        self.state.read().stats()
    }

    pub fn node_count(&self) -> usize {
        self.state.read().node_total
    }

    pub fn edge_count(&self) -> usize {
        self.state.read().edge_total
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().tag_sets.is_empty()
    }

    pub fn node_counts(&self) -> BTreeMap<Tag, u64> {
        sorted_copy(&self.state.read().nodes)
    }

    pub fn edge_counts(&self) -> BTreeMap<String, u64> {
        sorted_copy(&self.state.read().edges)
    }

    pub fn tag_set_counts(&self) -> BTreeMap<String, u64> {
        sorted_copy(&self.state.read().tag_sets)
    }

    /// All maps and totals as of one serialization point.
    pub fn snapshot(&self) -> GraphSnapshot {
        let state = self.state.read();
        GraphSnapshot {
            nodes: sorted_copy(&state.nodes),
            edges: sorted_copy(&state.edges),
            tag_sets: sorted_copy(&state.tag_sets),
            node_count: state.node_total,
            edge_count: state.edge_total,
        }
    }

    /// Count of one edge, in either tag order.
    pub fn edge_weight(&self, a: &str, b: &str) -> u64 {
        self.state
            .read()
            .edges
            .get(&edge_key(a, b))
            .copied()
            .unwrap_or(0)
    }
}
