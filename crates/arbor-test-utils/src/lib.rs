//! Testing utilities for the Arbor workspace
//!
//! Deterministic oracles, a dependency-driven evaluator worker, and
//! document fixtures. Nothing here talks to a live model.

#![allow(missing_docs)]

use arbor_core::{ArborConfig, CandidateBlock, NodeWorker, Readiness, SourceDocument, WorkerError};
use arbor_oracle::{Oracle, OracleClient, OracleError, OracleRequest, OracleTask, RetryPolicy};
use arbor_tree::{NodeId, NodeKind, Tree};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt::Display;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Oracles
// ---------------------------------------------------------------------------

/// Deterministic answer to every non-classification task
///
/// Paragraph summaries echo the content, section summaries count their
/// children, titles are `"Generated title"`.
pub fn canned_answer(task: &OracleTask) -> Value {
    match task {
        OracleTask::ClassifyTopLevel { .. } => json!({ "top_headers": [] }),
        OracleTask::SummarizeParagraph { content, .. } => json!({
            "points": [{ "point": format!("point of {content}"), "evidence": content }],
            "keypoint": format!("caption of {content}"),
        }),
        OracleTask::SummarizeSection { title, children, .. } => json!({
            "points": children
                .iter()
                .map(|c| json!({ "point": c.caption }))
                .collect::<Vec<_>>(),
            "keypoint": format!("{title} in {} parts", children.len()),
        }),
        OracleTask::TitleParagraph { .. } => json!({ "title": "Generated title" }),
    }
}

fn titles(task: &OracleTask) -> Option<Vec<String>> {
    match task {
        OracleTask::ClassifyTopLevel { candidates } => {
            Some(candidates.iter().map(|c| c.title.clone()).collect())
        }
        _ => None,
    }
}

/// Classification answers scripted per candidate-title list
///
/// An unscripted classification is a transport error so that tests
/// notice unexpected calls. Every request is recorded.
#[derive(Default)]
pub struct ScriptedOracle {
    scripts: DashMap<Vec<String>, Vec<i64>>,
    calls: Mutex<Vec<OracleTask>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `tops` when asked about exactly `titles`
    pub fn script(self, titles: &[&str], tops: &[i64]) -> Self {
        self.scripts
            .insert(titles.iter().map(|t| (*t).to_string()).collect(), tops.to_vec());
        self
    }

    pub fn calls(&self) -> Vec<OracleTask> {
        self.calls.lock().clone()
    }

    /// Title lists of every classification, in call order
    pub fn classifications(&self) -> Vec<Vec<String>> {
        self.calls.lock().iter().filter_map(titles).collect()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn complete(&self, request: &OracleRequest) -> Result<Value, OracleError> {
        self.calls.lock().push(request.task.clone());
        let Some(key) = titles(&request.task) else {
            return Ok(canned_answer(&request.task));
        };
        match self.scripts.get(&key) {
            Some(tops) => Ok(json!({ "top_headers": *tops })),
            None => Err(OracleError::Transport(format!("no script for {key:?}"))),
        }
    }
}

/// Never detects a heading: every scope is flat
#[derive(Default)]
pub struct FlatOracle {
    classifications: AtomicUsize,
}

impl FlatOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classifications(&self) -> usize {
        self.classifications.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Oracle for FlatOracle {
    async fn complete(&self, request: &OracleRequest) -> Result<Value, OracleError> {
        if matches!(request.task, OracleTask::ClassifyTopLevel { .. }) {
            self.classifications.fetch_add(1, Ordering::SeqCst);
        }
        Ok(canned_answer(&request.task))
    }
}

/// Reports every candidate as top-level
#[derive(Default)]
pub struct SelfCoveringOracle {
    calls: AtomicUsize,
}

impl SelfCoveringOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Oracle for SelfCoveringOracle {
    async fn complete(&self, request: &OracleRequest) -> Result<Value, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &request.task {
            OracleTask::ClassifyTopLevel { candidates } => {
                let all: Vec<usize> = (0..candidates.len()).collect();
                Ok(json!({ "top_headers": all }))
            }
            other => Ok(canned_answer(other)),
        }
    }
}

/// Picks a seeded pseudo-random proper subset of every scope as top-level
///
/// The same seed and titles always yield the same answer. The empty
/// subset is allowed; the full set of a multi-candidate scope is not.
pub struct SubsetOracle {
    seed: u64,
    classifications: AtomicUsize,
}

impl SubsetOracle {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            classifications: AtomicUsize::new(0),
        }
    }

    pub fn classifications(&self) -> usize {
        self.classifications.load(Ordering::SeqCst)
    }

    fn picks(&self, title: &str) -> bool {
        let mut hasher = DefaultHasher::new();
        (self.seed, title).hash(&mut hasher);
        hasher.finish() % 3 == 0
    }
}

#[async_trait]
impl Oracle for SubsetOracle {
    async fn complete(&self, request: &OracleRequest) -> Result<Value, OracleError> {
        match &request.task {
            OracleTask::ClassifyTopLevel { candidates } => {
                self.classifications.fetch_add(1, Ordering::SeqCst);
                let mut tops: Vec<usize> = candidates
                    .iter()
                    .filter(|c| self.picks(&c.title))
                    .map(|c| c.index)
                    .collect();
                if candidates.len() > 1 && tops.len() == candidates.len() {
                    tops.pop();
                }
                Ok(json!({ "top_headers": tops }))
            }
            other => Ok(canned_answer(other)),
        }
    }
}

/// Always fails with a transport error
#[derive(Default)]
pub struct FailingOracle {
    attempts: AtomicUsize,
}

impl FailingOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Oracle for FailingOracle {
    async fn complete(&self, _request: &OracleRequest) -> Result<Value, OracleError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(OracleError::Transport("connection refused".into()))
    }
}

/// Markdown-style heading levels: among the candidates with the fewest
/// leading `#`, every one is top-level
///
/// Paragraph summaries whose content contains a configured marker fail
/// with a transport error.
#[derive(Default)]
pub struct HeadingOracle {
    failing_marker: Option<String>,
    calls: DashMap<&'static str, usize>,
}

impl HeadingOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, marker: impl Into<String>) -> Self {
        self.failing_marker = Some(marker.into());
        self
    }

    /// Calls seen for a task name such as `"summarize_section"`
    pub fn count(&self, task: &str) -> usize {
        self.calls.get(task).map_or(0, |n| *n)
    }

    fn level(title: &str) -> usize {
        title.chars().take_while(|&c| c == '#').count()
    }
}

#[async_trait]
impl Oracle for HeadingOracle {
    async fn complete(&self, request: &OracleRequest) -> Result<Value, OracleError> {
        *self.calls.entry(request.task.name()).or_insert(0) += 1;
        match &request.task {
            OracleTask::ClassifyTopLevel { candidates } => {
                let top = candidates
                    .iter()
                    .map(|c| Self::level(&c.title))
                    .filter(|&level| level > 0)
                    .min();
                let tops: Vec<usize> = candidates
                    .iter()
                    .filter(|c| top.is_some_and(|level| Self::level(&c.title) == level))
                    .map(|c| c.index)
                    .collect();
                Ok(json!({ "top_headers": tops }))
            }
            OracleTask::SummarizeParagraph { content, .. }
                if self
                    .failing_marker
                    .as_deref()
                    .is_some_and(|marker| content.contains(marker)) =>
            {
                Err(OracleError::Transport("model overloaded".into()))
            }
            other => Ok(canned_answer(other)),
        }
    }
}

/// Client without retries or backoff
pub fn client<O: Oracle + ?Sized>(oracle: Arc<O>) -> OracleClient<O> {
    OracleClient::new(oracle).with_retry(RetryPolicy::none())
}

// ---------------------------------------------------------------------------
// Evaluator workers
// ---------------------------------------------------------------------------

/// Worker whose keys become ready once all their dependencies retired
///
/// Records per-key invocations and flags any key dispatched while a
/// previous invocation for it is still running.
pub struct DependencyWorker<K: Eq + Hash> {
    deps: HashMap<K, Vec<K>>,
    retired: DashSet<K>,
    in_flight: DashSet<K>,
    invocations: DashMap<K, usize>,
    overlapped: AtomicBool,
    delay: Duration,
}

impl<K> DependencyWorker<K>
where
    K: Clone + Eq + Hash + Display + Send + Sync + 'static,
{
    pub fn new(deps: impl IntoIterator<Item = (K, Vec<K>)>) -> Self {
        Self {
            deps: deps.into_iter().collect(),
            retired: DashSet::new(),
            in_flight: DashSet::new(),
            invocations: DashMap::new(),
            overlapped: AtomicBool::new(false),
            delay: Duration::from_millis(2),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn invocations(&self, key: &K) -> usize {
        self.invocations.get(key).map_or(0, |n| *n)
    }

    pub fn is_retired(&self, key: &K) -> bool {
        self.retired.contains(key)
    }

    /// Whether one key ever ran twice at the same time
    pub fn overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<K> NodeWorker<K> for DependencyWorker<K>
where
    K: Clone + Eq + Hash + Display + Send + Sync + 'static,
{
    async fn process(&self, key: &K) -> Result<Readiness, WorkerError> {
        *self.invocations.entry(key.clone()).or_insert(0) += 1;
        if !self.in_flight.insert(key.clone()) {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        tokio::time::sleep(self.delay).await;

        let ready = self
            .deps
            .get(key)
            .map_or(true, |deps| deps.iter().all(|d| self.retired.contains(d)));
        if ready {
            self.retired.insert(key.clone());
        }
        self.in_flight.remove(key);
        Ok(Readiness::from(ready))
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Root plus one unattached candidate per title
pub fn candidate_tree(titles: &[&str]) -> (Tree, NodeId, Vec<NodeId>) {
    let mut tree = Tree::new();
    let root = tree.create("Document", "", NodeKind::Document);
    let candidates = titles
        .iter()
        .map(|t| tree.create(*t, format!("<p>body of {t}</p>"), NodeKind::Generic))
        .collect();
    (tree, root, candidates)
}

/// Titles of `root`'s subtree in pre-order, root excluded
pub fn preorder_titles(tree: &Tree, root: NodeId) -> Vec<String> {
    tree.dfs(root)
        .into_iter()
        .skip(1)
        .filter_map(|id| tree.get(id).map(|n| n.title().to_string()))
        .collect()
}

/// Parent title of the first node titled `title`
pub fn parent_title(tree: &Tree, root: NodeId, title: &str) -> Option<String> {
    let id = tree
        .dfs(root)
        .into_iter()
        .find(|&id| tree.get(id).is_some_and(|n| n.title() == title))?;
    let parent = tree.parent(id)?;
    tree.get(parent).map(|n| n.title().to_string())
}

/// A small paper with `#`-levelled headings, an abstract and a figure
pub fn sample_document() -> SourceDocument {
    SourceDocument::new(
        "On Trees",
        vec![
            CandidateBlock::new("Abstract", "<p>We reconstruct trees.</p>"),
            CandidateBlock::new("# Introduction", ""),
            CandidateBlock::new("", "<p>Documents arrive flat.</p>"),
            CandidateBlock::new("# Method", ""),
            CandidateBlock::new("## Classification", "<p>An oracle picks headings.</p>"),
            CandidateBlock::new("Figure 1", "<img src=\"f1.png\"/>").with_kind(NodeKind::Figure),
            CandidateBlock::new("## Evaluation", "<p>Bottom-up summaries.</p>"),
            CandidateBlock::new("# Conclusion", "<p>It works.</p>"),
        ],
    )
}

/// Configuration for fast, deterministic pipeline runs
pub fn test_config() -> ArborConfig {
    ArborConfig::default()
        .with_max_retries(0)
        .with_retry_backoff(Duration::ZERO)
        .with_worker_count(4)
}
