// src/model.rs

use crate::version::ReleaseVersion;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Hex object id of a commit
pub type CommitId = String;

/// Hex object id of a tree (or, for partial installs, a directory tree)
pub type TreeId = String;

/// Name, email and timestamp of a commit author or committer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub name: String,
    pub email: String,
    /// Seconds since the Unix epoch
    pub time: i64,
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}> {}", self.name, self.email, self.time)
    }
}

/// A commit as read from the backend. The engine never mutates these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub id: CommitId,
    pub tree_id: TreeId,
    pub parent_ids: Vec<CommitId>,
    pub author: Person,
    pub committer: Person,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Tree,
    Blob,
}

/// One immediate entry of a tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub name: String,
    pub kind: EntryKind,
    pub id: String,
}

/// Commits of one ref, newest first, ending at (and including) the first
/// terminator commit met on the way down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchHistory {
    pub ref_name: String,
    pub commits: Vec<CommitId>,
}

/// Where copies of the project live inside one commit.
///
/// Paths are normalized: they start at `/` and every directory component is
/// followed by a `/`, so the repository root is `/` and a copy under `tags`
/// is `/tags/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRecord {
    /// Directories that directly contain the marker directory, mapped to
    /// their own tree id.
    pub full: BTreeMap<String, TreeId>,
    /// Marker directories (under a full install, or copied on their own),
    /// mapped to their tree id.
    pub partial: BTreeMap<String, TreeId>,
}

impl InstallRecord {
    /// Tree id of a full install at the repository root, if any
    pub fn root(&self) -> Option<&TreeId> {
        self.full.get("/")
    }
}

/// Persisted per-run state: the collected branch histories plus every
/// install record scanned so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentIndex {
    pub branch_history: BTreeMap<String, Vec<CommitId>>,
    pub commit_trees: BTreeMap<CommitId, InstallRecord>,
}

impl ContentIndex {
    /// Replaces the stored branch histories with a fresh collection. Install
    /// records of commits no history reaches any more are dropped; the
    /// number dropped is returned.
    pub fn set_histories(&mut self, histories: &BTreeMap<String, BranchHistory>) -> usize {
        self.branch_history = histories
            .iter()
            .map(|(name, history)| (name.clone(), history.commits.clone()))
            .collect();

        let reachable: BTreeSet<&CommitId> = self.branch_history.values().flatten().collect();
        let before = self.commit_trees.len();
        self.commit_trees
            .retain(|commit, _| reachable.contains(commit));
        before - self.commit_trees.len()
    }

    /// Commits named by any branch history that have no install record yet,
    /// sorted so batches are reproducible.
    pub fn unscanned_commits(&self) -> Vec<CommitId> {
        let mut pending: Vec<CommitId> = self
            .branch_history
            .values()
            .flatten()
            .filter(|commit| !self.commit_trees.contains_key(*commit))
            .cloned()
            .collect();
        pending.sort();
        pending.dedup();
        pending
    }

    pub fn unique_commits(&self) -> usize {
        let mut all: Vec<&CommitId> = self.branch_history.values().flatten().collect();
        all.sort();
        all.dedup();
        all.len()
    }
}

/// The distinct contents one (ref, path) pair went through, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subhistory {
    pub history: Vec<TreeId>,
    pub branched_from: Option<CommitId>,
    pub merged_to: Option<CommitId>,
}

impl Subhistory {
    /// Appends an older state, collapsing a run of identical trees.
    pub fn push(&mut self, tree: &str) {
        if self.history.last().map(String::as_str) != Some(tree) {
            self.history.push(tree.to_string());
        }
    }

    pub fn newest(&self) -> Option<&TreeId> {
        self.history.first()
    }

    pub fn oldest(&self) -> Option<&TreeId> {
        self.history.last()
    }
}

/// A release that can be realized automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedRelease {
    pub version: ReleaseVersion,
    pub source: String,
    pub tree_hash: TreeId,
    /// Reference-line commit with identical content, or `None` when the
    /// release has to be synthesized.
    pub trunk_commit: Option<CommitId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnresolvedReason {
    EmptyHistory,
    /// Several distinct contents, none of them on the reference line
    NoTrunkMatch { distinct: usize },
    /// The same version was copied to several places with different results
    ConflictingSources { sources: Vec<String> },
}

/// A release needing manual attention; never written automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedRelease {
    pub version: ReleaseVersion,
    pub source: String,
    pub reason: UnresolvedReason,
    pub history: Vec<TreeId>,
}

/// Releases in ascending version order, plus the ones left for review.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleasePlan {
    pub releases: Vec<PlannedRelease>,
    pub unresolved: Vec<UnresolvedRelease>,
}

/// Output of the cross-reference phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossReference {
    /// Keyed by `<ref><path>`, e.g. `svn/tags/v1.2/`
    pub subhistories: BTreeMap<String, Subhistory>,
    pub release_history: ReleasePlan,
}
