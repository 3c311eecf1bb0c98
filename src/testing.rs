// src/testing.rs

//! Test doubles: an in-memory backend addressed by hand-picked ids, and
//! helpers for building real throwaway git repositories.

use crate::backend::{Backend, RefUpdate, RefWriter};
use crate::config::Identity;
use crate::error::{Error, Result};
use crate::model::{CommitId, CommitInfo, EntryKind, Person, TreeEntry};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn dir(name: &str, id: &str) -> TreeEntry {
    TreeEntry {
        name: name.into(),
        kind: EntryKind::Tree,
        id: id.into(),
    }
}

pub fn file(name: &str, id: &str) -> TreeEntry {
    TreeEntry {
        name: name.into(),
        kind: EntryKind::Blob,
        id: id.into(),
    }
}

/// A synthesized commit recorded by [`MemoryBackend`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenCommit {
    pub id: CommitId,
    pub tree: String,
    pub parent: Option<CommitId>,
    pub message: String,
    pub identity: Identity,
    pub time: i64,
}

#[derive(Default)]
struct Writes {
    commits: Vec<WrittenCommit>,
    refs: BTreeMap<String, CommitId>,
}

#[derive(Default)]
pub struct MemoryBackend {
    logs: BTreeMap<String, Vec<CommitId>>,
    commits: HashMap<CommitId, String>,
    trees: HashMap<String, Vec<TreeEntry>>,
    tree_reads: AtomicUsize,
    writes: Mutex<Writes>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tree(mut self, id: &str, entries: Vec<TreeEntry>) -> Self {
        self.trees.insert(id.into(), entries);
        self
    }

    pub fn commit(mut self, id: &str, tree: &str) -> Self {
        self.commits.insert(id.into(), tree.into());
        self
    }

    /// Registers a ref whose log (newest first) is `commits`
    pub fn log(mut self, ref_name: &str, commits: &[&str]) -> Self {
        self.logs
            .insert(ref_name.into(), commits.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn tree_reads(&self) -> usize {
        self.tree_reads.load(Ordering::SeqCst)
    }

    pub fn written_commits(&self) -> Vec<WrittenCommit> {
        self.writes.lock().unwrap().commits.clone()
    }

    pub fn written_refs(&self) -> BTreeMap<String, CommitId> {
        self.writes.lock().unwrap().refs.clone()
    }

    fn write_ref(&self, full_name: String, target: &str) -> Result<RefUpdate> {
        let mut writes = self.writes.lock().unwrap();
        match writes.refs.get(&full_name).cloned() {
            Some(existing) if existing == target => Ok(RefUpdate::Unchanged),
            Some(existing) => Err(Error::RefConflict {
                name: full_name,
                existing,
                wanted: target.to_string(),
            }),
            None => {
                writes.refs.insert(full_name, target.to_string());
                Ok(RefUpdate::Created)
            }
        }
    }
}

impl Backend for MemoryBackend {
    fn list_refs(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .logs
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn walk_log(&self, ref_name: &str, visit: &mut dyn FnMut(&str) -> bool) -> Result<()> {
        let log = self
            .logs
            .get(ref_name)
            .ok_or_else(|| Error::RefNotFound(ref_name.to_string()))?;
        for commit in log {
            if !visit(commit) {
                break;
            }
        }
        Ok(())
    }

    fn read_commit(&self, id: &str) -> Result<CommitInfo> {
        let tree = self
            .commits
            .get(id)
            .ok_or_else(|| Error::ObjectNotFound(id.to_string()))?;
        let person = Person {
            name: "Importer".into(),
            email: "importer@example.com".into(),
            time: 0,
        };
        Ok(CommitInfo {
            id: id.to_string(),
            tree_id: tree.clone(),
            parent_ids: Vec::new(),
            author: person.clone(),
            committer: person,
            message: String::new(),
        })
    }

    fn read_tree(&self, id: &str) -> Result<Vec<TreeEntry>> {
        self.tree_reads.fetch_add(1, Ordering::SeqCst);
        self.trees
            .get(id)
            .cloned()
            .ok_or_else(|| Error::ObjectNotFound(id.to_string()))
    }
}

impl RefWriter for MemoryBackend {
    fn create_commit(
        &self,
        tree: &str,
        parent: Option<&str>,
        message: &str,
        identity: &Identity,
        time: i64,
    ) -> Result<CommitId> {
        let mut writes = self.writes.lock().unwrap();
        let id = format!("S{}", writes.commits.len() + 1);
        writes.commits.push(WrittenCommit {
            id: id.clone(),
            tree: tree.to_string(),
            parent: parent.map(str::to_string),
            message: message.to_string(),
            identity: identity.clone(),
            time,
        });
        Ok(id)
    }

    fn create_tag(&self, name: &str, target: &str) -> Result<RefUpdate> {
        self.write_ref(format!("refs/tags/{name}"), target)
    }

    fn create_branch(&self, name: &str, target: &str) -> Result<RefUpdate> {
        self.write_ref(format!("refs/heads/{name}"), target)
    }
}

pub mod git {
    use git2::{Oid, Repository, Signature, Time};
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Commit timestamps keep increasing so time-sorted walks are stable.
    static CLOCK: AtomicI64 = AtomicI64::new(1_000_000_000);

    pub enum Node {
        File(&'static str),
        Dir(Vec<(&'static str, Node)>),
    }

    pub fn write_tree(repo: &Repository, entries: &[(&str, Node)]) -> Oid {
        let mut builder = repo.treebuilder(None).unwrap();
        for (name, node) in entries {
            match node {
                Node::File(content) => {
                    let blob = repo.blob(content.as_bytes()).unwrap();
                    builder.insert(*name, blob, 0o100644).unwrap();
                }
                Node::Dir(children) => {
                    let tree = write_tree(repo, children);
                    builder.insert(*name, tree, 0o040000).unwrap();
                }
            }
        }
        builder.write().unwrap()
    }

    pub fn commit_tree(repo: &Repository, tree: Oid, parents: &[Oid], message: &str) -> Oid {
        let time = CLOCK.fetch_add(60, Ordering::SeqCst);
        let sig = Signature::new("Importer", "importer@example.com", &Time::new(time, 0)).unwrap();
        let tree = repo.find_tree(tree).unwrap();
        let parents: Vec<git2::Commit<'_>> =
            parents.iter().map(|p| repo.find_commit(*p).unwrap()).collect();
        let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();
        repo.commit(None, &sig, &sig, message, &tree, &parent_refs)
            .unwrap()
    }
}
