// src/backend.rs

//! Access to the version-control store.
//!
//! The engine only talks to the [`Backend`] (read) and [`RefWriter`] (write)
//! traits. [`GitRepo`] implements both over `git2`; tests use an in-memory
//! double instead.

use crate::config::Identity;
use crate::error::{Error, Result};
use crate::model::{CommitId, CommitInfo, EntryKind, Person, TreeEntry};
use git2::{ErrorCode, ObjectType, Oid, Repository, Signature, Sort, Time};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Read-only queries the reconciliation engine needs.
pub trait Backend: Sync {
    /// Short names of every ref starting with `prefix`, sorted.
    fn list_refs(&self, prefix: &str) -> Result<Vec<String>>;

    /// Calls `visit` with each commit of `ref_name`, newest first, until it
    /// returns `false` or the history ends.
    fn walk_log(&self, ref_name: &str, visit: &mut dyn FnMut(&str) -> bool) -> Result<()>;

    fn read_commit(&self, id: &str) -> Result<CommitInfo>;

    fn read_tree(&self, id: &str) -> Result<Vec<TreeEntry>>;
}

/// Outcome of pointing a ref at a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefUpdate {
    Created,
    /// The ref already pointed at the wanted commit
    Unchanged,
}

/// Writes performed by the apply stage. Existing refs are never moved.
pub trait RefWriter {
    fn create_commit(
        &self,
        tree: &str,
        parent: Option<&str>,
        message: &str,
        identity: &Identity,
        time: i64,
    ) -> Result<CommitId>;

    /// Lightweight tag `refs/tags/<name>`
    fn create_tag(&self, name: &str, target: &str) -> Result<RefUpdate>;

    /// Local branch `refs/heads/<name>`
    fn create_branch(&self, name: &str, target: &str) -> Result<RefUpdate>;
}

/// A git repository on disk, with a small pool of open handles so parallel
/// workers each get their own `Repository`.
pub struct GitRepo {
    path: PathBuf,
    idle: Mutex<Vec<Repository>>,
}

impl GitRepo {
    pub fn open(path: &Path) -> Result<GitRepo> {
        let repo = Repository::open(path)
            .map_err(Error::git(format!("opening {}", path.display())))?;
        Ok(GitRepo {
            path: path.to_path_buf(),
            idle: Mutex::new(vec![repo]),
        })
    }

    fn with_repo<T>(&self, f: impl FnOnce(&Repository) -> Result<T>) -> Result<T> {
        let pooled = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        let repo = match pooled {
            Some(repo) => repo,
            None => Repository::open(&self.path)
                .map_err(Error::git(format!("opening {}", self.path.display())))?,
        };
        let result = f(&repo);
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(repo);
        result
    }

    fn write_ref(&self, full_name: &str, target: &str, log_message: &str) -> Result<RefUpdate> {
        let oid = parse_oid(target)?;
        self.with_repo(|repo| {
            match repo.find_reference(full_name) {
                Ok(existing) => {
                    let current = existing
                        .peel_to_commit()
                        .map_err(Error::git(format!("resolving {full_name}")))?
                        .id();
                    if current == oid {
                        return Ok(RefUpdate::Unchanged);
                    }
                    return Err(Error::RefConflict {
                        name: full_name.to_string(),
                        existing: current.to_string(),
                        wanted: target.to_string(),
                    });
                }
                Err(e) if e.code() == ErrorCode::NotFound => {}
                Err(e) => return Err(Error::git(format!("looking up {full_name}"))(e)),
            }
            repo.find_commit(oid).map_err(not_found(target))?;
            repo.reference(full_name, oid, false, log_message)
                .map_err(Error::git(format!("creating {full_name}")))?;
            Ok(RefUpdate::Created)
        })
    }
}

fn parse_oid(id: &str) -> Result<Oid> {
    Oid::from_str(id).map_err(|_| Error::InvalidObjectId(id.to_string()))
}

fn not_found(id: &str) -> impl FnOnce(git2::Error) -> Error + '_ {
    move |e| {
        if e.code() == ErrorCode::NotFound {
            Error::ObjectNotFound(id.to_string())
        } else {
            Error::git(format!("reading {id}"))(e)
        }
    }
}

fn person(sig: &Signature<'_>) -> Person {
    Person {
        name: String::from_utf8_lossy(sig.name_bytes()).into_owned(),
        email: String::from_utf8_lossy(sig.email_bytes()).into_owned(),
        time: sig.when().seconds(),
    }
}

impl Backend for GitRepo {
    fn list_refs(&self, prefix: &str) -> Result<Vec<String>> {
        self.with_repo(|repo| {
            let mut names = Vec::new();
            let refs = repo.references().map_err(Error::git("listing refs"))?;
            for reference in refs {
                let reference = reference.map_err(Error::git("listing refs"))?;
                if reference.symbolic_target().is_some() {
                    continue;
                }
                if let Some(short) = reference.shorthand() {
                    if short.starts_with(prefix) {
                        names.push(short.to_string());
                    }
                }
            }
            names.sort();
            names.dedup();
            Ok(names)
        })
    }

    fn walk_log(&self, ref_name: &str, visit: &mut dyn FnMut(&str) -> bool) -> Result<()> {
        self.with_repo(|repo| {
            let head = repo
                .resolve_reference_from_short_name(ref_name)
                .map_err(|e| {
                    if e.code() == ErrorCode::NotFound {
                        Error::RefNotFound(ref_name.to_string())
                    } else {
                        Error::git(format!("resolving {ref_name}"))(e)
                    }
                })?
                .peel_to_commit()
                .map_err(Error::git(format!("resolving {ref_name}")))?;

            let context = format!("walking {ref_name}");
            let mut revwalk = repo.revwalk().map_err(Error::git(context.as_str()))?;
            revwalk
                .set_sorting(Sort::TIME)
                .map_err(Error::git(context.as_str()))?;
            revwalk.push(head.id()).map_err(Error::git(context.as_str()))?;

            for oid in revwalk {
                let oid = oid.map_err(Error::git(context.as_str()))?;
                if !visit(&oid.to_string()) {
                    break;
                }
            }
            Ok(())
        })
    }

    fn read_commit(&self, id: &str) -> Result<CommitInfo> {
        let oid = parse_oid(id)?;
        self.with_repo(|repo| {
            let commit = repo.find_commit(oid).map_err(not_found(id))?;
            let info = CommitInfo {
                id: id.to_string(),
                tree_id: commit.tree_id().to_string(),
                parent_ids: commit.parent_ids().map(|p| p.to_string()).collect(),
                author: person(&commit.author()),
                committer: person(&commit.committer()),
                message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
            };
            Ok(info)
        })
    }

    fn read_tree(&self, id: &str) -> Result<Vec<TreeEntry>> {
        let oid = parse_oid(id)?;
        self.with_repo(|repo| {
            let tree = repo.find_tree(oid).map_err(not_found(id))?;
            let entries = tree
                .iter()
                .filter_map(|entry| {
                    let kind = match entry.kind() {
                        Some(ObjectType::Tree) => EntryKind::Tree,
                        Some(ObjectType::Blob) => EntryKind::Blob,
                        _ => return None,
                    };
                    Some(TreeEntry {
                        name: String::from_utf8_lossy(entry.name_bytes()).into_owned(),
                        kind,
                        id: entry.id().to_string(),
                    })
                })
                .collect();
            Ok(entries)
        })
    }
}

impl RefWriter for GitRepo {
    fn create_commit(
        &self,
        tree: &str,
        parent: Option<&str>,
        message: &str,
        identity: &Identity,
        time: i64,
    ) -> Result<CommitId> {
        let tree_oid = parse_oid(tree)?;
        let parent_oid = parent.map(parse_oid).transpose()?;
        self.with_repo(|repo| {
            let sig = Signature::new(&identity.name, &identity.email, &Time::new(time, 0))
                .map_err(Error::git("building the synthetic signature"))?;
            let tree_obj = repo.find_tree(tree_oid).map_err(not_found(tree))?;
            let parents = match (parent_oid, parent) {
                (Some(oid), Some(id)) => vec![repo.find_commit(oid).map_err(not_found(id))?],
                _ => Vec::new(),
            };
            let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();
            let oid = repo
                .commit(None, &sig, &sig, message, &tree_obj, &parent_refs)
                .map_err(Error::git(format!("committing tree {tree_oid}")))?;
            Ok(oid.to_string())
        })
    }

    fn create_tag(&self, name: &str, target: &str) -> Result<RefUpdate> {
        self.write_ref(&format!("refs/tags/{name}"), target, "git-retag: release tag")
    }

    fn create_branch(&self, name: &str, target: &str) -> Result<RefUpdate> {
        self.write_ref(&format!("refs/heads/{name}"), target, "git-retag: legacy releases")
    }
}
