// src/scanner.rs

use crate::backend::Backend;
use crate::config::{Markers, ScanOptions};
use crate::error::{Error, Result};
use crate::model::{CommitId, ContentIndex, EntryKind, InstallRecord};
use indicatif::ProgressBar;
use rayon::prelude::*;
use rayon::ThreadPool;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, trace, warn};

/// Finds every copy of the project inside one commit.
///
/// A directory holding the marker directory is a full install; a directory
/// holding the marker file is a bare copy of the marker directory. Either
/// way the walk does not go below a match. Anything else is treated as
/// scaffolding and searched all the way down.
pub fn scan<B: Backend + ?Sized>(
    backend: &B,
    commit: &str,
    markers: &Markers,
) -> Result<InstallRecord> {
    let info = backend.read_commit(commit)?;
    trace!(
        commit = %info.id,
        parents = info.parent_ids.len(),
        author = %info.author,
        committer = %info.committer,
        summary = info.message.lines().next().unwrap_or(""),
        "scanning commit"
    );
    let root = info.tree_id;
    let mut record = InstallRecord::default();
    let mut worklist = vec![(root, String::from("/"))];

    while let Some((tree_id, path)) = worklist.pop() {
        let entries = backend.read_tree(&tree_id)?;

        let marker_dir = entries
            .iter()
            .find(|e| e.kind == EntryKind::Tree && e.name == markers.directory);
        if let Some(marker) = marker_dir {
            record
                .partial
                .insert(format!("{path}{}/", markers.directory), marker.id.clone());
            record.full.insert(path, tree_id);
            continue;
        }

        if entries
            .iter()
            .any(|e| e.kind == EntryKind::Blob && e.name == markers.file)
        {
            record.partial.insert(path, tree_id);
            continue;
        }

        for entry in entries.iter().filter(|e| e.kind == EntryKind::Tree) {
            worklist.push((entry.id.clone(), format!("{path}{}/", entry.name)));
        }
    }

    Ok(record)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub scanned: usize,
    pub reused: usize,
}

/// Scans every commit the index's branch histories mention but that has no
/// install record yet.
///
/// Work runs on `pool` in batches of `options.checkpoint_every` commits.
/// Only this thread touches `index`: after each batch the finished records
/// are merged and `checkpoint` is called with the updated index. A failed
/// commit still lets the rest of its batch be merged and checkpointed
/// before the error is returned. When `cancel` is raised, no new commits
/// are started and the call ends with [`Error::Interrupted`] once the
/// finished work is checkpointed.
#[allow(clippy::too_many_arguments)]
pub fn scan_pending<B, F>(
    backend: &B,
    index: &mut ContentIndex,
    markers: &Markers,
    options: &ScanOptions,
    pool: &ThreadPool,
    cancel: &AtomicBool,
    bar: &ProgressBar,
    mut checkpoint: F,
) -> Result<ScanStats>
where
    B: Backend + ?Sized,
    F: FnMut(&ContentIndex) -> Result<()>,
{
    let pending = index.unscanned_commits();
    let mut stats = ScanStats {
        scanned: 0,
        reused: index.unique_commits() - pending.len(),
    };
    info!(
        new = pending.len(),
        cached = stats.reused,
        "scanning commits for project copies"
    );
    bar.set_length(pending.len() as u64);

    for batch in pending.chunks(options.checkpoint_every) {
        let results: Vec<Option<Result<InstallRecord>>> = pool.install(|| {
            batch
                .par_iter()
                .map(|commit| {
                    if cancel.load(Ordering::SeqCst) {
                        return None;
                    }
                    let record = scan(backend, commit, markers);
                    bar.inc(1);
                    Some(record)
                })
                .collect()
        });

        let mut failure: Option<(CommitId, Error)> = None;
        for (commit, result) in batch.iter().zip(results) {
            match result {
                Some(Ok(record)) => {
                    debug!(
                        commit = %commit,
                        full = record.full.len(),
                        partial = record.partial.len(),
                        "scanned commit"
                    );
                    index.commit_trees.insert(commit.clone(), record);
                    stats.scanned += 1;
                }
                Some(Err(e)) => {
                    if failure.is_none() {
                        failure = Some((commit.clone(), e));
                    }
                }
                None => {}
            }
        }

        checkpoint(index)?;

        if let Some((commit, e)) = failure {
            warn!(commit = %commit, error = %e, "scan failed");
            bar.abandon();
            return Err(e);
        }
        if cancel.load(Ordering::SeqCst) {
            bar.abandon();
            return Err(Error::Interrupted {
                step: "scan",
                completed: stats.scanned,
                remaining: pending.len() - stats.scanned,
            });
        }
    }

    bar.finish_and_clear();
    info!(scanned = stats.scanned, reused = stats.reused, "content index up to date");
    Ok(stats)
}
