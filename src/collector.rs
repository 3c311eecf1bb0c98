// src/collector.rs

use crate::backend::Backend;
use crate::config::Layout;
use crate::error::Result;
use crate::model::{BranchHistory, CommitId};
use indicatif::{ParallelProgressIterator, ProgressBar};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

/// Log of one ref, newest first. The walk stops at the first commit found in
/// `terminators`, which is kept as the last entry.
pub fn history<B: Backend + ?Sized>(
    backend: &B,
    ref_name: &str,
    terminators: &HashSet<CommitId>,
) -> Result<BranchHistory> {
    let mut commits = Vec::new();
    let mut seen = HashSet::new();
    backend.walk_log(ref_name, &mut |commit| {
        if seen.insert(commit.to_string()) {
            commits.push(commit.to_string());
        }
        !terminators.contains(commit)
    })?;
    debug!(ref_name, commits = commits.len(), "collected history");
    Ok(BranchHistory {
        ref_name: ref_name.to_string(),
        commits,
    })
}

/// Histories of the reference line and of every ref under the layout prefix.
///
/// The reference line is walked in full first; every other ref stops as soon
/// as it reaches a commit already on the reference line.
pub fn collect<B: Backend + ?Sized>(
    backend: &B,
    layout: &Layout,
    pool: &ThreadPool,
    bar: &ProgressBar,
) -> Result<BTreeMap<String, BranchHistory>> {
    let reference = history(backend, &layout.reference, &HashSet::new())?;
    info!(
        reference = %layout.reference,
        commits = reference.commits.len(),
        "collected reference line"
    );
    let terminators: HashSet<CommitId> = reference.commits.iter().cloned().collect();

    let others: Vec<String> = backend
        .list_refs(&layout.prefix)?
        .into_iter()
        .filter(|name| *name != layout.reference)
        .collect();
    bar.set_length(others.len() as u64);

    let histories = pool.install(|| {
        others
            .par_iter()
            .progress_with(bar.clone())
            .map(|name| history(backend, name, &terminators))
            .collect::<Result<Vec<_>>>()
    })?;
    bar.finish_and_clear();

    let mut collected: BTreeMap<String, BranchHistory> = histories
        .into_iter()
        .map(|h| (h.ref_name.clone(), h))
        .collect();
    collected.insert(layout.reference.clone(), reference);
    info!(refs = collected.len(), "collected branch histories");
    Ok(collected)
}
