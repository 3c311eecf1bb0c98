// src/crossref.rs

use crate::error::{Error, Result};
use crate::model::{ContentIndex, CrossReference, InstallRecord, Subhistory};
use crate::resolver::{resolve_releases, ReferenceIndex};
use std::collections::BTreeMap;
use tracing::{info, warn};

fn record<'a>(index: &'a ContentIndex, ref_name: &str, commit: &str) -> Result<&'a InstallRecord> {
    index
        .commit_trees
        .get(commit)
        .ok_or_else(|| Error::MissingScan {
            ref_name: ref_name.to_string(),
            commit: commit.to_string(),
        })
}

/// Maps the root tree of every reference-line commit to that commit. When
/// several commits share a tree, the oldest one is kept. Commits without a
/// full install at the root are skipped.
pub fn reference_index(index: &ContentIndex, reference: &str) -> Result<ReferenceIndex> {
    let commits = index
        .branch_history
        .get(reference)
        .ok_or_else(|| Error::RefNotFound(reference.to_string()))?;

    let mut trees = ReferenceIndex::new();
    let mut rootless = 0;
    for commit in commits {
        match record(index, reference, commit)?.root() {
            Some(tree) => {
                trees.insert(tree.clone(), commit.clone());
            }
            None => rootless += 1,
        }
    }
    if rootless > 0 {
        warn!(
            reference,
            rootless, "reference-line commits without a root-level install were skipped"
        );
    }
    Ok(trees)
}

/// Builds one subhistory per (ref, install path) for every ref but the
/// reference line, then looks its endpoints up on the reference line.
pub fn subhistories(
    index: &ContentIndex,
    reference: &str,
    trunk: &ReferenceIndex,
) -> Result<BTreeMap<String, Subhistory>> {
    let mut subhistories: BTreeMap<String, Subhistory> = BTreeMap::new();
    for (ref_name, commits) in &index.branch_history {
        if ref_name == reference {
            continue;
        }
        for commit in commits {
            for (path, tree) in &record(index, ref_name, commit)?.full {
                subhistories
                    .entry(format!("{ref_name}{path}"))
                    .or_default()
                    .push(tree);
            }
        }
    }

    for subhistory in subhistories.values_mut() {
        subhistory.branched_from = subhistory.oldest().and_then(|t| trunk.get(t)).cloned();
        subhistory.merged_to = subhistory.newest().and_then(|t| trunk.get(t)).cloned();
    }
    Ok(subhistories)
}

/// Cross-references every ref against the reference line and resolves the
/// releases among them.
pub fn cross_reference(index: &ContentIndex, reference: &str) -> Result<CrossReference> {
    info!(reference, "content-indexing the reference line");
    let trunk = reference_index(index, reference)?;

    info!("content-indexing branches and their installs");
    let subhistories = subhistories(index, reference, &trunk)?;

    let release_history = resolve_releases(&subhistories, &trunk);
    info!(
        subhistories = subhistories.len(),
        releases = release_history.releases.len(),
        unresolved = release_history.unresolved.len(),
        "cross-reference complete"
    );
    Ok(CrossReference {
        subhistories,
        release_history,
    })
}
