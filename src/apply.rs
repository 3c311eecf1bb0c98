// src/apply.rs

use crate::backend::{RefUpdate, RefWriter};
use crate::config::ApplyOptions;
use crate::error::{Error, Result};
use crate::model::{CommitId, ReleasePlan, TreeId};
use crate::version::ReleaseVersion;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefOutcome {
    pub name: String,
    pub commit: CommitId,
    pub created: bool,
}

/// A commit made for a release that never reached the reference line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynthesizedRelease {
    pub version: ReleaseVersion,
    pub commit: CommitId,
    pub tree_hash: TreeId,
    pub parent: Option<CommitId>,
}

/// An unresolved release copy that was left alone
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRelease {
    pub version: ReleaseVersion,
    pub source: String,
    /// Another copy of the same version was tagged
    pub tagged: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub tags: Vec<RefOutcome>,
    pub synthesized: Vec<SynthesizedRelease>,
    pub legacy_branch: Option<RefOutcome>,
    pub skipped: Vec<SkippedRelease>,
}

/// Realizes a release plan.
///
/// Releases found on the reference line are tagged where they are. The
/// others get a synthetic commit each, chained oldest version first, and the
/// legacy branch is pointed at the last of them. Unresolved releases are
/// never written. Raising `cancel` stops the run before the next release is
/// written and before the legacy branch is moved.
pub fn apply_plan<W: RefWriter + ?Sized>(
    writer: &W,
    plan: &ReleasePlan,
    options: &ApplyOptions,
    cancel: &AtomicBool,
) -> Result<ApplyReport> {
    let time = options.timestamp();
    let mut report = ApplyReport::default();

    let mut releases: Vec<_> = plan.releases.iter().collect();
    releases.sort_by(|a, b| a.version.cmp(&b.version));

    let total = releases.len();
    let mut previous: Option<CommitId> = None;
    for (done, release) in releases.into_iter().enumerate() {
        if cancel.load(Ordering::SeqCst) {
            return Err(Error::Interrupted {
                step: "apply",
                completed: done,
                remaining: total - done,
            });
        }
        let commit = match &release.trunk_commit {
            Some(commit) => commit.clone(),
            None => {
                let message = format!("Legacy release {}", release.version);
                let commit = writer.create_commit(
                    &release.tree_hash,
                    previous.as_deref(),
                    &message,
                    &options.identity,
                    time,
                )?;
                info!(version = %release.version, %commit, "synthesized legacy release");
                report.synthesized.push(SynthesizedRelease {
                    version: release.version.clone(),
                    commit: commit.clone(),
                    tree_hash: release.tree_hash.clone(),
                    parent: previous.replace(commit.clone()),
                });
                commit
            }
        };

        let tag = options.tag_name(&release.version);
        let update = writer.create_tag(&tag, &commit)?;
        info!(%tag, %commit, ?update, "tagged release");
        report.tags.push(RefOutcome {
            name: tag,
            commit,
            created: update == RefUpdate::Created,
        });
    }

    if let Some(last) = previous {
        if cancel.load(Ordering::SeqCst) {
            return Err(Error::Interrupted {
                step: "apply",
                completed: total,
                remaining: 0,
            });
        }
        let update = writer.create_branch(&options.legacy_branch, &last)?;
        info!(branch = %options.legacy_branch, commit = %last, ?update, "legacy release branch");
        report.legacy_branch = Some(RefOutcome {
            name: options.legacy_branch.clone(),
            commit: last,
            created: update == RefUpdate::Created,
        });
    }

    for unresolved in &plan.unresolved {
        let tagged = plan.releases.iter().any(|r| r.version == unresolved.version);
        if tagged {
            info!(
                version = %unresolved.version,
                source = %unresolved.source,
                "unresolved copy ignored, release tagged from another source"
            );
        } else {
            warn!(version = %unresolved.version, source = %unresolved.source, "not tagged, unresolved");
        }
        report.skipped.push(SkippedRelease {
            version: unresolved.version.clone(),
            source: unresolved.source.clone(),
            tagged,
        });
    }
    Ok(report)
}
