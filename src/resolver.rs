// src/resolver.rs

use crate::model::{
    CommitId, PlannedRelease, ReleasePlan, Subhistory, TreeId, UnresolvedReason,
    UnresolvedRelease,
};
use crate::version::{version_for_source, ReleaseVersion};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

/// Root tree id of a reference-line commit, mapped to that commit
pub type ReferenceIndex = HashMap<TreeId, CommitId>;

/// What a single release copy resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Identical content exists on the reference line
    Trunk {
        tree_hash: TreeId,
        trunk_commit: CommitId,
    },
    /// Only ever had one content, which the reference line never had
    Synthesize { tree_hash: TreeId },
    Unresolved(UnresolvedReason),
}

/// Resolves one subhistory: the most recently observed content that also
/// exists on the reference line wins.
pub fn resolve(subhistory: &Subhistory, reference: &ReferenceIndex) -> Resolution {
    for tree in &subhistory.history {
        if let Some(commit) = reference.get(tree) {
            return Resolution::Trunk {
                tree_hash: tree.clone(),
                trunk_commit: commit.clone(),
            };
        }
    }
    match subhistory.history.as_slice() {
        [] => Resolution::Unresolved(UnresolvedReason::EmptyHistory),
        [only] => Resolution::Synthesize {
            tree_hash: only.clone(),
        },
        many => {
            let distinct: BTreeSet<&TreeId> = many.iter().collect();
            Resolution::Unresolved(UnresolvedReason::NoTrunkMatch {
                distinct: distinct.len(),
            })
        }
    }
}

/// Builds the release plan from every subhistory whose key names a release.
///
/// Releases come out in ascending version order. Copies of the same version
/// that resolve to different results are not guessed between; the version
/// is reported as unresolved instead.
pub fn resolve_releases(
    subhistories: &BTreeMap<String, Subhistory>,
    reference: &ReferenceIndex,
) -> ReleasePlan {
    let mut candidates: Vec<(ReleaseVersion, &String)> = subhistories
        .keys()
        .filter_map(|key| version_for_source(key).map(|version| (version, key)))
        .collect();
    candidates.sort();

    let mut plan = ReleasePlan::default();
    let mut rest = candidates.as_slice();
    while let Some((version, _)) = rest.first() {
        let same = rest.iter().take_while(|(v, _)| v == version).count();
        let (group, tail) = rest.split_at(same);
        rest = tail;

        let mut resolved: Vec<PlannedRelease> = Vec::new();
        for (_, source) in group {
            let subhistory = &subhistories[*source];
            let planned = match resolve(subhistory, reference) {
                Resolution::Trunk {
                    tree_hash,
                    trunk_commit,
                } => PlannedRelease {
                    version: version.clone(),
                    source: source.to_string(),
                    tree_hash,
                    trunk_commit: Some(trunk_commit),
                },
                Resolution::Synthesize { tree_hash } => PlannedRelease {
                    version: version.clone(),
                    source: source.to_string(),
                    tree_hash,
                    trunk_commit: None,
                },
                Resolution::Unresolved(reason) => {
                    warn!(%version, source = %source, ?reason, "release needs manual attention");
                    plan.unresolved.push(UnresolvedRelease {
                        version: version.clone(),
                        source: source.to_string(),
                        reason,
                        history: subhistory.history.clone(),
                    });
                    continue;
                }
            };
            debug!(
                %version,
                source = %source,
                trunk_commit = ?planned.trunk_commit,
                "resolved release"
            );
            resolved.push(planned);
        }

        let Some(first) = resolved.first() else {
            continue;
        };
        let agree = resolved
            .iter()
            .all(|r| r.tree_hash == first.tree_hash && r.trunk_commit == first.trunk_commit);
        if agree {
            plan.releases.push(first.clone());
        } else {
            let sources: Vec<String> = resolved.iter().map(|r| r.source.clone()).collect();
            warn!(%version, ?sources, "copies of one release disagree");
            plan.unresolved.push(UnresolvedRelease {
                version: version.clone(),
                source: first.source.clone(),
                reason: UnresolvedReason::ConflictingSources { sources },
                history: resolved.iter().map(|r| r.tree_hash.clone()).collect(),
            });
        }
    }

    plan.unresolved
        .sort_by(|a, b| (&a.version, &a.source).cmp(&(&b.version, &b.source)));
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sub(history: &[&str]) -> Subhistory {
        Subhistory {
            history: history.iter().map(|t| t.to_string()).collect(),
            ..Subhistory::default()
        }
    }

    fn reference(pairs: &[(&str, &str)]) -> ReferenceIndex {
        pairs
            .iter()
            .map(|(tree, commit)| (tree.to_string(), commit.to_string()))
            .collect()
    }

    fn version(name: &str) -> ReleaseVersion {
        name.parse().unwrap()
    }

    #[test]
    fn newest_matching_content_wins() {
        let reference = reference(&[("T4", "C4"), ("T3", "C3")]);
        assert_eq!(
            resolve(&sub(&["T5", "T4", "T3"]), &reference),
            Resolution::Trunk {
                tree_hash: "T4".into(),
                trunk_commit: "C4".into()
            }
        );
    }

    #[test]
    fn single_unmatched_content_is_synthesized() {
        assert_eq!(
            resolve(&sub(&["T99"]), &ReferenceIndex::new()),
            Resolution::Synthesize {
                tree_hash: "T99".into()
            }
        );
    }

    #[test]
    fn several_unmatched_contents_are_unresolved() {
        assert_eq!(
            resolve(&sub(&["T1", "T2", "T1"]), &ReferenceIndex::new()),
            Resolution::Unresolved(UnresolvedReason::NoTrunkMatch { distinct: 2 })
        );
        assert_eq!(
            resolve(&sub(&[]), &ReferenceIndex::new()),
            Resolution::Unresolved(UnresolvedReason::EmptyHistory)
        );
    }

    #[test]
    fn plan_is_sorted_by_version_and_skips_other_refs() {
        let mut subs = BTreeMap::new();
        subs.insert("svn/tags/v1.10/".to_string(), sub(&["T10"]));
        subs.insert("svn/tags/v1.2.0/".to_string(), sub(&["T9"]));
        subs.insert("svn/tags/v0.9.0/".to_string(), sub(&["T99"]));
        subs.insert("svn/branches/experimental/".to_string(), sub(&["T50"]));
        subs.insert("svn/tags/v0.5/".to_string(), sub(&["T5", "T6"]));
        let reference = reference(&[("T9", "C7"), ("T10", "C10")]);

        let plan = resolve_releases(&subs, &reference);
        let order: Vec<(String, Option<String>)> = plan
            .releases
            .iter()
            .map(|r| (r.version.to_string(), r.trunk_commit.clone()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("v0.9.0".to_string(), None),
                ("v1.2.0".to_string(), Some("C7".to_string())),
                ("v1.10".to_string(), Some("C10".to_string())),
            ]
        );
        assert_eq!(plan.releases[0].tree_hash, "T99");
        assert_eq!(
            plan.unresolved,
            vec![UnresolvedRelease {
                version: version("v0.5"),
                source: "svn/tags/v0.5/".into(),
                reason: UnresolvedReason::NoTrunkMatch { distinct: 2 },
                history: vec!["T5".into(), "T6".into()],
            }]
        );
    }

    #[test]
    fn mistagged_copy_is_planned_under_its_real_version() {
        let mut subs = BTreeMap::new();
        subs.insert("svn/tags/v2.4.3/".to_string(), sub(&["T243"]));
        subs.insert("svn/tags/v2.4/v2.4.1/trunk/".to_string(), sub(&["T242"]));
        subs.insert("svn/tags/v2.4.1/".to_string(), sub(&["T241"]));
        let reference = reference(&[("T241", "C241")]);

        let plan = resolve_releases(&subs, &reference);
        let order: Vec<(String, &str, &str)> = plan
            .releases
            .iter()
            .map(|r| (r.version.to_string(), r.source.as_str(), r.tree_hash.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("v2.4.1".to_string(), "svn/tags/v2.4.1/", "T241"),
                ("v2.4.2".to_string(), "svn/tags/v2.4/v2.4.1/trunk/", "T242"),
                ("v2.4.3".to_string(), "svn/tags/v2.4.3/", "T243"),
            ]
        );
        assert!(plan.unresolved.is_empty());
    }

    #[test]
    fn agreeing_copies_of_a_release_are_merged() {
        let mut subs = BTreeMap::new();
        subs.insert("svn/tags/v2.0/".to_string(), sub(&["T2"]));
        subs.insert("svn/tags/old/v2.0/".to_string(), sub(&["T2"]));
        let plan = resolve_releases(&subs, &reference(&[("T2", "C2")]));
        assert_eq!(plan.releases.len(), 1);
        assert_eq!(plan.releases[0].source, "svn/tags/old/v2.0/");
        assert!(plan.unresolved.is_empty());
    }

    #[test]
    fn disagreeing_copies_of_a_release_are_unresolved() {
        let mut subs = BTreeMap::new();
        subs.insert("svn/tags/v2.0/".to_string(), sub(&["T2"]));
        subs.insert("svn/tags/old/v2.0/".to_string(), sub(&["T3"]));
        let plan = resolve_releases(&subs, &reference(&[("T2", "C2")]));
        assert!(plan.releases.is_empty());
        assert_eq!(
            plan.unresolved[0].reason,
            UnresolvedReason::ConflictingSources {
                sources: vec!["svn/tags/old/v2.0/".into(), "svn/tags/v2.0/".into()]
            }
        );
    }
}
