// src/version.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Releases whose copy landed under the wrong name. Keyed by subhistory key.
const MISTAGGED_RELEASES: &[(&str, &[u32])] = &[
    // v2.4.2 was copied from inside the v2.4.1 tag instead of being tagged on its own
    ("svn/tags/v2.4/v2.4.1/trunk/", &[2, 4, 2]),
];

/// A release number such as `v2.4.1`, compared component by component.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReleaseVersion(Vec<u32>);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not a release name: {0:?}")]
pub struct MalformedVersionName(pub String);

impl ReleaseVersion {
    pub fn new(components: Vec<u32>) -> Self {
        ReleaseVersion(components)
    }

    pub fn components(&self) -> &[u32] {
        &self.0
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v")?;
        for (i, component) in self.components().iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{component}")?;
        }
        Ok(())
    }
}

impl FromStr for ReleaseVersion {
    type Err = MalformedVersionName;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let malformed = || MalformedVersionName(name.to_string());
        let digits = name.strip_prefix('v').ok_or_else(malformed)?;
        digits
            .split('.')
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(malformed());
                }
                part.parse::<u32>().map_err(|_| malformed())
            })
            .collect::<Result<Vec<_>, _>>()
            .map(ReleaseVersion)
    }
}

impl TryFrom<String> for ReleaseVersion {
    type Error = MalformedVersionName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ReleaseVersion> for String {
    fn from(version: ReleaseVersion) -> String {
        version.to_string()
    }
}

/// Version named by a subhistory key (`<ref><path>`), judged by its last
/// path segment. Keys that do not name a release give `None`.
pub fn version_for_source(key: &str) -> Option<ReleaseVersion> {
    if let Some((_, fixed)) = MISTAGGED_RELEASES.iter().find(|(source, _)| *source == key) {
        return Some(ReleaseVersion::new(fixed.to_vec()));
    }
    let segment = key.trim_end_matches('/').rsplit('/').next()?;
    segment.parse().ok()
}
