// src/config.rs

use crate::cli::Args;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Names that identify a copy of the managed project.
#[derive(Debug, Clone)]
pub struct Markers {
    /// Subdirectory whose presence makes its parent a full install
    pub directory: String,
    /// File whose presence makes its directory a copy of the marker directory
    pub file: String,
}

/// Where the converted refs live and which one is the reference line.
#[derive(Debug, Clone)]
pub struct Layout {
    pub prefix: String,
    pub reference: String,
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub jobs: usize,
    /// Commits scanned between two snapshot writes
    pub checkpoint_every: usize,
}

/// Fixed author and committer of synthesized release commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct ApplyOptions {
    pub tag_prefix: String,
    pub legacy_branch: String,
    pub identity: Identity,
    /// Timestamp for synthesized commits; `None` means "now"
    pub date: Option<DateTime<Utc>>,
}

impl ApplyOptions {
    pub fn tag_name(&self, version: &impl std::fmt::Display) -> String {
        format!("{}{}", self.tag_prefix, version)
    }

    pub fn timestamp(&self) -> i64 {
        self.date.unwrap_or_else(Utc::now).timestamp()
    }
}

/// Everything a run needs, resolved from the command line.
#[derive(Debug, Clone)]
pub struct Config {
    pub repo: PathBuf,
    pub index_path: PathBuf,
    pub plan_output: Option<PathBuf>,
    pub markers: Markers,
    pub layout: Layout,
    pub scan: ScanOptions,
    pub apply: ApplyOptions,
}

impl Config {
    pub fn from_args(args: &Args) -> Result<Config> {
        let date = args
            .synthetic_date
            .as_deref()
            .map(|raw| {
                DateTime::parse_from_rfc3339(raw)
                    .map(|date| date.with_timezone(&Utc))
                    .map_err(|_| Error::InvalidDate(raw.to_string()))
            })
            .transpose()?;

        let jobs = args.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        });

        Ok(Config {
            repo: args.repo.clone(),
            index_path: args.index.clone(),
            plan_output: args.plan_output.clone(),
            markers: Markers {
                directory: args.marker_dir.clone(),
                file: args.marker_file.clone(),
            },
            layout: Layout {
                prefix: args.prefix.clone(),
                reference: args.reference.clone(),
            },
            scan: ScanOptions {
                jobs: jobs.max(1),
                checkpoint_every: args.checkpoint_every.max(1),
            },
            apply: ApplyOptions {
                tag_prefix: args.tag_prefix.clone(),
                legacy_branch: args.legacy_branch.clone(),
                identity: Identity {
                    name: args.identity_name.clone(),
                    email: args.identity_email.clone(),
                },
                date,
            },
        })
    }
}
