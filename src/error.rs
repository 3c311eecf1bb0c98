// src/error.rs

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can stop the reconciliation pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error("git backend failed while {context}: {source}")]
    Git {
        context: String,
        #[source]
        source: git2::Error,
    },

    #[error("ref not found: {0}")]
    RefNotFound(String),

    #[error("object not found: {0}")]
    ObjectNotFound(String),

    #[error("not a valid object id: {0}")]
    InvalidObjectId(String),

    /// The content index has no install record for a commit that a branch
    /// history refers to.
    #[error("content index has no scan for commit {commit} (ref {ref_name})")]
    MissingScan { ref_name: String, commit: String },

    #[error("cannot read content index {path:?}: {source}")]
    IndexRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("content index {path:?} is corrupt: {source}")]
    IndexParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot write content index {path:?}: {source}")]
    IndexWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write release plan {path:?}: {source}")]
    PlanWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{step} interrupted: {completed} done, {remaining} left for the next run")]
    Interrupted {
        step: &'static str,
        completed: usize,
        remaining: usize,
    },

    #[error("interrupted before the {0} stage, the repository was not touched")]
    Cancelled(&'static str),

    #[error("ref {name} already points at {existing}, refusing to move it to {wanted}")]
    RefConflict {
        name: String,
        existing: String,
        wanted: String,
    },

    #[error("invalid synthetic date {0:?} (expected RFC 3339)")]
    InvalidDate(String),

    #[error("cannot start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    pub fn git(context: impl Into<String>) -> impl FnOnce(git2::Error) -> Error {
        let context = context.into();
        move |source| Error::Git { context, source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
