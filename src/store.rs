// src/store.rs

//! JSON snapshots: the content index between runs, and the plan report.

use crate::error::{Error, Result};
use crate::model::ContentIndex;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Location of the persisted content index.
#[derive(Debug, Clone)]
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        IndexStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the previous snapshot. A missing file is a first run and gives
    /// an empty index; anything unreadable is an error.
    pub fn load(&self) -> Result<ContentIndex> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no content index yet, starting empty");
                return Ok(ContentIndex::default());
            }
            Err(source) => {
                return Err(Error::IndexRead {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let index: ContentIndex =
            serde_json::from_slice(&bytes).map_err(|source| Error::IndexParse {
                path: self.path.clone(),
                source,
            })?;
        info!(
            path = %self.path.display(),
            commits = index.commit_trees.len(),
            "loaded content index"
        );
        Ok(index)
    }

    pub fn save(&self, index: &ContentIndex) -> Result<()> {
        to_pretty_json(index)
            .and_then(|data| atomic_write(&self.path, &data))
            .map_err(|source| Error::IndexWrite {
                path: self.path.clone(),
                source,
            })?;
        debug!(
            path = %self.path.display(),
            commits = index.commit_trees.len(),
            "saved content index"
        );
        Ok(())
    }
}

/// Writes the plan report to `path`, or to stdout when there is none.
pub fn write_report<T: Serialize>(report: &T, path: Option<&Path>) -> Result<()> {
    let written = to_pretty_json(report).and_then(|mut data| {
        data.push(b'\n');
        match path {
            Some(path) => atomic_write(path, &data),
            None => io::stdout().lock().write_all(&data),
        }
    });
    written.map_err(|source| Error::PlanWrite {
        path: path.map_or_else(|| PathBuf::from("<stdout>"), Path::to_path_buf),
        source,
    })
}

fn to_pretty_json<T: Serialize>(value: &T) -> io::Result<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(io::Error::other)
}

/// Temp-file-then-rename, so a crash leaves either the old snapshot or the
/// new one on disk.
fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("tmp");
    let mut file = File::create(&tmp)?;
    file.write_all(data)?;
    file.sync_data()?;
    fs::rename(&tmp, path)
}
