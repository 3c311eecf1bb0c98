// src/analyzer.rs

use crate::apply::{apply_plan, ApplyReport};
use crate::backend::{Backend, GitRepo, RefWriter};
use crate::cli::Stage;
use crate::collector;
use crate::config::Config;
use crate::crossref::cross_reference;
use crate::error::{Error, Result};
use crate::model::{ContentIndex, CrossReference};
use crate::scanner::scan_pending;
use crate::store::{write_report, IndexStore};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// What the plan and apply stages print.
#[derive(Debug, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub reference: String,
    #[serde(flatten)]
    pub cross_reference: CrossReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied: Option<ApplyReport>,
}

fn progress_bar(message: &'static str) -> ProgressBar {
    if !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len} ({eta})") {
        bar.set_style(style);
    }
    bar.set_message(message);
    bar
}

/// Phase 1: refresh every branch history and scan the commits the snapshot
/// has not seen yet. The snapshot is saved after every batch and at the end.
pub fn build_index<B: Backend + ?Sized>(
    backend: &B,
    config: &Config,
    store: &IndexStore,
    pool: &ThreadPool,
    cancel: &AtomicBool,
) -> Result<ContentIndex> {
    let mut index = store.load()?;

    let histories = collector::collect(
        backend,
        &config.layout,
        pool,
        &progress_bar("Collecting ref histories"),
    )?;
    let pruned = index.set_histories(&histories);
    info!(
        refs = histories.len(),
        unique_commits = index.unique_commits(),
        pruned,
        "branch histories collected"
    );

    scan_pending(
        backend,
        &mut index,
        &config.markers,
        &config.scan,
        pool,
        cancel,
        &progress_bar("Searching commits for project copies"),
        |snapshot| store.save(snapshot),
    )?;
    store.save(&index)?;
    info!(path = %store.path().display(), "content index saved");
    Ok(index)
}

/// Runs the pipeline up to `stage` against any backend.
pub fn run_stages<B: Backend + RefWriter + ?Sized>(
    backend: &B,
    config: &Config,
    stage: Stage,
    pool: &ThreadPool,
    cancel: &AtomicBool,
) -> Result<Option<Report>> {
    let store = IndexStore::new(&config.index_path);
    let index = build_index(backend, config, &store, pool, cancel)?;
    if stage == Stage::Index {
        return Ok(None);
    }
    if cancel.load(Ordering::SeqCst) {
        return Err(Error::Cancelled("plan"));
    }

    let cross_reference = cross_reference(&index, &config.layout.reference)?;
    let applied = if stage == Stage::Apply {
        if cancel.load(Ordering::SeqCst) {
            return Err(Error::Cancelled("apply"));
        }
        Some(apply_plan(
            backend,
            &cross_reference.release_history,
            &config.apply,
            cancel,
        )?)
    } else {
        None
    };

    Ok(Some(Report {
        generated_at: Utc::now(),
        reference: config.layout.reference.clone(),
        cross_reference,
        applied,
    }))
}

pub fn run(config: &Config, stage: Stage, cancel: &AtomicBool) -> Result<()> {
    let repo = GitRepo::open(&config.repo)?;
    info!(repo = %config.repo.display(), ?stage, jobs = config.scan.jobs, "reconciling");
    let pool = ThreadPoolBuilder::new()
        .num_threads(config.scan.jobs)
        .build()?;

    if let Some(report) = run_stages(&repo, config, stage, &pool, cancel)? {
        write_report(&report, config.plan_output.as_deref())?;
    }
    Ok(())
}
