// src/cli.rs

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the converted git repository
    #[arg(short, long)]
    pub repo: PathBuf,

    /// Content index snapshot, reused and updated across runs
    #[arg(long, default_value = "retag-index.json")]
    pub index: PathBuf,

    /// How far to take the reconciliation
    #[arg(long, value_enum, default_value_t = Stage::Plan)]
    pub stage: Stage,

    /// Where to write the plan report (stdout when omitted)
    #[arg(long)]
    pub plan_output: Option<PathBuf>,

    /// Only refs whose short name starts with this are considered
    #[arg(long, default_value = "svn/")]
    pub prefix: String,

    /// The reference line every other ref is matched against
    #[arg(long, default_value = "svn/trunk")]
    pub reference: String,

    /// Subdirectory that marks a full copy of the project
    #[arg(long, default_value = "vice")]
    pub marker_dir: String,

    /// File that marks a copy of the marker directory itself
    #[arg(long, default_value = "README")]
    pub marker_file: String,

    /// Worker threads for collecting and scanning (defaults to CPU count)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Save the content index after this many newly scanned commits
    #[arg(long, default_value_t = 500)]
    pub checkpoint_every: usize,

    /// Prefix of the release tags created by the apply stage
    #[arg(long, default_value = "release/")]
    pub tag_prefix: String,

    /// Branch that chains the synthesized legacy releases
    #[arg(long, default_value = "legacy_releases")]
    pub legacy_branch: String,

    /// Author and committer name of synthesized commits
    #[arg(long, default_value = "Release Reconstructor")]
    pub identity_name: String,

    /// Author and committer email of synthesized commits
    #[arg(long, default_value = "release-reconstructor@localhost")]
    pub identity_email: String,

    /// RFC 3339 timestamp for synthesized commits, for reproducible ids
    #[arg(long)]
    pub synthetic_date: Option<String>,

    /// Log per-ref and per-commit detail
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Collect ref histories and scan new commits into the content index
    Index,
    /// Index, then cross-reference and print the release plan
    Plan,
    /// Plan, then create tags, legacy commits and the legacy branch
    Apply,
}
