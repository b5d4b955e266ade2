//! relink command: Rewrite relative links in a documentation tree
//!
//! Walks every `.md` file under the docs directory, rewrites internal
//! links into absolute blob/tree URLs and writes back only changed files.
//! Summary is printed as compact JSON on stdout.

use crate::error::RelinkError;
use crate::rewrite::LinkRewriter;
use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info, warn};

#[derive(Args, Debug)]
pub struct RelinkArgs {
    /// Base URL of the repository on the hosting service
    #[arg(long, env = "DOC_RELINK_REPO_URL")]
    pub repo_url: String,

    /// Branch the generated URLs point at
    #[arg(long, default_value = "main", env = "DOC_RELINK_BRANCH")]
    pub branch: String,

    /// Documentation directory to scan
    #[arg(long, default_value = "Documentation", env = "DOC_RELINK_DOCS_DIR")]
    pub docs_dir: PathBuf,

    /// Repository root that link paths are relative to
    #[arg(long, default_value = ".", env = "DOC_RELINK_REPO_ROOT")]
    pub repo_root: PathBuf,

    /// Report changes without writing files
    #[arg(long)]
    pub dry_run: bool,
}

/// Configuration for a relink run
#[derive(Debug, Clone)]
pub struct RelinkConfig {
    pub repo_url: String,
    pub branch: String,
    pub docs_dir: PathBuf,
    pub repo_root: PathBuf,
    pub dry_run: bool,
}

impl From<RelinkArgs> for RelinkConfig {
    fn from(args: RelinkArgs) -> Self {
        Self {
            repo_url: args.repo_url,
            branch: args.branch,
            docs_dir: args.docs_dir,
            repo_root: args.repo_root,
            dry_run: args.dry_run,
        }
    }
}

/// Run summary (compact)
#[derive(Debug, Serialize)]
pub struct RelinkReport {
    pub docs_dir: String,
    pub branch: String,
    pub scanned: usize,
    pub modified: usize,
    pub links_rewritten: usize,
    pub failed: usize,
    pub dry_run: bool,
}

/// Run the relink command
pub async fn run_relink_docs(args: RelinkArgs) -> Result<()> {
    let config = RelinkConfig::from(args);

    info!(
        repo_url = %config.repo_url,
        branch = %config.branch,
        docs_dir = %config.docs_dir.display(),
        "Rewriting documentation links"
    );

    let report = relink_docs(&config).await?;

    println!("{}", serde_json::to_string(&report)?);

    info!(
        "Done: {} of {} files modified ({} links, {} failed)",
        report.modified, report.scanned, report.links_rewritten, report.failed
    );

    Ok(())
}

/// Rewrite every Markdown file under `config.docs_dir`.
///
/// Fails only if the configuration is unusable; per-file errors are
/// logged and counted.
pub async fn relink_docs(config: &RelinkConfig) -> Result<RelinkReport> {
    let rewriter = LinkRewriter::new(&config.repo_url, config.branch.as_str())?;

    if !config.docs_dir.is_dir() {
        bail!(
            "Documentation directory not found: {}",
            config.docs_dir.display()
        );
    }

    let root = fs::canonicalize(&config.repo_root)
        .await
        .with_context(|| format!("Failed to resolve repository root {}", config.repo_root.display()))?;

    let files = collect_markdown_files(&config.docs_dir)?;
    debug!("Found {} Markdown files", files.len());

    let mut report = RelinkReport {
        docs_dir: config.docs_dir.display().to_string(),
        branch: rewriter.branch().to_string(),
        scanned: files.len(),
        modified: 0,
        links_rewritten: 0,
        failed: 0,
        dry_run: config.dry_run,
    };

    for file in &files {
        debug!("Processing {}", file.display());

        match relink_file(&rewriter, file, &root, config.dry_run).await {
            Ok(0) => debug!("No changes needed for {}", file.display()),
            Ok(count) => {
                report.modified += 1;
                report.links_rewritten += count;
                info!("Rewrote {} links in {}", count, file.display());
            }
            Err(e) => {
                report.failed += 1;
                error!("Error processing {}: {:#}", file.display(), e);
            }
        }
    }

    if config.dry_run {
        info!("Dry run - no files written");
    }

    Ok(report)
}

/// Rewrite one file, returning the number of links replaced
async fn relink_file(
    rewriter: &LinkRewriter,
    path: &Path,
    root: &Path,
    dry_run: bool,
) -> Result<usize> {
    let document = repo_relative(path, root).await?;

    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let outcome = rewriter.rewrite(&content, &document);

    if outcome.changed && !dry_run {
        fs::write(path, outcome.text)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    Ok(outcome.rewritten)
}

/// Path of `path` relative to the (canonical) repository root
async fn repo_relative(path: &Path, root: &Path) -> Result<PathBuf> {
    let absolute = fs::canonicalize(path)
        .await
        .with_context(|| format!("Failed to resolve {}", path.display()))?;

    let relative = absolute
        .strip_prefix(root)
        .map_err(|_| RelinkError::OutsideRepoRoot {
            path: absolute.clone(),
            root: root.to_path_buf(),
        })?;

    Ok(relative.to_path_buf())
}

/// Every `.md` file below `docs_dir`, sorted
fn collect_markdown_files(docs_dir: &Path) -> Result<Vec<PathBuf>> {
    let base = glob::Pattern::escape(&docs_dir.to_string_lossy());
    let pattern = Path::new(&base).join("**").join("*.md");
    let pattern = pattern.to_string_lossy();

    let mut files = Vec::new();
    for entry in glob::glob(&pattern)? {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable entry: {}", e),
        }
    }

    files.sort();
    Ok(files)
}
