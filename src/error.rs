//! Error types shared by the rewriter and the document driver

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelinkError {
    /// Repository URL could not be parsed or is not http(s)
    #[error("invalid repository URL '{url}': {reason}")]
    InvalidRepoUrl { url: String, reason: String },

    #[error("branch name must not be empty")]
    EmptyBranch,

    #[error("invalid link pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Document path cannot be expressed relative to the repository root
    #[error("{} is outside repository root {}", path.display(), root.display())]
    OutsideRepoRoot { path: PathBuf, root: PathBuf },
}
