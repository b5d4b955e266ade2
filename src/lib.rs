//! doc-relink: Rewrite relative Markdown links for published documentation
//!
//! Modules:
//! - resolve: classify link targets and resolve repo-relative paths
//! - rewrite: scan a document and substitute blob/tree URLs
//! - relink_docs: walk a docs tree and rewrite files in place

pub mod error;
pub mod relink_docs;
pub mod resolve;
pub mod rewrite;

pub use error::RelinkError;
pub use relink_docs::{relink_docs, RelinkConfig, RelinkReport};
pub use resolve::{resolve, Resolution, ResolvedTarget, TargetKind};
pub use rewrite::{rewrite_links, LinkKind, LinkReference, LinkRewriter, RewriteOutcome};
