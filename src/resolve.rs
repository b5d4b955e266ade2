//! Link target classification
//!
//! Decides whether a link target is external, and if not, turns it into a
//! repository-root-relative path plus a blob/tree kind.

use std::fmt;
use std::path::{Component, Path};

/// Target prefixes that are never rewritten
pub const EXTERNAL_PREFIXES: &[&str] = &[
    "http://", "https://", "mailto:", "#", "xref:", "data:", "//",
];

/// Whether a link target points outside the repository
pub fn is_external(target: &str) -> bool {
    EXTERNAL_PREFIXES
        .iter()
        .any(|prefix| target.starts_with(prefix))
        || has_uri_scheme(target)
}

/// `scheme:` prefix as in RFC 3986: a letter followed by letters, digits,
/// `+`, `-` or `.`
fn has_uri_scheme(target: &str) -> bool {
    let Some((scheme, _)) = target.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}

/// What the hosting service should render for a resolved target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    File,
    Directory,
}

impl TargetKind {
    /// URL path segment of the hosting service endpoint
    pub fn segment(self) -> &'static str {
        match self {
            TargetKind::File => "blob",
            TargetKind::Directory => "tree",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

/// A link target expressed relative to the repository root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Repo-root-relative path, never starting with `./`, `../` or `/`
    pub path: String,
    pub kind: TargetKind,
    /// `#fragment` or `?query` carried over from the original target
    pub suffix: String,
}

impl ResolvedTarget {
    pub fn url(&self, repo_url: &str, branch: &str) -> String {
        format!(
            "{}/{}/{}/{}{}",
            repo_url,
            self.kind.segment(),
            branch,
            self.path,
            self.suffix
        )
    }
}

/// Outcome of classifying one link target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Any `scheme:` URI, protocol-relative URL, `#anchor` or `?query`
    External,
    /// Relative target that cannot be placed inside the repository
    Unresolvable,
    Internal(ResolvedTarget),
}

/// Resolve a link target found in `document`.
///
/// `document` is the path of the containing Markdown file relative to the
/// repository root. Targets starting with `./` or `/` are taken as
/// root-relative; every other relative target (bare filenames, `../x`,
/// `dir/x`) is resolved against the document's directory.
///
/// Image targets are always files.
pub fn resolve(target: &str, document: &Path, is_image: bool) -> Resolution {
    if is_external(target) {
        return Resolution::External;
    }

    // Angle-bracket destinations and the like are left alone
    if target.starts_with('<') {
        return Resolution::Unresolvable;
    }

    let (path_part, suffix) = match target.find(['#', '?']) {
        Some(idx) => target.split_at(idx),
        None => (target, ""),
    };

    // `?query` alone points at the current page, like `#anchor`
    if path_part.is_empty() {
        return Resolution::External;
    }

    let (mut segments, rest) = if let Some(rest) = path_part.strip_prefix("./") {
        (Vec::new(), rest)
    } else if let Some(rest) = path_part.strip_prefix('/') {
        (Vec::new(), rest)
    } else {
        match document_dir(document) {
            Some(dir) => (dir, path_part),
            None => return Resolution::Unresolvable,
        }
    };

    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Resolution::Unresolvable;
                }
            }
            name => segments.push(name.to_string()),
        }
    }

    let Some(basename) = segments.last() else {
        return Resolution::Unresolvable;
    };

    let trailing_slash = path_part.ends_with('/');
    let kind = if is_image {
        TargetKind::File
    } else {
        infer_kind(basename, trailing_slash)
    };

    let mut path = segments.join("/");
    if trailing_slash {
        path.push('/');
    }

    Resolution::Internal(ResolvedTarget {
        path,
        kind,
        suffix: suffix.to_string(),
    })
}

/// Directory when the target ends in a separator or its basename lacks a
/// non-empty extension.
fn infer_kind(basename: &str, trailing_slash: bool) -> TargetKind {
    if trailing_slash {
        return TargetKind::Directory;
    }
    match basename.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => TargetKind::File,
        _ => TargetKind::Directory,
    }
}

/// Normalized segments of the directory containing `document`.
///
/// Returns `None` if the document path is absolute or climbs above the
/// repository root.
fn document_dir(document: &Path) -> Option<Vec<String>> {
    let parent = document.parent().unwrap_or_else(|| Path::new(""));
    let mut segments = Vec::new();

    for component in parent.components() {
        match component {
            Component::Normal(name) => segments.push(name.to_str()?.to_string()),
            Component::ParentDir => {
                segments.pop()?;
            }
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    Some(segments)
}
