//! Markdown link rewriting
//!
//! Scans a document once for `[text](target)` and `![alt](target)` and swaps
//! every internal target for an absolute blob/tree URL on the hosting
//! service. Display text, alt text and titles are kept byte-for-byte.

use crate::error::RelinkError;
use crate::resolve::{resolve, Resolution};
use regex::Regex;
use std::ops::Range;
use std::path::Path;

/// Links and images in one pass. Display text may hold one level of
/// nested brackets so badges like `[![ci](badge.svg)](ci/)` match as a
/// single outer link. Targets may hold one level of balanced parentheses,
/// e.g. `foo(1).md`.
const LINK_PATTERN: &str =
    r"(!?)\[((?:[^\[\]]|\[[^\[\]]*\])*)\]\(((?:[^()\s]|\([^()\s]*\))+)(\s+[^)]*)?\)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Link,
    Image,
}

/// A link or image occurrence in a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkReference<'a> {
    pub kind: LinkKind,
    /// Display text for links, alt text for images
    pub text: &'a str,
    pub target: &'a str,
    /// Anything between the target and the closing parenthesis
    pub title: Option<&'a str>,
    /// Byte range of `target` within the document
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutcome {
    pub text: String,
    pub changed: bool,
    /// Number of targets replaced
    pub rewritten: usize,
}

/// Rewrites internal Markdown links for one repository and branch
#[derive(Debug, Clone)]
pub struct LinkRewriter {
    repo_url: String,
    branch: String,
    pattern: Regex,
}

impl LinkRewriter {
    /// Create a rewriter for `repo_url` (an http(s) URL, trailing `/`
    /// ignored) at `branch`.
    pub fn new(repo_url: &str, branch: impl Into<String>) -> Result<Self, RelinkError> {
        let repo_url = validate_repo_url(repo_url)?;
        let branch = branch.into();
        if branch.trim().is_empty() {
            return Err(RelinkError::EmptyBranch);
        }

        Ok(Self {
            repo_url,
            branch,
            pattern: Regex::new(LINK_PATTERN)?,
        })
    }

    pub fn repo_url(&self) -> &str {
        &self.repo_url
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// All link and image references in `text`, ordered by position.
    /// Anything inside a code span or fenced code block is skipped.
    pub fn references<'a>(&self, text: &'a str) -> Vec<LinkReference<'a>> {
        let mut found = Vec::new();
        self.scan(text, 0, &mut found);

        let code = code_ranges(text);
        found.retain(|r| !code.iter().any(|range| range.contains(&r.span.start)));
        found.sort_by_key(|r| r.span.start);
        found
    }

    fn scan<'a>(&self, text: &'a str, offset: usize, found: &mut Vec<LinkReference<'a>>) {
        for cap in self.pattern.captures_iter(&text[offset..]) {
            let (Some(label), Some(target)) = (cap.get(2), cap.get(3)) else {
                continue;
            };
            let kind = match cap.get(1) {
                Some(bang) if !bang.as_str().is_empty() => LinkKind::Image,
                _ => LinkKind::Link,
            };

            found.push(LinkReference {
                kind,
                text: label.as_str(),
                target: target.as_str(),
                title: cap.get(4).map(|m| m.as_str()),
                span: offset + target.start()..offset + target.end(),
            });

            // Badge images nested inside a link label
            if kind == LinkKind::Link && label.as_str().contains('[') {
                let label_start = offset + label.start();
                let label_text = &text[..offset + label.end()];
                self.scan(label_text, label_start, found);
            }
        }
    }

    /// Rewrite every internal reference in `text`.
    ///
    /// `document` is the path of the Markdown file relative to the
    /// repository root. External and unresolvable targets are left as-is.
    pub fn rewrite(&self, text: &str, document: &Path) -> RewriteOutcome {
        let mut output = String::with_capacity(text.len());
        let mut last = 0;
        let mut rewritten = 0;

        for reference in self.references(text) {
            let is_image = reference.kind == LinkKind::Image;
            let Resolution::Internal(target) = resolve(reference.target, document, is_image)
            else {
                continue;
            };

            output.push_str(&text[last..reference.span.start]);
            output.push_str(&target.url(&self.repo_url, &self.branch));
            last = reference.span.end;
            rewritten += 1;
        }

        if rewritten == 0 {
            return RewriteOutcome {
                text: text.to_string(),
                changed: false,
                rewritten,
            };
        }

        output.push_str(&text[last..]);
        RewriteOutcome {
            changed: output != text,
            text: output,
            rewritten,
        }
    }
}

/// One-shot rewrite of a single document
pub fn rewrite_links(
    text: &str,
    document: &Path,
    repo_url: &str,
    branch: &str,
) -> Result<RewriteOutcome, RelinkError> {
    Ok(LinkRewriter::new(repo_url, branch)?.rewrite(text, document))
}

/// Byte ranges of fenced code blocks and inline code spans.
///
/// An unclosed fence runs to the end of the document; an unmatched
/// backtick run is literal text.
fn code_ranges(text: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut open_fence: Option<(char, usize, usize)> = None;
    let mut prose_start = 0;
    let mut pos = 0;

    for line in text.split_inclusive('\n') {
        let line_start = pos;
        pos += line.len();

        let Some((marker, run, info)) = fence_marker(line) else {
            continue;
        };
        match open_fence {
            None => {
                inline_code_ranges(text, prose_start..line_start, &mut ranges);
                open_fence = Some((marker, run, line_start));
            }
            Some((open, len, start)) if marker == open && run >= len && info.trim().is_empty() => {
                ranges.push(start..pos);
                open_fence = None;
                prose_start = pos;
            }
            Some(_) => {}
        }
    }

    match open_fence {
        Some((_, _, start)) => ranges.push(start..text.len()),
        None => inline_code_ranges(text, prose_start..text.len(), &mut ranges),
    }
    ranges
}

/// Fence character, run length and the rest of the line for a line that
/// opens or closes a fenced code block (up to three spaces of indent).
fn fence_marker(line: &str) -> Option<(char, usize, &str)> {
    let trimmed = line.trim_start_matches(' ');
    if line.len() - trimmed.len() > 3 {
        return None;
    }
    let marker = trimmed.chars().next().filter(|c| matches!(c, '`' | '~'))?;
    let run = trimmed.chars().take_while(|&c| c == marker).count();
    (run >= 3).then(|| (marker, run, &trimmed[run..]))
}

fn inline_code_ranges(text: &str, within: Range<usize>, ranges: &mut Vec<Range<usize>>) {
    let bytes = text.as_bytes();
    let backtick_run = |from: usize| {
        let mut end = from;
        while end < within.end && bytes[end] == b'`' {
            end += 1;
        }
        end
    };

    let mut i = within.start;
    while i < within.end {
        if bytes[i] != b'`' {
            i += 1;
            continue;
        }
        let open_start = i;
        i = backtick_run(i);
        let len = i - open_start;

        // Closing run must have exactly the same length
        let mut j = i;
        while j < within.end {
            if bytes[j] != b'`' {
                j += 1;
                continue;
            }
            let run_start = j;
            j = backtick_run(j);
            if j - run_start == len {
                ranges.push(open_start..j);
                i = j;
                break;
            }
        }
    }
}

fn validate_repo_url(repo_url: &str) -> Result<String, RelinkError> {
    let trimmed = repo_url.trim().trim_end_matches('/');
    let invalid = |reason: String| RelinkError::InvalidRepoUrl {
        url: repo_url.to_string(),
        reason,
    };

    let parsed = url::Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())));
    }
    if parsed.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPO: &str = "https://github.com/acme/verve";

    fn rewriter() -> LinkRewriter {
        LinkRewriter::new(REPO, "main").unwrap()
    }

    #[test]
    fn test_external_links_untouched() {
        let content = r#"
See [site](https://example.com), [old](http://example.org/a.md),
[mail](mailto:dev@example.com), [anchor](#usage) and [api](xref:Verve.Core).
![inline](data:image/png;base64,iVBORw0KGgo=)
        "#;

        let outcome = rewriter().rewrite(content, Path::new("docs/index.md"));
        assert!(!outcome.changed);
        assert_eq!(outcome.rewritten, 0);
        assert_eq!(outcome.text, content);
    }

    #[test]
    fn test_parent_relative_link() {
        let outcome = rewriter().rewrite(
            "![Diagram](../images/diagram.png)",
            Path::new("docs/guides/setup.md"),
        );
        assert!(outcome.changed);
        assert_eq!(
            outcome.text,
            "![Diagram](https://github.com/acme/verve/blob/main/docs/images/diagram.png)"
        );
    }

    #[test]
    fn test_directory_link_uses_tree() {
        let outcome = rewriter().rewrite("[API](./api/)", Path::new("docs/index.md"));
        assert_eq!(outcome.text, "[API](https://github.com/acme/verve/tree/main/api/)");
    }

    #[test]
    fn test_bare_filename() {
        let outcome = rewriter().rewrite("[Changes](CHANGELOG.md)", Path::new("docs/index.md"));
        assert_eq!(
            outcome.text,
            "[Changes](https://github.com/acme/verve/blob/main/docs/CHANGELOG.md)"
        );
    }

    #[test]
    fn test_image_without_extension_is_blob() {
        let outcome = rewriter().rewrite("![logo](./img/logo)", Path::new("docs/index.md"));
        assert_eq!(outcome.text, "![logo](https://github.com/acme/verve/blob/main/img/logo)");

        let outcome = rewriter().rewrite("![logo](./img/logo.png)", Path::new("docs/index.md"));
        assert_eq!(
            outcome.text,
            "![logo](https://github.com/acme/verve/blob/main/img/logo.png)"
        );
    }

    #[test]
    fn test_title_and_surroundings_preserved() {
        let content = "Intro [Guide](./guide.md \"The guide\") outro.\n";
        let outcome = rewriter().rewrite(content, Path::new("docs/index.md"));
        assert_eq!(
            outcome.text,
            "Intro [Guide](https://github.com/acme/verve/blob/main/guide.md \"The guide\") outro.\n"
        );
    }

    #[test]
    fn test_unresolvable_link_preserved() {
        let content = "[escape](../../../etc/passwd) and [ok](/README.md)";
        let outcome = rewriter().rewrite(content, Path::new("docs/index.md"));
        assert_eq!(outcome.rewritten, 1);
        assert_eq!(
            outcome.text,
            "[escape](../../../etc/passwd) and [ok](https://github.com/acme/verve/blob/main/README.md)"
        );
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let content = "[a](./a.md) ![b](../b.png) [c](src/) [d](https://x.y)";
        let once = rewriter().rewrite(content, Path::new("docs/index.md"));
        let twice = rewriter().rewrite(&once.text, Path::new("docs/index.md"));
        assert!(once.changed);
        assert!(!twice.changed);
        assert_eq!(twice.text, once.text);
    }

    #[test]
    fn test_badge_inside_link() {
        let content = "[![build](./ci/badge.svg)](./ci/)";
        let rw = rewriter();

        let refs = rw.references(content);
        // Ordered by target position: the nested image target comes first
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].kind, LinkKind::Image);
        assert_eq!(refs[0].target, "./ci/badge.svg");
        assert_eq!(refs[1].kind, LinkKind::Link);
        assert_eq!(refs[1].text, "![build](./ci/badge.svg)");

        let outcome = rw.rewrite(content, Path::new("docs/index.md"));
        assert_eq!(outcome.rewritten, 2);
        assert_eq!(
            outcome.text,
            "[![build](https://github.com/acme/verve/blob/main/ci/badge.svg)](https://github.com/acme/verve/tree/main/ci/)"
        );
    }

    #[test]
    fn test_references_are_parsed_once() {
        let content = "![alt](a.png) and [text](b.md \"title\")";
        let refs = rewriter().references(content);

        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].kind, LinkKind::Image);
        assert_eq!(refs[0].text, "alt");
        assert_eq!(&content[refs[0].span.clone()], "a.png");
        assert_eq!(refs[1].kind, LinkKind::Link);
        assert_eq!(refs[1].target, "b.md");
        assert_eq!(refs[1].title, Some(" \"title\""));
    }

    #[test]
    fn test_balanced_parens_in_target() {
        let outcome = rewriter().rewrite("[p](foo(1).md)", Path::new("docs/index.md"));
        assert_eq!(
            outcome.text,
            "[p](https://github.com/acme/verve/blob/main/docs/foo(1).md)"
        );

        let content = "[wiki](https://en.wikipedia.org/wiki/Rust_(language))";
        let outcome = rewriter().rewrite(content, Path::new("docs/index.md"));
        assert!(!outcome.changed);
    }

    #[test]
    fn test_inline_code_untouched() {
        let content = "Write `[ex](./foo.md)` or ``a ` [b](b.md)`` but [real](./foo.md).\n";
        let outcome = rewriter().rewrite(content, Path::new("docs/index.md"));
        assert_eq!(outcome.rewritten, 1);
        assert_eq!(
            outcome.text,
            "Write `[ex](./foo.md)` or ``a ` [b](b.md)`` but [real](https://github.com/acme/verve/blob/main/foo.md).\n"
        );
    }

    #[test]
    fn test_fenced_code_untouched() {
        let content = "\
[before](a.md)

````markdown
[ex](./foo.md)
```
[still code](b.md)
````

~~~
![img](x.png)
~~~
[after](c.md)
";
        let outcome = rewriter().rewrite(content, Path::new("docs/index.md"));
        assert_eq!(outcome.rewritten, 2);
        assert!(outcome.text.contains("[before](https://github.com/acme/verve/blob/main/docs/a.md)"));
        assert!(outcome.text.contains("[ex](./foo.md)"));
        assert!(outcome.text.contains("[still code](b.md)"));
        assert!(outcome.text.contains("![img](x.png)"));
        assert!(outcome.text.contains("[after](https://github.com/acme/verve/blob/main/docs/c.md)"));
    }

    #[test]
    fn test_unclosed_fence_and_stray_backtick() {
        let content = "A lone ` backtick [a](a.md)\n```\n[b](b.md)\n";
        let outcome = rewriter().rewrite(content, Path::new("docs/index.md"));
        assert_eq!(outcome.rewritten, 1);
        assert!(outcome.text.contains("[a](https://github.com/acme/verve/blob/main/docs/a.md)"));
        assert!(outcome.text.ends_with("```\n[b](b.md)\n"));
    }

    #[test]
    fn test_empty_alt_text_image() {
        let outcome = rewriter().rewrite("![](shot.png)", Path::new("docs/index.md"));
        assert_eq!(
            outcome.text,
            "![](https://github.com/acme/verve/blob/main/docs/shot.png)"
        );
    }

    #[test]
    fn test_no_links_no_change() {
        let outcome = rewriter().rewrite("# Title\n\nPlain [text] only.\n", Path::new("a.md"));
        assert!(!outcome.changed);
        assert_eq!(outcome.text, "# Title\n\nPlain [text] only.\n");
    }

    #[test]
    fn test_repo_url_validation() {
        let rw = LinkRewriter::new("https://github.com/acme/verve/", "main").unwrap();
        assert_eq!(rw.repo_url(), REPO);
        assert_eq!(rw.branch(), "main");

        assert!(matches!(
            LinkRewriter::new("github.com/acme/verve", "main"),
            Err(RelinkError::InvalidRepoUrl { .. })
        ));
        assert!(matches!(
            LinkRewriter::new("ftp://example.com/repo", "main"),
            Err(RelinkError::InvalidRepoUrl { .. })
        ));
        assert!(matches!(
            LinkRewriter::new(REPO, "  "),
            Err(RelinkError::EmptyBranch)
        ));
    }

    #[test]
    fn test_rewrite_links_helper() {
        let outcome = rewrite_links(
            "[setup](guides/setup.md)",
            Path::new("docs/index.md"),
            REPO,
            "release/1.0",
        )
        .unwrap();
        assert_eq!(
            outcome.text,
            "[setup](https://github.com/acme/verve/blob/release/1.0/docs/guides/setup.md)"
        );
    }
}
