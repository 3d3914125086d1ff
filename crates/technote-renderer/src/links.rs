//! Link classification and rewriting between documents.

use std::borrow::Cow;

/// Where a link in a document points.
#[derive(Debug, PartialEq, Eq)]
pub enum LinkTarget<'a> {
    /// Another site, a mail address or any URL with a scheme.
    External,
    /// An anchor in the same document (`#section`).
    Fragment(&'a str),
    /// Another Markdown document, resolved relative to the source directory.
    Document {
        path: String,
        fragment: Option<&'a str>,
    },
    /// A local non-Markdown file (image, PDF, ...).
    Asset,
}

/// Classify `url` as written in a document located in `base_dir`.
///
/// `base_dir` is the document's directory relative to the source directory,
/// using `/` separators (`""` for top-level documents). Paths escaping the
/// source directory are clamped at its root.
#[must_use]
pub fn classify_link<'a>(url: &'a str, base_dir: &str) -> LinkTarget<'a> {
    if is_external(url) {
        return LinkTarget::External;
    }
    if let Some(fragment) = url.strip_prefix('#') {
        return LinkTarget::Fragment(fragment);
    }

    let (path, fragment) = match url.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment)),
        None => (url, None),
    };
    if !is_markdown(path) {
        return LinkTarget::Asset;
    }

    let resolved = if let Some(absolute) = path.strip_prefix('/') {
        resolve_relative_path(absolute, "")
    } else {
        resolve_relative_path(path, base_dir)
    };
    LinkTarget::Document {
        path: resolved,
        fragment,
    }
}

/// Rewrite a link for the rendered site: `page.md#x` becomes `page.html#x`.
///
/// Everything that is not a local Markdown link is returned unchanged.
#[must_use]
pub fn html_href(url: &str) -> Cow<'_, str> {
    if is_external(url) || url.starts_with('#') {
        return Cow::Borrowed(url);
    }
    let (path, fragment) = match url.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment)),
        None => (url, None),
    };
    let Some(stem) = path.strip_suffix(".md") else {
        return Cow::Borrowed(url);
    };
    match fragment {
        Some(fragment) => Cow::Owned(format!("{stem}.html#{fragment}")),
        None => Cow::Owned(format!("{stem}.html")),
    }
}

fn is_external(url: &str) -> bool {
    if url.starts_with("//") {
        return true;
    }
    url.split_once(':').is_some_and(|(scheme, _)| {
        !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

#[allow(clippy::case_sensitive_file_extension_comparisons)]
fn is_markdown(path: &str) -> bool {
    path.ends_with(".md")
}

/// Resolve a relative path against a base directory.
///
/// Handles `.` (current), `..` (parent), and plain relative paths.
fn resolve_relative_path(relative: &str, base: &str) -> String {
    let mut segments: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();

    for component in relative.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            _ => segments.push(component),
        }
    }

    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_links() {
        assert_eq!(classify_link("https://lsst.io", ""), LinkTarget::External);
        assert_eq!(classify_link("mailto:a@b.c", ""), LinkTarget::External);
        assert_eq!(classify_link("//cdn.example/x.md", ""), LinkTarget::External);
    }

    #[test]
    fn test_fragment_link() {
        assert_eq!(classify_link("#intro", "guide"), LinkTarget::Fragment("intro"));
    }

    #[test]
    fn test_document_links_resolve_against_base() {
        assert_eq!(
            classify_link("setup.md#install", "guide"),
            LinkTarget::Document {
                path: "guide/setup.md".to_owned(),
                fragment: Some("install"),
            }
        );
        assert_eq!(
            classify_link("../index.md", "guide"),
            LinkTarget::Document {
                path: "index.md".to_owned(),
                fragment: None,
            }
        );
        assert_eq!(
            classify_link("/guide/setup.md", "other/deep"),
            LinkTarget::Document {
                path: "guide/setup.md".to_owned(),
                fragment: None,
            }
        );
    }

    #[test]
    fn test_asset_link() {
        assert_eq!(classify_link("figures/arch.png", ""), LinkTarget::Asset);
    }

    #[test]
    fn test_html_href() {
        assert_eq!(html_href("setup.md"), "setup.html");
        assert_eq!(html_href("../a/b.md#x"), "../a/b.html#x");
        assert_eq!(html_href("#x"), "#x");
        assert_eq!(html_href("https://x.org/readme.md"), "https://x.org/readme.md");
        assert_eq!(html_href("figure.png"), "figure.png");
    }
}
