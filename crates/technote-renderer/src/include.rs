//! Code blocks filled from files.
//!
//! A fenced code block whose info string carries an `include` attribute takes
//! its content from a file instead of its body:
//!
//! ````markdown
//! ```python {include="example-code/interface.py"}
//! ```
//! ````
//!
//! The path is relative to the directory of the including document.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// File access for code block includes.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use technote_renderer::IncludeContext;
///
/// let ctx = IncludeContext {
///     base_dir: Path::new("docs/guide"),
///     read_file: &|path| std::fs::read_to_string(path),
/// };
///
/// assert_eq!(ctx.resolve_path("code/main.rs"), Path::new("docs/guide/code/main.rs"));
/// ```
#[derive(Clone, Copy)]
pub struct IncludeContext<'a> {
    /// Directory of the document being rendered.
    pub base_dir: &'a Path,
    /// Callback reading a file from the file system.
    pub read_file: &'a dyn Fn(&Path) -> io::Result<String>,
}

impl IncludeContext<'_> {
    /// Resolve an include path against the document directory.
    #[must_use]
    pub fn resolve_path(&self, relative: &str) -> PathBuf {
        self.base_dir.join(relative)
    }

    /// Read the file at `relative`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn read(&self, relative: &str) -> io::Result<String> {
        (self.read_file)(&self.resolve_path(relative))
    }
}

/// An include that could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeProblem {
    /// Include path as written.
    pub path: String,
    pub reason: String,
}

impl fmt::Display for IncludeProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot include '{}': {}", self.path, self.reason)
    }
}

/// Parsed info string of a fenced code block.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct FenceInfo {
    pub(crate) language: Option<String>,
    pub(crate) include: Option<String>,
}

/// Split a fence info string into its language and `{...}` attributes.
pub(crate) fn parse_fence_info(info: &str) -> FenceInfo {
    let (head, attrs) = match info.find('{') {
        Some(start) => {
            let rest = &info[start + 1..];
            let end = rest.rfind('}').unwrap_or(rest.len());
            (&info[..start], &rest[..end])
        }
        None => (info, ""),
    };

    FenceInfo {
        language: head.split_whitespace().next().map(str::to_owned),
        include: attribute(attrs, "include"),
    }
}

/// Value of `key=value` or `key="value"` in an attribute list.
fn attribute(attrs: &str, key: &str) -> Option<String> {
    let mut rest = attrs.trim_start();
    while !rest.is_empty() {
        let name_end = rest
            .find(|c: char| c == '=' || c.is_whitespace())
            .unwrap_or(rest.len());
        let name = &rest[..name_end];
        rest = &rest[name_end..];

        let value = if let Some(after_eq) = rest.strip_prefix('=') {
            let (value, remaining) = match after_eq.strip_prefix('"') {
                Some(quoted) => {
                    let end = quoted.find('"').unwrap_or(quoted.len());
                    (&quoted[..end], quoted.get(end + 1..).unwrap_or(""))
                }
                None => {
                    let end = after_eq.find(char::is_whitespace).unwrap_or(after_eq.len());
                    (&after_eq[..end], &after_eq[end..])
                }
            };
            rest = remaining;
            Some(value)
        } else {
            None
        };

        if name == key {
            return value.filter(|v| !v.is_empty()).map(str::to_owned);
        }
        rest = rest.trim_start();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_language() {
        assert_eq!(
            parse_fence_info("rust"),
            FenceInfo {
                language: Some("rust".to_owned()),
                include: None,
            }
        );
        assert_eq!(parse_fence_info(""), FenceInfo::default());
    }

    #[test]
    fn test_include_attribute() {
        let info = parse_fence_info(r#"python {include="example-code/interface.py"}"#);
        assert_eq!(info.language.as_deref(), Some("python"));
        assert_eq!(info.include.as_deref(), Some("example-code/interface.py"));

        let info = parse_fence_info("{.numbered include=code/main.rs}");
        assert_eq!(info.language, None);
        assert_eq!(info.include.as_deref(), Some("code/main.rs"));
    }

    #[test]
    fn test_other_attributes_are_ignored() {
        let info = parse_fence_info(r#"text {title="include" linenos}"#);
        assert_eq!(info.include, None);
        assert_eq!(parse_fence_info("sh {include=}").include, None);
    }

    #[test]
    fn test_resolve_against_document_dir() {
        let ctx = IncludeContext {
            base_dir: Path::new("/src/guide"),
            read_file: &|path| Ok(path.display().to_string()),
        };
        assert_eq!(ctx.read("../code/a.py").unwrap(), "/src/guide/../code/a.py");
    }

    #[test]
    fn test_problem_message() {
        let problem = IncludeProblem {
            path: "code/a.py".to_owned(),
            reason: "not found".to_owned(),
        };
        assert_eq!(problem.to_string(), "cannot include 'code/a.py': not found");
    }
}
