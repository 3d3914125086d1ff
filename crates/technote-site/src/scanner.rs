//! Document discovery by filesystem walking.
//!
//! The scanner only finds files. Reading and rendering them is the builder's
//! job.

use std::fs;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};

use crate::error::{SiteError, io_err};

/// File extensions copied verbatim into the site.
const ASSET_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "gif", "svg", "pdf", "webp"];

/// A file found under the source directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SourceFile {
    /// Path relative to the source directory, `/`-separated (`guide/setup.md`).
    pub rel_path: String,
    /// Path on disk.
    pub path: PathBuf,
}

/// Files making up a site, each list sorted by relative path.
#[derive(Debug, Default)]
pub(crate) struct ScanResult {
    pub documents: Vec<SourceFile>,
    pub assets: Vec<SourceFile>,
}

/// Discovers Markdown documents and assets under a source directory.
///
/// Hidden entries, the directories in `skip_dirs` and anything matching an
/// exclude pattern are left out.
pub(crate) struct Scanner {
    source_dir: PathBuf,
    exclude: Vec<Pattern>,
    skip_dirs: Vec<PathBuf>,
}

impl Scanner {
    /// Create a scanner, compiling the exclude patterns.
    pub fn new(
        source_dir: PathBuf,
        exclude: &[String],
        skip_dirs: Vec<PathBuf>,
    ) -> Result<Self, SiteError> {
        let exclude = exclude
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|source| SiteError::Pattern {
                    pattern: p.clone(),
                    source,
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self {
            source_dir,
            exclude,
            skip_dirs,
        })
    }

    /// Walk the source directory.
    ///
    /// A missing source directory yields an empty result.
    pub fn scan(&self) -> Result<ScanResult, SiteError> {
        let mut result = ScanResult::default();
        if self.source_dir.is_dir() {
            self.scan_directory(&self.source_dir, "", &mut result)?;
        }
        result.documents.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        result.assets.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        Ok(result)
    }

    fn scan_directory(
        &self,
        dir: &Path,
        prefix: &str,
        result: &mut ScanResult,
    ) -> Result<(), SiteError> {
        for entry in fs::read_dir(dir).map_err(io_err(dir))? {
            let entry = entry.map_err(io_err(dir))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }

            let path = entry.path();
            let rel_path = if prefix.is_empty() {
                name
            } else {
                format!("{prefix}/{name}")
            };
            if self.is_excluded(&rel_path) {
                tracing::debug!(path = %rel_path, "Excluded by pattern");
                continue;
            }

            let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
            if is_dir {
                if self.skip_dirs.iter().any(|skip| *skip == path) {
                    continue;
                }
                self.scan_directory(&path, &rel_path, result)?;
            } else if has_extension(&path, &["md"]) {
                result.documents.push(SourceFile { rel_path, path });
            } else if has_extension(&path, &ASSET_EXTENSIONS) {
                result.assets.push(SourceFile { rel_path, path });
            }
        }
        Ok(())
    }

    fn is_excluded(&self, rel_path: &str) -> bool {
        let options = MatchOptions {
            require_literal_separator: true,
            ..MatchOptions::default()
        };
        self.exclude
            .iter()
            .any(|p| p.matches_with(rel_path, options))
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
}
