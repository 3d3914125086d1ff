//! The Bibliography Data Set: every entry from every `.bib` file in a directory.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::entry::CitationEntry;
use crate::error::BibError;
use crate::parser::parse_bibtex;

/// Outcome of looking up an in-text citation key.
#[derive(Debug, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// Exactly one entry carries the key.
    Found(&'a CitationEntry),
    /// No entry carries the key.
    Missing,
    /// More than one entry carries the key; lists the defining files.
    Ambiguous(Vec<&'a Path>),
}

struct Record {
    entry: CitationEntry,
    file: PathBuf,
}

/// Citation entries loaded from a set of BibTeX files.
///
/// Keys are matched case-insensitively. Duplicates are kept so that a citation
/// of a duplicated key can be reported instead of silently picking one.
#[derive(Default)]
pub struct Bibliography {
    records: Vec<Record>,
    index: HashMap<String, Vec<usize>>,
}

impl Bibliography {
    /// Create an empty bibliography.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.bib` file in `dir`, in file-name order.
    ///
    /// A missing directory yields an empty bibliography.
    pub fn load_dir(dir: &Path) -> Result<Self, BibError> {
        let mut bibliography = Self::new();
        if !dir.is_dir() {
            tracing::debug!(dir = %dir.display(), "No bibliography directory");
            return Ok(bibliography);
        }

        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|source| BibError::Io {
                path: dir.to_path_buf(),
                source,
            })?
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "bib"))
            .collect();
        files.sort();

        for path in files {
            let content = fs::read_to_string(&path).map_err(|source| BibError::Io {
                path: path.clone(),
                source,
            })?;
            bibliography.add_source(&path, &content)?;
        }

        tracing::debug!(
            dir = %dir.display(),
            entries = bibliography.len(),
            "Loaded bibliography"
        );
        Ok(bibliography)
    }

    /// Parse BibTeX `content` attributed to `file` and add its entries.
    pub fn add_source(&mut self, file: &Path, content: &str) -> Result<(), BibError> {
        let entries = parse_bibtex(content).map_err(|source| BibError::Parse {
            path: file.to_path_buf(),
            source,
        })?;
        for entry in entries {
            self.insert(entry, file);
        }
        Ok(())
    }

    /// Add a single entry.
    pub fn insert(&mut self, entry: CitationEntry, file: &Path) {
        let slot = self.records.len();
        self.index
            .entry(entry.key.to_lowercase())
            .or_default()
            .push(slot);
        self.records.push(Record {
            entry,
            file: file.to_path_buf(),
        });
    }

    /// Look up a citation key.
    #[must_use]
    pub fn resolve(&self, key: &str) -> Resolution<'_> {
        match self.index.get(&key.to_lowercase()).map(Vec::as_slice) {
            None | Some([]) => Resolution::Missing,
            Some([slot]) => Resolution::Found(&self.records[*slot].entry),
            Some(slots) => Resolution::Ambiguous(
                slots
                    .iter()
                    .map(|s| self.records[*s].file.as_path())
                    .collect(),
            ),
        }
    }

    /// Number of entries, duplicates included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the bibliography holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
