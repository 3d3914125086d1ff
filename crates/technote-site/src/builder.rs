//! Static site builder.

use std::fs;
use std::path::{Path, PathBuf};

use technote_bib::{Bibliography, CitationEntry};
use technote_renderer::reference_anchor;

use crate::document::Document;
use crate::error::{DocumentProblem, SiteError, io_err};
use crate::lint;
use crate::scanner::{Scanner, SourceFile};
use crate::template::{
    IndexData, IndexEntryData, PageData, ReferenceData, STYLESHEET, STYLESHEET_NAME, TocData,
    render_index, render_page,
};

/// Configuration for static site building.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Title of the index page.
    pub title: String,
    /// Directory holding the Markdown documents.
    pub source_dir: PathBuf,
    /// Directory holding the `.bib` files.
    pub bibliography_dir: PathBuf,
    /// Glob patterns, relative to `source_dir`, of files to leave out.
    pub exclude: Vec<String>,
    /// Directories never scanned (build output, environment).
    pub skip_dirs: Vec<PathBuf>,
    /// Number sections hierarchically.
    pub numbered_sections: bool,
}

/// Documents and assets loaded from the source directory.
pub struct Site {
    /// Rendered documents, sorted by path.
    pub documents: Vec<Document>,
    assets: Vec<SourceFile>,
}

/// Summary of a successful build.
#[derive(Debug, PartialEq, Eq)]
pub struct SiteReport {
    pub documents: usize,
    pub assets: usize,
}

/// Builds a static HTML site from Markdown documents and a bibliography.
pub struct StaticSiteBuilder {
    config: SiteConfig,
}

impl StaticSiteBuilder {
    #[must_use]
    pub fn new(config: SiteConfig) -> Self {
        Self { config }
    }

    /// Scan the source directory and render every document.
    pub fn load(&self) -> Result<Site, SiteError> {
        let scanner = Scanner::new(
            self.config.source_dir.clone(),
            &self.config.exclude,
            self.config.skip_dirs.clone(),
        )?;
        let scanned = scanner.scan()?;
        let bibliography = Bibliography::load_dir(&self.config.bibliography_dir)?;

        let documents = scanned
            .documents
            .iter()
            .map(|file| {
                tracing::debug!(path = %file.rel_path, "Rendering document");
                Document::load(file, &bibliography, self.config.numbered_sections)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Site {
            documents,
            assets: scanned.assets,
        })
    }

    /// Render the site into `output_dir`, replacing its previous contents.
    ///
    /// The site is written to a hidden sibling staging directory first and
    /// swapped in once complete. Fails without touching `output_dir` when any
    /// citation does not resolve to exactly one bibliography entry or any
    /// code block include cannot be read.
    pub fn build(&self, output_dir: &Path) -> Result<SiteReport, SiteError> {
        let site = self.load()?;

        let mut unresolved = lint::citation_problems(&site.documents);
        unresolved.extend(lint::include_problems(&site.documents));
        if !unresolved.is_empty() {
            return Err(SiteError::Unresolved(unresolved));
        }
        for problem in lint::link_problems(&site.documents) {
            tracing::warn!(document = %problem.document, "{}", problem.message);
        }

        let staging = staging_dir(output_dir);
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(io_err(&staging))?;
        }
        fs::create_dir_all(&staging).map_err(io_err(&staging))?;

        self.write_site(&site, &staging)?;

        if output_dir.exists() {
            fs::remove_dir_all(output_dir).map_err(io_err(output_dir))?;
        }
        fs::rename(&staging, output_dir).map_err(io_err(output_dir))?;

        tracing::info!(
            documents = site.documents.len(),
            output = %output_dir.display(),
            "Site built"
        );
        Ok(SiteReport {
            documents: site.documents.len(),
            assets: site.assets.len(),
        })
    }

    /// Check citations, includes and cross-document links without writing
    /// anything.
    pub fn lint(&self) -> Result<Vec<DocumentProblem>, SiteError> {
        let site = self.load()?;
        let mut problems = lint::citation_problems(&site.documents);
        problems.extend(lint::include_problems(&site.documents));
        problems.extend(lint::link_problems(&site.documents));
        Ok(problems)
    }

    fn write_site(&self, site: &Site, dir: &Path) -> Result<(), SiteError> {
        write_file(&dir.join(STYLESHEET_NAME), STYLESHEET)?;

        let mut home = None;
        let mut listed = Vec::new();
        for doc in &site.documents {
            if doc.is_home() {
                home = Some(doc);
                continue;
            }
            let page = PageData {
                title: doc.title.clone(),
                site_title: self.config.title.clone(),
                html_content: doc.html.clone(),
                toc: toc_data(doc),
                references: reference_data(&doc.references),
                root_prefix: doc.root_prefix(),
                mermaid: doc.has_mermaid,
            };
            write_file(&dir.join(doc.output_path()), &render_page(&page))?;
            listed.push(IndexEntryData {
                title: doc.title.clone(),
                href: doc.output_path(),
                sections: toc_data(doc),
            });
        }

        let index = IndexData {
            title: self.config.title.clone(),
            intro_html: home.map(|doc| doc.html.clone()),
            documents: listed,
            references: home
                .map(|doc| reference_data(&doc.references))
                .unwrap_or_default(),
            mermaid: home.is_some_and(|doc| doc.has_mermaid),
        };
        write_file(&dir.join("index.html"), &render_index(&index))?;

        for asset in &site.assets {
            let target = dir.join(&asset.rel_path);
            create_parent(&target)?;
            fs::copy(&asset.path, &target).map_err(io_err(&target))?;
        }
        Ok(())
    }
}

/// Hidden sibling of `output_dir` used while building.
fn staging_dir(output_dir: &Path) -> PathBuf {
    let name = output_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    output_dir.with_file_name(format!(".{name}.staging"))
}

fn write_file(path: &Path, content: &str) -> Result<(), SiteError> {
    create_parent(path)?;
    fs::write(path, content).map_err(io_err(path))
}

fn create_parent(path: &Path) -> Result<(), SiteError> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent).map_err(io_err(parent)),
        None => Ok(()),
    }
}

fn toc_data(doc: &Document) -> Vec<TocData> {
    doc.sections
        .iter()
        .map(|s| TocData {
            level: s.level,
            number: s.number.clone(),
            title: s.title.clone(),
            id: s.id.clone(),
        })
        .collect()
}

fn reference_data(entries: &[CitationEntry]) -> Vec<ReferenceData> {
    entries
        .iter()
        .map(|e| ReferenceData {
            anchor: reference_anchor(&e.key),
            text: e.reference_text(),
            link: e.link(),
        })
        .collect()
}
