//! Documents rendered from the source directory.

use std::fs;
use std::path::Path;

use technote_bib::{Bibliography, CitationEntry};
use technote_renderer::{
    CitationProblem, IncludeContext, IncludeProblem, MarkdownRenderer, Section,
};

use crate::error::{SiteError, io_err};
use crate::scanner::SourceFile;

/// A rendered Markdown document.
#[derive(Debug, Clone)]
pub struct Document {
    /// Path relative to the source directory (`guide/setup.md`).
    pub path: String,
    /// First H1 heading, or the file stem when there is none.
    pub title: String,
    /// Rendered HTML body.
    pub html: String,
    pub sections: Vec<Section>,
    /// Heading ids, title included.
    pub anchors: Vec<String>,
    pub references: Vec<CitationEntry>,
    pub citation_problems: Vec<CitationProblem>,
    /// Link destinations as written in the source.
    pub links: Vec<String>,
    pub include_problems: Vec<IncludeProblem>,
    /// The page needs the Mermaid script.
    pub has_mermaid: bool,
}

impl Document {
    /// Read and render a document.
    pub(crate) fn load(
        file: &SourceFile,
        bibliography: &Bibliography,
        numbered_sections: bool,
    ) -> Result<Self, SiteError> {
        let markdown = fs::read_to_string(&file.path).map_err(io_err(&file.path))?;
        let includes = IncludeContext {
            base_dir: file.path.parent().unwrap_or(Path::new("")),
            read_file: &|path| fs::read_to_string(path),
        };
        Ok(Self::render_with(
            &file.rel_path,
            &markdown,
            bibliography,
            numbered_sections,
            Some(includes),
        ))
    }

    /// Render `markdown` as the document at `path`, without file includes.
    pub fn render(
        path: &str,
        markdown: &str,
        bibliography: &Bibliography,
        numbered_sections: bool,
    ) -> Self {
        Self::render_with(path, markdown, bibliography, numbered_sections, None)
    }

    fn render_with(
        path: &str,
        markdown: &str,
        bibliography: &Bibliography,
        numbered_sections: bool,
        includes: Option<IncludeContext<'_>>,
    ) -> Self {
        let mut renderer =
            MarkdownRenderer::new(bibliography).with_numbered_sections(numbered_sections);
        if let Some(includes) = includes {
            renderer = renderer.with_includes(includes);
        }
        let result = renderer.render_markdown(markdown);

        let title = result.title.unwrap_or_else(|| {
            Path::new(path)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

        Self {
            path: path.to_owned(),
            title,
            html: result.html,
            sections: result.sections,
            anchors: result.anchors,
            references: result.references,
            citation_problems: result.citation_problems,
            links: result.links,
            include_problems: result.include_problems,
            has_mermaid: result.has_mermaid,
        }
    }

    /// Output path of the rendered page (`guide/setup.html`).
    #[must_use]
    pub fn output_path(&self) -> String {
        let stem = self.path.strip_suffix(".md").unwrap_or(&self.path);
        format!("{stem}.html")
    }

    /// Directory of the document relative to the source directory (`guide`).
    #[must_use]
    pub fn base_dir(&self) -> &str {
        self.path.rsplit_once('/').map_or("", |(dir, _)| dir)
    }

    /// Relative prefix from the page back to the site root (`../`).
    #[must_use]
    pub fn root_prefix(&self) -> String {
        "../".repeat(self.path.matches('/').count())
    }

    /// Whether this is the top-level `index.md`, rendered into the site index.
    #[must_use]
    pub fn is_home(&self) -> bool {
        self.path == "index.md"
    }
}
