//! Markdown renderer for technote documents.
//!
//! [`MarkdownRenderer`] turns one Markdown document into an HTML fragment and
//! collects what the site builder needs around it: the title, the numbered
//! sections, the cited bibliography entries and the outgoing links.
//!
//! In-text citations use the `[@key]` / `[@key1; @key2]` syntax and are
//! resolved against a [`Bibliography`](technote_bib::Bibliography) while
//! rendering. Fenced code blocks may take their content from a file through
//! an [`IncludeContext`], and `mermaid` blocks are left for the Mermaid
//! script to draw.
//!
//! # Example
//!
//! ```
//! use technote_bib::Bibliography;
//! use technote_renderer::MarkdownRenderer;
//!
//! let bibliography = Bibliography::new();
//! let result = MarkdownRenderer::new(&bibliography)
//!     .with_numbered_sections(true)
//!     .render_markdown("# Note\n\n## Motivation\n\nText.");
//!
//! assert_eq!(result.title.as_deref(), Some("Note"));
//! assert_eq!(result.sections[0].number.as_deref(), Some("1"));
//! ```

mod citation;
mod include;
mod links;
mod renderer;
mod state;

pub use citation::{CitationProblem, citation_keys};
pub use include::{IncludeContext, IncludeProblem};
pub use links::{LinkTarget, classify_link, html_href};
pub use renderer::{MERMAID_LANGUAGE, MarkdownRenderer, RenderResult};
pub use state::{REFERENCES_ID, Section, escape_html, reference_anchor, slugify};
