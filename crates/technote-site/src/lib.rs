//! Static HTML site generation for technote documents.
//!
//! [`StaticSiteBuilder`] scans a source directory for Markdown documents,
//! renders them with citations resolved against the Bibliography Data Set and
//! writes a self-contained site: one page per document, an `index.html`
//! listing documents and sections, and a shared stylesheet.

mod builder;
mod document;
mod error;
mod lint;
mod scanner;
mod template;

pub use builder::{Site, SiteConfig, SiteReport, StaticSiteBuilder};
pub use document::Document;
pub use error::{DocumentProblem, SiteError};
