//! Bibliography handling for technote builds.
//!
//! Loads the Bibliography Data Set (every `.bib` file in a directory), resolves
//! in-text citation keys against it, and regenerates it from upstream sources.

mod bibliography;
mod entry;
mod error;
mod parser;
mod refresh;

pub use bibliography::{Bibliography, Resolution};
pub use entry::{CitationEntry, clean_latex};
pub use error::{BibError, FetchError};
pub use parser::{ParseError, parse_bibtex};
pub use refresh::{Fetch, HttpFetcher, RefreshReport, Source, refresh_bibliography};
