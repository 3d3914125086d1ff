//! Citation entries and their display forms.

use std::collections::BTreeMap;

/// A keyed bibliographic record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationEntry {
    /// Citation key as written in the source (`smith2020`).
    pub key: String,
    /// Lowercased entry type (`article`, `book`, `misc`, ...).
    pub entry_type: String,
    /// Lowercased field names mapped to raw (brace-preserving) values.
    pub fields: BTreeMap<String, String>,
}

impl CitationEntry {
    /// Create an entry from parsed parts.
    #[must_use]
    pub fn new(key: String, entry_type: String, fields: BTreeMap<String, String>) -> Self {
        Self {
            key,
            entry_type,
            fields,
        }
    }

    /// Raw value of a field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Title with `LaTeX` markup removed.
    #[must_use]
    pub fn title(&self) -> Option<String> {
        self.field("title").map(clean_latex)
    }

    /// Publication year.
    #[must_use]
    pub fn year(&self) -> Option<&str> {
        self.field("year")
    }

    /// Author names (or editors when there are no authors), cleaned for display.
    #[must_use]
    pub fn authors(&self) -> Vec<String> {
        self.field("author")
            .or_else(|| self.field("editor"))
            .map(|raw| split_names(raw).iter().map(|n| clean_latex(n)).collect())
            .unwrap_or_default()
    }

    /// Short in-text label: `Smith 2020`, `Smith & Doe 2020`, `Smith et al. 2020`.
    ///
    /// Falls back to the citation key when the entry has no authors.
    #[must_use]
    pub fn label(&self) -> String {
        let names = self
            .field("author")
            .or_else(|| self.field("editor"))
            .map(split_names)
            .unwrap_or_default();
        let surnames: Vec<String> = names.iter().map(|n| surname(n)).collect();

        let who = match surnames.as_slice() {
            [] => return self.key.clone(),
            [one] => one.clone(),
            [first, second] => format!("{first} & {second}"),
            [first, ..] => format!("{first} et al."),
        };
        format!("{who} {}", self.year().unwrap_or("n.d."))
    }

    /// Where the work appeared: journal, book, publisher or institution.
    #[must_use]
    pub fn venue(&self) -> Option<String> {
        ["journal", "booktitle", "publisher", "institution", "howpublished"]
            .iter()
            .find_map(|f| self.field(f))
            .map(clean_latex)
    }

    /// Link target: DOI resolver when a DOI is present, otherwise the URL field.
    #[must_use]
    pub fn link(&self) -> Option<String> {
        if let Some(doi) = self.field("doi") {
            return Some(format!("https://doi.org/{}", doi.trim()));
        }
        self.field("url").map(|u| u.trim().to_owned())
    }

    /// Plain-text reference line: `Authors (Year). Title. Venue.`
    #[must_use]
    pub fn reference_text(&self) -> String {
        let mut parts = Vec::new();

        let authors = self.authors();
        let year = self.year().unwrap_or("n.d.");
        if authors.is_empty() {
            parts.push(format!("({year})"));
        } else {
            parts.push(format!("{} ({year})", authors.join(", ")));
        }
        if let Some(title) = self.title() {
            parts.push(title);
        }
        if let Some(venue) = self.venue() {
            parts.push(venue);
        }

        let mut text = parts.join(". ");
        if !text.ends_with('.') {
            text.push('.');
        }
        text
    }
}

/// Split a BibTeX name list on ` and ` at brace depth zero.
fn split_names(raw: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let bytes = raw.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b if depth == 0 && b.is_ascii_whitespace() => {
                let rest = &raw[i + 1..];
                if rest.len() > 4
                    && rest.as_bytes()[..3].eq_ignore_ascii_case(b"and")
                    && rest.as_bytes()[3].is_ascii_whitespace()
                {
                    names.push(raw[start..i].trim());
                    i += 5;
                    start = i;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }
    names.push(raw[start..].trim());
    names.retain(|n| !n.is_empty());
    names
}

/// Surname of a single BibTeX name (`Last, First` or `First Last`).
///
/// A fully braced name (`{LSST Science Collaboration}`) is kept whole.
fn surname(name: &str) -> String {
    let name = name.trim();
    if name.starts_with('{') && name.ends_with('}') {
        return clean_latex(name);
    }
    if let Some((last, _)) = name.split_once(',') {
        return clean_latex(last);
    }
    clean_latex(name.rsplit(' ').next().unwrap_or(name))
}

/// Strip common `LaTeX` markup from a field value for display.
#[must_use]
pub fn clean_latex(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' | '}' => {}
            '~' => out.push(' '),
            '\\' => match chars.peek() {
                Some(&next) if matches!(next, '&' | '%' | '_' | '$' | '#' | '{' | '}') => {
                    out.push(next);
                    chars.next();
                }
                _ => out.push(c),
            },
            _ => out.push(c),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
