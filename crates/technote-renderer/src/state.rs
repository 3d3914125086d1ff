//! State tracked while walking markdown events.

use std::collections::HashMap;
use std::fmt::Write;

use pulldown_cmark::Alignment;

/// A finished fenced or indented code block.
pub(crate) struct CodeBlock {
    pub(crate) language: Option<String>,
    /// File to take the content from instead of the body.
    pub(crate) include: Option<String>,
    /// Literal body text.
    pub(crate) body: String,
}

/// Code block being collected.
#[derive(Default)]
pub(crate) struct CodeBlockState {
    /// Between the start and end events of a code block.
    active: bool,
    /// First word of the info string.
    language: Option<String>,
    /// `include` attribute of the info string.
    include: Option<String>,
    /// Text events seen so far; never escaped here.
    buffer: String,
}

impl CodeBlockState {
    pub(crate) fn start(&mut self, language: Option<String>, include: Option<String>) {
        self.active = true;
        self.language = language;
        self.include = include;
        self.buffer.clear();
    }

    pub(crate) fn end(&mut self) -> CodeBlock {
        self.active = false;
        CodeBlock {
            language: self.language.take(),
            include: self.include.take(),
            body: std::mem::take(&mut self.buffer),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn push_str(&mut self, text: &str) {
        self.buffer.push_str(text);
    }
}

/// Position inside a GFM table.
#[derive(Default)]
pub(crate) struct TableState {
    /// Cells are `<th>` rather than `<td>`.
    in_head: bool,
    /// Column alignments from the delimiter row.
    alignments: Vec<Alignment>,
    /// Column of the current cell, reset on every row.
    cell_index: usize,
}

impl TableState {
    pub(crate) fn start(&mut self, alignments: Vec<Alignment>) {
        self.alignments = alignments;
        self.in_head = false;
        self.cell_index = 0;
    }

    pub(crate) fn start_head(&mut self) {
        self.in_head = true;
        self.cell_index = 0;
    }

    pub(crate) fn end_head(&mut self) {
        self.in_head = false;
    }

    pub(crate) fn start_row(&mut self) {
        self.cell_index = 0;
    }

    pub(crate) fn next_cell(&mut self) {
        self.cell_index += 1;
    }

    pub(crate) fn is_in_head(&self) -> bool {
        self.in_head
    }

    /// Alignment style attribute for the current cell.
    pub(crate) fn current_alignment_style(&self) -> &'static str {
        match self.alignments.get(self.cell_index) {
            Some(Alignment::Left) => r#" style="text-align:left""#,
            Some(Alignment::Center) => r#" style="text-align:center""#,
            Some(Alignment::Right) => r#" style="text-align:right""#,
            Some(Alignment::None) | None => "",
        }
    }
}

/// An image with its alt text flattened to plain text.
pub(crate) struct Image {
    pub(crate) src: String,
    pub(crate) title: String,
    pub(crate) alt: String,
}

/// Image whose alt text is being collected.
///
/// Markup inside `![...]` is dropped: only text events reach the alt text.
#[derive(Default)]
pub(crate) struct ImageState {
    /// Between the start and end events of an image.
    active: bool,
    alt_text: String,
    /// Source and title of the open image.
    pending: Option<(String, String)>,
}

impl ImageState {
    pub(crate) fn start(&mut self, src: String, title: String) {
        self.active = true;
        self.alt_text.clear();
        self.pending = Some((src, title));
    }

    pub(crate) fn end(&mut self) -> Option<Image> {
        self.active = false;
        let alt = std::mem::take(&mut self.alt_text);
        self.pending
            .take()
            .map(|(src, title)| Image { src, title, alt })
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn push_str(&mut self, text: &str) {
        self.alt_text.push_str(text);
    }
}

/// A document section: an H2..H6 heading.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Section {
    /// Heading level (2-6).
    pub level: u8,
    /// Hierarchical number (`1`, `1.2`, ...) when numbering is enabled.
    pub number: Option<String>,
    /// Heading text.
    pub title: String,
    /// Anchor ID, unique within the document.
    pub id: String,
}

/// A heading ready to be written out.
pub(crate) struct CompletedHeading {
    pub(crate) level: u8,
    pub(crate) id: String,
    pub(crate) number: Option<String>,
    pub(crate) html: String,
}

/// State for tracking headings, the document title and section numbers.
///
/// The first H1 becomes the document title and is not a section. Later H1s
/// are rendered but neither numbered nor listed.
pub(crate) struct HeadingState {
    numbered: bool,
    title: Option<String>,
    current_level: Option<u8>,
    text: String,
    html: String,
    sections: Vec<Section>,
    id_counts: HashMap<String, usize>,
    /// Counters for levels 2..=6.
    counters: [usize; 5],
}

impl HeadingState {
    pub(crate) fn new(numbered: bool) -> Self {
        Self {
            numbered,
            title: None,
            current_level: None,
            text: String::new(),
            html: String::new(),
            sections: Vec::new(),
            id_counts: HashMap::from([(REFERENCES_ID.to_owned(), 1)]),
            counters: [0; 5],
        }
    }

    /// Check if we're currently inside a heading.
    pub(crate) fn is_active(&self) -> bool {
        self.current_level.is_some()
    }

    pub(crate) fn start_heading(&mut self, level: u8) {
        self.current_level = Some(level);
        self.text.clear();
        self.html.clear();
    }

    /// Complete the current heading, recording it as title or section.
    pub(crate) fn complete_heading(&mut self) -> Option<CompletedHeading> {
        let level = self.current_level.take()?;
        let text = std::mem::take(&mut self.text).trim().to_owned();
        let html = std::mem::take(&mut self.html);
        let id = self.generate_id(&text);

        if level == 1 {
            if self.title.is_none() {
                self.title = Some(text);
            }
            return Some(CompletedHeading {
                level,
                id,
                number: None,
                html,
            });
        }

        let number = self.numbered.then(|| self.next_number(level));
        self.sections.push(Section {
            level,
            number: number.clone(),
            title: text,
            id: id.clone(),
        });

        Some(CompletedHeading {
            level,
            id,
            number,
            html,
        })
    }

    /// Advance the counter for `level` and reset the deeper ones.
    fn next_number(&mut self, level: u8) -> String {
        let depth = usize::from(level.clamp(2, 6) - 2);
        self.counters[depth] += 1;
        for counter in &mut self.counters[depth + 1..] {
            *counter = 0;
        }
        self.counters[..=depth]
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }

    fn generate_id(&mut self, text: &str) -> String {
        let mut base_id = slugify(text);
        if base_id.is_empty() {
            base_id.push_str("section");
        }
        // `ref-` belongs to bibliography entries.
        if base_id.starts_with("ref-") {
            base_id.insert_str(0, "section-");
        }
        let count = self.id_counts.entry(base_id.clone()).or_default();
        let id = match *count {
            0 => base_id,
            n => format!("{base_id}-{n}"),
        };
        *count += 1;
        id
    }

    pub(crate) fn push_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub(crate) fn push_html(&mut self, html: &str) {
        self.html.push_str(html);
    }

    pub(crate) fn take_title(&mut self) -> Option<String> {
        self.title.take()
    }

    pub(crate) fn take_sections(&mut self) -> Vec<Section> {
        std::mem::take(&mut self.sections)
    }
}

/// Convert text to URL-safe slug.
///
/// Converts to lowercase, replaces whitespace/dashes/underscores with single dashes,
/// and removes other non-alphanumeric characters.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut result = String::new();
    let mut last_was_dash = true;

    for c in text.trim().chars() {
        if c.is_ascii_alphanumeric() {
            result.push(c.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash && (c.is_whitespace() || c == '-' || c == '_') {
            result.push('-');
            last_was_dash = true;
        }
    }

    if result.ends_with('-') {
        result.pop();
    }

    result
}

/// Id of the generated references section.
pub const REFERENCES_ID: &str = "references";

/// Anchor id of a bibliography entry in a page's reference list.
///
/// Lowercase ASCII letters, digits and `-` are kept. Every other byte is
/// written as `_` plus two hex digits, so distinct keys never share an id.
#[must_use]
pub fn reference_anchor(key: &str) -> String {
    let mut id = String::with_capacity(key.len() + 4);
    id.push_str("ref-");
    for byte in key.to_lowercase().bytes() {
        if byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'-' {
            id.push(char::from(byte));
        } else {
            let _ = write!(id, "_{byte:02x}");
        }
    }
    id
}

/// Escape HTML special characters.
#[must_use]
pub fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}
