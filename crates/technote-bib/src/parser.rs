//! BibTeX parser.
//!
//! Handles the subset of BibTeX found in shared bibliography files:
//!
//! - regular entries with `{...}` or `(...)` delimiters
//! - braced, quoted, numeric and macro field values, concatenated with `#`
//! - `@string` macro definitions and the standard month macros
//! - `@comment` and `@preamble` blocks (skipped)
//!
//! Text outside of `@` blocks is ignored, as BibTeX itself does.

use std::collections::{BTreeMap, HashMap};

use crate::entry::CitationEntry;

/// Error produced while parsing BibTeX source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    /// 1-based line of the offending input.
    pub line: usize,
    /// Description of what went wrong.
    pub message: String,
}

/// Parse BibTeX source into citation entries, in source order.
///
/// Duplicate keys are returned as-is; uniqueness is checked by
/// [`Bibliography`](crate::Bibliography) at lookup time.
pub fn parse_bibtex(source: &str) -> Result<Vec<CitationEntry>, ParseError> {
    BibParser::new(source).run()
}

const MONTHS: [(&str, &str); 12] = [
    ("jan", "January"),
    ("feb", "February"),
    ("mar", "March"),
    ("apr", "April"),
    ("may", "May"),
    ("jun", "June"),
    ("jul", "July"),
    ("aug", "August"),
    ("sep", "September"),
    ("oct", "October"),
    ("nov", "November"),
    ("dec", "December"),
];

struct BibParser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    macros: HashMap<String, String>,
}

impl<'a> BibParser<'a> {
    fn new(src: &'a str) -> Self {
        let macros = MONTHS
            .iter()
            .map(|(abbr, name)| ((*abbr).to_owned(), (*name).to_owned()))
            .collect();
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            macros,
        }
    }

    fn run(mut self) -> Result<Vec<CitationEntry>, ParseError> {
        let mut entries = Vec::new();

        while let Some(offset) = self.bytes[self.pos..].iter().position(|&b| b == b'@') {
            let start = self.pos + offset;
            self.pos = start + 1;
            self.skip_ws();

            let entry_type = self.identifier().to_ascii_lowercase();
            if entry_type.is_empty() {
                return Err(self.error("expected entry type after '@'"));
            }
            self.skip_ws();

            let close = match self.peek() {
                Some(b'{') => b'}',
                Some(b'(') => b')',
                _ => {
                    return Err(self.error(format!("expected '{{' or '(' after @{entry_type}")));
                }
            };
            self.pos += 1;

            match entry_type.as_str() {
                "comment" => self.skip_comment(close, start)?,
                "preamble" => {
                    self.skip_ws();
                    self.value()?;
                    self.skip_ws();
                    self.expect(close)?;
                }
                "string" => self.string_macro(close)?,
                _ => entries.push(self.entry(entry_type, close, start)?),
            }
        }

        Ok(entries)
    }

    fn entry(
        &mut self,
        entry_type: String,
        close: u8,
        start: usize,
    ) -> Result<CitationEntry, ParseError> {
        self.skip_ws();
        let key_start = self.pos;
        while let Some(b) = self.peek() {
            if b == b',' || b == close || b == b'}' || b.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }
        let key = self.src[key_start..self.pos].to_owned();
        if key.is_empty() {
            return Err(self.error(format!("@{entry_type} entry is missing a citation key")));
        }

        let mut fields = BTreeMap::new();
        self.skip_ws();
        match self.peek() {
            Some(b) if b == close => {
                self.pos += 1;
                return Ok(CitationEntry::new(key, entry_type, fields));
            }
            Some(b',') => self.pos += 1,
            None => return Err(self.error_at(start, format!("unterminated entry {key}"))),
            Some(_) => return Err(self.error(format!("expected ',' after key {key}"))),
        }

        loop {
            self.skip_ws();
            match self.peek() {
                Some(b) if b == close => {
                    self.pos += 1;
                    break;
                }
                None => return Err(self.error_at(start, format!("unterminated entry {key}"))),
                Some(_) => {}
            }

            let name = self.identifier().to_ascii_lowercase();
            if name.is_empty() {
                return Err(self.error(format!("expected field name in entry {key}")));
            }
            self.skip_ws();
            self.expect(b'=')?;
            let value = self.value()?;
            fields.insert(name, value);

            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b) if b == close => {
                    self.pos += 1;
                    break;
                }
                None => return Err(self.error_at(start, format!("unterminated entry {key}"))),
                Some(_) => {
                    return Err(self.error(format!("expected ',' between fields in entry {key}")));
                }
            }
        }

        Ok(CitationEntry::new(key, entry_type, fields))
    }

    fn string_macro(&mut self, close: u8) -> Result<(), ParseError> {
        self.skip_ws();
        let name = self.identifier().to_ascii_lowercase();
        if name.is_empty() {
            return Err(self.error("expected macro name in @string"));
        }
        self.skip_ws();
        self.expect(b'=')?;
        let value = self.value()?;
        self.skip_ws();
        self.expect(close)?;
        self.macros.insert(name, value);
        Ok(())
    }

    fn skip_comment(&mut self, close: u8, start: usize) -> Result<(), ParseError> {
        let mut depth = 1usize;
        while let Some(b) = self.peek() {
            self.pos += 1;
            if close == b'}' && b == b'{' {
                depth += 1;
            } else if b == close {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
        }
        Err(self.error_at(start, "unterminated @comment"))
    }

    /// Parse a possibly `#`-concatenated field value.
    fn value(&mut self) -> Result<String, ParseError> {
        let mut out = String::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b'{') => {
                    self.pos += 1;
                    out.push_str(self.delimited(None)?);
                }
                Some(b'"') => {
                    self.pos += 1;
                    out.push_str(self.delimited(Some(b'"'))?);
                }
                Some(b) if b.is_ascii_digit() => {
                    let start = self.pos;
                    while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                        self.pos += 1;
                    }
                    out.push_str(&self.src[start..self.pos]);
                }
                Some(b) if b.is_ascii_alphabetic() => {
                    let name = self.identifier().to_ascii_lowercase();
                    let expansion = self
                        .macros
                        .get(&name)
                        .ok_or_else(|| self.error(format!("undefined macro {name}")))?;
                    out.push_str(expansion);
                }
                _ => return Err(self.error("expected field value")),
            }

            self.skip_ws();
            if self.peek() == Some(b'#') {
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(collapse_whitespace(&out))
    }

    /// Read up to the matching `}` (when `quote` is None) or an unbraced `"`.
    ///
    /// The cursor must sit just past the opening delimiter.
    fn delimited(&mut self, quote: Option<u8>) -> Result<&'a str, ParseError> {
        let src = self.src;
        let open = self.pos - 1;
        let start = self.pos;
        let mut depth = usize::from(quote.is_none());
        while let Some(b) = self.peek() {
            match b {
                b'{' => depth += 1,
                b'}' if depth > 0 => {
                    depth -= 1;
                    if depth == 0 && quote.is_none() {
                        let value = &src[start..self.pos];
                        self.pos += 1;
                        return Ok(value);
                    }
                }
                b'}' => return Err(self.error("unbalanced '}' in quoted value")),
                _ if Some(b) == quote && depth == 0 => {
                    let value = &src[start..self.pos];
                    self.pos += 1;
                    return Ok(value);
                }
                _ => {}
            }
            self.pos += 1;
        }
        Err(self.error_at(open, "unterminated field value"))
    }

    fn identifier(&mut self) -> &'a str {
        let src = self.src;
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b':' | b'.'))
        {
            self.pos += 1;
        }
        &src[start..self.pos]
    }

    fn expect(&mut self, byte: u8) -> Result<(), ParseError> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", byte as char)))
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        self.error_at(self.pos, message)
    }

    fn error_at(&self, pos: usize, message: impl Into<String>) -> ParseError {
        let end = pos.min(self.bytes.len());
        let line = self.bytes[..end].iter().filter(|&&b| b == b'\n').count() + 1;
        ParseError {
            line,
            message: message.into(),
        }
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
