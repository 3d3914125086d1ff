//! Markdown to HTML renderer with citation support.

use std::collections::HashSet;
use std::path::Path;

use pulldown_cmark::{
    BrokenLink, CodeBlockKind, CowStr, Event, HeadingLevel, LinkType, Options, Parser, Tag, TagEnd,
};
use technote_bib::{Bibliography, CitationEntry, Resolution};

use crate::citation::{CITE_SCHEME, CitationProblem, citation_keys};
use crate::include::{FenceInfo, IncludeContext, IncludeProblem, parse_fence_info};
use crate::links::html_href;
use crate::state::{
    CodeBlockState, HeadingState, ImageState, Section, TableState, escape_html, reference_anchor,
};

/// Code block language rendered as a diagram instead of highlighted code.
pub const MERMAID_LANGUAGE: &str = "mermaid";

/// Result of rendering one document.
#[derive(Clone, Debug)]
pub struct RenderResult {
    /// Rendered HTML fragment.
    pub html: String,
    /// Text of the first H1 heading.
    pub title: Option<String>,
    /// Sections (H2..H6) in source order.
    pub sections: Vec<Section>,
    /// Ids of every heading, the title included.
    pub anchors: Vec<String>,
    /// Cited entries, in order of first citation, each listed once.
    pub references: Vec<CitationEntry>,
    /// Citations that did not resolve to exactly one entry.
    pub citation_problems: Vec<CitationProblem>,
    /// Destinations of all regular links, as written.
    pub links: Vec<String>,
    /// Code block includes that could not be read.
    pub include_problems: Vec<IncludeProblem>,
    /// Whether the document contains a Mermaid diagram.
    pub has_mermaid: bool,
}

/// Renders Markdown to HTML, resolving citations against a bibliography.
///
/// A renderer is single-use: create one per document.
pub struct MarkdownRenderer<'b> {
    bibliography: &'b Bibliography,
    output: String,
    code: CodeBlockState,
    table: TableState,
    image: ImageState,
    heading: HeadingState,
    /// Inside a citation; its label text is replaced by the rendered citation.
    in_citation: bool,
    anchors: Vec<String>,
    references: Vec<CitationEntry>,
    cited: HashSet<String>,
    citation_problems: Vec<CitationProblem>,
    reported: HashSet<String>,
    links: Vec<String>,
    includes: Option<IncludeContext<'b>>,
    include_problems: Vec<IncludeProblem>,
    has_mermaid: bool,
}

impl<'b> MarkdownRenderer<'b> {
    /// Create a renderer resolving citations against `bibliography`.
    #[must_use]
    pub fn new(bibliography: &'b Bibliography) -> Self {
        Self {
            bibliography,
            output: String::with_capacity(4096),
            code: CodeBlockState::default(),
            table: TableState::default(),
            image: ImageState::default(),
            heading: HeadingState::new(false),
            in_citation: false,
            anchors: Vec::new(),
            references: Vec::new(),
            cited: HashSet::new(),
            citation_problems: Vec::new(),
            reported: HashSet::new(),
            links: Vec::new(),
            includes: None,
            include_problems: Vec::new(),
            has_mermaid: false,
        }
    }

    /// Read code block includes through `ctx`.
    ///
    /// Without a context every include is reported as a problem.
    #[must_use]
    pub fn with_includes(mut self, ctx: IncludeContext<'b>) -> Self {
        self.includes = Some(ctx);
        self
    }

    /// Number sections hierarchically (`1`, `1.1`, ...).
    #[must_use]
    pub fn with_numbered_sections(mut self, enabled: bool) -> Self {
        self.heading = HeadingState::new(enabled);
        self
    }

    /// Parser options: GitHub Flavored Markdown.
    #[must_use]
    pub fn parser_options() -> Options {
        Options::ENABLE_TABLES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_GFM
    }

    /// Render a Markdown document.
    pub fn render_markdown(self, markdown: &str) -> RenderResult {
        let parser = Parser::new_with_broken_link_callback(
            markdown,
            Self::parser_options(),
            Some(claim_citation),
        );
        self.render(parser)
    }

    /// Render markdown events and return the result.
    pub fn render<'a, I>(mut self, events: I) -> RenderResult
    where
        I: Iterator<Item = Event<'a>>,
    {
        for event in events {
            self.process_event(event);
        }

        RenderResult {
            html: self.output,
            title: self.heading.take_title(),
            sections: self.heading.take_sections(),
            anchors: self.anchors,
            references: self.references,
            citation_problems: self.citation_problems,
            links: self.links,
            include_problems: self.include_problems,
            has_mermaid: self.has_mermaid,
        }
    }

    /// Push content to output or heading buffer based on context.
    fn push_inline(&mut self, content: &str) {
        if self.heading.is_active() {
            self.heading.push_html(content);
        } else {
            self.output.push_str(content);
        }
    }

    fn process_event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => self.inline_code(&code),
            Event::InlineHtml(_) if self.in_citation => {}
            Event::Html(html) | Event::InlineHtml(html) => self.push_inline(&html),
            Event::SoftBreak => self.soft_break(),
            Event::HardBreak => self.push_inline("<br>"),
            Event::Rule => self.output.push_str("<hr>"),
            Event::TaskListMarker(checked) => {
                let checked = if checked { " checked" } else { "" };
                self.output
                    .push_str(&format!(r#"<input type="checkbox" disabled{checked}>"#));
            }
            Event::FootnoteReference(_) | Event::InlineMath(_) | Event::DisplayMath(_) => {}
        }
    }

    fn start_tag(&mut self, tag: Tag<'_>) {
        // The citation span already carries the label; inline markup in the
        // brackets is part of the key.
        if self.in_citation {
            return;
        }
        match tag {
            Tag::Paragraph => self.output.push_str("<p>"),
            Tag::Heading { level, .. } => {
                self.heading.start_heading(heading_level_to_num(level));
            }
            Tag::BlockQuote(_) => self.output.push_str("<blockquote>"),
            Tag::CodeBlock(kind) => {
                let info = match kind {
                    CodeBlockKind::Fenced(info) => parse_fence_info(&info),
                    CodeBlockKind::Indented => FenceInfo::default(),
                };
                self.code.start(info.language, info.include);
            }
            Tag::List(start) => match start {
                Some(1) => self.output.push_str("<ol>"),
                Some(n) => self.output.push_str(&format!(r#"<ol start="{n}">"#)),
                None => self.output.push_str("<ul>"),
            },
            Tag::Item => self.output.push_str("<li>"),
            Tag::FootnoteDefinition(_) | Tag::HtmlBlock | Tag::MetadataBlock(_) => {}
            Tag::DefinitionList => self.output.push_str("<dl>"),
            Tag::DefinitionListTitle => self.output.push_str("<dt>"),
            Tag::DefinitionListDefinition => self.output.push_str("<dd>"),
            Tag::Table(alignments) => {
                self.table.start(alignments);
                self.output.push_str("<table>");
            }
            Tag::TableHead => {
                self.table.start_head();
                self.output.push_str("<thead><tr>");
            }
            Tag::TableRow => {
                self.table.start_row();
                self.output.push_str("<tr>");
            }
            Tag::TableCell => {
                let align = self.table.current_alignment_style();
                let tag = if self.table.is_in_head() { "th" } else { "td" };
                self.output.push_str(&format!("<{tag}{align}>"));
            }
            Tag::Emphasis => self.push_inline("<em>"),
            Tag::Strong => self.push_inline("<strong>"),
            Tag::Strikethrough => self.push_inline("<s>"),
            Tag::Superscript => self.push_inline("<sup>"),
            Tag::Subscript => self.push_inline("<sub>"),
            Tag::Link {
                link_type,
                dest_url,
                ..
            } => {
                if is_citation(link_type, &dest_url) {
                    self.start_citation(&dest_url[CITE_SCHEME.len()..]);
                    return;
                }
                self.links.push(dest_url.to_string());
                let href = if link_type == LinkType::Email {
                    format!("mailto:{dest_url}")
                } else {
                    html_href(&dest_url).into_owned()
                };
                self.push_inline(&format!(r#"<a href="{}">"#, escape_html(&href)));
            }
            Tag::Image {
                dest_url, title, ..
            } => {
                self.image.start(dest_url.to_string(), title.to_string());
            }
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        if self.in_citation && !matches!(tag, TagEnd::Link) {
            return;
        }
        match tag {
            TagEnd::Paragraph => self.output.push_str("</p>"),
            TagEnd::Heading(_) => {
                if let Some(heading) = self.heading.complete_heading() {
                    self.anchors.push(heading.id.clone());
                    let level = heading.level;
                    let number = heading
                        .number
                        .map(|n| format!(r#"<span class="section-number">{n}</span> "#))
                        .unwrap_or_default();
                    self.output.push_str(&format!(
                        r#"<h{level} id="{}">{number}{}</h{level}>"#,
                        heading.id,
                        heading.html.trim()
                    ));
                }
            }
            TagEnd::BlockQuote(_) => self.output.push_str("</blockquote>"),
            TagEnd::CodeBlock => {
                let block = self.code.end();
                let content = match block.include {
                    Some(path) => self.read_include(path),
                    None => block.body,
                };
                match block.language {
                    Some(lang) if lang == MERMAID_LANGUAGE => {
                        self.has_mermaid = true;
                        self.output.push_str(&format!(
                            r#"<pre class="mermaid">{}</pre>"#,
                            escape_html(&content)
                        ));
                    }
                    Some(lang) => self.output.push_str(&format!(
                        r#"<pre><code class="language-{}">{}</code></pre>"#,
                        escape_html(&lang),
                        escape_html(&content)
                    )),
                    None => self
                        .output
                        .push_str(&format!("<pre><code>{}</code></pre>", escape_html(&content))),
                }
            }
            TagEnd::List(ordered) => {
                self.output
                    .push_str(if ordered { "</ol>" } else { "</ul>" });
            }
            TagEnd::Item => self.output.push_str("</li>"),
            TagEnd::FootnoteDefinition | TagEnd::HtmlBlock | TagEnd::MetadataBlock(_) => {}
            TagEnd::DefinitionList => self.output.push_str("</dl>"),
            TagEnd::DefinitionListTitle => self.output.push_str("</dt>"),
            TagEnd::DefinitionListDefinition => self.output.push_str("</dd>"),
            TagEnd::Table => self.output.push_str("</tbody></table>"),
            TagEnd::TableHead => {
                self.output.push_str("</tr></thead><tbody>");
                self.table.end_head();
            }
            TagEnd::TableRow => self.output.push_str("</tr>"),
            TagEnd::TableCell => {
                self.output.push_str(if self.table.is_in_head() {
                    "</th>"
                } else {
                    "</td>"
                });
                self.table.next_cell();
            }
            TagEnd::Emphasis => self.push_inline("</em>"),
            TagEnd::Strong => self.push_inline("</strong>"),
            TagEnd::Strikethrough => self.push_inline("</s>"),
            TagEnd::Superscript => self.push_inline("</sup>"),
            TagEnd::Subscript => self.push_inline("</sub>"),
            TagEnd::Link => {
                if self.in_citation {
                    self.in_citation = false;
                } else {
                    self.push_inline("</a>");
                }
            }
            TagEnd::Image => {
                if let Some(image) = self.image.end() {
                    let title_attr = if image.title.is_empty() {
                        String::new()
                    } else {
                        format!(r#" title="{}""#, escape_html(&image.title))
                    };
                    self.push_inline(&format!(
                        r#"<img src="{}"{title_attr} alt="{}">"#,
                        escape_html(&image.src),
                        escape_html(&image.alt)
                    ));
                }
            }
        }
    }

    fn text(&mut self, text: &str) {
        if self.in_citation {
            return;
        }
        if self.code.is_active() {
            self.code.push_str(text);
        } else if self.image.is_active() {
            self.image.push_str(text);
        } else if self.heading.is_active() {
            self.heading.push_text(text);
            self.heading.push_html(&escape_html(text));
        } else {
            self.output.push_str(&escape_html(text));
        }
    }

    fn inline_code(&mut self, code: &str) {
        if self.in_citation {
            return;
        }
        if self.heading.is_active() {
            self.heading.push_text(code);
        }
        self.push_inline(&format!("<code>{}</code>", escape_html(code)));
    }

    fn soft_break(&mut self) {
        if self.heading.is_active() {
            self.heading.push_text(" ");
        }
        self.push_inline("\n");
    }

    /// Content of an included file, or empty after recording the failure.
    fn read_include(&mut self, path: String) -> String {
        let read = match self.includes {
            Some(ctx) => ctx.read(&path).map_err(|e| e.to_string()),
            None => Err("includes are not available here".to_owned()),
        };
        read.unwrap_or_else(|reason| {
            self.include_problems.push(IncludeProblem { path, reason });
            String::new()
        })
    }

    /// Render an in-text citation for `;`-separated keys.
    fn start_citation(&mut self, keys: &str) {
        let parts: Vec<String> = keys.split(';').map(|key| self.cite(key)).collect();
        self.push_inline(&format!(
            r#"<span class="citation">({})</span>"#,
            parts.join("; ")
        ));
        self.in_citation = true;
    }

    fn cite(&mut self, key: &str) -> String {
        let bibliography = self.bibliography;
        match bibliography.resolve(key) {
            Resolution::Found(entry) => {
                if self.cited.insert(entry.key.to_lowercase()) {
                    self.references.push(entry.clone());
                }
                format!(
                    r##"<a href="#{}">{}</a>"##,
                    reference_anchor(&entry.key),
                    escape_html(&entry.label())
                )
            }
            Resolution::Missing => {
                self.report(CitationProblem::Missing {
                    key: key.to_owned(),
                });
                unresolved_citation(key)
            }
            Resolution::Ambiguous(files) => {
                self.report(CitationProblem::Ambiguous {
                    key: key.to_owned(),
                    files: files.into_iter().map(Path::to_path_buf).collect(),
                });
                unresolved_citation(key)
            }
        }
    }

    /// Record a citation problem once per key.
    fn report(&mut self, problem: CitationProblem) {
        if self.reported.insert(problem.key().to_lowercase()) {
            self.citation_problems.push(problem);
        }
    }
}

/// Broken-link callback turning `[@key]` brackets into citation links.
fn claim_citation<'a>(link: BrokenLink<'a>) -> Option<(CowStr<'a>, CowStr<'a>)> {
    let keys = citation_keys(&link.reference)?;
    let dest = format!("{CITE_SCHEME}{}", keys.join(";"));
    Some((CowStr::from(dest), CowStr::Borrowed("")))
}

fn is_citation(link_type: LinkType, dest: &str) -> bool {
    matches!(
        link_type,
        LinkType::ShortcutUnknown | LinkType::ReferenceUnknown | LinkType::CollapsedUnknown
    ) && dest.starts_with(CITE_SCHEME)
}

fn unresolved_citation(key: &str) -> String {
    format!(
        r#"<span class="citation-missing">@{}</span>"#,
        escape_html(key)
    )
}

fn heading_level_to_num(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}
