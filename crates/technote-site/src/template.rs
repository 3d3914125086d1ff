//! HTML page templates for the static site.
//!
//! Output is a pure function of the data passed in: no timestamps, no
//! environment lookups.

use std::fmt::Write;

use technote_renderer::{REFERENCES_ID, escape_html as escape};

/// File name of the shared stylesheet at the site root.
pub(crate) const STYLESHEET_NAME: &str = "technote.css";

pub(crate) const STYLESHEET: &str = "\
body { margin: 0; font-family: system-ui, sans-serif; line-height: 1.6; color: #1f2933; }
header.site { border-bottom: 1px solid #d9e2ec; padding: 0.75rem 1.5rem; }
header.site a { color: #334e68; text-decoration: none; font-weight: 600; }
main { max-width: 46rem; margin: 0 auto; padding: 1.5rem; }
nav.toc { border: 1px solid #d9e2ec; border-radius: 4px; padding: 0.5rem 1rem; margin-bottom: 1.5rem; }
nav.toc ul { list-style: none; padding-left: 0; }
nav.toc li.level-3 { padding-left: 1rem; }
nav.toc li.level-4, nav.toc li.level-5, nav.toc li.level-6 { padding-left: 2rem; }
.section-number { color: #627d98; margin-right: 0.25rem; }
.citation a { color: inherit; }
.citation-missing { color: #ba2525; font-weight: 600; }
section.references li { margin-bottom: 0.5rem; }
pre { background: #f0f4f8; padding: 0.75rem; overflow-x: auto; }
table { border-collapse: collapse; }
th, td { border: 1px solid #d9e2ec; padding: 0.25rem 0.5rem; }
";

/// Mermaid release loaded by pages with diagrams.
pub(crate) const MERMAID_VERSION: &str = "9.4.0";

/// A table of contents entry.
pub(crate) struct TocData {
    pub level: u8,
    pub number: Option<String>,
    pub title: String,
    pub id: String,
}

/// A formatted bibliography entry.
pub(crate) struct ReferenceData {
    pub anchor: String,
    pub text: String,
    pub link: Option<String>,
}

/// All data needed to render a document page.
pub(crate) struct PageData {
    pub title: String,
    pub site_title: String,
    pub html_content: String,
    pub toc: Vec<TocData>,
    pub references: Vec<ReferenceData>,
    /// Relative prefix from the page to the site root (`""`, `"../"`).
    pub root_prefix: String,
    /// Load the Mermaid script.
    pub mermaid: bool,
}

/// A document listed on the index page.
pub(crate) struct IndexEntryData {
    pub title: String,
    pub href: String,
    pub sections: Vec<TocData>,
}

/// All data needed to render the index page.
pub(crate) struct IndexData {
    pub title: String,
    /// Rendered top-level `index.md`, if present.
    pub intro_html: Option<String>,
    pub documents: Vec<IndexEntryData>,
    pub references: Vec<ReferenceData>,
    pub mermaid: bool,
}

/// Render a document page.
pub(crate) fn render_page(page: &PageData) -> String {
    let mut html = String::with_capacity(8192);
    render_head(&mut html, &page.title, &page.root_prefix);

    html.push_str("<header class=\"site\">");
    let _ = write!(
        html,
        "<a href=\"{}index.html\">{}</a>",
        page.root_prefix,
        escape(&page.site_title)
    );
    html.push_str("</header>\n<main>\n");

    render_toc(&mut html, &page.toc);
    html.push_str("<article>\n");
    html.push_str(&page.html_content);
    html.push_str("\n</article>\n");
    render_references(&mut html, &page.references);

    html.push_str("</main>\n");
    render_scripts(&mut html, page.mermaid);
    html.push_str("</body>\n</html>\n");
    html
}

/// Render the index page listing every document and its sections.
pub(crate) fn render_index(index: &IndexData) -> String {
    let mut html = String::with_capacity(4096);
    render_head(&mut html, &index.title, "");

    html.push_str("<main>\n");
    match &index.intro_html {
        Some(intro) => {
            html.push_str("<article>\n");
            html.push_str(intro);
            html.push_str("\n</article>\n");
        }
        None => {
            let _ = writeln!(html, "<h1>{}</h1>", escape(&index.title));
        }
    }

    html.push_str("<nav class=\"contents\">\n");
    if index.documents.is_empty() {
        html.push_str("<p class=\"empty\">No documents.</p>\n");
    } else {
        html.push_str("<ul>\n");
        for doc in &index.documents {
            let _ = write!(
                html,
                "<li><a href=\"{}\">{}</a>",
                escape(&doc.href),
                escape(&doc.title)
            );
            if !doc.sections.is_empty() {
                html.push_str("\n<ul>\n");
                for section in &doc.sections {
                    let _ = writeln!(
                        html,
                        "<li class=\"level-{}\"><a href=\"{}#{}\">{}</a></li>",
                        section.level,
                        escape(&doc.href),
                        escape(&section.id),
                        toc_label(section),
                    );
                }
                html.push_str("</ul>\n");
            }
            html.push_str("</li>\n");
        }
        html.push_str("</ul>\n");
    }
    html.push_str("</nav>\n");

    render_references(&mut html, &index.references);
    html.push_str("</main>\n");
    render_scripts(&mut html, index.mermaid);
    html.push_str("</body>\n</html>\n");
    html
}

fn render_head(html: &mut String, title: &str, root_prefix: &str) {
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    let _ = writeln!(html, "<title>{}</title>", escape(title));
    let _ = writeln!(
        html,
        "<link rel=\"stylesheet\" href=\"{root_prefix}{STYLESHEET_NAME}\">"
    );
    html.push_str("</head>\n<body>\n");
}

fn render_scripts(html: &mut String, mermaid: bool) {
    if !mermaid {
        return;
    }
    let _ = writeln!(
        html,
        "<script src=\"https://cdn.jsdelivr.net/npm/mermaid@{MERMAID_VERSION}/dist/mermaid.min.js\"></script>"
    );
    html.push_str("<script>mermaid.initialize({ startOnLoad: true });</script>\n");
}

fn render_toc(html: &mut String, toc: &[TocData]) {
    if toc.is_empty() {
        return;
    }
    html.push_str("<nav class=\"toc\">\n<ul>\n");
    for entry in toc {
        let _ = writeln!(
            html,
            "<li class=\"level-{}\"><a href=\"#{}\">{}</a></li>",
            entry.level,
            escape(&entry.id),
            toc_label(entry),
        );
    }
    html.push_str("</ul>\n</nav>\n");
}

fn render_references(html: &mut String, references: &[ReferenceData]) {
    if references.is_empty() {
        return;
    }
    let _ = write!(
        html,
        "<section class=\"references\">\n<h2 id=\"{REFERENCES_ID}\">References</h2>\n<ol>\n"
    );
    for reference in references {
        let _ = write!(
            html,
            "<li id=\"{}\">{}",
            escape(&reference.anchor),
            escape(&reference.text)
        );
        if let Some(link) = &reference.link {
            let _ = write!(
                html,
                " <a href=\"{}\">{}</a>",
                escape(link),
                escape(link)
            );
        }
        html.push_str("</li>\n");
    }
    html.push_str("</ol>\n</section>\n");
}

fn toc_label(entry: &TocData) -> String {
    match &entry.number {
        Some(number) => format!("{number} {}", escape(&entry.title)),
        None => escape(&entry.title),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> PageData {
        PageData {
            title: "Setup".to_owned(),
            site_title: "Technote".to_owned(),
            html_content: "<p>Hello</p>".to_owned(),
            toc: vec![],
            references: vec![],
            root_prefix: "../".to_owned(),
            mermaid: false,
        }
    }

    #[test]
    fn render_page_links_to_root() {
        let html = render_page(&page());
        assert!(html.contains("<title>Setup</title>"));
        assert!(html.contains("href=\"../technote.css\""));
        assert!(html.contains("<a href=\"../index.html\">Technote</a>"));
        assert!(html.contains("<p>Hello</p>"));
        assert!(!html.contains("class=\"toc\""));
        assert!(!html.contains("References"));
        assert!(!html.contains("<script"));
    }

    #[test]
    fn render_page_loads_mermaid_when_needed() {
        let mut page = page();
        page.mermaid = true;
        let html = render_page(&page);
        assert!(html.contains(
            "<script src=\"https://cdn.jsdelivr.net/npm/mermaid@9.4.0/dist/mermaid.min.js\"></script>"
        ));
        assert!(html.contains("mermaid.initialize({ startOnLoad: true });"));
        assert!(html.ends_with("</script>\n</body>\n</html>\n"));
    }

    #[test]
    fn render_page_contains_numbered_toc() {
        let mut page = page();
        page.toc = vec![TocData {
            level: 3,
            number: Some("1.2".to_owned()),
            title: "Scope & Limits".to_owned(),
            id: "scope-limits".to_owned(),
        }];
        let html = render_page(&page);
        assert!(html.contains(
            "<li class=\"level-3\"><a href=\"#scope-limits\">1.2 Scope &amp; Limits</a></li>"
        ));
    }

    #[test]
    fn render_page_contains_references() {
        let mut page = page();
        page.references = vec![ReferenceData {
            anchor: "ref-smith2020".to_owned(),
            text: "Smith, Jane (2020). Monorepos.".to_owned(),
            link: Some("https://doi.org/10.1/x".to_owned()),
        }];
        let html = render_page(&page);
        assert!(html.contains("<h2 id=\"references\">References</h2>"));
        assert!(html.contains("<li id=\"ref-smith2020\">Smith, Jane (2020). Monorepos."));
        assert!(html.contains("<a href=\"https://doi.org/10.1/x\">"));
    }

    #[test]
    fn render_empty_index() {
        let html = render_index(&IndexData {
            title: "Technote".to_owned(),
            intro_html: None,
            documents: vec![],
            references: vec![],
            mermaid: false,
        });
        assert!(html.contains("<h1>Technote</h1>"));
        assert!(html.contains("No documents."));
        assert!(!html.contains("level-"));
    }

    #[test]
    fn render_index_lists_documents_and_sections() {
        let html = render_index(&IndexData {
            title: "Technote".to_owned(),
            intro_html: Some("<h1 id=\"home\">Home</h1>".to_owned()),
            documents: vec![IndexEntryData {
                title: "Setup".to_owned(),
                href: "guide/setup.html".to_owned(),
                sections: vec![TocData {
                    level: 2,
                    number: None,
                    title: "Install".to_owned(),
                    id: "install".to_owned(),
                }],
            }],
            references: vec![],
            mermaid: false,
        });
        assert!(html.contains("<h1 id=\"home\">Home</h1>"));
        assert!(!html.contains("<h1>Technote</h1>"));
        assert!(html.contains("<a href=\"guide/setup.html\">Setup</a>"));
        assert!(html.contains("<a href=\"guide/setup.html#install\">Install</a>"));
    }
}
