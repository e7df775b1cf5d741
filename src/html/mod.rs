//! # HTML Writer
//!
//! Serialises layout results into HTML fragments for the demo page, and wraps
//! them into a standalone document for offline viewing.
//!
//! All text coming from the service or the submitted input is escaped. The
//! element ids written here are the ones layout hands out (`annot-m-p` for text
//! highlights, `annot-m-p-b` for overlays), so the summary index and the
//! detail cards can point at them.

pub mod detail;

use std::fmt::Write as FmtWrite; // for write! on String

use crate::error::Result;
use crate::layout::{Fragment, PlacedPage, TextLayout};
use crate::model::AnnotationResponse;
use crate::session::Session;
use crate::summary::{summarize, Occurrence, Summary};

pub use detail::detail_card;
pub use quick_xml::escape::escape;

/// Stylesheet for the highlight classes.
pub const STYLE: &str = "\
.label { cursor: pointer; padding: 0 2px; border-radius: 3px; }
.dataset-name { background-color: #ffd5b2; border-color: #f28c35 !important; }
.dataset-implicit { background-color: #f8f0c6; border-color: #d7b900 !important; }
.data-device { background-color: #c9e4f6; border-color: #3c8dc5 !important; }
.url { background-color: #d9f2d0; border-color: #55a630 !important; }
.publisher { background-color: #e7d7f3; border-color: #8e4fc1 !important; }
.reference { background-color: #e8e8e8; border-color: #777 !important; }
a.dataset-name, a.dataset-implicit, a.data-device, a.url, a.publisher, a.reference { background-color: transparent; }
.index { margin-right: 4px; }
";

/// Laid-out text as paragraphs with highlight spans.
///
/// Line breaks (`\r\n`, `\n`, `\r`) in literal text close the current
/// paragraph and open the next one.
pub fn text_view(layout: &TextLayout<'_>) -> String {
    let mut html = String::from("<p>");
    for fragment in &layout.fragments {
        match fragment {
            Fragment::Literal { text } => {
                let mut lines = split_lines(text);
                if let Some(first) = lines.next() {
                    html.push_str(&escape(first));
                }
                for line in lines {
                    html.push_str("</p><p>");
                    html.push_str(&escape(line));
                }
            }
            Fragment::Highlight {
                text,
                subtype,
                id,
                mention_index,
            } => {
                let _ = write!(
                    html,
                    "<span id=\"{}\" class=\"label {}\" data-mention=\"{}\">{}</span>",
                    id,
                    subtype,
                    mention_index,
                    escape(*text)
                );
            }
        }
    }
    html.push_str("</p>");
    html
}

/// Split on `\r\n`, `\n` or `\r`.
fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = Some(text);
    std::iter::from_fn(move || {
        let current = rest?;
        match current.find(['\r', '\n']) {
            Some(i) => {
                let skip = if current[i..].starts_with("\r\n") { 2 } else { 1 };
                rest = Some(&current[i + skip..]);
                Some(&current[..i])
            }
            None => {
                rest = None;
                Some(current)
            }
        }
    })
}

/// Page container with one absolutely positioned anchor per overlay.
///
/// The rendered page image is expected to be drawn underneath by the caller;
/// only the container's size is set here.
pub fn page_view(page: &PlacedPage) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<div id=\"page-{}\" class=\"page\" style=\"position:relative; width:{:.2}px; height:{:.2}px;\">",
        page.page, page.canvas.width, page.canvas.height
    );
    for overlay in &page.overlays {
        let r = overlay.rect;
        let _ = write!(
            html,
            "<a id=\"{}\" class=\"{}\" page=\"{}\" data-mention=\"{}\" title=\"{}\" \
             style=\"display:block; width:{:.2}px; height:{:.2}px; position:absolute; top:{:.2}px; left:{:.2}px; border:2px solid;\"></a>",
            overlay.id,
            overlay.subtype,
            overlay.page,
            overlay.mention_index,
            escape(overlay.raw_form.as_str()),
            r.width,
            r.height,
            r.top,
            r.left
        );
    }
    html.push_str("</div>");
    html
}

/// The main part of a report, already written, and the kind of elements it
/// carries. Index entries only link to elements the main part contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainView<'a> {
    /// Highlighted text, with `annot-m-p` spans.
    Text(&'a str),
    /// Placed pages, with `annot-m-p-b` overlays.
    Pages(&'a str),
    /// No main part (TEI and JATS uploads).
    Empty,
}

impl<'a> MainView<'a> {
    pub fn html(&self) -> &'a str {
        match *self {
            MainView::Text(html) | MainView::Pages(html) => html,
            MainView::Empty => "",
        }
    }

    /// Whether the element an occurrence points at is written by this view.
    pub fn renders(&self, occurrence: &Occurrence) -> bool {
        match self {
            MainView::Text(_) => occurrence.page().is_none(),
            MainView::Pages(_) => occurrence.page().is_some(),
            MainView::Empty => false,
        }
    }
}

/// The dataset index: mention count, then one table row per dataset.
///
/// Occurrences whose element is not in `view` are listed without a link.
pub fn summary_table(summary: &Summary, view: MainView<'_>) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<div id=\"mention-count\"><p><b>{}</b> dataset mentions found</p></div>",
        summary.mention_count
    );
    html.push_str("<table class=\"summary\" style=\"table-layout: fixed;\">");
    html.push_str(
        "<colgroup><col span=\"1\" style=\"width: 10%;\"><col span=\"1\" style=\"width: 25%;\">\
         <col span=\"1\" style=\"width: 5%;\"><col span=\"1\" style=\"width: 40%;\">\
         <col span=\"1\" style=\"width: 20%;\"></colgroup>",
    );
    for (n, row) in summary.rows().enumerate() {
        let background = if n % 2 == 0 { "#eee" } else { "#fff" };
        let _ = write!(
            html,
            "<tr style=\"background: {};\"><td>{}</td><td>{}</td><td>{}</td><td>",
            background,
            row.type_label(),
            escape(row.name.as_str()),
            row.count()
        );
        for occurrence in &row.occurrences {
            let label = match occurrence.page() {
                Some(page) => format!("page {}", page),
                None => "text".to_string(),
            };
            if view.renders(occurrence) {
                let _ = write!(
                    html,
                    "<a class=\"index\" id=\"index_{0}\" href=\"#{0}\">{1}</a> ",
                    occurrence.anchor(),
                    label
                );
            } else {
                let _ = write!(html, "<span class=\"index\">{}</span> ", label);
            }
        }
        let _ = write!(html, "</td><td>{}</td></tr>", row.usage);
    }
    html.push_str("</table>");
    html
}

/// The raw response, pretty-printed and escaped.
pub fn json_view(response: &AnnotationResponse) -> Result<String> {
    let json = serde_json::to_string_pretty(response)?;
    Ok(format!(
        "<pre class=\"json\"><code>{}</code></pre>",
        escape(json.as_str())
    ))
}

/// A complete report: summary index, the main view (laid-out text or placed
/// pages), a detail card per mention and the raw response.
pub fn report(
    title: &str,
    response: &AnnotationResponse,
    main: MainView<'_>,
    session: &Session,
    default_lang: &str,
) -> Result<String> {
    let mut body = summary_table(&summarize(&response.mentions), main);
    let _ = write!(body, "<div class=\"main\">{}</div>", main.html());
    body.push_str("<div class=\"details\">");
    for (i, mention) in response.mentions.iter().enumerate() {
        body.push_str(&detail_card(mention, i, session, default_lang));
    }
    body.push_str("</div>");
    body.push_str(&json_view(response)?);
    Ok(document(title, &body))
}

/// A standalone HTML document around `body`.
pub fn document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>\n{}</style>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape(title),
        STYLE,
        body
    )
}
