//! # Bibliographic Fields
//!
//! Pulls the display fields out of a TEI `<biblStruct>` fragment. This is
//! field extraction, not TEI processing: for each field the first matching
//! element in document order wins, and its text content (all descendant
//! text, whitespace collapsed) becomes the value.
//!
//! The reader is streaming. When the markup is malformed the extraction stops
//! at the error and keeps what was read up to that point.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;
use tracing::debug;

/// One `<author>`: its forenames in order and its surname.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Author {
    pub forenames: Vec<String>,
    pub surname: Option<String>,
}

impl Author {
    /// "Forename Forename Surname".
    pub fn full_name(&self) -> String {
        let mut name = self.forenames.join(" ");
        if let Some(surname) = &self.surname {
            if !name.is_empty() {
                name.push(' ');
            }
            name.push_str(surname);
        }
        name
    }
}

/// Display fields of one bibliographic record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Biblio {
    pub authors: Vec<Author>,
    /// `title[@level='a']`
    pub article_title: Option<String>,
    /// `title[@level='j']`
    pub journal_title: Option<String>,
    /// `title[@level='m']`
    pub monograph_title: Option<String>,
    /// `date[@type='published']/@when`
    pub published: Option<String>,
    pub meeting: Option<String>,
    pub address: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub first_page: Option<String>,
    pub last_page: Option<String>,
    /// Text of the page `biblScope`, when it has any.
    pub pages: Option<String>,
    pub issn: Option<String>,
    pub eissn: Option<String>,
    pub doi: Option<String>,
    pub pmcid: Option<String>,
    pub pmid: Option<String>,
    /// `ptr[@type='open-access']/@target`
    pub open_access: Option<String>,
    pub publisher: Option<String>,
    pub editor: Option<String>,
}

/// A row of the bibliographic table, optionally linked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BiblioRow {
    pub label: &'static str,
    pub text: String,
    pub href: Option<String>,
}

impl BiblioRow {
    fn text(label: &'static str, text: &str) -> Self {
        BiblioRow {
            label,
            text: text.to_string(),
            href: None,
        }
    }

    fn link(label: &'static str, text: &str, href: String) -> Self {
        BiblioRow {
            label,
            text: text.to_string(),
            href: Some(href),
        }
    }
}

impl Biblio {
    /// Extract the display fields of a TEI fragment.
    pub fn parse(tei: &str) -> Biblio {
        let mut extractor = Extractor::default();
        let mut reader = Reader::from_str(tei);

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    extractor.depth += 1;
                    extractor.open(&e, true);
                }
                Ok(Event::Empty(e)) => {
                    extractor.depth += 1;
                    extractor.open(&e, false);
                    extractor.close_depth();
                }
                Ok(Event::Text(t)) => match t.unescape() {
                    Ok(text) => extractor.text(&text),
                    Err(e) => {
                        debug!("Stopping TEI extraction at bad escape: {}", e);
                        break;
                    }
                },
                Ok(Event::CData(t)) => extractor.text(&String::from_utf8_lossy(&t)),
                Ok(Event::End(_)) => extractor.close_depth(),
                Ok(Event::Eof) => break,
                Err(e) => {
                    debug!(
                        "Stopping TEI extraction at byte {}: {}",
                        reader.error_position(),
                        e
                    );
                    break;
                }
                _ => {}
            }
        }
        extractor.finish()
    }

    /// Year of the published date: everything before the first `-`.
    pub fn year(&self) -> Option<&str> {
        self.published
            .as_deref()
            .map(|date| date.split('-').next().unwrap_or(date))
    }

    /// Short citation label: "A", "A & B", "A, B & C" or "A et al", by
    /// surname, followed by " (year)" when the record has a published date.
    pub fn short_label(&self) -> String {
        let surnames: Vec<&str> = self
            .authors
            .iter()
            .map(|a| a.surname.as_deref().unwrap_or(""))
            .collect();

        let mut label = match surnames.as_slice() {
            [] => String::new(),
            [one] => one.to_string(),
            [first, second] => format!("{} & {}", first, second),
            [first, second, third] => format!("{}, {} & {}", first, second, third),
            [first, ..] => format!("{} et al", first),
        };
        if let Some(year) = self.year() {
            label.push_str(&format!(" ({})", year));
        }
        label
    }

    /// The table rows of the reference card, in display order.
    pub fn rows(&self) -> Vec<BiblioRow> {
        let mut rows = Vec::new();
        if !self.authors.is_empty() {
            let names: Vec<String> = self.authors.iter().map(Author::full_name).collect();
            rows.push(BiblioRow::text("authors", &names.join(", ")));
        }

        let plain = [
            ("title", &self.article_title),
            ("date", &self.published),
            ("journal", &self.journal_title),
            ("book title", &self.monograph_title),
            ("conference", &self.meeting),
            ("address", &self.address),
            ("volume", &self.volume),
            ("issue", &self.issue),
            ("first page", &self.first_page),
            ("last page", &self.last_page),
            ("pages", &self.pages),
            ("ISSN", &self.issn),
            ("e ISSN", &self.eissn),
        ];
        rows.extend(
            plain
                .into_iter()
                .filter_map(|(label, value)| value.as_deref().map(|v| BiblioRow::text(label, v))),
        );

        if let Some(doi) = &self.doi {
            rows.push(BiblioRow::link("DOI", doi, format!("https://doi.org/{}", doi)));
        }
        if let Some(pmcid) = &self.pmcid {
            rows.push(BiblioRow::link(
                "PMC ID",
                pmcid,
                format!("https://www.ncbi.nlm.nih.gov/pmc/articles/{}/", pmcid),
            ));
        }
        if let Some(pmid) = &self.pmid {
            rows.push(BiblioRow::link(
                "PMID",
                pmid,
                format!("https://pubmed.ncbi.nlm.nih.gov/{}/", pmid),
            ));
        }
        if let Some(target) = &self.open_access {
            rows.push(BiblioRow::link("Open Access", target, target.clone()));
        }
        if let Some(publisher) = &self.publisher {
            rows.push(BiblioRow::text("publisher", publisher));
        }
        if let Some(editor) = &self.editor {
            rows.push(BiblioRow::text("editor", editor));
        }
        rows
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    ArticleTitle,
    JournalTitle,
    MonographTitle,
    Meeting,
    Address,
    Volume,
    Issue,
    Pages,
    Issn,
    Eissn,
    Doi,
    Pmcid,
    Pmid,
    Publisher,
    Editor,
    Forename,
    Surname,
}

/// Text being collected for an open element.
struct Capture {
    field: Field,
    depth: usize,
    text: String,
}

#[derive(Default)]
struct Extractor {
    biblio: Biblio,
    depth: usize,
    captures: Vec<Capture>,
    /// Depth of the `<author>` currently open, if any.
    author_depth: Option<usize>,
}

impl Extractor {
    fn open(&mut self, e: &BytesStart, has_content: bool) {
        let name = e.local_name();
        let field = match name.as_ref() {
            b"author" => {
                self.biblio.authors.push(Author::default());
                if has_content {
                    self.author_depth = Some(self.depth);
                }
                None
            }
            b"forename" if self.author_depth.is_some() => Some(Field::Forename),
            b"surname" if self.author_depth.is_some() => Some(Field::Surname),
            b"title" => match get_attr(e, "level").as_deref() {
                Some("a") => Some(Field::ArticleTitle),
                Some("j") => Some(Field::JournalTitle),
                Some("m") => Some(Field::MonographTitle),
                _ => None,
            },
            b"date" => {
                if get_attr(e, "type").as_deref() == Some("published") {
                    set_first(&mut self.biblio.published, get_attr(e, "when"));
                }
                None
            }
            b"meeting" => Some(Field::Meeting),
            b"address" => Some(Field::Address),
            b"biblScope" => match get_attr(e, "unit").as_deref() {
                Some("volume") => Some(Field::Volume),
                Some("issue") => Some(Field::Issue),
                Some("page") => {
                    set_first(&mut self.biblio.first_page, get_attr(e, "from"));
                    set_first(&mut self.biblio.last_page, get_attr(e, "to"));
                    Some(Field::Pages)
                }
                _ => None,
            },
            b"idno" => match get_attr(e, "type").as_deref() {
                Some("ISSN") => Some(Field::Issn),
                Some("ISSNe") => Some(Field::Eissn),
                Some("DOI") => Some(Field::Doi),
                Some("PMCID") => Some(Field::Pmcid),
                Some("PMID") => Some(Field::Pmid),
                _ => None,
            },
            b"ptr" => {
                if get_attr(e, "type").as_deref() == Some("open-access") {
                    set_first(&mut self.biblio.open_access, get_attr(e, "target"));
                }
                None
            }
            b"publisher" => Some(Field::Publisher),
            b"editor" => Some(Field::Editor),
            _ => None,
        };

        if let Some(field) = field {
            self.captures.push(Capture {
                field,
                depth: self.depth,
                text: String::new(),
            });
        }
    }

    fn text(&mut self, text: &str) {
        for capture in &mut self.captures {
            capture.text.push_str(text);
        }
    }

    /// Close the element at the current depth.
    fn close_depth(&mut self) {
        while self
            .captures
            .last()
            .is_some_and(|c| c.depth == self.depth)
        {
            if let Some(capture) = self.captures.pop() {
                self.store(capture);
            }
        }
        if self.author_depth == Some(self.depth) {
            self.author_depth = None;
        }
        self.depth = self.depth.saturating_sub(1);
    }

    fn store(&mut self, capture: Capture) {
        let text = capture.text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            return;
        }
        let b = &mut self.biblio;
        let slot = match capture.field {
            Field::Forename => {
                if let Some(author) = b.authors.last_mut() {
                    author.forenames.push(text);
                }
                return;
            }
            Field::Surname => {
                if let Some(author) = b.authors.last_mut() {
                    set_first(&mut author.surname, Some(text));
                }
                return;
            }
            Field::ArticleTitle => &mut b.article_title,
            Field::JournalTitle => &mut b.journal_title,
            Field::MonographTitle => &mut b.monograph_title,
            Field::Meeting => &mut b.meeting,
            Field::Address => &mut b.address,
            Field::Volume => &mut b.volume,
            Field::Issue => &mut b.issue,
            Field::Pages => &mut b.pages,
            Field::Issn => &mut b.issn,
            Field::Eissn => &mut b.eissn,
            Field::Doi => &mut b.doi,
            Field::Pmcid => &mut b.pmcid,
            Field::Pmid => &mut b.pmid,
            Field::Publisher => &mut b.publisher,
            Field::Editor => &mut b.editor,
        };
        set_first(slot, Some(text));
    }

    /// Keep the text of elements left open by a parse error.
    fn finish(mut self) -> Biblio {
        while let Some(capture) = self.captures.pop() {
            self.store(capture);
        }
        self.biblio
    }
}

fn set_first(slot: &mut Option<String>, value: Option<String>) {
    if slot.is_none() {
        *slot = value.filter(|v| !v.is_empty());
    }
}

/// Helper to get an attribute value from a quick-xml BytesStart.
fn get_attr(e: &BytesStart, name: &str) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == name.as_bytes() {
            return attr.unescape_value().ok().map(|v| v.into_owned());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEI: &str = r#"<biblStruct xml:id="b11">
        <analytic>
            <title level="a" type="main">Gene Expression Omnibus: NCBI gene expression
                and hybridization array data repository</title>
            <author><persName><forename type="first">Ron</forename><surname>Edgar</surname></persName></author>
            <author><persName><forename type="first">Michael</forename><forename type="middle">J</forename><surname>Domrachev</surname></persName></author>
            <author><persName><forename type="first">Alex</forename><surname>Lash</surname></persName></author>
        </analytic>
        <monogr>
            <title level="j">Nucleic Acids Research</title>
            <idno type="ISSN">0305-1048</idno>
            <idno type="DOI">10.1093/nar/30.1.207</idno>
            <idno type="PMID">11752295</idno>
            <imprint>
                <biblScope unit="volume">30</biblScope>
                <biblScope unit="issue">1</biblScope>
                <biblScope unit="page" from="207" to="210" />
                <date type="published" when="2002-01-01" />
                <publisher>Oxford University Press &amp; Co</publisher>
            </imprint>
        </monogr>
        <ptr type="open-access" target="https://academic.oup.com/nar/article/30/1/207" />
    </biblStruct>"#;

    #[test]
    fn test_extracts_fields() {
        let b = Biblio::parse(TEI);
        assert_eq!(b.authors.len(), 3);
        assert_eq!(b.authors[1].full_name(), "Michael J Domrachev");
        assert_eq!(
            b.article_title.as_deref(),
            Some("Gene Expression Omnibus: NCBI gene expression and hybridization array data repository")
        );
        assert_eq!(b.journal_title.as_deref(), Some("Nucleic Acids Research"));
        assert_eq!(b.volume.as_deref(), Some("30"));
        assert_eq!(b.issue.as_deref(), Some("1"));
        assert_eq!(b.first_page.as_deref(), Some("207"));
        assert_eq!(b.last_page.as_deref(), Some("210"));
        assert_eq!(b.pages, None);
        assert_eq!(b.published.as_deref(), Some("2002-01-01"));
        assert_eq!(b.publisher.as_deref(), Some("Oxford University Press & Co"));
        assert_eq!(b.doi.as_deref(), Some("10.1093/nar/30.1.207"));
        assert_eq!(
            b.open_access.as_deref(),
            Some("https://academic.oup.com/nar/article/30/1/207")
        );
    }

    #[test]
    fn test_short_label() {
        let b = Biblio::parse(TEI);
        assert_eq!(b.year(), Some("2002"));
        assert_eq!(b.short_label(), "Edgar, Domrachev & Lash (2002)");

        let mut two = b.clone();
        two.authors.truncate(2);
        two.published = None;
        assert_eq!(two.short_label(), "Edgar & Domrachev");

        let mut many = b.clone();
        many.authors.push(Author {
            forenames: vec![],
            surname: Some("Barrett".to_string()),
        });
        assert_eq!(many.short_label(), "Edgar et al (2002)");

        many.authors.truncate(1);
        assert_eq!(many.short_label(), "Edgar (2002)");
    }

    #[test]
    fn test_rows_link_identifiers() {
        let rows = Biblio::parse(TEI).rows();
        assert_eq!(rows[0].label, "authors");
        assert_eq!(rows[0].text, "Ron Edgar, Michael J Domrachev, Alex Lash");
        let doi = rows.iter().find(|r| r.label == "DOI").unwrap();
        assert_eq!(doi.href.as_deref(), Some("https://doi.org/10.1093/nar/30.1.207"));
        let pmid = rows.iter().find(|r| r.label == "PMID").unwrap();
        assert_eq!(
            pmid.href.as_deref(),
            Some("https://pubmed.ncbi.nlm.nih.gov/11752295/")
        );
    }

    #[test]
    fn test_first_match_wins() {
        let tei = r#"<biblStruct><monogr>
            <title level="j">First</title><title level="j">Second</title>
        </monogr></biblStruct>"#;
        assert_eq!(Biblio::parse(tei).journal_title.as_deref(), Some("First"));
    }

    #[test]
    fn test_page_text_scope() {
        let tei = r#"<biblStruct><biblScope unit="page">e1001</biblScope></biblStruct>"#;
        let b = Biblio::parse(tei);
        assert_eq!(b.pages.as_deref(), Some("e1001"));
        assert_eq!(b.first_page, None);
    }

    #[test]
    fn test_malformed_markup_keeps_partial_fields() {
        let tei = r#"<biblStruct><title level="a">Partial</title><monogr><title level="j">Journal</monogr></biblStruct>"#;
        let b = Biblio::parse(tei);
        assert_eq!(b.article_title.as_deref(), Some("Partial"));
        assert_eq!(b.journal_title.as_deref(), Some("Journal"));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(Biblio::parse(""), Biblio::default());
        assert_eq!(Biblio::default().short_label(), "");
    }
}
