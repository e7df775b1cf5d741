//! Per-mention detail card.
//!
//! Shows what the service said about one mention, plus whatever the session
//! has cached for it: the knowledge-base concept, the Wikipedia thumbnail,
//! the TEI record of each reference. Missing lookups just leave their section
//! out.

use std::fmt::Write as FmtWrite;

use super::escape;
use crate::biblio::Biblio;
use crate::model::{ContextAttributes, Mention, MentionType, StatementValue};
use crate::session::Session;

/// Render the card for the mention at `mention_index`.
pub fn detail_card(
    mention: &Mention,
    mention_index: usize,
    session: &Session,
    default_lang: &str,
) -> String {
    let lang = mention.lang_or(default_lang);
    let type_class = mention
        .mention_type
        .as_ref()
        .map(MentionType::as_str)
        .unwrap_or("");
    let wikipedia = mention.wikipedia_ref();

    let mut html = String::new();
    let _ = write!(
        html,
        "<div class=\"info-sense-box {}\" id=\"detailed_annot-{}\"><h4>{}</h4>",
        escape(type_class),
        mention_index,
        escape(mention.display_name().to_uppercase().as_str())
    );
    html.push_str("<table class=\"info\"><tr><td>");

    match &mention.mention_type {
        Some(MentionType::DatasetImplicit) => html.push_str("<p>Type: <b>implicit dataset</b></p>"),
        Some(ty) => {
            let _ = write!(html, "<p>Type: <b>{}</b></p>", escape(ty.as_str()));
        }
        None => {}
    }
    let raw_name = mention
        .raw_form
        .as_deref()
        .or_else(|| mention.dataset_component().map(|c| c.raw_form.as_str()));
    if let Some(raw) = raw_name {
        let _ = write!(html, "<p>Raw name: <b>{}</b></p>", escape(raw));
    }
    if let Some(confidence) = mention.confidence {
        let _ = write!(html, "<p>conf: <i>{}</i></p>", confidence);
    }
    if mention.is_type(&MentionType::DatasetImplicit) {
        if let Some(implicit) = &mention.dataset_implicit {
            if let Some(data_type) = &implicit.best_data_type {
                let _ = write!(html, "<p>Likely data type: <b>{}</b></p>", escape(data_type.as_str()));
                if let Some(score) = implicit.best_type_score {
                    let _ = write!(html, "<p>conf: <b>{}</b></p>", score);
                }
            }
        }
    }
    if let Some(device) = &mention.data_device {
        let _ = write!(
            html,
            "<p>Data acquisition device: <b>{}</b></p>",
            escape(device.normalized_or_raw())
        );
    }
    if let Some(url) = &mention.url {
        let _ = write!(html, "<p>URL: <b>{}</b></p>", escape(url.normalized_or_raw()));
    }

    if let Some(thumbnail) = wikipedia.and_then(|id| session.thumbnail(lang, id)) {
        let _ = write!(
            html,
            "</td><td class=\"thumbnail\"><img src=\"{}\" style=\"max-width:150px;max-height:150px\"/>",
            escape(thumbnail)
        );
    }
    html.push_str("</td></tr></table>");

    let levels = [
        ("Mention-level", mention.mention_context_attributes),
        ("Document-level", mention.document_context_attributes),
    ];
    if levels.iter().any(|(_, a)| a.is_some()) {
        html.push_str("<div class=\"context\">");
        for (level, attributes) in levels {
            if let Some(attributes) = attributes.filter(ContextAttributes::any) {
                let _ = write!(html, "<p>{}: {}</p>", level, attribute_scores(&attributes));
            }
        }
        html.push_str("</div>");
    }

    if mention.references.iter().any(|r| r.label.is_some()) {
        html.push_str("<div class=\"references\"><p>References:</p>");
        for reference in mention.references.iter() {
            let Some(label) = &reference.label else {
                continue;
            };
            let biblio = reference
                .ref_key
                .and_then(|key| session.reference(key))
                .map(Biblio::parse);
            let short = biblio.as_ref().map(Biblio::short_label).unwrap_or_default();
            let _ = write!(
                html,
                "<details class=\"reference\"><summary>{} {}</summary><table class=\"statements\">",
                escape(label.as_str()),
                escape(short.as_str())
            );
            for row in biblio.iter().flat_map(Biblio::rows) {
                let _ = write!(html, "<tr><td>{}</td><td>", row.label);
                match &row.href {
                    Some(href) => {
                        let _ = write!(
                            html,
                            "<a href=\"{}\" target=\"_blank\">{}</a>",
                            escape(href.as_str()),
                            escape(row.text.as_str())
                        );
                    }
                    None => html.push_str(&escape(row.text.as_str())),
                }
                html.push_str("</td></tr>");
            }
            html.push_str("</table></details>");
        }
        html.push_str("</div>");
    }

    if let Some(concept) = wikipedia.and_then(|id| session.concept(id)) {
        if let Some(definition) = concept.definition() {
            let _ = write!(
                html,
                "<p class=\"definition\">{}</p>",
                escape(strip_wiki_emphasis(definition).as_str())
            );
        }
        let statements: Vec<_> = concept
            .statements
            .iter()
            .filter_map(|s| s.label().map(|label| (label, s.display_value())))
            .collect();
        if !statements.is_empty() {
            html.push_str("<details class=\"statements\"><summary>Wikidata statements</summary><table class=\"statements\">");
            for (label, value) in statements {
                let _ = write!(html, "<tr><td>{}</td><td>", escape(label));
                match value {
                    StatementValue::Text(text) => html.push_str(&escape(text.as_str())),
                    StatementValue::Link { href, text } => {
                        let _ = write!(
                            html,
                            "<a href=\"{}\" target=\"_blank\">{}</a>",
                            escape(href.as_str()),
                            escape(text.as_str())
                        );
                    }
                    StatementValue::Empty => {}
                }
                html.push_str("</td></tr>");
            }
            html.push_str("</table></details>");
        }
    }

    let wikidata = mention.wikidata_id.as_deref().or_else(|| {
        mention
            .dataset_component()
            .and_then(|c| c.wikidata_id.as_deref())
    });
    if wikipedia.is_some() || wikidata.is_some() {
        html.push_str("<p class=\"links\">");
        if let Some(id) = wikipedia {
            let _ = write!(
                html,
                "<a href=\"https://{}.wikipedia.org/wiki?curid={}\" target=\"_blank\">Wikipedia</a> ",
                escape(lang),
                id
            );
        }
        if let Some(id) = wikidata {
            let _ = write!(
                html,
                "<a href=\"https://www.wikidata.org/wiki/{}\" target=\"_blank\">Wikidata</a>",
                escape(id)
            );
        }
        html.push_str("</p>");
    }

    html.push_str("</div>");
    html
}

/// `<b>used</b> (<i>0.912</i>) - <b>shared</b> (<i>0.600</i>)`
fn attribute_scores(attributes: &ContextAttributes) -> String {
    attributes
        .entries()
        .into_iter()
        .filter(|(_, a)| a.value)
        .map(|(label, a)| format!("<b>{}</b> (<i>{:.3}</i>)", label, a.score))
        .collect::<Vec<_>>()
        .join(" - ")
}

/// Drop wiki bold/italic quote runs from a definition.
fn strip_wiki_emphasis(text: &str) -> String {
    text.replace("'''", "").replace("''", "")
}
