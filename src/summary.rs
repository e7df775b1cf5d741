//! # Summary Index
//!
//! One row per distinct dataset: how often it is mentioned, where each
//! occurrence is, and whether the document uses, creates or shares it.
//!
//! Occurrences are identified by the element id of the dataset piece they
//! point at, with the page appended after an underscore when the piece has a
//! bounding box: `annot-3-0-0_7` is mention 3, piece 0, box 0, on page 7.
//! Without a page (text mode) the id is the piece's highlight id,
//! `annot-3-0`. Occurrences without a page sort before every paged one.

use std::collections::HashMap;

use serde::Serialize;

use crate::layout::{extract_pieces, Subtype};
use crate::model::{ContextAttributes, Mention, MentionType};

/// One occurrence of a dataset, keyed by element id plus page suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Occurrence {
    pub key: String,
}

impl Occurrence {
    fn new(mention_index: usize, piece_index: usize, page: Option<u32>) -> Self {
        let key = match page {
            Some(page) => format!("annot-{}-{}-0_{}", mention_index, piece_index, page),
            None => format!("annot-{}-{}", mention_index, piece_index),
        };
        Self { key }
    }

    /// Element id of the occurrence, without the page suffix.
    pub fn anchor(&self) -> &str {
        self.key
            .split_once('_')
            .map(|(anchor, _)| anchor)
            .unwrap_or(&self.key)
    }

    /// Page parsed from the key suffix; `None` sorts before any page.
    pub fn page(&self) -> Option<u32> {
        self.key
            .split_once('_')
            .and_then(|(_, page)| page.parse().ok())
    }
}

/// Aggregate of all mentions sharing a normalized dataset name.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRow {
    pub name: String,
    pub mention_type: Option<MentionType>,
    pub occurrences: Vec<Occurrence>,
    /// Space-separated labels among `used`, `created`, `shared`.
    pub usage: String,
}

impl SummaryRow {
    pub fn count(&self) -> usize {
        self.occurrences.len()
    }

    /// Short label for the row's type column.
    pub fn type_label(&self) -> &'static str {
        match self.mention_type {
            Some(MentionType::DatasetName) => "named",
            Some(MentionType::DatasetImplicit) => "implicit",
            _ => "",
        }
    }
}

/// The summary index of one response.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub mention_count: usize,
    pub named: Vec<SummaryRow>,
    pub implicit: Vec<SummaryRow>,
}

impl Summary {
    /// Rows in display order: named datasets, then the rest.
    pub fn rows(&self) -> impl Iterator<Item = &SummaryRow> {
        self.named.iter().chain(self.implicit.iter())
    }

    pub fn row(&self, name: &str) -> Option<&SummaryRow> {
        self.rows().find(|r| r.name == name)
    }
}

/// Group mentions by normalized dataset name.
///
/// Groups keep first-seen order within each bucket. A group's type is that of
/// its first mention; its usage comes from the last mention in the group that
/// carries document-level context attributes.
pub fn summarize(mentions: &[Mention]) -> Summary {
    struct Group {
        row: SummaryRow,
        attributes: Option<ContextAttributes>,
    }

    let mut groups: Vec<Group> = Vec::new();
    let mut by_name: HashMap<&str, usize> = HashMap::new();

    for (mention_index, mention) in mentions.iter().enumerate() {
        let Some((component, name)) = mention.naming_component() else {
            continue;
        };
        let subtype = match &mention.dataset_name {
            Some(c) if std::ptr::eq(c, component) => Subtype::DatasetName,
            _ => Subtype::DatasetImplicit,
        };
        let piece_index = extract_pieces(mention_index, mention)
            .iter()
            .find(|p| p.subtype == subtype)
            .map(|p| p.piece_index)
            .unwrap_or(0);
        let page = component.bounding_boxes.first().map(|b| b.page);

        let slot = *by_name.entry(name).or_insert_with(|| {
            groups.push(Group {
                row: SummaryRow {
                    name: name.to_string(),
                    mention_type: mention.mention_type.clone(),
                    occurrences: Vec::new(),
                    usage: String::new(),
                },
                attributes: None,
            });
            groups.len() - 1
        });

        let group = &mut groups[slot];
        group
            .row
            .occurrences
            .push(Occurrence::new(mention_index, piece_index, page));
        if let Some(attributes) = mention.document_context_attributes {
            group.attributes = Some(attributes);
        }
    }

    let mut summary = Summary {
        mention_count: mentions.len(),
        ..Default::default()
    };
    for group in groups {
        let mut row = group.row;
        row.occurrences.sort_by_key(Occurrence::page);
        row.usage = group.attributes.map(|a| a.usage()).unwrap_or_default();
        if row.mention_type == Some(MentionType::DatasetName) {
            summary.named.push(row);
        } else {
            summary.implicit.push(row);
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attribute, BoundingBox, Component};

    fn named(name: &str, page: Option<u32>) -> Mention {
        Mention {
            mention_type: Some(MentionType::DatasetName),
            dataset_name: Some(Component {
                raw_form: name.to_string(),
                normalized_form: Some(name.to_string()),
                bounding_boxes: page
                    .map(|p| {
                        vec![BoundingBox {
                            page: p,
                            x: 0.0,
                            y: 0.0,
                            w: 1.0,
                            h: 1.0,
                        }]
                    })
                    .unwrap_or_default(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn implicit(name: &str) -> Mention {
        Mention {
            mention_type: Some(MentionType::DatasetImplicit),
            dataset_implicit: Some(Component {
                raw_form: name.to_string(),
                normalized_form: Some(name.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_same_name_merges() {
        let summary = summarize(&[named("GEO", Some(2)), named("GEO", Some(1))]);
        assert_eq!(summary.mention_count, 2);
        assert_eq!(summary.named.len(), 1);
        let row = &summary.named[0];
        assert_eq!(row.count(), 2);
        assert_eq!(row.type_label(), "named");
        // sorted by page
        assert_eq!(row.occurrences[0].key, "annot-1-0-0_1");
        assert_eq!(row.occurrences[1].key, "annot-0-0-0_2");
    }

    #[test]
    fn test_unpaged_occurrence_sorts_first() {
        let summary = summarize(&[named("GEO", Some(3)), named("GEO", None)]);
        let row = summary.row("GEO").unwrap();
        assert_eq!(row.occurrences[0].page(), None);
        assert_eq!(row.occurrences[0].anchor(), "annot-1-0");
        assert_eq!(row.occurrences[1].page(), Some(3));
        assert_eq!(row.occurrences[1].anchor(), "annot-0-0-0");
    }

    #[test]
    fn test_named_rows_before_implicit() {
        let summary = summarize(&[implicit("survey data"), named("GEO", None)]);
        let names: Vec<_> = summary.rows().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["GEO", "survey data"]);
        assert_eq!(summary.implicit[0].type_label(), "implicit");
    }

    #[test]
    fn test_usage_from_document_attributes() {
        let mut first = named("GEO", None);
        first.document_context_attributes = Some(ContextAttributes {
            used: Attribute {
                value: true,
                score: 0.9,
            },
            ..Default::default()
        });
        let mut second = named("GEO", None);
        second.document_context_attributes = Some(ContextAttributes {
            used: Attribute {
                value: true,
                score: 0.9,
            },
            created: Attribute {
                value: false,
                score: 0.1,
            },
            shared: Attribute {
                value: true,
                score: 0.7,
            },
        });
        let summary = summarize(&[first, second, named("GEO", None)]);
        assert_eq!(summary.named[0].usage, "used shared");
    }

    #[test]
    fn test_mentions_without_name_are_counted_not_grouped() {
        let summary = summarize(&[Mention::default(), named("GEO", None)]);
        assert_eq!(summary.mention_count, 2);
        assert_eq!(summary.rows().count(), 1);
    }

    #[test]
    fn test_empty_normalized_name_is_not_a_group() {
        let mut first = named("GEO", Some(1));
        let mut second = named("GEO", Some(2));
        for mention in [&mut first, &mut second] {
            if let Some(c) = mention.dataset_name.as_mut() {
                c.normalized_form = Some(String::new());
            }
        }
        let summary = summarize(&[first, second]);
        assert_eq!(summary.mention_count, 2);
        assert_eq!(summary.rows().count(), 0);
    }

    #[test]
    fn test_unnormalized_name_falls_back_to_implicit() {
        let mut mention = implicit("survey");
        mention.mention_type = Some(MentionType::DatasetName);
        mention.dataset_name = Some(Component {
            raw_form: "the survey".to_string(),
            offset_start: Some(0),
            bounding_boxes: vec![BoundingBox {
                page: 4,
                x: 0.0,
                y: 0.0,
                w: 1.0,
                h: 1.0,
            }],
            ..Default::default()
        });
        if let Some(c) = mention.dataset_implicit.as_mut() {
            c.offset_start = Some(4);
            c.bounding_boxes = vec![BoundingBox {
                page: 5,
                x: 0.0,
                y: 0.0,
                w: 1.0,
                h: 1.0,
            }];
        }

        let summary = summarize(&[mention]);
        let names: Vec<_> = summary.rows().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["survey"]);
        // the implicit piece, second by offset, on its own page
        assert_eq!(summary.named[0].occurrences[0].key, "annot-0-1-0_5");
    }

    #[test]
    fn test_piece_index_follows_ordering() {
        let mut mention = named("GEO", Some(1));
        if let Some(c) = mention.dataset_name.as_mut() {
            c.offset_start = Some(10);
        }
        mention.data_device = Some(Component {
            raw_form: "HiSeq".to_string(),
            offset_start: Some(2),
            ..Default::default()
        });
        let summary = summarize(&[mention]);
        assert_eq!(summary.named[0].occurrences[0].key, "annot-0-1-0_1");
    }
}
