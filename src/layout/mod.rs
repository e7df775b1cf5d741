//! # Annotation Layout
//!
//! Turns the service's flat mention list into something that can be drawn.
//!
//! A mention is not one span: it is a bundle of components (dataset name,
//! device, URL, publisher, reference callouts), each located independently in
//! the source. Layout first promotes every component to a uniform [`Piece`],
//! orders the pieces, and then walks them with a cursor:
//!
//! ```text
//! mentions ──► pieces (per mention, stable by offsetStart)
//!                 │
//!                 ├─► [highlight]  text mode: flatten, re-sort, cut the text
//!                 │                into literal / highlighted fragments
//!                 │
//!                 └─► [overlay]    PDF mode: one rectangle per bounding box,
//!                                  scaled to the rendered page
//! ```
//!
//! Nothing here fails. The service is trusted to send pieces that can be laid
//! out left to right; when it doesn't, the offending piece is skipped, a
//! [`Diagnostic`] is recorded and layout carries on, so a partially broken
//! response still renders everything that can be rendered.

pub mod highlight;
pub mod overlay;

use std::fmt;

use serde::Serialize;

use crate::model::{BoundingBox, Component, Mention};

pub use highlight::{layout_pieces, layout_text, Fragment, TextLayout};
pub use overlay::{
    position, CanvasSize, Overlay, OverlayPlan, OverlayRect, PlacedPage, PlannedOverlay, Scale,
};

/// The component category a piece came from. Doubles as the CSS class of its
/// highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Subtype {
    DatasetName,
    DatasetImplicit,
    DataDevice,
    Url,
    Publisher,
    Reference,
}

impl Subtype {
    pub fn as_str(self) -> &'static str {
        match self {
            Subtype::DatasetName => "dataset-name",
            Subtype::DatasetImplicit => "dataset-implicit",
            Subtype::DataDevice => "data-device",
            Subtype::Url => "url",
            Subtype::Publisher => "publisher",
            Subtype::Reference => "reference",
        }
    }
}

impl fmt::Display for Subtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One component of a mention, in the uniform shape layout works on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Piece<'a> {
    pub subtype: Subtype,
    /// Index of the owning mention in the response.
    pub mention_index: usize,
    /// Position in the owning mention's ordered piece list.
    pub piece_index: usize,
    pub offset_start: Option<usize>,
    pub offset_end: Option<usize>,
    pub raw_form: &'a str,
    pub bounding_boxes: &'a [BoundingBox],
}

impl<'a> Piece<'a> {
    fn from_component(subtype: Subtype, mention_index: usize, c: &'a Component) -> Self {
        Piece {
            subtype,
            mention_index,
            piece_index: 0,
            offset_start: c.offset_start,
            offset_end: c.offset_end,
            raw_form: &c.raw_form,
            bounding_boxes: &c.bounding_boxes,
        }
    }

    /// Element id of this piece's text highlight.
    pub fn element_id(&self) -> String {
        format!("annot-{}-{}", self.mention_index, self.piece_index)
    }

    fn sort_key(&self) -> usize {
        self.offset_start.unwrap_or(usize::MAX)
    }
}

/// The ordered pieces of one mention.
///
/// Insertion order is name, implicit name, device, URL, publisher, then
/// references in list order; the sort by start offset is stable, so that
/// order breaks ties. Pieces without a start offset go last.
pub fn extract_pieces(mention_index: usize, mention: &Mention) -> Vec<Piece<'_>> {
    let components = [
        (Subtype::DatasetName, &mention.dataset_name),
        (Subtype::DatasetImplicit, &mention.dataset_implicit),
        (Subtype::DataDevice, &mention.data_device),
        (Subtype::Url, &mention.url),
        (Subtype::Publisher, &mention.publisher),
    ];

    let mut pieces: Vec<Piece<'_>> = components
        .into_iter()
        .filter_map(|(subtype, c)| {
            c.as_ref()
                .map(|c| Piece::from_component(subtype, mention_index, c))
        })
        .collect();

    pieces.extend(mention.references.iter().map(|r| Piece {
        subtype: Subtype::Reference,
        mention_index,
        piece_index: 0,
        offset_start: r.offset_start,
        offset_end: r.offset_end,
        raw_form: r.text(),
        bounding_boxes: &r.bounding_boxes,
    }));

    pieces.sort_by_key(Piece::sort_key);
    for (i, piece) in pieces.iter_mut().enumerate() {
        piece.piece_index = i;
    }
    pieces
}

/// Pieces of every mention, flattened and re-sorted (stably) by start offset.
pub fn all_pieces(mentions: &[Mention]) -> Vec<Piece<'_>> {
    let mut pieces: Vec<Piece<'_>> = mentions
        .iter()
        .enumerate()
        .flat_map(|(i, m)| extract_pieces(i, m))
        .collect();
    pieces.sort_by_key(Piece::sort_key);
    pieces
}

/// A piece that could not be laid out, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Diagnostic {
    /// The piece starts before text that has already been written.
    #[serde(rename_all = "camelCase")]
    OutOfOrder {
        mention_index: usize,
        piece_index: usize,
        start: usize,
        cursor: usize,
    },
    /// The piece has no offsets to place it by.
    #[serde(rename_all = "camelCase")]
    MissingOffsets {
        mention_index: usize,
        piece_index: usize,
    },
    /// The offsets are reversed, past the end, or split a character.
    #[serde(rename_all = "camelCase")]
    OutOfBounds {
        mention_index: usize,
        piece_index: usize,
        start: usize,
        end: usize,
        len: usize,
    },
    /// A bounding box names a page with no known geometry.
    #[serde(rename_all = "camelCase")]
    MissingPageGeometry {
        mention_index: usize,
        piece_index: usize,
        page: u32,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::OutOfOrder {
                mention_index,
                piece_index,
                start,
                cursor,
            } => write!(
                f,
                "piece annot-{}-{} starts at {} but text up to {} is already laid out; \
                 mention order in the response is not valid for sequential rendering",
                mention_index, piece_index, start, cursor
            ),
            Diagnostic::MissingOffsets {
                mention_index,
                piece_index,
            } => write!(f, "piece annot-{}-{} has no offsets", mention_index, piece_index),
            Diagnostic::OutOfBounds {
                mention_index,
                piece_index,
                start,
                end,
                len,
            } => write!(
                f,
                "piece annot-{}-{} spans {}..{} outside text of length {}",
                mention_index, piece_index, start, end, len
            ),
            Diagnostic::MissingPageGeometry {
                mention_index,
                piece_index,
                page,
            } => write!(
                f,
                "piece annot-{}-{} is on page {} with no page geometry",
                mention_index, piece_index, page
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReferencePiece;

    fn component(raw: &str, start: usize, end: usize) -> Component {
        Component {
            raw_form: raw.to_string(),
            offset_start: Some(start),
            offset_end: Some(end),
            ..Default::default()
        }
    }

    #[test]
    fn test_pieces_sorted_by_start() {
        let mention = Mention {
            dataset_name: Some(component("GEO", 20, 23)),
            data_device: Some(component("sequencer", 5, 14)),
            url: Some(component("http://x", 30, 38)),
            ..Default::default()
        };
        let pieces = extract_pieces(3, &mention);
        let order: Vec<_> = pieces.iter().map(|p| p.subtype).collect();
        assert_eq!(
            order,
            vec![Subtype::DataDevice, Subtype::DatasetName, Subtype::Url]
        );
        assert_eq!(pieces[1].element_id(), "annot-3-1");
    }

    #[test]
    fn test_equal_starts_keep_insertion_order() {
        let mention = Mention {
            dataset_name: Some(component("a", 4, 5)),
            publisher: Some(component("b", 4, 5)),
            data_device: Some(component("c", 4, 5)),
            ..Default::default()
        };
        let order: Vec<_> = extract_pieces(0, &mention)
            .iter()
            .map(|p| p.subtype)
            .collect();
        assert_eq!(
            order,
            vec![Subtype::DatasetName, Subtype::DataDevice, Subtype::Publisher]
        );
    }

    #[test]
    fn test_reference_uses_label_without_raw_form() {
        let mention = Mention {
            references: vec![ReferencePiece {
                label: Some("[4]".to_string()),
                offset_start: Some(1),
                offset_end: Some(4),
                ..Default::default()
            }],
            ..Default::default()
        };
        let pieces = extract_pieces(0, &mention);
        assert_eq!(pieces[0].subtype, Subtype::Reference);
        assert_eq!(pieces[0].raw_form, "[4]");
    }

    #[test]
    fn test_pieces_without_offsets_go_last() {
        let mention = Mention {
            dataset_name: Some(Component {
                raw_form: "x".to_string(),
                ..Default::default()
            }),
            url: Some(component("u", 2, 3)),
            ..Default::default()
        };
        let pieces = extract_pieces(0, &mention);
        assert_eq!(pieces[0].subtype, Subtype::Url);
        assert_eq!(pieces[1].offset_start, None);
    }

    #[test]
    fn test_all_pieces_interleaves_mentions() {
        let mentions = vec![
            Mention {
                dataset_name: Some(component("late", 50, 54)),
                ..Default::default()
            },
            Mention {
                dataset_name: Some(component("early", 0, 5)),
                ..Default::default()
            },
        ];
        let pieces = all_pieces(&mentions);
        assert_eq!(pieces[0].mention_index, 1);
        assert_eq!(pieces[1].mention_index, 0);
    }
}
