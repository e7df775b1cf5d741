//! # Text-Mode Highlighting
//!
//! Cuts the submitted text into literal and highlighted fragments.
//!
//! The walk keeps a cursor (in UTF-16 units, the service's coordinate
//! system). For each piece in start order: copy the text between the cursor
//! and the piece's start as a literal, emit the piece's own span as a
//! highlight, move the cursor to the piece's end. Whatever follows the last
//! piece is one trailing literal.
//!
//! Every byte of the input lands in exactly one fragment, so concatenating
//! the fragments gives the input back. Pieces that would break that (starting
//! behind the cursor, reversed, past the end) are skipped with a diagnostic.

use serde::Serialize;
use tracing::warn;

use super::{all_pieces, Diagnostic, Piece, Subtype};
use crate::model::Mention;
use crate::offset::Utf16Index;

/// A run of the source text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Fragment<'a> {
    /// Unannotated text, copied verbatim.
    Literal { text: &'a str },
    /// The span of one piece.
    #[serde(rename_all = "camelCase")]
    Highlight {
        text: &'a str,
        subtype: Subtype,
        /// Element id, `annot-{mention}-{piece}`.
        id: String,
        mention_index: usize,
    },
}

impl<'a> Fragment<'a> {
    pub fn text(&self) -> &'a str {
        match self {
            Fragment::Literal { text } | Fragment::Highlight { text, .. } => *text,
        }
    }

    pub fn is_highlight(&self) -> bool {
        matches!(self, Fragment::Highlight { .. })
    }
}

/// Result of laying out one text.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TextLayout<'a> {
    pub fragments: Vec<Fragment<'a>>,
    pub diagnostics: Vec<Diagnostic>,
}

impl<'a> TextLayout<'a> {
    /// Concatenation of all fragments. Equal to the laid-out text.
    pub fn text(&self) -> String {
        self.fragments.iter().map(Fragment::text).collect()
    }

    pub fn highlights(&self) -> impl Iterator<Item = &Fragment<'a>> {
        self.fragments.iter().filter(|f| f.is_highlight())
    }
}

/// Lay out every mention's pieces over `text`.
pub fn layout_text<'a>(text: &'a str, mentions: &[Mention]) -> TextLayout<'a> {
    layout_pieces(text, &all_pieces(mentions))
}

/// Lay out already ordered pieces over `text`.
pub fn layout_pieces<'a>(text: &'a str, pieces: &[Piece<'_>]) -> TextLayout<'a> {
    let index = Utf16Index::new(text);
    let len = index.len_utf16();
    let mut layout = TextLayout::default();

    // cursor in UTF-16 units, byte_cursor the same position in bytes
    let mut cursor = 0;
    let mut byte_cursor = 0;

    for piece in pieces {
        let (start, end) = match (piece.offset_start, piece.offset_end) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                skip(
                    &mut layout,
                    Diagnostic::MissingOffsets {
                        mention_index: piece.mention_index,
                        piece_index: piece.piece_index,
                    },
                );
                continue;
            }
        };

        if start < cursor {
            skip(
                &mut layout,
                Diagnostic::OutOfOrder {
                    mention_index: piece.mention_index,
                    piece_index: piece.piece_index,
                    start,
                    cursor,
                },
            );
            continue;
        }

        let Some(range) = index.byte_range(start, end) else {
            skip(
                &mut layout,
                Diagnostic::OutOfBounds {
                    mention_index: piece.mention_index,
                    piece_index: piece.piece_index,
                    start,
                    end,
                    len,
                },
            );
            continue;
        };

        if range.start > byte_cursor {
            layout.fragments.push(Fragment::Literal {
                text: &text[byte_cursor..range.start],
            });
        }
        layout.fragments.push(Fragment::Highlight {
            text: &text[range.clone()],
            subtype: piece.subtype,
            id: piece.element_id(),
            mention_index: piece.mention_index,
        });
        cursor = end;
        byte_cursor = range.end;
    }

    if byte_cursor < text.len() {
        layout.fragments.push(Fragment::Literal {
            text: &text[byte_cursor..],
        });
    }
    layout
}

fn skip(layout: &mut TextLayout<'_>, diagnostic: Diagnostic) {
    warn!("{}", diagnostic);
    layout.diagnostics.push(diagnostic);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Component;

    fn piece(subtype: Subtype, mention: usize, start: usize, end: usize) -> Piece<'static> {
        Piece {
            subtype,
            mention_index: mention,
            piece_index: 0,
            offset_start: Some(start),
            offset_end: Some(end),
            raw_form: "",
            bounding_boxes: &[],
        }
    }

    #[test]
    fn test_single_highlight() {
        let text = "We used the GEO database.";
        let layout = layout_pieces(text, &[piece(Subtype::DatasetName, 0, 12, 15)]);
        assert_eq!(layout.fragments.len(), 3);
        assert_eq!(layout.fragments[0].text(), "We used the ");
        assert_eq!(
            layout.fragments[1],
            Fragment::Highlight {
                text: "GEO",
                subtype: Subtype::DatasetName,
                id: "annot-0-0".to_string(),
                mention_index: 0,
            }
        );
        assert_eq!(layout.fragments[2].text(), " database.");
        assert_eq!(layout.text(), text);
    }

    #[test]
    fn test_adjacent_highlights_have_no_empty_literal() {
        let text = "ABCD";
        let layout = layout_pieces(
            text,
            &[
                piece(Subtype::DatasetName, 0, 0, 2),
                piece(Subtype::Url, 1, 2, 4),
            ],
        );
        assert_eq!(layout.fragments.len(), 2);
        assert!(layout.fragments.iter().all(Fragment::is_highlight));
        assert_eq!(layout.text(), text);
    }

    #[test]
    fn test_piece_behind_cursor_is_skipped() {
        let text = "alpha beta gamma";
        let layout = layout_pieces(
            text,
            &[
                piece(Subtype::DatasetName, 0, 0, 10),
                piece(Subtype::DataDevice, 1, 6, 10),
                piece(Subtype::Url, 2, 11, 16),
            ],
        );
        assert_eq!(layout.highlights().count(), 2);
        assert_eq!(
            layout.diagnostics,
            vec![Diagnostic::OutOfOrder {
                mention_index: 1,
                piece_index: 0,
                start: 6,
                cursor: 10,
            }]
        );
        assert_eq!(layout.text(), text);
    }

    #[test]
    fn test_out_of_bounds_and_missing_offsets() {
        let text = "short";
        let mut missing = piece(Subtype::Url, 0, 0, 0);
        missing.offset_end = None;
        let layout = layout_pieces(
            text,
            &[
                missing,
                piece(Subtype::DatasetName, 1, 2, 99),
                piece(Subtype::Publisher, 2, 4, 3),
            ],
        );
        assert_eq!(layout.highlights().count(), 0);
        assert_eq!(layout.diagnostics.len(), 3);
        assert!(matches!(
            layout.diagnostics[1],
            Diagnostic::OutOfBounds { len: 5, .. }
        ));
        assert_eq!(layout.text(), text);
    }

    #[test]
    fn test_utf16_offsets_on_non_ascii_text() {
        // "é" is one UTF-16 unit, "𝔸" two
        let text = "café 𝔸 GEO";
        let layout = layout_pieces(text, &[piece(Subtype::DatasetName, 0, 8, 11)]);
        assert_eq!(layout.fragments[1].text(), "GEO");
        assert_eq!(layout.text(), text);
    }

    #[test]
    fn test_layout_text_across_mentions() {
        let text = "Data from GEO and ArrayExpress were used.";
        let mentions = vec![
            Mention {
                dataset_name: Some(Component {
                    raw_form: "ArrayExpress".to_string(),
                    offset_start: Some(18),
                    offset_end: Some(30),
                    ..Default::default()
                }),
                ..Default::default()
            },
            Mention {
                dataset_name: Some(Component {
                    raw_form: "GEO".to_string(),
                    offset_start: Some(10),
                    offset_end: Some(13),
                    ..Default::default()
                }),
                ..Default::default()
            },
        ];
        let layout = layout_text(text, &mentions);
        let ids: Vec<_> = layout
            .highlights()
            .map(|f| match f {
                Fragment::Highlight { id, .. } => id.as_str(),
                Fragment::Literal { .. } => unreachable!(),
            })
            .collect();
        assert_eq!(ids, vec!["annot-1-0", "annot-0-0"]);
        assert!(layout.diagnostics.is_empty());
        assert_eq!(layout.text(), text);
    }

    #[test]
    fn test_empty_text_without_pieces() {
        let layout = layout_pieces("", &[]);
        assert!(layout.fragments.is_empty());
        assert_eq!(layout.text(), "");
    }
}
