//! # PDF Overlay Positioning
//!
//! Bounding boxes arrive in PDF units on the page's native coordinate system
//! (top-left origin). The page is displayed as a canvas of some pixel size
//! that is only known once the page has been rendered. Positioning is
//! therefore split in two:
//!
//! 1. [`OverlayPlan::from_response`] resolves every box to its page and page
//!    geometry. No pixels involved.
//! 2. [`OverlayPlan::place`] takes one page's canvas size, derives the scale
//!    and produces pixel rectangles for that page only.
//!
//! Step 2 can run per page as each render completes. Each box yields exactly
//! one overlay, padded by one pixel on every side for the highlight border;
//! boxes are never merged, even when they touch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{extract_pieces, Diagnostic, Subtype};
use crate::model::{AnnotationResponse, BoundingBox, PageInfo};

/// Pixels added around each box for the highlight border.
pub const BORDER_PAD: f64 = 1.0;

/// Pixel size of a rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl CanvasSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Canvas for a page rendered to a target width, keeping its aspect
    /// ratio.
    pub fn fit_width(page: &PageInfo, width: f64) -> Self {
        let scale = if page.page_width > 0.0 {
            width / page.page_width
        } else {
            1.0
        };
        Self {
            width,
            height: page.page_height * scale,
        }
    }
}

/// PDF units to pixels, per axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Scale {
    pub x: f64,
    pub y: f64,
}

impl Scale {
    pub fn new(page: &PageInfo, canvas: CanvasSize) -> Self {
        Self {
            x: canvas.width / page.page_width,
            y: canvas.height / page.page_height,
        }
    }
}

/// Absolute position of an overlay inside its page container, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverlayRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Pixel rectangle of one bounding box.
pub fn position(bbox: &BoundingBox, scale: Scale) -> OverlayRect {
    OverlayRect {
        left: bbox.x * scale.x - BORDER_PAD,
        top: bbox.y * scale.y - BORDER_PAD,
        width: bbox.w * scale.x + BORDER_PAD,
        height: bbox.h * scale.y + BORDER_PAD,
    }
}

/// A bounding box resolved to its page, waiting for the page's canvas size.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedOverlay {
    /// Element id, `annot-{mention}-{piece}-{box}`.
    pub id: String,
    pub page: u32,
    pub subtype: Subtype,
    pub mention_index: usize,
    pub piece_index: usize,
    pub raw_form: String,
    pub bbox: BoundingBox,
    pub geometry: PageInfo,
}

/// A positioned overlay.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overlay {
    pub id: String,
    pub page: u32,
    pub subtype: Subtype,
    pub mention_index: usize,
    pub raw_form: String,
    pub rect: OverlayRect,
}

/// All overlays of one rendered page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedPage {
    pub page: u32,
    pub canvas: CanvasSize,
    pub scale: Option<Scale>,
    pub overlays: Vec<Overlay>,
}

/// Overlays of a response grouped by page, in PDF units.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OverlayPlan {
    pages: BTreeMap<u32, Vec<PlannedOverlay>>,
    pub diagnostics: Vec<Diagnostic>,
}

impl OverlayPlan {
    /// Resolve every bounding box of every piece of every mention.
    ///
    /// A box on a page missing from `pages[]` borrows the geometry of the
    /// last page resolved before it; a box with nothing to borrow from is
    /// skipped with a diagnostic.
    pub fn from_response(response: &AnnotationResponse) -> Self {
        let mut plan = OverlayPlan::default();
        let mut last_geometry: Option<PageInfo> = None;

        for (mention_index, mention) in response.mentions.iter().enumerate() {
            for piece in extract_pieces(mention_index, mention) {
                for (box_index, bbox) in piece.bounding_boxes.iter().enumerate() {
                    if let Some(geometry) = response.page(bbox.page) {
                        last_geometry = Some(*geometry);
                    }
                    let Some(geometry) = last_geometry else {
                        let diagnostic = Diagnostic::MissingPageGeometry {
                            mention_index,
                            piece_index: piece.piece_index,
                            page: bbox.page,
                        };
                        warn!("{}", diagnostic);
                        plan.diagnostics.push(diagnostic);
                        continue;
                    };

                    plan.pages.entry(bbox.page).or_default().push(PlannedOverlay {
                        id: format!("annot-{}-{}-{}", mention_index, piece.piece_index, box_index),
                        page: bbox.page,
                        subtype: piece.subtype,
                        mention_index,
                        piece_index: piece.piece_index,
                        raw_form: piece.raw_form.to_string(),
                        bbox: *bbox,
                        geometry,
                    });
                }
            }
        }
        plan
    }

    /// Pages that carry at least one overlay, ascending.
    pub fn pages(&self) -> impl Iterator<Item = u32> + '_ {
        self.pages.keys().copied()
    }

    pub fn planned(&self, page: u32) -> &[PlannedOverlay] {
        self.pages.get(&page).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.pages.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Position the overlays of `page` on a canvas of the given size.
    pub fn place(&self, page: u32, canvas: CanvasSize) -> PlacedPage {
        let planned = self.planned(page);
        let overlays = planned
            .iter()
            .map(|p| Overlay {
                id: p.id.clone(),
                page: p.page,
                subtype: p.subtype,
                mention_index: p.mention_index,
                raw_form: p.raw_form.clone(),
                rect: position(&p.bbox, Scale::new(&p.geometry, canvas)),
            })
            .collect();
        PlacedPage {
            page,
            canvas,
            scale: planned.first().map(|p| Scale::new(&p.geometry, canvas)),
            overlays,
        }
    }
}
