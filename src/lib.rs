//! # datastet-view
//!
//! Layout and rendering of dataset-mention annotations.
//!
//! The annotation service reads a sentence or a whole paper and answers with
//! a flat list of mentions: each one a bundle of components (the dataset's
//! name, the device that produced it, a URL, a publisher, bibliographic
//! callouts), each located by character offsets and, for PDFs, by bounding
//! boxes on the page. This crate turns that list into something a reader can
//! look at: highlighted text, boxes drawn over rendered PDF pages, an index
//! of the datasets found, and a detail card per mention.
//!
//! ## Architecture
//!
//! ```text
//! Service response (JSON)
//!       ↓
//!   [model]     — Typed mentions, components, page geometry
//!       ↓
//!   [layout]    — Pieces, ordered; text fragments or page overlays
//!       ↓
//!   [summary]   — One row per dataset, occurrences sorted by page
//!       ↓
//!   [html]      — Highlights, overlays, index, detail cards
//! ```
//!
//! Around the core: [`client`] talks to the service and runs the
//! request-to-overlay pipeline, [`session`] holds what one request fetched,
//! [`biblio`] reads reference records, [`config`] holds the endpoints.

pub mod biblio;
pub mod config;
pub mod error;
pub mod html;
pub mod layout;
pub mod model;
pub mod offset;
pub mod session;
pub mod summary;

#[cfg(feature = "client")]
pub mod client;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use error::{DatastetError, Result};

use layout::{layout_text, CanvasSize, OverlayPlan, PlacedPage};
use model::AnnotationResponse;

/// Highlight `text` with the mentions of a service response given as JSON,
/// and return the HTML paragraphs.
pub fn render_text_html(text: &str, json: &str) -> Result<String> {
    let response = AnnotationResponse::from_json(json)?;
    Ok(html::text_view(&layout_text(text, &response.mentions)))
}

/// Place the overlays of every page of a response, each page rendered at
/// `width` pixels wide.
pub fn place_all(response: &AnnotationResponse, width: f64) -> (OverlayPlan, Vec<PlacedPage>) {
    let plan = OverlayPlan::from_response(response);
    let pages = plan
        .pages()
        .filter_map(|page| {
            let geometry = response
                .page(page)
                .copied()
                .or_else(|| plan.planned(page).first().map(|p| p.geometry))?;
            Some(plan.place(page, CanvasSize::fit_width(&geometry, width)))
        })
        .collect();
    (plan, pages)
}

/// Example sentences for trying the service.
pub const EXAMPLE_SENTENCES: [&str; 4] = [
    "Insulin levels of all samples were measured by ELISA kit (Mercodia).",
    "Temperatures and depths of oil reservoirs were retrieved from the well logs.",
    "The cap was then tightened to create a hypoxic condition (with DO of 0.8 mg/L, measured using a HI 98194 Multiparameter Waterproof Meter, Hanna instruments, Romania).",
    "The sequences were analysed using the ION PGM system with ion 316 chip kit V2 (Life Technologies, CA, USA) following the manufacturer's recommended protocols.",
];
