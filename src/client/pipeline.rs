//! Request pipelines: submit, then lay out, then look up.
//!
//! Each pipeline begins a new session generation before submitting. For
//! documents, overlays are planned as soon as the response arrives, but a
//! page's overlays are only placed once that page's render has resolved with
//! its canvas size. Pages render concurrently and are placed in whatever
//! order they finish. Concept and thumbnail lookups run alongside the
//! renders.
//!
//! If another request begins while one is in flight, the older one notices at
//! its next checkpoint and returns [`DatastetError::Stale`] instead of writing
//! into the newer request's state.

use std::collections::BTreeSet;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{DatastetClient, Document, ProcessOptions};
use crate::error::{DatastetError, Result};
use crate::layout::{layout_text, CanvasSize, Diagnostic, OverlayPlan, PlacedPage, TextLayout};
use crate::model::{AnnotationResponse, PageInfo};
use crate::session::{Generation, Session};
use crate::summary::{summarize, Summary};

/// Draws PDF pages and reports the pixel size each one ended up with.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Render 1-based `page`, whose native size is `geometry`.
    async fn render(&self, page: u32, geometry: PageInfo) -> Result<CanvasSize>;
}

/// Renders nothing; every page is sized to a fixed width at its own aspect
/// ratio. Enough to position overlays for offline output.
#[derive(Debug, Clone, Copy)]
pub struct FitWidth(pub f64);

#[async_trait]
impl PageRenderer for FitWidth {
    async fn render(&self, _page: u32, geometry: PageInfo) -> Result<CanvasSize> {
        Ok(CanvasSize::fit_width(&geometry, self.0))
    }
}

/// An annotated text, ready to lay out.
#[derive(Debug, Clone)]
pub struct TextView {
    pub generation: Generation,
    pub response: AnnotationResponse,
    pub summary: Summary,
}

impl TextView {
    /// Lay the response out over the text that was submitted.
    pub fn layout<'a>(&self, text: &'a str) -> TextLayout<'a> {
        layout_text(text, &self.response.mentions)
    }
}

/// An annotated document with its overlays placed.
#[derive(Debug, Clone)]
pub struct DocumentView {
    pub generation: Generation,
    pub response: AnnotationResponse,
    /// Placed pages, ascending. Pages that failed to render are absent.
    pub pages: Vec<PlacedPage>,
    pub diagnostics: Vec<Diagnostic>,
    pub summary: Summary,
}

impl DatastetClient {
    /// Annotate a text, then (if `lookups`) fetch concepts and thumbnails.
    pub async fn view_text(
        &self,
        session: &Mutex<Session>,
        text: &str,
        lookups: bool,
    ) -> Result<TextView> {
        let generation = session.lock().await.begin();
        let response = self.annotate_text(text).await?;
        checkpoint(session, generation).await?;
        info!("{} mentions in text", response.mentions.len());

        if lookups {
            tokio::join!(
                self.resolve_concepts(session, generation, &response.mentions),
                self.resolve_thumbnails(session, &response.mentions)
            );
        }
        let summary = summarize(&response.mentions);
        Ok(TextView {
            generation,
            response,
            summary,
        })
    }

    /// Annotate a document and place its overlays page by page as the
    /// renderer finishes each page.
    ///
    /// A failed annotation request fails the whole call and no page is
    /// rendered. A page that fails to render only loses its own overlays.
    pub async fn view_document<R: PageRenderer + ?Sized>(
        &self,
        session: &Mutex<Session>,
        renderer: &R,
        document: &Document,
        options: ProcessOptions,
        lookups: bool,
    ) -> Result<DocumentView> {
        let generation = session.lock().await.begin();
        let response = self.annotate_document(document, options).await?;
        session
            .lock()
            .await
            .install_references(generation, &response)?;

        let plan = OverlayPlan::from_response(&response);
        info!(
            "{} mentions, {} overlays on {} pages",
            response.mentions.len(),
            plan.len(),
            response.pages.len()
        );

        let placement = place_pages(session, generation, renderer, &response, &plan);
        let pages = if lookups {
            let (pages, _, _) = tokio::join!(
                placement,
                self.resolve_concepts(session, generation, &response.mentions),
                self.resolve_thumbnails(session, &response.mentions)
            );
            pages?
        } else {
            placement.await?
        };

        let summary = summarize(&response.mentions);
        Ok(DocumentView {
            generation,
            diagnostics: plan.diagnostics,
            response,
            pages,
            summary,
        })
    }
}

/// Render every page and place its overlays as each render resolves.
pub async fn place_pages<R: PageRenderer + ?Sized>(
    session: &Mutex<Session>,
    generation: Generation,
    renderer: &R,
    response: &AnnotationResponse,
    plan: &OverlayPlan,
) -> Result<Vec<PlacedPage>> {
    // every page of the document, plus pages only known from bounding boxes
    let numbers: BTreeSet<u32> = (1..=response.pages.len() as u32)
        .chain(plan.pages())
        .collect();

    let mut renders: FuturesUnordered<_> = numbers
        .into_iter()
        .filter_map(|page| {
            let geometry = response
                .page(page)
                .copied()
                .or_else(|| plan.planned(page).first().map(|p| p.geometry))?;
            Some(async move { (page, renderer.render(page, geometry).await) })
        })
        .collect();

    let mut placed = Vec::new();
    while let Some((page, canvas)) = renders.next().await {
        checkpoint(session, generation).await?;
        match canvas {
            Ok(canvas) => placed.push(plan.place(page, canvas)),
            Err(e) => warn!("Page {} did not render, skipping its overlays: {}", page, e),
        }
    }
    placed.sort_by_key(|p| p.page);
    Ok(placed)
}

async fn checkpoint(session: &Mutex<Session>, generation: Generation) -> Result<()> {
    let result = session.lock().await.check(generation);
    if let Err(DatastetError::Stale { generation }) = &result {
        warn!("Abandoning request of generation {}: superseded", generation);
    }
    result
}
