//! JavaScript bindings for the browser demo.
//!
//! Each function takes the service's response as a JSON string and returns a
//! plain JS value (or an HTML string). Errors become JS exceptions.

use wasm_bindgen::prelude::*;

use crate::error::DatastetError;
use crate::layout::{layout_text as layout, CanvasSize, OverlayPlan};
use crate::model::AnnotationResponse;
use crate::summary::summarize;

fn to_js(e: DatastetError) -> JsValue {
    let message = match e.hint() {
        "" => e.to_string(),
        hint => format!("{} ({})", e, hint),
    };
    js_sys::Error::new(&message).into()
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| js_sys::Error::new(&e.to_string()).into())
}

/// Text fragments and diagnostics for `text` annotated by `json`.
#[wasm_bindgen(js_name = layoutText)]
pub fn layout_text(text: &str, json: &str) -> Result<JsValue, JsValue> {
    let response = AnnotationResponse::from_json(json).map_err(to_js)?;
    to_value(&layout(text, &response.mentions))
}

/// Highlighted text as HTML paragraphs.
#[wasm_bindgen(js_name = renderTextHtml)]
pub fn render_text_html(text: &str, json: &str) -> Result<String, JsValue> {
    crate::render_text_html(text, json).map_err(to_js)
}

/// Overlays of one rendered page, positioned for a canvas of the given size.
#[wasm_bindgen(js_name = placeOverlays)]
pub fn place_overlays(json: &str, page: u32, width: f64, height: f64) -> Result<JsValue, JsValue> {
    let response = AnnotationResponse::from_json(json).map_err(to_js)?;
    let plan = OverlayPlan::from_response(&response);
    to_value(&plan.place(page, CanvasSize::new(width, height)))
}

/// The per-dataset summary index.
#[wasm_bindgen]
pub fn summary(json: &str) -> Result<JsValue, JsValue> {
    let response = AnnotationResponse::from_json(json).map_err(to_js)?;
    to_value(&summarize(&response.mentions))
}
