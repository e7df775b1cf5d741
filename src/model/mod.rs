//! # Annotation Model
//!
//! The wire representation of what the annotation service returns. A response
//! is a flat list of mentions; each mention bundles the components the service
//! recognised around one dataset occurrence (its name, an acquisition device,
//! a URL, a publisher, bibliographic references), each with its own offsets
//! into the submitted text and, for PDF input, its own bounding boxes.
//!
//! Every component is optional. The service omits keys rather than sending
//! nulls, so presence is modelled with `Option` and empty `Vec`s and checked
//! explicitly by the layout code.

pub mod concept;

use serde::{Deserialize, Serialize};

use crate::error::{DatastetError, Result};

pub use concept::{Concept, Definition, Statement, StatementValue};

/// The language assumed when neither the response nor a mention names one.
pub const DEFAULT_LANG: &str = "en";

/// A complete annotation response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    /// Server-side processing time in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<f64>,

    #[serde(default)]
    pub mentions: Vec<Mention>,

    /// Page geometry in PDF units, one entry per page, PDF mode only.
    #[serde(default)]
    pub pages: Vec<PageInfo>,

    /// Bibliographic entries referenced by mentions, PDF mode only.
    #[serde(default)]
    pub references: Vec<BibReference>,
}

impl AnnotationResponse {
    /// Parse a response body. An empty body or a JSON `null` is an
    /// [`DatastetError::EmptyResponse`], not a parse error.
    pub fn from_json(body: &str) -> Result<Self> {
        let trimmed = body.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Err(DatastetError::EmptyResponse);
        }
        Ok(serde_json::from_str(trimmed)?)
    }

    /// The response language, falling back to [`DEFAULT_LANG`].
    pub fn lang(&self) -> &str {
        self.lang.as_deref().unwrap_or(DEFAULT_LANG)
    }

    /// Geometry of a 1-based page number.
    pub fn page(&self, page: u32) -> Option<&PageInfo> {
        (page as usize)
            .checked_sub(1)
            .and_then(|index| self.pages.get(index))
    }
}

/// The kind of dataset a mention refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MentionType {
    #[serde(rename = "dataset-name")]
    DatasetName,
    #[serde(rename = "dataset-implicit")]
    DatasetImplicit,
    #[serde(untagged)]
    Other(String),
}

impl MentionType {
    pub fn as_str(&self) -> &str {
        match self {
            MentionType::DatasetName => "dataset-name",
            MentionType::DatasetImplicit => "dataset-implicit",
            MentionType::Other(name) => name,
        }
    }
}

/// One detected dataset occurrence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mention {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub mention_type: Option<MentionType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_form: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_form: Option<String>,

    #[serde(rename = "dataset-name", default, skip_serializing_if = "Option::is_none")]
    pub dataset_name: Option<Component>,
    /// Older service versions emit this component under `dataset`.
    #[serde(
        rename = "dataset-implicit",
        alias = "dataset",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub dataset_implicit: Option<Component>,
    #[serde(rename = "data-device", default, skip_serializing_if = "Option::is_none")]
    pub data_device: Option<Component>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<Component>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<Component>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<ReferencePiece>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wikipedia_external_ref: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wikidata_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mention_context_attributes: Option<ContextAttributes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_context_attributes: Option<ContextAttributes>,

    /// Sentence around the mention, when the service was asked for it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paragraph: Option<String>,
}

impl Mention {
    /// The component naming the dataset: the explicit name if present,
    /// otherwise the implicit one.
    pub fn dataset_component(&self) -> Option<&Component> {
        self.dataset_name.as_ref().or(self.dataset_implicit.as_ref())
    }

    /// Normalized dataset name used to group mentions in the summary: the
    /// first non-empty normalized form of the explicit name, then of the
    /// implicit one.
    pub fn normalized_dataset_name(&self) -> Option<&str> {
        self.naming_component().map(|(_, name)| name)
    }

    /// The component that supplies [`Mention::normalized_dataset_name`],
    /// with that name.
    pub fn naming_component(&self) -> Option<(&Component, &str)> {
        [&self.dataset_name, &self.dataset_implicit]
            .into_iter()
            .flatten()
            .find_map(|c| {
                let name = c.normalized_form.as_deref().filter(|n| !n.is_empty())?;
                Some((c, name))
            })
    }

    /// Best human-readable name for headings.
    pub fn display_name(&self) -> &str {
        self.normalized_form
            .as_deref()
            .or_else(|| self.normalized_dataset_name())
            .or(self.raw_form.as_deref())
            .or_else(|| self.dataset_component().map(|c| c.raw_form.as_str()))
            .unwrap_or("")
    }

    /// Wikipedia page id, from the mention or else its dataset component.
    pub fn wikipedia_ref(&self) -> Option<u64> {
        self.wikipedia_external_ref
            .or_else(|| self.dataset_component().and_then(|c| c.wikipedia_external_ref))
    }

    pub fn is_type(&self, ty: &MentionType) -> bool {
        self.mention_type.as_ref() == Some(ty)
    }

    /// Language for this mention's knowledge-base lookups.
    pub fn lang_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.lang.as_deref().unwrap_or(fallback)
    }
}

/// A recognised component of a mention, located in the source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    #[serde(default)]
    pub raw_form: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_form: Option<String>,

    /// Start offset in UTF-16 code units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_start: Option<usize>,
    /// End offset (exclusive) in UTF-16 code units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_end: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bounding_boxes: Vec<BoundingBox>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_type_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_dataset: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wikidata_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wikipedia_external_ref: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Component {
    /// The normalized form, or the raw form when the service gave none.
    pub fn normalized_or_raw(&self) -> &str {
        self.normalized_form.as_deref().unwrap_or(&self.raw_form)
    }
}

/// A bibliographic reference attached to a mention.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferencePiece {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_key: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_form: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_start: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_end: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bounding_boxes: Vec<BoundingBox>,
}

impl ReferencePiece {
    /// Callout text: the raw form, or the label when the raw form is missing.
    pub fn text(&self) -> &str {
        self.raw_form
            .as_deref()
            .or(self.label.as_deref())
            .unwrap_or("")
    }
}

/// A rectangle on a PDF page, in PDF units with a top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// 1-based page number.
    #[serde(rename = "p", alias = "page")]
    pub page: u32,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// Native size of one PDF page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page_height: f64,
    pub page_width: f64,
}

/// Full bibliographic record for a reference key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BibReference {
    pub ref_key: i64,
    /// TEI `<biblStruct>` markup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tei: Option<String>,
}

/// Whether a dataset is used, created or shared, with classifier scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextAttributes {
    #[serde(default)]
    pub used: Attribute,
    #[serde(default)]
    pub created: Attribute,
    #[serde(default)]
    pub shared: Attribute,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(default)]
    pub value: bool,
    #[serde(default)]
    pub score: f64,
}

impl ContextAttributes {
    /// `(label, attribute)` in display order.
    pub fn entries(&self) -> [(&'static str, Attribute); 3] {
        [
            ("used", self.used),
            ("created", self.created),
            ("shared", self.shared),
        ]
    }

    /// Labels of the attributes that hold, in display order.
    pub fn labels(&self) -> impl Iterator<Item = &'static str> {
        self.entries()
            .into_iter()
            .filter(|(_, attr)| attr.value)
            .map(|(label, _)| label)
    }

    /// Space-separated labels of the attributes that hold.
    pub fn usage(&self) -> String {
        self.labels().collect::<Vec<_>>().join(" ")
    }

    pub fn any(&self) -> bool {
        self.labels().next().is_some()
    }
}
