//! # Service Client
//!
//! Async HTTP access to the annotation service and to the two secondary
//! lookups the detail cards use (knowledge-base concepts, Wikipedia
//! thumbnails).
//!
//! Primary requests fail loudly: a transport error, a non-2xx status or an
//! empty body is returned as an error. Secondary lookups fail quietly: the
//! error is logged at debug level and the card simply goes without.

pub mod pipeline;

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{DatastetError, Result};
use crate::model::{AnnotationResponse, Concept, Mention};
use crate::session::{Generation, Session};

pub use pipeline::{place_pages, DocumentView, FitWidth, PageRenderer, TextView};

/// Endpoints of the annotation service, relative to its base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    IsAlive,
    AnnotateDatasetSentence,
    AnnotateDatasetPdf,
    ProcessDatasetTei,
    ProcessDatasetJats,
    AnnotateDataseerSentence,
    ProcessDataseerTei,
    ProcessDataseerJats,
    ProcessDataseerPdf,
    JsonDataTypes,
}

impl Service {
    pub fn path(self) -> &'static str {
        match self {
            Service::IsAlive => "isalive",
            Service::AnnotateDatasetSentence => "annotateDatasetSentence",
            Service::AnnotateDatasetPdf => "annotateDatasetPDF",
            Service::ProcessDatasetTei => "processDatasetTEI",
            Service::ProcessDatasetJats => "processDatasetJATS",
            Service::AnnotateDataseerSentence => "annotateDataseerSentence",
            Service::ProcessDataseerTei => "processDataseerTEI",
            Service::ProcessDataseerJats => "processDataseerJATS",
            Service::ProcessDataseerPdf => "processDataseerPDF",
            Service::JsonDataTypes => "jsonDataTypes",
        }
    }
}

/// Kind of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Tei,
    Jats,
}

impl DocumentKind {
    /// Guess from the file extension: `.pdf`, `.tei`/`.tei.xml`, `.nxml`/`.jats`.
    /// Plain `.xml` is taken as TEI.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".pdf") {
            Some(DocumentKind::Pdf)
        } else if name.ends_with(".nxml") || name.ends_with(".jats") || name.ends_with(".jats.xml") {
            Some(DocumentKind::Jats)
        } else if name.ends_with(".tei") || name.ends_with(".xml") {
            Some(DocumentKind::Tei)
        } else {
            None
        }
    }

    /// Endpoint returning dataset mentions as JSON.
    pub fn dataset_service(self) -> Service {
        match self {
            DocumentKind::Pdf => Service::AnnotateDatasetPdf,
            DocumentKind::Tei => Service::ProcessDatasetTei,
            DocumentKind::Jats => Service::ProcessDatasetJats,
        }
    }

    /// Endpoint returning the document enriched with data-type tags, as XML.
    pub fn dataseer_service(self) -> Service {
        match self {
            DocumentKind::Pdf => Service::ProcessDataseerPdf,
            DocumentKind::Tei => Service::ProcessDataseerTei,
            DocumentKind::Jats => Service::ProcessDataseerJats,
        }
    }

    fn mime(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "application/pdf",
            DocumentKind::Tei | DocumentKind::Jats => "application/xml",
        }
    }
}

/// Flags sent with document uploads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessOptions {
    pub segment_sentences: bool,
    pub add_paragraph_context: bool,
}

/// An uploaded document: its name, kind and bytes.
#[derive(Debug, Clone)]
pub struct Document {
    pub file_name: String,
    pub kind: DocumentKind,
    pub bytes: Vec<u8>,
}

impl Document {
    /// Read a document from disk, with its kind taken from the extension.
    pub async fn read(path: &Path) -> Result<Self> {
        let kind = DocumentKind::from_path(path).ok_or_else(|| {
            DatastetError::invalid_input(format!(
                "{}: expected a .pdf, TEI (.tei, .xml) or JATS (.nxml, .jats) file",
                path.display()
            ))
        })?;
        Self::read_as(path, kind).await
    }

    pub async fn read_as(path: &Path, kind: DocumentKind) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("input")
            .to_string();
        Ok(Document {
            file_name,
            kind,
            bytes,
        })
    }
}

/// Client for the annotation service. Cheap to clone.
#[derive(Debug, Clone)]
pub struct DatastetClient {
    http: Client,
    config: Config,
}

impl DatastetClient {
    pub fn new(config: Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether the service answers its liveness probe.
    pub async fn is_alive(&self) -> Result<bool> {
        let url = self.config.endpoint(Service::IsAlive.path())?;
        let body = read_body(self.http.get(url).send().await?).await?;
        Ok(body.trim() == "true")
    }

    /// Annotate one sentence or short text.
    pub async fn annotate_text(&self, text: &str) -> Result<AnnotationResponse> {
        let body = self.get_text(Service::AnnotateDatasetSentence, text).await?;
        AnnotationResponse::from_json(&body)
    }

    /// Upload a PDF, TEI or JATS document for dataset mention annotation.
    pub async fn annotate_document(
        &self,
        document: &Document,
        options: ProcessOptions,
    ) -> Result<AnnotationResponse> {
        let url = self.config.endpoint(document.kind.dataset_service().path())?;
        info!(
            "Submitting {} ({} bytes) to {}",
            document.file_name,
            document.bytes.len(),
            url
        );
        let form = upload_form(document)?
            .text("segmentSentences", flag(options.segment_sentences))
            .text("addParagraphContext", flag(options.add_paragraph_context));
        let response = self.http.post(url).multipart(form).send().await?;
        AnnotationResponse::from_json(&read_body(response).await?)
    }

    /// Data-type classification of a sentence, as the service's raw JSON.
    pub async fn classify_text(&self, text: &str) -> Result<String> {
        self.get_text(Service::AnnotateDataseerSentence, text).await
    }

    /// The document enriched with data-type annotations, as the service's XML.
    pub async fn process_dataseer(&self, document: &Document) -> Result<String> {
        let url = self.config.endpoint(document.kind.dataseer_service().path())?;
        info!("Submitting {} to {}", document.file_name, url);
        let response = self
            .http
            .post(url)
            .multipart(upload_form(document)?)
            .send()
            .await?;
        read_body(response).await
    }

    /// The data-type taxonomy known to the service.
    pub async fn data_types(&self) -> Result<serde_json::Value> {
        let url = self.config.endpoint(Service::JsonDataTypes.path())?;
        let body = read_body(self.http.get(url).send().await?).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Knowledge-base record for a Wikipedia page id.
    pub async fn fetch_concept(&self, id: u64, lang: &str) -> Result<Concept> {
        let url = self.config.concept_url(id, lang)?;
        let body = read_body(self.http.get(url).send().await?).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Thumbnail URL of a Wikipedia page. `None` for unsupported languages
    /// and pages without an image.
    pub async fn fetch_thumbnail(&self, id: u64, lang: &str) -> Result<Option<String>> {
        let Some(url) = self.config.thumbnail_url(id, lang) else {
            return Ok(None);
        };
        let body = read_body(self.http.get(url).send().await?).await?;
        let value: serde_json::Value = serde_json::from_str(&body)?;
        Ok(value
            .pointer(&format!("/query/pages/{}/thumbnail/source", id))
            .and_then(|v| v.as_str())
            .map(str::to_string))
    }

    /// Fetch, concurrently, the concept of every mention that has a Wikipedia
    /// page id and is not already cached or requested. Returns how many
    /// concepts were stored.
    pub async fn resolve_concepts(
        &self,
        session: &Mutex<Session>,
        generation: Generation,
        mentions: &[Mention],
    ) -> usize {
        let claimed: Vec<(u64, String)> = {
            let mut session = session.lock().await;
            if !session.is_current(generation) {
                return 0;
            }
            mentions
                .iter()
                .filter_map(|m| {
                    m.wikipedia_ref().map(|id| (id, m.lang_or(&self.config.default_lang).to_string()))
                })
                .filter(|(id, _)| session.claim_concept(*id))
                .collect()
        };
        if claimed.is_empty() {
            return 0;
        }
        debug!("Looking up {} concepts", claimed.len());

        let outstanding = claimed.iter().map(|(id, _)| *id).collect();
        let mut tasks = JoinSet::new();
        for (id, lang) in claimed {
            let client = self.clone();
            tasks.spawn(async move { (id, client.fetch_concept(id, &lang).await) });
        }
        collect_concepts(session, generation, tasks, outstanding).await
    }

    /// Fetch the thumbnails of every mention with a Wikipedia page id in a
    /// supported language, skipping those already cached.
    pub async fn resolve_thumbnails(&self, session: &Mutex<Session>, mentions: &[Mention]) {
        let wanted: Vec<(u64, String)> = {
            let session = session.lock().await;
            let mut wanted: Vec<(u64, String)> = Vec::new();
            for mention in mentions {
                let Some(id) = mention.wikipedia_ref() else {
                    continue;
                };
                let lang = mention.lang_or(&self.config.default_lang);
                if !self.config.supports(lang)
                    || session.thumbnail(lang, id).is_some()
                    || wanted.iter().any(|(i, l)| *i == id && l == lang)
                {
                    continue;
                }
                wanted.push((id, lang.to_string()));
            }
            wanted
        };

        let mut tasks = JoinSet::new();
        for (id, lang) in wanted {
            let client = self.clone();
            tasks.spawn(async move {
                let result = client.fetch_thumbnail(id, &lang).await;
                (id, lang, result)
            });
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, lang, Ok(Some(url)))) => session.lock().await.insert_thumbnail(&lang, id, url),
                Ok((id, _, Ok(None))) => debug!("No thumbnail for page {}", id),
                Ok((id, _, Err(e))) => debug!("Thumbnail lookup for {} failed: {}", id, e),
                Err(e) => debug!("Thumbnail lookup task failed: {}", e),
            }
        }
    }

    async fn get_text(&self, service: Service, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Err(DatastetError::invalid_input("no text to annotate"));
        }
        let url = self.config.endpoint(service.path())?;
        info!("Submitting {} characters to {}", text.chars().count(), url);
        let response = self.http.get(url).query(&[("text", text)]).send().await?;
        read_body(response).await
    }
}

/// Store concept lookups as they finish. Every id in `outstanding` that is
/// not cached at the end is released, whether its lookup failed or its task
/// did, so a later request may claim it again.
async fn collect_concepts(
    session: &Mutex<Session>,
    generation: Generation,
    mut tasks: JoinSet<(u64, Result<Concept>)>,
    mut outstanding: HashSet<u64>,
) -> usize {
    let mut stored = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((id, Ok(concept))) => {
                outstanding.remove(&id);
                if session.lock().await.insert_concept(generation, id, concept) {
                    stored += 1;
                }
            }
            Ok((id, Err(e))) => debug!("Concept lookup for {} failed: {}", id, e),
            Err(e) => debug!("Concept lookup task failed: {}", e),
        }
    }

    if !outstanding.is_empty() {
        let mut session = session.lock().await;
        for id in outstanding {
            session.release_concept(generation, id);
        }
    }
    stored
}

fn upload_form(document: &Document) -> Result<Form> {
    let part = Part::bytes(document.bytes.clone())
        .file_name(document.file_name.clone())
        .mime_str(document.kind.mime())?;
    Ok(Form::new().part("input", part))
}

fn flag(on: bool) -> &'static str {
    if on {
        "1"
    } else {
        "0"
    }
}

/// Body of a successful response. No content is [`DatastetError::EmptyResponse`].
async fn read_body(response: Response) -> Result<String> {
    let status = response.status();
    if status == StatusCode::NO_CONTENT {
        return Err(DatastetError::EmptyResponse);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(DatastetError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.text().await?)
}
