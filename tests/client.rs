//! Client tests against an in-process stand-in for the annotation service
//! and the knowledge base.
#![cfg(feature = "client")]

use std::sync::{Arc, Mutex as StdMutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use datastet_view::client::{DatastetClient, Document, DocumentKind, FitWidth, ProcessOptions};
use datastet_view::config::Config;
use datastet_view::model::{Component, Mention};
use datastet_view::session::Session;
use datastet_view::DatastetError;

// ─── Helpers ────────────────────────────────────────────────────

struct Request {
    target: String,
    body: String,
}

type Handler = dyn Fn(&Request) -> (u16, String) + Send + Sync;

/// Requests the server has seen, by target.
#[derive(Clone, Default)]
struct Hits(Arc<StdMutex<Vec<String>>>);

impl Hits {
    fn targets(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.targets().iter().filter(|t| t.starts_with(prefix)).count()
    }
}

/// Serve `handler` on an ephemeral port. Returns the base URL.
async fn serve(handler: impl Fn(&Request) -> (u16, String) + Send + Sync + 'static) -> (String, Hits) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let hits = Hits::default();
    let handler: Arc<Handler> = Arc::new(handler);

    let seen = hits.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let handler = handler.clone();
            let seen = seen.clone();
            tokio::spawn(async move {
                let _ = handle(stream, handler, seen).await;
            });
        }
    });
    (base, hits)
}

async fn handle(mut stream: TcpStream, handler: Arc<Handler>, seen: Hits) -> std::io::Result<()> {
    let request = read_request(&mut stream).await?;
    seen.0.lock().unwrap().push(request.target.clone());
    let (status, body) = handler(&request);
    let reason = match status {
        200 => "OK",
        204 => "No Content",
        404 => "Not Found",
        _ => "Internal Server Error",
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

async fn read_request(stream: &mut TcpStream) -> std::io::Result<Request> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(i) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break i + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length: usize = head
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0);
    let chunked = head.contains("transfer-encoding: chunked");

    loop {
        let body = &buf[header_end..];
        let done = if chunked {
            body.ends_with(b"0\r\n\r\n")
        } else {
            body.len() >= content_length
        };
        if done {
            break;
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let request_line = String::from_utf8_lossy(&buf[..header_end])
        .lines()
        .next()
        .unwrap_or_default()
        .to_string();
    let target = request_line.split(' ').nth(1).unwrap_or_default().to_string();
    Ok(Request {
        target,
        body: String::from_utf8_lossy(&buf[header_end..]).to_string(),
    })
}

fn client(base: &str) -> DatastetClient {
    DatastetClient::new(Config {
        service_url: format!("{}/service/", base),
        kb_url: format!("{}/kb/concept/", base),
        supported_languages: vec![],
        timeout_secs: 5,
        ..Default::default()
    })
    .unwrap()
}

fn with_page_id(id: u64) -> Mention {
    Mention {
        dataset_name: Some(Component {
            raw_form: "GEO".to_string(),
            ..Default::default()
        }),
        wikipedia_external_ref: Some(id),
        ..Default::default()
    }
}

const SENTENCE_RESPONSE: &str = r#"{"mentions": [
    {"type": "dataset-name",
     "dataset-name": {"rawForm": "GEO", "normalizedForm": "GEO", "offsetStart": 8, "offsetEnd": 11}}
]}"#;

const PDF_RESPONSE: &str = r#"{
    "pages": [{"page_height": 792.0, "page_width": 612.0}],
    "mentions": [
        {"type": "dataset-name",
         "dataset-name": {"rawForm": "GEO", "normalizedForm": "GEO",
            "boundingBoxes": [{"p": 1, "x": 100, "y": 200, "w": 50, "h": 20}]}}
    ]
}"#;

// ─── Primary Requests ───────────────────────────────────────────

#[tokio::test]
async fn test_annotate_text_sends_query_and_parses() {
    let (base, hits) = serve(|_| (200, SENTENCE_RESPONSE.to_string())).await;
    let response = client(&base).annotate_text("We used GEO.").await.unwrap();

    assert_eq!(response.mentions.len(), 1);
    assert_eq!(response.mentions[0].normalized_dataset_name(), Some("GEO"));
    let targets = hits.targets();
    assert_eq!(targets.len(), 1);
    assert!(targets[0].starts_with("/service/annotateDatasetSentence?text=We+used+GEO"));
}

#[tokio::test]
async fn test_is_alive() {
    let (base, _) = serve(|r| {
        if r.target == "/service/isalive" {
            (200, "true".to_string())
        } else {
            (404, String::new())
        }
    })
    .await;
    assert!(client(&base).is_alive().await.unwrap());
}

#[tokio::test]
async fn test_no_content_is_empty_response() {
    let (base, _) = serve(|_| (204, String::new())).await;
    let result = client(&base).annotate_text("We used GEO.").await;
    assert!(matches!(result, Err(DatastetError::EmptyResponse)));
}

#[tokio::test]
async fn test_server_error_keeps_status_and_body() {
    let (base, _) = serve(|_| (500, "model not loaded".to_string())).await;
    match client(&base).annotate_text("We used GEO.").await {
        Err(DatastetError::Status { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "model not loaded");
        }
        other => panic!("expected a status error, got {:?}", other.map(|r| r.mentions.len())),
    }
}

#[tokio::test]
async fn test_blank_text_is_not_sent() {
    let (base, hits) = serve(|_| (200, SENTENCE_RESPONSE.to_string())).await;
    let result = client(&base).annotate_text("  \n").await;
    assert!(matches!(result, Err(DatastetError::InvalidInput(_))));
    assert!(hits.targets().is_empty());
}

#[tokio::test]
async fn test_document_upload_carries_file_and_flags() {
    let (base, _) = serve(|r| {
        let ok = r.target == "/service/annotateDatasetPDF"
            && r.body.contains("name=\"input\"")
            && r.body.contains("name=\"segmentSentences\"")
            && r.body.contains("name=\"addParagraphContext\"");
        if ok {
            (200, PDF_RESPONSE.to_string())
        } else {
            (404, String::new())
        }
    })
    .await;

    let document = Document {
        file_name: "paper.pdf".to_string(),
        kind: DocumentKind::Pdf,
        bytes: b"%PDF-1.4".to_vec(),
    };
    let options = ProcessOptions {
        segment_sentences: true,
        add_paragraph_context: false,
    };
    let response = client(&base).annotate_document(&document, options).await.unwrap();
    assert_eq!(response.pages.len(), 1);
}

// ─── Pipelines ──────────────────────────────────────────────────

#[tokio::test]
async fn test_view_document_places_overlays() {
    let (base, _) = serve(|_| (200, PDF_RESPONSE.to_string())).await;
    let session = Mutex::new(Session::new());
    let document = Document {
        file_name: "paper.pdf".to_string(),
        kind: DocumentKind::Pdf,
        bytes: b"%PDF-1.4".to_vec(),
    };

    let view = client(&base)
        .view_document(&session, &FitWidth(306.0), &document, ProcessOptions::default(), false)
        .await
        .unwrap();

    assert_eq!(view.pages.len(), 1);
    let page = &view.pages[0];
    assert!((page.canvas.height - 396.0).abs() < 0.01);
    assert_eq!(page.overlays.len(), 1);
    assert_eq!(page.overlays[0].id, "annot-0-0-0");
    assert!((page.overlays[0].rect.left - 49.0).abs() < 0.01);
    assert_eq!(view.summary.row("GEO").unwrap().count(), 1);
    assert!(session.lock().await.is_current(view.generation));
}

#[tokio::test]
async fn test_view_text_without_lookups() {
    let (base, hits) = serve(|_| (200, SENTENCE_RESPONSE.to_string())).await;
    let session = Mutex::new(Session::new());
    let view = client(&base)
        .view_text(&session, "We used GEO.", false)
        .await
        .unwrap();

    let layout = view.layout("We used GEO.");
    assert_eq!(layout.highlights().count(), 1);
    assert_eq!(hits.count("/kb/"), 0);
}

// ─── Concept Lookups ────────────────────────────────────────────

#[tokio::test]
async fn test_concepts_fetched_once_per_id() {
    let (base, hits) = serve(|r| {
        if r.target.starts_with("/kb/concept/123") {
            (
                200,
                r#"{"wikipediaExternalRef": 123, "wikidataId": "Q5",
                    "definitions": [{"definition": "A '''public''' repository", "lang": "en"}]}"#
                    .to_string(),
            )
        } else if r.target.starts_with("/kb/concept/456") {
            (200, r#"{"wikipediaExternalRef": 456}"#.to_string())
        } else {
            (404, String::new())
        }
    })
    .await;
    let client = client(&base);
    let session = Mutex::new(Session::new());
    let generation = session.lock().await.begin();
    let mentions = vec![with_page_id(123), with_page_id(456), with_page_id(123)];

    let stored = client.resolve_concepts(&session, generation, &mentions).await;
    assert_eq!(stored, 2);
    assert_eq!(hits.count("/kb/concept/123?lang=en"), 1);
    assert_eq!(hits.count("/kb/concept/456?lang=en"), 1);

    // already cached: nothing new is requested
    let stored = client.resolve_concepts(&session, generation, &mentions).await;
    assert_eq!(stored, 0);
    assert_eq!(hits.count("/kb/"), 2);

    let session = session.lock().await;
    assert_eq!(session.concept_count(), 2);
    assert_eq!(session.concept(123).unwrap().wikidata_id.as_deref(), Some("Q5"));
}

#[tokio::test]
async fn test_failed_concept_lookup_can_be_retried() {
    let (base, _) = serve(|_| (500, String::new())).await;
    let client = client(&base);
    let session = Mutex::new(Session::new());
    let generation = session.lock().await.begin();

    let stored = client
        .resolve_concepts(&session, generation, &[with_page_id(999)])
        .await;
    assert_eq!(stored, 0);
    let mut session = session.lock().await;
    assert!(session.concept(999).is_none());
    assert!(session.claim_concept(999));
}

#[tokio::test]
async fn test_stale_generation_looks_nothing_up() {
    let (base, hits) = serve(|_| (200, r#"{"wikipediaExternalRef": 1}"#.to_string())).await;
    let client = client(&base);
    let session = Mutex::new(Session::new());
    let old = session.lock().await.begin();
    session.lock().await.begin();

    let stored = client.resolve_concepts(&session, old, &[with_page_id(1)]).await;
    assert_eq!(stored, 0);
    assert!(hits.targets().is_empty());
}
