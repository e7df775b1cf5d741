//! # datastet-view CLI
//!
//! Usage:
//!   datastet-view text "Insulin levels were measured by ELISA kit." -o out.html
//!   datastet-view pdf paper.pdf --width 900 -o paper.html
//!   datastet-view render response.json --text input.txt
//!   datastet-view --format json tei paper.tei.xml
//!   datastet-view examples

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::prelude::*;

use datastet_view::client::{DatastetClient, Document, DocumentKind, FitWidth, ProcessOptions};
use datastet_view::config::Config;
use datastet_view::html::MainView;
use datastet_view::layout::layout_text;
use datastet_view::model::AnnotationResponse;
use datastet_view::session::Session;
use datastet_view::summary::summarize;
use datastet_view::{html, place_all, DatastetError, Result, EXAMPLE_SENTENCES};

#[derive(Parser)]
#[command(name = "datastet-view")]
#[command(version)]
#[command(about = "Annotate text and documents with dataset mentions and render the result")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base URL of the annotation service
    #[arg(long, global = true, env = "DATASTET_URL")]
    url: Option<String>,

    /// Knowledge-base concept lookup prefix
    #[arg(long, global = true, env = "DATASTET_KB_URL")]
    kb_url: Option<String>,

    /// Default language for knowledge-base lookups
    #[arg(long, global = true, env = "DATASTET_LANG")]
    lang: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true, env = "DATASTET_TIMEOUT")]
    timeout: Option<u64>,

    /// Write output here instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "html", value_enum)]
    format: OutputFormat,

    /// Skip concept and thumbnail lookups
    #[arg(long, global = true)]
    no_lookups: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Html,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the service is up
    Alive,

    /// Annotate a sentence or short text
    Text {
        /// Text to annotate (reads --file or stdin if not provided)
        text: Option<String>,
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Annotate a PDF and position the mentions on its pages
    Pdf {
        file: PathBuf,
        #[command(flatten)]
        upload: UploadArgs,
        /// Page width in pixels
        #[arg(long, default_value_t = 800.0)]
        width: f64,
    },

    /// Annotate a TEI XML document
    Tei {
        file: PathBuf,
        #[command(flatten)]
        upload: UploadArgs,
    },

    /// Annotate a JATS XML document
    Jats {
        file: PathBuf,
        #[command(flatten)]
        upload: UploadArgs,
    },

    /// Classify the data types of a sentence (raw service JSON)
    Classify {
        text: Option<String>,
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Enrich a PDF, TEI or JATS document with data-type tags (raw service XML)
    Dataseer { file: PathBuf },

    /// Lay out a saved service response without contacting the service
    Render {
        /// Response JSON
        response: PathBuf,
        /// The text that was annotated, for text-mode responses
        #[arg(long)]
        text: Option<PathBuf>,
        /// Page width in pixels, for PDF responses
        #[arg(long, default_value_t = 800.0)]
        width: f64,
    },

    /// Show the data-type taxonomy known to the service
    Datatypes,

    /// Print example sentences
    Examples,
}

#[derive(clap::Args)]
struct UploadArgs {
    /// Ask the service to segment the document into sentences
    #[arg(long)]
    segment_sentences: bool,
    /// Ask the service to attach the surrounding paragraph to each mention
    #[arg(long)]
    paragraph_context: bool,
}

impl UploadArgs {
    fn options(&self) -> ProcessOptions {
        ProcessOptions {
            segment_sentences: self.segment_sentences,
            add_paragraph_context: self.paragraph_context,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "datastet_view=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("✗ {}", e);
            if !e.hint().is_empty() {
                eprintln!("  {}", e.hint());
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config_from(&cli);
    let lang = config.default_lang.clone();
    let lookups = !cli.no_lookups;
    let session = Mutex::new(Session::new());

    let output = match cli.command {
        Commands::Examples => EXAMPLE_SENTENCES.join("\n") + "\n",
        Commands::Render {
            response,
            text,
            width,
        } => {
            let json = tokio::fs::read_to_string(&response).await?;
            let response = AnnotationResponse::from_json(&json)?;
            let text = match text {
                Some(path) => Some(tokio::fs::read_to_string(path).await?),
                None => None,
            };
            render_offline(&response, text.as_deref(), width, cli.format, &session, &lang).await?
        }
        command => {
            let client = DatastetClient::new(config)?;
            online(&client, command, cli.format, &session, lookups).await?
        }
    };

    match &cli.output {
        Some(path) => {
            tokio::fs::write(path, &output).await?;
            eprintln!("✓ Written {} bytes to {}", output.len(), path.display());
        }
        None => print!("{}", output),
    }
    Ok(())
}

fn config_from(cli: &Cli) -> Config {
    let mut config = Config::from_env();
    if let Some(url) = &cli.url {
        config.service_url = url.clone();
    }
    if let Some(kb_url) = &cli.kb_url {
        config.kb_url = kb_url.clone();
    }
    if let Some(lang) = &cli.lang {
        config.default_lang = lang.clone();
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = timeout;
    }
    config
}

async fn online(
    client: &DatastetClient,
    command: Commands,
    format: OutputFormat,
    session: &Mutex<Session>,
    lookups: bool,
) -> Result<String> {
    let lang = client.config().default_lang.clone();
    match command {
        Commands::Alive => {
            let alive = client.is_alive().await?;
            info!("{} is {}", client.config().service_url, if alive { "up" } else { "down" });
            Ok(format!("{}\n", alive))
        }
        Commands::Text { text, file } => {
            let text = read_text(text, file.as_deref()).await?;
            let view = client.view_text(session, &text, lookups).await?;
            let layout = view.layout(&text);
            match format {
                OutputFormat::Json => to_json(&serde_json::json!({
                    "response": view.response,
                    "layout": layout,
                    "summary": view.summary,
                })),
                OutputFormat::Html => {
                    let session = session.lock().await;
                    let main = html::text_view(&layout);
                    html::report("Text", &view.response, MainView::Text(&main), &session, &lang)
                }
            }
        }
        Commands::Pdf {
            file,
            upload,
            width,
        } => {
            let document = Document::read_as(&file, DocumentKind::Pdf).await?;
            let view = client
                .view_document(session, &FitWidth(width), &document, upload.options(), lookups)
                .await?;
            match format {
                OutputFormat::Json => to_json(&serde_json::json!({
                    "response": view.response,
                    "pages": view.pages,
                    "diagnostics": view.diagnostics,
                    "summary": view.summary,
                })),
                OutputFormat::Html => {
                    let pages: String = view.pages.iter().map(html::page_view).collect();
                    let session = session.lock().await;
                    html::report(
                        &document.file_name,
                        &view.response,
                        MainView::Pages(&pages),
                        &session,
                        &lang,
                    )
                }
            }
        }
        Commands::Tei { file, upload } => {
            let document = Document::read_as(&file, DocumentKind::Tei).await?;
            annotate_xml(client, session, &document, upload.options(), format, lookups).await
        }
        Commands::Jats { file, upload } => {
            let document = Document::read_as(&file, DocumentKind::Jats).await?;
            annotate_xml(client, session, &document, upload.options(), format, lookups).await
        }
        Commands::Classify { text, file } => {
            let text = read_text(text, file.as_deref()).await?;
            client.classify_text(&text).await
        }
        Commands::Dataseer { file } => {
            let document = Document::read(&file).await?;
            client.process_dataseer(&document).await
        }
        Commands::Datatypes => to_json(&client.data_types().await?),
        Commands::Examples | Commands::Render { .. } => Err(DatastetError::invalid_input(
            "command does not use the service",
        )),
    }
}

/// TEI and JATS responses carry no page geometry; the report has the index
/// and the cards only.
async fn annotate_xml(
    client: &DatastetClient,
    session: &Mutex<Session>,
    document: &Document,
    options: ProcessOptions,
    format: OutputFormat,
    lookups: bool,
) -> Result<String> {
    let view = client
        .view_document(session, &FitWidth(800.0), document, options, lookups)
        .await?;
    match format {
        OutputFormat::Json => to_json(&serde_json::json!({
            "response": view.response,
            "summary": view.summary,
        })),
        OutputFormat::Html => {
            let session = session.lock().await;
            html::report(
                &document.file_name,
                &view.response,
                MainView::Empty,
                &session,
                &client.config().default_lang,
            )
        }
    }
}

async fn render_offline(
    response: &AnnotationResponse,
    text: Option<&str>,
    width: f64,
    format: OutputFormat,
    session: &Mutex<Session>,
    lang: &str,
) -> Result<String> {
    {
        let mut session = session.lock().await;
        let generation = session.begin();
        session.install_references(generation, response)?;
    }

    match text {
        Some(text) => {
            let layout = layout_text(text, &response.mentions);
            match format {
                OutputFormat::Json => to_json(&serde_json::json!({
                    "layout": layout,
                    "summary": summarize(&response.mentions),
                })),
                OutputFormat::Html => {
                    let session = session.lock().await;
                    let main = html::text_view(&layout);
                    html::report("Text", response, MainView::Text(&main), &session, lang)
                }
            }
        }
        None => {
            let (plan, pages) = place_all(response, width);
            match format {
                OutputFormat::Json => to_json(&serde_json::json!({
                    "pages": pages,
                    "diagnostics": plan.diagnostics,
                    "summary": summarize(&response.mentions),
                })),
                OutputFormat::Html => {
                    let main: String = pages.iter().map(html::page_view).collect();
                    let session = session.lock().await;
                    html::report("Document", response, MainView::Pages(&main), &session, lang)
                }
            }
        }
    }
}

async fn read_text(text: Option<String>, file: Option<&Path>) -> Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    if let Some(path) = file {
        return Ok(tokio::fs::read_to_string(path).await?);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)? + "\n")
}
