//! Endpoint configuration.
//!
//! Sources, lowest precedence first: [`Config::default`], the environment
//! ([`Config::from_env`]), then whatever the caller sets (the CLI maps its
//! flags onto the fields).

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::error::Result;
use crate::model::DEFAULT_LANG;

pub const DEFAULT_SERVICE_URL: &str = "http://localhost:8060/service/";
pub const DEFAULT_KB_URL: &str = "https://cloud.science-miner.com/nerd/service/kb/concept/";

/// Query sent to `{lang}.wikipedia.org` for a page thumbnail, minus the page id.
pub const WIKIMEDIA_QUERY: &str =
    "/w/api.php?action=query&prop=pageimages&format=json&pithumbsize=200&pageids=";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the annotation service, ending in `service/`.
    pub service_url: String,
    /// Concept lookup prefix; the Wikipedia page id is appended.
    pub kb_url: String,
    /// Host suffix for thumbnail lookups, prefixed with the language.
    pub wikimedia_host_suffix: String,
    pub default_lang: String,
    /// Languages thumbnails are looked up for.
    pub supported_languages: Vec<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            kb_url: DEFAULT_KB_URL.to_string(),
            wikimedia_host_suffix: "wikipedia.org".to_string(),
            default_lang: DEFAULT_LANG.to_string(),
            supported_languages: vec![DEFAULT_LANG.to_string()],
            timeout_secs: 120,
        }
    }
}

impl Config {
    /// Defaults overridden by `DATASTET_URL`, `DATASTET_KB_URL`,
    /// `DATASTET_LANG` and `DATASTET_TIMEOUT`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Config::default();
        if let Some(url) = lookup("DATASTET_URL") {
            config.service_url = url;
        }
        if let Some(url) = lookup("DATASTET_KB_URL") {
            config.kb_url = url;
        }
        if let Some(lang) = lookup("DATASTET_LANG") {
            config.default_lang = lang;
        }
        if let Some(timeout) = lookup("DATASTET_TIMEOUT") {
            match timeout.parse() {
                Ok(secs) => config.timeout_secs = secs,
                Err(_) => warn!("Ignoring DATASTET_TIMEOUT={:?}: not a number of seconds", timeout),
            }
        }
        config
    }

    /// URL of a service endpoint, e.g. `annotateDatasetSentence`.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let mut base = self.service_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Url::parse(&base)?.join(path)?)
    }

    /// Concept record URL for a Wikipedia page id.
    pub fn concept_url(&self, id: u64, lang: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{}", self.kb_url, id))?;
        url.query_pairs_mut().append_pair("lang", lang);
        Ok(url)
    }

    /// Thumbnail query URL, or `None` for an unsupported language.
    pub fn thumbnail_url(&self, id: u64, lang: &str) -> Option<Url> {
        if !self.supports(lang) {
            return None;
        }
        let url = format!(
            "https://{}.{}{}{}",
            lang, self.wikimedia_host_suffix, WIKIMEDIA_QUERY, id
        );
        Url::parse(&url).ok()
    }

    pub fn supports(&self, lang: &str) -> bool {
        self.supported_languages.iter().any(|l| l == lang)
    }
}

/// Service base URL for the demo page at `page_url`: `index.html` is replaced
/// by `service/`, a trailing `#` is dropped, otherwise `service/` is appended.
pub fn derive_base_url(page_url: &str) -> Result<Url> {
    let base = if page_url.contains("index.html") {
        page_url.replacen("index.html", "service/", 1)
    } else {
        format!("{}service/", page_url.strip_suffix('#').unwrap_or(page_url))
    };
    Ok(Url::parse(&base)?)
}
