//! Knowledge-base concept records.
//!
//! Fetched lazily per Wikipedia page id from the entity knowledge base and
//! displayed in the mention detail card. Only the fields the card shows are
//! modelled; the knowledge base sends many more.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Concept {
    #[serde(default)]
    pub wikipedia_external_ref: Option<u64>,
    #[serde(default)]
    pub wikidata_id: Option<String>,
    #[serde(default)]
    pub preferred_term: Option<String>,
    #[serde(default)]
    pub definitions: Vec<Definition>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub multilingual: Vec<MultilingualTerm>,
    #[serde(default)]
    pub statements: Vec<Statement>,
}

impl Concept {
    /// First definition, which the card shows.
    pub fn definition(&self) -> Option<&str> {
        self.definitions.first().map(|d| d.definition.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Definition {
    #[serde(default)]
    pub definition: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub page_id: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MultilingualTerm {
    #[serde(default)]
    pub lang: String,
    #[serde(default)]
    pub term: String,
    #[serde(default)]
    pub page_id: Option<u64>,
}

/// One Wikidata statement. `value` is a plain string for most value types
/// and an object for `time` and `globe-coordinate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statement {
    #[serde(default)]
    pub concept_id: Option<String>,
    #[serde(default)]
    pub property_id: Option<String>,
    #[serde(default)]
    pub property_name: Option<String>,
    #[serde(default)]
    pub value_type: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub value_name: Option<String>,
}

/// How a statement's value is shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementValue {
    Text(String),
    Link { href: String, text: String },
    Empty,
}

impl Statement {
    /// Row label: the property name, else its id. Statements without a
    /// property id are not shown.
    pub fn label(&self) -> Option<&str> {
        self.property_id.as_ref()?;
        self.property_name.as_deref().or(self.property_id.as_deref())
    }

    pub fn display_value(&self) -> StatementValue {
        let value = self.value.as_ref().filter(|v| !v.is_null());
        match self.value_type.as_deref() {
            Some("time") => value
                .and_then(|v| v.get("time"))
                .and_then(Value::as_str)
                .map(|time| {
                    // "+1995-12-04T00:00:00Z" -> "1995-12-04"
                    let time = time.get(1..).unwrap_or("");
                    let date = time.split('T').next().unwrap_or(time);
                    StatementValue::Text(date.to_string())
                })
                .unwrap_or(StatementValue::Empty),
            Some("globe-coordinate") => {
                let Some(value) = value else {
                    return StatementValue::Empty;
                };
                let parts: Vec<String> = ["latitude", "longitude", "precision"]
                    .into_iter()
                    .filter_map(|key| {
                        value
                            .get(key)
                            .and_then(value_text)
                            .map(|v| format!("{}: {}", key, v))
                    })
                    .collect();
                StatementValue::Text(parts.join(", "))
            }
            Some("string") => match value.and_then(value_text) {
                Some(text) if self.property_id.as_deref() == Some(TWITTER_HASHTAG) => {
                    StatementValue::Link {
                        href: format!("https://twitter.com/hashtag/{}?src=hash", text.trim()),
                        text: format!("#{}", text),
                    }
                }
                Some(text) => StatementValue::Text(text),
                None => StatementValue::Empty,
            },
            Some("url") => match value.and_then(value_text) {
                Some(url) if url.starts_with("https://") || url.starts_with("http://") => {
                    StatementValue::Link {
                        href: url.clone(),
                        text: url,
                    }
                }
                _ => StatementValue::Empty,
            },
            _ => self
                .value_name
                .clone()
                .or_else(|| value.and_then(value_text))
                .map(StatementValue::Text)
                .unwrap_or(StatementValue::Empty),
        }
    }
}

/// Wikidata property "Twitter hashtag".
const TWITTER_HASHTAG: &str = "P2572";

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
