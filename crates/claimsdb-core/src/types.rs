//! Domain types shared by the router, the index and the generation stream.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker prepended to error fragments so callers can spot them in the text stream.
pub const ERROR_MARKER: &str = "⚠️ Error processing your request:";

/// An inbound message. The conversation id is accepted but does not scope any history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub conversation_id: Option<String>,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self { Self { text: text.into(), conversation_id: None } }

    pub fn with_conversation(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }
}

/// How a query is handled. Classification always yields exactly one variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    IdLookup { id: String },
    CountQuery,
    SemanticSearch { text: String },
}

impl Intent {
    pub fn label(&self) -> &'static str {
        match self {
            Intent::IdLookup { .. } => "id_lookup",
            Intent::CountQuery => "count",
            Intent::SemanticSearch { .. } => "semantic_search",
        }
    }
}

/// A row from the structured store: column names in select order, SQL NULL as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<(String, Option<String>)>,
}

impl Record {
    pub fn new() -> Self { Self::default() }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(column, Some(value.into()));
        self
    }

    pub fn with_null(mut self, column: impl Into<String>) -> Self {
        self.push(column, None);
        self
    }

    pub fn push(&mut self, column: impl Into<String>, value: Option<String>) {
        self.fields.push((column.into(), value));
    }

    /// Non-null value of `column`, if present.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.iter().find(|(c, _)| c == column).and_then(|(_, v)| v.as_deref())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> { self.fields.iter().map(|(c, _)| c.as_str()) }

    pub fn is_empty(&self) -> bool { self.fields.is_empty() }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (column, value)) in self.fields.iter().enumerate() {
            if i > 0 { f.write_str(", ")?; }
            write!(f, "{}: {}", column, value.as_deref().unwrap_or("null"))?;
        }
        Ok(())
    }
}

impl FromIterator<(String, Option<String>)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Option<String>)>>(iter: I) -> Self {
        Self { fields: iter.into_iter().collect() }
    }
}

/// The projection of a claim that gets embedded and searched.
///
/// - `id`: the claim identifier (never empty)
/// - `claim_type`/`status`/`diagnosis_code`: optional descriptive columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub claim_type: Option<String>,
    pub status: Option<String>,
    pub diagnosis_code: Option<String>,
}

impl Document {
    /// Project a store record; records without a usable `claim_id` are skipped.
    pub fn from_record(record: &Record) -> Option<Self> {
        let id = record.get("claim_id").map(str::trim).filter(|id| !id.is_empty())?;
        Some(Self {
            id: id.to_string(),
            claim_type: record.get("claim_type").map(str::to_string),
            status: record.get("claim_status").map(str::to_string),
            diagnosis_code: record.get("diagnosis_code").map(str::to_string),
        })
    }

    /// Text handed to the embedding model. Stable for identical documents.
    pub fn embedding_text(&self) -> String {
        format!(
            "Claim ID: {}\nClaim Type: {}\nStatus: {}\nDiagnosis Code: {}",
            self.id,
            self.claim_type.as_deref().unwrap_or("None"),
            self.status.as_deref().unwrap_or("None"),
            self.diagnosis_code.as_deref().unwrap_or("None"),
        )
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "claim_id: {}, claim_type: {}, claim_status: {}, diagnosis_code: {}",
            self.id,
            self.claim_type.as_deref().unwrap_or("null"),
            self.status.as_deref().unwrap_or("null"),
            self.diagnosis_code.as_deref().unwrap_or("null"),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub document: Document,
    /// Euclidean distance to the query vector; lower is closer.
    pub distance: f32,
}

/// Nearest neighbours in ascending distance order plus the confidence verdict.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchResult {
    pub results: Vec<ScoredDocument>,
    pub fallback_needed: bool,
}

impl SearchResult {
    pub fn fallback() -> Self { Self { results: Vec::new(), fallback_needed: true } }

    /// Apply the confidence gate: only the rank-0 distance is checked, strictly.
    /// A tripped gate yields no results at all.
    pub fn gated(results: Vec<ScoredDocument>, threshold: f32) -> Self {
        let confident = results.first().is_some_and(|best| best.distance <= threshold);
        if confident { Self { results, fallback_needed: false } } else { Self::fallback() }
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> { self.results.iter().map(|r| &r.document) }
}

/// One unit of the answer stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseFragment {
    Text(String),
    Error(String),
    Done,
}

impl ResponseFragment {
    pub fn error(detail: impl fmt::Display) -> Self { ResponseFragment::Error(format!("{ERROR_MARKER} {detail}")) }

    pub fn text(&self) -> Option<&str> {
        match self {
            ResponseFragment::Text(t) | ResponseFragment::Error(t) => Some(t),
            ResponseFragment::Done => None,
        }
    }

    pub fn is_done(&self) -> bool { matches!(self, ResponseFragment::Done) }

    /// JSON payload the chat boundary frames: `{"chunk": ...}` or `{"done": true}`.
    pub fn to_wire(&self) -> serde_json::Value {
        match self {
            ResponseFragment::Text(t) | ResponseFragment::Error(t) => serde_json::json!({ "chunk": t }),
            ResponseFragment::Done => serde_json::json!({ "done": true }),
        }
    }

    /// A complete server-sent-events frame.
    pub fn sse_frame(&self) -> String { format!("data: {}\n\n", self.to_wire()) }
}
