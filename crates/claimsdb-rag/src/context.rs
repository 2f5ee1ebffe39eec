use std::fmt;

use claimsdb_core::types::{Record, SearchResult};

/// What the pipeline learned for one query, before rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum Evidence {
    Found { id: String, record: Record },
    NotFound { id: String },
    Count(u64),
    Semantic(SearchResult),
}

/// The rendered context block handed to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext(String);

impl PromptContext {
    pub fn as_str(&self) -> &str { &self.0 }

    pub fn prompt(&self, user_message: &str) -> String {
        format!(
            "You are a helpful assistant for analyzing insurance claims.\n\nContext:\n{}\n\nBased ONLY on the context provided, please answer the user's question.\nUser: {}\n",
            self.0, user_message
        )
    }
}

impl fmt::Display for PromptContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

pub fn assemble(evidence: &Evidence) -> PromptContext {
    let text = match evidence {
        Evidence::Found { id, record } => format!("Here is the data found for claim ID {id}:\n{record}"),
        Evidence::NotFound { id } => format!("I could not find any data for the claim ID {id}."),
        Evidence::Count(total) => format!("The total number of claims in the database is {total}."),
        Evidence::Semantic(result) if !result.fallback_needed => {
            let mut text = String::from("Based on the following relevant claims data:\n");
            for doc in result.documents() { text.push_str(&format!("- {doc}\n")); }
            text
        }
        Evidence::Semantic(_) => "No specific claims data was found in the database that matches your query.".to_string(),
    };
    PromptContext(text)
}
