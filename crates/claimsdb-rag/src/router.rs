//! Deterministic intent classification: an ordered rule list, first match wins.
use regex::Regex;

use claimsdb_core::error::{Error, Result};
use claimsdb_core::types::Intent;

pub const CLAIM_ID_PATTERN: &str = "clm-[a-z0-9-]+";
pub const COUNT_KEYWORDS: [&str; 3] = ["how many", "count", "total number"];

#[derive(Debug, Clone)]
pub enum Rule {
    /// First match in the lowercased text, uppercased, is the claim id.
    ClaimId(Regex),
    /// Any keyword as a substring of the lowercased text.
    Count(Vec<String>),
}

impl Rule {
    fn apply(&self, lowered: &str) -> Option<Intent> {
        match self {
            Rule::ClaimId(re) => re.find(lowered).map(|m| Intent::IdLookup { id: m.as_str().to_uppercase() }),
            Rule::Count(keywords) => keywords.iter().any(|k| lowered.contains(k.as_str())).then_some(Intent::CountQuery),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntentRouter {
    rules: Vec<Rule>,
}

impl IntentRouter {
    /// Claim-id lookup, then count keywords; everything else is semantic search.
    pub fn new() -> Result<Self> {
        let claim_id = Regex::new(CLAIM_ID_PATTERN).map_err(|e| Error::InvalidConfig(format!("claim id pattern: {e}")))?;
        Ok(Self::with_rules(vec![Rule::ClaimId(claim_id), Rule::Count(COUNT_KEYWORDS.iter().map(|k| k.to_string()).collect())]))
    }

    pub fn with_rules(rules: Vec<Rule>) -> Self { Self { rules } }

    pub fn rules(&self) -> &[Rule] { &self.rules }

    /// Total and side-effect free. Whitespace-only text becomes an empty semantic search.
    pub fn classify(&self, text: &str) -> Intent {
        let lowered = text.to_lowercase();
        self.rules
            .iter()
            .find_map(|rule| rule.apply(&lowered))
            .unwrap_or_else(|| Intent::SemanticSearch { text: if text.trim().is_empty() { String::new() } else { text.to_string() } })
    }
}
