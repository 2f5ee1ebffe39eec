use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio_postgres::{Client, NoTls, Row};

use claimsdb_core::traits::ClaimStore;
use claimsdb_core::types::Record;

use crate::{CLAIM_COLUMNS, DOCUMENT_COLUMNS};

pub struct PgClaimStore {
    client: Client,
    find_sql: String,
    sample_sql: String,
}

impl PgClaimStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(database_url, NoTls)
            .await
            .with_context(|| format!("failed to connect to Postgres at {}", redact(database_url)))?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                tracing::error!(error = %err, "postgres connection error");
            }
        });
        tracing::info!("🗄️  Connected to claims store");
        Ok(Self {
            client,
            find_sql: format!("SELECT {} FROM claims WHERE claim_id = $1 LIMIT 1", select_list(&CLAIM_COLUMNS)),
            sample_sql: format!("SELECT {} FROM claims LIMIT $1", select_list(&DOCUMENT_COLUMNS)),
        })
    }

    pub fn is_closed(&self) -> bool { self.client.is_closed() }
}

#[async_trait]
impl ClaimStore for PgClaimStore {
    async fn find_claim(&self, claim_id: &str) -> Result<Option<Record>> {
        let row = self.client.query_opt(self.find_sql.as_str(), &[&claim_id]).await.context("claim lookup failed")?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn count_claims(&self) -> Result<u64> {
        let row = self.client.query_one("SELECT COUNT(*) FROM claims", &[]).await.context("claim count failed")?;
        let count: i64 = row.try_get(0)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn sample_claims(&self, limit: usize) -> Result<Vec<Record>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = self.client.query(self.sample_sql.as_str(), &[&limit]).await.context("claim sample failed")?;
        rows.iter().map(row_to_record).collect()
    }
}

/// Cast every column to text so numeric and date columns render uniformly.
fn select_list(columns: &[&str]) -> String {
    columns.iter().map(|c| format!("{c}::text AS {c}")).collect::<Vec<_>>().join(", ")
}

fn row_to_record(row: &Row) -> Result<Record> {
    let mut record = Record::new();
    for (i, column) in row.columns().iter().enumerate() {
        let value: Option<String> = row.try_get(i).with_context(|| format!("reading column {}", column.name()))?;
        record.push(column.name(), value);
    }
    Ok(record)
}

fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme), Some(at)) if at > scheme => format!("{}://***{}", &url[..scheme], &url[at..]),
        _ => url.to_string(),
    }
}
