//! Claim stores: Postgres for real deployments, an in-memory table for tests and demos.
pub mod memory;
pub mod postgres;

pub use memory::MemoryClaimStore;
pub use postgres::PgClaimStore;

/// Every column of the `claims` table, in select order.
pub const CLAIM_COLUMNS: [&str; 11] = [
    "claim_id",
    "policy_number",
    "claim_date",
    "claim_amount",
    "claim_status",
    "claim_type",
    "settlement_amount",
    "processing_days",
    "diagnosis_code",
    "provider_id",
    "file_source",
];

/// Columns projected for the semantic index.
pub const DOCUMENT_COLUMNS: [&str; 4] = ["claim_id", "claim_type", "claim_status", "diagnosis_code"];
