use thiserror::Error;

/// Failure kinds of the answering pipeline.
///
/// `IndexUnavailable` is always recovered inside the index crate and never
/// reaches callers of `answer`; `Store` is propagated as a hard failure;
/// `Generation` is turned into a single error fragment on the stream.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Store query failed: {0}")]
    Store(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Generation failed: {0}")]
    Generation(String),
}

impl Error {
    /// Wrap an adapter error as a store failure, keeping the whole context chain.
    pub fn store(err: anyhow::Error) -> Self { Error::Store(format!("{err:#}")) }

    pub fn embedding(err: anyhow::Error) -> Self { Error::Embedding(format!("{err:#}")) }

    pub fn generation(err: anyhow::Error) -> Self { Error::Generation(format!("{err:#}")) }

    /// The message without the kind prefix.
    pub fn detail(&self) -> &str {
        match self {
            Error::InvalidConfig(d) | Error::IndexUnavailable(d) | Error::Store(d) | Error::Embedding(d) | Error::Generation(d) => d,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
