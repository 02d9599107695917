//! Ordered fallback over interchangeable sources.
//!
//! Each candidate is a named capability: a closure producing the future that
//! performs the work. Candidates are invoked lazily and strictly in order; the
//! first success wins, failures are logged with the candidate's name and
//! collected so callers can report them.

use futures::future::BoxFuture;
use thiserror::Error;
use tracing::{info, warn};

pub type Invoke<'a, T> = Box<dyn FnOnce() -> BoxFuture<'a, eyre::Result<T>> + Send + 'a>;

pub struct Candidate<'a, T> {
    pub name: String,
    invoke: Invoke<'a, T>,
}

impl<'a, T> Candidate<'a, T> {
    pub fn new<F>(name: impl Into<String>, invoke: F) -> Self
    where
        F: FnOnce() -> BoxFuture<'a, eyre::Result<T>> + Send + 'a,
    {
        Self {
            name: name.into(),
            invoke: Box::new(invoke),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub source: String,
    pub error: String,
}

#[derive(Debug)]
pub struct FallbackOutcome<T> {
    pub value: T,
    pub source: String,
    /// Failures of the candidates tried before the winner, in order.
    pub failures: Vec<SourceFailure>,
}

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("no sources configured for {label}")]
    NoSources { label: String },
    #[error("all {} sources failed for {label}, last error: {last}", failures.len())]
    Exhausted {
        label: String,
        failures: Vec<SourceFailure>,
        last: eyre::Report,
    },
}

impl SequenceError {
    pub fn failures(&self) -> &[SourceFailure] {
        match self {
            SequenceError::NoSources { .. } => &[],
            SequenceError::Exhausted { failures, .. } => failures,
        }
    }
}

/// Runs candidates in order and returns the first success.
pub async fn run_with_fallback<'a, T>(
    label: &str,
    candidates: Vec<Candidate<'a, T>>,
) -> Result<FallbackOutcome<T>, SequenceError> {
    if candidates.is_empty() {
        return Err(SequenceError::NoSources { label: label.to_string() });
    }

    let mut failures = Vec::new();
    let mut last_error = None;

    for candidate in candidates {
        let Candidate { name, invoke } = candidate;
        match invoke().await {
            Ok(value) => {
                if !failures.is_empty() {
                    info!(label, source = %name, failed_before = failures.len(), "Recovered via fallback source");
                }
                return Ok(FallbackOutcome { value, source: name, failures });
            }
            Err(e) => {
                warn!(label, source = %name, error = %e, "Source failed, trying next");
                failures.push(SourceFailure { source: name, error: e.to_string() });
                last_error = Some(e);
            }
        }
    }

    let last = last_error.unwrap_or_else(|| eyre::eyre!("all sources failed for {label}"));
    Err(SequenceError::Exhausted {
        label: label.to_string(),
        failures,
        last,
    })
}

/// Rejects an empty collection so an empty-but-successful response counts as a failure.
pub fn ensure_non_empty<T>(items: Vec<T>) -> eyre::Result<Vec<T>> {
    if items.is_empty() {
        eyre::bail!("No data returned");
    }
    Ok(items)
}
