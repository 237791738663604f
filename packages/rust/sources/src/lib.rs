//! Record sources: acquisition and detail extraction.
//!
//! This crate provides:
//! - [`SourceClient`] — HTTP client with rotated client identity
//! - [`RecordSource`] — the capability trait the pipeline drives
//! - [`HolychordsSource`] — the holychords.com variant
//!
//! The orchestrator depends only on [`RecordSource`]; [`create_source`]
//! selects the variant named by the run configuration.

pub mod holychords;
pub mod http;

use std::sync::Arc;

use chordsync_shared::{ChordsyncError, DetailedRecord, Identifier, Result};

pub use holychords::HolychordsSource;
pub use http::SourceClient;

/// Capability interface for a site-specific record source.
///
/// `list_identifiers` failures surface as errors so the orchestrator can
/// recover at the stage boundary; `fetch_detail` failures are per-record and
/// collapse to `None`.
#[async_trait::async_trait]
pub trait RecordSource: Send + Sync {
    /// Human-readable source name for tracing and snapshots.
    fn name(&self) -> &str;

    /// Acquire the identifiers of all records currently listed by the source.
    async fn list_identifiers(&self) -> Result<Vec<Identifier>>;

    /// Fetch and extract one record. `None` means the identifier contributes
    /// nothing to this run.
    async fn fetch_detail(&self, id: &Identifier) -> Option<DetailedRecord>;
}

/// Select the source variant named by the run configuration.
pub fn create_source(
    name: &str,
    client: Arc<SourceClient>,
    quota: Option<usize>,
) -> Result<Arc<dyn RecordSource>> {
    match name {
        "holychords" => Ok(Arc::new(HolychordsSource::new(client, quota))),
        other => Err(ChordsyncError::config(format!(
            "unknown record source: {other}"
        ))),
    }
}
