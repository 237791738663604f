//! Pipeline orchestrator: drives one full run.
//!
//! A run walks `Listing → Detailing → Normalizing → Dispatching` in order.
//! The [`RunContext`] is created fresh for each run; every stage's source
//! sequence is released before the next stage starts, so only one stage's
//! data is live at a time. Stage failures are logged and recovered at the
//! stage boundary; a run always finishes, even with nothing to dispatch.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use chordsync_shared::{DetailedRecord, Identifier, NormalizedRecord, PipelineConfig};
use chordsync_sources::RecordSource;

use crate::batch::run_batched;
use crate::normalize::Normalizer;
use crate::sink::{RECORD_EVENT, RecordSink, TERMINAL_EVENT};
use crate::snapshot;

/// Per-run mutable state, exclusively owned by one run.
#[derive(Debug, Default)]
pub struct RunContext {
    pub identifiers: Vec<Identifier>,
    pub detailed: Vec<DetailedRecord>,
    pub normalized: Vec<NormalizedRecord>,
}

/// Drives the acquire → detail → normalize → dispatch pipeline.
pub struct Orchestrator {
    source: Arc<dyn RecordSource>,
    normalizer: Arc<Normalizer>,
    sink: Box<dyn RecordSink>,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn RecordSource>,
        normalizer: Normalizer,
        sink: Box<dyn RecordSink>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            source,
            normalizer: Arc::new(normalizer),
            sink,
            config,
        }
    }

    /// Run the pipeline once. Stage errors are logged, never propagated.
    #[instrument(skip_all, fields(source = %self.source.name(), run_id = %Uuid::now_v7()))]
    pub async fn run(&mut self) {
        let started = Instant::now();
        let mut ctx = RunContext::default();

        // --- Listing ---
        let stage = Instant::now();
        match self.source.list_identifiers().await {
            Ok(identifiers) => ctx.identifiers = identifiers,
            Err(e) => error!(error = %e, "acquisition failed, continuing with no identifiers"),
        }
        info!(
            stage = "listing",
            count = ctx.identifiers.len(),
            elapsed_ms = stage.elapsed().as_millis() as u64,
            "stage complete"
        );

        // --- Detailing ---
        let stage = Instant::now();
        let identifiers = std::mem::take(&mut ctx.identifiers);
        let source = Arc::clone(&self.source);
        ctx.detailed = run_batched(
            identifiers,
            self.config.detail_width,
            self.config.max_records,
            move |id| {
                let source = Arc::clone(&source);
                async move { source.fetch_detail(&id).await }
            },
        )
        .await;
        info!(
            stage = "detailing",
            count = ctx.detailed.len(),
            elapsed_ms = stage.elapsed().as_millis() as u64,
            "stage complete"
        );

        // --- Normalizing ---
        let stage = Instant::now();
        let detailed = std::mem::take(&mut ctx.detailed);
        let normalizer = Arc::clone(&self.normalizer);
        ctx.normalized = run_batched(detailed, self.config.normalize_width, None, move |record| {
            let normalizer = Arc::clone(&normalizer);
            async move { Some(normalizer.normalize(record).await) }
        })
        .await;
        info!(
            stage = "normalizing",
            count = ctx.normalized.len(),
            elapsed_ms = stage.elapsed().as_millis() as u64,
            "stage complete"
        );

        // --- Diagnostic snapshot (the only fatal path) ---
        if self.config.snapshot {
            if let Err(e) = snapshot::write_snapshot(
                &self.config.snapshot_dir,
                self.source.name(),
                &ctx.normalized,
                started.elapsed(),
            ) {
                error!(error = %e, "diagnostic snapshot write failed, aborting run");
                return;
            }
        }

        // --- Dispatching ---
        self.dispatch(&mut ctx).await;

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "run complete"
        );
    }

    /// Stream all normalized records to the sink, in order, then the
    /// terminal signal. Per-record failures are logged and skipped.
    async fn dispatch(&mut self, ctx: &mut RunContext) {
        if let Err(e) = self.sink.connect().await {
            error!(error = %e, "sink connect failed, skipping dispatch");
            ctx.normalized.clear();
            return;
        }

        let total = ctx.normalized.len();
        for (i, record) in ctx.normalized.iter().enumerate() {
            let payload = match serde_json::to_value(record) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(url = %record.url, error = %e, "record serialization failed, skipping");
                    continue;
                }
            };

            if let Err(e) = self.sink.emit(RECORD_EVENT, payload).await {
                warn!(url = %record.url, error = %e, "sink rejected record");
            }

            let sent = i + 1;
            if sent % 100 == 0 || sent == total {
                info!(sent, total, "dispatch progress");
            }
        }
        ctx.normalized.clear();

        if let Err(e) = self.sink.emit(TERMINAL_EVENT, serde_json::json!({})).await {
            warn!(error = %e, "terminal signal failed");
        }
        if let Err(e) = self.sink.disconnect().await {
            warn!(error = %e, "sink disconnect failed");
        }
    }
}
