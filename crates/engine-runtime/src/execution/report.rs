use engine_core::{fsm::BatchFsmState, manifest::source_text, metrics::RunMetricsSnapshot};
use engine_processing::{
    aggregate::Aggregation,
    canonical::{AggregationStats, aggregation_stats, build_translated_text, extract_cards},
    retry_queue::RetryPassSummary,
};
use model::{
    core::identifiers::BatchId,
    execution::metrics::ProcessingMetrics,
    records::{card::Flashcard, manifest::Manifest},
};
use serde::Serialize;

/// Everything a caller gets back from a completed run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Identifier the backend assigned on submission.
    pub batch_id: BatchId,
    pub manifest_batch_id: BatchId,
    pub source_text: String,
    pub translated_text: String,
    pub cards: Vec<Flashcard>,
    pub metrics: ProcessingMetrics,
    pub stats: AggregationStats,
    pub retry: RetryPassSummary,
    pub counters: RunMetricsSnapshot,
    pub processing_time_ms: Option<i64>,
    pub state: BatchFsmState,
}

impl RunReport {
    pub fn build(
        batch_id: BatchId,
        manifest: &Manifest,
        aggregation: &Aggregation,
        use_newlines: bool,
        retry: RetryPassSummary,
        counters: RunMetricsSnapshot,
        state: BatchFsmState,
    ) -> Self {
        let processing_time_ms = state
            .processing_time(chrono::Utc::now())
            .map(|elapsed| elapsed.num_milliseconds());

        Self {
            batch_id,
            manifest_batch_id: manifest.batch_id.clone(),
            source_text: source_text(manifest, use_newlines),
            translated_text: build_translated_text(manifest, &aggregation.by_sid, use_newlines),
            cards: extract_cards(&aggregation.by_sid),
            metrics: aggregation.metrics,
            stats: aggregation_stats(&aggregation.by_sid),
            retry,
            counters,
            processing_time_ms,
            state,
        }
    }
}
