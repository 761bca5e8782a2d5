use async_trait::async_trait;

use super::models::ClassificationResult;

pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Hand-off point for persisting finished classifications. Called by the HTTP
/// layer after a successful request; the classifier never calls it.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn record(&self, filename: &str, result: &ClassificationResult) -> Result<(), SinkError>;
}

/// Writes a one-line history record to the log.
#[derive(Debug, Default, Clone)]
pub struct LogResultSink;

#[async_trait]
impl ResultSink for LogResultSink {
    async fn record(&self, filename: &str, result: &ClassificationResult) -> Result<(), SinkError> {
        let top = result
            .predictions
            .first()
            .map(|p| format!("{} ({:.3})", p.label, p.confidence))
            .unwrap_or_else(|| "none".to_string());
        log::info!(
            "history: file={} backend={} top={} count={} cached={} time={:.3}s",
            filename,
            result.backend,
            top,
            result.predictions.len(),
            result.from_cache,
            result.processing_time
        );
        Ok(())
    }
}
