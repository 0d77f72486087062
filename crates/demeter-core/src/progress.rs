//! Pipeline progress events, decoupled from any particular sink.

/// Events emitted by the pipeline driver for monitoring/logging.
#[derive(Debug, Clone)]
pub enum PipelineEvent<'a> {
    BasicStarted {
        item_type: &'a str,
    },
    BatchPersisted {
        item_type: &'a str,
        count: usize,
    },
    BatchFailed {
        item_type: &'a str,
        count: usize,
        error: &'a str,
    },
    BasicCompleted {
        item_type: &'a str,
    },
    ExtendedWaiting {
        item_type: &'a str,
    },
    ExtendedBatch {
        item_type: &'a str,
        count: usize,
    },
    TaskCompleted {
        item_id: &'a str,
    },
    TaskRequeued {
        item_id: &'a str,
        retry_count: u32,
    },
    TaskAbandoned {
        item_id: &'a str,
        attempts: u32,
    },
    ExtendedCompleted {
        item_type: &'a str,
    },
}

/// Trait for receiving pipeline events (decoupled logging).
pub trait PipelineReporter: Send + Sync {
    fn report(&self, event: PipelineEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl PipelineReporter for SilentReporter {}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl PipelineReporter for TracingReporter {
    fn report(&self, event: PipelineEvent<'_>) {
        match event {
            PipelineEvent::BasicStarted { item_type } => {
                tracing::info!(%item_type, "Basic stage started");
            }
            PipelineEvent::BatchPersisted { item_type, count } => {
                tracing::info!(%item_type, %count, "Batch persisted and enqueued");
            }
            PipelineEvent::BatchFailed {
                item_type,
                count,
                error,
            } => {
                tracing::error!(%item_type, %count, %error, "Batch persistence failed");
            }
            PipelineEvent::BasicCompleted { item_type } => {
                tracing::info!(%item_type, "Basic stage completed");
            }
            PipelineEvent::ExtendedWaiting { item_type } => {
                tracing::debug!(%item_type, "No tasks available, waiting");
            }
            PipelineEvent::ExtendedBatch { item_type, count } => {
                tracing::debug!(%item_type, %count, "Processing extended batch");
            }
            PipelineEvent::TaskCompleted { item_id } => {
                tracing::debug!(%item_id, "Extended metadata persisted");
            }
            PipelineEvent::TaskRequeued {
                item_id,
                retry_count,
            } => {
                tracing::warn!(%item_id, %retry_count, "Fetch failed, task requeued");
            }
            PipelineEvent::TaskAbandoned { item_id, attempts } => {
                tracing::error!(%item_id, %attempts, "Task abandoned after repeated failures");
            }
            PipelineEvent::ExtendedCompleted { item_type } => {
                tracing::info!(%item_type, "Extended stage completed");
            }
        }
    }
}
