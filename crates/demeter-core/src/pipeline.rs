//! Two-phase harvesting pipeline driver.
//!
//! Phase 1 (basic) enumerates summaries from a [`Scraper`], batches them,
//! bulk-persists each batch, and enqueues one detail-fetch task per item.
//! Phase 2 (extended) drains tasks from the queue, fetches extended metadata
//! concurrently, and persists each result as it completes, requeueing failed
//! tasks a bounded number of times. Both phases run concurrently and share
//! state only through the store, the queue, and a phase-1-completion flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::StreamExt;
use futures::future::join_all;

use crate::error::AppError;
use crate::item::BasicRecord;
use crate::progress::{PipelineEvent, PipelineReporter};
use crate::task::Task;
use crate::traits::{ItemStore, Scraper, TaskQueue};

/// Tuning knobs for a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Summaries accumulated before a bulk upsert + enqueue flush.
    pub batch_size: usize,
    /// Requests-per-window budget shared with the scraper's rate-limiter
    /// call sites. Phase 2 drains up to `rate_limit / 2` tasks per poll so a
    /// full batch fits within one limiter window.
    pub rate_limit: u32,
    /// Failed fetches are requeued at most this many times.
    pub max_retries: u32,
    /// Sleep between polls while the queue is empty and phase 1 is running.
    pub poll_backoff: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            rate_limit: 10,
            max_retries: 3,
            poll_backoff: Duration::from_secs(2),
        }
    }
}

impl PipelineConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: u32) -> Self {
        self.rate_limit = rate_limit;
        self
    }
}

/// Drives one scraper variant through both harvest phases.
pub struct Pipeline<S, St, Q>
where
    S: Scraper,
    St: ItemStore,
    Q: TaskQueue,
{
    scraper: S,
    store: St,
    queue: Q,
    config: PipelineConfig,
}

impl<S, St, Q> Pipeline<S, St, Q>
where
    S: Scraper,
    St: ItemStore,
    Q: TaskQueue,
{
    pub fn new(scraper: S, store: St, queue: Q, config: PipelineConfig) -> Self {
        Self {
            scraper,
            store,
            queue,
            config,
        }
    }

    /// Run both phases concurrently until the enumeration is exhausted and
    /// the queue has drained.
    ///
    /// Store or queue infrastructure failures in phase 2 propagate and abort
    /// the run; item-level failures only surface in logs.
    pub async fn run<R: PipelineReporter>(&self, reporter: &R) -> Result<(), AppError> {
        let basic_done = AtomicBool::new(false);
        tokio::try_join!(
            self.run_basic(reporter, &basic_done),
            self.run_extended(reporter, &basic_done),
        )?;
        Ok(())
    }

    /// Run phase 2 alone against an existing backlog.
    ///
    /// The completion flag starts set, so the loop drains the queue and
    /// terminates instead of waiting for new work.
    pub async fn resume<R: PipelineReporter>(&self, reporter: &R) -> Result<(), AppError> {
        let basic_done = AtomicBool::new(true);
        self.run_extended(reporter, &basic_done).await
    }

    async fn run_basic<R: PipelineReporter>(
        &self,
        reporter: &R,
        basic_done: &AtomicBool,
    ) -> Result<(), AppError> {
        let item_type = self.scraper.item_type();
        reporter.report(PipelineEvent::BasicStarted { item_type });

        let mut batch: Vec<S::Summary> = Vec::with_capacity(self.config.batch_size);
        let mut stream = self.scraper.list();

        while let Some(next) = stream.next().await {
            let summary = match next {
                Ok(summary) => summary,
                Err(e) => {
                    tracing::warn!(%item_type, error = %e, "Skipping summary after enumeration error");
                    continue;
                }
            };
            // Skip policy: restricted items never reach the store or queue.
            if self.scraper.status_flags(&summary).is_restricted() {
                continue;
            }
            if !self.scraper.pre_filter(&summary) {
                continue;
            }
            batch.push(summary);
            if batch.len() >= self.config.batch_size {
                self.flush_batch(&mut batch, reporter).await;
            }
        }
        if !batch.is_empty() {
            self.flush_batch(&mut batch, reporter).await;
        }

        // Sole signal phase 2 uses to know no more work will arrive.
        basic_done.store(true, Ordering::SeqCst);
        reporter.report(PipelineEvent::BasicCompleted { item_type });
        Ok(())
    }

    /// Project, bulk-persist, and enqueue one batch.
    ///
    /// Per-item projection failures are skipped; a bulk-upsert failure drops
    /// the whole batch without enqueueing (those items are lost for this run
    /// unless a later re-enumeration picks them up).
    async fn flush_batch<R: PipelineReporter>(&self, batch: &mut Vec<S::Summary>, reporter: &R) {
        let item_type = self.scraper.item_type();
        let mut records = Vec::with_capacity(batch.len());

        for summary in batch.drain(..) {
            let item_id = match self.scraper.extract_id(&summary) {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!(%item_type, error = %e, "Skipping item with unextractable id");
                    continue;
                }
            };
            match self.scraper.extract_basic_metadata(&summary) {
                Ok(metadata) => records.push(BasicRecord::new(item_id, metadata)),
                Err(e) => {
                    tracing::warn!(%item_type, %item_id, error = %e, "Skipping item with unextractable metadata");
                }
            }
        }
        if records.is_empty() {
            return;
        }

        if let Err(e) = self.store.bulk_upsert_basic(item_type, &records).await {
            let error = e.to_string();
            reporter.report(PipelineEvent::BatchFailed {
                item_type,
                count: records.len(),
                error: &error,
            });
            return;
        }

        for record in &records {
            let task = Task::new(record.item_id.clone(), item_type);
            if let Err(e) = self.queue.push(&task).await {
                tracing::error!(%item_type, item_id = %record.item_id, error = %e, "Failed to enqueue task");
            }
        }
        reporter.report(PipelineEvent::BatchPersisted {
            item_type,
            count: records.len(),
        });
    }

    async fn run_extended<R: PipelineReporter>(
        &self,
        reporter: &R,
        basic_done: &AtomicBool,
    ) -> Result<(), AppError> {
        let item_type = self.scraper.item_type();
        let drain_max = (self.config.rate_limit / 2).max(1) as usize;

        loop {
            let mut tasks = Vec::with_capacity(drain_max);
            while tasks.len() < drain_max {
                match self.queue.pop(item_type).await? {
                    Some(task) => tasks.push(task),
                    None => break,
                }
            }

            if tasks.is_empty() {
                if basic_done.load(Ordering::SeqCst) {
                    reporter.report(PipelineEvent::ExtendedCompleted { item_type });
                    return Ok(());
                }
                reporter.report(PipelineEvent::ExtendedWaiting { item_type });
                tokio::time::sleep(self.config.poll_backoff).await;
                continue;
            }

            reporter.report(PipelineEvent::ExtendedBatch {
                item_type,
                count: tasks.len(),
            });
            // Unordered fan-out: each task touches a distinct item_id.
            let results = join_all(
                tasks
                    .into_iter()
                    .map(|task| self.process_task(task, reporter)),
            )
            .await;
            for result in results {
                result?;
            }
        }
    }

    /// Fetch and persist one task's extended metadata.
    ///
    /// Fetch failures are handled by bounded requeue; store and queue
    /// failures propagate.
    async fn process_task<R: PipelineReporter>(
        &self,
        task: Task,
        reporter: &R,
    ) -> Result<(), AppError> {
        match self.scraper.fetch_extended_metadata(&task.item_id).await {
            Ok(metadata) => {
                self.store
                    .upsert_extended(&task.item_type, &task.item_id, &metadata)
                    .await?;
                reporter.report(PipelineEvent::TaskCompleted {
                    item_id: &task.item_id,
                });
            }
            Err(e) if task.can_retry(self.config.max_retries) => {
                tracing::warn!(
                    item_id = %task.item_id,
                    error = %e,
                    transient = e.is_retryable(),
                    attempt = task.retry_count + 1,
                    "Extended fetch failed"
                );
                let retried = task.retry();
                self.queue.push(&retried).await?;
                reporter.report(PipelineEvent::TaskRequeued {
                    item_id: &retried.item_id,
                    retry_count: retried.retry_count,
                });
            }
            Err(e) => {
                tracing::error!(
                    item_id = %task.item_id,
                    error = %e,
                    transient = e.is_retryable(),
                    "Giving up on task"
                );
                reporter.report(PipelineEvent::TaskAbandoned {
                    item_id: &task.item_id,
                    attempts: task.retry_count + 1,
                });
            }
        }
        Ok(())
    }
}
