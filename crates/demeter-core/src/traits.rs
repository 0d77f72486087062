use std::future::Future;
use std::time::Duration;

use futures::stream::BoxStream;

use crate::error::AppError;
use crate::item::{BasicRecord, ItemPhase, ItemStats, StatusFlags};
use crate::task::Task;

/// One harvestable resource kind (models, datasets, organizations,
/// collections).
///
/// A scraper knows how to enumerate summaries, project them into an id and a
/// basic-metadata document, and fetch extended detail for a single id. The
/// pipeline driver is generic over this trait; variants share no code paths
/// beyond it.
pub trait Scraper: Send + Sync {
    /// Source-defined summary type yielded by [`list`](Scraper::list).
    type Summary: Send;

    /// Stable discriminator, used as the store collection name and the
    /// task-queue partition key.
    fn item_type(&self) -> &'static str;

    /// Enumerate resource summaries.
    ///
    /// The stream is finite and lazy but not restartable: re-invoking
    /// re-runs the full remote enumeration. It may itself perform
    /// rate-limited network calls (e.g. per-id search) and applies the
    /// configured tag filter. Item-level errors are yielded as `Err` and
    /// skipped by the driver.
    fn list(&self) -> BoxStream<'_, Result<Self::Summary, AppError>>;

    /// Project a summary into its item id. Pure, no I/O.
    fn extract_id(&self, summary: &Self::Summary) -> Result<String, AppError>;

    /// Project a summary into its basic-metadata document. Pure, no I/O.
    fn extract_basic_metadata(
        &self,
        summary: &Self::Summary,
    ) -> Result<serde_json::Value, AppError>;

    /// Access-restriction flags for the skip policy. Variants whose
    /// summaries carry no flags keep the default (never restricted).
    fn status_flags(&self, _summary: &Self::Summary) -> StatusFlags {
        StatusFlags::default()
    }

    /// Variant-specific summary predicate (e.g. minimum upvotes).
    /// Summaries failing it are silently excluded before the pipeline.
    fn pre_filter(&self, _summary: &Self::Summary) -> bool {
        true
    }

    /// Fetch extended metadata for one item via rate-limited detail calls.
    ///
    /// Identity lists in the result are deduplicated preserving first-seen
    /// order. A failing ancillary sub-fetch yields an empty list for that
    /// sub-field rather than failing the call, unless the variant documents
    /// otherwise.
    fn fetch_extended_metadata(
        &self,
        item_id: &str,
    ) -> impl Future<Output = Result<serde_json::Value, AppError>> + Send;
}

/// Primary store for harvested item records, keyed by
/// `(item_type, item_id)`.
///
/// The core only requires bulk basic upsert, point extended upsert, and a
/// handful of reads; upserts are at-least-once and idempotent per id.
pub trait ItemStore: Send + Sync + Clone {
    /// Upsert a batch of basic-metadata records in one call.
    ///
    /// Overwrites any previous basic metadata (rescrape is overwrite, not
    /// merge) and resets the item to the basic phase.
    fn bulk_upsert_basic(
        &self,
        item_type: &str,
        records: &[BasicRecord],
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Attach extended metadata to an existing record and move it to the
    /// extended phase. A no-op for ids phase 1 never persisted.
    fn upsert_extended(
        &self,
        item_type: &str,
        item_id: &str,
        metadata: &serde_json::Value,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Phase of a stored item, or `None` if absent.
    fn phase(
        &self,
        item_type: &str,
        item_id: &str,
    ) -> impl Future<Output = Result<Option<ItemPhase>, AppError>> + Send;

    /// Distinct authors recorded in the basic metadata of the given
    /// collections. Feeds the organization scraper's enumeration.
    fn list_authors(
        &self,
        item_types: &[&str],
    ) -> impl Future<Output = Result<Vec<String>, AppError>> + Send;

    /// All item ids stored for a collection. Feeds the collection scraper.
    fn list_item_ids(
        &self,
        item_type: &str,
    ) -> impl Future<Output = Result<Vec<String>, AppError>> + Send;

    /// Count-based harvest statistics for a collection.
    fn stats(&self, item_type: &str) -> impl Future<Output = Result<ItemStats, AppError>> + Send;
}

/// Durable FIFO queue of detail-fetch tasks, partitioned by item type.
///
/// FIFO order is best-effort under concurrent producers/consumers, and no
/// ordering holds across partitions. Delivery is at-most-once per pop: a
/// crash between pop and persist loses the task unless the fetch-failure
/// retry path catches it.
pub trait TaskQueue: Send + Sync + Clone {
    /// Append a task to the tail of its item-type channel.
    fn push(&self, task: &Task) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Remove and return the head task of a channel, or `None` if empty.
    /// Non-blocking; callers implement their own backoff.
    fn pop(&self, item_type: &str) -> impl Future<Output = Result<Option<Task>, AppError>> + Send;
}

/// Distributed sliding-window admission controller.
///
/// All workers and processes sharing the same store see the same window
/// state, keyed by `"rate_limit:<kind>"`. The window is fixed at 60 seconds;
/// the permit count is supplied per call site.
pub trait RateLimiter: Send + Sync + Clone {
    /// Atomically check-and-record one admission for `key`.
    ///
    /// Returns `true` (and records the current timestamp) if fewer than
    /// `limit` admissions fall within the trailing window, `false` with no
    /// side effects otherwise. The check and the record must be atomic with
    /// respect to all concurrent callers sharing the store.
    fn admit(&self, key: &str, limit: u32) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Block until `admit` succeeds, polling once per second.
    ///
    /// There is no timeout and no cancellation: if the remote quota for
    /// `key` is permanently exhausted this waits forever. Known limitation,
    /// preserved deliberately.
    fn wait_for_admission(
        &self,
        key: &str,
        limit: u32,
    ) -> impl Future<Output = Result<(), AppError>> + Send {
        async move {
            loop {
                if self.admit(key, limit).await? {
                    return Ok(());
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}
