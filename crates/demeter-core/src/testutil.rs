//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream::BoxStream;

use crate::error::AppError;
use crate::item::{BasicRecord, ItemPhase, ItemStats, StatusFlags};
use crate::progress::{PipelineEvent, PipelineReporter};
use crate::task::Task;
use crate::traits::{ItemStore, RateLimiter, Scraper, TaskQueue};

// ---------------------------------------------------------------------------
// TestSummary / MockScraper
// ---------------------------------------------------------------------------

/// Minimal source summary used by [`MockScraper`].
#[derive(Debug, Clone)]
pub struct TestSummary {
    pub id: String,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub flags: StatusFlags,
    broken: bool,
}

impl TestSummary {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            author: None,
            tags: Vec::new(),
            flags: StatusFlags::default(),
            broken: false,
        }
    }

    pub fn with_flags(mut self, flags: StatusFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Make both projections fail for this summary.
    pub fn with_broken_projection(mut self) -> Self {
        self.broken = true;
        self
    }
}

/// Mock scraper with scripted summaries and per-id fetch results.
#[derive(Clone)]
pub struct MockScraper {
    item_type: &'static str,
    /// Drained on the first `list()` call — the stream is not restartable.
    summaries: Arc<Mutex<Vec<Result<TestSummary, AppError>>>>,
    primed: Arc<Mutex<HashMap<String, VecDeque<Result<serde_json::Value, AppError>>>>>,
    fail_always: Arc<Mutex<HashSet<String>>>,
    attempts: Arc<Mutex<HashMap<String, u32>>>,
    list_delay: Option<Duration>,
}

impl MockScraper {
    pub fn new(item_type: &'static str, summaries: Vec<Result<TestSummary, AppError>>) -> Self {
        Self {
            item_type,
            summaries: Arc::new(Mutex::new(summaries)),
            primed: Arc::new(Mutex::new(HashMap::new())),
            fail_always: Arc::new(Mutex::new(HashSet::new())),
            attempts: Arc::new(Mutex::new(HashMap::new())),
            list_delay: None,
        }
    }

    /// Sleep before yielding each summary (simulates a slow enumeration).
    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    /// Queue one fetch result for an id; later attempts fall back to a
    /// default success payload.
    pub fn prime_fetch(&self, item_id: &str, result: Result<serde_json::Value, AppError>) {
        self.primed
            .lock()
            .unwrap()
            .entry(item_id.to_string())
            .or_default()
            .push_back(result);
    }

    /// Make every fetch for an id fail.
    pub fn fail_fetch_always(&self, item_id: &str) {
        self.fail_always.lock().unwrap().insert(item_id.to_string());
    }

    pub fn fetch_attempts(&self, item_id: &str) -> u32 {
        self.attempts
            .lock()
            .unwrap()
            .get(item_id)
            .copied()
            .unwrap_or(0)
    }
}

impl Scraper for MockScraper {
    type Summary = TestSummary;

    fn item_type(&self) -> &'static str {
        self.item_type
    }

    fn list(&self) -> BoxStream<'_, Result<TestSummary, AppError>> {
        let items = std::mem::take(&mut *self.summaries.lock().unwrap());
        let delay = self.list_delay;
        futures::stream::iter(items)
            .then(move |item| async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                item
            })
            .boxed()
    }

    fn extract_id(&self, summary: &TestSummary) -> Result<String, AppError> {
        if summary.broken {
            return Err(AppError::ExtractionError("summary has no id".into()));
        }
        Ok(summary.id.clone())
    }

    fn extract_basic_metadata(&self, summary: &TestSummary) -> Result<serde_json::Value, AppError> {
        if summary.broken {
            return Err(AppError::ExtractionError("summary has no metadata".into()));
        }
        Ok(serde_json::json!({
            "id": summary.id,
            "author": summary.author,
            "tags": summary.tags,
        }))
    }

    fn status_flags(&self, summary: &TestSummary) -> StatusFlags {
        summary.flags
    }

    async fn fetch_extended_metadata(&self, item_id: &str) -> Result<serde_json::Value, AppError> {
        *self
            .attempts
            .lock()
            .unwrap()
            .entry(item_id.to_string())
            .or_default() += 1;

        if self.fail_always.lock().unwrap().contains(item_id) {
            return Err(AppError::NetworkError("scripted failure".into()));
        }
        if let Some(queue) = self.primed.lock().unwrap().get_mut(item_id)
            && let Some(result) = queue.pop_front()
        {
            return result;
        }
        Ok(serde_json::json!({"fetched": item_id}))
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// One stored item record.
#[derive(Debug, Clone)]
pub struct StoredItem {
    pub basic: serde_json::Value,
    pub extended: Option<serde_json::Value>,
    pub phase: ItemPhase,
    pub updated_at: DateTime<Utc>,
}

/// In-memory [`ItemStore`] keyed by `(item_type, item_id)`.
#[derive(Clone, Default)]
pub struct MemoryStore {
    items: Arc<Mutex<HashMap<(String, String), StoredItem>>>,
    /// Sizes of each bulk upsert, in call order.
    pub bulk_sizes: Arc<Mutex<Vec<usize>>>,
    bulk_error: Arc<Mutex<Option<AppError>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, item_type: &str, item_id: &str) -> Option<StoredItem> {
        self.items
            .lock()
            .unwrap()
            .get(&(item_type.to_string(), item_id.to_string()))
            .cloned()
    }

    /// Insert a bare basic-phase record directly.
    pub fn seed_basic(&self, item_type: &str, item_id: &str) {
        self.items.lock().unwrap().insert(
            (item_type.to_string(), item_id.to_string()),
            StoredItem {
                basic: serde_json::json!({"id": item_id}),
                extended: None,
                phase: ItemPhase::Basic,
                updated_at: Utc::now(),
            },
        );
    }

    /// Make the next bulk upsert fail.
    pub fn fail_next_bulk(&self) {
        *self.bulk_error.lock().unwrap() =
            Some(AppError::DatabaseError("bulk write refused".into()));
    }
}

impl ItemStore for MemoryStore {
    async fn bulk_upsert_basic(
        &self,
        item_type: &str,
        records: &[BasicRecord],
    ) -> Result<(), AppError> {
        if let Some(e) = self.bulk_error.lock().unwrap().take() {
            return Err(e);
        }
        self.bulk_sizes.lock().unwrap().push(records.len());
        let mut items = self.items.lock().unwrap();
        for record in records {
            let key = (item_type.to_string(), record.item_id.clone());
            let entry = items.entry(key).or_insert_with(|| StoredItem {
                basic: serde_json::Value::Null,
                extended: None,
                phase: ItemPhase::Basic,
                updated_at: Utc::now(),
            });
            entry.basic = record.metadata.clone();
            entry.phase = ItemPhase::Basic;
            entry.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn upsert_extended(
        &self,
        item_type: &str,
        item_id: &str,
        metadata: &serde_json::Value,
    ) -> Result<(), AppError> {
        let mut items = self.items.lock().unwrap();
        if let Some(item) = items.get_mut(&(item_type.to_string(), item_id.to_string())) {
            item.extended = Some(metadata.clone());
            item.phase = ItemPhase::Extended;
            item.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn phase(&self, item_type: &str, item_id: &str) -> Result<Option<ItemPhase>, AppError> {
        Ok(self.get(item_type, item_id).map(|item| item.phase))
    }

    async fn list_authors(&self, item_types: &[&str]) -> Result<Vec<String>, AppError> {
        let items = self.items.lock().unwrap();
        let mut authors: Vec<String> = items
            .iter()
            .filter(|((t, _), _)| item_types.contains(&t.as_str()))
            .filter_map(|(_, item)| item.basic.get("author"))
            .filter_map(|a| a.as_str().map(String::from))
            .collect();
        authors.sort();
        authors.dedup();
        Ok(authors)
    }

    async fn list_item_ids(&self, item_type: &str) -> Result<Vec<String>, AppError> {
        let items = self.items.lock().unwrap();
        let mut ids: Vec<String> = items
            .keys()
            .filter(|(t, _)| t == item_type)
            .map(|(_, id)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn stats(&self, item_type: &str) -> Result<ItemStats, AppError> {
        let items = self.items.lock().unwrap();
        let mut stats = ItemStats::default();
        for ((t, _), item) in items.iter() {
            if t == item_type {
                stats.total += 1;
                match item.phase {
                    ItemPhase::Basic => stats.basic += 1,
                    ItemPhase::Extended => stats.extended += 1,
                }
            }
        }
        Ok(stats)
    }
}

// ---------------------------------------------------------------------------
// MemoryQueue
// ---------------------------------------------------------------------------

/// In-memory [`TaskQueue`] with per-channel FIFO order.
#[derive(Clone, Default)]
pub struct MemoryQueue {
    channels: Arc<Mutex<HashMap<String, VecDeque<Task>>>>,
    /// Every task ever pushed, in push order.
    pub pushed: Arc<Mutex<Vec<Task>>>,
    pop_error: Arc<Mutex<Option<AppError>>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous push, for seeding a backlog.
    pub fn push_now(&self, task: Task) {
        self.channels
            .lock()
            .unwrap()
            .entry(Task::channel(&task.item_type))
            .or_default()
            .push_back(task);
    }

    /// Synchronous pop, for assertions.
    pub fn pop_now(&self, item_type: &str) -> Option<Task> {
        self.channels
            .lock()
            .unwrap()
            .get_mut(&Task::channel(item_type))
            .and_then(|q| q.pop_front())
    }

    pub fn fail_next_pop(&self) {
        *self.pop_error.lock().unwrap() = Some(AppError::DatabaseError("queue unreachable".into()));
    }
}

impl TaskQueue for MemoryQueue {
    async fn push(&self, task: &Task) -> Result<(), AppError> {
        self.pushed.lock().unwrap().push(task.clone());
        self.push_now(task.clone());
        Ok(())
    }

    async fn pop(&self, item_type: &str) -> Result<Option<Task>, AppError> {
        if let Some(e) = self.pop_error.lock().unwrap().take() {
            return Err(e);
        }
        Ok(self.pop_now(item_type))
    }
}

// ---------------------------------------------------------------------------
// MemoryRateLimiter
// ---------------------------------------------------------------------------

/// In-memory sliding-window [`RateLimiter`].
///
/// Uses `tokio::time::Instant` so paused-clock tests can advance the window.
#[derive(Clone)]
pub struct MemoryRateLimiter {
    window: Duration,
    admissions: Arc<Mutex<HashMap<String, Vec<tokio::time::Instant>>>>,
}

impl Default for MemoryRateLimiter {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            admissions: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl MemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }
}

impl RateLimiter for MemoryRateLimiter {
    async fn admit(&self, key: &str, limit: u32) -> Result<bool, AppError> {
        let now = tokio::time::Instant::now();
        let mut admissions = self.admissions.lock().unwrap();
        let entries = admissions.entry(format!("rate_limit:{key}")).or_default();
        entries.retain(|t| now.duration_since(*t) < self.window);
        if entries.len() < limit as usize {
            entries.push(now);
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Reporter that records events for assertions.
#[derive(Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
    pub requeued: Arc<Mutex<Vec<(String, u32)>>>,
    pub abandoned: Arc<Mutex<Vec<(String, u32)>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl PipelineReporter for MockReporter {
    fn report(&self, event: PipelineEvent<'_>) {
        let label = match &event {
            PipelineEvent::BasicStarted { .. } => "BasicStarted",
            PipelineEvent::BatchPersisted { .. } => "BatchPersisted",
            PipelineEvent::BatchFailed { .. } => "BatchFailed",
            PipelineEvent::BasicCompleted { .. } => "BasicCompleted",
            PipelineEvent::ExtendedWaiting { .. } => "ExtendedWaiting",
            PipelineEvent::ExtendedBatch { .. } => "ExtendedBatch",
            PipelineEvent::TaskCompleted { .. } => "TaskCompleted",
            PipelineEvent::TaskRequeued { .. } => "TaskRequeued",
            PipelineEvent::TaskAbandoned { .. } => "TaskAbandoned",
            PipelineEvent::ExtendedCompleted { .. } => "ExtendedCompleted",
        };
        self.events.lock().unwrap().push(label.to_string());

        match event {
            PipelineEvent::TaskRequeued {
                item_id,
                retry_count,
            } => self
                .requeued
                .lock()
                .unwrap()
                .push((item_id.to_string(), retry_count)),
            PipelineEvent::TaskAbandoned { item_id, attempts } => self
                .abandoned
                .lock()
                .unwrap()
                .push((item_id.to_string(), attempts)),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::RateLimiter;

    #[tokio::test(start_paused = true)]
    async fn admissions_never_exceed_limit_within_window() {
        let limiter = MemoryRateLimiter::new();
        let mut admitted = 0;
        for _ in 0..20 {
            if limiter.admit("likers", 5).await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 5);

        // Window expiry frees permits again.
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.admit("likers", 5).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_cannot_overshoot() {
        let limiter = MemoryRateLimiter::new();
        let handles: Vec<_> = (0..20)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.admit("contributors", 5).await.unwrap() })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_throttled_independently() {
        let limiter = MemoryRateLimiter::new();
        for _ in 0..3 {
            assert!(limiter.admit("likers", 3).await.unwrap());
        }
        assert!(!limiter.admit("likers", 3).await.unwrap());
        assert!(limiter.admit("followers", 3).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_admission_polls_until_a_permit_frees_up() {
        let limiter = MemoryRateLimiter::new().with_window(Duration::from_secs(2));
        assert!(limiter.admit("upvoters", 1).await.unwrap());

        let start = tokio::time::Instant::now();
        limiter.wait_for_admission("upvoters", 1).await.unwrap();
        // Rejected at least once, then admitted after the 1s poll sleep.
        assert!(start.elapsed() >= Duration::from_secs(1));
    }
}
