use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A durable unit of deferred detail-fetch work.
///
/// Tasks are serialized as JSON and pushed onto a per-`item_type` queue
/// channel. `task_id` is `"<item_type>:<item_id>"` and is *not* unique:
/// retries re-enqueue a fresh task for the same id, and duplicates are
/// tolerated because the extended upsert is idempotent per item. A task is
/// never marked done — completion is implicit in not being requeued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub item_id: String,
    #[serde(rename = "type")]
    pub item_type: String,
    /// Informational only; never read back.
    pub status: String,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(item_id: impl Into<String>, item_type: impl Into<String>) -> Self {
        let item_id = item_id.into();
        let item_type = item_type.into();
        Self {
            task_id: format!("{item_type}:{item_id}"),
            item_id,
            item_type,
            status: "pending".to_string(),
            retry_count: 0,
            created_at: Utc::now(),
        }
    }

    /// Build the follow-up task enqueued after a failed fetch.
    ///
    /// The task_id is regenerated along with created_at, so a retry can
    /// transiently coexist with another task for the same item.
    pub fn retry(&self) -> Self {
        let mut next = Task::new(self.item_id.clone(), self.item_type.clone());
        next.retry_count = self.retry_count + 1;
        next
    }

    pub fn can_retry(&self, max_retries: u32) -> bool {
        self.retry_count < max_retries
    }

    /// Queue channel name for an item type (`"tasks_<item_type>"`).
    pub fn channel(item_type: &str) -> String {
        format!("tasks_{item_type}")
    }
}
