//! Dataset repo scraper.
//!
//! Identical two-phase shape to the model scraper, plus a targeted listing
//! mode: given explicit resource ids, enumeration goes through the search
//! endpoint (one rate-limited query per id) instead of the full listing.

use chrono::{DateTime, Utc};
use futures::future;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::Deserialize;
use serde_json::json;

use demeter_core::traits::{RateLimiter, Scraper};
use demeter_core::util::{dedup_preserve_order, tags_match};
use demeter_core::{AppError, StatusFlags};

use crate::hub::{HubClient, gated_flag};
use crate::tags::filter_tags;

pub const DATASET_EXPAND_FIELDS: &[&str] = &[
    "author",
    "cardData",
    "createdAt",
    "disabled",
    "downloads",
    "downloadsAllTime",
    "lastModified",
    "likes",
    "private",
    "tags",
];

const DATASET_TAG_NAMESPACES: &[&str] = &["language:", "region:"];

const CARD_FIELDS: &[&str] = &[
    "annotations_creators",
    "language_creators",
    "size_categories",
    "source_datasets",
    "task_categories",
    "task_ids",
    "paperswithcode_id",
];

/// One entry from the dataset listing or search endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetSummary {
    pub id: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default, rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "lastModified")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub downloads: Option<u64>,
    #[serde(default, rename = "downloadsAllTime")]
    pub downloads_all_time: Option<u64>,
    #[serde(default)]
    pub likes: Option<u64>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, deserialize_with = "gated_flag")]
    pub gated: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, rename = "cardData")]
    pub card_data: Option<serde_json::Value>,
}

#[derive(Clone)]
pub struct DatasetScraper<R: RateLimiter> {
    hub: HubClient,
    limiter: R,
    limit: Option<usize>,
    tags: Option<Vec<String>>,
    resource_ids: Option<Vec<String>>,
    rate_limit: u32,
}

impl<R: RateLimiter + 'static> DatasetScraper<R> {
    pub fn new(hub: HubClient, limiter: R, rate_limit: u32) -> Self {
        Self {
            hub,
            limiter,
            limit: None,
            tags: None,
            resource_ids: None,
            rate_limit,
        }
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_tags(mut self, tags: Option<Vec<String>>) -> Self {
        self.tags = tags;
        self
    }

    /// Restrict enumeration to exact-id search over the given ids.
    pub fn with_resource_ids(mut self, ids: Option<Vec<String>>) -> Self {
        self.resource_ids = ids;
        self
    }

    fn search_stream(&self, ids: Vec<String>) -> BoxStream<'static, Result<DatasetSummary, AppError>> {
        let hub = self.hub.clone();
        let limiter = self.limiter.clone();
        let rate_limit = self.rate_limit;
        stream::iter(ids)
            .then(move |target| {
                let hub = hub.clone();
                let limiter = limiter.clone();
                async move {
                    limiter
                        .wait_for_admission("search_datasets", rate_limit)
                        .await?;
                    let results = hub.search_datasets(&target, DATASET_EXPAND_FIELDS).await?;
                    // Search is fuzzy; only the exact id counts as found.
                    Ok::<_, AppError>(stream::iter(
                        results
                            .into_iter()
                            .filter(move |d| d.id == target)
                            .map(Ok),
                    ))
                }
            })
            .try_flatten()
            .boxed()
    }

    async fn fetch_likers(&self, item_id: &str) -> Result<Vec<String>, AppError> {
        self.limiter
            .wait_for_admission("likers", self.rate_limit)
            .await?;
        match self.hub.likers("datasets", item_id).await {
            Ok(likers) => Ok(likers),
            Err(e) => {
                tracing::warn!(item_id, error = %e, "Failed to fetch dataset likers");
                Ok(Vec::new())
            }
        }
    }

    async fn fetch_contributors(&self, item_id: &str) -> Result<Vec<String>, AppError> {
        self.limiter
            .wait_for_admission("contributors", self.rate_limit)
            .await?;
        match self.hub.commit_authors("datasets", item_id).await {
            Ok(authors) => Ok(dedup_preserve_order(authors)),
            Err(e) => {
                tracing::warn!(item_id, error = %e, "Failed to fetch dataset contributors");
                Ok(Vec::new())
            }
        }
    }
}

impl<R: RateLimiter + 'static> Scraper for DatasetScraper<R> {
    type Summary = DatasetSummary;

    fn item_type(&self) -> &'static str {
        "datasets"
    }

    fn list(&self) -> BoxStream<'_, Result<DatasetSummary, AppError>> {
        let base = match &self.resource_ids {
            Some(ids) => self.search_stream(ids.clone()),
            None => self.hub.list_datasets(self.limit, DATASET_EXPAND_FIELDS),
        };
        let tags = self.tags.clone();
        base.try_filter(move |dataset| future::ready(tags_match(tags.as_deref(), &dataset.tags)))
            .boxed()
    }

    fn extract_id(&self, summary: &DatasetSummary) -> Result<String, AppError> {
        Ok(summary.id.clone())
    }

    fn extract_basic_metadata(
        &self,
        summary: &DatasetSummary,
    ) -> Result<serde_json::Value, AppError> {
        let card_data = summary.card_data.as_ref().map(|card| {
            let fields: serde_json::Map<String, serde_json::Value> = CARD_FIELDS
                .iter()
                .map(|field| {
                    let value = card.get(field).cloned().unwrap_or(serde_json::Value::Null);
                    ((*field).to_string(), value)
                })
                .collect();
            serde_json::Value::Object(fields)
        });
        Ok(json!({
            "id": summary.id,
            "author": summary.author,
            "created_at": summary.created_at,
            "last_modified": summary.last_modified,
            "downloads": {
                "current": summary.downloads,
                "all_time": summary.downloads_all_time,
            },
            "likes": summary.likes,
            "card_data": card_data,
            "tags": filter_tags(&summary.tags, DATASET_TAG_NAMESPACES),
            "status": {
                "private": summary.private,
                "disabled": summary.disabled,
                "gated": summary.gated,
            },
        }))
    }

    fn status_flags(&self, summary: &DatasetSummary) -> StatusFlags {
        StatusFlags {
            private: summary.private,
            disabled: summary.disabled,
            gated: summary.gated,
        }
    }

    async fn fetch_extended_metadata(&self, item_id: &str) -> Result<serde_json::Value, AppError> {
        let (likers, contributors) =
            tokio::join!(self.fetch_likers(item_id), self.fetch_contributors(item_id));
        Ok(json!({
            "likers": likers?,
            "contributors": contributors?,
            "last_updated": Utc::now(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use demeter_core::testutil::MemoryRateLimiter;
    use serde_json::json;

    fn summary(value: serde_json::Value) -> DatasetSummary {
        serde_json::from_value(value).unwrap()
    }

    fn scraper() -> DatasetScraper<MemoryRateLimiter> {
        DatasetScraper::new(
            HubClient::new().unwrap(),
            MemoryRateLimiter::default(),
            10,
        )
    }

    #[test]
    fn basic_metadata_projects_card_fields() {
        let s = summary(json!({
            "id": "org/d",
            "author": "org",
            "likes": 3,
            "tags": ["question-answering", "language:en", "en", "croissant"],
            "cardData": {
                "task_categories": ["question-answering"],
                "size_categories": ["10K<n<100K"],
                "unrelated": "dropped",
            },
        }));
        let doc = scraper().extract_basic_metadata(&s).unwrap();
        assert_eq!(doc["card_data"]["task_categories"], json!(["question-answering"]));
        assert_eq!(doc["card_data"]["size_categories"], json!(["10K<n<100K"]));
        assert!(doc["card_data"]["annotations_creators"].is_null());
        assert!(doc["card_data"].get("unrelated").is_none());
        assert_eq!(doc["tags"], json!(["question-answering", "croissant"]));
    }

    #[test]
    fn dataset_without_card_keeps_null() {
        let s = summary(json!({"id": "org/d"}));
        let doc = scraper().extract_basic_metadata(&s).unwrap();
        assert!(doc["card_data"].is_null());
    }

    #[test]
    fn gated_string_parses_as_gated() {
        let s = summary(json!({"id": "org/d", "gated": "auto"}));
        assert!(scraper().status_flags(&s).gated);
    }
}
