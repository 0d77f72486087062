//! Model repo scraper.

use chrono::{DateTime, Utc};
use futures::future;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use serde::Deserialize;
use serde_json::json;

use demeter_core::traits::{RateLimiter, Scraper};
use demeter_core::util::{dedup_preserve_order, tags_match};
use demeter_core::{AppError, StatusFlags};

use crate::hub::{HubClient, gated_flag};
use crate::tags::filter_tags;

pub const MODEL_EXPAND_FIELDS: &[&str] = &[
    "author",
    "cardData",
    "createdAt",
    "disabled",
    "downloads",
    "downloadsAllTime",
    "inference",
    "lastModified",
    "library_name",
    "likes",
    "pipeline_tag",
    "private",
    "tags",
];

const MODEL_TAG_NAMESPACES: &[&str] = &["base_model:", "license:", "region:", "language:", "dataset:"];

/// One entry from the model listing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSummary {
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
    #[serde(default)]
    pub library_name: Option<String>,
    #[serde(default, rename = "cardData")]
    pub card_data: Option<serde_json::Value>,
}

#[derive(Clone)]
pub struct ModelScraper<R: RateLimiter> {
    hub: HubClient,
    limiter: R,
    limit: Option<usize>,
    tags: Option<Vec<String>>,
    rate_limit: u32,
}

impl<R: RateLimiter> ModelScraper<R> {
    pub fn new(hub: HubClient, limiter: R, rate_limit: u32) -> Self {
        Self {
            hub,
            limiter,
            limit: None,
            tags: None,
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

    async fn fetch_likers(&self, item_id: &str) -> Result<Vec<String>, AppError> {
        self.limiter
            .wait_for_admission("likers", self.rate_limit)
            .await?;
        match self.hub.likers("models", item_id).await {
            Ok(likers) => Ok(likers),
            Err(e) => {
                tracing::warn!(item_id, error = %e, "Failed to fetch model likers");
                Ok(Vec::new())
            }
        }
    }

    async fn fetch_contributors(&self, item_id: &str) -> Result<Vec<String>, AppError> {
        self.limiter
            .wait_for_admission("contributors", self.rate_limit)
            .await?;
        match self.hub.commit_authors("models", item_id).await {
            Ok(authors) => Ok(dedup_preserve_order(authors)),
            Err(e) => {
                tracing::warn!(item_id, error = %e, "Failed to fetch model contributors");
                Ok(Vec::new())
            }
        }
    }
}

impl<R: RateLimiter> Scraper for ModelScraper<R> {
    type Summary = ModelSummary;

    fn item_type(&self) -> &'static str {
        "models"
    }

    fn list(&self) -> BoxStream<'_, Result<ModelSummary, AppError>> {
        let tags = self.tags.clone();
        self.hub
            .list_models(self.limit, MODEL_EXPAND_FIELDS)
            .try_filter(move |model| future::ready(tags_match(tags.as_deref(), &model.tags)))
            .boxed()
    }

    fn extract_id(&self, summary: &ModelSummary) -> Result<String, AppError> {
        Ok(summary.id.clone())
    }

    fn extract_basic_metadata(&self, summary: &ModelSummary) -> Result<serde_json::Value, AppError> {
        let card_data = summary.card_data.as_ref().map(|card| {
            json!({
                "base_model": card.get("base_model"),
                "datasets": card.get("datasets"),
                "license": {
                    "name": card.get("license"),
                    "link": card.get("license_link"),
                },
                "pipeline_tag": card.get("pipeline_tag"),
                "base_model_relation": card.get("base_model_relation"),
            })
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
            "tags": filter_tags(&summary.tags, MODEL_TAG_NAMESPACES),
            "library_name": summary.library_name,
            "status": {
                "private": summary.private,
                "disabled": summary.disabled,
                "gated": summary.gated,
            },
        }))
    }

    fn status_flags(&self, summary: &ModelSummary) -> StatusFlags {
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

    fn summary(value: serde_json::Value) -> ModelSummary {
        serde_json::from_value(value).unwrap()
    }

    fn scraper() -> ModelScraper<MemoryRateLimiter> {
        ModelScraper::new(
            HubClient::new().unwrap(),
            MemoryRateLimiter::default(),
            10,
        )
    }

    #[test]
    fn gated_mode_string_means_gated() {
        let gated = summary(json!({"id": "org/m", "gated": "auto"}));
        assert!(gated.gated);
        let open = summary(json!({"id": "org/m", "gated": false}));
        assert!(!open.gated);
    }

    #[test]
    fn status_flags_mirror_summary() {
        let s = summary(json!({"id": "org/m", "private": true, "gated": "manual"}));
        let flags = scraper().status_flags(&s);
        assert!(flags.private);
        assert!(!flags.disabled);
        assert!(flags.gated);
        assert!(flags.is_restricted());
    }

    #[test]
    fn basic_metadata_projects_card_and_filters_tags() {
        let s = summary(json!({
            "id": "org/m",
            "author": "org",
            "downloads": 42,
            "downloadsAllTime": 100,
            "likes": 7,
            "tags": ["question-answering", "en", "license:mit", "pytorch"],
            "library_name": "transformers",
            "cardData": {
                "license": "mit",
                "license_link": "https://example.com/mit",
                "base_model": "org/base",
                "pipeline_tag": "text-generation",
            },
        }));
        let doc = scraper().extract_basic_metadata(&s).unwrap();
        assert_eq!(doc["id"], "org/m");
        assert_eq!(doc["downloads"]["current"], 42);
        assert_eq!(doc["downloads"]["all_time"], 100);
        assert_eq!(doc["card_data"]["license"]["name"], "mit");
        assert_eq!(doc["card_data"]["base_model"], "org/base");
        assert_eq!(doc["tags"], json!(["question-answering", "pytorch"]));
        assert_eq!(doc["status"]["private"], false);
    }

    #[test]
    fn missing_card_data_projects_null() {
        let s = summary(json!({"id": "org/m"}));
        let doc = scraper().extract_basic_metadata(&s).unwrap();
        assert!(doc["card_data"].is_null());
        assert!(doc["created_at"].is_null());
    }
}
