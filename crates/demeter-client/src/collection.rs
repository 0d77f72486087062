//! Collection scraper.
//!
//! Collections are discovered from the items already harvested: for every
//! stored model and dataset id the hub is asked which collections contain
//! it, keeping the ten most upvoted per item. The same collection surfaces
//! through many items, so slugs are deduplicated per run and against the
//! store before they reach the pipeline.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use serde::Deserialize;
use serde_json::json;

use demeter_core::AppError;
use demeter_core::traits::{ItemStore, RateLimiter, Scraper};

use crate::hub::HubClient;

pub const DEFAULT_MIN_UPVOTES: u64 = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionOwner {
    #[serde(default)]
    pub name: Option<String>,
}

/// One entry from the collections listing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionSummary {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner: Option<CollectionOwner>,
    #[serde(default, rename = "lastUpdated")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub upvotes: u64,
}

/// Full collection document from the detail endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionDetail {
    pub slug: String,
    #[serde(default)]
    pub items: Vec<CollectionItemRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionItemRef {
    #[serde(alias = "id")]
    pub item_id: String,
    #[serde(alias = "type", alias = "repoType")]
    pub item_type: String,
}

#[derive(Clone)]
pub struct CollectionScraper<R: RateLimiter, S: ItemStore> {
    hub: HubClient,
    limiter: R,
    store: S,
    rate_limit: u32,
    min_upvotes: u64,
}

impl<R: RateLimiter, S: ItemStore> CollectionScraper<R, S> {
    pub fn new(hub: HubClient, limiter: R, store: S, rate_limit: u32) -> Self {
        Self {
            hub,
            limiter,
            store,
            rate_limit,
            min_upvotes: DEFAULT_MIN_UPVOTES,
        }
    }

    pub fn with_min_upvotes(mut self, min_upvotes: u64) -> Self {
        self.min_upvotes = min_upvotes;
        self
    }

    async fn fetch_upvoters(&self, slug: &str) -> Result<Vec<String>, AppError> {
        self.limiter
            .wait_for_admission("upvoters", self.rate_limit)
            .await?;
        match self.hub.collection_upvoters(slug).await {
            Ok(upvoters) => Ok(upvoters),
            Err(e) => {
                tracing::warn!(slug, error = %e, "Failed to fetch collection upvoters");
                Ok(Vec::new())
            }
        }
    }
}

type ListState = (
    HubClient,
    Option<VecDeque<String>>,
    HashSet<String>,
    VecDeque<CollectionSummary>,
);

impl<R: RateLimiter, S: ItemStore> Scraper for CollectionScraper<R, S> {
    type Summary = CollectionSummary;

    fn item_type(&self) -> &'static str {
        "collections"
    }

    fn list(&self) -> BoxStream<'_, Result<CollectionSummary, AppError>> {
        let hub = self.hub.clone();
        let store = self.store.clone();
        let init: ListState = (hub, None, HashSet::new(), VecDeque::new());
        stream::try_unfold(init, move |(hub, pending, mut seen, mut buffered)| {
            let store = store.clone();
            async move {
                let mut pending = match pending {
                    Some(pending) => pending,
                    None => {
                        let mut items = VecDeque::new();
                        for source in ["models", "datasets"] {
                            for id in store.list_item_ids(source).await? {
                                items.push_back(format!("{source}/{id}"));
                            }
                        }
                        tracing::info!(
                            count = items.len(),
                            "Checking stored items for collections"
                        );
                        items
                    }
                };
                loop {
                    if let Some(collection) = buffered.pop_front() {
                        if !seen.insert(collection.slug.clone()) {
                            continue;
                        }
                        match store.phase("collections", &collection.slug).await {
                            Ok(Some(_)) => continue,
                            Ok(None) => {}
                            Err(e) => {
                                tracing::error!(slug = %collection.slug, error = %e, "Failed to check stored collection");
                                continue;
                            }
                        }
                        return Ok(Some((collection, (hub, Some(pending), seen, buffered))));
                    }
                    let Some(item) = pending.pop_front() else {
                        return Ok(None);
                    };
                    match hub.collections_containing(&item).await {
                        Ok(collections) => buffered.extend(collections),
                        Err(e) => {
                            tracing::error!(item = %item, error = %e, "Failed to list collections for item");
                        }
                    }
                }
            }
        })
        .boxed()
    }

    fn extract_id(&self, summary: &CollectionSummary) -> Result<String, AppError> {
        Ok(summary.slug.clone())
    }

    fn extract_basic_metadata(
        &self,
        summary: &CollectionSummary,
    ) -> Result<serde_json::Value, AppError> {
        Ok(json!({
            "id": summary.slug,
            "title": summary.title,
            "description": summary.description,
            "owner": summary.owner.as_ref().and_then(|o| o.name.clone()),
            "upvotes": summary.upvotes,
            "last_updated": Utc::now(),
        }))
    }

    fn pre_filter(&self, summary: &CollectionSummary) -> bool {
        summary.upvotes >= self.min_upvotes
    }

    /// Unlike the ancillary sub-fetches, a failing detail fetch fails the
    /// whole call: without the item list the extended document is useless.
    async fn fetch_extended_metadata(&self, item_id: &str) -> Result<serde_json::Value, AppError> {
        let detail = self.hub.collection(item_id).await?;
        let upvoters = self.fetch_upvoters(item_id).await?;
        let items: Vec<serde_json::Value> = detail
            .items
            .iter()
            .map(|item| {
                json!({
                    "item_id": item.item_id,
                    "item_type": item.item_type,
                })
            })
            .collect();
        Ok(json!({
            "items": items,
            "upvoters": upvoters,
            "last_updated": Utc::now(),
        }))
    }
}
