//! Organization scraper.
//!
//! Organizations are not listed by the hub directly; candidates are the
//! distinct authors already harvested into the models and datasets
//! collections. Each unchecked author is probed via the members endpoint,
//! which fails for plain user accounts.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::json;

use demeter_core::AppError;
use demeter_core::traits::{ItemStore, RateLimiter, Scraper};

use crate::hub::HubClient;

const AUTHOR_SOURCES: &[&str] = &["models", "datasets"];

/// A confirmed organization, built from the members probe rather than a
/// listing endpoint.
#[derive(Debug, Clone)]
pub struct OrgSummary {
    pub name: String,
    pub members: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Clone)]
pub struct OrganizationScraper<R: RateLimiter, S: ItemStore> {
    hub: HubClient,
    limiter: R,
    store: S,
    rate_limit: u32,
}

impl<R: RateLimiter, S: ItemStore> OrganizationScraper<R, S> {
    pub fn new(hub: HubClient, limiter: R, store: S, rate_limit: u32) -> Self {
        Self {
            hub,
            limiter,
            store,
            rate_limit,
        }
    }

    async fn fetch_followers(&self, org: &str) -> Result<Vec<String>, AppError> {
        self.limiter
            .wait_for_admission("followers", self.rate_limit)
            .await?;
        match self.hub.organization_followers(org).await {
            Ok(followers) => Ok(followers),
            Err(e) => {
                tracing::warn!(org, error = %e, "Failed to fetch organization followers");
                Ok(Vec::new())
            }
        }
    }
}

impl<R: RateLimiter, S: ItemStore> Scraper for OrganizationScraper<R, S> {
    type Summary = OrgSummary;

    fn item_type(&self) -> &'static str {
        "organizations"
    }

    fn list(&self) -> BoxStream<'_, Result<OrgSummary, AppError>> {
        let hub = self.hub.clone();
        let store = self.store.clone();
        stream::try_unfold(
            (hub, store, None::<VecDeque<String>>),
            |(hub, store, pending)| async move {
                let mut pending = match pending {
                    Some(pending) => pending,
                    None => {
                        let authors: VecDeque<String> =
                            store.list_authors(AUTHOR_SOURCES).await?.into();
                        tracing::info!(
                            count = authors.len(),
                            "Checking authors for organization profiles"
                        );
                        authors
                    }
                };
                while let Some(author) = pending.pop_front() {
                    match store.phase("organizations", &author).await {
                        Ok(Some(_)) => continue,
                        Ok(None) => {}
                        Err(e) => {
                            tracing::error!(author = %author, error = %e, "Failed to check stored organization");
                            continue;
                        }
                    }
                    match hub.organization_members(&author).await {
                        Ok(members) => {
                            let summary = OrgSummary {
                                name: author,
                                members,
                                last_updated: Utc::now(),
                            };
                            return Ok(Some((summary, (hub, store, Some(pending)))));
                        }
                        Err(e) => {
                            tracing::debug!(author = %author, error = %e, "No organization profile for author");
                        }
                    }
                }
                Ok(None)
            },
        )
        .boxed()
    }

    fn extract_id(&self, summary: &OrgSummary) -> Result<String, AppError> {
        Ok(summary.name.clone())
    }

    fn extract_basic_metadata(&self, summary: &OrgSummary) -> Result<serde_json::Value, AppError> {
        Ok(json!({
            "id": summary.name,
            "members": summary.members,
            "last_updated": summary.last_updated,
        }))
    }

    async fn fetch_extended_metadata(&self, item_id: &str) -> Result<serde_json::Value, AppError> {
        let followers = self.fetch_followers(item_id).await?;
        Ok(json!({
            "followers_count": followers.len(),
            "followers": followers,
            "last_updated": Utc::now(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use demeter_core::testutil::{MemoryRateLimiter, MemoryStore};
    use futures::TryStreamExt;

    fn scraper(store: MemoryStore) -> OrganizationScraper<MemoryRateLimiter, MemoryStore> {
        OrganizationScraper::new(
            HubClient::new().unwrap(),
            MemoryRateLimiter::default(),
            store,
            10,
        )
    }

    #[tokio::test]
    async fn empty_store_yields_no_candidates() {
        // No stored authors means the stream finishes without touching the
        // network.
        let orgs: Vec<_> = scraper(MemoryStore::new()).list().try_collect().await.unwrap();
        assert!(orgs.is_empty());
    }

    #[tokio::test]
    async fn already_recorded_organizations_are_skipped() {
        let store = MemoryStore::new();
        store
            .bulk_upsert_basic(
                "models",
                &[demeter_core::BasicRecord::new(
                    "acme/m1",
                    serde_json::json!({"id": "acme/m1", "author": "acme"}),
                )],
            )
            .await
            .unwrap();
        store.seed_basic("organizations", "acme");
        let orgs: Vec<_> = scraper(store).list().try_collect().await.unwrap();
        assert!(orgs.is_empty());
    }

    #[test]
    fn basic_metadata_carries_member_list() {
        let summary = OrgSummary {
            name: "acme".into(),
            members: vec!["alice".into(), "bob".into()],
            last_updated: Utc::now(),
        };
        let scraper = scraper(MemoryStore::new());
        assert_eq!(scraper.extract_id(&summary).unwrap(), "acme");
        let doc = scraper.extract_basic_metadata(&summary).unwrap();
        assert_eq!(doc["id"], "acme");
        assert_eq!(doc["members"], serde_json::json!(["alice", "bob"]));
    }
}
