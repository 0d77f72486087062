//! Typed client for the catalog hub HTTP API.
//!
//! Listing endpoints paginate via RFC 5988 `Link` headers; [`HubClient`]
//! exposes them as flat streams so callers never see page boundaries.
//! Detail endpoints are plain one-shot GETs.

use std::collections::VecDeque;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use reqwest::header::{HeaderMap, LINK};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use demeter_core::AppError;

use crate::collection::{CollectionDetail, CollectionSummary};
use crate::dataset::DatasetSummary;
use crate::model::ModelSummary;

pub const DEFAULT_HUB_URL: &str = "https://huggingface.co";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Hub listing endpoints cap the per-page size.
const MAX_PAGE_SIZE: usize = 500;

/// A `{"user": ...}` entry, the shape shared by likers, upvoters,
/// followers and member listings.
#[derive(Debug, Clone, Deserialize)]
pub struct UserEntry {
    pub user: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitInfo {
    #[serde(default)]
    pub authors: Vec<UserEntry>,
}

#[derive(Clone)]
pub struct HubClient {
    http: Client,
    base_url: Url,
}

impl HubClient {
    pub fn new() -> Result<Self, AppError> {
        Self::with_base_url(DEFAULT_HUB_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, AppError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::ConfigError(format!("Invalid hub URL '{base_url}': {e}")))?;
        let http = Client::builder()
            .user_agent(concat!("demeter/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::HttpError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, base_url })
    }

    fn api_url(&self, path: &str) -> Result<Url, AppError> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::HttpError(format!("Invalid API path '{path}': {e}")))
    }

    fn map_send_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(DEFAULT_TIMEOUT_SECS)
        } else if e.is_connect() {
            AppError::NetworkError(format!("Connection failed: {e}"))
        } else {
            AppError::HttpError(e.to_string())
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, AppError> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpError(format!(
                "HTTP {} for {url}",
                status.as_u16()
            )));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to decode response from {url}: {e}")))
    }

    /// Walk a `Link`-paginated listing endpoint, yielding entries one at a
    /// time up to `limit` (all of them when `None`).
    fn paged<T>(&self, first: Url, limit: Option<usize>) -> BoxStream<'static, Result<T, AppError>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let client = self.clone();
        stream::try_unfold(
            (client, Some(first), VecDeque::<T>::new(), limit),
            |(client, mut next, mut buffered, mut remaining)| async move {
                loop {
                    if remaining == Some(0) {
                        return Ok(None);
                    }
                    if let Some(entry) = buffered.pop_front() {
                        if let Some(left) = remaining.as_mut() {
                            *left -= 1;
                        }
                        return Ok(Some((entry, (client, next, buffered, remaining))));
                    }
                    let Some(url) = next.take() else {
                        return Ok(None);
                    };
                    let response = client
                        .http
                        .get(url.clone())
                        .send()
                        .await
                        .map_err(|e| client.map_send_error(e))?;
                    let status = response.status();
                    if !status.is_success() {
                        return Err(AppError::HttpError(format!(
                            "HTTP {} for {url}",
                            status.as_u16()
                        )));
                    }
                    next = next_page(response.headers());
                    let page: Vec<T> = response.json().await.map_err(|e| {
                        AppError::HttpError(format!("Failed to decode page from {url}: {e}"))
                    })?;
                    buffered.extend(page);
                }
            },
        )
        .boxed()
    }

    fn listing_url(
        &self,
        path: &str,
        limit: Option<usize>,
        expand: &[&str],
    ) -> Result<Url, AppError> {
        let mut url = self.api_url(path)?;
        {
            let mut query = url.query_pairs_mut();
            let page_size = limit.map_or(MAX_PAGE_SIZE, |l| l.min(MAX_PAGE_SIZE));
            query.append_pair("limit", &page_size.to_string());
            for field in expand {
                query.append_pair("expand[]", field);
            }
        }
        Ok(url)
    }

    pub fn list_models(
        &self,
        limit: Option<usize>,
        expand: &[&str],
    ) -> BoxStream<'static, Result<ModelSummary, AppError>> {
        match self.listing_url("/api/models", limit, expand) {
            Ok(url) => self.paged(url, limit),
            Err(e) => stream::once(async move { Err(e) }).boxed(),
        }
    }

    pub fn list_datasets(
        &self,
        limit: Option<usize>,
        expand: &[&str],
    ) -> BoxStream<'static, Result<DatasetSummary, AppError>> {
        match self.listing_url("/api/datasets", limit, expand) {
            Ok(url) => self.paged(url, limit),
            Err(e) => stream::once(async move { Err(e) }).boxed(),
        }
    }

    /// Full-text dataset search, one page of results.
    pub async fn search_datasets(
        &self,
        query_text: &str,
        expand: &[&str],
    ) -> Result<Vec<DatasetSummary>, AppError> {
        let mut url = self.api_url("/api/datasets")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("search", query_text);
            query.append_pair("limit", "50");
            for field in expand {
                query.append_pair("expand[]", field);
            }
        }
        self.get_json(url).await
    }

    /// Users who liked a repo. `item_type` is `models` or `datasets`.
    pub async fn likers(&self, item_type: &str, item_id: &str) -> Result<Vec<String>, AppError> {
        let url = self.api_url(&format!("/api/{item_type}/{item_id}/likers"))?;
        let users: Vec<UserEntry> = self.get_json(url).await?;
        Ok(users.into_iter().map(|u| u.user).collect())
    }

    /// Commit authors on a repo's main revision, in commit order and with
    /// repeats. Callers deduplicate.
    pub async fn commit_authors(
        &self,
        item_type: &str,
        item_id: &str,
    ) -> Result<Vec<String>, AppError> {
        let url = self.api_url(&format!("/api/{item_type}/{item_id}/commits/main"))?;
        let commits: Vec<CommitInfo> = self.get_json(url).await?;
        Ok(commits
            .into_iter()
            .flat_map(|c| c.authors)
            .map(|a| a.user)
            .collect())
    }

    /// Member usernames of an organization. A plain user account yields an
    /// error status rather than an empty list.
    pub async fn organization_members(&self, name: &str) -> Result<Vec<String>, AppError> {
        let url = self.api_url(&format!("/api/organizations/{name}/members"))?;
        let members: Vec<UserEntry> = self.get_json(url).await?;
        Ok(members.into_iter().map(|m| m.user).collect())
    }

    pub async fn organization_followers(&self, name: &str) -> Result<Vec<String>, AppError> {
        let url = self.api_url(&format!("/api/organizations/{name}/followers"))?;
        let followers: Vec<UserEntry> = self.get_json(url).await?;
        Ok(followers.into_iter().map(|f| f.user).collect())
    }

    /// Collections containing an item, most-upvoted first.
    /// `item` is a qualified reference like `models/org/name`.
    pub async fn collections_containing(
        &self,
        item: &str,
    ) -> Result<Vec<CollectionSummary>, AppError> {
        let mut url = self.api_url("/api/collections")?;
        url.query_pairs_mut()
            .append_pair("item", item)
            .append_pair("sort", "upvotes")
            .append_pair("limit", "10");
        self.get_json(url).await
    }

    pub async fn collection(&self, slug: &str) -> Result<CollectionDetail, AppError> {
        let url = self.api_url(&format!("/api/collections/{slug}"))?;
        self.get_json(url).await
    }

    pub async fn collection_upvoters(&self, slug: &str) -> Result<Vec<String>, AppError> {
        let url = self.api_url(&format!("/api/collections/{slug}/upvoters"))?;
        let upvoters: Vec<UserEntry> = self.get_json(url).await?;
        Ok(upvoters.into_iter().map(|u| u.user).collect())
    }
}

/// Extract the `rel="next"` target from a `Link` header, if present.
fn next_page(headers: &HeaderMap) -> Option<Url> {
    let value = headers.get(LINK)?.to_str().ok()?;
    value.split(',').find_map(|part| {
        let (target, params) = part.trim().split_once(';')?;
        if !params.contains("rel=\"next\"") {
            return None;
        }
        let target = target.trim().trim_start_matches('<').trim_end_matches('>');
        Url::parse(target).ok()
    })
}

/// Repo gating comes back as `false` or as a mode string (`"auto"`,
/// `"manual"`); any non-false value means gated.
pub(crate) fn gated_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::Null => false,
        serde_json::Value::String(_) => true,
        _ => true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn next_page_finds_rel_next() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static(
                "<https://huggingface.co/api/models?cursor=abc>; rel=\"next\"",
            ),
        );
        let next = next_page(&headers).unwrap();
        assert_eq!(next.query(), Some("cursor=abc"));
    }

    #[test]
    fn next_page_ignores_other_rels() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static("<https://huggingface.co/api/models?p=0>; rel=\"first\""),
        );
        assert!(next_page(&headers).is_none());
        assert!(next_page(&HeaderMap::new()).is_none());
    }

    #[test]
    fn next_page_picks_next_among_multiple() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static(
                "<https://h.co/a?p=0>; rel=\"first\", <https://h.co/a?p=2>; rel=\"next\"",
            ),
        );
        let next = next_page(&headers).unwrap();
        assert_eq!(next.query(), Some("p=2"));
    }

    #[test]
    fn listing_url_carries_expand_fields() {
        let client = HubClient::new().unwrap();
        let url = client
            .listing_url("/api/models", Some(10), &["author", "tags"])
            .unwrap();
        let query = url.query().unwrap();
        assert!(query.contains("limit=10"));
        assert!(query.contains("expand%5B%5D=author"));
        assert!(query.contains("expand%5B%5D=tags"));
    }

    #[test]
    fn listing_url_caps_page_size() {
        let client = HubClient::new().unwrap();
        let url = client.listing_url("/api/models", None, &[]).unwrap();
        assert!(url.query().unwrap().contains("limit=500"));
    }
}
