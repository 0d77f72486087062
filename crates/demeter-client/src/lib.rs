//! Hub HTTP client and the four scraper variants.

pub mod collection;
pub mod dataset;
pub mod hub;
pub mod model;
pub mod organization;
pub mod tags;

pub use collection::{CollectionScraper, CollectionSummary};
pub use dataset::{DatasetScraper, DatasetSummary};
pub use hub::{DEFAULT_HUB_URL, HubClient};
pub use model::{ModelScraper, ModelSummary};
pub use organization::{OrgSummary, OrganizationScraper};
