use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which stage of the harvest a stored item has reached.
///
/// `Basic` means only the enumeration-time projection is stored; `Extended`
/// means a successful detail fetch has been persisted on top of it. An item
/// may stay at `Basic` forever if its task exhausted its retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemPhase {
    Basic,
    Extended,
}

impl ItemPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemPhase::Basic => "basic",
            ItemPhase::Extended => "extended",
        }
    }
}

impl fmt::Display for ItemPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ItemPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(ItemPhase::Basic),
            "extended" => Ok(ItemPhase::Extended),
            _ => Err(format!("Unknown item phase: {}", s)),
        }
    }
}

/// Access-restriction flags carried by a catalog summary.
///
/// Any truthy flag excludes the summary from the pipeline before it reaches
/// the store or the task queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusFlags {
    pub private: bool,
    pub disabled: bool,
    pub gated: bool,
}

impl StatusFlags {
    pub fn is_restricted(&self) -> bool {
        self.private || self.disabled || self.gated
    }
}

/// DTO for one basic-metadata row in a bulk upsert.
#[derive(Debug, Clone, Serialize)]
pub struct BasicRecord {
    pub item_id: String,
    pub metadata: serde_json::Value,
}

impl BasicRecord {
    pub fn new(item_id: impl Into<String>, metadata: serde_json::Value) -> Self {
        Self {
            item_id: item_id.into(),
            metadata,
        }
    }
}

/// Per-collection harvest counters.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ItemStats {
    pub total: i64,
    pub basic: i64,
    pub extended: i64,
}
