//! Store configuration.
//!
//! Every field has a default, so a partial JSON document (or none at all)
//! yields a usable configuration.

use serde::{Deserialize, Serialize};

pub const DEFAULT_HISTORY_CAPACITY: usize = 20;
pub const DEFAULT_DESCRIPTION_MAX_CHARS: usize = 200;
pub const DEFAULT_FALLBACK_ENGINEER_ID: &str = "1";

/// How tasks for periods that already passed get a status when no real
/// completion data (period status, closing report) exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PastPeriodPolicy {
    /// Index 0, 3, 6… completed; other even indexes in progress; rest planned.
    IndexModulo,
    /// Past periods stay planned until something closes them.
    KeepPlanned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub history_capacity: usize,
    pub history_description_max_chars: usize,
    /// Engineer used for tasks of contracts with no assignment.
    pub fallback_engineer_id: String,
    pub past_period_policy: PastPeriodPolicy,
    /// Seed the default engineer roster into a store with no data.
    pub seed_default_engineers: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            history_description_max_chars: DEFAULT_DESCRIPTION_MAX_CHARS,
            fallback_engineer_id: DEFAULT_FALLBACK_ENGINEER_ID.to_string(),
            past_period_policy: PastPeriodPolicy::IndexModulo,
            seed_default_engineers: true,
        }
    }
}

impl StoreConfig {
    /// Parses a JSON config; absent fields keep their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        let mut config: StoreConfig = serde_json::from_str(raw)?;
        if config.history_capacity == 0 {
            config.history_capacity = 1;
        }
        Ok(config)
    }
}
