//! Tracked search configurations as served by the catalog.

use chrono::NaiveTime;
use serde::{Deserialize, Deserializer, Serialize};

use crate::sites::SiteIdentity;

/// A tracked search: run `term` against every listed site every
/// `frequency_days` days at `preferred_time` (local wall clock).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSpec {
    pub id: i64,
    #[serde(rename = "search_term")]
    pub term: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_frequency", deserialize_with = "at_least_one_day")]
    pub frequency_days: u32,
    #[serde(default = "midnight")]
    pub preferred_time: NaiveTime,
    #[serde(
        rename = "source_websites",
        default,
        deserialize_with = "null_as_empty"
    )]
    pub sites: Vec<SiteIdentity>,
    #[serde(rename = "search_metadata", default)]
    pub metadata: Option<serde_json::Value>,
}

impl SearchSpec {
    /// Sites this search should run against: only those still marked active.
    pub fn active_sites(&self) -> impl Iterator<Item = &SiteIdentity> {
        self.sites.iter().filter(|s| s.is_active)
    }
}

fn default_true() -> bool {
    true
}

fn default_frequency() -> u32 {
    1
}

fn midnight() -> NaiveTime {
    NaiveTime::MIN
}

/// The catalog validates `frequency_days >= 1`, but a zero would turn the
/// recurrence check into a division by zero, so clamp on the way in.
fn at_least_one_day<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = u32::deserialize(deserializer)?;
    Ok(raw.max(1))
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<SiteIdentity>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<SiteIdentity>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_catalog_shape() {
        let raw = serde_json::json!({
            "id": 7,
            "search_term": "iphone 12",
            "is_active": true,
            "frequency_days": 3,
            "preferred_time": "09:30:00",
            "search_metadata": null,
            "source_websites": [
                {"id": 1, "name": "OLX", "base_url": "https://www.olx.com.br", "is_active": true},
                {"id": 2, "name": "ENJOEI", "base_url": "https://www.enjoei.com.br", "is_active": false}
            ],
            "user_id": 4
        });
        let spec: SearchSpec = serde_json::from_value(raw).unwrap();
        assert_eq!(spec.term, "iphone 12");
        assert_eq!(spec.frequency_days, 3);
        assert_eq!(spec.preferred_time, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(spec.sites.len(), 2);
        let active: Vec<&str> = spec.active_sites().map(|s| s.name.as_str()).collect();
        assert_eq!(active, vec!["OLX"]);
    }

    #[test]
    fn null_sites_and_missing_fields_use_defaults() {
        let raw = serde_json::json!({
            "id": 1,
            "search_term": "bike",
            "source_websites": null
        });
        let spec: SearchSpec = serde_json::from_value(raw).unwrap();
        assert!(spec.is_active);
        assert_eq!(spec.frequency_days, 1);
        assert_eq!(spec.preferred_time, NaiveTime::MIN);
        assert!(spec.sites.is_empty());
    }

    #[test]
    fn zero_frequency_is_clamped_to_one() {
        let raw = serde_json::json!({
            "id": 1,
            "search_term": "bike",
            "frequency_days": 0
        });
        let spec: SearchSpec = serde_json::from_value(raw).unwrap();
        assert_eq!(spec.frequency_days, 1);
    }
}
