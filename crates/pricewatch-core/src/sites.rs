use serde::{Deserialize, Serialize};

/// A marketplace registered in the catalog.
///
/// `name` is globally unique and is the key the adapter registry resolves.
/// The catalog stores names upper-cased (`"OLX"`), the registry matches
/// case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteIdentity {
    pub id: i64,
    pub name: String,
    pub base_url: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}
