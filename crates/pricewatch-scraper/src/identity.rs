//! Rotating user-agent identities for outbound marketplace requests.

use std::path::Path;
use std::sync::Arc;

use rand::seq::IndexedRandom;

const BUILTIN_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1",
];

/// Immutable pool of user-agent strings.
///
/// Cloning is cheap and picking never locks. An empty pool is valid: callers
/// fall back to a fixed identity.
#[derive(Debug, Clone, Default)]
pub struct IdentityPool {
    agents: Arc<[String]>,
}

impl IdentityPool {
    #[must_use]
    pub fn new(agents: Vec<String>) -> Self {
        let agents: Vec<String> = agents
            .into_iter()
            .map(|a| a.trim().to_owned())
            .filter(|a| !a.is_empty())
            .collect();
        Self {
            agents: agents.into(),
        }
    }

    /// A small set of current desktop and mobile browser identities.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(BUILTIN_USER_AGENTS.iter().map(|s| (*s).to_owned()).collect())
    }

    /// Loads a JSON array of user-agent strings.
    ///
    /// A missing or malformed file yields an empty pool and a warning; it is
    /// never fatal.
    #[must_use]
    pub fn from_json_file(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read user-agent pool; using fallback identity");
                return Self::default();
            }
        };
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(agents) => Self::new(agents),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "user-agent pool is not a JSON string array; using fallback identity");
                Self::default()
            }
        }
    }

    /// Picks a random identity, or `None` when the pool is empty.
    #[must_use]
    pub fn pick(&self) -> Option<&str> {
        self.agents.choose(&mut rand::rng()).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
