use serde::{Deserialize, Serialize};

use crate::core::Result;
use crate::gateway::{DEFAULT_PAGE_SIZE, Pagination};

/// What `begin_transaction` does when a scope is already open.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionReopenPolicy {
    /// Refuse with an invalid-state error; the open scope is kept.
    #[default]
    Reject,
    /// Discard the pending entries and start over, logging a warning.
    Supersede,
}

/// Session-wide configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    /// Page size for fetch operations that do not pass one
    pub default_page_size: usize,

    /// Behaviour of a second `begin_transaction`
    pub reopen_policy: TransactionReopenPolicy,

    /// Skip the gateway call when a composed update turns out empty
    pub skip_empty_updates: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            reopen_policy: TransactionReopenPolicy::default(),
            skip_empty_updates: true,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default page size
    pub fn default_page_size(mut self, size: usize) -> Self {
        self.default_page_size = size;
        self
    }

    /// Set the transaction re-open policy
    pub fn reopen_policy(mut self, policy: TransactionReopenPolicy) -> Self {
        self.reopen_policy = policy;
        self
    }

    /// Set whether empty updates are skipped
    pub fn skip_empty_updates(mut self, skip: bool) -> Self {
        self.skip_empty_updates = skip;
        self
    }

    /// Pagination starting at the first hit with the configured page size
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.default_page_size)
    }

    /// Parse from JSON; missing keys keep their defaults.
    ///
    /// ```
    /// use docmap::{SessionConfig, TransactionReopenPolicy};
    ///
    /// let config = SessionConfig::from_json_str(r#"{"reopen_policy": "supersede"}"#).unwrap();
    /// assert_eq!(config.reopen_policy, TransactionReopenPolicy::Supersede);
    /// assert_eq!(config.default_page_size, 10_000);
    /// ```
    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}
