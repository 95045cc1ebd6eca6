//! Document store gateway.
//!
//! The crate never talks to a store directly. Every network effect goes
//! through a [`DocumentGateway`], so backends can be swapped (a real search
//! cluster in production, [`memory::InMemoryGateway`] in tests).

pub mod memory;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json, json};

use crate::core::{META_ID_FIELD, OdmError, Result};
use crate::update::UpdateDocument;

pub use memory::{GatewayCall, InMemoryGateway};

/// Page size used when none is configured.
pub const DEFAULT_PAGE_SIZE: usize = 10_000;

/// Opaque identity assigned by the store on first persist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreIdentity(String);

impl StoreIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StoreIdentity {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for StoreIdentity {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub size: usize,
    pub offset: usize,
}

impl Pagination {
    pub fn new(size: usize) -> Self {
        Self { size, offset: 0 }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: Json,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Json>,
    #[serde(default)]
    pub pagination: Pagination,
}

impl SearchRequest {
    pub fn new(query: Json) -> Self {
        Self {
            query,
            sort: None,
            pagination: Pagination::default(),
        }
    }

    pub fn match_all() -> Self {
        Self::new(match_all())
    }

    pub fn sort(mut self, sort: Json) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn paginate(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }
}

/// One stored document: its identity and its source fields.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub identity: StoreIdentity,
    pub source: Map<String, Json>,
}

impl StoredDocument {
    pub fn new(identity: StoreIdentity, source: Map<String, Json>) -> Self {
        Self { identity, source }
    }

    /// Source fields plus the identity under [`META_ID_FIELD`], the form `load` expects.
    pub fn to_wire(&self) -> Json {
        let mut wire = self.source.clone();
        wire.insert(
            META_ID_FIELD.to_string(),
            Json::String(self.identity.as_str().to_string()),
        );
        Json::Object(wire)
    }

    /// Splits a wire document back into identity and source.
    pub fn from_wire(wire: &Json) -> Result<Self> {
        let map = wire.as_object().ok_or_else(|| {
            OdmError::InvalidDocument("document must be a JSON object".to_string())
        })?;
        let identity = map
            .get(META_ID_FIELD)
            .and_then(Json::as_str)
            .ok_or_else(|| {
                OdmError::InvalidDocument(format!("document is missing '{}'", META_ID_FIELD))
            })?;

        let mut source = map.clone();
        source.remove(META_ID_FIELD);
        Ok(Self::new(StoreIdentity::new(identity), source))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchHits {
    pub hits: Vec<StoredDocument>,
    /// Matches before pagination.
    pub total: u64,
}

pub fn match_all() -> Json {
    json!({ "match_all": {} })
}

pub fn term(field: &str, value: impl Into<Json>) -> Json {
    let value: Json = value.into();
    json!({ "term": { field: value } })
}

pub fn match_phrase(field: &str, value: impl Into<Json>) -> Json {
    let value: Json = value.into();
    json!({ "match_phrase": { field: value } })
}

/// Contract of the backing document store.
///
/// All calls are synchronous; timeouts and retries are the implementor's
/// concern. Store-side failures surface as [`OdmError::Gateway`].
pub trait DocumentGateway: Send + Sync {
    fn search(&self, index: &str, request: &SearchRequest) -> Result<SearchHits>;

    /// First document whose `key` matches `value`.
    fn get(&self, index: &str, key: &str, value: &Json) -> Result<Option<StoredDocument>>;

    fn get_matching(
        &self,
        index: &str,
        query: Option<&Json>,
        sort: Option<&Json>,
        pagination: Pagination,
    ) -> Result<SearchHits> {
        let request = SearchRequest {
            query: query.cloned().unwrap_or_else(match_all),
            sort: sort.cloned(),
            pagination,
        };
        self.search(index, &request)
    }

    fn count(&self, index: &str, query: &Json) -> Result<u64>;

    /// Distinct values of `field` with their document counts.
    fn distinct(&self, index: &str, field: &str) -> Result<Vec<(Json, u64)>>;

    /// Deletes every document whose `key` matches `value`; returns how many went.
    fn delete(&self, index: &str, key: &str, value: &Json) -> Result<u64>;

    fn delete_by_id(&self, index: &str, identity: &StoreIdentity) -> Result<()>;

    /// Applies a partial update to one document.
    fn update(&self, index: &str, identity: &StoreIdentity, document: &UpdateDocument)
    -> Result<()>;

    /// Inserts documents in one request. Results line up with the input.
    fn bulk_insert(&self, index: &str, documents: Vec<Json>) -> Result<Vec<Result<StoreIdentity>>>;
}
