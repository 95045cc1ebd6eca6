// ============================================================================
// docmap Library
// ============================================================================

//! Object-document mapping with nested mutation tracking.
//!
//! A [`Record`] holds one stored document in memory. Containers read from it
//! come back wrapped, and every write through a wrapper, at any depth, turns
//! into a minimal partial update for that document. Writes go out one by one,
//! or are batched into a single update inside a transaction scope.
//!
//! ```
//! use std::sync::Arc;
//! use docmap::prelude::*;
//! use serde_json::json;
//!
//! # fn main() -> docmap::Result<()> {
//! let gateway = Arc::new(InMemoryGateway::new());
//! let session = Session::new(gateway.clone());
//! let agents = session.collection(
//!     RecordSchema::new("Agent", "agents", "name")
//!         .field("name", "ann")
//!         .field("tags", Value::Sequence(vec![])),
//! )?;
//!
//! let mut agent = agents.create();
//! agent.commit()?;
//!
//! if let Some(tracked) = agent.field_mut("tags") {
//!     tracked.into_sequence()?.push("vip")?;
//! }
//!
//! let (identity, update) = gateway.updates().remove(0);
//! assert_eq!(Some(&identity), agent.store_identity());
//! assert_eq!(update, json!({"tags": ["vip"]}));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod gateway;
pub mod persist;
pub mod prelude;
pub mod tracking;
pub mod transaction;
pub mod update;

pub use config::{SessionConfig, TransactionReopenPolicy};
pub use crate::core::{
    CodecRegistry, ContainerKind, FieldMapCodec, META_ID_FIELD, Object, ObjectCodec, OdmError,
    Path, Result, Segment, Value,
};
pub use gateway::{
    DocumentGateway, GatewayCall, InMemoryGateway, Pagination, SearchHits, SearchRequest,
    StoreIdentity, StoredDocument,
};
pub use persist::{Collection, Record, RecordMetadata, RecordSchema, Session};
pub use tracking::{MapWrapper, ObjectWrapper, SequenceWrapper, Tracked};
pub use transaction::{TransactionGuard, TransactionScope};
pub use update::{UpdateDocument, UpdateEntry, compose};
