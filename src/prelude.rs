//! Everything application code usually needs, in one import.

pub use crate::config::{SessionConfig, TransactionReopenPolicy};
pub use crate::core::{Object, OdmError, Result, Value};
pub use crate::gateway::{DocumentGateway, InMemoryGateway, Pagination, StoreIdentity};
pub use crate::gateway::{match_all, match_phrase, term};
pub use crate::persist::{Collection, Record, RecordSchema, Session};
pub use crate::tracking::Tracked;
