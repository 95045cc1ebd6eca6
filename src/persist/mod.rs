//! Records, collections and the session that connects them to a store.

pub mod collection;
pub mod metadata;
pub mod record;
pub mod schema;
pub mod session;

pub use collection::Collection;
pub use metadata::RecordMetadata;
pub use record::Record;
pub use schema::RecordSchema;
pub use session::Session;
