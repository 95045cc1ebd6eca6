//! Reserved metadata field names.
//!
//! These keys carry bookkeeping rather than document content. They are never
//! wrapped, never reported as mutations, and never sent in an update body.

/// Wire key under which the store-assigned identity travels in fetched documents.
pub const META_ID_FIELD: &str = "__meta_id__";

/// Every reserved name, checked by direct membership.
pub const RESERVED_FIELD_NAMES: &[&str] = &[META_ID_FIELD];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_FIELD_NAMES.contains(&name)
}
