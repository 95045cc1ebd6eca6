use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value as Json};
use tracing::{Level, event};
use uuid::Uuid;

use super::{DocumentGateway, SearchHits, SearchRequest, StoreIdentity, StoredDocument};
use crate::core::codec::json_kind;
use crate::core::{META_ID_FIELD, OdmError, Result};
use crate::update::UpdateDocument;

/// One call received by an [`InMemoryGateway`], in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    Search {
        index: String,
        request: SearchRequest,
    },
    Get {
        index: String,
        key: String,
        value: Json,
    },
    Count {
        index: String,
        query: Json,
    },
    Distinct {
        index: String,
        field: String,
    },
    Delete {
        index: String,
        key: String,
        value: Json,
    },
    DeleteById {
        index: String,
        identity: StoreIdentity,
    },
    Update {
        index: String,
        identity: StoreIdentity,
        document: Json,
    },
    BulkInsert {
        index: String,
        documents: usize,
    },
}

impl GatewayCall {
    pub fn index(&self) -> &str {
        match self {
            Self::Search { index, .. }
            | Self::Get { index, .. }
            | Self::Count { index, .. }
            | Self::Distinct { index, .. }
            | Self::Delete { index, .. }
            | Self::DeleteById { index, .. }
            | Self::Update { index, .. }
            | Self::BulkInsert { index, .. } => index,
        }
    }

    /// True for calls that change stored data.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::Delete { .. } | Self::DeleteById { .. } | Self::Update { .. } | Self::BulkInsert { .. }
        )
    }
}

#[derive(Debug, Default)]
struct GatewayState {
    /// Documents per index, in insertion order.
    indices: HashMap<String, Vec<StoredDocument>>,
    calls: Vec<GatewayCall>,
    pending_failure: Option<String>,
}

impl GatewayState {
    fn record(&mut self, call: GatewayCall) -> Result<()> {
        self.calls.push(call);
        match self.pending_failure.take() {
            Some(message) => Err(OdmError::Gateway(message)),
            None => Ok(()),
        }
    }

    fn documents(&self, index: &str) -> &[StoredDocument] {
        self.indices.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    fn find_mut(&mut self, index: &str, identity: &StoreIdentity) -> Result<&mut StoredDocument> {
        self.indices
            .get_mut(index)
            .and_then(|docs| docs.iter_mut().find(|doc| &doc.identity == identity))
            .ok_or_else(|| not_found(index, identity))
    }
}

/// In-process document store with store-like partial-update semantics.
///
/// Every call lands in an inspectable log, which makes this the observation
/// point for tests of the mutation pipeline.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    state: Mutex<GatewayState>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, GatewayState>> {
        Ok(self.state.lock()?)
    }

    // Inspection helpers recover from poisoning so tests can still look.
    fn inspect(&self) -> MutexGuard<'_, GatewayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.inspect().calls.clone()
    }

    /// Partial updates received, as `(identity, update body)`.
    pub fn updates(&self) -> Vec<(StoreIdentity, Json)> {
        self.inspect()
            .calls
            .iter()
            .filter_map(|call| match call {
                GatewayCall::Update {
                    identity, document, ..
                } => Some((identity.clone(), document.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn write_calls(&self) -> Vec<GatewayCall> {
        self.inspect()
            .calls
            .iter()
            .filter(|call| call.is_write())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.inspect().calls.clear();
    }

    /// Makes the next call fail with `message`. The call is still logged.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.inspect().pending_failure = Some(message.into());
    }

    /// Stored source of one document, without the identity key.
    pub fn document(&self, index: &str, identity: &StoreIdentity) -> Option<Json> {
        self.inspect()
            .documents(index)
            .iter()
            .find(|doc| &doc.identity == identity)
            .map(|doc| Json::Object(doc.source.clone()))
    }

    pub fn len(&self, index: &str) -> usize {
        self.inspect().documents(index).len()
    }

    pub fn is_empty(&self, index: &str) -> bool {
        self.len(index) == 0
    }

    /// Stores a fully formed document directly, bypassing the call log.
    pub fn seed(&self, index: &str, source: Json) -> Result<StoreIdentity> {
        let source = into_source(source)?;
        let identity = new_identity();
        self.inspect()
            .indices
            .entry(index.to_string())
            .or_default()
            .push(StoredDocument::new(identity.clone(), source));
        Ok(identity)
    }
}

impl DocumentGateway for InMemoryGateway {
    fn search(&self, index: &str, request: &SearchRequest) -> Result<SearchHits> {
        let mut state = self.lock()?;
        state.record(GatewayCall::Search {
            index: index.to_string(),
            request: request.clone(),
        })?;

        let mut matched = Vec::new();
        for doc in state.documents(index) {
            if matches_query(&request.query, &doc.source)? {
                matched.push(doc.clone());
            }
        }
        if let Some(sort) = &request.sort {
            let keys = sort_keys(sort)?;
            matched.sort_by(|a, b| compare_by_keys(&keys, &a.source, &b.source));
        }

        let total = matched.len() as u64;
        let hits = matched
            .into_iter()
            .skip(request.pagination.offset)
            .take(request.pagination.size)
            .collect();
        Ok(SearchHits { hits, total })
    }

    fn get(&self, index: &str, key: &str, value: &Json) -> Result<Option<StoredDocument>> {
        let mut state = self.lock()?;
        state.record(GatewayCall::Get {
            index: index.to_string(),
            key: key.to_string(),
            value: value.clone(),
        })?;

        Ok(state
            .documents(index)
            .iter()
            .find(|doc| phrase_matches(lookup(&doc.source, key), value))
            .cloned())
    }

    fn count(&self, index: &str, query: &Json) -> Result<u64> {
        let mut state = self.lock()?;
        state.record(GatewayCall::Count {
            index: index.to_string(),
            query: query.clone(),
        })?;

        let mut count = 0;
        for doc in state.documents(index) {
            if matches_query(query, &doc.source)? {
                count += 1;
            }
        }
        Ok(count)
    }

    fn distinct(&self, index: &str, field: &str) -> Result<Vec<(Json, u64)>> {
        let mut state = self.lock()?;
        state.record(GatewayCall::Distinct {
            index: index.to_string(),
            field: field.to_string(),
        })?;

        let mut buckets: Vec<(Json, u64)> = Vec::new();
        for doc in state.documents(index) {
            let Some(value) = lookup(&doc.source, field) else {
                continue;
            };
            match buckets.iter_mut().find(|(key, _)| key == value) {
                Some((_, count)) => *count += 1,
                None => buckets.push((value.clone(), 1)),
            }
        }
        // Stable sort: ties keep first-seen order.
        buckets.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(buckets)
    }

    fn delete(&self, index: &str, key: &str, value: &Json) -> Result<u64> {
        let mut state = self.lock()?;
        state.record(GatewayCall::Delete {
            index: index.to_string(),
            key: key.to_string(),
            value: value.clone(),
        })?;

        let Some(docs) = state.indices.get_mut(index) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|doc| !phrase_matches(lookup(&doc.source, key), value));
        Ok((before - docs.len()) as u64)
    }

    fn delete_by_id(&self, index: &str, identity: &StoreIdentity) -> Result<()> {
        let mut state = self.lock()?;
        state.record(GatewayCall::DeleteById {
            index: index.to_string(),
            identity: identity.clone(),
        })?;

        let docs = state
            .indices
            .get_mut(index)
            .ok_or_else(|| not_found(index, identity))?;
        let position = docs
            .iter()
            .position(|doc| &doc.identity == identity)
            .ok_or_else(|| not_found(index, identity))?;
        docs.remove(position);
        Ok(())
    }

    fn update(
        &self,
        index: &str,
        identity: &StoreIdentity,
        document: &UpdateDocument,
    ) -> Result<()> {
        let mut state = self.lock()?;
        state.record(GatewayCall::Update {
            index: index.to_string(),
            identity: identity.clone(),
            document: document.clone().into_json(),
        })?;

        let stored = state.find_mut(index, identity)?;
        merge_into(&mut stored.source, document.as_map());
        event!(Level::DEBUG, index, identity = %identity, "document updated");
        Ok(())
    }

    fn bulk_insert(&self, index: &str, documents: Vec<Json>) -> Result<Vec<Result<StoreIdentity>>> {
        let mut state = self.lock()?;
        state.record(GatewayCall::BulkInsert {
            index: index.to_string(),
            documents: documents.len(),
        })?;

        let mut results = Vec::with_capacity(documents.len());
        let mut inserted = Vec::new();
        for document in documents {
            results.push(into_source(document).map(|source| {
                let identity = new_identity();
                inserted.push(StoredDocument::new(identity.clone(), source));
                identity
            }));
        }
        state
            .indices
            .entry(index.to_string())
            .or_default()
            .extend(inserted);
        Ok(results)
    }
}

fn new_identity() -> StoreIdentity {
    StoreIdentity::new(Uuid::new_v4().simple().to_string())
}

fn not_found(index: &str, identity: &StoreIdentity) -> OdmError {
    OdmError::Gateway(format!("document {} not found in index '{}'", identity, index))
}

fn into_source(document: Json) -> Result<Map<String, Json>> {
    match document {
        Json::Object(mut source) => {
            source.remove(META_ID_FIELD);
            Ok(source)
        }
        other => Err(OdmError::Gateway(format!(
            "document must be an object, got {}",
            json_kind(&other)
        ))),
    }
}

// Objects merge key by key; arrays and scalars are replaced.
fn merge_into(target: &mut Map<String, Json>, patch: &Map<String, Json>) {
    for (key, value) in patch {
        match (target.get_mut(key), value) {
            (Some(Json::Object(existing)), Json::Object(inner)) => merge_into(existing, inner),
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Resolves a dotted field path inside a source document.
fn lookup<'a>(source: &'a Map<String, Json>, field: &str) -> Option<&'a Json> {
    let mut parts = field.split('.');
    let mut current = source.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

// A single-entry `{field: value}` clause body.
fn clause(body: &Json, kind: &str) -> Result<(String, Json)> {
    match body.as_object() {
        Some(map) if map.len() == 1 => {
            let (field, value) = map.iter().next().ok_or_else(|| unsupported(kind))?;
            let value = match value {
                Json::Object(inner) if inner.contains_key("value") => inner["value"].clone(),
                Json::Object(inner) if inner.contains_key("query") => inner["query"].clone(),
                other => other.clone(),
            };
            Ok((field.clone(), value))
        }
        _ => Err(unsupported(kind)),
    }
}

fn unsupported(what: &str) -> OdmError {
    OdmError::Gateway(format!("unsupported query: {}", what))
}

fn matches_query(query: &Json, source: &Map<String, Json>) -> Result<bool> {
    let map = match query {
        Json::Null => return Ok(true),
        Json::Object(map) if map.is_empty() => return Ok(true),
        Json::Object(map) if map.len() == 1 => map,
        other => return Err(unsupported(&other.to_string())),
    };

    let Some((kind, body)) = map.iter().next() else {
        return Ok(true);
    };
    match kind.as_str() {
        "match_all" => Ok(true),
        "term" => {
            let (field, value) = clause(body, kind)?;
            Ok(lookup(source, &field) == Some(&value))
        }
        "match_phrase" => {
            let (field, value) = clause(body, kind)?;
            Ok(phrase_matches(lookup(source, &field), &value))
        }
        "bool" => {
            let must = body.get("must").cloned().unwrap_or(Json::Array(Vec::new()));
            let clauses = match must {
                Json::Array(clauses) => clauses,
                single => vec![single],
            };
            for clause in &clauses {
                if !matches_query(clause, source)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        other => Err(unsupported(other)),
    }
}

// Phrase matching on text is a case-insensitive substring test; anything else is equality.
fn phrase_matches(found: Option<&Json>, expected: &Json) -> bool {
    match (found, expected) {
        (Some(Json::String(text)), Json::String(phrase)) => {
            text.to_lowercase().contains(&phrase.to_lowercase())
        }
        (Some(found), expected) => found == expected,
        (None, _) => false,
    }
}

#[derive(Debug, Clone)]
struct SortKey {
    field: String,
    descending: bool,
}

fn sort_keys(sort: &Json) -> Result<Vec<SortKey>> {
    let clauses: Vec<&Json> = match sort {
        Json::Array(clauses) => clauses.iter().collect(),
        single => vec![single],
    };

    let mut keys = Vec::new();
    for clause in clauses {
        match clause {
            Json::String(field) => keys.push(SortKey {
                field: field.clone(),
                descending: false,
            }),
            Json::Object(map) => {
                for (field, order) in map {
                    let order = order.get("order").unwrap_or(order);
                    let descending = match order.as_str() {
                        Some("asc") => false,
                        Some("desc") => true,
                        _ => return Err(unsupported(&format!("sort order {}", order))),
                    };
                    keys.push(SortKey {
                        field: field.clone(),
                        descending,
                    });
                }
            }
            other => return Err(unsupported(&format!("sort {}", other))),
        }
    }
    Ok(keys)
}

fn compare_by_keys(keys: &[SortKey], a: &Map<String, Json>, b: &Map<String, Json>) -> Ordering {
    for key in keys {
        let ordering = compare_values(lookup(a, &key.field), lookup(b, &key.field));
        let ordering = if key.descending {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

// Missing values sort last in ascending order.
fn compare_values(a: Option<&Json>, b: Option<&Json>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match (a, b) {
            (Json::Number(x), Json::Number(y)) => {
                let x = x.as_f64().unwrap_or(0.0);
                let y = y.as_f64().unwrap_or(0.0);
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
            (Json::String(x), Json::String(y)) => x.cmp(y),
            (Json::Bool(x), Json::Bool(y)) => x.cmp(y),
            _ => json_kind(a).cmp(json_kind(b)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{Pagination, match_phrase, term};
    use serde_json::json;

    fn gateway_with_people() -> (InMemoryGateway, Vec<StoreIdentity>) {
        let gateway = InMemoryGateway::new();
        let ids = ["carol", "alice", "bob"]
            .iter()
            .zip([35, 30, 30])
            .map(|(name, age)| {
                gateway
                    .seed("people", json!({"name": name, "age": age}))
                    .unwrap()
            })
            .collect();
        (gateway, ids)
    }

    #[test]
    fn test_update_deep_merges_objects_and_replaces_arrays() {
        let gateway = InMemoryGateway::new();
        let id = gateway
            .seed(
                "calls",
                json!({"states": {"clean": false, "status": 0}, "tags": ["a", "b"]}),
            )
            .unwrap();

        let update: UpdateDocument =
            serde_json::from_value(json!({"states": {"clean": true}, "tags": ["vip"]})).unwrap();
        gateway.update("calls", &id, &update).unwrap();

        assert_eq!(
            gateway.document("calls", &id).unwrap(),
            json!({"states": {"clean": true, "status": 0}, "tags": ["vip"]})
        );
        assert_eq!(gateway.updates(), vec![(id, json!({"states": {"clean": true}, "tags": ["vip"]}))]);
    }

    #[test]
    fn test_update_unknown_identity_fails() {
        let gateway = InMemoryGateway::new();
        let err = gateway
            .update("calls", &StoreIdentity::new("nope"), &UpdateDocument::new())
            .unwrap_err();
        assert!(matches!(err, OdmError::Gateway(_)));
    }

    #[test]
    fn test_search_sort_and_paginate() {
        let (gateway, _) = gateway_with_people();
        let request = SearchRequest::match_all()
            .sort(json!([{"age": "asc"}, {"name": {"order": "desc"}}]))
            .paginate(Pagination::new(2));

        let hits = gateway.search("people", &request).unwrap();
        assert_eq!(hits.total, 3);
        let names: Vec<_> = hits.hits.iter().map(|doc| doc.source["name"].clone()).collect();
        assert_eq!(names, vec![json!("bob"), json!("alice")]);

        let page = gateway
            .search("people", &request.clone().paginate(Pagination::new(2).with_offset(2)))
            .unwrap();
        assert_eq!(page.hits.len(), 1);
        assert_eq!(page.hits[0].source["name"], json!("carol"));
    }

    #[test]
    fn test_term_count_distinct_and_delete() {
        let (gateway, _) = gateway_with_people();
        assert_eq!(gateway.count("people", &term("age", 30)).unwrap(), 2);
        assert_eq!(gateway.count("people", &Json::Null).unwrap(), 3);

        assert_eq!(
            gateway.distinct("people", "age").unwrap(),
            vec![(json!(30), 2), (json!(35), 1)]
        );

        assert_eq!(gateway.delete("people", "age", &json!(30)).unwrap(), 2);
        assert_eq!(gateway.len("people"), 1);
    }

    #[test]
    fn test_get_uses_phrase_matching() {
        let (gateway, ids) = gateway_with_people();
        let doc = gateway.get("people", "name", &json!("ALI")).unwrap().unwrap();
        assert_eq!(doc.identity, ids[1]);
        assert!(gateway.get("people", "name", &json!("zed")).unwrap().is_none());

        let hits = gateway
            .search("people", &SearchRequest::new(match_phrase("name", "o")))
            .unwrap();
        assert_eq!(hits.total, 2);
    }

    #[test]
    fn test_bulk_insert_reports_per_item() {
        let gateway = InMemoryGateway::new();
        let results = gateway
            .bulk_insert(
                "people",
                vec![json!({"name": "dan", "__meta_id__": "stale"}), json!(5)],
            )
            .unwrap();

        assert_eq!(results.len(), 2);
        let id = results[0].as_ref().unwrap();
        assert_eq!(gateway.document("people", id).unwrap(), json!({"name": "dan"}));
        assert!(matches!(results[1], Err(OdmError::Gateway(_))));
        assert_eq!(
            gateway.calls(),
            vec![GatewayCall::BulkInsert {
                index: "people".into(),
                documents: 2
            }]
        );
    }

    #[test]
    fn test_fail_next_is_one_shot_and_logged() {
        let (gateway, ids) = gateway_with_people();
        gateway.fail_next("cluster unavailable");

        let err = gateway.delete_by_id("people", &ids[0]).unwrap_err();
        assert_eq!(err.to_string(), "Gateway error: cluster unavailable");
        assert_eq!(gateway.len("people"), 3);
        assert_eq!(gateway.write_calls().len(), 1);

        gateway.delete_by_id("people", &ids[0]).unwrap();
        assert_eq!(gateway.len("people"), 2);

        gateway.clear_calls();
        assert!(gateway.calls().is_empty());
    }

    #[test]
    fn test_unsupported_query_is_gateway_error() {
        let (gateway, _) = gateway_with_people();
        let err = gateway
            .count("people", &json!({"regexp": {"name": "a.*"}}))
            .unwrap_err();
        assert!(matches!(err, OdmError::Gateway(_)));
    }
}
