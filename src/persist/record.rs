// ============================================================================
// Record Lifecycle
// ============================================================================
//
// A Record is one stored document held in memory. Its fields are plain
// values; reading a container through `field_mut` hands out a wrapper whose
// reports end in the record's funnel (RecordState as ChildUpdateSink):
//
//   detached        -> dropped (local change only)
//   reserved root   -> dropped
//   scope open      -> buffered in the transaction scope
//   otherwise       -> composed into a one-entry update and sent
//
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value as Json};
use tracing::{Level, event, info_span};

use super::{RecordMetadata, RecordSchema, Session};
use crate::config::TransactionReopenPolicy;
use crate::core::{OdmError, Path, Result, Segment, Value, is_reserved};
use crate::gateway::{StoreIdentity, StoredDocument};
use crate::tracking::{ChildUpdateSink, Tracked};
use crate::transaction::TransactionScope;
use crate::update::{UpdateDocument, UpdateEntry, compose};

static NULL_TEMPLATE: Value = Value::Null;

#[derive(Debug)]
pub(crate) struct RecordState {
    session: Session,
    schema: Arc<RecordSchema>,
    identity: Option<StoreIdentity>,
    scope: Option<TransactionScope>,
    metadata: RecordMetadata,
}

impl RecordState {
    fn attach(&mut self, identity: StoreIdentity) {
        event!(Level::DEBUG, index = self.schema.index(), identity = %identity, "record attached");
        self.identity = Some(identity);
        self.metadata.attached(Utc::now());
    }

    fn detach(&mut self) {
        self.identity = None;
        self.scope = None;
        self.metadata.detached();
    }

    /// Sends one partial update for the attached identity.
    fn send(&mut self, document: UpdateDocument) -> Result<()> {
        if document.is_empty() && self.session.config().skip_empty_updates {
            event!(Level::DEBUG, index = self.schema.index(), "empty update skipped");
            return Ok(());
        }

        let identity = self.identity.as_ref().ok_or_else(|| {
            OdmError::InvalidState("cannot send an update for a detached record".to_string())
        })?;
        self.session
            .gateway()
            .update(self.schema.index(), identity, &document)?;
        self.metadata.update_sent(Utc::now());
        event!(
            Level::DEBUG,
            index = self.schema.index(),
            identity = %identity,
            fields = document.as_map().len(),
            "update flushed"
        );
        Ok(())
    }
}

impl ChildUpdateSink for RecordState {
    fn notify_child_update(&mut self, path: Path, value: Value) -> Result<()> {
        self.metadata.observed();

        if self.identity.is_none() {
            self.metadata.suppressed();
            event!(Level::DEBUG, path = %path, "mutation on detached record not sent");
            return Ok(());
        }
        if path.root_segment().is_reserved() {
            event!(Level::DEBUG, path = %path, "mutation of reserved field ignored");
            return Ok(());
        }

        let entry = UpdateEntry { path, value };
        if let Some(scope) = self.scope.as_mut() {
            // Encoded once here so a value without a wire form fails at its own write.
            self.session.codecs().to_wire(&entry.value)?;
            scope.push(entry);
            return Ok(());
        }

        let document = compose([&entry], self.session.codecs())?;
        self.send(document)
    }
}

/// One stored document, held in memory.
#[derive(Debug)]
pub struct Record {
    state: RecordState,
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Unattached record carrying the schema's declared defaults.
    pub fn new(session: Session, schema: Arc<RecordSchema>) -> Self {
        let fields = schema.defaults().clone();
        Self {
            state: RecordState {
                session,
                schema,
                identity: None,
                scope: None,
                metadata: RecordMetadata::default(),
            },
            fields,
        }
    }

    /// Builds an attached record from a fetched wire document.
    pub fn from_wire_document(
        session: Session,
        schema: Arc<RecordSchema>,
        document: &Json,
    ) -> Result<Self> {
        let mut record = Self::new(session, schema);
        record.load(document)?;
        Ok(record)
    }

    // ------------------------------------------------------------------
    // Fields
    // ------------------------------------------------------------------

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Reads a field for in-place mutation. Containers come back wrapped.
    pub fn field_mut(&mut self, field: &str) -> Option<Tracked<'_>> {
        let value = self.fields.get_mut(field)?;
        Some(Tracked::wrap(
            value,
            Segment::attribute(field),
            &mut self.state,
        ))
    }

    /// Assigns a top-level field and routes the write through the funnel.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let field = field.into();
        let value = value.into();
        self.fields.insert(field.clone(), value.clone());
        self.state
            .notify_child_update(Path::leaf(Segment::Attribute(field)), value)
    }

    /// Entry point for externally composed paths.
    pub fn notify_child_update(&mut self, path: Path, value: impl Into<Value>) -> Result<()> {
        self.state.notify_child_update(path, value.into())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn store_identity(&self) -> Option<&StoreIdentity> {
        self.state.identity.as_ref()
    }

    pub fn is_attached(&self) -> bool {
        self.state.identity.is_some()
    }

    pub fn index(&self) -> &str {
        self.state.schema.index()
    }

    pub fn primary_key(&self) -> &str {
        self.state.schema.primary_key()
    }

    pub fn primary_key_value(&self) -> Option<&Value> {
        self.fields.get(self.state.schema.primary_key())
    }

    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.state.schema
    }

    pub fn session(&self) -> &Session {
        &self.state.session
    }

    pub fn metadata(&self) -> &RecordMetadata {
        &self.state.metadata
    }

    pub fn in_transaction(&self) -> bool {
        self.state.scope.is_some()
    }

    /// Entries buffered in the open transaction; empty when none is open.
    pub fn pending_entries(&self) -> &[UpdateEntry] {
        self.state
            .scope
            .as_ref()
            .map(TransactionScope::entries)
            .unwrap_or(&[])
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Persists a never-stored record and attaches it to the new identity.
    pub fn commit(&mut self) -> Result<()> {
        let span = info_span!("record.commit", index = %self.index());
        let _enter = span.enter();

        if let Some(identity) = self.store_identity() {
            return Err(OdmError::InvalidState(format!(
                "record is already stored as {}",
                identity
            )));
        }

        let document = self.to_wire_document()?;
        let mut results = self
            .state
            .session
            .gateway()
            .bulk_insert(self.index(), vec![document])?;
        let identity = results.pop().ok_or_else(|| {
            OdmError::Gateway("bulk insert returned no result for the document".to_string())
        })??;

        self.state.attach(identity);
        Ok(())
    }

    /// Deletes the stored document and detaches the record.
    pub fn delete(&mut self) -> Result<()> {
        let identity = self.state.identity.clone().ok_or_else(|| {
            OdmError::InvalidState("cannot delete a record that is not stored".to_string())
        })?;

        let span = info_span!("record.delete", index = %self.index(), identity = %identity);
        let _enter = span.enter();

        self.state
            .session
            .gateway()
            .delete_by_id(self.index(), &identity)?;
        if self.in_transaction() {
            event!(
                Level::DEBUG,
                discarded = self.pending_entries().len(),
                "open transaction dropped by delete"
            );
        }
        self.state.detach();
        Ok(())
    }

    /// Replaces all field values with a fetched wire document.
    ///
    /// Fields missing from the document fall back to a neutral value of
    /// their prior (or declared) shape.
    pub fn load(&mut self, document: &Json) -> Result<()> {
        let span = info_span!("record.load", index = %self.index());
        let _enter = span.enter();

        if self.in_transaction() {
            return Err(OdmError::InvalidState(
                "cannot load a document while a transaction is open".to_string(),
            ));
        }

        let stored = StoredDocument::from_wire(document)?;
        if let Some(current) = self.store_identity() {
            if current != &stored.identity {
                return Err(OdmError::InvalidState(format!(
                    "record is attached to {} but the document belongs to {}",
                    current, stored.identity
                )));
            }
        }

        self.fields = self.decode_fields(&stored.source)?;
        if !self.is_attached() {
            self.state.attach(stored.identity);
        }
        Ok(())
    }

    fn decode_fields(&self, source: &Map<String, Json>) -> Result<BTreeMap<String, Value>> {
        let codecs = self.state.session.codecs();
        let schema = &self.state.schema;
        let mut decoded = BTreeMap::new();

        let known = schema
            .defaults()
            .keys()
            .chain(self.fields.keys())
            .filter(|name| !is_reserved(name));
        for name in known {
            if decoded.contains_key(name) {
                continue;
            }
            let template = match (self.fields.get(name), schema.default_of(name)) {
                (Some(Value::Null) | None, Some(declared)) => declared,
                (Some(prior), _) => prior,
                (None, None) => &NULL_TEMPLATE,
            };
            let value = match source.get(name) {
                Some(wire) => codecs.decode_like(template, wire)?,
                None => codecs.neutral_like(template),
            };
            decoded.insert(name.clone(), value);
        }

        for (name, wire) in source {
            if is_reserved(name) || decoded.contains_key(name) {
                continue;
            }
            decoded.insert(name.clone(), Value::from_wire(wire));
        }
        Ok(decoded)
    }

    /// Full wire form of the fields, without reserved metadata.
    pub fn to_wire_document(&self) -> Result<Json> {
        let codecs = self.state.session.codecs();
        let mut document = Map::new();
        for (name, value) in &self.fields {
            if is_reserved(name) {
                continue;
            }
            document.insert(name.clone(), codecs.to_wire(value)?);
        }
        Ok(Json::Object(document))
    }

    pub(crate) fn attach(&mut self, identity: StoreIdentity) {
        self.state.attach(identity);
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Opens a transaction scope; mutations are buffered until commit.
    pub fn begin_transaction(&mut self) -> Result<()> {
        if !self.is_attached() {
            return Err(OdmError::InvalidState(
                "cannot begin a transaction on a record that is not stored".to_string(),
            ));
        }

        if let Some(open) = self.state.scope.as_ref() {
            match self.state.session.config().reopen_policy {
                TransactionReopenPolicy::Reject => {
                    return Err(OdmError::InvalidState(
                        "a transaction is already open on this record".to_string(),
                    ));
                }
                TransactionReopenPolicy::Supersede => {
                    event!(
                        Level::WARN,
                        index = self.index(),
                        discarded = open.len(),
                        "open transaction superseded"
                    );
                }
            }
        }

        self.state.scope = Some(TransactionScope::new());
        Ok(())
    }

    /// Sends the buffered mutations as one update and closes the scope.
    ///
    /// If the entries cannot be composed the scope stays open, so it can be
    /// retried or aborted. Once composed, the scope is closed even when the
    /// gateway call fails.
    pub fn commit_transaction(&mut self) -> Result<()> {
        let scope = self.state.scope.as_ref().ok_or_else(|| {
            OdmError::InvalidState("no transaction is open on this record".to_string())
        })?;

        let span = info_span!(
            "transaction.commit",
            index = %self.index(),
            entries = scope.len()
        );
        let _enter = span.enter();

        if scope.is_empty() {
            self.state.scope = None;
            event!(Level::DEBUG, "empty transaction committed, nothing sent");
            return Ok(());
        }

        let document = scope.compose(self.state.session.codecs())?;
        self.state.scope = None;
        self.state.send(document)
    }

    /// Drops the buffered mutations and starts an empty scope.
    /// In-memory edits are kept.
    pub fn reset_transaction(&mut self) -> Result<()> {
        if !self.is_attached() {
            return Err(OdmError::InvalidState(
                "cannot reset a transaction on a record that is not stored".to_string(),
            ));
        }
        self.state.scope = Some(TransactionScope::new());
        Ok(())
    }

    /// Closes the scope without sending; returns how many entries were dropped.
    pub fn abort_transaction(&mut self) -> Result<usize> {
        let scope = self.state.scope.take().ok_or_else(|| {
            OdmError::InvalidState("no transaction is open on this record".to_string())
        })?;
        event!(Level::DEBUG, discarded = scope.len(), "transaction aborted");
        Ok(scope.len())
    }
}
