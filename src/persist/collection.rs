use std::sync::Arc;

use serde_json::Value as Json;
use tracing::{Level, event, info_span};

use super::{Record, RecordSchema, Session};
use crate::core::{OdmError, Result, Value};
use crate::gateway::{Pagination, SearchHits, SearchRequest, match_all};

/// Type-level operations over every stored record of one schema.
#[derive(Debug, Clone)]
pub struct Collection {
    session: Session,
    schema: Arc<RecordSchema>,
}

impl Collection {
    pub fn new(session: Session, schema: RecordSchema) -> Result<Self> {
        schema.validate()?;
        Ok(Self {
            session,
            schema: Arc::new(schema),
        })
    }

    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    pub fn index(&self) -> &str {
        self.schema.index()
    }

    /// New unattached record of this collection's type.
    pub fn create(&self) -> Record {
        Record::new(self.session.clone(), Arc::clone(&self.schema))
    }

    /// Record whose primary key matches `value`, if any.
    pub fn fetch(&self, value: impl Into<Value>) -> Result<Option<Record>> {
        let wire = self.session.codecs().to_wire(&value.into())?;
        let found = self
            .session
            .gateway()
            .get(self.index(), self.schema.primary_key(), &wire)?;
        found.map(|doc| self.hydrate(&doc.to_wire())).transpose()
    }

    /// Some stored record; which one is up to the store.
    pub fn fetch_first(&self) -> Result<Option<Record>> {
        let request = SearchRequest::match_all().paginate(Pagination::new(1));
        let hits = self.session.gateway().search(self.index(), &request)?;
        hits.hits
            .first()
            .map(|doc| self.hydrate(&doc.to_wire()))
            .transpose()
    }

    /// Every record, one configured page at most, with the total match count.
    pub fn fetch_all(&self, sort: Option<&Json>) -> Result<(Vec<Record>, u64)> {
        self.fetch_matching(None, sort, None)
    }

    pub fn fetch_matching(
        &self,
        query: Option<&Json>,
        sort: Option<&Json>,
        pagination: Option<Pagination>,
    ) -> Result<(Vec<Record>, u64)> {
        let pagination = pagination.unwrap_or_else(|| self.session.config().pagination());
        let hits = self
            .session
            .gateway()
            .get_matching(self.index(), query, sort, pagination)?;
        self.hydrate_all(hits)
    }

    pub fn count(&self, query: Option<&Json>) -> Result<u64> {
        let query = query.cloned().unwrap_or_else(match_all);
        self.session.gateway().count(self.index(), &query)
    }

    /// Distinct values of `field` with how many records hold each.
    pub fn distinct(&self, field: &str) -> Result<Vec<(Json, u64)>> {
        self.session.gateway().distinct(self.index(), field)
    }

    /// Deletes stored records by primary key. In-memory records are untouched.
    pub fn delete_by_key(&self, value: impl Into<Value>) -> Result<u64> {
        let wire = self.session.codecs().to_wire(&value.into())?;
        let removed = self
            .session
            .gateway()
            .delete(self.index(), self.schema.primary_key(), &wire)?;
        event!(Level::DEBUG, index = self.index(), removed, "records deleted by key");
        Ok(removed)
    }

    /// Persists never-stored records in one bulk request.
    ///
    /// Nothing is sent if any record is already stored or belongs to another
    /// index. Items the store rejects stay unattached; the first rejection is
    /// returned after the others have been attached.
    pub fn commit_all(&self, records: &mut [Record]) -> Result<()> {
        let span = info_span!("collection.commit_all", index = %self.index(), records = records.len());
        let _enter = span.enter();

        for record in records.iter() {
            if let Some(identity) = record.store_identity() {
                return Err(OdmError::InvalidState(format!(
                    "record {} is already stored",
                    identity
                )));
            }
            if record.index() != self.index() {
                return Err(OdmError::InvalidState(format!(
                    "record of index '{}' cannot be committed into '{}'",
                    record.index(),
                    self.index()
                )));
            }
        }
        if records.is_empty() {
            return Ok(());
        }

        let documents = records
            .iter()
            .map(Record::to_wire_document)
            .collect::<Result<Vec<_>>>()?;
        let results = self
            .session
            .gateway()
            .bulk_insert(self.index(), documents)?;
        if results.len() != records.len() {
            return Err(OdmError::Gateway(format!(
                "bulk insert returned {} results for {} documents",
                results.len(),
                records.len()
            )));
        }

        let mut first_failure = None;
        for (record, result) in records.iter_mut().zip(results) {
            match result {
                Ok(identity) => record.attach(identity),
                Err(err) => {
                    event!(Level::WARN, index = self.index(), error = %err, "bulk item rejected");
                    first_failure.get_or_insert(err);
                }
            }
        }
        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn hydrate(&self, wire: &Json) -> Result<Record> {
        Record::from_wire_document(self.session.clone(), Arc::clone(&self.schema), wire)
    }

    fn hydrate_all(&self, hits: SearchHits) -> Result<(Vec<Record>, u64)> {
        let records = hits
            .hits
            .iter()
            .map(|doc| self.hydrate(&doc.to_wire()))
            .collect::<Result<Vec<_>>>()?;
        Ok((records, hits.total))
    }
}
