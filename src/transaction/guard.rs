use std::ops::{Deref, DerefMut};

use tracing::{Level, event};

use crate::core::Result;
use crate::persist::Record;

/// Open transaction on a record, flushed when the guard goes away.
///
/// Dropping the guard commits whatever is pending, on every exit path
/// including `?` and panic unwinding. A flush failure at drop time can only
/// be logged; call [`TransactionGuard::commit`] to observe it.
#[derive(Debug)]
pub struct TransactionGuard<'r> {
    record: &'r mut Record,
    finished: bool,
}

impl<'r> TransactionGuard<'r> {
    pub(crate) fn open(record: &'r mut Record) -> Result<Self> {
        record.begin_transaction()?;
        Ok(Self {
            record,
            finished: false,
        })
    }

    /// Flushes the pending mutations and ends the guard.
    ///
    /// A scope already closed through the record (commit, abort, delete)
    /// leaves nothing to flush. Entries that cannot be composed are
    /// discarded with the guard and the error is returned.
    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        self.flush()
    }

    /// Drops the pending mutations and keeps the transaction open.
    pub fn reset(&mut self) -> Result<()> {
        self.record.reset_transaction()
    }

    fn flush(&mut self) -> Result<()> {
        if !self.record.in_transaction() {
            return Ok(());
        }
        let outcome = self.record.commit_transaction();
        if outcome.is_err() && self.record.in_transaction() {
            if let Ok(discarded) = self.record.abort_transaction() {
                event!(
                    Level::WARN,
                    index = self.record.index(),
                    discarded,
                    "unsendable transaction closed with its guard"
                );
            }
        }
        outcome
    }
}

impl Deref for TransactionGuard<'_> {
    type Target = Record;

    fn deref(&self) -> &Record {
        self.record
    }
}

impl DerefMut for TransactionGuard<'_> {
    fn deref_mut(&mut self) -> &mut Record {
        self.record
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(err) = self.flush() {
            event!(
                Level::WARN,
                index = self.record.index(),
                error = %err,
                "transaction flush on drop failed"
            );
        }
    }
}

impl Record {
    /// Opens a transaction and returns a guard that flushes on drop.
    pub fn transaction(&mut self) -> Result<TransactionGuard<'_>> {
        TransactionGuard::open(self)
    }

    /// Runs `op` inside a transaction, flushing afterwards on success and
    /// on error alike. The closure's error wins over a flush error.
    pub fn with_transaction<T, F>(&mut self, op: F) -> Result<T>
    where
        F: FnOnce(&mut Record) -> Result<T>,
    {
        let mut guard = self.transaction()?;
        let outcome = op(&mut guard);
        let flushed = guard.commit();
        let value = outcome?;
        flushed?;
        Ok(value)
    }
}
