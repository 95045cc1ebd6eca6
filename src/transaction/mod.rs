// ============================================================================
// Transaction Scopes
// ============================================================================
//
// A transaction batches one record's mutations into a single partial update.
// There is no isolation and no rollback of in-memory state: aborting or
// resetting only forgets what has not been sent yet.
//
//   begin ──mutations buffered──> commit (one update, or nothing if empty)
//     │
//     ├──reset──> empty scope, still open
//     └──abort──> closed, nothing sent
//
// ============================================================================

pub mod guard;
pub mod scope;

pub use guard::TransactionGuard;
pub use scope::TransactionScope;
