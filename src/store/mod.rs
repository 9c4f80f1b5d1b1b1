pub mod memory;
pub mod mongo;

use crate::report::TestReport;
use anyhow::Result;
use bson::oid::ObjectId;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Document-store operations the importer, cleaner and queries need.
///
/// Iteration order of `find_all` is whatever the store considers natural;
/// callers must not assume it is stable across writes.
pub trait ReportStore {
    /// Inserts every report, assigning identities to those without one.
    /// Returns the identities in input order.
    fn insert_many(&mut self, collection: &str, reports: Vec<TestReport>) -> Result<Vec<ObjectId>>;
    fn find_all(&self, collection: &str) -> Result<Vec<TestReport>>;
    fn find_by_owner(&self, collection: &str, owner: &str) -> Result<Vec<TestReport>>;
    /// Returns the number of documents removed (0 or 1).
    fn delete_by_id(&mut self, collection: &str, id: &ObjectId) -> Result<u64>;
}
