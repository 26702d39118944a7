//! The document store boundary
//!
//! The seeder and the lab steps only ever talk to a [`DocumentStore`]. The
//! trait mirrors the shell-level collection API a course student uses, so a
//! lab step reads like the command it validates.
//!
//! Thread safety: implementations must be `Send + Sync`; the runner shares
//! one handle across every step.

use labcheck_core::{Cursor, Document, FindOptions, IndexSpec, Output, Result, UpdateOptions, Value, WriteAck};

/// Collection-level operations against a document database.
pub trait DocumentStore: Send + Sync {
    /// Insert one document, generating an `_id` when absent.
    ///
    /// # Errors
    ///
    /// Fails on a duplicate `_id` or unique key, or on malformed geometry
    /// under a `2dsphere` index.
    fn insert_one(&self, collection: &str, document: Document) -> Result<WriteAck>;

    /// Insert a batch of documents. Either all are inserted or none are.
    fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<WriteAck>;

    /// Query a collection. `$near` queries are ordered nearest first unless
    /// an explicit sort is given.
    fn find(&self, collection: &str, filter: &Document, options: FindOptions) -> Result<Cursor>;

    /// First document matching the filter.
    fn find_one(&self, collection: &str, filter: &Document) -> Result<Option<Document>> {
        let mut cursor = self.find(collection, filter, FindOptions::new().limit(1))?;
        Ok(cursor.next())
    }

    /// Number of documents matching the filter.
    fn count_documents(&self, collection: &str, filter: &Document) -> Result<u64>;

    /// Distinct values of a field across matching documents. Array values
    /// contribute their elements.
    fn distinct(&self, collection: &str, field: &str, filter: &Document) -> Result<Vec<Value>>;

    /// Update the first matching document.
    fn update_one(
        &self,
        collection: &str,
        filter: &Document,
        update: &Document,
        options: UpdateOptions,
    ) -> Result<WriteAck>;

    /// Update every matching document.
    fn update_many(
        &self,
        collection: &str,
        filter: &Document,
        update: &Document,
        options: UpdateOptions,
    ) -> Result<WriteAck>;

    /// Delete the first matching document.
    fn delete_one(&self, collection: &str, filter: &Document) -> Result<WriteAck>;

    /// Delete every matching document.
    fn delete_many(&self, collection: &str, filter: &Document) -> Result<WriteAck>;

    /// Run an aggregation pipeline.
    fn aggregate(&self, collection: &str, pipeline: &[Document]) -> Result<Vec<Document>>;

    /// Create an empty collection. Creating an existing one is a no-op.
    fn create_collection(&self, collection: &str) -> Result<WriteAck>;

    /// Create an index and return its name.
    ///
    /// Existing documents are checked against the new index, so a unique
    /// index over duplicated values fails.
    fn create_index(&self, collection: &str, spec: IndexSpec) -> Result<String>;

    /// Index descriptions (`{ v, key, name }`), starting with `_id_`.
    fn list_indexes(&self, collection: &str) -> Result<Vec<Document>>;

    /// Drop an index by name.
    fn drop_index(&self, collection: &str, name: &str) -> Result<()>;

    /// Drop a collection and its indexes. Returns whether it existed.
    fn drop_collection(&self, collection: &str) -> Result<bool>;

    /// Collection names, sorted.
    fn list_collections(&self) -> Result<Vec<String>>;

    /// Run an administrative command such as `{ ping: 1 }`.
    fn run_command(&self, command: &Document) -> Result<Document>;

    /// Run `body` inside a transaction.
    ///
    /// Writes made by `body` through the handle it receives are committed
    /// when it returns `Ok` and rolled back when it returns an error or
    /// panics. Transactions do not nest.
    fn with_transaction(
        &self,
        body: &mut dyn FnMut(&dyn DocumentStore) -> Result<Output>,
    ) -> Result<Output>;
}
