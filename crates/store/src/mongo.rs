//! [`DocumentStore`] backed by a MongoDB server
//!
//! Uses the driver's blocking API, so the runner stays single threaded.
//! Documents cross the boundary as JSON and are converted at the edge:
//!
//! - RFC 3339 timestamps (`2024-01-05T10:15:00Z`) are stored as BSON dates
//!   and read back as timestamp strings
//! - `{ "$oid": "<hex>" }` is an ObjectId in both directions
//! - integers that fit 32 bits are stored as `int`, larger ones as `long`
//!
//! Transactions run on a client session. The handle passed to the
//! transaction body routes every read and write through that session.

use std::sync::Arc;

use bson::{doc, oid::ObjectId, Bson};
use chrono::{DateTime, SecondsFormat, Utc};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{
    FindOptions as DriverFindOptions, IndexOptions, UpdateOptions as DriverUpdateOptions,
};
use mongodb::sync::{Client, ClientSession, Collection, Database, SessionCursor};
use mongodb::IndexModel;
use parking_lot::Mutex;
use serde_json::json;
use tracing::{debug, info, warn};

use labcheck_core::{
    Cursor, Document, Error, FindOptions, IndexSpec, Output, Result, UpdateOptions, Value, WriteAck,
};

use crate::traits::DocumentStore;

/// Commands that only run against the `admin` database.
const ADMIN_COMMANDS: &[&str] = &["replSetGetStatus", "listDatabases", "hostInfo", "getLog"];

type BsonDocument = bson::Document;

/// A [`DocumentStore`] talking to a MongoDB deployment.
///
/// # Example
///
/// ```no_run
/// use labcheck_store::{DocumentStore, MongoStore};
///
/// let store = MongoStore::connect("mongodb://localhost:27017/?replicaSet=rs0", "labcheck")?;
/// println!("{:?}", store.list_collections()?);
/// # Ok::<(), labcheck_core::Error>(())
/// ```
pub struct MongoStore {
    client: Client,
    db: Database,
    /// Set on the handle given to a transaction body
    session: Option<Arc<Mutex<ClientSession>>>,
}

impl MongoStore {
    /// Connect to `uri` and use `database` for every collection.
    ///
    /// The server is pinged once, so an unreachable deployment fails here
    /// rather than on the first lab step.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] for a malformed URI or an unreachable server.
    pub fn connect(uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).map_err(|e| Error::Connection(e.to_string()))?;
        client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .map_err(|e| Error::Connection(e.to_string()))?;
        info!(target: "labcheck::store", database, "Connected to MongoDB");
        Ok(MongoStore {
            db: client.database(database),
            client,
            session: None,
        })
    }

    /// Name of the database holding the collections.
    pub fn database_name(&self) -> &str {
        self.db.name()
    }

    fn collection(&self, name: &str) -> Collection<BsonDocument> {
        self.db.collection(name)
    }

    fn collection_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .db
            .list_collection_names(None)
            .map_err(server_error)?
            .into_iter()
            .filter(|name| !name.starts_with("system."))
            .collect();
        names.sort();
        Ok(names)
    }
}

impl DocumentStore for MongoStore {
    fn insert_one(&self, collection: &str, document: Document) -> Result<WriteAck> {
        let coll = self.collection(collection);
        let document = to_bson_document(&document);
        let result = match &self.session {
            Some(session) => coll.insert_one_with_session(document, None, &mut session.lock()),
            None => coll.insert_one(document, None),
        }
        .map_err(server_error)?;
        Ok(WriteAck::inserted(vec![from_bson(result.inserted_id)]))
    }

    fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<WriteAck> {
        if documents.is_empty() {
            return Ok(WriteAck::inserted(Vec::new()));
        }
        let coll = self.collection(collection);
        let documents: Vec<BsonDocument> = documents.iter().map(to_bson_document).collect();
        let result = match &self.session {
            Some(session) => coll.insert_many_with_session(documents, None, &mut session.lock()),
            None => coll.insert_many(documents, None),
        }
        .map_err(server_error)?;

        let mut ids: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
        ids.sort_by_key(|(position, _)| *position);
        Ok(WriteAck::inserted(
            ids.into_iter().map(|(_, id)| from_bson(id)).collect(),
        ))
    }

    fn find(&self, collection: &str, filter: &Document, options: FindOptions) -> Result<Cursor> {
        let coll = self.collection(collection);
        let filter = to_bson_document(filter);
        let options = driver_find_options(&options);
        let documents = match &self.session {
            Some(session) => {
                let mut session = session.lock();
                let cursor = coll.find_with_session(filter, options, &mut session);
                drain_session(cursor, &mut session)?
            }
            None => coll
                .find(filter, options)
                .and_then(|cursor| cursor.collect::<mongodb::error::Result<Vec<_>>>())
                .map_err(server_error)?,
        };
        Ok(Cursor::new(documents.into_iter().map(from_bson_document).collect()))
    }

    fn count_documents(&self, collection: &str, filter: &Document) -> Result<u64> {
        let coll = self.collection(collection);
        let filter = to_bson_document(filter);
        match &self.session {
            Some(session) => coll.count_documents_with_session(filter, None, &mut session.lock()),
            None => coll.count_documents(filter, None),
        }
        .map_err(server_error)
    }

    fn distinct(&self, collection: &str, field: &str, filter: &Document) -> Result<Vec<Value>> {
        let coll = self.collection(collection);
        let filter = to_bson_document(filter);
        let values = match &self.session {
            Some(session) => coll.distinct_with_session(field, filter, None, &mut session.lock()),
            None => coll.distinct(field, filter, None),
        }
        .map_err(server_error)?;
        Ok(values.into_iter().map(from_bson).collect())
    }

    fn update_one(
        &self,
        collection: &str,
        filter: &Document,
        update: &Document,
        options: UpdateOptions,
    ) -> Result<WriteAck> {
        let coll = self.collection(collection);
        let (filter, update) = (to_bson_document(filter), to_bson_document(update));
        let options = driver_update_options(options);
        let result = match &self.session {
            Some(session) => {
                coll.update_one_with_session(filter, update, options, &mut session.lock())
            }
            None => coll.update_one(filter, update, options),
        }
        .map_err(server_error)?;
        Ok(WriteAck::updated(
            result.matched_count,
            result.modified_count,
            result.upserted_id.map(from_bson),
        ))
    }

    fn update_many(
        &self,
        collection: &str,
        filter: &Document,
        update: &Document,
        options: UpdateOptions,
    ) -> Result<WriteAck> {
        let coll = self.collection(collection);
        let (filter, update) = (to_bson_document(filter), to_bson_document(update));
        let options = driver_update_options(options);
        let result = match &self.session {
            Some(session) => {
                coll.update_many_with_session(filter, update, options, &mut session.lock())
            }
            None => coll.update_many(filter, update, options),
        }
        .map_err(server_error)?;
        Ok(WriteAck::updated(
            result.matched_count,
            result.modified_count,
            result.upserted_id.map(from_bson),
        ))
    }

    fn delete_one(&self, collection: &str, filter: &Document) -> Result<WriteAck> {
        let coll = self.collection(collection);
        let filter = to_bson_document(filter);
        let result = match &self.session {
            Some(session) => coll.delete_one_with_session(filter, None, &mut session.lock()),
            None => coll.delete_one(filter, None),
        }
        .map_err(server_error)?;
        Ok(WriteAck::deleted(result.deleted_count))
    }

    fn delete_many(&self, collection: &str, filter: &Document) -> Result<WriteAck> {
        let coll = self.collection(collection);
        let filter = to_bson_document(filter);
        let result = match &self.session {
            Some(session) => coll.delete_many_with_session(filter, None, &mut session.lock()),
            None => coll.delete_many(filter, None),
        }
        .map_err(server_error)?;
        Ok(WriteAck::deleted(result.deleted_count))
    }

    fn aggregate(&self, collection: &str, pipeline: &[Document]) -> Result<Vec<Document>> {
        let coll = self.collection(collection);
        let pipeline: Vec<BsonDocument> = pipeline.iter().map(to_bson_document).collect();
        let documents = match &self.session {
            Some(session) => {
                let mut session = session.lock();
                let cursor = coll.aggregate_with_session(pipeline, None, &mut session);
                drain_session(cursor, &mut session)?
            }
            None => coll
                .aggregate(pipeline, None)
                .and_then(|cursor| cursor.collect::<mongodb::error::Result<Vec<_>>>())
                .map_err(server_error)?,
        };
        Ok(documents.into_iter().map(from_bson_document).collect())
    }

    fn create_collection(&self, collection: &str) -> Result<WriteAck> {
        if !self.collection_names()?.iter().any(|name| name == collection) {
            self.db
                .create_collection(collection, None)
                .map_err(server_error)?;
        }
        Ok(WriteAck::acknowledged())
    }

    fn create_index(&self, collection: &str, spec: IndexSpec) -> Result<String> {
        let name = spec.resolved_name()?;
        let mut options = IndexOptions::default();
        options.name = Some(name);
        if spec.unique {
            options.unique = Some(true);
        }
        let model = IndexModel::builder()
            .keys(to_bson_document(&spec.keys))
            .options(Some(options))
            .build();
        let result = self
            .collection(collection)
            .create_index(model, None)
            .map_err(server_error)?;
        debug!(target: "labcheck::store", collection, index = %result.index_name, "Index created");
        Ok(result.index_name)
    }

    fn list_indexes(&self, collection: &str) -> Result<Vec<Document>> {
        let reply = self
            .db
            .run_command(doc! { "listIndexes": collection }, None)
            .map_err(server_error)?;
        let batch = reply
            .get_document("cursor")
            .and_then(|cursor| cursor.get_array("firstBatch"))
            .map_err(|e| Error::Server {
                code: 0,
                message: format!("malformed listIndexes reply: {}", e),
            })?;
        Ok(batch
            .iter()
            .filter_map(|index| match from_bson(index.clone()) {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect())
    }

    fn drop_index(&self, collection: &str, name: &str) -> Result<()> {
        self.collection(collection)
            .drop_index(name, None)
            .map_err(server_error)
    }

    fn drop_collection(&self, collection: &str) -> Result<bool> {
        let existed = self.collection_names()?.iter().any(|name| name == collection);
        if existed {
            self.collection(collection).drop(None).map_err(server_error)?;
            debug!(target: "labcheck::store", collection, "Collection dropped");
        }
        Ok(existed)
    }

    fn list_collections(&self) -> Result<Vec<String>> {
        self.collection_names()
    }

    fn run_command(&self, command: &Document) -> Result<Document> {
        let name = command
            .keys()
            .next()
            .ok_or_else(|| Error::UnknownCommand(String::new()))?;
        let target = if ADMIN_COMMANDS.contains(&name.as_str()) {
            self.client.database("admin")
        } else {
            self.db.clone()
        };
        let reply = target
            .run_command(to_bson_document(command), None)
            .map_err(server_error)?;
        Ok(from_bson_document(reply))
    }

    fn with_transaction(
        &self,
        body: &mut dyn FnMut(&dyn DocumentStore) -> Result<Output>,
    ) -> Result<Output> {
        if self.session.is_some() {
            return Err(Error::Transaction(
                "Transaction already in progress on this store".to_string(),
            ));
        }
        let mut session = self.client.start_session(None).map_err(server_error)?;
        session.start_transaction(None).map_err(server_error)?;
        let session = Arc::new(Mutex::new(session));
        let scoped = MongoStore {
            client: self.client.clone(),
            db: self.db.clone(),
            session: Some(Arc::clone(&session)),
        };
        debug!(target: "labcheck::store", "Transaction started");

        let outcome = body(&scoped);
        drop(scoped);
        let mut session = session.lock();
        match outcome {
            Ok(output) => {
                session
                    .commit_transaction()
                    .map_err(|e| Error::Transaction(server_error(e).to_string()))?;
                debug!(target: "labcheck::store", "Transaction committed");
                Ok(output)
            }
            Err(e) => {
                if let Err(abort) = session.abort_transaction() {
                    warn!(target: "labcheck::store", error = %abort, "Abort failed");
                }
                warn!(target: "labcheck::store", error = %e, "Transaction rolled back");
                Err(Error::Transaction(e.to_string()))
            }
        }
    }
}

fn drain_session(
    cursor: mongodb::error::Result<SessionCursor<BsonDocument>>,
    session: &mut ClientSession,
) -> Result<Vec<BsonDocument>> {
    let mut cursor = cursor.map_err(server_error)?;
    cursor
        .iter(session)
        .collect::<mongodb::error::Result<Vec<_>>>()
        .map_err(server_error)
}

fn driver_find_options(options: &FindOptions) -> DriverFindOptions {
    let mut driver = DriverFindOptions::default();
    driver.sort = options.sort.as_ref().map(to_bson_document);
    driver.skip = options.skip.map(|n| n as u64);
    driver.limit = options.limit.map(|n| n as i64);
    driver.projection = options.projection.as_ref().map(to_bson_document);
    driver
}

fn driver_update_options(options: UpdateOptions) -> DriverUpdateOptions {
    let mut driver = DriverUpdateOptions::default();
    if options.upsert {
        driver.upsert = Some(true);
    }
    driver
}

/// Map a driver error onto the store error, keeping the server's message
/// so failure classification sees the same text a shell would print.
pub(crate) fn server_error(err: mongodb::error::Error) -> Error {
    match err.kind.as_ref() {
        ErrorKind::Command(e) => Error::Server {
            code: e.code,
            message: e.message.clone(),
        },
        ErrorKind::Write(WriteFailure::WriteError(e)) => Error::Server {
            code: e.code,
            message: e.message.clone(),
        },
        ErrorKind::Write(WriteFailure::WriteConcernError(e)) => Error::Server {
            code: e.code,
            message: e.message.clone(),
        },
        ErrorKind::BulkWrite(failure) => {
            match failure.write_errors.as_ref().and_then(|errors| errors.first()) {
                Some(e) => Error::Server {
                    code: e.code,
                    message: e.message.clone(),
                },
                None => Error::Server {
                    code: 0,
                    message: err.to_string(),
                },
            }
        }
        ErrorKind::ServerSelection { message, .. } => Error::Connection(message.clone()),
        _ => Error::Server {
            code: 0,
            message: err.to_string(),
        },
    }
}

/// Convert a JSON document to BSON, preserving key order.
pub(crate) fn to_bson_document(document: &Document) -> BsonDocument {
    document
        .iter()
        .map(|(key, value)| (key.clone(), to_bson(value)))
        .collect()
}

pub(crate) fn to_bson(value: &Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i32::try_from(i).map(Bson::Int32).unwrap_or(Bson::Int64(i)),
            None => Bson::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => match parse_timestamp(s) {
            Some(timestamp) => Bson::DateTime(bson::DateTime::from_chrono(timestamp)),
            None => Bson::String(s.clone()),
        },
        Value::Array(items) => Bson::Array(items.iter().map(to_bson).collect()),
        Value::Object(map) => match object_id(map) {
            Some(oid) => Bson::ObjectId(oid),
            None => Bson::Document(to_bson_document(map)),
        },
    }
}

/// Convert a BSON document to JSON, preserving key order.
pub(crate) fn from_bson_document(document: BsonDocument) -> Document {
    document
        .into_iter()
        .map(|(key, value)| (key, from_bson(value)))
        .collect()
}

pub(crate) fn from_bson(value: Bson) -> Value {
    match value {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(b) => Value::Bool(b),
        Bson::Int32(i) => Value::from(i),
        Bson::Int64(i) => Value::from(i),
        Bson::Double(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Bson::String(s) => Value::String(s),
        Bson::Array(items) => Value::Array(items.into_iter().map(from_bson).collect()),
        Bson::Document(document) => Value::Object(from_bson_document(document)),
        Bson::ObjectId(oid) => json!({ "$oid": oid.to_hex() }),
        Bson::DateTime(dt) => {
            Value::String(dt.to_chrono().to_rfc3339_opts(SecondsFormat::AutoSi, true))
        }
        other => other.into_relaxed_extjson(),
    }
}

/// Full RFC 3339 timestamps only; bare dates stay strings.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if !s.contains('T') {
        return None;
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|timestamp| timestamp.with_timezone(&Utc))
}

fn object_id(map: &Document) -> Option<ObjectId> {
    if map.len() != 1 {
        return None;
    }
    map.get("$oid")?.as_str().and_then(|hex| ObjectId::parse_str(hex).ok())
}
