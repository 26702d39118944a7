//! Embedded in-memory document store
//!
//! `MemoryStore` keeps every collection in a `BTreeMap` behind a single
//! `parking_lot::RwLock`. Reads clone the matching documents out of the lock
//! so no guard outlives a call.
//!
//! ## Write atomicity
//!
//! Each write call is all-or-nothing: a batch insert or multi-document update
//! that hits a constraint violation restores the documents it already touched
//! before returning the error.
//!
//! ## Persistence
//!
//! A store opened with [`MemoryStore::open`] loads its JSON snapshot and
//! writes it back on [`MemoryStore::flush`]. Nothing is written implicitly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use labcheck_core::{
    generate_id, get_path, lookup_path, set_path, Cursor, Document, Error, FindOptions, IndexKind,
    IndexSpec, Output, Result, UpdateOptions, Value, WriteAck, ID_FIELD,
};

use crate::aggregate::{apply_projection, run_pipeline, sort_documents, PipelineContext};
use crate::compare::{compare_values, values_equal};
use crate::filter::{Filter, MatchContext};
use crate::geo::validate_geometry;
use crate::snapshot;
use crate::traits::DocumentStore;
use crate::update::{apply_update, float_value, validate_update};

/// Name of the implicit primary key index.
const ID_INDEX: &str = "_id_";

/// One collection: documents in insertion order plus declared indexes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Collection {
    pub documents: Vec<Document>,
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,
}

impl Collection {
    fn fields_of_kind(&self, kind: IndexKind) -> Vec<String> {
        self.indexes
            .iter()
            .filter_map(|i| i.fields().ok())
            .flatten()
            .filter(|(_, k)| *k == kind)
            .map(|(field, _)| field)
            .collect()
    }

    pub(crate) fn geo_fields(&self) -> Vec<String> {
        self.fields_of_kind(IndexKind::Geo2dSphere)
    }

    pub(crate) fn match_context(&self) -> MatchContext {
        let text = self.fields_of_kind(IndexKind::Text);
        MatchContext {
            text_fields: if text.is_empty() { None } else { Some(text) },
        }
    }

    /// Check `doc` against `_id` uniqueness, unique indexes and geo keys.
    ///
    /// `skip` is the position of the document being replaced, if any.
    fn check_document(&self, name: &str, doc: &Document, skip: Option<usize>) -> Result<()> {
        let others = || {
            self.documents
                .iter()
                .enumerate()
                .filter(move |(i, _)| Some(*i) != skip)
                .map(|(_, d)| d)
        };

        if let Some(id) = doc.get(ID_FIELD) {
            if others().any(|d| d.get(ID_FIELD).map_or(false, |other| values_equal(other, id))) {
                return Err(Error::DuplicateKey {
                    collection: name.to_string(),
                    index: ID_INDEX.to_string(),
                    key: format!("{{ _id: {} }}", id),
                });
            }
        }

        for index in self.indexes.iter().filter(|i| i.unique) {
            let fields = index.fields()?;
            let key_of = |d: &Document| -> Vec<Value> {
                fields
                    .iter()
                    .map(|(f, _)| get_path(d, f).cloned().unwrap_or(Value::Null))
                    .collect()
            };
            let key = key_of(doc);
            let clash = others().any(|d| {
                key_of(d)
                    .iter()
                    .zip(&key)
                    .all(|(a, b)| values_equal(a, b))
            });
            if clash {
                let rendered = fields
                    .iter()
                    .zip(&key)
                    .map(|((f, _), v)| format!("{}: {}", f, v))
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(Error::DuplicateKey {
                    collection: name.to_string(),
                    index: index.resolved_name()?,
                    key: format!("{{ {} }}", rendered),
                });
            }
        }

        for field in self.geo_fields() {
            if let Some(value) = get_path(doc, &field).filter(|v| !v.is_null()) {
                validate_geometry(value)?;
            }
        }
        Ok(())
    }
}

/// Operation counters reported by `serverStatus`.
#[derive(Debug, Default)]
pub(crate) struct OpCounters {
    pub insert: AtomicU64,
    pub query: AtomicU64,
    pub update: AtomicU64,
    pub delete: AtomicU64,
    pub command: AtomicU64,
}

impl OpCounters {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

/// In-memory [`DocumentStore`] with optional JSON snapshot persistence.
///
/// # Example
///
/// ```ignore
/// let store = MemoryStore::open(".labcheck/store.json")?;
/// store.insert_one("stores", into_document(json!({"name": "Downtown"}))?)?;
/// store.flush()?;
/// ```
#[derive(Debug)]
pub struct MemoryStore {
    pub(crate) collections: RwLock<BTreeMap<String, Collection>>,
    path: Option<PathBuf>,
    in_transaction: AtomicBool,
    pub(crate) counters: OpCounters,
    pub(crate) started_at: DateTime<Utc>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty, non-persistent store.
    pub fn new() -> Self {
        Self::with_collections(BTreeMap::new(), None)
    }

    /// Open a store backed by a snapshot file, loading it if it exists.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be read or parsed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let collections = snapshot::load(&path)?;
        info!(
            target: "labcheck::store",
            path = %path.display(),
            collections = collections.len(),
            "Store opened"
        );
        Ok(Self::with_collections(collections, Some(path)))
    }

    fn with_collections(collections: BTreeMap<String, Collection>, path: Option<PathBuf>) -> Self {
        MemoryStore {
            collections: RwLock::new(collections),
            path,
            in_transaction: AtomicBool::new(false),
            counters: OpCounters::default(),
            started_at: Utc::now(),
        }
    }

    /// Snapshot file backing this store, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether [`flush`](Self::flush) writes anywhere.
    pub fn is_persistent(&self) -> bool {
        self.path.is_some()
    }

    /// Write the snapshot file. A no-op for in-memory stores.
    pub fn flush(&self) -> Result<()> {
        if let Some(path) = &self.path {
            let collections = self.collections.read();
            snapshot::save(path, &collections)?;
            info!(
                target: "labcheck::store",
                path = %path.display(),
                collections = collections.len(),
                "Snapshot written"
            );
        }
        Ok(())
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Collection>> {
        self.collections.read()
    }

    fn update(
        &self,
        collection: &str,
        filter: &Document,
        update: &Document,
        options: UpdateOptions,
        multi: bool,
    ) -> Result<WriteAck> {
        validate_update(update)?;
        OpCounters::bump(&self.counters.update, 1);
        let mut collections = self.collections.write();
        let compiled = compile_query(collections.get(collection), filter)?;

        let mut targets: Vec<usize> = match collections.get(collection) {
            Some(coll) => {
                let ctx = coll.match_context();
                coll.documents
                    .iter()
                    .enumerate()
                    .filter(|(_, d)| compiled.matches(d, &ctx))
                    .map(|(i, _)| i)
                    .collect()
            }
            None => Vec::new(),
        };
        if !multi {
            targets.truncate(1);
        }

        if targets.is_empty() {
            if !options.upsert {
                return Ok(WriteAck::updated(0, 0, None));
            }
            check_name(collection)?;
            let mut doc = upsert_seed(filter)?;
            apply_update(&mut doc, update, true)?;
            let id = doc.entry(ID_FIELD).or_insert_with(generate_id).clone();
            let coll = collections.entry(collection.to_string()).or_default();
            coll.check_document(collection, &doc, None)?;
            coll.documents.push(doc);
            debug!(target: "labcheck::store", collection, "Upserted document");
            return Ok(WriteAck::updated(0, 0, Some(id)));
        }

        let Some(coll) = collections.get_mut(collection) else {
            return Ok(WriteAck::updated(0, 0, None));
        };
        let matched = targets.len() as u64;
        let mut originals: Vec<(usize, Document)> = Vec::new();
        for i in targets {
            let mut updated = coll.documents[i].clone();
            let outcome = apply_update(&mut updated, update, false)
                .and_then(|changed| {
                    if changed {
                        coll.check_document(collection, &updated, Some(i))?;
                    }
                    Ok(changed)
                });
            match outcome {
                Ok(true) => originals.push((i, std::mem::replace(&mut coll.documents[i], updated))),
                Ok(false) => {}
                Err(e) => {
                    for (i, original) in originals.into_iter().rev() {
                        coll.documents[i] = original;
                    }
                    return Err(e);
                }
            }
        }
        let modified = originals.len() as u64;
        debug!(target: "labcheck::store", collection, matched, modified, "Updated documents");
        Ok(WriteAck::updated(matched, modified, None))
    }

    fn delete(&self, collection: &str, filter: &Document, multi: bool) -> Result<WriteAck> {
        OpCounters::bump(&self.counters.delete, 1);
        let mut collections = self.collections.write();
        let compiled = compile_query(collections.get(collection), filter)?;
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(WriteAck::deleted(0));
        };
        let ctx = coll.match_context();
        let deleted = if multi {
            let before = coll.documents.len();
            coll.documents.retain(|d| !compiled.matches(d, &ctx));
            before - coll.documents.len()
        } else {
            match coll.documents.iter().position(|d| compiled.matches(d, &ctx)) {
                Some(pos) => {
                    coll.documents.remove(pos);
                    1
                }
                None => 0,
            }
        };
        debug!(target: "labcheck::store", collection, deleted, "Deleted documents");
        Ok(WriteAck::deleted(deleted as u64))
    }

    fn matching(&self, collection: &str, filter: &Document) -> Result<(Filter, Vec<Document>, MatchContext)> {
        OpCounters::bump(&self.counters.query, 1);
        let collections = self.collections.read();
        let coll = collections.get(collection);
        let compiled = compile_query(coll, filter)?;
        let ctx = coll.map(Collection::match_context).unwrap_or_default();
        let hits = coll
            .map(|c| {
                c.documents
                    .iter()
                    .filter(|d| compiled.matches(d, &ctx))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok((compiled, hits, ctx))
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('$') || name.starts_with("system.") {
        return Err(Error::InvalidQuery(format!("Invalid collection name: '{}'", name)));
    }
    Ok(())
}

/// Compile a filter and check it has the indexes its operators need.
fn compile_query(coll: Option<&Collection>, filter: &Document) -> Result<Filter> {
    let compiled = Filter::compile(filter)?;
    if compiled.text_search().is_some()
        && coll.and_then(|c| c.match_context().text_fields).is_none()
    {
        return Err(Error::IndexNotFound("text index required for $text query".to_string()));
    }
    if let Some((path, _)) = compiled.near_clause() {
        let indexed = coll.map_or(false, |c| c.geo_fields().iter().any(|f| f == path));
        if !indexed {
            return Err(Error::IndexNotFound(
                "unable to find index for $geoNear query".to_string(),
            ));
        }
    }
    Ok(compiled)
}

/// Starting document for an upsert: the filter's plain equality fields.
fn upsert_seed(filter: &Document) -> Result<Document> {
    let mut doc = Document::new();
    for (key, value) in filter.iter().filter(|(k, _)| !k.starts_with('$')) {
        match value {
            Value::Object(map) if map.keys().any(|k| k.starts_with('$')) => {
                if let Some(eq) = map.get("$eq") {
                    set_path(&mut doc, key, eq.clone())?;
                }
            }
            other => set_path(&mut doc, key, other.clone())?,
        }
    }
    Ok(doc)
}

/// Remove `{ field: { $meta: "textScore" } }` entries, returning their names.
fn take_score_fields(spec: &mut Document) -> Vec<String> {
    let names: Vec<String> = spec
        .iter()
        .filter(|(_, v)| v.get("$meta").and_then(Value::as_str) == Some("textScore"))
        .map(|(k, _)| k.clone())
        .collect();
    for name in &names {
        spec.remove(name);
    }
    names
}

impl DocumentStore for MemoryStore {
    fn insert_one(&self, collection: &str, document: Document) -> Result<WriteAck> {
        self.insert_many(collection, vec![document])
    }

    fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<WriteAck> {
        check_name(collection)?;
        if documents.is_empty() {
            return Err(Error::InvalidQuery(
                "Invalid BulkOperation, Batch cannot be empty".to_string(),
            ));
        }
        OpCounters::bump(&self.counters.insert, documents.len() as u64);

        let mut collections = self.collections.write();
        let coll = collections.entry(collection.to_string()).or_default();
        let before = coll.documents.len();
        let mut ids = Vec::with_capacity(documents.len());
        for mut doc in documents {
            let id = doc.entry(ID_FIELD).or_insert_with(generate_id).clone();
            let checked = if id.is_array() {
                Err(Error::InvalidQuery("can't use an array for _id".to_string()))
            } else {
                coll.check_document(collection, &doc, None)
            };
            if let Err(e) = checked {
                coll.documents.truncate(before);
                return Err(e);
            }
            coll.documents.push(doc);
            ids.push(id);
        }
        debug!(target: "labcheck::store", collection, inserted = ids.len(), "Inserted documents");
        Ok(WriteAck::inserted(ids))
    }

    fn find(&self, collection: &str, filter: &Document, options: FindOptions) -> Result<Cursor> {
        let (compiled, mut hits, ctx) = self.matching(collection, filter)?;
        let mut sort = options.sort.clone();
        let mut projection = options.projection.clone();
        let sort_by_score = sort.as_mut().map(take_score_fields).unwrap_or_default();
        let projected_scores = projection.as_mut().map(take_score_fields).unwrap_or_default();

        let text = compiled.text_search().zip(ctx.text_fields.as_ref());
        if text.is_none() && !(sort_by_score.is_empty() && projected_scores.is_empty()) {
            return Err(Error::InvalidQuery(
                "query requires text score metadata, but it is not available".to_string(),
            ));
        }

        match (&sort, compiled.near_clause()) {
            (Some(spec), _) if !spec.is_empty() => sort_documents(&mut hits, spec)?,
            (None, Some((path, near))) => {
                let distance = |d: &Document| {
                    get_path(d, path)
                        .and_then(|v| near.distance(v))
                        .unwrap_or(f64::INFINITY)
                };
                hits.sort_by(|a, b| distance(a).total_cmp(&distance(b)));
            }
            _ => {}
        }
        if let (Some((search, fields)), false) = (text, sort_by_score.is_empty()) {
            hits.sort_by(|a, b| search.score(b, fields).total_cmp(&search.score(a, fields)));
        }

        let skip = options.skip.unwrap_or(0);
        let limit = options.limit.filter(|n| *n > 0).unwrap_or(usize::MAX);
        let documents = hits
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|doc| {
                let mut out = match &projection {
                    Some(spec) if !spec.is_empty() => apply_projection(&doc, spec)?,
                    _ => doc.clone(),
                };
                if let Some((search, fields)) = text {
                    for name in &projected_scores {
                        out.insert(name.clone(), float_value(search.score(&doc, fields)));
                    }
                }
                Ok(out)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Cursor::new(documents))
    }

    fn count_documents(&self, collection: &str, filter: &Document) -> Result<u64> {
        let (_, hits, _) = self.matching(collection, filter)?;
        Ok(hits.len() as u64)
    }

    fn distinct(&self, collection: &str, field: &str, filter: &Document) -> Result<Vec<Value>> {
        let (_, hits, _) = self.matching(collection, filter)?;
        let mut values: Vec<Value> = Vec::new();
        let mut push = |v: &Value| {
            if !values.iter().any(|existing| values_equal(existing, v)) {
                values.push(v.clone());
            }
        };
        for doc in &hits {
            for value in lookup_path(doc, field) {
                match value {
                    Value::Array(items) => items.iter().for_each(&mut push),
                    other => push(other),
                }
            }
        }
        values.sort_by(compare_values);
        Ok(values)
    }

    fn update_one(
        &self,
        collection: &str,
        filter: &Document,
        update: &Document,
        options: UpdateOptions,
    ) -> Result<WriteAck> {
        self.update(collection, filter, update, options, false)
    }

    fn update_many(
        &self,
        collection: &str,
        filter: &Document,
        update: &Document,
        options: UpdateOptions,
    ) -> Result<WriteAck> {
        self.update(collection, filter, update, options, true)
    }

    fn delete_one(&self, collection: &str, filter: &Document) -> Result<WriteAck> {
        self.delete(collection, filter, false)
    }

    fn delete_many(&self, collection: &str, filter: &Document) -> Result<WriteAck> {
        self.delete(collection, filter, true)
    }

    fn aggregate(&self, collection: &str, pipeline: &[Document]) -> Result<Vec<Document>> {
        OpCounters::bump(&self.counters.command, 1);
        let collections = self.collections.read();
        let coll = collections.get(collection);
        let lookup = |name: &str| {
            collections
                .get(name)
                .map(|c| c.documents.clone())
                .unwrap_or_default()
        };
        let ctx = PipelineContext {
            match_ctx: coll.map(Collection::match_context).unwrap_or_default(),
            geo_fields: coll.map(Collection::geo_fields).unwrap_or_default(),
            lookup: &lookup,
        };
        let documents = coll.map(|c| c.documents.clone()).unwrap_or_default();
        run_pipeline(documents, pipeline, &ctx)
    }

    fn create_collection(&self, collection: &str) -> Result<WriteAck> {
        check_name(collection)?;
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default();
        Ok(WriteAck::acknowledged())
    }

    fn create_index(&self, collection: &str, spec: IndexSpec) -> Result<String> {
        check_name(collection)?;
        let name = spec.resolved_name()?;
        if name == ID_INDEX {
            return Ok(name);
        }

        let mut collections = self.collections.write();
        let coll = collections.entry(collection.to_string()).or_default();
        let existing = coll
            .indexes
            .iter()
            .find(|i| i.resolved_name().ok().as_deref() == Some(name.as_str()));
        if let Some(existing) = existing {
            if existing.keys == spec.keys && existing.unique == spec.unique {
                return Ok(name);
            }
            return Err(Error::InvalidQuery(format!(
                "An existing index has the same name as the requested index but different options: {}",
                name
            )));
        }
        if spec.has_kind(IndexKind::Text) && coll.indexes.iter().any(|i| i.has_kind(IndexKind::Text)) {
            return Err(Error::InvalidQuery(
                "only one text index per collection allowed".to_string(),
            ));
        }

        coll.indexes.push(spec);
        for i in 0..coll.documents.len() {
            if let Err(e) = coll.check_document(collection, &coll.documents[i], Some(i)) {
                coll.indexes.pop();
                return Err(e);
            }
        }
        info!(target: "labcheck::store", collection, index = %name, "Index created");
        Ok(name)
    }

    fn list_indexes(&self, collection: &str) -> Result<Vec<Document>> {
        let collections = self.collections.read();
        let coll = collections
            .get(collection)
            .ok_or_else(|| Error::InvalidQuery(format!("ns does not exist: {}", collection)))?;

        let describe = |keys: Document, name: String, unique: bool| {
            let mut doc = Document::new();
            doc.insert("v".to_string(), Value::from(2));
            doc.insert("key".to_string(), Value::Object(keys));
            doc.insert("name".to_string(), Value::from(name));
            if unique {
                doc.insert("unique".to_string(), Value::Bool(true));
            }
            doc
        };
        let mut id_key = Document::new();
        id_key.insert(ID_FIELD.to_string(), Value::from(1));
        let mut out = vec![describe(id_key, ID_INDEX.to_string(), false)];
        for index in &coll.indexes {
            out.push(describe(index.keys.clone(), index.resolved_name()?, index.unique));
        }
        Ok(out)
    }

    fn drop_index(&self, collection: &str, name: &str) -> Result<()> {
        if name == ID_INDEX {
            return Err(Error::InvalidQuery("cannot drop _id index".to_string()));
        }
        let mut collections = self.collections.write();
        let coll = collections
            .get_mut(collection)
            .ok_or_else(|| Error::InvalidQuery(format!("ns does not exist: {}", collection)))?;
        let before = coll.indexes.len();
        coll.indexes
            .retain(|i| i.resolved_name().ok().as_deref() != Some(name));
        if coll.indexes.len() == before {
            return Err(Error::IndexNotFound(format!(
                "index not found with name [{}]",
                name
            )));
        }
        info!(target: "labcheck::store", collection, index = name, "Index dropped");
        Ok(())
    }

    fn drop_collection(&self, collection: &str) -> Result<bool> {
        let existed = self.collections.write().remove(collection).is_some();
        if existed {
            debug!(target: "labcheck::store", collection, "Collection dropped");
        }
        Ok(existed)
    }

    fn list_collections(&self) -> Result<Vec<String>> {
        Ok(self.collections.read().keys().cloned().collect())
    }

    fn run_command(&self, command: &Document) -> Result<Document> {
        OpCounters::bump(&self.counters.command, 1);
        self.admin_command(command)
    }

    fn with_transaction(
        &self,
        body: &mut dyn FnMut(&dyn DocumentStore) -> Result<Output>,
    ) -> Result<Output> {
        if self.in_transaction.swap(true, Ordering::SeqCst) {
            return Err(Error::Transaction(
                "Transaction already in progress on this store".to_string(),
            ));
        }
        let guard = TransactionGuard {
            store: self,
            snapshot: Some(self.collections.read().clone()),
        };
        debug!(target: "labcheck::store", "Transaction started");

        match body(self) {
            Ok(output) => {
                guard.commit();
                debug!(target: "labcheck::store", "Transaction committed");
                Ok(output)
            }
            Err(e) => {
                drop(guard);
                warn!(target: "labcheck::store", error = %e, "Transaction rolled back");
                Err(Error::Transaction(e.to_string()))
            }
        }
    }
}

/// Restores the pre-transaction state unless committed, including on panic.
struct TransactionGuard<'a> {
    store: &'a MemoryStore,
    snapshot: Option<BTreeMap<String, Collection>>,
}

impl TransactionGuard<'_> {
    fn commit(mut self) {
        self.snapshot = None;
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.store.collections.write() = snapshot;
        }
        self.store.in_transaction.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labcheck_core::into_document;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        into_document(value).unwrap()
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_many(
                "products",
                vec![
                    doc(json!({"_id": 1, "name": "Espresso Beans", "price": 14.5, "tags": ["coffee"]})),
                    doc(json!({"_id": 2, "name": "Green Tea", "price": 6, "tags": ["tea"]})),
                    doc(json!({"_id": 3, "name": "Cold Brew Coffee", "price": 4.25, "tags": ["coffee", "cold"]})),
                ],
            )
            .unwrap();
        store
    }

    #[test]
    fn test_insert_generates_id() {
        let store = MemoryStore::new();
        let ack = store.insert_one("stores", doc(json!({"name": "Uptown"}))).unwrap();
        assert_eq!(ack.inserted_count, 1);
        let id = ack.inserted_ids[&0].as_str().unwrap();
        assert_eq!(id.len(), 24);
    }

    #[test]
    fn test_insert_many_is_all_or_nothing() {
        let store = seeded();
        let err = store
            .insert_many("products", vec![doc(json!({"_id": 10})), doc(json!({"_id": 1}))])
            .unwrap_err();
        assert!(err.to_string().starts_with("E11000 duplicate key error"));
        assert_eq!(store.count_documents("products", &Document::new()).unwrap(), 3);
    }

    #[test]
    fn test_find_sort_skip_limit_projection() {
        let store = seeded();
        let options = FindOptions::new()
            .sort(doc(json!({"price": -1})))
            .skip(1)
            .limit(1)
            .projection(doc(json!({"name": 1, "_id": 0})));
        let found: Vec<Document> = store.find("products", &Document::new(), options).unwrap().collect();
        assert_eq!(found, vec![doc(json!({"name": "Green Tea"}))]);
    }

    #[test]
    fn test_compound_sort_follows_key_order() {
        let store = MemoryStore::new();
        store
            .insert_many(
                "items",
                vec![
                    doc(json!({"_id": 1, "price": 5, "name": "b"})),
                    doc(json!({"_id": 2, "price": 1, "name": "a"})),
                    doc(json!({"_id": 3, "price": 9, "name": "a"})),
                ],
            )
            .unwrap();
        let sort = doc(json!({"price": -1, "name": 1}));
        assert_eq!(sort.keys().collect::<Vec<_>>(), vec!["price", "name"]);

        let ids: Vec<Value> = store
            .find("items", &Document::new(), FindOptions::new().sort(sort.clone()))
            .unwrap()
            .map(|d| d["_id"].clone())
            .collect();
        assert_eq!(ids, vec![json!(3), json!(1), json!(2)]);

        let pipeline = vec![doc(json!({"$sort": {"name": 1, "price": -1}}))];
        let ids: Vec<Value> = store
            .aggregate("items", &pipeline)
            .unwrap()
            .into_iter()
            .map(|d| d["_id"].clone())
            .collect();
        assert_eq!(ids, vec![json!(3), json!(2), json!(1)]);
    }

    #[test]
    fn test_find_one_and_missing_collection() {
        let store = seeded();
        assert!(store.find_one("products", &doc(json!({"price": {"$lt": 5}}))).unwrap().is_some());
        assert!(store.find_one("nothing", &Document::new()).unwrap().is_none());
    }

    #[test]
    fn test_update_many_counts() {
        let store = seeded();
        let ack = store
            .update_many(
                "products",
                &doc(json!({"tags": "coffee"})),
                &doc(json!({"$inc": {"price": 1}})),
                UpdateOptions::default(),
            )
            .unwrap();
        assert_eq!((ack.matched_count, ack.modified_count), (2, 2));
    }

    #[test]
    fn test_update_without_change_is_not_modified() {
        let store = seeded();
        let ack = store
            .update_one(
                "products",
                &doc(json!({"_id": 2})),
                &doc(json!({"$set": {"price": 6}})),
                UpdateOptions::default(),
            )
            .unwrap();
        assert_eq!((ack.matched_count, ack.modified_count), (1, 0));
    }

    #[test]
    fn test_upsert_inserts_from_filter() {
        let store = seeded();
        let ack = store
            .update_one(
                "products",
                &doc(json!({"sku": "X-1"})),
                &doc(json!({"$set": {"price": 3}})),
                UpdateOptions::upsert(),
            )
            .unwrap();
        assert!(ack.upserted_id.is_some());
        let found = store.find_one("products", &doc(json!({"sku": "X-1"}))).unwrap().unwrap();
        assert_eq!(found["price"], json!(3));
    }

    #[test]
    fn test_update_rejects_plain_document() {
        let store = seeded();
        let err = store
            .update_one("products", &Document::new(), &doc(json!({"price": 1})), UpdateOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUpdate(_)));
    }

    #[test]
    fn test_delete_one_and_many() {
        let store = seeded();
        assert_eq!(store.delete_one("products", &doc(json!({"tags": "coffee"}))).unwrap().deleted_count, 1);
        assert_eq!(store.delete_many("products", &Document::new()).unwrap().deleted_count, 2);
    }

    #[test]
    fn test_unique_index_enforced_on_create_and_insert() {
        let store = seeded();
        store
            .insert_one("products", doc(json!({"_id": 4, "name": "Green Tea"})))
            .unwrap();
        assert!(store
            .create_index("products", IndexSpec::single("name", IndexKind::Ascending).unique())
            .is_err());
        store.delete_one("products", &doc(json!({"_id": 4}))).unwrap();
        let name = store
            .create_index("products", IndexSpec::single("name", IndexKind::Ascending).unique())
            .unwrap();
        assert_eq!(name, "name_1");
        let err = store
            .insert_one("products", doc(json!({"name": "Green Tea"})))
            .unwrap_err();
        assert!(err.to_string().contains("index: name_1"));
    }

    #[test]
    fn test_list_and_drop_indexes() {
        let store = seeded();
        store
            .create_index("products", IndexSpec::single("price", IndexKind::Ascending))
            .unwrap();
        let indexes = store.list_indexes("products").unwrap();
        assert_eq!(indexes.len(), 2);
        assert_eq!(indexes[0]["name"], json!("_id_"));
        store.drop_index("products", "price_1").unwrap();
        assert!(matches!(store.drop_index("products", "price_1"), Err(Error::IndexNotFound(_))));
        assert!(store.drop_index("products", "_id_").is_err());
    }

    #[test]
    fn test_text_search_requires_index() {
        let store = seeded();
        let filter = doc(json!({"$text": {"$search": "coffee"}}));
        assert!(matches!(store.count_documents("products", &filter), Err(Error::IndexNotFound(_))));
        store
            .create_index("products", IndexSpec::single("name", IndexKind::Text))
            .unwrap();
        assert_eq!(store.count_documents("products", &filter).unwrap(), 1);
    }

    #[test]
    fn test_text_score_projection_and_sort() {
        let store = seeded();
        store
            .create_index("products", IndexSpec::new(doc(json!({"name": "text", "tags": "text"}))))
            .unwrap();
        let options = FindOptions::new()
            .projection(doc(json!({"score": {"$meta": "textScore"}, "name": 1})))
            .sort(doc(json!({"score": {"$meta": "textScore"}})));
        let found: Vec<Document> = store
            .find("products", &doc(json!({"$text": {"$search": "coffee"}})), options)
            .unwrap()
            .collect();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0]["name"], json!("Cold Brew Coffee"));
        assert!(found[0]["score"].as_f64().unwrap() >= found[1]["score"].as_f64().unwrap());
    }

    #[test]
    fn test_near_requires_geo_index_and_sorts() {
        let store = MemoryStore::new();
        store
            .insert_many(
                "stores",
                vec![
                    doc(json!({"_id": "dallas", "location": {"type": "Point", "coordinates": [-96.80, 32.78]}})),
                    doc(json!({"_id": "austin", "location": {"type": "Point", "coordinates": [-97.74, 30.27]}})),
                ],
            )
            .unwrap();
        let filter = doc(json!({"location": {"$near": {
            "$geometry": {"type": "Point", "coordinates": [-97.7, 30.3]},
            "$maxDistance": 500000
        }}}));
        assert!(matches!(
            store.find("stores", &filter, FindOptions::default()),
            Err(Error::IndexNotFound(_))
        ));
        store
            .create_index("stores", IndexSpec::single("location", IndexKind::Geo2dSphere))
            .unwrap();
        let found: Vec<Document> = store.find("stores", &filter, FindOptions::default()).unwrap().collect();
        assert_eq!(found[0]["_id"], json!("austin"));
    }

    #[test]
    fn test_geo_index_rejects_bad_geometry() {
        let store = MemoryStore::new();
        store
            .create_index("stores", IndexSpec::single("location", IndexKind::Geo2dSphere))
            .unwrap();
        let err = store
            .insert_one("stores", doc(json!({"location": {"type": "Point", "coordinates": [500, 0]}})))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidGeometry(_)));
    }

    #[test]
    fn test_distinct_flattens_arrays() {
        let store = seeded();
        let tags = store.distinct("products", "tags", &Document::new()).unwrap();
        assert_eq!(tags, vec![json!("coffee"), json!("cold"), json!("tea")]);
    }

    #[test]
    fn test_aggregate_with_lookup() {
        let store = seeded();
        store
            .insert_one("orders", doc(json!({"_id": 100, "product_id": 2, "qty": 3})))
            .unwrap();
        let out = store
            .aggregate(
                "orders",
                &[doc(json!({"$lookup": {
                    "from": "products", "localField": "product_id", "foreignField": "_id", "as": "product"
                }}))],
            )
            .unwrap();
        assert_eq!(out[0]["product"][0]["name"], json!("Green Tea"));
    }

    #[test]
    fn test_transaction_commits() {
        let store = seeded();
        store
            .with_transaction(&mut |s| {
                s.delete_one("products", &doc(json!({"_id": 1})))?;
                Ok(Output::Unit)
            })
            .unwrap();
        assert_eq!(store.count_documents("products", &Document::new()).unwrap(), 2);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let store = seeded();
        let err = store
            .with_transaction(&mut |s| {
                s.delete_many("products", &Document::new())?;
                s.insert_one("products", doc(json!({"_id": 1})))?;
                s.insert_one("products", doc(json!({"_id": 1})))?;
                Ok(Output::Unit)
            })
            .unwrap_err();
        assert!(err.to_string().starts_with("Transaction aborted: E11000"));
        assert_eq!(store.count_documents("products", &Document::new()).unwrap(), 3);
    }

    #[test]
    fn test_transactions_do_not_nest() {
        let store = seeded();
        let err = store
            .with_transaction(&mut |s| s.with_transaction(&mut |_| Ok(Output::Unit)))
            .unwrap_err();
        assert!(matches!(err, Error::Transaction(_)));
        // The flag is released afterwards
        assert!(store.with_transaction(&mut |_| Ok(Output::Unit)).is_ok());
    }

    #[test]
    fn test_transaction_rolls_back_on_panic() {
        let store = seeded();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = store.with_transaction(&mut |s| {
                s.delete_many("products", &Document::new())?;
                panic!("boom");
            });
        }));
        assert!(result.is_err());
        assert_eq!(store.count_documents("products", &Document::new()).unwrap(), 3);
    }

    #[test]
    fn test_flush_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        {
            let store = MemoryStore::open(&path).unwrap();
            store.insert_one("stores", doc(json!({"_id": 1}))).unwrap();
            store
                .create_index("stores", IndexSpec::single("name", IndexKind::Ascending))
                .unwrap();
            store.flush().unwrap();
        }
        let reopened = MemoryStore::open(&path).unwrap();
        assert_eq!(reopened.count_documents("stores", &Document::new()).unwrap(), 1);
        assert_eq!(reopened.list_indexes("stores").unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_collection_name() {
        let store = MemoryStore::new();
        assert!(store.insert_one("bad$name", Document::new()).is_err());
        assert!(store.create_collection("").is_err());
    }
}
