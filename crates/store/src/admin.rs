//! Administrative commands for [`MemoryStore`]
//!
//! The replies follow the shape of a document database's own command replies
//! closely enough for the administration lab: `ok: 1` plus the fields the lab
//! reads. The store is a single node, so `replSetGetStatus` reports a
//! one-member set whose only member is primary.

use std::sync::atomic::Ordering;

use chrono::Utc;
use serde_json::json;

use labcheck_core::{into_document, Document, Error, Result, Value};

use crate::memory::MemoryStore;

/// Version string reported by `buildInfo` and `serverStatus`.
pub const SERVER_VERSION: &str = concat!("labcheck-", env!("CARGO_PKG_VERSION"));

/// Replica set name reported by `replSetGetStatus` and `hello`.
pub const REPLICA_SET_NAME: &str = "rs0";

const DATABASE_NAME: &str = "labcheck";
const HOST: &str = "localhost:27017";

fn json_size(value: &impl serde::Serialize) -> u64 {
    serde_json::to_vec(value).map(|b| b.len() as u64).unwrap_or(0)
}

impl MemoryStore {
    pub(crate) fn admin_command(&self, command: &Document) -> Result<Document> {
        let (name, arg) = command
            .iter()
            .next()
            .ok_or_else(|| Error::UnknownCommand(String::new()))?;

        let reply = match name.as_str() {
            "ping" => json!({}),
            "buildInfo" | "buildinfo" => json!({
                "version": SERVER_VERSION,
                "storageEngines": ["memory"],
            }),
            "hello" | "isMaster" | "ismaster" => json!({
                "isWritablePrimary": true,
                "ismaster": true,
                "setName": REPLICA_SET_NAME,
                "hosts": [HOST],
                "primary": HOST,
                "localTime": Utc::now().to_rfc3339(),
            }),
            "serverStatus" => self.server_status(),
            "replSetGetStatus" => json!({
                "set": REPLICA_SET_NAME,
                "date": Utc::now().to_rfc3339(),
                "myState": 1,
                "members": [{
                    "_id": 0,
                    "name": HOST,
                    "health": 1,
                    "state": 1,
                    "stateStr": "PRIMARY",
                    "uptime": self.uptime_secs(),
                    "self": true,
                }],
            }),
            "dbStats" => self.db_stats(),
            "collStats" => {
                let collection = arg.as_str().ok_or_else(|| {
                    Error::InvalidQuery("collStats requires a collection name".to_string())
                })?;
                self.coll_stats(collection)?
            }
            "listCollections" => {
                let names: Vec<Value> = self.read().keys().map(|n| json!({"name": n, "type": "collection"})).collect();
                json!({ "cursor": { "firstBatch": names } })
            }
            other => return Err(Error::UnknownCommand(other.to_string())),
        };

        let mut reply = into_document(reply)?;
        reply.insert("ok".to_string(), Value::from(1));
        Ok(reply)
    }

    fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }

    fn server_status(&self) -> Value {
        let counter = |c: &std::sync::atomic::AtomicU64| c.load(Ordering::Relaxed);
        json!({
            "host": HOST,
            "version": SERVER_VERSION,
            "process": "labcheck",
            "uptime": self.uptime_secs(),
            "localTime": Utc::now().to_rfc3339(),
            "connections": { "current": 1, "available": 0 },
            "opcounters": {
                "insert": counter(&self.counters.insert),
                "query": counter(&self.counters.query),
                "update": counter(&self.counters.update),
                "delete": counter(&self.counters.delete),
                "command": counter(&self.counters.command),
            },
            "storageEngine": {
                "name": "memory",
                "persistent": self.is_persistent(),
            },
        })
    }

    fn db_stats(&self) -> Value {
        let collections = self.read();
        let objects: usize = collections.values().map(|c| c.documents.len()).sum();
        let indexes: usize = collections.values().map(|c| c.indexes.len() + 1).sum();
        let data_size: u64 = collections
            .values()
            .flat_map(|c| c.documents.iter())
            .map(json_size)
            .sum();
        json!({
            "db": DATABASE_NAME,
            "collections": collections.len(),
            "objects": objects,
            "indexes": indexes,
            "dataSize": data_size,
        })
    }

    fn coll_stats(&self, collection: &str) -> Result<Value> {
        let collections = self.read();
        let coll = collections.get(collection).ok_or_else(|| {
            Error::InvalidQuery(format!(
                "Collection [{}.{}] not found.",
                DATABASE_NAME, collection
            ))
        })?;
        let size: u64 = coll.documents.iter().map(json_size).sum();
        let count = coll.documents.len() as u64;
        Ok(json!({
            "ns": format!("{}.{}", DATABASE_NAME, collection),
            "count": count,
            "size": size,
            "avgObjSize": if count == 0 { 0 } else { size / count },
            "nindexes": coll.indexes.len() + 1,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocumentStore;

    fn command(value: Value) -> Document {
        into_document(value).unwrap()
    }

    #[test]
    fn test_ping() {
        let store = MemoryStore::new();
        let reply = store.run_command(&command(json!({"ping": 1}))).unwrap();
        assert_eq!(reply["ok"], json!(1));
    }

    #[test]
    fn test_server_status_counts_operations() {
        let store = MemoryStore::new();
        store.insert_one("a", Document::new()).unwrap();
        store.count_documents("a", &Document::new()).unwrap();
        let reply = store.run_command(&command(json!({"serverStatus": 1}))).unwrap();
        assert_eq!(reply["opcounters"]["insert"], json!(1));
        assert_eq!(reply["opcounters"]["query"], json!(1));
        assert_eq!(reply["storageEngine"]["persistent"], json!(false));
    }

    #[test]
    fn test_repl_set_status_single_primary() {
        let store = MemoryStore::new();
        let reply = store.run_command(&command(json!({"replSetGetStatus": 1}))).unwrap();
        assert_eq!(reply["set"], json!("rs0"));
        assert_eq!(reply["members"][0]["stateStr"], json!("PRIMARY"));
    }

    #[test]
    fn test_db_and_coll_stats() {
        let store = MemoryStore::new();
        store.insert_one("a", command(json!({"_id": 1, "x": "y"}))).unwrap();
        let db = store.run_command(&command(json!({"dbStats": 1}))).unwrap();
        assert_eq!(db["objects"], json!(1));
        assert_eq!(db["indexes"], json!(1));
        let coll = store.run_command(&command(json!({"collStats": "a"}))).unwrap();
        assert_eq!(coll["count"], json!(1));
        assert!(coll["size"].as_u64().unwrap() > 0);
        assert!(store.run_command(&command(json!({"collStats": "missing"}))).is_err());
    }

    #[test]
    fn test_unknown_command() {
        let store = MemoryStore::new();
        let err = store.run_command(&command(json!({"shutdown": 1}))).unwrap_err();
        assert_eq!(err.to_string(), "no such command: 'shutdown'");
    }
}
