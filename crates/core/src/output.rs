//! Output enum for store operation results.
//!
//! Every store operation produces exactly one output kind. Lab steps wrap the
//! typed return value of the store call in an [`Output`] so the runner can
//! normalize it to a result count without guessing at its shape.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::document::{Document, Value};

/// Result of a single store operation, tagged by operation kind.
///
/// # Example
///
/// ```ignore
/// use labcheck_core::Output;
///
/// let output = Output::Cursor(store.find("stores", filter, FindOptions::default())?);
/// ```
#[derive(Debug)]
pub enum Output {
    /// No return value (drop, transaction bodies with nothing to report)
    Unit,

    /// Lazily consumed query result (`find`)
    Cursor(Cursor),

    /// Materialized list of documents (`aggregate`, `list_indexes`)
    Documents(Vec<Document>),

    /// Materialized list of scalar values (`distinct`, `list_collections`)
    Values(Vec<Value>),

    /// Optional single document (`find_one`)
    Document(Option<Document>),

    /// Write acknowledgement (insert/update/delete)
    WriteAck(WriteAck),

    /// Plain count (`count_documents`)
    Count(u64),

    /// Boolean result (`drop_collection`)
    Bool(bool),

    /// Administrative command reply (`ping`, `serverStatus`, ...)
    Status(Document),

    /// Name returned by a schema operation (`create_index`)
    Name(String),
}

/// Acknowledgement returned by write operations.
///
/// Only the counters relevant to the write kind are non-zero: inserts fill
/// `inserted_count` and `inserted_ids`, updates fill `matched_count` and
/// `modified_count`, deletes fill `deleted_count`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteAck {
    /// Whether the store accepted the write
    pub acknowledged: bool,
    /// Number of documents inserted
    pub inserted_count: u64,
    /// Number of documents matched by an update filter
    pub matched_count: u64,
    /// Number of documents actually changed by an update
    pub modified_count: u64,
    /// Number of documents removed
    pub deleted_count: u64,
    /// Identifier of a document created by an upsert
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upserted_id: Option<Value>,
    /// Identifiers of inserted documents, keyed by input position
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inserted_ids: BTreeMap<usize, Value>,
}

impl WriteAck {
    /// Acknowledgement for a successful insert of the given identifiers.
    pub fn inserted(ids: Vec<Value>) -> Self {
        WriteAck {
            acknowledged: true,
            inserted_count: ids.len() as u64,
            inserted_ids: ids.into_iter().enumerate().collect(),
            ..Default::default()
        }
    }

    /// Acknowledgement for a schema-only operation (collection or index creation).
    pub fn acknowledged() -> Self {
        WriteAck {
            acknowledged: true,
            ..Default::default()
        }
    }

    /// Acknowledgement for an update.
    pub fn updated(matched: u64, modified: u64, upserted_id: Option<Value>) -> Self {
        WriteAck {
            acknowledged: true,
            matched_count: matched,
            modified_count: modified,
            upserted_id,
            ..Default::default()
        }
    }

    /// Acknowledgement for a delete.
    pub fn deleted(count: u64) -> Self {
        WriteAck {
            acknowledged: true,
            deleted_count: count,
            ..Default::default()
        }
    }
}

/// A lazily consumed sequence of query results.
///
/// Documents are handed out one at a time; counting a cursor drains it.
#[derive(Debug, Default)]
pub struct Cursor {
    buffer: VecDeque<Document>,
}

impl Cursor {
    /// Wrap an already-evaluated result batch.
    pub fn new(documents: Vec<Document>) -> Self {
        Cursor {
            buffer: documents.into(),
        }
    }

    /// Whether another document is available without consuming it.
    pub fn has_next(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Drain the cursor into a vector.
    pub fn into_vec(self) -> Vec<Document> {
        self.buffer.into()
    }
}

impl Iterator for Cursor {
    type Item = Document;

    fn next(&mut self) -> Option<Document> {
        self.buffer.pop_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.buffer.len(), Some(self.buffer.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inserted_ack_keys_by_position() {
        let ack = WriteAck::inserted(vec![json!("a"), json!("b")]);
        assert!(ack.acknowledged);
        assert_eq!(ack.inserted_count, 2);
        assert_eq!(ack.inserted_ids.get(&1), Some(&json!("b")));
    }

    #[test]
    fn test_cursor_drains_in_order() {
        let mut docs = Vec::new();
        for i in 0..3 {
            let mut d = Document::new();
            d.insert("n".into(), json!(i));
            docs.push(d);
        }
        let mut cursor = Cursor::new(docs);
        assert!(cursor.has_next());
        assert_eq!(cursor.next().unwrap()["n"], json!(0));
        assert_eq!(cursor.count(), 2);
    }

    #[test]
    fn test_write_ack_serializes_without_empty_ids() {
        let ack = WriteAck::deleted(4);
        let text = serde_json::to_string(&ack).unwrap();
        assert!(!text.contains("inserted_ids"));
        assert!(text.contains("\"deleted_count\":4"));
    }
}
