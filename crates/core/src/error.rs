//! Error types for labcheck
//!
//! Every store, seeder and config failure is represented by [`Error`].
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! The `Display` text matters: the lab runner classifies failures by
//! inspecting the rendered message, so parse-style failures keep the
//! wording a document database shell would print.

use std::io;
use thiserror::Error;

/// Result type alias for labcheck operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the document store, seeder and configuration layer
#[derive(Debug, Error)]
pub enum Error {
    /// Insert or update produced a second document with the same `_id`
    /// (or the same value under a unique index)
    #[error("E11000 duplicate key error collection: {collection} index: {index} dup key: {key}")]
    DuplicateKey {
        /// Collection the write targeted
        collection: String,
        /// Name of the violated index
        index: String,
        /// Rendered duplicate key value
        key: String,
    },

    /// A document under a `2dsphere` index holds a malformed GeoJSON value
    #[error("Can't extract geo keys: {0}")]
    InvalidGeometry(String),

    /// A query needs an index that does not exist (e.g. `$near`, `$text`)
    #[error("{0}")]
    IndexNotFound(String),

    /// Malformed query filter
    #[error("{0}")]
    InvalidQuery(String),

    /// Malformed update document
    #[error("{0}")]
    InvalidUpdate(String),

    /// Malformed aggregation pipeline
    #[error("{0}")]
    InvalidPipeline(String),

    /// Administrative command not supported by the store
    #[error("no such command: '{0}'")]
    UnknownCommand(String),

    /// Transaction body failed and the store rolled back
    #[error("Transaction aborted: {0}")]
    Transaction(String),

    /// Command or write rejected by a database server, with the server's
    /// error code and message
    #[error("{message}")]
    Server {
        /// Server error code (e.g. 11000 for a duplicate key)
        code: i32,
        /// Message as reported by the server
        message: String,
    },

    /// The database server could not be reached
    #[error("Connection error: {0}")]
    Connection(String),

    /// I/O error (snapshot and config files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration file could not be parsed or holds an invalid value
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Build an [`Error::InvalidQuery`] for an operator the filter engine does not know.
    pub fn unknown_operator(op: &str) -> Self {
        Error::InvalidQuery(format!("unknown operator: {}", op))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_duplicate_key() {
        let err = Error::DuplicateKey {
            collection: "stores".to_string(),
            index: "_id_".to_string(),
            key: "{ _id: 1 }".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("E11000"));
        assert!(msg.contains("stores"));
        assert!(msg.contains("_id_"));
    }

    #[test]
    fn test_error_display_invalid_geometry() {
        let err = Error::InvalidGeometry("longitude out of bounds".to_string());
        assert!(err.to_string().starts_with("Can't extract geo keys"));
    }

    #[test]
    fn test_unknown_operator_wording() {
        let err = Error::unknown_operator("$regx");
        assert_eq!(err.to_string(), "unknown operator: $regx");
    }

    #[test]
    fn test_error_display_unknown_command() {
        let err = Error::UnknownCommand("frobnicate".to_string());
        assert_eq!(err.to_string(), "no such command: 'frobnicate'");
    }

    #[test]
    fn test_error_display_server_keeps_message() {
        let err = Error::Server {
            code: 2,
            message: "unknown operator: $gtt".to_string(),
        };
        assert_eq!(err.to_string(), "unknown operator: $gtt");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let result: Result<serde_json::Value> =
            serde_json::from_str("{not json").map_err(|e| e.into());
        assert!(matches!(result, Err(Error::Serialization(_))));
    }
}
