//! Reduce a store [`Output`] to a result count.

use labcheck_core::{Output, WriteAck};

/// Normalized result count of an operation's output.
///
/// Sequences count their elements (a cursor is drained). Write
/// acknowledgements count the first non-zero of inserted, modified and
/// deleted, then the inserted identifiers, then 1 for a bare
/// acknowledgement. Single values count 1 when present.
pub fn result_count(output: Output) -> u64 {
    match output {
        Output::Cursor(cursor) => cursor.count() as u64,
        Output::Documents(docs) => docs.len() as u64,
        Output::Values(values) => values.len() as u64,
        Output::WriteAck(ack) => write_count(&ack),
        Output::Count(n) => n,
        Output::Document(Some(_)) | Output::Bool(true) | Output::Status(_) | Output::Name(_) => 1,
        Output::Document(None) | Output::Bool(false) | Output::Unit => 0,
    }
}

fn write_count(ack: &WriteAck) -> u64 {
    [ack.inserted_count, ack.modified_count, ack.deleted_count]
        .into_iter()
        .find(|n| *n > 0)
        .or_else(|| Some(ack.inserted_ids.len() as u64).filter(|n| *n > 0))
        .unwrap_or(u64::from(ack.acknowledged))
}
