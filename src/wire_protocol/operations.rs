//! Legacy write messages and the getLastError replies they produce.
use bson::{Bson, Document};
use crate::coll::batch::BatchableSource;
use crate::common::{bson_to_i64, Namespace, WriteConcern};
use crate::wire_protocol::flags::{OpDeleteFlags, OpInsertFlags, OpUpdateFlags};

/// An OP_INSERT message, optionally followed by getLastError.
#[derive(Clone, Debug, PartialEq)]
pub struct InsertMessage {
    pub namespace: Namespace,
    pub write_concern: WriteConcern,
    /// The documents to be inserted.
    pub documents: BatchableSource<Document>,
    pub max_batch_count: Option<usize>,
    pub max_message_size: Option<usize>,
    /// A bit vector of insert options.
    pub flags: OpInsertFlags,
    pub send_get_last_error: bool,
}

/// An OP_UPDATE message, optionally followed by getLastError.
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateMessage {
    pub namespace: Namespace,
    pub write_concern: WriteConcern,
    /// Identifies the document(s) to be updated.
    pub filter: Document,
    /// Instruction document for how to update the document(s).
    pub update: Document,
    /// A bit vector of update options.
    pub flags: OpUpdateFlags,
    pub send_get_last_error: bool,
}

/// An OP_DELETE message, optionally followed by getLastError.
#[derive(Clone, Debug, PartialEq)]
pub struct DeleteMessage {
    pub namespace: Namespace,
    pub write_concern: WriteConcern,
    /// Identifies the document(s) to be removed.
    pub filter: Document,
    pub flags: OpDeleteFlags,
    pub send_get_last_error: bool,
}

/// The reply to getLastError after a legacy write.
#[derive(Clone, Debug, PartialEq)]
pub struct WriteConcernResult {
    pub response: Document,
}

impl WriteConcernResult {
    pub fn new(response: Document) -> WriteConcernResult {
        WriteConcernResult { response: response }
    }

    /// The number of documents the write affected.
    pub fn n(&self) -> i64 {
        self.response.get("n").and_then(bson_to_i64).unwrap_or(0)
    }

    pub fn updated_existing(&self) -> bool {
        match self.response.get("updatedExisting") {
            Some(&Bson::Boolean(updated)) => updated,
            _ => false,
        }
    }

    /// The `_id` of the document an upsert inserted, if reported.
    pub fn upserted(&self) -> Option<&Bson> {
        self.response.get("upserted")
    }

    pub fn last_error_message(&self) -> Option<&str> {
        match self.response.get("err") {
            Some(&Bson::String(ref message)) => Some(message.as_str()),
            _ => None,
        }
    }

    /// Whether the write failed. A null `err` means success.
    pub fn has_last_error_message(&self) -> bool {
        match self.response.get("err") {
            None | Some(&Bson::Null) => false,
            Some(_) => true,
        }
    }

    pub fn code(&self) -> Option<i32> {
        self.response.get("code").and_then(bson_to_i64).map(|code| code as i32)
    }

    /// Whether the failure was in satisfying the write concern rather than in
    /// applying the write.
    pub fn is_write_concern_failure(&self) -> bool {
        let timed_out = match self.response.get("wtimeout") {
            Some(&Bson::Boolean(timed_out)) => timed_out,
            Some(value) => bson_to_i64(value).map_or(false, |n| n != 0),
            None => false,
        };

        timed_out || self.response.contains_key("wnote") || self.response.contains_key("jnote")
    }
}
