//! Options for collection-level operations.
use bson::{Bson, Document};
use crate::common::WriteConcern;

use std::time::Duration;

/// Options for bulk write operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BulkWriteOptions {
    /// Stop at the first failed request.
    pub ordered: bool,
    pub write_concern: WriteConcern,
    /// Caps the number of requests per batch below the server's limit.
    pub max_batch_count: Option<usize>,
    /// Caps the encoded size of a batch below the server's limit.
    pub max_batch_length: Option<usize>,
    pub bypass_document_validation: Option<bool>,
}

impl BulkWriteOptions {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn unordered() -> Self {
        BulkWriteOptions { ordered: false, ..Default::default() }
    }
}

impl Default for BulkWriteOptions {
    fn default() -> Self {
        BulkWriteOptions {
            ordered: true,
            write_concern: WriteConcern::new(),
            max_batch_count: None,
            max_batch_length: None,
            bypass_document_validation: None,
        }
    }
}

/// Options for cursors created by read commands.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CursorOptions {
    /// The number of documents per batch; 0 lets the server choose.
    pub batch_size: i32,
    /// The maximum number of documents to return; 0 means no limit, and a
    /// negative value requests a single batch of that many documents.
    pub limit: i32,
    /// Server-side time limit for each `getMore`.
    pub max_time: Option<Duration>,
}

impl CursorOptions {
    pub fn new() -> Self {
        Default::default()
    }
}

impl From<CursorOptions> for Document {
    fn from(options: CursorOptions) -> Self {
        let mut document = Document::new();

        if options.batch_size != 0 {
            document.insert("batchSize", Bson::I32(options.batch_size));
        }

        if let Some(max_time) = options.max_time {
            document.insert("maxTimeMS", Bson::I64(max_time.as_millis() as i64));
        }

        document
    }
}
