//! Results of bulk write operations.
use bson::{Bson, Document};
use crate::{Error, Result};
use crate::common::bson_to_i64;

use super::batch::{WriteRequest, WriteRequestType};
use super::error::{BulkWriteError, BulkWriteException, WriteConcernError};
use super::index_map::IndexMap;

/// A document inserted by an upsert, and the index of the request that inserted it.
#[derive(Clone, Debug, PartialEq)]
pub struct BulkWriteUpsert {
    pub index: usize,
    pub id: Bson,
}

/// Results for a bulk write operation.
#[derive(Clone, Debug, PartialEq)]
pub struct BulkWriteResult {
    pub acknowledged: bool,
    pub request_count: usize,
    pub inserted_count: i64,
    pub matched_count: i64,
    pub deleted_count: i64,
    /// Unavailable when any part of the write went through legacy opcodes.
    pub modified_count: Option<i64>,
    pub upserts: Vec<BulkWriteUpsert>,
    pub processed_requests: Vec<WriteRequest>,
}

impl BulkWriteUpsert {
    pub fn new(index: usize, id: Bson) -> BulkWriteUpsert {
        BulkWriteUpsert {
            index: index,
            id: id,
        }
    }

    /// Translates the index through `index_map`.
    pub fn with_mapped_index(self, index_map: &IndexMap) -> Result<BulkWriteUpsert> {
        match index_map.map(self.index) {
            Some(index) if index == self.index => Ok(self),
            Some(index) => Ok(BulkWriteUpsert::new(index, self.id)),
            None => Err(Error::OperationError(format!("No original index for upsert at {}.", self.index))),
        }
    }

    // Parses an element of the `upserted` array of an update command reply.
    fn parse(document: &Document) -> Result<BulkWriteUpsert> {
        match (document.get("index").and_then(bson_to_i64), document.get("_id")) {
            (Some(index), Some(id)) if index >= 0 => Ok(BulkWriteUpsert::new(index as usize, id.clone())),
            _ => Err(Error::ResponseError(format!("Upserted document is invalid: {:?}", document))),
        }
    }
}

impl BulkWriteResult {
    /// The result of a write the server did not acknowledge; no counts are known.
    pub fn unacknowledged(request_count: usize, processed_requests: Vec<WriteRequest>) -> BulkWriteResult {
        BulkWriteResult {
            acknowledged: false,
            request_count: request_count,
            inserted_count: 0,
            matched_count: 0,
            deleted_count: 0,
            modified_count: None,
            upserts: Vec::new(),
            processed_requests: processed_requests,
        }
    }

    pub fn upserted_count(&self) -> usize {
        self.upserts.len()
    }

    pub fn is_modified_count_available(&self) -> bool {
        self.modified_count.is_some()
    }
}

/// The outcome of one batch of same-kind requests, with every index already
/// translated to the caller's original indices.
#[derive(Debug)]
pub(crate) struct BatchResult {
    pub request_type: WriteRequestType,
    pub n: i64,
    pub modified_count: Option<i64>,
    pub upserts: Vec<BulkWriteUpsert>,
    pub write_errors: Vec<BulkWriteError>,
    pub write_concern_error: Option<WriteConcernError>,
    pub processed_requests: Vec<WriteRequest>,
    pub unprocessed_requests: Vec<WriteRequest>,
    /// A transport failure that interrupted the batch.
    pub source: Option<Error>,
}

impl BatchResult {
    pub fn new(request_type: WriteRequestType) -> BatchResult {
        BatchResult {
            request_type: request_type,
            n: 0,
            modified_count: None,
            upserts: Vec::new(),
            write_errors: Vec::new(),
            write_concern_error: None,
            processed_requests: Vec::new(),
            unprocessed_requests: Vec::new(),
            source: None,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.write_errors.is_empty() || self.write_concern_error.is_some() || self.source.is_some()
    }

    /// Interprets the reply to a native insert, update or delete command.
    ///
    /// In an ordered batch the server stops at the first write error, so every
    /// request after the highest failed index is unprocessed.
    pub fn from_command_reply(request_type: WriteRequestType,
                              requests: Vec<WriteRequest>,
                              reply: &Document,
                              index_map: &IndexMap,
                              ordered: bool)
                              -> Result<BatchResult> {
        let mut result = BatchResult::new(request_type);
        result.n = reply.get("n").and_then(bson_to_i64).unwrap_or(0);

        result.modified_count = match request_type {
            WriteRequestType::Update => reply.get("nModified").and_then(bson_to_i64),
            _ => Some(0),
        };

        if let Some(&Bson::Array(ref upserted)) = reply.get("upserted") {
            for element in upserted {
                if let Bson::Document(ref document) = *element {
                    result.upserts.push(BulkWriteUpsert::parse(document)?.with_mapped_index(index_map)?);
                }
            }
        }

        let mut max_error_index = None;
        if let Some(&Bson::Array(ref errors)) = reply.get("writeErrors") {
            for element in errors {
                match *element {
                    Bson::Document(ref document) => {
                        let error = BulkWriteError::parse(document)?;
                        max_error_index = max_error_index.max(Some(error.index));
                        result.write_errors.push(error.with_mapped_index(index_map)?);
                    }
                    _ => {
                        return Err(Error::ResponseError(
                            String::from("WriteError provided was not a bson document."),
                        ))
                    }
                }
            }
        }

        if let Some(&Bson::Document(ref error)) = reply.get("writeConcernError") {
            result.write_concern_error = Some(WriteConcernError::parse(error)?);
        }

        let mut requests = requests;
        if let (true, Some(index)) = (ordered, max_error_index) {
            let split = ::std::cmp::min(index + 1, requests.len());
            result.unprocessed_requests = requests.split_off(split);
        }
        result.processed_requests = requests;

        Ok(result)
    }
}

/// Merges batch results into the result of the whole bulk write.
pub(crate) fn combine_batch_results(batch_results: Vec<BatchResult>,
                                    request_count: usize,
                                    acknowledged: bool,
                                    remaining_requests: Vec<WriteRequest>)
                                    -> Result<BulkWriteResult> {
    let mut inserted_count = 0;
    let mut matched_count = 0;
    let mut deleted_count = 0;
    let mut modified_count = Some(0);
    let mut upserts = Vec::new();
    let mut write_errors = Vec::new();
    let mut write_concern_error = None;
    let mut processed_requests = Vec::new();
    let mut unprocessed_requests = Vec::new();
    let mut source = None;

    for batch_result in batch_results {
        match batch_result.request_type {
            WriteRequestType::Insert => inserted_count += batch_result.n,
            WriteRequestType::Update => matched_count += batch_result.n - batch_result.upserts.len() as i64,
            WriteRequestType::Delete => deleted_count += batch_result.n,
        }

        modified_count = match (modified_count, batch_result.modified_count) {
            (Some(total), Some(n)) => Some(total + n),
            _ => None,
        };

        upserts.extend(batch_result.upserts);
        write_errors.extend(batch_result.write_errors);
        processed_requests.extend(batch_result.processed_requests);
        unprocessed_requests.extend(batch_result.unprocessed_requests);

        if batch_result.write_concern_error.is_some() {
            write_concern_error = batch_result.write_concern_error;
        }

        if source.is_none() {
            source = batch_result.source;
        }
    }

    unprocessed_requests.extend(remaining_requests);
    upserts.sort_by_key(|upsert| upsert.index);
    write_errors.sort_by_key(|error| error.index);

    let result = if acknowledged {
        BulkWriteResult {
            acknowledged: true,
            request_count: request_count,
            inserted_count: inserted_count,
            matched_count: matched_count,
            deleted_count: deleted_count,
            modified_count: modified_count,
            upserts: upserts,
            processed_requests: processed_requests,
        }
    } else {
        BulkWriteResult::unacknowledged(request_count, processed_requests)
    };

    if write_errors.is_empty() && write_concern_error.is_none() && source.is_none() {
        Ok(result)
    } else {
        Err(Error::BulkWriteError(BulkWriteException::new(result,
                                                          write_errors,
                                                          write_concern_error,
                                                          unprocessed_requests,
                                                          source)))
    }
}
