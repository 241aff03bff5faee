//! Bulk writes against servers without the insert, update and delete commands.
//!
//! Each request is sent as its own legacy message followed by getLastError, and
//! the replies are folded back into the same result a native write command
//! would have produced.
use bson::Bson;
use futures::executor::block_on;
use tracing::{debug, warn};

use crate::{Error, Result};
use crate::binding::Channel;
use crate::cancel::CancellationToken;
use crate::common::{Namespace, WriteConcern};
use crate::wire_protocol::flags::{OpDeleteFlags, OpInsertFlags, OpUpdateFlags};
use crate::wire_protocol::operations::{DeleteMessage, InsertMessage, UpdateMessage,
                                       WriteConcernResult};

use super::batch::{BatchableSource, UpdateRequest, WriteRequest};
use super::error::{BulkWriteError, WriteConcernError};
use super::index_map::IndexMap;
use super::options::BulkWriteOptions;
use super::results::{combine_batch_results, BatchResult, BulkWriteResult, BulkWriteUpsert};

use std::mem;

/// Executes write requests one legacy message at a time.
#[derive(Clone, Debug)]
pub struct BulkWriteEmulator {
    namespace: Namespace,
    requests: Vec<WriteRequest>,
    ordered: bool,
    write_concern: WriteConcern,
    max_batch_count: Option<usize>,
    max_message_size: Option<usize>,
    index_map: IndexMap,
    is_last_batch: bool,
}

/// Rejects requests that legacy messages cannot express.
pub(crate) fn validate_requests(requests: &[WriteRequest]) -> Result<()> {
    for request in requests {
        match *request {
            WriteRequest::Insert(_) => (),
            WriteRequest::Update(ref update) => {
                if update.collation.is_some() {
                    return Err(Error::NotSupported(String::from(
                        "The server does not support collations.")));
                }
                if update.array_filters.is_some() {
                    return Err(Error::NotSupported(String::from(
                        "The server does not support arrayFilters.")));
                }
            }
            WriteRequest::Delete(ref delete) => {
                if delete.collation.is_some() {
                    return Err(Error::NotSupported(String::from(
                        "The server does not support collations.")));
                }
            }
        }
    }
    Ok(())
}

// The `_id` of the document a legacy upsert inserted. Old servers only report
// `upserted` for generated ids, so otherwise it is recovered from the request.
fn legacy_upserted_id(request: &UpdateRequest, result: &WriteConcernResult) -> Option<Bson> {
    if let Some(id) = result.upserted() {
        return Some(id.clone());
    }

    if request.upsert && !result.updated_existing() && result.n() == 1 {
        request.update.get("_id").or_else(|| request.filter.get("_id")).cloned()
    } else {
        None
    }
}

impl BulkWriteEmulator {
    pub fn new(namespace: Namespace,
               requests: Vec<WriteRequest>,
               options: &BulkWriteOptions)
               -> BulkWriteEmulator {
        BulkWriteEmulator {
            namespace: namespace,
            requests: requests,
            ordered: options.ordered,
            write_concern: options.write_concern.clone(),
            max_batch_count: options.max_batch_count,
            max_message_size: options.max_batch_length,
            index_map: IndexMap::identity(),
            is_last_batch: true,
        }
    }

    /// An emulator for one batch of a larger bulk write. `index_map` translates
    /// positions in `requests` to positions in the whole bulk write.
    pub(crate) fn for_batch(namespace: Namespace,
                            requests: Vec<WriteRequest>,
                            options: &BulkWriteOptions,
                            index_map: IndexMap,
                            is_last_batch: bool)
                            -> BulkWriteEmulator {
        BulkWriteEmulator {
            index_map: index_map,
            is_last_batch: is_last_batch,
            ..BulkWriteEmulator::new(namespace, requests, options)
        }
    }

    /// Runs every request and blocks until the bulk write completes.
    pub fn execute(self, channel: &dyn Channel, cancel: &CancellationToken) -> Result<BulkWriteResult> {
        block_on(self.execute_async(channel, cancel))
    }

    /// Runs every request.
    ///
    /// # Return value
    ///
    /// Returns the combined result, or `Error::BulkWriteError` carrying the
    /// partial result when any request failed.
    pub async fn execute_async(self,
                               channel: &dyn Channel,
                               cancel: &CancellationToken)
                               -> Result<BulkWriteResult> {
        let request_count = self.requests.len();
        let acknowledged = self.write_concern.is_acknowledged();
        let batch_results = self.execute_batch(channel, cancel).await?;
        combine_batch_results(batch_results, request_count, acknowledged, Vec::new())
    }

    /// Runs the requests, returning one result per attempted request. Only
    /// validation failures and cancellation are returned as errors.
    pub(crate) async fn execute_batch(mut self,
                                      channel: &dyn Channel,
                                      cancel: &CancellationToken)
                                      -> Result<Vec<BatchResult>> {
        validate_requests(&self.requests)?;

        let requests = mem::replace(&mut self.requests, Vec::new());
        let request_count = requests.len();
        let mut results = Vec::with_capacity(request_count);
        let mut requests = requests.into_iter().enumerate();

        while let Some((index, request)) = requests.next() {
            let original_index = self.index_map.map(index).ok_or_else(|| {
                Error::OperationError(format!("No original index for request at {}.", index))
            })?;

            let is_last = self.is_last_batch && index + 1 == request_count;
            let write_concern = self.effective_write_concern(is_last);
            let mut result = BatchResult::new(request.request_type());

            match self.send(channel, &request, write_concern, cancel).await {
                Ok(reply) => {
                    self.record(&mut result, &request, original_index, reply);
                    result.processed_requests.push(request);
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(error) => {
                    debug!(index = original_index, %error, "emulated write failed, halting");
                    result.source = Some(error);
                    result.unprocessed_requests.push(request);
                }
            }

            let halt = result.source.is_some() || (self.ordered && result.has_errors());
            if halt {
                result.unprocessed_requests.extend(requests.by_ref().map(|(_, request)| request));
                results.push(result);
                break;
            }

            results.push(result);
        }

        Ok(results)
    }

    // An ordered bulk write acknowledges every request but the last.
    fn effective_write_concern(&self, is_last: bool) -> WriteConcern {
        if self.ordered && !is_last && !self.write_concern.is_acknowledged() {
            WriteConcern::new()
        } else {
            self.write_concern.clone()
        }
    }

    async fn send(&self,
                  channel: &dyn Channel,
                  request: &WriteRequest,
                  write_concern: WriteConcern,
                  cancel: &CancellationToken)
                  -> Result<Option<WriteConcernResult>> {
        let send_get_last_error = write_concern.is_acknowledged();
        debug!(namespace = %self.namespace, request_type = ?request.request_type(), "emulating write");

        match *request {
            WriteRequest::Insert(ref insert) => {
                let mut flags = OpInsertFlags::empty();
                if !self.ordered {
                    flags.insert(OpInsertFlags::CONTINUE_ON_ERROR);
                }

                let message = InsertMessage {
                    namespace: self.namespace.clone(),
                    write_concern: write_concern,
                    documents: BatchableSource::single(insert.document.clone()),
                    max_batch_count: self.max_batch_count,
                    max_message_size: self.max_message_size,
                    flags: flags,
                    send_get_last_error: send_get_last_error,
                };

                cancel.guard(channel.insert(message, cancel)).await
            }
            WriteRequest::Update(ref update) => {
                let message = UpdateMessage {
                    namespace: self.namespace.clone(),
                    write_concern: write_concern,
                    filter: update.filter.clone(),
                    update: update.update.clone(),
                    flags: OpUpdateFlags::with_update(update.upsert, update.multi),
                    send_get_last_error: send_get_last_error,
                };

                cancel.guard(channel.update(message, cancel)).await
            }
            WriteRequest::Delete(ref delete) => {
                let flags = if delete.limit == 1 {
                    OpDeleteFlags::SINGLE_REMOVE
                } else {
                    OpDeleteFlags::empty()
                };

                let message = DeleteMessage {
                    namespace: self.namespace.clone(),
                    write_concern: write_concern,
                    filter: delete.filter.clone(),
                    flags: flags,
                    send_get_last_error: send_get_last_error,
                };

                cancel.guard(channel.delete(message, cancel)).await
            }
        }
    }

    // Folds a getLastError reply into the result for one request.
    fn record(&self,
              result: &mut BatchResult,
              request: &WriteRequest,
              original_index: usize,
              reply: Option<WriteConcernResult>) {
        let reply = match reply {
            Some(reply) => reply,
            None => return,
        };

        if reply.has_last_error_message() && !reply.is_write_concern_failure() {
            result.write_errors.push(BulkWriteError::from_get_last_error(original_index, &reply));
            return;
        }

        if reply.has_last_error_message() {
            let error = WriteConcernError::from_get_last_error(&reply);
            warn!(index = original_index, code = error.code, "write concern error: {}", error.message);
            result.write_concern_error = Some(error);
        }

        result.n = match *request {
            WriteRequest::Insert(_) => 1,
            _ => reply.n(),
        };

        if let WriteRequest::Update(ref update) = *request {
            if let Some(id) = legacy_upserted_id(update, &reply) {
                result.upserts.push(BulkWriteUpsert::new(original_index, id));
            }
        }
    }
}
