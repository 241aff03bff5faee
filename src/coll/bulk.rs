//! Bulk writes mixing inserts, updates and deletes.
use bson::{Bson, Document};
use futures::executor::block_on;
use tracing::debug;

use crate::{Error, Result};
use crate::binding::{Channel, WriteBinding};
use crate::cancel::CancellationToken;
use crate::common::{Namespace, WriteConcern};
use crate::operation::run_command;
use crate::wire_protocol::flags::OpQueryFlags;

use super::batch::{WriteRequest, WriteRequestType};
use super::emulator::{validate_requests, BulkWriteEmulator};
use super::index_map::IndexMap;
use super::options::BulkWriteOptions;
use super::results::{combine_batch_results, BatchResult, BulkWriteResult};

use std::cmp;

/// Requests of a single kind sent together, with their positions in the
/// caller's request list.
#[derive(Debug)]
struct Batch {
    request_type: WriteRequestType,
    requests: Vec<WriteRequest>,
    index_map: IndexMap,
}

impl Batch {
    fn new(request_type: WriteRequestType) -> Batch {
        Batch {
            request_type: request_type,
            requests: Vec::new(),
            index_map: IndexMap::new(),
        }
    }

    fn push(&mut self, original_index: usize, request: WriteRequest) {
        let index = self.requests.len();
        let index_map = ::std::mem::replace(&mut self.index_map, IndexMap::new());
        self.index_map = index_map.add(index, original_index);
        self.requests.push(request);
    }

    fn len(&self) -> usize {
        self.requests.len()
    }
}

/// Consecutive requests of the same kind form a batch, so batches run in the
/// order the requests were given.
fn find_ordered_batches(requests: Vec<WriteRequest>, max_batch_count: usize) -> Vec<Batch> {
    let mut batches: Vec<Batch> = Vec::new();

    for (original_index, request) in requests.into_iter().enumerate() {
        let request_type = request.request_type();
        let starts_batch = match batches.last() {
            Some(batch) => batch.request_type != request_type || batch.len() >= max_batch_count,
            None => true,
        };

        if starts_batch {
            batches.push(Batch::new(request_type));
        }

        if let Some(batch) = batches.last_mut() {
            batch.push(original_index, request);
        }
    }

    batches
}

/// Requests are grouped by kind regardless of their order.
fn find_unordered_batches(requests: Vec<WriteRequest>, max_batch_count: usize) -> Vec<Batch> {
    let mut batches = Vec::new();
    let mut open = [
        Batch::new(WriteRequestType::Insert),
        Batch::new(WriteRequestType::Update),
        Batch::new(WriteRequestType::Delete),
    ];

    for (original_index, request) in requests.into_iter().enumerate() {
        let slot = match request.request_type() {
            WriteRequestType::Insert => 0,
            WriteRequestType::Update => 1,
            WriteRequestType::Delete => 2,
        };

        open[slot].push(original_index, request);

        if open[slot].len() >= max_batch_count {
            let request_type = open[slot].request_type;
            batches.push(::std::mem::replace(&mut open[slot], Batch::new(request_type)));
        }
    }

    for batch in open.iter_mut() {
        if batch.len() > 0 {
            let request_type = batch.request_type;
            batches.push(::std::mem::replace(batch, Batch::new(request_type)));
        }
    }

    batches
}

/// Executes a list of write requests of any kind, using the native write
/// commands when the server supports them and legacy emulation otherwise.
#[derive(Clone, Debug)]
pub struct BulkMixedWriteOperation {
    namespace: Namespace,
    requests: Vec<WriteRequest>,
    options: BulkWriteOptions,
}

impl BulkMixedWriteOperation {
    /// Creates the operation.
    ///
    /// # Arguments
    ///
    /// `namespace` - The collection the requests write to.
    /// `requests` - The write requests, in the order they were given.
    /// `options` - Ordering, write concern and batching limits.
    ///
    /// # Return value
    ///
    /// Returns the operation, or an `ArgumentError` if no requests were given.
    pub fn new(namespace: Namespace,
               requests: Vec<WriteRequest>,
               options: BulkWriteOptions)
               -> Result<BulkMixedWriteOperation> {
        if requests.is_empty() {
            return Err(Error::ArgumentError(String::from(
                "A bulk write requires at least one request.")));
        }

        Ok(BulkMixedWriteOperation {
            namespace: namespace,
            requests: requests,
            options: options,
        })
    }

    pub fn execute(self, binding: &dyn WriteBinding, cancel: &CancellationToken) -> Result<BulkWriteResult> {
        block_on(self.execute_async(binding, cancel))
    }

    pub async fn execute_async(self,
                               binding: &dyn WriteBinding,
                               cancel: &CancellationToken)
                               -> Result<BulkWriteResult> {
        let source = cancel.guard(binding.write_channel_source(cancel)).await?;
        let channel = cancel.guard(source.channel(cancel)).await?;

        let connection = channel.connection_description().clone();
        let max_batch_count = match self.options.max_batch_count {
            Some(count) if count > 0 => cmp::min(count, connection.max_batch_count),
            _ => connection.max_batch_count,
        };

        let BulkMixedWriteOperation { namespace, mut requests, options } = self;
        for (index, request) in requests.iter_mut().enumerate() {
            if request.correlation_id().is_none() {
                request.set_correlation_id(Some(index));
            }
        }

        let request_count = requests.len();
        let batches = if options.ordered {
            find_ordered_batches(requests, max_batch_count)
        } else {
            find_unordered_batches(requests, max_batch_count)
        };

        let native = connection.supports_write_commands();
        if !native {
            for batch in &batches {
                validate_requests(&batch.requests)?;
            }
        }

        let batch_count = batches.len();
        let mut batch_results = Vec::new();
        let mut remaining_requests = Vec::new();
        let mut batches = batches.into_iter().enumerate();

        while let Some((position, batch)) = batches.next() {
            let is_last_batch = position + 1 == batch_count;
            debug!(namespace = %namespace,
                   request_type = ?batch.request_type,
                   count = batch.len(),
                   native,
                   "executing write batch");

            let results = if native {
                vec![execute_command_batch(&*channel, &namespace, &options, batch, is_last_batch, cancel).await?]
            } else {
                BulkWriteEmulator::for_batch(namespace.clone(),
                                             batch.requests,
                                             &options,
                                             batch.index_map,
                                             is_last_batch)
                    .execute_batch(&*channel, cancel)
                    .await?
            };

            let interrupted = results.iter().any(|result| result.source.is_some());
            let failed = results.iter().any(|result| !result.write_errors.is_empty());
            batch_results.extend(results);

            if interrupted || (options.ordered && failed) {
                remaining_requests.extend(batches.by_ref().flat_map(|(_, batch)| batch.requests));
                break;
            }
        }

        combine_batch_results(batch_results,
                              request_count,
                              options.write_concern.is_acknowledged(),
                              remaining_requests)
    }
}

/// Sends one batch as an insert, update or delete command. Failures other than
/// cancellation are kept in the batch result so the partial result survives.
async fn execute_command_batch(channel: &dyn Channel,
                               namespace: &Namespace,
                               options: &BulkWriteOptions,
                               batch: Batch,
                               is_last_batch: bool,
                               cancel: &CancellationToken)
                               -> Result<BatchResult> {
    let write_concern = if options.ordered && !is_last_batch && !options.write_concern.is_acknowledged() {
        WriteConcern::new()
    } else {
        options.write_concern.clone()
    };

    let (command_name, payload_name) = match batch.request_type {
        WriteRequestType::Insert => ("insert", "documents"),
        WriteRequestType::Update => ("update", "updates"),
        WriteRequestType::Delete => ("delete", "deletes"),
    };

    let mut command = Document::new();
    command.insert(command_name, Bson::String(namespace.collection_name.clone()));
    command.insert("ordered", Bson::Boolean(options.ordered));
    command.insert("writeConcern", Bson::Document(write_concern.to_bson()));

    if let Some(bypass) = options.bypass_document_validation {
        command.insert("bypassDocumentValidation", Bson::Boolean(bypass));
    }

    let payload = batch.requests.iter().map(WriteRequest::to_command_element).collect();
    command.insert(payload_name, Bson::Array(payload));

    let reply = run_command(channel, &namespace.database_name, command, OpQueryFlags::empty(), cancel).await;

    match reply {
        Ok(reply) => {
            BatchResult::from_command_reply(batch.request_type,
                                            batch.requests,
                                            &reply,
                                            &batch.index_map,
                                            options.ordered)
        }
        Err(Error::Cancelled) => Err(Error::Cancelled),
        Err(error) => {
            let mut result = BatchResult::new(batch.request_type);
            result.source = Some(error);
            result.unprocessed_requests = batch.requests;
            Ok(result)
        }
    }
}
