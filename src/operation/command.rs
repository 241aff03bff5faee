//! Read, write and cursor-returning command operations.
use bson::{Bson, Document};
use futures::executor::block_on;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::{Error, Result};
use crate::binding::{ReadBinding, WriteBinding};
use crate::cancel::CancellationToken;
use crate::coll::error::WriteConcernError;
use crate::coll::options::CursorOptions;
use crate::common::{Namespace, ReadPreference};
use crate::cursor::CommandCursor;
use crate::error::WriteConcernException;
use crate::wire_protocol::flags::OpQueryFlags;

use super::query::first_batch_size;
use super::{deserialize_reply, run_command, run_read_command};

use std::marker::PhantomData;

/// Runs a command on a server chosen by the binding's read preference.
#[derive(Clone, Debug)]
pub struct ReadCommandOperation<T> {
    database_name: String,
    command: Document,
    reply: PhantomData<fn() -> T>,
}

/// Runs a command on the primary and checks its reply for write concern errors.
#[derive(Clone, Debug)]
pub struct WriteCommandOperation<T> {
    database_name: String,
    command: Document,
    reply: PhantomData<fn() -> T>,
}

/// Runs a read command whose reply describes a cursor, such as `aggregate`
/// or `listCollections`, and returns that cursor.
#[derive(Clone, Debug)]
pub struct CursorCommandOperation<T> {
    namespace: Namespace,
    command: Document,
    options: CursorOptions,
    item: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> ReadCommandOperation<T> {
    pub fn new(database_name: &str, command: Document) -> ReadCommandOperation<T> {
        ReadCommandOperation {
            database_name: String::from(database_name),
            command: command,
            reply: PhantomData,
        }
    }

    pub fn command(&self) -> &Document {
        &self.command
    }

    pub fn execute(&self, binding: &dyn ReadBinding, cancel: &CancellationToken) -> Result<T> {
        block_on(self.execute_async(binding, cancel))
    }

    pub async fn execute_async(&self, binding: &dyn ReadBinding, cancel: &CancellationToken) -> Result<T> {
        let channel_source = cancel.guard(binding.read_channel_source(cancel)).await?;
        let channel = cancel.guard(channel_source.channel(cancel)).await?;

        let reply = run_read_command(&*channel_source,
                                     &*channel,
                                     &self.database_name,
                                     self.command.clone(),
                                     binding.read_preference(),
                                     cancel).await?;

        deserialize_reply(reply)
    }
}

impl<T: DeserializeOwned> WriteCommandOperation<T> {
    pub fn new(database_name: &str, command: Document) -> WriteCommandOperation<T> {
        WriteCommandOperation {
            database_name: String::from(database_name),
            command: command,
            reply: PhantomData,
        }
    }

    pub fn execute(&self, binding: &dyn WriteBinding, cancel: &CancellationToken) -> Result<T> {
        block_on(self.execute_async(binding, cancel))
    }

    /// Runs the command with a primary read preference.
    ///
    /// # Return value
    ///
    /// Returns the deserialized reply, `Error::CommandError` if the command
    /// failed, or `Error::WriteConcernError` if the write was applied but the
    /// write concern was not satisfied.
    pub async fn execute_async(&self, binding: &dyn WriteBinding, cancel: &CancellationToken) -> Result<T> {
        let channel_source = cancel.guard(binding.write_channel_source(cancel)).await?;
        let channel = cancel.guard(channel_source.channel(cancel)).await?;

        let flags = OpQueryFlags::with_slave_ok(ReadPreference::primary().slave_ok());
        let reply = run_command(&*channel, &self.database_name, self.command.clone(), flags, cancel).await?;

        let write_concern_error = match reply.get("writeConcernError") {
            Some(&Bson::Document(ref error)) => Some(WriteConcernError::parse(error)?),
            _ => None,
        };

        if let Some(write_concern_error) = write_concern_error {
            warn!(database = %self.database_name,
                  code = write_concern_error.code,
                  "write concern error: {}",
                  write_concern_error.message);
            return Err(Error::WriteConcernError(WriteConcernException::new(write_concern_error, reply)));
        }

        deserialize_reply(reply)
    }
}

impl<T: DeserializeOwned + Send> CursorCommandOperation<T> {
    /// Creates the operation. `namespace` names the collection later `getMore`
    /// commands are sent for when the reply does not name one.
    pub fn new(namespace: Namespace, command: Document, options: CursorOptions) -> CursorCommandOperation<T> {
        CursorCommandOperation {
            namespace: namespace,
            command: command,
            options: options,
            item: PhantomData,
        }
    }

    // Requests the first batch size unless the command already specifies a cursor.
    fn command_with_cursor(&self) -> Document {
        let mut command = self.command.clone();

        if !command.contains_key("cursor") {
            let mut cursor = Document::new();
            let batch_size = first_batch_size(self.options.limit, self.options.batch_size);
            if batch_size != 0 {
                cursor.insert("batchSize", Bson::I32(batch_size.saturating_abs()));
            }
            command.insert("cursor", Bson::Document(cursor));
        }

        command
    }

    pub fn execute(&self, binding: &dyn ReadBinding, cancel: &CancellationToken) -> Result<CommandCursor<T>> {
        block_on(self.execute_async(binding, cancel))
    }

    /// Runs the command and returns a cursor over its results. The cursor owns
    /// the channel source until it is exhausted, closed or disposed.
    pub async fn execute_async(&self,
                               binding: &dyn ReadBinding,
                               cancel: &CancellationToken)
                               -> Result<CommandCursor<T>> {
        let channel_source = cancel.guard(binding.read_channel_source(cancel)).await?;
        let read_preference = binding.read_preference();

        let reply = {
            let channel = cancel.guard(channel_source.channel(cancel)).await?;
            run_read_command(&*channel_source,
                             &*channel,
                             &self.namespace.database_name,
                             self.command_with_cursor(),
                             read_preference,
                             cancel).await?
        };

        let slave_ok = read_preference.map_or(false, ReadPreference::slave_ok);
        CommandCursor::from_reply(channel_source, &self.namespace, reply, &self.options, slave_ok)
    }
}
