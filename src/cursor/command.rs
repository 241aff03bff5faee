//! The cursor described by a command reply.
use async_trait::async_trait;
use bson::{Bson, Document};
use futures::executor::block_on;
use serde::de::DeserializeOwned;
use serde_derive::Deserialize;
use tracing::{debug, warn};

use crate::{Error, Result};
use crate::binding::ChannelSource;
use crate::cancel::CancellationToken;
use crate::coll::options::CursorOptions;
use crate::common::{bson_to_i64, Namespace};
use crate::operation::run_command;
use crate::wire_protocol::flags::OpQueryFlags;

use super::BatchCursor;

use std::time::Duration;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KillCursorsReply {
    #[serde(default)]
    cursors_killed: Vec<i64>,
    #[serde(default)]
    cursors_not_found: Vec<i64>,
}

/// Maintains a server-side cursor and lazily returns its batches.
///
/// The first batch comes from the reply that created the cursor; later batches
/// are fetched with `getMore`. The cursor holds its channel source until the
/// server reports the cursor exhausted, or until it is closed or disposed.
pub struct CommandCursor<T> {
    channel_source: Option<Box<dyn ChannelSource>>,
    namespace: Namespace,
    cursor_id: i64,
    first_batch: Option<Vec<T>>,
    batch_size: i32,
    /// An upper bound on the total number of documents; 0 for no bound.
    limit: i32,
    single_batch: bool,
    max_time: Option<Duration>,
    slave_ok: bool,
    /// How many documents have been returned so far.
    count: i64,
    disposed: bool,
}

// Reads `{id, ns, <batch_field>}` out of the `cursor` document of a reply.
fn parse_cursor(reply: &Document, batch_field: &str) -> Result<(i64, Option<String>, Vec<Bson>)> {
    let cursor = match reply.get("cursor") {
        Some(&Bson::Document(ref cursor)) => cursor,
        _ => return Err(Error::ResponseError(format!("Reply does not describe a cursor: {:?}", reply))),
    };

    let id = cursor.get("id").and_then(bson_to_i64).ok_or_else(|| {
        Error::ResponseError(String::from("Cursor document does not contain an id."))
    })?;

    let namespace = match cursor.get("ns") {
        Some(&Bson::String(ref ns)) => Some(ns.to_owned()),
        _ => None,
    };

    match cursor.get(batch_field) {
        Some(&Bson::Array(ref batch)) => Ok((id, namespace, batch.clone())),
        _ => Err(Error::ResponseError(format!("Cursor document does not contain {}.", batch_field))),
    }
}

impl<T: DeserializeOwned + Send> CommandCursor<T> {
    /// Builds a cursor from the reply to a cursor-returning command.
    ///
    /// # Arguments
    ///
    /// `channel_source` - The source the command ran on; `getMore` and
    ///                    `killCursors` must go to the same server.
    /// `namespace` - Used when the reply does not name the cursor's namespace.
    /// `reply` - The command reply, containing `cursor: {id, ns, firstBatch}`.
    /// `options` - Batch size, limit and `getMore` time limit.
    /// `slave_ok` - Whether `getMore` may be answered by a secondary.
    pub fn from_reply(channel_source: Box<dyn ChannelSource>,
                      namespace: &Namespace,
                      reply: Document,
                      options: &CursorOptions,
                      slave_ok: bool)
                      -> Result<CommandCursor<T>> {
        let (cursor_id, ns, first_batch) = parse_cursor(&reply, "firstBatch")?;

        let namespace = match ns {
            Some(ns) => ns.parse()?,
            None => namespace.clone(),
        };

        let mut cursor = CommandCursor {
            channel_source: Some(channel_source),
            namespace: namespace,
            cursor_id: cursor_id,
            first_batch: None,
            batch_size: options.batch_size,
            limit: options.limit.saturating_abs(),
            single_batch: options.limit < 0,
            max_time: options.max_time,
            slave_ok: slave_ok,
            count: 0,
            disposed: false,
        };

        cursor.first_batch = Some(Self::deserialize_batch(first_batch)?);

        if cursor_id == 0 {
            cursor.release_channel_source();
        }

        Ok(cursor)
    }

    pub fn cursor_id(&self) -> i64 {
        self.cursor_id
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Whether the cursor still holds its channel source.
    pub fn holds_channel_source(&self) -> bool {
        self.channel_source.is_some()
    }

    fn deserialize_batch(batch: Vec<Bson>) -> Result<Vec<T>> {
        batch.into_iter()
            .map(|document| bson::from_bson(document).map_err(Error::from))
            .collect()
    }

    fn release_channel_source(&mut self) {
        if self.channel_source.take().is_some() {
            debug!(namespace = %self.namespace, "cursor released its channel source");
        }
    }

    fn limit_reached(&self) -> bool {
        self.limit > 0 && self.count >= i64::from(self.limit)
    }

    // Truncates a batch so the total returned never exceeds the limit.
    fn save_batch(&mut self, mut batch: Vec<T>) -> Vec<T> {
        if self.limit > 0 {
            let remaining = (i64::from(self.limit) - self.count).max(0) as usize;
            batch.truncate(remaining);
        }
        self.count += batch.len() as i64;
        batch
    }

    // Requests at most the number of documents left before the limit.
    fn get_more_batch_size(&self) -> i32 {
        if self.limit > 0 {
            // Never negative and never above the limit.
            let remaining = (i64::from(self.limit) - self.count).max(0) as i32;
            if self.batch_size == 0 || remaining < self.batch_size {
                return remaining;
            }
        }
        self.batch_size
    }

    fn get_more_command(&self) -> Document {
        let mut command = Document::new();
        command.insert("getMore", Bson::I64(self.cursor_id));
        command.insert("collection", Bson::String(self.namespace.collection_name.clone()));

        let batch_size = self.get_more_batch_size();
        if batch_size != 0 {
            command.insert("batchSize", Bson::I32(batch_size));
        }

        if let Some(max_time) = self.max_time {
            command.insert("maxTimeMS", Bson::I64(max_time.as_millis() as i64));
        }

        command
    }

    async fn get_more(&mut self, cancel: &CancellationToken) -> Result<Vec<T>> {
        let reply = {
            let channel_source = self.channel_source.as_ref().ok_or_else(|| {
                Error::InvalidState(String::from("The cursor no longer holds a channel source."))
            })?;
            let channel = cancel.guard(channel_source.channel(cancel)).await?;

            debug!(namespace = %self.namespace, cursor_id = self.cursor_id, "fetching next batch");
            run_command(&*channel,
                        &self.namespace.database_name,
                        self.get_more_command(),
                        OpQueryFlags::with_slave_ok(self.slave_ok),
                        cancel).await?
        };

        let (cursor_id, _, batch) = parse_cursor(&reply, "nextBatch")?;
        self.cursor_id = cursor_id;

        if cursor_id == 0 {
            self.release_channel_source();
        }

        Self::deserialize_batch(batch)
    }

    async fn kill_cursor(&mut self, cancel: &CancellationToken) -> Result<()> {
        let cursor_id = self.cursor_id;

        let reply = {
            let channel_source = match self.channel_source.as_ref() {
                Some(channel_source) => channel_source,
                None => return Ok(()),
            };
            let channel = cancel.guard(channel_source.channel(cancel)).await?;

            let mut command = Document::new();
            command.insert("killCursors", Bson::String(self.namespace.collection_name.clone()));
            command.insert("cursors", Bson::Array(vec![Bson::I64(cursor_id)]));

            run_command(&*channel,
                        &self.namespace.database_name,
                        command,
                        OpQueryFlags::with_slave_ok(self.slave_ok),
                        cancel).await?
        };

        self.cursor_id = 0;
        self.release_channel_source();

        let reply: KillCursorsReply = bson::from_bson(Bson::Document(reply))?;
        if reply.cursors_not_found.contains(&cursor_id) {
            return Err(Error::CursorNotFoundError(cursor_id));
        }

        if !reply.cursors_killed.contains(&cursor_id) {
            warn!(cursor_id, "server did not report the cursor as killed");
        }

        Ok(())
    }

    /// Kills the server-side cursor if it is still open, then disposes it.
    pub fn close(&mut self, cancel: &CancellationToken) -> Result<()> {
        block_on(self.close_async(cancel))
    }

    pub async fn close_async(&mut self, cancel: &CancellationToken) -> Result<()> {
        let result = if self.cursor_id != 0 && !self.disposed {
            self.kill_cursor(cancel).await
        } else {
            Ok(())
        };

        self.dispose();
        result
    }
}

#[async_trait]
impl<T: DeserializeOwned + Send> BatchCursor for CommandCursor<T> {
    type Item = T;

    async fn try_next_batch(&mut self, cancel: &CancellationToken) -> Result<Option<Vec<T>>> {
        if self.disposed {
            return Err(Error::Disposed("CommandCursor"));
        }

        if let Some(batch) = self.first_batch.take() {
            return Ok(Some(self.save_batch(batch)));
        }

        if self.cursor_id == 0 {
            return Ok(None);
        }

        if self.single_batch || self.limit_reached() {
            if let Err(error) = self.kill_cursor(cancel).await {
                if error.is_cancelled() {
                    return Err(error);
                }
                warn!(%error, "failed to kill cursor after its limit was reached");
                self.release_channel_source();
            }
            return Ok(None);
        }

        let batch = self.get_more(cancel).await?;
        Ok(Some(self.save_batch(batch)))
    }

    fn dispose(&mut self) {
        if !self.disposed {
            self.disposed = true;
            self.first_batch = None;
            self.release_channel_source();
        }
    }
}
