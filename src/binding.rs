//! The transport collaborators an operation runs against.
//!
//! A binding resolves to a `ChannelSource` (a selected server), which in turn
//! hands out `Channel`s (checked-out connections). Both are owned handles: the
//! implementation returns them to its pool when they are dropped, so an
//! operation releases whatever it acquired on every exit path.
use async_trait::async_trait;
use bson::Document;

use crate::Result;
use crate::cancel::CancellationToken;
use crate::common::ReadPreference;
use crate::topology::{ConnectionDescription, ServerDescription};
use crate::wire_protocol::flags::OpQueryFlags;
use crate::wire_protocol::operations::{DeleteMessage, InsertMessage, UpdateMessage,
                                       WriteConcernResult};

/// A connection that sends a request and receives its correlated reply.
#[async_trait]
pub trait Channel: Send + Sync {
    fn connection_description(&self) -> &ConnectionDescription;

    /// Runs a command against `database` and returns the raw reply. Command
    /// failures (`ok: 0`) are returned as replies, not errors.
    async fn command(&self,
                     database: &str,
                     command: Document,
                     flags: OpQueryFlags,
                     cancel: &CancellationToken)
                     -> Result<Document>;

    /// Sends a legacy insert. Returns the getLastError reply when one was
    /// requested, and `None` for unacknowledged writes. A failed write is
    /// reported through the reply's `err` field.
    async fn insert(&self,
                    message: InsertMessage,
                    cancel: &CancellationToken)
                    -> Result<Option<WriteConcernResult>>;

    async fn update(&self,
                    message: UpdateMessage,
                    cancel: &CancellationToken)
                    -> Result<Option<WriteConcernResult>>;

    async fn delete(&self,
                    message: DeleteMessage,
                    cancel: &CancellationToken)
                    -> Result<Option<WriteConcernResult>>;
}

/// A selected server that channels can be checked out from.
#[async_trait]
pub trait ChannelSource: Send + Sync {
    fn server_description(&self) -> &ServerDescription;

    async fn channel(&self, cancel: &CancellationToken) -> Result<Box<dyn Channel>>;
}

/// Resolves channel sources for reads.
#[async_trait]
pub trait ReadBinding: Send + Sync {
    /// The preference used to select servers; `None` behaves like primary.
    fn read_preference(&self) -> Option<&ReadPreference>;

    async fn read_channel_source(&self, cancel: &CancellationToken) -> Result<Box<dyn ChannelSource>>;
}

/// Resolves channel sources for writes.
#[async_trait]
pub trait WriteBinding: Send + Sync {
    async fn write_channel_source(&self, cancel: &CancellationToken) -> Result<Box<dyn ChannelSource>>;
}
