//! Operations that resolve a binding to a channel and run a command on it.
pub mod command;
pub mod explain;
pub mod query;

pub use self::command::{CursorCommandOperation, ReadCommandOperation, WriteCommandOperation};
pub use self::explain::{ExplainOperation, ExplainVerbosity};
pub use self::query::first_batch_size;

use bson::{Bson, Document};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{Error, Result};
use crate::binding::{Channel, ChannelSource};
use crate::cancel::CancellationToken;
use crate::common::{is_ok, ReadPreference};
use crate::error::CommandException;
use crate::wire_protocol::flags::OpQueryFlags;

/// Sends a command and fails with `Error::CommandError` if the reply is not ok.
pub(crate) async fn run_command(channel: &dyn Channel,
                                database: &str,
                                command: Document,
                                flags: OpQueryFlags,
                                cancel: &CancellationToken)
                                -> Result<Document> {
    let command_name = command.keys().next().cloned().unwrap_or_default();
    debug!(database, command = %command_name, slave_ok = flags.contains(OpQueryFlags::SLAVE_OK), "sending command");

    let reply = cancel.guard(channel.command(database, command, flags, cancel)).await?;

    if is_ok(&reply) {
        Ok(reply)
    } else {
        let exception = CommandException::from_reply(reply);
        debug!(database, command = %command_name, code = exception.code, "command failed");
        Err(Error::CommandError(exception))
    }
}

/// Sends a command on the read path, attaching the read preference the way the
/// selected server expects it.
pub(crate) async fn run_read_command(channel_source: &dyn ChannelSource,
                                     channel: &dyn Channel,
                                     database: &str,
                                     command: Document,
                                     read_preference: Option<&ReadPreference>,
                                     cancel: &CancellationToken)
                                     -> Result<Document> {
    let server_type = channel_source.server_description().server_type;

    let command = match query::encode(server_type, read_preference) {
        Some(read_preference) => query::wrap_command(command, read_preference),
        None => command,
    };

    let slave_ok = read_preference.map_or(false, ReadPreference::slave_ok);
    run_command(channel, database, command, OpQueryFlags::with_slave_ok(slave_ok), cancel).await
}

/// Deserializes a reply document into the operation's reply type.
pub(crate) fn deserialize_reply<T: DeserializeOwned>(reply: Document) -> Result<T> {
    Ok(bson::from_bson(Bson::Document(reply))?)
}
