use crate::Result;
use crate::common::TagSet;

use std::str::FromStr;

/// Maximum number of write requests the server accepts in a single batch.
pub const DEFAULT_MAX_BATCH_COUNT: usize = 1000;
/// Maximum size of a single BSON document.
pub const DEFAULT_MAX_BSON_OBJECT_SIZE: usize = 16 * 1024 * 1024;
/// Maximum size of a single wire protocol message.
pub const DEFAULT_MAX_MESSAGE_SIZE_BYTES: usize = 48 * 1024 * 1024;

/// The first wire version that supports the insert, update and delete commands.
const WRITE_COMMANDS_WIRE_VERSION: i32 = 2;

/// Describes the server role within a server set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerType {
    /// Standalone server.
    Standalone,
    /// Shard router.
    Mongos,
    /// Replica set primary.
    RSPrimary,
    /// Replica set secondary.
    RSSecondary,
    /// Replica set arbiter.
    RSArbiter,
    /// Replica set member of some other type.
    RSOther,
    /// Replica set ghost member.
    RSGhost,
    /// Server type is currently unknown.
    Unknown,
}

impl ServerType {
    /// Whether the server routes operations to other servers. Only routing
    /// nodes receive read preferences inside the command document.
    pub fn is_routing(&self) -> bool {
        *self == ServerType::Mongos
    }
}

impl FromStr for ServerType {
    type Err = crate::Error;
    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "Standalone" => ServerType::Standalone,
            "Mongos" => ServerType::Mongos,
            "RSPrimary" => ServerType::RSPrimary,
            "RSSecondary" => ServerType::RSSecondary,
            "RSArbiter" => ServerType::RSArbiter,
            "RSOther" => ServerType::RSOther,
            "RSGhost" => ServerType::RSGhost,
            _ => ServerType::Unknown,
        })
    }
}

impl Default for ServerType {
    fn default() -> Self {
        ServerType::Unknown
    }
}

/// What the selected server reported about itself.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ServerDescription {
    /// The server type.
    pub server_type: ServerType,
    /// The server's address, as `host:port`.
    pub address: String,
    /// Server tags for targeted read operations on specific replica set members.
    pub tags: TagSet,
}

impl ServerDescription {
    pub fn new(server_type: ServerType, address: &str) -> ServerDescription {
        ServerDescription {
            server_type: server_type,
            address: String::from(address),
            tags: TagSet::new(),
        }
    }
}

/// Limits negotiated for a single connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionDescription {
    pub connection_id: i64,
    /// The maximum wire version supported by the server.
    pub max_wire_version: i32,
    pub max_batch_count: usize,
    pub max_document_size: usize,
    pub max_message_size: usize,
}

impl ConnectionDescription {
    pub fn new(connection_id: i64, max_wire_version: i32) -> ConnectionDescription {
        ConnectionDescription {
            connection_id: connection_id,
            max_wire_version: max_wire_version,
            ..Default::default()
        }
    }

    /// Whether writes can be sent as native batched commands rather than
    /// emulated with legacy opcodes.
    pub fn supports_write_commands(&self) -> bool {
        self.max_wire_version >= WRITE_COMMANDS_WIRE_VERSION
    }
}

impl Default for ConnectionDescription {
    fn default() -> Self {
        ConnectionDescription {
            connection_id: 0,
            max_wire_version: 0,
            max_batch_count: DEFAULT_MAX_BATCH_COUNT,
            max_document_size: DEFAULT_MAX_BSON_OBJECT_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE_BYTES,
        }
    }
}
