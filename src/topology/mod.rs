//! Server and connection descriptions consulted when dispatching operations.
pub mod server;

pub use self::server::{ConnectionDescription, ServerDescription, ServerType};
