//! Legacy wire protocol messages handed to a channel.
pub mod flags;
pub mod operations;
