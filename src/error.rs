//! Error types for operation execution.
use bson::{Bson, Document};
use crate::coll::error::{BulkWriteException, WriteConcernError};
use crate::common::bson_to_i64;

use std::{fmt, io};
use thiserror::Error;

/// The result type for all operations in this crate.
pub type Result<T> = ::std::result::Result<T, Error>;

/// The error type for operation execution and result streaming.
#[derive(Debug, Error)]
pub enum Error {
    /// The caller supplied an invalid argument.
    #[error("{0}")]
    ArgumentError(String),
    /// A cancellation token was observed at a suspension point.
    #[error("The operation was cancelled.")]
    Cancelled,
    /// A one-time sequence view was requested more than once.
    #[error("A cursor can only be enumerated once.")]
    AlreadyEnumerated,
    /// A member was accessed while the owner was in the wrong state.
    #[error("{0}")]
    InvalidState(String),
    /// The object was used after it had been disposed.
    #[error("Cannot access a disposed {0}.")]
    Disposed(&'static str),
    /// Forward-only sequences cannot be rewound.
    #[error("{0} does not support reset.")]
    ResetNotSupported(&'static str),
    /// A legacy protocol path was asked for a feature it cannot express.
    #[error("{0}")]
    NotSupported(String),
    /// The server replied to a command with `ok: 0`.
    #[error(transparent)]
    CommandError(CommandException),
    /// A single write was applied but its acknowledgement requirements were not met.
    #[error(transparent)]
    WriteConcernError(WriteConcernException),
    /// A bulk write completed with write errors, a write concern error,
    /// or was interrupted by a transport failure.
    #[error(transparent)]
    BulkWriteError(BulkWriteException),
    /// The server reply did not have the expected shape.
    #[error("{0}")]
    ResponseError(String),
    /// An internal invariant of the operation was violated.
    #[error("{0}")]
    OperationError(String),
    /// The server did not recognize the cursor.
    #[error("Cursor {0} was not found on the server.")]
    CursorNotFoundError(i64),
    #[error(transparent)]
    IoError(#[from] io::Error),
    #[error(transparent)]
    EncoderError(#[from] bson::EncoderError),
    #[error(transparent)]
    DecoderError(#[from] bson::DecoderError),
}

impl Error {
    /// Returns true if the operation stopped because its token was cancelled.
    pub fn is_cancelled(&self) -> bool {
        match *self {
            Error::Cancelled => true,
            _ => false,
        }
    }

    /// Returns true for errors caused by misusing an object, such as enumerating
    /// a cursor twice or reading the current item of an unstarted enumerator.
    pub fn is_usage_error(&self) -> bool {
        match *self {
            Error::AlreadyEnumerated |
            Error::InvalidState(_) |
            Error::Disposed(_) |
            Error::ResetNotSupported(_) => true,
            _ => false,
        }
    }

    /// Returns true if a legacy path rejected the request before sending it.
    pub fn is_capability_error(&self) -> bool {
        match *self {
            Error::NotSupported(_) => true,
            _ => false,
        }
    }

    /// Returns true if the server reported a write concern error.
    pub fn is_write_concern_error(&self) -> bool {
        match *self {
            Error::WriteConcernError(_) => true,
            Error::BulkWriteError(ref exception) => exception.write_concern_error.is_some(),
            _ => false,
        }
    }
}

/// The error struct for a command the server rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandException {
    pub code: i32,
    pub code_name: Option<String>,
    pub message: String,
    pub reply: Document,
}

impl CommandException {
    /// Extracts the error information from a failed command reply.
    pub fn from_reply(reply: Document) -> CommandException {
        let code = reply.get("code").and_then(bson_to_i64).unwrap_or(0) as i32;

        let code_name = match reply.get("codeName") {
            Some(&Bson::String(ref name)) => Some(name.to_owned()),
            _ => None,
        };

        let message = match reply.get("errmsg") {
            Some(&Bson::String(ref message)) => message.to_owned(),
            _ => String::from("Command failed."),
        };

        CommandException {
            code: code,
            code_name: code_name,
            message: message,
            reply: reply,
        }
    }
}

impl fmt::Display for CommandException {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "Command failed with error {}", self.code)?;
        if let Some(ref name) = self.code_name {
            write!(fmt, " ({})", name)?;
        }
        write!(fmt, ": '{}'.", self.message)
    }
}

impl ::std::error::Error for CommandException {}

/// The error struct for a write command whose reply carried a `writeConcernError`.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteConcernException {
    pub write_concern_error: WriteConcernError,
    pub reply: Document,
}

impl WriteConcernException {
    pub fn new(write_concern_error: WriteConcernError, reply: Document) -> WriteConcernException {
        WriteConcernException {
            write_concern_error: write_concern_error,
            reply: reply,
        }
    }
}

impl fmt::Display for WriteConcernException {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "WriteConcernException: {}", self.write_concern_error)
    }
}

impl ::std::error::Error for WriteConcernException {}
