//! Operation execution and result streaming for MongoDB drivers.
//!
//! This crate sits between application-level operations and a wire protocol
//! transport. It resolves an operation to a channel through a binding, runs
//! commands on it, emulates bulk writes with legacy opcodes when the server
//! has no write commands, and turns batch-fetching cursors into single-pass
//! sequences.
//!
//! The transport itself is supplied by the caller through the traits in
//! [`binding`]. Every operation has a blocking `execute` and an async
//! `execute_async` entry point, and every one takes a [`CancellationToken`].
//!
//! ```no_run
//! # use bson::{bson, doc};
//! # use mongodb_operations::binding::WriteBinding;
//! use mongodb_operations::CancellationToken;
//! use mongodb_operations::coll::batch::{InsertRequest, WriteRequest};
//! use mongodb_operations::coll::bulk::BulkMixedWriteOperation;
//! use mongodb_operations::coll::options::BulkWriteOptions;
//! use mongodb_operations::common::Namespace;
//!
//! # fn run(binding: &dyn WriteBinding) -> mongodb_operations::Result<()> {
//! let requests: Vec<WriteRequest> = vec![
//!     InsertRequest::new(doc! { "_id": 1 }).into(),
//!     InsertRequest::new(doc! { "_id": 2 }).into(),
//! ];
//!
//! let operation = BulkMixedWriteOperation::new(Namespace::new("test", "people"),
//!                                              requests,
//!                                              BulkWriteOptions::new())?;
//! let result = operation.execute(binding, &CancellationToken::new())?;
//! assert_eq!(result.inserted_count, 2);
//! # Ok(())
//! # }
//! ```
pub mod binding;
pub mod cancel;
pub mod coll;
pub mod common;
pub mod cursor;
pub mod error;
pub mod operation;
pub mod topology;
pub mod wire_protocol;

pub use crate::cancel::CancellationToken;
pub use crate::error::{Error, Result};
