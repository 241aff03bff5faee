//! The explain command.
use bson::{Bson, Document};
use futures::executor::block_on;

use crate::Result;
use crate::binding::ReadBinding;
use crate::cancel::CancellationToken;

use super::command::ReadCommandOperation;

use std::fmt;

/// How much detail the server includes in an explain reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExplainVerbosity {
    QueryPlanner,
    ExecutionStats,
    AllPlansExecution,
}

impl ExplainVerbosity {
    pub fn as_str(&self) -> &'static str {
        match *self {
            ExplainVerbosity::QueryPlanner => "queryPlanner",
            ExplainVerbosity::ExecutionStats => "executionStats",
            ExplainVerbosity::AllPlansExecution => "allPlansExecution",
        }
    }
}

impl Default for ExplainVerbosity {
    fn default() -> Self {
        ExplainVerbosity::QueryPlanner
    }
}

impl fmt::Display for ExplainVerbosity {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(self.as_str())
    }
}

/// Explains a command instead of running it.
#[derive(Clone, Debug)]
pub struct ExplainOperation {
    database_name: String,
    command: Document,
    verbosity: ExplainVerbosity,
}

impl ExplainOperation {
    pub fn new(database_name: &str, command: Document, verbosity: ExplainVerbosity) -> ExplainOperation {
        ExplainOperation {
            database_name: String::from(database_name),
            command: command,
            verbosity: verbosity,
        }
    }

    /// The explain command sent to the server.
    pub fn explain_command(&self) -> Document {
        let mut explain = Document::new();
        explain.insert("explain", Bson::Document(self.command.clone()));
        explain.insert("verbosity", Bson::String(String::from(self.verbosity.as_str())));
        explain
    }

    pub fn execute(&self, binding: &dyn ReadBinding, cancel: &CancellationToken) -> Result<Document> {
        block_on(self.execute_async(binding, cancel))
    }

    pub async fn execute_async(&self, binding: &dyn ReadBinding, cancel: &CancellationToken) -> Result<Document> {
        ReadCommandOperation::<Document>::new(&self.database_name, self.explain_command())
            .execute_async(binding, cancel)
            .await
    }
}
