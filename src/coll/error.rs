//! Write errors for bulk write operations.
use bson::{Bson, Document};
use crate::{Error, Result};
use crate::common::bson_to_i64;
use crate::wire_protocol::operations::WriteConcernResult;

use super::batch::WriteRequest;
use super::index_map::IndexMap;
use super::results::BulkWriteResult;

use std::{error, fmt};

/// The code reported for a legacy write error that carried none.
const UNKNOWN_WRITE_ERROR_CODE: i32 = 8;
/// The code reported for a legacy write concern failure that carried none.
const WRITE_CONCERN_FAILED_CODE: i32 = 64;

/// getLastError fields that describe the reply rather than the error.
const GET_LAST_ERROR_FIELDS: &[&str] = &["ok", "n", "err", "code", "connectionId", "syncMillis"];

/// The error struct for a write-concern related error.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteConcernError {
    pub code: i32,
    pub code_name: Option<String>,
    pub message: String,
    pub details: Document,
}

/// Broad classes of server error codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServerErrorCategory {
    Uncategorized,
    DuplicateKey,
    ExecutionTimeout,
}

/// The error struct for a single bulk-write step, indicating the index of the
/// failed request in the original bulk-write request.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkWriteError {
    pub index: usize,
    pub code: i32,
    pub category: ServerErrorCategory,
    pub message: String,
    pub details: Document,
}

/// The error struct for Bulk-Write related MongoDB operations.
///
/// Carries the result of the requests that were executed, so a caller can tell
/// what was applied before the failure.
#[derive(Debug)]
pub struct BulkWriteException {
    pub result: BulkWriteResult,
    pub write_errors: Vec<BulkWriteError>,
    pub write_concern_error: Option<WriteConcernError>,
    pub unprocessed_requests: Vec<WriteRequest>,
    /// The transport or command failure that interrupted the bulk write.
    pub source: Option<Box<Error>>,
    pub message: String,
}

impl ServerErrorCategory {
    pub fn from_code(code: i32) -> ServerErrorCategory {
        match code {
            11000 | 11001 | 12582 => ServerErrorCategory::DuplicateKey,
            50 => ServerErrorCategory::ExecutionTimeout,
            _ => ServerErrorCategory::Uncategorized,
        }
    }
}

// Copies a getLastError reply, leaving out the fields that describe the reply itself.
fn get_last_error_details(response: &Document) -> Document {
    let mut details = Document::new();
    for (key, value) in response.iter() {
        if !GET_LAST_ERROR_FIELDS.contains(&key.as_str()) {
            details.insert(key.to_owned(), value.clone());
        }
    }
    details
}

fn string_field(document: &Document, key: &str) -> Option<String> {
    match document.get(key) {
        Some(&Bson::String(ref value)) => Some(value.to_owned()),
        _ => None,
    }
}

fn document_field(document: &Document, key: &str) -> Document {
    match document.get(key) {
        Some(&Bson::Document(ref value)) => value.clone(),
        _ => Document::new(),
    }
}

impl WriteConcernError {
    /// Returns a new WriteConcernError containing the provided error information.
    pub fn new<T: ToString>(code: i32, message: T) -> WriteConcernError {
        WriteConcernError {
            code: code,
            code_name: None,
            message: message.to_string(),
            details: Document::new(),
        }
    }

    /// Parses the `writeConcernError` document of a command reply.
    pub fn parse(error: &Document) -> Result<WriteConcernError> {
        let code = match error.get("code").and_then(bson_to_i64) {
            Some(code) => code as i32,
            None => {
                return Err(Error::ResponseError(format!(
                    "WriteConcernError document is invalid: {:?}",
                    error
                )))
            }
        };

        Ok(WriteConcernError {
            code: code,
            code_name: string_field(error, "codeName"),
            message: string_field(error, "errmsg").unwrap_or_default(),
            details: document_field(error, "errInfo"),
        })
    }

    /// Builds the error from a getLastError reply that reported a write concern failure.
    pub fn from_get_last_error(result: &WriteConcernResult) -> WriteConcernError {
        WriteConcernError {
            code: result.code().unwrap_or(WRITE_CONCERN_FAILED_CODE),
            code_name: None,
            message: result.last_error_message().unwrap_or_default().to_owned(),
            details: get_last_error_details(&result.response),
        }
    }
}

impl BulkWriteError {
    /// Returns a new BulkWriteError containing the provided error information.
    pub fn new<T: ToString>(index: usize, code: i32, message: T) -> BulkWriteError {
        BulkWriteError {
            index: index,
            code: code,
            category: ServerErrorCategory::from_code(code),
            message: message.to_string(),
            details: Document::new(),
        }
    }

    /// Parses an element of the `writeErrors` array of a command reply.
    pub fn parse(error: &Document) -> Result<BulkWriteError> {
        let index = error.get("index").and_then(bson_to_i64);
        let code = error.get("code").and_then(bson_to_i64);

        match (index, code) {
            (Some(index), Some(code)) if index >= 0 => {
                let mut write_error = BulkWriteError::new(index as usize,
                                                          code as i32,
                                                          string_field(error, "errmsg")
                                                              .unwrap_or_default());
                write_error.details = document_field(error, "errInfo");
                Ok(write_error)
            }
            _ => Err(Error::ResponseError(
                format!("WriteError document is invalid: {:?}", error),
            )),
        }
    }

    /// Builds the error for the request at `index` from a failed getLastError reply.
    pub fn from_get_last_error(index: usize, result: &WriteConcernResult) -> BulkWriteError {
        let code = result.code().unwrap_or(UNKNOWN_WRITE_ERROR_CODE);
        let mut write_error = BulkWriteError::new(index,
                                                  code,
                                                  result.last_error_message().unwrap_or_default());
        write_error.details = get_last_error_details(&result.response);
        write_error
    }

    /// Translates the index through `index_map`.
    pub fn with_mapped_index(mut self, index_map: &IndexMap) -> Result<BulkWriteError> {
        self.index = index_map.map(self.index).ok_or_else(|| {
            Error::OperationError(format!("No original index for write error at {}.", self.index))
        })?;
        Ok(self)
    }
}

impl BulkWriteException {
    /// Returns a new BulkWriteException containing the provided error information.
    pub fn new(result: BulkWriteResult,
               write_errors: Vec<BulkWriteError>,
               write_concern_error: Option<WriteConcernError>,
               unprocessed_requests: Vec<WriteRequest>,
               source: Option<Error>)
               -> BulkWriteException {
        use std::fmt::Write;

        let mut s = String::new();

        if let Some(ref error) = source {
            let _ = write!(s, "{}", error);
        }

        for error in &write_errors {
            if !s.is_empty() {
                s.push_str("; ");
            }
            let _ = write!(s, "{}", error);
        }

        if let Some(ref error) = write_concern_error {
            if !s.is_empty() {
                s.push_str("; ");
            }
            let _ = write!(s, "{}", error);
        }

        BulkWriteException {
            result: result,
            write_errors: write_errors,
            write_concern_error: write_concern_error,
            unprocessed_requests: unprocessed_requests,
            source: source.map(Box::new),
            message: s,
        }
    }
}

impl error::Error for BulkWriteException {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source.as_ref().map(|error| error.as_ref() as &(dyn error::Error + 'static))
    }
}

impl fmt::Display for WriteConcernError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "WriteConcernError (code {}): {}", self.code, self.message)
    }
}

impl fmt::Display for BulkWriteError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "BulkWriteError at index {} (code {}): {}",
            self.index,
            self.code,
            self.message
        )
    }
}

impl fmt::Display for BulkWriteException {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "BulkWriteException: {}", self.message)?;

        if !self.unprocessed_requests.is_empty() {
            write!(fmt, " ({} requests unprocessed)", self.unprocessed_requests.len())?;
        }

        Ok(())
    }
}
