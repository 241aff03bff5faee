//! Read and write controls shared by every operation.
use bson::{Bson, Document};
use crate::{Error, Result};

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Server selection mode of a read preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadMode {
    Primary,
    PrimaryPreferred,
    Secondary,
    SecondaryPreferred,
    Nearest,
}

impl ReadMode {
    /// The lower-camel-cased name used in `$readPreference` documents.
    pub fn as_str(&self) -> &'static str {
        match *self {
            ReadMode::Primary => "primary",
            ReadMode::PrimaryPreferred => "primaryPreferred",
            ReadMode::Secondary => "secondary",
            ReadMode::SecondaryPreferred => "secondaryPreferred",
            ReadMode::Nearest => "nearest",
        }
    }
}

impl FromStr for ReadMode {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "primary" => ReadMode::Primary,
            "primaryPreferred" => ReadMode::PrimaryPreferred,
            "secondary" => ReadMode::Secondary,
            "secondaryPreferred" => ReadMode::SecondaryPreferred,
            "nearest" => ReadMode::Nearest,
            _ => return Err(Error::ArgumentError(format!("Unknown read mode '{}'.", s))),
        })
    }
}

impl fmt::Display for ReadMode {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(self.as_str())
    }
}

/// A set of server tags; a server matches when it carries every tag in the set.
pub type TagSet = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPreference {
    pub mode: ReadMode,
    pub tag_sets: Vec<TagSet>,
    /// Upper bound on how stale a secondary may be.
    pub max_staleness: Option<Duration>,
}

impl ReadPreference {
    pub fn new(mode: ReadMode, tag_sets: Option<Vec<TagSet>>) -> ReadPreference {
        ReadPreference {
            mode: mode,
            tag_sets: tag_sets.unwrap_or_else(Vec::new),
            max_staleness: None,
        }
    }

    pub fn primary() -> ReadPreference {
        ReadPreference::new(ReadMode::Primary, None)
    }

    pub fn with_max_staleness(mut self, max_staleness: Duration) -> ReadPreference {
        self.max_staleness = Some(max_staleness);
        self
    }

    /// Whether at least one non-empty tag set is configured.
    pub fn has_tag_sets(&self) -> bool {
        self.tag_sets.iter().any(|tag_set| !tag_set.is_empty())
    }

    /// Whether a non-primary member may serve the read. This is the out-of-band
    /// flag sent alongside every read.
    pub fn slave_ok(&self) -> bool {
        self.mode != ReadMode::Primary
    }
}

impl Default for ReadPreference {
    fn default() -> Self {
        ReadPreference::primary()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteConcern {
    pub w: i32,          // Write replication
    pub w_timeout: i32,  // Used in conjunction with 'w'. Propagation timeout in ms.
    pub j: bool,         // If true, will block until write operations have been committed to journal.
    pub fsync: bool,     // If true and server is not journaling, blocks until server has synced all data files to disk.
}

impl WriteConcern {
    pub fn new() -> WriteConcern {
        WriteConcern {
            w: 1,
            w_timeout: 0,
            j: false,
            fsync: false,
        }
    }

    /// A write concern that requests no acknowledgement at all.
    pub fn unacknowledged() -> WriteConcern {
        WriteConcern { w: 0, ..WriteConcern::new() }
    }

    pub fn is_acknowledged(&self) -> bool {
        self.w != 0 || self.j || self.fsync
    }

    pub fn to_bson(&self) -> Document {
        let mut bson = Document::new();
        bson.insert("w", Bson::I32(self.w));
        bson.insert("wtimeout", Bson::I32(self.w_timeout));
        bson.insert("j", Bson::Boolean(self.j));
        if self.fsync {
            bson.insert("fsync", Bson::Boolean(true));
        }
        bson
    }
}

impl Default for WriteConcern {
    fn default() -> Self {
        WriteConcern::new()
    }
}

/// A fully qualified collection name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub database_name: String,
    pub collection_name: String,
}

impl Namespace {
    pub fn new(database_name: &str, collection_name: &str) -> Namespace {
        Namespace {
            database_name: String::from(database_name),
            collection_name: String::from(collection_name),
        }
    }

    /// The namespace formatted as `db_name.coll_name`.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.database_name, self.collection_name)
    }
}

impl FromStr for Namespace {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.find('.') {
            Some(index) if index > 0 && index + 1 < s.len() => {
                Ok(Namespace::new(&s[..index], &s[index + 1..]))
            }
            _ => Err(Error::ArgumentError(format!("Invalid namespace specified: '{}'.", s))),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}.{}", self.database_name, self.collection_name)
    }
}

/// Reads any numeric BSON value as an i64.
pub(crate) fn bson_to_i64(value: &Bson) -> Option<i64> {
    match *value {
        Bson::I32(n) => Some(n as i64),
        Bson::I64(n) => Some(n),
        Bson::FloatingPoint(n) => Some(n as i64),
        _ => None,
    }
}

/// Whether a command reply reports success through its `ok` field.
pub(crate) fn is_ok(reply: &Document) -> bool {
    match reply.get("ok") {
        Some(&Bson::Boolean(ok)) => ok,
        Some(value) => bson_to_i64(value).map_or(false, |n| n == 1),
        None => false,
    }
}
