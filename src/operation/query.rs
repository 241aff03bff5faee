//! Read preference encoding and batch sizing for the read path.
use bson::{Bson, Document};
use crate::common::{ReadMode, ReadPreference};
use crate::topology::ServerType;

use std::cmp;

/// Builds the `$readPreference` document for a command sent to `server_type`.
///
/// Only routing nodes read the preference from the command. Primary and
/// secondaryPreferred without tags or a staleness bound are fully described
/// by the slaveOk flag, so nothing is encoded for them.
pub fn encode(server_type: ServerType, read_preference: Option<&ReadPreference>) -> Option<Document> {
    if !server_type.is_routing() {
        return None;
    }

    let read_preference = read_preference?;
    let has_tag_sets = read_preference.has_tag_sets();

    match read_preference.mode {
        ReadMode::Primary | ReadMode::SecondaryPreferred
            if !has_tag_sets && read_preference.max_staleness.is_none() => return None,
        _ => (),
    }

    let mut document = Document::new();
    document.insert("mode", Bson::String(String::from(read_preference.mode.as_str())));

    if has_tag_sets {
        let tags = read_preference.tag_sets
            .iter()
            .map(|tag_set| {
                let mut tags = Document::new();
                for (key, value) in tag_set {
                    tags.insert(key.to_owned(), Bson::String(value.to_owned()));
                }
                Bson::Document(tags)
            })
            .collect();
        document.insert("tags", Bson::Array(tags));
    }

    if let Some(max_staleness) = read_preference.max_staleness {
        let seconds = cmp::min(max_staleness.as_secs(), i32::MAX as u64) as i32;
        document.insert("maxStalenessSeconds", Bson::I32(seconds));
    }

    Some(document)
}

/// Wraps a command so a routing node forwards it with `read_preference`.
pub fn wrap_command(command: Document, read_preference: Document) -> Document {
    let mut wrapped = Document::new();
    wrapped.insert("$query", Bson::Document(command));
    wrapped.insert("$readPreference", Bson::Document(read_preference));
    wrapped
}

/// The number of documents to request in the first batch of a query.
///
/// A negative limit asks for a single batch and always wins; otherwise a zero
/// value defers to the other one, and the smaller value wins.
pub fn first_batch_size(limit: i32, batch_size: i32) -> i32 {
    if limit < 0 {
        limit
    } else if limit == 0 {
        batch_size
    } else if batch_size == 0 {
        limit
    } else if limit < batch_size {
        limit
    } else {
        batch_size
    }
}
