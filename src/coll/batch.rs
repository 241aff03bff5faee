//! Write requests and the batches they are sent in.
use bson::{Bson, Document};

/// Identifies which kind of write a request performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WriteRequestType {
    Insert,
    Update,
    Delete,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InsertRequest {
    pub document: Document,
    pub correlation_id: Option<usize>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpdateRequest {
    pub filter: Document,
    pub update: Document,
    pub upsert: bool,
    pub multi: bool,
    pub collation: Option<Document>,
    pub array_filters: Option<Vec<Document>>,
    pub correlation_id: Option<usize>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeleteRequest {
    pub filter: Document,
    /// Either 0 (remove every match) or 1 (remove the first match).
    pub limit: i32,
    pub collation: Option<Document>,
    pub correlation_id: Option<usize>,
}

/// A single write in a bulk operation.
#[derive(Clone, Debug, PartialEq)]
pub enum WriteRequest {
    Insert(InsertRequest),
    Update(UpdateRequest),
    Delete(DeleteRequest),
}

impl InsertRequest {
    pub fn new(document: Document) -> InsertRequest {
        InsertRequest {
            document: document,
            correlation_id: None,
        }
    }
}

impl UpdateRequest {
    pub fn new(filter: Document, update: Document, upsert: bool, multi: bool) -> UpdateRequest {
        UpdateRequest {
            filter: filter,
            update: update,
            upsert: upsert,
            multi: multi,
            collation: None,
            array_filters: None,
            correlation_id: None,
        }
    }

    /// The statement sent inside the `updates` array of an update command.
    pub fn to_statement(&self) -> Document {
        let mut statement = Document::new();
        statement.insert("q", Bson::Document(self.filter.clone()));
        statement.insert("u", Bson::Document(self.update.clone()));
        statement.insert("upsert", Bson::Boolean(self.upsert));
        statement.insert("multi", Bson::Boolean(self.multi));

        if let Some(ref collation) = self.collation {
            statement.insert("collation", Bson::Document(collation.clone()));
        }

        if let Some(ref array_filters) = self.array_filters {
            let filters = array_filters.iter().cloned().map(Bson::Document).collect();
            statement.insert("arrayFilters", Bson::Array(filters));
        }

        statement
    }
}

impl DeleteRequest {
    pub fn new(filter: Document, multi: bool) -> DeleteRequest {
        DeleteRequest {
            filter: filter,
            limit: if multi { 0 } else { 1 },
            collation: None,
            correlation_id: None,
        }
    }

    /// The statement sent inside the `deletes` array of a delete command.
    pub fn to_statement(&self) -> Document {
        let mut statement = Document::new();
        statement.insert("q", Bson::Document(self.filter.clone()));
        statement.insert("limit", Bson::I32(self.limit));

        if let Some(ref collation) = self.collation {
            statement.insert("collation", Bson::Document(collation.clone()));
        }

        statement
    }
}

impl WriteRequest {
    pub fn request_type(&self) -> WriteRequestType {
        match *self {
            WriteRequest::Insert(_) => WriteRequestType::Insert,
            WriteRequest::Update(_) => WriteRequestType::Update,
            WriteRequest::Delete(_) => WriteRequestType::Delete,
        }
    }

    pub fn correlation_id(&self) -> Option<usize> {
        match *self {
            WriteRequest::Insert(ref request) => request.correlation_id,
            WriteRequest::Update(ref request) => request.correlation_id,
            WriteRequest::Delete(ref request) => request.correlation_id,
        }
    }

    pub fn set_correlation_id(&mut self, correlation_id: Option<usize>) {
        match *self {
            WriteRequest::Insert(ref mut request) => request.correlation_id = correlation_id,
            WriteRequest::Update(ref mut request) => request.correlation_id = correlation_id,
            WriteRequest::Delete(ref mut request) => request.correlation_id = correlation_id,
        }
    }

    /// The element this request contributes to a native write command.
    pub fn to_command_element(&self) -> Bson {
        match *self {
            WriteRequest::Insert(ref request) => Bson::Document(request.document.clone()),
            WriteRequest::Update(ref request) => Bson::Document(request.to_statement()),
            WriteRequest::Delete(ref request) => Bson::Document(request.to_statement()),
        }
    }
}

impl From<InsertRequest> for WriteRequest {
    fn from(request: InsertRequest) -> Self {
        WriteRequest::Insert(request)
    }
}

impl From<UpdateRequest> for WriteRequest {
    fn from(request: UpdateRequest) -> Self {
        WriteRequest::Update(request)
    }
}

impl From<DeleteRequest> for WriteRequest {
    fn from(request: DeleteRequest) -> Self {
        WriteRequest::Delete(request)
    }
}

/// The items carried by one legacy write message.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchableSource<T> {
    items: Vec<T>,
}

impl<T> BatchableSource<T> {
    pub fn new(items: Vec<T>) -> BatchableSource<T> {
        BatchableSource { items: items }
    }

    /// Wraps a single item as a one-element source.
    pub fn single(item: T) -> BatchableSource<T> {
        BatchableSource::new(vec![item])
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}
