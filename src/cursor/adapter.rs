//! Single-pass sequences over batch cursors.
//!
//! `CursorEnumerable` hands out exactly one `CursorEnumerator`, which walks the
//! cursor's batches item by item. The enumerator can be driven directly with
//! `move_next`/`move_next_async` and `current`, as a blocking `Iterator`, or as
//! a `futures::Stream`.
use futures::executor::block_on;
use futures::stream::{self, Stream};

use crate::{Error, Result};
use crate::cancel::CancellationToken;

use super::BatchCursor;

use std::collections::VecDeque;

const ENUMERATOR_NAME: &str = "CursorEnumerator";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    NotStarted,
    InBatch,
    Exhausted,
    Disposed,
}

/// A one-time view over a batch cursor.
pub struct CursorEnumerable<C: BatchCursor> {
    cursor: Option<C>,
    cancel: CancellationToken,
}

impl<C: BatchCursor> CursorEnumerable<C> {
    pub fn new(cursor: C) -> CursorEnumerable<C> {
        CursorEnumerable::with_cancellation(cursor, CancellationToken::new())
    }

    /// Creates the view; the blocking and stream views of its enumerator
    /// observe `cancel`.
    pub fn with_cancellation(cursor: C, cancel: CancellationToken) -> CursorEnumerable<C> {
        CursorEnumerable {
            cursor: Some(cursor),
            cancel: cancel,
        }
    }

    /// Returns the enumerator. The cursor cannot be rewound, so only the first
    /// call succeeds; later calls fail with `Error::AlreadyEnumerated`.
    pub fn enumerate(&mut self) -> Result<CursorEnumerator<C>> {
        match self.cursor.take() {
            Some(cursor) => Ok(CursorEnumerator::new(cursor, self.cancel.clone())),
            None => Err(Error::AlreadyEnumerated),
        }
    }
}

impl<C: BatchCursor> Drop for CursorEnumerable<C> {
    fn drop(&mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            cursor.dispose();
        }
    }
}

/// Walks a batch cursor one item at a time.
pub struct CursorEnumerator<C: BatchCursor> {
    cursor: Option<C>,
    batch: VecDeque<C::Item>,
    current: Option<C::Item>,
    state: State,
    failed: bool,
    cancel: CancellationToken,
}

impl<C: BatchCursor> CursorEnumerator<C> {
    fn new(cursor: C, cancel: CancellationToken) -> CursorEnumerator<C> {
        CursorEnumerator {
            cursor: Some(cursor),
            batch: VecDeque::new(),
            current: None,
            state: State::NotStarted,
            failed: false,
            cancel: cancel,
        }
    }

    /// The item the last successful advance moved to.
    pub fn current(&self) -> Result<&C::Item> {
        match self.state {
            State::InBatch => self.current.as_ref().ok_or_else(|| {
                Error::InvalidState(String::from("The current item has already been taken."))
            }),
            State::NotStarted => {
                Err(Error::InvalidState(String::from("Enumeration has not started. Call move_next.")))
            }
            State::Exhausted => Err(Error::InvalidState(String::from("Enumeration already finished."))),
            State::Disposed => Err(Error::Disposed(ENUMERATOR_NAME)),
        }
    }

    /// Advances to the next item, blocking on any batch fetch.
    pub fn move_next(&mut self) -> Result<bool> {
        let cancel = self.cancel.clone();
        block_on(self.move_next_async(&cancel))
    }

    /// Advances to the next item, fetching batches until a non-empty one
    /// arrives or the cursor is exhausted.
    ///
    /// # Return value
    ///
    /// Returns `true` if `current` now holds an item, and `false` once the
    /// cursor is exhausted.
    pub async fn move_next_async(&mut self, cancel: &CancellationToken) -> Result<bool> {
        match self.state {
            State::Disposed => return Err(Error::Disposed(ENUMERATOR_NAME)),
            State::Exhausted => return Ok(false),
            State::NotStarted | State::InBatch => (),
        }

        loop {
            if let Some(item) = self.batch.pop_front() {
                self.current = Some(item);
                self.state = State::InBatch;
                return Ok(true);
            }

            let batch = match self.cursor {
                Some(ref mut cursor) => cursor.try_next_batch(cancel).await?,
                None => None,
            };

            match batch {
                Some(batch) => self.batch.extend(batch),
                None => {
                    self.current = None;
                    self.state = State::Exhausted;
                    if let Some(mut cursor) = self.cursor.take() {
                        cursor.dispose();
                    }
                    return Ok(false);
                }
            }
        }
    }

    /// Forward-only enumerators cannot be rewound.
    pub fn reset(&mut self) -> Result<()> {
        Err(Error::ResetNotSupported(ENUMERATOR_NAME))
    }

    /// Releases the buffered batch and the cursor. Calling it again has no effect.
    pub fn dispose(&mut self) {
        if self.state != State::Disposed {
            self.state = State::Disposed;
            self.batch.clear();
            self.current = None;
            if let Some(mut cursor) = self.cursor.take() {
                cursor.dispose();
            }
        }
    }

    /// Consumes the enumerator as a stream of items. The stream ends after the
    /// cursor is exhausted or after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<C::Item>> {
        stream::unfold(Some(self), |state| async move {
            let mut enumerator = match state {
                Some(enumerator) => enumerator,
                None => return None,
            };

            let cancel = enumerator.cancel.clone();
            match enumerator.move_next_async(&cancel).await {
                Ok(true) => match enumerator.current.take() {
                    Some(item) => Some((Ok(item), Some(enumerator))),
                    None => None,
                },
                Ok(false) => None,
                Err(error) => {
                    enumerator.dispose();
                    Some((Err(error), None))
                }
            }
        })
    }
}

/// Moves each item out of the enumerator; `current` is not available afterwards.
///
/// The first error is yielded once and ends the iteration. Iterating an
/// enumerator the caller already disposed yields `Error::Disposed`.
impl<C: BatchCursor> Iterator for CursorEnumerator<C> {
    type Item = Result<C::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        match self.move_next() {
            Ok(true) => self.current.take().map(Ok),
            Ok(false) => None,
            Err(error) => {
                self.failed = true;
                self.dispose();
                Some(Err(error))
            }
        }
    }
}

impl<C: BatchCursor> Drop for CursorEnumerator<C> {
    fn drop(&mut self) {
        self.dispose();
    }
}
