//! Batch cursors and the single-pass sequences built on top of them.
pub mod adapter;
pub mod command;

pub use self::adapter::{CursorEnumerable, CursorEnumerator};
pub use self::command::CommandCursor;

use async_trait::async_trait;

use crate::Result;
use crate::cancel::CancellationToken;

/// A server-side cursor read one batch at a time.
#[async_trait]
pub trait BatchCursor: Send {
    type Item: Send;

    /// Returns the next batch, which may be empty, or `None` once the cursor
    /// is exhausted.
    async fn try_next_batch(&mut self, cancel: &CancellationToken) -> Result<Option<Vec<Self::Item>>>;

    /// Releases the cursor's resources without any network round trip. Safe
    /// to call more than once.
    fn dispose(&mut self);
}
