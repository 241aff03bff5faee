//! Cooperative cancellation.
//!
//! A `CancellationToken` is threaded through every operation. Operations check it
//! before each suspension point (channel acquisition, network round trips) and race
//! every suspended future against it, so a cancelled token aborts the operation at
//! the next suspension point with `Error::Cancelled`.
use crate::{Error, Result};

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Signal {
    cancelled: AtomicBool,
    notify: Notify,
}

/// A cloneable cancellation signal. All clones observe the same cancellation.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    signal: Arc<Signal>,
}

impl CancellationToken {
    /// Returns a token that has not been cancelled.
    pub fn new() -> CancellationToken {
        Default::default()
    }

    /// Cancels the token and wakes every task waiting on it.
    pub fn cancel(&self) {
        self.signal.cancelled.store(true, Ordering::SeqCst);
        self.signal.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `Error::Cancelled` if the token has been cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Completes once the token is cancelled.
    pub async fn cancelled(&self) {
        loop {
            // Registered before the flag is read so a concurrent cancel cannot be missed.
            let notified = self.signal.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Drives a suspending future to completion unless the token is cancelled first.
    pub async fn guard<T, F>(&self, future: F) -> Result<T>
        where F: Future<Output = Result<T>>
    {
        self.check()?;

        tokio::select! {
            biased;
            _ = self.cancelled() => Err(Error::Cancelled),
            result = future => result,
        }
    }
}
