//! Run-wide cancellation: an interrupt flag plus an optional deadline.
//!
//! The pipeline checks the token between pages and blocks; retry backoff
//! races its timer against [`CancelToken::cancelled`].

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::{Error, Result};

/// Sender side, owned by whoever can interrupt the run (e.g. a Ctrl-C task).
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Cheap-to-clone view of the cancellation state.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> (CancelHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, Self { rx, deadline: None })
    }

    /// A token that is never signalled (it can still carry a deadline).
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx, deadline: None }
    }

    /// Expire the token `timeout` from now.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// `Err(Error::Cancelled)` once the token fired.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves when the token is signalled or the deadline passes.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let signalled = async move {
            loop {
                if *rx.borrow_and_update() {
                    return;
                }
                if rx.changed().await.is_err() {
                    // Handle dropped without firing
                    std::future::pending::<()>().await;
                }
            }
        };

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = signalled => {}
                    () = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => signalled.await,
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::never()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handle_cancels_token() {
        let (handle, token) = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());

        handle.cancel();
        token.cancelled().await;
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(Error::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let token = CancelToken::never().with_timeout(Duration::from_secs(5));
        assert!(!token.is_cancelled());
        token.cancelled().await;
        assert!(token.is_cancelled());
    }
}
