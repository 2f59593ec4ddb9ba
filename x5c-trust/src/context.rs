//! Cancellation and deadline token threaded through every I/O-capable call.
//!
//! A `FetchContext` is cheap to clone. Root certificate sources wrap each
//! network request or file read in [`FetchContext::run`], so a stuck fetch
//! aborts as soon as the caller cancels or the deadline passes.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Why a context stopped an in-flight operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    Cancelled,
    DeadlineExceeded,
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextError::Cancelled => f.write_str("context cancelled"),
            ContextError::DeadlineExceeded => f.write_str("context deadline exceeded"),
        }
    }
}

impl std::error::Error for ContextError {}

#[derive(Debug, Clone, Default)]
pub struct FetchContext {
    deadline: Option<Instant>,
    cancelled: Option<watch::Receiver<bool>>,
}

/// Cancels every context cloned from the one it was created with.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl FetchContext {
    /// A context that never cancels and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancelled: None,
        }
    }

    /// A cancellable context plus the handle that cancels it.
    pub fn with_cancel() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let ctx = Self {
            deadline: None,
            cancelled: Some(rx),
        };
        (ctx, CancelHandle { tx })
    }

    /// Derive a child context that additionally stops at `deadline`.
    /// The earlier of the two deadlines wins.
    pub fn and_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current <= deadline => current,
            _ => deadline,
        };
        Self {
            deadline: Some(deadline),
            cancelled: self.cancelled.clone(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Non-blocking check, `Some` once the context is done.
    pub fn err(&self) -> Option<ContextError> {
        if let Some(rx) = &self.cancelled {
            if *rx.borrow() {
                return Some(ContextError::Cancelled);
            }
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Drive `fut` to completion unless the context finishes first.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, ContextError>
    where
        F: Future,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = wait_cancelled(self.cancelled.clone()) => Err(ContextError::Cancelled),
            _ = deadline => Err(ContextError::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}

async fn wait_cancelled(rx: Option<watch::Receiver<bool>>) {
    let Some(mut rx) = rx else {
        return std::future::pending().await;
    };
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        // Handle dropped without cancelling: this context can no longer be cancelled.
        if rx.changed().await.is_err() {
            return std::future::pending().await;
        }
    }
}
