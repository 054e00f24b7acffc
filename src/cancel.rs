use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};
use anyhow::{anyhow, Context};
use crate::error::InstallError;

/// How often blocked waits look at the token.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Abort signal handed to the fetch step.
///
/// Clones share the same flag, so a Ctrl-C handler can hold one clone while the
/// installer polls another. A token with a deadline reports itself cancelled once
/// the deadline has passed.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a token sharing this token's flag that also expires after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        Self {
            flag: Arc::clone(&self.flag),
            deadline: Some(match self.deadline {
                Some(existing) => existing.min(deadline),
                None => deadline,
            }),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Time left until the deadline, `None` if there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Fails with [`InstallError::Cancelled`] once cancellation was requested.
    pub fn check(&self) -> Result<(), InstallError> {
        if self.is_cancelled() {
            Err(InstallError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Runs `work` on a worker thread and waits for its result, polling the token.
    ///
    /// Returns [`InstallError::Cancelled`] as soon as the token fires. The worker is
    /// then detached: whatever it returns later is dropped.
    pub fn run_cancellable<T, F>(&self, work: F) -> Result<T, InstallError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.check()?;
        let (sender, receiver) = mpsc::channel();
        std::thread::Builder::new()
            .name("bootbin-worker".to_string())
            .spawn(move || {
                let _ = sender.send(work());
            })
            .context("Could not start worker thread")?;
        loop {
            match receiver.recv_timeout(POLL_INTERVAL) {
                Ok(value) => return Ok(value),
                Err(RecvTimeoutError::Timeout) => self.check()?,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(anyhow!("Worker thread exited without a result").into());
                }
            }
        }
    }
}
