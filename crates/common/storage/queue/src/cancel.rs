// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Cooperative cancellation for blocking waits.
//!
//! A [`CancellationToken`] is backed by a channel that never carries a
//! message: cancelling drops the only sender, which disconnects the channel
//! and makes every receiver ready at once. That lets a waiter put the token
//! in the same `select!` as the queue's wake-up signal.

use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use crossbeam::channel::{Receiver, Sender, at, bounded, never};
use parking_lot::Mutex;

/// Why a wait was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// [`CancellationToken::cancel`] was called.
    Cancelled,
    /// The token's deadline passed.
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("cancelled"),
            Self::DeadlineExceeded => f.write_str("deadline exceeded"),
        }
    }
}

/// Clonable handle; all clones observe the same cancellation.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    trigger:   Mutex<Option<Sender<()>>>,
    cancelled: Receiver<()>,
    deadline:  Option<Instant>,
}

impl Default for CancellationToken {
    fn default() -> Self { Self::new() }
}

impl CancellationToken {
    /// A token that only ends by [`cancel`](Self::cancel).
    #[must_use]
    pub fn new() -> Self { Self::build(None) }

    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self { Self::build(Some(deadline)) }

    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::build(Instant::now().checked_add(timeout))
    }

    fn build(deadline: Option<Instant>) -> Self {
        let (tx, rx) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                trigger: Mutex::new(Some(tx)),
                cancelled: rx,
                deadline,
            }),
        }
    }

    /// Cancel the token. Idempotent.
    pub fn cancel(&self) { self.inner.trigger.lock().take(); }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> { self.inner.deadline }

    #[must_use]
    pub fn is_cancelled(&self) -> bool { self.reason().is_some() }

    /// `None` while the token is live. An explicit cancel wins over an
    /// expired deadline.
    #[must_use]
    pub fn reason(&self) -> Option<CancelReason> {
        if self.inner.trigger.lock().is_none() {
            return Some(CancelReason::Cancelled);
        }
        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Becomes ready (disconnected) once [`cancel`](Self::cancel) is called.
    pub(crate) fn cancelled(&self) -> &Receiver<()> { &self.inner.cancelled }

    /// Fires at the deadline, never if there is none.
    pub(crate) fn deadline_timer(&self) -> Receiver<Instant> {
        self.inner.deadline.map_or_else(never, at)
    }
}
