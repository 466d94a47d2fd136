// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Cooperative cancellation of a run

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Cancellation signal shared between a scheduler and its callers.
///
/// The scheduler checks it before starting each descriptor; a fill step that
/// is already running always completes.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    reason: Arc<Mutex<Option<String>>>,
    deadline: Arc<Mutex<Option<Instant>>>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            reason: Arc::new(Mutex::new(None)),
            deadline: Arc::new(Mutex::new(None)),
        }
    }

    /// Cancel automatically once `timeout` has elapsed from now
    pub fn set_timeout(&self, timeout: Duration) {
        *self.deadline.lock() = Some(Instant::now() + timeout);
    }

    /// Request cancellation with an optional reason
    pub fn cancel(&self, reason: Option<&str>) {
        if let Some(reason) = reason {
            *self.reason.lock() = Some(reason.to_string());
        }
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested, counting an expired timeout
    pub fn is_cancelled(&self) -> bool {
        self.check_timeout();
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn reason(&self) -> Option<String> {
        self.reason.lock().clone()
    }

    /// Clear the signal, reason, and deadline
    pub fn reset(&self) {
        *self.reason.lock() = None;
        *self.deadline.lock() = None;
        self.cancelled.store(false, Ordering::Release);
    }

    fn check_timeout(&self) {
        let expired = matches!(*self.deadline.lock(), Some(deadline) if Instant::now() >= deadline);
        if expired && !self.cancelled.load(Ordering::Acquire) {
            self.cancel(Some("Timeout"));
        }
    }
}
