//! Type-safe identifiers.
//!
//! Message ids are wall-clock milliseconds, bumped when two messages are
//! created within the same millisecond so that locally generated ids stay
//! strictly increasing for the lifetime of the process.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ============================================================================
// Counters
// ============================================================================

/// Last id handed out by [`MessageId::next`].
static LAST_MESSAGE_ID: AtomicU64 = AtomicU64::new(0);

// ============================================================================
// MessageId
// ============================================================================

/// Identifier of a [`ChannelMessage`](crate::ChannelMessage).
///
/// Serialized as a bare JSON number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(u64);

impl MessageId {
    /// Wraps a raw id, e.g. one received from the remote peer.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Generates a fresh id for a locally originated message.
    #[must_use]
    pub fn next() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);

        let mut last = LAST_MESSAGE_ID.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last.saturating_add(1));
            match LAST_MESSAGE_ID.compare_exchange_weak(
                last,
                candidate,
                Ordering::SeqCst,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Self(candidate),
                Err(actual) => last = actual,
            }
        }
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
