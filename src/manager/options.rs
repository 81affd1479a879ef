//! Connection manager configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use chat_channel::ManagerOptions;
//!
//! let options = ManagerOptions::new("ws://localhost:8080")
//!     .with_retry_interval(Duration::from_secs(1))
//!     .with_max_retries(10)
//!     .on_error(|info| eprintln!("channel error: {info}"));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default delay between automatic reconnection attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(3000);

/// Default number of consecutive automatic reconnection attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default delay between an explicit reconnect and the new connect.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(100);

// ============================================================================
// Hook Types
// ============================================================================

/// Called when the channel opens or closes.
pub type LifecycleHook = Arc<dyn Fn() + Send + Sync>;

/// Called with the description of every transport error.
pub type ErrorHook = Arc<dyn Fn(&str) + Send + Sync>;

// ============================================================================
// ManagerOptions
// ============================================================================

/// Configuration for a [`ConnectionManager`](crate::ConnectionManager).
///
/// Hooks run after the manager has applied the event, outside of its
/// internal lock, so they may call back into the manager.
#[derive(Clone)]
pub struct ManagerOptions {
    address: String,
    retry_interval: Duration,
    max_retries: u32,
    reconnect_delay: Duration,
    on_open: Option<LifecycleHook>,
    on_close: Option<LifecycleHook>,
    on_error: Option<ErrorHook>,
}

impl fmt::Debug for ManagerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerOptions")
            .field("address", &self.address)
            .field("retry_interval", &self.retry_interval)
            .field("max_retries", &self.max_retries)
            .field("reconnect_delay", &self.reconnect_delay)
            .field("on_open", &self.on_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ManagerOptions {
    /// Creates options for `address` with default retry settings.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            retry_interval: DEFAULT_RETRY_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            on_open: None,
            on_close: None,
            on_error: None,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ManagerOptions {
    /// Sets the delay between automatic reconnection attempts.
    #[inline]
    #[must_use]
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Sets how many consecutive reconnections are attempted.
    ///
    /// `0` disables automatic reconnection.
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the delay used by an explicit reconnect.
    #[inline]
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Registers a hook called each time the channel opens.
    #[must_use]
    pub fn on_open(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_open = Some(Arc::new(hook));
        self
    }

    /// Registers a hook called each time the channel closes, whether the
    /// link was lost or closed by `disconnect` / `reconnect`.
    #[must_use]
    pub fn on_close(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_close = Some(Arc::new(hook));
        self
    }

    /// Registers a hook called for every transport error.
    #[must_use]
    pub fn on_error(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(hook));
        self
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl ManagerOptions {
    /// Channel address.
    #[inline]
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Delay between automatic reconnection attempts.
    #[inline]
    #[must_use]
    pub const fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// Maximum consecutive automatic reconnection attempts.
    #[inline]
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay used by an explicit reconnect.
    #[inline]
    #[must_use]
    pub const fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    pub(crate) fn notify_open(&self) {
        if let Some(hook) = &self.on_open {
            hook();
        }
    }

    pub(crate) fn notify_close(&self) {
        if let Some(hook) = &self.on_close {
            hook();
        }
    }

    pub(crate) fn notify_error(&self, info: &str) {
        if let Some(hook) = &self.on_error {
            hook(info);
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ManagerOptions {
    /// Checks that the options can drive a manager.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the address is empty.
    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(Error::config(
                "Channel address is required.\n\
                 Example: ManagerOptions::new(\"ws://localhost:8080\")",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_defaults() {
        let options = ManagerOptions::new("ws://localhost:8080");
        assert_eq!(options.address(), "ws://localhost:8080");
        assert_eq!(options.retry_interval(), Duration::from_millis(3000));
        assert_eq!(options.max_retries(), 5);
        assert_eq!(options.reconnect_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_builder_methods() {
        let options = ManagerOptions::new("ws://x")
            .with_retry_interval(Duration::from_millis(100))
            .with_max_retries(2)
            .with_reconnect_delay(Duration::from_millis(5));

        assert_eq!(options.retry_interval(), Duration::from_millis(100));
        assert_eq!(options.max_retries(), 2);
        assert_eq!(options.reconnect_delay(), Duration::from_millis(5));
    }

    #[test]
    fn test_validate_rejects_empty_address() {
        let err = ManagerOptions::new("  ").validate().unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("address"));
        assert!(ManagerOptions::new("ws://x").validate().is_ok());
    }

    #[test]
    fn test_hooks_are_invoked() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (open, close, error) = (calls.clone(), calls.clone(), calls.clone());

        let options = ManagerOptions::new("ws://x")
            .on_open(move || {
                open.fetch_add(1, Ordering::SeqCst);
            })
            .on_close(move || {
                close.fetch_add(10, Ordering::SeqCst);
            })
            .on_error(move |info| {
                assert_eq!(info, "boom");
                error.fetch_add(100, Ordering::SeqCst);
            });

        options.notify_open();
        options.notify_close();
        options.notify_error("boom");

        assert_eq!(calls.load(Ordering::SeqCst), 111);
    }

    #[test]
    fn test_missing_hooks_are_noops() {
        let options = ManagerOptions::new("ws://x");
        options.notify_open();
        options.notify_close();
        options.notify_error("ignored");
    }

    #[test]
    fn test_debug_hides_hooks() {
        let options = ManagerOptions::new("ws://x").on_open(|| {});
        let debug = format!("{options:?}");
        assert!(debug.contains("on_open: true"));
        assert!(debug.contains("on_close: false"));
    }
}
