//! Connection manager module.
//!
//! This module provides the client-side manager of one persistent channel.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ConnectionManager`] | Owns the link, timers and message sequence |
//! | [`ManagerOptions`] | Address, retry policy and hooks |
//! | [`Machine`] | Pure connection state machine |
//! | [`RetryBudget`] | Bounded reconnection counter |
//! | [`Snapshot`] | Read-only view for the presentation layer |
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use chat_channel::{ConnectionManager, ManagerOptions, Result, WebSocketTransport};
//!
//! # async fn example() -> Result<()> {
//! let options = ManagerOptions::new("ws://localhost:8080")
//!     .with_retry_interval(Duration::from_secs(1))
//!     .with_max_retries(3);
//!
//! let manager = ConnectionManager::new(options, WebSocketTransport::new())?;
//! manager.connect();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Connection manager runtime.
pub mod core;

/// Manager configuration.
pub mod options;

/// Bounded reconnection budget.
pub mod retry;

/// Read-only manager view.
pub mod snapshot;

/// Connection state machine.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::ConnectionManager;
pub use options::{
    DEFAULT_MAX_RETRIES, DEFAULT_RECONNECT_DELAY, DEFAULT_RETRY_INTERVAL, ErrorHook,
    LifecycleHook, ManagerOptions,
};
pub use retry::RetryBudget;
pub use snapshot::Snapshot;
pub use state::{ConnectionState, Effect, Event, IllegalTransition, Machine, TimerKind, Transition};
