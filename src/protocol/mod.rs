//! Channel wire protocol.
//!
//! # Protocol Overview
//!
//! | Direction | Frame |
//! |-----------|-------|
//! | Local → Remote | Plain trimmed text |
//! | Remote → Local | JSON [`ChannelMessage`] |
//!
//! The asymmetry matches the remote peer: it reads raw text and answers
//! with structured messages.

// ============================================================================
// Submodules
// ============================================================================

/// Channel message and sender types.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use message::{ChannelMessage, Sender};
