//! Core components for streaming secure-element sessions.
//!
//! This module contains the building blocks of the crate: the element
//! command interface, the command channel, key handles, chunk planning,
//! the sessions themselves and error handling.

// Error handling
pub mod error;

// Sizes and defaults
pub mod constants;

// Session configuration
pub mod config;

// Key handles
pub mod key;

// Chunk planning
pub mod chunk;

// Constant-time helpers
pub mod security;

// Secure-element command layer
pub mod element;

// Exclusive command channel
pub mod channel;

// Streaming sessions
pub mod session;

// Re-exports for convenience
pub use self::channel::{ChannelId, ChannelLease, CommandChannel};
pub use self::chunk::{Chunk, ChunkPlanner};
pub use self::config::StreamConfig;
pub use self::error::{Error, Result, SeStatus, SessionId};
pub use self::key::{AlgorithmFamily, KeyHandle, StorageClass};
