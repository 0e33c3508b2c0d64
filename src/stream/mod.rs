//! Streaming helpers built on the sessions.
//!
//! Whole-buffer helpers walk an in-memory message with chunk planner
//! offsets; the synchronous stream drives sessions from readers into writers.

// Whole-buffer helpers
pub mod buffer;

// Synchronous Read/Write streaming
pub mod sync_stream;

pub use self::buffer::{chacha20_buffer, cmac_buffer, decrypt_verified, gcm_encrypt_buffer};
pub use self::sync_stream::SyncStream;
