/*!
Security utilities for streaming sessions.

Constant-time comparison of authentication tags.
*/

// Constant-time operations to prevent timing attacks
pub mod constant_time;

// Re-export main components
pub use constant_time::{constant_time_eq, verify_tag};
