/*!
Streaming sessions.

Every session follows the same lifecycle: created Idle, `start` takes the
command channel, any number of updates, then `finish` (or `abort`) releases
the channel. A finished or aborted session is dead; any further call fails
with `InvalidSequence`.
*/

// Phase and mode tracking
pub mod state;

// Open-session bookkeeping across channels
pub mod registry;

// Shared lease/phase handling
mod base;

// Per-algorithm sessions
pub mod chacha20;
pub mod cmac;
pub mod gcm;

pub use self::chacha20::{ChaCha20Session, blocks_for, counter_to_wire};
pub use self::cmac::CmacSession;
pub use self::gcm::GcmSession;
pub use self::registry::{ActiveSession, SessionRegistry};
pub use self::state::{Phase, PhaseTracker, SessionMode};
