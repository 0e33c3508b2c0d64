/*!
# se-stream

Multi-part symmetric cryptography over a secure-element command channel.

## Overview

A secure co-processor exposes its symmetric primitives as blocking commands
on a single channel. This crate drives those commands as streaming sessions:

- CMAC authentication over messages of any length
- AES-GCM encryption and decryption with configurable tag length
- ChaCha20 with caller-managed, little-endian block counters
- Chunk planning onto fixed-size working buffers
- One operation per channel at a time, enforced by an explicit lease
- Abort and drop both hand the channel back

A software reference element ([`SoftSecureElement`]) answers the same
commands, so everything runs without hardware.

## Example

```
use se_stream::{CommandChannel, GcmSession, KeyHandle, SoftSecureElement};

# fn main() -> se_stream::Result<()> {
let channel = CommandChannel::new(SoftSecureElement::initialized());
let key = KeyHandle::aes(&[0u8; 16])?;

let mut session = GcmSession::begin_encrypt(&channel, &key, &[0u8; 12], b"header")?;
let mut ciphertext = session.update(b"streamed ")?;
ciphertext.extend(session.update(b"payload")?);
let (tail, tag) = session.finish()?;
ciphertext.extend(tail);
assert_eq!(tag.len(), 16);
# Ok(())
# }
```
*/

// Core components
pub mod core;

// Streaming helpers
pub mod stream;

// Re-export commonly used types for convenience
pub use self::core::channel::{ChannelId, ChannelLease, CommandChannel};
pub use self::core::chunk::{Chunk, ChunkPlanner};
pub use self::core::config::StreamConfig;
pub use self::core::constants::{DEFAULT_CIPHER_CHUNK, DEFAULT_PLAIN_CHUNK, sizes};
pub use self::core::element::{
    CipherDirection, CmacTag, GcmFinish, GcmTag, Poly1305Tag, SecureElement, SoftSecureElement,
};
pub use self::core::error::{Error, Result, SeResult, SeStatus, SessionId};
pub use self::core::key::{AlgorithmFamily, KeyHandle, StorageClass};
pub use self::core::security::constant_time::{constant_time_eq, verify_tag};
pub use self::core::session::{
    ActiveSession, ChaCha20Session, CmacSession, GcmSession, Phase, SessionMode, SessionRegistry,
    blocks_for, counter_to_wire,
};
pub use self::stream::{SyncStream, decrypt_verified};
