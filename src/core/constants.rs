/*!
Constants for streaming secure-element sessions.

Working-buffer sizing and algorithm parameter sizes shared by the
sessions, the chunk planner and the software reference element.
*/

/// Default plaintext working-buffer capacity per primitive call
pub const DEFAULT_PLAIN_CHUNK: usize = 256;

/// Default ciphertext working-buffer capacity (plaintext chunk plus one tag/block)
pub const DEFAULT_CIPHER_CHUNK: usize = DEFAULT_PLAIN_CHUNK + sizes::gcm::MAX_TAG_SIZE;

/// Size constants
pub mod sizes {
    /// AES block cipher constants
    pub mod aes {
        /// AES block size in bytes
        pub const BLOCK_SIZE: usize = 16;

        /// AES-128 key size in bytes
        pub const KEY_SIZE_128: usize = 16;

        /// AES-192 key size in bytes
        pub const KEY_SIZE_192: usize = 24;

        /// AES-256 key size in bytes
        pub const KEY_SIZE_256: usize = 32;
    }

    /// CMAC constants
    pub mod cmac {
        /// Size of a CMAC tag in bytes
        pub const TAG_SIZE: usize = 16;
    }

    /// AES-GCM constants
    pub mod gcm {
        /// Only IV length accepted by the element
        pub const IV_SIZE: usize = 12;

        /// Smallest tag the element will produce or check
        pub const MIN_TAG_SIZE: usize = 4;

        /// Largest (and default) tag size
        pub const MAX_TAG_SIZE: usize = 16;

        /// Upper bound on total text per message: 2^36 - 32 bytes
        pub const MAX_TEXT_LEN: u64 = 0xF_FFFF_FFE0;
    }

    /// ChaCha20 constants
    pub mod chacha {
        /// ChaCha20 key size in bytes
        pub const KEY_SIZE: usize = 32;

        /// ChaCha20 nonce size in bytes
        pub const NONCE_SIZE: usize = 12;

        /// ChaCha20 keystream block size in bytes
        pub const BLOCK_SIZE: usize = 64;

        /// Size of the block counter on the wire
        pub const COUNTER_SIZE: usize = 4;

        /// ChaCha20-Poly1305 tag size in bytes
        pub const TAG_SIZE: usize = 16;
    }
}

/// Configuration defaults
pub mod defaults {
    /// Default GCM tag length
    pub const TAG_LENGTH: usize = super::sizes::gcm::MAX_TAG_SIZE;

    /// Chunk size used by the stream helpers when reading from a reader
    pub const READ_BUFFER_SIZE: usize = 4096;
}
