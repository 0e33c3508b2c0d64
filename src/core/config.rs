/*!
Session configuration.

Controls the working-buffer sizes a session uses when splitting messages
into primitive calls, and the GCM tag length.
*/

use crate::core::constants::{DEFAULT_CIPHER_CHUNK, DEFAULT_PLAIN_CHUNK, defaults, sizes};
use crate::core::error::Result;
use crate::param_err;

#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

/// Working-buffer and tag configuration for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct StreamConfig {
    /// Largest input slice handed to one primitive call
    pub plain_chunk_capacity: usize,
    /// Size of the output working buffer; must hold one input chunk plus a block
    pub cipher_chunk_capacity: usize,
    /// GCM tag length in bytes
    pub tag_length: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            plain_chunk_capacity: DEFAULT_PLAIN_CHUNK,
            cipher_chunk_capacity: DEFAULT_CIPHER_CHUNK,
            tag_length: defaults::TAG_LENGTH,
        }
    }
}

impl StreamConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Small buffers for memory-constrained targets
    pub fn embedded() -> Self {
        Self {
            plain_chunk_capacity: 64,
            cipher_chunk_capacity: 64 + sizes::gcm::MAX_TAG_SIZE,
            tag_length: defaults::TAG_LENGTH,
        }
    }

    /// Large buffers to cut per-command overhead
    pub fn high_throughput() -> Self {
        Self {
            plain_chunk_capacity: 4096,
            cipher_chunk_capacity: 4096 + sizes::gcm::MAX_TAG_SIZE,
            tag_length: defaults::TAG_LENGTH,
        }
    }

    /// Set the plaintext chunk capacity, growing the cipher buffer to match
    pub fn with_chunk_capacity(mut self, capacity: usize) -> Self {
        self.plain_chunk_capacity = capacity;
        self.cipher_chunk_capacity = capacity + sizes::gcm::MAX_TAG_SIZE;
        self
    }

    /// Set the GCM tag length
    pub fn with_tag_length(mut self, tag_length: usize) -> Self {
        self.tag_length = tag_length;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.plain_chunk_capacity == 0 {
            return param_err!("plain chunk capacity must be non-zero");
        }

        // GCM may hold back up to one block, which is emitted with the next chunk
        if self.cipher_chunk_capacity < self.plain_chunk_capacity + sizes::aes::BLOCK_SIZE {
            return param_err!(
                "cipher chunk capacity {} cannot hold a {}-byte chunk plus one block",
                self.cipher_chunk_capacity,
                self.plain_chunk_capacity
            );
        }

        validate_tag_length(self.tag_length)
    }
}

/// Check a GCM tag length against the range the element supports
pub fn validate_tag_length(tag_length: usize) -> Result<()> {
    if !(sizes::gcm::MIN_TAG_SIZE..=sizes::gcm::MAX_TAG_SIZE).contains(&tag_length) {
        return param_err!(
            "tag length {} outside {}..={}",
            tag_length,
            sizes::gcm::MIN_TAG_SIZE,
            sizes::gcm::MAX_TAG_SIZE
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        assert!(StreamConfig::default().validate().is_ok());
        assert!(StreamConfig::embedded().validate().is_ok());
        assert!(StreamConfig::high_throughput().validate().is_ok());

        let config = StreamConfig::new();
        assert_eq!(config.plain_chunk_capacity, 256);
        assert_eq!(config.cipher_chunk_capacity, 272);
        assert_eq!(config.tag_length, 16);
    }

    #[test]
    fn test_invalid_configs() {
        assert!(StreamConfig::new().with_chunk_capacity(0).validate().is_err());
        assert!(StreamConfig::new().with_tag_length(3).validate().is_err());
        assert!(StreamConfig::new().with_tag_length(17).validate().is_err());

        let cramped = StreamConfig {
            plain_chunk_capacity: 256,
            cipher_chunk_capacity: 260,
            tag_length: 16,
        };
        assert!(cramped.validate().is_err());
    }

    #[test]
    fn test_tag_length_bounds() {
        for len in 4..=16 {
            assert!(validate_tag_length(len).is_ok());
        }
        assert!(validate_tag_length(0).is_err());
    }
}
