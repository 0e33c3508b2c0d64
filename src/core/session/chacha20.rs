/*!
ChaCha20 session.

Each update is one self-contained keystream application starting at a block
counter supplied by the caller. The session keeps no running counter; callers
advance it themselves, normally by [`blocks_for`] of the bytes just processed.
*/

use byteorder::{ByteOrder, LittleEndian};
use log::trace;

use crate::core::channel::CommandChannel;
use crate::core::chunk::ChunkPlanner;
use crate::core::config::StreamConfig;
use crate::core::constants::sizes;
use crate::core::element::{CipherDirection, SecureElement};
use crate::core::error::{Result, SessionId};
use crate::core::key::{AlgorithmFamily, KeyHandle};
use crate::core::session::base::SessionBase;
use crate::core::session::state::{Phase, SessionMode};
use crate::param_err;

const BLOCK: usize = sizes::chacha::BLOCK_SIZE;

/// Encode a block counter the way the element expects it: 4 bytes, little-endian
///
/// Independent of host byte order.
pub fn counter_to_wire(counter: u32) -> [u8; sizes::chacha::COUNTER_SIZE] {
    let mut wire = [0u8; sizes::chacha::COUNTER_SIZE];
    LittleEndian::write_u32(&mut wire, counter);
    wire
}

/// Number of keystream blocks consumed by `len` bytes
pub fn blocks_for(len: usize) -> u64 {
    len.div_ceil(BLOCK) as u64
}

/// ChaCha20 encryption or decryption with caller-managed block counters
pub struct ChaCha20Session<'a, E: SecureElement> {
    base: SessionBase<'a, E>,
    direction: CipherDirection,
    nonce: [u8; sizes::chacha::NONCE_SIZE],
}

impl<'a, E: SecureElement> ChaCha20Session<'a, E> {
    /// Create an idle session with the default configuration
    pub fn new(
        channel: &'a CommandChannel<E>,
        key: &'a KeyHandle,
        direction: CipherDirection,
        nonce: &[u8],
    ) -> Result<Self> {
        Self::with_config(channel, key, direction, nonce, StreamConfig::default())
    }

    /// Create an idle session; the key must be a ChaCha20 key and the nonce 12 bytes
    pub fn with_config(
        channel: &'a CommandChannel<E>,
        key: &'a KeyHandle,
        direction: CipherDirection,
        nonce: &[u8],
        config: StreamConfig,
    ) -> Result<Self> {
        if key.algorithm_family() != AlgorithmFamily::ChaCha20 {
            return param_err!("ChaCha20 needs a ChaCha20 key, got {}", key.algorithm_family());
        }
        let nonce = match nonce.try_into() {
            Ok(nonce) => nonce,
            Err(_) => {
                return param_err!(
                    "ChaCha20 nonce must be {} bytes, got {}",
                    sizes::chacha::NONCE_SIZE,
                    nonce.len()
                );
            }
        };

        Ok(Self {
            base: SessionBase::new(channel, key, config, SessionMode::chacha20(direction))?,
            direction,
            nonce,
        })
    }

    /// Create and start a session in one step
    pub fn begin(
        channel: &'a CommandChannel<E>,
        key: &'a KeyHandle,
        direction: CipherDirection,
        nonce: &[u8],
    ) -> Result<Self> {
        let mut session = Self::new(channel, key, direction, nonce)?;
        session.start()?;
        Ok(session)
    }

    /// Take the channel
    pub fn start(&mut self) -> Result<()> {
        self.base.open()
    }

    /// Process `input[offset..offset + length]` into `output[offset..offset + length]`
    ///
    /// `counter` is the block index the first byte at `offset` is encrypted
    /// with. Long ranges are split into block-aligned primitive calls, each
    /// with its own counter. The keystream ends at block `u32::MAX`, so
    /// `counter + blocks_for(length)` may not exceed it.
    pub fn update(
        &mut self,
        counter: u32,
        offset: usize,
        length: usize,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<()> {
        self.base.ensure_open()?;

        let end = match offset.checked_add(length) {
            Some(end) if end <= input.len() && end <= output.len() => end,
            _ => {
                return param_err!(
                    "range {}+{} exceeds buffers of {} and {} bytes",
                    offset,
                    length,
                    input.len(),
                    output.len()
                );
            }
        };
        if u64::from(counter) + blocks_for(length) > u64::from(u32::MAX) {
            return param_err!("block counter {} overflows over {} bytes", counter, length);
        }

        let key = self.base.key;
        let direction = self.direction;
        let nonce = self.nonce;
        let planner = ChunkPlanner::new(length, self.aligned_capacity())?;
        let input = &input[offset..end];
        let output = &mut output[offset..end];

        for chunk in planner.chunks().filter(|chunk| !chunk.is_empty()) {
            let block_counter = counter + (chunk.offset_in / BLOCK) as u32;
            let wire = counter_to_wire(block_counter);
            let src = &input[chunk.input_range()];
            let dst = &mut output[chunk.offset_out..chunk.offset_out + chunk.length];
            self.base
                .command(|se| se.chacha20_crypt(key, direction, &wire, &nonce, src, dst))?;
            trace!(
                "chacha20: {} bytes at {} from block {}",
                chunk.length,
                offset + chunk.offset_in,
                block_counter
            );
        }

        self.base.mark_updated()
    }

    /// Process a whole buffer starting at block `counter`
    pub fn crypt(&mut self, counter: u32, data: &[u8]) -> Result<Vec<u8>> {
        let mut output = vec![0u8; data.len()];
        self.update(counter, 0, data.len(), data, &mut output)?;
        Ok(output)
    }

    /// Release the channel; no trailing material is produced
    pub fn finish(&mut self) -> Result<()> {
        self.base.ensure_open()?;
        self.base.close()
    }

    /// Abandon the session and release the channel
    pub fn abort(&mut self) -> Result<()> {
        self.base.abort()
    }

    /// Direction of the session
    pub fn direction(&self) -> CipherDirection {
        self.direction
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.base.phase()
    }

    /// Session id while the channel is held
    pub fn session_id(&self) -> Option<SessionId> {
        self.base.session_id()
    }

    /// Chunk capacity rounded down to whole keystream blocks
    fn aligned_capacity(&self) -> usize {
        (self.base.config.plain_chunk_capacity / BLOCK * BLOCK).max(BLOCK)
    }
}
