/*!
Streaming AES-GCM session.

Encryption and decryption are the same state machine run in opposite
directions. The element holds back partial blocks, so the output of a single
update can lag its input by up to one block; the totals always agree once
the session is finished.

Decryption releases plaintext chunk by chunk as it is produced. That output
is unauthenticated until `finish_and_verify` succeeds; callers that must not
see unverified plaintext should use [`crate::stream::decrypt_verified`].
*/

use log::{trace, warn};
use zeroize::{Zeroize, Zeroizing};

use crate::core::channel::CommandChannel;
use crate::core::chunk::ChunkPlanner;
use crate::core::config::StreamConfig;
use crate::core::constants::sizes;
use crate::core::element::{CipherDirection, SecureElement};
use crate::core::error::{Error, Result, SessionId};
use crate::core::key::KeyHandle;
use crate::core::security::verify_tag;
use crate::core::session::base::SessionBase;
use crate::core::session::state::{Phase, SessionMode};
use crate::param_err;

const BLOCK: usize = sizes::aes::BLOCK_SIZE;

/// Multipart AES-GCM encryption or decryption
pub struct GcmSession<'a, E: SecureElement> {
    base: SessionBase<'a, E>,
    direction: CipherDirection,
    iv: [u8; sizes::gcm::IV_SIZE],
    associated_data: Vec<u8>,
    ctx: Option<E::GcmContext>,
    work: Zeroizing<Vec<u8>>,
    bytes_in: u64,
    bytes_out: u64,
}

impl<'a, E: SecureElement> GcmSession<'a, E> {
    /// Create an idle session with the default configuration
    pub fn new(
        channel: &'a CommandChannel<E>,
        key: &'a KeyHandle,
        direction: CipherDirection,
        iv: &[u8],
        associated_data: &[u8],
    ) -> Result<Self> {
        Self::with_config(channel, key, direction, iv, associated_data, StreamConfig::default())
    }

    /// Create an idle session
    ///
    /// The key must be an AES key and the IV 12 bytes; the tag length comes
    /// from `config` and must be 4 to 16 bytes. IV and associated data are
    /// fixed for the life of the session.
    pub fn with_config(
        channel: &'a CommandChannel<E>,
        key: &'a KeyHandle,
        direction: CipherDirection,
        iv: &[u8],
        associated_data: &[u8],
        config: StreamConfig,
    ) -> Result<Self> {
        if !key.algorithm_family().is_aes() {
            return param_err!("GCM needs an AES key, got {}", key.algorithm_family());
        }
        let iv: [u8; sizes::gcm::IV_SIZE] = match iv.try_into() {
            Ok(iv) => iv,
            Err(_) => {
                return param_err!("GCM IV must be {} bytes, got {}", sizes::gcm::IV_SIZE, iv.len());
            }
        };

        let base = SessionBase::new(channel, key, config, SessionMode::gcm(direction))?;
        Ok(Self {
            base,
            direction,
            iv,
            associated_data: associated_data.to_vec(),
            ctx: None,
            work: Zeroizing::new(vec![0u8; config.cipher_chunk_capacity]),
            bytes_in: 0,
            bytes_out: 0,
        })
    }

    /// Create and start an encrypting session
    pub fn begin_encrypt(
        channel: &'a CommandChannel<E>,
        key: &'a KeyHandle,
        iv: &[u8],
        associated_data: &[u8],
    ) -> Result<Self> {
        let mut session = Self::new(channel, key, CipherDirection::Encrypt, iv, associated_data)?;
        session.start()?;
        Ok(session)
    }

    /// Create and start a decrypting session
    pub fn begin_decrypt(
        channel: &'a CommandChannel<E>,
        key: &'a KeyHandle,
        iv: &[u8],
        associated_data: &[u8],
    ) -> Result<Self> {
        let mut session = Self::new(channel, key, CipherDirection::Decrypt, iv, associated_data)?;
        session.start()?;
        Ok(session)
    }

    /// Take the channel and absorb IV and associated data
    pub fn start(&mut self) -> Result<()> {
        self.base.open()?;
        let key = self.base.key;
        let direction = self.direction;
        let iv = &self.iv;
        let associated_data = &self.associated_data;
        let ctx = self
            .base
            .command(|se| se.gcm_multipart_start(key, direction, iv, associated_data))?;
        self.ctx = Some(ctx);
        Ok(())
    }

    /// Bytes the next update of `input_len` bytes can produce at most
    pub fn max_output_len(&self, input_len: usize) -> usize {
        let held = (self.bytes_in - self.bytes_out) as usize;
        (held + input_len) / BLOCK * BLOCK
    }

    /// Process `input`, returning whatever output the element released
    pub fn update(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = vec![0u8; self.max_output_len(input.len())];
        let written = self.update_into(input, &mut output)?;
        output.truncate(written);
        Ok(output)
    }

    /// Process `input` into `output`, returning the number of bytes written
    ///
    /// `output` must hold at least [`max_output_len`](Self::max_output_len) bytes.
    pub fn update_into(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        self.base.ensure_open()?;
        let needed = self.max_output_len(input.len());
        if output.len() < needed {
            return param_err!("output buffer holds {} bytes, update may write {}", output.len(), needed);
        }

        let key = self.base.key;
        let planner = ChunkPlanner::new(input.len(), self.base.config.plain_chunk_capacity)?;
        let mut written = 0;

        for chunk in planner.chunks().filter(|chunk| !chunk.is_empty()) {
            let ctx = self
                .ctx
                .as_mut()
                .ok_or_else(|| Error::Internal("GCM context missing".into()))?;
            let src = &input[chunk.input_range()];
            let work = &mut self.work[..];
            let produced = self
                .base
                .command(|se| se.gcm_multipart_update(ctx, key, src, work))?;

            // Output may never overtake input, nor overflow either buffer
            let consumed = self.bytes_in + (chunk.offset_in + chunk.length) as u64;
            let released = self.bytes_out + (written + produced) as u64;
            let room = (output.len() - written).min(self.work.len());
            if produced > room || released > consumed {
                return Err(self.base.reject_reply(format!(
                    "GCM update released {} bytes ({} of {} consumed), room for {}",
                    produced, released, consumed, room
                )));
            }

            output[written..written + produced].copy_from_slice(&self.work[..produced]);
            written += produced;
            trace!(
                "gcm {}: chunk at {} took {} bytes, released {}",
                self.direction, chunk.offset_in, chunk.length, produced
            );
        }

        self.bytes_in += input.len() as u64;
        self.bytes_out += written as u64;
        self.base.mark_updated()?;
        Ok(written)
    }

    /// Finish an encrypting session: final output bytes and the tag
    ///
    /// The tag is `tag_length` bytes long. The channel is released.
    pub fn finish(&mut self) -> Result<(Vec<u8>, Vec<u8>)> {
        if self.direction != CipherDirection::Encrypt {
            return param_err!("decrypting sessions finish with finish_and_verify");
        }
        let (tail, computed) = self.finish_inner()?;
        let tag = computed[..self.base.config.tag_length].to_vec();
        Ok((tail, tag))
    }

    /// Finish a decrypting session, checking `expected_tag` in constant time
    ///
    /// On mismatch the final output is wiped and `TagMismatch` returned. The
    /// channel is released either way.
    pub fn finish_and_verify(&mut self, expected_tag: &[u8]) -> Result<Vec<u8>> {
        if self.direction != CipherDirection::Decrypt {
            return param_err!("encrypting sessions finish with finish");
        }
        let tag_length = self.base.config.tag_length;
        if expected_tag.len() != tag_length {
            return param_err!("expected a {}-byte tag, got {}", tag_length, expected_tag.len());
        }

        let (mut tail, mut computed) = self.finish_inner()?;
        let verdict = verify_tag(&computed[..tag_length], expected_tag);
        computed.zeroize();

        match verdict {
            Ok(()) => Ok(tail),
            Err(e) => {
                tail.zeroize();
                warn!("gcm decrypt: authentication tag mismatch");
                Err(e)
            }
        }
    }

    fn finish_inner(&mut self) -> Result<(Vec<u8>, [u8; sizes::gcm::MAX_TAG_SIZE])> {
        self.base.ensure_open()?;
        let key = self.base.key;
        let mut ctx = self
            .ctx
            .take()
            .ok_or_else(|| Error::Internal("GCM context missing".into()))?;
        let work = &mut self.work[..];
        let fin = self.base.command(|se| se.gcm_multipart_finish(&mut ctx, key, work))?;

        if fin.output_len > self.work.len() || self.bytes_out + fin.output_len as u64 != self.bytes_in {
            self.work.zeroize();
            return Err(self.base.reject_reply(format!(
                "GCM finish released {} bytes, {} were held back",
                fin.output_len,
                self.bytes_in - self.bytes_out
            )));
        }

        let tail = self.work[..fin.output_len].to_vec();
        self.work.zeroize();
        self.bytes_out += fin.output_len as u64;
        self.base.close()?;
        Ok((tail, fin.tag))
    }

    /// Abandon the session and release the channel
    pub fn abort(&mut self) -> Result<()> {
        self.ctx = None;
        self.work.zeroize();
        self.base.abort()
    }

    /// Direction of the session
    pub fn direction(&self) -> CipherDirection {
        self.direction
    }

    /// Tag length in bytes
    pub fn tag_length(&self) -> usize {
        self.base.config.tag_length
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.base.phase()
    }

    /// Mode the session runs in
    pub fn mode(&self) -> SessionMode {
        self.base.mode()
    }

    /// Session id while the channel is held
    pub fn session_id(&self) -> Option<SessionId> {
        self.base.session_id()
    }
}
