/*!
Whole-buffer helpers.

Each helper opens one session, walks the message with [`ChunkPlanner`]
offsets and finishes the session, so callers holding the complete message
in memory never deal with the lifecycle themselves.
*/

use log::warn;
use zeroize::Zeroize;

use crate::core::channel::CommandChannel;
use crate::core::chunk::ChunkPlanner;
use crate::core::config::StreamConfig;
use crate::core::constants::sizes;
use crate::core::element::{CipherDirection, CmacTag, SecureElement};
use crate::core::error::{Error, Result};
use crate::core::key::KeyHandle;
use crate::core::session::{ChaCha20Session, CmacSession, GcmSession, blocks_for};

/// CMAC over `message`
pub fn cmac_buffer<E: SecureElement>(
    channel: &CommandChannel<E>,
    key: &KeyHandle,
    message: &[u8],
    config: StreamConfig,
) -> Result<CmacTag> {
    let mut session = CmacSession::with_config(channel, key, config)?;
    session.start()?;

    let planner = ChunkPlanner::new(message.len(), config.plain_chunk_capacity)?;
    for chunk in planner.chunks() {
        session.update(&message[chunk.input_range()])?;
    }
    session.finish()
}

/// AES-GCM encryption of `plaintext`; returns the ciphertext and the tag
pub fn gcm_encrypt_buffer<E: SecureElement>(
    channel: &CommandChannel<E>,
    key: &KeyHandle,
    iv: &[u8],
    associated_data: &[u8],
    plaintext: &[u8],
    config: StreamConfig,
) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut session =
        GcmSession::with_config(channel, key, CipherDirection::Encrypt, iv, associated_data, config)?;
    session.start()?;

    let mut ciphertext = vec![0u8; plaintext.len()];
    let written = gcm_walk(&mut session, plaintext, &mut ciphertext, config)?;
    let (tail, tag) = session.finish()?;
    ciphertext[written..written + tail.len()].copy_from_slice(&tail);
    Ok((ciphertext, tag))
}

/// AES-GCM decryption that only returns plaintext once the tag has verified
///
/// On `TagMismatch` everything decrypted so far is wiped.
pub fn decrypt_verified<E: SecureElement>(
    channel: &CommandChannel<E>,
    key: &KeyHandle,
    iv: &[u8],
    associated_data: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
    config: StreamConfig,
) -> Result<Vec<u8>> {
    let mut session =
        GcmSession::with_config(channel, key, CipherDirection::Decrypt, iv, associated_data, config)?;
    session.start()?;

    let mut plaintext = vec![0u8; ciphertext.len()];
    let written = match gcm_walk(&mut session, ciphertext, &mut plaintext, config) {
        Ok(written) => written,
        Err(e) => {
            plaintext.zeroize();
            abandon(&mut session);
            return Err(e);
        }
    };

    match session.finish_and_verify(tag) {
        Ok(tail) => {
            plaintext[written..written + tail.len()].copy_from_slice(&tail);
            Ok(plaintext)
        }
        Err(e) => {
            plaintext.zeroize();
            abandon(&mut session);
            Err(e)
        }
    }
}

/// Release the channel after a failed step, keeping the step's error
///
/// Element failures and tag mismatches already ended the session, so its
/// abort reports `InvalidSequence`; anything else is logged.
fn abandon<E: SecureElement>(session: &mut GcmSession<'_, E>) {
    match session.abort() {
        Ok(()) | Err(Error::InvalidSequence { .. }) => {}
        Err(e) => warn!("decrypt_verified: abort after failure also failed: {}", e),
    }
}

/// ChaCha20 over `data` starting at block `initial_counter`
///
/// Chunks are block aligned, and the counter for each one is advanced by the
/// blocks the previous chunks consumed.
pub fn chacha20_buffer<E: SecureElement>(
    channel: &CommandChannel<E>,
    key: &KeyHandle,
    direction: CipherDirection,
    nonce: &[u8],
    initial_counter: u32,
    data: &[u8],
    config: StreamConfig,
) -> Result<Vec<u8>> {
    let mut session = ChaCha20Session::with_config(channel, key, direction, nonce, config)?;
    session.start()?;

    let block = sizes::chacha::BLOCK_SIZE;
    let capacity = (config.plain_chunk_capacity / block * block).max(block);
    let planner = ChunkPlanner::new(data.len(), capacity)?;

    let mut output = vec![0u8; data.len()];
    let mut counter = initial_counter;
    for chunk in planner.chunks() {
        session.update(counter, chunk.offset_in, chunk.length, data, &mut output)?;
        counter = match u32::try_from(u64::from(counter) + blocks_for(chunk.length)) {
            Ok(next) => next,
            Err(_) => return Err(Error::InvalidParameter("block counter exhausted".into())),
        };
    }
    session.finish()?;
    Ok(output)
}

/// Feed `input` through an open GCM session chunk by chunk into `output`
fn gcm_walk<E: SecureElement>(
    session: &mut GcmSession<'_, E>,
    input: &[u8],
    output: &mut [u8],
    config: StreamConfig,
) -> Result<usize> {
    let planner = ChunkPlanner::new(input.len(), config.plain_chunk_capacity)?;
    let mut written = 0;
    for chunk in planner.chunks() {
        written += session.update_into(&input[chunk.input_range()], &mut output[written..])?;
    }
    Ok(written)
}
