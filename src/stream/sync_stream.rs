/*!
Synchronous streaming over `Read`/`Write`.

[`SyncStream`] owns one read buffer and drives an already started session
from a reader, writing whatever the session releases to a writer. Reads fill
the buffer completely before each update, so every update except the last
is buffer-sized.
*/

use std::io::{self, Read, Write};

use log::debug;
use zeroize::Zeroizing;

use crate::core::config::StreamConfig;
use crate::core::constants::{defaults, sizes};
use crate::core::element::{CmacTag, SecureElement};
use crate::core::error::{Error, Result};
use crate::core::session::{ChaCha20Session, CmacSession, GcmSession, blocks_for};
use crate::param_err;

/// Drives sessions from readers into writers
pub struct SyncStream {
    buffer: Zeroizing<Vec<u8>>,
}

impl SyncStream {
    /// Create a stream reading `chunk_size` bytes at a time
    ///
    /// `chunk_size` must be a non-zero multiple of 64 so ChaCha20 counters
    /// stay block aligned between reads.
    pub fn new(chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 || chunk_size % sizes::chacha::BLOCK_SIZE != 0 {
            return param_err!(
                "chunk size {} must be a non-zero multiple of {}",
                chunk_size,
                sizes::chacha::BLOCK_SIZE
            );
        }
        Ok(Self {
            buffer: Zeroizing::new(vec![0u8; chunk_size]),
        })
    }

    /// Create a stream sized for `config`, rounded down to whole ChaCha20 blocks
    pub fn with_config(config: &StreamConfig) -> Result<Self> {
        let block = sizes::chacha::BLOCK_SIZE;
        Self::new((config.plain_chunk_capacity / block * block).max(block))
    }

    /// Bytes read per update
    pub fn chunk_size(&self) -> usize {
        self.buffer.len()
    }

    /// Absorb everything `reader` yields into a started CMAC session and finish it
    pub fn mac_reader<E: SecureElement, R: Read>(
        &mut self,
        session: &mut CmacSession<'_, E>,
        reader: &mut R,
    ) -> Result<CmacTag> {
        let mut total = 0u64;
        loop {
            let n = read_full(reader, &mut self.buffer)?;
            if n == 0 {
                break;
            }
            session.update(&self.buffer[..n])?;
            total += n as u64;
        }
        debug!("mac_reader: absorbed {} bytes", total);
        session.finish()
    }

    /// Encrypt `reader` through a started GCM session into `writer`
    ///
    /// Finishes the session, writes the final bytes and returns the tag.
    pub fn seal_to_writer<E: SecureElement, R: Read, W: Write>(
        &mut self,
        session: &mut GcmSession<'_, E>,
        reader: &mut R,
        writer: &mut W,
    ) -> Result<Vec<u8>> {
        let mut total = self.gcm_pump(session, reader, writer)?;
        let (tail, tag) = session.finish()?;
        writer.write_all(&tail)?;
        total += tail.len() as u64;
        debug!("seal_to_writer: wrote {} bytes", total);
        Ok(tag)
    }

    /// Decrypt `reader` through a started GCM session into `writer`
    ///
    /// Plaintext is written as the element releases it, before the tag is
    /// checked; only the final bytes are held back until `expected_tag`
    /// verifies. Use [`crate::stream::decrypt_verified`] when nothing may be
    /// released unverified.
    pub fn open_to_writer<E: SecureElement, R: Read, W: Write>(
        &mut self,
        session: &mut GcmSession<'_, E>,
        reader: &mut R,
        writer: &mut W,
        expected_tag: &[u8],
    ) -> Result<u64> {
        let mut total = self.gcm_pump(session, reader, writer)?;
        let tail = session.finish_and_verify(expected_tag)?;
        writer.write_all(&tail)?;
        total += tail.len() as u64;
        Ok(total)
    }

    /// Run `reader` through a started ChaCha20 session into `writer`
    ///
    /// Returns the block counter following the last byte processed.
    pub fn chacha20_to_writer<E: SecureElement, R: Read, W: Write>(
        &mut self,
        session: &mut ChaCha20Session<'_, E>,
        initial_counter: u32,
        reader: &mut R,
        writer: &mut W,
    ) -> Result<u32> {
        let mut counter = initial_counter;
        let mut output = Zeroizing::new(vec![0u8; self.buffer.len()]);
        loop {
            let n = read_full(reader, &mut self.buffer)?;
            if n == 0 {
                break;
            }
            session.update(counter, 0, n, &self.buffer[..n], &mut output[..n])?;
            writer.write_all(&output[..n])?;
            counter = u32::try_from(u64::from(counter) + blocks_for(n))
                .map_err(|_| Error::InvalidParameter("block counter exhausted".into()))?;
        }
        Ok(counter)
    }

    fn gcm_pump<E: SecureElement, R: Read, W: Write>(
        &mut self,
        session: &mut GcmSession<'_, E>,
        reader: &mut R,
        writer: &mut W,
    ) -> Result<u64> {
        let mut output = Zeroizing::new(vec![0u8; self.buffer.len() + sizes::aes::BLOCK_SIZE]);
        let mut total = 0u64;
        loop {
            let n = read_full(reader, &mut self.buffer)?;
            if n == 0 {
                break;
            }
            let produced = session.update_into(&self.buffer[..n], &mut output)?;
            writer.write_all(&output[..produced])?;
            total += produced as u64;
        }
        Ok(total)
    }
}

impl Default for SyncStream {
    fn default() -> Self {
        Self {
            buffer: Zeroizing::new(vec![0u8; defaults::READ_BUFFER_SIZE]),
        }
    }
}

/// Read until `buffer` is full or the reader is exhausted
fn read_full<R: Read>(reader: &mut R, buffer: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(filled)
}
