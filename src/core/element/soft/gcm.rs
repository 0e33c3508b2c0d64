/*!
Block-buffered AES-GCM context.

Behaves like the element's multipart GCM: only whole 16-byte blocks are
processed on update, the residue is held until the next update or finish.
*/

use byteorder::{BigEndian, ByteOrder};
use ghash::GHash;
use ghash::universal_hash::UniversalHash;
use zeroize::Zeroize;

use super::aes::{AesBlock, AesCore, AesCtr};
use crate::core::constants::sizes;
use crate::core::element::traits::{CipherDirection, GcmFinish};
use crate::core::error::{SeResult, SeStatus};

const BLOCK: usize = sizes::aes::BLOCK_SIZE;

/// Running state of a software GCM operation
pub struct SoftGcmContext {
    direction: CipherDirection,
    ctr: AesCtr,
    ghash: GHash,
    tag_mask: AesBlock,
    pending: AesBlock,
    pending_len: usize,
    aad_len: u64,
    text_len: u64,
    finished: bool,
}

impl SoftGcmContext {
    pub(crate) fn start(
        key: &[u8],
        direction: CipherDirection,
        iv: &[u8],
        associated_data: &[u8],
    ) -> SeResult<Self> {
        if iv.len() != sizes::gcm::IV_SIZE {
            return Err(SeStatus::InvalidParameter);
        }
        let cipher = AesCore::new(key)?;

        let mut h = [0u8; BLOCK];
        cipher.encrypt_block(&mut h);
        let mut ghash = <GHash as ghash::universal_hash::KeyInit>::new(ghash::Key::from_slice(&h));
        h.zeroize();
        ghash.update_padded(associated_data);

        // J0 = IV || 1 masks the tag, text starts at J0 + 1
        let mut counter = [0u8; BLOCK];
        counter[..sizes::gcm::IV_SIZE].copy_from_slice(iv);
        counter[BLOCK - 1] = 1;
        let mut tag_mask = counter;
        cipher.encrypt_block(&mut tag_mask);
        counter[BLOCK - 1] = 2;
        let ctr = AesCtr::new(&cipher, &counter);
        counter.zeroize();

        Ok(Self {
            direction,
            ctr,
            ghash,
            tag_mask,
            pending: [0u8; BLOCK],
            pending_len: 0,
            aad_len: associated_data.len() as u64,
            text_len: 0,
            finished: false,
        })
    }

    pub(crate) fn update(&mut self, mut input: &[u8], output: &mut [u8]) -> SeResult<usize> {
        if self.finished {
            return Err(SeStatus::InvalidCommand);
        }
        let total = self.text_len + input.len() as u64;
        if total > sizes::gcm::MAX_TEXT_LEN {
            return Err(SeStatus::InvalidParameter);
        }
        let emitted = (self.pending_len + input.len()) / BLOCK * BLOCK;
        if output.len() < emitted {
            return Err(SeStatus::InvalidParameter);
        }
        self.text_len = total;

        let mut written = 0;
        if self.pending_len > 0 {
            let take = (BLOCK - self.pending_len).min(input.len());
            self.pending[self.pending_len..self.pending_len + take].copy_from_slice(&input[..take]);
            self.pending_len += take;
            input = &input[take..];
            if self.pending_len < BLOCK {
                return Ok(0);
            }
            let block = self.pending;
            self.crypt_blocks(&block, &mut output[..BLOCK]);
            self.pending.zeroize();
            self.pending_len = 0;
            written = BLOCK;
        }

        let whole = input.len() / BLOCK * BLOCK;
        self.crypt_blocks(&input[..whole], &mut output[written..written + whole]);
        written += whole;

        let rest = &input[whole..];
        self.pending[..rest.len()].copy_from_slice(rest);
        self.pending_len = rest.len();

        Ok(written)
    }

    pub(crate) fn finish(&mut self, output: &mut [u8]) -> SeResult<GcmFinish> {
        if self.finished {
            return Err(SeStatus::InvalidCommand);
        }
        let partial = self.pending_len;
        if output.len() < partial {
            return Err(SeStatus::InvalidParameter);
        }

        if partial > 0 {
            let pending = self.pending;
            self.crypt_blocks(&pending[..partial], &mut output[..partial]);
        }

        let mut lengths = [0u8; BLOCK];
        BigEndian::write_u64(&mut lengths[..8], self.aad_len * 8);
        BigEndian::write_u64(&mut lengths[8..], self.text_len * 8);
        self.ghash.update_padded(&lengths);

        let s = self.ghash.clone().finalize();
        let mut tag = self.tag_mask;
        for (t, x) in tag.iter_mut().zip(s.iter()) {
            *t ^= x;
        }

        self.pending.zeroize();
        self.pending_len = 0;
        self.finished = true;

        Ok(GcmFinish {
            output_len: partial,
            tag,
        })
    }

    /// CTR-crypt `input` into `output` and absorb the ciphertext side into GHASH
    ///
    /// Only the final call of an operation may pass a partial block.
    fn crypt_blocks(&mut self, input: &[u8], output: &mut [u8]) {
        if let CipherDirection::Decrypt = self.direction {
            self.ghash.update_padded(input);
        }
        output.copy_from_slice(input);
        self.ctr.apply_keystream(output);
        if let CipherDirection::Encrypt = self.direction {
            self.ghash.update_padded(output);
        }
    }
}

impl Drop for SoftGcmContext {
    fn drop(&mut self) {
        self.pending.zeroize();
        self.tag_mask.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    // NIST GCM test case 2: AES-128, zero key, zero IV, one zero block
    #[test]
    fn test_single_block_vector() {
        let mut ctx =
            SoftGcmContext::start(&[0u8; 16], CipherDirection::Encrypt, &[0u8; 12], &[]).unwrap();
        let mut out = [0u8; 32];
        let n = ctx.update(&[0u8; 16], &mut out).unwrap();
        assert_eq!(n, 16);
        assert_eq!(&out[..16], h("0388dace60b6a392f328c2b971b2fe78").as_slice());
        let fin = ctx.finish(&mut out[16..]).unwrap();
        assert_eq!(fin.output_len, 0);
        assert_eq!(&fin.tag[..], h("ab6e47d42cec13bdf53a67b21257bddf").as_slice());
    }

    #[test]
    fn test_output_lags_by_partial_block() {
        let mut ctx =
            SoftGcmContext::start(&[7u8; 32], CipherDirection::Encrypt, &[1u8; 12], b"ad").unwrap();
        let mut out = [0u8; 64];
        assert_eq!(ctx.update(&[0u8; 5], &mut out).unwrap(), 0);
        assert_eq!(ctx.update(&[0u8; 20], &mut out).unwrap(), 16);
        let fin = ctx.finish(&mut out).unwrap();
        assert_eq!(fin.output_len, 9);
        assert!(matches!(ctx.update(&[0u8; 1], &mut out), Err(SeStatus::InvalidCommand)));
    }

    #[test]
    fn test_rejects_bad_iv_and_short_output() {
        assert!(matches!(
            SoftGcmContext::start(&[0u8; 16], CipherDirection::Encrypt, &[0u8; 16], &[]),
            Err(SeStatus::InvalidParameter)
        ));
        let mut ctx =
            SoftGcmContext::start(&[0u8; 16], CipherDirection::Encrypt, &[0u8; 12], &[]).unwrap();
        let mut out = [0u8; 8];
        assert!(matches!(ctx.update(&[0u8; 32], &mut out), Err(SeStatus::InvalidParameter)));
    }
}
