/*!
Software reference secure element.

Answers every command of [`SecureElement`] with RustCrypto primitives while
keeping the element's observable rules: commands fail until `init`, key types
are checked per command, GCM output is block-buffered. A fault can be armed
to make a chosen command fail, which lets tests exercise error propagation.
*/

mod aes;
mod gcm;

use byteorder::{ByteOrder, LittleEndian};
use chacha20::ChaCha20;
use chacha20::cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};
use chacha20poly1305::{AeadInPlace, ChaCha20Poly1305, KeyInit};
use log::trace;
use zeroize::Zeroize;

use self::aes::CmacCore;
pub use self::gcm::SoftGcmContext;
use crate::core::constants::sizes;
use crate::core::element::traits::{
    CipherDirection, CmacTag, GcmFinish, Poly1305Tag, SecureElement,
};
use crate::core::error::{SeResult, SeStatus};
use crate::core::key::{AlgorithmFamily, KeyHandle};

/// Running state of a software CMAC operation
pub struct SoftCmacContext {
    mac: CmacCore,
    length: u64,
}

impl SoftCmacContext {
    /// Bytes absorbed so far
    pub fn length(&self) -> u64 {
        self.length
    }
}

#[derive(Debug, Clone, Copy)]
struct Fault {
    at_command: u64,
    status: SeStatus,
}

/// Secure element implemented in software
#[derive(Debug, Default)]
pub struct SoftSecureElement {
    initialized: bool,
    commands: u64,
    fault: Option<Fault>,
}

impl SoftSecureElement {
    /// Create an element that still needs `init`
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an element that is already initialized
    pub fn initialized() -> Self {
        Self {
            initialized: true,
            ..Self::default()
        }
    }

    /// Whether `init` has run without a matching `deinit`
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Number of commands accepted so far
    pub fn commands_executed(&self) -> u64 {
        self.commands
    }

    /// Make the command `after` commands from now fail with `status`
    ///
    /// `after == 0` fails the very next command. The fault fires once.
    pub fn fail_after(&mut self, after: u64, status: SeStatus) {
        self.fault = Some(Fault {
            at_command: self.commands + after,
            status,
        });
    }

    /// Disarm a pending fault
    pub fn clear_fault(&mut self) {
        self.fault = None;
    }

    /// Gate every command: initialized, fault injection, accounting
    fn command(&mut self, name: &'static str) -> SeResult<()> {
        if !self.initialized {
            return Err(SeStatus::InvalidCommand);
        }
        if let Some(fault) = self.fault {
            if fault.at_command == self.commands {
                self.fault = None;
                self.commands += 1;
                trace!("soft element: {} failing with {}", name, fault.status);
                return Err(fault.status);
            }
        }
        self.commands += 1;
        trace!("soft element: {} (#{})", name, self.commands);
        Ok(())
    }
}

fn require_aes(key: &KeyHandle) -> SeResult<()> {
    if key.algorithm_family().is_aes() {
        Ok(())
    } else {
        Err(SeStatus::InvalidKey)
    }
}

fn require_chacha20(key: &KeyHandle) -> SeResult<()> {
    if key.algorithm_family() == AlgorithmFamily::ChaCha20
        && key.byte_length() == sizes::chacha::KEY_SIZE
    {
        Ok(())
    } else {
        Err(SeStatus::InvalidKey)
    }
}

impl SecureElement for SoftSecureElement {
    type CmacContext = SoftCmacContext;
    type GcmContext = SoftGcmContext;

    fn init(&mut self) -> SeResult<()> {
        self.initialized = true;
        Ok(())
    }

    fn deinit(&mut self) -> SeResult<()> {
        if !self.initialized {
            return Err(SeStatus::InvalidCommand);
        }
        self.initialized = false;
        Ok(())
    }

    fn cmac_multipart_start(&mut self, key: &KeyHandle) -> SeResult<Self::CmacContext> {
        self.command("cmac_multipart_start")?;
        require_aes(key)?;
        Ok(SoftCmacContext {
            mac: CmacCore::new(key.material())?,
            length: 0,
        })
    }

    fn cmac_multipart_update(
        &mut self,
        ctx: &mut Self::CmacContext,
        _key: &KeyHandle,
        input: &[u8],
    ) -> SeResult<()> {
        self.command("cmac_multipart_update")?;
        ctx.mac.update(input);
        ctx.length += input.len() as u64;
        Ok(())
    }

    fn cmac_multipart_finish(
        &mut self,
        ctx: &mut Self::CmacContext,
        _key: &KeyHandle,
    ) -> SeResult<CmacTag> {
        self.command("cmac_multipart_finish")?;
        Ok(ctx.mac.tag())
    }

    fn gcm_multipart_start(
        &mut self,
        key: &KeyHandle,
        direction: CipherDirection,
        iv: &[u8],
        associated_data: &[u8],
    ) -> SeResult<Self::GcmContext> {
        self.command("gcm_multipart_start")?;
        require_aes(key)?;
        SoftGcmContext::start(key.material(), direction, iv, associated_data)
    }

    fn gcm_multipart_update(
        &mut self,
        ctx: &mut Self::GcmContext,
        _key: &KeyHandle,
        input: &[u8],
        output: &mut [u8],
    ) -> SeResult<usize> {
        self.command("gcm_multipart_update")?;
        ctx.update(input, output)
    }

    fn gcm_multipart_finish(
        &mut self,
        ctx: &mut Self::GcmContext,
        _key: &KeyHandle,
        output: &mut [u8],
    ) -> SeResult<GcmFinish> {
        self.command("gcm_multipart_finish")?;
        ctx.finish(output)
    }

    fn chacha20_crypt(
        &mut self,
        key: &KeyHandle,
        _direction: CipherDirection,
        initial_counter: &[u8; sizes::chacha::COUNTER_SIZE],
        nonce: &[u8; sizes::chacha::NONCE_SIZE],
        input: &[u8],
        output: &mut [u8],
    ) -> SeResult<()> {
        self.command("chacha20_crypt")?;
        require_chacha20(key)?;
        if output.len() < input.len() {
            return Err(SeStatus::InvalidParameter);
        }

        let counter = LittleEndian::read_u32(initial_counter);
        let mut cipher = ChaCha20::new(
            chacha20::Key::from_slice(key.material()),
            chacha20::Nonce::from_slice(nonce),
        );
        cipher
            .try_seek(u64::from(counter) * sizes::chacha::BLOCK_SIZE as u64)
            .map_err(|_| SeStatus::InvalidParameter)?;

        let out = &mut output[..input.len()];
        out.copy_from_slice(input);
        cipher.try_apply_keystream(out).map_err(|_| {
            out.zeroize();
            SeStatus::InvalidParameter
        })
    }

    fn cmac(&mut self, key: &KeyHandle, input: &[u8]) -> SeResult<CmacTag> {
        self.command("cmac")?;
        require_aes(key)?;
        let mut mac = CmacCore::new(key.material())?;
        mac.update(input);
        Ok(mac.tag())
    }

    fn gcm_crypt_and_tag(
        &mut self,
        key: &KeyHandle,
        iv: &[u8],
        associated_data: &[u8],
        input: &[u8],
        output: &mut [u8],
        tag: &mut [u8],
    ) -> SeResult<()> {
        self.command("gcm_crypt_and_tag")?;
        require_aes(key)?;
        if !(sizes::gcm::MIN_TAG_SIZE..=sizes::gcm::MAX_TAG_SIZE).contains(&tag.len())
            || output.len() < input.len()
        {
            return Err(SeStatus::InvalidParameter);
        }

        let mut ctx =
            SoftGcmContext::start(key.material(), CipherDirection::Encrypt, iv, associated_data)?;
        let written = ctx.update(input, output)?;
        let fin = ctx.finish(&mut output[written..])?;
        tag.copy_from_slice(&fin.tag[..tag.len()]);
        Ok(())
    }

    fn gcm_auth_decrypt(
        &mut self,
        key: &KeyHandle,
        iv: &[u8],
        associated_data: &[u8],
        input: &[u8],
        output: &mut [u8],
        tag: &[u8],
    ) -> SeResult<()> {
        self.command("gcm_auth_decrypt")?;
        require_aes(key)?;
        if !(sizes::gcm::MIN_TAG_SIZE..=sizes::gcm::MAX_TAG_SIZE).contains(&tag.len())
            || output.len() < input.len()
        {
            return Err(SeStatus::InvalidParameter);
        }

        let mut ctx =
            SoftGcmContext::start(key.material(), CipherDirection::Decrypt, iv, associated_data)?;
        let written = ctx.update(input, output)?;
        let fin = ctx.finish(&mut output[written..])?;
        if crate::core::security::constant_time_eq(&fin.tag[..tag.len()], tag) {
            Ok(())
        } else {
            output[..input.len()].zeroize();
            Err(SeStatus::InvalidSignature)
        }
    }

    fn chacha20_poly1305_encrypt_and_tag(
        &mut self,
        key: &KeyHandle,
        nonce: &[u8; sizes::chacha::NONCE_SIZE],
        associated_data: &[u8],
        input: &[u8],
        output: &mut [u8],
    ) -> SeResult<Poly1305Tag> {
        self.command("chacha20_poly1305_encrypt_and_tag")?;
        require_chacha20(key)?;
        if output.len() < input.len() {
            return Err(SeStatus::InvalidParameter);
        }

        let cipher =
            ChaCha20Poly1305::new_from_slice(key.material()).map_err(|_| SeStatus::InvalidKey)?;
        let out = &mut output[..input.len()];
        out.copy_from_slice(input);
        let tag = cipher
            .encrypt_in_place_detached(chacha20poly1305::Nonce::from_slice(nonce), associated_data, out)
            .map_err(|_| SeStatus::InvalidParameter)?;

        let mut result = [0u8; sizes::chacha::TAG_SIZE];
        result.copy_from_slice(&tag);
        Ok(result)
    }

    fn chacha20_poly1305_auth_decrypt(
        &mut self,
        key: &KeyHandle,
        nonce: &[u8; sizes::chacha::NONCE_SIZE],
        associated_data: &[u8],
        input: &[u8],
        output: &mut [u8],
        tag: &Poly1305Tag,
    ) -> SeResult<()> {
        self.command("chacha20_poly1305_auth_decrypt")?;
        require_chacha20(key)?;
        if output.len() < input.len() {
            return Err(SeStatus::InvalidParameter);
        }

        let cipher =
            ChaCha20Poly1305::new_from_slice(key.material()).map_err(|_| SeStatus::InvalidKey)?;
        let out = &mut output[..input.len()];
        out.copy_from_slice(input);
        cipher
            .decrypt_in_place_detached(
                chacha20poly1305::Nonce::from_slice(nonce),
                associated_data,
                out,
                chacha20poly1305::Tag::from_slice(tag),
            )
            .map_err(|_| {
                out.zeroize();
                SeStatus::InvalidSignature
            })
    }
}
