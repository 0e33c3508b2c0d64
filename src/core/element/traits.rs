/*!
Command interface of the secure element.

Every method is one blocking command: it returns once the element has
answered, with either the result or a [`SeStatus`] failure code. Multipart
contexts are opaque to the caller and owned by whoever drives the operation.
*/

use std::fmt;

use crate::core::constants::sizes;
use crate::core::error::SeResult;
use crate::core::key::KeyHandle;

/// Direction of a cipher operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherDirection {
    /// Plaintext in, ciphertext out
    Encrypt,
    /// Ciphertext in, plaintext out
    Decrypt,
}

impl fmt::Display for CipherDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CipherDirection::Encrypt => write!(f, "encrypt"),
            CipherDirection::Decrypt => write!(f, "decrypt"),
        }
    }
}

/// CMAC tag as produced by the element
pub type CmacTag = [u8; sizes::cmac::TAG_SIZE];

/// Full-length GCM tag as produced by the element
pub type GcmTag = [u8; sizes::gcm::MAX_TAG_SIZE];

/// ChaCha20-Poly1305 tag
pub type Poly1305Tag = [u8; sizes::chacha::TAG_SIZE];

/// Result of a GCM multipart finish command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcmFinish {
    /// Bytes written to the output buffer by the finish command
    pub output_len: usize,
    /// Tag computed over the associated data and ciphertext
    pub tag: GcmTag,
}

/// Command layer of a secure element
///
/// Implementations must process commands in the order they are issued and
/// must not retry failed commands.
pub trait SecureElement: Send {
    /// Opaque running state of a CMAC computation
    type CmacContext: Send;

    /// Opaque running state of a GCM computation
    type GcmContext: Send;

    /// Bring the command interface up
    fn init(&mut self) -> SeResult<()>;

    /// Shut the command interface down
    fn deinit(&mut self) -> SeResult<()>;

    /// Begin a multipart CMAC
    fn cmac_multipart_start(&mut self, key: &KeyHandle) -> SeResult<Self::CmacContext>;

    /// Feed data into a multipart CMAC
    fn cmac_multipart_update(
        &mut self,
        ctx: &mut Self::CmacContext,
        key: &KeyHandle,
        input: &[u8],
    ) -> SeResult<()>;

    /// Complete a multipart CMAC
    fn cmac_multipart_finish(
        &mut self,
        ctx: &mut Self::CmacContext,
        key: &KeyHandle,
    ) -> SeResult<CmacTag>;

    /// Begin a multipart GCM operation, absorbing the associated data
    fn gcm_multipart_start(
        &mut self,
        key: &KeyHandle,
        direction: CipherDirection,
        iv: &[u8],
        associated_data: &[u8],
    ) -> SeResult<Self::GcmContext>;

    /// Process input, returning how many bytes were written to `output`
    ///
    /// Only whole 16-byte blocks are released. The residue of a partial block
    /// is held back until the next update or finish, so the total released
    /// never exceeds the total input rounded down to a block boundary.
    fn gcm_multipart_update(
        &mut self,
        ctx: &mut Self::GcmContext,
        key: &KeyHandle,
        input: &[u8],
        output: &mut [u8],
    ) -> SeResult<usize>;

    /// Flush the held-back bytes into `output` and compute the tag
    ///
    /// `output_len` is exactly the number of bytes held back.
    fn gcm_multipart_finish(
        &mut self,
        ctx: &mut Self::GcmContext,
        key: &KeyHandle,
        output: &mut [u8],
    ) -> SeResult<GcmFinish>;

    /// ChaCha20 over one buffer, starting at the given little-endian block counter
    fn chacha20_crypt(
        &mut self,
        key: &KeyHandle,
        direction: CipherDirection,
        initial_counter: &[u8; sizes::chacha::COUNTER_SIZE],
        nonce: &[u8; sizes::chacha::NONCE_SIZE],
        input: &[u8],
        output: &mut [u8],
    ) -> SeResult<()>;

    /// CMAC over a complete message
    fn cmac(&mut self, key: &KeyHandle, input: &[u8]) -> SeResult<CmacTag>;

    /// One-shot GCM encryption; writes `tag.len()` tag bytes
    fn gcm_crypt_and_tag(
        &mut self,
        key: &KeyHandle,
        iv: &[u8],
        associated_data: &[u8],
        input: &[u8],
        output: &mut [u8],
        tag: &mut [u8],
    ) -> SeResult<()>;

    /// One-shot GCM decryption; fails with `InvalidSignature` on a bad tag
    fn gcm_auth_decrypt(
        &mut self,
        key: &KeyHandle,
        iv: &[u8],
        associated_data: &[u8],
        input: &[u8],
        output: &mut [u8],
        tag: &[u8],
    ) -> SeResult<()>;

    /// One-shot ChaCha20-Poly1305 encryption
    fn chacha20_poly1305_encrypt_and_tag(
        &mut self,
        key: &KeyHandle,
        nonce: &[u8; sizes::chacha::NONCE_SIZE],
        associated_data: &[u8],
        input: &[u8],
        output: &mut [u8],
    ) -> SeResult<Poly1305Tag>;

    /// One-shot ChaCha20-Poly1305 decryption; fails with `InvalidSignature` on a bad tag
    fn chacha20_poly1305_auth_decrypt(
        &mut self,
        key: &KeyHandle,
        nonce: &[u8; sizes::chacha::NONCE_SIZE],
        associated_data: &[u8],
        input: &[u8],
        output: &mut [u8],
        tag: &Poly1305Tag,
    ) -> SeResult<()>;
}
