/*!
Key handles.

A [`KeyHandle`] describes a symmetric key the secure element can use: its
algorithm family, where it lives and how long it is. Provisioning keys is
outside this crate; sessions only borrow handles for their lifetime.
*/

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::core::constants::sizes;
use crate::core::error::Result;
use crate::param_err;

/// Algorithm family a key is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmFamily {
    /// Raw symmetric material with no algorithm restriction
    SymmetricGeneric,
    /// AES with a 128-bit key
    Aes128,
    /// AES with a 192-bit key
    Aes192,
    /// AES with a 256-bit key
    Aes256,
    /// ChaCha20 with a 256-bit key
    ChaCha20,
}

impl AlgorithmFamily {
    /// Required key length in bytes, `None` for generic keys
    pub fn key_length(&self) -> Option<usize> {
        match self {
            AlgorithmFamily::SymmetricGeneric => None,
            AlgorithmFamily::Aes128 => Some(sizes::aes::KEY_SIZE_128),
            AlgorithmFamily::Aes192 => Some(sizes::aes::KEY_SIZE_192),
            AlgorithmFamily::Aes256 => Some(sizes::aes::KEY_SIZE_256),
            AlgorithmFamily::ChaCha20 => Some(sizes::chacha::KEY_SIZE),
        }
    }

    /// Whether the key can drive AES based commands (CMAC, GCM)
    pub fn is_aes(&self) -> bool {
        matches!(
            self,
            AlgorithmFamily::Aes128 | AlgorithmFamily::Aes192 | AlgorithmFamily::Aes256
        )
    }

    /// AES family matching a key length
    pub fn aes_for_length(len: usize) -> Option<Self> {
        match len {
            sizes::aes::KEY_SIZE_128 => Some(AlgorithmFamily::Aes128),
            sizes::aes::KEY_SIZE_192 => Some(AlgorithmFamily::Aes192),
            sizes::aes::KEY_SIZE_256 => Some(AlgorithmFamily::Aes256),
            _ => None,
        }
    }
}

impl fmt::Display for AlgorithmFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlgorithmFamily::SymmetricGeneric => write!(f, "symmetric"),
            AlgorithmFamily::Aes128 => write!(f, "AES-128"),
            AlgorithmFamily::Aes192 => write!(f, "AES-192"),
            AlgorithmFamily::Aes256 => write!(f, "AES-256"),
            AlgorithmFamily::ChaCha20 => write!(f, "ChaCha20"),
        }
    }
}

/// Where the key material is kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageClass {
    /// Caller-owned plaintext buffer passed with every command
    Plaintext,
    /// Volatile slot inside the element
    Volatile {
        /// Slot index
        slot: u32,
    },
    /// Buffer wrapped by the element's key-encryption key
    Wrapped,
}

/// Handle to a symmetric key usable by the secure element
///
/// Key bytes are wiped on drop and never printed by `Debug`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyHandle {
    #[zeroize(skip)]
    family: AlgorithmFamily,
    #[zeroize(skip)]
    storage: StorageClass,
    material: Vec<u8>,
}

impl KeyHandle {
    /// Create a handle for a plaintext key
    pub fn new(family: AlgorithmFamily, material: &[u8]) -> Result<Self> {
        Self::with_storage(family, StorageClass::Plaintext, material)
    }

    /// Create a plaintext AES handle, picking the family from the key length
    pub fn aes(material: &[u8]) -> Result<Self> {
        match AlgorithmFamily::aes_for_length(material.len()) {
            Some(family) => Self::new(family, material),
            None => param_err!("{} bytes is not an AES key length", material.len()),
        }
    }

    /// Create a plaintext ChaCha20 handle
    pub fn chacha20(material: &[u8]) -> Result<Self> {
        Self::new(AlgorithmFamily::ChaCha20, material)
    }

    /// Create a handle with an explicit storage class
    pub fn with_storage(
        family: AlgorithmFamily,
        storage: StorageClass,
        material: &[u8],
    ) -> Result<Self> {
        if material.is_empty() {
            return param_err!("empty key material");
        }

        if let Some(expected) = family.key_length() {
            if material.len() != expected {
                return param_err!(
                    "{} key must be {} bytes, got {}",
                    family,
                    expected,
                    material.len()
                );
            }
        }

        Ok(Self {
            family,
            storage,
            material: material.to_vec(),
        })
    }

    /// Algorithm family
    pub fn algorithm_family(&self) -> AlgorithmFamily {
        self.family
    }

    /// Storage class
    pub fn storage(&self) -> StorageClass {
        self.storage
    }

    /// Key length in bytes
    pub fn byte_length(&self) -> usize {
        self.material.len()
    }

    /// Key length in bits
    pub fn size_in_bits(&self) -> usize {
        self.material.len() * 8
    }

    /// Key bytes as seen by the element
    pub(crate) fn material(&self) -> &[u8] {
        &self.material
    }
}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyHandle")
            .field("family", &self.family)
            .field("storage", &self.storage)
            .field("bits", &self.size_in_bits())
            .finish()
    }
}
