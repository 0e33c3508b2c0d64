/*!
AES block, counter-mode and CMAC cores keyed by length.
*/

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, InnerIvInit, KeyInit, StreamCipher};
use aes::{Aes128, Aes192, Aes256};
use cmac::{Cmac, Mac};
use ctr::Ctr32BE;

use crate::core::constants::sizes;
use crate::core::element::traits::CmacTag;
use crate::core::error::{SeResult, SeStatus};

/// One AES block
pub(crate) type AesBlock = [u8; sizes::aes::BLOCK_SIZE];

/// AES block cipher for any of the three key lengths
#[derive(Clone)]
pub(crate) enum AesCore {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl AesCore {
    pub(crate) fn new(key: &[u8]) -> SeResult<Self> {
        let core = match key.len() {
            sizes::aes::KEY_SIZE_128 => Aes128::new_from_slice(key).map(AesCore::Aes128),
            sizes::aes::KEY_SIZE_192 => Aes192::new_from_slice(key).map(AesCore::Aes192),
            sizes::aes::KEY_SIZE_256 => Aes256::new_from_slice(key).map(AesCore::Aes256),
            _ => return Err(SeStatus::InvalidKey),
        };
        core.map_err(|_| SeStatus::InvalidKey)
    }

    /// Encrypt one block in place
    pub(crate) fn encrypt_block(&self, block: &mut AesBlock) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            AesCore::Aes128(cipher) => cipher.encrypt_block(block),
            AesCore::Aes192(cipher) => cipher.encrypt_block(block),
            AesCore::Aes256(cipher) => cipher.encrypt_block(block),
        }
    }
}

/// AES-CTR keystream with a 32-bit big-endian counter, as GCM uses it
pub(crate) enum AesCtr {
    Aes128(Ctr32BE<Aes128>),
    Aes192(Ctr32BE<Aes192>),
    Aes256(Ctr32BE<Aes256>),
}

impl AesCtr {
    /// Keystream starting at `counter_block`
    pub(crate) fn new(cipher: &AesCore, counter_block: &AesBlock) -> Self {
        let iv = GenericArray::from_slice(counter_block);
        match cipher {
            AesCore::Aes128(c) => AesCtr::Aes128(Ctr32BE::from_core(ctr::CtrCore::inner_iv_init(c.clone(), iv))),
            AesCore::Aes192(c) => AesCtr::Aes192(Ctr32BE::from_core(ctr::CtrCore::inner_iv_init(c.clone(), iv))),
            AesCore::Aes256(c) => AesCtr::Aes256(Ctr32BE::from_core(ctr::CtrCore::inner_iv_init(c.clone(), iv))),
        }
    }

    /// XOR the next `buf.len()` keystream bytes into `buf`
    pub(crate) fn apply_keystream(&mut self, buf: &mut [u8]) {
        match self {
            AesCtr::Aes128(ctr) => ctr.apply_keystream(buf),
            AesCtr::Aes192(ctr) => ctr.apply_keystream(buf),
            AesCtr::Aes256(ctr) => ctr.apply_keystream(buf),
        }
    }
}

/// Running CMAC for any of the three AES key lengths
#[derive(Clone)]
pub(crate) enum CmacCore {
    Aes128(Cmac<Aes128>),
    Aes192(Cmac<Aes192>),
    Aes256(Cmac<Aes256>),
}

impl CmacCore {
    pub(crate) fn new(key: &[u8]) -> SeResult<Self> {
        let core = match key.len() {
            sizes::aes::KEY_SIZE_128 => {
                <Cmac<Aes128> as Mac>::new_from_slice(key).map(CmacCore::Aes128)
            }
            sizes::aes::KEY_SIZE_192 => {
                <Cmac<Aes192> as Mac>::new_from_slice(key).map(CmacCore::Aes192)
            }
            sizes::aes::KEY_SIZE_256 => {
                <Cmac<Aes256> as Mac>::new_from_slice(key).map(CmacCore::Aes256)
            }
            _ => return Err(SeStatus::InvalidKey),
        };
        core.map_err(|_| SeStatus::InvalidKey)
    }

    pub(crate) fn update(&mut self, data: &[u8]) {
        match self {
            CmacCore::Aes128(mac) => mac.update(data),
            CmacCore::Aes192(mac) => mac.update(data),
            CmacCore::Aes256(mac) => mac.update(data),
        }
    }

    /// Tag over everything absorbed so far
    pub(crate) fn tag(&self) -> CmacTag {
        let bytes = match self {
            CmacCore::Aes128(mac) => mac.clone().finalize().into_bytes(),
            CmacCore::Aes192(mac) => mac.clone().finalize().into_bytes(),
            CmacCore::Aes256(mac) => mac.clone().finalize().into_bytes(),
        };
        let mut tag = [0u8; sizes::cmac::TAG_SIZE];
        tag.copy_from_slice(&bytes);
        tag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // FIPS-197 appendix C.1
    #[test]
    fn test_aes128_block() {
        let key: Vec<u8> = (0u8..16).collect();
        let core = AesCore::new(&key).unwrap();
        let mut block: AesBlock = [
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd,
            0xee, 0xff,
        ];
        core.encrypt_block(&mut block);
        assert_eq!(
            block,
            [
                0x69, 0xc4, 0xe0, 0xd8, 0x6a, 0x7b, 0x04, 0x30, 0xd8, 0xcd, 0xb7, 0x80, 0x70, 0xb4,
                0xc5, 0x5a
            ]
        );
    }

    // SP 800-38A F.5.1, first two blocks
    #[test]
    fn test_ctr_keystream() {
        let key = [
            0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf,
            0x4f, 0x3c,
        ];
        let counter: AesBlock = [
            0xf0, 0xf1, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8, 0xf9, 0xfa, 0xfb, 0xfc, 0xfd,
            0xfe, 0xff,
        ];
        let mut ctr = AesCtr::new(&AesCore::new(&key).unwrap(), &counter);
        let mut buf = [
            0x6b, 0xc1, 0xbe, 0xe2, 0x2e, 0x40, 0x9f, 0x96, 0xe9, 0x3d, 0x7e, 0x11, 0x73, 0x93,
            0x17, 0x2a, 0xae, 0x2d, 0x8a, 0x57, 0x1e, 0x03, 0xac, 0x9c, 0x9e, 0xb7, 0x6f, 0xac,
            0x45, 0xaf, 0x8e, 0x51,
        ];
        ctr.apply_keystream(&mut buf[..16]);
        ctr.apply_keystream(&mut buf[16..]);
        assert_eq!(
            buf,
            [
                0x87, 0x4d, 0x61, 0x91, 0xb6, 0x20, 0xe3, 0x26, 0x1b, 0xef, 0x68, 0x64, 0x99, 0x0d,
                0xb6, 0xce, 0x98, 0x06, 0xf6, 0x6b, 0x79, 0x70, 0xfd, 0xff, 0x86, 0x17, 0x18, 0x7b,
                0xb9, 0xff, 0xfd, 0xff
            ]
        );
    }

    #[test]
    fn test_rejects_bad_key_length() {
        assert!(matches!(AesCore::new(&[0u8; 20]), Err(SeStatus::InvalidKey)));
        assert!(matches!(CmacCore::new(&[0u8; 8]), Err(SeStatus::InvalidKey)));
    }

    #[test]
    fn test_cmac_tag_is_repeatable() {
        let mut core = CmacCore::new(&[0x2bu8; 16]).unwrap();
        core.update(b"partial");
        let first = core.tag();
        let second = core.tag();
        assert_eq!(first, second);
    }
}
