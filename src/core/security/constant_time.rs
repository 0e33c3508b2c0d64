/*!
Constant-time comparisons for authentication tags, built on the subtle crate.
*/

use subtle::ConstantTimeEq;

use crate::core::error::{Error, Result};

/// Compare two byte slices for equality in constant time.
///
/// Slices of different lengths compare unequal; the length itself is not
/// treated as secret.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Check a received tag against the computed one.
///
/// Only the first `expected.len()` bytes of `computed` take part, which is how
/// truncated GCM tags are checked.
pub fn verify_tag(computed: &[u8], expected: &[u8]) -> Result<()> {
    if expected.is_empty() || expected.len() > computed.len() {
        return Err(Error::TagMismatch);
    }
    if constant_time_eq(&computed[..expected.len()], expected) {
        Ok(())
    } else {
        Err(Error::TagMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"tag-bytes", b"tag-bytes"));
        assert!(!constant_time_eq(b"tag-bytes", b"tag-bytez"));
        assert!(!constant_time_eq(b"short", b"longer"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn test_verify_truncated_tag() {
        let computed = [0x11u8; 16];
        assert!(verify_tag(&computed, &[0x11; 16]).is_ok());
        assert!(verify_tag(&computed, &[0x11; 4]).is_ok());

        let mut wrong = [0x11u8; 12];
        wrong[11] ^= 0x01;
        assert!(matches!(verify_tag(&computed, &wrong), Err(Error::TagMismatch)));
        assert!(matches!(verify_tag(&computed, &[]), Err(Error::TagMismatch)));
        assert!(matches!(verify_tag(&computed, &[0x11; 17]), Err(Error::TagMismatch)));
    }
}
