/*!
Secure-element command layer.

The element itself is a black box reached through the [`SecureElement`]
trait. [`SoftSecureElement`] answers the same commands in software so
sessions can run without hardware.
*/

// Command interface
pub mod traits;

// Software reference element
pub mod soft;

pub use self::traits::{CipherDirection, CmacTag, GcmFinish, GcmTag, Poly1305Tag, SecureElement};
pub use self::soft::SoftSecureElement;
