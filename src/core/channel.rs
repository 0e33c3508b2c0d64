/*!
Command channel to the secure element.

A [`CommandChannel`] owns the element behind a mutex and an ownership token.
Whoever holds the token (through a [`ChannelLease`]) owns the channel until
the lease is released; any other attempt to take it fails immediately with
`ChannelBusy` instead of waiting. Leases are released explicitly by sessions
on finish or abort, and implicitly when dropped.

The one-shot helpers take the channel for exactly one command.
*/

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, trace, warn};

use crate::core::config::validate_tag_length;
use crate::core::constants::sizes;
use crate::core::element::{CipherDirection, CmacTag, Poly1305Tag, SecureElement};
use crate::core::error::{Error, Result, SeResult, SeStatus, SessionId};
use crate::core::key::{AlgorithmFamily, KeyHandle};
use crate::core::session::chacha20::counter_to_wire;
use crate::core::session::registry::SessionRegistry;
use crate::core::session::state::SessionMode;
use crate::param_err;

const NO_OWNER: u64 = 0;

/// Identifier of a command channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub(crate) u64);

impl ChannelId {
    /// Raw numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel#{}", self.0)
    }
}

/// Handle to a secure element allowing one operation in flight at a time
pub struct CommandChannel<E: SecureElement> {
    id: ChannelId,
    element: Mutex<E>,
    owner: AtomicU64,
    next_session: AtomicU64,
    registry: Option<Arc<SessionRegistry>>,
}

impl<E: SecureElement> fmt::Debug for CommandChannel<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandChannel")
            .field("id", &self.id)
            .field("owner", &self.owner())
            .field("registered", &self.registry.is_some())
            .finish()
    }
}

impl<E: SecureElement> CommandChannel<E> {
    /// Wrap an element in a standalone channel
    pub fn new(element: E) -> Self {
        Self::build(ChannelId(0), element, None)
    }

    /// Wrap an element in a channel whose sessions are recorded in `registry`
    pub fn with_registry(element: E, registry: Arc<SessionRegistry>) -> Self {
        let id = registry.allocate_channel_id();
        Self::build(id, element, Some(registry))
    }

    fn build(id: ChannelId, element: E, registry: Option<Arc<SessionRegistry>>) -> Self {
        Self {
            id,
            element: Mutex::new(element),
            owner: AtomicU64::new(NO_OWNER),
            next_session: AtomicU64::new(1),
            registry,
        }
    }

    /// Channel identifier
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Registry this channel reports to, if any
    pub fn registry(&self) -> Option<&Arc<SessionRegistry>> {
        self.registry.as_ref()
    }

    /// Whether a session or one-shot command currently owns the channel
    pub fn is_busy(&self) -> bool {
        self.owner.load(Ordering::Acquire) != NO_OWNER
    }

    /// Session currently owning the channel
    pub fn owner(&self) -> Option<SessionId> {
        match self.owner.load(Ordering::Acquire) {
            NO_OWNER => None,
            id => Some(SessionId(id)),
        }
    }

    /// Bring the element's command interface up
    pub fn init(&self) -> Result<()> {
        self.with_element(|se| se.init())?.map_err(Error::from)
    }

    /// Shut the element's command interface down
    ///
    /// Refused with `ChannelBusy` while a session holds the channel.
    pub fn deinit(&self) -> Result<()> {
        self.with_element(|se| se.deinit())?.map_err(Error::from)
    }

    /// Run `f` against the element for configuration or inspection
    ///
    /// Takes the channel like a one-shot command, so it fails with
    /// `ChannelBusy` while a session is open.
    pub fn with_element<T>(&self, f: impl FnOnce(&mut E) -> T) -> Result<T> {
        let lease = self.try_acquire(SessionMode::OneShot)?;
        let result = lease.with_element(f);
        lease.release();
        result
    }

    /// Take exclusive ownership of the channel
    ///
    /// Fails fast with `ChannelBusy` if another lease is live.
    pub fn try_acquire(&self, mode: SessionMode) -> Result<ChannelLease<'_, E>> {
        let session_id = self.next_session.fetch_add(1, Ordering::Relaxed);

        if let Err(current) =
            self.owner
                .compare_exchange(NO_OWNER, session_id, Ordering::AcqRel, Ordering::Acquire)
        {
            let owner = SessionId(current);
            warn!("{} busy: {} rejected while {} is open", self.id, mode, owner);
            return Err(Error::ChannelBusy { owner });
        }

        let session_id = SessionId(session_id);
        if let Some(registry) = &self.registry {
            if let Err(e) = registry.register(self.id, session_id, mode) {
                self.owner.store(NO_OWNER, Ordering::Release);
                return Err(e);
            }
        }

        debug!("{} acquired by {} ({})", self.id, session_id, mode);
        Ok(ChannelLease {
            channel: self,
            session_id,
            mode,
            released: false,
        })
    }

    fn release(&self, session_id: SessionId) {
        if let Some(registry) = &self.registry {
            registry.release(self.id, session_id);
        }
        if self
            .owner
            .compare_exchange(session_id.0, NO_OWNER, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            debug!("{} released by {}", self.id, session_id);
        }
    }

    /// Take the channel, issue one command, release it
    fn one_shot<T>(&self, f: impl FnOnce(&mut E) -> SeResult<T>) -> Result<T> {
        let lease = self.try_acquire(SessionMode::OneShot)?;
        let result = lease.execute(f);
        lease.release();
        result
    }

    /// CMAC over a complete message
    pub fn cmac(&self, key: &KeyHandle, message: &[u8]) -> Result<CmacTag> {
        require_aes(key)?;
        self.one_shot(|se| se.cmac(key, message))
    }

    /// One-shot AES-GCM encryption; returns the ciphertext and a `tag_length` byte tag
    pub fn gcm_encrypt_and_tag(
        &self,
        key: &KeyHandle,
        iv: &[u8],
        associated_data: &[u8],
        plaintext: &[u8],
        tag_length: usize,
    ) -> Result<(Vec<u8>, Vec<u8>)> {
        require_aes(key)?;
        require_gcm_iv(iv)?;
        validate_tag_length(tag_length)?;

        let mut ciphertext = vec![0u8; plaintext.len()];
        let mut tag = vec![0u8; tag_length];
        self.one_shot(|se| {
            se.gcm_crypt_and_tag(key, iv, associated_data, plaintext, &mut ciphertext, &mut tag)
        })?;
        Ok((ciphertext, tag))
    }

    /// One-shot AES-GCM decryption
    ///
    /// A bad tag yields `TagMismatch` and no plaintext.
    pub fn gcm_auth_decrypt(
        &self,
        key: &KeyHandle,
        iv: &[u8],
        associated_data: &[u8],
        ciphertext: &[u8],
        tag: &[u8],
    ) -> Result<Vec<u8>> {
        require_aes(key)?;
        require_gcm_iv(iv)?;
        validate_tag_length(tag.len())?;

        let mut plaintext = vec![0u8; ciphertext.len()];
        self.one_shot(|se| {
            se.gcm_auth_decrypt(key, iv, associated_data, ciphertext, &mut plaintext, tag)
        })
        .map_err(authentication_failure)?;
        Ok(plaintext)
    }

    /// One-shot ChaCha20 over a buffer starting at block `counter`
    pub fn chacha20_crypt(
        &self,
        key: &KeyHandle,
        direction: CipherDirection,
        counter: u32,
        nonce: &[u8],
        input: &[u8],
    ) -> Result<Vec<u8>> {
        require_chacha20(key)?;
        let nonce = chacha_nonce(nonce)?;
        let wire = counter_to_wire(counter);

        let mut output = vec![0u8; input.len()];
        self.one_shot(|se| se.chacha20_crypt(key, direction, &wire, &nonce, input, &mut output))?;
        trace!("chacha20 one-shot: {} bytes from block {}", input.len(), counter);
        Ok(output)
    }

    /// One-shot ChaCha20-Poly1305 encryption
    pub fn chacha20_poly1305_encrypt_and_tag(
        &self,
        key: &KeyHandle,
        nonce: &[u8],
        associated_data: &[u8],
        plaintext: &[u8],
    ) -> Result<(Vec<u8>, Poly1305Tag)> {
        require_chacha20(key)?;
        let nonce = chacha_nonce(nonce)?;

        let mut ciphertext = vec![0u8; plaintext.len()];
        let tag = self.one_shot(|se| {
            se.chacha20_poly1305_encrypt_and_tag(key, &nonce, associated_data, plaintext, &mut ciphertext)
        })?;
        Ok((ciphertext, tag))
    }

    /// One-shot ChaCha20-Poly1305 decryption
    ///
    /// A bad tag yields `TagMismatch` and no plaintext.
    pub fn chacha20_poly1305_auth_decrypt(
        &self,
        key: &KeyHandle,
        nonce: &[u8],
        associated_data: &[u8],
        ciphertext: &[u8],
        tag: &[u8],
    ) -> Result<Vec<u8>> {
        require_chacha20(key)?;
        let nonce = chacha_nonce(nonce)?;
        let tag: Poly1305Tag = match tag.try_into() {
            Ok(tag) => tag,
            Err(_) => return param_err!("Poly1305 tag must be {} bytes", sizes::chacha::TAG_SIZE),
        };

        let mut plaintext = vec![0u8; ciphertext.len()];
        self.one_shot(|se| {
            se.chacha20_poly1305_auth_decrypt(key, &nonce, associated_data, ciphertext, &mut plaintext, &tag)
        })
        .map_err(authentication_failure)?;
        Ok(plaintext)
    }
}

/// Exclusive right to issue commands on a channel
///
/// Obtained from [`CommandChannel::try_acquire`]. Releasing (or dropping) the
/// lease hands the channel back.
pub struct ChannelLease<'a, E: SecureElement> {
    channel: &'a CommandChannel<E>,
    session_id: SessionId,
    mode: SessionMode,
    released: bool,
}

impl<'a, E: SecureElement> ChannelLease<'a, E> {
    /// Session this lease was issued to
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Mode the channel was acquired for
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Channel the lease is on
    pub fn channel_id(&self) -> ChannelId {
        self.channel.id
    }

    /// Issue one command to the element
    ///
    /// Element failures come back as `Error::Underlying` with the status
    /// unchanged. Nothing is retried.
    pub fn execute<T>(&self, f: impl FnOnce(&mut E) -> SeResult<T>) -> Result<T> {
        self.with_element(f)?.map_err(|status| {
            debug!("{}: element returned {}", self.session_id, status);
            Error::Underlying(status)
        })
    }

    fn with_element<T>(&self, f: impl FnOnce(&mut E) -> T) -> Result<T> {
        let mut element = self
            .channel
            .element
            .lock()
            .map_err(|_| Error::Internal("secure element lock poisoned".into()))?;
        Ok(f(&mut *element))
    }

    /// Hand the channel back
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.released = true;
            self.channel.release(self.session_id);
        }
    }
}

impl<E: SecureElement> fmt::Debug for ChannelLease<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelLease")
            .field("channel", &self.channel.id)
            .field("session_id", &self.session_id)
            .field("mode", &self.mode)
            .finish()
    }
}

impl<E: SecureElement> Drop for ChannelLease<'_, E> {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                "{} dropped while holding {}; releasing",
                self.session_id, self.channel.id
            );
            self.release_inner();
        }
    }
}

fn require_aes(key: &KeyHandle) -> Result<()> {
    if !key.algorithm_family().is_aes() {
        return param_err!("{} key cannot be used with AES commands", key.algorithm_family());
    }
    Ok(())
}

fn require_chacha20(key: &KeyHandle) -> Result<()> {
    if key.algorithm_family() != AlgorithmFamily::ChaCha20 {
        return param_err!("{} key cannot be used with ChaCha20 commands", key.algorithm_family());
    }
    Ok(())
}

fn require_gcm_iv(iv: &[u8]) -> Result<()> {
    if iv.len() != sizes::gcm::IV_SIZE {
        return param_err!("GCM IV must be {} bytes, got {}", sizes::gcm::IV_SIZE, iv.len());
    }
    Ok(())
}

fn chacha_nonce(nonce: &[u8]) -> Result<[u8; sizes::chacha::NONCE_SIZE]> {
    match nonce.try_into() {
        Ok(nonce) => Ok(nonce),
        Err(_) => param_err!(
            "ChaCha20 nonce must be {} bytes, got {}",
            sizes::chacha::NONCE_SIZE,
            nonce.len()
        ),
    }
}

/// An element-side tag failure is an authentication failure, not a transport error
fn authentication_failure(error: Error) -> Error {
    match error {
        Error::Underlying(SeStatus::InvalidSignature) => {
            warn!("authentication tag rejected by the element");
            Error::TagMismatch
        }
        other => other,
    }
}
