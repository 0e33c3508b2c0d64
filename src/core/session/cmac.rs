/*!
Streaming CMAC session.
*/

use log::trace;

use crate::core::channel::CommandChannel;
use crate::core::chunk::ChunkPlanner;
use crate::core::config::StreamConfig;
use crate::core::element::{CmacTag, SecureElement};
use crate::core::error::{Error, Result, SessionId};
use crate::core::key::KeyHandle;
use crate::core::session::base::SessionBase;
use crate::core::session::state::{Phase, SessionMode};
use crate::param_err;

/// Multipart CMAC over an arbitrarily long message
///
/// ```no_run
/// # use se_stream::{CmacSession, CommandChannel, KeyHandle, SoftSecureElement};
/// # fn main() -> se_stream::Result<()> {
/// let channel = CommandChannel::new(SoftSecureElement::initialized());
/// let key = KeyHandle::aes(&[0x2b; 16])?;
///
/// let mut session = CmacSession::begin(&channel, &key)?;
/// session.update(b"first part, ")?;
/// session.update(b"second part")?;
/// let tag = session.finish()?;
/// # let _ = tag;
/// # Ok(())
/// # }
/// ```
pub struct CmacSession<'a, E: SecureElement> {
    base: SessionBase<'a, E>,
    ctx: Option<E::CmacContext>,
}

impl<'a, E: SecureElement> CmacSession<'a, E> {
    /// Create an idle session with the default configuration
    pub fn new(channel: &'a CommandChannel<E>, key: &'a KeyHandle) -> Result<Self> {
        Self::with_config(channel, key, StreamConfig::default())
    }

    /// Create an idle session
    ///
    /// The key must be an AES key.
    pub fn with_config(
        channel: &'a CommandChannel<E>,
        key: &'a KeyHandle,
        config: StreamConfig,
    ) -> Result<Self> {
        if !key.algorithm_family().is_aes() {
            return param_err!("CMAC needs an AES key, got {}", key.algorithm_family());
        }
        Ok(Self {
            base: SessionBase::new(channel, key, config, SessionMode::Cmac)?,
            ctx: None,
        })
    }

    /// Create and start a session in one step
    pub fn begin(channel: &'a CommandChannel<E>, key: &'a KeyHandle) -> Result<Self> {
        let mut session = Self::new(channel, key)?;
        session.start()?;
        Ok(session)
    }

    /// Take the channel and start the MAC
    pub fn start(&mut self) -> Result<()> {
        self.base.open()?;
        let key = self.base.key;
        let ctx = self.base.command(|se| se.cmac_multipart_start(key))?;
        self.ctx = Some(ctx);
        Ok(())
    }

    /// Feed data of any length into the MAC
    pub fn update(&mut self, data: &[u8]) -> Result<()> {
        self.base.ensure_open()?;
        let key = self.base.key;
        let planner = ChunkPlanner::new(data.len(), self.base.config.plain_chunk_capacity)?;

        for chunk in planner.chunks().filter(|chunk| !chunk.is_empty()) {
            let ctx = self
                .ctx
                .as_mut()
                .ok_or_else(|| Error::Internal("CMAC context missing".into()))?;
            let input = &data[chunk.input_range()];
            self.base
                .command(|se| se.cmac_multipart_update(ctx, key, input))?;
            trace!("cmac: absorbed {} bytes at offset {}", chunk.length, chunk.offset_in);
        }

        self.base.mark_updated()
    }

    /// Compute the tag and release the channel
    pub fn finish(&mut self) -> Result<CmacTag> {
        self.base.ensure_open()?;
        let key = self.base.key;
        let mut ctx = self
            .ctx
            .take()
            .ok_or_else(|| Error::Internal("CMAC context missing".into()))?;
        let tag = self.base.command(|se| se.cmac_multipart_finish(&mut ctx, key))?;
        self.base.close()?;
        Ok(tag)
    }

    /// Abandon the session and release the channel
    pub fn abort(&mut self) -> Result<()> {
        self.ctx = None;
        self.base.abort()
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.base.phase()
    }

    /// Session id while the channel is held
    pub fn session_id(&self) -> Option<SessionId> {
        self.base.session_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::element::SoftSecureElement;
    use crate::core::error::SeStatus;

    fn fixture() -> (CommandChannel<SoftSecureElement>, KeyHandle) {
        (
            CommandChannel::new(SoftSecureElement::initialized()),
            KeyHandle::aes(&[0x11u8; 16]).unwrap(),
        )
    }

    #[test]
    fn test_chunked_updates_match_one_shot() {
        let (channel, key) = fixture();
        let message: Vec<u8> = (0..1000u32).map(|i| i as u8).collect();

        let mut session = CmacSession::begin(&channel, &key).unwrap();
        for part in message.chunks(77) {
            session.update(part).unwrap();
        }
        let streamed = session.finish().unwrap();

        assert_eq!(streamed, channel.cmac(&key, &message).unwrap());
        assert_eq!(session.phase(), Phase::Finished);
        assert!(!channel.is_busy());
    }

    #[test]
    fn test_update_before_start() {
        let (channel, key) = fixture();
        let mut session = CmacSession::new(&channel, &key).unwrap();
        assert!(matches!(session.update(b"x"), Err(Error::InvalidSequence { .. })));
        assert!(!channel.is_busy());
    }

    #[test]
    fn test_rejects_non_aes_key() {
        let (channel, _) = fixture();
        let key = KeyHandle::chacha20(&[0u8; 32]).unwrap();
        assert!(matches!(CmacSession::new(&channel, &key), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_element_failure_releases_channel() {
        let (channel, key) = fixture();
        // start succeeds, the first update fails
        channel.with_element(|se| se.fail_after(1, SeStatus::Fail)).unwrap();
        let mut session = CmacSession::begin(&channel, &key).unwrap();

        let err = session.update(b"data").unwrap_err();
        assert_eq!(err.status(), Some(SeStatus::Fail));
        assert_eq!(session.phase(), Phase::Aborted);
        assert!(!channel.is_busy());
        assert!(matches!(session.finish(), Err(Error::InvalidSequence { .. })));
    }
}
