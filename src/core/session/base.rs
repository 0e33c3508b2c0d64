/*!
State shared by every streaming session: the channel, the key, the phase and
the lease that proves ownership of the channel.
*/

use log::{debug, warn};

use crate::core::channel::{ChannelLease, CommandChannel};
use crate::core::config::StreamConfig;
use crate::core::element::SecureElement;
use crate::core::error::{Error, Result, SeResult, SessionId};
use crate::core::key::KeyHandle;
use crate::core::session::state::{Phase, PhaseTracker, SessionMode};

pub(crate) struct SessionBase<'a, E: SecureElement> {
    channel: &'a CommandChannel<E>,
    pub(crate) key: &'a KeyHandle,
    pub(crate) config: StreamConfig,
    mode: SessionMode,
    tracker: PhaseTracker,
    lease: Option<ChannelLease<'a, E>>,
}

impl<'a, E: SecureElement> SessionBase<'a, E> {
    pub(crate) fn new(
        channel: &'a CommandChannel<E>,
        key: &'a KeyHandle,
        config: StreamConfig,
        mode: SessionMode,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            channel,
            key,
            config,
            mode,
            tracker: PhaseTracker::new(),
            lease: None,
        })
    }

    pub(crate) fn phase(&self) -> Phase {
        self.tracker.phase()
    }

    pub(crate) fn mode(&self) -> SessionMode {
        self.mode
    }

    pub(crate) fn session_id(&self) -> Option<SessionId> {
        self.lease.as_ref().map(|lease| lease.session_id())
    }

    /// Acquire the channel and move to Started
    pub(crate) fn open(&mut self) -> Result<()> {
        self.tracker.ensure_idle()?;
        let lease = self.channel.try_acquire(self.mode)?;
        debug!("{} started ({}, {})", lease.session_id(), self.mode, self.key.algorithm_family());
        self.lease = Some(lease);
        self.tracker.transition_to_started()
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        self.tracker.ensure_open()
    }

    pub(crate) fn mark_updated(&mut self) -> Result<()> {
        self.tracker.transition_to_updated()
    }

    /// Issue one command under the session's lease
    ///
    /// An element failure kills the session: the channel is released before
    /// the error is returned.
    pub(crate) fn command<T>(&mut self, f: impl FnOnce(&mut E) -> SeResult<T>) -> Result<T> {
        let lease = match &self.lease {
            Some(lease) => lease,
            None => return Err(Error::Internal("session has no channel lease".into())),
        };
        match lease.execute(f) {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!("{} failed in {}: {}", lease.session_id(), self.tracker.phase(), e);
                self.fail();
                Err(e)
            }
        }
    }

    /// Move to Finished and release the channel
    pub(crate) fn close(&mut self) -> Result<()> {
        self.tracker.transition_to_finished()?;
        if let Some(lease) = self.lease.take() {
            debug!("{} finished", lease.session_id());
            lease.release();
        }
        Ok(())
    }

    /// Move to Aborted and release the channel
    pub(crate) fn abort(&mut self) -> Result<()> {
        self.tracker.transition_to_aborted()?;
        if let Some(lease) = self.lease.take() {
            debug!("{} aborted", lease.session_id());
            lease.release();
        }
        Ok(())
    }

    /// Kill the session over an element reply that breaks the command contract
    pub(crate) fn reject_reply(&mut self, detail: String) -> Error {
        warn!("{} rejected element reply: {}", self.mode, detail);
        self.fail();
        Error::Internal(detail)
    }

    fn fail(&mut self) {
        if self.tracker.transition_to_aborted().is_ok() {
            if let Some(lease) = self.lease.take() {
                lease.release();
            }
        }
    }
}
