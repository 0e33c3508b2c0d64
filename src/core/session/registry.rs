/*!
Registry of open sessions.

Records which session holds each command channel, so exclusivity can be
checked from outside the session that owns the channel.
*/

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use log::warn;

use crate::core::channel::ChannelId;
use crate::core::error::{Error, Result, SessionId};
use crate::core::session::state::SessionMode;

/// Registry entry for a channel with an open session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveSession {
    /// Session holding the channel
    pub session_id: SessionId,
    /// What the session is doing
    pub mode: SessionMode,
}

/// Tracks at most one open session per channel
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<ChannelId, ActiveSession>>,
    next_channel: AtomicU64,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_channel: AtomicU64::new(1),
        }
    }

    /// Hand out an id for a channel attached to this registry
    pub(crate) fn allocate_channel_id(&self) -> ChannelId {
        ChannelId(self.next_channel.fetch_add(1, Ordering::Relaxed))
    }

    /// Record `session_id` as the owner of `channel`
    ///
    /// Fails with `ChannelBusy` if the channel already has an entry.
    pub fn register(&self, channel: ChannelId, session_id: SessionId, mode: SessionMode) -> Result<()> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| Error::Internal("session registry lock poisoned".into()))?;

        if let Some(active) = sessions.get(&channel) {
            warn!("{} already holds {}", active.session_id, channel);
            return Err(Error::ChannelBusy {
                owner: active.session_id,
            });
        }

        sessions.insert(channel, ActiveSession { session_id, mode });
        Ok(())
    }

    /// Remove the entry for `channel` if it belongs to `session_id`
    ///
    /// Returns whether an entry was removed. Never fails, so it is safe to
    /// call from drop paths.
    pub fn release(&self, channel: ChannelId, session_id: SessionId) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        match sessions.get(&channel) {
            Some(active) if active.session_id == session_id => {
                sessions.remove(&channel);
                true
            }
            _ => false,
        }
    }

    /// Session currently holding `channel`
    pub fn active(&self, channel: ChannelId) -> Option<ActiveSession> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.get(&channel).copied()
    }

    /// Whether `channel` has an open session
    pub fn is_open(&self, channel: ChannelId) -> bool {
        self.active(channel).is_some()
    }

    /// Number of channels with an open session
    pub fn open_count(&self) -> usize {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.len()
    }

    /// Channels that currently have an open session
    pub fn open_channels(&self) -> Vec<ChannelId> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let mut channels: Vec<_> = sessions.keys().copied().collect();
        channels.sort();
        channels
    }
}
