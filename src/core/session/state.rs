/*!
Session phase and mode tracking.

A session moves forward only: Idle, Started, any number of Updated steps,
then Finished. Abort can cut in from any non-terminal phase.
*/

use std::fmt;

use crate::core::element::CipherDirection;
use crate::core::error::Result;
use crate::invalid_sequence_err;

/// Phase of a streaming session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Created, channel not yet acquired
    Idle,
    /// Channel acquired and start command issued
    Started,
    /// At least one update issued
    Updated,
    /// Finished; channel released
    Finished,
    /// Aborted; channel released
    Aborted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "Idle"),
            Phase::Started => write!(f, "Started"),
            Phase::Updated => write!(f, "Updated"),
            Phase::Finished => write!(f, "Finished"),
            Phase::Aborted => write!(f, "Aborted"),
        }
    }
}

/// Kind of operation holding a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum SessionMode {
    /// Multipart CMAC
    Cmac,
    /// Multipart AES-GCM encryption
    GcmEncrypt,
    /// Multipart AES-GCM decryption
    GcmDecrypt,
    /// ChaCha20 encryption
    ChaCha20Encrypt,
    /// ChaCha20 decryption
    ChaCha20Decrypt,
    /// Single command issued through a channel helper
    OneShot,
}

impl SessionMode {
    /// GCM mode for a direction
    pub fn gcm(direction: CipherDirection) -> Self {
        match direction {
            CipherDirection::Encrypt => SessionMode::GcmEncrypt,
            CipherDirection::Decrypt => SessionMode::GcmDecrypt,
        }
    }

    /// ChaCha20 mode for a direction
    pub fn chacha20(direction: CipherDirection) -> Self {
        match direction {
            CipherDirection::Encrypt => SessionMode::ChaCha20Encrypt,
            CipherDirection::Decrypt => SessionMode::ChaCha20Decrypt,
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::Cmac => write!(f, "CMAC"),
            SessionMode::GcmEncrypt => write!(f, "GCM-Encrypt"),
            SessionMode::GcmDecrypt => write!(f, "GCM-Decrypt"),
            SessionMode::ChaCha20Encrypt => write!(f, "ChaCha20-Encrypt"),
            SessionMode::ChaCha20Decrypt => write!(f, "ChaCha20-Decrypt"),
            SessionMode::OneShot => write!(f, "one-shot"),
        }
    }
}

/// Phase tracker
///
/// Guards every transition and reports the phase the session was actually in
/// when an operation arrives out of order.
#[derive(Debug, Clone, Copy)]
pub struct PhaseTracker {
    phase: Phase,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTracker {
    /// Create a tracker in the Idle phase
    pub fn new() -> Self {
        Self { phase: Phase::Idle }
    }

    /// Get the current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether the session currently holds the channel
    pub fn is_open(&self) -> bool {
        matches!(self.phase, Phase::Started | Phase::Updated)
    }

    /// Whether the session is dead
    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, Phase::Finished | Phase::Aborted)
    }

    /// Check that the session may start
    pub fn ensure_idle(&self) -> Result<()> {
        if self.phase != Phase::Idle {
            return invalid_sequence_err!("Idle", self.phase);
        }
        Ok(())
    }

    /// Check that the session may take update or finish calls
    pub fn ensure_open(&self) -> Result<()> {
        if !self.is_open() {
            return invalid_sequence_err!("Started", self.phase);
        }
        Ok(())
    }

    /// Idle -> Started
    pub fn transition_to_started(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.phase = Phase::Started;
        Ok(())
    }

    /// Started | Updated -> Updated
    pub fn transition_to_updated(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.phase = Phase::Updated;
        Ok(())
    }

    /// Started | Updated -> Finished
    pub fn transition_to_finished(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.phase = Phase::Finished;
        Ok(())
    }

    /// Any non-terminal phase -> Aborted
    pub fn transition_to_aborted(&mut self) -> Result<()> {
        if self.is_terminal() {
            return invalid_sequence_err!("Idle or Started", self.phase);
        }
        self.phase = Phase::Aborted;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Error;

    #[test]
    fn test_forward_transitions() {
        let mut tracker = PhaseTracker::new();
        assert_eq!(tracker.phase(), Phase::Idle);
        assert!(!tracker.is_open());

        tracker.transition_to_started().unwrap();
        assert!(tracker.is_open());

        tracker.transition_to_updated().unwrap();
        tracker.transition_to_updated().unwrap();
        assert_eq!(tracker.phase(), Phase::Updated);

        tracker.transition_to_finished().unwrap();
        assert_eq!(tracker.phase(), Phase::Finished);
        assert!(tracker.is_terminal());
    }

    #[test]
    fn test_out_of_order_reports_actual_phase() {
        let mut tracker = PhaseTracker::new();
        match tracker.transition_to_updated() {
            Err(Error::InvalidSequence { actual, .. }) => assert_eq!(actual, Phase::Idle),
            other => panic!("unexpected: {:?}", other),
        }

        tracker.transition_to_started().unwrap();
        assert!(tracker.transition_to_started().is_err());

        tracker.transition_to_finished().unwrap();
        assert!(tracker.transition_to_finished().is_err());
        assert!(tracker.transition_to_updated().is_err());
        assert!(tracker.transition_to_aborted().is_err());
    }

    #[test]
    fn test_abort_from_idle_and_open() {
        let mut idle = PhaseTracker::new();
        idle.transition_to_aborted().unwrap();
        assert_eq!(idle.phase(), Phase::Aborted);
        assert!(idle.transition_to_started().is_err());

        let mut open = PhaseTracker::new();
        open.transition_to_started().unwrap();
        open.transition_to_aborted().unwrap();
        assert!(open.ensure_open().is_err());
    }

    #[test]
    fn test_mode_for_direction() {
        assert_eq!(SessionMode::gcm(CipherDirection::Decrypt), SessionMode::GcmDecrypt);
        assert_eq!(SessionMode::chacha20(CipherDirection::Encrypt), SessionMode::ChaCha20Encrypt);
        assert_eq!(SessionMode::Cmac.to_string(), "CMAC");
    }
}
