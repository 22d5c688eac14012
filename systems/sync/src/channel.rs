//! Transport seam between the sync client and the session service.

use std::collections::VecDeque;

use tabletop_core::{ChannelError, Envelope, Intent};

/// Bidirectional link to a session service.
///
/// Implementations never block: `try_recv` returns `Ok(None)` when no
/// envelope is waiting and [`ChannelError::Disconnected`] once the remote end
/// has gone away for good.
pub trait Channel {
    /// Sends an intent to the service.
    fn send(&mut self, intent: Intent) -> Result<(), ChannelError>;

    /// Takes the next inbound envelope, if one has arrived.
    fn try_recv(&mut self) -> Result<Option<Envelope>, ChannelError>;
}

/// In-memory channel that records intents and replays scripted envelopes.
#[derive(Debug, Default)]
pub struct LoopbackChannel {
    inbound: VecDeque<Envelope>,
    sent: Vec<Intent>,
    closed: bool,
}

impl LoopbackChannel {
    /// Creates an empty, open loopback channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an envelope that the next `try_recv` calls will return.
    pub fn push(&mut self, envelope: Envelope) {
        self.inbound.push_back(envelope);
    }

    /// Intents sent through the channel so far, oldest first.
    #[must_use]
    pub fn sent(&self) -> &[Intent] {
        &self.sent
    }

    /// Removes and returns the recorded intents.
    pub fn take_sent(&mut self) -> Vec<Intent> {
        std::mem::take(&mut self.sent)
    }

    /// Marks the channel as disconnected once queued envelopes are drained.
    pub fn close(&mut self) {
        self.closed = true;
    }
}

impl Channel for LoopbackChannel {
    fn send(&mut self, intent: Intent) -> Result<(), ChannelError> {
        if self.closed {
            return Err(ChannelError::Disconnected);
        }
        self.sent.push(intent);
        Ok(())
    }

    fn try_recv(&mut self) -> Result<Option<Envelope>, ChannelError> {
        match self.inbound.pop_front() {
            Some(envelope) => Ok(Some(envelope)),
            None if self.closed => Err(ChannelError::Disconnected),
            None => Ok(None),
        }
    }
}
