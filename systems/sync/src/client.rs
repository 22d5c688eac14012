//! Sync client: the only component that talks to the session service.

use tabletop_board::{apply, query, Board};
use tabletop_core::{
    Change, ChannelError, ConflictReason, EntityId, EntitySpec, Envelope, GridCell, Inbound,
    Intent, SyncError,
};
use tracing::{debug, info, warn};

use crate::{wire, Channel};

/// Outcome of handing a single envelope to the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// The event was applied to the board.
    Applied,
    /// The sequence number was already seen; the event was dropped.
    Stale,
    /// An incremental event arrived while a full resync was pending.
    Deferred,
    /// The payload failed validation and never reached the board.
    Rejected,
}

/// Counters describing the traffic handled by a client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Events applied to the board.
    pub applied: u64,
    /// Events dropped because of a stale or duplicate sequence number.
    pub stale: u64,
    /// Incremental events ignored while waiting for a full list.
    pub deferred: u64,
    /// Events rejected by payload validation.
    pub rejected: u64,
    /// Conflicts raised while applying events or tracking sequences.
    pub conflicts: u64,
    /// Full entity lists requested to recover from conflicts.
    pub resyncs_requested: u64,
}

/// Sync client bound to a single campaign and channel.
#[derive(Debug)]
pub struct SyncClient<C> {
    channel: C,
    code: String,
    next_sequence: Option<u64>,
    awaiting_full_list: bool,
    disconnected: bool,
    failures: Vec<ChannelError>,
    stats: SyncStats,
}

impl<C: Channel> SyncClient<C> {
    /// Creates a client for the campaign identified by `code`.
    pub fn new(channel: C, code: impl Into<String>) -> Self {
        Self {
            channel,
            code: code.into(),
            next_sequence: None,
            awaiting_full_list: false,
            disconnected: false,
            failures: Vec::new(),
            stats: SyncStats::default(),
        }
    }

    /// Campaign code attached to outbound intents.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Borrows the underlying channel.
    #[must_use]
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Mutably borrows the underlying channel.
    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Traffic counters accumulated so far.
    #[must_use]
    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Reports whether incremental events are ignored until a full list arrives.
    #[must_use]
    pub fn awaiting_full_list(&self) -> bool {
        self.awaiting_full_list
    }

    /// Reports whether the channel reported a permanent disconnect.
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    /// Asks the service to admit this participant to the campaign.
    pub fn join_session(&mut self) {
        let code = self.code.clone();
        self.send(Intent::JoinSession { code });
    }

    /// Asks the service for the authoritative entity list.
    pub fn request_entity_list(&mut self) {
        let code = self.code.clone();
        self.send(Intent::RequestEntityList { code });
    }

    /// Asks the service to move an entity. The board changes only on confirmation.
    pub fn request_move(&mut self, entity: EntityId, target: GridCell) {
        self.send(Intent::RequestMove { entity, target });
    }

    /// Asks the service to create an entity.
    pub fn request_spawn(&mut self, spec: EntitySpec) {
        let code = self.code.clone();
        self.send(Intent::RequestSpawn { code, spec });
    }

    /// Sends a chat line to the campaign.
    pub fn send_chat(&mut self, text: impl Into<String>) {
        let code = self.code.clone();
        self.send(Intent::SendChat {
            code,
            text: text.into(),
        });
    }

    /// Forwards an intent produced by a system.
    pub fn submit(&mut self, intent: Intent) {
        self.send(intent);
    }

    /// Drains every envelope currently waiting on the channel into the board.
    ///
    /// Recoverable conflicts are handled internally by requesting a resync.
    /// Returns the number of envelopes processed, or the first fatal error.
    pub fn pump(
        &mut self,
        board: &mut Board,
        out: &mut Vec<Change>,
    ) -> Result<usize, SyncError> {
        for failure in std::mem::take(&mut self.failures) {
            record_failure(board, &failure, out)?;
        }

        let mut processed = 0;
        while !self.disconnected {
            match self.channel.try_recv() {
                Ok(Some(envelope)) => {
                    processed += 1;
                    match self.receive(board, envelope, out) {
                        Ok(_) => {}
                        Err(error) if error.is_recoverable() => {}
                        Err(error) => return Err(error),
                    }
                }
                Ok(None) => break,
                Err(error) => {
                    if error == ChannelError::Disconnected {
                        self.disconnected = true;
                    }
                    record_failure(board, &error, out)?;
                    break;
                }
            }
        }

        Ok(processed)
    }

    /// Validates, sequences and applies a single envelope.
    ///
    /// Conflicts are returned after the client already asked for a resync.
    /// Events that do not touch entities are still applied after a sequence gap.
    pub fn receive(
        &mut self,
        board: &mut Board,
        envelope: Envelope,
        out: &mut Vec<Change>,
    ) -> Result<Delivery, SyncError> {
        let Envelope { sequence, event } = envelope;

        if let Err(error) = wire::validate(&event) {
            warn!(%error, "rejecting inbound event");
            self.stats.rejected += 1;
            return Ok(Delivery::Rejected);
        }

        let mut gap = None;
        if let Some(sequence) = sequence {
            if let Some(expected) = self.next_sequence {
                if sequence < expected {
                    debug!(sequence, expected, event = event.name(), "dropping stale event");
                    self.stats.stale += 1;
                    return Ok(Delivery::Stale);
                }
                if sequence > expected && !event.is_full_snapshot() {
                    gap = Some(ConflictReason::SequenceGap {
                        expected,
                        received: sequence,
                    });
                }
            }
            self.next_sequence = Some(sequence.saturating_add(1));
        }

        if let Some(reason) = gap {
            let conflict = SyncError::Conflict {
                event: event.name(),
                reason,
            };
            self.raise_conflict(board, &conflict);
            if is_incremental(&event) {
                return Err(conflict);
            }
        }

        if self.awaiting_full_list && is_incremental(&event) {
            debug!(event = event.name(), "ignoring incremental event until resync");
            self.stats.deferred += 1;
            return Ok(Delivery::Deferred);
        }

        let full_snapshot = event.is_full_snapshot();
        let session_start = matches!(event, Inbound::SessionResourcesReady { .. });
        match apply(board, event, out) {
            Ok(()) => {
                self.stats.applied += 1;
                if full_snapshot {
                    self.awaiting_full_list = false;
                }
                if session_start {
                    info!("session resources ready, requesting entity list");
                    self.awaiting_full_list = true;
                    self.request_entity_list();
                }
                Ok(Delivery::Applied)
            }
            Err(error) if error.is_recoverable() => {
                self.raise_conflict(board, &error);
                Err(error)
            }
            Err(error) => {
                warn!(%error, "session configuration rejected");
                Err(error)
            }
        }
    }

    fn raise_conflict(&mut self, board: &Board, conflict: &SyncError) {
        self.stats.conflicts += 1;
        warn!(%conflict, "sync conflict");
        if !query::session_ready(board) || self.awaiting_full_list {
            return;
        }
        self.awaiting_full_list = true;
        self.stats.resyncs_requested += 1;
        self.request_entity_list();
    }

    fn send(&mut self, intent: Intent) {
        if let Err(error) = self.channel.send(intent) {
            warn!(%error, "failed to send intent");
            if error == ChannelError::Disconnected {
                self.disconnected = true;
            }
            self.failures.push(error);
        }
    }
}

fn is_incremental(event: &Inbound) -> bool {
    matches!(
        event,
        Inbound::EntityMoved { .. }
            | Inbound::EntitySpawned { .. }
            | Inbound::EntityRemoved { .. }
            | Inbound::EntityStatsUpdated { .. }
    )
}

fn record_failure(
    board: &mut Board,
    failure: &ChannelError,
    out: &mut Vec<Change>,
) -> Result<(), SyncError> {
    warn!(error = %failure, "session channel failure");
    apply(
        board,
        Inbound::ErrorNotice {
            detail: failure.to_string(),
        },
        out,
    )
}
