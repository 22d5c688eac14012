#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the tabletop board client.
//!
//! This crate defines the message surface that connects adapters, the local
//! board model, and the session service. Systems submit [`Intent`] values
//! describing actions the remote service should arbitrate, the service answers
//! with [`Envelope`]-wrapped [`Inbound`] events, the board applies those events
//! through its single `apply` entry point, and then broadcasts [`Change`]
//! values so systems and renderers can react without reaching into the model.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outbound actions sent to the remote session service.
///
/// Intents are fire-and-forget: the local board never changes when an intent
/// is sent, only when the corresponding [`Inbound`] event comes back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    /// Joins the campaign session identified by `code`.
    JoinSession {
        /// Campaign code shared by every participant.
        code: String,
    },
    /// Requests the authoritative entity list for the campaign.
    RequestEntityList {
        /// Campaign code shared by every participant.
        code: String,
    },
    /// Requests that an entity be moved to the provided anchor cell.
    RequestMove {
        /// Entity that should move.
        entity: EntityId,
        /// Destination anchor cell.
        target: GridCell,
    },
    /// Requests that the service create a new entity on the board.
    RequestSpawn {
        /// Campaign code shared by every participant.
        code: String,
        /// Description of the entity to create.
        spec: EntitySpec,
    },
    /// Sends a chat line to every participant.
    SendChat {
        /// Campaign code shared by every participant.
        code: String,
        /// Message body.
        text: String,
    },
}

/// Authoritative events pushed by the remote session service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    /// Map metadata and participant role became available for the session.
    SessionResourcesReady {
        /// Metadata describing the active map section.
        map: MapMeta,
        /// Role granted to this participant.
        role: Role,
        /// Entity controlled by this participant, if any.
        #[serde(default)]
        self_entity: Option<EntityId>,
    },
    /// Answer to an explicit entity list request.
    EntityListResult {
        /// Every entity currently on the board.
        entities: Vec<Entity>,
    },
    /// Confirms that an entity moved to a new anchor cell.
    EntityMoved {
        /// Entity that moved.
        entity: EntityId,
        /// Anchor cell the entity occupies after the move.
        to: GridCell,
    },
    /// Confirms that a new entity was created.
    EntitySpawned {
        /// Entity that was created, including its starting cell.
        entity: Entity,
    },
    /// Unsolicited full snapshot of every entity on the board.
    EntitiesSynced {
        /// Every entity currently on the board.
        entities: Vec<Entity>,
    },
    /// Confirms that an entity left the board.
    EntityRemoved {
        /// Entity that was removed.
        entity: EntityId,
    },
    /// Reports new hit points or armor class for an entity.
    EntityStatsUpdated {
        /// Entity whose stats changed.
        entity: EntityId,
        /// Updated hit points.
        hit_points: HitPoints,
        /// Updated armor class.
        armor_class: i32,
    },
    /// Chat line broadcast to the campaign.
    ChatMessage {
        /// Display name of the author.
        sender: String,
        /// Message body.
        text: String,
    },
    /// Error reported by the service or raised locally at the channel boundary.
    ErrorNotice {
        /// Human readable description.
        detail: String,
    },
}

impl Inbound {
    /// Reports whether the event replaces the complete entity set.
    #[must_use]
    pub const fn is_full_snapshot(&self) -> bool {
        matches!(
            self,
            Self::EntityListResult { .. } | Self::EntitiesSynced { .. }
        )
    }

    /// Short, stable name of the event used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SessionResourcesReady { .. } => "session_resources_ready",
            Self::EntityListResult { .. } => "entity_list_result",
            Self::EntityMoved { .. } => "entity_moved",
            Self::EntitySpawned { .. } => "entity_spawned",
            Self::EntitiesSynced { .. } => "entities_synced",
            Self::EntityRemoved { .. } => "entity_removed",
            Self::EntityStatsUpdated { .. } => "entity_stats_updated",
            Self::ChatMessage { .. } => "chat_message",
            Self::ErrorNotice { .. } => "error_notice",
        }
    }
}

/// Inbound event tagged with the optional per-campaign sequence number.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Monotonic sequence number assigned by the service, when it provides one.
    #[serde(default, rename = "seq", skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    /// Event carried by the envelope.
    #[serde(flatten)]
    pub event: Inbound,
}

impl Envelope {
    /// Wraps an event that carries no sequence number.
    #[must_use]
    pub const fn unsequenced(event: Inbound) -> Self {
        Self {
            sequence: None,
            event,
        }
    }

    /// Wraps an event with the provided sequence number.
    #[must_use]
    pub const fn sequenced(sequence: u64, event: Inbound) -> Self {
        Self {
            sequence: Some(sequence),
            event,
        }
    }
}

/// Notifications broadcast by the board after an inbound event was applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Change {
    /// The grid was allocated for a freshly loaded map.
    SessionReady {
        /// Number of grid columns.
        columns: u32,
        /// Number of grid rows.
        rows: u32,
        /// Role granted to this participant.
        role: Role,
    },
    /// A new entity was placed on the grid.
    EntityPlaced {
        /// Entity that was placed.
        entity: EntityId,
        /// Anchor cell now held by the entity.
        cell: GridCell,
    },
    /// An entity moved between two cells.
    EntityMoved {
        /// Entity that moved.
        entity: EntityId,
        /// Anchor cell before the move.
        from: GridCell,
        /// Anchor cell after the move.
        to: GridCell,
    },
    /// An entity left the board.
    EntityRemoved {
        /// Entity that was removed.
        entity: EntityId,
        /// Anchor cell the entity held before removal.
        cell: GridCell,
    },
    /// Hit points or armor class changed for an entity.
    StatsChanged {
        /// Entity whose stats changed.
        entity: EntityId,
    },
    /// The board was rebuilt from a full snapshot.
    Resynced {
        /// Number of entities retained on the board.
        retained: usize,
        /// Number of records skipped because their cell was unusable.
        skipped: usize,
    },
    /// A chat line was appended to the log.
    ChatReceived,
    /// A transient notice should be surfaced to the user.
    NoticeRaised,
}

/// Location of a single grid cell expressed as column and row coordinates.
///
/// Coordinates are signed so that conversions of points outside the map remain
/// representable; callers check validity against the grid bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    #[serde(rename = "x")]
    column: i32,
    #[serde(rename = "y")]
    row: i32,
}

impl GridCell {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: i32, row: i32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> i32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> i32 {
        self.row
    }
}

impl fmt::Display for GridCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.column, self.row)
    }
}

/// Opaque identifier assigned to an entity by the session service.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Creates a new entity identifier.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrows the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reports whether the identifier is empty and therefore unusable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Category of token placed on the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Token controlled by a player character.
    Player,
    /// Token controlled by the game master.
    Enemy,
}

/// Current and maximum hit points of an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HitPoints {
    /// Remaining hit points.
    pub current: i32,
    /// Maximum hit points.
    pub max: i32,
}

impl HitPoints {
    /// Creates a new hit point pair.
    #[must_use]
    pub const fn new(current: i32, max: i32) -> Self {
        Self { current, max }
    }

    /// Remaining hit points as a fraction of the maximum, clamped to `0.0..=1.0`.
    #[must_use]
    pub fn ratio(&self) -> f32 {
        if self.max <= 0 {
            return 0.0;
        }
        (self.current as f32 / self.max as f32).clamp(0.0, 1.0)
    }
}

/// Size of an entity's token measured in whole cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Footprint {
    width: u32,
    height: u32,
}

impl Footprint {
    /// Footprint covering a single cell.
    pub const SINGLE: Self = Self::new(1, 1);

    /// Creates a new footprint descriptor.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width of the footprint in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the footprint in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Reports whether both dimensions cover at least one cell.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl Default for Footprint {
    fn default() -> Self {
        Self::SINGLE
    }
}

/// Token placed on the board, as last reported by the session service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier assigned by the service.
    pub id: EntityId,
    /// Category of the token.
    pub kind: EntityKind,
    /// Name shown in previews.
    pub display_name: String,
    /// Current and maximum hit points.
    pub hit_points: HitPoints,
    /// Armor class shown in previews.
    pub armor_class: i32,
    /// Size of the token in cells. Occupancy tracks the anchor cell only.
    #[serde(default)]
    pub footprint: Footprint,
    /// Anchor cell of the token.
    pub position: GridCell,
    /// Locator of the token image.
    #[serde(default)]
    pub asset_ref: String,
}

impl Entity {
    /// Describes why the record cannot be shown on the board, if anything.
    #[must_use]
    pub fn defect(&self) -> Option<String> {
        if self.id.is_empty() {
            return Some("entity identifier is empty".to_owned());
        }
        if !self.footprint.is_valid() {
            return Some(format!("entity {} has an empty footprint", self.id));
        }
        if self.hit_points.max <= 0 {
            return Some(format!(
                "entity {} reports non-positive maximum hit points",
                self.id
            ));
        }
        None
    }
}

/// Description of an entity the game master asks the service to create.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpec {
    /// Category of the token.
    pub kind: EntityKind,
    /// Name shown in previews.
    pub display_name: String,
    /// Starting hit points.
    pub hit_points: HitPoints,
    /// Armor class shown in previews.
    pub armor_class: i32,
    /// Size of the token in cells.
    pub footprint: Footprint,
    /// Locator of the token image, usually returned by the asset upload API.
    pub asset_ref: String,
}

/// Role granted to a participant of the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular participant controlling a single character.
    Player,
    /// Game master allowed to select and move any token.
    GameMaster,
}

/// Metadata describing the active map section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapMeta {
    /// Width of the visible section in pixels.
    pub width_px: u32,
    /// Height of the visible section in pixels.
    pub height_px: u32,
    /// Side length of a single square tile in pixels.
    pub tile_size_px: u32,
    /// Horizontal offset of the section inside the source image.
    #[serde(default)]
    pub section_offset_x: u32,
    /// Vertical offset of the section inside the source image.
    #[serde(default)]
    pub section_offset_y: u32,
    /// Locator of the source map image.
    pub map_image_url: String,
}

impl MapMeta {
    /// Derives the number of grid columns and rows covered by the section.
    pub fn grid_dimensions(&self) -> Result<(u32, u32), ConfigError> {
        if self.tile_size_px == 0 {
            return Err(ConfigError::InvalidTileSize {
                tile_size_px: self.tile_size_px,
            });
        }

        let columns = self.width_px / self.tile_size_px;
        let rows = self.height_px / self.tile_size_px;
        if columns == 0 || rows == 0 {
            return Err(ConfigError::NonPositiveDimensions {
                columns: i64::from(columns),
                rows: i64::from(rows),
            });
        }

        Ok((columns, rows))
    }
}

/// Chat line received from the campaign.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatLine {
    /// Display name of the author.
    pub sender: String,
    /// Message body.
    pub text: String,
}

/// Transient notice surfaced to the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    /// Human readable description.
    pub detail: String,
}

/// Character sheet as returned by the character HTTP API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSheet {
    /// Identifier shared with the character's board entity.
    pub id: EntityId,
    /// Character name.
    pub name: String,
    /// Character level.
    pub level: u32,
    /// Current and maximum hit points.
    pub hit_points: HitPoints,
    /// Locator of the character portrait.
    #[serde(default)]
    pub portrait_url: Option<String>,
}

/// Read-only access to character sheets used to resolve display names and art.
pub trait CharacterDirectory {
    /// Looks up the character sheet with the provided identifier.
    fn character_by_id(&self, id: &EntityId) -> Option<CharacterSheet>;
}

/// Errors raised when the session configuration cannot produce a usable grid.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The grid must contain at least one column and one row.
    #[error("grid dimensions must be positive (received {columns}x{rows})")]
    NonPositiveDimensions {
        /// Requested column count.
        columns: i64,
        /// Requested row count.
        rows: i64,
    },
    /// Tiles must have a positive side length.
    #[error("tile size must be positive (received {tile_size_px})")]
    InvalidTileSize {
        /// Provided tile size.
        tile_size_px: u32,
    },
}

/// Reasons a grid mutation may be rejected.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GridError {
    /// The cell lies outside the grid bounds.
    #[error("cell {cell} lies outside the grid")]
    InvalidCell {
        /// Rejected cell.
        cell: GridCell,
    },
    /// The cell is held by another entity.
    #[error("cell {cell} is occupied by {occupant}")]
    Occupied {
        /// Rejected cell.
        cell: GridCell,
        /// Entity currently holding the cell.
        occupant: EntityId,
    },
}

/// Errors raised while applying inbound events to the board.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The session metadata cannot produce a grid. Fatal for the session.
    #[error("invalid session configuration: {0}")]
    Config(#[from] ConfigError),
    /// The event cannot be applied cleanly; a full resync is required.
    #[error("sync conflict while applying {event}: {reason}")]
    Conflict {
        /// Name of the event that could not be applied.
        event: &'static str,
        /// Specific reason the event was rejected.
        reason: ConflictReason,
    },
}

impl SyncError {
    /// Reports whether the error can be recovered by requesting a full resync.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Detailed cause of a [`SyncError::Conflict`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConflictReason {
    /// An incremental event arrived before the grid was allocated.
    #[error("no map has been loaded")]
    NoSession,
    /// The event references an entity unknown to the board.
    #[error("entity {entity} is unknown")]
    UnknownEntity {
        /// Referenced entity.
        entity: EntityId,
    },
    /// The grid rejected the mutation requested by the event.
    #[error(transparent)]
    Grid(#[from] GridError),
    /// The service skipped one or more sequence numbers.
    #[error("expected sequence {expected}, received {received}")]
    SequenceGap {
        /// Next sequence number the client expected.
        expected: u64,
        /// Sequence number actually received.
        received: u64,
    },
}

/// Transport failures reported by a session channel.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The connection to the session service is closed.
    #[error("session channel is disconnected")]
    Disconnected,
    /// Reading from or writing to the transport failed.
    #[error("session channel i/o failed: {0}")]
    Io(String),
    /// An outbound intent could not be encoded.
    #[error("failed to encode outbound intent: {0}")]
    Encode(String),
}
