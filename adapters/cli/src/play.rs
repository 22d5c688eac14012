//! Interactive `play` subcommand wiring the board, sync client and viewport.

use anyhow::{Context, Result};
use glam::Vec2;
use tabletop_board::{query, Board};
use tabletop_core::{Change, ChannelError, CharacterDirectory, Envelope, Intent, MapMeta, Role};
use tabletop_rendering::{
    cell_bounds, token_sprites, Color, FrameInput, MapLayer, PointerTarget, Presentation,
    RenderingBackend, Scene, TokenPreview, ViewLimits, ViewportController,
};
use tabletop_rendering_macroquad::MacroquadBackend;
use tabletop_system_selection::{SelectionController, SelectionInput};
use tabletop_system_sync::{Channel, LocalAuthority, StreamChannel, SyncClient};
use tracing::{error, info, warn};

use crate::{config::ClientConfig, roster::CharacterRoster};

const STATUS_NOTICES: usize = 3;
const STATUS_CHAT: usize = 5;

/// Either a remote session service or the in-process authority.
#[derive(Debug)]
enum SessionLink {
    Remote(StreamChannel),
    Local(LocalAuthority),
}

impl Channel for SessionLink {
    fn send(&mut self, intent: Intent) -> Result<(), ChannelError> {
        match self {
            Self::Remote(channel) => channel.send(intent),
            Self::Local(authority) => authority.send(intent),
        }
    }

    fn try_recv(&mut self) -> Result<Option<Envelope>, ChannelError> {
        match self {
            Self::Remote(channel) => channel.try_recv(),
            Self::Local(authority) => authority.try_recv(),
        }
    }
}

/// Opens the board window and runs until it is closed.
pub(crate) fn run(config: ClientConfig) -> Result<()> {
    let limits = config.view.limits()?;
    let window_size = config.view.window_size();
    let session = &config.session;

    let link = match &session.connect {
        Some(address) => {
            info!(%address, code = %session.code, "connecting to session service");
            let channel = StreamChannel::connect(address.as_str())
                .with_context(|| format!("failed to connect to {address}"))?;
            SessionLink::Remote(channel)
        }
        None => {
            info!(code = %session.code, "starting local session");
            let mut authority = LocalAuthority::new(
                session.code.clone(),
                config.map.meta(),
                session.role,
                config.entities.clone(),
            )
            .context("failed to set up the local session")?
            .with_participant(session.participant.clone());
            if let Some(entity) = &session.self_entity {
                authority = authority.with_self_entity(entity.clone());
            }
            SessionLink::Local(authority)
        }
    };

    let client = SyncClient::new(link, session.code.clone());
    let roster = CharacterRoster::new(config.characters.iter().cloned());
    let mut play = PlaySession::start(client, roster, window_size, limits);

    let presentation = Presentation::new(
        format!("Tabletop: {}", session.code),
        Color::from_rgb_u8(24, 24, 28),
        window_size,
        Scene::empty(),
    );
    let backend = MacroquadBackend::new()
        .with_vsync(config.view.vsync)
        .with_asset_root(config.map.asset_root.clone());

    backend.run(presentation, move |input, scene| play.update(input, scene))
}

/// Per-frame glue between adapter input, the sync client and the scene.
#[derive(Debug)]
pub(crate) struct PlaySession<C, D> {
    board: Board,
    client: SyncClient<C>,
    selection: SelectionController,
    viewport: ViewportController,
    directory: D,
    layer: Option<MapLayer>,
    changes: Vec<Change>,
    intents: Vec<Intent>,
    fatal: Option<String>,
}

impl<C: Channel, D: CharacterDirectory> PlaySession<C, D> {
    /// Joins the campaign and prepares an empty board.
    pub(crate) fn start(
        mut client: SyncClient<C>,
        directory: D,
        viewport_size: Vec2,
        limits: ViewLimits,
    ) -> Self {
        client.join_session();
        Self {
            board: Board::new(),
            client,
            selection: SelectionController::new(),
            viewport: ViewportController::new(viewport_size, Vec2::ZERO, limits),
            directory,
            layer: None,
            changes: Vec::new(),
            intents: Vec::new(),
            fatal: None,
        }
    }

    /// Processes one frame of input and rebuilds the scene from board queries.
    pub(crate) fn update(&mut self, input: FrameInput, scene: &mut Scene) {
        self.changes.clear();
        if let Err(error) = self.client.pump(&mut self.board, &mut self.changes) {
            error!(%error, "session could not be set up");
            self.fatal = Some(error.to_string());
        }
        self.follow_session();

        if input.viewport_size.x > 0.0 && input.viewport_size.y > 0.0 {
            self.viewport.set_viewport_size(input.viewport_size);
        }
        let selection_input = self.pointer_input(&input, scene);
        self.viewport.pointer_move(input.pointer);
        if input.primary_released {
            self.viewport.pointer_up();
        }
        if input.toggle_grid {
            self.viewport.toggle_grid_overlay();
        }
        if input.reset_view {
            self.viewport.reset_view();
        }
        self.viewport.wheel(input.wheel_delta, input.pointer);

        let board = &self.board;
        self.selection.handle(
            &self.changes,
            selection_input,
            |cell| query::is_valid_cell(board, cell) && !query::is_occupied(board, cell),
            |entity| query::entity(board, entity).is_some(),
            &mut self.intents,
        );
        for intent in self.intents.drain(..) {
            self.client.submit(intent);
        }

        self.rebuild_scene(input.pointer, scene);
    }

    fn follow_session(&mut self) {
        let started = self
            .changes
            .iter()
            .any(|change| matches!(change, Change::SessionReady { .. }));
        if !started {
            return;
        }
        let Some(map) = query::map(&self.board) else {
            return;
        };

        let layer = map_layer(map);
        self.viewport.set_map_size(layer.section_size);
        self.layer = Some(layer);
    }

    fn pointer_input(&mut self, input: &FrameInput, scene: &Scene) -> Option<SelectionInput> {
        if input.cancel {
            return Some(SelectionInput::Background);
        }
        if !input.primary_pressed {
            return None;
        }

        if let Some(token) = scene.token_at(input.pointer) {
            self.viewport.pointer_down(input.pointer, PointerTarget::Token);
            return Some(SelectionInput::Pick(token.entity.clone()));
        }

        self.viewport.pointer_down(input.pointer, PointerTarget::Background);
        let layer = self.layer.as_ref()?;
        if self.viewport.is_over_map(input.pointer) {
            let cell = self.viewport.resolve_cell(input.pointer, layer.tile_size);
            Some(SelectionInput::Canvas(cell))
        } else {
            Some(SelectionInput::Background)
        }
    }

    fn rebuild_scene(&self, pointer: Vec2, scene: &mut Scene) {
        scene.status = self.status_lines();

        let Some(layer) = &self.layer else {
            scene.frame = None;
            scene.tokens.clear();
            scene.hovered_cell = None;
            scene.preview = None;
            return;
        };

        scene.frame = match self.viewport.render(layer) {
            Ok(frame) => Some(frame),
            Err(error) => {
                warn!(%error, "map section cannot be drawn");
                None
            }
        };

        let view = self.viewport.view();
        scene.tokens = token_sprites(
            query::entities(&self.board),
            layer.tile_size,
            view,
            self.selection.armed(),
        );
        scene.preview = scene
            .token_at(pointer)
            .and_then(|token| query::entity(&self.board, &token.entity))
            .map(|entity| TokenPreview::describe(entity, &self.directory));

        let cell = self.viewport.resolve_cell(pointer, layer.tile_size);
        scene.hovered_cell = (self.viewport.is_over_map(pointer)
            && query::is_valid_cell(&self.board, cell))
        .then(|| cell_bounds(cell, layer.tile_size, view));
    }

    fn status_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(detail) = &self.fatal {
            lines.push(format!("session failed: {detail}"));
        }

        let role = match query::role(&self.board) {
            Some(Role::GameMaster) => "game master",
            Some(Role::Player) => "player",
            None => "joining",
        };
        lines.push(format!("{} ({role})", self.client.code()));
        if self.client.is_disconnected() {
            lines.push("disconnected from session".to_owned());
        } else if self.client.awaiting_full_list() {
            lines.push("waiting for entity list".to_owned());
        }

        let chat: Vec<_> = query::chat_log(&self.board)
            .map(|line| format!("{}: {}", line.sender, line.text))
            .collect();
        lines.extend(chat.into_iter().rev().take(STATUS_CHAT).rev());

        let notices: Vec<_> = query::notices(&self.board)
            .map(|notice| format!("! {}", notice.detail))
            .collect();
        lines.extend(notices.into_iter().rev().take(STATUS_NOTICES).rev());
        lines
    }
}

fn map_layer(map: &MapMeta) -> MapLayer {
    MapLayer {
        image: map.map_image_url.clone(),
        section_offset: Vec2::new(map.section_offset_x as f32, map.section_offset_y as f32),
        section_size: Vec2::new(map.width_px as f32, map.height_px as f32),
        tile_size: map.tile_size_px as f32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabletop_core::{Entity, EntityId, EntityKind, Footprint, GridCell, HitPoints};

    const VIEWPORT: Vec2 = Vec2::new(800.0, 600.0);
    // A 256x192 section is centred in the 800x600 viewport at unit scale.
    const MAP_ORIGIN: Vec2 = Vec2::new(272.0, 204.0);

    fn map() -> MapMeta {
        MapMeta {
            width_px: 256,
            height_px: 192,
            tile_size_px: 32,
            section_offset_x: 0,
            section_offset_y: 0,
            map_image_url: "maps/barrow.png".to_owned(),
        }
    }

    fn token(id: &str, column: i32) -> Entity {
        Entity {
            id: EntityId::new(id),
            kind: EntityKind::Enemy,
            display_name: id.to_owned(),
            hit_points: HitPoints::new(7, 7),
            armor_class: 12,
            footprint: Footprint::SINGLE,
            position: GridCell::new(column, 0),
            asset_ref: String::new(),
        }
    }

    fn session(role: Role) -> PlaySession<LocalAuthority, CharacterRoster> {
        let authority =
            LocalAuthority::new("barrow", map(), role, vec![token("ghoul", 0), token("wight", 1)])
                .expect("valid map");
        PlaySession::start(
            SyncClient::new(authority, "barrow"),
            CharacterRoster::default(),
            VIEWPORT,
            ViewLimits::default(),
        )
    }

    fn idle(pointer: Vec2) -> FrameInput {
        FrameInput {
            pointer,
            viewport_size: VIEWPORT,
            ..FrameInput::default()
        }
    }

    fn click(pointer: Vec2) -> FrameInput {
        FrameInput {
            primary_pressed: true,
            primary_released: true,
            ..idle(pointer)
        }
    }

    fn cell_centre(column: i32, row: i32) -> Vec2 {
        MAP_ORIGIN + Vec2::new(column as f32 * 32.0 + 16.0, row as f32 * 32.0 + 16.0)
    }

    #[test]
    fn first_frame_shows_the_centred_board() {
        let mut play = session(Role::GameMaster);
        let mut scene = Scene::empty();

        play.update(idle(cell_centre(1, 0)), &mut scene);

        let frame = scene.frame.as_ref().expect("map frame");
        assert_eq!(frame.map.destination.origin, MAP_ORIGIN);
        assert_eq!(scene.tokens.len(), 2);
        assert_eq!(
            scene.preview.as_ref().map(|preview| preview.name.as_str()),
            Some("wight")
        );
        assert_eq!(scene.status[0], "barrow (game master)");
    }

    #[test]
    fn game_master_moves_a_token_with_two_clicks() {
        let mut play = session(Role::GameMaster);
        let mut scene = Scene::empty();
        play.update(idle(Vec2::ZERO), &mut scene);

        play.update(click(cell_centre(0, 0)), &mut scene);
        assert!(scene.tokens[0].selected);

        play.update(click(cell_centre(3, 2)), &mut scene);
        play.update(idle(Vec2::ZERO), &mut scene);

        let ghoul = query::entity(&play.board, &EntityId::new("ghoul")).expect("ghoul");
        assert_eq!(ghoul.position, GridCell::new(3, 2));
        assert!(scene.tokens.iter().all(|token| !token.selected));
        assert_eq!(play.viewport.view().pan, MAP_ORIGIN);
    }

    #[test]
    fn clicking_another_token_rearms_the_selection() {
        let mut play = session(Role::GameMaster);
        let mut scene = Scene::empty();
        play.update(idle(Vec2::ZERO), &mut scene);

        play.update(click(cell_centre(0, 0)), &mut scene);
        play.update(click(cell_centre(1, 0)), &mut scene);

        assert_eq!(
            play.selection.armed(),
            Some(&EntityId::new("wight")),
            "clicking another token re-arms the selection"
        );
        let wight = query::entity(&play.board, &EntityId::new("wight")).expect("wight");
        assert_eq!(wight.position, GridCell::new(1, 0));
    }

    #[test]
    fn player_clicks_never_move_tokens() {
        let mut play = session(Role::Player);
        let mut scene = Scene::empty();
        play.update(idle(Vec2::ZERO), &mut scene);

        play.update(click(cell_centre(0, 0)), &mut scene);
        play.update(click(cell_centre(4, 4)), &mut scene);
        play.update(idle(Vec2::ZERO), &mut scene);

        let ghoul = query::entity(&play.board, &EntityId::new("ghoul")).expect("ghoul");
        assert_eq!(ghoul.position, GridCell::new(0, 0));
        assert!(play.selection.armed().is_none());
    }

    #[test]
    fn grid_toggle_and_reset_follow_keyboard_input() {
        let mut play = session(Role::GameMaster);
        let mut scene = Scene::empty();
        play.update(idle(Vec2::ZERO), &mut scene);
        let lines = scene.frame.as_ref().expect("frame").grid_lines.len();
        assert_eq!(lines, 9 + 7);

        play.update(
            FrameInput {
                toggle_grid: true,
                wheel_delta: -1.0,
                ..idle(Vec2::ZERO)
            },
            &mut scene,
        );
        assert!(scene.frame.as_ref().expect("frame").grid_lines.is_empty());
        assert!(play.viewport.view().scale > 1.0);

        play.update(
            FrameInput {
                reset_view: true,
                ..idle(Vec2::ZERO)
            },
            &mut scene,
        );
        assert_eq!(play.viewport.view().scale, 1.0);
        assert_eq!(play.viewport.view().pan, MAP_ORIGIN);
    }
}
