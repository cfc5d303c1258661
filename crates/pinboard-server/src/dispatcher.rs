//! BoardServer — turns inbound action frames into storage writes and
//! roommate broadcasts.

use std::sync::Arc;

use pinboard_protocol::sanitize::{markup, plain};
use pinboard_protocol::{
    Action, AddSticker, BoardSize, Card, CardRef, CreateCard, CreateRow, EditCard, Event,
    MarkerPos, MoveCard, NameChange, ParticipantRef, Presence, Row, RowRef, Theme,
    UpdateRowPosition, UpdateRowText, COLUMN_LIMIT,
};
use pinboard_storage::{BoardStore, StoreResult};
use pinboard_transport::ConnectionHandler;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::registry::RoomRegistry;

/// The board server: validates, sanitizes, persists and rebroadcasts
/// every action for every room.
///
/// Writes are fire-and-forget: the broadcast to roommates goes out
/// synchronously with arrival while the storage write runs detached on
/// a blocking thread. Two writes to one field may complete out of
/// order (last completed wins), and a failed write is logged but its
/// broadcast is never retracted, so roommate views can drift from the
/// store until the next initialize.
pub struct BoardServer {
    registry: RoomRegistry,
    store: Arc<dyn BoardStore>,
}

impl BoardServer {
    pub fn new(store: Arc<dyn BoardStore>) -> Self {
        Self { registry: RoomRegistry::new(), store }
    }

    /// The registry backing this server.
    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    /// Runs one storage write on a blocking thread, detached from the
    /// dispatch path. Failures are logged and never retracted.
    fn persist<F>(&self, action: &'static str, room: &str, op: F)
    where
        F: FnOnce(&dyn BoardStore, &str) -> StoreResult<()> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let room = room.to_owned();
        tokio::spawn(async move {
            match tokio::task::spawn_blocking(move || op(store.as_ref(), &room)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!("Storage write for {action} failed: {err}"),
                Err(err) => warn!("Storage task for {action} panicked: {err}"),
            }
        });
    }

    /// Room entry: registry join, accept to the joiner, announce to the
    /// new roommates.
    fn handle_join(&self, participant: &str, room: &str) {
        self.registry.join(participant, room);
        self.registry.send_to(participant, &Event::RoomAccept.encode());

        let announce = Event::JoinAnnounce(Presence {
            participant_id: participant.to_owned(),
            name: self.registry.name(participant),
        });
        self.registry.broadcast(participant, &announce.encode());
    }

    /// Pushes the full board view to one participant as a sequence of
    /// independent frames. Reads run in one blocking pass; the receiver
    /// treats every frame as idempotent, so relative order between them
    /// does not matter.
    async fn handle_initialize(&self, participant: &str, room: &str) {
        let store = Arc::clone(&self.store);
        let room_key = room.to_owned();
        let view = tokio::task::spawn_blocking(move || -> StoreResult<BoardView> {
            Ok(BoardView {
                cards: store.cards(&room_key)?,
                columns: store.columns(&room_key)?,
                rows: store.rows(&room_key)?,
                theme: store.theme(&room_key)?,
                size: store.board_size(&room_key)?,
                eraser: store.eraser(&room_key)?,
                marker: store.marker(&room_key)?,
            })
        })
        .await;

        let view = match view {
            Ok(Ok(view)) => view,
            Ok(Err(err)) => {
                warn!("Failed to load board {room}: {err}");
                return;
            }
            Err(err) => {
                warn!("Board load for {room} panicked: {err}");
                return;
            }
        };

        self.registry.send_to(participant, &Event::InitCards(view.cards).encode());
        self.registry.send_to(participant, &Event::InitColumns(view.columns).encode());
        self.registry.send_to(participant, &Event::InitRows(view.rows).encode());
        self.registry.send_to(
            participant,
            &Event::MoveEraser(view.eraser.unwrap_or_else(MarkerPos::default_eraser)).encode(),
        );
        self.registry.send_to(
            participant,
            &Event::MoveMarker(view.marker.unwrap_or_else(MarkerPos::default_marker)).encode(),
        );
        self.registry
            .send_to(participant, &Event::SetTheme(view.theme.unwrap_or_default()).encode());
        if let Some(size) = view.size {
            self.registry.send_to(participant, &Event::SetBoardSize(size).encode());
        }
        self.registry.send_to(
            participant,
            &Event::InitRoommates(self.registry.roommates(participant)).encode(),
        );
    }

    /// Appends a column after confirming the room is under the limit.
    /// An over-limit create is dropped whole, echo included, the same
    /// as a malformed action. The count read and the write are
    /// separate storage calls, so two creates racing at the limit can
    /// both pass the check; storage still refuses the ninth column and
    /// only the stray echo escapes in that race.
    async fn handle_create_column(&self, participant: &str, room: &str, name: String) {
        let store = Arc::clone(&self.store);
        let room_key = room.to_owned();
        let count = tokio::task::spawn_blocking(move || {
            store.columns(&room_key).map(|columns| columns.len())
        })
        .await;

        let count = match count {
            Ok(Ok(count)) => count,
            Ok(Err(err)) => {
                warn!("Column count read for {room} failed, dropping create: {err}");
                return;
            }
            Err(err) => {
                warn!("Column count read for {room} panicked: {err}");
                return;
            }
        };

        if count >= COLUMN_LIMIT {
            debug!("Dropping create-column from {participant}: room {room} is at the limit");
            return;
        }

        let name = plain(&name);
        self.registry
            .broadcast(participant, &Event::CreateColumn(name.clone()).encode());
        self.persist("create-column", room, move |store, room| {
            store.create_column(room, &name)
        });
    }

    /// Sanitizes one board action, echoes the canonical payload to
    /// roommates and kicks off the matching storage write.
    fn apply(&self, participant: &str, room: &str, action: Action) {
        let tag = action.name();
        match action {
            // Handled in on_message before we get here.
            Action::Join(_) | Action::Initialize | Action::CreateColumn(_) => {}

            Action::SetDisplayName(name) => {
                let name = plain(&name);
                self.registry.set_name(participant, &name);
                let event = Event::NameAnnounce(NameChange {
                    participant_id: participant.to_owned(),
                    name,
                });
                self.registry.broadcast(participant, &event.encode());
            }

            Action::CreateCard(payload) => {
                let card = Card {
                    id: plain(&payload.id),
                    text: markup(&payload.text),
                    colour: payload.colour,
                    x: payload.x,
                    y: payload.y,
                    rot: payload.rot,
                    kind: payload.kind,
                    sticker: None,
                };
                let echo = CreateCard {
                    id: card.id.clone(),
                    text: card.text.clone(),
                    x: card.x,
                    y: card.y,
                    rot: card.rot,
                    colour: card.colour,
                    kind: card.kind,
                };
                self.registry.broadcast(participant, &Event::CreateCard(echo).encode());
                self.persist(tag, room, move |store, room| {
                    store.create_card(room, &card.id, &card)
                });
            }

            Action::EditCard(payload) => {
                let echo = EditCard {
                    id: plain(&payload.id),
                    text: payload.text.as_deref().map(markup),
                    colour: payload.colour,
                };
                self.registry
                    .broadcast(participant, &Event::EditCard(echo.clone()).encode());
                self.persist(tag, room, move |store, room| {
                    store.edit_card(room, &echo.id, echo.text.as_deref(), echo.colour)
                });
            }

            Action::MoveCard(payload) => {
                let echo = MoveCard { id: plain(&payload.id), position: payload.position };
                self.registry
                    .broadcast(participant, &Event::MoveCard(echo.clone()).encode());
                self.persist(tag, room, move |store, room| {
                    store.set_card_position(room, &echo.id, echo.position.left, echo.position.top)
                });
            }

            Action::DeleteCard(payload) => {
                let echo = CardRef { id: plain(&payload.id) };
                self.registry
                    .broadcast(participant, &Event::DeleteCard(echo.clone()).encode());
                self.persist(tag, room, move |store, room| store.delete_card(room, &echo.id));
            }

            // Broadcast-only; nothing reaches storage.
            Action::HighlightCard(payload) => {
                let echo = CardRef { id: plain(&payload.id) };
                self.registry.broadcast(participant, &Event::HighlightCard(echo).encode());
            }

            Action::AddSticker(payload) => {
                let echo = AddSticker {
                    card_id: plain(&payload.card_id),
                    sticker_id: plain(&payload.sticker_id),
                };
                self.registry
                    .broadcast(participant, &Event::AddSticker(echo.clone()).encode());
                self.persist(tag, room, move |store, room| {
                    store.toggle_sticker(room, &echo.card_id, &echo.sticker_id)
                });
            }

            Action::DeleteColumn => {
                self.registry.broadcast(participant, &Event::DeleteColumn.encode());
                self.persist(tag, room, |store, room| store.pop_column(room));
            }

            Action::ReplaceColumns(list) => {
                let columns: Vec<String> =
                    list.iter().take(COLUMN_LIMIT).map(|name| plain(name)).collect();
                self.registry
                    .broadcast(participant, &Event::ReplaceColumns(columns.clone()).encode());
                self.persist(tag, room, move |store, room| {
                    store.replace_columns(room, &columns)
                });
            }

            Action::CreateRow(payload) => {
                let row = Row { id: plain(&payload.id), text: plain(&payload.text), y: payload.y };
                let echo = CreateRow { id: row.id.clone(), text: row.text.clone(), y: row.y };
                self.registry.broadcast(participant, &Event::CreateRow(echo).encode());
                self.persist(tag, room, move |store, room| store.create_row(room, &row.id, &row));
            }

            Action::UpdateRowText(payload) => {
                let echo = UpdateRowText { id: plain(&payload.id), text: plain(&payload.text) };
                self.registry
                    .broadcast(participant, &Event::UpdateRowText(echo.clone()).encode());
                self.persist(tag, room, move |store, room| {
                    store.update_row_text(room, &echo.id, &echo.text)
                });
            }

            Action::UpdateRowPosition(payload) => {
                let echo = UpdateRowPosition { id: plain(&payload.id), y: payload.y };
                self.registry
                    .broadcast(participant, &Event::UpdateRowPosition(echo.clone()).encode());
                self.persist(tag, room, move |store, room| {
                    store.update_row_position(room, &echo.id, echo.y)
                });
            }

            Action::DeleteRow(payload) => {
                let echo = RowRef { id: plain(&payload.id) };
                self.registry
                    .broadcast(participant, &Event::DeleteRow(echo.clone()).encode());
                self.persist(tag, room, move |store, room| store.delete_row(room, &echo.id));
            }

            Action::SetTheme(theme) => {
                self.registry.broadcast(participant, &Event::SetTheme(theme).encode());
                self.persist(tag, room, move |store, room| store.set_theme(room, theme));
            }

            Action::SetBoardSize(size) => {
                self.registry
                    .broadcast(participant, &Event::SetBoardSize(size).encode());
                self.persist(tag, room, move |store, room| store.set_board_size(room, size));
            }

            Action::MoveEraser(pos) => {
                let echo = MarkerPos { id: plain(&pos.id), x: pos.x };
                self.registry
                    .broadcast(participant, &Event::MoveEraser(echo.clone()).encode());
                self.persist(tag, room, move |store, room| store.set_eraser(room, echo.x));
            }

            Action::MoveMarker(pos) => {
                let echo = MarkerPos { id: plain(&pos.id), x: pos.x };
                self.registry
                    .broadcast(participant, &Event::MoveMarker(echo.clone()).encode());
                self.persist(tag, room, move |store, room| store.set_marker(room, echo.x));
            }
        }
    }
}

/// Snapshot assembled for one initialize reply.
struct BoardView {
    cards: Vec<Card>,
    columns: Vec<String>,
    rows: Vec<Row>,
    theme: Option<Theme>,
    size: Option<BoardSize>,
    eraser: Option<MarkerPos>,
    marker: Option<MarkerPos>,
}

impl ConnectionHandler for BoardServer {
    fn on_connect(&self, client_id: &str, tx: mpsc::Sender<String>) {
        self.registry.register(client_id, tx);
    }

    async fn on_message(&self, client_id: &str, text: &str) {
        let action = match Action::parse(text) {
            Ok(action) => action,
            Err(err) => {
                debug!("Dropping malformed frame from {client_id}: {err}");
                return;
            }
        };

        if let Action::Join(room) = &action {
            self.handle_join(client_id, room);
            return;
        }

        // Everything else requires a joined room.
        let Some(room) = self.registry.current_room(client_id) else {
            debug!("Dropping {} from {client_id}: no room joined", action.name());
            return;
        };

        match action {
            Action::Initialize => self.handle_initialize(client_id, &room).await,
            // The one mutation checked against current state before it
            // is echoed: an over-limit column create must not be
            // broadcast.
            Action::CreateColumn(name) => {
                self.handle_create_column(client_id, &room, name).await;
            }
            action => self.apply(client_id, &room, action),
        }
    }

    fn on_disconnect(&self, client_id: &str) {
        if let Some(room) = self.registry.leave(client_id) {
            let event = Event::LeaveAnnounce(ParticipantRef {
                participant_id: client_id.to_owned(),
            });
            self.registry.broadcast_room(&room, client_id, &event.encode());
        }
    }
}
