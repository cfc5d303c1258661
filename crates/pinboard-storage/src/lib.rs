//! Board state persistence for the pinboard server.
//!
//! Two interchangeable backends implement the [`BoardStore`] trait:
//!
//! - [`DocumentStore`] keeps each room's board as a single JSON document
//!   in SQLite. Every mutation rewrites the document, so individual
//!   operations are atomic per room.
//! - [`KeyedStore`] keeps each card, row and column as its own entry in
//!   a redb database under a configurable key prefix. Entity mutations
//!   touch only the affected entry; replacing the column list is a
//!   clear followed by an append and is not atomic.
//!
//! Both backends share the same observable semantics: mutations of
//! absent entities are no-ops, deleted entities are never resurrected,
//! and the column list never exceeds [`COLUMN_LIMIT`] entries.
//!
//! The trait is synchronous. Callers on an async runtime are expected
//! to wrap calls in `spawn_blocking`.

pub mod document;
pub mod keyed;

use pinboard_protocol::{BoardSize, Card, Colour, MarkerPos, Row, Theme};
use thiserror::Error;

pub use document::DocumentStore;
pub use keyed::KeyedStore;
pub use pinboard_protocol::COLUMN_LIMIT;

/// Errors surfaced by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database failure.
    #[error("storage I/O error: {0}")]
    Io(String),

    /// A stored value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence operations over one room's board state.
///
/// All mutations follow last-write-wins: there is no versioning and no
/// conflict detection. Mutations that target an id that does not exist
/// return `Ok(())` without writing anything.
pub trait BoardStore: Send + Sync {
    /// Drops everything stored for the room.
    fn clear(&self, room: &str) -> StoreResult<()>;

    /// Returns the stored theme, or `None` if the room never set one.
    fn theme(&self, room: &str) -> StoreResult<Option<Theme>>;

    fn set_theme(&self, room: &str, theme: Theme) -> StoreResult<()>;

    /// Returns the column list in creation order.
    fn columns(&self, room: &str) -> StoreResult<Vec<String>>;

    /// Appends a column. A room already holding [`COLUMN_LIMIT`]
    /// columns drops the request.
    fn create_column(&self, room: &str, name: &str) -> StoreResult<()>;

    /// Removes the most recently created column, if any.
    fn pop_column(&self, room: &str) -> StoreResult<()>;

    /// Replaces the whole column list, truncated to [`COLUMN_LIMIT`].
    fn replace_columns(&self, room: &str, columns: &[String]) -> StoreResult<()>;

    /// Returns every card in the room, in unspecified order.
    fn cards(&self, room: &str) -> StoreResult<Vec<Card>>;

    /// Stores a card under its id, overwriting any previous card with
    /// the same id.
    fn create_card(&self, room: &str, id: &str, card: &Card) -> StoreResult<()>;

    /// Updates the text and/or colour of an existing card.
    fn edit_card(
        &self,
        room: &str,
        id: &str,
        text: Option<&str>,
        colour: Option<Colour>,
    ) -> StoreResult<()>;

    /// Updates an existing card's position.
    fn set_card_position(&self, room: &str, id: &str, x: f64, y: f64) -> StoreResult<()>;

    fn delete_card(&self, room: &str, id: &str) -> StoreResult<()>;

    /// Adds a sticker to an existing card's sticker set. The reserved
    /// id [`pinboard_protocol::NO_STICKER`] clears the set instead.
    fn toggle_sticker(&self, room: &str, id: &str, sticker: &str) -> StoreResult<()>;

    /// Returns every row in the room, in unspecified order.
    fn rows(&self, room: &str) -> StoreResult<Vec<Row>>;

    /// Stores a row under its id, overwriting any previous row with
    /// the same id.
    fn create_row(&self, room: &str, id: &str, row: &Row) -> StoreResult<()>;

    /// Updates an existing row's label.
    fn update_row_text(&self, room: &str, id: &str, text: &str) -> StoreResult<()>;

    /// Updates an existing row's vertical position.
    fn update_row_position(&self, room: &str, id: &str, y: f64) -> StoreResult<()>;

    fn delete_row(&self, room: &str, id: &str) -> StoreResult<()>;

    /// Returns the stored board size, or `None` if the room never
    /// resized.
    fn board_size(&self, room: &str) -> StoreResult<Option<BoardSize>>;

    fn set_board_size(&self, room: &str, size: BoardSize) -> StoreResult<()>;

    /// Returns the stored eraser position, or `None` if it was never
    /// moved.
    fn eraser(&self, room: &str) -> StoreResult<Option<MarkerPos>>;

    fn set_eraser(&self, room: &str, x: f64) -> StoreResult<()>;

    /// Returns the stored marker position, or `None` if it was never
    /// moved.
    fn marker(&self, room: &str) -> StoreResult<Option<MarkerPos>>;

    fn set_marker(&self, room: &str, x: f64) -> StoreResult<()>;
}
