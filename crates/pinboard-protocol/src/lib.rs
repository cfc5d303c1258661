//! Pinboard wire protocol.
//!
//! Every frame on the wire is a JSON object `{action, data}` over a
//! persistent WebSocket connection. This crate is the single source of truth
//! for the inbound action catalog, the outbound event catalog, the board
//! model, and the text sanitizers applied to user-supplied fields.

pub mod error;
pub mod event;
pub mod message;
pub mod model;
pub mod sanitize;

pub use error::ProtocolError;
pub use event::{Event, NameChange, ParticipantRef, Presence};
pub use message::{
    Action, AddSticker, CardRef, CreateCard, CreateRow, EditCard, MoveCard,
    Position, RowRef, UpdateRowPosition, UpdateRowText,
};
pub use model::{
    BoardSize, Card, CardKind, Colour, MarkerPos, Row, Theme,
    COLUMN_LIMIT, NO_STICKER,
};
