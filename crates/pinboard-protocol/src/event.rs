//! Outbound event catalog.
//!
//! Events share the `{action, data}` envelope. Board mutations are echoed to
//! roommates under the same tag the originator sent (with the sanitized
//! payload); the rest cover join acceptance, presence announcements, and the
//! `initialize` view sequence. The initialize messages are independent and
//! carry no ordering guarantee — receivers treat each one as idempotent.

use serde::{Deserialize, Serialize};

use crate::message::{
    AddSticker, CardRef, CreateCard, CreateRow, EditCard, MoveCard, RowRef,
    UpdateRowPosition, UpdateRowText,
};
use crate::model::{BoardSize, Card, MarkerPos, Row, Theme};

/// One outbound event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "kebab-case")]
pub enum Event {
    /// Reply to the joiner after its `join` was applied.
    RoomAccept,
    /// A participant entered the room.
    JoinAnnounce(Presence),
    /// A participant disconnected.
    LeaveAnnounce(ParticipantRef),
    /// A roommate picked a new display name.
    NameAnnounce(NameChange),

    // Initialize view sequence
    InitCards(Vec<Card>),
    InitColumns(Vec<String>),
    InitRows(Vec<Row>),
    /// Other current members of the room and any known display names.
    InitRoommates(Vec<Presence>),

    // Mutation echoes
    CreateCard(CreateCard),
    EditCard(EditCard),
    MoveCard(MoveCard),
    DeleteCard(CardRef),
    HighlightCard(CardRef),
    AddSticker(AddSticker),
    CreateColumn(String),
    DeleteColumn,
    ReplaceColumns(Vec<String>),
    CreateRow(CreateRow),
    UpdateRowText(UpdateRowText),
    UpdateRowPosition(UpdateRowPosition),
    DeleteRow(RowRef),
    SetTheme(Theme),
    SetBoardSize(BoardSize),
    MoveEraser(MarkerPos),
    MoveMarker(MarkerPos),
}

impl Event {
    /// Encode for the wire.
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap()
    }
}

/// A participant and its display name, if one was ever set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presence {
    pub participant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A participant reference without presence data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRef {
    pub participant_id: String,
}

/// A display-name change announcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameChange {
    pub participant_id: String,
    pub name: String,
}
