//! Inbound action catalog.
//!
//! Each wire frame `{action, data}` deserializes into one [`Action`] variant.
//! Unknown action tags and payloads that miss required fields fail to parse
//! and are dropped by the dispatcher — no error is ever sent back.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::model::{BoardSize, CardKind, Colour, MarkerPos, Theme};

/// One inbound action. The `action` field selects the variant, `data` is the
/// variant payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "kebab-case")]
pub enum Action {
    /// Enter a room, leaving any previously occupied one.
    Join(String),
    /// Request the full board view after a join was accepted.
    Initialize,
    CreateCard(CreateCard),
    EditCard(EditCard),
    MoveCard(MoveCard),
    DeleteCard(CardRef),
    /// Flash a card on roommates' screens; never persisted.
    HighlightCard(CardRef),
    AddSticker(AddSticker),
    CreateColumn(String),
    /// Remove the last column. Carries no payload.
    DeleteColumn,
    /// Whole-list column replacement; the payload must be a sequence.
    ReplaceColumns(Vec<String>),
    CreateRow(CreateRow),
    UpdateRowText(UpdateRowText),
    UpdateRowPosition(UpdateRowPosition),
    DeleteRow(RowRef),
    SetTheme(Theme),
    SetBoardSize(BoardSize),
    MoveEraser(MarkerPos),
    MoveMarker(MarkerPos),
    /// Ephemeral display name, announced but never persisted.
    SetDisplayName(String),
}

impl Action {
    /// Parse one inbound text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    /// The wire tag for this action, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join(_) => "join",
            Self::Initialize => "initialize",
            Self::CreateCard(_) => "create-card",
            Self::EditCard(_) => "edit-card",
            Self::MoveCard(_) => "move-card",
            Self::DeleteCard(_) => "delete-card",
            Self::HighlightCard(_) => "highlight-card",
            Self::AddSticker(_) => "add-sticker",
            Self::CreateColumn(_) => "create-column",
            Self::DeleteColumn => "delete-column",
            Self::ReplaceColumns(_) => "replace-columns",
            Self::CreateRow(_) => "create-row",
            Self::UpdateRowText(_) => "update-row-text",
            Self::UpdateRowPosition(_) => "update-row-position",
            Self::DeleteRow(_) => "delete-row",
            Self::SetTheme(_) => "set-theme",
            Self::SetBoardSize(_) => "set-board-size",
            Self::MoveEraser(_) => "move-eraser",
            Self::MoveMarker(_) => "move-marker",
            Self::SetDisplayName(_) => "set-display-name",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payloads
// ─────────────────────────────────────────────────────────────────────────────

/// Payload for `create-card`. A fresh card starts with no stickers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCard {
    pub id: String,
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub rot: f64,
    pub colour: Colour,
    #[serde(rename = "type")]
    pub kind: CardKind,
}

/// Payload for `edit-card`. Both fields optional; absent fields are left
/// untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditCard {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colour: Option<Colour>,
}

/// Payload for `move-card`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveCard {
    pub id: String,
    pub position: Position,
}

/// Drag position as the client reports it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub left: f64,
    pub top: f64,
}

/// Payload naming a card (`delete-card`, `highlight-card`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardRef {
    pub id: String,
}

/// Payload naming a row (`delete-row`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowRef {
    pub id: String,
}

/// Payload for `add-sticker`. A `stickerId` of [`crate::NO_STICKER`] clears
/// the card's sticker set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSticker {
    pub card_id: String,
    pub sticker_id: String,
}

/// Payload for `create-row`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRow {
    pub id: String,
    pub text: String,
    pub y: f64,
}

/// Payload for `update-row-text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRowText {
    pub id: String,
    pub text: String,
}

/// Payload for `update-row-position`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRowPosition {
    pub id: String,
    pub y: f64,
}
