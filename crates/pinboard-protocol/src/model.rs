//! Board model — the persisted state of one room.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Maximum number of columns a board may hold.
pub const COLUMN_LIMIT: usize = 8;

/// Sticker id sentinel that clears a card's sticker set instead of adding.
pub const NO_STICKER: &str = "no-sticker";

/// Card size theme for a room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Bigcards,
    Mediumcards,
    Smallcards,
}

/// The fixed card colour palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colour {
    White,
    Yellow,
    Blue,
    Green,
    Orange,
    Purple,
    Red,
}

/// Rendering variant for a card face.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardKind {
    #[default]
    Plain,
    Annotated,
}

/// A sticky note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub text: String,
    pub colour: Colour,
    pub x: f64,
    pub y: f64,
    /// Rotation in degrees, purely cosmetic.
    pub rot: f64,
    #[serde(rename = "type")]
    pub kind: CardKind,
    /// `None` means no stickers. The set never holds duplicates.
    pub sticker: Option<BTreeSet<String>>,
}

impl Card {
    /// Applies a partial edit. `None` fields stay untouched.
    pub fn apply_edit(&mut self, text: Option<&str>, colour: Option<Colour>) {
        if let Some(text) = text {
            self.text = text.to_owned();
        }
        if let Some(colour) = colour {
            self.colour = colour;
        }
    }

    /// Adds a sticker id to the set. The reserved id [`NO_STICKER`]
    /// clears the whole set instead.
    pub fn apply_sticker(&mut self, sticker: &str) {
        if sticker == NO_STICKER {
            self.sticker = None;
        } else {
            self.sticker
                .get_or_insert_with(BTreeSet::new)
                .insert(sticker.to_owned());
        }
    }
}

/// A horizontal swim-lane row across the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: String,
    pub text: String,
    pub y: f64,
}

/// Board canvas size. Absent until a client sets it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoardSize {
    pub width: f64,
    pub height: f64,
}

/// A draggable pointer marker (the eraser or the marker pen). Only the
/// x-position is tracked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerPos {
    pub id: String,
    pub x: f64,
}

impl MarkerPos {
    pub fn eraser_at(x: f64) -> Self {
        Self { id: "eraser".into(), x }
    }

    pub fn marker_at(x: f64) -> Self {
        Self { id: "marker".into(), x }
    }

    /// Position reported for the eraser before anyone has moved it.
    pub fn default_eraser() -> Self {
        Self::eraser_at(70.0)
    }

    /// Position reported for the marker before anyone has moved it.
    pub fn default_marker() -> Self {
        Self::marker_at(200.0)
    }
}
