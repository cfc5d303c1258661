//! Document backend: one JSON board document per room, stored in SQLite.

use std::collections::BTreeMap;
use std::path::Path;

use parking_lot::Mutex;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::debug;

use pinboard_protocol::{BoardSize, Card, Colour, MarkerPos, Row, Theme, COLUMN_LIMIT};

use crate::{BoardStore, StoreResult};

// ─────────────────────────────────────────────────────────────────────────────
// Board document
// ─────────────────────────────────────────────────────────────────────────────

/// The whole board state of one room, serialized as a single JSON value.
///
/// Cards and rows are keyed by id so that mutations address them
/// directly. Absent optional fields mean the room never touched them;
/// readers substitute defaults.
#[derive(Debug, Default, Serialize, Deserialize)]
struct BoardDoc {
    #[serde(default)]
    theme: Option<Theme>,
    #[serde(default)]
    size: Option<BoardSize>,
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    cards: BTreeMap<String, Card>,
    #[serde(default)]
    rows: BTreeMap<String, Row>,
    #[serde(default)]
    eraser: Option<f64>,
    #[serde(default)]
    marker: Option<f64>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite-backed [`BoardStore`] holding one document per room.
///
/// Every mutation loads the room's document, applies the change and
/// writes the document back while holding the connection lock, so each
/// operation is atomic per room. rusqlite is synchronous; callers on
/// an async runtime run these methods on `spawn_blocking`.
pub struct DocumentStore {
    conn: Mutex<Connection>,
}

impl DocumentStore {
    /// Opens (or creates) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| crate::StoreError::Io(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// Opens an in-memory database. State is lost on drop; used in
    /// tests and for throwaway deployments.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> StoreResult<()> {
        self.conn.lock().execute_batch(
            "CREATE TABLE IF NOT EXISTS boards (
                room   TEXT PRIMARY KEY,
                state  TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Loads the room's document, applies `f` and writes it back.
    fn update<F>(&self, room: &str, f: F) -> StoreResult<()>
    where
        F: FnOnce(&mut BoardDoc),
    {
        let conn = self.conn.lock();
        let mut doc = load_doc(&conn, room)?;
        f(&mut doc);
        save_doc(&conn, room, &doc)
    }

    /// Loads the room's document and projects a value out of it.
    fn read<T, F>(&self, room: &str, f: F) -> StoreResult<T>
    where
        F: FnOnce(BoardDoc) -> T,
    {
        let conn = self.conn.lock();
        Ok(f(load_doc(&conn, room)?))
    }
}

fn load_doc(conn: &Connection, room: &str) -> StoreResult<BoardDoc> {
    let mut stmt = conn.prepare("SELECT state FROM boards WHERE room = ?1")?;
    let mut rows = stmt.query(rusqlite::params![room])?;
    match rows.next()? {
        Some(row) => {
            let state: String = row.get(0)?;
            Ok(serde_json::from_str(&state)?)
        }
        None => Ok(BoardDoc::default()),
    }
}

fn save_doc(conn: &Connection, room: &str, doc: &BoardDoc) -> StoreResult<()> {
    let state = serde_json::to_string(doc)?;
    conn.execute(
        "INSERT INTO boards (room, state) VALUES (?1, ?2)
         ON CONFLICT(room) DO UPDATE SET state = excluded.state",
        rusqlite::params![room, state],
    )?;
    Ok(())
}

impl BoardStore for DocumentStore {
    fn clear(&self, room: &str) -> StoreResult<()> {
        self.conn
            .lock()
            .execute("DELETE FROM boards WHERE room = ?1", rusqlite::params![room])?;
        Ok(())
    }

    fn theme(&self, room: &str) -> StoreResult<Option<Theme>> {
        self.read(room, |doc| doc.theme)
    }

    fn set_theme(&self, room: &str, theme: Theme) -> StoreResult<()> {
        self.update(room, |doc| doc.theme = Some(theme))
    }

    fn columns(&self, room: &str) -> StoreResult<Vec<String>> {
        self.read(room, |doc| doc.columns)
    }

    fn create_column(&self, room: &str, name: &str) -> StoreResult<()> {
        self.update(room, |doc| {
            if doc.columns.len() >= COLUMN_LIMIT {
                debug!(room, name, "column limit reached, dropping create");
                return;
            }
            doc.columns.push(name.to_owned());
        })
    }

    fn pop_column(&self, room: &str) -> StoreResult<()> {
        self.update(room, |doc| {
            doc.columns.pop();
        })
    }

    fn replace_columns(&self, room: &str, columns: &[String]) -> StoreResult<()> {
        self.update(room, |doc| {
            doc.columns = columns.iter().take(COLUMN_LIMIT).cloned().collect();
        })
    }

    fn cards(&self, room: &str) -> StoreResult<Vec<Card>> {
        self.read(room, |doc| doc.cards.into_values().collect())
    }

    fn create_card(&self, room: &str, id: &str, card: &Card) -> StoreResult<()> {
        let card = card.clone();
        self.update(room, |doc| {
            doc.cards.insert(id.to_owned(), card);
        })
    }

    fn edit_card(
        &self,
        room: &str,
        id: &str,
        text: Option<&str>,
        colour: Option<Colour>,
    ) -> StoreResult<()> {
        self.update(room, |doc| {
            if let Some(card) = doc.cards.get_mut(id) {
                card.apply_edit(text, colour);
            }
        })
    }

    fn set_card_position(&self, room: &str, id: &str, x: f64, y: f64) -> StoreResult<()> {
        self.update(room, |doc| {
            if let Some(card) = doc.cards.get_mut(id) {
                card.x = x;
                card.y = y;
            }
        })
    }

    fn delete_card(&self, room: &str, id: &str) -> StoreResult<()> {
        self.update(room, |doc| {
            doc.cards.remove(id);
        })
    }

    fn toggle_sticker(&self, room: &str, id: &str, sticker: &str) -> StoreResult<()> {
        self.update(room, |doc| {
            if let Some(card) = doc.cards.get_mut(id) {
                card.apply_sticker(sticker);
            }
        })
    }

    fn rows(&self, room: &str) -> StoreResult<Vec<Row>> {
        self.read(room, |doc| doc.rows.into_values().collect())
    }

    fn create_row(&self, room: &str, id: &str, row: &Row) -> StoreResult<()> {
        let row = row.clone();
        self.update(room, |doc| {
            doc.rows.insert(id.to_owned(), row);
        })
    }

    fn update_row_text(&self, room: &str, id: &str, text: &str) -> StoreResult<()> {
        self.update(room, |doc| {
            if let Some(row) = doc.rows.get_mut(id) {
                row.text = text.to_owned();
            }
        })
    }

    fn update_row_position(&self, room: &str, id: &str, y: f64) -> StoreResult<()> {
        self.update(room, |doc| {
            if let Some(row) = doc.rows.get_mut(id) {
                row.y = y;
            }
        })
    }

    fn delete_row(&self, room: &str, id: &str) -> StoreResult<()> {
        self.update(room, |doc| {
            doc.rows.remove(id);
        })
    }

    fn board_size(&self, room: &str) -> StoreResult<Option<BoardSize>> {
        self.read(room, |doc| doc.size)
    }

    fn set_board_size(&self, room: &str, size: BoardSize) -> StoreResult<()> {
        self.update(room, |doc| doc.size = Some(size))
    }

    fn eraser(&self, room: &str) -> StoreResult<Option<MarkerPos>> {
        self.read(room, |doc| doc.eraser.map(MarkerPos::eraser_at))
    }

    fn set_eraser(&self, room: &str, x: f64) -> StoreResult<()> {
        self.update(room, |doc| doc.eraser = Some(x))
    }

    fn marker(&self, room: &str) -> StoreResult<Option<MarkerPos>> {
        self.read(room, |doc| doc.marker.map(MarkerPos::marker_at))
    }

    fn set_marker(&self, room: &str, x: f64) -> StoreResult<()> {
        self.update(room, |doc| doc.marker = Some(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boards.db");

        {
            let store = DocumentStore::open(&path).unwrap();
            store.create_column("/demo", "To Do").unwrap();
            store.set_theme("/demo", Theme::Smallcards).unwrap();
        }

        let store = DocumentStore::open(&path).unwrap();
        assert_eq!(store.columns("/demo").unwrap(), vec!["To Do"]);
        assert_eq!(store.theme("/demo").unwrap(), Some(Theme::Smallcards));
    }

    #[test]
    fn creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/data/boards.db");
        let store = DocumentStore::open(&path).unwrap();
        store.create_column("/a", "col").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn open_fails_when_the_parent_cannot_be_created() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        assert!(DocumentStore::open(&blocker.join("nested/boards.db")).is_err());
    }

    #[test]
    fn legacy_document_without_optional_fields_parses() {
        let store = DocumentStore::open_in_memory().unwrap();
        {
            let conn = store.conn.lock();
            conn.execute(
                "INSERT INTO boards (room, state) VALUES (?1, ?2)",
                rusqlite::params!["/old", r#"{"columns":["A"]}"#],
            )
            .unwrap();
        }
        assert_eq!(store.columns("/old").unwrap(), vec!["A"]);
        assert_eq!(store.theme("/old").unwrap(), None);
        assert!(store.cards("/old").unwrap().is_empty());
    }
}
