//! Keyed backend: every card, row and column is its own redb entry.
//!
//! Entries are namespaced by a configurable key prefix, so several
//! deployments can share one database file without seeing each other's
//! rooms. Entity mutations are transactional per entry; replacing the
//! column list clears and re-appends in separate commits.

use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use pinboard_protocol::{BoardSize, Card, Colour, MarkerPos, Row, Theme, COLUMN_LIMIT};

use crate::{BoardStore, StoreError, StoreResult};

/// Table: cards
/// Key: prefix \0 room \0 card-id (UTF-8 bytes)
/// Value: JSON-encoded Card
const CARDS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("cards");

/// Table: rows
/// Key: prefix \0 room \0 row-id (UTF-8 bytes)
/// Value: JSON-encoded Row
const ROWS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("rows");

/// Table: columns
/// Key: prefix \0 room \0 index (u32 big-endian), so scan order is
/// creation order
/// Value: JSON-encoded column name
const COLUMNS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("columns");

/// Table: fields (theme, size, eraser, marker)
/// Key: prefix \0 room \0 field-name (UTF-8 bytes)
/// Value: JSON-encoded field value
const FIELDS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("fields");

/// redb-backed [`BoardStore`] holding one entry per entity.
pub struct KeyedStore {
    db: Database,
    prefix: String,
}

impl KeyedStore {
    /// Opens (or creates) the database at the given path. Entries are
    /// written under `prefix`; a store opened with a different prefix
    /// sees none of them.
    pub fn open(path: impl AsRef<Path>, prefix: impl Into<String>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        let db = Database::create(path).map_err(|e| StoreError::Io(e.to_string()))?;

        let txn = db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;
        {
            let _ = txn.open_table(CARDS).map_err(|e| StoreError::Io(e.to_string()))?;
            let _ = txn.open_table(ROWS).map_err(|e| StoreError::Io(e.to_string()))?;
            let _ = txn.open_table(COLUMNS).map_err(|e| StoreError::Io(e.to_string()))?;
            let _ = txn.open_table(FIELDS).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;

        Ok(Self { db, prefix: prefix.into() })
    }

    /// Key layout: `prefix \0 escaped-room \0`. The trailing NUL keeps
    /// rooms that are prefixes of each other (`/a`, `/ab`) disjoint.
    ///
    /// Room names are raw wire strings and may contain NUL, so the
    /// room bytes are escaped before the delimiter is applied: 0x00
    /// becomes 0x01 0x01 and 0x01 becomes 0x01 0x02. Without this a
    /// room named `/a\0evil` would land inside `/a`'s key range.
    fn room_key(&self, room: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.prefix.len() + room.len() + 2);
        key.extend_from_slice(self.prefix.as_bytes());
        key.push(0);
        for &byte in room.as_bytes() {
            match byte {
                0x00 => key.extend_from_slice(&[0x01, 0x01]),
                0x01 => key.extend_from_slice(&[0x01, 0x02]),
                byte => key.push(byte),
            }
        }
        key.push(0);
        key
    }

    fn entity_key(&self, room: &str, id: &str) -> Vec<u8> {
        let mut key = self.room_key(room);
        key.extend_from_slice(id.as_bytes());
        key
    }

    fn column_key(&self, room: &str, index: u32) -> Vec<u8> {
        let mut key = self.room_key(room);
        key.extend_from_slice(&index.to_be_bytes());
        key
    }

    // ─────────────────────────────────────────────────────────────────
    // Entity helpers (cards and rows share the same storage shape)
    // ─────────────────────────────────────────────────────────────────

    fn load_entities<T: DeserializeOwned>(
        &self,
        def: TableDefinition<'static, &'static [u8], &'static [u8]>,
        room: &str,
    ) -> StoreResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Io(e.to_string()))?;
        let table = txn.open_table(def).map_err(|e| StoreError::Io(e.to_string()))?;

        let prefix = self.room_key(room);
        let mut items = Vec::new();
        for entry in table
            .range(prefix.as_slice()..)
            .map_err(|e| StoreError::Io(e.to_string()))?
        {
            let (key, value) = entry.map_err(|e| StoreError::Io(e.to_string()))?;
            if !key.value().starts_with(&prefix) {
                break;
            }
            items.push(serde_json::from_slice(value.value())?);
        }
        Ok(items)
    }

    fn put_entity<T: Serialize>(
        &self,
        def: TableDefinition<'static, &'static [u8], &'static [u8]>,
        room: &str,
        id: &str,
        entity: &T,
    ) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;
        {
            let mut table = txn.open_table(def).map_err(|e| StoreError::Io(e.to_string()))?;
            let key = self.entity_key(room, id);
            let bytes = serde_json::to_vec(entity)?;
            table
                .insert(key.as_slice(), bytes.as_slice())
                .map_err(|e| StoreError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }

    /// Loads one entity, applies `f` and writes it back. Absent ids
    /// leave the table untouched.
    fn mutate_entity<T, F>(
        &self,
        def: TableDefinition<'static, &'static [u8], &'static [u8]>,
        room: &str,
        id: &str,
        f: F,
    ) -> StoreResult<()>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T),
    {
        let txn = self.db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;
        {
            let mut table = txn.open_table(def).map_err(|e| StoreError::Io(e.to_string()))?;
            let key = self.entity_key(room, id);
            let existing = table
                .get(key.as_slice())
                .map_err(|e| StoreError::Io(e.to_string()))?
                .map(|value| value.value().to_vec());

            if let Some(bytes) = existing {
                let mut entity: T = serde_json::from_slice(&bytes)?;
                f(&mut entity);
                let bytes = serde_json::to_vec(&entity)?;
                table
                    .insert(key.as_slice(), bytes.as_slice())
                    .map_err(|e| StoreError::Io(e.to_string()))?;
            }
        }
        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }

    fn remove_entity(
        &self,
        def: TableDefinition<'static, &'static [u8], &'static [u8]>,
        room: &str,
        id: &str,
    ) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;
        {
            let mut table = txn.open_table(def).map_err(|e| StoreError::Io(e.to_string()))?;
            let key = self.entity_key(room, id);
            table
                .remove(key.as_slice())
                .map_err(|e| StoreError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────
    // Scalar field helpers
    // ─────────────────────────────────────────────────────────────────

    fn read_field<T: DeserializeOwned>(&self, room: &str, field: &str) -> StoreResult<Option<T>> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Io(e.to_string()))?;
        let table = txn.open_table(FIELDS).map_err(|e| StoreError::Io(e.to_string()))?;

        let key = self.entity_key(room, field);
        match table
            .get(key.as_slice())
            .map_err(|e| StoreError::Io(e.to_string()))?
        {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn write_field<T: Serialize>(&self, room: &str, field: &str, value: &T) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;
        {
            let mut table = txn.open_table(FIELDS).map_err(|e| StoreError::Io(e.to_string()))?;
            let key = self.entity_key(room, field);
            let bytes = serde_json::to_vec(value)?;
            table
                .insert(key.as_slice(), bytes.as_slice())
                .map_err(|e| StoreError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }
}

/// Removes every entry whose key starts with `prefix`.
fn remove_prefix(
    table: &mut redb::Table<'_, &'static [u8], &'static [u8]>,
    prefix: &[u8],
) -> StoreResult<()> {
    let mut doomed = Vec::new();
    for entry in table
        .range(prefix..)
        .map_err(|e| StoreError::Io(e.to_string()))?
    {
        let (key, _) = entry.map_err(|e| StoreError::Io(e.to_string()))?;
        if !key.value().starts_with(prefix) {
            break;
        }
        doomed.push(key.value().to_vec());
    }
    for key in &doomed {
        table
            .remove(key.as_slice())
            .map_err(|e| StoreError::Io(e.to_string()))?;
    }
    Ok(())
}

/// Decodes the big-endian column index that follows the room prefix.
fn column_index(key: &[u8], prefix_len: usize) -> u32 {
    debug_assert!(key.len() >= prefix_len + 4);
    u32::from_be_bytes(
        key[prefix_len..prefix_len + 4]
            .try_into()
            .expect("key length verified"),
    )
}

impl BoardStore for KeyedStore {
    fn clear(&self, room: &str) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;
        {
            let prefix = self.room_key(room);
            let mut cards = txn.open_table(CARDS).map_err(|e| StoreError::Io(e.to_string()))?;
            remove_prefix(&mut cards, &prefix)?;
            let mut rows = txn.open_table(ROWS).map_err(|e| StoreError::Io(e.to_string()))?;
            remove_prefix(&mut rows, &prefix)?;
            let mut columns =
                txn.open_table(COLUMNS).map_err(|e| StoreError::Io(e.to_string()))?;
            remove_prefix(&mut columns, &prefix)?;
            let mut fields = txn.open_table(FIELDS).map_err(|e| StoreError::Io(e.to_string()))?;
            remove_prefix(&mut fields, &prefix)?;
        }
        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }

    fn theme(&self, room: &str) -> StoreResult<Option<Theme>> {
        self.read_field(room, "theme")
    }

    fn set_theme(&self, room: &str, theme: Theme) -> StoreResult<()> {
        self.write_field(room, "theme", &theme)
    }

    fn columns(&self, room: &str) -> StoreResult<Vec<String>> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Io(e.to_string()))?;
        let table = txn.open_table(COLUMNS).map_err(|e| StoreError::Io(e.to_string()))?;

        let prefix = self.room_key(room);
        let mut names = Vec::new();
        for entry in table
            .range(prefix.as_slice()..)
            .map_err(|e| StoreError::Io(e.to_string()))?
        {
            let (key, value) = entry.map_err(|e| StoreError::Io(e.to_string()))?;
            if !key.value().starts_with(&prefix) {
                break;
            }
            names.push(serde_json::from_slice(value.value())?);
        }
        Ok(names)
    }

    fn create_column(&self, room: &str, name: &str) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;
        {
            let mut table = txn.open_table(COLUMNS).map_err(|e| StoreError::Io(e.to_string()))?;
            let prefix = self.room_key(room);

            let mut count = 0usize;
            let mut next_index = 0u32;
            for entry in table
                .range(prefix.as_slice()..)
                .map_err(|e| StoreError::Io(e.to_string()))?
            {
                let (key, _) = entry.map_err(|e| StoreError::Io(e.to_string()))?;
                if !key.value().starts_with(&prefix) {
                    break;
                }
                count += 1;
                next_index = column_index(key.value(), prefix.len()) + 1;
            }

            if count >= COLUMN_LIMIT {
                debug!(room, name, "column limit reached, dropping create");
            } else {
                let key = self.column_key(room, next_index);
                let bytes = serde_json::to_vec(name)?;
                table
                    .insert(key.as_slice(), bytes.as_slice())
                    .map_err(|e| StoreError::Io(e.to_string()))?;
            }
        }
        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }

    fn pop_column(&self, room: &str) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;
        {
            let mut table = txn.open_table(COLUMNS).map_err(|e| StoreError::Io(e.to_string()))?;
            let prefix = self.room_key(room);

            let mut last: Option<Vec<u8>> = None;
            for entry in table
                .range(prefix.as_slice()..)
                .map_err(|e| StoreError::Io(e.to_string()))?
            {
                let (key, _) = entry.map_err(|e| StoreError::Io(e.to_string()))?;
                if !key.value().starts_with(&prefix) {
                    break;
                }
                last = Some(key.value().to_vec());
            }

            if let Some(key) = last {
                table
                    .remove(key.as_slice())
                    .map_err(|e| StoreError::Io(e.to_string()))?;
            }
        }
        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }

    fn replace_columns(&self, room: &str, columns: &[String]) -> StoreResult<()> {
        let prefix = self.room_key(room);

        // Clear and append commit separately; a reader between the two
        // commits sees an empty column list.
        let txn = self.db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;
        {
            let mut table = txn.open_table(COLUMNS).map_err(|e| StoreError::Io(e.to_string()))?;
            remove_prefix(&mut table, &prefix)?;
        }
        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;

        let txn = self.db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;
        {
            let mut table = txn.open_table(COLUMNS).map_err(|e| StoreError::Io(e.to_string()))?;
            for (index, name) in columns.iter().take(COLUMN_LIMIT).enumerate() {
                let key = self.column_key(room, index as u32);
                let bytes = serde_json::to_vec(name)?;
                table
                    .insert(key.as_slice(), bytes.as_slice())
                    .map_err(|e| StoreError::Io(e.to_string()))?;
            }
        }
        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }

    fn cards(&self, room: &str) -> StoreResult<Vec<Card>> {
        self.load_entities(CARDS, room)
    }

    fn create_card(&self, room: &str, id: &str, card: &Card) -> StoreResult<()> {
        self.put_entity(CARDS, room, id, card)
    }

    fn edit_card(
        &self,
        room: &str,
        id: &str,
        text: Option<&str>,
        colour: Option<Colour>,
    ) -> StoreResult<()> {
        self.mutate_entity::<Card, _>(CARDS, room, id, |card| card.apply_edit(text, colour))
    }

    fn set_card_position(&self, room: &str, id: &str, x: f64, y: f64) -> StoreResult<()> {
        self.mutate_entity::<Card, _>(CARDS, room, id, |card| {
            card.x = x;
            card.y = y;
        })
    }

    fn delete_card(&self, room: &str, id: &str) -> StoreResult<()> {
        self.remove_entity(CARDS, room, id)
    }

    fn toggle_sticker(&self, room: &str, id: &str, sticker: &str) -> StoreResult<()> {
        self.mutate_entity::<Card, _>(CARDS, room, id, |card| card.apply_sticker(sticker))
    }

    fn rows(&self, room: &str) -> StoreResult<Vec<Row>> {
        self.load_entities(ROWS, room)
    }

    fn create_row(&self, room: &str, id: &str, row: &Row) -> StoreResult<()> {
        self.put_entity(ROWS, room, id, row)
    }

    fn update_row_text(&self, room: &str, id: &str, text: &str) -> StoreResult<()> {
        self.mutate_entity::<Row, _>(ROWS, room, id, |row| row.text = text.to_owned())
    }

    fn update_row_position(&self, room: &str, id: &str, y: f64) -> StoreResult<()> {
        self.mutate_entity::<Row, _>(ROWS, room, id, |row| row.y = y)
    }

    fn delete_row(&self, room: &str, id: &str) -> StoreResult<()> {
        self.remove_entity(ROWS, room, id)
    }

    fn board_size(&self, room: &str) -> StoreResult<Option<BoardSize>> {
        self.read_field(room, "size")
    }

    fn set_board_size(&self, room: &str, size: BoardSize) -> StoreResult<()> {
        self.write_field(room, "size", &size)
    }

    fn eraser(&self, room: &str) -> StoreResult<Option<MarkerPos>> {
        Ok(self.read_field::<f64>(room, "eraser")?.map(MarkerPos::eraser_at))
    }

    fn set_eraser(&self, room: &str, x: f64) -> StoreResult<()> {
        self.write_field(room, "eraser", &x)
    }

    fn marker(&self, room: &str) -> StoreResult<Option<MarkerPos>> {
        Ok(self.read_field::<f64>(room, "marker")?.map(MarkerPos::marker_at))
    }

    fn set_marker(&self, room: &str, x: f64) -> StoreResult<()> {
        self.write_field(room, "marker", &x)
    }
}
