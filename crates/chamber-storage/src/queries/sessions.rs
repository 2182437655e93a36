// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session CRUD operations.
//!
//! Sessions are stored with their metadata and message list as JSON text
//! columns. Reads tolerate corrupt rows: a record that no longer decodes is
//! logged and treated as absent rather than failing the whole read.

use rusqlite::params;
use tracing::warn;

use chamber_core::{ChamberError, Session};

use crate::database::{Database, map_json_err, map_tr_err};

/// Raw row as stored; JSON columns are decoded separately so one bad row
/// cannot poison a listing.
struct SessionRow {
    id: String,
    title: String,
    created_at: String,
    metadata: String,
    messages: String,
}

const SELECT_COLUMNS: &str = "id, title, created_at, metadata, messages";

fn row_to_raw(row: &rusqlite::Row<'_>) -> Result<SessionRow, rusqlite::Error> {
    Ok(SessionRow {
        id: row.get(0)?,
        title: row.get(1)?,
        created_at: row.get(2)?,
        metadata: row.get(3)?,
        messages: row.get(4)?,
    })
}

fn decode(row: SessionRow) -> Option<Session> {
    let metadata = match serde_json::from_str(&row.metadata) {
        Ok(metadata) => metadata,
        Err(error) => {
            warn!(session_id = %row.id, %error, "discarding session with unreadable metadata");
            return None;
        }
    };
    let messages = match serde_json::from_str(&row.messages) {
        Ok(messages) => messages,
        Err(error) => {
            warn!(session_id = %row.id, %error, "discarding session with unreadable messages");
            return None;
        }
    };
    Some(Session {
        id: row.id,
        title: row.title,
        created_at: row.created_at,
        messages,
        metadata,
    })
}

/// Insert or replace a session.
///
/// On conflict the stored `created_at` is kept: creation time is set once
/// and preserved across saves.
pub async fn upsert_session(db: &Database, session: &Session) -> Result<(), ChamberError> {
    let id = session.id.clone();
    let title = session.title.clone();
    let created_at = session.created_at.clone();
    let metadata = serde_json::to_string(&session.metadata).map_err(map_json_err)?;
    let messages = serde_json::to_string(&session.messages).map_err(map_json_err)?;

    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, title, created_at, metadata, messages)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                     title = excluded.title,
                     metadata = excluded.metadata,
                     messages = excluded.messages",
                params![id, title, created_at, metadata, messages],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a session by id. Corrupt records read as absent.
pub async fn get_session(db: &Database, id: &str) -> Result<Option<Session>, ChamberError> {
    let id = id.to_string();
    let row = db
        .connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM sessions WHERE id = ?1"
            ))?;
            let result = stmt.query_row(params![id], row_to_raw);
            match result {
                Ok(row) => Ok(Some(row)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)?;
    Ok(row.and_then(decode))
}

/// All sessions, newest first. Corrupt records are skipped.
pub async fn all_sessions(db: &Database) -> Result<Vec<Session>, ChamberError> {
    let rows = db
        .connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM sessions ORDER BY created_at DESC, id ASC"
            ))?;
            let rows = stmt.query_map([], row_to_raw)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)?;
    Ok(rows.into_iter().filter_map(decode).collect())
}

pub async fn delete_session(db: &Database, id: &str) -> Result<(), ChamberError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Update only the title. Unknown ids are a no-op.
pub async fn rename_session(db: &Database, id: &str, title: &str) -> Result<(), ChamberError> {
    let id = id.to_string();
    let title = title.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET title = ?1 WHERE id = ?2",
                params![title, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
