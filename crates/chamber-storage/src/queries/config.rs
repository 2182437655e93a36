// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Small key-value config operations.

use rusqlite::params;

use chamber_core::ChamberError;

use crate::database::{Database, map_tr_err};

pub async fn set_config(db: &Database, key: &str, value: &str) -> Result<(), ChamberError> {
    let key = key.to_string();
    let value = value.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO config (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_config(db: &Database, key: &str) -> Result<Option<String>, ChamberError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT value FROM config WHERE key = ?1",
                params![key],
                |row| row.get(0),
            );
            match result {
                Ok(value) => Ok(Some(value)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

pub async fn remove_config(db: &Database, key: &str) -> Result<(), ChamberError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM config WHERE key = ?1", params![key])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
