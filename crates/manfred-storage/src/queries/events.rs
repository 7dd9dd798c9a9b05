// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session event log.

use chrono::Utc;
use manfred_core::{EventType, ManfredError, SessionEvent};
use rusqlite::types::Type;
use rusqlite::{ffi, params, ErrorCode, Row};
use tracing::debug;

use crate::cancel::CancelToken;
use crate::database::{map_tr_err, storage_err, Database};
use crate::queries::sessions::{format_timestamp, timestamp_column};

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<SessionEvent> {
    let event_type: String = row.get(2)?;
    let payload: Option<String> = row.get(3)?;
    let payload = payload
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
    Ok(SessionEvent {
        id: row.get(0)?,
        session_id: row.get(1)?,
        event_type: EventType::from(event_type.as_str()),
        payload,
        created_at: timestamp_column(row, 4)?,
    })
}

/// Appends an event. Fails with [`ManfredError::NotFound`] when the session
/// does not exist.
pub async fn insert_event(
    db: &Database,
    session_id: &str,
    event_type: &EventType,
    payload: Option<&serde_json::Value>,
    token: CancelToken,
) -> Result<(), ManfredError> {
    let payload = payload
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| ManfredError::Internal(format!("event payload not serializable: {e}")))?;
    let sid = session_id.to_string();
    let kind = event_type.as_str().to_string();
    let created_at = format_timestamp(Utc::now());

    db.write_tx(token, move |conn| {
        let result = conn.execute(
            "INSERT INTO session_events (session_id, event_type, payload, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![sid, kind, payload, created_at],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation
                    && err.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
            {
                Err(ManfredError::NotFound { session_id: sid })
            }
            Err(e) => Err(storage_err(e)),
        }
    })
    .await?;

    debug!(session_id, event_type = %event_type, "event recorded");
    Ok(())
}

/// Events for a session in insertion order.
pub async fn get_events(db: &Database, session_id: &str) -> Result<Vec<SessionEvent>, ManfredError> {
    let sid = session_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, event_type, payload, created_at
                 FROM session_events WHERE session_id = ?1
                 ORDER BY created_at ASC, id ASC",
            )?;
            let rows = stmt.query_map(params![sid], event_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}
