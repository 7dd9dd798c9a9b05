// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session CRUD.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use manfred_core::{ManfredError, Phase, Session, SessionFilter, SessionRecord};
use rusqlite::types::{Type, Value};
use rusqlite::{ffi, params, params_from_iter, ErrorCode, Row};
use tracing::debug;

use crate::cancel::CancelToken;
use crate::database::{map_tr_err, storage_err, Database};

const SESSION_COLUMNS: &str = "id, repo_owner, repo_name, issue_number, pr_number, phase, branch, \
     container_ref, plan_text, error_text, created_at, last_activity";

/// Timestamps are stored as fixed-width RFC 3339 text so that string order
/// equals time order.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
}

pub(crate) fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn phase_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Phase> {
    let raw: String = row.get(idx)?;
    Phase::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session::from(SessionRecord {
        id: row.get(0)?,
        owner: row.get(1)?,
        repository: row.get(2)?,
        issue_number: row.get(3)?,
        pr_number: row.get(4)?,
        phase: phase_column(row, 5)?,
        branch: row.get(6)?,
        container_ref: row.get(7)?,
        plan_text: row.get(8)?,
        error_text: row.get(9)?,
        created_at: timestamp_column(row, 10)?,
        last_activity: timestamp_column(row, 11)?,
    }))
}

fn optional<T>(result: rusqlite::Result<T>) -> rusqlite::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// True for a UNIQUE or PRIMARY KEY violation. Other constraint failures
/// are real storage errors.
fn is_duplicate(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(err, _) => {
            err.code == ErrorCode::ConstraintViolation
                && (err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                    || err.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}

/// Inserts a new session.
///
/// A uniqueness violation on either the id or the (owner, repository,
/// issue) triple comes back as [`ManfredError::AlreadyExists`]; the insert
/// is rejected as a whole so exactly one row remains.
pub async fn create_session(
    db: &Database,
    session: &Session,
    token: CancelToken,
) -> Result<(), ManfredError> {
    session.validate()?;
    let record = SessionRecord::from(session);
    let session_id = record.id.clone();

    db.write_tx(token, move |conn| {
        let result = conn.execute(
            &format!(
                "INSERT INTO sessions ({SESSION_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            params![
                record.id,
                record.owner,
                record.repository,
                record.issue_number,
                record.pr_number,
                record.phase.as_str(),
                record.branch,
                record.container_ref,
                record.plan_text,
                record.error_text,
                format_timestamp(record.created_at),
                format_timestamp(record.last_activity),
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate(&e) => Err(ManfredError::AlreadyExists {
                owner: record.owner,
                repository: record.repository,
                issue_number: record.issue_number,
                session_id: record.id,
            }),
            Err(e) => Err(storage_err(e)),
        }
    })
    .await?;

    debug!(session_id = %session_id, "session created");
    Ok(())
}

pub async fn get_session(db: &Database, id: &str) -> Result<Option<Session>, ManfredError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"))?;
            optional(stmt.query_row(params![id], session_from_row))
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_session_by_issue(
    db: &Database,
    owner: &str,
    repository: &str,
    issue_number: i64,
) -> Result<Option<Session>, ManfredError> {
    let owner = owner.to_string();
    let repository = repository.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE repo_owner = ?1 AND repo_name = ?2 AND issue_number = ?3"
            ))?;
            optional(stmt.query_row(params![owner, repository, issue_number], session_from_row))
        })
        .await
        .map_err(map_tr_err)
}

/// Writes the mutable fields: PR number, phase, container ref, plan,
/// error and last activity. Identity fields and `created_at` never change.
pub async fn update_session(
    db: &Database,
    session: &Session,
    token: CancelToken,
) -> Result<(), ManfredError> {
    session.validate()?;
    let record = SessionRecord::from(session);
    let session_id = record.id.clone();

    db.write_tx(token, move |conn| {
        let rows = conn
            .execute(
                "UPDATE sessions SET
                    pr_number = ?1,
                    phase = ?2,
                    container_ref = ?3,
                    plan_text = ?4,
                    error_text = ?5,
                    last_activity = ?6
                 WHERE id = ?7",
                params![
                    record.pr_number,
                    record.phase.as_str(),
                    record.container_ref,
                    record.plan_text,
                    record.error_text,
                    format_timestamp(record.last_activity),
                    record.id,
                ],
            )
            .map_err(storage_err)?;
        if rows == 0 {
            return Err(ManfredError::NotFound {
                session_id: record.id,
            });
        }
        Ok(())
    })
    .await?;

    debug!(session_id = %session_id, phase = %session.phase(), "session updated");
    Ok(())
}

/// Deletes a session. Its events go with it through the cascading foreign
/// key.
pub async fn delete_session(
    db: &Database,
    id: &str,
    token: CancelToken,
) -> Result<(), ManfredError> {
    let session_id = id.to_string();
    let id = session_id.clone();
    db.write_tx(token, move |conn| {
        let rows = conn
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])
            .map_err(storage_err)?;
        if rows == 0 {
            return Err(ManfredError::NotFound { session_id: id });
        }
        Ok(())
    })
    .await?;

    debug!(session_id = %session_id, "session deleted");
    Ok(())
}

/// WHERE clause and bound values for a filter. Limit and offset are not
/// part of it.
fn filter_clause(filter: &SessionFilter) -> (String, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut values = Vec::new();

    if let Some(owner) = &filter.owner {
        conditions.push("repo_owner = ?");
        values.push(Value::Text(owner.clone()));
    }
    if let Some(repository) = &filter.repository {
        conditions.push("repo_name = ?");
        values.push(Value::Text(repository.clone()));
    }
    if let Some(phase) = filter.phase {
        conditions.push("phase = ?");
        values.push(Value::Text(phase.as_str().to_string()));
    }
    if filter.active_only {
        conditions.push("phase NOT IN (?, ?)");
        values.push(Value::Text(Phase::Completed.as_str().to_string()));
        values.push(Value::Text(Phase::Error.as_str().to_string()));
    }

    if conditions.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), values)
    }
}

/// Sessions matching `filter`, most recently active first.
pub async fn list_sessions(
    db: &Database,
    filter: &SessionFilter,
) -> Result<Vec<Session>, ManfredError> {
    let (clause, mut values) = filter_clause(filter);
    let mut sql = format!(
        "SELECT {SESSION_COLUMNS} FROM sessions{clause} ORDER BY last_activity DESC, id ASC"
    );
    match (filter.limit, filter.offset) {
        (Some(limit), offset) => {
            sql.push_str(" LIMIT ?");
            values.push(Value::Integer(i64::from(limit)));
            if let Some(offset) = offset {
                sql.push_str(" OFFSET ?");
                values.push(Value::Integer(i64::from(offset)));
            }
        }
        // SQLite needs a LIMIT before OFFSET; -1 means unbounded.
        (None, Some(offset)) => {
            sql.push_str(" LIMIT -1 OFFSET ?");
            values.push(Value::Integer(i64::from(offset)));
        }
        (None, None) => {}
    }

    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values), session_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Number of sessions matching `filter`, ignoring limit and offset.
pub async fn count_sessions(db: &Database, filter: &SessionFilter) -> Result<u64, ManfredError> {
    let (clause, values) = filter_clause(filter);
    let sql = format!("SELECT COUNT(*) FROM sessions{clause}");
    let count: i64 = db
        .connection()
        .call(move |conn| conn.query_row(&sql, params_from_iter(values), |row| row.get(0)))
        .await
        .map_err(map_tr_err)?;
    Ok(u64::try_from(count).unwrap_or(0))
}
