// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of `SessionStore`.

use std::future::Future;
use std::path::PathBuf;
use std::pin::pin;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use manfred_config::ManfredConfig;
use manfred_core::{
    Adapter, AdapterType, EventType, HealthStatus, ManfredError, Session, SessionEvent,
    SessionFilter, SessionStore,
};

use crate::cancel::CancelToken;
use crate::database::{map_tr_err, Database, DatabaseOptions};
use crate::queries;

/// SQLite-backed session store.
///
/// The database is opened lazily by [`SqliteSessionStore::initialize`].
/// When an operation timeout is configured, each call is bounded by it and
/// fails with [`ManfredError::Timeout`]. Writes run in a transaction gated
/// by a [`CancelToken`]: a timed-out write is rolled back, or skipped if it
/// never left the queue. A write that has already started committing when
/// the deadline fires is awaited instead, so `Timeout` always means nothing
/// was written.
pub struct SqliteSessionStore {
    path: PathBuf,
    options: DatabaseOptions,
    operation_timeout: Option<Duration>,
    db: OnceCell<Database>,
}

impl SqliteSessionStore {
    pub fn new(path: impl Into<PathBuf>, options: DatabaseOptions) -> Self {
        Self {
            path: path.into(),
            options,
            operation_timeout: None,
            db: OnceCell::new(),
        }
    }

    pub fn from_config(config: &ManfredConfig) -> Self {
        let mut store = Self::new(
            config.database_path(),
            DatabaseOptions::from(&config.storage),
        );
        store.operation_timeout = config
            .storage
            .operation_timeout_secs
            .map(Duration::from_secs);
        store
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Opens the database and runs migrations. A second call fails.
    pub async fn initialize(&self) -> Result<(), ManfredError> {
        let db = Database::open_with(&self.path, &self.options).await?;
        self.db.set(db).map_err(|_| ManfredError::Storage {
            source: "session store already initialized".into(),
        })?;
        debug!(path = %self.path.display(), "session store initialized");
        Ok(())
    }

    /// Checkpoints the WAL. The connection itself closes on drop.
    pub async fn close(&self) -> Result<(), ManfredError> {
        self.db()?.checkpoint().await
    }

    /// Highest applied migration version.
    pub async fn schema_version(&self) -> Result<Option<i32>, ManfredError> {
        self.db()?.schema_version().await
    }

    fn db(&self) -> Result<&Database, ManfredError> {
        self.db.get().ok_or_else(|| ManfredError::Storage {
            source: "session store not initialized; call initialize() first".into(),
        })
    }

    async fn bounded<T, F, Fut>(&self, operation: &'static str, run: F) -> Result<T, ManfredError>
    where
        F: FnOnce(CancelToken) -> Fut,
        Fut: Future<Output = Result<T, ManfredError>>,
    {
        let token = CancelToken::new();
        let Some(duration) = self.operation_timeout else {
            return run(token).await;
        };
        let mut fut = pin!(run(token.clone()));
        match tokio::time::timeout(duration, &mut fut).await {
            Ok(result) => result,
            Err(_) if token.cancel() => {
                warn!(operation, ?duration, "session store operation timed out");
                Err(ManfredError::Timeout { duration })
            }
            Err(_) => {
                debug!(operation, "deadline passed during commit, awaiting result");
                fut.await
            }
        }
    }
}

#[async_trait]
impl Adapter for SqliteSessionStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ManfredError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| conn.execute_batch("SELECT 1;"))
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ManfredError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create(&self, session: &Session) -> Result<(), ManfredError> {
        let db = self.db()?;
        self.bounded("create", |token| {
            queries::sessions::create_session(db, session, token)
        })
            .await
    }

    async fn get(&self, id: &str) -> Result<Option<Session>, ManfredError> {
        let db = self.db()?;
        self.bounded("get", |_| queries::sessions::get_session(db, id))
            .await
    }

    async fn get_by_issue(
        &self,
        owner: &str,
        repository: &str,
        issue_number: i64,
    ) -> Result<Option<Session>, ManfredError> {
        let db = self.db()?;
        self.bounded(
            "get_by_issue",
            |_| queries::sessions::get_session_by_issue(db, owner, repository, issue_number),
        )
        .await
    }

    async fn update(&self, session: &Session) -> Result<(), ManfredError> {
        let db = self.db()?;
        self.bounded("update", |token| {
            queries::sessions::update_session(db, session, token)
        })
            .await
    }

    async fn delete(&self, id: &str) -> Result<(), ManfredError> {
        let db = self.db()?;
        self.bounded("delete", |token| {
            queries::sessions::delete_session(db, id, token)
        })
            .await
    }

    async fn list(&self, filter: &SessionFilter) -> Result<Vec<Session>, ManfredError> {
        let db = self.db()?;
        self.bounded("list", |_| queries::sessions::list_sessions(db, filter))
            .await
    }

    async fn count(&self, filter: &SessionFilter) -> Result<u64, ManfredError> {
        let db = self.db()?;
        self.bounded("count", |_| queries::sessions::count_sessions(db, filter))
            .await
    }

    async fn record_event(
        &self,
        session_id: &str,
        event_type: EventType,
        payload: Option<serde_json::Value>,
    ) -> Result<(), ManfredError> {
        let db = self.db()?;
        self.bounded(
            "record_event",
            |token| {
                queries::events::insert_event(db, session_id, &event_type, payload.as_ref(), token)
            },
        )
        .await
    }

    async fn get_events(&self, session_id: &str) -> Result<Vec<SessionEvent>, ManfredError> {
        let db = self.db()?;
        self.bounded("get_events", |_| queries::events::get_events(db, session_id))
            .await
    }
}
