use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use crate::model::{NewSession, Session, Settings, SettingsUpdate};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session ids exhausted")]
    IdsExhausted,
}

/// Append-only log of focus sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, new: NewSession) -> Result<Session, StoreError>;

    /// All sessions, newest start time first.
    async fn list(&self) -> Result<Vec<Session>, StoreError>;

    /// Sessions with `start <= start_time <= end`, newest start time first.
    async fn list_between(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<Session>, StoreError>;
}

/// Single-slot settings store.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get(&self) -> Result<Settings, StoreError>;

    async fn update(&self, update: SettingsUpdate) -> Result<Settings, StoreError>;
}

struct SessionTable {
    next_id: i64,
    rows: HashMap<i64, Session>,
}

pub struct MemoryStore {
    sessions: Mutex<SessionTable>,
    settings: Mutex<Settings>,
}

impl MemoryStore {
    pub fn new(defaults: Settings) -> Self {
        Self {
            sessions: Mutex::new(SessionTable {
                next_id: 1,
                rows: HashMap::new(),
            }),
            settings: Mutex::new(defaults),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

fn newest_first(mut sessions: Vec<Session>) -> Vec<Session> {
    sessions.sort_by(|a, b| {
        b.start_time
            .cmp(&a.start_time)
            .then_with(|| b.id.cmp(&a.id))
    });
    sessions
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn create(&self, new: NewSession) -> Result<Session, StoreError> {
        let mut table = self.sessions.lock().await;
        let id = table.next_id;
        table.next_id = id.checked_add(1).ok_or(StoreError::IdsExhausted)?;
        let session = new.into_session(id);
        table.rows.insert(id, session.clone());
        Ok(session)
    }

    async fn list(&self) -> Result<Vec<Session>, StoreError> {
        let table = self.sessions.lock().await;
        Ok(newest_first(table.rows.values().cloned().collect()))
    }

    async fn list_between(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<Session>, StoreError> {
        let table = self.sessions.lock().await;
        let hits = table
            .rows
            .values()
            .filter(|s| s.start_time >= start && s.start_time <= end)
            .cloned()
            .collect();
        Ok(newest_first(hits))
    }
}

#[async_trait]
impl SettingsRepository for MemoryStore {
    async fn get(&self) -> Result<Settings, StoreError> {
        Ok(*self.settings.lock().await)
    }

    async fn update(&self, update: SettingsUpdate) -> Result<Settings, StoreError> {
        let mut guard = self.settings.lock().await;
        update.apply_to(&mut guard);
        Ok(*guard)
    }
}
