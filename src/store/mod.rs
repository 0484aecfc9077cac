//! Persistence sinks for emissions and feedback.
//!
//! The sink is the authority on delivery history: the gate's minimum-interval
//! and daily-cap checks query it every cycle rather than trusting in-memory
//! counters. An emission counts toward the rolling 24h cap while its delivery
//! window is still open, or permanently once feedback arrives; windows that
//! closed with no feedback stop counting on their own.

use crate::engine::types::{EffectivenessRecord, Intervention};
use crate::error::StoreError;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

pub trait PersistenceSink: Send + Sync {
    fn append_emission(&self, intervention: &Intervention) -> Result<(), StoreError>;

    fn append_feedback(&self, record: &EffectivenessRecord) -> Result<(), StoreError>;

    fn last_intervention_time(&self, user_id: &str) -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Emissions scheduled within the trailing 24h that still count: window
    /// open at `now`, or resolved by feedback.
    fn daily_count(&self, user_id: &str, now: DateTime<Utc>) -> Result<u32, StoreError>;
}

// ─── In-memory sink ──────────────────────────────────────────────────────────

#[derive(Default)]
struct MemoryInner {
    emissions: Vec<Intervention>,
    feedback: Vec<EffectivenessRecord>,
    feedback_ids: HashSet<Uuid>,
}

/// Process-local sink, suitable for tests and callers that persist
/// elsewhere.
#[derive(Default)]
pub struct MemorySink {
    inner: Mutex<MemoryInner>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emission_count(&self) -> usize {
        self.lock().emissions.len()
    }

    pub fn feedback_count(&self) -> usize {
        self.lock().feedback.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PersistenceSink for MemorySink {
    fn append_emission(&self, intervention: &Intervention) -> Result<(), StoreError> {
        self.lock().emissions.push(intervention.clone());
        Ok(())
    }

    fn append_feedback(&self, record: &EffectivenessRecord) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.feedback_ids.insert(record.intervention_id) {
            inner.feedback.push(record.clone());
        }
        Ok(())
    }

    fn last_intervention_time(&self, user_id: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self
            .lock()
            .emissions
            .iter()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.timing.scheduled_at)
            .max())
    }

    fn daily_count(&self, user_id: &str, now: DateTime<Utc>) -> Result<u32, StoreError> {
        let window_start = now - Duration::hours(24);
        let inner = self.lock();
        let count = inner
            .emissions
            .iter()
            .filter(|e| e.user_id == user_id)
            .filter(|e| e.timing.scheduled_at > window_start && e.timing.scheduled_at <= now)
            .filter(|e| e.timing.valid_until >= now || inner.feedback_ids.contains(&e.id))
            .count();
        Ok(count as u32)
    }
}

// ─── SQLite sink ─────────────────────────────────────────────────────────────

/// Durable sink backed by SQLite. Timestamps are stored as RFC 3339 UTC
/// text, which compares correctly as strings.
pub struct SqliteSink {
    conn: Mutex<Connection>,
}

impl SqliteSink {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Open(e.to_string()))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Open(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS emissions (
                id            TEXT PRIMARY KEY,
                user_id       TEXT NOT NULL,
                kind          TEXT NOT NULL,
                scheduled_at  TEXT NOT NULL,
                valid_until   TEXT NOT NULL,
                payload       TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_emissions_user_time
                ON emissions(user_id, scheduled_at);
            CREATE TABLE IF NOT EXISTS feedback (
                intervention_id TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL,
                recorded_at     TEXT NOT NULL,
                payload         TEXT NOT NULL
            );",
        )
        .map_err(|e| StoreError::Open(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PersistenceSink for SqliteSink {
    fn append_emission(&self, intervention: &Intervention) -> Result<(), StoreError> {
        let payload = serde_json::to_string(intervention)
            .map_err(|e| StoreError::Query(e.to_string()))?;
        self.lock()
            .execute(
                "INSERT OR IGNORE INTO emissions
                    (id, user_id, kind, scheduled_at, valid_until, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    intervention.id.to_string(),
                    intervention.user_id,
                    intervention.kind.to_string(),
                    intervention.timing.scheduled_at.to_rfc3339(),
                    intervention.timing.valid_until.to_rfc3339(),
                    payload,
                ],
            )
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    fn append_feedback(&self, record: &EffectivenessRecord) -> Result<(), StoreError> {
        let payload =
            serde_json::to_string(record).map_err(|e| StoreError::Query(e.to_string()))?;
        self.lock()
            .execute(
                "INSERT OR IGNORE INTO feedback
                    (intervention_id, user_id, recorded_at, payload)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.intervention_id.to_string(),
                    record.user_id,
                    record.at.to_rfc3339(),
                    payload,
                ],
            )
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    fn last_intervention_time(&self, user_id: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        let conn = self.lock();
        let raw: Option<String> = conn
            .query_row(
                "SELECT scheduled_at FROM emissions
                 WHERE user_id = ?1
                 ORDER BY scheduled_at DESC LIMIT 1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::Query(e.to_string()))?;
        match raw {
            Some(text) => {
                let parsed = DateTime::parse_from_rfc3339(&text)
                    .map_err(|e| StoreError::Query(format!("bad timestamp {text}: {e}")))?;
                Ok(Some(parsed.with_timezone(&Utc)))
            }
            None => Ok(None),
        }
    }

    fn daily_count(&self, user_id: &str, now: DateTime<Utc>) -> Result<u32, StoreError> {
        let window_start = (now - Duration::hours(24)).to_rfc3339();
        let now_text = now.to_rfc3339();
        self.lock()
            .query_row(
                "SELECT COUNT(*) FROM emissions e
                 WHERE e.user_id = ?1
                   AND e.scheduled_at > ?2
                   AND e.scheduled_at <= ?3
                   AND (e.valid_until >= ?3
                        OR EXISTS (SELECT 1 FROM feedback f
                                   WHERE f.intervention_id = e.id))",
                params![user_id, window_start, now_text],
                |row| row.get::<_, u32>(0),
            )
            .map_err(|e| StoreError::Query(e.to_string()))
    }
}
