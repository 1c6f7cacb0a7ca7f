//! Remediation Event Store
//!
//! Append-only audit log of remediation attempts. Reads return the most
//! recent events first. The file and Postgres backends keep every event;
//! the memory backend is a bounded window for tests and dry runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::collections::VecDeque;
use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{EventStoreBackend, EventStoreConfig};
use crate::domain::RemediationEvent;
use crate::error::{Result, VigilError};

/// Durable, append-only record of remediation events
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn append(&self, event: &RemediationEvent) -> Result<()>;

    /// Page through events, most recent first
    async fn recent(&self, limit: usize, offset: usize) -> Result<Vec<RemediationEvent>>;
}

/// In-process store, bounded to the newest `capacity` events.
///
/// Unlike the durable backends this one forgets: once full, each append
/// evicts the oldest event. Use the file or Postgres backend when the
/// history must be complete.
pub struct MemoryEventStore {
    events: RwLock<VecDeque<RemediationEvent>>,
    capacity: usize,
}

impl MemoryEventStore {
    pub const DEFAULT_CAPACITY: usize = 10_000;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn append(&self, event: &RemediationEvent) -> Result<()> {
        let mut events = self.events.write().await;
        if events.len() == self.capacity {
            if let Some(evicted) = events.pop_front() {
                debug!("Memory event store full, evicting event {}", evicted.id);
            }
        }
        events.push_back(event.clone());
        Ok(())
    }

    async fn recent(&self, limit: usize, offset: usize) -> Result<Vec<RemediationEvent>> {
        Ok(self
            .events
            .read()
            .await
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Bytes read per step when scanning the log backwards
const READ_CHUNK: u64 = 64 * 1024;

/// One JSON object per line, appended to a local file
pub struct JsonlEventStore {
    path: PathBuf,
    write_lock: Mutex<()>,
    read_chunk: u64,
}

impl JsonlEventStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            read_chunk: READ_CHUNK,
        }
    }

    #[cfg(test)]
    fn with_read_chunk(mut self, read_chunk: u64) -> Self {
        self.read_chunk = read_chunk.max(1);
        self
    }

    /// Parse one line into `out`; blank lines are ignored, bad ones logged
    fn push_line(&self, line: &[u8], out: &mut Vec<RemediationEvent>) {
        if line.iter().all(u8::is_ascii_whitespace) {
            return;
        }
        match serde_json::from_slice::<RemediationEvent>(line) {
            Ok(event) => out.push(event),
            Err(e) => warn!("Skipping malformed event in {}: {}", self.path.display(), e),
        }
    }
}

#[async_trait]
impl EventStore for JsonlEventStore {
    async fn append(&self, event: &RemediationEvent) -> Result<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        debug!("Appended remediation event {} to {}", event.id, self.path.display());
        Ok(())
    }

    /// Scans the file from the end and stops once `offset + limit`
    /// events have been parsed, so paging the newest events stays cheap
    /// however long the log grows.
    async fn recent(&self, limit: usize, offset: usize) -> Result<Vec<RemediationEvent>> {
        let wanted = offset.saturating_add(limit);
        if limit == 0 {
            return Ok(Vec::new());
        }

        // Appends hold this lock, so the tail is never half-written
        let _guard = self.write_lock.lock().await;
        let mut file = match tokio::fs::File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut pos = file.metadata().await?.len();
        // Head of a line whose start lies before `pos`
        let mut carry: Vec<u8> = Vec::new();
        let mut newest_first = Vec::new();

        while pos > 0 && newest_first.len() < wanted {
            let start = pos.saturating_sub(self.read_chunk);
            let mut chunk = vec![0u8; (pos - start) as usize];
            file.seek(SeekFrom::Start(start)).await?;
            file.read_exact(&mut chunk).await?;
            chunk.extend_from_slice(&carry);
            pos = start;

            let complete = if pos == 0 {
                &chunk[..]
            } else {
                match chunk.iter().position(|b| *b == b'\n') {
                    Some(i) => {
                        carry = chunk[..i].to_vec();
                        &chunk[i + 1..]
                    }
                    None => {
                        carry = chunk;
                        continue;
                    }
                }
            };

            for line in complete.split(|b| *b == b'\n').rev() {
                self.push_line(line, &mut newest_first);
                if newest_first.len() >= wanted {
                    break;
                }
            }
        }

        Ok(newest_first.into_iter().skip(offset).take(limit).collect())
    }
}

/// PostgreSQL-backed store
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        info!("Connected to event database");
        Ok(Self::new(pool))
    }

    /// Create the events table if it does not exist
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS remediation_events (
                id UUID PRIMARY KEY,
                dependency TEXT NOT NULL,
                issue TEXT NOT NULL,
                action TEXT NOT NULL,
                success BOOLEAN NOT NULL,
                details JSONB NOT NULL DEFAULT '{}'::jsonb,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_remediation_events_created_at
            ON remediation_events (created_at DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// `LIMIT`/`OFFSET` value; anything past `i64::MAX` clamps instead of wrapping
fn sql_bound(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn parse_label<T: serde::de::DeserializeOwned>(label: String) -> Result<T> {
    Ok(serde_json::from_value(serde_json::Value::String(label))?)
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn append(&self, event: &RemediationEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO remediation_events (
                id, dependency, issue, action, success, details, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(event.id)
        .bind(&event.dependency)
        .bind(event.issue.as_str())
        .bind(event.action.as_str())
        .bind(event.success)
        .bind(serde_json::Value::Object(event.details.clone()))
        .bind(event.timestamp)
        .execute(&self.pool)
        .await?;

        debug!("Appended remediation event {} for {}", event.id, event.dependency);
        Ok(())
    }

    async fn recent(&self, limit: usize, offset: usize) -> Result<Vec<RemediationEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, dependency, issue, action, success, details, created_at
            FROM remediation_events
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(sql_bound(limit))
        .bind(sql_bound(offset))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let details = match row.get::<serde_json::Value, _>("details") {
                    serde_json::Value::Object(map) => map,
                    _ => serde_json::Map::new(),
                };
                Ok(RemediationEvent {
                    id: row.get::<Uuid, _>("id"),
                    dependency: row.get("dependency"),
                    issue: parse_label(row.get("issue"))?,
                    action: parse_label(row.get("action"))?,
                    success: row.get("success"),
                    timestamp: row.get::<DateTime<Utc>, _>("created_at"),
                    details,
                })
            })
            .collect()
    }
}

/// Open the store selected by configuration
pub async fn build_event_store(config: &EventStoreConfig) -> Result<Arc<dyn EventStore>> {
    match config.backend {
        EventStoreBackend::Memory => Ok(Arc::new(MemoryEventStore::new())),
        EventStoreBackend::File => {
            info!("Recording remediation events to {}", config.path);
            Ok(Arc::new(JsonlEventStore::new(&config.path)))
        }
        EventStoreBackend::Postgres => {
            let url = config.database_url.as_deref().ok_or_else(|| {
                VigilError::InvalidConfig(vec!["event_store.database_url is required".into()])
            })?;
            let store = PgEventStore::connect(url, config.max_connections).await?;
            store.ensure_schema().await?;
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IssueType, RemediationAction};

    fn event(dependency: &str, success: bool) -> RemediationEvent {
        let mut details = serde_json::Map::new();
        details.insert("latency_ms".into(), serde_json::json!(12));
        RemediationEvent::new(
            dependency,
            IssueType::ServiceUnhealthy,
            RemediationAction::Restart,
            success,
            details,
        )
    }

    #[tokio::test]
    async fn test_memory_store_recent_first_with_paging() {
        let store = MemoryEventStore::new();
        for name in ["a", "b", "c", "d"] {
            store.append(&event(name, true)).await.unwrap();
        }

        let page: Vec<_> = store
            .recent(2, 0)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.dependency)
            .collect();
        assert_eq!(page, vec!["d", "c"]);

        let page: Vec<_> = store
            .recent(10, 3)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.dependency)
            .collect();
        assert_eq!(page, vec!["a"]);
    }

    #[tokio::test]
    async fn test_memory_store_is_bounded() {
        let store = MemoryEventStore::with_capacity(2);
        for name in ["a", "b", "c"] {
            store.append(&event(name, false)).await.unwrap();
        }
        assert_eq!(store.len().await, 2);
        assert_eq!(store.recent(10, 0).await.unwrap()[1].dependency, "b");
    }

    #[tokio::test]
    async fn test_jsonl_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("events.jsonl");

        let first = event("cache-service", true);
        let second = event("llm-service", false);
        {
            let store = JsonlEventStore::new(&path);
            store.append(&first).await.unwrap();
            store.append(&second).await.unwrap();
        }

        let reopened = JsonlEventStore::new(&path);
        let events = reopened.recent(10, 0).await.unwrap();
        assert_eq!(events, vec![second, first]);
    }

    #[tokio::test]
    async fn test_jsonl_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlEventStore::new(dir.path().join("none.jsonl"));
        assert!(store.recent(10, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_jsonl_store_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let store = JsonlEventStore::new(&path);
        store.append(&event("a", true)).await.unwrap();
        tokio::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .unwrap()
            .write_all(b"{not json\n")
            .await
            .unwrap();
        store.append(&event("b", true)).await.unwrap();

        let events = store.recent(10, 0).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].dependency, "b");
    }

    #[tokio::test]
    async fn test_jsonl_store_pages_across_read_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        // Chunks far smaller than a line force lines to span many reads
        let store = JsonlEventStore::new(&path).with_read_chunk(7);
        let names: Vec<String> = (0..25).map(|i| format!("svc-{i:02}")).collect();
        for name in &names {
            store.append(&event(name, true)).await.unwrap();
        }

        let page: Vec<_> = store
            .recent(3, 0)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.dependency)
            .collect();
        assert_eq!(page, vec!["svc-24", "svc-23", "svc-22"]);

        let page: Vec<_> = store
            .recent(4, 20)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.dependency)
            .collect();
        assert_eq!(page, vec!["svc-04", "svc-03", "svc-02", "svc-01"]);

        assert_eq!(store.recent(100, 0).await.unwrap().len(), 25);
        assert!(store.recent(0, 0).await.unwrap().is_empty());
        assert!(store.recent(10, 25).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_jsonl_store_stops_before_old_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        // A file without a trailing newline and a corrupt head
        let mut content = b"{corrupt head\n".to_vec();
        for name in ["a", "b"] {
            content.extend(serde_json::to_vec(&event(name, true)).unwrap());
            content.push(b'\n');
        }
        content.extend(serde_json::to_vec(&event("c", true)).unwrap());
        tokio::fs::write(&path, &content).await.unwrap();

        let store = JsonlEventStore::new(&path).with_read_chunk(16);
        let page: Vec<_> = store
            .recent(2, 0)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.dependency)
            .collect();
        assert_eq!(page, vec!["c", "b"]);
        assert_eq!(store.recent(10, 0).await.unwrap().len(), 3);
    }

    #[test]
    fn test_sql_bound_clamps_huge_values() {
        assert_eq!(sql_bound(50), 50);
        assert_eq!(sql_bound(usize::MAX), i64::MAX);
    }

    #[test]
    fn test_parse_label() {
        let action: RemediationAction = parse_label("clear_cache".to_string()).unwrap();
        assert_eq!(action, RemediationAction::ClearCache);
        let issue: IssueType = parse_label(IssueType::CircuitOpen.as_str().to_string()).unwrap();
        assert_eq!(issue, IssueType::CircuitOpen);
    }
}
