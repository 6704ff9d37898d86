use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{AuditError, AuditEvent, AuditFilter, AuditRecord, AuditStore};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS audit_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL,
        event_type TEXT NOT NULL,
        item_key TEXT,
        run_id TEXT,
        data TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_audit_events_timestamp ON audit_events(timestamp);
    CREATE INDEX IF NOT EXISTS idx_audit_events_item_key ON audit_events(item_key);
    CREATE INDEX IF NOT EXISTS idx_audit_events_event_type ON audit_events(event_type);
    CREATE INDEX IF NOT EXISTS idx_audit_events_run_id ON audit_events(run_id);
"#;

/// SQLite-backed audit store
pub struct SqliteAuditStore {
    conn: Mutex<Connection>,
}

impl SqliteAuditStore {
    /// Open (or create) the database file and ensure the schema exists
    pub fn new(path: &Path) -> Result<Self, AuditError> {
        let conn = Connection::open(path).map_err(|e| AuditError::Database(e.to_string()))?;
        Self::init(conn)
    }

    /// In-memory store for tests
    pub fn in_memory() -> Result<Self, AuditError> {
        let conn = Connection::open_in_memory().map_err(|e| AuditError::Database(e.to_string()))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, AuditError> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| AuditError::Database(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, AuditError> {
        self.conn
            .lock()
            .map_err(|_| AuditError::Database("connection lock poisoned".to_string()))
    }

    fn build_where_clause(filter: &AuditFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref item_key) = filter.item_key {
            conditions.push("item_key = ?");
            params.push(Box::new(item_key.clone()));
        }

        if let Some(ref run_id) = filter.run_id {
            conditions.push("run_id = ?");
            params.push(Box::new(run_id.clone()));
        }

        if let Some(ref event_type) = filter.event_type {
            conditions.push("event_type = ?");
            params.push(Box::new(event_type.clone()));
        }

        if let Some(ref from) = filter.from {
            conditions.push("timestamp >= ?");
            params.push(Box::new(from.to_rfc3339()));
        }

        if let Some(ref to) = filter.to {
            conditions.push("timestamp <= ?");
            params.push(Box::new(to.to_rfc3339()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }
}

impl AuditStore for SqliteAuditStore {
    fn insert(&self, record: &AuditRecord) -> Result<i64, AuditError> {
        let conn = self.lock()?;

        let data_json = serde_json::to_string(&record.data)
            .map_err(|e| AuditError::Serialization(e.to_string()))?;

        conn.execute(
            "INSERT INTO audit_events (timestamp, event_type, item_key, run_id, data) VALUES (?, ?, ?, ?, ?)",
            params![
                record.timestamp.to_rfc3339(),
                record.event_type,
                record.item_key,
                record.run_id,
                data_json,
            ],
        )
        .map_err(|e| AuditError::Database(e.to_string()))?;

        Ok(conn.last_insert_rowid())
    }

    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, AuditError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);

        // Insertion order is emission order; timestamps can tie within a run.
        let sql = format!(
            "SELECT id, timestamp, event_type, item_key, run_id, data FROM audit_events {} ORDER BY id ASC LIMIT ? OFFSET ?",
            where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AuditError::Database(e.to_string()))?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), |row| {
                let id: i64 = row.get(0)?;
                let timestamp_str: String = row.get(1)?;
                let event_type: String = row.get(2)?;
                let item_key: Option<String> = row.get(3)?;
                let run_id: Option<String> = row.get(4)?;
                let data_json: String = row.get(5)?;

                Ok((id, timestamp_str, event_type, item_key, run_id, data_json))
            })
            .map_err(|e| AuditError::Database(e.to_string()))?;

        let mut records = Vec::new();
        for row_result in rows {
            let (id, timestamp_str, event_type, item_key, run_id, data_json) =
                row_result.map_err(|e| AuditError::Database(e.to_string()))?;

            let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(&timestamp_str)
                .map_err(|e| AuditError::Database(format!("Invalid timestamp: {}", e)))?
                .into();

            let data: AuditEvent = serde_json::from_str(&data_json)
                .map_err(|e| AuditError::Serialization(e.to_string()))?;

            records.push(AuditRecord {
                id,
                timestamp,
                event_type,
                item_key,
                run_id,
                data,
            });
        }

        Ok(records)
    }

    fn count(&self, filter: &AuditFilter) -> Result<i64, AuditError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM audit_events {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| AuditError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn record_for(event: AuditEvent) -> AuditRecord {
        AuditRecord {
            id: 0,
            timestamp: Utc::now(),
            event_type: event.event_type().to_string(),
            item_key: event.item_key().map(String::from),
            run_id: event.run_id().map(String::from),
            data: event,
        }
    }

    fn run_started(run_id: &str) -> AuditRecord {
        record_for(AuditEvent::RunStarted {
            run_id: run_id.to_string(),
            item_count: 2,
            admission_limit: 1,
            delete_enabled: true,
            config_hash: Some("abc123".to_string()),
        })
    }

    fn source_deleted(key: &str, location: &str) -> AuditRecord {
        record_for(AuditEvent::SourceDeleted {
            item_key: key.to_string(),
            location: location.to_string(),
        })
    }

    #[test]
    fn test_insert_and_query() {
        let store = SqliteAuditStore::in_memory().unwrap();

        let id = store.insert(&run_started("r-1")).unwrap();
        assert!(id > 0);

        let results = store.query(&AuditFilter::new()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, id);
        assert_eq!(results[0].event_type, "run_started");
        assert_eq!(results[0].run_id.as_deref(), Some("r-1"));
    }

    #[test]
    fn test_filter_by_item_key() {
        let store = SqliteAuditStore::in_memory().unwrap();
        store.insert(&source_deleted("a", "gs://b/a/pod5/")).unwrap();
        store.insert(&source_deleted("b", "gs://b/b/pod5/")).unwrap();
        store.insert(&source_deleted("a", "gs://b/a/fast5/")).unwrap();

        let filter = AuditFilter::new().with_item_key("a");
        let results = store.query(&filter).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.item_key.as_deref() == Some("a")));
        assert_eq!(store.count(&filter).unwrap(), 2);
    }

    #[test]
    fn test_results_in_insertion_order() {
        let store = SqliteAuditStore::in_memory().unwrap();
        store.insert(&run_started("r-1")).unwrap();
        store.insert(&source_deleted("a", "gs://b/a/pod5/")).unwrap();

        let results = store.query(&AuditFilter::new()).unwrap();
        assert_eq!(results[0].event_type, "run_started");
        assert_eq!(results[1].event_type, "source_deleted");
    }

    #[test]
    fn test_filter_by_event_type_and_run() {
        let store = SqliteAuditStore::in_memory().unwrap();
        store.insert(&run_started("r-1")).unwrap();
        store.insert(&run_started("r-2")).unwrap();
        store.insert(&source_deleted("a", "gs://b/a/pod5/")).unwrap();

        let filter = AuditFilter::new().with_event_type("run_started");
        assert_eq!(store.count(&filter).unwrap(), 2);

        let filter = AuditFilter::new().with_run_id("r-2");
        let results = store.query(&filter).unwrap();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0].data, AuditEvent::RunStarted { .. }));
    }

    #[test]
    fn test_time_range_and_limit() {
        let store = SqliteAuditStore::in_memory().unwrap();
        for i in 0..5 {
            store
                .insert(&source_deleted("a", &format!("gs://b/a/d{}/", i)))
                .unwrap();
        }

        let now = Utc::now();
        let filter = AuditFilter::new()
            .with_time_range(Some(now - Duration::hours(1)), Some(now + Duration::hours(1)))
            .with_limit(3);
        assert_eq!(store.query(&filter).unwrap().len(), 3);

        let future = AuditFilter::new().with_time_range(Some(now + Duration::hours(1)), None);
        assert_eq!(store.count(&future).unwrap(), 0);
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.db");

        {
            let store = SqliteAuditStore::new(&path).unwrap();
            store.insert(&run_started("r-1")).unwrap();
        }

        let reopened = SqliteAuditStore::new(&path).unwrap();
        assert_eq!(reopened.count(&AuditFilter::new()).unwrap(), 1);
    }
}
