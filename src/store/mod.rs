pub mod key;
pub mod props;
pub mod query;

use std::cmp::Ordering;
use std::path::Path;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use key::Key;
use props::Properties;
use query::Query;

pub type DbPool = Pool<SqliteConnectionManager>;

const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial",
    include_str!("../../migrations/001_initial.sql"),
)];

pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let manager = SqliteConnectionManager::file(db_path);
    let pool = Pool::builder().max_size(8).build(manager)?;

    // Configure SQLite for performance
    let conn = pool.get()?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    // Create migrations tracking table
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }
    }

    tracing::info!("Entity store migrations complete");
    Ok(())
}

/// The document-store contract the rest of the crate programs against.
/// Nothing above this trait may assume SQL, joins, or transactions.
///
/// `query` materializes its results before returning, so draining the
/// sequence holds no store lock; re-issue the query to restart it. None of
/// these operations take exclusive locks: read-modify-write sequences are
/// last-writer-wins, and callers that stack them (see the gateway's
/// denormalized-list updates) accept that races can lose updates.
pub trait Datastore: Send + Sync {
    /// Fetch a record by key.
    fn get(&self, key: &Key) -> StoreResult<Option<Properties>>;

    /// Full-record upsert: overwrites every field of an existing record, or
    /// creates it.
    fn put(&self, key: &Key, props: &Properties) -> StoreResult<()>;

    /// Partial write onto an existing record only. Fails NotFound when the
    /// key does not exist. Implemented as read-merge-write; concurrent
    /// writers may interleave.
    fn update(&self, key: &Key, patch: &Properties) -> StoreResult<()>;

    /// Idempotent delete; returns whether the record existed.
    fn delete(&self, key: &Key) -> StoreResult<bool>;

    /// Query one kind, optionally scoped to an ancestor, with equality
    /// filters and a single-field sort.
    fn query(&self, q: &Query) -> StoreResult<Vec<(Key, Properties)>>;
}

/// SQLite implementation: one `entities` table of JSON property documents,
/// addressed by key path.
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Convenience for the common open-and-migrate startup path.
    pub fn open(db_path: &Path) -> anyhow::Result<Self> {
        let pool = create_pool(db_path)?;
        run_migrations(&pool)?;
        Ok(Self::new(pool))
    }
}

impl Datastore for SqliteStore {
    fn get(&self, key: &Key) -> StoreResult<Option<Properties>> {
        let conn = self.pool.get()?;

        let result: Result<String, rusqlite::Error> = conn.query_row(
            "SELECT props FROM entities WHERE key_path = ?1",
            params![key.path()],
            |row| row.get(0),
        );

        match result {
            Ok(json) => {
                let props: Properties = serde_json::from_str(&json)?;
                tracing::info!("retrieved entity {}", key);
                Ok(Some(props))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &Key, props: &Properties) -> StoreResult<()> {
        let conn = self.pool.get()?;
        let json = serde_json::to_string(props)?;

        conn.execute(
            "INSERT INTO entities (key_path, kind, parent_path, props, updated_at)
             VALUES (?1, ?2, ?3, ?4, datetime('now'))
             ON CONFLICT(key_path) DO UPDATE SET
               kind = excluded.kind,
               parent_path = excluded.parent_path,
               props = excluded.props,
               updated_at = excluded.updated_at",
            params![key.path(), key.kind().as_str(), key.parent_path(), json],
        )?;

        tracing::info!("stored entity {}", key);
        Ok(())
    }

    fn update(&self, key: &Key, patch: &Properties) -> StoreResult<()> {
        let mut props = self.get(key)?.ok_or_else(|| StoreError::not_found(key))?;
        for (field, value) in patch {
            props.insert(field.clone(), value.clone());
        }
        self.put(key, &props)
    }

    fn delete(&self, key: &Key) -> StoreResult<bool> {
        let conn = self.pool.get()?;

        let rows = conn.execute(
            "DELETE FROM entities WHERE key_path = ?1",
            params![key.path()],
        )?;

        Ok(rows > 0)
    }

    fn query(&self, q: &Query) -> StoreResult<Vec<(Key, Properties)>> {
        let conn = self.pool.get()?;

        let mut raw: Vec<(String, String)> = Vec::new();
        match &q.ancestor {
            Some(parent) => {
                let mut stmt = conn.prepare(
                    "SELECT key_path, props FROM entities
                     WHERE kind = ?1 AND parent_path = ?2",
                )?;
                let mapped = stmt.query_map(params![q.kind.as_str(), parent.path()], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?;
                for item in mapped {
                    raw.push(item?);
                }
            }
            None => {
                let mut stmt =
                    conn.prepare("SELECT key_path, props FROM entities WHERE kind = ?1")?;
                let mapped = stmt.query_map(params![q.kind.as_str()], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?;
                for item in mapped {
                    raw.push(item?);
                }
            }
        }

        let mut rows: Vec<(Key, Properties)> = Vec::with_capacity(raw.len());
        for (path, json) in raw {
            let key = Key::parse(&path)?;
            let props: Properties = serde_json::from_str(&json)?;
            rows.push((key, props));
        }

        rows.retain(|(_, props)| {
            q.filters
                .iter()
                .all(|(field, value)| props.get(field) == Some(value))
        });

        if let Some(order) = &q.order {
            let (field, descending) = match order.strip_prefix('-') {
                Some(stripped) => (stripped, true),
                None => (order.as_str(), false),
            };
            rows.sort_by(|a, b| {
                let va = a.1.get(field).unwrap_or(&Value::Null);
                let vb = b.1.get(field).unwrap_or(&Value::Null);
                let ord = cmp_values(va, vb);
                if descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }

        tracing::info!("query {} matched {} entities", q.kind.as_str(), rows.len());
        Ok(rows)
    }
}

// Property values have no schema, so ordering is defined across types:
// null < bool < number < string < array < object, with natural ordering
// inside each type. Records lacking the order field sort as null.
fn cmp_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

#[cfg(test)]
pub(crate) fn test_store() -> SqliteStore {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder().max_size(1).build(manager).unwrap();
    run_migrations(&pool).unwrap();
    SqliteStore::new(pool)
}

#[cfg(test)]
mod tests {
    use super::key::Kind;
    use super::*;
    use serde_json::json;

    fn props_of(pairs: &[(&str, Value)]) -> Properties {
        let mut props = Properties::new();
        for (field, value) in pairs {
            props.insert(field.to_string(), value.clone());
        }
        props
    }

    #[test]
    fn create_pool_creates_db_file() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("sub/dir/test.db");
        let pool = create_pool(&db_path).unwrap();
        assert!(db_path.exists());
        let conn = pool.get().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn migrations_are_idempotent() {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).unwrap();
        run_migrations(&pool).unwrap();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn get_missing_key_is_none() {
        let store = test_store();
        let key = Key::new(Kind::User, "nobody");
        assert!(store.get(&key).unwrap().is_none());
    }

    #[test]
    fn put_then_get_round_trips() {
        let store = test_store();
        let key = Key::new(Kind::User, "alice");
        let props = props_of(&[("username", json!("alice")), ("grad_year", json!(2026))]);
        store.put(&key, &props).unwrap();
        assert_eq!(store.get(&key).unwrap(), Some(props));
    }

    #[test]
    fn put_is_an_upsert_that_overwrites_all_fields() {
        let store = test_store();
        let key = Key::new(Kind::User, "alice");
        store
            .put(&key, &props_of(&[("bio", json!("old")), ("school", json!("SCI"))]))
            .unwrap();
        store.put(&key, &props_of(&[("bio", json!("new"))])).unwrap();

        let props = store.get(&key).unwrap().unwrap();
        assert_eq!(props.get("bio"), Some(&json!("new")));
        // Full overwrite: the field absent from the second put is gone.
        assert!(props.get("school").is_none());
    }

    #[test]
    fn update_patches_only_named_fields() {
        let store = test_store();
        let key = Key::new(Kind::User, "alice");
        store
            .put(&key, &props_of(&[("bio", json!("old")), ("school", json!("SCI"))]))
            .unwrap();
        store
            .update(&key, &props_of(&[("bio", json!("new"))]))
            .unwrap();

        let props = store.get(&key).unwrap().unwrap();
        assert_eq!(props.get("bio"), Some(&json!("new")));
        assert_eq!(props.get("school"), Some(&json!("SCI")));
    }

    #[test]
    fn update_missing_record_is_not_found() {
        let store = test_store();
        let key = Key::new(Kind::User, "ghost");
        let err = store
            .update(&key, &props_of(&[("bio", json!("x"))]))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn delete_is_idempotent() {
        let store = test_store();
        let key = Key::new(Kind::Post, "p1");
        store.put(&key, &props_of(&[("title", json!("t"))])).unwrap();

        assert!(store.delete(&key).unwrap());
        assert!(!store.delete(&key).unwrap());
        assert!(store.get(&key).unwrap().is_none());
    }

    #[test]
    fn query_filters_by_kind() {
        let store = test_store();
        store
            .put(
                &Key::new(Kind::User, "alice"),
                &props_of(&[("username", json!("alice"))]),
            )
            .unwrap();
        store
            .put(
                &Key::new(Kind::Post, "p1"),
                &props_of(&[("title", json!("desk"))]),
            )
            .unwrap();

        let rows = store.query(&Query::kind(Kind::Post)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, Key::new(Kind::Post, "p1"));
    }

    #[test]
    fn query_equality_filters_match_exactly() {
        let store = test_store();
        for (id, owner) in [("p1", "alice"), ("p2", "bob"), ("p3", "alice")] {
            store
                .put(
                    &Key::new(Kind::Post, id),
                    &props_of(&[("username", json!(owner))]),
                )
                .unwrap();
        }

        let rows = store
            .query(&Query::kind(Kind::Post).filter("username", "alice"))
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn query_orders_ascending_and_descending() {
        let store = test_store();
        for (id, created) in [("p1", "2026-01-02"), ("p2", "2026-01-01"), ("p3", "2026-01-03")] {
            store
                .put(
                    &Key::new(Kind::Post, id),
                    &props_of(&[("created", json!(created))]),
                )
                .unwrap();
        }

        let ascending = store
            .query(&Query::kind(Kind::Post).order("created"))
            .unwrap();
        let ids: Vec<&str> = ascending.iter().map(|(k, _)| k.id()).collect();
        assert_eq!(ids, vec!["p2", "p1", "p3"]);

        let descending = store
            .query(&Query::kind(Kind::Post).order("-created"))
            .unwrap();
        let ids: Vec<&str> = descending.iter().map(|(k, _)| k.id()).collect();
        assert_eq!(ids, vec!["p3", "p1", "p2"]);
    }

    #[test]
    fn ancestor_scoping_never_leaks_siblings() {
        let store = test_store();
        let lesson_a = Key::child(Kind::Course, "A", Kind::Lesson, "1");
        let lesson_b = Key::child(Kind::Course, "B", Kind::Lesson, "1");
        store
            .put(&lesson_a, &props_of(&[("title", json!("under A"))]))
            .unwrap();
        store
            .put(&lesson_b, &props_of(&[("title", json!("under B"))]))
            .unwrap();

        let rows = store
            .query(&Query::kind(Kind::Lesson).ancestor(Key::new(Kind::Course, "A")))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1.get("title"), Some(&json!("under A")));
    }

    #[test]
    fn missing_order_field_sorts_first_ascending() {
        let store = test_store();
        store
            .put(
                &Key::new(Kind::Post, "dated"),
                &props_of(&[("created", json!("2026-01-01"))]),
            )
            .unwrap();
        store
            .put(&Key::new(Kind::Post, "undated"), &props_of(&[]))
            .unwrap();

        let rows = store
            .query(&Query::kind(Kind::Post).order("created"))
            .unwrap();
        assert_eq!(rows[0].0.id(), "undated");
    }
}
