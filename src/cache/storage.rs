//! SQLite implementation of the response cache.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::traits::{CacheEntry, CacheStorage, CachedResponse};
use crate::http::{RequestKey, Response};

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the database at `path`, or at the default location when `None`.
  pub fn open(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Open a private in-memory database.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("liftlegends").join("cache.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    self
      .conn()?
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;
    Ok(())
  }

  fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_stores (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS cache_entries (
    store_name TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    status_text TEXT NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    response_type TEXT NOT NULL,
    response_url TEXT,
    digest TEXT NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (store_name, method, url)
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_store ON cache_entries(store_name);

CREATE TABLE IF NOT EXISTS cache_activations (
    store_name TEXT PRIMARY KEY,
    activated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl CacheStorage for SqliteStorage {
  fn open_store(&self, name: &str) -> Result<()> {
    self
      .conn()?
      .execute(
        "INSERT OR IGNORE INTO cache_stores (name) VALUES (?)",
        params![name],
      )
      .map_err(|e| eyre!("Failed to open store {}: {}", name, e))?;
    Ok(())
  }

  fn store_names(&self) -> Result<Vec<String>> {
    let conn = self.conn()?;
    let mut stmt = conn
      .prepare("SELECT name FROM cache_stores ORDER BY rowid")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list stores: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read store name: {}", e))?;

    Ok(names)
  }

  fn delete_store(&self, name: &str) -> Result<bool> {
    let mut conn = self.conn()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "DELETE FROM cache_entries WHERE store_name = ?",
      params![name],
    )
    .map_err(|e| eyre!("Failed to delete entries of {}: {}", name, e))?;
    tx.execute(
      "DELETE FROM cache_activations WHERE store_name = ?",
      params![name],
    )
    .map_err(|e| eyre!("Failed to clear activation of {}: {}", name, e))?;
    let removed = tx
      .execute("DELETE FROM cache_stores WHERE name = ?", params![name])
      .map_err(|e| eyre!("Failed to delete store {}: {}", name, e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(removed > 0)
  }

  fn match_entry(&self, store: &str, key: &RequestKey) -> Result<Option<CachedResponse>> {
    let conn = self.conn()?;
    let mut stmt = conn
      .prepare(
        "SELECT status, status_text, headers, body, response_type, response_url, digest, cached_at
         FROM cache_entries
         WHERE store_name = ? AND method = ? AND url = ?",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let row = stmt
      .query_row(params![store, key.method.as_str(), key.url], |row| {
        Ok(RawEntry {
          status: row.get(0)?,
          status_text: row.get(1)?,
          headers: row.get(2)?,
          body: row.get(3)?,
          response_type: row.get(4)?,
          response_url: row.get(5)?,
          digest: row.get(6)?,
          cached_at: row.get(7)?,
        })
      })
      .optional()
      .map_err(|e| eyre!("Failed to look up {}: {}", key, e))?;

    row.map(RawEntry::into_cached).transpose()
  }

  fn put_entry(&self, store: &str, key: &RequestKey, response: &Response) -> Result<()> {
    let conn = self.conn()?;
    insert_entry(&conn, store, key, response)
  }

  fn put_entries(&self, store: &str, entries: &[(RequestKey, Response)]) -> Result<()> {
    let mut conn = self.conn()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    for (key, response) in entries {
      insert_entry(&tx, store, key, response)?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;
    Ok(())
  }

  fn mark_activated(&self, name: &str) -> Result<()> {
    self
      .conn()?
      .execute(
        "INSERT OR REPLACE INTO cache_activations (store_name, activated_at)
         SELECT name, datetime('now') FROM cache_stores WHERE name = ?",
        params![name],
      )
      .map_err(|e| eyre!("Failed to mark {} activated: {}", name, e))?;
    Ok(())
  }

  fn is_activated(&self, name: &str) -> Result<bool> {
    let found = self
      .conn()?
      .query_row(
        "SELECT 1 FROM cache_activations WHERE store_name = ?",
        params![name],
        |_| Ok(()),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read activation of {}: {}", name, e))?;
    Ok(found.is_some())
  }

  fn entries(&self, store: &str) -> Result<Vec<CacheEntry>> {
    let conn = self.conn()?;
    let mut stmt = conn
      .prepare(
        "SELECT method, url, status, length(body), digest, cached_at
         FROM cache_entries
         WHERE store_name = ?
         ORDER BY url, method",
      )
      .map_err(|e| eyre!("Failed to prepare entry query: {}", e))?;

    let rows = stmt
      .query_map(params![store], |row| {
        Ok((
          row.get::<_, String>(0)?,
          row.get::<_, String>(1)?,
          row.get::<_, u16>(2)?,
          row.get::<_, i64>(3)?,
          row.get::<_, String>(4)?,
          row.get::<_, String>(5)?,
        ))
      })
      .map_err(|e| eyre!("Failed to query entries: {}", e))?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(|e| eyre!("Failed to read entry: {}", e))?;

    rows
      .into_iter()
      .map(|(method, url, status, size, digest, cached_at)| -> Result<CacheEntry> {
        Ok(CacheEntry {
          key: RequestKey {
            method: method.parse()?,
            url,
          },
          status,
          size: usize::try_from(size).unwrap_or_default(),
          digest,
          cached_at: parse_datetime(&cached_at)?,
        })
      })
      .collect()
  }
}

/// Write one entry, creating its store if needed. `conn` may be a transaction.
fn insert_entry(
  conn: &Connection,
  store: &str,
  key: &RequestKey,
  response: &Response,
) -> Result<()> {
  let headers = serde_json::to_string(&response.headers)
    .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;
  let digest = body_digest(&response.body);

  conn
    .execute(
      "INSERT OR IGNORE INTO cache_stores (name) VALUES (?)",
      params![store],
    )
    .map_err(|e| eyre!("Failed to open store {}: {}", store, e))?;
  conn
    .execute(
      "INSERT OR REPLACE INTO cache_entries
       (store_name, method, url, status, status_text, headers, body, response_type, response_url, digest, cached_at)
       VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))",
      params![
        store,
        key.method.as_str(),
        key.url,
        response.status,
        response.status_text,
        headers,
        response.body,
        response.kind.as_str(),
        response.url,
        digest,
      ],
    )
    .map_err(|e| eyre!("Failed to store {}: {}", key, e))?;

  Ok(())
}

struct RawEntry {
  status: u16,
  status_text: String,
  headers: String,
  body: Vec<u8>,
  response_type: String,
  response_url: Option<String>,
  digest: String,
  cached_at: String,
}

impl RawEntry {
  fn into_cached(self) -> Result<CachedResponse> {
    let headers = serde_json::from_str(&self.headers)
      .map_err(|e| eyre!("Failed to deserialize headers: {}", e))?;

    Ok(CachedResponse {
      response: Response {
        status: self.status,
        status_text: self.status_text,
        headers,
        body: self.body,
        kind: self.response_type.parse()?,
        url: self.response_url,
      },
      cached_at: parse_datetime(&self.cached_at)?,
      digest: self.digest,
    })
  }
}

/// Hex-encoded SHA-256 of a response body.
pub fn body_digest(body: &[u8]) -> String {
  hex::encode(Sha256::digest(body))
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::http::{Method, ResponseType};
  use url::Url;

  fn key(url: &str) -> RequestKey {
    RequestKey::new(Method::Get, &Url::parse(url).unwrap())
  }

  fn response(body: &str) -> Response {
    Response {
      status: 200,
      status_text: "OK".to_string(),
      headers: vec![("content-type".to_string(), "text/css".to_string())],
      body: body.as_bytes().to_vec(),
      kind: ResponseType::Basic,
      url: Some("https://liftlegends.com/app.css".to_string()),
    }
  }

  #[test]
  fn test_put_then_match_roundtrips_response() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let k = key("https://liftlegends.com/app.css");
    storage.put_entry("v2", &k, &response("body{}")).unwrap();

    let cached = storage.match_entry("v2", &k).unwrap().unwrap();
    assert_eq!(cached.response, response("body{}"));
    assert_eq!(cached.digest, body_digest(b"body{}"));
  }

  #[test]
  fn test_match_is_scoped_to_store() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let k = key("https://liftlegends.com/app.css");
    storage.put_entry("v1", &k, &response("old")).unwrap();

    assert!(storage.match_entry("v2", &k).unwrap().is_none());
  }

  #[test]
  fn test_last_write_wins() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let k = key("https://liftlegends.com/app.css");
    storage.put_entry("v2", &k, &response("first")).unwrap();
    storage.put_entry("v2", &k, &response("second")).unwrap();

    let cached = storage.match_entry("v2", &k).unwrap().unwrap();
    assert_eq!(cached.response.body, b"second");
    assert_eq!(storage.entries("v2").unwrap().len(), 1);
  }

  #[test]
  fn test_store_names_in_creation_order() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.open_store("liftlegends-cache-v1").unwrap();
    storage.open_store("liftlegends-cache-v2").unwrap();
    storage.open_store("liftlegends-cache-v1").unwrap();

    assert_eq!(
      storage.store_names().unwrap(),
      vec!["liftlegends-cache-v1", "liftlegends-cache-v2"]
    );
  }

  #[test]
  fn test_delete_store_removes_entries() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let k = key("https://liftlegends.com/app.css");
    storage.put_entry("v1", &k, &response("old")).unwrap();

    assert!(storage.delete_store("v1").unwrap());
    assert!(!storage.delete_store("v1").unwrap());
    assert!(storage.store_names().unwrap().is_empty());
    assert!(storage.match_entry("v1", &k).unwrap().is_none());
  }

  #[test]
  fn test_entries_report_size_and_status() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage
      .put_entry("v2", &key("https://liftlegends.com/b"), &response("12345"))
      .unwrap();
    storage
      .put_entry("v2", &key("https://liftlegends.com/a"), &response("1"))
      .unwrap();

    let entries = storage.entries("v2").unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].key.url, "https://liftlegends.com/a");
    assert_eq!(entries[0].size, 1);
    assert_eq!(entries[1].size, 5);
    assert_eq!(entries[1].status, 200);
  }

  #[test]
  fn test_put_entries_is_all_or_nothing() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage
      .conn()
      .unwrap()
      .execute_batch(
        "CREATE TRIGGER reject_download BEFORE INSERT ON cache_entries
         WHEN NEW.url LIKE '%/download'
         BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
      )
      .unwrap();

    let batch = vec![
      (key("https://liftlegends.com/"), response("shell")),
      (key("https://liftlegends.com/download"), response("apps")),
    ];
    assert!(storage.put_entries("v2", &batch).is_err());
    assert!(storage.entries("v2").unwrap().is_empty());

    storage.put_entries("v2", &batch[..1]).unwrap();
    assert_eq!(storage.entries("v2").unwrap().len(), 1);
  }

  #[test]
  fn test_activation_marker() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.mark_activated("v2").unwrap();
    assert!(!storage.is_activated("v2").unwrap());

    storage.open_store("v2").unwrap();
    assert!(!storage.is_activated("v2").unwrap());
    storage.mark_activated("v2").unwrap();
    assert!(storage.is_activated("v2").unwrap());

    storage.delete_store("v2").unwrap();
    storage.open_store("v2").unwrap();
    assert!(!storage.is_activated("v2").unwrap());
  }
}
