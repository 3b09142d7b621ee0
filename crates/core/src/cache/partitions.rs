//! Partition and entry operations.
//!
//! A partition is a named key → response map. Entries are overwritten on
//! every store for the same key; deleting a partition cascades to its entries.

use super::connection::CacheDb;
use super::hash::{compute_cache_key, normalize_url};
use crate::response::HeaderList;
use crate::{Error, Response};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};
use url::Url;

/// Summary row for a partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PartitionInfo {
    pub name: String,
    pub entries: u64,
    pub created_at: String,
}

const ENSURE_PARTITION: &str = "INSERT INTO partitions (name, created_at) VALUES (?1, ?2)
                                ON CONFLICT(name) DO NOTHING";

impl CacheDb {
    /// Create the partition if it does not exist yet.
    pub async fn open_partition(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(ENSURE_PARTITION, params![name, now])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    pub async fn has_partition(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM partitions WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// All partition names, sorted.
    pub async fn list_partitions(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM partitions ORDER BY name")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, rusqlite::Error>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Partitions with their entry counts, sorted by name.
    pub async fn partition_summaries(&self) -> Result<Vec<PartitionInfo>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<PartitionInfo>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT p.name, p.created_at, COUNT(e.key_hash)
                     FROM partitions p LEFT JOIN entries e ON e.partition = p.name
                     GROUP BY p.name ORDER BY p.name",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(PartitionInfo {
                            name: row.get(0)?,
                            created_at: row.get(1)?,
                            entries: row.get::<_, i64>(2)? as u64,
                        })
                    })?
                    .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a partition and its entries. Returns whether it existed.
    pub async fn delete_partition(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM partitions WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every partition regardless of owner. Returns how many were removed.
    pub async fn clear_all(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let deleted = conn.execute("DELETE FROM partitions", [])?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Store a response under `(partition, method, response.url)`.
    ///
    /// Creates the partition if needed. Last write wins for the same key.
    pub async fn put_entry(&self, partition: &str, method: &str, response: &Response) -> Result<(), Error> {
        let partition = partition.to_string();
        let method = method.to_ascii_uppercase();
        let key_hash = compute_cache_key(&method, &response.url);
        let url = normalize_url(&response.url);
        let status = response.status as i64;
        let headers_json = response.headers_json()?;
        let body = response.duplicate().into_body().to_vec();
        let now = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(ENSURE_PARTITION, params![partition, now])?;
                tx.execute(
                    "INSERT INTO entries (partition, key_hash, method, url, status, headers_json, body, stored_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(partition, key_hash) DO UPDATE SET
                        method = excluded.method,
                        url = excluded.url,
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![partition, key_hash, method, url, status, headers_json, body, now],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the stored response for `(partition, method, url)`.
    pub async fn match_entry(&self, partition: &str, method: &str, url: &Url) -> Result<Option<Response>, Error> {
        let partition = partition.to_string();
        let key_hash = compute_cache_key(method, url);
        self.conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let row = conn
                    .query_row(
                        "SELECT url, status, headers_json, body FROM entries
                         WHERE partition = ?1 AND key_hash = ?2",
                        params![partition, key_hash],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, i64>(1)?,
                                row.get::<_, String>(2)?,
                                row.get::<_, Vec<u8>>(3)?,
                            ))
                        },
                    )
                    .optional()?;

                let Some((url, status, headers_json, body)) = row else {
                    return Ok(None);
                };

                let url = Url::parse(&url).map_err(|e| Error::CorruptEntry(format!("url {url}: {e}")))?;
                let status = u16::try_from(status).map_err(|_| Error::CorruptEntry(format!("status {status}")))?;
                let HeaderList(headers) =
                    serde_json::from_str(&headers_json).map_err(|e| Error::CorruptEntry(e.to_string()))?;

                Ok(Some(Response::new(url, status, headers, body)))
            })
            .await
            .map_err(Error::from)
    }

    /// Remove a single entry. Returns whether it existed.
    pub async fn delete_entry(&self, partition: &str, method: &str, url: &Url) -> Result<bool, Error> {
        let partition = partition.to_string();
        let key_hash = compute_cache_key(method, url);
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE partition = ?1 AND key_hash = ?2",
                    params![partition, key_hash],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn entry_count(&self, partition: &str) -> Result<u64, Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE partition = ?1", params![partition], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(path: &str, status: u16, body: &str) -> Response {
        Response::new(
            Url::parse("http://localhost:3000").unwrap().join(path).unwrap(),
            status,
            vec![("content-type".into(), "text/html".into())],
            body.to_string(),
        )
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let resp = response("/index.html", 200, "<html>home</html>");
        db.put_entry("stash-static-v1", "GET", &resp).await.unwrap();

        let found = db
            .match_entry("stash-static-v1", "GET", &resp.url)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, resp);
        assert!(db.has_partition("stash-static-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_match_is_partition_scoped() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let resp = response("/index.html", 200, "home");
        db.put_entry("stash-static-v1", "GET", &resp).await.unwrap();

        let other = db.match_entry("stash-dynamic-v1", "GET", &resp.url).await.unwrap();
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry("p", "GET", &response("/api/listings", 200, "old"))
            .await
            .unwrap();
        db.put_entry("p", "GET", &response("/api/listings", 200, "new"))
            .await
            .unwrap();

        let url = Url::parse("http://localhost:3000/api/listings").unwrap();
        let found = db.match_entry("p", "GET", &url).await.unwrap().unwrap();
        assert_eq!(found.text(), "new");
        assert_eq!(db.entry_count("p").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_partition_cascades() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry("stash-static-v0", "GET", &response("/", 200, "old home"))
            .await
            .unwrap();

        assert!(db.delete_partition("stash-static-v0").await.unwrap());
        assert!(!db.delete_partition("stash-static-v0").await.unwrap());
        assert_eq!(db.entry_count("stash-static-v0").await.unwrap(), 0);
        assert!(db.list_partitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_partition_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_partition("stash-api-v1").await.unwrap();
        db.open_partition("stash-api-v1").await.unwrap();
        assert_eq!(db.list_partitions().await.unwrap(), vec!["stash-api-v1".to_string()]);
    }

    #[tokio::test]
    async fn test_clear_all() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_partition("stash-api-v1").await.unwrap();
        db.open_partition("someone-else").await.unwrap();
        assert_eq!(db.clear_all().await.unwrap(), 2);
        assert!(db.list_partitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let resp = response("/api/users/1", 200, "{}");
        db.put_entry("p", "GET", &resp).await.unwrap();

        assert!(db.delete_entry("p", "GET", &resp.url).await.unwrap());
        assert!(db.match_entry("p", "GET", &resp.url).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_partition_summaries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_partition("a").await.unwrap();
        db.put_entry("b", "GET", &response("/x", 200, "x")).await.unwrap();
        db.put_entry("b", "GET", &response("/y", 200, "y")).await.unwrap();

        let summaries = db.partition_summaries().await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!((summaries[0].name.as_str(), summaries[0].entries), ("a", 0));
        assert_eq!((summaries[1].name.as_str(), summaries[1].entries), ("b", 2));
    }
}
