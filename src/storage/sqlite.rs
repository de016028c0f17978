use super::schema;
use super::{AlertPersistence, AlertRecord, GalleryStore, IdentityResolver, IdentitySummary};
use crate::error::StorageError;
use crate::recognition::{KnownFace, Signature};
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, info, warn};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// SQLite-backed gallery and alert store.
///
/// One connection is opened at startup and closed exactly once, either by
/// [`SqliteStore::close`] or on drop.
pub struct SqliteStore {
    path: String,
    conn: Mutex<Option<Connection>>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and ensure the schema
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Open {
                path: path_str.clone(),
                details: e.to_string(),
            })?;
        }

        let conn = Connection::open(path).map_err(|e| StorageError::Open {
            path: path_str.clone(),
            details: e.to_string(),
        })?;
        schema::configure(&conn)?;
        schema::ensure_schema(&conn)?;

        info!("Opened database {}", path_str);
        Ok(Self {
            path: path_str,
            conn: Mutex::new(Some(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        schema::configure(&conn)?;
        schema::ensure_schema(&conn)?;
        Ok(Self {
            path: ":memory:".to_string(),
            conn: Mutex::new(Some(conn)),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError>,
    {
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or(StorageError::Closed)?;
        f(conn)
    }

    /// Insert an identity, or return the existing key when the name is taken.
    /// A new description replaces the stored one.
    pub fn enroll_identity(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<i64, StorageError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO identities (name, description) VALUES (?1, ?2)
                 ON CONFLICT (name) DO UPDATE
                 SET description = COALESCE(excluded.description, identities.description)",
                params![name, description],
            )?;
            let id = conn.query_row(
                "SELECT id FROM identities WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )?;
            Ok(id)
        })
    }

    /// Attach one more signature to an enrolled identity
    pub fn add_signature(
        &self,
        identity_key: i64,
        source_image: Option<&str>,
        signature: &Signature,
    ) -> Result<i64, StorageError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO identity_signatures (identity_id, source_image, signature)
                 VALUES (?1, ?2, ?3)",
                params![identity_key, source_image, signature.to_bytes()],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Delete an identity; its signatures and alerts go with it
    pub fn delete_identity(&self, name: &str) -> Result<bool, StorageError> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM identities WHERE name = ?1", params![name])?;
            Ok(removed > 0)
        })
    }

    pub fn list_identities(&self) -> Result<Vec<IdentitySummary>, StorageError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT i.id, i.name, i.description,
                        (SELECT COUNT(*) FROM identity_signatures s WHERE s.identity_id = i.id),
                        (SELECT COUNT(*) FROM alerts a WHERE a.identity_id = i.id)
                 FROM identities i
                 ORDER BY i.name",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(IdentitySummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    signature_count: row.get::<_, i64>(3)? as usize,
                    alert_count: row.get::<_, i64>(4)? as usize,
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    /// Most recent alerts first
    pub fn recent_alerts(&self, limit: usize) -> Result<Vec<AlertRecord>, StorageError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, timestamp, identity_id, detected_face_path, terminal_id
                 FROM alerts
                 ORDER BY id DESC
                 LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit as i64], |row| {
                Ok(AlertRecord {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    identity_key: row.get(2)?,
                    image_path: row.get(3)?,
                    terminal_id: row.get(4)?,
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    pub fn alert_count(&self) -> Result<usize, StorageError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM alerts", [], |row| row.get(0))?;
            Ok(count as usize)
        })
    }

    /// Close the connection. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        let Some(conn) = self.conn.lock().take() else {
            return false;
        };

        if let Err((_, e)) = conn.close() {
            warn!("Error closing database {}: {}", self.path, e);
        } else {
            info!("Database {} closed", self.path);
        }
        true
    }

    pub fn is_open(&self) -> bool {
        self.conn.lock().is_some()
    }
}

impl GalleryStore for SqliteStore {
    fn load_all_known_signatures(&self) -> Result<Vec<KnownFace>, StorageError> {
        let faces = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT i.name, s.signature
                 FROM identity_signatures s
                 JOIN identities i ON s.identity_id = i.id
                 ORDER BY s.id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
            })?;

            let mut faces = Vec::new();
            for row in rows {
                let (identity, blob) = row?;
                match Signature::from_bytes(&blob) {
                    Some(signature) => faces.push(KnownFace::new(identity, signature)),
                    None => {
                        let err = StorageError::MalformedSignature {
                            identity,
                            len: blob.len(),
                        };
                        warn!("Skipping gallery entry: {}", err);
                    }
                }
            }
            Ok(faces)
        })?;

        let mut identities: Vec<&str> = faces.iter().map(|f| f.identity.as_str()).collect();
        identities.sort_unstable();
        identities.dedup();
        info!(
            "Loaded {} known face signatures from {} identities",
            faces.len(),
            identities.len()
        );

        Ok(faces)
    }
}

impl IdentityResolver for SqliteStore {
    fn resolve_identity_key(&self, identity: &str) -> Result<Option<i64>, StorageError> {
        self.with_conn(|conn| {
            let key = conn
                .query_row(
                    "SELECT id FROM identities WHERE name = ?1",
                    params![identity],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(key)
        })
    }
}

impl AlertPersistence for SqliteStore {
    fn save_alert(
        &self,
        identity_key: i64,
        image_path: Option<&Path>,
        terminal_id: &str,
    ) -> Result<i64, StorageError> {
        let timestamp = Utc::now().format(TIMESTAMP_FORMAT).to_string();
        let image_path = image_path.map(|p| p.display().to_string());

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO alerts (timestamp, identity_id, detected_face_path, terminal_id)
                 VALUES (?1, ?2, ?3, ?4)",
                params![timestamp, identity_key, image_path, terminal_id],
            )?;
            let id = conn.last_insert_rowid();
            debug!("Saved alert {} for identity {}", id, identity_key);
            Ok(id)
        })
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        self.close();
    }
}
