//! Gallery of known faces and the alert audit trail.
//!
//! The detection loop only sees the three narrow traits below; the SQLite
//! store implements all of them and is shared with the dashboard through
//! the database file.

mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::StorageError;
use crate::recognition::KnownFace;
use serde::Serialize;
use std::path::Path;

/// Read side of the gallery, consulted once at startup
pub trait GalleryStore: Send + Sync {
    /// All `(identity, signature)` pairs in load order
    fn load_all_known_signatures(&self) -> Result<Vec<KnownFace>, StorageError>;
}

/// Maps an identity name to its database key
pub trait IdentityResolver: Send + Sync {
    fn resolve_identity_key(&self, identity: &str) -> Result<Option<i64>, StorageError>;
}

/// Append-only alert log
pub trait AlertPersistence: Send + Sync {
    /// Insert one alert row and return its id
    fn save_alert(
        &self,
        identity_key: i64,
        image_path: Option<&Path>,
        terminal_id: &str,
    ) -> Result<i64, StorageError>;
}

/// Everything the event recorder needs from storage
pub trait AuditStore: IdentityResolver + AlertPersistence {}

impl<T: IdentityResolver + AlertPersistence> AuditStore for T {}

/// A persisted alert as the dashboard sees it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertRecord {
    pub id: i64,
    /// UTC, `YYYY-MM-DD HH:MM:SS`
    pub timestamp: String,
    pub identity_key: i64,
    pub image_path: Option<String>,
    pub terminal_id: String,
}

/// Gallery listing row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentitySummary {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub signature_count: usize,
    pub alert_count: usize,
}
