//! SQLite catalog backend for persistent storage.

use super::{AssetScope, CatalogStore, CatalogWrite};
use crate::core::model::{DateTakenSource, PhotoAsset, ScanRoot};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS scan_roots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    root_path TEXT NOT NULL UNIQUE,
    last_scan_utc INTEGER,
    total_files_last_scan INTEGER NOT NULL DEFAULT 0,
    enable_duplicate_detection INTEGER NOT NULL DEFAULT 0,
    notes TEXT
);

CREATE TABLE IF NOT EXISTS photo_assets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    scan_root_id INTEGER NOT NULL REFERENCES scan_roots(id) ON DELETE CASCADE,
    full_path TEXT NOT NULL,
    file_name TEXT NOT NULL,
    extension TEXT NOT NULL,
    folder_path TEXT NOT NULL,
    file_size_bytes INTEGER NOT NULL,
    date_taken INTEGER,
    date_taken_source TEXT NOT NULL,
    camera_make TEXT,
    camera_model TEXT,
    width INTEGER,
    height INTEGER,
    sha256 TEXT,
    file_created_utc INTEGER NOT NULL,
    file_last_write_utc INTEGER NOT NULL,
    indexed_utc INTEGER NOT NULL,
    updated_utc INTEGER NOT NULL,
    notes TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    people_ids TEXT NOT NULL DEFAULT '[]',
    animal_ids TEXT NOT NULL DEFAULT '[]',
    UNIQUE (scan_root_id, full_path)
);

CREATE INDEX IF NOT EXISTS idx_assets_root ON photo_assets(scan_root_id);
CREATE INDEX IF NOT EXISTS idx_assets_sha256 ON photo_assets(sha256);
";

const ASSET_COLUMNS: &str = "id, scan_root_id, full_path, file_size_bytes, date_taken,
    date_taken_source, camera_make, camera_model, width, height, sha256,
    file_created_utc, file_last_write_utc, indexed_utc, updated_utc, notes,
    tags, people_ids, animal_ids";

const ROOT_COLUMNS: &str =
    "id, root_path, last_scan_utc, total_files_last_scan, enable_duplicate_detection, notes";

/// SQLite-backed persistent catalog
///
/// Uses WAL (Write-Ahead Logging) mode so queries can read while a scan
/// commits batches.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteCatalog {
    /// Open or create a catalog database at the given path
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::OpenFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        let conn = Connection::open(path).map_err(|e| StoreError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        // WAL only applies to file databases; in-memory ones silently keep "memory".
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::with_connection(conn, path.to_path_buf())
    }

    /// Private database that disappears with the value
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::OpenFailed {
            path: PathBuf::from(":memory:"),
            reason: e.to_string(),
        })?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::with_connection(conn, PathBuf::from(":memory:"))
    }

    fn with_connection(conn: Connection, db_path: PathBuf) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Corrupted {
            path: self.db_path.clone(),
        })
    }

    fn query_assets(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<PhotoAsset>, StoreError> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, read_asset_row)?;
        let mut assets = Vec::new();
        for row in rows {
            assets.push(row??);
        }
        Ok(assets)
    }

    fn query_roots(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<ScanRoot>, StoreError> {
        let mut stmt = conn.prepare(sql)?;
        let roots = stmt
            .query_map(params, read_root_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(roots)
    }
}

impl CatalogStore for SqliteCatalog {
    fn insert_root(&self, root: &ScanRoot) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO scan_roots
             (root_path, last_scan_utc, total_files_last_scan, enable_duplicate_detection, notes)
             VALUES (?, ?, ?, ?, ?)",
            params![
                path_text(&root.root_path),
                root.last_scan_utc.map(to_millis),
                root.total_files_last_scan as i64,
                root.enable_duplicate_detection,
                root.notes,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get_root(&self, id: i64) -> Result<Option<ScanRoot>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM scan_roots WHERE id = ?", ROOT_COLUMNS);
        Ok(conn.query_row(&sql, [id], read_root_row).optional()?)
    }

    fn find_root_by_path(&self, path: &Path) -> Result<Option<ScanRoot>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM scan_roots WHERE root_path = ?", ROOT_COLUMNS);
        Ok(conn
            .query_row(&sql, [path_text(path)], read_root_row)
            .optional()?)
    }

    fn list_roots(&self) -> Result<Vec<ScanRoot>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM scan_roots ORDER BY root_path, id", ROOT_COLUMNS);
        Self::query_roots(&conn, &sql, [])
    }

    fn get_asset(&self, id: i64) -> Result<Option<PhotoAsset>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM photo_assets WHERE id = ?", ASSET_COLUMNS);
        Ok(Self::query_assets(&conn, &sql, [id])?.into_iter().next())
    }

    fn list_assets(&self, scope: AssetScope) -> Result<Vec<PhotoAsset>, StoreError> {
        let conn = self.lock()?;
        match scope {
            AssetScope::All => {
                let sql = format!("SELECT {} FROM photo_assets ORDER BY id", ASSET_COLUMNS);
                Self::query_assets(&conn, &sql, [])
            }
            AssetScope::Root(root_id) => {
                let sql = format!(
                    "SELECT {} FROM photo_assets WHERE scan_root_id = ? ORDER BY id",
                    ASSET_COLUMNS
                );
                Self::query_assets(&conn, &sql, [root_id])
            }
        }
    }

    fn assets_missing_hash(&self, scan_root_id: i64) -> Result<Vec<PhotoAsset>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM photo_assets
             WHERE scan_root_id = ? AND (sha256 IS NULL OR sha256 = '')
             ORDER BY id",
            ASSET_COLUMNS
        );
        Self::query_assets(&conn, &sql, [scan_root_id])
    }

    fn shared_hashes(&self, scope: AssetScope) -> Result<Vec<(String, usize)>, StoreError> {
        let conn = self.lock()?;
        let (sql, root_id) = match scope {
            AssetScope::All => (
                "SELECT sha256, COUNT(*) FROM photo_assets
                 WHERE sha256 IS NOT NULL AND sha256 <> ''
                 GROUP BY sha256 HAVING COUNT(*) >= 2",
                None,
            ),
            AssetScope::Root(id) => (
                "SELECT sha256, COUNT(*) FROM photo_assets
                 WHERE scan_root_id = ?1 AND sha256 IS NOT NULL AND sha256 <> ''
                 GROUP BY sha256 HAVING COUNT(*) >= 2",
                Some(id),
            ),
        };

        let mut stmt = conn.prepare(sql)?;
        let map_row = |row: &Row<'_>| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
        };
        let groups = match root_id {
            Some(id) => stmt.query_map([id], map_row)?.collect::<Result<Vec<_>, _>>()?,
            None => stmt.query_map([], map_row)?.collect::<Result<Vec<_>, _>>()?,
        };
        Ok(groups)
    }

    fn commit(&self, writes: &[CatalogWrite]) -> Result<Vec<i64>, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut inserted = Vec::new();

        for write in writes {
            match write {
                CatalogWrite::InsertAsset(asset) => {
                    inserted.push(insert_asset(&tx, asset)?);
                }
                CatalogWrite::UpdateAsset(asset) => update_asset(&tx, asset)?,
                CatalogWrite::DeleteAssets(ids) => {
                    let mut stmt = tx.prepare_cached("DELETE FROM photo_assets WHERE id = ?")?;
                    for id in ids {
                        stmt.execute([id])?;
                    }
                }
                CatalogWrite::UpdateRoot(root) => {
                    tx.execute(
                        "UPDATE scan_roots SET
                         root_path = ?, last_scan_utc = ?, total_files_last_scan = ?,
                         enable_duplicate_detection = ?, notes = ?
                         WHERE id = ?",
                        params![
                            path_text(&root.root_path),
                            root.last_scan_utc.map(to_millis),
                            root.total_files_last_scan as i64,
                            root.enable_duplicate_detection,
                            root.notes,
                            root.id,
                        ],
                    )?;
                }
            }
        }

        tx.commit()?;
        Ok(inserted)
    }
}

fn insert_asset(tx: &Transaction<'_>, asset: &PhotoAsset) -> Result<i64, StoreError> {
    let mut stmt = tx.prepare_cached(
        "INSERT INTO photo_assets
         (scan_root_id, full_path, file_name, extension, folder_path, file_size_bytes,
          date_taken, date_taken_source, camera_make, camera_model, width, height, sha256,
          file_created_utc, file_last_write_utc, indexed_utc, updated_utc, notes,
          tags, people_ids, animal_ids)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )?;
    stmt.execute(params![
        asset.scan_root_id,
        path_text(&asset.full_path),
        asset.file_name,
        asset.extension,
        path_text(&asset.folder_path),
        asset.file_size_bytes as i64,
        asset.date_taken.map(to_millis),
        asset.date_taken_source.as_str(),
        asset.camera_make,
        asset.camera_model,
        asset.width,
        asset.height,
        asset.sha256,
        to_millis(asset.file_created_utc),
        to_millis(asset.file_last_write_utc),
        to_millis(asset.indexed_utc),
        to_millis(asset.updated_utc),
        asset.notes,
        encode_set(&asset.tags)?,
        encode_set(&asset.people_ids)?,
        encode_set(&asset.animal_ids)?,
    ])?;
    Ok(tx.last_insert_rowid())
}

fn update_asset(tx: &Transaction<'_>, asset: &PhotoAsset) -> Result<(), StoreError> {
    // indexed_utc is deliberately absent: it is set once at insert.
    let mut stmt = tx.prepare_cached(
        "UPDATE photo_assets SET
         scan_root_id = ?, full_path = ?, file_name = ?, extension = ?, folder_path = ?,
         file_size_bytes = ?, date_taken = ?, date_taken_source = ?, camera_make = ?,
         camera_model = ?, width = ?, height = ?, sha256 = ?, file_created_utc = ?,
         file_last_write_utc = ?, updated_utc = ?, notes = ?, tags = ?, people_ids = ?,
         animal_ids = ?
         WHERE id = ?",
    )?;
    stmt.execute(params![
        asset.scan_root_id,
        path_text(&asset.full_path),
        asset.file_name,
        asset.extension,
        path_text(&asset.folder_path),
        asset.file_size_bytes as i64,
        asset.date_taken.map(to_millis),
        asset.date_taken_source.as_str(),
        asset.camera_make,
        asset.camera_model,
        asset.width,
        asset.height,
        asset.sha256,
        to_millis(asset.file_created_utc),
        to_millis(asset.file_last_write_utc),
        to_millis(asset.updated_utc),
        asset.notes,
        encode_set(&asset.tags)?,
        encode_set(&asset.people_ids)?,
        encode_set(&asset.animal_ids)?,
        asset.id,
    ])?;
    Ok(())
}

fn read_root_row(row: &Row<'_>) -> rusqlite::Result<ScanRoot> {
    Ok(ScanRoot {
        id: row.get(0)?,
        root_path: PathBuf::from(row.get::<_, String>(1)?),
        last_scan_utc: row.get::<_, Option<i64>>(2)?.map(from_millis),
        total_files_last_scan: row.get::<_, i64>(3)?.max(0) as usize,
        enable_duplicate_detection: row.get(4)?,
        notes: row.get(5)?,
    })
}

/// Row decoding is split so JSON set errors surface as `StoreError`
/// instead of being forced through `rusqlite::Error`.
fn read_asset_row(row: &Row<'_>) -> rusqlite::Result<Result<PhotoAsset, StoreError>> {
    let full_path = PathBuf::from(row.get::<_, String>(2)?);
    let tags: String = row.get(16)?;
    let people: String = row.get(17)?;
    let animals: String = row.get(18)?;

    let mut asset = PhotoAsset::new(row.get(1)?, &full_path, from_millis(row.get(13)?));
    asset.id = row.get(0)?;
    asset.file_size_bytes = row.get::<_, i64>(3)?.max(0) as u64;
    asset.date_taken = row.get::<_, Option<i64>>(4)?.map(from_millis);
    asset.date_taken_source =
        DateTakenSource::from_str(&row.get::<_, String>(5)?).unwrap_or_default();
    asset.camera_make = row.get(6)?;
    asset.camera_model = row.get(7)?;
    asset.width = row.get(8)?;
    asset.height = row.get(9)?;
    asset.sha256 = row.get(10)?;
    asset.file_created_utc = from_millis(row.get(11)?);
    asset.file_last_write_utc = from_millis(row.get(12)?);
    asset.updated_utc = from_millis(row.get(14)?);
    asset.notes = row.get(15)?;

    Ok(with_sets(asset, &tags, &people, &animals))
}

fn with_sets(
    mut asset: PhotoAsset,
    tags: &str,
    people: &str,
    animals: &str,
) -> Result<PhotoAsset, StoreError> {
    asset.tags = decode_set(tags)?;
    asset.people_ids = decode_set(people)?;
    asset.animal_ids = decode_set(animals)?;
    Ok(asset)
}

fn path_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn to_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn encode_set(set: &BTreeSet<String>) -> Result<String, StoreError> {
    serde_json::to_string(set).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode_set(raw: &str) -> Result<BTreeSet<String>, StoreError> {
    if raw.trim().is_empty() {
        return Ok(BTreeSet::new());
    }
    serde_json::from_str(raw).map_err(|e| StoreError::Serialization(e.to_string()))
}
