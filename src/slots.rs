// Key-value slots the task list is persisted into

use eyre::{Context, Result, eyre};
use fs2::FileExt;
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A string blob store addressed by key
pub trait Slots {
    /// Read the blob stored under `key`, `None` if nothing was ever written
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Overwrite the blob stored under `key`
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

impl<S: Slots + ?Sized> Slots for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
}

/// Validate a slot key
///
/// Keys double as file names for [`FileSlots`], so they are restricted to
/// alphanumerics, `_` and `-`.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(eyre!("Slot key cannot be empty"));
    }
    if key.len() > 64 {
        return Err(eyre!("Slot key too long: {} (max 64 chars)", key));
    }
    if !key.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(eyre!("Invalid slot key: {} (must be alphanumeric with _/-)", key));
    }
    Ok(())
}

// ============================================================================
// In-memory
// ============================================================================

/// In-process slots, mostly for tests and embedding
#[derive(Debug, Default, Clone)]
pub struct MemorySlots {
    values: HashMap<String, String>,
    writes: usize,
}

impl MemorySlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set` calls seen so far
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl Slots for MemorySlots {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        self.writes += 1;
        Ok(())
    }
}

// ============================================================================
// Files
// ============================================================================

/// One `{key}.json` file per slot inside a directory
#[derive(Debug)]
pub struct FileSlots {
    base_path: PathBuf,
}

impl FileSlots {
    /// Open or create a slot directory
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).context("Failed to create slot directory")?;
        debug!(path = ?base_path, "Opened file slots");
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn slot_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.base_path.join(format!("{}.json", key)))
    }

    /// Open `{key}.lock`, which guards the slot file across processes
    fn lock_file(&self, key: &str) -> Result<File> {
        let path = self.base_path.join(format!("{}.lock", key));
        fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to open lock file {:?}", path))
    }
}

impl Slots for FileSlots {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.slot_path(key)?;

        let lock = self.lock_file(key)?;
        FileExt::lock_shared(&lock).context("Failed to acquire file lock")?;

        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("Failed to read slot file {:?}", path)),
        };

        // Corrupt contents are malformed data, not an I/O failure
        match String::from_utf8(bytes) {
            Ok(content) => Ok(Some(content)),
            Err(e) => {
                warn!(file = ?path, error = ?e, "Slot file is not valid UTF-8, treating as empty");
                Ok(Some(String::new()))
            }
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.slot_path(key)?;
        let tmp_path = self.base_path.join(format!("{}.json.tmp", key));

        let lock = self.lock_file(key)?;
        FileExt::lock_exclusive(&lock).context("Failed to acquire file lock")?;

        // Write aside and rename so a failed write never clobbers the slot
        let mut file = File::create(&tmp_path).context("Failed to open slot file for writing")?;
        file.write_all(value.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, &path).with_context(|| format!("Failed to replace slot file {:?}", path))?;

        // Lock is released when `lock` is dropped
        debug!(key, bytes = value.len(), "Wrote slot file");
        Ok(())
    }
}

// ============================================================================
// SQLite
// ============================================================================

/// Slots kept in a single SQLite table
pub struct SqliteSlots {
    db: Connection,
}

impl SqliteSlots {
    /// Open or create the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let db = Connection::open(path).context("Failed to open SQLite database")?;
        let slots = Self { db };
        slots.create_schema()?;
        Ok(slots)
    }

    /// Open a throwaway in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open SQLite database")?;
        let slots = Self { db };
        slots.create_schema()?;
        Ok(slots)
    }

    fn create_schema(&self) -> Result<()> {
        debug!("Creating slots schema");

        self.db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS slots (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;

        Ok(())
    }

    /// Timestamp of the last write to `key`
    pub fn updated_at(&self, key: &str) -> Result<Option<i64>> {
        let ts = self
            .db
            .query_row("SELECT updated_at FROM slots WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(ts)
    }
}

impl Slots for SqliteSlots {
    fn get(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;

        let value = self
            .db
            .query_row("SELECT value FROM slots WHERE key = ?1", [key], |row| row.get(0))
            .optional()
            .context("Failed to read slot")?;

        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;

        self.db
            .execute(
                "INSERT INTO slots (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                rusqlite::params![key, value, now_ms()],
            )
            .context("Failed to write slot")?;

        debug!(key, bytes = value.len(), "Wrote slot row");
        Ok(())
    }
}

// Helper function for timestamps
pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
