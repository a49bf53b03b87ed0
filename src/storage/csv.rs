//! Flat-file backend: a single delimited file is the source of truth.
//!
//! Every mutation runs read-modify-write under an exclusive lock on a
//! sidecar `.lock` file and replaces the data file through a temporary file
//! and an atomic rename. Readers never take the lock; they always see either
//! the old or the new file, never a half-written one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs::{File, OpenOptions, TryLockError};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tokio::task;
use tracing::{debug, info};

use super::legacy::{LegacyRow, assign_missing_ids, id_space_exhausted};
use super::{BackendKind, StorageBackend, StorageError};
use crate::domain::{self, EntryId};
use crate::models::{ChoiceLists, NewUsageEntry, UsageEntry, UsageEntryPatch};

/// Column order written to the header row.
pub const COLUMNS: [&str; 14] = [
    "id",
    "employee_name",
    "manager",
    "tool",
    "purpose",
    "duration_minutes",
    "time_saved_minutes",
    "complexity_rating",
    "satisfaction_rating",
    "workflow_impact_rating",
    "result_outcome",
    "notes",
    "created_at",
    "updated_at",
];

/// Header names used by files written before the current schema.
const LEGACY_ALIASES: [(&str, &str); 10] = [
    ("name", "employee_name"),
    ("ai tool", "tool"),
    ("duration", "duration_minutes"),
    ("task complexity", "complexity_rating"),
    ("satisfaction", "satisfaction_rating"),
    ("workflow impact", "workflow_impact_rating"),
    ("result/outcome", "result_outcome"),
    ("timestamp", "created_at"),
    ("time saved", "time_saved_minutes"),
    ("time without ai", "time_without_ai"),
];

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct CsvBackend {
    path: PathBuf,
    lock_path: PathBuf,
    choices: Arc<ChoiceLists>,
    lock_timeout: Duration,
}

impl CsvBackend {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, choices: Arc<ChoiceLists>, lock_timeout: Duration) -> Self {
        let path = path.into();
        let mut lock_name = path.as_os_str().to_owned();
        lock_name.push(".lock");
        Self {
            lock_path: PathBuf::from(lock_name),
            path,
            choices,
            lock_timeout,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs a read-only closure on a blocking thread.
    async fn read<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T, StorageError> + Send + 'static,
    {
        let path = self.path.clone();
        task::spawn_blocking(move || f(&path)).await?
    }

    /// Runs `mutate` against the current rows while holding the file lock and
    /// atomically replaces the file with the result.
    async fn mutate<T, F>(&self, mutate: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Vec<UsageEntry>, &ChoiceLists) -> Result<T, StorageError> + Send + 'static,
    {
        let path = self.path.clone();
        let lock_path = self.lock_path.clone();
        let choices = Arc::clone(&self.choices);
        let timeout = self.lock_timeout;

        task::spawn_blocking(move || {
            let _guard = FileLock::acquire(&lock_path, timeout)?;
            let mut rows = read_rows(&path)?;
            let out = mutate(&mut rows, &choices)?;
            write_rows(&path, &rows)?;
            Ok(out)
        })
        .await?
    }
}

#[async_trait]
impl StorageBackend for CsvBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Csv
    }

    async fn migrate(&self) -> Result<(), StorageError> {
        let path = self.path.clone();
        let lock_path = self.lock_path.clone();
        let timeout = self.lock_timeout;

        task::spawn_blocking(move || {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }

            let _guard = FileLock::acquire(&lock_path, timeout)?;

            if !path.exists() {
                write_rows(&path, &[])?;
                info!("Created usage log file at {}", path.display());
                return Ok(());
            }

            if header_is_current(&path)? {
                return Ok(());
            }

            let rows = read_rows(&path)?;
            write_rows(&path, &rows)?;
            info!(
                "Upgraded usage log file at {} to the current column layout ({} rows)",
                path.display(),
                rows.len()
            );
            Ok(())
        })
        .await?
    }

    async fn create(&self, entry: NewUsageEntry) -> Result<UsageEntry, StorageError> {
        let created = self
            .mutate(move |rows, choices| {
                let fields = entry.validated(choices)?;
                let id = match rows.iter().map(|row| row.id).max() {
                    Some(max) => max.next().ok_or_else(id_space_exhausted)?,
                    None => EntryId::new(1),
                };
                let stored = UsageEntry::from_new(id, fields, domain::now());
                rows.push(stored.clone());
                Ok(stored)
            })
            .await?;

        debug!(id = %created.id, "Created usage entry in flat file");
        Ok(created)
    }

    async fn read_all(&self) -> Result<Vec<UsageEntry>, StorageError> {
        self.read(read_rows).await
    }

    async fn read_by_id(&self, id: EntryId) -> Result<UsageEntry, StorageError> {
        self.read(move |path| {
            read_rows(path)?
                .into_iter()
                .find(|row| row.id == id)
                .ok_or(StorageError::NotFound(id))
        })
        .await
    }

    async fn read_since(&self, since: DateTime<Utc>) -> Result<Vec<UsageEntry>, StorageError> {
        self.read(move |path| {
            let mut rows: Vec<UsageEntry> = read_rows(path)?
                .into_iter()
                .filter(|row| row.created_at >= since)
                .collect();
            rows.sort_by_key(|row| (row.created_at, row.id));
            Ok(rows)
        })
        .await
    }

    async fn update(
        &self,
        id: EntryId,
        patch: UsageEntryPatch,
    ) -> Result<UsageEntry, StorageError> {
        self.mutate(move |rows, choices| {
            let row = rows
                .iter_mut()
                .find(|row| row.id == id)
                .ok_or(StorageError::NotFound(id))?;
            row.apply(patch, choices, domain::now())?;
            Ok(row.clone())
        })
        .await
    }

    async fn delete(&self, id: EntryId) -> Result<(), StorageError> {
        self.mutate(move |rows, _| {
            let index = rows
                .iter()
                .position(|row| row.id == id)
                .ok_or(StorageError::NotFound(id))?;
            rows.remove(index);
            Ok(())
        })
        .await?;

        debug!(id = %id, "Deleted usage entry from flat file");
        Ok(())
    }

    async fn count(&self) -> Result<u64, StorageError> {
        self.read(|path| {
            let Some(mut reader) = open_reader(path)? else {
                return Ok(0);
            };
            let mut count = 0;
            for record in reader.records() {
                record?;
                count += 1;
            }
            Ok(count)
        })
        .await
    }
}

// ============================================================================
// Locking
// ============================================================================

/// Exclusive advisory lock on the sidecar file, released on drop.
struct FileLock {
    file: File,
}

impl FileLock {
    fn acquire(path: &Path, timeout: Duration) -> Result<Self, StorageError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;

        let deadline = Instant::now() + timeout;
        loop {
            match file.try_lock() {
                Ok(()) => return Ok(Self { file }),
                Err(TryLockError::WouldBlock) if Instant::now() < deadline => {
                    std::thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(TryLockError::WouldBlock) => {
                    return Err(StorageError::Io(format!(
                        "timed out after {}ms waiting for lock on {}",
                        timeout.as_millis(),
                        path.display()
                    )));
                }
                Err(TryLockError::Error(err)) => return Err(err.into()),
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

// ============================================================================
// Encoding
// ============================================================================

fn open_reader(path: &Path) -> Result<Option<::csv::Reader<File>>, StorageError> {
    match File::open(path) {
        Ok(file) => Ok(Some(
            ::csv::ReaderBuilder::new()
                .flexible(true)
                .trim(::csv::Trim::Headers)
                .from_reader(file),
        )),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn header_is_current(path: &Path) -> Result<bool, StorageError> {
    let Some(mut reader) = open_reader(path)? else {
        return Ok(false);
    };
    let headers = reader.headers()?;
    Ok(headers.iter().eq(COLUMNS.iter().copied()))
}

/// Maps canonical column names to their position in the file's header.
struct ColumnMap(HashMap<&'static str, usize>);

impl ColumnMap {
    fn from_headers(headers: &::csv::StringRecord) -> Self {
        let mut map = HashMap::new();
        for (index, header) in headers.iter().enumerate() {
            let normalized = header.trim().to_ascii_lowercase();
            let canonical = COLUMNS
                .iter()
                .copied()
                .find(|column| *column == normalized)
                .or_else(|| {
                    LEGACY_ALIASES
                        .iter()
                        .find(|(alias, _)| *alias == normalized)
                        .map(|(_, column)| *column)
                });
            if let Some(column) = canonical {
                map.entry(column).or_insert(index);
            }
        }
        Self(map)
    }

    fn row(&self, record: &::csv::StringRecord, line: u64) -> LegacyRow {
        let mut row = LegacyRow::new(format!("line {line}"));
        for (&column, &index) in &self.0 {
            if let Some(value) = record.get(index) {
                row.set(column, value);
            }
        }
        row
    }
}

/// Reads every row. Rows without an id get ids after the largest one in
/// the file, in row order.
fn read_rows(path: &Path) -> Result<Vec<UsageEntry>, StorageError> {
    let Some(mut reader) = open_reader(path)? else {
        return Ok(Vec::new());
    };
    let columns = ColumnMap::from_headers(reader.headers()?);
    let migrated_at = domain::now();

    let mut decoded = Vec::new();
    for (position, record) in reader.records().enumerate() {
        let record = record?;
        let line = record.position().map_or(position as u64 + 2, ::csv::Position::line);
        decoded.push(columns.row(&record, line).decode(migrated_at)?);
    }

    assign_missing_ids(decoded)
}

/// Writes `rows` to a temporary file next to `path` and renames it over
/// `path`, so the file is replaced atomically or not at all.
fn write_rows(path: &Path, rows: &[UsageEntry]) -> Result<(), StorageError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;

    {
        let mut writer = ::csv::Writer::from_writer(tmp.as_file_mut());
        writer.write_record(COLUMNS)?;
        for row in rows {
            writer.write_record(encode_row(row))?;
        }
        writer.flush()?;
    }

    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StorageError::Io(e.error.to_string()))?;
    Ok(())
}

fn encode_row(row: &UsageEntry) -> [String; 14] {
    [
        row.id.to_string(),
        row.employee_name.clone(),
        row.manager.clone(),
        row.tool.clone(),
        row.purpose.clone(),
        row.duration_minutes.to_string(),
        row.time_saved_minutes.to_string(),
        row.complexity_rating.to_string(),
        row.satisfaction_rating.to_string(),
        row.workflow_impact_rating.to_string(),
        row.result_outcome.clone(),
        row.notes.clone(),
        domain::format_timestamp(&row.created_at),
        domain::format_timestamp(&row.updated_at),
    ]
}
