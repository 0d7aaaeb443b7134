// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! File I/O on the vault data directory.
//!
//! Plain filesystem calls; at-rest protection comes from the volume mounted
//! at `DATA_DIR`. Whole-document writes (key pairs, local blobs) land in a
//! sibling `.tmp` file first and are renamed into place, so a crash never
//! leaves a truncated key pair behind.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use super::StoragePaths;

/// Data directory errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Data directory not initialized")]
    NotInitialized,

    /// Stored content could not be decoded or failed a read-back check.
    #[error("Corrupt data: {0}")]
    Corrupt(String),
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(e.to_string()),
            _ => StorageError::Io(e),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Handle to the vault data directory.
#[derive(Debug, Clone)]
pub struct VaultStorage {
    paths: StoragePaths,
    initialized: bool,
}

impl VaultStorage {
    /// Wrap a layout. Nothing is touched on disk until [`initialize`].
    ///
    /// [`initialize`]: VaultStorage::initialize
    pub fn new(paths: StoragePaths) -> Self {
        Self {
            paths,
            initialized: false,
        }
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Create the top-level directories. Idempotent.
    pub fn initialize(&mut self) -> StorageResult<()> {
        for dir in [
            self.paths.receivers_dir(),
            self.paths.blobs_dir(),
            self.paths.ledger_dir(),
            self.paths.audit_dir(),
        ] {
            fs::create_dir_all(&dir)?;
        }
        self.initialized = true;
        Ok(())
    }

    /// Write, read back and remove a scratch file under the root.
    ///
    /// Each call uses its own file, so concurrent checks never see each
    /// other's marker.
    pub fn check_writable(&self) -> StorageResult<()> {
        self.ensure_initialized()?;

        let marker = uuid::Uuid::new_v4();
        let scratch = self.paths.root().join(format!(".write-check-{marker}"));
        fs::write(&scratch, marker.as_bytes())?;
        let read_back = fs::read(&scratch);
        fs::remove_file(&scratch)?;

        if read_back? != marker.as_bytes() {
            return Err(StorageError::Corrupt(
                "write check read-back mismatch".to_string(),
            ));
        }
        Ok(())
    }

    pub fn read_json<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> StorageResult<T> {
        self.ensure_initialized()?;
        let reader = BufReader::new(File::open(path.as_ref())?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Atomically replace a JSON document. `private` restricts it to the
    /// owner on unix.
    pub fn write_json<T: Serialize>(
        &self,
        path: impl AsRef<Path>,
        value: &T,
        private: bool,
    ) -> StorageResult<()> {
        self.ensure_initialized()?;
        replace_file(path.as_ref(), private, |file| {
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, value)?;
            writer.flush()?;
            Ok(())
        })
    }

    /// Existence check by opening the file; `stat()` is unreliable on some
    /// encrypted mounts.
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        File::open(path.as_ref()).is_ok()
    }

    /// Names of the subdirectories of `dir`, sorted. A missing `dir` is empty.
    pub fn list_dirs(&self, dir: impl AsRef<Path>) -> StorageResult<Vec<String>> {
        self.ensure_initialized()?;

        let entries = match fs::read_dir(dir.as_ref()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Atomically replace a binary file.
    pub fn write_raw(&self, path: impl AsRef<Path>, data: &[u8]) -> StorageResult<()> {
        self.ensure_initialized()?;
        replace_file(path.as_ref(), false, |file| {
            file.write_all(data)?;
            Ok(())
        })
    }

    pub fn read_raw(&self, path: impl AsRef<Path>) -> StorageResult<Vec<u8>> {
        self.ensure_initialized()?;
        let mut data = Vec::new();
        File::open(path.as_ref())?.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Append one newline-terminated line in a single write.
    pub fn append_line(&self, path: impl AsRef<Path>, line: &str) -> StorageResult<()> {
        self.ensure_initialized()?;

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut record = String::with_capacity(line.len() + 1);
        record.push_str(line);
        record.push('\n');

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?
            .write_all(record.as_bytes())?;
        Ok(())
    }

    pub fn create_dir(&self, path: impl AsRef<Path>) -> StorageResult<()> {
        self.ensure_initialized()?;
        fs::create_dir_all(path.as_ref())?;
        Ok(())
    }

    fn ensure_initialized(&self) -> StorageResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(StorageError::NotInitialized)
        }
    }
}

/// Write through `{path}.tmp`, fsync, then rename over `path`.
fn replace_file<F>(path: &Path, private: bool, write: F) -> StorageResult<()>
where
    F: FnOnce(&mut File) -> StorageResult<()>,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("tmp");

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    if private {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    #[cfg(not(unix))]
    let _ = private;

    let mut file = options.open(&temp_path)?;
    write(&mut file)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    fn storage() -> (TempDir, VaultStorage) {
        let temp = TempDir::new().unwrap();
        let mut storage = VaultStorage::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        (temp, storage)
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        n: u32,
    }

    #[test]
    fn layout_is_created() {
        let (_temp, storage) = storage();
        let paths = storage.paths();
        for dir in [
            paths.receivers_dir(),
            paths.blobs_dir(),
            paths.ledger_dir(),
            paths.audit_dir(),
        ] {
            assert!(dir.is_dir(), "{} missing", dir.display());
        }
    }

    #[test]
    fn json_documents_replace_atomically() {
        let (_temp, storage) = storage();
        let path = storage.paths().receiver_keypair("r-1");

        storage
            .write_json(&path, &Doc { name: "a".into(), n: 1 }, true)
            .unwrap();
        storage
            .write_json(&path, &Doc { name: "b".into(), n: 2 }, true)
            .unwrap();

        let doc: Doc = storage.read_json(&path).unwrap();
        assert_eq!(doc, Doc { name: "b".into(), n: 2 });
        assert!(!path.with_extension("tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn private_documents_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let (_temp, storage) = storage();
        let path = storage.paths().receiver_keypair("r-2");
        storage
            .write_json(&path, &Doc { name: "k".into(), n: 0 }, true)
            .unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn blobs_keep_arbitrary_bytes() {
        let (_temp, storage) = storage();
        let path = storage.paths().blob("local-abc");
        let data: Vec<u8> = (0..=255).collect();

        storage.write_raw(&path, &data).unwrap();
        assert_eq!(storage.read_raw(&path).unwrap(), data);
        assert!(storage.exists(&path));
    }

    #[test]
    fn lines_are_appended() {
        let (_temp, storage) = storage();
        let path = storage.paths().audit_events_file("2026-03-04");

        storage.append_line(&path, "one").unwrap();
        storage.append_line(&path, "two").unwrap();

        let text = String::from_utf8(storage.read_raw(&path).unwrap()).unwrap();
        assert_eq!(text, "one\ntwo\n");
    }

    #[test]
    fn missing_files_map_to_not_found() {
        let (_temp, storage) = storage();
        assert!(matches!(
            storage.read_raw(storage.paths().blob("local-none")),
            Err(StorageError::NotFound(_))
        ));
        assert!(!storage.exists(storage.paths().blob("local-none")));
    }

    #[test]
    fn write_check_leaves_nothing_behind() {
        let (_temp, storage) = storage();
        storage.check_writable().unwrap();
        assert!(scratch_files(&storage).is_empty());
    }

    #[test]
    fn concurrent_write_checks_do_not_collide() {
        let (_temp, storage) = storage();
        let storage = std::sync::Arc::new(storage);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let storage = storage.clone();
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        storage.check_writable()?;
                    }
                    Ok::<_, StorageError>(())
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert!(scratch_files(&storage).is_empty());
    }

    fn scratch_files(storage: &VaultStorage) -> Vec<String> {
        fs::read_dir(storage.paths().root())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(".write-check"))
            .collect()
    }

    #[test]
    fn list_dirs_is_sorted_and_skips_files() {
        let (_temp, storage) = storage();
        for id in ["carol", "alice", "bob"] {
            storage.create_dir(storage.paths().receiver_dir(id)).unwrap();
        }
        storage
            .write_raw(storage.paths().receivers_dir().join("stray.txt"), b"x")
            .unwrap();

        assert_eq!(
            storage.list_dirs(storage.paths().receivers_dir()).unwrap(),
            vec!["alice", "bob", "carol"]
        );
        assert!(storage
            .list_dirs(storage.paths().root().join("nope"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn uninitialized_handle_refuses_io() {
        let storage = VaultStorage::new(StoragePaths::new("/nonexistent/vault"));
        assert!(matches!(
            storage.read_json::<Doc>("/nonexistent/vault/x.json"),
            Err(StorageError::NotInitialized)
        ));
    }
}
