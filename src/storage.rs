// ============================================
// src/storage.rs
// 文字列キー・文字列値の永続ストレージ
// ============================================

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

const STORAGE_FILE: &str = "storage.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// localStorage 相当のキー・バリューストア
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }
}

/// MARK:保存先を開く。開けなければメモリ上のストアで続行する
pub fn open_or_memory(data_dir: &Path) -> Box<dyn KeyValueStore> {
    match FileStore::open(data_dir) {
        Ok(store) => Box::new(store),
        Err(err) => {
            warn!(
                path = %data_dir.display(),
                error = %err,
                "cannot open storage, progress will not be saved this session"
            );
            Box::new(MemoryStore::default())
        }
    }
}

/// JSON ファイルに保存するストア
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// MARK:データディレクトリのファイルを開く（壊れていれば空として扱う）
    pub fn open(data_dir: &Path) -> Result<Self, StorageError> {
        if !data_dir.exists() {
            fs::create_dir_all(data_dir)?;
        }
        let path = data_dir.join(STORAGE_FILE);
        let entries = Self::read_entries(&path);
        Ok(Self { path, entries })
    }

    fn read_entries(path: &Path) -> BTreeMap<String, String> {
        if !path.exists() {
            return BTreeMap::new();
        }
        let Ok(file) = File::open(path) else {
            return BTreeMap::new();
        };
        match serde_json::from_reader(BufReader::new(file)) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "storage file is corrupt, starting empty");
                BTreeMap::new()
            }
        }
    }

    /// MARK:ファイル全体を書き戻す
    fn flush(&self) -> Result<(), StorageError> {
        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.entries)?;
        writer.flush()?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }
}

/// メモリ上だけのストア（保存先が使えないときとテストで使う）
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub entries: BTreeMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
