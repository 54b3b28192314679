//! File-backed cache.
//!
//! Each key is stored as `<key>.json` in the data directory:
//! ```text
//! ~/.local/share/tripsheet/
//! ├── tripsheet_shopping_lists.json
//! ├── shopping_list_sync_queue.json
//! ├── itinerary_items.json
//! └── auth_state.json
//! ```

use std::fs;
use std::io;
use std::path::PathBuf;

use super::{CacheError, LocalCache};

/// File extension for cache entries.
const ENTRY_EXTENSION: &str = "json";

#[derive(Clone, Debug)]
pub struct FileCache {
    data_dir: PathBuf,
}

impl FileCache {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    /// Returns the file path for a key.
    ///
    /// Keys are restricted to ASCII alphanumerics, `_`, `-` and `.` so they
    /// can never escape the data directory.
    pub fn entry_path(&self, key: &str) -> Result<PathBuf, CacheError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid {
            return Err(CacheError::InvalidKey(key.to_string()));
        }
        Ok(self.data_dir.join(format!("{}.{}", key, ENTRY_EXTENSION)))
    }
}

impl LocalCache for FileCache {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let path = self.entry_path(key)?;

        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Io(path, e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let path = self.entry_path(key)?;

        fs::create_dir_all(&self.data_dir)
            .map_err(|e| CacheError::Io(self.data_dir.clone(), e))?;

        // Write then rename so a crash never leaves half an entry behind.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(|e| CacheError::Io(tmp.clone(), e))?;
        fs::rename(&tmp, &path).map_err(|e| CacheError::Io(path, e))?;

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let path = self.entry_path(key)?;

        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io(path, e)),
        }
    }
}
