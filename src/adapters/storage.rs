use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Directory-backed storage. Every write lands in a sibling temp file first
/// and is renamed over the target only after it has been flushed to disk.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Removes `.<name>.<pid>.tmp` files left behind by a process that was
    /// killed between writing a temp file and renaming it.
    pub async fn remove_stale_temp_files(&self) -> Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !(name.starts_with('.') && name.ends_with(".tmp")) {
                continue;
            }
            if !entry.file_type().await?.is_file() {
                continue;
            }
            tokio::fs::remove_file(entry.path()).await?;
            tracing::info!(path = %entry.path().display(), "Removed leftover temp file");
            removed += 1;
        }

        Ok(removed)
    }

    fn temp_path_for(full_path: &Path) -> PathBuf {
        let file_name = full_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "state".to_string());
        full_path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()))
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.base_path.join(path);
        let data = tokio::fs::read(full_path).await?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.base_path.join(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_path = Self::temp_path_for(&full_path);
        let written = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            tokio::fs::rename(&tmp_path, &full_path).await
        }
        .await;

        if let Err(e) = written {
            // 舊檔案保持不變，只清掉寫了一半的暫存檔
            if let Err(cleanup) = tokio::fs::remove_file(&tmp_path).await {
                tracing::debug!(path = %tmp_path.display(), error = %cleanup, "Temp file cleanup failed");
            }
            return Err(e.into());
        }

        tracing::debug!(path = %full_path.display(), bytes = data.len(), "State file written");
        Ok(())
    }
}

/// Process-local storage. State is lost on restart; useful for stateless
/// deployments and as the seam for an external key/value store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
        let files = self.files.lock().await;
        files.get(path).cloned()
    }
}

impl Storage for MemoryStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let files = self.files.lock().await;
        files.get(path).cloned().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", path),
            )
            .into()
        })
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let mut files = self.files.lock().await;
        files.insert(path.to_string(), data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::WatchError;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_storage_round_trip_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().join("nested/state"));

        storage.write_file("seen.json", b"[\"a\"]").await.unwrap();
        let data = storage.read_file("seen.json").await.unwrap();

        assert_eq!(data, b"[\"a\"]");
    }

    #[tokio::test]
    async fn test_local_storage_overwrite_leaves_no_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());

        storage.write_file("seen.json", b"[1]").await.unwrap();
        storage.write_file("seen.json", b"[1,2]").await.unwrap();

        let entries: Vec<String> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec!["seen.json".to_string()]);
        assert_eq!(storage.read_file("seen.json").await.unwrap(), b"[1,2]");
    }

    #[tokio::test]
    async fn test_failed_overwrite_keeps_previous_content() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());
        storage.write_file("seen.json", b"[\"old\"]").await.unwrap();

        // 暫存檔的位置被目錄佔住，寫入在 rename 之前就失敗
        let tmp_path = LocalStorage::temp_path_for(&temp_dir.path().join("seen.json"));
        std::fs::create_dir(&tmp_path).unwrap();
        let result = storage.write_file("seen.json", b"[\"old\", \"new\"]").await;

        assert!(matches!(result, Err(WatchError::IoError(_))));
        assert_eq!(storage.read_file("seen.json").await.unwrap(), b"[\"old\"]");
    }

    #[tokio::test]
    async fn test_failed_rename_cleans_up_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());

        // 目標位置是非空目錄時 rename 會失敗
        std::fs::create_dir(temp_dir.path().join("blocked")).unwrap();
        std::fs::write(temp_dir.path().join("blocked/inner"), b"x").unwrap();
        let result = storage.write_file("blocked", b"[\"new\"]").await;

        assert!(matches!(result, Err(WatchError::IoError(_))));
        let leftovers = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_remove_stale_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());
        storage.write_file("seen.json", b"[\"L1\"]").await.unwrap();
        std::fs::write(temp_dir.path().join(".seen.json.4242.tmp"), b"[\"L1\", \"L").unwrap();
        std::fs::write(temp_dir.path().join("notes.tmp"), b"keep").unwrap();

        assert_eq!(storage.remove_stale_temp_files().await.unwrap(), 1);

        assert!(!temp_dir.path().join(".seen.json.4242.tmp").exists());
        assert!(temp_dir.path().join("notes.tmp").exists());
        assert_eq!(storage.read_file("seen.json").await.unwrap(), b"[\"L1\"]");

        let missing_dir = LocalStorage::new(temp_dir.path().join("not-created-yet"));
        assert_eq!(missing_dir.remove_stale_temp_files().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_memory_storage_missing_file_is_not_found() {
        let storage = MemoryStorage::new();
        match storage.read_file("absent.json").await {
            Err(WatchError::IoError(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("unexpected result: {:?}", other.map(|d| d.len())),
        }

        storage.write_file("present.json", b"[]").await.unwrap();
        assert_eq!(storage.get_file("present.json").await, Some(b"[]".to_vec()));
    }
}
