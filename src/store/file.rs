use super::RecordStore;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const RECORD_EXT: &str = "json";
const TMP_SUFFIX: &str = ".tmp";

/// Directory-backed store: `<dir>/<key>.json`, replaced via write-to-temp then rename.
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    dir: PathBuf,
}

impl FileRecordStore {
    /// Open (and create if needed) the data directory.
    pub async fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        info!(target: "tierquota::store", dir = %dir.display(), "record directory ready");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record for `key`. Keys containing path separators or parent references
    /// are refused.
    pub fn record_path(&self, key: &str) -> io::Result<PathBuf> {
        let unsafe_key = key.is_empty()
            || key == "."
            || key == ".."
            || key.contains(|c: char| matches!(c, '/' | '\\' | '\0'));
        if unsafe_key {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("record key {key:?} is not a valid file stem"),
            ));
        }
        Ok(self.dir.join(format!("{key}.{RECORD_EXT}")))
    }
}

async fn replace_with(tmp: &Path, path: &Path, record: &[u8]) -> io::Result<()> {
    let mut file = tokio::fs::File::create(tmp).await?;
    file.write_all(record).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(tmp, path).await
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn read(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        let path = self.record_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn write(&self, key: &str, record: &[u8]) -> io::Result<()> {
        let path = self.record_path(key)?;
        let mut tmp = path.clone().into_os_string();
        tmp.push(TMP_SUFFIX);
        let tmp = PathBuf::from(tmp);

        if let Err(e) = replace_with(&tmp, &path, record).await {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!(target: "tierquota::store", key, error = %cleanup, "stale temp record left behind");
                }
            }
            return Err(e);
        }
        debug!(target: "tierquota::store", key, bytes = record.len(), "record written");
        Ok(())
    }

    async fn clear(&self) -> io::Result<()> {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        tokio::fs::create_dir_all(&self.dir).await
    }
}
