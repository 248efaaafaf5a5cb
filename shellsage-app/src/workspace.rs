use async_trait::async_trait;
use shellsage_core::{FileStore, FileStoreError};
use std::path::{Path, PathBuf};

/// Flat directory of generated scripts. Names never carry path components,
/// so nothing written or deleted through here can leave the directory.
pub struct GeneratedFiles {
    dir: PathBuf,
}

impl GeneratedFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub async fn init(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn safe_path(&self, filename: &str) -> Result<PathBuf, FileStoreError> {
        if filename.is_empty()
            || filename.contains('/')
            || filename.contains('\\')
            || filename.contains("..")
        {
            return Err(FileStoreError::InvalidName(filename.to_string()));
        }
        Ok(self.dir.join(filename))
    }

    /// Generated Python scripts currently on disk.
    pub async fn list_scripts(&self) -> std::io::Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(".py") && entry.file_type().await?.is_file() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Deletes one generated script. Only `.py` files are deletable, and
    /// only inside the workspace. Returns false when the file is absent.
    pub async fn delete_script(&self, filename: &str) -> Result<bool, FileStoreError> {
        if !filename.ends_with(".py") {
            return Err(FileStoreError::InvalidName(filename.to_string()));
        }
        let path = self.safe_path(filename)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(filename, "generated script deleted");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(FileStoreError::Io(e)),
        }
    }
}

#[async_trait]
impl FileStore for GeneratedFiles {
    async fn persist(&self, filename: &str, content: &str) -> Result<(), FileStoreError> {
        let path = self.safe_path(filename)?;
        tokio::fs::write(&path, content).await?;
        tracing::info!(filename, "generated code saved");
        Ok(())
    }
}
