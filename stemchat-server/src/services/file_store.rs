//! Inbox/outbox file storage
//!
//! The inbox holds uploaded source audio, the outbox holds separation
//! results. Both directories are given at construction so tests can run
//! against isolated temp folders.

use std::io::Write;
use std::path::{Component, Path, PathBuf};
use stemchat_common::config::StoragePaths;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Accepted upload extensions (compared case-insensitively)
pub const ALLOWED_EXTENSIONS: [&str; 2] = ["wav", "mp3"];

/// Name of the archive produced by [`FileStore::bundle_outputs`]
pub const BUNDLE_NAME: &str = "all_processed_files.zip";

/// Suffix of in-progress writes; such files are never listed
const PARTIAL_SUFFIX: &str = ".part";

/// File store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Extension is not wav/mp3
    #[error("Invalid file type: {0}")]
    InvalidFileType(String),

    /// Name is empty or would resolve outside the store
    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(String),
}

impl From<zip::result::ZipError> for StoreError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => StoreError::Io(e),
            other => StoreError::Archive(other.to_string()),
        }
    }
}

/// Check the upload extension (text after the last '.')
pub fn check_file_type(name: &str) -> Result<(), StoreError> {
    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    if ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(())
    } else {
        Err(StoreError::InvalidFileType(name.to_string()))
    }
}

/// Reject names that are not a single plain path component
fn check_file_name(name: &str) -> Result<(), StoreError> {
    let mut components = Path::new(name).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single_normal || name.contains('\\') || name.ends_with(PARTIAL_SUFFIX) {
        return Err(StoreError::InvalidFileName(name.to_string()));
    }
    Ok(())
}

/// Inbox/outbox storage
#[derive(Debug, Clone)]
pub struct FileStore {
    inbox: PathBuf,
    outbox: PathBuf,
}

impl FileStore {
    /// Open the store, creating both directories if missing
    pub fn new(paths: StoragePaths) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&paths.inbox)?;
        std::fs::create_dir_all(&paths.outbox)?;

        info!(
            inbox = %paths.inbox.display(),
            outbox = %paths.outbox.display(),
            "File store ready"
        );

        Ok(Self {
            inbox: paths.inbox,
            outbox: paths.outbox,
        })
    }

    pub fn inbox(&self) -> &Path {
        &self.inbox
    }

    pub fn outbox(&self) -> &Path {
        &self.outbox
    }

    /// Path of an inbox file (not checked for existence)
    pub fn input_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        check_file_name(name)?;
        Ok(self.inbox.join(name))
    }

    /// Store an upload
    ///
    /// The content is written to a temporary sibling and renamed into place,
    /// so readers never see a partially written file. An existing file with
    /// the same name is replaced.
    pub async fn put(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        check_file_type(name)?;
        let target = self.input_path(name)?;

        let partial = self
            .inbox
            .join(format!(".{}.{}{}", name, uuid::Uuid::new_v4(), PARTIAL_SUFFIX));

        if let Err(e) = tokio::fs::write(&partial, bytes).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }
        tokio::fs::rename(&partial, &target).await?;

        info!(file = %name, bytes = bytes.len(), path = %target.display(), "Stored upload");
        Ok(target)
    }

    /// Whether a regular file with this name is in the inbox
    pub async fn exists(&self, name: &str) -> bool {
        let Ok(path) = self.input_path(name) else {
            return false;
        };
        tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Inbox file names in directory order
    pub async fn list(&self) -> Result<Vec<String>, StoreError> {
        list_regular_files(&self.inbox).await
    }

    /// Inbox names containing `query`, case-insensitively
    pub async fn search(&self, query: &str) -> Result<Vec<String>, StoreError> {
        let needle = query.to_lowercase();
        let matches = self
            .list()
            .await?
            .into_iter()
            .filter(|name| name.to_lowercase().contains(&needle))
            .collect();
        Ok(matches)
    }

    /// Outbox file names in directory order
    pub async fn list_outputs(&self) -> Result<Vec<String>, StoreError> {
        list_regular_files(&self.outbox).await
    }

    /// Path of an existing outbox file
    pub async fn output_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        check_file_name(name)?;
        let path = self.outbox.join(name);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => Err(StoreError::NotFound(name.to_string())),
        }
    }

    /// Zip every outbox file into [`BUNDLE_NAME`] and return its path
    ///
    /// A previous bundle is replaced and never included in the new one.
    pub async fn bundle_outputs(&self) -> Result<PathBuf, StoreError> {
        let names: Vec<String> = self
            .list_outputs()
            .await?
            .into_iter()
            .filter(|name| name != BUNDLE_NAME)
            .collect();

        if names.is_empty() {
            return Err(StoreError::NotFound("No files found".to_string()));
        }

        let outbox = self.outbox.clone();
        let bundle_path = tokio::task::spawn_blocking(move || write_bundle(&outbox, &names))
            .await
            .map_err(|e| StoreError::Archive(format!("Task join error: {}", e)))??;

        info!(path = %bundle_path.display(), "Bundled processed files");
        Ok(bundle_path)
    }
}

fn write_bundle(outbox: &Path, names: &[String]) -> Result<PathBuf, StoreError> {
    let bundle_path = outbox.join(BUNDLE_NAME);
    let partial = outbox.join(format!(".{}{}", BUNDLE_NAME, PARTIAL_SUFFIX));

    let file = std::fs::File::create(&partial)?;
    let mut zip = zip::ZipWriter::new(file);
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for name in names {
        debug!(file = %name, "Adding to bundle");
        zip.start_file(name.as_str(), options)?;
        let mut source = std::fs::File::open(outbox.join(name))?;
        std::io::copy(&mut source, &mut zip)?;
    }

    let mut file = zip.finish()?;
    file.flush()?;
    drop(file);

    std::fs::rename(&partial, &bundle_path)?;
    Ok(bundle_path)
}

async fn list_regular_files(dir: &Path) -> Result<Vec<String>, StoreError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) if name.starts_with('.') && name.ends_with(PARTIAL_SUFFIX) => {}
            Ok(name) => names.push(name),
            Err(raw) => warn!(name = ?raw, "Skipping non UTF-8 file name"),
        }
    }

    Ok(names)
}
