use std::path::{Path, PathBuf};

use futures_util::stream::{self, StreamExt};
use reqwest::Client;
use sha1::{Digest, Sha1};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use crate::core::error::{LauncherError, LauncherResult};

/// Progress of a fetch-and-verify pass, counted in files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileProgress {
    pub completed: usize,
    pub total: usize,
}

/// Where a manifest file comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// Downloaded from this URL when missing or invalid.
    Remote(String),
    /// Produced locally (e.g. by an installer); must already exist.
    Local,
    /// Symbolic link to the given relative target.
    Link(String),
}

/// One file a version needs on disk, with optional SHA-1 for validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestFile {
    pub dest: PathBuf,
    pub source: FileSource,
    pub sha1: Option<String>,
    pub size: Option<u64>,
    pub executable: bool,
}

impl ManifestFile {
    pub fn remote(url: impl Into<String>, dest: PathBuf, sha1: Option<String>) -> Self {
        Self {
            dest,
            source: FileSource::Remote(url.into()),
            sha1,
            size: None,
            executable: false,
        }
    }
}

/// Concurrent, SHA-1 validated downloader.
pub struct Downloader {
    client: Client,
    /// Maximum number of parallel downloads.
    concurrency: usize,
}

impl Downloader {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            concurrency: 8,
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    // ── Single file download ────────────────────────────

    /// Download a single file to `dest`, optionally validating SHA-1.
    ///
    /// Creates parent directories as needed. The file handle is dropped right
    /// after writing so the file can be executed or moved immediately.
    pub async fn download_file(
        &self,
        url: &str,
        dest: &Path,
        sha1_expected: Option<&str>,
    ) -> LauncherResult<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;

        // Validate before writing so a corrupt body never lands on disk.
        if let Some(expected) = sha1_expected {
            let actual = sha1_hex(&bytes);
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(LauncherError::Sha1Mismatch {
                    path: dest.to_path_buf(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        {
            let mut file = tokio::fs::File::create(dest)
                .await
                .map_err(|e| LauncherError::io(dest, e))?;
            file.write_all(&bytes)
                .await
                .map_err(|e| LauncherError::io(dest, e))?;
            file.flush().await.map_err(|e| LauncherError::io(dest, e))?;
        }

        debug!("Downloaded: {} -> {:?}", url, dest);
        Ok(())
    }

    // ── Verify-or-fetch ─────────────────────────────────

    /// Make sure one manifest file is present and valid.
    ///
    /// Returns `true` when something had to be written.
    pub async fn ensure_file(&self, file: &ManifestFile) -> LauncherResult<bool> {
        if let FileSource::Link(target) = &file.source {
            return ensure_link(&file.dest, target).await;
        }

        if file_is_valid(&file.dest, file.sha1.as_deref()).await? {
            return Ok(false);
        }

        match &file.source {
            FileSource::Remote(url) => {
                self.download_file(url, &file.dest, file.sha1.as_deref())
                    .await?;
            }
            FileSource::Local => {
                return Err(if file.dest.exists() {
                    LauncherError::Sha1Mismatch {
                        path: file.dest.clone(),
                        expected: file.sha1.clone().unwrap_or_default(),
                        actual: sha1_file(&file.dest).await?,
                    }
                } else {
                    LauncherError::MissingArtifact {
                        path: file.dest.clone(),
                    }
                });
            }
            FileSource::Link(_) => return Ok(false),
        }

        if file.executable {
            mark_executable(&file.dest)?;
        }
        Ok(true)
    }

    /// Verify every file, fetching the missing or invalid ones concurrently.
    ///
    /// Reports `(completed, total)` after each file; stops at the first error.
    pub async fn ensure_all(
        &self,
        files: &[ManifestFile],
        progress: &UnboundedSender<FileProgress>,
    ) -> LauncherResult<()> {
        let total = files.len();
        info!(
            "Verifying {} files, concurrency={}",
            total, self.concurrency
        );
        let _ = progress.send(FileProgress {
            completed: 0,
            total,
        });

        let pending: Vec<_> = files.iter().map(|file| self.ensure_file(file)).collect();
        let mut results = stream::iter(pending).buffer_unordered(self.concurrency);

        let mut completed = 0;
        let mut fetched = 0;
        while let Some(result) = results.next().await {
            if result? {
                fetched += 1;
            }
            completed += 1;
            let _ = progress.send(FileProgress { completed, total });
        }

        info!("Verified {} files ({} fetched)", total, fetched);
        Ok(())
    }

    /// Validate an existing file's SHA-1.
    pub async fn validate_sha1(path: &Path, expected: &str) -> LauncherResult<bool> {
        Ok(sha1_file(path).await?.eq_ignore_ascii_case(expected))
    }
}

async fn file_is_valid(path: &Path, sha1: Option<&str>) -> LauncherResult<bool> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => match sha1 {
            Some(expected) => Downloader::validate_sha1(path, expected).await,
            None => Ok(true),
        },
        Ok(_) => Ok(false),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(LauncherError::io(path, e)),
    }
}

async fn sha1_file(path: &Path) -> LauncherResult<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| LauncherError::io(path, e))?;
    Ok(sha1_hex(&bytes))
}

fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(unix)]
async fn ensure_link(dest: &Path, target: &str) -> LauncherResult<bool> {
    if tokio::fs::symlink_metadata(dest).await.is_ok() {
        return Ok(false);
    }
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| LauncherError::io(parent, e))?;
    }
    tokio::fs::symlink(target, dest)
        .await
        .map_err(|e| LauncherError::io(dest, e))?;
    Ok(true)
}

#[cfg(not(unix))]
async fn ensure_link(dest: &Path, target: &str) -> LauncherResult<bool> {
    debug!("Skipping link {:?} -> {} on this platform", dest, target);
    Ok(false)
}

fn mark_executable(path: &Path) -> LauncherResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path)
            .map_err(|e| LauncherError::io(path, e))?
            .permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms).map_err(|e| LauncherError::io(path, e))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
