// ─── Distribution Service ───
// Version catalog + fetch/verify of every file a version needs. The trait is
// the seam the lifecycle pipeline talks to; `MojangDistribution` backs it with
// Mojang's public endpoints.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::manifest::{VersionManifest, VersionSummary, VERSION_MANIFEST_URL};
use super::version_file::{self, JavaVersionInfo, LibraryFile, VersionJson};
use crate::core::assets;
use crate::core::downloader::{Downloader, FileProgress, FileSource, ManifestFile};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::java;

/// Everything needed to materialize one version.
#[derive(Debug, Clone)]
pub struct VersionMetadata {
    pub id: String,
    /// Runtime the version must be started with.
    pub java: JavaVersionInfo,
    pub files: Vec<ManifestFile>,
}

#[async_trait]
pub trait DistributionService: Send + Sync {
    /// Catalog of installable versions, newest first.
    async fn list_versions(&self) -> LauncherResult<Vec<VersionSummary>>;

    /// Resolve the metadata (runtime requirement + file manifest) of a version
    /// for the game root at `game_root`.
    async fn get_version_metadata(
        &self,
        game_root: &Path,
        version_id: &str,
    ) -> LauncherResult<VersionMetadata>;

    /// Fetch every missing or invalid file of `metadata`, reporting progress.
    async fn fetch_and_verify(
        &self,
        game_root: &Path,
        metadata: &VersionMetadata,
        progress: UnboundedSender<FileProgress>,
    ) -> LauncherResult<()>;
}

/// Distribution service backed by Mojang's manifests and CDN.
pub struct MojangDistribution {
    downloader: Arc<Downloader>,
    manifest_url: String,
    manifest: Mutex<Option<Arc<VersionManifest>>>,
}

impl MojangDistribution {
    pub fn new(downloader: Arc<Downloader>) -> Self {
        Self {
            downloader,
            manifest_url: VERSION_MANIFEST_URL.to_string(),
            manifest: Mutex::new(None),
        }
    }

    /// Version manifest, fetched once per process.
    async fn manifest(&self) -> LauncherResult<Arc<VersionManifest>> {
        let mut cached = self.manifest.lock().await;
        if let Some(manifest) = cached.as_ref() {
            return Ok(Arc::clone(manifest));
        }
        let manifest =
            Arc::new(VersionManifest::fetch(self.downloader.client(), &self.manifest_url).await?);
        *cached = Some(Arc::clone(&manifest));
        Ok(manifest)
    }

    /// Make sure `versions/<id>/<id>.json` and every JSON it inherits from exist
    /// locally, fetching official ones from the manifest.
    async fn ensure_version_chain(&self, game_root: &Path, version_id: &str) -> LauncherResult<()> {
        let mut next = Some(version_id.to_string());
        let mut depth = 0;

        while let Some(id) = next.take() {
            depth += 1;
            if depth > 8 {
                return Err(LauncherError::Other(format!(
                    "Version {version_id} has a runaway inheritsFrom chain"
                )));
            }

            let json_path = version_file::version_json_path(game_root, &id);
            if !json_path.exists() {
                let manifest = self.manifest().await?;
                let entry = manifest
                    .find_version(&id)
                    .ok_or_else(|| LauncherError::VersionNotFound(id.clone()))?;
                self.downloader
                    .download_file(&entry.url, &json_path, entry.sha1.as_deref())
                    .await?;
                info!("Fetched version JSON for {}", id);
            }

            let raw = tokio::fs::read_to_string(&json_path)
                .await
                .map_err(|e| LauncherError::io(&json_path, e))?;
            let value: serde_json::Value = serde_json::from_str(&raw)?;
            next = value
                .get("inheritsFrom")
                .and_then(|v| v.as_str())
                .filter(|v| !v.trim().is_empty())
                .map(str::to_owned);
        }

        Ok(())
    }

    async fn asset_files(
        &self,
        game_root: &Path,
        version: &VersionJson,
    ) -> LauncherResult<Vec<ManifestFile>> {
        let Some(index_info) = &version.asset_index else {
            return Ok(Vec::new());
        };

        let assets_dir = game_root.join("assets");
        let index_path = assets_dir
            .join("indexes")
            .join(format!("{}.json", index_info.id));
        let index_file = ManifestFile {
            dest: index_path.clone(),
            source: FileSource::Remote(index_info.url.clone()),
            sha1: Some(index_info.sha1.clone()),
            size: index_info.size,
            executable: false,
        };

        // Object list lives inside the index, so the index itself is fetched now.
        self.downloader.ensure_file(&index_file).await?;
        let raw = tokio::fs::read_to_string(&index_path)
            .await
            .map_err(|e| LauncherError::io(&index_path, e))?;
        let index: assets::AssetIndex = serde_json::from_str(&raw)?;

        let mut files = vec![index_file];
        files.extend(index.object_files(&assets_dir));
        Ok(files)
    }
}

#[async_trait]
impl DistributionService for MojangDistribution {
    async fn list_versions(&self) -> LauncherResult<Vec<VersionSummary>> {
        Ok(self.manifest().await?.summaries())
    }

    #[instrument(skip(self, game_root))]
    async fn get_version_metadata(
        &self,
        game_root: &Path,
        version_id: &str,
    ) -> LauncherResult<VersionMetadata> {
        self.ensure_version_chain(game_root, version_id).await?;
        let version = version_file::load_resolved(game_root, version_id)?;

        let mut files = Vec::new();
        if let Some(client) = version.downloads.as_ref().and_then(|d| d.client.as_ref()) {
            files.push(ManifestFile {
                dest: version_file::version_jar_path(game_root, version.jar_id()),
                source: FileSource::Remote(client.url.clone()),
                sha1: Some(client.sha1.clone()),
                size: Some(client.size),
                executable: false,
            });
        } else {
            warn!("Version {} declares no client download", version.id);
        }

        files.extend(library_files(game_root, &version));
        files.extend(self.asset_files(game_root, &version).await?);

        let java = version.required_java();
        match java::runtime_files(self.downloader.client(), game_root, &java.component).await {
            Ok(runtime) => files.extend(runtime),
            Err(e) => warn!(
                "Java runtime {} unavailable from the distribution: {}",
                java.component, e
            ),
        }

        dedup_by_dest(&mut files);
        debug!("Version {} needs {} files", version.id, files.len());

        Ok(VersionMetadata {
            id: version.id,
            java,
            files,
        })
    }

    async fn fetch_and_verify(
        &self,
        _game_root: &Path,
        metadata: &VersionMetadata,
        progress: UnboundedSender<FileProgress>,
    ) -> LauncherResult<()> {
        self.downloader.ensure_all(&metadata.files, &progress).await
    }
}

/// Library jars (and legacy natives) allowed on this OS.
fn library_files(game_root: &Path, version: &VersionJson) -> Vec<ManifestFile> {
    let libs_dir = game_root.join("libraries");
    let to_manifest = |lib: LibraryFile| ManifestFile {
        dest: libs_dir.join(&lib.path),
        source: match lib.url {
            Some(url) => FileSource::Remote(url),
            None => FileSource::Local,
        },
        sha1: lib.sha1,
        size: lib.size,
        executable: false,
    };

    version
        .allowed_libraries()
        .flat_map(|lib| [lib.artifact_file(), lib.native_file()])
        .flatten()
        .map(to_manifest)
        .collect()
}

fn dedup_by_dest(files: &mut Vec<ManifestFile>) {
    let mut seen = std::collections::HashSet::<PathBuf>::new();
    files.retain(|f| seen.insert(f.dest.clone()));
}
