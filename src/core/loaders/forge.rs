use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::context::InstallContext;
use super::discovery;
use super::installer::LoaderInstaller;
use super::merge;
use crate::core::downloader::Downloader;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::java;
use crate::core::version::version_file;

pub const FORGE_MAVEN: &str = "https://maven.minecraftforge.net";

pub const DEFAULT_INSTALLER_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// `forge-{mc}-{forge}-installer.jar`
pub fn installer_file_name(minecraft_version: &str, forge_version: &str) -> String {
    format!("forge-{minecraft_version}-{forge_version}-installer.jar")
}

pub fn installer_url(minecraft_version: &str, forge_version: &str) -> String {
    format!(
        "{FORGE_MAVEN}/net/minecraftforge/forge/{minecraft_version}-{forge_version}/{}",
        installer_file_name(minecraft_version, forge_version)
    )
}

/// Subset of the `version.json` embedded in modern installers.
#[derive(Debug, Deserialize)]
struct EmbeddedVersion {
    id: String,
}

/// Legacy installers only ship `install_profile.json` with a `versionInfo`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyInstallProfile {
    version_info: EmbeddedVersion,
}

/// Version id the installer says it will create, if it says.
pub fn declared_version_id(installer_path: &Path) -> LauncherResult<Option<String>> {
    let file = std::fs::File::open(installer_path)
        .map_err(|e| LauncherError::io(installer_path, e))?;
    let mut archive = zip::ZipArchive::new(file)?;

    if let Ok(entry) = archive.by_name("version.json") {
        let version: EmbeddedVersion = serde_json::from_reader(entry)?;
        return Ok(Some(version.id));
    }
    if let Ok(entry) = archive.by_name("install_profile.json") {
        if let Ok(profile) = serde_json::from_reader::<_, LegacyInstallProfile>(entry) {
            return Ok(Some(profile.version_info.id));
        }
    }
    Ok(None)
}

/// The installer refuses to run without a launcher profile file.
async fn ensure_launcher_profiles(shared_root: &Path) -> LauncherResult<()> {
    let path = shared_root.join("launcher_profiles.json");
    if path.exists() {
        return Ok(());
    }
    tokio::fs::create_dir_all(shared_root)
        .await
        .map_err(|e| LauncherError::io(shared_root, e))?;
    tokio::fs::write(&path, br#"{"profiles":{},"selectedProfile":null}"#)
        .await
        .map_err(|e| LauncherError::io(&path, e))?;
    debug!("Created {:?}", path);
    Ok(())
}

fn log_lines<R>(reader: R, stream: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(target: "forge_installer", "[{}] {}", stream, line);
        }
    });
}

/// Runs the official Forge installer against the shared game root, then
/// merges what it produced into the instance.
pub struct ForgeInstaller {
    downloader: Arc<Downloader>,
    shared_root: PathBuf,
    timeout: Duration,
    /// Installs of the same base version share files in `shared_root`.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ForgeInstaller {
    pub fn new(downloader: Arc<Downloader>, shared_root: PathBuf) -> Self {
        Self {
            downloader,
            shared_root,
            timeout: DEFAULT_INSTALLER_TIMEOUT,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn base_version_lock(&self, minecraft_version: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(minecraft_version.to_string()).or_default())
    }

    async fn run_installer(
        &self,
        java_bin: &Path,
        installer_path: &Path,
        working_dir: &Path,
    ) -> LauncherResult<()> {
        info!("Running Forge installer {:?}", installer_path);

        let mut child = Command::new(java_bin)
            .arg("-jar")
            .arg(installer_path)
            .arg("--installClient")
            .arg(&self.shared_root)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LauncherError::InstallerFailure(format!("could not start installer: {e}")))?;

        if let Some(stdout) = child.stdout.take() {
            log_lines(stdout, "stdout");
        }
        if let Some(stderr) = child.stderr.take() {
            log_lines(stderr, "stderr");
        }

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return Err(LauncherError::InstallerFailure(format!(
                    "waiting for installer failed: {e}"
                )))
            }
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed-out installer: {}", e);
                }
                return Err(LauncherError::InstallerFailure(format!(
                    "installer did not finish within {}s",
                    self.timeout.as_secs()
                )));
            }
        };

        if !status.success() {
            return Err(LauncherError::InstallerFailure(format!(
                "installer exited with {status}"
            )));
        }
        Ok(())
    }

    async fn install_and_merge(
        &self,
        ctx: InstallContext<'_>,
        java_bin: &Path,
        installer_path: &Path,
    ) -> LauncherResult<String> {
        ensure_launcher_profiles(&self.shared_root).await?;

        let declared = match declared_version_id(installer_path) {
            Ok(id) => id,
            Err(e) => {
                warn!("Could not read installer metadata: {}", e);
                None
            }
        };

        let shared_versions = self.shared_root.join("versions");
        let before = discovery::snapshot(&shared_versions).await?;
        self.run_installer(java_bin, installer_path, ctx.instance_root)
            .await?;
        let after = discovery::snapshot(&shared_versions).await?;

        let folder = discovery::select_version_folder(
            &before,
            &after,
            ctx.minecraft_version,
            declared.as_deref(),
        )?;
        info!("Forge installed version {}", folder);

        merge::install_version_folder(
            &shared_versions.join(&folder),
            &ctx.instance_root.join("versions"),
            &folder,
        )
        .await?;
        merge::merge_generated_libraries(&self.shared_root, ctx.instance_root, &folder).await?;

        Ok(folder)
    }
}

#[async_trait::async_trait]
impl LoaderInstaller for ForgeInstaller {
    #[instrument(skip(self, ctx), fields(mc = ctx.minecraft_version, forge = ctx.loader_version))]
    async fn install(&self, ctx: InstallContext<'_>) -> LauncherResult<String> {
        let lock = self.base_version_lock(ctx.minecraft_version).await;
        let _guard = lock.lock().await;

        info!(
            "Installing Forge {} for MC {}",
            ctx.loader_version, ctx.minecraft_version
        );

        let base = version_file::load_resolved(ctx.instance_root, ctx.minecraft_version)?;
        let java_bin =
            java::require_runtime_binary(ctx.instance_root, &base.required_java().component)?;

        let installer_path = ctx
            .instance_root
            .join(installer_file_name(ctx.minecraft_version, ctx.loader_version));
        if installer_path.is_file() {
            debug!("Reusing installer {:?}", installer_path);
        } else {
            self.downloader
                .download_file(
                    &installer_url(ctx.minecraft_version, ctx.loader_version),
                    &installer_path,
                    None,
                )
                .await?;
        }

        let result = self.install_and_merge(ctx, &java_bin, &installer_path).await;

        if let Err(e) = tokio::fs::remove_file(&installer_path).await {
            debug!("Installer {:?} not removed: {}", installer_path, e);
        }
        result
    }
}
