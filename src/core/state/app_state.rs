use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::auth::OfflineAuthenticator;
use crate::core::downloader::{DownloadCoordinator, Downloader};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::build_http_client;
use crate::core::instance::{InstanceManager, InstanceOrchestrator};
use crate::core::launch::ProcessLauncher;
use crate::core::loaders::{ForgeInstaller, ForgeVersionIndex};
use crate::core::version::MojangDistribution;

const APP_DIR_NAME: &str = "Instancer";
const BOOTSTRAP_FILE: &str = "launcher_bootstrap.json";
const SETTINGS_FILE: &str = "launcher_settings.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherSettings {
    /// Where instance folders live. `None` means `<data_dir>/instances`.
    pub instances_dir: Option<PathBuf>,
    /// Shared game root the overlay installer writes into.
    pub shared_root: PathBuf,
    pub installer_timeout_secs: u64,
    pub download_concurrency: usize,
    pub max_memory_mb: u32,
    pub offline_username: String,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            instances_dir: None,
            shared_root: default_shared_root(),
            installer_timeout_secs: 600,
            download_concurrency: 8,
            max_memory_mb: 4096,
            offline_username: "Player".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BootstrapConfig {
    data_dir: PathBuf,
}

/// Everything a front-end needs, wired together once.
pub struct AppState {
    pub data_dir: PathBuf,
    pub settings: LauncherSettings,
    pub http_client: Client,
    pub downloader: Arc<Downloader>,
    pub forge_versions: ForgeVersionIndex,
    pub orchestrator: Arc<InstanceOrchestrator>,
}

impl AppState {
    /// State rooted at the default data dir with the settings stored there.
    pub fn new() -> LauncherResult<Self> {
        let data_dir = default_data_dir();
        let settings = load_settings_from_disk(&data_dir).unwrap_or_default();
        Self::from_settings(data_dir, settings)
    }

    pub fn from_settings(data_dir: PathBuf, settings: LauncherSettings) -> LauncherResult<Self> {
        std::fs::create_dir_all(&data_dir).map_err(|e| LauncherError::io(&data_dir, e))?;

        let http_client = build_http_client()?;
        let downloader = Arc::new(
            Downloader::new(http_client.clone()).with_concurrency(settings.download_concurrency),
        );

        let distribution = Arc::new(MojangDistribution::new(downloader.clone()));
        let installer = ForgeInstaller::new(downloader.clone(), settings.shared_root.clone())
            .with_timeout(Duration::from_secs(settings.installer_timeout_secs));

        let instances_dir = settings
            .instances_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("instances"));

        let orchestrator = InstanceOrchestrator::new(
            InstanceManager::new(instances_dir),
            DownloadCoordinator::new(distribution),
            Arc::new(installer),
            Arc::new(ProcessLauncher),
            Arc::new(OfflineAuthenticator::new(settings.offline_username.clone())),
        )
        .with_max_memory_mb(settings.max_memory_mb);

        info!("Launcher data in {:?}", data_dir);
        Ok(Self {
            data_dir,
            forge_versions: ForgeVersionIndex::new(http_client.clone()),
            settings,
            http_client,
            downloader,
            orchestrator: Arc::new(orchestrator),
        })
    }

    pub fn instances_dir(&self) -> &Path {
        self.orchestrator.manager().instances_dir()
    }

    pub fn save_settings(&self) -> LauncherResult<()> {
        let settings_path = self.data_dir.join(SETTINGS_FILE);
        let json = serde_json::to_string_pretty(&self.settings)?;
        std::fs::write(&settings_path, json).map_err(|e| LauncherError::io(settings_path, e))
    }
}

fn load_settings_from_disk(data_dir: &Path) -> Option<LauncherSettings> {
    let path = data_dir.join(SETTINGS_FILE);
    let raw = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(settings) => Some(settings),
        Err(e) => {
            warn!("Ignoring unreadable {:?}: {}", path, e);
            None
        }
    }
}

fn default_base_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// `<data>/Instancer`, unless a bootstrap file points somewhere else.
fn default_data_dir() -> PathBuf {
    let base = default_base_dir();
    let bootstrap_path = base.join(BOOTSTRAP_FILE);

    if let Ok(raw) = std::fs::read_to_string(&bootstrap_path) {
        if let Ok(cfg) = serde_json::from_str::<BootstrapConfig>(&raw) {
            return cfg.data_dir;
        }
    }

    base.join(APP_DIR_NAME)
}

/// Platform `.minecraft` location.
pub fn default_shared_root() -> PathBuf {
    if cfg!(target_os = "windows") {
        default_base_dir().join(".minecraft")
    } else if cfg!(target_os = "macos") {
        default_base_dir().join("minecraft")
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".minecraft")
    }
}
