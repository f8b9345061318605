pub mod classpath;
pub mod task;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::core::auth::Session;
use crate::core::error::LauncherResult;

pub use task::ProcessLauncher;

/// Everything the game process needs beyond the version files.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub session: Session,
    pub java_path: PathBuf,
    pub max_memory_mb: u32,
}

/// Handle to a started game process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchedProcess {
    pub pid: u32,
}

/// Starts a materialized version from a game root.
#[async_trait]
pub trait GameLauncher: Send + Sync {
    async fn launch(
        &self,
        game_root: &Path,
        version_id: &str,
        options: &LaunchOptions,
    ) -> LauncherResult<LaunchedProcess>;
}
