use async_trait::async_trait;

use super::context::InstallContext;
use crate::core::error::LauncherResult;

/// Installs a loader overlay on top of a materialized base version.
#[async_trait]
pub trait LoaderInstaller: Send + Sync {
    /// Returns the version id (folder name under `versions/`) the instance
    /// should launch from now on.
    async fn install(&self, ctx: InstallContext<'_>) -> LauncherResult<String>;
}
