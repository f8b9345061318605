use std::path::Path;
use std::sync::Arc;

use tracing::{debug, instrument};

use super::client::FileProgress;
use crate::core::error::LauncherResult;
use crate::core::version::{DistributionService, VersionMetadata};

/// Turns a fetch-and-verify pass into a percentage stream.
#[derive(Clone)]
pub struct DownloadCoordinator {
    distribution: Arc<dyn DistributionService>,
}

impl DownloadCoordinator {
    pub fn new(distribution: Arc<dyn DistributionService>) -> Self {
        Self { distribution }
    }

    pub fn distribution(&self) -> &Arc<dyn DistributionService> {
        &self.distribution
    }

    /// Resolve `version_id` and make every file it needs present under
    /// `game_root`, calling `on_percent` as files complete.
    #[instrument(skip(self, game_root, on_percent))]
    pub async fn acquire<F>(
        &self,
        game_root: &Path,
        version_id: &str,
        mut on_percent: F,
    ) -> LauncherResult<VersionMetadata>
    where
        F: FnMut(u8) + Send,
    {
        let metadata = self
            .distribution
            .get_version_metadata(game_root, version_id)
            .await?;

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let fetch = self.distribution.fetch_and_verify(game_root, &metadata, tx);
        // The sender is moved into `fetch`, so the drain ends when it does.
        let drain = async {
            while let Some(event) = rx.recv().await {
                if let Some(percent) = percent_for(event) {
                    on_percent(percent);
                }
            }
        };
        let (result, ()) = tokio::join!(fetch, drain);
        result?;

        debug!("Acquired {} ({} files)", metadata.id, metadata.files.len());
        Ok(metadata)
    }
}

/// `floor(completed / total * 100)`, clamped to 100. `None` when nothing is
/// being counted.
pub fn percent_for(progress: FileProgress) -> Option<u8> {
    if progress.total == 0 {
        return None;
    }
    let percent = (progress.completed as u64 * 100) / progress.total as u64;
    Some(percent.min(100) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::LauncherError;
    use crate::core::version::{JavaVersionInfo, VersionSummary};
    use async_trait::async_trait;
    use tokio::sync::mpsc::UnboundedSender;

    struct ScriptedDistribution {
        events: Vec<(usize, usize)>,
        fail: bool,
    }

    #[async_trait]
    impl DistributionService for ScriptedDistribution {
        async fn list_versions(&self) -> LauncherResult<Vec<VersionSummary>> {
            Ok(Vec::new())
        }

        async fn get_version_metadata(
            &self,
            _game_root: &Path,
            version_id: &str,
        ) -> LauncherResult<VersionMetadata> {
            Ok(VersionMetadata {
                id: version_id.to_string(),
                java: JavaVersionInfo::legacy(),
                files: Vec::new(),
            })
        }

        async fn fetch_and_verify(
            &self,
            _game_root: &Path,
            _metadata: &VersionMetadata,
            progress: UnboundedSender<FileProgress>,
        ) -> LauncherResult<()> {
            for &(completed, total) in &self.events {
                let _ = progress.send(FileProgress { completed, total });
            }
            if self.fail {
                return Err(LauncherError::DownloadFailed {
                    url: "https://example.invalid/client.jar".into(),
                    status: 503,
                });
            }
            Ok(())
        }
    }

    async fn run(events: Vec<(usize, usize)>, fail: bool) -> (LauncherResult<VersionMetadata>, Vec<u8>) {
        let coordinator = DownloadCoordinator::new(Arc::new(ScriptedDistribution { events, fail }));
        let mut seen = Vec::new();
        let result = coordinator
            .acquire(Path::new("/unused"), "1.20.1", |p| seen.push(p))
            .await;
        (result, seen)
    }

    #[test]
    fn percent_is_floored_and_clamped() {
        assert_eq!(percent_for(FileProgress { completed: 0, total: 3 }), Some(0));
        assert_eq!(percent_for(FileProgress { completed: 1, total: 3 }), Some(33));
        assert_eq!(percent_for(FileProgress { completed: 2, total: 3 }), Some(66));
        assert_eq!(percent_for(FileProgress { completed: 3, total: 3 }), Some(100));
        assert_eq!(percent_for(FileProgress { completed: 7, total: 3 }), Some(100));
        assert_eq!(percent_for(FileProgress { completed: 0, total: 0 }), None);
    }

    #[tokio::test]
    async fn progress_events_become_percentages() {
        let (result, seen) = run(vec![(0, 4), (1, 4), (2, 4), (4, 4)], false).await;
        assert_eq!(result.unwrap().id, "1.20.1");
        assert_eq!(seen, vec![0, 25, 50, 100]);
    }

    #[tokio::test]
    async fn empty_manifest_emits_nothing() {
        let (result, seen) = run(vec![(0, 0)], false).await;
        assert!(result.is_ok());
        assert!(seen.is_empty());
    }

    #[tokio::test]
    async fn service_errors_are_returned() {
        let (result, seen) = run(vec![(0, 2), (1, 2)], true).await;
        assert!(matches!(
            result,
            Err(LauncherError::DownloadFailed { status: 503, .. })
        ));
        assert_eq!(seen, vec![0, 50]);
    }
}
