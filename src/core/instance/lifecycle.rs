// ─── Instance Lifecycle ───
// Drives instances from "files missing" to "ready to run" and launches them.
//
//   materialize:  A. acquire version_id
//                 B. (forge) run the overlay installer, version_id := result
//                 C. acquire the new version_id
//
// The pipeline works on a copy of the record; the copy is committed and
// persisted only when every step succeeded.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::manager::InstanceManager;
use super::model::{Instance, InstanceStatus, LoaderType};
use crate::core::auth::{Authenticator, Session};
use crate::core::downloader::DownloadCoordinator;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::java;
use crate::core::launch::{GameLauncher, LaunchOptions};
use crate::core::loaders::{InstallContext, LoaderInstaller};
use crate::core::version::version_file;

pub const DEFAULT_MAX_MEMORY_MB: u32 = 4096;

/// Input for [`InstanceOrchestrator::create`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInstanceRequest {
    pub name: String,
    pub minecraft_version: String,
    #[serde(default)]
    pub loader: LoaderType,
    #[serde(default)]
    pub loader_version: Option<String>,
}

/// Result of a successful launch.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LaunchedInstance {
    pub name: String,
    pub version_id: String,
    pub pid: u32,
}

/// Committed record plus its observable status.
struct InstanceHandle {
    record: Mutex<Instance>,
    status: watch::Sender<InstanceStatus>,
}

impl InstanceHandle {
    fn new(instance: Instance, status: InstanceStatus) -> Arc<Self> {
        let (status, _) = watch::channel(status);
        Arc::new(Self {
            record: Mutex::new(instance),
            status,
        })
    }
}

/// Moves a status out of `Downloading` when a materialize future is dropped
/// before reaching a terminal state. The committed record is never touched
/// before that point, so only the status needs repair.
struct PipelineGuard<'a> {
    status: &'a watch::Sender<InstanceStatus>,
    finished: bool,
}

impl<'a> PipelineGuard<'a> {
    fn new(status: &'a watch::Sender<InstanceStatus>) -> Self {
        Self {
            status,
            finished: false,
        }
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

impl Drop for PipelineGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.status.send_if_modified(|status| {
            if !status.is_downloading() {
                return false;
            }
            *status = InstanceStatus::Failed {
                message: "materialize was cancelled".to_string(),
            };
            true
        });
        warn!("Materialize cancelled before completion");
    }
}

pub struct InstanceOrchestrator {
    manager: InstanceManager,
    coordinator: DownloadCoordinator,
    installer: Arc<dyn LoaderInstaller>,
    launcher: Arc<dyn GameLauncher>,
    authenticator: Arc<dyn Authenticator>,
    max_memory_mb: u32,
    handles: RwLock<HashMap<String, Arc<InstanceHandle>>>,
}

impl InstanceOrchestrator {
    pub fn new(
        manager: InstanceManager,
        coordinator: DownloadCoordinator,
        installer: Arc<dyn LoaderInstaller>,
        launcher: Arc<dyn GameLauncher>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            manager,
            coordinator,
            installer,
            launcher,
            authenticator,
            max_memory_mb: DEFAULT_MAX_MEMORY_MB,
            handles: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_max_memory_mb(mut self, max_memory_mb: u32) -> Self {
        self.max_memory_mb = max_memory_mb;
        self
    }

    pub fn manager(&self) -> &InstanceManager {
        &self.manager
    }

    async fn handle(&self, name: &str) -> LauncherResult<Arc<InstanceHandle>> {
        self.handles
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| LauncherError::InstanceNotFound(name.to_string()))
    }

    // ── Registry ────────────────────────────────────────

    /// Read every instance from disk and register it, recomputing readiness
    /// from the files actually present.
    pub async fn load_all(&self) -> LauncherResult<Vec<Instance>> {
        let instances = self.manager.list().await?;
        let mut handles = self.handles.write().await;

        for instance in &instances {
            let status = if self.manager.is_ready_on_disk(instance) {
                InstanceStatus::Ready
            } else {
                InstanceStatus::NotReady
            };

            match handles.get(&instance.name) {
                // A running pipeline owns its record.
                Some(existing) if existing.status.borrow().is_downloading() => {}
                Some(existing) => {
                    *existing.record.lock().await = instance.clone();
                    existing.status.send_replace(status);
                }
                None => {
                    handles.insert(
                        instance.name.clone(),
                        InstanceHandle::new(instance.clone(), status),
                    );
                }
            }
        }

        info!("Loaded {} instances", instances.len());
        Ok(instances)
    }

    /// Create the instance folder, persist its metadata and register it as
    /// `NotReady`.
    pub async fn create(&self, request: CreateInstanceRequest) -> LauncherResult<Instance> {
        let instance = Instance::new(
            &request.name,
            &request.minecraft_version,
            request.loader,
            request.loader_version,
            self.manager.instances_dir(),
        )?;

        let mut handles = self.handles.write().await;
        if handles.contains_key(&instance.name) {
            return Err(LauncherError::InstanceAlreadyExists(instance.name));
        }
        let created = self.manager.create(instance).await?;
        handles.insert(
            created.name.clone(),
            InstanceHandle::new(created.clone(), InstanceStatus::NotReady),
        );
        Ok(created)
    }

    pub async fn subscribe(&self, name: &str) -> LauncherResult<watch::Receiver<InstanceStatus>> {
        Ok(self.handle(name).await?.status.subscribe())
    }

    pub async fn status(&self, name: &str) -> LauncherResult<InstanceStatus> {
        Ok(self.handle(name).await?.status.borrow().clone())
    }

    /// Committed record of an instance.
    pub async fn instance(&self, name: &str) -> LauncherResult<Instance> {
        Ok(self.handle(name).await?.record.lock().await.clone())
    }

    /// Committed records of every registered instance, sorted by name.
    pub async fn list(&self) -> Vec<Instance> {
        let handles: Vec<Arc<InstanceHandle>> =
            self.handles.read().await.values().cloned().collect();
        let mut instances = Vec::with_capacity(handles.len());
        for handle in handles {
            instances.push(handle.record.lock().await.clone());
        }
        instances.sort_by(|a, b| a.name.cmp(&b.name));
        instances
    }

    // ── Materialize ─────────────────────────────────────

    /// Bring the instance to `Ready`. A no-op on an instance that already is.
    pub async fn materialize(&self, name: &str) -> LauncherResult<Instance> {
        self.run_materialize(name, false).await
    }

    /// Run the pipeline even if the instance is already `Ready`.
    pub async fn rematerialize(&self, name: &str) -> LauncherResult<Instance> {
        self.run_materialize(name, true).await
    }

    /// [`materialize`](Self::materialize) on a background task.
    pub fn spawn_materialize(self: Arc<Self>, name: String) -> JoinHandle<LauncherResult<Instance>> {
        tokio::spawn(async move { self.materialize(&name).await })
    }

    #[instrument(skip(self))]
    async fn run_materialize(&self, name: &str, force: bool) -> LauncherResult<Instance> {
        let handle = self.handle(name).await?;

        let mut already_ready = false;
        let started = handle.status.send_if_modified(|status| match status {
            InstanceStatus::Downloading { .. } => false,
            InstanceStatus::Ready if !force => {
                already_ready = true;
                false
            }
            _ => {
                *status = InstanceStatus::Downloading { progress: 0 };
                true
            }
        });

        if already_ready {
            debug!("{} is already ready", name);
            return Ok(handle.record.lock().await.clone());
        }
        if !started {
            return Err(LauncherError::AlreadyInProgress(name.to_string()));
        }

        info!("Materializing {}", name);
        let mut guard = PipelineGuard::new(&handle.status);
        let working = handle.record.lock().await.clone();
        let outcome = match self.run_pipeline(working, &handle.status).await {
            Ok(updated) => self.manager.save(&updated).await.map(|()| updated),
            Err(e) => Err(e),
        };

        let mut record = handle.record.lock().await;
        match outcome {
            Ok(updated) => {
                *record = updated.clone();
                handle.status.send_replace(InstanceStatus::Ready);
                guard.finish();
                info!("{} is ready ({})", name, updated.version_id);
                Ok(updated)
            }
            Err(e) => {
                if let Err(save_err) = self.manager.save(&record).await {
                    warn!("Could not persist {} after failure: {}", name, save_err);
                }
                handle.status.send_replace(InstanceStatus::Failed {
                    message: e.to_string(),
                });
                guard.finish();
                warn!("Materializing {} failed: {}", name, e);
                Err(e)
            }
        }
    }

    async fn run_pipeline(
        &self,
        mut working: Instance,
        status: &watch::Sender<InstanceStatus>,
    ) -> LauncherResult<Instance> {
        let root = working.path.clone();
        let report = |progress: u8| {
            status.send_replace(InstanceStatus::Downloading { progress });
        };

        // A
        self.coordinator
            .acquire(&root, &working.version_id, report)
            .await?;

        if !working.has_overlay() {
            return Ok(working);
        }

        // B
        let overlay_installed = working.version_id != working.base_version()
            && version_file::version_dir(&root, &working.version_id).is_dir();
        if overlay_installed {
            debug!("Overlay {} already installed", working.version_id);
            return Ok(working);
        }

        let loader_version = working.loader_version.clone().ok_or_else(|| {
            LauncherError::InvalidInstance(format!("{}: missing loader version", working.name))
        })?;
        let base_version = working.base_version().to_string();
        let overlay_id = self
            .installer
            .install(InstallContext {
                instance_root: &root,
                minecraft_version: &base_version,
                loader_version: &loader_version,
            })
            .await?;
        working.version_id = overlay_id;

        // C
        status.send_replace(InstanceStatus::Downloading { progress: 0 });
        self.coordinator
            .acquire(&root, &working.version_id, report)
            .await?;

        Ok(working)
    }

    // ── Launch ──────────────────────────────────────────

    /// Start a `Ready` instance. Without a session the authenticator's
    /// (offline by default) session is used. Never changes the status.
    #[instrument(skip(self, session))]
    pub async fn launch(
        &self,
        name: &str,
        session: Option<Session>,
    ) -> LauncherResult<LaunchedInstance> {
        let handle = self.handle(name).await?;
        if !handle.status.borrow().is_ready() {
            return Err(LauncherError::NotReady(name.to_string()));
        }
        let instance = handle.record.lock().await.clone();

        let metadata = self
            .coordinator
            .distribution()
            .get_version_metadata(&instance.path, &instance.version_id)
            .await?;
        let java_path = java::require_runtime_binary(&instance.path, &metadata.java.component)?;

        let session = match session {
            Some(session) => session,
            None => self
                .authenticator
                .current_session()
                .await
                .unwrap_or_default(),
        };
        if !session.is_valid() {
            return Err(LauncherError::LaunchFailed(format!(
                "session for {:?} is incomplete",
                session.username
            )));
        }

        let options = LaunchOptions {
            session,
            java_path,
            max_memory_mb: self.max_memory_mb,
        };
        let process = self
            .launcher
            .launch(&instance.path, &instance.version_id, &options)
            .await?;
        info!("Launched {} (pid {})", name, process.pid);

        let mut record = handle.record.lock().await;
        record.last_played = Some(Utc::now());
        if let Err(e) = self.manager.save(&record).await {
            warn!("Could not record last launch of {}: {}", name, e);
        }

        Ok(LaunchedInstance {
            name: name.to_string(),
            version_id: instance.version_id,
            pid: process.pid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use tokio::sync::mpsc::UnboundedSender;
    use tokio::sync::Notify;

    use crate::core::auth::OfflineAuthenticator;
    use crate::core::downloader::FileProgress;
    use crate::core::error::ErrorKind;
    use crate::core::launch::LaunchedProcess;
    use crate::core::version::{
        DistributionService, JavaVersionInfo, VersionMetadata, VersionSummary,
    };

    const RUNTIME: &str = "java-runtime-gamma";

    #[derive(Default)]
    struct FakeDistribution {
        requested: StdMutex<Vec<String>>,
        fetches: AtomicUsize,
        /// Ids whose fetch fails.
        failing: Vec<String>,
        /// Fetches wait here when set.
        gate: Option<Arc<Notify>>,
        /// Status seen right after the last progress event of each fetch.
        probe: StdMutex<Option<watch::Receiver<InstanceStatus>>>,
        observed: StdMutex<Vec<InstanceStatus>>,
    }

    #[async_trait]
    impl DistributionService for FakeDistribution {
        async fn list_versions(&self) -> LauncherResult<Vec<VersionSummary>> {
            Ok(Vec::new())
        }

        async fn get_version_metadata(
            &self,
            _game_root: &Path,
            version_id: &str,
        ) -> LauncherResult<VersionMetadata> {
            self.requested.lock().unwrap().push(version_id.to_string());
            Ok(VersionMetadata {
                id: version_id.to_string(),
                java: JavaVersionInfo {
                    component: RUNTIME.into(),
                    major_version: 17,
                },
                files: Vec::new(),
            })
        }

        async fn fetch_and_verify(
            &self,
            _game_root: &Path,
            metadata: &VersionMetadata,
            progress: UnboundedSender<FileProgress>,
        ) -> LauncherResult<()> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.failing.contains(&metadata.id) {
                return Err(LauncherError::DownloadFailed {
                    url: format!("https://example.invalid/{}", metadata.id),
                    status: 404,
                });
            }
            for completed in 0..=10 {
                let _ = progress.send(FileProgress {
                    completed,
                    total: 10,
                });
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            let probe = self.probe.lock().unwrap().clone();
            if let Some(rx) = probe {
                self.observed.lock().unwrap().push(rx.borrow().clone());
            }
            Ok(())
        }
    }

    struct FakeInstaller {
        result: Result<String, ErrorKind>,
        calls: StdMutex<Vec<(PathBuf, String, String)>>,
    }

    impl FakeInstaller {
        fn returning(id: &str) -> Self {
            Self {
                result: Ok(id.to_string()),
                calls: StdMutex::new(Vec::new()),
            }
        }

        fn failing(kind: ErrorKind) -> Self {
            Self {
                result: Err(kind),
                calls: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LoaderInstaller for FakeInstaller {
        async fn install(&self, ctx: InstallContext<'_>) -> LauncherResult<String> {
            self.calls.lock().unwrap().push((
                ctx.instance_root.to_path_buf(),
                ctx.minecraft_version.to_string(),
                ctx.loader_version.to_string(),
            ));
            match &self.result {
                Ok(id) => {
                    std::fs::create_dir_all(version_file::version_dir(ctx.instance_root, id))
                        .unwrap();
                    Ok(id.clone())
                }
                Err(ErrorKind::Discovery) => Err(LauncherError::DiscoveryFailure(
                    "no forge folder for 1.20.1".into(),
                )),
                Err(_) => Err(LauncherError::InstallerFailure("exit status: 1".into())),
            }
        }
    }

    #[derive(Default)]
    struct FakeLauncher {
        launches: StdMutex<Vec<(String, LaunchOptions)>>,
    }

    #[async_trait]
    impl GameLauncher for FakeLauncher {
        async fn launch(
            &self,
            _game_root: &Path,
            version_id: &str,
            options: &LaunchOptions,
        ) -> LauncherResult<LaunchedProcess> {
            self.launches
                .lock()
                .unwrap()
                .push((version_id.to_string(), options.clone()));
            Ok(LaunchedProcess { pid: 4242 })
        }
    }

    struct Harness {
        root: PathBuf,
        distribution: Arc<FakeDistribution>,
        installer: Arc<FakeInstaller>,
        launcher: Arc<FakeLauncher>,
        orchestrator: Arc<InstanceOrchestrator>,
    }

    impl Harness {
        fn new(label: &str, distribution: FakeDistribution, installer: FakeInstaller) -> Self {
            let root = std::env::temp_dir().join(format!(
                "instancer-lifecycle-{}-{}",
                label,
                std::process::id()
            ));
            let _ = std::fs::remove_dir_all(&root);
            std::fs::create_dir_all(&root).unwrap();

            let distribution = Arc::new(distribution);
            let installer = Arc::new(installer);
            let launcher = Arc::new(FakeLauncher::default());
            let orchestrator = InstanceOrchestrator::new(
                InstanceManager::new(root.clone()),
                DownloadCoordinator::new(distribution.clone()),
                installer.clone(),
                launcher.clone(),
                Arc::new(OfflineAuthenticator::new("Steve")),
            )
            .with_max_memory_mb(3072);

            Self {
                root,
                distribution,
                installer,
                launcher,
                orchestrator: Arc::new(orchestrator),
            }
        }

        async fn create(&self, name: &str, loader_version: Option<&str>) -> Instance {
            self.orchestrator
                .create(CreateInstanceRequest {
                    name: name.into(),
                    minecraft_version: "1.20.1".into(),
                    loader: if loader_version.is_some() {
                        LoaderType::Forge
                    } else {
                        LoaderType::Vanilla
                    },
                    loader_version: loader_version.map(str::to_owned),
                })
                .await
                .unwrap()
        }

        fn install_runtime(&self, instance: &Instance) {
            let bin = java::resolve_runtime_binary(&instance.path, RUNTIME).unwrap();
            std::fs::create_dir_all(bin.parent().unwrap()).unwrap();
            std::fs::write(bin, b"").unwrap();
        }
    }

    impl Drop for Harness {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.root);
        }
    }

    #[tokio::test]
    async fn vanilla_instance_becomes_ready_with_full_progress() {
        let h = Harness::new("vanilla", FakeDistribution::default(), FakeInstaller::returning("unused"));
        h.create("Survival", None).await;
        *h.distribution.probe.lock().unwrap() =
            Some(h.orchestrator.subscribe("Survival").await.unwrap());

        let instance = h.orchestrator.materialize("Survival").await.unwrap();

        assert_eq!(instance.version_id, "1.20.1");
        assert_eq!(
            h.distribution.observed.lock().unwrap().last(),
            Some(&InstanceStatus::Downloading { progress: 100 })
        );
        let status = h.orchestrator.status("Survival").await.unwrap();
        assert_eq!(status, InstanceStatus::Ready);
        assert_eq!(status.progress_percent(), 0);
        assert_eq!(*h.distribution.requested.lock().unwrap(), vec!["1.20.1"]);
        assert!(h.installer.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn forge_instance_switches_to_discovered_version() {
        let h = Harness::new(
            "forge",
            FakeDistribution::default(),
            FakeInstaller::returning("1.20.1-forge-47.2.0"),
        );
        let created = h.create("Modded", Some("47.2.0")).await;

        let instance = h.orchestrator.materialize("Modded").await.unwrap();

        assert_eq!(instance.version_id, "1.20.1-forge-47.2.0");
        assert_eq!(instance.minecraft_version, "1.20.1");
        assert_eq!(
            *h.distribution.requested.lock().unwrap(),
            vec!["1.20.1", "1.20.1-forge-47.2.0"]
        );
        assert_eq!(
            *h.installer.calls.lock().unwrap(),
            vec![(created.path.clone(), "1.20.1".to_string(), "47.2.0".to_string())]
        );
        assert!(h.orchestrator.status("Modded").await.unwrap().is_ready());

        let persisted = h.orchestrator.manager().load("Modded").await.unwrap();
        assert_eq!(persisted.version_id, "1.20.1-forge-47.2.0");
    }

    #[tokio::test]
    async fn discovery_failure_leaves_version_untouched() {
        let h = Harness::new(
            "discovery",
            FakeDistribution::default(),
            FakeInstaller::failing(ErrorKind::Discovery),
        );
        h.create("Modded", Some("47.2.0")).await;

        let err = h.orchestrator.materialize("Modded").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Discovery);
        let status = h.orchestrator.status("Modded").await.unwrap();
        assert!(matches!(status, InstanceStatus::Failed { ref message } if message.contains("forge")));
        assert_eq!(status.progress_percent(), 0);
        assert_eq!(h.orchestrator.instance("Modded").await.unwrap().version_id, "1.20.1");
        assert_eq!(
            h.orchestrator.manager().load("Modded").await.unwrap().version_id,
            "1.20.1"
        );
    }

    #[tokio::test]
    async fn final_acquisition_failure_rolls_back_overlay_id() {
        let h = Harness::new(
            "rollback",
            FakeDistribution {
                failing: vec!["1.20.1-forge-47.2.0".into()],
                ..Default::default()
            },
            FakeInstaller::returning("1.20.1-forge-47.2.0"),
        );
        h.create("Modded", Some("47.2.0")).await;

        let err = h.orchestrator.materialize("Modded").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(h.orchestrator.instance("Modded").await.unwrap().version_id, "1.20.1");
        assert_eq!(
            h.orchestrator.manager().load("Modded").await.unwrap().version_id,
            "1.20.1"
        );
        assert!(matches!(
            h.orchestrator.status("Modded").await.unwrap(),
            InstanceStatus::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn launch_before_materialize_is_rejected() {
        let h = Harness::new("notready", FakeDistribution::default(), FakeInstaller::returning("unused"));
        h.create("Fresh", None).await;

        let err = h.orchestrator.launch("Fresh", None).await.unwrap_err();

        assert!(matches!(err, LauncherError::NotReady(_)));
        assert!(h.launcher.launches.lock().unwrap().is_empty());
        assert_eq!(
            h.orchestrator.status("Fresh").await.unwrap(),
            InstanceStatus::NotReady
        );
    }

    #[tokio::test]
    async fn second_materialize_while_downloading_is_rejected() {
        let gate = Arc::new(Notify::new());
        let h = Harness::new(
            "concurrent",
            FakeDistribution {
                gate: Some(gate.clone()),
                ..Default::default()
            },
            FakeInstaller::returning("unused"),
        );
        h.create("Busy", None).await;
        let mut rx = h.orchestrator.subscribe("Busy").await.unwrap();

        let first = h.orchestrator.clone().spawn_materialize("Busy".into());
        rx.wait_for(|s| s.is_downloading()).await.unwrap();

        let err = h.orchestrator.materialize("Busy").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyInProgress);

        gate.notify_one();
        first.await.unwrap().unwrap();
        assert!(h.orchestrator.status("Busy").await.unwrap().is_ready());
        assert_eq!(h.distribution.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropped_materialize_does_not_stay_downloading() {
        let gate = Arc::new(Notify::new());
        let h = Harness::new(
            "dropped",
            FakeDistribution {
                gate: Some(gate.clone()),
                ..Default::default()
            },
            FakeInstaller::returning("unused"),
        );
        h.create("Dropped", None).await;

        let timed_out = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            h.orchestrator.materialize("Dropped"),
        )
        .await;
        assert!(timed_out.is_err());

        let status = h.orchestrator.status("Dropped").await.unwrap();
        assert!(!status.is_downloading());
        assert!(matches!(status, InstanceStatus::Failed { .. }));
        assert_eq!(
            h.orchestrator.manager().load("Dropped").await.unwrap().version_id,
            "1.20.1"
        );

        gate.notify_one();
        let instance = h.orchestrator.materialize("Dropped").await.unwrap();
        assert_eq!(instance.version_id, "1.20.1");
        assert!(h.orchestrator.status("Dropped").await.unwrap().is_ready());
    }

    #[tokio::test]
    async fn materialize_on_ready_instance_is_a_no_op() {
        let h = Harness::new("idempotent", FakeDistribution::default(), FakeInstaller::returning("unused"));
        h.create("Stable", None).await;

        h.orchestrator.materialize("Stable").await.unwrap();
        h.orchestrator.materialize("Stable").await.unwrap();
        assert_eq!(h.distribution.fetches.load(Ordering::SeqCst), 1);

        h.orchestrator.rematerialize("Stable").await.unwrap();
        assert_eq!(h.distribution.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rematerialize_skips_installed_overlay() {
        let h = Harness::new(
            "overlay-skip",
            FakeDistribution::default(),
            FakeInstaller::returning("1.20.1-forge-47.2.0"),
        );
        h.create("Modded", Some("47.2.0")).await;
        h.orchestrator.materialize("Modded").await.unwrap();

        h.orchestrator.rematerialize("Modded").await.unwrap();

        assert_eq!(h.installer.calls.lock().unwrap().len(), 1);
        assert_eq!(
            h.distribution.requested.lock().unwrap().last().map(String::as_str),
            Some("1.20.1-forge-47.2.0")
        );
    }

    #[tokio::test]
    async fn failed_instance_can_be_retried() {
        let h = Harness::new(
            "retry",
            FakeDistribution::default(),
            FakeInstaller::failing(ErrorKind::Installer),
        );
        h.create("Flaky", Some("47.2.0")).await;

        let err = h.orchestrator.materialize("Flaky").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Installer);

        let err = h.orchestrator.materialize("Flaky").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Installer);
        assert_eq!(h.installer.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_runtime_fails_launch_without_changing_status() {
        let h = Harness::new("noruntime", FakeDistribution::default(), FakeInstaller::returning("unused"));
        h.create("Survival", None).await;
        h.orchestrator.materialize("Survival").await.unwrap();

        let err = h.orchestrator.launch("Survival", None).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::RuntimeNotFound);
        assert!(h.launcher.launches.lock().unwrap().is_empty());
        assert!(h.orchestrator.status("Survival").await.unwrap().is_ready());
    }

    #[tokio::test]
    async fn launch_uses_resolved_runtime_and_session() {
        let h = Harness::new("launch", FakeDistribution::default(), FakeInstaller::returning("unused"));
        let created = h.create("Survival", None).await;
        h.install_runtime(&created);
        h.orchestrator.materialize("Survival").await.unwrap();

        let launched = h.orchestrator.launch("Survival", None).await.unwrap();
        assert_eq!(
            launched,
            LaunchedInstance {
                name: "Survival".into(),
                version_id: "1.20.1".into(),
                pid: 4242,
            }
        );

        {
            let launches = h.launcher.launches.lock().unwrap();
            let (version_id, options) = &launches[0];
            assert_eq!(version_id, "1.20.1");
            assert_eq!(options.session.username, "Steve");
            assert_eq!(options.max_memory_mb, 3072);
            assert_eq!(
                options.java_path,
                java::resolve_runtime_binary(&created.path, RUNTIME).unwrap()
            );
        }

        let explicit = Session::offline("Alex");
        h.orchestrator
            .launch("Survival", Some(explicit.clone()))
            .await
            .unwrap();
        assert_eq!(h.launcher.launches.lock().unwrap()[1].1.session, explicit);

        let persisted = h.orchestrator.manager().load("Survival").await.unwrap();
        assert!(persisted.last_played.is_some());
    }

    #[tokio::test]
    async fn load_all_recomputes_readiness_from_disk() {
        let h = Harness::new("load", FakeDistribution::default(), FakeInstaller::returning("unused"));
        let ready = h.create("OnDisk", None).await;
        h.create("Empty", None).await;

        let dir = version_file::version_dir(&ready.path, "1.20.1");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("1.20.1.json"),
            r#"{"id":"1.20.1","mainClass":"net.minecraft.client.main.Main"}"#,
        )
        .unwrap();
        std::fs::write(dir.join("1.20.1.jar"), b"jar").unwrap();

        let fresh = InstanceOrchestrator::new(
            InstanceManager::new(h.root.clone()),
            DownloadCoordinator::new(h.distribution.clone()),
            h.installer.clone(),
            h.launcher.clone(),
            Arc::new(OfflineAuthenticator::default()),
        );
        let loaded = fresh.load_all().await.unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(fresh.status("OnDisk").await.unwrap(), InstanceStatus::Ready);
        assert_eq!(fresh.status("Empty").await.unwrap(), InstanceStatus::NotReady);
        let names: Vec<String> = fresh.list().await.into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["Empty", "OnDisk"]);
    }

    #[tokio::test]
    async fn duplicate_and_unknown_names_are_rejected() {
        let h = Harness::new("names", FakeDistribution::default(), FakeInstaller::returning("unused"));
        h.create("Twice", None).await;

        let err = h
            .orchestrator
            .create(CreateInstanceRequest {
                name: "Twice".into(),
                minecraft_version: "1.20.1".into(),
                loader: LoaderType::Vanilla,
                loader_version: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::InstanceAlreadyExists(_)));

        let err = h.orchestrator.materialize("Nobody").await.unwrap_err();
        assert!(matches!(err, LauncherError::InstanceNotFound(_)));
    }
}
