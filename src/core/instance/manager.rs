use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::model::{validate_instance_name, Instance};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::version;

/// Manages instance folders and their `instance.json` metadata on disk.
pub struct InstanceManager {
    /// Root directory where all instances live.
    instances_dir: PathBuf,
}

impl InstanceManager {
    pub fn new(instances_dir: PathBuf) -> Self {
        Self { instances_dir }
    }

    pub fn instances_dir(&self) -> &Path {
        &self.instances_dir
    }

    /// Create the instance folder and persist `instance.json` right away.
    ///
    /// Creates:
    /// - `<instance>/versions/`
    /// - `<instance>/instance.json`
    pub async fn create(&self, mut instance: Instance) -> LauncherResult<Instance> {
        instance.validate()?;
        instance.path = self.instances_dir.join(&instance.name);

        if instance.path.exists() {
            return Err(LauncherError::InstanceAlreadyExists(instance.name.clone()));
        }

        create_dir_safe(&instance.versions_dir()).await?;
        self.save(&instance).await?;

        info!(
            "Created instance '{}' ({} {})",
            instance.name, instance.loader, instance.version_id
        );
        Ok(instance)
    }

    /// Save instance metadata to disk.
    pub async fn save(&self, instance: &Instance) -> LauncherResult<()> {
        let json = serde_json::to_string_pretty(instance)?;
        let config_path = instance.config_path();

        if let Some(parent) = config_path.parent() {
            create_dir_safe(parent).await?;
        }

        tokio::fs::write(&config_path, json)
            .await
            .map_err(|e| LauncherError::io(config_path, e))?;

        Ok(())
    }

    /// Load a single instance by name.
    pub async fn load(&self, name: &str) -> LauncherResult<Instance> {
        validate_instance_name(name)?;
        let instance_dir = self.instances_dir.join(name);
        let config_path = instance_dir.join("instance.json");
        if !config_path.exists() {
            return Err(LauncherError::InstanceNotFound(name.to_string()));
        }

        read_instance(&instance_dir).await
    }

    /// List all instances, skipping folders with unreadable metadata.
    pub async fn list(&self) -> LauncherResult<Vec<Instance>> {
        let mut instances = Vec::new();

        if !self.instances_dir.exists() {
            return Ok(instances);
        }

        let mut entries = tokio::fs::read_dir(&self.instances_dir)
            .await
            .map_err(|e| LauncherError::io(&self.instances_dir, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| LauncherError::io(&self.instances_dir, e))?
        {
            let path = entry.path();
            if !path.is_dir() || !path.join("instance.json").exists() {
                continue;
            }
            match read_instance(&path).await {
                Ok(instance) => instances.push(instance),
                Err(e) => warn!("Skipping instance at {:?}: {}", path, e),
            }
        }

        instances.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(instances)
    }

    /// Whether the instance's version is materialized on disk.
    ///
    /// Stale metadata is never trusted: this looks for the version JSON and the
    /// client jar it resolves to.
    pub fn is_ready_on_disk(&self, instance: &Instance) -> bool {
        version::is_version_installed(&instance.path, &instance.version_id)
    }
}

async fn read_instance(instance_dir: &Path) -> LauncherResult<Instance> {
    let config_path = instance_dir.join("instance.json");
    let json = tokio::fs::read_to_string(&config_path)
        .await
        .map_err(|e| LauncherError::io(&config_path, e))?;

    let mut instance: Instance = serde_json::from_str(&json)?;
    instance.path = instance_dir.to_path_buf();

    // The folder is the source of truth for the name.
    if let Some(folder) = instance_dir.file_name().and_then(|n| n.to_str()) {
        if folder != instance.name {
            warn!(
                "instance.json in {:?} names '{}', using folder name",
                instance_dir, instance.name
            );
            instance.name = folder.to_string();
        }
    }
    if instance.minecraft_version.is_empty() {
        instance.minecraft_version = instance.version_id.clone();
    }
    instance.validate()?;
    Ok(instance)
}

async fn create_dir_safe(path: &Path) -> LauncherResult<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| LauncherError::io(path, source))
}
