use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::error::{LauncherError, LauncherResult};

/// Supported mod loaders.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoaderType {
    #[default]
    Vanilla,
    Forge,
}

impl std::fmt::Display for LoaderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoaderType::Vanilla => write!(f, "vanilla"),
            LoaderType::Forge => write!(f, "forge"),
        }
    }
}

/// Observable lifecycle state of an instance. Never persisted.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InstanceStatus {
    /// Files are missing or unverified.
    #[default]
    NotReady,
    /// A materialize pipeline is running.
    Downloading { progress: u8 },
    /// Ready to launch.
    Ready,
    /// The last materialize attempt failed.
    Failed { message: String },
}

impl InstanceStatus {
    /// Progress in percent; always 0 outside of `Downloading`.
    pub fn progress_percent(&self) -> u8 {
        match self {
            InstanceStatus::Downloading { progress } => (*progress).min(100),
            _ => 0,
        }
    }

    pub fn is_downloading(&self) -> bool {
        matches!(self, InstanceStatus::Downloading { .. })
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, InstanceStatus::Ready)
    }
}

/// Instance metadata persisted to disk as `instance.json`.
///
/// The instance folder doubles as the game root for that instance:
/// - `versions/`   — version JSONs and client jars
/// - `libraries/`  — library jars
/// - `assets/`     — asset index + objects
/// - `runtime/`    — Java runtimes fetched for this instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub name: String,
    /// Effective version id; rewritten after an overlay install.
    pub version_id: String,
    /// Base game version the instance was created with.
    #[serde(default)]
    pub minecraft_version: String,
    #[serde(default)]
    pub loader: LoaderType,
    #[serde(default)]
    pub loader_version: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_played: Option<DateTime<Utc>>,

    /// Derived from the on-disk location.
    #[serde(skip)]
    pub path: PathBuf,
}

impl Instance {
    pub fn new(
        name: &str,
        minecraft_version: &str,
        loader: LoaderType,
        loader_version: Option<String>,
        instances_dir: &Path,
    ) -> LauncherResult<Self> {
        let name = name.trim().to_string();
        let loader_version = loader_version
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let instance = Self {
            path: instances_dir.join(&name),
            name,
            version_id: minecraft_version.trim().to_string(),
            minecraft_version: minecraft_version.trim().to_string(),
            loader,
            loader_version,
            created_at: Utc::now(),
            last_played: None,
        };
        instance.validate()?;
        Ok(instance)
    }

    pub fn validate(&self) -> LauncherResult<()> {
        validate_instance_name(&self.name)?;

        if self.version_id.trim().is_empty() {
            return Err(LauncherError::InvalidInstance(format!(
                "{}: version id is empty",
                self.name
            )));
        }

        match (self.loader, self.loader_version.as_deref()) {
            (LoaderType::Forge, None) => Err(LauncherError::InvalidInstance(format!(
                "{}: forge instances need a loader version",
                self.name
            ))),
            (LoaderType::Vanilla, Some(v)) => Err(LauncherError::InvalidInstance(format!(
                "{}: vanilla instance carries loader version {v}",
                self.name
            ))),
            _ => Ok(()),
        }
    }

    /// Base version to install an overlay on top of.
    pub fn base_version(&self) -> &str {
        if self.minecraft_version.is_empty() {
            &self.version_id
        } else {
            &self.minecraft_version
        }
    }

    pub fn has_overlay(&self) -> bool {
        self.loader == LoaderType::Forge
    }

    /// Path to this instance's metadata file.
    pub fn config_path(&self) -> PathBuf {
        self.path.join("instance.json")
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.path.join("versions")
    }
}

/// Instance names double as folder names, so they must be a single portable
/// path component.
pub fn validate_instance_name(name: &str) -> LauncherResult<()> {
    const FORBIDDEN: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(LauncherError::InvalidInstance(
            "instance name cannot be empty".into(),
        ));
    }
    if trimmed != name {
        return Err(LauncherError::InvalidInstance(format!(
            "instance name {name:?} has surrounding whitespace"
        )));
    }
    if trimmed == "." || trimmed == ".." || trimmed.ends_with('.') {
        return Err(LauncherError::InvalidInstance(format!(
            "instance name {name:?} is not a valid folder name"
        )));
    }
    if let Some(c) = trimmed
        .chars()
        .find(|c| FORBIDDEN.contains(c) || c.is_control())
    {
        return Err(LauncherError::InvalidInstance(format!(
            "instance name {name:?} contains {c:?}"
        )));
    }
    Ok(())
}
