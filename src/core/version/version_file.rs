// ─── Version File ───
// Parses a version JSON, resolves `inheritsFrom` chains and evaluates OS rules
// for libraries and arguments.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::error::{LauncherError, LauncherResult};

const LIBRARIES_BASE: &str = "https://libraries.minecraft.net";
const MAX_INHERITANCE_DEPTH: usize = 8;

/// A fully parsed version JSON (after inheritance resolution when loaded
/// through [`load_resolved`]).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionJson {
    pub id: String,
    #[serde(default)]
    pub main_class: String,
    #[serde(default)]
    pub inherits_from: Option<String>,
    /// Id of the version whose client jar this version runs on.
    #[serde(default)]
    pub jar: Option<String>,
    #[serde(rename = "type", default)]
    pub version_type: Option<String>,
    #[serde(default)]
    pub libraries: Vec<LibraryEntry>,
    #[serde(default)]
    pub downloads: Option<VersionDownloads>,
    #[serde(default)]
    pub asset_index: Option<AssetIndexInfo>,
    #[serde(default)]
    pub assets: Option<String>,
    #[serde(default)]
    pub arguments: Option<Arguments>,
    /// Legacy `minecraftArguments` field (pre-1.13).
    #[serde(default)]
    pub minecraft_arguments: Option<String>,
    #[serde(default)]
    pub java_version: Option<JavaVersionInfo>,
}

/// Java runtime a version asks for (`javaVersion` in the version JSON).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JavaVersionInfo {
    #[serde(default = "default_runtime_component")]
    pub component: String,
    pub major_version: u32,
}

impl JavaVersionInfo {
    /// Runtime used by versions that predate the `javaVersion` field.
    pub fn legacy() -> Self {
        Self {
            component: default_runtime_component(),
            major_version: 8,
        }
    }
}

fn default_runtime_component() -> String {
    "jre-legacy".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionDownloads {
    pub client: Option<DownloadArtifact>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadArtifact {
    pub sha1: String,
    pub size: u64,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndexInfo {
    pub id: String,
    pub sha1: String,
    #[serde(default)]
    pub size: Option<u64>,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Arguments {
    #[serde(default)]
    pub game: Vec<serde_json::Value>,
    #[serde(default)]
    pub jvm: Vec<serde_json::Value>,
}

// ─── Library Entry with Rules ───

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryEntry {
    pub name: String,
    #[serde(default)]
    pub downloads: Option<LibraryDownloads>,
    /// Maven repository base for libraries without a `downloads` block.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub rules: Option<Vec<LibraryRule>>,
    #[serde(default)]
    pub natives: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryDownloads {
    pub artifact: Option<LibDownloadArtifact>,
    #[serde(default)]
    pub classifiers: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibDownloadArtifact {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub url: String,
}

/// Resolved on-disk location and source of one library file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryFile {
    /// Path relative to the `libraries/` directory.
    pub path: PathBuf,
    /// Empty when the file is produced locally (e.g. by an installer).
    pub url: Option<String>,
    pub sha1: Option<String>,
    pub size: Option<u64>,
}

// ─── OS Rule Evaluation ───

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryRule {
    pub action: RuleAction,
    #[serde(default)]
    pub os: Option<OsRule>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OsRule {
    #[serde(default)]
    pub name: Option<String>,
}

impl LibraryEntry {
    /// Evaluate whether this library should be included for the current OS.
    ///
    /// No rules means allowed. Otherwise start disallowed and let every
    /// matching rule overwrite the decision, top to bottom.
    pub fn is_allowed_for_current_os(&self) -> bool {
        let rules = match &self.rules {
            Some(r) => r,
            None => return true,
        };

        let current_os = current_os_name();
        let mut allowed = false;

        for rule in rules {
            let os_matches = match rule.os.as_ref().and_then(|os| os.name.as_deref()) {
                None => true,
                Some(name) => name == current_os,
            };

            if os_matches {
                allowed = rule.action == RuleAction::Allow;
            }
        }

        allowed
    }

    /// Native classifier for the current OS (legacy `natives` map).
    pub fn native_classifier_for_current_os(&self) -> Option<String> {
        let natives = self.natives.as_ref()?;
        let os = current_os_name();
        natives.as_object()?.get(os)?.as_str().map(|s| {
            let arch = if cfg!(target_pointer_width = "64") {
                "64"
            } else {
                "32"
            };
            s.replace("${arch}", arch)
        })
    }

    /// Main artifact of this library, if it has one.
    pub fn artifact_file(&self) -> Option<LibraryFile> {
        match &self.downloads {
            Some(downloads) => {
                let artifact = downloads.artifact.as_ref()?;
                let path = match &artifact.path {
                    Some(p) if !p.is_empty() => PathBuf::from(p),
                    _ => maven_path(&self.name)?,
                };
                Some(LibraryFile {
                    path,
                    url: Some(artifact.url.clone()).filter(|u| !u.trim().is_empty()),
                    sha1: artifact.sha1.clone(),
                    size: artifact.size,
                })
            }
            None => {
                let path = maven_path(&self.name)?;
                let base = self.url.as_deref().unwrap_or(LIBRARIES_BASE);
                let url = format!(
                    "{}/{}",
                    base.trim_end_matches('/'),
                    path.to_string_lossy().replace('\\', "/")
                );
                Some(LibraryFile {
                    path,
                    url: Some(url),
                    sha1: None,
                    size: None,
                })
            }
        }
    }

    /// Legacy native jar for the current OS, if any.
    pub fn native_file(&self) -> Option<LibraryFile> {
        let classifier = self.native_classifier_for_current_os()?;
        let native_info = self
            .downloads
            .as_ref()?
            .classifiers
            .as_ref()?
            .get(&classifier)?;

        let path = native_info.get("path").and_then(|v| v.as_str())?;
        Some(LibraryFile {
            path: PathBuf::from(path),
            url: native_info
                .get("url")
                .and_then(|v| v.as_str())
                .filter(|u| !u.is_empty())
                .map(str::to_owned),
            sha1: native_info
                .get("sha1")
                .and_then(|v| v.as_str())
                .map(str::to_owned),
            size: native_info.get("size").and_then(|v| v.as_u64()),
        })
    }
}

/// Convert `group:artifact:version[:classifier][@ext]` into the Maven
/// repository layout.
pub fn maven_path(coordinate: &str) -> Option<PathBuf> {
    let (coord, extension) = match coordinate.rsplit_once('@') {
        Some((c, ext)) => (c, ext),
        None => (coordinate, "jar"),
    };

    let mut parts = coord.split(':');
    let group = parts.next().filter(|p| !p.is_empty())?;
    let artifact = parts.next().filter(|p| !p.is_empty())?;
    let version = parts.next().filter(|p| !p.is_empty())?;
    let classifier = parts.next();
    if parts.next().is_some() {
        return None;
    }

    let file_name = match classifier {
        Some(c) => format!("{artifact}-{version}-{c}.{extension}"),
        None => format!("{artifact}-{version}.{extension}"),
    };

    let mut path = PathBuf::new();
    for segment in group.split('.') {
        path.push(segment);
    }
    Some(path.join(artifact).join(version).join(file_name))
}

/// Get the Mojang OS name for the current platform.
pub fn current_os_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "osx"
    } else {
        "linux"
    }
}

// ─── On-disk layout ───

pub fn version_dir(game_root: &Path, version_id: &str) -> PathBuf {
    game_root.join("versions").join(version_id)
}

pub fn version_json_path(game_root: &Path, version_id: &str) -> PathBuf {
    version_dir(game_root, version_id).join(format!("{version_id}.json"))
}

pub fn version_jar_path(game_root: &Path, version_id: &str) -> PathBuf {
    version_dir(game_root, version_id).join(format!("{version_id}.jar"))
}

/// Load `versions/<id>/<id>.json` and fold every `inheritsFrom` parent into it.
///
/// The resolved JSON always carries `jar`: the explicit value from the chain,
/// or the id of the root-most version.
pub fn load_resolved_value(game_root: &Path, version_id: &str) -> LauncherResult<serde_json::Value> {
    let mut current = read_version_value(game_root, version_id)?;
    let mut jar = current
        .get("jar")
        .and_then(|v| v.as_str())
        .map(str::to_owned);
    let mut root_id = version_id.to_string();

    for _ in 0..MAX_INHERITANCE_DEPTH {
        let Some(parent_id) = current
            .get("inheritsFrom")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
        else {
            break;
        };

        let parent = read_version_value(game_root, &parent_id)?;
        if jar.is_none() {
            jar = parent.get("jar").and_then(|v| v.as_str()).map(str::to_owned);
        }
        current = merge_with_parent_json(&current, &parent);
        root_id = parent_id;
    }

    if current.get("inheritsFrom").is_some_and(|v| !v.is_null()) {
        return Err(LauncherError::Other(format!(
            "Version {version_id} inherits more than {MAX_INHERITANCE_DEPTH} levels deep"
        )));
    }

    current["id"] = serde_json::Value::String(version_id.to_string());
    current["jar"] = serde_json::Value::String(jar.unwrap_or(root_id));
    Ok(current)
}

pub fn load_resolved(game_root: &Path, version_id: &str) -> LauncherResult<VersionJson> {
    let value = load_resolved_value(game_root, version_id)?;
    serde_json::from_value(value).map_err(LauncherError::from)
}

/// The version JSON exists, resolves, and the client jar it runs on is present.
pub fn is_version_installed(game_root: &Path, version_id: &str) -> bool {
    match load_resolved(game_root, version_id) {
        Ok(version) => version_jar_path(game_root, version.jar_id()).is_file(),
        Err(_) => false,
    }
}

fn read_version_value(game_root: &Path, version_id: &str) -> LauncherResult<serde_json::Value> {
    let path = version_json_path(game_root, version_id);
    let raw = std::fs::read_to_string(&path).map_err(|e| LauncherError::io(&path, e))?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    if !value.is_object() {
        return Err(LauncherError::Other(format!(
            "{} is not a version JSON object",
            path.display()
        )));
    }
    Ok(value)
}

/// Fold `parent_json` under `current_json`: libraries are concatenated (child
/// first), argument lists are appended to the parent's, every other key of the
/// child overrides the parent. The parent's `inheritsFrom` carries forward.
pub fn merge_with_parent_json(
    current_json: &serde_json::Value,
    parent_json: &serde_json::Value,
) -> serde_json::Value {
    let mut merged = parent_json.clone();
    let Some(child) = current_json.as_object() else {
        return merged;
    };

    for (key, value) in child {
        match key.as_str() {
            "inheritsFrom" => {}
            "libraries" => {
                let mut libraries = value.as_array().cloned().unwrap_or_default();
                if let Some(parent_libs) = parent_json.get("libraries").and_then(|v| v.as_array())
                {
                    libraries.extend(parent_libs.iter().cloned());
                }
                merged["libraries"] = serde_json::Value::Array(libraries);
            }
            "arguments" => {
                let mut arguments = parent_json
                    .get("arguments")
                    .cloned()
                    .unwrap_or_else(|| serde_json::json!({}));
                for side in ["game", "jvm"] {
                    let Some(extra) = value.get(side).and_then(|v| v.as_array()) else {
                        continue;
                    };
                    let mut combined = arguments
                        .get(side)
                        .and_then(|v| v.as_array())
                        .cloned()
                        .unwrap_or_default();
                    combined.extend(extra.iter().cloned());
                    arguments[side] = serde_json::Value::Array(combined);
                }
                merged["arguments"] = arguments;
            }
            _ => merged[key] = value.clone(),
        }
    }

    if let Some(obj) = merged.as_object_mut() {
        match parent_json.get("inheritsFrom") {
            Some(parent_of_parent) => {
                obj.insert("inheritsFrom".into(), parent_of_parent.clone());
            }
            None => {
                obj.remove("inheritsFrom");
            }
        }
    }

    merged
}

impl VersionJson {
    /// Id of the version that owns the client jar.
    pub fn jar_id(&self) -> &str {
        self.jar.as_deref().unwrap_or(&self.id)
    }

    /// Required Java runtime. Versions without `javaVersion` get one inferred
    /// from their id (`jre-legacy` for anything before 1.17).
    pub fn required_java(&self) -> JavaVersionInfo {
        self.java_version
            .clone()
            .unwrap_or_else(|| crate::core::java::fallback_requirement(&self.id))
    }

    /// Allowed libraries for this OS, in declaration order.
    pub fn allowed_libraries(&self) -> impl Iterator<Item = &LibraryEntry> {
        self.libraries
            .iter()
            .filter(|lib| lib.is_allowed_for_current_os())
    }

    /// Game arguments with OS rules applied (placeholders left untouched).
    pub fn game_args(&self) -> Vec<String> {
        match &self.arguments {
            Some(args) if !args.game.is_empty() => {
                args.game.iter().flat_map(extract_argument_values).collect()
            }
            _ => match &self.minecraft_arguments {
                Some(s) => s.split_whitespace().map(|s| s.to_string()).collect(),
                None => vec![],
            },
        }
    }

    /// JVM arguments with OS rules applied (placeholders left untouched).
    pub fn jvm_args(&self) -> Vec<String> {
        match &self.arguments {
            Some(args) => args.jvm.iter().flat_map(extract_argument_values).collect(),
            None => vec![],
        }
    }
}

fn extract_argument_values(value: &serde_json::Value) -> Vec<String> {
    if let Some(arg) = value.as_str() {
        return vec![arg.to_string()];
    }

    let Some(obj) = value.as_object() else {
        return vec![];
    };

    if let Some(rules) = obj.get("rules").and_then(|r| r.as_array()) {
        if !rules_allow_current_os(rules) {
            return vec![];
        }
    }

    match obj.get("value") {
        Some(serde_json::Value::String(s)) => vec![s.clone()],
        Some(serde_json::Value::Array(arr)) => arr
            .iter()
            .filter_map(|v| v.as_str().map(ToString::to_string))
            .collect(),
        _ => vec![],
    }
}

/// Feature-gated rules (demo mode, custom resolution, quick play) never match:
/// the launcher enables none of those features.
fn rules_allow_current_os(rules: &[serde_json::Value]) -> bool {
    let mut allowed = false;
    let current_os = current_os_name();

    for rule in rules {
        let action = rule
            .get("action")
            .and_then(|v| v.as_str())
            .unwrap_or("disallow");

        if rule.get("features").is_some() {
            continue;
        }

        let os_matches = match rule
            .get("os")
            .and_then(|os| os.get("name"))
            .and_then(|name| name.as_str())
        {
            None => true,
            Some(name) => name == current_os,
        };

        if os_matches {
            allowed = action == "allow";
        }
    }

    allowed
}
