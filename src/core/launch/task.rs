// ─── Launch Task ───
// Spawns the game process with the correct arguments.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, info, instrument, warn};

use super::classpath::{self, safe_path_str};
use super::{GameLauncher, LaunchOptions, LaunchedProcess};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::version::version_file::{self, VersionJson};

const LAUNCHER_NAME: &str = "Instancer";

/// Legacy versions (no `arguments.jvm`) get these JVM arguments.
const LEGACY_JVM_ARGS: [&str; 3] = [
    "-Djava.library.path=${natives_directory}",
    "-cp",
    "${classpath}",
];

/// Spawns the game as a child of this process and logs its output.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

#[async_trait]
impl GameLauncher for ProcessLauncher {
    #[instrument(skip(self, game_root, options))]
    async fn launch(
        &self,
        game_root: &Path,
        version_id: &str,
        options: &LaunchOptions,
    ) -> LauncherResult<LaunchedProcess> {
        let version = version_file::load_resolved(game_root, version_id)?;
        let entries = classpath::build_classpath(game_root, &version)?;
        let natives_dir = classpath::extract_natives(game_root, &version).await?;
        let args = build_command_args(game_root, &version, &entries, &natives_dir, options);

        let mut cmd = tokio::process::Command::new(&options.java_path);
        cmd.args(&args)
            .current_dir(game_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        info!("Launching {} with Java: {:?}", version_id, options.java_path);
        debug!("Command (copy/paste): {}", format_command_for_logs(&options.java_path, &args));

        let mut child = cmd
            .spawn()
            .map_err(|e| LauncherError::LaunchFailed(e.to_string()))?;
        let pid = child.id().unwrap_or_default();

        if let Some(stdout) = child.stdout.take() {
            log_game_output(stdout, "stdout");
        }
        if let Some(stderr) = child.stderr.take() {
            log_game_output(stderr, "stderr");
        }

        let version_id = version_id.to_string();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => info!("{} exited with {}", version_id, status),
                Err(e) => warn!("Lost track of {}: {}", version_id, e),
            }
        });

        Ok(LaunchedProcess { pid })
    }
}

fn log_game_output<R>(reader: R, stream: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(target: "game", "[{}] {}", stream, line);
        }
    });
}

/// Values for every `${...}` placeholder the launcher can fill.
fn launch_vars(
    game_root: &Path,
    version: &VersionJson,
    classpath: &str,
    natives_dir: &Path,
    options: &LaunchOptions,
) -> Vec<(&'static str, String)> {
    let session = &options.session;
    let assets_dir = safe_path_str(&game_root.join("assets"));

    vec![
        ("auth_player_name", session.username.clone()),
        ("auth_uuid", session.uuid.clone()),
        ("auth_access_token", session.access_token.clone()),
        ("auth_session", session.access_token.clone()),
        ("auth_xuid", session.xuid.clone()),
        ("user_type", session.user_type.clone()),
        ("user_properties", "{}".into()),
        ("version_name", version.id.clone()),
        (
            "version_type",
            version
                .version_type
                .clone()
                .unwrap_or_else(|| "release".into()),
        ),
        ("game_directory", safe_path_str(game_root)),
        ("assets_root", assets_dir.clone()),
        ("game_assets", assets_dir),
        (
            "assets_index_name",
            version
                .asset_index
                .as_ref()
                .map(|a| a.id.clone())
                .or_else(|| version.assets.clone())
                .unwrap_or_else(|| "legacy".into()),
        ),
        ("natives_directory", safe_path_str(natives_dir)),
        ("library_directory", safe_path_str(&game_root.join("libraries"))),
        ("classpath", classpath.to_string()),
        ("classpath_separator", classpath::get_classpath_separator().into()),
        ("launcher_name", LAUNCHER_NAME.into()),
        ("launcher_version", env!("CARGO_PKG_VERSION").into()),
    ]
}

/// Substitute placeholders. Arguments that still reference an unknown
/// placeholder are dropped together with the option flag right before them.
fn resolve_args(raw: &[String], vars: &[(&'static str, String)]) -> Vec<String> {
    let mut resolved = Vec::with_capacity(raw.len());
    for arg in raw {
        let mut value = arg.clone();
        for (key, replacement) in vars {
            let token = format!("${{{key}}}");
            if value.contains(&token) {
                value = value.replace(&token, replacement);
            }
        }

        if value.contains("${") {
            debug!("Dropping unresolved argument {}", arg);
            drop_dangling_option(&mut resolved);
            continue;
        }
        resolved.push(value);
    }
    resolved
}

fn drop_dangling_option(args: &mut Vec<String>) {
    if args.last().is_some_and(|last| last.starts_with('-')) {
        let _ = args.pop();
    }
}

fn has_classpath_flag(args: &[String]) -> bool {
    args.iter()
        .any(|a| a == "-cp" || a == "-classpath" || a == "--class-path")
}

/// Full argument vector after the java binary: JVM arguments, main class,
/// game arguments.
pub fn build_command_args(
    game_root: &Path,
    version: &VersionJson,
    classpath_entries: &[PathBuf],
    natives_dir: &Path,
    options: &LaunchOptions,
) -> Vec<String> {
    let classpath = classpath::join_classpath(classpath_entries);
    let vars = launch_vars(game_root, version, &classpath, natives_dir, options);

    let raw_jvm = match version.jvm_args() {
        args if args.is_empty() => LEGACY_JVM_ARGS.iter().map(|s| s.to_string()).collect(),
        args => args,
    };

    let mut args = vec![format!("-Xmx{}M", options.max_memory_mb)];
    let jvm = resolve_args(&raw_jvm, &vars);
    let needs_classpath = !has_classpath_flag(&jvm);
    args.extend(jvm);
    if needs_classpath {
        args.push("-cp".into());
        args.push(classpath);
    }

    args.push(version.main_class.clone());
    args.extend(resolve_args(&version.game_args(), &vars));
    args
}

fn format_command_for_logs(java: &Path, args: &[String]) -> String {
    std::iter::once(java.to_string_lossy().into_owned())
        .chain(args.iter().cloned())
        .map(|part| shell_escape(&part))
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_escape(raw: &str) -> String {
    if raw.is_empty() {
        return "''".into();
    }
    if raw
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_./:=@,+${}".contains(c))
    {
        return raw.to_string();
    }
    format!("'{}'", raw.replace('\'', "'\\''"))
}
