use std::path::{Path, PathBuf};

use crate::core::error::{LauncherError, LauncherResult};

/// Platform key used by Mojang's runtime manifest and the runtime folder layout.
pub fn runtime_platform() -> &'static str {
    match (std::env::consts::OS, std::env::consts::ARCH) {
        ("windows", "x86") => "windows-x86",
        ("windows", "aarch64") => "windows-arm64",
        ("windows", _) => "windows-x64",
        ("macos", "aarch64") => "mac-os-arm64",
        ("macos", _) => "mac-os",
        ("linux", "x86") => "linux-i386",
        _ => "linux",
    }
}

fn java_exe() -> &'static str {
    if cfg!(windows) {
        "java.exe"
    } else {
        "java"
    }
}

/// `<root>/runtime/<component>/<platform>/<component>`
pub fn runtime_dir(game_root: &Path, component: &str) -> PathBuf {
    game_root
        .join("runtime")
        .join(component)
        .join(runtime_platform())
        .join(component)
}

/// Location of the java binary inside a runtime directory.
pub fn java_binary_subpath() -> PathBuf {
    if cfg!(target_os = "macos") {
        ["jre.bundle", "Contents", "Home", "bin", java_exe()]
            .iter()
            .collect()
    } else {
        ["bin", java_exe()].iter().collect()
    }
}

/// Expected java binary for `component` under `game_root`.
///
/// Purely computed; whether the file exists is the caller's check.
pub fn resolve_runtime_binary(game_root: &Path, component: &str) -> Option<PathBuf> {
    let component = component.trim();
    if component.is_empty() || game_root.as_os_str().is_empty() {
        return None;
    }
    Some(runtime_dir(game_root, component).join(java_binary_subpath()))
}

/// Like [`resolve_runtime_binary`] but only returns binaries present on disk.
pub fn existing_runtime_binary(game_root: &Path, component: &str) -> Option<PathBuf> {
    resolve_runtime_binary(game_root, component).filter(|path| path.is_file())
}

/// Java binary for `component`, or `RuntimeNotFound` naming where it was expected.
pub fn require_runtime_binary(game_root: &Path, component: &str) -> LauncherResult<PathBuf> {
    existing_runtime_binary(game_root, component).ok_or_else(|| {
        LauncherError::RuntimeNotFound(
            resolve_runtime_binary(game_root, component)
                .unwrap_or_else(|| game_root.join("runtime")),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_dir_follows_launcher_layout() {
        let dir = runtime_dir(Path::new("/games/Alpha"), "java-runtime-gamma");
        let expected = Path::new("/games/Alpha")
            .join("runtime")
            .join("java-runtime-gamma")
            .join(runtime_platform())
            .join("java-runtime-gamma");
        assert_eq!(dir, expected);
    }

    #[test]
    fn binary_lives_under_runtime_dir() {
        let bin = resolve_runtime_binary(Path::new("/games/Alpha"), "jre-legacy").unwrap();
        assert!(bin.starts_with(runtime_dir(Path::new("/games/Alpha"), "jre-legacy")));
        assert!(bin.ends_with(java_binary_subpath()));
    }

    #[test]
    fn empty_component_resolves_to_nothing() {
        assert_eq!(resolve_runtime_binary(Path::new("/games/Alpha"), "  "), None);
        assert_eq!(resolve_runtime_binary(Path::new(""), "jre-legacy"), None);
    }

    #[test]
    fn existing_binary_requires_the_file() {
        let root = std::env::temp_dir().join(format!("instancer-paths-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        assert_eq!(existing_runtime_binary(&root, "jre-legacy"), None);

        let bin = resolve_runtime_binary(&root, "jre-legacy").unwrap();
        std::fs::create_dir_all(bin.parent().unwrap()).unwrap();
        std::fs::write(&bin, b"").unwrap();
        assert_eq!(existing_runtime_binary(&root, "jre-legacy"), Some(bin.clone()));
        assert_eq!(require_runtime_binary(&root, "jre-legacy").unwrap(), bin);
        assert!(matches!(
            require_runtime_binary(&root, "java-runtime-delta"),
            Err(LauncherError::RuntimeNotFound(_))
        ));

        let _ = std::fs::remove_dir_all(&root);
    }
}
