use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the entire launcher backend.
/// Every module returns `Result<T, LauncherError>`.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("Version {0} not found in the distribution catalog")]
    VersionNotFound(String),

    #[error("{path:?} is missing and has no download source")]
    MissingArtifact { path: PathBuf },

    // ── Integrity ───────────────────────────────────────
    #[error("SHA-1 mismatch for {path:?}: expected {expected}, got {actual}")]
    Sha1Mismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    // ── Parsing ─────────────────────────────────────────
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Instance ────────────────────────────────────────
    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    #[error("Instance already exists: {0}")]
    InstanceAlreadyExists(String),

    #[error("Invalid instance: {0}")]
    InvalidInstance(String),

    #[error("Instance {0} is already being downloaded")]
    AlreadyInProgress(String),

    #[error("Instance {0} is not ready")]
    NotReady(String),

    // ── Overlay installer ───────────────────────────────
    #[error("Overlay installer failed: {0}")]
    InstallerFailure(String),

    #[error("Installed overlay version not found: {0}")]
    DiscoveryFailure(String),

    #[error("Failed to merge {from:?} into {to:?}: {source}")]
    CopyFailure {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    // ── Runtime ─────────────────────────────────────────
    #[error("Java runtime not found at {0:?}")]
    RuntimeNotFound(PathBuf),

    #[error("Game process failed to start: {0}")]
    LaunchFailed(String),

    #[error("Loader API unreachable: {0}")]
    LoaderApi(String),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Coarse classification used by callers that react to the failure category
/// rather than to its details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Installer,
    Discovery,
    Copy,
    RuntimeNotFound,
    AlreadyInProgress,
    NotReady,
    Io,
    Parse,
    Instance,
    Other,
}

impl LauncherError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Http(_)
            | Self::DownloadFailed { .. }
            | Self::VersionNotFound(_)
            | Self::MissingArtifact { .. }
            | Self::Sha1Mismatch { .. }
            | Self::LoaderApi(_) => ErrorKind::Network,
            Self::InstallerFailure(_) => ErrorKind::Installer,
            Self::DiscoveryFailure(_) => ErrorKind::Discovery,
            Self::CopyFailure { .. } => ErrorKind::Copy,
            Self::RuntimeNotFound(_) => ErrorKind::RuntimeNotFound,
            Self::AlreadyInProgress(_) => ErrorKind::AlreadyInProgress,
            Self::NotReady(_) => ErrorKind::NotReady,
            Self::Io { .. } => ErrorKind::Io,
            Self::Xml(_) | Self::Json(_) | Self::Zip(_) => ErrorKind::Parse,
            Self::InstanceNotFound(_)
            | Self::InstanceAlreadyExists(_)
            | Self::InvalidInstance(_) => ErrorKind::Instance,
            Self::LaunchFailed(_) | Self::Other(_) => ErrorKind::Other,
        }
    }

    /// Attach a path to a bare IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LauncherError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

// ── Serialization for UI layers ─────────────────────────
// Front-ends receive errors as plain strings.
impl serde::Serialize for LauncherError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_errors_map_to_their_kind() {
        assert_eq!(
            LauncherError::DiscoveryFailure("x".into()).kind(),
            ErrorKind::Discovery
        );
        assert_eq!(
            LauncherError::DownloadFailed {
                url: "https://example.com".into(),
                status: 404
            }
            .kind(),
            ErrorKind::Network
        );
        assert_eq!(
            LauncherError::RuntimeNotFound(PathBuf::from("/nope")).kind(),
            ErrorKind::RuntimeNotFound
        );
    }

    #[test]
    fn serializes_as_display_string() {
        let err = LauncherError::NotReady("survival".into());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Instance survival is not ready\"");
    }
}
