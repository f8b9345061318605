pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::error::{ErrorKind, LauncherError, LauncherResult};
pub use crate::core::instance::{
    CreateInstanceRequest, Instance, InstanceOrchestrator, InstanceStatus, LaunchedInstance,
    LoaderType,
};
pub use crate::core::state::{AppState, LauncherSettings};

/// Install the structured logger. `RUST_LOG` overrides the default filter.
/// Calling it twice is harmless.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,instancer_lib=debug")),
        )
        .try_init();
}
