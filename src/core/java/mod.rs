pub mod paths;
pub mod runtime;

pub use paths::{
    existing_runtime_binary, require_runtime_binary, resolve_runtime_binary, runtime_dir,
    runtime_platform,
};
pub use runtime::{fallback_requirement, required_java_for_minecraft_version, runtime_files};
