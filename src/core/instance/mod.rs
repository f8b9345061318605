pub mod lifecycle;
pub mod manager;
pub mod model;

pub use lifecycle::{CreateInstanceRequest, InstanceOrchestrator, LaunchedInstance};
pub use manager::InstanceManager;
pub use model::{Instance, InstanceStatus, LoaderType};
