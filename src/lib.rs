pub mod bootc;
pub mod capability;
pub mod config;
pub mod exec;
pub mod notifier;
pub mod os_release;
pub mod registries_conf;
pub mod registry;
pub mod runner;
pub mod verdict;

// Re-exports for easy access
pub use bootc::{Bootc, SwitchTool};
pub use capability::{CapabilityProbe, SkopeoProbe};
pub use config::CheckConfig;
pub use exec::CommandOutput;
pub use notifier::Notifier;
pub use registry::{CapturedRequest, MockRegistry, ServeLimits};
pub use runner::UserAgentCheck;
pub use verdict::Outcome;
