use std::path::PathBuf;
use std::time::Duration;

use crate::os_release::OS_RELEASE_PATH;
use crate::registries_conf::REGISTRIES_CONF_PATH;
use crate::registry::ServeLimits;

/// Everything a check run needs to know: where the tools and files live, and how long to wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckConfig {
    pub bootc: PathBuf,
    pub skopeo: PathBuf,
    pub registries_conf: PathBuf,
    pub os_release: PathBuf,
    /// Repository and tag requested from the mock registry.
    pub image: String,
    /// Substring the captured User-Agent must contain.
    pub expected_marker: String,
    pub probe_timeout: Duration,
    pub ready_timeout: Duration,
    pub switch_timeout: Duration,
    pub request_timeout: Duration,
    pub serve_limits: ServeLimits,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            bootc: PathBuf::from("bootc"),
            skopeo: PathBuf::from("skopeo"),
            registries_conf: PathBuf::from(REGISTRIES_CONF_PATH),
            os_release: PathBuf::from(OS_RELEASE_PATH),
            image: "test:latest".to_string(),
            expected_marker: "bootc/".to_string(),
            probe_timeout: Duration::from_secs(10),
            ready_timeout: Duration::from_secs(5),
            switch_timeout: Duration::from_secs(60),
            request_timeout: Duration::from_secs(10),
            serve_limits: ServeLimits::default(),
        }
    }
}
