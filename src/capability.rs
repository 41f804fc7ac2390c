use std::path::PathBuf;
use std::time::Duration;

use crate::exec::run_with_timeout;

/// The skopeo option bootc relies on to prefix its User-Agent.
pub const USER_AGENT_PREFIX_FLAG: &str = "--user-agent-prefix";

/// Runtime check of whether the installed image helper can forward a User-Agent prefix.
#[allow(async_fn_in_trait)]
pub trait CapabilityProbe {
    /// True when the helper advertises [`USER_AGENT_PREFIX_FLAG`]. Any failure is `false`.
    async fn supports_user_agent_prefix(&self) -> bool;

    /// Helper version for diagnostics, `"unknown"` when it cannot be determined.
    async fn version(&self) -> String;
}

/// Probes the `skopeo` binary through its `--help` and `--version` output.
pub struct SkopeoProbe {
    program: PathBuf,
    timeout: Duration,
}

impl SkopeoProbe {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl CapabilityProbe for SkopeoProbe {
    async fn supports_user_agent_prefix(&self) -> bool {
        match run_with_timeout(&self.program, &["--help"], self.timeout).await {
            Ok(output) if output.success() => output.stdout.contains(USER_AGENT_PREFIX_FLAG),
            Ok(output) => {
                log::debug!(
                    "{} --help exited with {:?}",
                    self.program.display(),
                    output.code
                );
                false
            }
            Err(e) => {
                log::debug!("capability probe failed: {e:#}");
                false
            }
        }
    }

    async fn version(&self) -> String {
        match run_with_timeout(&self.program, &["--version"], self.timeout).await {
            Ok(output) if output.success() && !output.stdout.trim().is_empty() => {
                output.stdout.trim().to_string()
            }
            _ => "unknown".to_string(),
        }
    }
}
