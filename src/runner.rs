//! End-to-end "does bootc identify itself to registries" check.
//!
//! [`UserAgentCheck`] drives the whole run:
//! 1. **Probe** the image helper for `--user-agent-prefix`. Without it the check is skipped,
//!    unless os-release says the platform must have it, in which case it fails.
//! 2. **Serve** a [`MockRegistry`] on a loopback ephemeral port.
//! 3. **Configure** that `host:port` as an insecure registry via a registries.conf drop-in.
//! 4. **Switch** the tool under test to `<host:port>/<image>` and report its output.
//! 5. **Assert** that a request arrived and that its User-Agent carries the expected marker.
//!
//! The drop-in is removed on every path once it was written, and the registry task is
//! aborted when the run ends.

use std::sync::Arc;

use crate::bootc::{Bootc, SwitchTool};
use crate::capability::{CapabilityProbe, SkopeoProbe, USER_AGENT_PREFIX_FLAG};
use crate::config::CheckConfig;
use crate::exec::CommandOutput;
use crate::notifier::Notifier;
use crate::os_release::OsRelease;
use crate::registries_conf::InsecureRegistry;
use crate::registry::MockRegistry;
use crate::verdict::{check_user_agent, Outcome};

/// Orchestrates one User-Agent check for a capability probe `P` and a tool under test `T`.
pub struct UserAgentCheck<P: CapabilityProbe, T: SwitchTool> {
    probe: P,
    tool: T,
    config: CheckConfig,
    notifier: Arc<Notifier>,
}

impl UserAgentCheck<SkopeoProbe, Bootc> {
    /// The real check: `skopeo` as the probed helper, `bootc` as the tool under test.
    pub fn from_config(config: CheckConfig, notifier: Arc<Notifier>) -> Self {
        let probe = SkopeoProbe::new(&config.skopeo, config.probe_timeout);
        let tool = Bootc::new(&config.bootc, config.switch_timeout);
        Self::new(probe, tool, config, notifier)
    }
}

impl<P: CapabilityProbe, T: SwitchTool> UserAgentCheck<P, T> {
    pub fn new(probe: P, tool: T, config: CheckConfig, notifier: Arc<Notifier>) -> Self {
        Self {
            probe,
            tool,
            config,
            notifier,
        }
    }

    /// Runs the check and reports every step on stdout. Never panics on tool or I/O failures;
    /// they all end up as [`Outcome::Failed`].
    pub async fn run(&self) -> Outcome {
        if let Some(outcome) = self.check_capability().await {
            return outcome;
        }

        self.notifier.status("=== User-Agent Header Test ===");

        let mut registry = match MockRegistry::spawn(
            Arc::clone(&self.notifier),
            self.config.serve_limits,
            self.config.ready_timeout,
        )
        .await
        {
            Ok(registry) => registry,
            Err(e) => {
                self.notifier.warn(&format!("{e:#}"));
                return self.fail("Server failed to start".to_string());
            }
        };

        let location = registry.location();
        self.notifier.status(&format!("Server listening on {location}"));

        let path = &self.config.registries_conf;
        self.notifier.status(&format!(
            "Writing registries config to {}",
            path.display()
        ));
        let insecure = InsecureRegistry::new(location);
        let installed = match insecure.install(path) {
            Ok(installed) => installed,
            Err(e) => return self.fail(format!("{e:#}")),
        };
        self.notifier
            .debug(&format!("Marked {} as an insecure registry", insecure.location()));
        self.notifier.status(installed.content());

        let outcome = self.exercise(&mut registry).await;

        if let Err(e) = installed.remove() {
            self.notifier.warn(&format!("{e:#}"));
        }
        outcome
    }

    async fn check_capability(&self) -> Option<Outcome> {
        if self.probe.supports_user_agent_prefix().await {
            return None;
        }

        let version = self.probe.version().await;
        let message = format!("skopeo ({version}) does not support {USER_AGENT_PREFIX_FLAG}");
        let os_release = OsRelease::load(&self.config.os_release);
        self.notifier.debug(&format!(
            "Capability missing on ID={} VERSION_ID={}",
            os_release.id(),
            os_release.version_id()
        ));

        if os_release.requires_user_agent_support() {
            let outcome = self.fail(message);
            self.notifier.status("This distro should have skopeo >= 1.21.0");
            return Some(outcome);
        }

        let outcome = self.report(Outcome::Skipped(message));
        self.notifier.status("This feature requires skopeo >= 1.21.0");
        Some(outcome)
    }

    async fn exercise(&self, registry: &mut MockRegistry) -> Outcome {
        let name = self.tool.name();
        self.notifier.status(&format!("\n=== Testing with {name} ==="));

        let reference = registry.reference(&self.config.image);
        let spinner = self
            .notifier
            .spinner(&format!("Running {name} switch to {reference}..."));
        let result = self.tool.switch(&reference).await;
        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }

        match result {
            Ok(output) => self.report_tool_output(name, &output),
            // Whether the tool reached the registry is decided below.
            Err(e) => self.notifier.status(&format!("{name} did not complete: {e:#}")),
        }

        let Some(request) = registry
            .wait_for_request(self.config.request_timeout)
            .await
        else {
            return self.fail("No HTTP request was received by server".to_string());
        };

        if !request.user_agent.is_empty() {
            self.notifier.status(&format!("\nCaptured User-Agent: {}", request.user_agent));
        }

        let marker = &self.config.expected_marker;
        match check_user_agent(&request.user_agent, marker) {
            Ok(()) => self.report(Outcome::Passed(format!(
                "User-Agent contains '{marker}'"
            ))),
            Err(message) => self.fail(message),
        }
    }

    fn report_tool_output(&self, name: &str, output: &CommandOutput) {
        let code = output
            .code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "terminated by signal".to_string());
        self.notifier.status(&format!("{name} exit code: {code}"));
        self.notifier.status(&format!("{name} stdout: {}", output.stdout));
        self.notifier.status(&format!("{name} stderr: {}", output.stderr));
    }

    fn fail(&self, message: String) -> Outcome {
        self.report(Outcome::Failed(message))
    }

    fn report(&self, outcome: Outcome) -> Outcome {
        self.notifier.status(&outcome.to_string());
        outcome
    }
}
