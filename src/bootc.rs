use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

use crate::exec::{run_with_timeout, CommandOutput};

/// The tool under test: something that pulls an image reference from a registry.
#[allow(async_fn_in_trait)]
pub trait SwitchTool {
    /// Name used in report lines.
    fn name(&self) -> &str;

    /// Points the host at `reference` (`host:port/repo:tag`) over the registry transport.
    ///
    /// A non-zero exit is not an error; only failing to run the tool at all is.
    async fn switch(&self, reference: &str) -> Result<CommandOutput>;
}

/// Runs `bootc switch --transport registry <reference>`.
pub struct Bootc {
    program: PathBuf,
    timeout: Duration,
}

impl Bootc {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn switch_args(reference: &str) -> [&str; 4] {
        ["switch", "--transport", "registry", reference]
    }
}

impl SwitchTool for Bootc {
    fn name(&self) -> &str {
        "bootc"
    }

    async fn switch(&self, reference: &str) -> Result<CommandOutput> {
        run_with_timeout(&self.program, &Self::switch_args(reference), self.timeout).await
    }
}
