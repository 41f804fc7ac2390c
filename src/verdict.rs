use std::fmt;
use std::process::ExitCode;

/// Final result of a check run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed(String),
    /// The host cannot run the check; still a green exit.
    Skipped(String),
    Failed(String),
}

impl Outcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Passed(_) | Outcome::Skipped(_) => 0,
            Outcome::Failed(_) => 1,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Passed(message) => write!(f, "SUCCESS: {message}"),
            Outcome::Skipped(message) => write!(f, "SKIP: {message}"),
            Outcome::Failed(message) => write!(f, "ERROR: {message}"),
        }
    }
}

impl From<&Outcome> for ExitCode {
    fn from(outcome: &Outcome) -> Self {
        ExitCode::from(outcome.exit_code())
    }
}

/// Checks a captured User-Agent for `marker` (e.g. `bootc/`).
pub fn check_user_agent(user_agent: &str, marker: &str) -> Result<(), String> {
    if user_agent.is_empty() {
        return Err("No User-Agent was captured".to_string());
    }
    if !user_agent.contains(marker) {
        return Err(format!("User-Agent does not contain '{marker}'"));
    }
    Ok(())
}
