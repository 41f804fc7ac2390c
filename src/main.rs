use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use bootc_ua_check::os_release::OS_RELEASE_PATH;
use bootc_ua_check::registries_conf::REGISTRIES_CONF_PATH;
use bootc_ua_check::{CheckConfig, Notifier, Outcome, UserAgentCheck};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(long, default_value = "bootc", help = "bootc binary under test")]
    bootc: PathBuf,

    #[arg(
        long,
        default_value = "skopeo",
        help = "skopeo binary probed for --user-agent-prefix support"
    )]
    skopeo: PathBuf,

    #[arg(
        long,
        default_value = REGISTRIES_CONF_PATH,
        help = "registries.conf drop-in marking the mock registry insecure (removed afterwards)"
    )]
    registries_conf: PathBuf,

    #[arg(
        long,
        default_value = OS_RELEASE_PATH,
        help = "os-release file deciding whether a missing skopeo feature fails the check"
    )]
    os_release: PathBuf,

    #[arg(
        long,
        default_value = "test:latest",
        help = "Repository and tag requested from the mock registry"
    )]
    image: String,

    #[arg(
        long = "expect",
        default_value = "bootc/",
        help = "Substring the captured User-Agent must contain"
    )]
    expected_marker: String,

    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Verbose mode (-v for info, -vv for debug, -vvv for trace). Also disables the spinner"
    )]
    verbose: u8,
}

impl Cli {
    fn into_config(self) -> CheckConfig {
        CheckConfig {
            bootc: self.bootc,
            skopeo: self.skopeo,
            registries_conf: self.registries_conf,
            os_release: self.os_release,
            image: self.image,
            expected_marker: self.expected_marker,
            ..CheckConfig::default()
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let notifier = Arc::new(Notifier::new(cli.verbose));
    let config = cli.into_config();

    notifier.debug(&format!("Configuration: {:?}", config));

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            let outcome = Outcome::Failed(format!("Failed to create async runtime: {e}"));
            notifier.status(&outcome.to_string());
            return ExitCode::from(&outcome);
        }
    };

    let check = UserAgentCheck::from_config(config, Arc::clone(&notifier));
    let outcome = rt.block_on(check.run());
    notifier.info(&format!("Finished with exit code {}", outcome.exit_code()));

    ExitCode::from(&outcome)
}
