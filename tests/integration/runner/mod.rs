//! Orchestrator integration tests
//!
//! Runs the full check with stand-ins for skopeo and bootc, writing the registries
//! drop-in and os-release into a temporary directory.

#[cfg(test)]
mod tests {
    use crate::integration::common::*;
    use bootc_ua_check::{Outcome, UserAgentCheck};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_bootc_user_agent_passes() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let conf_path = config.registries_conf.clone();

        let check = UserAgentCheck::new(
            FixedProbe::supported(),
            ScriptedTool::tls_then_http("bootc/1.5.1 skopeo/1.21.0 containers/5.36.0"),
            config,
            quiet_notifier(),
        );
        let outcome = check.run().await;

        assert_eq!(
            outcome,
            Outcome::Passed("User-Agent contains 'bootc/'".to_string())
        );
        assert_eq!(outcome.exit_code(), 0);
        assert!(outcome.to_string().contains("SUCCESS"));
        assert!(!conf_path.exists(), "drop-in should be removed after success");
    }

    #[tokio::test]
    async fn test_foreign_user_agent_fails() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let conf_path = config.registries_conf.clone();

        let check = UserAgentCheck::new(
            FixedProbe::supported(),
            ScriptedTool::tls_then_http("skopeo/1.21.0 containers/5.36.0"),
            config,
            quiet_notifier(),
        );
        let outcome = check.run().await;

        assert_eq!(
            outcome,
            Outcome::Failed("User-Agent does not contain 'bootc/'".to_string())
        );
        assert_eq!(outcome.exit_code(), 1);
        assert!(!conf_path.exists(), "drop-in should be removed after failure");
    }

    #[tokio::test]
    async fn test_missing_user_agent_fails() {
        let dir = TempDir::new().unwrap();
        let check = UserAgentCheck::new(
            FixedProbe::supported(),
            ScriptedTool::new(vec![v2_ping(None)]),
            test_config(dir.path()),
            quiet_notifier(),
        );

        assert_eq!(
            check.run().await,
            Outcome::Failed("No User-Agent was captured".to_string())
        );
    }

    #[tokio::test]
    async fn test_tool_that_never_connects_fails() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(dir.path());
        config.request_timeout = Duration::from_millis(200);
        let conf_path = config.registries_conf.clone();

        let check = UserAgentCheck::new(
            FixedProbe::supported(),
            ScriptedTool::silent(),
            config,
            quiet_notifier(),
        );
        let outcome = check.run().await;

        assert!(outcome.is_failure());
        let line = outcome.to_string();
        assert!(line.contains("ERROR"), "{line}");
        assert!(line.contains("No HTTP request"), "{line}");
        assert!(!conf_path.exists());
    }

    #[tokio::test]
    async fn test_only_tls_probes_fail() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(dir.path());
        config.request_timeout = Duration::from_millis(500);

        let check = UserAgentCheck::new(
            FixedProbe::supported(),
            ScriptedTool::new(vec![TLS_CLIENT_HELLO.to_vec(), TLS_CLIENT_HELLO.to_vec()]),
            config,
            quiet_notifier(),
        );

        assert_eq!(
            check.run().await,
            Outcome::Failed("No HTTP request was received by server".to_string())
        );
    }

    #[tokio::test]
    async fn test_unsupported_skopeo_skips_on_unknown_platform() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        fs::write(&config.os_release, "ID=centos\nVERSION_ID=\"10\"\n").unwrap();
        let conf_path = config.registries_conf.clone();

        let check = UserAgentCheck::new(
            FixedProbe::unsupported(),
            ScriptedTool::silent(),
            config,
            quiet_notifier(),
        );
        let outcome = check.run().await;

        assert_eq!(
            outcome,
            Outcome::Skipped(
                "skopeo (skopeo version 1.20.0) does not support --user-agent-prefix".to_string()
            )
        );
        assert_eq!(outcome.exit_code(), 0);
        assert!(outcome.to_string().starts_with("SKIP"));
        assert!(!conf_path.exists(), "a skipped run never writes the drop-in");
    }

    #[tokio::test]
    async fn test_unsupported_skopeo_skips_without_os_release() {
        let dir = TempDir::new().unwrap();
        let check = UserAgentCheck::new(
            FixedProbe::unsupported(),
            ScriptedTool::silent(),
            test_config(dir.path()),
            quiet_notifier(),
        );

        let outcome = check.run().await;
        assert!(matches!(outcome, Outcome::Skipped(_)), "{outcome:?}");
    }

    #[tokio::test]
    async fn test_unsupported_skopeo_fails_on_known_good_platform() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        fs::write(&config.os_release, "NAME=\"Fedora Linux\"\nID=fedora\nVERSION_ID=43\n").unwrap();

        let check = UserAgentCheck::new(
            FixedProbe::unsupported(),
            ScriptedTool::silent(),
            config,
            quiet_notifier(),
        );
        let outcome = check.run().await;

        assert_eq!(outcome.exit_code(), 1);
        assert!(outcome.to_string().starts_with("ERROR"));
        assert!(outcome.to_string().contains("--user-agent-prefix"));
    }

    #[tokio::test]
    async fn test_registry_startup_timeout_fails() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(dir.path());
        config.ready_timeout = Duration::ZERO;
        let conf_path = config.registries_conf.clone();

        let check = UserAgentCheck::new(
            FixedProbe::supported(),
            ScriptedTool::tls_then_http("bootc/1.5.1"),
            config,
            quiet_notifier(),
        );

        assert_eq!(
            check.run().await,
            Outcome::Failed("Server failed to start".to_string())
        );
        assert!(!conf_path.exists(), "the drop-in is never written");
        assert!(!conf_path.parent().unwrap().exists());
    }

    #[tokio::test]
    async fn test_unwritable_drop_in_fails() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(dir.path());
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        config.registries_conf = blocker.join("99-test-insecure.conf");

        let check = UserAgentCheck::new(
            FixedProbe::supported(),
            ScriptedTool::tls_then_http("bootc/1.5.1"),
            config,
            quiet_notifier(),
        );

        assert!(check.run().await.is_failure());
    }

    #[tokio::test]
    async fn test_custom_image_and_marker() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(dir.path());
        config.image = "fedora/fedora-bootc:43".to_string();
        config.expected_marker = "bootc/1.".to_string();

        let check = UserAgentCheck::new(
            FixedProbe::supported(),
            ScriptedTool::tls_then_http("bootc/1.5.1"),
            config,
            quiet_notifier(),
        );

        assert_eq!(
            check.run().await,
            Outcome::Passed("User-Agent contains 'bootc/1.'".to_string())
        );
    }
}
