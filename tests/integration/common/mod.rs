//! Common utilities for integration tests

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use bootc_ua_check::{CapabilityProbe, CheckConfig, CommandOutput, Notifier, SwitchTool};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// First bytes of a TLS 1.2 ClientHello, as sent by a client probing an insecure registry.
pub const TLS_CLIENT_HELLO: &[u8] = &[
    0x16, 0x03, 0x01, 0x00, 0xf1, 0x01, 0x00, 0x00, 0xed, 0x03, 0x03, 0x8a, 0x41, 0x0c, 0x5e,
];

/// The registry API version check every container client starts with.
pub fn v2_ping(user_agent: Option<&str>) -> Vec<u8> {
    let mut request = String::from("GET /v2/ HTTP/1.1\r\nHost: 127.0.0.1\r\n");
    if let Some(user_agent) = user_agent {
        request.push_str(&format!("User-Agent: {user_agent}\r\n"));
    }
    request.push_str("Accept-Encoding: gzip\r\n\r\n");
    request.into_bytes()
}

/// Writes `payload` on a fresh connection and reads until the server closes it.
pub async fn exchange(addr: &str, payload: &[u8]) -> Result<Vec<u8>> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(payload).await?;
    let mut response = Vec::new();
    // The server may reset a rejected connection; whatever arrived is the answer.
    let _ = stream.read_to_end(&mut response).await;
    Ok(response)
}

/// Splits a raw HTTP response into status line and body.
pub fn split_response(response: &[u8]) -> (String, String) {
    let text = String::from_utf8_lossy(response).to_string();
    match text.split_once("\r\n\r\n") {
        Some((head, body)) => (
            head.lines().next().unwrap_or_default().to_string(),
            body.to_string(),
        ),
        None => (text, String::new()),
    }
}

/// Probe with a fixed answer.
pub struct FixedProbe {
    pub supported: bool,
    pub version: &'static str,
}

impl FixedProbe {
    pub fn supported() -> Self {
        Self {
            supported: true,
            version: "skopeo version 1.21.0",
        }
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            version: "skopeo version 1.20.0",
        }
    }
}

impl CapabilityProbe for FixedProbe {
    async fn supports_user_agent_prefix(&self) -> bool {
        self.supported
    }

    async fn version(&self) -> String {
        self.version.to_string()
    }
}

/// Stand-in for bootc: plays raw payloads against the registry named in the reference,
/// one connection each, then exits 1 like a pull of a missing image does.
pub struct ScriptedTool {
    pub payloads: Vec<Vec<u8>>,
}

impl ScriptedTool {
    pub fn new(payloads: Vec<Vec<u8>>) -> Self {
        Self { payloads }
    }

    /// Probes with TLS first, then falls back to plain HTTP with `user_agent`.
    pub fn tls_then_http(user_agent: &str) -> Self {
        Self::new(vec![TLS_CLIENT_HELLO.to_vec(), v2_ping(Some(user_agent))])
    }

    /// Never contacts the registry.
    pub fn silent() -> Self {
        Self::new(Vec::new())
    }
}

impl SwitchTool for ScriptedTool {
    fn name(&self) -> &str {
        "scripted-bootc"
    }

    async fn switch(&self, reference: &str) -> Result<CommandOutput> {
        let (addr, _) = reference
            .split_once('/')
            .ok_or_else(|| anyhow!("reference without registry: {reference}"))?;
        for payload in &self.payloads {
            exchange(addr, payload).await?;
        }
        Ok(CommandOutput {
            code: Some(1),
            stdout: String::new(),
            stderr: format!("error: reading manifest latest in {reference}: manifest unknown"),
        })
    }
}

/// Configuration writing its drop-in under `dir` with short waits.
pub fn test_config(dir: &Path) -> CheckConfig {
    let mut config = CheckConfig {
        registries_conf: dir.join("registries.conf.d/99-test-insecure.conf"),
        os_release: dir.join("os-release"),
        request_timeout: Duration::from_secs(5),
        ..CheckConfig::default()
    };
    config.serve_limits.accept_timeout = Duration::from_secs(5);
    config
}

pub fn quiet_notifier() -> Arc<Notifier> {
    Arc::new(Notifier::new(0))
}
