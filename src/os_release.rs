use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Default location of the system identity file.
pub const OS_RELEASE_PATH: &str = "/usr/lib/os-release";

/// Key/value view of an `os-release` file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsRelease {
    fields: HashMap<String, String>,
}

impl OsRelease {
    /// Reads and parses `path`. A missing or unreadable file yields an empty set of fields.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) => {
                log::debug!("Could not read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Self {
        let fields = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.to_string(), unquote(value).to_string()))
            .collect();
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn id(&self) -> &str {
        self.get("ID").unwrap_or_default()
    }

    pub fn version_id(&self) -> &str {
        self.get("VERSION_ID").unwrap_or_default()
    }

    /// Whether this distribution is known to ship a skopeo new enough (>= 1.21.0)
    /// for the User-Agent prefix. A missing capability there is a failure, not a skip.
    pub fn requires_user_agent_support(&self) -> bool {
        let Ok(version) = self.version_id().trim().parse::<u32>() else {
            return false;
        };

        // Fedora 43+ ships skopeo 1.21.0+
        self.id() == "fedora" && version >= 43
    }
}

fn unquote(value: &str) -> &str {
    value.trim_matches(|c| c == '"' || c == '\'')
}
