use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Drop-in consumed by containers-registries.conf(5); sorts last so it wins.
pub const REGISTRIES_CONF_PATH: &str = "/etc/containers/registries.conf.d/99-test-insecure.conf";

#[derive(Debug, Serialize)]
struct RegistriesConf<'a> {
    registry: Vec<RegistryEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct RegistryEntry<'a> {
    location: &'a str,
    insecure: bool,
}

/// A registries.conf fragment marking one `host:port` as insecure (plain HTTP allowed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsecureRegistry {
    location: String,
}

impl InsecureRegistry {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn render(&self) -> Result<String> {
        toml::to_string(&RegistriesConf {
            registry: vec![RegistryEntry {
                location: &self.location,
                insecure: true,
            }],
        })
        .context("Failed to render registries.conf fragment")
    }

    /// Writes the fragment to `path` and returns a guard that removes it again.
    ///
    /// The guard is armed before the write starts, so a partially written file is
    /// cleaned up as well.
    pub fn install(&self, path: &Path) -> Result<InstalledConf> {
        let content = self.render()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create directory {}", parent.display()))?;
        }

        let installed = InstalledConf {
            path: path.to_path_buf(),
            content,
        };
        fs::write(&installed.path, &installed.content)
            .context(format!("Failed to write {}", path.display()))?;
        Ok(installed)
    }
}

/// A registries.conf fragment on disk. Removed when dropped.
#[derive(Debug)]
pub struct InstalledConf {
    path: PathBuf,
    content: String,
}

impl InstalledConf {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Removes the fragment now instead of at drop time.
    pub fn remove(self) -> Result<()> {
        remove_if_exists(&self.path)
    }
}

impl Drop for InstalledConf {
    fn drop(&mut self) {
        if let Err(e) = remove_if_exists(&self.path) {
            log::warn!("{e:#}");
        }
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).context(format!("Failed to remove {}", path.display())),
    }
}
