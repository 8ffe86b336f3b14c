//! Configuration file support.
//!
//! Reads `strata.toml` from the working directory. Every field is optional:
//!
//! ```toml
//! [workspace]
//! dir = "/opt/cmdstan"          # default: ~/.cmdstan
//!
//! [download]
//! url_override = "https://mirror.example/cmdstan-2.30.0.tar.gz"   # checksum still enforced
//! ```
//!
//! `STRATA_WORKSPACE` overrides `workspace.dir`.

use crate::platform::Host;
use crate::toolchain::Archive;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "strata.toml";
const WORKSPACE_ENV: &str = "STRATA_WORKSPACE";
const DEFAULT_WORKSPACE: &str = ".cmdstan";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    #[serde(default)]
    pub download: DownloadConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceConfig {
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DownloadConfig {
    pub url_override: Option<String>,
}

impl Config {
    /// Load `strata.toml` (or use defaults if it doesn't exist).
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Workspace directory from the environment, then the file, then `~/.cmdstan`.
    pub fn workspace_dir(&self) -> Result<PathBuf> {
        self.resolve_workspace(
            std::env::var_os(WORKSPACE_ENV),
            std::env::var_os("HOME").map(PathBuf::from),
        )
    }

    fn resolve_workspace(&self, env: Option<OsString>, home: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(dir) = env.filter(|d| !d.is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        if let Some(dir) = &self.workspace.dir {
            return Ok(dir.clone());
        }
        home.map(|h| h.join(DEFAULT_WORKSPACE))
            .context("Cannot locate home directory; set STRATA_WORKSPACE")
    }

    /// The pinned archive for `host`, with the mirror URL applied if configured.
    pub fn archive(&self, host: &Host) -> Archive {
        let archive = Archive::for_host(host);
        match &self.download.url_override {
            Some(url) => archive.with_url(url.clone()),
            None => archive,
        }
    }
}
