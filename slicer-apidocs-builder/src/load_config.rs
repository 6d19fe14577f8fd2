/// `load_config` module: optional YAML settings file providing defaults for the CLI.
///
/// Every key is optional; anything left out falls back to the built-in
/// defaults below, and any flag given on the command line wins over the file.
/// Secrets (GitHub tokens) are never read from this file, only from flags or
/// the environment.
///
/// ```yaml
/// slicer_repo_name: Slicer/Slicer
/// github_url: https://github.com
/// work_dir: /var/tmp/apidocs
/// cmake: cmake
/// publish:
///   username: Slicer Bot
///   useremail: slicerbot@slicer.org
///   repo_name: slicer/apidocs.slicer.org
///   repo_branch: gh-pages
/// status:
///   target_url_base: http://apidocs.slicer.org
///   api_url: https://api.github.com
/// ```
use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const DEFAULT_SLICER_REPO_NAME: &str = "Slicer/Slicer";
pub const DEFAULT_GITHUB_URL: &str = "https://github.com";
pub const DEFAULT_CMAKE: &str = "cmake";
pub const DEFAULT_PUBLISH_USERNAME: &str = "Slicer Bot";
pub const DEFAULT_PUBLISH_USEREMAIL: &str = "slicerbot@slicer.org";
pub const DEFAULT_PUBLISH_REPO_NAME: &str = "slicer/apidocs.slicer.org";
pub const DEFAULT_PUBLISH_REPO_BRANCH: &str = "gh-pages";
pub const DEFAULT_STATUS_TARGET_URL_BASE: &str = "http://apidocs.slicer.org";
pub const DEFAULT_STATUS_API_URL: &str = "https://api.github.com";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub slicer_repo_name: String,
    pub github_url: String,
    /// Root for checkouts and build trees; system temp dir when unset.
    pub work_dir: Option<PathBuf>,
    pub cmake: String,
    pub publish: PublishSettings,
    pub status: StatusSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishSettings {
    pub username: String,
    pub useremail: String,
    pub repo_name: String,
    pub repo_branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatusSettings {
    pub target_url_base: String,
    pub api_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            slicer_repo_name: DEFAULT_SLICER_REPO_NAME.into(),
            github_url: DEFAULT_GITHUB_URL.into(),
            work_dir: None,
            cmake: DEFAULT_CMAKE.into(),
            publish: PublishSettings::default(),
            status: StatusSettings::default(),
        }
    }
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            username: DEFAULT_PUBLISH_USERNAME.into(),
            useremail: DEFAULT_PUBLISH_USEREMAIL.into(),
            repo_name: DEFAULT_PUBLISH_REPO_NAME.into(),
            repo_branch: DEFAULT_PUBLISH_REPO_BRANCH.into(),
        }
    }
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self {
            target_url_base: DEFAULT_STATUS_TARGET_URL_BASE.into(),
            api_url: DEFAULT_STATUS_API_URL.into(),
        }
    }
}

impl Settings {
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Loads the YAML settings file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    // An empty file means "all defaults".
    if config_content.trim().is_empty() {
        return Ok(Settings::default());
    }

    match serde_yaml::from_str::<Settings>(&config_content) {
        Ok(settings) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            Ok(settings)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}
