//! `<major>.<minor>` version of a Slicer checkout.

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, info};

/// Build configuration file read at the root of the source checkout.
pub const CMAKE_LISTS: &str = "CMakeLists.txt";

#[derive(Debug, Error)]
pub enum VersionError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Slicer_VERSION_{0} not found in CMakeLists.txt")]
    MissingComponent(&'static str),
    #[error("tag `{0}` does not start with <major>.<minor>")]
    InvalidTag(String),
}

/// Components are kept as written (`5.02` stays `5.02`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub major: String,
    pub minor: String,
}

fn digits(part: &str) -> Option<String> {
    (!part.is_empty() && part.chars().all(|c| c.is_ascii_digit())).then(|| part.to_string())
}

impl Version {
    /// `v5.2.1` -> `5.2`. Only the first two dot-separated components count.
    pub fn from_tag(tag: &str) -> Result<Self, VersionError> {
        let invalid = || VersionError::InvalidTag(tag.to_string());
        let mut parts = tag.trim_start_matches('v').split('.');
        let major = parts.next().and_then(digits).ok_or_else(invalid)?;
        let minor = parts.next().and_then(digits).ok_or_else(invalid)?;
        Ok(Self { major, minor })
    }

    /// Subdirectory name used when publishing a tagged build.
    pub fn tag_dir(&self) -> String {
        format!("v{}.{}", self.major, self.minor)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

fn component_regex(part: &'static str) -> &'static Regex {
    static MAJOR: OnceLock<Regex> = OnceLock::new();
    static MINOR: OnceLock<Regex> = OnceLock::new();
    let cell = if part == "MAJOR" { &MAJOR } else { &MINOR };
    cell.get_or_init(|| {
        Regex::new(&format!(r#"^set\(Slicer_VERSION_{part} "([0-9]+)"\)"#))
            .expect("static version regex")
    })
}

/// Extract the version from CMake source text. The last matching
/// declaration of each component wins.
pub fn parse_version(cmake_text: &str) -> Result<Version, VersionError> {
    let mut major = None;
    let mut minor = None;
    for line in cmake_text.lines() {
        let line = line.trim();
        if let Some(c) = component_regex("MAJOR").captures(line) {
            major = Some(c[1].to_string());
        }
        if let Some(c) = component_regex("MINOR").captures(line) {
            minor = Some(c[1].to_string());
        }
    }
    Ok(Version {
        major: major.ok_or(VersionError::MissingComponent("MAJOR"))?,
        minor: minor.ok_or(VersionError::MissingComponent("MINOR"))?,
    })
}

/// Read `<src_dir>/CMakeLists.txt` and extract the version from it.
pub fn extract_version(src_dir: &Path) -> Result<Version, VersionError> {
    let path = src_dir.join(CMAKE_LISTS);
    debug!(path = %path.display(), "Reading version from build configuration");
    let text = fs::read_to_string(&path).map_err(|source| VersionError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let version = parse_version(&text)?;
    info!(%version, "Extracted version from CMakeLists.txt");
    Ok(version)
}
