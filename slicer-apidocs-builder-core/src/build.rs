//! Source checkout and Doxygen build.
//!
//! Steps, in order:
//!   - install the bundled apidocs CMake project into its source directory
//!   - clone the Slicer sources (shallow) unless a checkout already exists
//!   - bring the checkout to the requested branch or tag
//!   - derive the `<major>.<minor>` version
//!   - configure the apidocs project with CMake and build the `doc` target
//!   - check that `Utilities/Doxygen/html/index.html` was produced
//!
//! Every external command failure is fatal and returned as [`BuildError`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{error, info, warn};

use crate::process::{ensure_directory, scoped_working_directory, Exec, ProcessError};
use crate::version::{extract_version, Version, VersionError};

/// CMake project driving the Doxygen build; written next to the build dir.
pub const APIDOCS_CMAKELISTS: &str = include_str!("../assets/CMakeLists.txt");

/// Where the `doc` target writes its output, relative to the build dir.
pub const DOXYGEN_OUTPUT_SUBDIR: &str = "Utilities/Doxygen";

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error(transparent)]
    Version(#[from] VersionError),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
    #[error("expected build output is missing: {0}")]
    MissingOutput(PathBuf),
}

fn io_err(context: impl Into<String>) -> impl FnOnce(io::Error) -> BuildError {
    let context = context.into();
    move |source| BuildError::Io { context, source }
}

#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// URL (or local path) the Slicer sources are cloned from.
    pub repo_clone_url: String,
    pub branch: String,
    /// When set, the tag is built instead of the branch.
    pub tag: Option<String>,
    pub repo_dir: PathBuf,
    pub apidocs_src_dir: PathBuf,
    pub build_dir: PathBuf,
    /// CMake executable.
    pub cmake: String,
    /// Configure only; reuse whatever HTML a previous build left behind.
    pub skip_build: bool,
}

impl BuildConfig {
    /// The reference actually checked out: the tag if any, else the branch.
    pub fn reference(&self) -> &str {
        self.tag.as_deref().unwrap_or(&self.branch)
    }

    /// Directory that receives Doxygen output (parent of `html/`).
    pub fn doxygen_output_dir(&self) -> PathBuf {
        self.build_dir.join(DOXYGEN_OUTPUT_SUBDIR)
    }
}

/// State of the source checkout after syncing it to the requested reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCheckout {
    pub path: PathBuf,
    pub is_tag: bool,
    pub head_sha: String,
    /// Whether this run performed the clone.
    pub cloned: bool,
}

#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub doxygen_output_dir: PathBuf,
    pub version: Version,
    pub checkout: SourceCheckout,
}

impl BuildOutput {
    pub fn html_index(&self) -> PathBuf {
        self.doxygen_output_dir.join("html").join("index.html")
    }
}

/// Run the full build: checkout, version, configure, build, verify.
pub fn build_docs(config: &BuildConfig) -> Result<BuildOutput, BuildError> {
    info!(
        repo = %config.repo_clone_url,
        reference = config.reference(),
        repo_dir = %config.repo_dir.display(),
        "Starting apidocs build"
    );

    install_apidocs_project(&config.apidocs_src_dir)?;
    let checkout = checkout_source(config)?;
    let version = resolve_version(config, &checkout)?;
    println!("\nSlicer version: {version}");

    configure_and_build(config, &checkout.path, &version)?;

    let output = BuildOutput {
        doxygen_output_dir: std::path::absolute(config.doxygen_output_dir())
            .map_err(io_err("Failed to resolve build output directory"))?,
        version,
        checkout,
    };

    let index = output.html_index();
    if !index.is_file() {
        if config.skip_build {
            warn!(path = %index.display(), "Build skipped and no previous HTML output found");
        } else {
            error!(path = %index.display(), "Documentation build did not produce index.html");
            return Err(BuildError::MissingOutput(index));
        }
    }

    info!(
        version = %output.version,
        head = %output.checkout.head_sha,
        output = %output.doxygen_output_dir.display(),
        "Apidocs build finished"
    );
    Ok(output)
}

/// Write the bundled CMake project into `dir`.
pub fn install_apidocs_project(dir: &Path) -> Result<(), BuildError> {
    ensure_directory(dir).map_err(io_err(format!("Failed to create {}", dir.display())))?;
    let target = dir.join("CMakeLists.txt");
    println!("\nWriting apidocs project into {}", dir.display());
    fs::write(&target, APIDOCS_CMAKELISTS)
        .map_err(io_err(format!("Failed to write {}", target.display())))
}

/// Clone the sources if needed and reset them to the requested reference.
pub fn checkout_source(config: &BuildConfig) -> Result<SourceCheckout, BuildError> {
    let repo_dir = std::path::absolute(&config.repo_dir)
        .map_err(io_err("Failed to resolve source checkout directory"))?;
    let reference = config.reference();

    let cloned = !repo_dir.exists();
    if cloned {
        if let Some(parent) = repo_dir.parent() {
            ensure_directory(parent)
                .map_err(io_err(format!("Failed to create {}", parent.display())))?;
        }
        Exec::new("git")
            .arg("clone")
            .arg(&config.repo_clone_url)
            .args(["--branch", reference, "--depth", "1"])
            .arg(&repo_dir)
            .status()?;
        info!(path = %repo_dir.display(), reference, "Cloned source repository");
    } else {
        info!(path = %repo_dir.display(), "Found existing checkout: skipping clone");
    }

    let _cwd = scoped_working_directory(&repo_dir, false)
        .map_err(io_err(format!("Failed to enter {}", repo_dir.display())))?;

    if !cloned && config.tag.is_some() {
        Exec::new("git").args(["fetch", "origin", "tag", reference]).status()?;
    }

    let is_tag = is_tag_reference(reference);
    if is_tag {
        Exec::new("git").args(["reset", "--hard", reference]).status()?;
    } else {
        Exec::new("git").args(["fetch", "origin", reference]).status()?;
        Exec::new("git")
            .args(["reset", "--hard", &format!("origin/{reference}")])
            .status()?;
    }

    let head_sha = head_revision(Path::new("."))?;
    println!("Slicer HEAD: {head_sha}");

    Ok(SourceCheckout {
        path: repo_dir,
        is_tag,
        head_sha,
        cloned,
    })
}

/// `git describe --exact-match` succeeds only when a tag named `reference`
/// exists.
/// Runs in the current working directory.
pub fn is_tag_reference(reference: &str) -> bool {
    // Fully qualified so a branch whose tip carries a tag is still a branch.
    let described = Exec::new("git")
        .args(["describe", "--exact-match", "--tags"])
        .arg(format!("refs/tags/{reference}"))
        .probe();
    match described {
        Ok(_) => true,
        Err(e) => {
            info!(reference, reason = %e, "Reference is not a tag, treating it as a branch");
            false
        }
    }
}

/// Commit SHA checked out in `repo_dir`.
pub fn head_revision(repo_dir: &Path) -> Result<String, ProcessError> {
    Exec::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(repo_dir)
        .probe()
        .map(|out| out.trim().to_string())
}

/// An explicit tag gives the version; otherwise the sources do, even when
/// the branch tip happens to carry a tag.
pub fn resolve_version(
    config: &BuildConfig,
    checkout: &SourceCheckout,
) -> Result<Version, BuildError> {
    match &config.tag {
        Some(tag) => Ok(Version::from_tag(tag)?),
        None => Ok(extract_version(&checkout.path)?),
    }
}

fn configure_and_build(
    config: &BuildConfig,
    source_dir: &Path,
    version: &Version,
) -> Result<(), BuildError> {
    let apidocs_src_dir = std::path::absolute(&config.apidocs_src_dir)
        .map_err(io_err("Failed to resolve apidocs source directory"))?;

    let _cwd = scoped_working_directory(&config.build_dir, true)
        .map_err(io_err(format!("Failed to enter {}", config.build_dir.display())))?;

    Exec::new(&config.cmake)
        .arg(format!("-DSlicer_SOURCE_DIR:PATH={}", source_dir.display()))
        .arg(format!("-DSlicer_VERSION:STRING={version}"))
        .arg(&apidocs_src_dir)
        .status()?;

    if config.skip_build {
        info!("Skipping documentation build (--skip-build)");
        return Ok(());
    }

    Exec::new(&config.cmake)
        .args(["--build", ".", "--target", "doc"])
        .status()?;
    Ok(())
}
