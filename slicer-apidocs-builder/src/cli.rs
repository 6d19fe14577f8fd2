/// # slicer-apidocs-builder CLI (module)
///
/// Command-line surface of the tool: option parsing, the derived directory
/// layout, mode dispatch and the mapping from failures to exit codes.
///
/// Two modes share one parser:
/// - **status update**: when `--status-update-state` is given, post a single
///   commit status and stop;
/// - **build and publish** (default): check out the Slicer sources, build the
///   Doxygen documentation and publish it, unless publishing is skipped.
///
/// All pipeline steps live in [`slicer-apidocs-builder-core`]; this module only
/// resolves options and sequences them.
///
/// [`slicer-apidocs-builder-core`]: ../../slicer_apidocs_builder_core/
use crate::load_config::{load_config, Settings};
use crate::report::{RunReport, SkipPublish};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use slicer_apidocs_builder_core::build::{build_docs, head_revision, BuildConfig, BuildError};
use slicer_apidocs_builder_core::contract::StatusState;
use slicer_apidocs_builder_core::github::GithubClient;
use slicer_apidocs_builder_core::process::ProcessError;
use slicer_apidocs_builder_core::publish::{
    publish_docs, PublishConfig, PublishError, PublishOutcome,
};
use slicer_apidocs_builder_core::status::{report_status, StatusOutcome, StatusRequest};
use slicer_apidocs_builder_core::version::Version;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Build the Slicer API documentation with Doxygen and publish it to GitHub Pages.
#[derive(Parser, Debug, Clone, Default)]
#[clap(
    name = "slicer-apidocs-builder",
    version,
    about = "Build the Slicer API documentation with Doxygen and publish it to GitHub Pages"
)]
pub struct Cli {
    /// YAML file providing defaults for the options below
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Directory holding checkouts and build trees (default: system temp dir)
    #[clap(long)]
    pub work_dir: Option<PathBuf>,

    /// Base URL repositories are cloned from (default: https://github.com)
    #[clap(long)]
    pub github_url: Option<String>,

    /// cmake executable used to configure and build the documentation
    #[clap(long)]
    pub cmake_executable: Option<String>,

    /// Slicer repository to document (default: Slicer/Slicer)
    #[clap(long, help_heading = "Apidocs building")]
    pub slicer_repo_name: Option<String>,

    /// Slicer source checkout (default: <work-dir>/<owner>-<name>-<branch-or-tag>)
    #[clap(long, help_heading = "Apidocs building")]
    pub slicer_repo_dir: Option<PathBuf>,

    #[clap(long, default_value = "master", help_heading = "Apidocs building")]
    pub slicer_repo_branch: String,

    /// Tag to build; takes precedence over the branch
    #[clap(long, help_heading = "Apidocs building")]
    pub slicer_repo_tag: Option<String>,

    /// Configure the build tree but do not generate the HTML
    #[clap(long, help_heading = "Apidocs building")]
    pub skip_build: bool,

    #[clap(long, help_heading = "Apidocs publishing")]
    pub skip_publish: bool,

    /// Commit the documentation locally without pushing it
    #[clap(long, help_heading = "Apidocs publishing")]
    pub skip_push: bool,

    #[clap(long, help_heading = "Apidocs publishing")]
    pub publish_github_username: Option<String>,

    #[clap(long, help_heading = "Apidocs publishing")]
    pub publish_github_useremail: Option<String>,

    /// Repository hosting the published documentation (default: slicer/apidocs.slicer.org)
    #[clap(long, help_heading = "Apidocs publishing")]
    pub publish_github_repo_name: Option<String>,

    #[clap(long, help_heading = "Apidocs publishing")]
    pub publish_github_repo_branch: Option<String>,

    /// Token allowing to push the documentation; publishing is skipped without it
    #[clap(
        long,
        env = "PUBLISH_GITHUB_TOKEN",
        hide_env_values = true,
        help_heading = "Apidocs publishing"
    )]
    pub publish_github_token: Option<String>,

    /// Post a commit status instead of building
    #[clap(long, value_enum, help_heading = "Apidocs status update")]
    pub status_update_state: Option<StatusStateArg>,

    #[clap(long, help_heading = "Apidocs status update")]
    pub status_update_target_url_base: Option<String>,

    /// URL path of the documentation (default: branch or tag)
    #[clap(long, help_heading = "Apidocs status update")]
    pub status_update_target_url_path: Option<String>,

    /// Commit SHA or branch name (default: HEAD of the Slicer checkout)
    #[clap(long, help_heading = "Apidocs status update")]
    pub status_update_revision: Option<String>,

    /// Repository receiving the status (default: --slicer-repo-name)
    #[clap(long, help_heading = "Apidocs status update")]
    pub status_update_repo_name: Option<String>,

    #[clap(
        long,
        env = "STATUS_UPDATE_GITHUB_TOKEN",
        hide_env_values = true,
        help_heading = "Apidocs status update"
    )]
    pub status_update_token: Option<String>,

    #[clap(long, help_heading = "Apidocs status update")]
    pub status_update_api_url: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusStateArg {
    Pending,
    Failure,
    Success,
}

impl From<StatusStateArg> for StatusState {
    fn from(arg: StatusStateArg) -> Self {
        match arg {
            StatusStateArg::Pending => StatusState::Pending,
            StatusStateArg::Failure => StatusState::Failure,
            StatusStateArg::Success => StatusState::Success,
        }
    }
}

/// Options resolved against the settings file and the derived defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub repo_name: String,
    pub branch: String,
    pub tag: Option<String>,
    /// Tag when given, else the branch.
    pub reference: String,
    pub github_url: String,
    pub repo_clone_url: String,
    pub repo_dir: PathBuf,
    pub apidocs_src_dir: PathBuf,
    pub build_dir: PathBuf,
    pub cmake: String,
}

impl Plan {
    pub fn resolve(cli: &Cli, settings: &Settings) -> Result<Self> {
        let repo_name = cli
            .slicer_repo_name
            .clone()
            .unwrap_or_else(|| settings.slicer_repo_name.clone());
        let tag = cli.slicer_repo_tag.clone().filter(|t| !t.is_empty());
        let reference = tag.clone().unwrap_or_else(|| cli.slicer_repo_branch.clone());

        let work_dir = cli.work_dir.clone().unwrap_or_else(|| settings.work_dir());
        let stem = format!("{}-{}", repo_name.replace('/', "-"), reference);

        let repo_dir = match &cli.slicer_repo_dir {
            Some(dir) => dir.clone(),
            None => work_dir.join(&stem),
        };
        let repo_dir = absolute(&repo_dir)?;

        let github_url = cli
            .github_url
            .as_deref()
            .unwrap_or(&settings.github_url)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            repo_clone_url: format!("{github_url}/{repo_name}"),
            apidocs_src_dir: absolute(&work_dir.join(format!("{stem}-src")))?,
            build_dir: absolute(&work_dir.join(format!("{stem}-build")))?,
            cmake: cli
                .cmake_executable
                .clone()
                .unwrap_or_else(|| settings.cmake.clone()),
            repo_name,
            branch: cli.slicer_repo_branch.clone(),
            tag,
            reference,
            github_url,
            repo_dir,
        })
    }

    /// Subdirectory of the publishing repository replaced by this run: the
    /// version for a tag build, the branch name otherwise.
    pub fn publish_subdir(&self, version: &Version) -> String {
        match self.tag {
            Some(_) => version.tag_dir(),
            None => self.branch.clone(),
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Failed to resolve path {}", path.display()))
}

/// Async CLI entrypoint for `main()` and integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    let settings = match &cli.config {
        Some(path) => load_config(path)?,
        None => Settings::default(),
    };
    let plan = Plan::resolve(&cli, &settings)?;
    info!(?plan, "Resolved options");

    match cli.status_update_state {
        Some(state) => update_status(&cli, &settings, &plan, state.into()).await,
        None => build_and_publish(&cli, &settings, &plan),
    }
}

/// Status-update mode: one independent post to the status API.
pub async fn update_status(
    cli: &Cli,
    settings: &Settings,
    plan: &Plan,
    state: StatusState,
) -> Result<()> {
    let (revision, revision_remark) = match &cli.status_update_revision {
        Some(revision) => (Some(revision.clone()), String::new()),
        None if plan.repo_dir.join(".git").exists() => {
            let sha = head_revision(&plan.repo_dir).with_context(|| {
                format!("Failed to read HEAD of {}", plan.repo_dir.display())
            })?;
            let remark = format!(
                "(extracted from '<slicer_repo_dir:{}>')",
                plan.repo_dir.display()
            );
            (Some(sha), remark)
        }
        None => (
            None,
            format!(
                "('<slicer_repo_dir:{}/.git>' does not exist)",
                plan.repo_dir.display()
            ),
        ),
    };

    let request = StatusRequest {
        state: Some(state),
        repo_name: Some(
            cli.status_update_repo_name
                .clone()
                .unwrap_or_else(|| plan.repo_name.clone()),
        ),
        revision,
        revision_remark,
        target_url_base: Some(
            cli.status_update_target_url_base
                .clone()
                .unwrap_or_else(|| settings.status.target_url_base.clone()),
        ),
        target_url_path: Some(
            cli.status_update_target_url_path
                .clone()
                .unwrap_or_else(|| plan.reference.clone()),
        ),
        token: cli.status_update_token.clone().filter(|t| !t.is_empty()),
    };

    let api_url = cli
        .status_update_api_url
        .as_deref()
        .unwrap_or(&settings.status.api_url);
    // Without a token the request is skipped before any call is made.
    let client = GithubClient::with_base_url(request.token.clone().unwrap_or_default(), api_url)
        .map_err(|e| anyhow!("Failed to construct GitHub client: {e}"))?;

    match report_status(&client, &request).await? {
        StatusOutcome::Skipped { missing } => {
            warn!(?missing, "Status update skipped");
        }
        StatusOutcome::Created {
            sha, target_url, ..
        } => {
            println!("\nStatus '{state}' set on {sha} ({target_url})");
        }
    }
    Ok(())
}

/// Default mode: build the documentation, then publish it.
pub fn build_and_publish(cli: &Cli, settings: &Settings, plan: &Plan) -> Result<()> {
    let token = cli.publish_github_token.clone().filter(|t| !t.is_empty());
    let skip_publish = if cli.skip_publish {
        Some(SkipPublish::Requested)
    } else if token.is_none() {
        Some(SkipPublish::MissingToken)
    } else {
        None
    };

    let publish_repo_name = cli
        .publish_github_repo_name
        .clone()
        .unwrap_or_else(|| settings.publish.repo_name.clone());
    let publish_repo_url = format!("{}/{}", plan.github_url, publish_repo_name);
    let publish_branch = cli
        .publish_github_repo_branch
        .clone()
        .unwrap_or_else(|| settings.publish.repo_branch.clone());
    let username = cli
        .publish_github_username
        .clone()
        .unwrap_or_else(|| settings.publish.username.clone());
    let useremail = cli
        .publish_github_useremail
        .clone()
        .unwrap_or_else(|| settings.publish.useremail.clone());

    let report = RunReport {
        repo_clone_url: plan.repo_clone_url.clone(),
        repo_name: plan.repo_name.clone(),
        repo_branch: plan.branch.clone(),
        repo_tag: plan.tag.clone(),
        repo_dir: plan.repo_dir.clone(),
        apidocs_src_dir: plan.apidocs_src_dir.clone(),
        apidocs_build_dir: plan.build_dir.clone(),
        publish_username: username.clone(),
        publish_useremail: useremail.clone(),
        publish_repo_url: publish_repo_url.clone(),
        publish_repo_name: publish_repo_name.clone(),
        publish_repo_branch: publish_branch.clone(),
        publish_token: token.clone(),
        skip_clone: plan.repo_dir.exists(),
        skip_build: cli.skip_build,
        skip_publish,
    };
    println!("{}", report.render());

    let build_config = BuildConfig {
        repo_clone_url: plan.repo_clone_url.clone(),
        branch: plan.branch.clone(),
        tag: plan.tag.clone(),
        repo_dir: plan.repo_dir.clone(),
        apidocs_src_dir: plan.apidocs_src_dir.clone(),
        build_dir: plan.build_dir.clone(),
        cmake: plan.cmake.clone(),
        skip_build: cli.skip_build,
    };
    let output = build_docs(&build_config).context("Failed to build the API documentation")?;
    println!("slicer_repo_head_sha: {}", output.checkout.head_sha);

    match (skip_publish, token) {
        (None, Some(token)) => {
            let short_sha = output
                .checkout
                .head_sha
                .get(..8)
                .unwrap_or(output.checkout.head_sha.as_str());
            let source_ref = format!(
                "{}@{}",
                plan.repo_name,
                plan.tag.as_deref().unwrap_or(short_sha)
            );
            let subdir = plan.publish_subdir(&output.version);

            let publish_config = PublishConfig {
                output_dir: output.doxygen_output_dir.clone(),
                repo_clone_url: publish_repo_url.clone(),
                repo_push_url: publish_repo_url,
                branch: publish_branch,
                username,
                useremail,
                token,
                subdir,
                source_ref,
                skip_push: cli.skip_push,
            };
            match publish_docs(&publish_config)
                .context("Failed to publish the API documentation")?
            {
                PublishOutcome::NothingToPublish => {}
                PublishOutcome::Committed { commit } => {
                    println!("\nCommitted {commit} (push skipped: --skip-push argument)");
                }
                PublishOutcome::Published { commit } => {
                    println!("\nPublished {commit} to {}", publish_config.branch);
                }
            }
        }
        (reason, _) => {
            let reason = reason.unwrap_or(SkipPublish::MissingToken);
            println!("\nSkipping publish {}", reason.reason());
            info!(reason = reason.reason(), "Publishing skipped");
        }
    }

    if !cli.skip_build {
        println!("{}", report.render());
    }
    Ok(())
}

/// The subprocess failure behind `err`, if any.
pub fn process_failure(err: &anyhow::Error) -> Option<&ProcessError> {
    err.chain().find_map(|cause| {
        if let Some(process) = cause.downcast_ref::<ProcessError>() {
            return Some(process);
        }
        if let Some(BuildError::Process(process)) = cause.downcast_ref::<BuildError>() {
            return Some(process);
        }
        match cause.downcast_ref::<PublishError>() {
            Some(PublishError::Process(process)) => Some(process),
            _ => None,
        }
    })
}

/// Exit code for a failed run: the failing subprocess's code, else 1.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    let push_code = err.chain().find_map(|cause| match cause.downcast_ref::<PublishError>() {
        Some(PublishError::Push { code, .. }) => Some(*code),
        _ => None,
    });
    push_code
        .or_else(|| process_failure(err).and_then(ProcessError::exit_code))
        .filter(|code| *code > 0)
        .unwrap_or(1)
}

/// Prints the failure the way a user needs it and returns the exit code.
pub fn report_failure(err: &anyhow::Error) -> i32 {
    let code = exit_code(err);
    error!(error = %format!("{err:#}"), code, "Run failed");
    println!("\n{err:#}");
    println!("\nExit code: {code}");
    if let Some(output) = process_failure(err).and_then(ProcessError::output) {
        println!("\nOutput:\n{output}");
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["slicer-apidocs-builder"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).expect("arguments should parse")
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn derived_directories_use_branch_and_work_dir() {
        let cli = parse(&["--work-dir", "/work", "--slicer-repo-branch", "main"]);
        let plan = Plan::resolve(&cli, &Settings::default()).unwrap();
        assert_eq!(plan.reference, "main");
        assert_eq!(plan.repo_dir, PathBuf::from("/work/Slicer-Slicer-main"));
        assert_eq!(plan.apidocs_src_dir, PathBuf::from("/work/Slicer-Slicer-main-src"));
        assert_eq!(plan.build_dir, PathBuf::from("/work/Slicer-Slicer-main-build"));
        assert_eq!(plan.repo_clone_url, "https://github.com/Slicer/Slicer");
    }

    #[test]
    fn tag_wins_over_branch() {
        let cli = parse(&[
            "--work-dir",
            "/work",
            "--slicer-repo-tag",
            "v5.2.1",
            "--github-url",
            "https://example.org/",
        ]);
        let plan = Plan::resolve(&cli, &Settings::default()).unwrap();
        assert_eq!(plan.branch, "master");
        assert_eq!(plan.reference, "v5.2.1");
        assert_eq!(plan.repo_dir, PathBuf::from("/work/Slicer-Slicer-v5.2.1"));
        assert_eq!(plan.repo_clone_url, "https://example.org/Slicer/Slicer");
    }

    #[test]
    fn publish_subdir_follows_explicit_tag_only() {
        let version = Version::from_tag("v5.3.0").unwrap();
        let branch = Plan::resolve(&parse(&["--work-dir", "/w"]), &Settings::default()).unwrap();
        assert_eq!(branch.publish_subdir(&version), "master");

        let cli = parse(&["--work-dir", "/w", "--slicer-repo-tag", "v5.3.0"]);
        let tagged = Plan::resolve(&cli, &Settings::default()).unwrap();
        assert_eq!(tagged.publish_subdir(&version), "v5.3");
    }

    #[test]
    fn flags_override_settings() {
        let mut settings = Settings::default();
        settings.slicer_repo_name = "fork/Slicer".into();
        settings.cmake = "/opt/cmake/bin/cmake".into();

        let plan = Plan::resolve(&parse(&["--work-dir", "/w"]), &settings).unwrap();
        assert_eq!(plan.repo_name, "fork/Slicer");
        assert_eq!(plan.cmake, "/opt/cmake/bin/cmake");

        let cli = parse(&[
            "--work-dir",
            "/w",
            "--slicer-repo-name",
            "other/Slicer",
            "--cmake-executable",
            "cmake3",
        ]);
        let plan = Plan::resolve(&cli, &settings).unwrap();
        assert_eq!(plan.repo_name, "other/Slicer");
        assert_eq!(plan.cmake, "cmake3");
    }

    #[test]
    fn unknown_status_state_is_rejected() {
        let err = Cli::try_parse_from(["slicer-apidocs-builder", "--status-update-state", "done"]);
        assert!(err.is_err());
        let cli = parse(&["--status-update-state", "success"]);
        assert_eq!(cli.status_update_state, Some(StatusStateArg::Success));
    }

    #[test]
    fn exit_code_follows_failing_subprocess() {
        let failed = ProcessError::Failed {
            command: "cmake --build .".into(),
            code: 2,
            output: Some("boom".into()),
        };
        let err = anyhow::Error::new(BuildError::from(failed)).context("Failed to build");
        assert_eq!(exit_code(&err), 2);
        assert_eq!(process_failure(&err).and_then(ProcessError::output), Some("boom"));

        let push = anyhow::Error::new(PublishError::Push {
            command: "git push".into(),
            code: 128,
        });
        assert_eq!(exit_code(&push), 128);

        assert_eq!(exit_code(&anyhow!("other failure")), 1);
    }
}
