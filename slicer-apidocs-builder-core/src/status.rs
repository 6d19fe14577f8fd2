//! Commit status reporting.
//!
//! A status run is a single, independent post: resolve the revision, work out
//! the target URL, and create the status. Missing parameters are not an
//! error; the run prints what is missing and returns
//! [`StatusOutcome::Skipped`] without touching the API.

use thiserror::Error;
use tracing::{error, info, warn};

use crate::contract::{ApiError, NewStatus, RepoName, StatusApi, StatusRecord, StatusState};
use crate::process::mask_secret;
use crate::version::Version;

/// Context tag attached to every status.
pub const STATUS_CONTEXT: &str = "slicer/apidocs";

const MISSING: &str = "(missing)";

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("repository name must be <owner>/<name>, got `{0}`")]
    InvalidRepoName(String),
    #[error("branch `{branch}` not found in {repo}")]
    UnknownBranch { repo: String, branch: String },
    #[error("status API request failed: {0}")]
    Api(#[source] ApiError),
    #[error("Failed to create GitHub status")]
    NoResponse,
}

#[derive(Clone, Default)]
pub struct StatusRequest {
    pub state: Option<StatusState>,
    pub repo_name: Option<String>,
    /// Commit SHA or branch name.
    pub revision: Option<String>,
    /// Where the revision came from, shown next to it in the report.
    pub revision_remark: String,
    pub target_url_base: Option<String>,
    pub target_url_path: Option<String>,
    pub token: Option<String>,
}

impl std::fmt::Debug for StatusRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusRequest")
            .field("state", &self.state)
            .field("repo_name", &self.repo_name)
            .field("revision", &self.revision)
            .field("target_url_base", &self.target_url_base)
            .field("target_url_path", &self.target_url_path)
            .field("token", &mask_secret(self.token.as_deref()))
            .finish()
    }
}

impl StatusRequest {
    /// Names of the required parameters that are absent or empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let fields = [
            ("state", self.state.map(|s| s.as_str())),
            ("repo_name", self.repo_name.as_deref()),
            ("revision", self.revision.as_deref()),
            ("target_url_base", self.target_url_base.as_deref()),
            ("target_url_path", self.target_url_path.as_deref()),
            ("token", self.token.as_deref()),
        ];
        fields
            .into_iter()
            .filter(|(_, v)| v.map_or(true, str::is_empty))
            .map(|(name, _)| name)
            .collect()
    }

    /// Parameter report printed before anything is sent.
    pub fn report(&self) -> String {
        let or_missing = |v: &Option<String>| v.clone().unwrap_or_else(|| MISSING.to_string());
        let base = or_missing(&self.target_url_base);
        let path = or_missing(&self.target_url_path);
        let state = self
            .state
            .map(|s| s.to_string())
            .unwrap_or_else(|| MISSING.to_string());
        [
            "Apidocs status update parameters".to_string(),
            format!("  * state .......................: {state}"),
            format!("  * repo_name ...................: {}", or_missing(&self.repo_name)),
            format!(
                "  * revision ....................: {}  {}",
                or_missing(&self.revision),
                self.revision_remark
            ),
            format!("  * target_url_base .............: {base}"),
            format!("  * target_url_path .............: {path}"),
            format!("  * target_url ..................: {base}/{path}"),
            format!(
                "  * github_token ................: {}",
                mask_secret(self.token.as_deref())
            ),
        ]
        .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusOutcome {
    Skipped { missing: Vec<&'static str> },
    Created {
        sha: String,
        target_url: String,
        record: StatusRecord,
    },
}

/// A full 40 character hexadecimal commit SHA.
pub fn is_commit_sha(revision: &str) -> bool {
    revision.len() == 40 && revision.chars().all(|c| c.is_ascii_hexdigit())
}

/// SHAs are used as-is; anything else is a branch resolved through the API.
pub async fn resolve_revision<A>(
    api: &A,
    repo: &RepoName,
    revision: &str,
) -> Result<String, StatusError>
where
    A: StatusApi + ?Sized,
{
    if is_commit_sha(revision) {
        return Ok(revision.to_string());
    }
    info!(repo = %repo, branch = revision, "Resolving branch to commit SHA");
    match api.branch_head(repo, revision).await.map_err(StatusError::Api)? {
        Some(sha) => {
            info!(branch = revision, sha = %sha, "Resolved branch head");
            Ok(sha)
        }
        None => {
            error!(repo = %repo, branch = revision, "Branch not found");
            Err(StatusError::UnknownBranch {
                repo: repo.to_string(),
                branch: revision.to_string(),
            })
        }
    }
}

/// Post one status update.
pub async fn report_status<A>(
    api: &A,
    request: &StatusRequest,
) -> Result<StatusOutcome, StatusError>
where
    A: StatusApi + ?Sized,
{
    println!("\n{}", request.report());

    let missing = request.missing_fields();
    if !missing.is_empty() {
        println!("\nAborting: parameters are missing");
        warn!(?missing, "Status update skipped, parameters are missing");
        return Ok(StatusOutcome::Skipped { missing });
    }

    // missing_fields() guarantees these are present and non-empty.
    let (Some(state), Some(repo_name), Some(revision), Some(base), Some(path)) = (
        request.state,
        request.repo_name.as_deref(),
        request.revision.as_deref(),
        request.target_url_base.as_deref(),
        request.target_url_path.as_deref(),
    ) else {
        return Ok(StatusOutcome::Skipped { missing: vec![] });
    };

    let repo = RepoName::parse(repo_name)
        .ok_or_else(|| StatusError::InvalidRepoName(repo_name.to_string()))?;

    let sha = resolve_revision(api, &repo, revision).await?;

    let mut path = path.to_string();
    if state == StatusState::Success
        && api.is_tag(&repo, &path).await.map_err(StatusError::Api)?
    {
        match Version::from_tag(&path) {
            Ok(version) => {
                let normalized = version.tag_dir();
                info!(tag = %path, path = %normalized, "Target is a tag, using version path");
                path = normalized;
            }
            Err(e) => warn!(tag = %path, reason = %e, "Tag is not a version, keeping its path"),
        }
    }
    let target_url = format!("{}/{}", base.trim_end_matches('/'), path);

    let status = NewStatus {
        state,
        target_url: target_url.clone(),
        description: state.description().to_string(),
        context: STATUS_CONTEXT.to_string(),
    };
    info!(
        repo = %repo,
        sha = %sha,
        state = %state,
        target_url = %target_url,
        "Creating commit status"
    );

    match api
        .create_status(&repo, &sha, status)
        .await
        .map_err(StatusError::Api)?
    {
        Some(record) => {
            info!(id = record.id, state = %record.state, "Commit status created");
            Ok(StatusOutcome::Created {
                sha,
                target_url,
                record,
            })
        }
        None => {
            error!(repo = %repo, sha = %sha, "Status API returned no status");
            Err(StatusError::NoResponse)
        }
    }
}
