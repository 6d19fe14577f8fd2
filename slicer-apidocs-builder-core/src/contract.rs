//! # contract: interface to the remote commit-status service
//!
//! The status reporter only needs three things from the hosting service:
//! resolve a branch to its head commit, tell whether a name is a tag, and
//! record a status against a commit. [`StatusApi`] captures exactly that, so
//! the reporter can run against the real GitHub client or a `mockall` mock.
//!
//! Mocks are exported when the `test-export-mocks` feature is on (default),
//! letting integration tests in other crates build `MockStatusApi`.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

/// Error type returned by [`StatusApi`] implementations.
pub type ApiError = Box<dyn std::error::Error + Send + Sync>;

/// Commit status states accepted by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusState {
    Pending,
    Failure,
    Success,
}

impl StatusState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusState::Pending => "pending",
            StatusState::Failure => "failure",
            StatusState::Success => "success",
        }
    }

    /// Human-readable description posted with the status.
    pub fn description(&self) -> &'static str {
        match self {
            StatusState::Pending => "API documentation is being generated",
            StatusState::Failure => "API documentation failed to be generated",
            StatusState::Success => "API documentation published",
        }
    }
}

impl fmt::Display for StatusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StatusState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(StatusState::Pending),
            "failure" => Ok(StatusState::Failure),
            "success" => Ok(StatusState::Success),
            other => Err(format!(
                "invalid status state `{other}` (expected pending, failure or success)"
            )),
        }
    }
}

/// Owner and name of a hosted repository, parsed from `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoName {
    pub owner: String,
    pub name: String,
}

impl RepoName {
    pub fn parse(full: &str) -> Option<Self> {
        let (owner, name) = full.split_once('/')?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Body of a status creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewStatus {
    pub state: StatusState,
    pub target_url: String,
    pub description: String,
    pub context: String,
}

/// Status as recorded by the API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusRecord {
    pub id: u64,
    pub state: StatusState,
    #[serde(default)]
    pub target_url: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

/// Remote operations needed by the status reporter.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait StatusApi: Send + Sync {
    /// Head commit SHA of `branch`, or `None` if no such branch exists.
    async fn branch_head(&self, repo: &RepoName, branch: &str) -> Result<Option<String>, ApiError>;

    /// Whether `name` refers to a tag in `repo`.
    async fn is_tag(&self, repo: &RepoName, name: &str) -> Result<bool, ApiError>;

    /// Record a status against `sha`. `None` means the service did not
    /// acknowledge the status.
    async fn create_status(
        &self,
        repo: &RepoName,
        sha: &str,
        status: NewStatus,
    ) -> Result<Option<StatusRecord>, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_name_requires_owner_and_name() {
        assert_eq!(
            RepoName::parse("Slicer/Slicer").unwrap().to_string(),
            "Slicer/Slicer"
        );
        assert!(RepoName::parse("Slicer").is_none());
        assert!(RepoName::parse("/Slicer").is_none());
        assert!(RepoName::parse("a/b/c").is_none());
    }

    #[test]
    fn state_round_trips_through_str() {
        for s in ["pending", "failure", "success"] {
            assert_eq!(s.parse::<StatusState>().unwrap().as_str(), s);
        }
        assert!("done".parse::<StatusState>().is_err());
    }

    #[test]
    fn new_status_serialises_lowercase_state() {
        let body = serde_json::to_value(NewStatus {
            state: StatusState::Success,
            target_url: "http://apidocs.slicer.org/master".into(),
            description: StatusState::Success.description().into(),
            context: "slicer/apidocs".into(),
        })
        .unwrap();
        assert_eq!(body["state"], "success");
        assert_eq!(body["context"], "slicer/apidocs");
    }
}
