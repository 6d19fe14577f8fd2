//! GitHub REST implementation of [`StatusApi`].

use std::fmt;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, error};

use crate::contract::{ApiError, NewStatus, RepoName, StatusApi, StatusRecord};

pub const GITHUB_API_URL: &str = "https://api.github.com/";

const USER_AGENT: &str = concat!("slicer-apidocs-builder/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct GithubClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl fmt::Debug for GithubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
}

impl GithubClient {
    pub fn new(token: String) -> Result<Self, ApiError> {
        Self::with_base_url(token, GITHUB_API_URL)
    }

    /// Client for a GitHub-compatible API rooted at `base_url`.
    pub fn with_base_url(token: String, base_url: &str) -> Result<Self, ApiError> {
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)?;
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    fn endpoint(&self, repo: &RepoName, tail: &str) -> Result<Url, ApiError> {
        let path = format!("repos/{}/{}/{}", repo.owner, repo.name, tail);
        Ok(self.base_url.join(&path)?)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
    }

    /// Request creating a status on `sha`; separate from sending so it can be
    /// inspected.
    pub fn build_create_status_request(
        &self,
        repo: &RepoName,
        sha: &str,
        status: &NewStatus,
    ) -> Result<reqwest::Request, ApiError> {
        let url = self.endpoint(repo, &format!("statuses/{sha}"))?;
        Ok(self.request(Method::POST, url).json(status).build()?)
    }

    /// GET a git ref; `None` on 404.
    async fn get_ref(&self, repo: &RepoName, git_ref: &str) -> Result<Option<GitRef>, ApiError> {
        let url = self.endpoint(repo, &format!("git/ref/{git_ref}"))?;
        debug!(url = %url, "Fetching git ref");
        let res = self.request(Method::GET, url.clone()).send().await?;
        match res.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(res.json().await?)),
            s => {
                let body = res.text().await.unwrap_or_default();
                error!(status = %s, url = %url, "GitHub ref lookup failed: {body}");
                Err(format!("GitHub error {s} for {url}: {body}").into())
            }
        }
    }
}

#[async_trait]
impl StatusApi for GithubClient {
    async fn branch_head(&self, repo: &RepoName, branch: &str) -> Result<Option<String>, ApiError> {
        Ok(self
            .get_ref(repo, &format!("heads/{branch}"))
            .await?
            .map(|r| r.object.sha))
    }

    async fn is_tag(&self, repo: &RepoName, name: &str) -> Result<bool, ApiError> {
        Ok(self.get_ref(repo, &format!("tags/{name}")).await?.is_some())
    }

    async fn create_status(
        &self,
        repo: &RepoName,
        sha: &str,
        status: NewStatus,
    ) -> Result<Option<StatusRecord>, ApiError> {
        let request = self.build_create_status_request(repo, sha, &status)?;
        debug!(url = %request.url(), state = %status.state, "Posting commit status");
        let res = self.http.execute(request).await?;
        if !res.status().is_success() {
            let code = res.status();
            let body = res.text().await.unwrap_or_default();
            error!(status = %code, "GitHub rejected status: {body}");
            return Ok(None);
        }
        Ok(Some(res.json().await?))
    }
}
