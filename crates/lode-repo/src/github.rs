//! GitHub repository host.
//!
//! Uses the REST API for ref resolution and star counts, and the raw content
//! host for file reads. The HTTP client is blocking, so every request runs on
//! tokio's blocking pool.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};
use ureq::Agent;

use crate::host::{HostError, HostErrorKind, RepositoryHost};

/// Default HTTP timeout in seconds.
const DEFAULT_TIMEOUT: u64 = 30;

const BACKEND: &str = "GitHub";

/// Subset of `GET /repos/{repo}`.
#[derive(Deserialize)]
struct RepoInfo {
    stargazers_count: u64,
}

/// Web host for browsable source links.
const WEB_URL: &str = "https://github.com";

/// GitHub host backed by `ureq`.
#[derive(Clone)]
pub struct GitHubHost {
    agent: Agent,
    api_url: String,
    raw_url: String,
    token: Option<String>,
}

impl GitHubHost {
    /// Create a host.
    ///
    /// # Arguments
    /// * `api_url` - REST API base URL (e.g., `https://api.github.com`)
    /// * `raw_url` - Raw content base URL (e.g., `https://raw.githubusercontent.com`)
    /// * `token` - Optional access token sent as a bearer token
    #[must_use]
    pub fn new(api_url: &str, raw_url: &str, token: Option<String>) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT)))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            api_url: api_url.trim_end_matches('/').to_owned(),
            raw_url: raw_url.trim_end_matches('/').to_owned(),
            token,
        }
    }

    /// Issue a blocking GET request and return the response body.
    fn get(&self, url: &str, accept: &str) -> Result<String, HostError> {
        debug!("GET {url}");

        let mut request = self
            .agent
            .get(url)
            .header("Accept", accept)
            .header("User-Agent", "lode");
        if let Some(token) = &self.token {
            request = request.header("Authorization", &format!("Bearer {token}"));
        }

        let response = request.call().map_err(|e| transport_error(e, url))?;

        let status = response.status().as_u16();
        let mut body_reader = response.into_body();

        if status >= 400 {
            return Err(HostError::from_http_status(status, url).with_backend(BACKEND));
        }

        body_reader
            .read_to_string()
            .map_err(|e| transport_error(e, url))
    }

    /// Run a blocking request on the blocking pool.
    async fn spawn_get(&self, url: String, accept: &'static str) -> Result<String, HostError> {
        let host = self.clone();
        tokio::task::spawn_blocking(move || host.get(&url, accept))
            .await
            .map_err(|e| {
                HostError::new(HostErrorKind::Other)
                    .with_backend(BACKEND)
                    .with_source(e)
            })?
    }
}

/// Expand `tags/x` and `heads/x` shorthands to fully qualified refs.
///
/// Anything else (branch, tag or commit id) is passed through.
fn normalize_ref(git_ref: &str) -> String {
    if git_ref.starts_with("tags/") || git_ref.starts_with("heads/") {
        format!("refs/{git_ref}")
    } else {
        git_ref.to_owned()
    }
}

fn transport_error(err: ureq::Error, url: &str) -> HostError {
    let kind = match err {
        ureq::Error::Timeout(_) => HostErrorKind::Timeout,
        _ => HostErrorKind::Unavailable,
    };
    HostError::new(kind)
        .with_backend(BACKEND)
        .with_context(url)
        .with_source(err)
}

#[async_trait]
impl RepositoryHost for GitHubHost {
    async fn resolve_ref(&self, repository: &str, git_ref: &str) -> Result<String, HostError> {
        let url = format!(
            "{}/repos/{repository}/commits/{}",
            self.api_url,
            normalize_ref(git_ref)
        );
        info!("Resolving {repository}@{git_ref}");

        let sha = self.spawn_get(url, "application/vnd.github.sha").await?;
        Ok(sha.trim().to_owned())
    }

    async fn read_file(
        &self,
        repository: &str,
        commit: &str,
        path: &str,
    ) -> Result<String, HostError> {
        self.spawn_get(self.file_url(repository, commit, path), "text/plain")
            .await
    }

    fn file_url(&self, repository: &str, commit: &str, path: &str) -> String {
        format!("{}/{repository}/{commit}/{path}", self.raw_url)
    }

    fn tree_url(&self, repository: &str, git_ref: &str, path: &str) -> String {
        format!("{WEB_URL}/{repository}/tree/{git_ref}/{path}")
    }

    async fn star_count(&self, repository: &str) -> Result<u64, HostError> {
        let url = format!("{}/repos/{repository}", self.api_url);
        let body = self.spawn_get(url, "application/vnd.github+json").await?;
        let info: RepoInfo = serde_json::from_str(&body).map_err(|e| {
            HostError::new(HostErrorKind::Other)
                .with_backend(BACKEND)
                .with_context(repository)
                .with_source(e)
        })?;
        Ok(info.stargazers_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slashes_are_trimmed() {
        let host = GitHubHost::new(
            "https://api.github.com/",
            "https://raw.githubusercontent.com/",
            None,
        );

        assert_eq!(
            host.file_url("thefrontside/effectionx", "abc123", "deno.json"),
            "https://raw.githubusercontent.com/thefrontside/effectionx/abc123/deno.json"
        );
    }

    #[test]
    fn test_tree_url() {
        let host = GitHubHost::new("https://api.github.com", "https://raw.githubusercontent.com", None);
        assert_eq!(
            host.tree_url("thefrontside/effectionx", "main", "task-buffer"),
            "https://github.com/thefrontside/effectionx/tree/main/task-buffer"
        );
    }

    #[test]
    fn test_normalize_ref() {
        assert_eq!(normalize_ref("tags/effection-v3.2.1"), "refs/tags/effection-v3.2.1");
        assert_eq!(normalize_ref("heads/main"), "refs/heads/main");
        assert_eq!(normalize_ref("v4"), "v4");
        assert_eq!(normalize_ref("abc123"), "abc123");
    }

    #[test]
    fn test_repo_info_parses_star_count() {
        let info: RepoInfo =
            serde_json::from_str(r#"{"full_name":"a/b","stargazers_count":1234}"#).unwrap();
        assert_eq!(info.stargazers_count, 1234);
    }
}
