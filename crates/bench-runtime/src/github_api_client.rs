//! GitHub REST client for pull-request reads, issue comments, and
//! installation tokens.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bench_github::github_transport_helpers::{
    backoff_delay, parse_retry_after, truncate_for_error, GithubRetryPolicy,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

pub const DEFAULT_GITHUB_API_BASE: &str = "https://api.github.com";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Public struct `RepoRef` used across bench bot components.
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn as_slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Head branch metadata of a pull request.
pub struct PullRequestHead {
    pub head_branch: String,
    pub head_author_login: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Timeout and retry knobs shared by every GitHub request.
pub struct GithubClientSettings {
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

impl Default for GithubClientSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            retry_max_attempts: 3,
            retry_base_delay_ms: 500,
        }
    }
}

/// GitHub operations the dispatch controller depends on.
#[async_trait]
pub trait BenchGithubApi: Send + Sync {
    async fn get_pull_request(&self, repo: &RepoRef, number: u64) -> Result<PullRequestHead>;

    async fn create_issue_comment(
        &self,
        repo: &RepoRef,
        issue_number: u64,
        body: &str,
    ) -> Result<u64>;

    async fn update_issue_comment(&self, repo: &RepoRef, comment_id: u64, body: &str)
        -> Result<()>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallationAccessToken {
    pub token: String,
    #[serde(default)]
    pub expires_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubPullRequestResponse {
    head: GithubPullRequestRef,
}

#[derive(Debug, Deserialize)]
struct GithubPullRequestRef {
    #[serde(rename = "ref")]
    git_ref: String,
    user: GithubLogin,
}

#[derive(Debug, Deserialize)]
struct GithubLogin {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GithubCommentResponse {
    id: u64,
}

#[derive(Clone)]
pub struct GithubApiClient {
    http: reqwest::Client,
    api_base: String,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl GithubApiClient {
    /// Build a client that sends `Authorization: Bearer <token>`. Both
    /// installation tokens and app JWTs are accepted in that form.
    pub fn new(api_base: &str, bearer_token: &str, settings: GithubClientSettings) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("bench-bot"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        let auth_header = format!("Bearer {}", bearer_token.trim());
        let mut auth_value = reqwest::header::HeaderValue::from_str(&auth_header)
            .context("invalid github authorization header")?;
        auth_value.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth_value);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(settings.request_timeout_ms.max(1)))
            .build()
            .context("failed to create github api client")?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            retry_max_attempts: settings.retry_max_attempts.max(1),
            retry_base_delay_ms: settings.retry_base_delay_ms.max(1),
        })
    }

    pub async fn create_installation_access_token(
        &self,
        installation_id: u64,
    ) -> Result<InstallationAccessToken> {
        self.request_json(
            "create installation access token",
            GithubRetryPolicy::Idempotent,
            || {
                self.http.post(format!(
                    "{}/app/installations/{}/access_tokens",
                    self.api_base, installation_id
                ))
            },
        )
        .await
    }

    /// Send the request built by `request_builder`, retrying whatever
    /// `policy` allows up to the configured attempt budget.
    async fn request_json<T, F>(
        &self,
        operation: &str,
        policy: GithubRetryPolicy,
        request_builder: F,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut failed_attempts = 0_usize;
        loop {
            let sent = request_builder()
                .header("x-bench-bot-retry-attempt", failed_attempts.to_string())
                .send()
                .await;
            let retry_after = match sent {
                Ok(response) if response.status().is_success() => {
                    return response
                        .json::<T>()
                        .await
                        .with_context(|| format!("failed to decode github {operation}"));
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    let retry_after = parse_retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    if !policy.retries_status(status)
                        || failed_attempts + 1 >= self.retry_max_attempts
                    {
                        bail!(
                            "github api {operation} failed with status {status}: {}",
                            truncate_for_error(&body, 800)
                        );
                    }
                    tracing::warn!(operation, status, failed_attempts, "retrying github request");
                    retry_after
                }
                Err(error) => {
                    if !policy.retries_transport_error(&error)
                        || failed_attempts + 1 >= self.retry_max_attempts
                    {
                        return Err(error)
                            .with_context(|| format!("github api {operation} request failed"));
                    }
                    tracing::warn!(operation, %error, failed_attempts, "retrying github request");
                    None
                }
            };
            failed_attempts += 1;
            tokio::time::sleep(backoff_delay(
                self.retry_base_delay_ms,
                failed_attempts,
                retry_after,
            ))
            .await;
        }
    }
}

#[async_trait]
impl BenchGithubApi for GithubApiClient {
    async fn get_pull_request(&self, repo: &RepoRef, number: u64) -> Result<PullRequestHead> {
        let pull: GithubPullRequestResponse = self
            .request_json("get pull request", GithubRetryPolicy::Idempotent, || {
                self.http.get(format!(
                    "{}/repos/{}/{}/pulls/{}",
                    self.api_base, repo.owner, repo.name, number
                ))
            })
            .await?;
        Ok(PullRequestHead {
            head_branch: pull.head.git_ref,
            head_author_login: pull.head.user.login,
        })
    }

    async fn create_issue_comment(
        &self,
        repo: &RepoRef,
        issue_number: u64,
        body: &str,
    ) -> Result<u64> {
        let payload = json!({ "body": body });
        let comment: GithubCommentResponse = self
            .request_json("create issue comment", GithubRetryPolicy::SingleDelivery, || {
                self.http
                    .post(format!(
                        "{}/repos/{}/{}/issues/{}/comments",
                        self.api_base, repo.owner, repo.name, issue_number
                    ))
                    .json(&payload)
            })
            .await?;
        Ok(comment.id)
    }

    async fn update_issue_comment(
        &self,
        repo: &RepoRef,
        comment_id: u64,
        body: &str,
    ) -> Result<()> {
        let payload = json!({ "body": body });
        let _: GithubCommentResponse = self
            .request_json("update issue comment", GithubRetryPolicy::Idempotent, || {
                self.http
                    .patch(format!(
                        "{}/repos/{}/{}/issues/comments/{}",
                        self.api_base, repo.owner, repo.name, comment_id
                    ))
                    .json(&payload)
            })
            .await?;
        Ok(())
    }
}
