//! Where rendered comment bodies go: GitHub issue comments in production, the
//! local log in debug mode. The mode is chosen once at startup.

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::credential_broker::GithubApiConnector;
use crate::github_api_client::{BenchGithubApi, RepoRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Identifies a comment created through a [`CommentSink`].
pub enum CommentHandle {
    Github(u64),
    Logged,
}

#[async_trait]
pub trait CommentSink: Send + Sync {
    async fn create_comment(
        &self,
        repo: &RepoRef,
        issue_number: u64,
        body: &str,
    ) -> Result<CommentHandle>;

    async fn update_comment(
        &self,
        repo: &RepoRef,
        handle: &CommentHandle,
        body: &str,
    ) -> Result<()>;
}

pub struct GithubCommentSink {
    api: Arc<dyn BenchGithubApi>,
}

impl GithubCommentSink {
    pub fn new(api: Arc<dyn BenchGithubApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl CommentSink for GithubCommentSink {
    async fn create_comment(
        &self,
        repo: &RepoRef,
        issue_number: u64,
        body: &str,
    ) -> Result<CommentHandle> {
        let id = self
            .api
            .create_issue_comment(repo, issue_number, body)
            .await?;
        Ok(CommentHandle::Github(id))
    }

    async fn update_comment(
        &self,
        repo: &RepoRef,
        handle: &CommentHandle,
        body: &str,
    ) -> Result<()> {
        let CommentHandle::Github(comment_id) = handle else {
            bail!("cannot update a comment that was only logged");
        };
        self.api.update_issue_comment(repo, *comment_id, body).await
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogCommentSink;

#[async_trait]
impl CommentSink for LogCommentSink {
    async fn create_comment(
        &self,
        repo: &RepoRef,
        issue_number: u64,
        body: &str,
    ) -> Result<CommentHandle> {
        tracing::info!(
            repo = %repo.as_slug(),
            issue_number,
            "debug mode comment (not posted):\n{body}"
        );
        Ok(CommentHandle::Logged)
    }

    async fn update_comment(
        &self,
        repo: &RepoRef,
        handle: &CommentHandle,
        body: &str,
    ) -> Result<()> {
        tracing::info!(
            repo = %repo.as_slug(),
            ?handle,
            "debug mode comment update (not posted):\n{body}"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerates supported `CommentOutputMode` values.
pub enum CommentOutputMode {
    Github,
    Log,
}

impl CommentOutputMode {
    pub fn from_debug_flag(debug: bool) -> Self {
        if debug {
            Self::Log
        } else {
            Self::Github
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Log => "log",
        }
    }

    /// Sink for a session that already holds an API client.
    pub fn sink_for(self, api: Arc<dyn BenchGithubApi>) -> Arc<dyn CommentSink> {
        match self {
            Self::Github => Arc::new(GithubCommentSink::new(api)),
            Self::Log => Arc::new(LogCommentSink),
        }
    }

    /// Sink opened from scratch; the log mode never contacts GitHub.
    pub async fn open(
        self,
        connector: &dyn GithubApiConnector,
        installation_id: Option<u64>,
    ) -> Result<Arc<dyn CommentSink>> {
        match self {
            Self::Github => Ok(self.sink_for(connector.connect(installation_id).await?)),
            Self::Log => Ok(Arc::new(LogCommentSink)),
        }
    }
}
