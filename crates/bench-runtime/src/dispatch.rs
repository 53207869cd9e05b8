//! Per-delivery orchestration of a `/bench` request: validation, toolchain
//! preflight, the starting comment, delegate routing, and the final update.

use std::sync::Arc;

use anyhow::{Context, Result};
use bench_github::bench_command_parser::{bench_command_from_event, BenchCommand};
use bench_github::bench_comment::{
    render_bench_report_comment, render_exception_comment, render_failure_comment,
    render_failure_detail, render_starting_comment, MISSING_INSTALLATION_COMMENT,
    TOOLCHAIN_QUERY_FAILED_COMMENT,
};
use bench_github::bench_event::TriggerEvent;
use bench_github::bench_report::BenchReport;
use thiserror::Error;

use crate::bench_delegate::{BenchConfig, BenchDelegates, DelegateKind};
use crate::command_runner::{CommandRequest, CommandRunner, TOOLCHAIN_QUERY_COMMAND};
use crate::comment_sink::{CommentOutputMode, CommentSink};
use crate::credential_broker::{GithubApiConnector, InstallationTokenIssuer, PushDomainProvider};
use crate::github_api_client::RepoRef;

/// Tracing target for events that need operator attention.
pub const FATAL_LOG_TARGET: &str = "bench_bot::fatal";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStage {
    Filtering,
    Validating,
    Preflight,
    Running,
    Reporting,
}

impl DispatchStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Filtering => "filtering",
            Self::Validating => "validating",
            Self::Preflight => "preflight",
            Self::Running => "running",
            Self::Reporting => "reporting",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Reasons a triggered run stopped before posting a success body.
pub enum DispatchAbort {
    #[error("installation id was missing from webhook payload")]
    MissingInstallation,
    #[error("failed to query the active rust toolchain: {0}")]
    ToolchainProbe(String),
    #[error("benchmark failed: {0}")]
    DelegateFailure(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    NotApplicable,
    Completed {
        kind: DelegateKind,
    },
    Aborted {
        stage: DispatchStage,
        reason: DispatchAbort,
    },
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub base_branch: String,
    pub github_host: String,
    pub output_mode: CommentOutputMode,
}

/// Where a delivery got to, kept so unexpected errors can be attributed and
/// reported on the session already opened.
struct DispatchProgress {
    stage: DispatchStage,
    sink: Option<Arc<dyn CommentSink>>,
}

pub struct BenchDispatcher {
    connector: Arc<dyn GithubApiConnector>,
    token_issuer: Arc<dyn InstallationTokenIssuer>,
    runner: Arc<dyn CommandRunner>,
    delegates: BenchDelegates,
    settings: DispatchSettings,
}

impl BenchDispatcher {
    pub fn new(
        connector: Arc<dyn GithubApiConnector>,
        token_issuer: Arc<dyn InstallationTokenIssuer>,
        runner: Arc<dyn CommandRunner>,
        delegates: BenchDelegates,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            connector,
            token_issuer,
            runner,
            delegates,
            settings,
        }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Handle one delivery end to end. Never returns an error: every failure
    /// is folded into the outcome and, where possible, reported on the PR.
    pub async fn handle_event(&self, event: TriggerEvent) -> DispatchOutcome {
        let Some(command) = bench_command_from_event(&event) else {
            tracing::debug!(
                repo = %event.repo_slug(),
                issue_number = event.issue_number,
                action = %event.action,
                "ignoring comment without bench trigger"
            );
            return DispatchOutcome::NotApplicable;
        };

        let mut progress = DispatchProgress {
            stage: DispatchStage::Validating,
            sink: None,
        };
        let outcome = match self.run_triggered(&event, &command, &mut progress).await {
            Ok(outcome) => outcome,
            Err(error) => self.report_unexpected(&event, error, progress).await,
        };
        tracing::info!(
            repo = %event.repo_slug(),
            issue_number = event.issue_number,
            action = %command.action,
            outcome = ?outcome,
            "bench request finished"
        );
        outcome
    }

    async fn run_triggered(
        &self,
        event: &TriggerEvent,
        command: &BenchCommand,
        progress: &mut DispatchProgress,
    ) -> Result<DispatchOutcome> {
        let repo = RepoRef::new(&event.owner, &event.repo);
        let Some(installation_id) = event.installation_id else {
            tracing::warn!(
                repo = %repo.as_slug(),
                issue_number = event.issue_number,
                "bench trigger without installation id"
            );
            let sink = self
                .settings
                .output_mode
                .open(self.connector.as_ref(), None)
                .await
                .context("failed to open github session without installation")?;
            progress.sink = Some(sink.clone());
            sink.create_comment(&repo, event.issue_number, MISSING_INSTALLATION_COMMENT)
                .await?;
            return Ok(DispatchOutcome::Aborted {
                stage: DispatchStage::Validating,
                reason: DispatchAbort::MissingInstallation,
            });
        };

        progress.stage = DispatchStage::Preflight;
        let api = self
            .connector
            .connect(Some(installation_id))
            .await
            .with_context(|| format!("failed to authenticate installation {installation_id}"))?;
        let sink = self.settings.output_mode.sink_for(api.clone());
        progress.sink = Some(sink.clone());

        let pull_request = api
            .get_pull_request(&repo, event.issue_number)
            .await
            .with_context(|| {
                format!(
                    "failed to load pull request {}#{}",
                    repo.as_slug(),
                    event.issue_number
                )
            })?;

        let toolchain = self
            .runner
            .run(CommandRequest::new(TOOLCHAIN_QUERY_COMMAND))
            .await;
        if !toolchain.succeeded() {
            let summary = toolchain.error_summary();
            tracing::error!(error = %summary, "toolchain probe failed");
            sink.create_comment(&repo, event.issue_number, TOOLCHAIN_QUERY_FAILED_COMMENT)
                .await?;
            return Ok(DispatchOutcome::Aborted {
                stage: DispatchStage::Preflight,
                reason: DispatchAbort::ToolchainProbe(summary),
            });
        }

        let starting_body = render_starting_comment(
            &pull_request.head_branch,
            &self.settings.base_branch,
            toolchain.stdout.trim(),
        );
        let handle = sink
            .create_comment(&repo, event.issue_number, &starting_body)
            .await?;

        progress.stage = DispatchStage::Running;
        let kind = DelegateKind::from_action(&command.action);
        let config = BenchConfig {
            owner: event.owner.clone(),
            contributor: pull_request.head_author_login.clone(),
            repo: event.repo.clone(),
            branch: pull_request.head_branch.clone(),
            base_branch: self.settings.base_branch.clone(),
            id: command.action.clone(),
            extra: command.extra.clone(),
            push_domain: PushDomainProvider::new(
                self.token_issuer.clone(),
                installation_id,
                self.settings.github_host.clone(),
            ),
        };
        tracing::info!(
            repo = %repo.as_slug(),
            issue_number = event.issue_number,
            delegate = kind.as_str(),
            branch = %config.branch,
            contributor = %config.contributor,
            "starting benchmark"
        );
        let report = self.delegates.select(kind).run(config).await;

        progress.stage = DispatchStage::Reporting;
        match report {
            BenchReport::Success(success) => {
                let body = render_bench_report_comment(&success, &pull_request.head_branch);
                sink.update_comment(&repo, &handle, &body).await?;
                Ok(DispatchOutcome::Completed { kind })
            }
            BenchReport::Failure(failure) => {
                tracing::error!(
                    message = %failure.message,
                    error = failure.error.as_deref().unwrap_or(""),
                    "benchmark delegate reported failure"
                );
                let detail = render_failure_detail(&failure.message, failure.error.as_deref());
                let body = render_failure_comment(&pull_request.head_branch, &detail);
                sink.update_comment(&repo, &handle, &body).await?;
                Ok(DispatchOutcome::Aborted {
                    stage: progress.stage,
                    reason: DispatchAbort::DelegateFailure(detail),
                })
            }
        }
    }

    async fn report_unexpected(
        &self,
        event: &TriggerEvent,
        error: anyhow::Error,
        progress: DispatchProgress,
    ) -> DispatchOutcome {
        let message = error.to_string();
        tracing::error!(
            target: FATAL_LOG_TARGET,
            repo = %event.repo_slug(),
            issue_number = event.issue_number,
            stage = progress.stage.as_str(),
            payload = %event.raw_payload,
            error = ?error,
            "unexpected error while handling bench request"
        );

        if self.settings.output_mode == CommentOutputMode::Github {
            let body = render_exception_comment(&message, &format!("{error:?}"));
            if let Err(comment_error) = self
                .post_exception_comment(event, progress.sink, &body)
                .await
            {
                tracing::error!(
                    target: FATAL_LOG_TARGET,
                    repo = %event.repo_slug(),
                    issue_number = event.issue_number,
                    error = ?comment_error,
                    "failed to post exception comment"
                );
            }
        }

        DispatchOutcome::Aborted {
            stage: progress.stage,
            reason: DispatchAbort::Unexpected(message),
        }
    }

    async fn post_exception_comment(
        &self,
        event: &TriggerEvent,
        sink: Option<Arc<dyn CommentSink>>,
        body: &str,
    ) -> Result<()> {
        let sink = match sink {
            Some(sink) => sink,
            None => {
                self.settings
                    .output_mode
                    .open(self.connector.as_ref(), event.installation_id)
                    .await?
            }
        };
        let repo = RepoRef::new(&event.owner, &event.repo);
        sink.create_comment(&repo, event.issue_number, body).await?;
        Ok(())
    }
}
