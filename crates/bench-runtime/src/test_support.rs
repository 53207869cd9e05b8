//! In-memory port implementations shared by the runtime tests.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use bench_github::bench_report::BenchReport;

use crate::bench_delegate::{BenchConfig, BenchmarkDelegate};
use crate::command_runner::{CommandOutput, CommandRequest, CommandRunner};
use crate::credential_broker::{GithubApiConnector, InstallationTokenIssuer};
use crate::github_api_client::{BenchGithubApi, PullRequestHead, RepoRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum GithubCall {
    GetPullRequest { number: u64 },
    CreateComment { issue_number: u64, body: String },
    UpdateComment { comment_id: u64, body: String },
}

pub(crate) struct FakeGithubApi {
    pub(crate) calls: Mutex<Vec<GithubCall>>,
    pub(crate) head: PullRequestHead,
    pub(crate) fail_pull_request: bool,
    pub(crate) fail_update: bool,
}

impl Default for FakeGithubApi {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            head: PullRequestHead {
                head_branch: "feature".to_string(),
                head_author_login: "alice".to_string(),
            },
            fail_pull_request: false,
            fail_update: false,
        }
    }
}

impl FakeGithubApi {
    pub(crate) fn calls(&self) -> Vec<GithubCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: GithubCall) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

#[async_trait]
impl BenchGithubApi for FakeGithubApi {
    async fn get_pull_request(&self, _repo: &RepoRef, number: u64) -> Result<PullRequestHead> {
        self.record(GithubCall::GetPullRequest { number });
        if self.fail_pull_request {
            bail!("github api get pull request failed with status 500: boom");
        }
        Ok(self.head.clone())
    }

    async fn create_issue_comment(
        &self,
        _repo: &RepoRef,
        issue_number: u64,
        body: &str,
    ) -> Result<u64> {
        self.record(GithubCall::CreateComment {
            issue_number,
            body: body.to_string(),
        });
        Ok(900 + issue_number)
    }

    async fn update_issue_comment(
        &self,
        _repo: &RepoRef,
        comment_id: u64,
        body: &str,
    ) -> Result<()> {
        self.record(GithubCall::UpdateComment {
            comment_id,
            body: body.to_string(),
        });
        if self.fail_update {
            bail!("github api update issue comment failed with status 422: invalid");
        }
        Ok(())
    }
}

pub(crate) struct FakeConnector {
    api: Arc<FakeGithubApi>,
    connections: Mutex<Vec<Option<u64>>>,
}

impl FakeConnector {
    pub(crate) fn new(api: Arc<FakeGithubApi>) -> Self {
        Self {
            api,
            connections: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn connections(&self) -> Vec<Option<u64>> {
        self.connections.lock().expect("connections lock").clone()
    }
}

#[async_trait]
impl GithubApiConnector for FakeConnector {
    async fn connect(&self, installation_id: Option<u64>) -> Result<Arc<dyn BenchGithubApi>> {
        self.connections
            .lock()
            .expect("connections lock")
            .push(installation_id);
        Ok(self.api.clone())
    }
}

#[derive(Default)]
pub(crate) struct FakeTokenIssuer {
    issued: Mutex<Vec<u64>>,
}

impl FakeTokenIssuer {
    pub(crate) fn issued(&self) -> Vec<u64> {
        self.issued.lock().expect("issued lock").clone()
    }
}

#[async_trait]
impl InstallationTokenIssuer for FakeTokenIssuer {
    async fn issue_installation_token(&self, installation_id: u64) -> Result<String> {
        self.issued
            .lock()
            .expect("issued lock")
            .push(installation_id);
        Ok(format!("ghs_test_{installation_id}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordedCommand {
    pub(crate) command_line: String,
    pub(crate) cwd: Option<PathBuf>,
}

/// Runner answering commands by prefix; unmatched commands succeed with
/// empty output.
#[derive(Default)]
pub(crate) struct ScriptedRunner {
    script: Mutex<Vec<(String, VecDeque<CommandOutput>)>>,
    recorded: Mutex<Vec<RecordedCommand>>,
}

impl ScriptedRunner {
    pub(crate) fn respond(self, prefix: &str, output: CommandOutput) -> Self {
        {
            let mut script = self.script.lock().expect("script lock");
            match script.iter_mut().find(|(existing, _)| existing == prefix) {
                Some((_, outputs)) => outputs.push_back(output),
                None => script.push((prefix.to_string(), VecDeque::from([output]))),
            }
        }
        self
    }

    pub(crate) fn recorded(&self) -> Vec<RecordedCommand> {
        self.recorded.lock().expect("recorded lock").clone()
    }
}

pub(crate) fn stdout(text: &str) -> CommandOutput {
    CommandOutput {
        stdout: text.to_string(),
        exit_code: Some(0),
        ..CommandOutput::default()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, request: CommandRequest<'_>) -> CommandOutput {
        self.recorded
            .lock()
            .expect("recorded lock")
            .push(RecordedCommand {
                command_line: request.command_line.to_string(),
                cwd: request.cwd.map(PathBuf::from),
            });
        let mut script = self.script.lock().expect("script lock");
        for (prefix, outputs) in script.iter_mut() {
            if request.command_line.starts_with(prefix.as_str()) {
                if outputs.len() > 1 {
                    return outputs.pop_front().unwrap_or_default();
                }
                return outputs.front().cloned().unwrap_or_default();
            }
        }
        stdout("")
    }
}

pub(crate) struct RecordingDelegate {
    report: BenchReport,
    configs: Mutex<Vec<BenchConfig>>,
}

impl RecordingDelegate {
    pub(crate) fn new(report: BenchReport) -> Self {
        Self {
            report,
            configs: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn configs(&self) -> Vec<BenchConfig> {
        self.configs.lock().expect("configs lock").clone()
    }
}

#[async_trait]
impl BenchmarkDelegate for RecordingDelegate {
    async fn run(&self, config: BenchConfig) -> BenchReport {
        self.configs.lock().expect("configs lock").push(config);
        self.report.clone()
    }
}
