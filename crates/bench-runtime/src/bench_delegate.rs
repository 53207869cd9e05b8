//! Benchmark delegates: routing by action plus the default git checkout
//! based implementations.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bench_github::bench_report::{BenchReport, BenchSuccess};

use crate::command_runner::{CommandOutput, CommandRequest, CommandRunner};
use crate::credential_broker::{PushDomain, PushDomainProvider};

pub const RUNTIME_ACTION: &str = "runtime";
pub const XCM_ACTION: &str = "xcm";

const MERGE_IDENTITY: &str =
    "-c user.name=bench-bot -c user.email=bench-bot@users.noreply.github.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeBenchTarget {
    Runtime,
    Xcm,
}

impl RuntimeBenchTarget {
    pub fn title(self) -> &'static str {
        match self {
            Self::Runtime => "Runtime Benchmarks",
            Self::Xcm => "XCM Benchmarks",
        }
    }

    fn pallet_argument(self, pallet: &str) -> String {
        match self {
            Self::Runtime => pallet.to_string(),
            Self::Xcm => format!("pallet_xcm_benchmarks::{pallet}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Which delegate handles a `/bench <action>` request.
pub enum DelegateKind {
    Runtime(RuntimeBenchTarget),
    Branch,
}

impl DelegateKind {
    pub fn from_action(action: &str) -> Self {
        match action {
            RUNTIME_ACTION => Self::Runtime(RuntimeBenchTarget::Runtime),
            XCM_ACTION => Self::Runtime(RuntimeBenchTarget::Xcm),
            _ => Self::Branch,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Runtime(RuntimeBenchTarget::Runtime) => "runtime",
            Self::Runtime(RuntimeBenchTarget::Xcm) => "xcm",
            Self::Branch => "branch",
        }
    }
}

#[derive(Debug, Clone)]
/// Everything a delegate needs for one run. `id` carries the raw action.
pub struct BenchConfig {
    pub owner: String,
    pub contributor: String,
    pub repo: String,
    pub branch: String,
    pub base_branch: String,
    pub id: String,
    pub extra: String,
    pub push_domain: PushDomainProvider,
}

/// Performs benchmark work. Expected failures are returned as
/// [`BenchReport::Failure`], never as panics.
#[async_trait]
pub trait BenchmarkDelegate: Send + Sync {
    async fn run(&self, config: BenchConfig) -> BenchReport;
}

#[derive(Clone)]
pub struct BenchDelegates {
    pub runtime: Arc<dyn BenchmarkDelegate>,
    pub branch: Arc<dyn BenchmarkDelegate>,
}

impl BenchDelegates {
    pub fn select(&self, kind: DelegateKind) -> &Arc<dyn BenchmarkDelegate> {
        match kind {
            DelegateKind::Runtime(_) => &self.runtime,
            DelegateKind::Branch => &self.branch,
        }
    }
}

pub fn branch_bench_command_line(extra: &str) -> String {
    let extra = extra.trim();
    if extra.is_empty() {
        "cargo bench".to_string()
    } else {
        format!("cargo bench {extra}")
    }
}

/// Build the pallet benchmark command; `None` when `extra` names no pallet.
pub fn runtime_bench_command_line(target: RuntimeBenchTarget, extra: &str) -> Option<String> {
    let mut tokens = extra.split_whitespace();
    let pallet = tokens.next()?;
    let rest = tokens.collect::<Vec<_>>().join(" ");
    let mut command_line = format!(
        "cargo run --quiet --release --features=runtime-benchmarks -- benchmark pallet --chain=dev --steps=50 --repeat=20 --pallet={} --extrinsic=* --wasm-execution=compiled --heap-pages=4096",
        shell_words::quote(&target.pallet_argument(pallet))
    );
    if !rest.is_empty() {
        command_line.push(' ');
        command_line.push_str(&rest);
    }
    Some(command_line)
}

fn runtime_usage(action: &str) -> String {
    format!("Usage: /bench {action} <pallet> [extra benchmark args]")
}

struct BenchInvocation {
    title: &'static str,
    command_line: String,
}

struct MergedCheckout {
    dir: PathBuf,
    base_commit: String,
    head_commit: String,
}

/// Clones the base repository, merges the contributor branch, and runs one
/// benchmark command inside a throwaway directory.
struct GitBenchWorkspace {
    runner: Arc<dyn CommandRunner>,
    work_root: PathBuf,
    sequence: AtomicU64,
}

impl GitBenchWorkspace {
    fn new(runner: Arc<dyn CommandRunner>, work_root: PathBuf) -> Self {
        Self {
            runner,
            work_root,
            sequence: AtomicU64::new(0),
        }
    }

    fn next_checkout_dir(&self, config: &BenchConfig) -> PathBuf {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%3f");
        self.work_root.join(format!(
            "{}-{}-{}-{stamp}-{sequence}",
            sanitize_path_component(&config.repo),
            sanitize_path_component(&config.contributor),
            sanitize_path_component(&config.branch),
        ))
    }

    async fn run(&self, config: &BenchConfig, invocation: BenchInvocation) -> BenchReport {
        let push = match config.push_domain.resolve().await {
            Ok(push) => push,
            Err(error) => {
                return BenchReport::failure_with_error(
                    "Failed to obtain repository credentials",
                    format!("{error:#}"),
                );
            }
        };
        if let Err(error) = tokio::fs::create_dir_all(&self.work_root).await {
            return BenchReport::failure_with_error(
                format!(
                    "Failed to create work directory {}",
                    self.work_root.display()
                ),
                error,
            );
        }

        let dir = self.next_checkout_dir(config);
        let report = match self.checkout_and_merge(config, &push, &dir).await {
            Ok(checkout) => self.run_benchmark(config, &push, &checkout, invocation).await,
            Err(report) => report,
        };
        remove_checkout_dir(&dir).await;
        report
    }

    async fn step(
        &self,
        request: CommandRequest<'_>,
        failure_message: impl FnOnce() -> String,
    ) -> Result<CommandOutput, BenchReport> {
        let output = self.runner.run(request).await;
        if output.succeeded() {
            Ok(output)
        } else {
            Err(BenchReport::failure_with_error(
                failure_message(),
                output.error_summary(),
            ))
        }
    }

    async fn checkout_and_merge(
        &self,
        config: &BenchConfig,
        push: &PushDomain,
        dir: &Path,
    ) -> Result<MergedCheckout, BenchReport> {
        let secrets = [push.token.as_str()];
        let base_url = format!("{}/{}/{}.git", push.url, config.owner, config.repo);
        let contributor_url = format!("{}/{}/{}.git", push.url, config.contributor, config.repo);

        let clone = format!(
            "git clone --quiet {} {}",
            shell_words::quote(&base_url),
            shell_words::quote(&dir.to_string_lossy())
        );
        self.step(CommandRequest::new(&clone).redacting(&secrets), || {
            format!("Failed to clone {}/{}", config.owner, config.repo)
        })
        .await?;

        // The benchmark executes contributor code in this checkout; the saved
        // origin must not carry the push token.
        let scrub_origin = format!(
            "git remote set-url origin {}",
            shell_words::quote(&push.public_repo_url(&config.owner, &config.repo))
        );
        self.step(CommandRequest::new(&scrub_origin).in_dir(dir), || {
            "Failed to reset the checkout's origin URL".to_string()
        })
        .await?;

        let checkout = format!(
            "git checkout --quiet {}",
            shell_words::quote(&config.base_branch)
        );
        self.step(CommandRequest::new(&checkout).in_dir(dir), || {
            format!("Failed to check out base branch {}", config.base_branch)
        })
        .await?;
        let base_commit = self.head_commit(dir).await?;

        let fetch = format!(
            "git fetch --quiet {} {}",
            shell_words::quote(&contributor_url),
            shell_words::quote(&config.branch)
        );
        self.step(
            CommandRequest::new(&fetch).in_dir(dir).redacting(&secrets),
            || format!("Failed to fetch {}:{}", config.contributor, config.branch),
        )
        .await?;

        let merge = format!("git {MERGE_IDENTITY} merge --no-edit FETCH_HEAD");
        self.step(CommandRequest::new(&merge).in_dir(dir), || {
            format!(
                "Failed to merge {}:{} into {}",
                config.contributor, config.branch, config.base_branch
            )
        })
        .await?;
        let head_commit = self.head_commit(dir).await?;

        Ok(MergedCheckout {
            dir: dir.to_path_buf(),
            base_commit,
            head_commit,
        })
    }

    async fn head_commit(&self, dir: &Path) -> Result<String, BenchReport> {
        let output = self
            .step(CommandRequest::new("git rev-parse HEAD").in_dir(dir), || {
                "Failed to resolve checkout commit".to_string()
            })
            .await?;
        Ok(output.stdout.trim().to_string())
    }

    async fn run_benchmark(
        &self,
        config: &BenchConfig,
        push: &PushDomain,
        checkout: &MergedCheckout,
        invocation: BenchInvocation,
    ) -> BenchReport {
        let secrets = [push.token.as_str()];
        tracing::info!(
            repo = %format!("{}/{}", config.owner, config.repo),
            branch = %config.branch,
            command = %invocation.command_line,
            "running benchmark"
        );
        let output = self
            .runner
            .run(
                CommandRequest::new(&invocation.command_line)
                    .in_dir(&checkout.dir)
                    .redacting(&secrets),
            )
            .await;
        if !output.succeeded() {
            tracing::warn!(
                command = %invocation.command_line,
                exit_code = ?output.exit_code,
                stderr = %output.stderr,
                "benchmark command failed"
            );
            return BenchReport::failure_with_error(
                format!("Benchmark command `{}` failed", invocation.command_line),
                output.error_summary(),
            );
        }
        BenchReport::Success(BenchSuccess {
            title: invocation.title.to_string(),
            output: output.stdout.trim_end().to_string(),
            extra_info: format!(
                "Base: `{}` at `{}`\nMerged: `{}:{}` at `{}`",
                config.base_branch,
                checkout.base_commit,
                config.contributor,
                config.branch,
                checkout.head_commit
            ),
            bench_command: format!("`{}`", invocation.command_line),
        })
    }
}

fn sanitize_path_component(raw: &str) -> String {
    let sanitized = raw
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .take(48)
        .collect::<String>();
    if sanitized.is_empty() {
        "unnamed".to_string()
    } else {
        sanitized
    }
}

async fn remove_checkout_dir(dir: &Path) {
    if !tokio::fs::try_exists(dir).await.unwrap_or(false) {
        return;
    }
    if let Err(error) = tokio::fs::remove_dir_all(dir).await {
        tracing::warn!(dir = %dir.display(), %error, "failed to remove benchmark checkout");
    }
}

/// Runs `cargo bench` against the merged branch.
pub struct BranchBenchDelegate {
    workspace: GitBenchWorkspace,
}

impl BranchBenchDelegate {
    pub fn new(runner: Arc<dyn CommandRunner>, work_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace: GitBenchWorkspace::new(runner, work_root.into()),
        }
    }
}

#[async_trait]
impl BenchmarkDelegate for BranchBenchDelegate {
    async fn run(&self, config: BenchConfig) -> BenchReport {
        let invocation = BenchInvocation {
            title: "Benchmarks",
            command_line: branch_bench_command_line(&config.extra),
        };
        self.workspace.run(&config, invocation).await
    }
}

/// Runs pallet benchmarks for the `runtime` and `xcm` actions.
pub struct RuntimeBenchDelegate {
    workspace: GitBenchWorkspace,
}

impl RuntimeBenchDelegate {
    pub fn new(runner: Arc<dyn CommandRunner>, work_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace: GitBenchWorkspace::new(runner, work_root.into()),
        }
    }
}

#[async_trait]
impl BenchmarkDelegate for RuntimeBenchDelegate {
    async fn run(&self, config: BenchConfig) -> BenchReport {
        let target = match DelegateKind::from_action(&config.id) {
            DelegateKind::Runtime(target) => target,
            DelegateKind::Branch => RuntimeBenchTarget::Runtime,
        };
        let Some(command_line) = runtime_bench_command_line(target, &config.extra) else {
            return BenchReport::failure(runtime_usage(&config.id));
        };
        let invocation = BenchInvocation {
            title: target.title(),
            command_line,
        };
        self.workspace.run(&config, invocation).await
    }
}
