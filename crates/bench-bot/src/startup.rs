use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bench_cli::Cli;
use bench_runtime::bench_delegate::{BenchDelegates, BranchBenchDelegate, RuntimeBenchDelegate};
use bench_runtime::command_runner::{CommandRunner, ProcessCommandRunner};
use bench_runtime::comment_sink::CommentOutputMode;
use bench_runtime::credential_broker::{GithubAppAuth, GithubAppCredentials};
use bench_runtime::dispatch::{BenchDispatcher, DispatchSettings};
use bench_runtime::github_api_client::GithubClientSettings;
use bench_runtime::webhook_server::{replay_saved_delivery, run_webhook_server};

pub(crate) fn load_private_key(path: &Path) -> Result<String> {
    let pem = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read github app private key {}", path.display()))?;
    if pem.trim().is_empty() {
        bail!("github app private key {} is empty", path.display());
    }
    Ok(pem)
}

pub(crate) fn client_settings(cli: &Cli) -> GithubClientSettings {
    GithubClientSettings {
        request_timeout_ms: cli.request_timeout_ms,
        retry_max_attempts: cli.retry_max_attempts,
        retry_base_delay_ms: cli.retry_base_delay_ms,
    }
}

pub(crate) fn build_dispatcher(
    cli: &Cli,
    auth: Arc<GithubAppAuth>,
    runner: Arc<dyn CommandRunner>,
) -> BenchDispatcher {
    let delegates = BenchDelegates {
        runtime: Arc::new(RuntimeBenchDelegate::new(runner.clone(), &cli.work_dir)),
        branch: Arc::new(BranchBenchDelegate::new(runner.clone(), &cli.work_dir)),
    };
    BenchDispatcher::new(
        auth.clone(),
        auth,
        runner,
        delegates,
        DispatchSettings {
            base_branch: cli.base_branch.clone(),
            github_host: cli.github_host.clone(),
            output_mode: CommentOutputMode::from_debug_flag(cli.debug),
        },
    )
}

pub(crate) async fn run_bench_bot(cli: Cli) -> Result<()> {
    let credentials = GithubAppCredentials {
        app_id: cli.app_id,
        client_id: cli.client_id.clone(),
        client_secret: cli.client_secret.clone(),
        private_key_pem: load_private_key(&cli.private_key_path)?,
    };
    let auth = Arc::new(GithubAppAuth::new(
        &credentials,
        &cli.github_api_base,
        client_settings(&cli),
    )?);
    let dispatcher = Arc::new(build_dispatcher(&cli, auth, Arc::new(ProcessCommandRunner)));
    tracing::info!(
        app_id = credentials.app_id,
        base_branch = %cli.base_branch,
        output_mode = dispatcher.settings().output_mode.as_str(),
        work_dir = %cli.work_dir.display(),
        "bench-bot starting"
    );

    if let Some(outcome) = replay_saved_delivery(&cli.replay_payload, &dispatcher).await? {
        tracing::info!(?outcome, "saved delivery replay finished");
    }

    run_webhook_server(&cli.bind, cli.webhook_secret.clone(), dispatcher).await
}
