use std::path::PathBuf;

use clap::{ArgAction, Parser};

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

/// `DEBUG` is commonly set to a logger pattern such as `probot:*`, so any
/// non-empty value enables debug mode except an explicit false word.
fn parse_debug_flag(value: &str) -> Result<bool, String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(false);
    }
    Ok(!matches!(
        value.to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    ))
}

#[derive(Debug, Parser)]
#[command(
    name = "bench-bot",
    about = "GitHub App that runs benchmarks requested with /bench pull request comments",
    version
)]
pub struct Cli {
    #[arg(
        long = "app-id",
        env = "APP_ID",
        value_parser = parse_positive_u64,
        help = "GitHub App id used as the JWT issuer"
    )]
    pub app_id: u64,

    #[arg(long = "client-id", env = "CLIENT_ID", help = "GitHub App OAuth client id")]
    pub client_id: String,

    #[arg(
        long = "client-secret",
        env = "CLIENT_SECRET",
        hide_env_values = true,
        help = "GitHub App OAuth client secret"
    )]
    pub client_secret: String,

    #[arg(
        long = "private-key-path",
        env = "PRIVATE_KEY_PATH",
        help = "Path to the GitHub App RSA private key (PEM)"
    )]
    pub private_key_path: PathBuf,

    #[arg(
        long = "base-branch",
        env = "BASE_BRANCH",
        default_value = "master",
        help = "Branch contributor branches are merged into before benchmarking"
    )]
    pub base_branch: String,

    #[arg(
        long,
        env = "DEBUG",
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_parser = parse_debug_flag,
        help = "Write comment bodies to the log instead of posting them to GitHub"
    )]
    pub debug: bool,

    #[arg(
        long = "webhook-secret",
        env = "WEBHOOK_SECRET",
        hide_env_values = true,
        help = "Shared secret used to verify x-hub-signature-256 on deliveries"
    )]
    pub webhook_secret: Option<String>,

    #[arg(
        long,
        env = "BENCH_BOT_BIND",
        default_value = "0.0.0.0:3000",
        help = "Socket address for the webhook server"
    )]
    pub bind: String,

    #[arg(
        long = "github-api-base",
        env = "GITHUB_API_BASE",
        default_value = "https://api.github.com",
        help = "GitHub REST API base URL"
    )]
    pub github_api_base: String,

    #[arg(
        long = "github-host",
        env = "GITHUB_HOST",
        default_value = "github.com",
        help = "Git host used for authenticated clone and fetch URLs"
    )]
    pub github_host: String,

    #[arg(
        long = "work-dir",
        env = "BENCH_BOT_WORK_DIR",
        default_value = "./bench-work",
        help = "Directory holding temporary benchmark checkouts"
    )]
    pub work_dir: PathBuf,

    #[arg(
        long = "replay-payload",
        env = "BENCH_BOT_REPLAY_PAYLOAD",
        default_value = "payload.json",
        help = "Saved delivery replayed once at startup when the file exists"
    )]
    pub replay_payload: PathBuf,

    #[arg(
        long = "request-timeout-ms",
        env = "BENCH_BOT_REQUEST_TIMEOUT_MS",
        default_value_t = 30_000,
        value_parser = parse_positive_u64,
        help = "Timeout for GitHub API requests in milliseconds"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long = "retry-max-attempts",
        env = "BENCH_BOT_RETRY_MAX_ATTEMPTS",
        default_value_t = 3,
        value_parser = parse_positive_usize,
        help = "Maximum attempts for retryable GitHub API failures"
    )]
    pub retry_max_attempts: usize,

    #[arg(
        long = "retry-base-delay-ms",
        env = "BENCH_BOT_RETRY_BASE_DELAY_MS",
        default_value_t = 500,
        help = "Base backoff delay between GitHub API retries in milliseconds"
    )]
    pub retry_base_delay_ms: u64,
}
