//! Retry, truncation and redaction helpers shared by the GitHub client and
//! the command runner.

use std::time::Duration;

const MAX_BACKOFF_MS: u64 = 30_000;

/// How far a GitHub request may be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GithubRetryPolicy {
    /// Reads, edits and token exchanges: repeating them cannot leave a
    /// second copy behind, so timeouts, transport failures, 429 and 5xx are
    /// all retried.
    Idempotent,
    /// Requests that create something. Retried only when GitHub provably did
    /// not act on the first attempt: a refused connection or a 429.
    SingleDelivery,
}

impl GithubRetryPolicy {
    pub fn retries_status(self, status: u16) -> bool {
        match self {
            Self::Idempotent => status == 429 || status >= 500,
            Self::SingleDelivery => status == 429,
        }
    }

    pub fn retries_transport_error(self, error: &reqwest::Error) -> bool {
        match self {
            Self::Idempotent => error.is_timeout() || error.is_connect() || error.is_request(),
            Self::SingleDelivery => error.is_connect(),
        }
    }
}

/// Seconds-valued `Retry-After`; HTTP-date values are ignored.
pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Delay before retrying after `failed_attempts` failures. A server-provided
/// `Retry-After` wins but never undercuts the base delay.
pub fn backoff_delay(
    base_delay_ms: u64,
    failed_attempts: usize,
    retry_after: Option<Duration>,
) -> Duration {
    let floor = Duration::from_millis(base_delay_ms);
    match retry_after {
        Some(delay) => delay.max(floor),
        None => {
            let doublings = failed_attempts.saturating_sub(1).min(10) as u32;
            Duration::from_millis(
                base_delay_ms
                    .saturating_mul(1_u64 << doublings)
                    .min(MAX_BACKOFF_MS),
            )
        }
    }
}

/// Cap `text` at `max_chars` characters, appending `...` when cut.
pub fn truncate_for_error(text: &str, max_chars: usize) -> String {
    let (kept, rest) = split_at_char_index(text, max_chars);
    if rest.is_empty() {
        kept.to_string()
    } else {
        format!("{kept}...")
    }
}

/// Split `text` after `index` characters, keeping multi-byte characters whole.
pub fn split_at_char_index(text: &str, index: usize) -> (&str, &str) {
    match text.char_indices().nth(index) {
        Some((byte_index, _)) => text.split_at(byte_index),
        None => (text, ""),
    }
}

/// Replace every occurrence of each non-blank secret with `***`.
pub fn redact_secrets<S: AsRef<str>>(text: &str, secrets: &[S]) -> String {
    let mut redacted = text.to_string();
    for secret in secrets {
        let secret = secret.as_ref().trim();
        if secret.is_empty() {
            continue;
        }
        redacted = redacted.replace(secret, "***");
    }
    redacted
}
