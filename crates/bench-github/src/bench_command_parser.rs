use crate::bench_event::TriggerEvent;

pub const BENCH_COMMAND_PREFIX: &str = "/bench";
pub const CREATED_ACTION: &str = "created";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Arguments captured from `/bench <action> <extra>`.
pub struct BenchCommand {
    pub action: String,
    pub extra: String,
}

/// Return true when a comment should trigger a benchmark run.
pub fn is_bench_trigger(has_pull_request: bool, event_action: &str, body: &str) -> bool {
    has_pull_request && event_action == CREATED_ACTION && body.starts_with(BENCH_COMMAND_PREFIX)
}

/// Tokenize a trigger comment. Arguments are whitespace separated; quoting is
/// not supported, so `extra` is the remaining tokens joined by single spaces.
pub fn parse_bench_command(body: &str) -> BenchCommand {
    let tokens = body.split_whitespace().collect::<Vec<_>>();
    let action = tokens.get(1).copied().unwrap_or_default().trim().to_string();
    let extra = tokens
        .get(2..)
        .map(|rest| rest.join(" "))
        .unwrap_or_default()
        .trim()
        .to_string();
    BenchCommand { action, extra }
}

pub fn bench_command_from_event(event: &TriggerEvent) -> Option<BenchCommand> {
    if !is_bench_trigger(event.has_pull_request, &event.action, &event.comment_body) {
        return None;
    }
    Some(parse_bench_command(&event.comment_body))
}
