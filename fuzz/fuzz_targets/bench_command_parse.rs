#![no_main]

use bench_github::bench_command_parser::{is_bench_trigger, parse_bench_command};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let body = String::from_utf8_lossy(data);
    let command = parse_bench_command(&body);
    assert_eq!(command.action, command.action.trim());
    assert_eq!(command.extra, command.extra.trim());
    assert!(!command.action.chars().any(char::is_whitespace));
    assert!(!command.extra.contains("  "));
    if !body.starts_with("/bench") {
        assert!(!is_bench_trigger(true, "created", &body));
    }
});
