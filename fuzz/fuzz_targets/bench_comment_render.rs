#![no_main]

use bench_github::bench_comment::{
    render_bench_report_comment_with_limit, render_exception_comment, GITHUB_COMMENT_MAX_CHARS,
    TRUNCATION_MARKER,
};
use bench_github::bench_report::BenchSuccess;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let mut parts = raw.splitn(4, '\u{1f}');
    let title = parts.next().unwrap_or_default().to_string();
    let branch = parts.next().unwrap_or_default().to_string();
    let extra_info = parts.next().unwrap_or_default().to_string();
    let output = parts.next().unwrap_or_default().repeat(8);
    let limit = 64 + data.len() % 512;

    let report = BenchSuccess {
        title,
        output,
        extra_info,
        bench_command: "`cargo bench`".to_string(),
    };
    let body = render_bench_report_comment_with_limit(&report, &branch, limit);
    let chars = body.chars().count();
    assert!(chars <= limit);
    if body.contains(TRUNCATION_MARKER) && !raw.contains(TRUNCATION_MARKER) {
        assert_eq!(chars, limit);
    }

    let exception = render_exception_comment(&raw, &raw.repeat(4));
    assert!(exception.chars().count() <= GITHUB_COMMENT_MAX_CHARS);
});
