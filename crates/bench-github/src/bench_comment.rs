use crate::bench_report::BenchSuccess;
use crate::github_transport_helpers::split_at_char_index;

/// GitHub rejects issue comments longer than this many characters.
pub const GITHUB_COMMENT_MAX_CHARS: usize = 65_536;
pub const TRUNCATION_MARKER: &str = "<truncated>...";

pub const MISSING_INSTALLATION_COMMENT: &str =
    "Error: Installation id was missing from webhook payload";
pub const TOOLCHAIN_QUERY_FAILED_COMMENT: &str =
    "ERROR: Failed to query the currently active Rust toolchain";

const RESULTS_SUFFIX: &str = "```\n\n</details>";

pub fn render_starting_comment(branch: &str, base_branch: &str, toolchain: &str) -> String {
    format!(
        "Starting benchmark for branch: {branch} (vs {base_branch})\n\nToolchain: \n{toolchain}\n\n Comment will be updated."
    )
}

fn render_results_prefix(report: &BenchSuccess, branch: &str) -> String {
    format!(
        "Benchmark **{}** for branch \"{}\" with command {}\n\n<details>\n<summary>Results</summary>\n\n```",
        report.title, branch, report.bench_command
    )
}

fn assemble_report_body(prefix: &str, output: &str, extra_info: &str) -> String {
    format!("{prefix}\n{output}\n{RESULTS_SUFFIX}\n\n{extra_info}")
        .trim()
        .to_string()
}

/// Render the final comment for a successful run, capped at
/// [`GITHUB_COMMENT_MAX_CHARS`].
pub fn render_bench_report_comment(report: &BenchSuccess, branch: &str) -> String {
    render_bench_report_comment_with_limit(report, branch, GITHUB_COMMENT_MAX_CHARS)
}

/// Render a success comment bounded by `max_chars` characters.
///
/// The template is measured exactly: the output only ever sits between the
/// code fences, so trimming the assembled body never touches it. When the
/// full body would reach the limit the output is cut and
/// [`TRUNCATION_MARKER`] appended so the body is exactly `max_chars` long.
pub fn render_bench_report_comment_with_limit(
    report: &BenchSuccess,
    branch: &str,
    max_chars: usize,
) -> String {
    let prefix = render_results_prefix(report, branch);
    let extra_info = report.extra_info.trim();
    let template_chars = assemble_report_body(&prefix, "", extra_info)
        .chars()
        .count();
    let output_chars = report.output.chars().count();
    if template_chars + output_chars < max_chars {
        return assemble_report_body(&prefix, &report.output, extra_info);
    }

    let marker_chars = TRUNCATION_MARKER.chars().count();
    if template_chars + marker_chars > max_chars {
        // Header and extra info alone overflow; cut the whole body instead.
        let template = assemble_report_body(&prefix, "", extra_info);
        let keep = max_chars.saturating_sub(marker_chars);
        let (kept, _) = split_at_char_index(&template, keep);
        let (marker, _) = split_at_char_index(TRUNCATION_MARKER, max_chars);
        return format!("{kept}{marker}");
    }

    let keep = max_chars - template_chars - marker_chars;
    let (kept, _) = split_at_char_index(&report.output, keep);
    assemble_report_body(&prefix, &format!("{kept}{TRUNCATION_MARKER}"), extra_info)
}

/// Combine a failure message with its optional cause as `message: cause`.
pub fn render_failure_detail(message: &str, error: Option<&str>) -> String {
    match error {
        Some(error) => format!("{message}: {error}"),
        None => message.to_string(),
    }
}

pub fn render_failure_comment(branch: &str, detail: &str) -> String {
    let body = format!(
        "Error running benchmark: **{branch}**\n\n<details><summary>stdout</summary>{detail}</details>"
    );
    if body.chars().count() <= GITHUB_COMMENT_MAX_CHARS {
        return body;
    }
    let (kept, _) = split_at_char_index(
        &body,
        GITHUB_COMMENT_MAX_CHARS - TRUNCATION_MARKER.chars().count(),
    );
    format!("{kept}{TRUNCATION_MARKER}")
}

pub fn render_exception_comment(message: &str, trace: &str) -> String {
    let body = format!("Exception caught: `{message}`\n{trace}");
    if body.chars().count() <= GITHUB_COMMENT_MAX_CHARS {
        return body;
    }
    let (kept, _) = split_at_char_index(
        &body,
        GITHUB_COMMENT_MAX_CHARS - TRUNCATION_MARKER.chars().count(),
    );
    format!("{kept}{TRUNCATION_MARKER}")
}

#[cfg(test)]
mod tests {
    use super::{
        render_bench_report_comment, render_bench_report_comment_with_limit,
        render_exception_comment, render_failure_comment, render_failure_detail,
        render_starting_comment, GITHUB_COMMENT_MAX_CHARS, TRUNCATION_MARKER,
    };
    use crate::bench_report::BenchSuccess;

    fn report_with_output(output: String) -> BenchSuccess {
        BenchSuccess {
            title: "Runtime Benchmarks".to_string(),
            output,
            extra_info: "base `master` at `abc123`".to_string(),
            bench_command: "cargo bench".to_string(),
        }
    }

    fn template_chars(branch: &str) -> usize {
        render_bench_report_comment(&report_with_output(String::new()), branch)
            .chars()
            .count()
    }

    #[test]
    fn unit_render_starting_comment_includes_branch_base_and_toolchain() {
        let body = render_starting_comment("feature", "master", "stable-x86_64");
        assert_eq!(
            body,
            "Starting benchmark for branch: feature (vs master)\n\nToolchain: \nstable-x86_64\n\n Comment will be updated."
        );
    }

    #[test]
    fn unit_render_bench_report_comment_uses_fixed_template() {
        let body = render_bench_report_comment(&report_with_output("result".to_string()), "feature");
        assert_eq!(
            body,
            "Benchmark **Runtime Benchmarks** for branch \"feature\" with command cargo bench\n\n<details>\n<summary>Results</summary>\n\n```\nresult\n```\n\n</details>\n\nbase `master` at `abc123`"
        );
    }

    #[test]
    fn functional_render_bench_report_comment_keeps_output_below_limit() {
        let output = "x".repeat(GITHUB_COMMENT_MAX_CHARS - template_chars("feature") - 1);
        let body = render_bench_report_comment(&report_with_output(output.clone()), "feature");
        assert_eq!(body.chars().count(), GITHUB_COMMENT_MAX_CHARS - 1);
        assert!(body.contains(&output));
        assert!(!body.contains(TRUNCATION_MARKER));
    }

    #[test]
    fn functional_render_bench_report_comment_truncates_at_exact_limit() {
        let output = "x".repeat(GITHUB_COMMENT_MAX_CHARS - template_chars("feature"));
        let body = render_bench_report_comment(&report_with_output(output), "feature");
        assert_eq!(body.chars().count(), GITHUB_COMMENT_MAX_CHARS);
        assert!(body.contains(&format!("{TRUNCATION_MARKER}\n```")));
    }

    #[test]
    fn integration_render_bench_report_comment_truncation_is_deterministic() {
        let report = report_with_output("line of output\n".repeat(10_000));
        let first = render_bench_report_comment(&report, "feature");
        let second = render_bench_report_comment(&report, "feature");
        assert_eq!(first, second);
        assert_eq!(first.chars().count(), GITHUB_COMMENT_MAX_CHARS);
        assert!(first.contains(&format!("{TRUNCATION_MARKER}\n```\n\n</details>")));
        assert!(first.ends_with("base `master` at `abc123`"));
    }

    #[test]
    fn integration_render_bench_report_comment_bounds_output_one_thousand_over_limit() {
        let over = GITHUB_COMMENT_MAX_CHARS + 1_000 - template_chars("feature");
        let body = render_bench_report_comment(&report_with_output("y".repeat(over)), "feature");
        assert!(body.chars().count() <= GITHUB_COMMENT_MAX_CHARS);
        let (_, after_fence) = body.split_once("```\n").expect("opening fence");
        let (output_block, _) = after_fence.split_once("\n```").expect("closing fence");
        assert!(output_block.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn regression_render_bench_report_comment_counts_multibyte_characters() {
        let report = report_with_output("ß".repeat(GITHUB_COMMENT_MAX_CHARS));
        let body = render_bench_report_comment(&report, "feature");
        assert_eq!(body.chars().count(), GITHUB_COMMENT_MAX_CHARS);
        assert!(body.contains(TRUNCATION_MARKER));
    }

    #[test]
    fn regression_render_bench_report_comment_bounds_oversized_extra_info() {
        let mut report = report_with_output("out".to_string());
        report.extra_info = "e".repeat(200);
        let body = render_bench_report_comment_with_limit(&report, "feature", 120);
        assert_eq!(body.chars().count(), 120);
        assert!(body.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn regression_render_bench_report_comment_trims_blank_extra_info() {
        let mut report = report_with_output("out".to_string());
        report.extra_info = "  \n".to_string();
        let body = render_bench_report_comment(&report, "feature");
        assert!(body.ends_with("</details>"));
    }

    #[test]
    fn unit_render_failure_detail_omits_colon_without_cause() {
        assert_eq!(render_failure_detail("boom", None), "boom");
        assert_eq!(
            render_failure_detail("boom", Some("exit status 101")),
            "boom: exit status 101"
        );
    }

    #[test]
    fn functional_render_failure_comment_wraps_detail_in_details_block() {
        assert_eq!(
            render_failure_comment("feature", "boom"),
            "Error running benchmark: **feature**\n\n<details><summary>stdout</summary>boom</details>"
        );
    }

    #[test]
    fn regression_render_failure_and_exception_comments_stay_within_limit() {
        let huge = "z".repeat(GITHUB_COMMENT_MAX_CHARS * 2);
        let failure = render_failure_comment("feature", &huge);
        assert_eq!(failure.chars().count(), GITHUB_COMMENT_MAX_CHARS);
        let exception = render_exception_comment("boom", &huge);
        assert_eq!(exception.chars().count(), GITHUB_COMMENT_MAX_CHARS);
        assert!(render_exception_comment("boom", "trace").starts_with("Exception caught: `boom`\n"));
    }
}
