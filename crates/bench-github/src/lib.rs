//! Shared helpers for the bench bot GitHub integration.
//! This crate holds webhook payload models, `/bench` command parsing, report
//! types, and comment rendering consumed by the dispatch runtime.

pub mod bench_command_parser;
pub mod bench_comment;
pub mod bench_event;
pub mod bench_report;
pub mod github_transport_helpers;
