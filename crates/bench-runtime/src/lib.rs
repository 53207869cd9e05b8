//! Runtime for the `/bench` pull request bot: GitHub App authentication, the
//! per-delivery dispatch controller, benchmark delegates, and webhook intake.

pub mod bench_delegate;
pub mod command_runner;
pub mod comment_sink;
pub mod credential_broker;
pub mod dispatch;
pub mod fault_isolator;
pub mod github_api_client;
pub mod webhook_server;

#[cfg(test)]
pub(crate) mod test_support;
