use std::fmt::Display;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Output of a benchmark run that completed.
pub struct BenchSuccess {
    pub title: String,
    pub output: String,
    pub extra_info: String,
    pub bench_command: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Benchmark failure with an optional stringified cause.
pub struct BenchFailure {
    pub message: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
/// Enumerates supported `BenchReport` values.
pub enum BenchReport {
    Success(BenchSuccess),
    Failure(BenchFailure),
}

impl BenchReport {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(BenchFailure {
            message: message.into(),
            error: None,
        })
    }

    pub fn failure_with_error(message: impl Into<String>, error: impl Display) -> Self {
        Self::Failure(BenchFailure {
            message: message.into(),
            error: Some(error.to_string()),
        })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failure(_))
    }
}
