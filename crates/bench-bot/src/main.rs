mod bootstrap_helpers;
mod startup;

use bench_cli::Cli;
use bench_runtime::fault_isolator::{install_fault_isolator, FatalEvent, FaultIsolator};
use clap::Parser;

use crate::bootstrap_helpers::init_tracing;
use crate::startup::run_bench_bot;

#[tokio::main]
async fn main() {
    init_tracing();
    let isolator = install_fault_isolator(FaultIsolator::for_process());
    let cli = Cli::parse();
    if let Err(error) = run_bench_bot(cli).await {
        isolator.handle(FatalEvent::task_failure(&error));
    }
}
