use anyhow::Result;
use clap::Parser;

use team_orchestrator::cli::{Cli, Command};
use team_orchestrator::tracing_init::{init_tracing, DEFAULT_LOG_FILTER};
use team_orchestrator::workflow::{init_config, plan_workflow, run_workflow};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(DEFAULT_LOG_FILTER, cli.log_json);

    match cli.command {
        Command::Run(args) => run_workflow(args).await,
        Command::Plan(args) => plan_workflow(args).await,
        Command::Init(args) => init_config(args),
    }
}
