//! Command handlers behind the CLI.

use anyhow::{Context, Result};
use std::path::Path;

use team_orchestrator_sdk::{
    log_agent_metrics, log_file_saved, log_found, log_info, log_task_outcome, log_warning, log_wave, SubtaskStatus,
};

use crate::cli::{InitArgs, PlanArgs, RunArgs, SourceArgs};
use crate::config::{self, TeamConfig};
use crate::events;
use crate::orchestrator::TeamOrchestrator;
use crate::planner::{self, Subtask};
use crate::report::WorkflowReport;

/// Load the team configuration the way every command does
pub fn load_config(explicit: Option<&Path>) -> Result<TeamConfig> {
    match config::resolve_config_path(explicit) {
        Some(path) => {
            log_info!("Using team configuration {}", path.display());
            TeamConfig::load(&path)
        }
        None => {
            log_warning!("No team configuration found, using defaults");
            Ok(TeamConfig::default())
        }
    }
}

async fn obtain_plan(orchestrator: &TeamOrchestrator, source: &SourceArgs, objective: &str) -> Result<Vec<Subtask>> {
    let subtasks = match &source.decomposition {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read decomposition: {}", path.display()))?;
            orchestrator
                .plan_from_text(&text)
                .with_context(|| format!("Invalid decomposition: {}", path.display()))?
        }
        None => {
            log_info!("Decomposing objective...");
            orchestrator
                .plan(objective)
                .await
                .context("Failed to decompose objective")?
        }
    };
    log_found!(subtasks.len(), "subtasks");
    Ok(subtasks)
}

fn print_plan(orchestrator: &TeamOrchestrator, subtasks: &[Subtask]) {
    let waves = planner::execution_waves(subtasks);
    for (index, wave) in waves.iter().enumerate() {
        log_wave!(index + 1, waves.len(), wave.len());
        for id in wave {
            let Some(task) = subtasks.iter().find(|t| &t.id == id) else {
                continue;
            };
            let agents: Vec<String> = orchestrator
                .registry()
                .resolve(&task.required_capabilities)
                .iter()
                .map(|a| a.name().to_string())
                .collect();
            let assigned = if agents.is_empty() {
                "unassigned".to_string()
            } else {
                agents.join(", ")
            };
            println!("    {} {} [{}] -> {}", task.id, task.title, task.required_capabilities.join(", "), assigned);
        }
    }

    let path = planner::critical_path(subtasks);
    log_info!("Critical path ({} steps): {}", path.len(), path.join(" -> "));

    for capability in orchestrator.registry().capabilities() {
        let needed = subtasks.iter().any(|t| t.required_capabilities.contains(capability));
        if needed && orchestrator.registry().agents_for(capability).is_empty() {
            log_warning!("No agent registered for capability '{}'", capability);
        }
    }
}

fn print_report(report: &WorkflowReport) {
    for outcome in &report.subtasks {
        let detail = match (&outcome.failure, outcome.status) {
            (Some(reason), _) => reason.to_string(),
            (None, SubtaskStatus::Completed) => format!("{} rounds", outcome.rounds),
            (None, status) => status.to_string(),
        };
        log_task_outcome!(&outcome.id, outcome.status, detail);
    }
    for (agent, metrics) in &report.agent_metrics {
        log_agent_metrics!(agent, metrics.successful_tasks, metrics.failed_tasks, metrics.success_rate);
    }
    if let Some(error) = &report.error {
        log_warning!("{}", error);
    }
    log_info!("Workflow {} finished: {}", report.workflow_id, report.status);
}

/// `run`: decompose, execute and report
pub async fn run_workflow(args: RunArgs) -> Result<()> {
    args.validate()?;

    let mut config = load_config(args.source.config.as_deref())?;
    args.apply(&mut config);
    let orchestrator = TeamOrchestrator::from_config(config)?;

    let forwarder = args
        .emit_events
        .then(|| tokio::spawn(events::forward_to_stderr(orchestrator.events().subscribe())));

    let objective = args.source.objective()?;
    let subtasks = obtain_plan(&orchestrator, &args.source, &objective).await?;
    print_plan(&orchestrator, &subtasks);

    let handle = orchestrator.prepare(&objective, subtasks)?;
    let cancel = handle.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let report = orchestrator.execute(&handle).await;
    ctrl_c.abort();
    print_report(&report);

    if let Some(path) = &args.report {
        report.save(path)?;
        log_file_saved!(path.display());
    }

    if let Some(forwarder) = forwarder {
        // the orchestrator owns the sender; give the forwarder a moment to drain
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        forwarder.abort();
    }

    if !report.success() {
        anyhow::bail!("workflow {} ended {}", report.workflow_id, report.status);
    }
    Ok(())
}

/// `plan`: validate a decomposition and show how it would run
pub async fn plan_workflow(args: PlanArgs) -> Result<()> {
    args.source.validate()?;

    let mut config = load_config(args.source.config.as_deref())?;
    args.source.apply(&mut config);
    let orchestrator = TeamOrchestrator::from_config(config)?;

    let objective = args.source.objective()?;
    let subtasks = obtain_plan(&orchestrator, &args.source, &objective).await?;
    print_plan(&orchestrator, &subtasks);
    Ok(())
}

/// `init`: print or save a starter configuration
pub fn init_config(args: InitArgs) -> Result<()> {
    let template = config::template(&args.template)
        .with_context(|| format!("Unknown template '{}'", args.template))?;
    let yaml = template.to_yaml()?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, yaml).with_context(|| format!("Failed to write {}", path.display()))?;
            log_file_saved!(path.display());
        }
        None => print!("{}", yaml),
    }
    Ok(())
}
