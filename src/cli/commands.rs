use crate::cli::args::{
    AssembleArgs, ExecutionsListArgs, ExecutionsShowArgs, OutputFormat, TriggerArgs, ValidateArgs,
};
use crate::core::event::StorageEvent;
use crate::core::orchestrator::{store, ExecutionEngine, ExecutionStatus};
use crate::core::services::sim::{InMemoryTopic, SimulatedBatchJob, SimulatedCrawler};
use crate::core::services::ServiceSet;
use crate::core::stack::{self, Stack, StackManifest};
use crate::core::trigger::TriggerRouter;
use crate::Result;
use anyhow::anyhow;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

pub fn assemble(args: AssembleArgs) -> Result<()> {
    let stack = stack::assemble_from_file(&args.stack)?;
    let router = TriggerRouter::for_stack(&stack)?;
    match args.format {
        OutputFormat::Json => {
            let payload = json!({
                "stack": stack.manifest.name,
                "manifest_hash": stack.manifest_hash,
                "outputs": stack.outputs,
                "trigger_rules": router.rules(),
                "grants": stack.grants,
            });
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        OutputFormat::Text => {
            println!("stack: {}", stack.manifest.name);
            println!("manifest hash: {}", stack.manifest_hash);
            println!();
            println!("outputs:");
            println!("  source bucket:      {}", stack.outputs.source_bucket);
            println!("  destination bucket: {}", stack.outputs.destination_bucket);
            println!("  workflow role:      {}", stack.outputs.workflow_role);
            println!("  batch role:         {}", stack.outputs.batch_role);
            println!("  catalog database:   {}", stack.outputs.catalog_database);
            println!();
            println!("trigger rules:");
            for rule in router.rules() {
                println!(
                    "  {} / {} on bucket {} -> workflow {}",
                    rule.source, rule.detail_type, rule.bucket_name, rule.target
                );
            }
            println!();
            println!("grants:");
            for (principal, grants) in stack.grants.by_principal() {
                println!("  {}:", principal);
                for grant in grants {
                    let actions: Vec<&str> =
                        grant.actions.iter().map(|action| action.as_str()).collect();
                    println!(
                        "    [{}] on {}",
                        actions.join(", "),
                        grant.resources.join(", ")
                    );
                }
            }
        }
    }
    Ok(())
}

pub fn validate(args: ValidateArgs) -> Result<()> {
    let (manifest, _) = StackManifest::load_from_file(&args.stack)?;
    println!("manifest {} is valid", manifest.name);
    Ok(())
}

pub async fn trigger(args: TriggerArgs) -> Result<()> {
    let stack = Arc::new(stack::assemble_from_file(&args.stack)?);
    let services = simulated_services(&stack);
    let engine = ExecutionEngine::new(Arc::clone(&stack), services, args.state_dir.clone());

    let (_, payload) = StorageEvent::load_from_file(&args.event)?;
    let Some(record) = engine.handle_event(&payload).await? else {
        println!("event did not match the stack's trigger rule; no action taken");
        return Ok(());
    };

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
        OutputFormat::Text => print_record(&record),
    }
    if record.status != ExecutionStatus::Completed {
        return Err(anyhow!(
            "execution {} finished in {} state",
            record.execution_id,
            record.status.as_str()
        ));
    }
    Ok(())
}

pub fn executions_list(args: ExecutionsListArgs) -> Result<()> {
    let summaries = store::list_executions(&args.state_dir)?;
    if summaries.is_empty() {
        println!("no executions recorded under {}", args.state_dir.display());
        return Ok(());
    }
    for summary in summaries {
        println!(
            "{}  {:<9}  {}  {}",
            summary.execution_id,
            summary.status.as_str(),
            summary.started_at.to_rfc3339(),
            summary.stack_name
        );
    }
    Ok(())
}

pub fn executions_show(args: ExecutionsShowArgs) -> Result<()> {
    let execution_id = Uuid::parse_str(&args.execution_id)
        .map_err(|err| anyhow!("invalid execution id {}: {}", args.execution_id, err))?;
    let record = store::load_execution(&args.state_dir, &execution_id)?;
    print_record(&record);
    Ok(())
}

fn simulated_services(stack: &Stack) -> ServiceSet {
    let subscriptions = stack
        .manifest
        .topic
        .subscriptions
        .iter()
        .map(|subscription| subscription.email.clone())
        .collect();
    ServiceSet {
        crawler: Arc::new(SimulatedCrawler::new()),
        batch: Arc::new(SimulatedBatchJob::new()),
        topic: Arc::new(InMemoryTopic::new(subscriptions)),
    }
}

fn print_record(record: &crate::core::orchestrator::ExecutionRecord) {
    println!("execution: {}", record.execution_id);
    println!("stack:     {}", record.stack_name);
    println!("status:    {}", record.status.as_str());
    println!("started:   {}", record.started_at.to_rfc3339());
    if let Some(completed_at) = record.completed_at {
        println!("completed: {}", completed_at.to_rfc3339());
    }
    println!("steps:");
    for step in &record.steps {
        let branch = step.branch.as_deref().unwrap_or("-");
        println!(
            "  {:<20} branch={:<10} {:<7} attempts={} {}ms",
            step.step_id,
            branch,
            step.status.as_str(),
            step.attempts,
            step.duration_ms()
        );
        if let Some(error) = &step.error {
            println!("    error [{}]: {}", error.code, error.message);
        }
    }
    if let Some(failure) = &record.failure {
        println!("failure [{}]: {}", failure.code, failure.message);
    }
}
