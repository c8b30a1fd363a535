pub mod args;
pub mod commands;

pub use args::{
    AssembleArgs, ExecutionsListArgs, ExecutionsShowArgs, OutputFormat, TriggerArgs, ValidateArgs,
};
use clap::{Parser, Subcommand};

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
STACK COMMANDS:\n{subcommands}\n";

#[derive(Parser)]
#[command(name = "lakeflow")]
#[command(version = crate::VERSION)]
#[command(about = "Event-triggered ingestion orchestrator: crawl and transform in parallel, then notify")]
#[command(help_template = HELP_TEMPLATE)]
#[command(
    after_long_help = "Typical flow: assemble a stack, trigger it with a storage event, then inspect executions."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[command(
        about = "Assemble a stack and print its outputs and grants",
        after_help = "Example:\n    lakeflow assemble --stack demos/stack.yaml"
    )]
    Assemble(AssembleArgs),
    #[command(
        about = "Validate a stack manifest without assembling it",
        after_help = "Example:\n    lakeflow validate --stack demos/stack.yaml"
    )]
    Validate(ValidateArgs),
    #[command(
        about = "Route one storage event and run the matched execution",
        long_about = "Trigger parses a storage event payload, matches it against the stack's trigger rule, and on match runs one workflow execution to a terminal state against the simulated services.",
        after_help = "Example:\n    lakeflow trigger --stack demos/stack.yaml --event demos/events/object_created.json"
    )]
    Trigger(TriggerArgs),
    #[command(subcommand, about = "Inspect persisted execution records")]
    Executions(ExecutionsCommand),
}

#[derive(Subcommand)]
pub enum ExecutionsCommand {
    #[command(
        about = "List persisted executions",
        after_help = "Example:\n    lakeflow executions list --state-dir ."
    )]
    List(ExecutionsListArgs),
    #[command(
        about = "Show one execution record",
        after_help = "Example:\n    lakeflow executions show 6f2d…"
    )]
    Show(ExecutionsShowArgs),
}

pub async fn run(args: Args) -> crate::Result<()> {
    match args.command {
        Command::Assemble(assemble_args) => commands::assemble(assemble_args),
        Command::Validate(validate_args) => commands::validate(validate_args),
        Command::Trigger(trigger_args) => commands::trigger(trigger_args).await,
        Command::Executions(ExecutionsCommand::List(list_args)) => {
            commands::executions_list(list_args)
        }
        Command::Executions(ExecutionsCommand::Show(show_args)) => {
            commands::executions_show(show_args)
        }
    }
}
