use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct AssembleArgs {
    /// Path to the stack manifest (YAML)
    #[arg(long, value_name = "FILE")]
    pub stack: PathBuf,

    /// Emit either terminal-friendly text or machine-readable JSON
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Path to the stack manifest (YAML)
    #[arg(long, value_name = "FILE")]
    pub stack: PathBuf,
}

#[derive(Args)]
pub struct TriggerArgs {
    /// Path to the stack manifest (YAML)
    #[arg(long, value_name = "FILE")]
    pub stack: PathBuf,

    /// Path to a storage event payload (JSON)
    #[arg(long, value_name = "FILE")]
    pub event: PathBuf,

    /// Directory storing execution state (default: current directory)
    #[arg(long, default_value = ".", value_name = "PATH")]
    pub state_dir: PathBuf,

    /// Emit either terminal-friendly text or machine-readable JSON
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct ExecutionsListArgs {
    /// Directory storing execution state (default: current directory)
    #[arg(long, default_value = ".", value_name = "PATH")]
    pub state_dir: PathBuf,
}

#[derive(Args)]
pub struct ExecutionsShowArgs {
    /// Identifier of the execution to inspect
    #[arg(value_name = "EXECUTION")]
    pub execution_id: String,

    /// Directory storing execution state (default: current directory)
    #[arg(long, default_value = ".", value_name = "PATH")]
    pub state_dir: PathBuf,
}

#[derive(Clone, clap::ValueEnum, Debug)]
pub enum OutputFormat {
    /// Human-readable summary
    Text,
    /// JSON payload suitable for downstream tooling
    Json,
}
