use clap::Parser;
use lakeflow::{cli, logging};

#[tokio::main]
async fn main() -> lakeflow::Result<()> {
    let args = cli::Args::parse();
    logging::init("info")?;
    cli::run(args).await
}
