use crate::Result;
use anyhow::anyhow;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::filter::EnvFilter;

static LOGGER_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize the tracing subscriber for the process. `LAKEFLOW_LOG` takes
/// precedence over the default level. Errors when invoked more than once per
/// process invocation.
pub fn init(default_level: &str) -> Result<()> {
    if LOGGER_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(anyhow!("logging already initialized"));
    }
    let env_filter = EnvFilter::try_from_env("LAKEFLOW_LOG")
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|err| anyhow!("failed to configure tracing level: {}", err))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}
