use lab_bridge::{MetricsRegistry, MetricsServer};

use crate::config::ServeArgs;
use crate::error::CliError;

/// Blocking entry point: one startup line, then serve until Ctrl+C.
pub fn run(args: ServeArgs) -> Result<(), CliError> {
    let config = args.common.effective()?;
    let port = args.port.unwrap_or(config.metrics_port);
    let bind = args.bind.unwrap_or(config.bind_addr);

    let server = MetricsServer::new(MetricsRegistry::global().clone()).with_bind_addr(&bind);
    server.start(port, false)?;
    tracing::info!("shutdown complete");
    Ok(())
}
