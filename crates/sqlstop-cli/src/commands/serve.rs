use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use sqlstop_trigger::{stop_handler, HttpTrigger};

use super::{build_stopper, StopOptions};

/// Serve the HTTP trigger until Ctrl-C.
pub async fn serve(host: IpAddr, port: u16, opts: StopOptions) -> anyhow::Result<()> {
    let stopper = Arc::new(build_stopper(opts)?);
    info!(project = %stopper.project(), "stop trigger configured");

    let addr = SocketAddr::new(host, port);
    let trigger = HttpTrigger::new(addr, stop_handler(stopper));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = tokio::spawn(trigger.serve(shutdown_rx));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
        // Bind failures end the server task before any signal arrives.
        _ = shutdown_tx.closed() => {}
    }

    server.await?
}
