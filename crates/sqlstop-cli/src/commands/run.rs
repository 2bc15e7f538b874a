use tracing::info;

use super::{build_stopper, StopOptions};

/// Run one pass and print its status literal.
pub async fn run(opts: StopOptions) -> anyhow::Result<()> {
    let stopper = build_stopper(opts)?;
    let summary = stopper.stop_instances().await?;

    match summary.status_message() {
        Some(message) => println!("{message}"),
        None => info!(project = %stopper.project(), "no instances to process"),
    }
    Ok(())
}
