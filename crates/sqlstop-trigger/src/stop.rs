//! Request handler that runs one stop pass per trigger.

use std::sync::Arc;

use hyper::StatusCode;
use sqlstop_core::{InstanceStopper, SqlAdmin};
use tokio::sync::Mutex;
use tracing::info;

use crate::handler::{text_response, BoxFuture, RequestHandler, TriggerRequest};

/// Build a [`RequestHandler`] that stops the project's running instances.
///
/// Overlapping triggers wait for the pass in progress; two passes never
/// interleave.
///
/// | outcome             | response                    |
/// |---------------------|-----------------------------|
/// | pass completed      | `200`, the success literal  |
/// | no instance listing | `204`, empty body           |
/// | fatal error         | `500`, the error message    |
pub fn stop_handler<A>(stopper: Arc<InstanceStopper<A>>) -> RequestHandler
where
    A: SqlAdmin + 'static,
{
    let running = Arc::new(Mutex::new(()));

    Arc::new(move |_req: TriggerRequest| -> BoxFuture {
        let stopper = stopper.clone();
        let running = running.clone();
        Box::pin(async move {
            let _pass = running.lock().await;
            let summary = stopper.stop_instances().await?;

            info!(
                project = %stopper.project(),
                instances = summary.outcomes().len(),
                stopped = summary.stopped().count(),
                "stop pass finished"
            );

            Ok::<_, anyhow::Error>(match summary.status_message() {
                Some(message) => text_response(StatusCode::OK, message),
                None => text_response(StatusCode::NO_CONTENT, ""),
            })
        })
    })
}
