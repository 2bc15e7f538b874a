//! HTTP trigger server.
//!
//! `HttpTrigger` runs a hyper HTTP/1.1 server and hands every inbound
//! request to a handler callback. The request body is never read:
//! triggering is the whole message.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// What the handler gets to see of an inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerRequest {
    pub method: Method,
    pub path: String,
}

impl TriggerRequest {
    fn from_hyper(req: &Request<Incoming>) -> Self {
        Self {
            method: req.method().clone(),
            path: req.uri().path().to_string(),
        }
    }
}

/// Callback type for handling trigger requests.
pub type RequestHandler = Arc<dyn Fn(TriggerRequest) -> BoxFuture + Send + Sync>;

pub type BoxFuture = std::pin::Pin<
    Box<dyn std::future::Future<Output = anyhow::Result<Response<Full<Bytes>>>> + Send>,
>;

/// Build a plain-text response.
pub fn text_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(body.into()));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    resp
}

/// HTTP trigger server.
pub struct HttpTrigger {
    bind_addr: SocketAddr,
    handler: RequestHandler,
}

impl HttpTrigger {
    /// Create a new HTTP trigger bound to the given address.
    pub fn new(bind_addr: SocketAddr, handler: RequestHandler) -> Self {
        Self { bind_addr, handler }
    }

    /// Bind and serve until the shutdown signal is received.
    pub async fn serve(self, shutdown: tokio::sync::watch::Receiver<bool>) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.bind_addr)
            .await
            .context("failed to bind HTTP trigger")?;
        serve_listener(listener, self.handler, shutdown).await
    }
}

/// Serve on an already-bound listener until the shutdown signal is received.
///
/// Spawns a tokio task per connection using HTTP/1.1.
pub async fn serve_listener(
    listener: TcpListener,
    handler: RequestHandler,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let local_addr = listener.local_addr().context("listener has no local address")?;
    info!(addr = %local_addr, "HTTP trigger listening");

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                let (stream, peer_addr) = accept_result.context("accept failed")?;
                let handler = handler.clone();

                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    let svc = service_fn(move |req: Request<Incoming>| {
                        let handler = handler.clone();
                        let trigger = TriggerRequest::from_hyper(&req);
                        async move {
                            debug!(%peer_addr, method = %trigger.method, path = %trigger.path, "trigger received");
                            match handler(trigger).await {
                                Ok(resp) => Ok::<_, hyper::Error>(resp),
                                Err(e) => {
                                    error!(%peer_addr, error = %e, "request handler failed");
                                    Ok(text_response(
                                        StatusCode::INTERNAL_SERVER_ERROR,
                                        e.to_string(),
                                    ))
                                }
                            }
                        }
                    });

                    if let Err(e) = http1::Builder::new()
                        .serve_connection(io, svc)
                        .await
                    {
                        error!(%peer_addr, error = %e, "connection error");
                    }
                });
            }
            _ = shutdown.changed() => {
                info!("HTTP trigger shutting down");
                break;
            }
        }
    }

    Ok(())
}
