//! sqlstop-trigger — HTTP trigger for the stop pass.
//!
//! A scheduler (Cloud Scheduler, cron + curl, ...) calls the endpoint;
//! each request runs one [`sqlstop_core::InstanceStopper`] pass and the
//! response carries its status.
//!
//! ```text
//! scheduler
//!   │
//!   ▼
//! hyper server (HttpTrigger)
//!   │
//!   ├── stop_handler → InstanceStopper::stop_instances
//!   │
//!   ▼
//! 200 "completed" | 204 | 500 error
//! ```

pub mod handler;
pub mod stop;

pub use handler::{serve_listener, text_response, HttpTrigger, RequestHandler, TriggerRequest};
pub use stop::stop_handler;
