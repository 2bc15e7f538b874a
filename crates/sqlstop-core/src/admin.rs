//! The seam between the stop pass and the remote admin API.
//!
//! The stop pass never talks HTTP itself. It is handed a [`SqlAdmin`] at
//! construction time, which lets tests substitute a recording fake.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::AdminResult;
use crate::types::{InstanceList, Operation, PatchRequest};

/// Boxed future alias for admin API results.
pub type AdminFuture<'a, T> = Pin<Box<dyn Future<Output = AdminResult<T>> + Send + 'a>>;

/// Database administration operations used by the stop pass.
pub trait SqlAdmin: Send + Sync {
    /// List every instance in `project`.
    fn list_instances<'a>(&'a self, project: &'a str) -> AdminFuture<'a, InstanceList>;

    /// Patch the settings of one instance.
    fn patch_instance<'a>(
        &'a self,
        project: &'a str,
        instance: &'a str,
        body: &'a PatchRequest,
    ) -> AdminFuture<'a, Operation>;
}

impl<T: SqlAdmin + ?Sized> SqlAdmin for Arc<T> {
    fn list_instances<'a>(&'a self, project: &'a str) -> AdminFuture<'a, InstanceList> {
        (**self).list_instances(project)
    }

    fn patch_instance<'a>(
        &'a self,
        project: &'a str,
        instance: &'a str,
        body: &'a PatchRequest,
    ) -> AdminFuture<'a, Operation> {
        (**self).patch_instance(project, instance, body)
    }
}
