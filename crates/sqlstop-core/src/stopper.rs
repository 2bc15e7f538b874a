//! The stop pass.
//!
//! Lists every instance in a project and moves each running one
//! (`activationPolicy = ALWAYS`) to `NEVER`. One class of patch rejection
//! is tolerated, selected by [`TolerancePolicy`]; every other failure
//! aborts the pass.
//!
//! ```text
//! InstanceStopper::stop_instances
//!   ├── SqlAdmin::list_instances(project)
//!   │     └── no items → StopSummary::NothingToDo
//!   └── for each instance, in order
//!         ├── ALWAYS → SqlAdmin::patch_instance(NEVER)
//!         │     ├── Ok                → Stopped
//!         │     ├── tolerated error   → NotStoppable (warn, continue)
//!         │     └── other error       → StopError::Patch (abort)
//!         └── otherwise               → AlreadyStopped
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::admin::SqlAdmin;
use crate::error::{AdminError, ConfigError, StopError};
use crate::types::{ActivationPolicy, PatchRequest};

/// Status literal returned when a pass processed the instance list.
pub const SUCCESS_MESSAGE: &str = "completed";

// ── Tolerance ──────────────────────────────────────────────────────

/// Which patch rejections are treated as "replica or under maintenance".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TolerancePolicy {
    /// HTTP 400 (replica) and 409 (operation in progress) only.
    #[default]
    ReplicaOrMaintenance,
    /// Any 4xx response.
    AnyClientError,
}

impl TolerancePolicy {
    /// Whether a patch failure should be logged and skipped.
    pub fn tolerates(&self, err: &AdminError) -> bool {
        let Some(status) = err.status() else {
            return false;
        };
        match self {
            Self::ReplicaOrMaintenance => matches!(status, 400 | 409),
            Self::AnyClientError => (400..500).contains(&status),
        }
    }
}

impl FromStr for TolerancePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "replica-or-maintenance" => Ok(Self::ReplicaOrMaintenance),
            "any-client-error" => Ok(Self::AnyClientError),
            other => Err(ConfigError::UnknownTolerance(other.to_string())),
        }
    }
}

// ── Outcomes ───────────────────────────────────────────────────────

/// What happened to one instance during a pass.
#[derive(Debug, Clone, PartialEq)]
pub enum StopAction {
    /// The patch to `NEVER` was accepted.
    Stopped,
    /// The instance was not running; nothing was sent.
    AlreadyStopped { policy: ActivationPolicy },
    /// The patch was rejected with a tolerated status.
    NotStoppable {
        status: u16,
        /// Machine-readable reason from the error body, when present.
        reason: Option<String>,
        message: String,
        /// The listing reported the instance as a read replica.
        replica: bool,
        /// Serving state from the listing, e.g. `MAINTENANCE`.
        state: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstanceOutcome {
    pub name: String,
    pub action: StopAction,
}

impl fmt::Display for InstanceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.action {
            StopAction::Stopped => write!(f, "{}: stopped", self.name),
            StopAction::AlreadyStopped { .. } => write!(f, "{}: already stopped", self.name),
            StopAction::NotStoppable { .. } => write!(
                f,
                "{}: could not be stopped because it is a read replica or is under maintenance. \
                 Replicas cannot be stopped and keep billing, so delete them as soon as they are no longer needed",
                self.name
            ),
        }
    }
}

/// Result of a completed pass.
#[derive(Debug, Clone, PartialEq)]
pub enum StopSummary {
    /// The list response carried no instance collection.
    NothingToDo,
    /// Every listed instance was processed, in list order.
    Completed(Vec<InstanceOutcome>),
}

impl StopSummary {
    /// The status literal for the caller, `None` when there was nothing to do.
    pub fn status_message(&self) -> Option<&'static str> {
        match self {
            Self::NothingToDo => None,
            Self::Completed(_) => Some(SUCCESS_MESSAGE),
        }
    }

    pub fn outcomes(&self) -> &[InstanceOutcome] {
        match self {
            Self::NothingToDo => &[],
            Self::Completed(outcomes) => outcomes,
        }
    }

    /// Names of the instances that were stopped by this pass.
    pub fn stopped(&self) -> impl Iterator<Item = &str> {
        self.outcomes()
            .iter()
            .filter(|o| o.action == StopAction::Stopped)
            .map(|o| o.name.as_str())
    }
}

// ── Stopper ────────────────────────────────────────────────────────

/// Stops every running instance in one project.
pub struct InstanceStopper<A> {
    admin: A,
    project: String,
    tolerance: TolerancePolicy,
}

impl<A: SqlAdmin> InstanceStopper<A> {
    pub fn new(admin: A, project: impl Into<String>) -> Self {
        Self {
            admin,
            project: project.into(),
            tolerance: TolerancePolicy::default(),
        }
    }

    pub fn with_tolerance(mut self, tolerance: TolerancePolicy) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Run one pass over the project's instances.
    pub async fn stop_instances(&self) -> Result<StopSummary, StopError> {
        let list = self
            .admin
            .list_instances(&self.project)
            .await
            .map_err(|source| StopError::List {
                project: self.project.clone(),
                source,
            })?;

        let Some(instances) = list.items else {
            debug!(project = %self.project, "no instances listed");
            return Ok(StopSummary::NothingToDo);
        };

        let patch = PatchRequest::stop();
        let mut outcomes = Vec::with_capacity(instances.len());

        for instance in instances {
            let policy = instance.activation_policy().clone();
            let action = if policy.is_running() {
                match self
                    .admin
                    .patch_instance(&self.project, &instance.name, &patch)
                    .await
                {
                    Ok(op) => {
                        debug!(
                            instance = %instance.name,
                            operation = op.name.as_deref().unwrap_or("-"),
                            "patch accepted"
                        );
                        StopAction::Stopped
                    }
                    Err(err) if self.tolerance.tolerates(&err) => {
                        let status = err.status().unwrap_or_default();
                        let (reason, message) = match err {
                            AdminError::Api {
                                reason, message, ..
                            } => (reason, message),
                            other => (None, other.to_string()),
                        };
                        StopAction::NotStoppable {
                            status,
                            reason,
                            message,
                            replica: instance.is_replica(),
                            state: instance.state.clone(),
                        }
                    }
                    Err(source) => {
                        return Err(StopError::Patch {
                            instance: instance.name,
                            source,
                        });
                    }
                }
            } else {
                StopAction::AlreadyStopped { policy }
            };

            let outcome = InstanceOutcome {
                name: instance.name,
                action,
            };
            match &outcome.action {
                StopAction::NotStoppable {
                    status,
                    reason,
                    message,
                    replica,
                    state,
                } => {
                    warn!(
                        instance = %outcome.name,
                        status,
                        reason = reason.as_deref().unwrap_or("-"),
                        replica,
                        state = state.as_deref().unwrap_or("-"),
                        error = %message,
                        "{outcome}"
                    );
                }
                StopAction::AlreadyStopped { policy } => {
                    info!(instance = %outcome.name, %policy, "{outcome}");
                }
                StopAction::Stopped => info!(instance = %outcome.name, "{outcome}"),
            }
            outcomes.push(outcome);
        }

        Ok(StopSummary::Completed(outcomes))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::admin::AdminFuture;
    use crate::types::{Instance, InstanceList, Operation, Settings};

    /// Fake admin API that records every patch it receives.
    struct FakeAdmin {
        list: Result<InstanceList, AdminError>,
        patch_errors: HashMap<String, AdminError>,
        patches: Mutex<Vec<(String, String, PatchRequest)>>,
    }

    impl FakeAdmin {
        fn listing(items: Option<Vec<Instance>>) -> Self {
            Self {
                list: Ok(InstanceList {
                    items,
                    next_page_token: None,
                }),
                patch_errors: HashMap::new(),
                patches: Mutex::new(Vec::new()),
            }
        }

        fn failing_patch(mut self, name: &str, err: AdminError) -> Self {
            self.patch_errors.insert(name.to_string(), err);
            self
        }

        fn patched(&self) -> Vec<String> {
            self.patches
                .lock()
                .unwrap()
                .iter()
                .map(|(_, name, _)| name.clone())
                .collect()
        }
    }

    impl SqlAdmin for FakeAdmin {
        fn list_instances<'a>(&'a self, _project: &'a str) -> AdminFuture<'a, InstanceList> {
            let result = self.list.clone();
            Box::pin(async move { result })
        }

        fn patch_instance<'a>(
            &'a self,
            project: &'a str,
            instance: &'a str,
            body: &'a PatchRequest,
        ) -> AdminFuture<'a, Operation> {
            Box::pin(async move {
                self.patches.lock().unwrap().push((
                    project.to_string(),
                    instance.to_string(),
                    body.clone(),
                ));
                match self.patch_errors.get(instance) {
                    Some(err) => Err(err.clone()),
                    None => Ok(Operation {
                        name: Some(format!("op-{instance}")),
                        ..Operation::default()
                    }),
                }
            })
        }
    }

    fn instance(name: &str, policy: &str) -> Instance {
        Instance {
            name: name.to_string(),
            settings: Settings {
                activation_policy: ActivationPolicy::from(policy.to_string()),
            },
            instance_type: None,
            state: None,
            master_instance_name: None,
        }
    }

    fn replica(name: &str, primary: &str) -> Instance {
        Instance {
            instance_type: Some("READ_REPLICA_INSTANCE".to_string()),
            state: Some("RUNNABLE".to_string()),
            master_instance_name: Some(primary.to_string()),
            ..instance(name, "ALWAYS")
        }
    }

    fn api_error(status: u16) -> AdminError {
        AdminError::Api {
            status,
            reason: None,
            message: format!("rejected with {status}"),
        }
    }

    #[tokio::test]
    async fn running_instance_is_stopped() {
        let admin = FakeAdmin::listing(Some(vec![instance("db-1", "ALWAYS")]));
        let stopper = InstanceStopper::new(admin, "proj");

        let summary = stopper.stop_instances().await.unwrap();

        assert_eq!(summary.status_message(), Some(SUCCESS_MESSAGE));
        assert_eq!(summary.stopped().collect::<Vec<_>>(), vec!["db-1"]);
        assert_eq!(summary.outcomes()[0].to_string(), "db-1: stopped");

        let patches = stopper.admin.patches.lock().unwrap();
        assert_eq!(patches.len(), 1);
        let (project, name, body) = &patches[0];
        assert_eq!(project, "proj");
        assert_eq!(name, "db-1");
        assert_eq!(body.settings.activation_policy, ActivationPolicy::Never);
    }

    #[tokio::test]
    async fn stopped_instance_is_not_patched() {
        let admin = FakeAdmin::listing(Some(vec![instance("db-2", "NEVER")]));
        let stopper = InstanceStopper::new(admin, "proj");

        let summary = stopper.stop_instances().await.unwrap();

        assert_eq!(summary.status_message(), Some(SUCCESS_MESSAGE));
        assert!(stopper.admin.patched().is_empty());
        assert_eq!(
            summary.outcomes()[0].action,
            StopAction::AlreadyStopped {
                policy: ActivationPolicy::Never
            }
        );
        assert_eq!(summary.outcomes()[0].to_string(), "db-2: already stopped");
    }

    #[tokio::test]
    async fn non_always_policies_are_all_skipped() {
        let admin = FakeAdmin::listing(Some(vec![
            instance("a", "ON_DEMAND"),
            instance("b", "SQL_ACTIVATION_POLICY_UNSPECIFIED"),
            instance("c", "SOMETHING_NEW"),
        ]));
        let stopper = InstanceStopper::new(admin, "proj");

        let summary = stopper.stop_instances().await.unwrap();

        assert!(stopper.admin.patched().is_empty());
        assert_eq!(summary.outcomes().len(), 3);
        assert_eq!(summary.stopped().count(), 0);
    }

    #[tokio::test]
    async fn replica_rejection_is_tolerated() {
        let admin = FakeAdmin::listing(Some(vec![
            replica("db-3", "proj:db-0"),
            instance("db-4", "ALWAYS"),
        ]))
        .failing_patch(
            "db-3",
            AdminError::Api {
                status: 400,
                reason: Some("operationNotAllowed".to_string()),
                message: "not valid for a replica instance".to_string(),
            },
        );
        let stopper = InstanceStopper::new(admin, "proj");

        let summary = stopper.stop_instances().await.unwrap();

        assert_eq!(summary.status_message(), Some(SUCCESS_MESSAGE));
        assert_eq!(stopper.admin.patched(), vec!["db-3", "db-4"]);
        let warning = &summary.outcomes()[0];
        assert_eq!(
            warning.action,
            StopAction::NotStoppable {
                status: 400,
                reason: Some("operationNotAllowed".to_string()),
                message: "not valid for a replica instance".to_string(),
                replica: true,
                state: Some("RUNNABLE".to_string()),
            }
        );
        let line = warning.to_string();
        assert!(line.starts_with("db-3:"));
        assert!(line.contains("read replica"));
        assert!(line.contains("delete"));
        assert_eq!(summary.stopped().collect::<Vec<_>>(), vec!["db-4"]);
    }

    #[tokio::test]
    async fn maintenance_conflict_is_tolerated() {
        let mut busy = instance("db-3", "ALWAYS");
        busy.state = Some("MAINTENANCE".to_string());
        let admin = FakeAdmin::listing(Some(vec![busy])).failing_patch("db-3", api_error(409));
        let stopper = InstanceStopper::new(admin, "proj");

        let summary = stopper.stop_instances().await.unwrap();
        match &summary.outcomes()[0].action {
            StopAction::NotStoppable {
                status,
                reason,
                replica,
                state,
                ..
            } => {
                assert_eq!(*status, 409);
                assert_eq!(*reason, None);
                assert!(!replica);
                assert_eq!(state.as_deref(), Some("MAINTENANCE"));
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[tokio::test]
    async fn permission_error_aborts_by_default() {
        let admin = FakeAdmin::listing(Some(vec![
            instance("db-5", "ALWAYS"),
            instance("db-6", "ALWAYS"),
        ]))
        .failing_patch("db-5", api_error(403));
        let stopper = InstanceStopper::new(admin, "proj");

        let err = stopper.stop_instances().await.unwrap_err();

        match err {
            StopError::Patch { instance, source } => {
                assert_eq!(instance, "db-5");
                assert_eq!(source.status(), Some(403));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(stopper.admin.patched(), vec!["db-5"]);
    }

    #[tokio::test]
    async fn broad_policy_tolerates_any_client_error() {
        let admin = FakeAdmin::listing(Some(vec![
            instance("db-5", "ALWAYS"),
            instance("db-6", "ALWAYS"),
        ]))
        .failing_patch("db-5", api_error(403));
        let stopper =
            InstanceStopper::new(admin, "proj").with_tolerance(TolerancePolicy::AnyClientError);

        let summary = stopper.stop_instances().await.unwrap();
        assert_eq!(summary.stopped().collect::<Vec<_>>(), vec!["db-6"]);
    }

    #[tokio::test]
    async fn server_error_on_patch_is_fatal_under_any_policy() {
        let admin = FakeAdmin::listing(Some(vec![instance("db-7", "ALWAYS")]))
            .failing_patch("db-7", api_error(503));
        let stopper =
            InstanceStopper::new(admin, "proj").with_tolerance(TolerancePolicy::AnyClientError);

        assert!(matches!(
            stopper.stop_instances().await,
            Err(StopError::Patch { .. })
        ));
    }

    #[tokio::test]
    async fn missing_items_is_nothing_to_do() {
        let admin = FakeAdmin::listing(None);
        let stopper = InstanceStopper::new(admin, "proj");

        let summary = stopper.stop_instances().await.unwrap();

        assert_eq!(summary, StopSummary::NothingToDo);
        assert_eq!(summary.status_message(), None);
        assert!(summary.outcomes().is_empty());
        assert!(stopper.admin.patched().is_empty());
    }

    #[tokio::test]
    async fn empty_items_still_completes() {
        let admin = FakeAdmin::listing(Some(Vec::new()));
        let stopper = InstanceStopper::new(admin, "proj");

        let summary = stopper.stop_instances().await.unwrap();
        assert_eq!(summary.status_message(), Some(SUCCESS_MESSAGE));
        assert!(summary.outcomes().is_empty());
    }

    #[tokio::test]
    async fn list_failure_propagates() {
        let mut admin = FakeAdmin::listing(None);
        admin.list = Err(AdminError::Auth("no token".to_string()));
        let stopper = InstanceStopper::new(admin, "proj");

        let err = stopper.stop_instances().await.unwrap_err();
        assert!(matches!(err, StopError::List { ref project, .. } if project == "proj"));
        assert!(stopper.admin.patched().is_empty());
    }

    #[test]
    fn tolerance_never_covers_transport_errors() {
        let err = AdminError::Transport("connection reset".to_string());
        assert!(!TolerancePolicy::ReplicaOrMaintenance.tolerates(&err));
        assert!(!TolerancePolicy::AnyClientError.tolerates(&err));
    }

    #[test]
    fn tolerance_parses_from_str() {
        assert_eq!(
            "any-client-error".parse::<TolerancePolicy>().unwrap(),
            TolerancePolicy::AnyClientError
        );
        assert_eq!(
            "replica-or-maintenance".parse::<TolerancePolicy>().unwrap(),
            TolerancePolicy::ReplicaOrMaintenance
        );
        assert!(matches!(
            "everything".parse::<TolerancePolicy>(),
            Err(ConfigError::UnknownTolerance(_))
        ));
    }
}
