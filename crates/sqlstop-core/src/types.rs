//! Typed records for the Cloud SQL Admin API payloads.
//!
//! Only the fields the stop pass reads are required. Everything else the
//! API returns is either carried as an optional informational field or
//! ignored during deserialization.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Activation policy ──────────────────────────────────────────────

/// Whether an instance is kept running.
///
/// `Always` is the only value the stop pass treats as running. Values the
/// API may add later are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivationPolicy {
    Always,
    Never,
    OnDemand,
    Unspecified,
    Other(String),
}

impl ActivationPolicy {
    /// Wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Always => "ALWAYS",
            Self::Never => "NEVER",
            Self::OnDemand => "ON_DEMAND",
            Self::Unspecified => "SQL_ACTIVATION_POLICY_UNSPECIFIED",
            Self::Other(s) => s,
        }
    }

    /// True when the instance is running continuously.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Always)
    }
}

impl From<String> for ActivationPolicy {
    fn from(s: String) -> Self {
        match s.as_str() {
            "ALWAYS" => Self::Always,
            "NEVER" => Self::Never,
            "ON_DEMAND" => Self::OnDemand,
            "SQL_ACTIVATION_POLICY_UNSPECIFIED" => Self::Unspecified,
            _ => Self::Other(s),
        }
    }
}

impl From<ActivationPolicy> for String {
    fn from(p: ActivationPolicy) -> Self {
        match p {
            ActivationPolicy::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for ActivationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Instances ──────────────────────────────────────────────────────

/// A database instance as returned by `instances.list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    /// Instance name, unique within the project.
    pub name: String,
    pub settings: Settings,
    /// `CLOUD_SQL_INSTANCE`, `READ_REPLICA_INSTANCE`, ...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    /// Serving state, e.g. `RUNNABLE`, `MAINTENANCE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Set on replicas: the primary this instance replicates from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_instance_name: Option<String>,
}

impl Instance {
    pub fn activation_policy(&self) -> &ActivationPolicy {
        &self.settings.activation_policy
    }

    /// True when the API reports this instance as a read replica.
    pub fn is_replica(&self) -> bool {
        self.instance_type.as_deref() == Some("READ_REPLICA_INSTANCE")
            || self.master_instance_name.is_some()
    }
}

/// The slice of instance settings the stop pass reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub activation_policy: ActivationPolicy,
}

/// Response of `instances.list`.
///
/// `items` is omitted by the API when the project has no instances.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceList {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<Instance>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

impl InstanceList {
    /// Append another page. `items` stays `None` only if neither page had any.
    pub fn merge(&mut self, page: InstanceList) {
        if let Some(items) = page.items {
            self.items.get_or_insert_with(Vec::new).extend(items);
        }
        self.next_page_token = page.next_page_token;
    }
}

// ── Patch ──────────────────────────────────────────────────────────

/// Body of `instances.patch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchRequest {
    pub settings: PatchSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchSettings {
    pub activation_policy: ActivationPolicy,
}

impl PatchRequest {
    /// The only patch the stop pass ever sends: `activationPolicy = NEVER`.
    pub fn stop() -> Self {
        Self {
            settings: PatchSettings {
                activation_policy: ActivationPolicy::Never,
            },
        }
    }
}

/// Long-running operation returned by `instances.patch`. Never polled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub operation_type: Option<String>,
}
