//! Shared types used across autoscaler broker crates.
//!
//! The policy types mirror the JSON document accepted from platform users.
//! Optional members use `skip_serializing_if` so a decoded policy marshals
//! back to the same shape it was submitted in, minus unknown fields.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ── Policy ─────────────────────────────────────────────────────

/// A per-application scaling policy: instance bounds, dynamic rules and
/// time-based schedules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingPolicy {
    pub instance_min_count: i64,
    pub instance_max_count: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scaling_rules: Vec<ScalingRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedules: Option<ScalingSchedules>,
    /// Binding-level settings; never persisted with the policy definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<BindingConfiguration>,
    #[serde(
        rename = "credential-type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub credential_type: Option<CredentialType>,
}

impl ScalingPolicy {
    /// The storable part of the policy, with binding-level fields stripped.
    pub fn definition(&self) -> ScalingPolicy {
        ScalingPolicy {
            configuration: None,
            credential_type: None,
            ..self.clone()
        }
    }

    /// Number of schedule entries (recurring plus specific-date).
    pub fn schedule_count(&self) -> usize {
        self.schedules
            .as_ref()
            .map(|s| s.recurring_schedule.len() + s.specific_date.len())
            .unwrap_or(0)
    }

    /// Serialize to the canonical JSON text.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// A threshold rule evaluated against a metric stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingRule {
    pub metric_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breach_duration_secs: Option<i64>,
    pub threshold: i64,
    pub operator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cool_down_secs: Option<i64>,
    pub adjustment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingSchedules {
    pub timezone: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recurring_schedule: Vec<RecurringSchedule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub specific_date: Vec<SpecificDateSchedule>,
}

/// A weekly or monthly repeating window. Exactly one of `days_of_week` and
/// `days_of_month` is populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringSchedule {
    pub start_time: String,
    pub end_time: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub days_of_week: Vec<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub days_of_month: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    pub instance_min_count: i64,
    pub instance_max_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_min_instance_count: Option<i64>,
}

/// A one-off window between two local date-times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecificDateSchedule {
    pub start_date_time: String,
    pub end_date_time: String,
    pub instance_min_count: i64,
    pub instance_max_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_min_instance_count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingConfiguration {
    pub custom_metrics: CustomMetricsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomMetricsConfig {
    pub metric_submission_strategy: MetricsSubmissionStrategy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSubmissionStrategy {
    pub allow_from: String,
}

/// Custom metrics may only be submitted by the app itself.
pub const STRATEGY_SAME_APP: &str = "same_app";
/// Custom metrics may also be submitted by apps bound to the same instance.
pub const STRATEGY_BOUND_APP: &str = "bound_app";

impl BindingConfiguration {
    pub fn allow_from(&self) -> &str {
        &self.custom_metrics.metric_submission_strategy.allow_from
    }
}

// ── Credentials ────────────────────────────────────────────────

/// How a bound app authenticates custom-metrics submissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialType {
    #[default]
    #[serde(rename = "binding-secret")]
    BindingSecret,
    #[serde(rename = "x509")]
    X509,
}

impl CredentialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialType::BindingSecret => "binding-secret",
            CredentialType::X509 => "x509",
        }
    }
}

impl fmt::Display for CredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CredentialType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "binding-secret" => Ok(CredentialType::BindingSecret),
            "x509" => Ok(CredentialType::X509),
            other => Err(format!("unknown credential type {other:?}")),
        }
    }
}

/// Plaintext custom-metrics credential. Only ever handed out once, when it
/// is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

// ── Instances & bindings ───────────────────────────────────────

/// A provisioned autoscaler service instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub instance_id: String,
    pub org_id: String,
    pub space_id: String,
    /// Applied to bindings that bring no policy of their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_policy: Option<ScalingPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_policy_guid: Option<String>,
}

impl ServiceInstance {
    /// True when `other` carries the same tenant and default policy, i.e. a
    /// repeated create is a harmless retry.
    pub fn same_parameters(&self, other: &ServiceInstance) -> bool {
        self.org_id == other.org_id
            && self.space_id == other.space_id
            && self.default_policy == other.default_policy
    }
}

/// A binding of one application to a service instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceBinding {
    pub binding_id: String,
    pub instance_id: String,
    pub app_id: String,
    pub custom_metrics_strategy: String,
}

/// A policy attached to an application, keyed by app id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppPolicy {
    pub app_id: String,
    pub policy: ScalingPolicy,
    pub guid: String,
}
