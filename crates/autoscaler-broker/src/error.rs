//! Broker failure taxonomy.
//!
//! Every lifecycle operation fails with a [`BrokerError`]. Each variant
//! carries its HTTP status and a stable machine-readable code; downstream
//! failures only ever expose a generic message, with the cause logged where
//! it happened.

use autoscaler_policy::ValidationErrors;
use thiserror::Error;

pub type BrokerResult<T> = Result<T, BrokerError>;

#[derive(Debug, Error)]
pub enum BrokerError {
    // ── Invalid caller input ───────────────────────────────────────
    #[error("missing {0}")]
    MissingField(&'static str),

    #[error("The format of the parameters is not valid JSON")]
    RawParamsInvalid,

    #[error("unknown service with GUID {0:?}")]
    UnknownService(String),

    #[error("unknown service plan with GUID {0:?}")]
    UnknownPlan(String),

    #[error("invalid policy provided: {}", .0.to_json())]
    InvalidPolicy(ValidationErrors),

    #[error("error: policy did not adhere to plan: {0}")]
    PlanViolation(String),

    #[error("invalid credential type provided: allowed values are [binding-secret, x509]")]
    InvalidCredentialType,

    #[error("invalid custom metrics strategy provided: allowed values are [bound_app, same_app]")]
    InvalidMetricsStrategy,

    #[error("error: service must be bound to an application - service key creation is not supported")]
    RequiresApp,

    #[error("The requested plan migration cannot be performed")]
    PlanChangeNotSupported,

    #[error("{0}")]
    Unsupported(&'static str),

    // ── State conflicts ────────────────────────────────────────────
    #[error("instance already exists")]
    InstanceAlreadyExists,

    /// The instance is unknown to a read or update.
    #[error("instance does not exist")]
    InstanceNotFound,

    /// The instance is already deleted.
    #[error("instance does not exist")]
    InstanceGone,

    #[error("binding does not exist")]
    BindingGone,

    #[error(
        "error: an autoscaler service instance is already bound to the application and multiple bindings are not supported"
    )]
    BindingAlreadyExists,

    // ── Downstream failures ────────────────────────────────────────
    #[error("{message}")]
    Internal {
        message: &'static str,
        code: &'static str,
    },
}

impl BrokerError {
    pub(crate) fn internal(message: &'static str, code: &'static str) -> Self {
        BrokerError::Internal { message, code }
    }

    pub fn status(&self) -> u16 {
        match self {
            BrokerError::MissingField(_)
            | BrokerError::UnknownService(_)
            | BrokerError::UnknownPlan(_)
            | BrokerError::InvalidPolicy(_)
            | BrokerError::PlanViolation(_)
            | BrokerError::InvalidCredentialType
            | BrokerError::InvalidMetricsStrategy
            | BrokerError::Unsupported(_) => 400,
            BrokerError::InstanceNotFound => 404,
            BrokerError::InstanceAlreadyExists | BrokerError::BindingAlreadyExists => 409,
            BrokerError::InstanceGone | BrokerError::BindingGone => 410,
            BrokerError::RawParamsInvalid
            | BrokerError::RequiresApp
            | BrokerError::PlanChangeNotSupported => 422,
            BrokerError::Internal { .. } => 500,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            BrokerError::MissingField(_) => "missing-field",
            BrokerError::RawParamsInvalid => "parsing-raw-params",
            BrokerError::UnknownService(_) => "unknown-service",
            BrokerError::UnknownPlan(_) => "unknown-plan",
            BrokerError::InvalidPolicy(_) => "invalid-policy",
            BrokerError::PlanViolation(_) => "plan-violation",
            BrokerError::InvalidCredentialType => "invalid-credential-type",
            BrokerError::InvalidMetricsStrategy => "invalid-metrics-strategy",
            BrokerError::RequiresApp => "RequiresApp",
            BrokerError::PlanChangeNotSupported => "PlanChangeNotSupported",
            BrokerError::Unsupported(_) => "unsupported",
            BrokerError::InstanceAlreadyExists => "instance-already-exists",
            BrokerError::InstanceNotFound | BrokerError::InstanceGone => "instance-missing",
            BrokerError::BindingGone => "binding-missing",
            BrokerError::BindingAlreadyExists => "binding-already-exists",
            BrokerError::Internal { code, .. } => code,
        }
    }

    /// Caller-visible description of the failure.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Field-level validation detail, when the failure carries any.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            BrokerError::InvalidPolicy(errors) => Some(errors),
            _ => None,
        }
    }
}
