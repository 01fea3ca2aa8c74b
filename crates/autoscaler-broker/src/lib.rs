//! autoscaler-broker — the service broker behind the `/v2` API.
//!
//! [`Broker`] implements provision, update, deprovision, bind and unbind on
//! top of the store contracts from `autoscaler-state`, the policy checks
//! from `autoscaler-policy` and a [`SchedulerClient`](autoscaler_scheduler::SchedulerClient).
//! All operations are synchronous; the asynchronous-operation queries always
//! fail with [`BrokerError::Unsupported`].

pub mod broker;
pub mod error;
pub mod models;
pub mod saga;

pub use broker::{Broker, BrokerSettings, Stores};
pub use error::{BrokerError, BrokerResult};
pub use models::{
    BindDetails, BindResult, BindResource, BindingCredentials, CustomMetricsCredentials,
    PreviousValues, ProvisionDetails, ProvisionResult, UpdateDetails,
};
pub use saga::Saga;
