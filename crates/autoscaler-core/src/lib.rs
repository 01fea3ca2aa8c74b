//! autoscaler-core — domain types, broker configuration, and the service
//! catalog shared by every autoscaler broker crate.

pub mod catalog;
pub mod config;
pub mod types;

pub use catalog::{Catalog, Service, ServicePlan};
pub use config::{BrokerConfig, ConfigError, ConfigResult, PlanCheckConfig, PlanDefinition};
pub use types::*;
