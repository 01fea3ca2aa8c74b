//! autoscaler-policy — scaling policy validation and plan limits.
//!
//! ```text
//! policy JSON ──▶ schema checks ──▶ decode ──▶ semantic checks ──▶ ValidatedPolicy
//!                                                                      │
//!                                        PlanChecker::check_plan ◀─────┘
//! ```
//!
//! [`PolicyValidator`] is pure: its only inputs are the policy text, the
//! configured resource thresholds and the current instant.

pub mod error;
pub mod plan_check;
pub mod schema;
pub mod validator;

pub use error::{PlanCheckError, PlanCheckResult, ValidationError, ValidationErrors};
pub use plan_check::{PlanChecker, PlanVerdict};
pub use validator::{PolicyValidator, ValidatedPolicy};
