//! autoscaler-scheduler — client for the external scheduler service.
//!
//! The broker depends only on the [`SchedulerClient`] trait;
//! [`HttpSchedulerClient`] is the production implementation.

pub mod client;
pub mod error;

pub use client::{HttpSchedulerClient, SchedulerClient};
pub use error::{SchedulerError, SchedulerResult};
