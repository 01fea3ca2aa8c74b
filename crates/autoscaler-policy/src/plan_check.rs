//! PlanChecker — enforces per-plan limits on scaling policies.
//!
//! Without plan configuration every policy adheres and every plan can be
//! changed.

use autoscaler_core::{PlanCheckConfig, PlanDefinition, ScalingPolicy};

use crate::error::{PlanCheckError, PlanCheckResult};

/// Result of checking a policy against its plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanVerdict {
    Adheres,
    /// The policy exceeds a plan limit; the message names the limit.
    Exceeds(String),
}

#[derive(Debug, Clone, Default)]
pub struct PlanChecker {
    config: Option<PlanCheckConfig>,
}

impl PlanChecker {
    pub fn new(config: Option<PlanCheckConfig>) -> Self {
        Self { config }
    }

    fn plan(&self, plan_id: &str) -> PlanCheckResult<Option<&PlanDefinition>> {
        let Some(config) = &self.config else {
            return Ok(None);
        };
        config
            .plan_definitions
            .get(plan_id)
            .map(Some)
            .ok_or_else(|| PlanCheckError::UnknownPlan(plan_id.to_string()))
    }

    pub fn check_plan(&self, policy: &ScalingPolicy, plan_id: &str) -> PlanCheckResult<PlanVerdict> {
        let Some(plan) = self.plan(plan_id)? else {
            return Ok(PlanVerdict::Adheres);
        };
        if !plan.plan_check_enabled {
            return Ok(PlanVerdict::Adheres);
        }

        let rules = policy.scaling_rules.len();
        if rules > plan.scaling_rules_count {
            return Ok(PlanVerdict::Exceeds(format!(
                "Too many scaling rules: Found {rules} scaling rules, but a maximum of {} scaling rules are allowed for this service plan. ",
                plan.scaling_rules_count
            )));
        }

        let schedules = policy.schedule_count();
        if schedules > plan.schedules_count {
            return Ok(PlanVerdict::Exceeds(format!(
                "Too many schedules: Found {schedules} schedules, but a maximum of {} schedules are allowed for this service plan. ",
                plan.schedules_count
            )));
        }

        Ok(PlanVerdict::Adheres)
    }

    pub fn is_plan_updatable(&self, plan_id: &str) -> PlanCheckResult<bool> {
        Ok(self.plan(plan_id)?.is_none_or(|plan| plan.plan_updateable))
    }
}
