//! PolicyValidator — structural and semantic validation of scaling policies.
//!
//! Validation runs in three stages:
//!
//! 1. structural checks on the raw JSON ([`crate::schema`]); any failure
//!    ends validation with exactly those errors
//! 2. decoding into [`ScalingPolicy`]
//! 3. semantic checks (bounds, thresholds, dates, schedule overlaps), all
//!    accumulated into one list
//!
//! A valid policy is returned together with its normalized JSON text, which
//! drops unknown top-level fields.

use autoscaler_core::config::{ScalingRulesConfig, ThresholdRange};
use autoscaler_core::{RecurringSchedule, ScalingPolicy, ScalingRule, ScalingSchedules};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde_json::Value;
use tracing::debug;

use crate::error::{ValidationError, ValidationErrors};
use crate::schema::{self, Patterns};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";
/// Open-ended recurring schedules are compared against these bounds.
const EARLIEST_DATE: &str = "0000-01-01";
const LATEST_DATE: &str = "9999-01-01";

/// A policy that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPolicy {
    pub policy: ScalingPolicy,
    pub normalized: String,
}

#[derive(Debug, Clone)]
pub struct PolicyValidator {
    thresholds: ScalingRulesConfig,
    patterns: Patterns,
}

impl PolicyValidator {
    pub fn new(thresholds: ScalingRulesConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            thresholds,
            patterns: Patterns::compile()?,
        })
    }

    /// Validate `text` against the current wall clock.
    pub fn validate(&self, text: &str) -> Result<ValidatedPolicy, ValidationErrors> {
        self.validate_at(text, Utc::now())
    }

    /// Validate `text`, treating `now` as the current instant.
    pub fn validate_at(
        &self,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<ValidatedPolicy, ValidationErrors> {
        let doc: Value =
            serde_json::from_str(text).map_err(|e| ValidationErrors::root(e.to_string()))?;

        let structural = schema::check(&doc, &self.patterns);
        if !structural.is_empty() {
            debug!(count = structural.len(), "policy failed structural checks");
            return Err(ValidationErrors(structural));
        }

        let policy: ScalingPolicy =
            serde_json::from_value(doc).map_err(|e| ValidationErrors::root(e.to_string()))?;

        let mut semantic = Semantic {
            thresholds: &self.thresholds,
            errors: Vec::new(),
        };
        semantic.policy(&policy, now);
        if !semantic.errors.is_empty() {
            debug!(count = semantic.errors.len(), "policy failed semantic checks");
            return Err(ValidationErrors(semantic.errors));
        }

        let normalized = policy
            .to_json()
            .map_err(|e| ValidationErrors::root(e.to_string()))?;
        Ok(ValidatedPolicy { policy, normalized })
    }
}

struct Semantic<'a> {
    thresholds: &'a ScalingRulesConfig,
    errors: Vec<ValidationError>,
}

fn intersects(a: &[i64], b: &[i64]) -> bool {
    a.iter().any(|d| b.contains(d))
}

fn date_bounds(schedule: &RecurringSchedule) -> (&str, &str) {
    (
        schedule.start_date.as_deref().unwrap_or(EARLIEST_DATE),
        schedule.end_date.as_deref().unwrap_or(LATEST_DATE),
    )
}

fn recurring_overlap(a: &RecurringSchedule, b: &RecurringSchedule) -> bool {
    let weekly = !a.days_of_week.is_empty()
        && !b.days_of_week.is_empty()
        && intersects(&a.days_of_week, &b.days_of_week);
    let monthly = !a.days_of_month.is_empty()
        && !b.days_of_month.is_empty()
        && intersects(&a.days_of_month, &b.days_of_month);
    if !weekly && !monthly {
        return false;
    }
    // HH:MM and YYYY-MM-DD compare correctly as strings.
    let times = b.end_time >= a.start_time && a.end_time >= b.start_time;
    let (a_start, a_end) = date_bounds(a);
    let (b_start, b_end) = date_bounds(b);
    times && b_end >= a_start && a_end >= b_start
}

impl Semantic<'_> {
    fn push(&mut self, ctx: String, description: String) {
        self.errors.push(ValidationError::new(ctx, description));
    }

    fn policy(&mut self, policy: &ScalingPolicy, now: DateTime<Utc>) {
        if policy.instance_min_count > policy.instance_max_count {
            self.push(
                "(root).instance_min_count".into(),
                format!(
                    "instance_min_count {} is higher than instance_max_count {}",
                    policy.instance_min_count, policy.instance_max_count
                ),
            );
        }

        for (i, rule) in policy.scaling_rules.iter().enumerate() {
            if let Some(message) = self.threshold_violation(i, rule) {
                self.push(format!("(root).scaling_rules.{i}"), message);
            }
        }

        if let Some(schedules) = &policy.schedules {
            self.schedules(schedules, now);
        }
    }

    fn threshold_violation(&self, i: usize, rule: &ScalingRule) -> Option<String> {
        let t = rule.threshold;
        let metric = rule.metric_type.as_str();
        let at_least = |lower: i64| {
            format!(
                "scaling_rules[{i}].threshold for metric_type {metric} should be greater than or equal {lower}"
            )
        };
        let between = |range: ThresholdRange| {
            format!(
                "scaling_rules[{i}].threshold for metric_type {metric} should be greater than or equal {} and less than or equal to {}",
                range.lower_threshold, range.upper_threshold
            )
        };
        let outside = |range: ThresholdRange| t < range.lower_threshold || t > range.upper_threshold;

        match metric {
            "memoryused" | "responsetime" | "throughput" => (t < 1).then(|| at_least(1)),
            "memoryutil" => {
                let range = ThresholdRange::new(1, 100);
                outside(range).then(|| between(range))
            }
            // cpu is bounded above exclusively.
            "cpu" => {
                let range = self.thresholds.cpu;
                (t < range.lower_threshold || t >= range.upper_threshold).then(|| {
                    format!(
                        "scaling_rules[{i}].threshold for metric_type {metric} should be greater than or equal {} and less than {}",
                        range.lower_threshold, range.upper_threshold
                    )
                })
            }
            "cpuutil" => outside(self.thresholds.cpuutil).then(|| between(self.thresholds.cpuutil)),
            "diskutil" => {
                outside(self.thresholds.diskutil).then(|| between(self.thresholds.diskutil))
            }
            "disk" => outside(self.thresholds.disk).then(|| between(self.thresholds.disk)),
            _ => None,
        }
    }

    fn schedules(&mut self, schedules: &ScalingSchedules, now: DateTime<Utc>) {
        let Ok(tz) = schedules.timezone.parse::<Tz>() else {
            self.push(
                "(root).schedules.timezone".into(),
                format!("unknown timezone {:?}", schedules.timezone),
            );
            return;
        };
        let local_now = now.with_timezone(&tz);

        for (i, entry) in schedules.recurring_schedule.iter().enumerate() {
            self.recurring(i, entry, local_now.date_naive());
        }
        self.recurring_overlaps(&schedules.recurring_schedule);

        let mut windows = Vec::with_capacity(schedules.specific_date.len());
        for (i, entry) in schedules.specific_date.iter().enumerate() {
            let ctx = format!("(root).schedules.specific_date.{i}");
            self.counts(
                &ctx,
                &format!("specific_date[{i}]"),
                entry.instance_min_count,
                entry.instance_max_count,
                entry.initial_min_instance_count,
            );

            let start = NaiveDateTime::parse_from_str(&entry.start_date_time, DATE_TIME_FORMAT);
            let end = NaiveDateTime::parse_from_str(&entry.end_date_time, DATE_TIME_FORMAT);
            let (Ok(start), Ok(end)) = (start, end) else {
                self.push(
                    ctx,
                    format!("specific_date[{i}] does not contain valid date times"),
                );
                windows.push(None);
                continue;
            };
            if start <= local_now.naive_local() {
                self.push(
                    ctx.clone(),
                    format!("specific_date[{i}].start_date_time is before current date time"),
                );
            }
            if end <= start {
                self.push(
                    ctx,
                    format!(
                        "specific_date[{i}].start_date_time is after specific_date[{i}].end_date_time"
                    ),
                );
            }
            windows.push(Some((start, end)));
        }
        self.specific_date_overlaps(schedules, &windows);
    }

    /// Bound checks shared by both schedule kinds. `ctx` is the entry context
    /// and `label` the entry name used in messages.
    fn counts(&mut self, ctx: &str, label: &str, min: i64, max: i64, initial: Option<i64>) {
        if min > max {
            self.push(
                format!("{ctx}.instance_min_count"),
                format!(
                    "{label}.instance_min_count {min} is higher than {label}.instance_max_count {max}"
                ),
            );
        }
        let Some(initial) = initial.filter(|v| *v != 0) else {
            return;
        };
        if initial < min {
            self.push(
                format!("{ctx}.initial_min_instance_count"),
                format!(
                    "{label}.initial_min_instance_count {initial} is smaller than {label}.instance_min_count {min}"
                ),
            );
        }
        if initial > max {
            self.push(
                format!("{ctx}.initial_min_instance_count"),
                format!(
                    "{label}.initial_min_instance_count {initial} is greater than {label}.instance_max_count {max}"
                ),
            );
        }
    }

    fn recurring(&mut self, i: usize, entry: &RecurringSchedule, today: NaiveDate) {
        let ctx = format!("(root).schedules.recurring_schedule.{i}");
        let label = format!("recurring_schedule[{i}]");
        self.counts(
            &ctx,
            &label,
            entry.instance_min_count,
            entry.instance_max_count,
            entry.initial_min_instance_count,
        );

        if entry.start_time >= entry.end_time {
            self.push(
                ctx.clone(),
                format!("{label}.start_time is same or after {label}.end_time"),
            );
        }

        let start = self.date(&ctx, &label, "start_date", entry.start_date.as_deref());
        let end = self.date(&ctx, &label, "end_date", entry.end_date.as_deref());
        if let Some(start) = start
            && start < today
        {
            self.push(
                ctx.clone(),
                format!("{label}.start_date is before {label}.current_date"),
            );
        }
        if let Some(end) = end
            && end < today
        {
            self.push(
                ctx.clone(),
                format!("{label}.end_date is before {label}.current_date"),
            );
        }
        if let (Some(start), Some(end)) = (start, end)
            && end < start
        {
            self.push(ctx, format!("{label}.start_date is after {label}.end_date"));
        }
    }

    fn date(&mut self, ctx: &str, label: &str, field: &str, value: Option<&str>) -> Option<NaiveDate> {
        let value = value?;
        match NaiveDate::parse_from_str(value, DATE_FORMAT) {
            Ok(date) => Some(date),
            Err(_) => {
                self.push(ctx.to_string(), format!("{label}.{field} is not a valid date"));
                None
            }
        }
    }

    fn recurring_overlaps(&mut self, entries: &[RecurringSchedule]) {
        for b in 0..entries.len() {
            for a in b + 1..entries.len() {
                if recurring_overlap(&entries[a], &entries[b]) {
                    self.push(
                        format!("(root).schedules.recurring_schedule.{b}"),
                        format!(
                            "recurring_schedule[{b}] and recurring_schedule[{a}] are overlapping"
                        ),
                    );
                }
            }
        }
    }

    fn specific_date_overlaps(
        &mut self,
        schedules: &ScalingSchedules,
        windows: &[Option<(NaiveDateTime, NaiveDateTime)>],
    ) {
        for b in 0..windows.len() {
            for a in b + 1..windows.len() {
                let (Some((b_start, b_end)), Some((a_start, a_end))) = (windows[b], windows[a])
                else {
                    continue;
                };
                // Touching windows do not overlap.
                if a_end > b_start && b_end > a_start {
                    let first = &schedules.specific_date[b];
                    let second = &schedules.specific_date[a];
                    self.push(
                        format!("(root).schedules.specific_date.{b}"),
                        format!(
                            "specific_date[{b}]:{{start_date_time: {}, end_date_time: {}}} and specific_date[{a}]:{{start_date_time: {}, end_date_time: {}}} are overlapping",
                            first.start_date_time,
                            first.end_date_time,
                            second.start_date_time,
                            second.end_date_time
                        ),
                    );
                }
            }
        }
    }
}
