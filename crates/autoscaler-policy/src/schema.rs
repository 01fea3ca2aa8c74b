//! Structural checks over a policy document.
//!
//! Runs on the raw JSON value before decoding, so type errors are reported
//! per field with the path where they occur rather than as a single decode
//! failure.

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ValidationError;

const METRIC_TYPE_PATTERN: &str = "^[a-zA-Z0-9_]+$";
const ADJUSTMENT_PATTERN: &str = "^[-+][1-9]+[0-9]*%?$";
const TIME_PATTERN: &str = "^(2[0-3]|1[0-9]|0[0-9]):([0-5][0-9])$";
const DATE_PATTERN: &str = "^2[0-9]{3}-(0[1-9]|1[0-2])-(0[1-9]|[1-2][0-9]|3[0-1])$";
const DATE_TIME_PATTERN: &str = "^2[0-9]{3}-(0[1-9]|1[0-2])-(0[1-9]|[1-2][0-9]|3[0-1])T(2[0-3]|1[0-9]|0[0-9]):([0-5][0-9])$";

const OPERATORS: &[&str] = &["<", ">", "<=", ">="];
const CREDENTIAL_TYPES: &[&str] = &["binding-secret", "x509"];
const ALLOW_FROM: &[&str] = &["bound_app"];

const METRIC_TYPE_MAX_LEN: usize = 100;
const MIN_WINDOW_SECS: i64 = 60;
const MAX_WINDOW_SECS: i64 = 3600;

/// Compiled field patterns, built once per validator.
#[derive(Debug, Clone)]
pub struct Patterns {
    metric_type: Regex,
    adjustment: Regex,
    time: Regex,
    date: Regex,
    date_time: Regex,
}

impl Patterns {
    pub fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            metric_type: Regex::new(METRIC_TYPE_PATTERN)?,
            adjustment: Regex::new(ADJUSTMENT_PATTERN)?,
            time: Regex::new(TIME_PATTERN)?,
            date: Regex::new(DATE_PATTERN)?,
            date_time: Regex::new(DATE_TIME_PATTERN)?,
        })
    }
}

/// Check `doc` against the policy document structure. An empty result means
/// the document can be decoded into a `ScalingPolicy`.
pub fn check(doc: &Value, patterns: &Patterns) -> Vec<ValidationError> {
    let mut checker = SchemaChecker {
        patterns,
        errors: Vec::new(),
    };
    checker.policy(doc);
    checker.errors
}

/// JSON type name as reported in type mismatch errors.
fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn child(ctx: &str, name: impl std::fmt::Display) -> String {
    format!("{ctx}.{name}")
}

/// `(root).a.b` becomes `a.b`, the form used inside enum messages.
fn field_path(ctx: &str) -> &str {
    ctx.strip_prefix("(root).").unwrap_or(ctx)
}

struct SchemaChecker<'p> {
    patterns: &'p Patterns,
    errors: Vec<ValidationError>,
}

impl SchemaChecker<'_> {
    fn push(&mut self, ctx: &str, description: impl Into<String>) {
        self.errors.push(ValidationError::new(ctx, description));
    }

    fn type_mismatch(&mut self, ctx: &str, expected: &str, given: &Value) {
        self.push(
            ctx,
            format!("Invalid type. Expected: {expected}, given: {}", type_name(given)),
        );
    }

    fn object<'a>(&mut self, ctx: &str, value: &'a Value) -> Option<&'a Map<String, Value>> {
        match value {
            Value::Object(map) => Some(map),
            other => {
                self.type_mismatch(ctx, "object", other);
                None
            }
        }
    }

    fn array<'a>(&mut self, ctx: &str, value: &'a Value) -> Option<&'a Vec<Value>> {
        match value {
            Value::Array(items) => Some(items),
            other => {
                self.type_mismatch(ctx, "array", other);
                None
            }
        }
    }

    fn require(&mut self, ctx: &str, map: &Map<String, Value>, fields: &[&str]) {
        for field in fields {
            if !map.contains_key(*field) {
                self.push(ctx, format!("{field} is required"));
            }
        }
    }

    fn integer(&mut self, ctx: &str, value: &Value, min: Option<i64>, max: Option<i64>) {
        let Some(n) = value.as_i64() else {
            if value.is_u64() {
                let max = max.unwrap_or(i64::MAX);
                self.push(ctx, format!("Must be less than or equal to {max}"));
            } else {
                self.type_mismatch(ctx, "integer", value);
            }
            return;
        };
        if let Some(min) = min
            && n < min
        {
            self.push(ctx, format!("Must be greater than or equal to {min}"));
        }
        if let Some(max) = max
            && n > max
        {
            self.push(ctx, format!("Must be less than or equal to {max}"));
        }
    }

    fn pattern(
        &mut self,
        ctx: &str,
        value: &Value,
        pick: fn(&Patterns) -> &Regex,
        pattern: &str,
    ) {
        match value.as_str() {
            Some(s) if pick(self.patterns).is_match(s) => {}
            Some(_) => self.push(ctx, format!("Does not match pattern '{pattern}'")),
            None => self.type_mismatch(ctx, "string", value),
        }
    }

    fn one_of(&mut self, ctx: &str, value: &Value, allowed: &[&str]) {
        if value.as_str().is_some_and(|s| allowed.contains(&s)) {
            return;
        }
        let listed = allowed
            .iter()
            .map(|a| format!("{a:?}"))
            .collect::<Vec<_>>()
            .join(", ");
        self.push(
            ctx,
            format!("{} must be one of the following: {listed}", field_path(ctx)),
        );
    }

    // ── Document ───────────────────────────────────────────────────

    fn policy(&mut self, doc: &Value) {
        let root = "(root)";
        let Some(map) = self.object(root, doc) else {
            return;
        };

        self.require(root, map, &["instance_min_count", "instance_max_count"]);
        for name in ["instance_min_count", "instance_max_count"] {
            if let Some(v) = map.get(name) {
                self.integer(&child(root, name), v, Some(1), None);
            }
        }

        if !map.contains_key("scaling_rules") && !map.contains_key("schedules") {
            self.push(root, "Must validate at least one schema (anyOf)");
            self.push(root, "scaling_rules is required");
        }

        if let Some(rules) = map.get("scaling_rules") {
            let ctx = child(root, "scaling_rules");
            if let Some(items) = self.array(&ctx, rules) {
                for (i, rule) in items.iter().enumerate() {
                    self.scaling_rule(&child(&ctx, i), rule);
                }
            }
        }

        if let Some(schedules) = map.get("schedules") {
            self.schedules(&child(root, "schedules"), schedules);
        }

        if let Some(kind) = map.get("credential-type") {
            self.one_of(&child(root, "credential-type"), kind, CREDENTIAL_TYPES);
        }

        if let Some(configuration) = map.get("configuration") {
            self.configuration(&child(root, "configuration"), configuration);
        }
    }

    fn scaling_rule(&mut self, ctx: &str, rule: &Value) {
        let Some(map) = self.object(ctx, rule) else {
            return;
        };
        self.require(ctx, map, &["metric_type", "threshold", "operator", "adjustment"]);

        if let Some(v) = map.get("metric_type") {
            let field_ctx = child(ctx, "metric_type");
            if let Some(s) = v.as_str()
                && s.chars().count() > METRIC_TYPE_MAX_LEN
            {
                self.push(
                    &field_ctx,
                    format!("String length must be less than or equal to {METRIC_TYPE_MAX_LEN}"),
                );
            }
            self.pattern(&field_ctx, v, |p| &p.metric_type, METRIC_TYPE_PATTERN);
        }
        if let Some(v) = map.get("threshold") {
            self.integer(&child(ctx, "threshold"), v, None, None);
        }
        if let Some(v) = map.get("operator") {
            self.one_of(&child(ctx, "operator"), v, OPERATORS);
        }
        for name in ["breach_duration_secs", "cool_down_secs"] {
            if let Some(v) = map.get(name) {
                self.integer(
                    &child(ctx, name),
                    v,
                    Some(MIN_WINDOW_SECS),
                    Some(MAX_WINDOW_SECS),
                );
            }
        }
        if let Some(v) = map.get("adjustment") {
            self.pattern(&child(ctx, "adjustment"), v, |p| &p.adjustment, ADJUSTMENT_PATTERN);
        }
    }

    fn schedules(&mut self, ctx: &str, schedules: &Value) {
        let Some(map) = self.object(ctx, schedules) else {
            return;
        };
        self.require(ctx, map, &["timezone"]);
        if let Some(tz) = map.get("timezone") {
            let tz_ctx = child(ctx, "timezone");
            match tz.as_str() {
                Some(name) if name.parse::<chrono_tz::Tz>().is_ok() => {}
                Some(_) => self.push(
                    &tz_ctx,
                    format!("{} must be a valid IANA timezone name", field_path(&tz_ctx)),
                ),
                None => self.type_mismatch(&tz_ctx, "string", tz),
            }
        }

        if !map.contains_key("recurring_schedule") && !map.contains_key("specific_date") {
            self.push(ctx, "Must validate at least one schema (anyOf)");
            self.push(ctx, "recurring_schedule is required");
        }

        if let Some(recurring) = map.get("recurring_schedule") {
            let list_ctx = child(ctx, "recurring_schedule");
            if let Some(items) = self.array(&list_ctx, recurring) {
                for (i, entry) in items.iter().enumerate() {
                    self.recurring(&child(&list_ctx, i), entry);
                }
            }
        }
        if let Some(specific) = map.get("specific_date") {
            let list_ctx = child(ctx, "specific_date");
            if let Some(items) = self.array(&list_ctx, specific) {
                for (i, entry) in items.iter().enumerate() {
                    self.specific_date(&child(&list_ctx, i), entry);
                }
            }
        }
    }

    fn instance_counts(&mut self, ctx: &str, map: &Map<String, Value>) {
        if let Some(v) = map.get("instance_min_count") {
            self.integer(&child(ctx, "instance_min_count"), v, Some(0), None);
        }
        if let Some(v) = map.get("instance_max_count") {
            self.integer(&child(ctx, "instance_max_count"), v, Some(1), None);
        }
        if let Some(v) = map.get("initial_min_instance_count") {
            self.integer(&child(ctx, "initial_min_instance_count"), v, Some(0), None);
        }
    }

    fn recurring(&mut self, ctx: &str, entry: &Value) {
        let Some(map) = self.object(ctx, entry) else {
            return;
        };
        self.require(
            ctx,
            map,
            &["start_time", "end_time", "instance_min_count", "instance_max_count"],
        );
        for name in ["start_time", "end_time"] {
            if let Some(v) = map.get(name) {
                self.pattern(&child(ctx, name), v, |p| &p.time, TIME_PATTERN);
            }
        }
        for name in ["start_date", "end_date"] {
            if let Some(v) = map.get(name) {
                self.pattern(&child(ctx, name), v, |p| &p.date, DATE_PATTERN);
            }
        }

        match (map.get("days_of_week"), map.get("days_of_month")) {
            (Some(_), Some(_)) => {
                self.push(ctx, "Must validate one and only one schema (oneOf)");
            }
            (None, None) => {
                self.push(ctx, "Must validate one and only one schema (oneOf)");
                self.push(ctx, "days_of_week is required");
            }
            _ => {}
        }
        if let Some(days) = map.get("days_of_week") {
            self.day_list(&child(ctx, "days_of_week"), days, 7);
        }
        if let Some(days) = map.get("days_of_month") {
            self.day_list(&child(ctx, "days_of_month"), days, 31);
        }

        self.instance_counts(ctx, map);
    }

    fn day_list(&mut self, ctx: &str, days: &Value, max: i64) {
        let Some(items) = self.array(ctx, days) else {
            return;
        };
        if items.is_empty() {
            self.push(ctx, "Array must have at least 1 items");
        }
        for (i, day) in items.iter().enumerate() {
            self.integer(&child(ctx, i), day, Some(1), Some(max));
        }
        for (i, a) in items.iter().enumerate() {
            if let Some(j) = items[i + 1..].iter().position(|b| b == a) {
                self.push(ctx, format!("array items[{i},{}] must be unique", i + 1 + j));
                break;
            }
        }
    }

    fn specific_date(&mut self, ctx: &str, entry: &Value) {
        let Some(map) = self.object(ctx, entry) else {
            return;
        };
        self.require(
            ctx,
            map,
            &[
                "start_date_time",
                "end_date_time",
                "instance_min_count",
                "instance_max_count",
            ],
        );
        for name in ["start_date_time", "end_date_time"] {
            if let Some(v) = map.get(name) {
                self.pattern(&child(ctx, name), v, |p| &p.date_time, DATE_TIME_PATTERN);
            }
        }
        self.instance_counts(ctx, map);
    }

    fn configuration(&mut self, ctx: &str, configuration: &Value) {
        let Some(map) = self.object(ctx, configuration) else {
            return;
        };
        self.require(ctx, map, &["custom_metrics"]);
        let Some(custom) = map.get("custom_metrics") else {
            return;
        };
        let custom_ctx = child(ctx, "custom_metrics");
        let Some(custom) = self.object(&custom_ctx, custom) else {
            return;
        };
        self.require(&custom_ctx, custom, &["metric_submission_strategy"]);
        let Some(strategy) = custom.get("metric_submission_strategy") else {
            return;
        };
        let strategy_ctx = child(&custom_ctx, "metric_submission_strategy");
        let Some(strategy) = self.object(&strategy_ctx, strategy) else {
            return;
        };
        self.require(&strategy_ctx, strategy, &["allow_from"]);
        if let Some(allow_from) = strategy.get("allow_from") {
            self.one_of(&child(&strategy_ctx, "allow_from"), allow_from, ALLOW_FROM);
        }
    }
}
