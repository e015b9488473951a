//! Predicates over the execution document.

use serde_json::Value;

use super::document::ExecutionContext;
use super::path::JsonPath;

/// A boolean test over an [`ExecutionContext`].
///
/// Comparisons are exact: no case folding, no numeric coercion of strings.
/// A comparison against an absent path is false.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// The path resolves (possibly to `null`).
    IsPresent(JsonPath),
    /// The path resolves to `null`.
    IsNull(JsonPath),
    /// The path resolves to something other than `null`.
    IsNotNull(JsonPath),
    /// The path holds exactly this string.
    StringEquals(JsonPath, String),
    /// The path holds exactly this boolean.
    BooleanEquals(JsonPath, bool),
    /// The path holds a number greater than this one.
    NumberGreaterThan(JsonPath, f64),
    /// The path holds a non-empty array.
    ArrayNotEmpty(JsonPath),
    /// All conditions hold.
    And(Vec<Condition>),
    /// At least one condition holds.
    Or(Vec<Condition>),
    /// The condition does not hold.
    Not(Box<Condition>),
}

impl Condition {
    /// `IsPresent` over a dotted path.
    #[must_use]
    pub fn is_present(dotted: &str) -> Self {
        Self::IsPresent(JsonPath::fields(dotted))
    }

    /// `StringEquals` over a dotted path.
    #[must_use]
    pub fn string_equals(dotted: &str, expected: impl Into<String>) -> Self {
        Self::StringEquals(JsonPath::fields(dotted), expected.into())
    }

    /// `BooleanEquals` over a dotted path.
    #[must_use]
    pub fn boolean_equals(dotted: &str, expected: bool) -> Self {
        Self::BooleanEquals(JsonPath::fields(dotted), expected)
    }

    /// `ArrayNotEmpty` over a dotted path.
    #[must_use]
    pub fn array_not_empty(dotted: &str) -> Self {
        Self::ArrayNotEmpty(JsonPath::fields(dotted))
    }

    /// Conjunction.
    #[must_use]
    pub fn and(conditions: Vec<Self>) -> Self {
        Self::And(conditions)
    }

    /// Disjunction.
    #[must_use]
    pub fn or(conditions: Vec<Self>) -> Self {
        Self::Or(conditions)
    }

    /// Negation.
    #[must_use]
    pub fn negate(condition: Self) -> Self {
        Self::Not(Box::new(condition))
    }

    /// Evaluates the condition.
    #[must_use]
    pub fn evaluate(&self, ctx: &ExecutionContext) -> bool {
        match self {
            Self::IsPresent(path) => ctx.is_present(path),
            Self::IsNull(path) => ctx.lookup(path).is_some_and(Value::is_null),
            Self::IsNotNull(path) => ctx.lookup(path).is_some_and(|v| !v.is_null()),
            Self::StringEquals(path, expected) => ctx
                .lookup(path)
                .and_then(Value::as_str)
                .is_some_and(|s| s == expected),
            Self::BooleanEquals(path, expected) => ctx
                .lookup(path)
                .and_then(Value::as_bool)
                .is_some_and(|b| b == *expected),
            Self::NumberGreaterThan(path, bound) => ctx
                .lookup(path)
                .and_then(Value::as_f64)
                .is_some_and(|n| n > *bound),
            Self::ArrayNotEmpty(path) => ctx
                .lookup(path)
                .and_then(Value::as_array)
                .is_some_and(|items| !items.is_empty()),
            Self::And(all) => all.iter().all(|c| c.evaluate(ctx)),
            Self::Or(any) => any.iter().any(|c| c.evaluate(ctx)),
            Self::Not(inner) => !inner.evaluate(ctx),
        }
    }

    /// Paths this condition reads.
    #[must_use]
    pub fn reads(&self) -> Vec<&JsonPath> {
        match self {
            Self::IsPresent(p)
            | Self::IsNull(p)
            | Self::IsNotNull(p)
            | Self::StringEquals(p, _)
            | Self::BooleanEquals(p, _)
            | Self::NumberGreaterThan(p, _)
            | Self::ArrayNotEmpty(p) => vec![p],
            Self::And(conditions) | Self::Or(conditions) => {
                conditions.iter().flat_map(Condition::reads).collect()
            }
            Self::Not(inner) => inner.reads(),
        }
    }
}
