//! Projections that build new values out of an execution document.

use serde_json::{Map, Value};

use super::document::ExecutionContext;
use super::path::JsonPath;
use crate::errors::FlowError;

/// A declarative projection rendered against an [`ExecutionContext`].
///
/// Templates are how a step declares what it reads: child inputs, call
/// parameters, map item selectors and result selectors are all templates.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueTemplate {
    /// A constant.
    Literal(Value),
    /// A required path; absence is a [`FlowError::PathNotFound`].
    Path(JsonPath),
    /// An optional path; the entry is omitted from its parent when absent.
    OptionalPath(JsonPath),
    /// String interpolation: each `{}` in `pattern` takes the next argument.
    Format {
        /// Pattern with `{}` placeholders.
        pattern: String,
        /// Paths supplying the arguments, in order.
        args: Vec<JsonPath>,
    },
    /// The first path that resolves; omitted when none does.
    FirstOf(Vec<JsonPath>),
    /// Collects `field` from every element of the array at `items` that has it.
    Pluck {
        /// Path to an array.
        items: JsonPath,
        /// Field to collect.
        field: String,
    },
    /// The current map item.
    MapItem,
    /// An object whose entries are templates.
    Object(Vec<(String, ValueTemplate)>),
    /// An array whose elements are templates.
    Array(Vec<ValueTemplate>),
}

impl ValueTemplate {
    /// A constant value.
    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// A required dotted path.
    #[must_use]
    pub fn path(dotted: &str) -> Self {
        Self::Path(JsonPath::fields(dotted))
    }

    /// An optional dotted path.
    #[must_use]
    pub fn optional(dotted: &str) -> Self {
        Self::OptionalPath(JsonPath::fields(dotted))
    }

    /// A format expression over dotted paths.
    #[must_use]
    pub fn format(pattern: impl Into<String>, args: &[&str]) -> Self {
        Self::Format {
            pattern: pattern.into(),
            args: args.iter().map(|a| JsonPath::fields(a)).collect(),
        }
    }

    /// The first of several dotted paths that resolves.
    #[must_use]
    pub fn first_of(paths: &[&str]) -> Self {
        Self::FirstOf(paths.iter().map(|p| JsonPath::fields(p)).collect())
    }

    /// Builds an object template.
    #[must_use]
    pub fn object<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, ValueTemplate)>,
        K: Into<String>,
    {
        Self::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Adds an entry to an object template. Non-object templates are returned unchanged.
    #[must_use]
    pub fn with_entry(mut self, key: impl Into<String>, value: ValueTemplate) -> Self {
        if let Self::Object(ref mut entries) = self {
            entries.push((key.into(), value));
        }
        self
    }

    /// Renders the template, yielding `Value::Null` when the whole template is omitted.
    pub fn render(&self, ctx: &ExecutionContext) -> Result<Value, FlowError> {
        Ok(self.render_entry(ctx, None)?.unwrap_or(Value::Null))
    }

    /// Renders the template for one map item.
    pub fn render_with_item(
        &self,
        ctx: &ExecutionContext,
        item: &Value,
    ) -> Result<Value, FlowError> {
        Ok(self.render_entry(ctx, Some(item))?.unwrap_or(Value::Null))
    }

    fn render_entry(
        &self,
        ctx: &ExecutionContext,
        item: Option<&Value>,
    ) -> Result<Option<Value>, FlowError> {
        match self {
            Self::Literal(value) => Ok(Some(value.clone())),
            Self::Path(path) => ctx.get(path).cloned().map(Some),
            Self::OptionalPath(path) => Ok(ctx.lookup(path).cloned()),
            Self::Format { pattern, args } => {
                format_pattern(ctx, pattern, args).map(|s| Some(Value::String(s)))
            }
            Self::FirstOf(paths) => Ok(paths.iter().find_map(|p| ctx.lookup(p)).cloned()),
            Self::Pluck { items, field } => {
                let collected = ctx
                    .lookup(items)
                    .and_then(Value::as_array)
                    .map(|entries| {
                        entries
                            .iter()
                            .filter_map(|e| e.get(field.as_str()).cloned())
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();
                Ok(Some(Value::Array(collected)))
            }
            Self::MapItem => item
                .cloned()
                .map(Some)
                .ok_or_else(|| {
                    FlowError::InvalidInput("map item referenced outside a map".to_string())
                }),
            Self::Object(entries) => {
                let mut map = Map::new();
                for (key, template) in entries {
                    if let Some(value) = template.render_entry(ctx, item)? {
                        map.insert(key.clone(), value);
                    }
                }
                Ok(Some(Value::Object(map)))
            }
            Self::Array(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for template in elements {
                    if let Some(value) = template.render_entry(ctx, item)? {
                        values.push(value);
                    }
                }
                Ok(Some(Value::Array(values)))
            }
        }
    }

    /// Paths this template reads.
    #[must_use]
    pub fn reads(&self) -> Vec<&JsonPath> {
        match self {
            Self::Literal(_) | Self::MapItem => Vec::new(),
            Self::Path(p) | Self::OptionalPath(p) | Self::Pluck { items: p, .. } => vec![p],
            Self::Format { args, .. } => args.iter().collect(),
            Self::FirstOf(paths) => paths.iter().collect(),
            Self::Object(entries) => entries.iter().flat_map(|(_, t)| t.reads()).collect(),
            Self::Array(elements) => elements.iter().flat_map(ValueTemplate::reads).collect(),
        }
    }
}

fn format_pattern(
    ctx: &ExecutionContext,
    pattern: &str,
    args: &[JsonPath],
) -> Result<String, FlowError> {
    let pieces: Vec<&str> = pattern.split("{}").collect();
    if pieces.len() != args.len() + 1 {
        return Err(FlowError::InvalidInput(format!(
            "format pattern '{pattern}' expects {} arguments, got {}",
            pieces.len() - 1,
            args.len()
        )));
    }

    let mut out = String::from(pieces[0]);
    for (arg, piece) in args.iter().zip(&pieces[1..]) {
        match ctx.get(arg)? {
            Value::String(s) => out.push_str(s),
            other => out.push_str(&other.to_string()),
        }
        out.push_str(piece);
    }
    Ok(out)
}
