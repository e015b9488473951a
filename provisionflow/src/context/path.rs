//! Typed path expressions over the execution document.
//!
//! A [`JsonPath`] is a list of segments evaluated left to right. Besides
//! plain field and index descent it supports [`PathSegment::FindFirst`],
//! recursive descent with a "has field" filter, which locates the result of
//! whichever parallel or map branch produced a given field without knowing its
//! position.

use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::FlowError;

static TOKEN: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:\.\.\[\?\(@\.(?P<rfilter>[A-Za-z0-9_\-]+)\)\]",
        r"|\[\?\(@\.(?P<filter>[A-Za-z0-9_\-]+)\)\]",
        r"|\.\.(?P<descend>[A-Za-z0-9_\-]+)",
        r"|\.?(?P<field>[A-Za-z0-9_\-]+)",
        r"|\[(?P<index>\d+)\])",
    ))
});

fn token_regex() -> Result<&'static Regex, FlowError> {
    TOKEN
        .as_ref()
        .map_err(|e| FlowError::Internal(format!("path token pattern: {e}")))
}

/// One step of a path expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Descend into an object field.
    Field(String),
    /// Descend into an array element.
    Index(usize),
    /// Select the first node, depth-first in document order, that is an
    /// object containing the named field. The current node is searched too.
    FindFirst(String),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => write!(f, ".{name}"),
            Self::Index(i) => write!(f, "[{i}]"),
            Self::FindFirst(name) => write!(f, "..[?(@.{name})]"),
        }
    }
}

/// A typed path into a JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct JsonPath {
    segments: Vec<PathSegment>,
}

impl JsonPath {
    /// The document root (`$`).
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Builds a path from dot-separated field names, e.g. `"Item.schema"`.
    ///
    /// Every component is taken as a literal field name; use [`parse`](Self::parse)
    /// for indexes and filters.
    #[must_use]
    pub fn fields(dotted: &str) -> Self {
        Self {
            segments: dotted
                .split('.')
                .filter(|s| !s.is_empty() && *s != "$")
                .map(|s| PathSegment::Field(s.to_string()))
                .collect(),
        }
    }

    /// Parses a path such as `$.a.b[0]` or `$..[?(@.eventTracker)].eventTracker`.
    pub fn parse(expr: &str) -> Result<Self, FlowError> {
        let re = token_regex()?;
        let mut rest = expr.trim();
        rest = rest.strip_prefix('$').unwrap_or(rest);
        let mut segments = Vec::new();

        while !rest.is_empty() {
            let caps = re.captures(rest).ok_or_else(|| {
                FlowError::invalid_path(expr, format!("unexpected token at '{rest}'"))
            })?;

            if let Some(m) = caps.name("rfilter").or_else(|| caps.name("filter")) {
                segments.push(PathSegment::FindFirst(m.as_str().to_string()));
            } else if let Some(m) = caps.name("descend") {
                segments.push(PathSegment::FindFirst(m.as_str().to_string()));
                segments.push(PathSegment::Field(m.as_str().to_string()));
            } else if let Some(m) = caps.name("field") {
                segments.push(PathSegment::Field(m.as_str().to_string()));
            } else if let Some(m) = caps.name("index") {
                let index = m
                    .as_str()
                    .parse::<usize>()
                    .map_err(|e| FlowError::invalid_path(expr, e.to_string()))?;
                segments.push(PathSegment::Index(index));
            }

            let consumed = caps.get(0).map_or(0, |m| m.end());
            if consumed == 0 {
                return Err(FlowError::invalid_path(expr, "empty token"));
            }
            rest = &rest[consumed..];
        }

        Ok(Self { segments })
    }

    /// Appends a field segment.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.segments.push(PathSegment::Field(name.into()));
        self
    }

    /// Appends an index segment.
    #[must_use]
    pub fn index(mut self, index: usize) -> Self {
        self.segments.push(PathSegment::Index(index));
        self
    }

    /// Appends a find-first filter segment.
    #[must_use]
    pub fn find_first(mut self, name: impl Into<String>) -> Self {
        self.segments.push(PathSegment::FindFirst(name.into()));
        self
    }

    /// Returns a new path with `other` appended.
    #[must_use]
    pub fn join(&self, other: &Self) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// Returns the segments.
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Returns true for the root path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns true if the path can be used as a write target.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        !self
            .segments
            .iter()
            .any(|s| matches!(s, PathSegment::FindFirst(_)))
    }

    /// Resolves the path against a document.
    #[must_use]
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let mut current = root;
        for segment in &self.segments {
            current = match segment {
                PathSegment::Field(name) => current.as_object()?.get(name)?,
                PathSegment::Index(i) => current.as_array()?.get(*i)?,
                PathSegment::FindFirst(name) => find_first(current, name)?,
            };
        }
        Some(current)
    }
}

fn find_first<'a>(node: &'a Value, field: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => {
            if map.contains_key(field) {
                return Some(node);
            }
            map.values().find_map(|child| find_first(child, field))
        }
        Value::Array(items) => items.iter().find_map(|child| find_first(child, field)),
        _ => None,
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for segment in &self.segments {
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for JsonPath {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Where a step writes its result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResultPath {
    /// Write at the given path (the root replaces the whole document).
    At(JsonPath),
    /// Drop the result and pass the input through unchanged.
    Discard,
}

impl ResultPath {
    /// Shorthand for `ResultPath::At(JsonPath::fields(dotted))`.
    #[must_use]
    pub fn at(dotted: &str) -> Self {
        Self::At(JsonPath::fields(dotted))
    }
}

impl fmt::Display for ResultPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At(path) => write!(f, "{path}"),
            Self::Discard => write!(f, "DISCARD"),
        }
    }
}
