//! Field paths and schema path resolution.
//!
//! A [`FieldPath`] is a dotted sequence of field names in which the wildcard
//! segment `*` stands for "every element of an array". [`resolve`] walks a
//! schema's field tree along a path string and either yields the addressed
//! descriptor or fails; there is no best-effort partial match.
//!
//! When array descent is allowed, resolving a name segment below an array
//! implicitly descends into the item type and records a synthetic wildcard in
//! the produced path, so `comments.author` resolves to `comments.*.author`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{FieldDescriptor, FieldKind};

/// The segment meaning "all elements of an array".
pub const WILDCARD: &str = "*";

/// One segment of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    Field(String),
    Wildcard,
}

/// Ordered sequence of path segments addressing a value inside a record.
///
/// Serializes as its dotted string form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    /// Parses a dotted path. Empty segments are dropped.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        Self(
            path.split('.')
                .filter(|s| !s.is_empty())
                .map(|s| {
                    if s == WILDCARD {
                        PathSegment::Wildcard
                    } else {
                        PathSegment::Field(s.to_string())
                    }
                })
                .collect(),
        )
    }

    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, segment: PathSegment) {
        self.0.push(segment);
    }

    /// Whether the path crosses an array (contains a wildcard).
    #[must_use]
    pub fn is_multi_valued(&self) -> bool {
        self.0.contains(&PathSegment::Wildcard)
    }

    /// Last field-name segment, if any.
    #[must_use]
    pub fn last_name(&self) -> Option<&str> {
        self.0.iter().rev().find_map(|s| match s {
            PathSegment::Field(name) => Some(name.as_str()),
            PathSegment::Wildcard => None,
        })
    }

    /// Looks up a single value. Returns `None` for wildcard paths.
    #[must_use]
    pub fn get<'a>(&self, record: &'a Value) -> Option<&'a Value> {
        let mut current = record;
        for segment in &self.0 {
            match segment {
                PathSegment::Field(name) => current = current.get(name.as_str())?,
                PathSegment::Wildcard => return None,
            }
        }
        Some(current)
    }

    /// Collects every value the path addresses, fanning out at wildcards.
    ///
    /// Array values reached by a field segment are also fanned out, matching
    /// how document stores evaluate a filter on an array-valued field.
    #[must_use]
    pub fn collect<'a>(&self, record: &'a Value) -> Vec<&'a Value> {
        let mut current = vec![record];
        for segment in &self.0 {
            let mut next = Vec::new();
            for value in current {
                match (segment, value) {
                    (PathSegment::Field(name), Value::Array(elements)) => {
                        next.extend(elements.iter().filter_map(|e| e.get(name.as_str())));
                    }
                    (PathSegment::Field(name), other) => {
                        next.extend(other.get(name.as_str()));
                    }
                    (PathSegment::Wildcard, Value::Array(elements)) => next.extend(elements),
                    (PathSegment::Wildcard, _) => {}
                }
            }
            current = next;
        }
        current
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match segment {
                PathSegment::Field(name) => f.write_str(name)?,
                PathSegment::Wildcard => f.write_str(WILDCARD)?,
            }
        }
        Ok(())
    }
}

impl From<String> for FieldPath {
    fn from(path: String) -> Self {
        Self::parse(&path)
    }
}

impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_string()
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Reasons a path fails to resolve against a schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("empty field path")]
    Empty,
    #[error("unknown segment `{segment}` in path `{path}`")]
    UnknownSegment { segment: String, path: String },
    #[error("path `{path}` descends into an array but array descent is disallowed")]
    ArrayDescentDisallowed { path: String },
    #[error("segment `{segment}` in path `{path}` descends into a non-container field")]
    NotAContainer { segment: String, path: String },
}

/// A successfully resolved path.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField<'a> {
    /// Canonical path, with a wildcard wherever an array was crossed.
    pub path: FieldPath,
    pub field: &'a FieldDescriptor,
}

impl ResolvedField<'_> {
    /// Whether the value is multi-valued at some position along the path.
    #[must_use]
    pub fn is_multi_valued(&self) -> bool {
        self.path.is_multi_valued()
    }
}

/// Resolves `path` against a field list.
///
/// # Errors
///
/// Returns a [`ResolveError`] when a segment does not exist at its level, when
/// the path needs to cross an array and `allow_array_descent` is false, or
/// when a segment continues below a scalar field.
pub fn resolve<'a>(
    fields: &'a [FieldDescriptor],
    path: &str,
    allow_array_descent: bool,
) -> Result<ResolvedField<'a>, ResolveError> {
    if path.is_empty() || path.split('.').any(str::is_empty) {
        return Err(ResolveError::Empty);
    }

    let unknown = |segment: &str| ResolveError::UnknownSegment {
        segment: segment.to_string(),
        path: path.to_string(),
    };
    let not_container = |segment: &str| ResolveError::NotAContainer {
        segment: segment.to_string(),
        path: path.to_string(),
    };

    let mut level: &'a [FieldDescriptor] = fields;
    let mut current: Option<&'a FieldDescriptor> = None;
    let mut produced = FieldPath::default();

    for segment in path.split('.') {
        if let Some(field) = current {
            match &field.kind {
                FieldKind::Object { fields } => level = fields,
                FieldKind::Array { items } => {
                    if !allow_array_descent {
                        return Err(ResolveError::ArrayDescentDisallowed {
                            path: path.to_string(),
                        });
                    }
                    produced.push(PathSegment::Wildcard);
                    if segment == WILDCARD {
                        current = Some(items.as_ref());
                        continue;
                    }
                    match &items.kind {
                        FieldKind::Object { fields } => level = fields,
                        _ => return Err(not_container(segment)),
                    }
                }
                _ => return Err(not_container(segment)),
            }
        }

        if segment == WILDCARD {
            return Err(unknown(segment));
        }
        let found = level
            .iter()
            .find(|f| f.name == segment)
            .ok_or_else(|| unknown(segment))?;
        produced.push(PathSegment::Field(segment.to_string()));
        current = Some(found);
    }

    let field = current.ok_or(ResolveError::Empty)?;
    Ok(ResolvedField {
        path: produced,
        field,
    })
}
