//! Cache key construction

use crate::value::Value;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator between key segments.
pub const KEY_SEPARATOR: char = ':';

/// Purpose segment for computed entries. Not a valid SQL identifier, so it
/// can never collide with a table name.
pub const COMPUTE_PURPOSE: &str = "@compute";

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Invalid namespace: {0:?}")]
    InvalidNamespace(String),

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Null cannot identify a row")]
    NullIdentifier,

    #[error("Empty compute key")]
    EmptyComputeKey,
}

/// Whether `name` is a plain SQL identifier (table or column).
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// A fully qualified key in the key/value store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// `<namespace>:<table>:<id>` for one row.
    pub fn resource(namespace: &str, table: &str, id: &Value) -> Result<Self, KeyError> {
        validate_namespace(namespace)?;
        if !is_identifier(table) {
            return Err(KeyError::InvalidIdentifier(table.to_string()));
        }
        let id = id_segment(id)?;
        Ok(Self(format!(
            "{namespace}{KEY_SEPARATOR}{table}{KEY_SEPARATOR}{id}"
        )))
    }

    /// `<namespace>:@compute:<key>` for a computed entry.
    ///
    /// The caller's key is opaque and kept verbatim; it sits in the last
    /// segment, so separators inside it cannot reach into another purpose.
    pub fn compute(namespace: &str, key: &str) -> Result<Self, KeyError> {
        validate_namespace(namespace)?;
        if key.is_empty() {
            return Err(KeyError::EmptyComputeKey);
        }
        Ok(Self(format!(
            "{namespace}{KEY_SEPARATOR}{COMPUTE_PURPOSE}{KEY_SEPARATOR}{key}"
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn validate_namespace(namespace: &str) -> Result<(), KeyError> {
    if namespace.is_empty() || namespace.contains(KEY_SEPARATOR) {
        return Err(KeyError::InvalidNamespace(namespace.to_string()));
    }
    Ok(())
}

/// Stable string form of a row identifier.
///
/// Integers are written in decimal and text verbatim. Every other variant
/// starts with `%` and a one-letter type tag (`%b`, `%f`, `%x`, `%t`). `%`
/// and `:` are percent-escaped, so text ids can neither forge extra segments
/// nor spell out a tagged id.
pub fn id_segment(id: &Value) -> Result<String, KeyError> {
    let (tag, raw) = match id {
        Value::Null => return Err(KeyError::NullIdentifier),
        Value::Int(i) => return Ok(i.to_string()),
        Value::Text(s) => (None, s.clone()),
        Value::Bool(_) => (Some('b'), id.to_string()),
        Value::Float(_) => (Some('f'), id.to_string()),
        Value::Bytes(_) => (Some('x'), id.to_string()),
        Value::Timestamp(_) => (Some('t'), id.to_string()),
    };

    let mut segment = String::with_capacity(raw.len() + 4);
    if let Some(tag) = tag {
        segment.push('%');
        segment.push(tag);
    }
    for c in raw.chars() {
        match c {
            '%' => segment.push_str("%25"),
            ':' => segment.push_str("%3A"),
            other => segment.push(other),
        }
    }
    Ok(segment)
}
