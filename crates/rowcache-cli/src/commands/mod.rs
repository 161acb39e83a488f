//! Subcommand implementations

pub mod delete;
pub mod exists;
pub mod get;
pub mod refresh;

use rowcache_core::Value;

/// Interpret a command-line id: canonical integers become `Int`, anything
/// else (including `007`) stays text.
pub fn parse_id(raw: &str) -> Value {
    match raw.parse::<i64>() {
        Ok(n) if n.to_string() == raw => Value::Int(n),
        _ => Value::Text(raw.to_string()),
    }
}
