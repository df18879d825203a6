//! # Dedup keys.
//!
//! [`create_key`] derives the `ctx.key` of an effect dispatch from its name
//! and options:
//!
//! ```text
//! no options                     ─► "name"
//! short scalar (< 8 chars)       ─► "name|<literal>"     e.g. "user|42"
//! anything else                  ─► "name|<8 hex chars>" hash of canonical JSON
//! ```
//!
//! Canonical JSON sorts object keys at every depth, so `{a, b}` and `{b, a}`
//! produce the same key.

use serde_json::{Map, Value};

/// Longest literal kept verbatim; hashes are exactly this long, so the two
/// forms never collide.
const HASH_WIDTH: usize = 8;

/// Derives the dedup key for `name` dispatched with `options`.
///
/// # Example
/// ```
/// use effectvisor::create_key;
/// use serde_json::json;
///
/// assert_eq!(create_key("users", &json!(null)), "users");
/// assert_eq!(create_key("user", &json!(42)), "user|42");
/// assert_eq!(
///     create_key("user", &json!({"id": 1, "page": 2})),
///     create_key("user", &json!({"page": 2, "id": 1})),
/// );
/// ```
pub fn create_key(name: &str, options: &Value) -> String {
    match literal(options) {
        Some(lit) => format!("{name}|{lit}"),
        None if options.is_null() => name.to_string(),
        None => {
            let canonical = sorted(options).to_string();
            format!("{name}|{:0width$x}", tiny_hash(&canonical), width = HASH_WIDTH)
        }
    }
}

fn literal(options: &Value) -> Option<String> {
    let lit = match options {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!lit.is_empty() && lit.len() < HASH_WIDTH && !lit.contains('|')).then_some(lit)
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::with_capacity(map.len());
            for k in keys {
                out.insert(k.clone(), sorted(&map[k]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// 32-bit multiplicative hash over UTF-16 code units.
fn tiny_hash(s: &str) -> u32 {
    const MUL: u32 = 387_420_489; // 9^9
    let h = s
        .encode_utf16()
        .fold(9_u32, |h, unit| (h ^ u32::from(unit)).wrapping_mul(MUL));
    h ^ (h >> 9)
}
