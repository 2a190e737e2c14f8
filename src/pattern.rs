//! Pattern compiler: token substitution and structural path matching
//!
//! Patterns are `/`-separated templates with three kinds of tokens:
//!
//! - `{}` — a positional wildcard, filled left-to-right by [`replace_wildcards`]
//! - `{name}` — a named placeholder, filled by [`replace_named`] and captured
//!   by [`match_path`]
//! - `base[/...]` — an optional trailing group; a path matches with or without
//!   it, and the short form reports the group's placeholder names as missing
//!   so the caller can merge route defaults
//!
//! Substitution is partial-friendly: tokens without a supplied value are left
//! intact, and the result is still a valid template.
//!
//! # Example
//! ```rust,ignore
//! let path = compile(
//!     "users/{user_id}/addresses/{address_id}/edit",
//!     &PatternValues::named([("user_id", 1785), ("address_id", 3)]),
//! );
//! assert_eq!(path, "users/1785/addresses/3/edit");
//! ```

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Matches `{}` and `{identifier}` tokens.
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)?\}").expect("valid token regex"));

/// Values supplied to [`compile`]: positional for `{}` wildcards, named for
/// `{identifier}` placeholders.
#[derive(Debug, Clone)]
pub enum PatternValues {
    /// Ordered values consumed left-to-right by `{}` tokens
    Positional(Vec<Value>),
    /// Values looked up by placeholder identifier
    Named(Map<String, Value>),
}

impl PatternValues {
    /// Build a named value set from `(key, value)` pairs.
    pub fn named<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Named(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a positional value set.
    pub fn positional<V: Into<Value>, I: IntoIterator<Item = V>>(values: I) -> Self {
        Self::Positional(values.into_iter().map(Into::into).collect())
    }
}

/// Result of a structural match: the captured parameters and the placeholder
/// names the short optional form left unfilled.
#[derive(Debug, Clone, Default)]
pub struct PatternMatch {
    /// Captured parameters; purely-numeric captures are coerced to integers
    pub params: Map<String, Value>,
    /// Placeholders present only in the unused optional group
    pub missing: Vec<String>,
}

/// Single public substitution entry point, used for route-path generation and
/// reverse URL building. Dispatches on the shape of `values`.
pub fn compile(pattern: &str, values: &PatternValues) -> String {
    match values {
        PatternValues::Positional(positional) => replace_wildcards(pattern, positional),
        PatternValues::Named(named) => replace_named(pattern, named),
    }
}

/// Replace `{}` tokens left-to-right with the next unused positional value.
///
/// Tokens beyond the supplied values are left as `{}` literally; partial
/// substitution is legal and the result round-trips as a template.
pub fn replace_wildcards(pattern: &str, values: &[Value]) -> String {
    let mut next = 0usize;
    TOKEN_RE
        .replace_all(pattern, |caps: &regex::Captures<'_>| {
            // Only bare `{}` tokens consume positional values.
            if caps.get(1).is_some() {
                return caps[0].to_string();
            }
            match values.get(next) {
                Some(value) => {
                    next += 1;
                    render_value(value)
                }
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Replace `{identifier}` tokens whose identifier appears in `values`;
/// unmatched tokens are left intact.
pub fn replace_named(pattern: &str, values: &Map<String, Value>) -> String {
    TOKEN_RE
        .replace_all(pattern, |caps: &regex::Captures<'_>| {
            match caps.get(1).and_then(|name| values.get(name.as_str())) {
                Some(value) => render_value(value),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Names of all `{identifier}` placeholders in a pattern, in order.
pub fn token_names(pattern: &str) -> Vec<String> {
    TOKEN_RE
        .captures_iter(pattern)
        .filter_map(|caps| caps.get(1).map(|name| name.as_str().to_string()))
        .collect()
}

/// Split a pattern with an optional trailing group into its short and long
/// expansions. `delivery-addresses[/{type}]` yields
/// `("delivery-addresses", Some("delivery-addresses/{type}"))`; patterns
/// without a group yield `(pattern, None)`.
pub fn split_optional(pattern: &str) -> (String, Option<String>) {
    let Some(open) = pattern.find('[') else {
        return (pattern.to_string(), None);
    };
    if !pattern.ends_with(']') {
        return (pattern.to_string(), None);
    }
    let stem = &pattern[..open];
    let inner = &pattern[open + 1..pattern.len() - 1];
    (stem.to_string(), Some(format!("{stem}{inner}")))
}

/// Structurally match `path` against `pattern`, resolving the optional group
/// to whichever form fits. Segment counts and literal segments must be equal;
/// placeholder segments accept any non-empty value.
pub fn match_path(pattern: &str, path: &str) -> Option<PatternMatch> {
    let (stem, long) = split_optional(pattern);
    if let Some(long) = long {
        if let Some(params) = match_segments(&long, path) {
            return Some(PatternMatch {
                params,
                missing: Vec::new(),
            });
        }
        if let Some(params) = match_segments(&stem, path) {
            let stem_names = token_names(&stem);
            let missing = token_names(&long)
                .into_iter()
                .filter(|name| !stem_names.contains(name))
                .collect();
            return Some(PatternMatch { params, missing });
        }
        return None;
    }
    match_segments(pattern, path).map(|params| PatternMatch {
        params,
        missing: Vec::new(),
    })
}

fn match_segments(pattern: &str, path: &str) -> Option<Map<String, Value>> {
    let pattern_segments = segments(pattern);
    let path_segments = segments(path);
    if pattern_segments.len() != path_segments.len() {
        return None;
    }

    let mut params = Map::new();
    for (template, value) in pattern_segments.iter().zip(path_segments.iter()) {
        match placeholder_name(template) {
            Some(name) => {
                if value.is_empty() {
                    return None;
                }
                if !name.is_empty() {
                    params.insert(name.to_string(), coerce(value));
                }
            }
            None => {
                if template != value {
                    return None;
                }
            }
        }
    }
    Some(params)
}

fn segments(value: &str) -> Vec<&str> {
    let trimmed = value.trim_matches('/');
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}

/// Returns the placeholder name when a segment is wholly a token
/// (empty string for the `{}` wildcard).
fn placeholder_name(segment: &str) -> Option<&str> {
    let caps = TOKEN_RE.captures(segment)?;
    if caps.get(0).map(|token| token.as_str()) != Some(segment) {
        return None;
    }
    Some(caps.get(1).map(|name| name.as_str()).unwrap_or(""))
}

/// Purely-numeric captures become integers, everything else stays a string.
fn coerce(raw: &str) -> Value {
    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(number) = raw.parse::<i64>() {
            return Value::from(number);
        }
    }
    Value::from(raw)
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
