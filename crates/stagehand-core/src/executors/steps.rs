//! Canonicalization of sequence steps.
//!
//! Three input shapes are accepted and reduced to one list of [`StepSpec`]
//! before anything runs:
//!
//! - compact string: `"file.open?path=a.rs&line=3,terminal.run?command=ls"`
//! - nested list: `[{ type: file.open, params: { path: a.rs } }]`
//! - flat list: `[{ type: file.open, path: a.rs }]`
//!
//! Types are kept as written; resolving them is the sequence's job so that
//! an unknown type can be skipped rather than rejected up front.

use regex::Regex;
use serde::Serialize;
use serde_json::{Number, Value};
use std::borrow::Cow;
use std::sync::OnceLock;

use crate::action::Params;
use crate::error::{Result, StagehandError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepSpec {
    #[serde(rename = "type")]
    pub action_type: String,
    pub params: Params,
}

static NUMERIC_RE: OnceLock<Regex> = OnceLock::new();

fn numeric_re() -> &'static Regex {
    NUMERIC_RE.get_or_init(|| Regex::new(r"^-?\d+(\.\d+)?$").unwrap())
}

pub fn canonicalize(steps: &Value) -> Result<Vec<StepSpec>> {
    let specs = match steps {
        Value::String(text) => parse_compact(text)?,
        Value::Array(entries) => entries
            .iter()
            .enumerate()
            .map(|(i, entry)| parse_entry(i, entry))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect(),
        other => {
            return Err(StagehandError::validation(
                "steps",
                format!("expected a string or a list, got {}", kind(other)),
            ))
        }
    };
    if specs.is_empty() {
        return Err(StagehandError::validation("steps", "must not be empty"));
    }
    Ok(specs)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a map",
    }
}

// ---------------------------------------------------------------------------
// Compact string
// ---------------------------------------------------------------------------

fn decode(text: &str) -> Cow<'_, str> {
    urlencoding::decode(text).unwrap_or(Cow::Borrowed(text))
}

fn parse_compact(text: &str) -> Result<Vec<StepSpec>> {
    // A fully encoded string (no literal separators) is decoded once up front.
    let text = if text.contains(',') || text.contains('?') {
        Cow::Borrowed(text)
    } else {
        decode(text)
    };

    let mut specs = Vec::new();
    for segment in text.split(',') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let (type_part, query) = match segment.split_once('?') {
            Some((t, q)) => (t, Some(q)),
            None => (segment, None),
        };
        let action_type = decode(type_part.trim()).into_owned();
        if action_type.is_empty() {
            return Err(StagehandError::validation(
                "steps",
                format!("step '{segment}' has no type"),
            ));
        }

        let mut params = Params::new();
        for pair in query.unwrap_or_default().split('&') {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            params.insert(decode(key).into_owned(), coerce(&decode(value)));
        }
        specs.push(StepSpec {
            action_type,
            params,
        });
    }
    Ok(specs)
}

/// `"true"`/`"false"` become booleans and numeric-looking text becomes a
/// number; everything else stays a string.
pub fn coerce(text: &str) -> Value {
    match text {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if numeric_re().is_match(text) {
        if let Ok(n) = text.parse::<i64>() {
            return Value::Number(n.into());
        }
        if let Some(n) = text.parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(n);
        }
    }
    Value::String(text.to_string())
}

// ---------------------------------------------------------------------------
// Lists
// ---------------------------------------------------------------------------

fn parse_entry(index: usize, entry: &Value) -> Result<Vec<StepSpec>> {
    let map = match entry {
        Value::String(text) => return parse_compact(text),
        Value::Object(map) => map,
        other => {
            return Err(StagehandError::validation(
                format!("steps[{index}]"),
                format!("expected a map, got {}", kind(other)),
            ))
        }
    };

    let action_type = match map.get("type") {
        Some(Value::String(t)) if !t.trim().is_empty() => t.trim().to_string(),
        Some(_) => {
            return Err(StagehandError::validation(
                format!("steps[{index}].type"),
                "must be a non-empty string",
            ))
        }
        None => {
            return Err(StagehandError::validation(
                format!("steps[{index}].type"),
                "is required",
            ))
        }
    };

    let mut params = match map.get("params") {
        Some(Value::Object(nested)) => nested.clone(),
        Some(Value::Null) | None => Params::new(),
        Some(other) => {
            return Err(StagehandError::validation(
                format!("steps[{index}].params"),
                format!("expected a map, got {}", kind(other)),
            ))
        }
    };
    for (key, value) in map {
        if key != "type" && key != "params" {
            params.insert(key.clone(), value.clone());
        }
    }

    Ok(vec![StepSpec {
        action_type,
        params,
    }])
}
