//! Typed parameter schemas, one per action type.
//!
//! Raw parameters arrive as an untyped [`Params`] map from the deck. Each
//! executor validates them exactly once into one of these structs before its
//! operation runs, so the operation code never re-checks shapes by hand.

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::OnceLock;

use crate::action::Params;
use crate::error::{Result, StagehandError};
use crate::types::ActionType;

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// A parameter struct that can check invariants serde cannot express.
pub trait ParamSchema: DeserializeOwned {
    fn check(&self) -> Result<()> {
        Ok(())
    }
}

/// Deserialize and check `params` into the schema `P`.
pub fn parse<P: ParamSchema>(params: &Params) -> Result<P> {
    let parsed: P = serde_json::from_value(serde_json::Value::Object(params.clone()))
        .map_err(|e| validation_from_serde(&e))?;
    parsed.check()?;
    Ok(parsed)
}

static MISSING_FIELD_RE: OnceLock<Regex> = OnceLock::new();

fn missing_field_re() -> &'static Regex {
    MISSING_FIELD_RE.get_or_init(|| Regex::new(r"missing field `([^`]+)`").unwrap())
}

fn validation_from_serde(err: &serde_json::Error) -> StagehandError {
    let message = err.to_string();
    match missing_field_re().captures(&message) {
        Some(caps) => StagehandError::validation(&caps[1], "is required"),
        None => StagehandError::validation("params", message),
    }
}

fn scalar_text(value: serde_json::Value) -> std::result::Result<Option<String>, String> {
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s)),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        serde_json::Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(format!("expected text, got {other}")),
    }
}

/// Text fields also take the numbers and booleans that `key=value` input
/// is coerced into, so `path=2024` still names a file.
fn text<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    use serde::de::Error;
    match scalar_text(serde_json::Value::deserialize(d)?) {
        Ok(Some(text)) => Ok(text),
        Ok(None) => Err(D::Error::custom("expected text, got null")),
        Err(message) => Err(D::Error::custom(message)),
    }
}

fn opt_text<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    use serde::de::Error;
    scalar_text(serde_json::Value::deserialize(d)?).map_err(D::Error::custom)
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(StagehandError::validation(field, "must not be empty"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// LineRange
// ---------------------------------------------------------------------------

/// An inclusive, 1-based range of lines. Written as `"12"` or `"12-18"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    pub fn single(line: u32) -> Self {
        Self {
            start: line,
            end: line,
        }
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

impl std::str::FromStr for LineRange {
    type Err = StagehandError;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || StagehandError::validation("lines", format!("'{s}' is not a line range"));
        let (start, end) = match s.split_once('-') {
            Some((a, b)) => (a.trim(), b.trim()),
            None => (s.trim(), s.trim()),
        };
        let start: u32 = start.parse().map_err(|_| bad())?;
        let end: u32 = end.parse().map_err(|_| bad())?;
        if start == 0 {
            return Err(StagehandError::validation("lines", "lines are 1-based"));
        }
        if end < start {
            return Err(StagehandError::validation(
                "lines",
                format!("range end {end} is before start {start}"),
            ));
        }
        Ok(Self { start, end })
    }
}

impl Serialize for LineRange {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LineRange {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Line(u32),
            Text(String),
        }
        match Raw::deserialize(d)? {
            Raw::Line(n) => n
                .to_string()
                .parse()
                .map_err(|e: StagehandError| serde::de::Error::custom(e.to_string())),
            Raw::Text(s) => s
                .parse()
                .map_err(|e: StagehandError| serde::de::Error::custom(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Schemas
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOpenParams {
    #[serde(deserialize_with = "text")]
    pub path: String,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub column: Option<u32>,
    #[serde(default)]
    pub view_column: Option<u8>,
    #[serde(default)]
    pub preview: bool,
}

impl ParamSchema for FileOpenParams {
    fn check(&self) -> Result<()> {
        require_non_empty("path", &self.path)?;
        if self.line == Some(0) {
            return Err(StagehandError::validation("line", "lines are 1-based"));
        }
        if let Some(col) = self.view_column {
            if !(1..=9).contains(&col) {
                return Err(StagehandError::validation(
                    "viewColumn",
                    "must be between 1 and 9",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightStyle {
    Subtle,
    #[default]
    Prominent,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightParams {
    #[serde(deserialize_with = "text")]
    pub path: String,
    pub lines: LineRange,
    #[serde(default)]
    pub style: HighlightStyle,
}

impl ParamSchema for HighlightParams {
    fn check(&self) -> Result<()> {
        require_non_empty("path", &self.path)
    }
}

pub const DEFAULT_TERMINAL_NAME: &str = "Stagehand";

fn default_terminal_name() -> String {
    DEFAULT_TERMINAL_NAME.to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalRunParams {
    #[serde(deserialize_with = "text")]
    pub command: String,
    #[serde(default = "default_terminal_name", deserialize_with = "text")]
    pub name: String,
    #[serde(default, deserialize_with = "opt_text")]
    pub cwd: Option<String>,
    #[serde(default)]
    pub clear: bool,
}

impl ParamSchema for TerminalRunParams {
    fn check(&self) -> Result<()> {
        require_non_empty("command", &self.command)?;
        require_non_empty("name", &self.name)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugStartParams {
    #[serde(deserialize_with = "text")]
    pub config_name: String,
    #[serde(default, deserialize_with = "opt_text")]
    pub workspace_folder: Option<String>,
}

impl ParamSchema for DebugStartParams {
    fn check(&self) -> Result<()> {
        require_non_empty("configName", &self.config_name)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostCommandParams {
    #[serde(deserialize_with = "text")]
    pub id: String,
    #[serde(default)]
    args: Option<serde_json::Value>,
}

impl HostCommandParams {
    /// Arguments as a list; a scalar argument becomes a one-element list.
    pub fn args(&self) -> Vec<serde_json::Value> {
        match &self.args {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(serde_json::Value::Array(items)) => items.clone(),
            Some(other) => vec![other.clone()],
        }
    }
}

impl ParamSchema for HostCommandParams {
    fn check(&self) -> Result<()> {
        require_non_empty("id", &self.id)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceParams {
    pub steps: serde_json::Value,
    /// Inter-step delay in milliseconds; falls back to the session default.
    #[serde(default)]
    pub delay: Option<u64>,
    #[serde(default)]
    pub stop_on_error: Option<bool>,
}

impl ParamSchema for SequenceParams {
    fn check(&self) -> Result<()> {
        crate::executors::steps::canonicalize(&self.steps).map(|_| ())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCommandParams {
    #[serde(deserialize_with = "text")]
    pub command: String,
    #[serde(default)]
    pub expect_exit_code: i32,
    #[serde(default, deserialize_with = "opt_text")]
    pub cwd: Option<String>,
}

impl ParamSchema for ValidateCommandParams {
    fn check(&self) -> Result<()> {
        require_non_empty("command", &self.command)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateFileParams {
    #[serde(deserialize_with = "text")]
    pub path: String,
}

impl ParamSchema for ValidateFileParams {
    fn check(&self) -> Result<()> {
        require_non_empty("path", &self.path)
    }
}

fn default_probe_host() -> String {
    "localhost".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePortParams {
    pub port: u16,
    #[serde(default = "default_probe_host", deserialize_with = "text")]
    pub host: String,
}

impl ParamSchema for ValidatePortParams {
    fn check(&self) -> Result<()> {
        if self.port == 0 {
            return Err(StagehandError::validation(
                "port",
                "must be between 1 and 65535",
            ));
        }
        require_non_empty("host", &self.host)
    }
}

// ---------------------------------------------------------------------------
// Target extraction
// ---------------------------------------------------------------------------

/// The user-facing "target" of an action, used to enrich failure reports.
///
/// Works on the raw map so it can describe actions whose params never
/// validated.
pub fn target_for(action_type: ActionType, params: &Params) -> Option<String> {
    let text = |key: &str| {
        params.get(key).and_then(|v| match v {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        })
    };
    match action_type {
        ActionType::FileOpen | ActionType::EditorHighlight | ActionType::ValidateFile => {
            text("path")
        }
        ActionType::TerminalRun | ActionType::ValidateCommand => text("command"),
        ActionType::DebugStart => text("configName"),
        ActionType::HostCommand => text("id"),
        ActionType::ValidatePort => {
            let port = text("port")?;
            let host = text("host").unwrap_or_else(default_probe_host);
            Some(format!("{host}:{port}"))
        }
        ActionType::Sequence => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: serde_json::Value) -> Params {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn missing_required_field_names_the_field() {
        let err = parse::<FileOpenParams>(&params(json!({ "line": 3 }))).unwrap_err();
        match err {
            StagehandError::Validation { field, reason } => {
                assert_eq!(field, "path");
                assert_eq!(reason, "is required");
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn empty_path_is_rejected() {
        let err = parse::<FileOpenParams>(&params(json!({ "path": "  " }))).unwrap_err();
        assert!(err.to_string().contains("path"));
    }

    #[test]
    fn line_range_accepts_number_and_span() {
        let p: HighlightParams =
            parse(&params(json!({ "path": "a.rs", "lines": "4-9" }))).unwrap();
        assert_eq!(p.lines, LineRange { start: 4, end: 9 });
        assert_eq!(p.style, HighlightStyle::Prominent);

        let p: HighlightParams =
            parse(&params(json!({ "path": "a.rs", "lines": 7, "style": "subtle" }))).unwrap();
        assert_eq!(p.lines, LineRange::single(7));
        assert_eq!(p.style, HighlightStyle::Subtle);
    }

    #[test]
    fn inverted_line_range_is_rejected() {
        assert!("9-4".parse::<LineRange>().is_err());
        assert!("0".parse::<LineRange>().is_err());
        assert!("abc".parse::<LineRange>().is_err());
        assert_eq!("3-3".parse::<LineRange>().unwrap().to_string(), "3");
    }

    #[test]
    fn coerced_scalars_are_accepted_as_text() {
        let p: FileOpenParams = parse(&params(json!({ "path": 2024 }))).unwrap();
        assert_eq!(p.path, "2024");
        let p: ValidateCommandParams = parse(&params(json!({ "command": true }))).unwrap();
        assert_eq!(p.command, "true");
        let p: TerminalRunParams =
            parse(&params(json!({ "command": "ls", "name": 7, "cwd": 3 }))).unwrap();
        assert_eq!(p.name, "7");
        assert_eq!(p.cwd.as_deref(), Some("3"));

        let err = parse::<FileOpenParams>(&params(json!({ "path": ["a.rs"] }))).unwrap_err();
        assert!(err.to_string().contains("expected text"));
    }

    #[test]
    fn terminal_defaults_name() {
        let p: TerminalRunParams = parse(&params(json!({ "command": "ls" }))).unwrap();
        assert_eq!(p.name, DEFAULT_TERMINAL_NAME);
        assert!(!p.clear);
    }

    #[test]
    fn host_command_wraps_scalar_args() {
        let p: HostCommandParams =
            parse(&params(json!({ "id": "workbench.action.zoomIn", "args": 2 }))).unwrap();
        assert_eq!(p.args(), vec![json!(2)]);
        let p: HostCommandParams = parse(&params(json!({ "id": "x" }))).unwrap();
        assert!(p.args().is_empty());
    }

    #[test]
    fn port_zero_and_out_of_range_are_rejected() {
        assert!(parse::<ValidatePortParams>(&params(json!({ "port": 0 }))).is_err());
        assert!(parse::<ValidatePortParams>(&params(json!({ "port": 70000 }))).is_err());
        let p: ValidatePortParams = parse(&params(json!({ "port": 8080 }))).unwrap();
        assert_eq!(p.host, "localhost");
    }

    #[test]
    fn target_extraction_per_type() {
        assert_eq!(
            target_for(ActionType::FileOpen, &params(json!({ "path": "src/lib.rs" }))),
            Some("src/lib.rs".to_string())
        );
        assert_eq!(
            target_for(ActionType::TerminalRun, &params(json!({ "command": "npm test" }))),
            Some("npm test".to_string())
        );
        assert_eq!(
            target_for(ActionType::DebugStart, &params(json!({ "configName": "Launch" }))),
            Some("Launch".to_string())
        );
        assert_eq!(
            target_for(ActionType::ValidatePort, &params(json!({ "port": 5432 }))),
            Some("localhost:5432".to_string())
        );
        assert_eq!(target_for(ActionType::Sequence, &params(json!({}))), None);
    }
}
