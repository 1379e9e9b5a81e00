use crate::error::LifecycleError;
use serde::Serialize;
use serde_json::Value;
use std::{fmt::Write as _, str::FromStr};

/// How results are printed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty printed JSON
    #[default]
    Json,
    /// One `key: value` line per field
    Text,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(OutputFormat::Json),
            "text" => Ok(OutputFormat::Text),
            other => Err(format!("unknown output format {other}, expected json or text")),
        }
    }
}

/// Render a result in the requested format.
pub fn render<T: Serialize>(value: &T, format: OutputFormat) -> Result<String, LifecycleError> {
    let value = serde_json::to_value(value)
        .map_err(|err| LifecycleError::validation(format!("unable to render output: {err}")))?;

    match format {
        OutputFormat::Json => serde_json::to_string_pretty(&value)
            .map_err(|err| LifecycleError::validation(format!("unable to render output: {err}"))),
        OutputFormat::Text => Ok(render_text(&value)),
    }
}

// keys keep their serialization order, nested objects are indented one
// level, list items are numbered from 1
fn render_text(value: &Value) -> String {
    let mut out = String::new();
    let fields = match value {
        Value::Object(fields) => fields,
        other => return scalar(other),
    };

    for (key, value) in fields {
        match value {
            Value::Null => {}
            Value::Object(inner) => {
                let _ = writeln!(out, "{key}:");
                for (k, v) in inner {
                    let _ = writeln!(out, "  {k}: {}", scalar(v));
                }
            }
            Value::Array(items) => {
                let _ = writeln!(out, "{key}:");
                for (i, item) in items.iter().enumerate() {
                    match item {
                        Value::Object(inner) => {
                            let _ = writeln!(out, "  {}.", i + 1);
                            for (k, v) in inner.iter().filter(|(_, v)| !v.is_null()) {
                                let _ = writeln!(out, "    {k}: {}", scalar(v));
                            }
                        }
                        other => {
                            let _ = writeln!(out, "  {}. {}", i + 1, scalar(other));
                        }
                    }
                }
            }
            other => {
                let _ = writeln!(out, "{key}: {}", scalar(other));
            }
        }
    }
    out.trim_end().to_string()
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::{FunctionState, LifecycleState};
    use serde_json::json;

    #[test]
    fn test_render_json() -> Result<(), LifecycleError> {
        let state = FunctionState {
            name: "img-proc".to_string(),
            state: Some(LifecycleState::Active),
            memory_mb: Some(256),
            ..Default::default()
        };

        let out = render(&state, OutputFormat::Json)?;
        let parsed: Value = serde_json::from_str(&out).unwrap();

        assert_eq!(json!("img-proc"), parsed["FunctionName"]);
        assert_eq!(json!("Active"), parsed["State"]);
        assert_eq!(json!(256), parsed["MemorySize"]);

        Ok(())
    }

    #[test]
    fn test_render_text() -> Result<(), LifecycleError> {
        let value = json!({
            "FunctionName": "img-proc",
            "MemorySize": 256,
            "Environment": { "STAGE": "prod" },
            "Functions": [{ "Name": "a", "Arn": null }, "b"],
            "Description": null
        });

        let out = render(&value, OutputFormat::Text)?;

        assert_eq!(
            "FunctionName: img-proc\nMemorySize: 256\nEnvironment:\n  STAGE: prod\nFunctions:\n  1.\n    Name: a\n  2. b",
            out
        );

        Ok(())
    }

    #[test]
    fn test_render_text_follows_field_order() -> Result<(), LifecycleError> {
        let state = FunctionState {
            name: "img-proc".to_string(),
            state: Some(LifecycleState::Active),
            memory_mb: Some(256),
            timeout_s: Some(30),
            ..Default::default()
        };

        let out = render(&state, OutputFormat::Text)?;

        assert_eq!(
            "FunctionName: img-proc\nState: Active\nMemorySize: 256\nTimeout: 30",
            out
        );

        Ok(())
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(Ok(OutputFormat::Text), "text".parse());
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
