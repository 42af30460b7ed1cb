//! Saved analyses.
//!
//! An analysis is the replayable part of a step log: the step types, the
//! versions they were recorded at, and their params. It can be stored as
//! JSON, YAML or TOML and applied to fresh input data later.

use crate::value::Params;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A named, ordered list of saved steps.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Analysis {
    /// Name of the analysis.
    #[serde(default)]
    pub name: String,

    /// Steps in application order.
    #[serde(default)]
    pub steps: Vec<SavedStep>,
}

/// One step as stored in an analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedStep {
    pub step_type: String,
    pub step_version: u32,
    #[serde(default)]
    pub params: Params,
}

/// Errors from reading or writing analyses.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("failed to parse analysis: {0}")]
    Parse(String),

    #[error("failed to serialize analysis: {0}")]
    Serialize(String),

    #[error("unsupported analysis format: {0}")]
    UnsupportedFormat(String),
}

impl Analysis {
    /// Create an empty analysis.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Add a step.
    pub fn step(mut self, step_type: impl Into<String>, step_version: u32, params: Params) -> Self {
        self.steps.push(SavedStep {
            step_type: step_type.into(),
            step_version,
            params,
        });
        self
    }

    /// Parse an analysis, picking the format from the path's extension
    /// (YAML when there is no usable extension).
    pub fn from_bytes(data: &[u8], path: Option<&Path>) -> Result<Self, AnalysisError> {
        let format = path.and_then(detect_format).unwrap_or("yaml");
        Self::from_bytes_format(data, format)
    }

    /// Parse an analysis in an explicit format.
    pub fn from_bytes_format(data: &[u8], format: &str) -> Result<Self, AnalysisError> {
        match format {
            "json" => serde_json::from_slice(data).map_err(|e| AnalysisError::Parse(e.to_string())),
            "yaml" | "yml" => {
                serde_yaml::from_slice(data).map_err(|e| AnalysisError::Parse(e.to_string()))
            }
            "toml" => {
                let s = std::str::from_utf8(data)
                    .map_err(|e| AnalysisError::Parse(format!("invalid UTF-8: {e}")))?;
                toml::from_str(s).map_err(|e| AnalysisError::Parse(e.to_string()))
            }
            other => Err(AnalysisError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Serialize the analysis.
    ///
    /// TOML has no null, so analyses with `None` params only serialize as
    /// JSON or YAML.
    pub fn to_bytes(&self, format: &str) -> Result<Vec<u8>, AnalysisError> {
        match format {
            "json" => serde_json::to_vec_pretty(self)
                .map_err(|e| AnalysisError::Serialize(e.to_string())),
            "yaml" | "yml" => serde_yaml::to_string(self)
                .map(String::into_bytes)
                .map_err(|e| AnalysisError::Serialize(e.to_string())),
            "toml" => toml::to_string_pretty(self)
                .map(String::into_bytes)
                .map_err(|e| AnalysisError::Serialize(e.to_string())),
            other => Err(AnalysisError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Analysis format from a file extension.
pub fn detect_format(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?;
    match ext.to_ascii_lowercase().as_str() {
        "json" => Some("json"),
        "yaml" | "yml" => Some("yaml"),
        "toml" => Some("toml"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{ParamsExt, Value};

    fn sample() -> Analysis {
        Analysis::new("cleanup")
            .step(
                "rename_column",
                2,
                Params::new()
                    .with("sheet_index", 0i64)
                    .with("old_column_header", "A")
                    .with("new_column_header", "B"),
            )
            .step(
                "delete_column",
                3,
                Params::new()
                    .with("sheet_index", 0i64)
                    .with("column_headers", vec!["C"]),
            )
    }

    #[test]
    fn test_roundtrip_all_formats() {
        let analysis = sample();
        for format in ["json", "yaml", "toml"] {
            let bytes = analysis.to_bytes(format).unwrap();
            let parsed = Analysis::from_bytes_format(&bytes, format).unwrap();
            assert_eq!(parsed, analysis, "format {format}");
        }
    }

    #[test]
    fn test_format_from_extension() {
        let json = br#"{"name": "x", "steps": [{"step_type": "dataframe_duplicate", "step_version": 1, "params": {"sheet_index": 0}}]}"#;
        let parsed = Analysis::from_bytes(json, Some(Path::new("saved.JSON"))).unwrap();
        assert_eq!(parsed.steps[0].params["sheet_index"], Value::Int(0));

        let yaml = b"name: y\nsteps: []\n";
        let parsed = Analysis::from_bytes(yaml, None).unwrap();
        assert_eq!(parsed.name, "y");
    }

    #[test]
    fn test_unsupported_format() {
        assert!(matches!(
            sample().to_bytes("ron"),
            Err(AnalysisError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            Analysis::from_bytes_format(b"{", "json"),
            Err(AnalysisError::Parse(_))
        ));
    }
}
