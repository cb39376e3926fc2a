//! Syntax validation of a test source through an external validator script.
//!
//! The script is invoked as `<interpreter> <script> <temp file>` and prints
//! one JSON verdict. Output that is not a verdict never becomes an error:
//! it is returned as an invalid [`ValidationResult`] carrying the raw text.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::config::ValidatorConfig;
use crate::errors::RunError;
use crate::model::{SyntaxIssue, ValidationResult};
use crate::process::{self, CommandSpec};

#[derive(Debug, Clone)]
pub struct SyntaxValidator {
    interpreter: String,
    script: PathBuf,
    timeout: Duration,
}

impl SyntaxValidator {
    /// `cfg.script` resolves against `project_root` and must exist.
    pub fn new(cfg: &ValidatorConfig, project_root: &Path) -> Result<Self, RunError> {
        let script = project_root.join(&cfg.script);
        if !script.is_file() {
            return Err(RunError::workspace_io(
                &script,
                io::Error::new(io::ErrorKind::NotFound, "validator script not found"),
            ));
        }
        Ok(Self {
            interpreter: cfg.interpreter.clone(),
            script,
            timeout: cfg.timeout(),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validates `content`, tagging the verdict with `display_name`.
    ///
    /// Fails only when the temp file cannot be written, the validator cannot
    /// be spawned, or it outlives the timeout. The temp file is gone when
    /// this returns, whichever way it returns.
    pub async fn validate(
        &self,
        display_name: &str,
        content: &str,
    ) -> Result<ValidationResult, RunError> {
        let mut tmp = tempfile::Builder::new()
            .prefix("test-")
            .suffix(".js")
            .tempfile()
            .map_err(|e| RunError::workspace_io(std::env::temp_dir(), e))?;
        tmp.write_all(content.as_bytes())
            .and_then(|()| tmp.flush())
            .map_err(|e| RunError::workspace_io(tmp.path(), e))?;

        let spec = CommandSpec::new(&self.interpreter)
            .arg(self.script.to_string_lossy())
            .arg(tmp.path().to_string_lossy())
            .timeout(Some(self.timeout));
        let outcome = process::run(&spec).await;

        let tmp_path = tmp.path().to_path_buf();
        if let Err(e) = tmp.close() {
            tracing::warn!(path = %tmp_path.display(), error = %e, "failed to delete temp file");
        }

        let output = outcome?;
        let result = interpret_verdict(display_name, &output.combined_output);
        tracing::info!(
            file = display_name,
            valid = result.valid,
            total_errors = ?result.total_errors,
            total_lines_of_code = ?result.total_lines_of_code,
            metric = ?result.metric_display(),
            "validation finished"
        );
        for issue in &result.errors {
            tracing::debug!(
                message = %issue.message,
                line = ?issue.loc.as_ref().map(|l| l.line),
                column = ?issue.loc.as_ref().map(|l| l.column),
                "syntax error"
            );
        }
        Ok(result)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Verdict {
    valid: bool,
    #[serde(default)]
    total_errors: Option<u64>,
    #[serde(default)]
    total_lines_of_code: Option<u64>,
    #[serde(default)]
    errors: Vec<SyntaxIssue>,
    #[serde(default, deserialize_with = "metric_from_number_or_str")]
    syntax_validation_metric: Option<f64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// The validator prints the metric either as a number or as a
/// `toFixed(2)` string.
fn metric_from_number_or_str<'de, D>(d: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<serde_json::Value> = Option::deserialize(d)?;
    match opt {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("metric out of range")),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        Some(other) => Err(serde::de::Error::custom(format!(
            "metric must be number or string, got: {other}"
        ))),
    }
}

/// `(1 - errors / lines) * 100`; zero lines yield 0.
pub fn derive_metric(total_errors: u64, total_lines_of_code: u64) -> f64 {
    if total_lines_of_code == 0 {
        return 0.0;
    }
    (1.0 - total_errors as f64 / total_lines_of_code as f64) * 100.0
}

/// Turns raw validator output into a result. Never fails.
pub fn interpret_verdict(display_name: &str, raw_output: &str) -> ValidationResult {
    let verdict = match parse_verdict(raw_output) {
        Ok(verdict) => verdict,
        Err(e) => {
            tracing::warn!(file = display_name, error = %e, "unparsable validator output");
            return ValidationResult::unparsable(display_name, e, raw_output);
        }
    };

    let metric = verdict.syntax_validation_metric.or_else(|| {
        match (verdict.total_errors, verdict.total_lines_of_code) {
            (Some(errors), Some(lines)) => Some(derive_metric(errors, lines)),
            _ => None,
        }
    });

    ValidationResult {
        valid: verdict.valid,
        display_name: display_name.to_string(),
        total_errors: verdict.total_errors,
        total_lines_of_code: verdict.total_lines_of_code,
        errors: verdict.errors,
        syntax_validation_metric: metric,
        error: verdict.error,
        message: verdict.message,
        raw_output: None,
    }
}

/// Whole output first, then the last non-empty line, which skips warnings
/// the interpreter printed ahead of the verdict.
fn parse_verdict(raw_output: &str) -> Result<Verdict, serde_json::Error> {
    let whole = serde_json::from_str(raw_output.trim());
    if whole.is_ok() {
        return whole;
    }
    match raw_output.lines().rev().map(str::trim).find(|l| !l.is_empty()) {
        Some(last) if last != raw_output.trim() => serde_json::from_str(last).or(whole),
        _ => whole,
    }
}
