use anyhow::Context;
use chainproof_core::{ServiceConfig, SyntaxValidator, ValidationResult};
use serde_json::{json, Value};

use super::{error_json, exit_code_for, until_interrupted, write_output};
use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::exit_codes;

pub async fn run(args: ValidateArgs, cfg: ServiceConfig) -> anyhow::Result<i32> {
    let content = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let name = args.name.clone().unwrap_or_else(|| {
        args.file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| args.file.display().to_string())
    });

    let outcome = match SyntaxValidator::new(&cfg.validator, cfg.project_root()) {
        Ok(validator) => match until_interrupted(validator.validate(&name, &content)).await {
            Some(outcome) => outcome,
            None => {
                eprintln!("✖ interrupted: validator stopped");
                return Ok(exit_codes::INTERRUPTED);
            }
        },
        Err(e) => Err(e),
    };

    match outcome {
        Ok(result) => {
            match args.format {
                OutputFormat::Json => {
                    write_output(&serde_json::to_string_pretty(&verdict_json(&result))?, None)?
                }
                OutputFormat::Text => print_text(&result),
            }
            Ok(if result.valid {
                exit_codes::SUCCESS
            } else {
                exit_codes::TEST_FAILED
            })
        }
        Err(e) => {
            match args.format {
                OutputFormat::Json => {
                    let doc = error_json("validation failed", &e, e.captured_output());
                    write_output(&serde_json::to_string_pretty(&doc)?, None)?;
                }
                OutputFormat::Text => eprintln!("✖ validation failed: {}", e),
            }
            Ok(exit_code_for(&e))
        }
    }
}

/// The verdict plus a `status` field; a bare `error` is also surfaced as a
/// one-element `errors` list so consumers only need to read one field.
pub(crate) fn verdict_json(result: &ValidationResult) -> Value {
    let mut doc = serde_json::to_value(result).unwrap_or_else(|_| json!({}));
    if result.errors.is_empty() {
        if let Some(error) = &result.error {
            doc["errors"] = json!([{ "message": error }]);
        }
    }
    doc["status"] = json!(if result.valid { "success" } else { "error" });
    doc
}

fn print_text(result: &ValidationResult) {
    if result.valid {
        println!("✔ {} is syntactically valid", result.display_name);
    } else {
        println!("✖ {} has syntax errors", result.display_name);
    }
    if let Some(metric) = result.metric_display() {
        println!("  validation metric: {}%", metric);
    }
    if let (Some(errors), Some(loc)) = (result.total_errors, result.total_lines_of_code) {
        println!("  {} error(s) in {} line(s)", errors, loc);
    }
    for issue in &result.errors {
        match &issue.loc {
            Some(loc) => println!("  {}:{}  {}", loc.line, loc.column, issue.message),
            None => println!("  {}", issue.message),
        }
    }
    if let Some(error) = &result.error {
        println!("  {}", error);
    }
    if let Some(raw) = &result.raw_output {
        println!("\n--- validator output ---\n{}", raw);
    }
}
