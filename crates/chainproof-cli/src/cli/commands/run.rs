use std::fmt::Write as _;

use anyhow::Context;
use chainproof_core::{ServiceConfig, TestExecutionRequest, TestExecutionResult, TestExecutionService};
use serde_json::{json, Value};

use super::{error_json, exit_code_for, until_interrupted, write_output};
use crate::cli::args::{OutputFormat, RunArgs};
use crate::exit_codes;

pub async fn run(args: RunArgs, cfg: ServiceConfig) -> anyhow::Result<i32> {
    let contract_source = tokio::fs::read_to_string(&args.contract)
        .await
        .with_context(|| format!("failed to read contract {}", args.contract.display()))?;
    let test_source = tokio::fs::read_to_string(&args.test)
        .await
        .with_context(|| format!("failed to read test suite {}", args.test.display()))?;

    let service = match TestExecutionService::new(&cfg) {
        Ok(service) => service,
        Err(e) => {
            let doc = error_json("test execution failed", &e, None);
            emit_error(&args, &doc)?;
            return Ok(exit_code_for(&e));
        }
    };

    let request = TestExecutionRequest::new(contract_source, test_source);
    let Some(outcome) = until_interrupted(service.execute(request)).await else {
        eprintln!("✖ interrupted: runner stopped and workspace cleaned");
        return Ok(exit_codes::INTERRUPTED);
    };
    match outcome {
        Ok(result) => {
            let rendered = match args.format {
                OutputFormat::Json => serde_json::to_string_pretty(&result_json(&cfg, &result))?,
                OutputFormat::Text => render_text(&cfg, &result),
            };
            write_output(&rendered, args.output.as_deref())?;
            Ok(if result.all_passed() {
                exit_codes::SUCCESS
            } else {
                exit_codes::TEST_FAILED
            })
        }
        Err(failure) => {
            let doc = error_json(
                "test execution failed",
                &failure.error,
                failure.raw_output.as_deref(),
            );
            emit_error(&args, &doc)?;
            Ok(exit_code_for(&failure.error))
        }
    }
}

fn emit_error(args: &RunArgs, doc: &Value) -> anyhow::Result<()> {
    match args.format {
        OutputFormat::Json => write_output(&serde_json::to_string_pretty(doc)?, args.output.as_deref()),
        OutputFormat::Text => {
            eprintln!(
                "✖ {}: {}",
                doc["message"].as_str().unwrap_or("error"),
                doc["error"].as_str().unwrap_or_default()
            );
            if let Some(raw) = doc.get("rawOutput").and_then(Value::as_str) {
                eprintln!("\n--- runner output ---\n{}", raw);
            }
            Ok(())
        }
    }
}

pub(crate) fn result_json(cfg: &ServiceConfig, result: &TestExecutionResult) -> Value {
    let coverage: serde_json::Map<String, Value> = result
        .coverage
        .iter()
        .map(|(category, pct)| (category.to_string(), Value::String(format!("{pct}%"))))
        .collect();

    json!({
        "status": "success",
        "rawOutput": result.raw_output,
        "summary": {
            "contract": cfg.project.contract_file,
            "test": cfg.project.test_file,
            "passedCount": result.passed_count(),
            "failedCount": result.failed_count(),
            "testsPassed": result.tests.passed(),
            "testsFailed": result.tests.failed(),
            "totalTests": result.total(),
            "exitCode": result.exit_code,
        },
        "coverage": coverage,
    })
}

fn render_text(cfg: &ServiceConfig, result: &TestExecutionResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} with {}",
        cfg.project.contract_file, cfg.project.test_file
    );
    for name in result.tests.passed() {
        let _ = writeln!(out, "  ✔ {name}");
    }
    for name in result.tests.failed() {
        let _ = writeln!(out, "  ✖ {name}");
    }
    let _ = writeln!(
        out,
        "{} passed, {} failed ({} total)",
        result.passed_count(),
        result.failed_count(),
        result.total()
    );
    let _ = writeln!(out, "Coverage:");
    for (category, pct) in result.coverage.iter() {
        let _ = writeln!(out, "  {:<11} {:>7}%", category.as_str(), pct);
    }
    out.trim_end().to_string()
}
