#![cfg(unix)]

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chainproof_core::config::ValidatorConfig;
use chainproof_core::{RunError, SyntaxValidator};
use tempfile::TempDir;

fn validator(script: &str) -> (TempDir, SyntaxValidator) {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("check.sh"), script).unwrap();
    let cfg = ValidatorConfig {
        interpreter: "sh".into(),
        script: PathBuf::from("check.sh"),
        timeout_secs: 10,
    };
    let v = SyntaxValidator::new(&cfg, dir.path()).unwrap();
    (dir, v)
}

#[tokio::test]
async fn valid_source_gets_derived_metric() {
    let (_dir, v) = validator(
        r#"loc=$(wc -l < "$1" | tr -d ' ')
echo "{\"valid\": true, \"totalErrors\": 0, \"totalLinesOfCode\": $loc, \"errors\": []}"
"#,
    );
    let r = v
        .validate("MyTest.js", "const a = 1;\nconst b = 2;\nconst c = 3;\n")
        .await
        .unwrap();
    assert!(r.valid);
    assert_eq!(r.display_name, "MyTest.js");
    assert_eq!(r.total_lines_of_code, Some(3));
    assert_eq!(r.metric_display().as_deref(), Some("100.00"));
}

#[tokio::test]
async fn syntax_errors_are_reported() {
    let (_dir, v) = validator(
        r#"echo '{"valid":false,"totalErrors":1,"totalLinesOfCode":4,"syntaxValidationMetric":"75.00","errors":[{"index":1,"message":"Unexpected token (2:6)","loc":{"line":2,"column":6}}]}'"#,
    );
    let r = v.validate("Broken.js", "it('x', () => {\n  let = ;\n});\n").await.unwrap();
    assert!(!r.valid);
    assert_eq!(r.errors[0].message, "Unexpected token (2:6)");
    assert_eq!(r.metric_display().as_deref(), Some("75.00"));
}

#[tokio::test]
async fn temp_file_is_removed_after_run() {
    let (dir, v) = validator(
        r#"echo "$1" > "$(dirname "$0")/seen-path"
echo '{"valid": true}'
"#,
    );
    v.validate("t.js", "x").await.unwrap();

    let seen = fs::read_to_string(dir.path().join("seen-path")).unwrap();
    let tmp = PathBuf::from(seen.trim());
    assert!(tmp.file_name().unwrap().to_string_lossy().starts_with("test-"));
    assert!(!tmp.exists());
}

#[tokio::test]
async fn malformed_output_is_not_an_error() {
    let (_dir, v) = validator("echo 'SyntaxError: unexpected end of input'\nexit 1\n");
    let r = v.validate("t.js", "(").await.unwrap();
    assert!(!r.valid);
    assert_eq!(
        r.raw_output.as_deref(),
        Some("SyntaxError: unexpected end of input")
    );
    assert!(r.error.unwrap().starts_with("parse failure"));
}

#[tokio::test]
async fn slow_validator_times_out_and_temp_file_is_removed() {
    let (dir, v) = validator(
        r#"echo "$1" > "$(dirname "$0")/seen-path"
exec sleep 30
"#,
    );
    let v = v.with_timeout(Duration::from_millis(700));

    let started = Instant::now();
    let err = v.validate("slow.js", "while (true) {}").await.unwrap_err();
    assert!(matches!(err, RunError::ProcessTimeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(10));

    let seen = fs::read_to_string(dir.path().join("seen-path")).unwrap();
    assert!(!PathBuf::from(seen.trim()).exists());
}

#[tokio::test]
async fn missing_interpreter_is_process_failure() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("check.js"), "").unwrap();
    let cfg = ValidatorConfig {
        interpreter: "no-such-interpreter-51c0".into(),
        ..ValidatorConfig::default()
    };
    let v = SyntaxValidator::new(&cfg, dir.path()).unwrap();
    let err = v.validate("t.js", "x").await.unwrap_err();
    assert_eq!(err.kind(), "process_failure");
}
