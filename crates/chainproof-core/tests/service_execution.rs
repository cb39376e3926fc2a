#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::time::Duration;

use chainproof_core::config::ServiceConfig;
use chainproof_core::{OutputParser, RunError, TestExecutionRequest, TestExecutionService, TestTally};
use tempfile::TempDir;

const HAPPY_RUNNER: &str = r#"#!/bin/sh
test -f contracts/MyContract.sol || { echo "contract not staged"; exit 9; }
test -f test/MyTest.js || { echo "test not staged"; exit 9; }
mkdir -p artifacts/contracts cache coverage
echo "Warning: SPDX license identifier not provided in source file" 1>&2
echo '{}' > artifacts/contracts/MyContract.json
echo "Compiled 1 Solidity file successfully"
echo ""
echo "  Token"
echo "    √ should transfer tokens"
echo "    √ should mint (41ms)"
echo "    1) should revert on overflow"
echo ""
echo "  2 passing (1s)"
echo "  1 failing"
echo ""
echo "  1) Token"
echo "       should revert on overflow:"
echo "    √ should transfer tokens"
cat > coverage/coverage-final.json <<'JSON'
{
  "contracts/MyContract.sol": {
    "s": {"1": 1, "2": 1, "3": 1, "4": 1, "5": 1, "6": 1, "7": 0, "8": 0, "9": 0, "10": 0},
    "b": {"1": [1, 0]},
    "f": {"1": 3, "2": 0},
    "l": {"5": 1, "6": 1, "7": 0, "8": 2}
  }
}
JSON
exit 1
"#;

struct Project {
    dir: TempDir,
}

impl Project {
    fn new(runner_script: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("runner.sh"), runner_script).unwrap();
        Self { dir }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn config(&self) -> ServiceConfig {
        let mut cfg = ServiceConfig::default().with_project_root(self.root());
        cfg.runner.program = "sh".into();
        cfg.runner.args = vec!["runner.sh".into()];
        cfg.runner.timeout_secs = 20;
        cfg
    }

    fn service(&self) -> TestExecutionService {
        TestExecutionService::new(&self.config()).unwrap()
    }

    fn assert_clean(&self) {
        let root = self.root();
        assert!(!root.join("contracts/MyContract.sol").exists());
        assert!(!root.join("test/MyTest.js").exists());
        assert!(!root.join("coverage").exists());
        assert!(!root.join("artifacts").exists());
        assert!(!root.join("cache").exists());
        assert!(root.join("runner.sh").exists());
    }
}

fn request() -> TestExecutionRequest {
    TestExecutionRequest::new(
        "pragma solidity ^0.8.0; contract Token {}",
        "describe('Token', function () {});",
    )
}

#[tokio::test]
async fn runs_suite_and_reports_results() {
    let project = Project::new(HAPPY_RUNNER);
    let result = project.service().execute(request()).await.unwrap();

    assert_eq!(
        result.tests.passed(),
        ["should transfer tokens", "should mint (41ms)"]
    );
    assert_eq!(result.tests.failed(), ["should revert on overflow"]);
    assert_eq!(result.passed_count(), 2);
    assert_eq!(result.failed_count(), 1);
    assert_eq!(result.total(), 3);
    assert_eq!(result.exit_code, Some(1));

    assert_eq!(result.coverage.statements, "60.00");
    assert_eq!(result.coverage.branches, "50.00");
    assert_eq!(result.coverage.functions, "50.00");
    assert_eq!(result.coverage.lines, "75.00");
    assert!(result.raw_output.contains("Compiled 1 Solidity file"));

    project.assert_clean();
}

#[tokio::test]
async fn missing_report_fails_with_output_and_cleans_up() {
    let project = Project::new("#!/bin/sh\nmkdir -p cache\necho '  √ ok'\necho '  1 passing'\n");
    let failure = project.service().execute(request()).await.unwrap_err();

    assert!(matches!(failure.error, RunError::MissingReport { .. }));
    assert!(failure.raw_output.unwrap().contains("1 passing"));
    project.assert_clean();
}

#[tokio::test]
async fn malformed_report_fails() {
    let project = Project::new(
        "#!/bin/sh\nmkdir -p coverage\necho 'not json' > coverage/coverage-final.json\n",
    );
    let failure = project.service().execute(request()).await.unwrap_err();

    assert_eq!(failure.error.kind(), "malformed_report");
    project.assert_clean();
}

#[tokio::test]
async fn zero_sites_report_zero_percent() {
    let project = Project::new(
        "#!/bin/sh\nmkdir -p coverage\necho '{}' > coverage/coverage-final.json\n",
    );
    let result = project.service().execute(request()).await.unwrap();

    assert_eq!(result.total(), 0);
    assert!(result.coverage.iter().all(|(_, pct)| pct == "0.00"));
    project.assert_clean();
}

#[tokio::test]
async fn runner_timeout_kills_and_cleans_up() {
    let project = Project::new("#!/bin/sh\nmkdir -p artifacts\nexec sleep 30\n");
    let mut cfg = project.config();
    cfg.runner.timeout_secs = 1;
    let service = TestExecutionService::new(&cfg).unwrap();

    let failure = service.execute(request()).await.unwrap_err();
    assert!(matches!(failure.error, RunError::ProcessTimeout { .. }));
    project.assert_clean();
}

#[tokio::test]
async fn runner_timeout_keeps_output_printed_so_far() {
    let project = Project::new("#!/bin/sh\necho '    √ before timeout'\nexec sleep 30\n");
    let mut cfg = project.config();
    cfg.runner.timeout_secs = 1;
    let service = TestExecutionService::new(&cfg).unwrap();

    let failure = service.execute(request()).await.unwrap_err();
    assert_eq!(failure.error.kind(), "process_timeout");
    assert!(failure.raw_output.unwrap().contains("√ before timeout"));
    project.assert_clean();
}

#[tokio::test]
async fn unspawnable_runner_is_process_failure() {
    let project = Project::new("");
    let mut cfg = project.config();
    cfg.runner.program = "no-such-runner-2b9d".into();
    let service = TestExecutionService::new(&cfg).unwrap();

    let failure = service.execute(request()).await.unwrap_err();
    assert_eq!(failure.error.kind(), "process_failure");
    assert!(failure.raw_output.is_none());
    project.assert_clean();
}

#[tokio::test]
async fn cancelled_execution_still_cleans_up() {
    let project = Project::new("#!/bin/sh\nmkdir -p cache\nexec sleep 30\n");
    let service = project.service();

    let staged_contract = project.root().join("contracts/MyContract.sol");
    let cancelled = tokio::time::timeout(Duration::from_millis(500), service.execute(request())).await;
    assert!(cancelled.is_err(), "execution should still be running");
    assert!(!staged_contract.exists());
    project.assert_clean();
}

#[tokio::test]
async fn cancelled_execution_kills_runner_descendants() {
    let project = Project::new("#!/bin/sh\n(sleep 1; mkdir -p artifacts/late) &\nsleep 30\n");
    let service = project.service();

    let cancelled = tokio::time::timeout(Duration::from_millis(300), service.execute(request())).await;
    assert!(cancelled.is_err(), "execution should still be running");

    tokio::time::sleep(Duration::from_millis(1500)).await;
    project.assert_clean();
}

struct FixedParser;

impl OutputParser for FixedParser {
    fn parse(&self, output: &str) -> TestTally {
        let mut tally = TestTally::default();
        for line in output.lines().filter_map(|l| l.strip_prefix("PASS ")) {
            tally.record_passed(line);
        }
        tally
    }
}

#[tokio::test]
async fn custom_parser_replaces_spec_reporter() {
    let project = Project::new(
        "#!/bin/sh\nmkdir -p coverage\necho '{}' > coverage/coverage-final.json\necho 'PASS mints'\necho '    √ ignored'\n",
    );
    let service = project.service().with_parser(FixedParser);

    let result = service.execute(request()).await.unwrap();
    assert_eq!(result.tests.passed(), ["mints"]);
    assert_eq!(result.failed_count(), 0);
    project.assert_clean();
}

#[tokio::test]
async fn executions_on_one_service_do_not_overlap() {
    let project = Project::new(
        r#"#!/bin/sh
if [ -e busy ]; then echo "OVERLAP"; fi
touch busy
sleep 1
rm -f busy
mkdir -p coverage
echo '{}' > coverage/coverage-final.json
echo "  √ serialized"
"#,
    );
    let service = project.service();

    let (a, b) = tokio::join!(service.execute(request()), service.execute(request()));
    for result in [a.unwrap(), b.unwrap()] {
        assert!(!result.raw_output.contains("OVERLAP"));
        assert_eq!(result.tests.passed(), ["serialized"]);
    }
    project.assert_clean();
}

#[test]
fn missing_project_root_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = ServiceConfig::default().with_project_root(dir.path().join("nope"));
    let err = TestExecutionService::new(&cfg).err().unwrap();
    assert_eq!(err.kind(), "workspace_io");
}
