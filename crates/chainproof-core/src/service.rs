//! Orchestration of one test execution: stage, run, parse, aggregate,
//! clean up.

use tokio::sync::Mutex;

use crate::config::ServiceConfig;
use crate::coverage;
use crate::errors::{ExecutionFailure, RunError};
use crate::model::{TestExecutionRequest, TestExecutionResult};
use crate::parse::{OutputParser, SpecReporterParser};
use crate::process::{self, CommandSpec};
use crate::workspace::ProjectWorkspace;

pub struct TestExecutionService {
    workspace: ProjectWorkspace,
    runner: CommandSpec,
    parser: Box<dyn OutputParser>,
    /// The staged paths are fixed, so executions on one service take turns.
    serial: Mutex<()>,
}

impl TestExecutionService {
    pub fn new(cfg: &ServiceConfig) -> Result<Self, RunError> {
        let workspace = ProjectWorkspace::open(&cfg.project)?;
        let runner = CommandSpec::new(&cfg.runner.program)
            .args(cfg.runner.args.iter().cloned())
            .current_dir(workspace.root())
            .timeout(cfg.runner.timeout());
        Ok(Self {
            workspace,
            runner,
            parser: Box::new(SpecReporterParser::new(&cfg.parser)),
            serial: Mutex::new(()),
        })
    }

    /// Swaps the reporter parser, e.g. for a runner with a different
    /// reporter than mocha's `spec`.
    pub fn with_parser(mut self, parser: impl OutputParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    /// Runs the suite in `request` against its contract and reports test
    /// outcomes and coverage.
    ///
    /// The staged files and generated directories are removed before this
    /// returns, and also when the future is dropped mid-run (the runner
    /// process is killed in that case).
    pub async fn execute(
        &self,
        request: TestExecutionRequest,
    ) -> Result<TestExecutionResult, ExecutionFailure> {
        let _turn = self.serial.lock().await;
        tracing::info!(
            contract_bytes = request.contract_source.len(),
            test_bytes = request.test_source.len(),
            root = %self.workspace.root().display(),
            "starting test execution"
        );

        let staged = self.workspace.stage(&request)?;
        drop(request);
        let outcome = self.run_staged().await;
        staged.release();

        match &outcome {
            Ok(result) => tracing::info!(
                passed = result.passed_count(),
                failed = result.failed_count(),
                exit_code = ?result.exit_code,
                "test execution finished"
            ),
            Err(failure) => tracing::warn!(
                kind = failure.error.kind(),
                error = %failure.error,
                "test execution failed"
            ),
        }
        outcome
    }

    async fn run_staged(&self) -> Result<TestExecutionResult, ExecutionFailure> {
        let output = process::run(&self.runner).await?;
        let tests = self.parser.parse(&output.combined_output);

        // The report must be read before cleanup deletes it.
        let coverage = match coverage::summarize_report(self.workspace.coverage_report_path()) {
            Ok(coverage) => coverage,
            Err(e) => return Err(ExecutionFailure::new(e).with_output(output.combined_output)),
        };

        Ok(TestExecutionResult {
            raw_output: output.combined_output,
            coverage,
            tests,
            exit_code: output.exit_code,
        })
    }
}
