//! Sandboxed execution of smart-contract test suites.
//!
//! A contract and its test suite are staged into a fixed project tree, the
//! external test runner is invoked with coverage enabled, and its output is
//! reduced to pass/fail lists plus four coverage percentages. A second path
//! checks test-source syntax through an external validator script.
//!
//! Compilation and test execution themselves belong to the external
//! toolchain; this crate owns the process lifecycle, output interpretation
//! and workspace cleanup.

pub mod config;
pub mod coverage;
pub mod errors;
pub mod model;
pub mod parse;
pub mod process;
pub mod service;
pub mod validate;
pub mod workspace;

pub use config::{load_config, load_config_or_default, ServiceConfig};
pub use errors::{ExecutionFailure, RunError};
pub use model::{
    CoverageCategory, CoverageSummary, TestExecutionRequest, TestExecutionResult, TestTally,
    ValidationResult,
};
pub use parse::{OutputParser, SpecReporterParser};
pub use service::TestExecutionService;
pub use validate::SyntaxValidator;
pub use workspace::{CleanupReport, ProjectWorkspace, StagedWorkspace};
