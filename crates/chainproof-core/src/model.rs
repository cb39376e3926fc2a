use serde::{Deserialize, Serialize, Serializer};

/// One contract plus the test suite that exercises it. Consumed by a single
/// execution.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestExecutionRequest {
    pub contract_source: String,
    pub test_source: String,
}

impl TestExecutionRequest {
    pub fn new(contract_source: impl Into<String>, test_source: impl Into<String>) -> Self {
        Self {
            contract_source: contract_source.into(),
            test_source: test_source.into(),
        }
    }
}

/// Passed and failed test names in the order the runner printed them.
///
/// Counts are derived from the lists, so they cannot drift apart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestTally {
    passed: Vec<String>,
    failed: Vec<String>,
}

impl TestTally {
    pub fn record_passed(&mut self, name: impl Into<String>) {
        self.passed.push(name.into());
    }

    pub fn record_failed(&mut self, descriptor: impl Into<String>) {
        self.failed.push(descriptor.into());
    }

    pub fn passed(&self) -> &[String] {
        &self.passed
    }

    pub fn failed(&self) -> &[String] {
        &self.failed
    }

    pub fn passed_count(&self) -> usize {
        self.passed.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn total(&self) -> usize {
        self.passed.len() + self.failed.len()
    }
}

impl Serialize for TestTally {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Wire<'a> {
            passed_count: usize,
            failed_count: usize,
            passed_names: &'a [String],
            failed_names: &'a [String],
        }
        Wire {
            passed_count: self.passed_count(),
            failed_count: self.failed_count(),
            passed_names: &self.passed,
            failed_names: &self.failed,
        }
        .serialize(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageCategory {
    Statements,
    Branches,
    Functions,
    Lines,
}

impl CoverageCategory {
    pub const ALL: [CoverageCategory; 4] = [
        CoverageCategory::Statements,
        CoverageCategory::Branches,
        CoverageCategory::Functions,
        CoverageCategory::Lines,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Statements => "statements",
            Self::Branches => "branches",
            Self::Functions => "functions",
            Self::Lines => "lines",
        }
    }
}

impl std::fmt::Display for CoverageCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Percentages formatted with two decimals, e.g. `"60.00"`. Always carries
/// exactly the four categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageSummary {
    pub statements: String,
    pub branches: String,
    pub functions: String,
    pub lines: String,
}

impl CoverageSummary {
    pub fn get(&self, category: CoverageCategory) -> &str {
        match category {
            CoverageCategory::Statements => &self.statements,
            CoverageCategory::Branches => &self.branches,
            CoverageCategory::Functions => &self.functions,
            CoverageCategory::Lines => &self.lines,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (CoverageCategory, &str)> + '_ {
        CoverageCategory::ALL.into_iter().map(move |c| (c, self.get(c)))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestExecutionResult {
    pub raw_output: String,
    pub coverage: CoverageSummary,
    #[serde(flatten)]
    pub tests: TestTally,
    /// `None` when the runner was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl TestExecutionResult {
    pub fn passed_count(&self) -> usize {
        self.tests.passed_count()
    }

    pub fn failed_count(&self) -> usize {
        self.tests.failed_count()
    }

    pub fn total(&self) -> usize {
        self.tests.total()
    }

    pub fn all_passed(&self) -> bool {
        self.tests.failed_count() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: u64,
    pub column: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntaxIssue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<SourceLocation>,
}

/// Syntax verdict for one test source.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(rename = "originalFileName")]
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_errors: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_lines_of_code: Option<u64>,
    pub errors: Vec<SyntaxIssue>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_metric"
    )]
    pub syntax_validation_metric: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
}

impl ValidationResult {
    /// Result for validator output that could not be read as a verdict.
    pub fn unparsable(
        display_name: impl Into<String>,
        reason: impl std::fmt::Display,
        raw_output: impl Into<String>,
    ) -> Self {
        Self {
            valid: false,
            display_name: display_name.into(),
            total_errors: None,
            total_lines_of_code: None,
            errors: Vec::new(),
            syntax_validation_metric: None,
            error: Some(format!("parse failure: {reason}")),
            message: None,
            raw_output: Some(raw_output.into()),
        }
    }

    pub fn metric_display(&self) -> Option<String> {
        self.syntax_validation_metric.map(format_percent)
    }
}

fn serialize_metric<S: Serializer>(metric: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
    match metric {
        Some(m) => s.serialize_str(&format_percent(*m)),
        None => s.serialize_none(),
    }
}

/// Two decimals, ties rounded away from zero (`3.125` -> `"3.13"`).
fn format_percent(value: f64) -> String {
    format!("{:.2}", (value * 100.0).round() / 100.0)
}
