//! Reduction of an istanbul-style `coverage-final.json` into four
//! percentages.
//!
//! The report maps each source file to hit counts per site: `s`
//! (statements), `f` (functions) and `l` (lines) map a site to one count,
//! `b` maps a branch to one count per arm and every arm is its own site.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use serde::Deserialize;

use crate::errors::RunError;
use crate::model::{CoverageCategory, CoverageSummary};

/// Hit counts for one source file. Other istanbul keys (`statementMap`,
/// `fnMap`, ...) are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileCoverage {
    #[serde(default)]
    pub s: BTreeMap<String, u64>,
    #[serde(default)]
    pub b: BTreeMap<String, Vec<u64>>,
    #[serde(default)]
    pub f: BTreeMap<String, u64>,
    #[serde(default)]
    pub l: BTreeMap<String, u64>,
}

pub type CoverageReport = BTreeMap<String, FileCoverage>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoverageCounters {
    pub total: u64,
    pub covered: u64,
}

impl CoverageCounters {
    fn record(&mut self, hits: u64) {
        self.total += 1;
        if hits > 0 {
            self.covered += 1;
        }
    }

    /// Two decimals with ties rounded up, computed on integers so that
    /// exact ties such as 1/32 (`3.125`) come out as `"3.13"`. `"0.00"` when
    /// there are no sites.
    pub fn percentage(&self) -> String {
        if self.total == 0 {
            return "0.00".to_string();
        }
        let total = u128::from(self.total);
        let scaled = u128::from(self.covered) * 10_000;
        let mut hundredths = scaled / total;
        if (scaled % total) * 2 >= total {
            hundredths += 1;
        }
        format!("{}.{:02}", hundredths / 100, hundredths % 100)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CoverageAggregator {
    statements: CoverageCounters,
    branches: CoverageCounters,
    functions: CoverageCounters,
    lines: CoverageCounters,
    files: usize,
}

impl CoverageAggregator {
    pub fn from_report(report: &CoverageReport) -> Self {
        let mut agg = Self::default();
        for file in report.values() {
            agg.add_file(file);
        }
        agg
    }

    pub fn add_file(&mut self, file: &FileCoverage) {
        self.files += 1;
        file.s.values().for_each(|&h| self.statements.record(h));
        file.b
            .values()
            .flatten()
            .for_each(|&h| self.branches.record(h));
        file.f.values().for_each(|&h| self.functions.record(h));
        file.l.values().for_each(|&h| self.lines.record(h));
    }

    pub fn counters(&self, category: CoverageCategory) -> CoverageCounters {
        match category {
            CoverageCategory::Statements => self.statements,
            CoverageCategory::Branches => self.branches,
            CoverageCategory::Functions => self.functions,
            CoverageCategory::Lines => self.lines,
        }
    }

    pub fn file_count(&self) -> usize {
        self.files
    }

    pub fn summary(&self) -> CoverageSummary {
        CoverageSummary {
            statements: self.statements.percentage(),
            branches: self.branches.percentage(),
            functions: self.functions.percentage(),
            lines: self.lines.percentage(),
        }
    }
}

pub fn parse_report(raw: &str) -> Result<CoverageReport, serde_json::Error> {
    serde_json::from_str(raw)
}

/// Reads and aggregates the report the runner left at `path`.
pub fn summarize_report(path: &Path) -> Result<CoverageSummary, RunError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(RunError::MissingReport {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(RunError::workspace_io(path, e)),
    };
    let report = parse_report(&raw).map_err(|source| RunError::MalformedReport {
        path: path.to_path_buf(),
        source,
    })?;

    let agg = CoverageAggregator::from_report(&report);
    let summary = agg.summary();
    tracing::debug!(
        files = agg.file_count(),
        statements = %summary.statements,
        branches = %summary.branches,
        functions = %summary.functions,
        lines = %summary.lines,
        "coverage aggregated"
    );
    Ok(summary)
}
