//! Pass/fail extraction from test runner output.
//!
//! The text format belongs to the external reporter, so the matching rules
//! live behind [`OutputParser`] and the orchestrator only sees a
//! [`TestTally`].

use lazy_static::lazy_static;
use regex::Regex;

use crate::config::ParserConfig;
use crate::model::TestTally;

lazy_static! {
    /// `12 passing (1s)` / `1 failing`. Nothing at or after this line is
    /// counted: the reporter repeats failures in its epilogue.
    static ref SUMMARY_LINE: Regex = Regex::new(r"^\d+ (passing|failing)").unwrap();
    /// `1) should revert on overflow`
    static ref FAILED_LINE: Regex = Regex::new(r"^\d+\)\s+(.+)$").unwrap();
}

pub trait OutputParser: Send + Sync {
    fn parse(&self, output: &str) -> TestTally;
}

/// Parser for mocha's default `spec` reporter, which hardhat uses.
#[derive(Debug, Clone)]
pub struct SpecReporterParser {
    pass_glyphs: Vec<String>,
}

impl SpecReporterParser {
    pub fn new(cfg: &ParserConfig) -> Self {
        Self {
            pass_glyphs: cfg
                .pass_glyphs
                .iter()
                .filter(|g| !g.is_empty())
                .cloned()
                .collect(),
        }
    }

    fn passed_name<'l>(&self, line: &'l str) -> Option<&'l str> {
        self.pass_glyphs
            .iter()
            .find_map(|glyph| line.strip_prefix(glyph.as_str()))
            .map(str::trim)
    }
}

impl Default for SpecReporterParser {
    fn default() -> Self {
        Self::new(&ParserConfig::default())
    }
}

impl OutputParser for SpecReporterParser {
    fn parse(&self, output: &str) -> TestTally {
        let mut tally = TestTally::default();
        for line in output.lines().map(str::trim) {
            if SUMMARY_LINE.is_match(line) {
                tracing::debug!(line, "summary line reached, stopping");
                break;
            }
            if let Some(name) = self.passed_name(line) {
                tally.record_passed(name);
            } else if let Some(caps) = FAILED_LINE.captures(line) {
                tally.record_failed(caps[1].trim());
            }
        }
        tally
    }
}
