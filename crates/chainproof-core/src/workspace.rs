//! Fixed-layout project workspace.
//!
//! Exactly one contract and one test file are staged per execution. Staging
//! hands out a [`StagedWorkspace`] guard; the guard removes the staged files
//! and everything the toolchain generated when it is released or dropped,
//! so cleanup happens once on every exit path.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::ProjectConfig;
use crate::errors::RunError;
use crate::model::TestExecutionRequest;

#[derive(Debug, Clone)]
pub struct ProjectWorkspace {
    root: PathBuf,
    contracts_dir: PathBuf,
    tests_dir: PathBuf,
    contract_path: PathBuf,
    test_path: PathBuf,
    coverage_report: PathBuf,
    generated_dirs: Vec<PathBuf>,
    generated_files: Vec<PathBuf>,
}

impl ProjectWorkspace {
    /// Resolves the layout under `cfg.root`. The root itself must already
    /// exist: it holds the toolchain configuration and dependencies.
    pub fn open(cfg: &ProjectConfig) -> Result<Self, RunError> {
        let root = cfg.root.clone();
        if !root.is_dir() {
            return Err(RunError::workspace_io(
                &root,
                io::Error::new(io::ErrorKind::NotFound, "project root not found"),
            ));
        }
        let contracts_dir = root.join(&cfg.contracts_dir);
        let tests_dir = root.join(&cfg.tests_dir);
        Ok(Self {
            contract_path: contracts_dir.join(&cfg.contract_file),
            test_path: tests_dir.join(&cfg.test_file),
            coverage_report: root.join(&cfg.coverage_report),
            generated_dirs: cfg.generated_dirs.iter().map(|d| root.join(d)).collect(),
            generated_files: cfg.generated_files.iter().map(|f| root.join(f)).collect(),
            contracts_dir,
            tests_dir,
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn contract_path(&self) -> &Path {
        &self.contract_path
    }

    pub fn test_path(&self) -> &Path {
        &self.test_path
    }

    pub fn coverage_report_path(&self) -> &Path {
        &self.coverage_report
    }

    /// Writes both sources, overwriting earlier content.
    pub fn stage(&self, request: &TestExecutionRequest) -> Result<StagedWorkspace<'_>, RunError> {
        for dir in [&self.contracts_dir, &self.tests_dir] {
            fs::create_dir_all(dir).map_err(|e| RunError::workspace_io(dir, e))?;
        }

        // From here on a partial write is cleaned up by the guard.
        let staged = StagedWorkspace {
            workspace: self,
            released: false,
        };
        fs::write(&self.contract_path, &request.contract_source)
            .map_err(|e| RunError::workspace_io(&self.contract_path, e))?;
        fs::write(&self.test_path, &request.test_source)
            .map_err(|e| RunError::workspace_io(&self.test_path, e))?;

        tracing::debug!(
            contract = %self.contract_path.display(),
            test = %self.test_path.display(),
            "staged workspace files"
        );
        Ok(staged)
    }

    /// Best-effort removal of staged and generated files. Individual
    /// failures are logged and collected; they never stop the pass.
    pub fn cleanup(&self) -> CleanupReport {
        let mut report = CleanupReport::default();
        for dir in [&self.contracts_dir, &self.tests_dir] {
            remove_files_in(dir, &mut report);
        }
        for dir in &self.generated_dirs {
            remove_tree(dir, &mut report);
        }
        for file in &self.generated_files {
            remove_entry(file, &mut report);
        }

        if report.is_clean() {
            tracing::debug!(removed = report.removed, "workspace cleaned");
        } else {
            tracing::warn!(
                removed = report.removed,
                failures = report.failures.len(),
                "workspace cleanup incomplete"
            );
        }
        report
    }
}

/// Scoped ownership of the staged files.
#[must_use = "dropping the guard immediately removes the staged files"]
pub struct StagedWorkspace<'a> {
    workspace: &'a ProjectWorkspace,
    released: bool,
}

impl StagedWorkspace<'_> {
    /// Cleans up now and returns what happened.
    pub fn release(mut self) -> CleanupReport {
        self.released = true;
        self.workspace.cleanup()
    }
}

impl Drop for StagedWorkspace<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            self.workspace.cleanup();
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    pub removed: usize,
    pub failures: Vec<CleanupFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub error: String,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, path: &Path, error: io::Error) {
        tracing::warn!(path = %path.display(), error = %error, "failed to delete");
        self.failures.push(CleanupFailure {
            path: path.to_path_buf(),
            error: error.to_string(),
        });
    }
}

/// Deletes the regular files directly inside `dir`; subdirectories stay.
fn remove_files_in(dir: &Path, report: &mut CleanupReport) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return,
        Err(e) => return report.fail(dir, e),
    };
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                report.fail(dir, e);
                continue;
            }
        };
        let path = entry.path();
        match entry.file_type() {
            Ok(ft) if ft.is_dir() => {}
            Ok(_) => match fs::remove_file(&path) {
                Ok(()) => report.removed += 1,
                Err(e) => report.fail(&path, e),
            },
            Err(e) => report.fail(&path, e),
        }
    }
}

/// Depth-first removal that keeps going past entries it cannot delete.
fn remove_tree(path: &Path, report: &mut CleanupReport) {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return,
        Err(e) => return report.fail(path, e),
    };
    if !meta.is_dir() {
        return remove_entry(path, report);
    }

    match fs::read_dir(path) {
        Ok(entries) => {
            for entry in entries {
                match entry {
                    Ok(entry) => remove_tree(&entry.path(), report),
                    Err(e) => report.fail(path, e),
                }
            }
        }
        Err(e) => report.fail(path, e),
    }
    match fs::remove_dir(path) {
        Ok(()) => report.removed += 1,
        Err(e) => report.fail(path, e),
    }
}

fn remove_entry(path: &Path, report: &mut CleanupReport) {
    match fs::remove_file(path) {
        Ok(()) => report.removed += 1,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => report.fail(path, e),
    }
}
