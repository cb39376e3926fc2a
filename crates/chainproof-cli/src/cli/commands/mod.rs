use std::future::Future;
use std::path::Path;

use anyhow::Context;
use chainproof_core::{load_config_or_default, RunError, ServiceConfig};
use serde_json::{json, Value};

use super::args::{Cli, Command};
use crate::exit_codes;

pub mod health;
pub mod run;
pub mod validate;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let Cli {
        config,
        project_root,
        cmd,
        ..
    } = cli;
    let load = || load_service_config(&config, project_root.as_deref());

    match cmd {
        Command::Run(args) => run::run(args, load()?).await,
        Command::Validate(args) => validate::run(args, load()?).await,
        Command::Health(args) => health::run(args, load()?),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::SUCCESS)
        }
    }
}

fn load_service_config(path: &Path, project_root: Option<&Path>) -> anyhow::Result<ServiceConfig> {
    let cfg = load_config_or_default(path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    Ok(match project_root {
        Some(root) => cfg.with_project_root(root),
        None => cfg,
    })
}

/// Drives `work` to completion unless Ctrl-C arrives first. On Ctrl-C the
/// future is dropped, which kills the external process group and removes
/// staged files, and `None` is returned.
pub(crate) async fn until_interrupted<F: Future>(work: F) -> Option<F::Output> {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::debug!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };
    tokio::select! {
        biased;
        () = interrupt => {
            tracing::warn!("interrupted, stopping external process");
            None
        }
        out = work => Some(out),
    }
}

pub(crate) fn exit_code_for(err: &RunError) -> i32 {
    if err.is_infra() {
        exit_codes::INFRA_ERROR
    } else {
        exit_codes::CONFIG_ERROR
    }
}

/// Machine-readable error document shared by `run` and `validate`.
pub(crate) fn error_json(message: &str, err: &RunError, raw_output: Option<&str>) -> Value {
    let mut doc = json!({
        "status": "error",
        "message": message,
        "error": err.to_string(),
        "kind": err.kind(),
    });
    if let Some(raw) = raw_output {
        doc["rawOutput"] = Value::String(raw.to_string());
    }
    doc
}

pub(crate) fn write_output(rendered: &str, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => std::fs::write(path, rendered)
            .map_err(|e| anyhow::anyhow!("failed to write {}: {}", path.display(), e)),
        None => {
            println!("{}", rendered);
            Ok(())
        }
    }
}
