use chainproof_core::process::CommandSpec;
use chainproof_core::ServiceConfig;
use serde::Serialize;

use super::write_output;
use crate::cli::args::{HealthArgs, OutputFormat};
use crate::exit_codes;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HealthReport {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub project_root: String,
    pub project_root_present: bool,
    pub validator_script: String,
    pub validator_script_present: bool,
    pub runner: String,
}

impl HealthReport {
    pub(crate) fn check(cfg: &ServiceConfig) -> Self {
        let root = cfg.project_root();
        let script = cfg.validator_script();
        let project_root_present = root.is_dir();
        let validator_script_present = script.is_file();
        let runner = CommandSpec::new(&cfg.runner.program).args(cfg.runner.args.iter().cloned());
        Self {
            status: if project_root_present && validator_script_present {
                "ok"
            } else {
                "degraded"
            },
            service: "chainproof",
            version: env!("CARGO_PKG_VERSION"),
            project_root: root.display().to_string(),
            project_root_present,
            validator_script: script.display().to_string(),
            validator_script_present,
            runner: runner.display(),
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

pub fn run(args: HealthArgs, cfg: ServiceConfig) -> anyhow::Result<i32> {
    let report = HealthReport::check(&cfg);
    match args.format {
        OutputFormat::Json => write_output(&serde_json::to_string_pretty(&report)?, None)?,
        OutputFormat::Text => {
            let mark = |present: bool| if present { "✔" } else { "✖" };
            println!("{} {} ({})", report.service, report.version, report.status);
            println!(
                "  {} project root     {}",
                mark(report.project_root_present),
                report.project_root
            );
            println!(
                "  {} validator script {}",
                mark(report.validator_script_present),
                report.validator_script
            );
            println!("    runner           {}", report.runner);
        }
    }
    Ok(if report.is_ok() {
        exit_codes::SUCCESS
    } else {
        exit_codes::INFRA_ERROR
    })
}
