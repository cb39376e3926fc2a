use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "chainproof",
    version,
    about = "Run smart-contract test suites in a scratch workspace and report pass/fail and coverage"
)]
pub struct Cli {
    #[arg(long, global = true, default_value = "chainproof.yaml", env = "CHAINPROOF_CONFIG")]
    pub config: PathBuf,

    /// Overrides `project.root` from the config file
    #[arg(long, global = true, env = "CHAINPROOF_PROJECT_ROOT")]
    pub project_root: Option<PathBuf>,

    /// Log filter (e.g. `debug`, `chainproof_core=trace`); defaults to RUST_LOG or `info`
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Stage a contract and its tests, run them with coverage, report results
    Run(RunArgs),
    /// Check a test source for syntax errors
    Validate(ValidateArgs),
    /// Report whether the project tree and validator script are in place
    Health(HealthArgs),
    Version,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(clap::Args, Clone, Debug)]
pub struct RunArgs {
    /// Solidity source of the contract under test
    #[arg(long)]
    pub contract: PathBuf,

    /// JavaScript test suite
    #[arg(long)]
    pub test: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Write the report here instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Clone, Debug)]
pub struct ValidateArgs {
    /// Test source to check
    #[arg(long)]
    pub file: PathBuf,

    /// Name reported in the verdict; defaults to the file name
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(clap::Args, Clone, Debug)]
pub struct HealthArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "chainproof",
            "run",
            "--contract",
            "Token.sol",
            "--test",
            "token.js",
            "--project-root",
            "hardhat",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.project_root, Some(PathBuf::from("hardhat")));
        match cli.cmd {
            Command::Run(args) => {
                assert_eq!(args.contract, PathBuf::from("Token.sol"));
                assert_eq!(args.format, OutputFormat::Json);
            }
            _ => panic!("expected run"),
        }
    }
}
