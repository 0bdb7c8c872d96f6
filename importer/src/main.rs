//! Module importer CLI entrypoint.
//!
//! This binary runs the import pipeline on a package already on disk, lists
//! installed modules, and runs the importer's own install and uninstall
//! hooks. Import responses are printed to stdout as JSON.

use clap::Parser;
use module_importer::cli::{Cli, Command};
use module_importer::commands::{run_import, run_limits, run_setup, run_teardown};
use module_importer::error::CommandError;
use module_importer::list::run_list;
use module_importer::output::write_stderr_line;
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

/// Outcome of a command that ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Done,
    ImportRejected,
}

fn run(
    cli: &Cli,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<Outcome, CommandError> {
    let config = cli.importer_config()?;

    match &cli.command {
        Command::Import(args) => {
            let response = run_import(args, &config, stdout, stderr)?;
            Ok(if response.success {
                Outcome::Done
            } else {
                Outcome::ImportRejected
            })
        }
        Command::List(args) => run_list(args, &config, stdout).map(|()| Outcome::Done),
        Command::Limits(args) => run_limits(args, &config, stdout).map(|()| Outcome::Done),
        Command::Setup => run_setup(&config, stderr).map(|()| Outcome::Done),
        Command::Teardown => run_teardown(&config, stderr).map(|()| Outcome::Done),
    }
}

fn exit_code_for_run_result(result: Result<Outcome, CommandError>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(Outcome::Done) => 0,
        Ok(Outcome::ImportRejected) => 1,
        Err(err) => {
            write_stderr_line(stderr, err);
            2
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use module_importer::config::ConfigError;
    use rstest::rstest;

    #[rstest]
    #[case::done(Outcome::Done, 0)]
    #[case::rejected(Outcome::ImportRejected, 1)]
    fn exit_code_reflects_outcome(#[case] outcome: Outcome, #[case] expected: i32) {
        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Ok(outcome), &mut stderr);
        assert_eq!(exit_code, expected);
        assert!(stderr.is_empty());
    }

    #[test]
    fn exit_code_for_run_result_prints_error_and_returns_two() {
        let err = CommandError::Config(ConfigError::Read {
            path: "/etc/module-importer.toml".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });

        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Err(err), &mut stderr);
        assert_eq!(exit_code, 2);

        let stderr_text = String::from_utf8(stderr).expect("stderr was not UTF-8");
        assert!(stderr_text.contains("failed to read configuration file"));
    }

    #[test]
    fn run_reports_bad_config_before_dispatch() {
        let cli = Cli::parse_from(["module-importer", "--config", "/nonexistent.toml", "list"]);
        let mut stdout = Vec::new();

        let result = run(&cli, &mut stdout, &mut Vec::new());

        assert!(matches!(result, Err(CommandError::Config(_))));
        assert!(stdout.is_empty());
    }
}
