//! Unit tests for CLI argument parsing.

use super::*;
use clap::CommandFactory;
use rstest::rstest;

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn import_takes_archive_and_optional_name() {
    let cli = Cli::parse_from(["module-importer", "import", "/tmp/upload", "--name", "demo.tgz"]);

    let Command::Import(args) = cli.command else {
        panic!("expected import command");
    };
    assert_eq!(args.archive.as_str(), "/tmp/upload");
    assert_eq!(args.name.as_deref(), Some("demo.tgz"));
}

#[rstest]
#[case::before_subcommand(&["module-importer", "--modules-root", "/srv/m", "list"])]
#[case::after_subcommand(&["module-importer", "list", "--modules-root", "/srv/m"])]
fn global_roots_are_accepted_anywhere(#[case] argv: &[&str]) {
    let cli = Cli::parse_from(argv);

    assert_eq!(
        cli.modules_root.as_ref().map(|p| p.as_str()),
        Some("/srv/m")
    );
    assert!(matches!(cli.command, Command::List(ListArgs { json: false })));
}

#[rstest]
#[case::list(&["module-importer", "list", "--json"])]
#[case::limits(&["module-importer", "limits", "--json"])]
fn json_flag_is_parsed(#[case] argv: &[&str]) {
    let cli = Cli::parse_from(argv);
    let json = match cli.command {
        Command::List(args) => args.json,
        Command::Limits(args) => args.json,
        other => panic!("unexpected command {other:?}"),
    };
    assert!(json);
}

#[rstest]
#[case::setup("setup")]
#[case::teardown("teardown")]
fn hooks_take_no_arguments(#[case] name: &str) {
    let cli = Cli::parse_from(["module-importer", name]);
    assert!(matches!(cli.command, Command::Setup | Command::Teardown));
}

#[test]
fn import_requires_archive() {
    let result = Cli::try_parse_from(["module-importer", "import"]);
    assert!(result.is_err());
}

#[test]
fn subcommand_is_required() {
    let result = Cli::try_parse_from(["module-importer"]);
    assert!(result.is_err());
}

#[test]
fn importer_config_applies_overrides() {
    let cli = Cli::parse_from([
        "module-importer",
        "--temp-root",
        "/var/tmp/imports",
        "setup",
    ]);

    let config = cli.importer_config().expect("default config");

    assert_eq!(config.temp_root.as_str(), "/var/tmp/imports");
    assert_eq!(config.modules_root.as_str(), "/usr/share/zabbix/modules");
}

#[test]
fn importer_config_reports_missing_file() {
    let cli = Cli::parse_from(["module-importer", "--config", "/nonexistent.toml", "list"]);
    assert!(cli.importer_config().is_err());
}
