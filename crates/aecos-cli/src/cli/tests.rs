//! Argument-parsing unit tests.
#![allow(clippy::expect_used)]

use clap::Parser;

use super::{AuditAction, Cli, Command, RegulatoryAction, TemplateAction};

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).expect("arguments should parse")
}

#[test]
fn create_parses_repeatable_materials() {
    let cli = parse(&[
        "aecos", "create", "--class", "IfcWall", "--name", "W1", "--material", "concrete",
        "--material", "gypsum",
    ]);
    match cli.command {
        Command::Create {
            ifc_class,
            name,
            materials,
        } => {
            assert_eq!(ifc_class, "IfcWall");
            assert_eq!(name.as_deref(), Some("W1"));
            assert_eq!(materials, vec!["concrete".to_owned(), "gypsum".to_owned()]);
        }
        Command::Init { .. }
        | Command::Get { .. }
        | Command::List { .. }
        | Command::Update { .. }
        | Command::Delete { .. }
        | Command::Generate { .. }
        | Command::Check { .. }
        | Command::Search { .. }
        | Command::Template { .. }
        | Command::Audit { .. }
        | Command::Regulatory { .. }
        | Command::History { .. }
        | Command::Status => unreachable!("parsed the wrong command"),
    }
}

#[test]
fn generate_text_and_spec_conflict() {
    let result = Cli::try_parse_from([
        "aecos", "generate", "--text", "a wall", "--spec", "spec.json",
    ]);
    assert!(result.is_err());
}

#[test]
fn global_project_flag_applies_to_subcommands() {
    let cli = parse(&["aecos", "--project", "/tmp/site", "status"]);
    assert_eq!(cli.project, std::path::PathBuf::from("/tmp/site"));
    assert!(matches!(cli.command, Command::Status));
}

#[test]
fn template_subcommands_parse() {
    let cli = parse(&["aecos", "template", "promote", "ABCDEF0123456789ABCDEF"]);
    match cli.command {
        Command::Template {
            action: TemplateAction::Promote { element_id, .. },
        } => assert_eq!(element_id, "ABCDEF0123456789ABCDEF"),
        Command::Template { .. }
        | Command::Init { .. }
        | Command::Create { .. }
        | Command::Get { .. }
        | Command::List { .. }
        | Command::Update { .. }
        | Command::Delete { .. }
        | Command::Generate { .. }
        | Command::Check { .. }
        | Command::Search { .. }
        | Command::Audit { .. }
        | Command::Regulatory { .. }
        | Command::History { .. }
        | Command::Status => unreachable!("parsed the wrong command"),
    }
}

#[test]
fn audit_and_regulatory_actions_parse() {
    let cli = parse(&["aecos", "audit", "verify"]);
    assert!(matches!(
        cli.command,
        Command::Audit {
            action: AuditAction::Verify
        }
    ));

    let cli = parse(&[
        "aecos",
        "regulatory",
        "apply",
        "rules.json",
        "--code",
        "IBC2027",
        "--version",
        "2027.1",
    ]);
    assert!(matches!(
        cli.command,
        Command::Regulatory {
            action: RegulatoryAction::Apply { .. }
        }
    ));
}
