pub mod cli;
pub mod cmd;
pub mod error;
pub mod format;

pub use cli::{AuditAction, Cli, Command, RegulatoryAction, TemplateAction};

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() {
    // RUST_LOG controls verbosity; quiet by default.
    let _init = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();

    if let Err(e) = dispatch(&cli) {
        eprintln!("{}", e.message());
        std::process::exit(e.exit_code());
    }
}

/// Dispatches the parsed arguments to the matching command handler.
fn dispatch(cli: &Cli) -> Result<(), error::CliError> {
    match &cli.command {
        Command::Init { name } => cmd::init::run(&cli.project, name, &cli.user, cli.no_commit),

        Command::Create {
            ifc_class,
            name,
            materials,
        } => {
            let os = cmd::open_facade(&cli.project, &cli.user, cli.no_commit)?;
            cmd::element::create(&os, ifc_class, name.as_deref(), materials)
        }

        Command::Get { element_id } => {
            let os = cmd::open_facade(&cli.project, &cli.user, cli.no_commit)?;
            cmd::element::get(&os, element_id)
        }

        Command::List {
            ifc_class,
            name,
            material,
        } => {
            let os = cmd::open_facade(&cli.project, &cli.user, cli.no_commit)?;
            cmd::element::list(&os, ifc_class.as_deref(), name.as_deref(), material.as_deref())
        }

        Command::Update {
            element_id,
            name,
            materials,
        } => {
            let os = cmd::open_facade(&cli.project, &cli.user, cli.no_commit)?;
            cmd::element::update(&os, element_id, name.as_deref(), materials)
        }

        Command::Delete { element_id } => {
            let os = cmd::open_facade(&cli.project, &cli.user, cli.no_commit)?;
            cmd::element::delete(&os, element_id)
        }

        Command::Generate {
            text,
            spec_file,
            region,
        } => {
            let os = cmd::open_facade(&cli.project, &cli.user, cli.no_commit)?;
            cmd::generate::run(&os, text.as_deref(), spec_file.as_deref(), region.as_deref())
        }

        Command::Check {
            element_id,
            region,
            markdown,
        } => {
            let os = cmd::open_facade(&cli.project, &cli.user, cli.no_commit)?;
            cmd::check::run(&os, element_id, region.as_deref(), *markdown)
        }

        Command::Search {
            ifc_class,
            material,
            name,
            region,
            keyword,
        } => {
            let os = cmd::open_facade(&cli.project, &cli.user, cli.no_commit)?;
            cmd::search::run(
                &os,
                ifc_class.as_deref(),
                material.as_deref(),
                name.as_deref(),
                region.as_deref(),
                keyword.as_deref(),
            )
        }

        Command::Template { action } => {
            let mut os = cmd::open_facade(&cli.project, &cli.user, cli.no_commit)?;
            match action {
                TemplateAction::Promote {
                    element_id,
                    id,
                    author,
                    description,
                } => cmd::template::promote(&mut os, element_id, id.as_deref(), author, description),
                TemplateAction::List => cmd::template::list(&os),
                TemplateAction::Remove { template_id } => {
                    cmd::template::remove(&mut os, template_id)
                }
            }
        }

        Command::Audit { action } => {
            let os = cmd::open_facade(&cli.project, &cli.user, cli.no_commit)?;
            match action {
                AuditAction::Log {
                    resource,
                    user,
                    action,
                } => cmd::audit::log(&os, resource.as_deref(), user.as_deref(), action.as_deref()),
                AuditAction::Verify => cmd::audit::verify(&os),
                AuditAction::Export => cmd::audit::export(&os),
            }
        }

        Command::Regulatory { action } => {
            let os = cmd::open_facade(&cli.project, &cli.user, cli.no_commit)?;
            match action {
                RegulatoryAction::Diff { file } => cmd::regulatory::diff(&os, file),
                RegulatoryAction::Apply {
                    file,
                    code,
                    version,
                } => cmd::regulatory::apply(&os, file, code, version),
                RegulatoryAction::Impact { file } => cmd::regulatory::impact(&os, file),
            }
        }

        Command::History { element_id, limit } => {
            let os = cmd::open_facade(&cli.project, &cli.user, cli.no_commit)?;
            cmd::history::run(&os, element_id, *limit)
        }

        Command::Status => {
            let os = cmd::open_facade(&cli.project, &cli.user, cli.no_commit)?;
            cmd::status::run(&os)
        }
    }
}
