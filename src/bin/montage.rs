use std::path::PathBuf;

use clap::{Parser, Subcommand};

use montage::error::Error;
use montage::project::Workspace;
use montage::status::JobStatus;

fn main() -> montage::Result<()> {
    montage::logging::init();

    let cli = Cli::parse();
    let workspace = Workspace::new(&cli.root);

    match cli.command {
        Command::Create { name } => {
            workspace.ensure()?;
            let project_dir = workspace.create_project(&name)?;
            println!("Project '{name}' initialized.");
            println!(
                "Put your narration audio into: {}",
                project_dir.join("input").display()
            );
        }

        Command::Sources => {
            let aliases = workspace.list_sources()?;
            if aliases.is_empty() {
                println!("Library is empty.");
            }
            for alias in aliases {
                match workspace.source_status(&alias) {
                    Ok(status) => println!("{alias}\t{}", summarize(&status)),
                    Err(Error::MissingInput(_)) => println!("{alias}\t(no status)"),
                    Err(err) => return Err(err),
                }
            }
        }

        Command::Status { source, project } => match (source, project) {
            (Some(alias), None) => {
                let status = workspace.source_status(&alias)?;
                println!("{}", summarize(&status));
            }
            (None, Some(name)) => {
                let Some(details) = workspace.project_details(&name)? else {
                    println!("Project '{name}' not found.");
                    return Ok(());
                };
                println!("project:  {}", details.name);
                println!("path:     {}", details.path.display());
                println!("audio:    {}", if details.audio_ready { "ready" } else { "missing" });
                println!("sources:  {}", details.sources.join(", "));
                match details.status {
                    Some(status) => println!("build:    {}", summarize(&status)),
                    None => println!("build:    never run"),
                }
            }
            _ => {
                eprintln!("Pass exactly one of --source or --project.");
                std::process::exit(2);
            }
        },

        Command::DeleteSource { alias } => {
            if workspace.delete_source(&alias)? {
                println!("Deleted source '{alias}'.");
            } else {
                println!("Source '{alias}' not found.");
            }
        }

        Command::DeleteProject { name } => {
            if workspace.delete_project(&name)? {
                println!("Deleted project '{name}'.");
            } else {
                println!("Project '{name}' not found.");
            }
        }
    }

    Ok(())
}

fn summarize(status: &JobStatus) -> String {
    format!(
        "{:?} {}% — {}",
        status.status, status.percent, status.progress_text
    )
}

#[derive(Parser, Debug)]
#[command(name = "montage")]
#[command(about = "Inspect and manage montage workspaces")]
struct Cli {
    /// Workspace root holding the library and projects.
    #[arg(short = 'r', long = "root", default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new project workspace.
    Create {
        /// Name of the project (e.g. matrix_essay).
        #[arg(long)]
        name: String,
    },

    /// List ingested sources and their status.
    Sources,

    /// Show the persisted status of a source or a project.
    Status {
        /// Source alias to inspect.
        #[arg(long)]
        source: Option<String>,

        /// Project name to inspect.
        #[arg(long)]
        project: Option<String>,
    },

    /// Remove a source from the library.
    DeleteSource {
        /// Source alias to delete.
        #[arg(long)]
        alias: String,
    },

    /// Remove a project.
    DeleteProject {
        /// Project name to delete.
        #[arg(long)]
        name: String,
    },
}
