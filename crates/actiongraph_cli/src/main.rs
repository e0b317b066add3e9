// SPDX-License-Identifier: MIT OR Apache-2.0
//! `actiongraph` - run action graph documents from the command line.
//!
//! Loads the library described by a RON config (plus the paths listed in
//! `ACTIONGRAPH_LIB_PATH`), reads a `.agraph` document and executes it.

use actiongraph_core::{Document, ExecMode, ExecOutcome, Library, LibraryConfig, Result, EXEC_MAIN};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "actiongraph", version, about = "Run action graph documents")]
struct Cli {
    /// Path to a library config file (RON)
    #[arg(short, long, env = "ACTIONGRAPH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a graph document
    Run {
        /// The `.agraph` file to execute
        graph: PathBuf,
        /// Execution mode: `new` runs the whole graph, `step` runs only its
        /// first object. A freshly loaded document has no halted run, so
        /// `resume` is not offered here.
        #[arg(short, long, default_value = "new", value_parser = ["new", "step"])]
        mode: String,
        /// Exec name to run
        #[arg(short, long, default_value = EXEC_MAIN)]
        exec_name: String,
        /// Ignore breakpoints
        #[arg(long)]
        no_break: bool,
    },
    /// List library actions and graph templates
    List {
        /// Wildcard name pattern
        pattern: Option<String>,
        /// Only actions with this tag
        #[arg(long)]
        tag: Option<String>,
    },
}

fn load_library(config: Option<&Path>) -> Result<Library> {
    let config = match config {
        Some(path) => LibraryConfig::load(path)?,
        None => LibraryConfig::default(),
    };
    Library::from_config(&config.with_env_paths())
}

fn run(library: &Library, path: &Path, mode: &str, exec_name: &str, no_break: bool) -> Result<ExecOutcome> {
    let mode: ExecMode = mode.parse()?;
    let name = path.file_stem().map_or_else(|| "root".into(), |s| s.to_string_lossy());
    let mut doc = Document::new();
    let graph = doc.create_graph(&name, None)?;
    doc.read(graph, path, library)?;
    doc.execute(graph, mode, exec_name, no_break)
}

fn main() -> ExitCode {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("actiongraph_core=info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let library = match load_library(cli.config.as_deref()) {
        Ok(library) => library,
        Err(e) => {
            tracing::error!("Failed to load library: {e}");
            return ExitCode::from(2);
        }
    };

    match cli.command {
        Commands::List { pattern, tag } => {
            for id in library.list_actions(tag.as_deref(), None, pattern.as_deref()) {
                println!("action  {id}");
            }
            if tag.is_none() {
                for id in library.list_graphs(None, pattern.as_deref()) {
                    println!("graph   {id}");
                }
            }
            ExitCode::SUCCESS
        }
        Commands::Run { graph, mode, exec_name, no_break } => {
            match run(&library, &graph, &mode, &exec_name, no_break) {
                Ok(ExecOutcome::Completed) => ExitCode::SUCCESS,
                Ok(ExecOutcome::Breakpoint(_) | ExecOutcome::Stepped) => {
                    tracing::info!("Execution paused");
                    ExitCode::SUCCESS
                }
                Ok(ExecOutcome::Failed(_)) => ExitCode::FAILURE,
                Err(e) => {
                    tracing::error!("{e}");
                    ExitCode::from(2)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_modes() {
        let cli = Cli::try_parse_from(["actiongraph", "run", "rig.agraph", "--mode", "step"]).unwrap();
        assert!(matches!(cli.command, Commands::Run { ref mode, .. } if mode == "step"));
        let cli = Cli::try_parse_from(["actiongraph", "run", "rig.agraph"]).unwrap();
        assert!(matches!(cli.command, Commands::Run { ref mode, no_break: false, .. } if mode == "new"));
        assert!(Cli::try_parse_from(["actiongraph", "run", "rig.agraph", "--mode", "resume"]).is_err());
    }
}
