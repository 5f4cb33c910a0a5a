//! Multi-step generation pipeline CLI.
//!
//! Reads `agentflow.toml` and the workflow document from the project root,
//! runs steps against the configured generator command and writes generated
//! files under the codebase directory.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use agentflow::agents::{HandlerRegistry, StepEnv};
use agentflow::batch::process_text;
use agentflow::core::entry::find_entry_step;
use agentflow::core::extract::Extractor;
use agentflow::error::PipelineError;
use agentflow::executor::{RunOptions, RunStop, StepReport, StepStatus, check_handlers, run_workflow};
use agentflow::exit_codes;
use agentflow::io::config::{AgentflowConfig, CONFIG_FILE, ProjectPaths, load_config};
use agentflow::io::generator::CommandGenerator;
use agentflow::io::init::{InitOptions, init_project};
use agentflow::io::materialize::Materializer;
use agentflow::io::retry::{RetryController, ThreadSleeper};
use agentflow::io::version_log::VersionedLog;
use agentflow::io::workflow_store::load_workflow;
use agentflow::logging;
use agentflow::workflow::WorkflowGraph;

const CLI_LOG_CATEGORY: &str = "cli_logs";

#[derive(Parser)]
#[command(
    name = "agentflow",
    version,
    about = "Run a multi-step generation workflow and materialize the generated files"
)]
struct Cli {
    /// Project root holding agentflow.toml.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Log progress at info level (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write agentflow.toml, a default workflow and the output directories.
    Init {
        /// Overwrite an existing config and workflow.
        #[arg(short, long)]
        force: bool,
    },
    /// Check the config, the workflow document and every step's handler.
    Validate,
    /// Print the step a run would start from.
    Entry,
    /// Execute the workflow from its entry step.
    Run {
        /// Initial input, stored under the entry step's input_key.
        #[arg(long, conflicts_with = "input_file")]
        input: Option<String>,
        /// Read the initial input from a file (`-` for stdin).
        #[arg(long)]
        input_file: Option<PathBuf>,
        /// Start from this step instead of the resolved entry step.
        #[arg(long)]
        start: Option<String>,
    },
    /// Extract file records from a saved response (`-` for stdin).
    Extract {
        path: PathBuf,
        /// Write the records under the codebase directory instead of printing them.
        #[arg(long)]
        write: bool,
        /// Subdirectory of the codebase directory to write into.
        #[arg(long)]
        base_dir: Option<String>,
        /// Version log category for written files.
        #[arg(long, default_value = CLI_LOG_CATEGORY)]
        category: String,
    },
    /// Show logged versions: one file's history, or the most recent entries.
    History {
        /// File path relative to the step's base directory.
        path: Option<String>,
        #[arg(long, default_value = CLI_LOG_CATEGORY)]
        category: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// List generated files under the codebase directory.
    Files {
        /// Only this subdirectory.
        dir: Option<String>,
        /// Print an indented tree instead of a flat list.
        #[arg(long)]
        tree: bool,
    },
    /// Print one generated file.
    Show { path: String },
    /// Delete one generated file, keeping a backup unless told otherwise.
    Remove {
        path: String,
        #[arg(long)]
        no_backup: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let root = cli.root;
    match cli.command {
        Command::Init { force } => cmd_init(&root, force),
        Command::Validate => cmd_validate(&root),
        Command::Entry => cmd_entry(&root),
        Command::Run {
            input,
            input_file,
            start,
        } => {
            let input = match input_file {
                Some(path) => Some(read_input(&path)?),
                None => input,
            };
            cmd_run(&root, input, start)
        }
        Command::Extract {
            path,
            write,
            base_dir,
            category,
        } => cmd_extract(&root, &path, write, base_dir.as_deref(), &category),
        Command::History {
            path,
            category,
            limit,
        } => cmd_history(&root, path.as_deref(), &category, limit),
        Command::Files { dir, tree } => cmd_files(&root, dir.as_deref(), tree),
        Command::Show { path } => cmd_show(&root, &path),
        Command::Remove { path, no_backup } => cmd_remove(&root, &path, !no_backup),
    }
}

struct Project {
    config: AgentflowConfig,
    paths: ProjectPaths,
}

impl Project {
    fn load(root: &Path) -> Result<Self> {
        let config = load_config(&root.join(CONFIG_FILE))?;
        let paths = config.paths(root);
        Ok(Self { config, paths })
    }

    fn workflow(&self) -> Result<WorkflowGraph> {
        load_workflow(&self.paths.workflow_path, &self.config.default_entry_step)
    }

    fn materializer(&self, base_dir: Option<&str>, category: &str) -> Materializer {
        let root = match base_dir {
            Some(dir) => self.paths.codebase_dir.join(dir),
            None => self.paths.codebase_dir.clone(),
        };
        Materializer::new(root, VersionedLog::new(&self.paths.logs_dir, category))
    }
}

fn cmd_init(root: &Path, force: bool) -> Result<i32> {
    let paths = init_project(root, &InitOptions { force })?;
    println!("wrote {}", paths.config_path.display());
    println!("wrote {}", paths.workflow_path.display());
    Ok(exit_codes::OK)
}

fn cmd_validate(root: &Path) -> Result<i32> {
    let project = Project::load(root)?;
    let graph = project.workflow()?;
    check_handlers(&graph, &HandlerRegistry::builtin())?;
    let entry = find_entry_step(&graph, project.config.entry_policy)?;
    if !graph.contains(&entry) {
        return Err(PipelineError::configuration(format!("entry step '{entry}' is not defined")).into());
    }
    println!("ok: {} steps, entry {entry}", graph.len());
    Ok(exit_codes::OK)
}

fn cmd_entry(root: &Path) -> Result<i32> {
    let project = Project::load(root)?;
    let graph = project.workflow()?;
    println!("{}", find_entry_step(&graph, project.config.entry_policy)?);
    Ok(exit_codes::OK)
}

fn cmd_run(root: &Path, input: Option<String>, start: Option<String>) -> Result<i32> {
    let project = Project::load(root)?;
    let graph = project.workflow()?;
    let registry = HandlerRegistry::builtin();
    let generator = CommandGenerator::from_config(&project.config.generator);
    let sleeper = ThreadSleeper;
    let extractor = Extractor::default();
    let env = StepEnv {
        root: &project.paths.codebase_dir,
        logs_dir: &project.paths.logs_dir,
        generator: &generator,
        retry: RetryController::new(project.config.retry.policy(), &sleeper),
        extractor: &extractor,
    };
    let options = RunOptions {
        entry_policy: project.config.entry_policy,
        start,
        input,
    };

    let outcome = run_workflow(&graph, &registry, env, &options, print_report)?;
    let summary = outcome.executed.join(" -> ");
    match outcome.stop {
        RunStop::Completed => {
            println!("completed: {summary}");
            Ok(exit_codes::OK)
        }
        RunStop::CycleDetected { step, from } => {
            println!("stopped: {from} leads back to {step}, which already ran ({summary})");
            Ok(exit_codes::CYCLE)
        }
        RunStop::StepFailed { step, error } => {
            eprintln!("step {step} failed: {error}");
            if !summary.is_empty() {
                println!("completed before failure: {summary}");
            }
            Ok(exit_codes::STEP_FAILED)
        }
    }
}

fn print_report(report: &StepReport) {
    match report.status {
        StepStatus::Succeeded => println!(
            "[ok] {} ({}): {}",
            report.step, report.department, report.detail
        ),
        StepStatus::Failed => println!("[failed] {} ({})", report.step, report.department),
    }
}

fn cmd_extract(
    root: &Path,
    path: &Path,
    write: bool,
    base_dir: Option<&str>,
    category: &str,
) -> Result<i32> {
    let text = read_input(path)?;
    let extractor = Extractor::default();
    if !write {
        let Some((strategy, records)) = extractor.extract_named(&text) else {
            return Err(PipelineError::ExtractionEmpty.into());
        };
        eprintln!("{} record(s) via {strategy}", records.len());
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(exit_codes::OK);
    }

    let project = Project::load(root)?;
    let materializer = project.materializer(base_dir, category);
    let outcome = process_text(&text, &extractor, &materializer)?;
    for file in &outcome.written {
        println!("{} {} (v{})", file.operation.as_str(), file.relative, file.version);
    }
    for skipped in &outcome.skipped {
        eprintln!("skipped {}: {}", skipped.path, skipped.reason);
    }
    Ok(exit_codes::OK)
}

fn cmd_history(root: &Path, path: Option<&str>, category: &str, limit: usize) -> Result<i32> {
    let project = Project::load(root)?;
    let log = VersionedLog::new(&project.paths.logs_dir, category);
    let entries = match path {
        Some(path) => log.history(Path::new(path))?,
        None => log.recent(limit)?,
    };
    for entry in entries {
        println!(
            "v{} {} {} {} bytes {} {}",
            entry.version,
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.operation.as_str(),
            entry.file_size,
            entry.file_path,
            entry.description
        );
    }
    Ok(exit_codes::OK)
}

fn cmd_files(root: &Path, dir: Option<&str>, tree: bool) -> Result<i32> {
    let project = Project::load(root)?;
    if tree {
        let scoped = project.materializer(dir, CLI_LOG_CATEGORY);
        print!("{}", scoped.structure_summary()?);
    } else {
        for file in project.materializer(None, CLI_LOG_CATEGORY).list_files(dir)? {
            println!("{file}");
        }
    }
    Ok(exit_codes::OK)
}

fn cmd_show(root: &Path, path: &str) -> Result<i32> {
    let project = Project::load(root)?;
    let materializer = project.materializer(None, CLI_LOG_CATEGORY);
    match materializer.read_file(path)? {
        Some(contents) => {
            print!("{contents}");
            Ok(exit_codes::OK)
        }
        None => {
            eprintln!("{path}: not found");
            Ok(exit_codes::INVALID)
        }
    }
}

fn cmd_remove(root: &Path, path: &str, backup: bool) -> Result<i32> {
    let project = Project::load(root)?;
    let materializer = project.materializer(None, CLI_LOG_CATEGORY);
    if materializer.delete_file(path, backup)? {
        println!("removed {path}");
        Ok(exit_codes::OK)
    } else {
        eprintln!("{path}: not found");
        Ok(exit_codes::INVALID)
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::parse_from(["agentflow", "init"]);
        assert!(matches!(cli.command, Command::Init { force: false }));
        assert_eq!(cli.root, PathBuf::from("."));
    }

    #[test]
    fn parse_run_with_global_root() {
        let cli = Cli::parse_from(["agentflow", "run", "--input", "todo app", "--root", "/proj"]);
        assert_eq!(cli.root, PathBuf::from("/proj"));
        match cli.command {
            Command::Run { input, start, .. } => {
                assert_eq!(input.as_deref(), Some("todo app"));
                assert_eq!(start, None);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn input_and_input_file_conflict() {
        let result = Cli::try_parse_from([
            "agentflow",
            "run",
            "--input",
            "x",
            "--input-file",
            "y.txt",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn history_defaults() {
        let cli = Cli::parse_from(["agentflow", "history"]);
        match cli.command {
            Command::History {
                path,
                category,
                limit,
            } => {
                assert_eq!(path, None);
                assert_eq!(category, CLI_LOG_CATEGORY);
                assert_eq!(limit, 10);
            }
            _ => panic!("expected history"),
        }
    }
}
