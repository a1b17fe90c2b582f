use crate::config::{self, ConfigKey};
use crate::engine::ScriptEngine;
use crate::model::{MessageLevel, Project};
use crate::orchestrator::{BuildOrchestrator, TemplateSource};
use crate::sink::ConsoleSink;
use crate::storage::{ConfigStore, FileConfigStore};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "j2objc-export",
    version,
    about = "Configure and run j2objc Objective-C exports for a Java project"
)]
pub struct Cli {
    /// Project root directory
    #[arg(long, global = true, default_value = ".")]
    pub project: PathBuf,

    /// Build template: `bundled`, a file path, or an http(s) URL
    #[arg(long, global = true, env = "J2OBJC_EXPORT_TEMPLATE", default_value = "bundled")]
    pub template: String,

    /// Directory holding per-project settings
    #[arg(long, global = true, env = "J2OBJC_EXPORT_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Diagnostics verbosity (error, warn, info, debug); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "error")]
    pub log_level: MessageLevel,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Export generated Objective-C files from SOURCE into DESTINATION
    Export {
        #[arg(long)]
        source: PathBuf,
        #[arg(long)]
        destination: PathBuf,
    },
    /// Remove internally generated classpath and prefix files
    Cleanup,
    /// Inspect or change translator settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Inspect or replace the translator classpath
    Classpath {
        #[command(subcommand)]
        action: ClasspathAction,
    },
    /// Print the translator flags the current settings produce
    Flags,
}

#[derive(Debug, Subcommand, Clone)]
pub enum ConfigAction {
    /// Print every setting
    Show,
    /// Print one setting
    Get { key: ConfigKey },
    /// Store one setting
    Set { key: ConfigKey, value: String },
    /// Clear one setting
    Unset { key: ConfigKey },
    /// Write default settings unless the project already has some
    Init,
}

#[derive(Debug, Subcommand, Clone)]
pub enum ClasspathAction {
    /// Print classpath entries, one per line
    Show,
    /// Replace the classpath with ENTRIES
    Set { entries: Vec<String> },
}

pub async fn run(args: Cli) -> Result<()> {
    let project = resolve_project(&args.project)?;
    let store = open_store(&args)?;

    match &args.command {
        Command::Export {
            source,
            destination,
        } => run_export(&args, &project, &store, source, destination).await,
        Command::Cleanup => {
            let orchestrator = build_orchestrator(&args);
            orchestrator.run_cleanup(&project).await?;
            Ok(())
        }
        Command::Config { action } => run_config(&project, &store, action),
        Command::Classpath { action } => match action {
            ClasspathAction::Show => {
                for entry in store.classpath(&project)? {
                    println!("{entry}");
                }
                Ok(())
            }
            ClasspathAction::Set { entries } => store.set_classpath(&project, entries),
        },
        Command::Flags => {
            println!("{}", shell_words(&project_flags(&project, &store)?)?);
            Ok(())
        }
    }
}

fn resolve_project(path: &Path) -> Result<Project> {
    let root = std::fs::canonicalize(path)
        .with_context(|| format!("project directory {} not found", path.display()))?;
    anyhow::ensure!(root.is_dir(), "{} is not a directory", root.display());
    Ok(Project::from_root(root))
}

fn open_store(args: &Cli) -> Result<FileConfigStore> {
    let dir = match &args.config_dir {
        Some(dir) => dir.clone(),
        None => FileConfigStore::default_dir()?,
    };
    Ok(FileConfigStore::new(dir))
}

fn build_orchestrator(args: &Cli) -> BuildOrchestrator {
    BuildOrchestrator::new(
        TemplateSource::parse(&args.template),
        Arc::new(ScriptEngine::new()),
        Arc::new(ConsoleSink::new()),
    )
    .with_message_level(args.log_level)
}

fn project_flags(project: &Project, store: &dyn ConfigStore) -> Result<Vec<String>> {
    let record = store.load(project)?;
    let classpath = store.classpath(project)?;
    let prefix_file = project
        .has_prefix_properties_file()
        .then(|| project.prefix_properties_file());
    Ok(config::translator_flags(
        &record,
        &classpath,
        prefix_file.as_deref(),
    ))
}

/// Join flags into one shell-quoted string, keeping paths with spaces intact.
fn shell_words(flags: &[String]) -> Result<String> {
    shlex::try_join(flags.iter().map(String::as_str)).context("quote translator flags")
}

async fn run_export(
    args: &Cli,
    project: &Project,
    store: &dyn ConfigStore,
    source: &Path,
    destination: &Path,
) -> Result<()> {
    let source = project.root.join(source);
    anyhow::ensure!(
        source.is_dir(),
        "source directory {} does not exist",
        source.display()
    );
    let destination = project.root.join(destination);
    std::fs::create_dir_all(&destination)
        .with_context(|| format!("create destination directory {}", destination.display()))?;

    let flags = project_flags(project, store)?;
    let flags = if flags.is_empty() {
        None
    } else {
        Some(shell_words(&flags)?)
    };

    build_orchestrator(args)
        .run_export(
            project,
            &source.to_string_lossy(),
            &destination.to_string_lossy(),
            flags.as_deref(),
        )
        .await?;
    Ok(())
}

fn run_config(project: &Project, store: &dyn ConfigStore, action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let record = store.load(project)?;
            for (key, value) in record.iter() {
                let shown = match value {
                    Some(v) => v,
                    None if key.is_text() => "",
                    None => "<unset>",
                };
                println!("{key} = {shown}");
            }
        }
        ConfigAction::Get { key } => {
            if let Some(value) = store.get(project, *key)? {
                println!("{value}");
            }
        }
        ConfigAction::Set { key, value } => {
            let mut record = store.load(project)?;
            record.set(*key, value.clone());
            store.set_all(project, &record)?;
        }
        ConfigAction::Unset { key } => {
            let mut record = store.load(project)?;
            record.unset(*key);
            store.set_all(project, &record)?;
        }
        ConfigAction::Init => {
            let record = store.load(project)?;
            if record.defaults_initialized() {
                tracing::info!(project = %project.name, "settings already initialized");
            } else {
                store.set_all(project, &config::default_record())?;
            }
        }
    }
    Ok(())
}
