mod logging;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use trellis_config::{Outcome, WorkflowSpec};
use trellis_engine::{AdvanceOutcome, BranchingEngine, EngineConfig, seed_initial_tasks};
use trellis_store::{
  InstanceStatus, SqliteStore, Store, TaskStatus, WorkflowInstance, WorkflowTemplate,
};
use trellis_workflow::{parse_spec, validate_json};

use logging::{LogLevel, init_logging};

/// Trellis - workflow instantiation and outcome-driven branching
#[derive(Parser)]
#[command(name = "trellis")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.trellis)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Database URL, overrides the database in the data directory
  #[arg(long, global = true)]
  database_url: Option<String>,

  /// Log level (falls back to TRELLIS_LOG, then info)
  #[arg(long, global = true, value_enum)]
  log_level: Option<LogLevel>,

  /// Upper bound on a single task creation, in milliseconds
  #[arg(long, global = true)]
  create_timeout_ms: Option<u64>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Check a workflow spec and print every problem found
  Validate {
    /// Path to the workflow spec (JSON)
    spec_file: PathBuf,
  },

  /// Print the tasks an instance of a spec would start with
  Seed {
    /// Path to the workflow spec (JSON)
    spec_file: PathBuf,

    /// Instance ID to seed for
    #[arg(long, default_value = "preview")]
    instance: String,
  },

  /// Manage workflow templates
  Template {
    #[command(subcommand)]
    action: TemplateAction,
  },

  /// Manage workflow instances
  Instance {
    #[command(subcommand)]
    action: InstanceAction,
  },

  /// Inspect and complete tasks
  Task {
    #[command(subcommand)]
    action: TaskAction,
  },
}

#[derive(Subcommand)]
enum TemplateAction {
  /// Validate a spec and store it as a template
  Register {
    /// Path to the workflow spec (JSON)
    spec_file: PathBuf,

    /// Template ID
    #[arg(long)]
    id: String,

    /// Display name (default: the template ID)
    #[arg(long)]
    name: Option<String>,

    #[arg(long, default_value_t = 1)]
    version: i32,
  },
}

#[derive(Subcommand)]
enum InstanceAction {
  /// Start an instance of a template and create its first tasks
  Start {
    /// Template ID
    template_id: String,

    #[arg(long, default_value_t = 1)]
    version: i32,

    /// Instance ID (default: a random UUID)
    #[arg(long)]
    instance: Option<String>,
  },

  /// Stop an instance; it receives no further tasks
  Cancel {
    /// Instance ID
    instance_id: String,
  },
}

#[derive(Subcommand)]
enum TaskAction {
  /// List the tasks of an instance
  List {
    /// Instance ID
    instance_id: String,
  },

  /// Record a task's outcome and create the tasks it unlocks
  Complete {
    /// Instance ID
    instance_id: String,

    /// The node ID whose task is completed
    node_id: String,

    /// Outcome label (aprovado, mudancas, rejeitado, ...)
    #[arg(long)]
    outcome: String,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_logging(cli.log_level);

  let Some(command) = cli.command else {
    println!("trellis - use --help to see available commands");
    return Ok(());
  };

  match command {
    Commands::Validate { spec_file } => run_validate(&spec_file),
    Commands::Seed {
      spec_file,
      instance,
    } => run_seed(&spec_file, &instance),
    command => {
      let settings = Settings {
        database_url: database_url(cli.data_dir, cli.database_url)?,
        engine: EngineConfig {
          create_timeout: cli.create_timeout_ms.map(Duration::from_millis),
        },
      };
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(async { run_stored(command, settings).await })
    }
  }
}

struct Settings {
  database_url: String,
  engine: EngineConfig,
}

fn database_url(data_dir: Option<PathBuf>, database_url: Option<String>) -> Result<String> {
  if let Some(url) = database_url {
    return Ok(url);
  }

  let data_dir = match data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".trellis"),
  };
  std::fs::create_dir_all(&data_dir)
    .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

  Ok(format!(
    "sqlite://{}?mode=rwc",
    data_dir.join("trellis.db").display()
  ))
}

fn read_document(spec_file: &Path) -> Result<String> {
  std::fs::read_to_string(spec_file)
    .with_context(|| format!("failed to read spec file: {}", spec_file.display()))
}

/// Read a spec file, refusing it unless it validates cleanly.
fn read_spec(spec_file: &Path) -> Result<WorkflowSpec> {
  let raw = read_document(spec_file)?;
  parse_spec(&raw).with_context(|| format!("invalid spec file: {}", spec_file.display()))
}

fn run_validate(spec_file: &Path) -> Result<()> {
  let errors = validate_json(&read_document(spec_file)?);

  if errors.is_empty() {
    println!("{}: ok", spec_file.display());
    return Ok(());
  }

  for error in &errors {
    println!("{error}");
  }
  eprintln!("{} error(s) in {}", errors.len(), spec_file.display());
  std::process::exit(1);
}

fn run_seed(spec_file: &Path, instance_id: &str) -> Result<()> {
  let spec = read_spec(spec_file)?;
  let requests = seed_initial_tasks(&spec, instance_id);
  println!("{}", serde_json::to_string_pretty(&requests)?);
  Ok(())
}

async fn run_stored(command: Commands, settings: Settings) -> Result<()> {
  let store = SqliteStore::connect(&settings.database_url)
    .await
    .with_context(|| format!("failed to open database: {}", settings.database_url))?;
  let store = Arc::new(store);

  match command {
    Commands::Template {
      action:
        TemplateAction::Register {
          spec_file,
          id,
          name,
          version,
        },
    } => {
      let spec = read_spec(&spec_file)?;

      let template = WorkflowTemplate {
        name: name.unwrap_or_else(|| id.clone()),
        template_id: id,
        version,
        spec,
      };
      store
        .put_template(&template)
        .await
        .context("failed to store template")?;

      info!(template_id = %template.template_id, version, "template registered");
      println!("{} v{}", template.template_id, template.version);
    }

    Commands::Instance {
      action:
        InstanceAction::Start {
          template_id,
          version,
          instance,
        },
    } => {
      let instance_id = instance.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
      store
        .get_template(&template_id, version)
        .await
        .with_context(|| format!("template '{template_id}' v{version} not found"))?;
      store
        .create_instance(&WorkflowInstance::new(&instance_id, &template_id, version))
        .await
        .context("failed to create instance")?;

      let engine = BranchingEngine::new(store, settings.engine);
      let outcome = engine.start_instance(&instance_id).await;
      eprintln!("Started instance: {instance_id}");
      print_outcome(&outcome)?;
    }

    Commands::Instance {
      action: InstanceAction::Cancel { instance_id },
    } => {
      store
        .update_instance_status(&instance_id, InstanceStatus::Canceled)
        .await
        .with_context(|| format!("failed to cancel instance '{instance_id}'"))?;

      info!(instance_id = %instance_id, "instance canceled");
      println!("{instance_id} canceled");
    }

    Commands::Task {
      action: TaskAction::List { instance_id },
    } => {
      let tasks = store
        .list_tasks(&instance_id)
        .await
        .context("failed to list tasks")?;
      println!("{}", serde_json::to_string_pretty(&tasks)?);
    }

    Commands::Task {
      action:
        TaskAction::Complete {
          instance_id,
          node_id,
          outcome,
        },
    } => {
      let outcome = Outcome::from(outcome);
      store
        .complete_task(&instance_id, &node_id, TaskStatus::Done, Some(outcome.clone()))
        .await
        .with_context(|| format!("failed to complete task '{node_id}' in '{instance_id}'"))?;

      let engine = BranchingEngine::new(store, settings.engine);
      let result = engine.advance(&instance_id, &node_id, &outcome).await;
      print_outcome(&result)?;
    }

    Commands::Validate { .. } | Commands::Seed { .. } => {
      bail!("command does not use the database")
    }
  }

  Ok(())
}

fn print_outcome(outcome: &AdvanceOutcome) -> Result<()> {
  if let Some(diagnostic) = &outcome.diagnostic {
    warn!(diagnostic = %diagnostic, "branching incomplete");
  }
  println!("{}", serde_json::to_string_pretty(outcome)?);
  Ok(())
}
