//! Thin CLI surface over `pipeline_core` and `pipeline_health`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

mod logging;

#[derive(Parser)]
#[command(name = "pipeline-cli")]
#[command(about = "Code-intelligence indexing pipeline")]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run (or resume) an indexing pass over a project.
  Index {
    /// Project root to index. Defaults to the current directory.
    #[arg(short, long)]
    project: Option<PathBuf>,
    /// Target collection name.
    #[arg(short, long)]
    collection: String,
    /// Disable checkpoint resume for this run.
    #[arg(long)]
    no_resume: bool,
    /// Emit the final result as JSON instead of a human summary.
    #[arg(long)]
    json: bool,
  },
  /// Run the session-start health probe and print a welcome summary.
  SessionStart {
    /// Project root to check. Defaults to the current directory.
    #[arg(short, long)]
    project: Option<PathBuf>,
    /// Target collection name.
    #[arg(short, long)]
    collection: String,
    /// Soft time budget for the probe, in milliseconds.
    #[arg(long, default_value_t = 3000)]
    timeout_ms: u64,
    /// Emit the result as JSON instead of a human welcome message.
    #[arg(long)]
    json: bool,
  },
}

#[tokio::main]
async fn main() {
  logging::init();
  let cli = Cli::parse();

  let exit_code = match cli.command {
    Commands::Index {
      project,
      collection,
      no_resume,
      json,
    } => cmd_index(project, collection, no_resume, json).await,
    Commands::SessionStart {
      project,
      collection,
      timeout_ms,
      json,
    } => cmd_session_start(project, collection, timeout_ms, json).await,
  };

  std::process::exit(exit_code);
}

/// Runs an indexing pass wired to the workspace's deterministic collaborator
/// doubles. Real parser/embedder/vector-store implementations are an
/// integration concern outside this crate's scope; callers embedding
/// `pipeline-core` directly should construct `IndexingPipeline` with their
/// own `Parser`/`Embedder`/`VectorStore`.
async fn cmd_index(project: Option<PathBuf>, collection: String, no_resume: bool, json: bool) -> i32 {
  let project_path = project.unwrap_or_else(|| PathBuf::from("."));

  let mut config = pipeline_types::PipelineConfig::default();
  if no_resume {
    config.enable_resume = false;
  }
  if let Err(e) = config.validate() {
    eprintln!("invalid configuration: {e}");
    return 2;
  }

  let parser = Arc::new(pipeline_collab::doubles::FixtureParser::new(1));
  let embedder = Arc::new(pipeline_collab::doubles::DeterministicEmbedder::new(8));
  let store = Arc::new(pipeline_collab::doubles::InMemoryVectorStore::new());

  let git_root = pipeline_health::find_project_root(&project_path);
  let mut pipeline = pipeline_core::IndexingPipeline::new(project_path, config, parser, embedder, store);
  if git_root.join(".git").exists() {
    pipeline = pipeline.with_vcs(Arc::new(pipeline_collab::GitVcsClient::new(git_root)));
  }

  match pipeline.run(&collection).await {
    Ok(result) => {
      if json {
        println!("{}", serde_json::to_string_pretty(&result).unwrap_or_default());
      } else {
        print_index_summary(&result);
      }
      if result.success { 0 } else { 1 }
    }
    Err(e) => {
      eprintln!("indexing failed: {e}");
      match e {
        pipeline_types::PipelineError::Config(_) => 2,
        _ => 1,
      }
    }
  }
}

async fn cmd_session_start(project: Option<PathBuf>, collection: String, timeout_ms: u64, json: bool) -> i32 {
  let project_path = project.unwrap_or_else(|| PathBuf::from("."));
  let project_path = pipeline_health::find_project_root(&project_path);

  let store = Arc::new(pipeline_collab::doubles::InMemoryVectorStore::new());
  let vcs: Arc<dyn pipeline_collab::VcsClient> = if project_path.join(".git").exists() {
    Arc::new(pipeline_collab::GitVcsClient::new(&project_path))
  } else {
    Arc::new(pipeline_collab::doubles::NullVcsClient)
  };

  let probe = pipeline_health::HealthProbe::new(project_path.clone(), collection.clone(), store, vcs);
  let result = probe.execute(timeout_ms).await;

  if json {
    println!("{}", serde_json::to_string_pretty(&result).unwrap_or_default());
  } else {
    println!("{}", result.format_welcome_message());
  }

  result.exit_code()
}

fn print_index_summary(result: &pipeline_types::PipelineResult) {
  println!("Indexing complete:");
  println!("  Files processed: {}", result.files_processed);
  println!("  Files skipped:   {}", result.files_skipped);
  println!("  Files failed:    {}", result.files_failed);
  println!("  Entities:        {}", result.entities_created);
  println!("  Relations:       {}", result.relations_created);
  println!("  Chunks:          {}", result.implementation_chunks);
  println!("  Batches:         {}", result.batch_count);
  println!("  Time:            {:.1}s", result.total_time_seconds);
  if !result.warnings.is_empty() {
    println!("  Warnings:        {}", result.warnings.len());
  }
}
