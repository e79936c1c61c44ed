//! stageboard - drive the stage pipeline engine from the command line
//!
//! Usage:
//!   stageboard stages                                   # All registries
//!   stageboard stages -d commissions                    # One registry
//!   stageboard sanitize -d commissions record.json      # Print the sanitized record
//!   stageboard drag -d tasks --items items.json \
//!       --actor ana@example.com --role user \
//!       --item t-1 --from in_queue --from-index 0 --to done --to-index 0
//!
//! Configuration comes from `STAGEBOARD_CONFIG` (or `--config`), `.env` is honoured.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use stageboard_core::{
    interpret, Actor, Domain, DragGesture, MemoryRecordStore, PipelineConfig, PipelineController,
    PipelineItem, Record, RegistryCatalog, Role, Sanitizer, StaticIdentity,
};

#[derive(Parser)]
#[command(name = "stageboard")]
#[command(about = "Stage pipeline engine for ideas, commissions and tasks")]
struct Args {
    /// Config file (overrides STAGEBOARD_CONFIG)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List stage registries
    Stages {
        #[arg(short = 'd', long)]
        domain: Option<Domain>,
    },

    /// Sanitize a JSON record the way it would be sent to storage
    Sanitize {
        #[arg(short = 'd', long)]
        domain: Domain,
        /// JSON object file
        file: PathBuf,
    },

    /// Apply one drag gesture to items loaded from a JSON file
    Drag {
        #[arg(short = 'd', long)]
        domain: Domain,
        /// JSON array of items
        #[arg(long)]
        items: PathBuf,
        #[arg(long)]
        actor: Option<String>,
        #[arg(long, default_value = "viewer")]
        role: Role,
        #[arg(long)]
        item: String,
        #[arg(long)]
        from: String,
        #[arg(long, default_value = "0")]
        from_index: usize,
        /// Omit to simulate a drop outside every column
        #[arg(long)]
        to: Option<String>,
        #[arg(long, default_value = "0")]
        to_index: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::from_env()?,
    };
    let catalog = config.build_catalog()?;

    match args.command {
        Command::Stages { domain } => {
            print!("{}", render_stages(&catalog, domain));
            Ok(())
        }
        Command::Sanitize { domain, file } => {
            let record = read_record(&file)?;
            let sanitizer = Sanitizer::new(catalog.sanitize_rules(domain).clone());
            println!(
                "{}",
                serde_json::to_string_pretty(&sanitizer.sanitize(record))?
            );
            Ok(())
        }
        Command::Drag {
            domain,
            items,
            actor,
            role,
            item,
            from,
            from_index,
            to,
            to_index,
        } => {
            let items = read_items(&items)?;
            let actor = match actor {
                Some(identity) => Actor::new(identity, role),
                None => Actor::anonymous(),
            };
            let mut gesture = DragGesture::new(item.as_str(), from, from_index);
            if let Some(to) = to {
                gesture = gesture.dropped_on(to, to_index);
            }
            let output = run_drag(&config, &catalog, domain, items, actor, &gesture).await?;
            println!("{}", output);
            Ok(())
        }
    }
}

fn render_stages(catalog: &RegistryCatalog, domain: Option<Domain>) -> String {
    let domains: Vec<Domain> = match domain {
        Some(d) => vec![d],
        None => Domain::ALL.to_vec(),
    };

    let mut out = String::new();
    for domain in domains {
        let registry = catalog.registry(domain);
        out.push_str(&format!(
            "{} (default: {})\n",
            domain,
            registry.default_stage()
        ));
        for stage in registry.stages() {
            out.push_str(&format!("  {:<16} {}\n", stage.id, stage.display_label()));
        }
    }
    out
}

fn read_record(path: &Path) -> Result<Record> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON object", path.display()))
}

fn read_items(path: &Path) -> Result<Vec<PipelineItem>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing items in {}", path.display()))
}

/// Seed a memory store, apply the gesture, and render the outcome as JSON
async fn run_drag(
    config: &PipelineConfig,
    catalog: &RegistryCatalog,
    domain: Domain,
    items: Vec<PipelineItem>,
    actor: Actor,
    gesture: &DragGesture,
) -> Result<String> {
    let identity = match actor.identity {
        Some(_) => StaticIdentity::signed_in(actor),
        None => StaticIdentity::signed_out(),
    };
    let controller = PipelineController::new(
        domain,
        catalog,
        Arc::new(MemoryRecordStore::with_items(items)),
        Arc::new(identity),
        config,
    );
    controller.load().await?;

    let actor = controller.current_actor().await;
    let outcome = interpret(gesture, controller.registry());
    let rendered = match controller.apply_outcome(&actor, &outcome).await {
        Ok(Some(item)) => serde_json::to_string_pretty(&item)?,
        Ok(None) => serde_json::to_string_pretty(&outcome)?,
        Err(e) => serde_json::to_string_pretty(&serde_json::json!({ "error": e.to_string() }))?,
    };
    Ok(rendered)
}
