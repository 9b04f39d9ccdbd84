//! Reference tree inspector
//!
//! Loads a references payload (`{ items, includes }`, as returned by the
//! references endpoint) from disk, builds the reference tree and prints it the
//! way the references view would render it.
//!
//! # Usage
//!
//! ```bash
//! # Inline view (max level 5)
//! cargo run --bin ref-tree -- payload.json
//!
//! # Full tab view, explicit root, JSON output
//! cargo run --bin ref-tree -- payload.json --full-tab --root my-entry --json
//!
//! # Show what a publish would send
//! cargo run --bin ref-tree -- payload.json --dry-run publish
//! ```
//!
//! Logging follows `RUST_LOG` (defaults to `info`). `REFGRAPH_MAX_LEVEL`
//! overrides the default max level.

use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, ValueEnum};
use refgraph_core::{
    BulkAction, BulkActionReport, BulkActionService, CardNode, Entity, ReferenceServiceError,
    ReferenceSource, ReferencesService, TreeConfig,
};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "ref-tree", about = "Print the reference tree of a content entity")]
struct Cli {
    /// Path to a references payload (`{ items, includes }`)
    payload: PathBuf,

    /// Id of the root entity (defaults to the first item)
    #[arg(long)]
    root: Option<String>,

    /// Collapse references below this level
    #[arg(long, conflicts_with = "full_tab")]
    max_level: Option<usize>,

    /// Use the references tab depth instead of the inline one
    #[arg(long)]
    full_tab: bool,

    /// Start with nothing selected
    #[arg(long)]
    no_select: bool,

    /// Print rendered cards as JSON
    #[arg(long)]
    json: bool,

    /// Run a bulk action against a no-op backend and print the result
    #[arg(long, value_enum)]
    dry_run: Option<ActionArg>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ActionArg {
    Publish,
    Validate,
}

impl From<ActionArg> for BulkAction {
    fn from(value: ActionArg) -> Self {
        match value {
            ActionArg::Publish => BulkAction::Publish,
            ActionArg::Validate => BulkAction::Validate,
        }
    }
}

/// Serves one payload from disk regardless of the requested id
struct FileReferenceSource {
    path: PathBuf,
}

#[async_trait]
impl ReferenceSource for FileReferenceSource {
    async fn fetch_references(&self, _entity_id: &str) -> Result<Value, ReferenceServiceError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            ReferenceServiceError::fetch_failed(format!("{}: {}", self.path.display(), e))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| ReferenceServiceError::malformed_response(e.to_string()))
    }
}

/// Bulk action backend that succeeds for everything without side effects
struct DryRunBulkActions;

#[async_trait]
impl BulkActionService for DryRunBulkActions {
    async fn run(
        &self,
        action: BulkAction,
        entities: &[Arc<Entity>],
    ) -> Result<BulkActionReport, ReferenceServiceError> {
        let mut report = BulkActionReport::new(action);
        for entity in entities {
            tracing::info!("[dry run] would {} {} ({})", action, entity.id(), entity.entity_type());
            report.succeeded.push(entity.id().to_string());
        }
        Ok(report)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = if cli.full_tab {
        TreeConfig::full_tab()
    } else {
        TreeConfig::from_env().map_err(|e| anyhow::anyhow!(e))?
    };
    if let Some(max_level) = cli.max_level {
        config.max_level = max_level;
    }
    config.select_all_by_default = !cli.no_select;

    let root_id = match &cli.root {
        Some(id) => id.clone(),
        None => first_item_id(&cli.payload).await?,
    };

    let source = Arc::new(FileReferenceSource {
        path: cli.payload.clone(),
    });
    let service = ReferencesService::new(source, Arc::new(DryRunBulkActions), config)?;

    let tree = service
        .load(&root_id)
        .await
        .with_context(|| format!("unable to display references of {}", root_id))?;

    if let Some(action) = cli.dry_run {
        let outcome = service.run_bulk_action(action.into()).await?;
        println!("{}", serde_json::to_string_pretty(&outcome.report)?);
        return Ok(());
    }

    let cards = service.cards().await?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&cards)?);
    } else {
        print_cards(&cards, 0);
        println!();
        println!(
            "{} references ({} unique), depth {}",
            tree.stats.total_references, tree.stats.unique_entities, tree.stats.max_depth
        );
    }

    if tree.stats.exceeds_max_level {
        eprintln!(
            "warning: references go deeper than the {} levels shown",
            tree.max_level
        );
    }
    if tree.stats.hit_failsafe {
        eprintln!("warning: traversal stopped at the failsafe depth");
    }

    Ok(())
}

async fn first_item_id(path: &PathBuf) -> anyhow::Result<String> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let payload: Value = serde_json::from_str(&raw)?;
    payload["items"][0]["sys"]["id"]
        .as_str()
        .map(str::to_string)
        .context("payload has no items[0].sys.id")
}

fn print_cards(node: &CardNode, depth: usize) {
    let indent = "  ".repeat(depth);
    match node {
        CardNode::Card(card) => {
            let mut line = format!(
                "{}{} {} {}",
                indent,
                if card.is_selected { "[x]" } else { "[ ]" },
                card.entity_type,
                card.entity_id
            );
            if let Some(title) = &card.title {
                line.push_str(&format!(" \"{}\"", title));
            }
            if let Some(status) = card.status {
                line.push_str(&format!(" ({})", status));
            }
            if card.is_missing() {
                line.push_str(" (missing or inaccessible)");
            } else if !card.is_resolved {
                line.push_str(" (not linkable)");
            }
            if card.is_circular {
                line.push_str(" (circular)");
            }
            println!("{}", line);
            for child in &card.children {
                print_cards(child, depth + 1);
            }
        }
        CardNode::More { hidden, .. } => {
            println!("{}+{} more", indent, hidden);
        }
    }
}
