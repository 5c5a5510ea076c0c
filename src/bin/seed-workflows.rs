//! Workflow Registry Seeding Utility
//!
//! Loads workflow definition JSON files into the document store. This is
//! the registry's only write path; the router itself never writes.
//!
//! ## Usage
//!
//! ```bash
//! # Seed every *.json file in a directory
//! seed-workflows --config flowroute.toml --dir schemas/
//!
//! # Seed specific files
//! seed-workflows --config flowroute.toml customer_support.json sales.json
//!
//! # Soft-delete a workflow by disabling it
//! seed-workflows --config flowroute.toml --disable customer-support
//! ```

use chrono::Utc;
use clap::Parser;
use flowroute::config::RouterConfig;
use flowroute::observability::init_default_logging;
use flowroute::registry::definition::WORKFLOW_DOCUMENT_SCHEMA;
use flowroute::registry::{DocumentStore, HttpDocumentStore, StoreConfig};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(
    name = "seed-workflows",
    about = "Load workflow definition JSON files into the registry store"
)]
struct Args {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", default_value = "flowroute.toml")]
    config: PathBuf,

    /// Directory of *.json workflow definition files
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Disable a workflow by id (soft delete)
    #[arg(long, value_name = "WORKFLOW_ID")]
    disable: Option<String>,

    /// Individual workflow definition files
    files: Vec<PathBuf>,
}

fn collect_files(args: &Args) -> Result<Vec<PathBuf>, String> {
    let mut files = args.files.clone();

    if let Some(ref dir) = args.dir {
        let entries =
            std::fs::read_dir(dir).map_err(|e| format!("Cannot read {}: {e}", dir.display()))?;
        for entry in entries {
            let entry = entry.map_err(|e| e.to_string())?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Stamp lifecycle metadata the way the registry expects it
fn stamp_metadata(document: &mut Value) {
    let now = Utc::now().to_rfc3339();

    let metadata = document
        .as_object_mut()
        .map(|obj| {
            obj.entry("metadata")
                .or_insert_with(|| Value::Object(Default::default()))
        })
        .and_then(Value::as_object_mut);

    if let Some(metadata) = metadata {
        metadata
            .entry("created_at")
            .or_insert_with(|| Value::String(now.clone()));
        metadata.insert("updated_at".to_string(), Value::String(now));
        metadata.entry("enabled").or_insert(Value::Bool(true));
    }
}

async fn seed_file(
    store: &HttpDocumentStore,
    validator: &jsonschema::Validator,
    path: &Path,
) -> bool {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!("Cannot read {}: {}", path.display(), e);
            return false;
        }
    };

    let mut document: Value = match serde_json::from_str(&content) {
        Ok(document) => document,
        Err(e) => {
            error!("Invalid JSON in {}: {}", path.display(), e);
            return false;
        }
    };

    stamp_metadata(&mut document);

    if !validator.is_valid(&document) {
        error!(
            "{} does not match the workflow definition schema, skipping",
            path.display()
        );
        return false;
    }

    let id = document
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or("<unknown>")
        .to_string();

    match store.upsert(&document).await {
        Ok(()) => {
            info!("Loaded workflow '{}'", id);
            true
        }
        Err(e) => {
            error!("Failed to upsert '{}': {}", id, e);
            false
        }
    }
}

async fn disable_workflow(store: &HttpDocumentStore, workflow_id: &str) -> bool {
    let document = match store.fetch(workflow_id).await {
        Ok(Some(document)) => document,
        Ok(None) => {
            error!("Workflow '{}' not found", workflow_id);
            return false;
        }
        Err(e) => {
            error!("Failed to fetch '{}': {}", workflow_id, e);
            return false;
        }
    };

    let mut updated = document;
    if let Some(metadata) = updated
        .as_object_mut()
        .map(|obj| {
            obj.entry("metadata")
                .or_insert_with(|| Value::Object(Default::default()))
        })
        .and_then(Value::as_object_mut)
    {
        metadata.insert("enabled".to_string(), Value::Bool(false));
        metadata.insert(
            "updated_at".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
    }

    match store.upsert(&updated).await {
        Ok(()) => {
            info!("Disabled workflow '{}'", workflow_id);
            true
        }
        Err(e) => {
            error!("Failed to disable '{}': {}", workflow_id, e);
            false
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_default_logging();

    let config = match RouterConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let store_config = StoreConfig {
        endpoint: config.registry.endpoint.clone(),
        api_key: config.get_registry_api_key(),
        database: config.registry.database.clone(),
        container: config.registry.container.clone(),
        timeout: Duration::from_millis(config.registry.timeout_ms),
        retry_attempts: config.registry.retry_attempts,
    };

    let store = match HttpDocumentStore::new(store_config) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to create store client: {}", e);
            process::exit(1);
        }
    };

    if let Some(ref workflow_id) = args.disable {
        let ok = disable_workflow(&store, workflow_id).await;
        process::exit(if ok { 0 } else { 1 });
    }

    let files = match collect_files(&args) {
        Ok(files) => files,
        Err(message) => {
            error!("{}", message);
            process::exit(1);
        }
    };

    if files.is_empty() {
        warn!("No workflow definition files given; nothing to do");
        return;
    }

    let schema: Value =
        serde_json::from_str(WORKFLOW_DOCUMENT_SCHEMA).expect("embedded schema is valid JSON");
    let validator = jsonschema::validator_for(&schema).expect("embedded schema compiles");

    info!("Seeding {} workflow definition file(s)", files.len());

    let mut failures = 0;
    for path in &files {
        if !seed_file(&store, &validator, path).await {
            failures += 1;
        }
    }

    if failures > 0 {
        error!("{} of {} files failed", failures, files.len());
        process::exit(1);
    }

    info!("Seeding complete");
}
