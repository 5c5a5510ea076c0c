//! Flowroute CLI - Main Entry Point
//!
//! Routes queries to registry-defined workflows from the command line.

use clap::{Parser, Subcommand};
use flowroute::config::RouterConfig;
use flowroute::observability::init_default_logging;
use flowroute::router::WorkflowRouter;
use futures::StreamExt;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

/// Dynamic workflow router CLI
#[derive(Parser)]
#[command(name = "flowroute")]
#[command(about = "Routes user requests to registry-defined LLM workflows")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", default_value = "flowroute.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a query and execute the selected workflow
    Route {
        /// Query text to route
        query: String,

        /// Execute a specific workflow directly, bypassing classification
        #[arg(long)]
        workflow: Option<String>,

        /// Context entries as key=value pairs
        #[arg(long = "context", value_name = "KEY=VALUE")]
        context: Vec<String>,

        /// Disable chunked streaming output
        #[arg(long)]
        no_stream: bool,
    },
    /// Inspect available workflows
    Workflows {
        #[command(subcommand)]
        command: WorkflowCommands,
    },
    /// Validate configuration
    Config {
        /// Show the parsed configuration
        #[arg(long)]
        show: bool,
    },
}

#[derive(Subcommand)]
enum WorkflowCommands {
    /// List enabled workflows
    List,
    /// Show one workflow definition
    Info {
        /// Workflow id
        workflow_id: String,
    },
}

fn parse_context(entries: &[String]) -> Result<Option<HashMap<String, String>>, String> {
    if entries.is_empty() {
        return Ok(None);
    }

    let mut context = HashMap::new();
    for entry in entries {
        let Some((key, value)) = entry.split_once('=') else {
            return Err(format!("Invalid context entry '{entry}', expected KEY=VALUE"));
        };
        context.insert(key.trim().to_string(), value.trim().to_string());
    }

    Ok(Some(context))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    let config = match RouterConfig::load_from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    if let Commands::Config { show } = &cli.command {
        println!("Configuration OK: {}", cli.config.display());
        if *show {
            match toml::to_string_pretty(&config) {
                Ok(rendered) => println!("{rendered}"),
                Err(e) => {
                    error!("Failed to render configuration: {}", e);
                    process::exit(1);
                }
            }
        }
        return;
    }

    let router = match WorkflowRouter::from_config(&config) {
        Ok(router) => router,
        Err(e) => {
            error!("Failed to initialize router: {}", e.user_message());
            process::exit(1);
        }
    };

    let exit_code = run_command(&router, cli.command).await;

    // Release caches and clients on every exit path
    router.cleanup().await;
    process::exit(exit_code);
}

async fn run_command(router: &WorkflowRouter, command: Commands) -> i32 {
    match command {
        Commands::Route {
            query,
            workflow,
            context,
            no_stream,
        } => {
            let context = match parse_context(&context) {
                Ok(context) => context,
                Err(message) => {
                    error!("{}", message);
                    return 2;
                }
            };

            let stream_result = match workflow {
                Some(ref workflow_id) => {
                    router
                        .execute_workflow(
                            workflow_id,
                            &query,
                            context.as_ref(),
                            !no_stream,
                        )
                        .await
                }
                None => {
                    router
                        .route_and_execute(&query, context.as_ref(), !no_stream)
                        .await
                }
            };

            let mut chunks = match stream_result {
                Ok(chunks) => chunks,
                Err(e) => {
                    error!("Routing failed: {}", e.user_message());
                    return 1;
                }
            };

            while let Some(chunk) = chunks.next().await {
                match chunk {
                    Ok(text) => {
                        print!("{text}");
                        let _ = std::io::stdout().flush();
                    }
                    Err(e) => {
                        eprintln!();
                        error!("Execution failed: {}", e.user_message());
                        return 1;
                    }
                }
            }
            println!();
            0
        }
        Commands::Workflows { command } => match command {
            WorkflowCommands::List => match router.list_workflows().await {
                Ok(workflows) => {
                    if workflows.is_empty() {
                        println!("No enabled workflows found");
                        return 0;
                    }
                    for workflow in workflows {
                        println!(
                            "{} [{}] - {}",
                            workflow.id,
                            workflow.category.as_deref().unwrap_or("uncategorized"),
                            workflow.description.as_deref().unwrap_or("no description"),
                        );
                    }
                    0
                }
                Err(e) => {
                    error!("Failed to list workflows: {}", e.user_message());
                    1
                }
            },
            WorkflowCommands::Info { workflow_id } => {
                match router.workflow_info(&workflow_id).await {
                    Ok(Some(definition)) => match serde_json::to_string_pretty(&definition) {
                        Ok(rendered) => {
                            println!("{rendered}");
                            0
                        }
                        Err(e) => {
                            error!("Failed to render workflow: {}", e);
                            1
                        }
                    },
                    Ok(None) => {
                        println!("Workflow '{workflow_id}' not found or disabled");
                        1
                    }
                    Err(e) => {
                        error!("Failed to fetch workflow: {}", e.user_message());
                        1
                    }
                }
            }
        },
        Commands::Config { .. } => {
            // Handled before router construction
            info!("Configuration already validated");
            0
        }
    }
}
