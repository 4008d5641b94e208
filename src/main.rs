//! schemalink - Main entry point.
//!
//! Runs sync jobs against a data source, prints inferred relationships and
//! generates SQL from offline snapshots.

use schemalink::config::{Command, Config};
use schemalink::db::AdapterFactory;
use schemalink::models::{
    GenerationRequest, MetadataSyncJob, SchemaInfo, SyncStatus, SyncType, TableRelationship,
};
use schemalink::sync::{InMemoryMetadataStore, MetadataStore};
use schemalink::{MetaResult, RelationshipEngine, SqlGenerator, SyncJobRegistry, SyncRunner};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr; stdout carries the JSON results.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Format bytes as a human-readable size; negative sizes are unknown.
fn format_size(bytes: i64) -> String {
    match u64::try_from(bytes) {
        Ok(bytes) => humansize::format_size(bytes, humansize::WINDOWS),
        Err(_) => "unknown".to_string(),
    }
}

#[derive(Debug, Serialize)]
struct TableSummary {
    schema: String,
    name: String,
    #[serde(rename = "type")]
    table_type: String,
    columns: usize,
    foreign_keys: usize,
    row_count: i64,
    data_size: String,
    index_size: String,
}

#[derive(Debug, Serialize)]
struct SyncOutput {
    job: MetadataSyncJob,
    tables: Vec<TableSummary>,
    relationships: Vec<TableRelationship>,
}

fn summarize(schemas: &[SchemaInfo]) -> Vec<TableSummary> {
    schemas
        .iter()
        .flat_map(|schema| {
            schema.tables.iter().map(|t| TableSummary {
                schema: schema.name.clone(),
                name: t.name.clone(),
                table_type: t.table_type.to_string(),
                columns: t.columns.len(),
                foreign_keys: t.foreign_keys.len(),
                row_count: t.row_count,
                data_size: format_size(t.data_size),
                index_size: format_size(t.index_size),
            })
        })
        .collect()
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let value = serde_json::from_str(&text)
        .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?;
    Ok(value)
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }
}

/// Poll a submitted job until it is terminal. A shutdown signal cancels it.
async fn wait_for_job(registry: &SyncJobRegistry, job_id: &str) -> MetaResult<MetadataSyncJob> {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(POLL_INTERVAL) => {
                let job = registry.get(job_id).await?;
                if job.status.is_terminal() {
                    return Ok(job);
                }
                debug!(job_id = %job_id, progress = job.progress, "Waiting for sync job");
            }
            _ = wait_for_signal() => {
                warn!(job_id = %job_id, "Cancelling sync job");
                if let Err(e) = registry.cancel(job_id).await {
                    debug!(job_id = %job_id, error = %e, "Job finished before cancellation");
                }
                return registry.get(job_id).await;
            }
        }
    }
}

struct SyncSession {
    runner: SyncRunner,
    store: Arc<InMemoryMetadataStore>,
    data_source_id: String,
    job: MetadataSyncJob,
}

async fn sync_source(
    config: &Config,
    source: &str,
    sync_type: SyncType,
) -> Result<SyncSession, Box<dyn std::error::Error>> {
    let data_source = config.parse_source(source)?;
    let store = Arc::new(InMemoryMetadataStore::new());
    let registry = SyncJobRegistry::new(store.clone());
    let runner = SyncRunner::new(
        registry,
        Arc::new(RelationshipEngine::new()),
        config.sync_settings(),
    );

    info!(
        data_source_id = %data_source.id,
        engine = %data_source.engine_type,
        sync_type = %sync_type,
        "Starting sync"
    );
    let data_source_id = data_source.id.clone();
    let job = runner.submit(data_source, sync_type).await?;
    let job = wait_for_job(runner.registry(), &job.id).await?;

    Ok(SyncSession {
        runner,
        store,
        data_source_id,
        job,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse_args();

    // Initialize logging
    init_tracing(&config);

    info!("Starting schemalink v{}", env!("CARGO_PKG_VERSION"));

    match &config.command {
        Command::Engines => print_json(&AdapterFactory::supported())?,
        Command::Sync {
            source,
            incremental,
        } => {
            let sync_type = if *incremental {
                SyncType::Incremental
            } else {
                SyncType::Full
            };
            let session = sync_source(&config, source, sync_type).await?;
            let schemas = session.store.load_schemas(&session.data_source_id).await?;
            let relationships = session
                .runner
                .relationships()
                .relationships(&session.data_source_id)
                .await;
            let failed = session.job.status != SyncStatus::Completed;
            print_json(&SyncOutput {
                job: session.job,
                tables: summarize(&schemas),
                relationships,
            })?;
            if failed {
                std::process::exit(1);
            }
        }
        Command::Recommend {
            source,
            table,
            limit,
        } => {
            let session = sync_source(&config, source, SyncType::Full).await?;
            if session.job.status != SyncStatus::Completed {
                error!(
                    job_id = %session.job.id,
                    error = session.job.error_message.as_deref().unwrap_or("cancelled"),
                    "Sync did not complete"
                );
                print_json(&session.job)?;
                std::process::exit(1);
            }
            let recommended = session
                .runner
                .relationships()
                .recommend(
                    &session.data_source_id,
                    table,
                    limit.unwrap_or(config.recommend_limit),
                )
                .await;
            print_json(&recommended)?;
        }
        Command::Generate {
            snapshot,
            request,
            relationships,
        } => {
            let schema: SchemaInfo = read_json(snapshot)?;
            let request: GenerationRequest = read_json(request)?;
            let edges: Vec<TableRelationship> = match relationships {
                Some(path) => read_json(path)?,
                None => Vec::new(),
            };
            let result =
                SqlGenerator::new().generate(&request.entities, &request.intent, &schema, &edges);
            print_json(&result)?;
        }
    }

    Ok(())
}
