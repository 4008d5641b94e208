//! Drives one sync job from PENDING to a terminal state.
//!
//! Every adapter call runs under `tokio::time::timeout` bounded by what is
//! left of the job's `timeout_seconds`. Per-table failures degrade to sentinel
//! values; connection, schema and table listing failures fail the job.

use crate::db::{AdapterFactory, DbPool, MetadataAdapter, TableSize};
use crate::error::{MetaError, MetaResult};
use crate::models::{
    DataSourceConfig, MetadataSyncJob, SchemaInfo, SyncType, TableInfo, TableType, UNKNOWN_SIZE,
};
use crate::relationship::RelationshipEngine;
use crate::sync::registry::SyncJobRegistry;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Runner tuning.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub job_timeout_secs: u64,
    /// Cap on the connect step, still bounded by the job budget.
    pub connect_timeout_secs: u64,
    /// Row counts in flight at once per schema.
    pub row_count_concurrency: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            job_timeout_secs: crate::models::DEFAULT_JOB_TIMEOUT_SECS,
            connect_timeout_secs: crate::config::DEFAULT_CONNECT_TIMEOUT_SECS,
            row_count_concurrency: 2,
        }
    }
}

/// Previous snapshot consulted by incremental syncs.
struct Baseline {
    tables: HashMap<(String, String), TableInfo>,
    last_sync: DateTime<Utc>,
}

impl Baseline {
    fn reusable(&self, schema: &str, table: &TableInfo) -> Option<&TableInfo> {
        let updated_at = table.updated_at?;
        if updated_at > self.last_sync {
            return None;
        }
        self.tables
            .get(&(schema.to_string(), table.name.to_lowercase()))
    }
}

/// Per-run state shared by the extraction steps.
struct JobContext {
    job_id: String,
    deadline: Instant,
    timeout_secs: u64,
    cancelled: Arc<AtomicBool>,
}

impl JobContext {
    fn check_cancelled(&self) -> MetaResult<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(MetaError::cancelled(&self.job_id));
        }
        Ok(())
    }

    fn exhausted(&self) -> bool {
        Instant::now() >= self.deadline
    }

    fn timeout_error(&self, operation: &str) -> MetaError {
        MetaError::timeout(operation, self.timeout_secs)
    }

    /// Run one adapter call inside the remaining budget.
    async fn bounded<T, F>(&self, operation: &str, cap: Option<Duration>, fut: F) -> MetaResult<T>
    where
        F: Future<Output = MetaResult<T>>,
    {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(self.timeout_error(operation));
        }
        let budget = cap.map_or(remaining, |c| c.min(remaining));
        match tokio::time::timeout(budget, fut).await {
            Ok(result) => result,
            Err(_) => Err(MetaError::timeout(operation, budget.as_secs().max(1))),
        }
    }

    /// Like `bounded`, but a failure is recoverable unless the job budget is spent.
    async fn best_effort<T, F>(&self, operation: &str, table: &str, fut: F) -> MetaResult<Option<T>>
    where
        F: Future<Output = MetaResult<T>>,
    {
        match self.bounded(operation, None, fut).await {
            Ok(value) => Ok(Some(value)),
            Err(_) if self.exhausted() => Err(self.timeout_error(operation)),
            Err(e) => {
                warn!(
                    job_id = %self.job_id,
                    table = %table,
                    operation = operation,
                    error = %e,
                    "Metadata step failed, continuing"
                );
                Ok(None)
            }
        }
    }
}

#[derive(Clone)]
pub struct SyncRunner {
    registry: SyncJobRegistry,
    relationships: Arc<RelationshipEngine>,
    settings: SyncSettings,
}

impl SyncRunner {
    pub fn new(
        registry: SyncJobRegistry,
        relationships: Arc<RelationshipEngine>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            registry,
            relationships,
            settings,
        }
    }

    pub fn registry(&self) -> &SyncJobRegistry {
        &self.registry
    }

    pub fn relationships(&self) -> &Arc<RelationshipEngine> {
        &self.relationships
    }

    /// Create a job and extract in the background. Returns the PENDING job.
    ///
    /// An unsupported engine fails here, before any job exists.
    pub async fn submit(
        &self,
        config: DataSourceConfig,
        sync_type: SyncType,
    ) -> MetaResult<MetadataSyncJob> {
        let adapter = AdapterFactory::resolve(&config.engine_type)?;
        let job = self
            .registry
            .create(&config.id, sync_type, self.settings.job_timeout_secs)
            .await?;

        let runner = self.clone();
        let job_id = job.id.clone();
        tokio::spawn(async move {
            runner.execute(adapter, config, job_id).await;
        });
        Ok(job)
    }

    /// Create a job, extract, and return the job in its terminal state.
    pub async fn run(
        &self,
        config: DataSourceConfig,
        sync_type: SyncType,
    ) -> MetaResult<MetadataSyncJob> {
        let adapter = AdapterFactory::resolve(&config.engine_type)?;
        self.run_with(adapter, config, sync_type).await
    }

    /// `run` with an explicit adapter.
    pub async fn run_with(
        &self,
        adapter: Arc<dyn MetadataAdapter>,
        config: DataSourceConfig,
        sync_type: SyncType,
    ) -> MetaResult<MetadataSyncJob> {
        let job = self
            .registry
            .create(&config.id, sync_type, self.settings.job_timeout_secs)
            .await?;
        self.execute(adapter, config, job.id.clone()).await;
        self.registry.get(&job.id).await
    }

    async fn execute(
        &self,
        adapter: Arc<dyn MetadataAdapter>,
        config: DataSourceConfig,
        job_id: String,
    ) {
        let job = match self.registry.start(&job_id).await {
            Ok(job) => job,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Sync job could not start");
                return;
            }
        };
        let cancelled = match self.registry.cancellation_token(&job_id).await {
            Ok(token) => token,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Sync job vanished");
                return;
            }
        };

        let ctx = JobContext {
            job_id: job_id.clone(),
            deadline: Instant::now() + Duration::from_secs(job.timeout_seconds),
            timeout_secs: job.timeout_seconds,
            cancelled,
        };

        match self.extract(adapter.as_ref(), &config, &job, &ctx).await {
            Ok(schemas) => {
                let learned = schemas.clone();
                if let Err(e) = self.registry.complete(&job_id, schemas).await {
                    warn!(job_id = %job_id, error = %e, "Sync job could not complete");
                    return;
                }
                self.learn(&config.id, &learned).await;
            }
            Err(MetaError::Cancelled { .. }) => {
                info!(job_id = %job_id, "Extraction stopped after cancellation");
            }
            Err(e) => {
                if let Err(transition) = self.registry.fail(&job_id, e.to_string()).await {
                    debug!(job_id = %job_id, error = %transition, "Job already terminal");
                }
            }
        }
    }

    async fn learn(&self, data_source_id: &str, schemas: &[SchemaInfo]) {
        for schema in schemas {
            match self
                .relationships
                .learn_from_schema(data_source_id, schema)
                .await
            {
                Ok(count) => {
                    debug!(data_source_id = %data_source_id, schema = %schema.name, edges = count, "Learned relationships")
                }
                Err(e) => warn!(
                    data_source_id = %data_source_id,
                    schema = %schema.name,
                    error = %e,
                    "Relationship learning failed"
                ),
            }
        }
    }

    async fn extract(
        &self,
        adapter: &dyn MetadataAdapter,
        config: &DataSourceConfig,
        job: &MetadataSyncJob,
        ctx: &JobContext,
    ) -> MetaResult<Vec<SchemaInfo>> {
        let baseline = match job.sync_type {
            SyncType::Incremental => self.baseline(&config.id).await?,
            SyncType::Full => None,
        };

        info!(
            job_id = %ctx.job_id,
            data_source_id = %config.id,
            url = %config.masked_url(),
            "Connecting to data source"
        );
        let connect_cap = Duration::from_secs(self.settings.connect_timeout_secs.max(1));
        let pool = ctx
            .bounded("connect", Some(connect_cap), adapter.connect(config))
            .await?;

        let result = self
            .extract_with(adapter, &pool, config, ctx, baseline.as_ref())
            .await;
        adapter.disconnect(pool).await;
        result
    }

    async fn baseline(&self, data_source_id: &str) -> MetaResult<Option<Baseline>> {
        let store = self.registry.store();
        let Some(last_sync) = store.last_sync(data_source_id).await? else {
            return Ok(None);
        };
        let tables = store
            .load_schemas(data_source_id)
            .await?
            .into_iter()
            .flat_map(|schema| {
                let name = schema.name;
                schema
                    .tables
                    .into_iter()
                    .map(move |t| ((name.clone(), t.name.to_lowercase()), t))
            })
            .collect();
        Ok(Some(Baseline { tables, last_sync }))
    }

    async fn extract_with(
        &self,
        adapter: &dyn MetadataAdapter,
        pool: &DbPool,
        config: &DataSourceConfig,
        ctx: &JobContext,
        baseline: Option<&Baseline>,
    ) -> MetaResult<Vec<SchemaInfo>> {
        let schema_names = ctx
            .bounded("get_schemas", None, adapter.get_schemas(pool))
            .await?;

        let mut listed = Vec::with_capacity(schema_names.len());
        for name in schema_names {
            ctx.check_cancelled()?;
            let tables = ctx
                .bounded("get_tables", None, adapter.get_tables(pool, &name))
                .await?;
            listed.push((name, tables));
        }

        // Structure and row count of each table are one step each
        let total_steps = listed.iter().map(|(_, t)| t.len() * 2).sum::<usize>().max(1);
        let mut done_steps = 0usize;
        let mut schemas = Vec::with_capacity(listed.len());

        for (schema_name, tables) in listed {
            let sizes = ctx
                .best_effort(
                    "get_table_sizes",
                    &schema_name,
                    adapter.get_table_sizes(pool, &schema_name),
                )
                .await?;

            let mut extracted = Vec::with_capacity(tables.len());
            for table in tables {
                ctx.check_cancelled()?;
                let reused = baseline.and_then(|b| b.reusable(&schema_name, &table));
                let table = match reused {
                    Some(previous) => {
                        debug!(job_id = %ctx.job_id, table = %table.name, "Reusing unchanged table structure");
                        let mut table = table;
                        table.columns = previous.columns.clone();
                        table.indexes = previous.indexes.clone();
                        table.foreign_keys = previous.foreign_keys.clone();
                        table
                    }
                    None => self.describe(adapter, pool, ctx, &schema_name, table).await?,
                };
                extracted.push(apply_sizes(table, sizes.as_ref()));

                done_steps += 1;
                self.report(ctx, done_steps, total_steps, &schema_name).await?;
            }

            ctx.check_cancelled()?;
            self.count_rows(adapter, pool, ctx, &schema_name, &mut extracted)
                .await?;
            done_steps += extracted.len();
            self.report(ctx, done_steps, total_steps, &schema_name).await?;

            let mut schema = SchemaInfo::new(&schema_name, &config.id);
            schema.tables = extracted;
            schemas.push(schema);
        }

        Ok(schemas)
    }

    async fn describe(
        &self,
        adapter: &dyn MetadataAdapter,
        pool: &DbPool,
        ctx: &JobContext,
        schema: &str,
        mut table: TableInfo,
    ) -> MetaResult<TableInfo> {
        let name = table.name.clone();
        table.columns = ctx
            .best_effort("get_columns", &name, adapter.get_columns(pool, schema, &name))
            .await?
            .unwrap_or_default();
        table.indexes = ctx
            .best_effort("get_indexes", &name, adapter.get_indexes(pool, schema, &name))
            .await?
            .unwrap_or_default();
        table.foreign_keys = ctx
            .best_effort(
                "get_foreign_keys",
                &name,
                adapter.get_foreign_keys(pool, schema, &name),
            )
            .await?
            .unwrap_or_default();
        Ok(table)
    }

    async fn count_rows(
        &self,
        adapter: &dyn MetadataAdapter,
        pool: &DbPool,
        ctx: &JobContext,
        schema: &str,
        tables: &mut [TableInfo],
    ) -> MetaResult<()> {
        // Owned names keep the spawned job future `Send`
        let pending: Vec<_> = tables
            .iter()
            .map(|t| t.name.clone())
            .enumerate()
            .map(|(i, name)| async move {
                let count = ctx
                    .best_effort(
                        "get_row_count",
                        &name,
                        adapter.get_row_count(pool, schema, &name),
                    )
                    .await;
                (i, count)
            })
            .collect();
        let counts: Vec<(usize, MetaResult<Option<i64>>)> = stream::iter(pending)
            .buffer_unordered(self.settings.row_count_concurrency.max(1))
            .collect()
            .await;

        for (i, count) in counts {
            tables[i].row_count = count?.unwrap_or(UNKNOWN_SIZE);
        }
        Ok(())
    }

    async fn report(
        &self,
        ctx: &JobContext,
        done: usize,
        total: usize,
        schema: &str,
    ) -> MetaResult<()> {
        // 100 is reserved for completion
        let progress = ((done * 99) / total).min(99) as i32;
        match self
            .registry
            .update_progress(
                &ctx.job_id,
                progress,
                format!("Extracting schema {} ({}/{})", schema, done, total),
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(_) if ctx.cancelled.load(Ordering::SeqCst) => Err(MetaError::cancelled(&ctx.job_id)),
            Err(e) => Err(e),
        }
    }
}

/// Views report zero storage; tables absent from the batch stay unknown.
fn apply_sizes(table: TableInfo, sizes: Option<&HashMap<String, TableSize>>) -> TableInfo {
    let size = match sizes {
        None => TableSize::UNKNOWN,
        Some(map) => match map.get(&table.name) {
            Some(size) => *size,
            None if matches!(table.table_type, TableType::View) => TableSize::new(0, 0),
            None => TableSize::UNKNOWN,
        },
    };
    table.with_sizes(size.data_size, size.index_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_sizes_sentinels() {
        let mut map = HashMap::new();
        map.insert("orders".to_string(), TableSize::new(8192, 4096));

        let orders = apply_sizes(TableInfo::new("orders", TableType::Table), Some(&map));
        assert_eq!((orders.data_size, orders.index_size), (8192, 4096));

        let missing = apply_sizes(TableInfo::new("ghost", TableType::Table), Some(&map));
        assert_eq!(missing.data_size, UNKNOWN_SIZE);

        let view = apply_sizes(TableInfo::new("v_orders", TableType::View), Some(&map));
        assert_eq!(view.data_size, 0);

        let failed = apply_sizes(TableInfo::new("orders", TableType::Table), None);
        assert_eq!(failed.data_size, UNKNOWN_SIZE);
        assert_eq!(failed.index_size, UNKNOWN_SIZE);
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let ctx = JobContext {
            job_id: "job_x".to_string(),
            deadline: Instant::now() + Duration::from_millis(20),
            timeout_secs: 1,
            cancelled: Arc::new(AtomicBool::new(false)),
        };
        let result: MetaResult<()> = ctx
            .bounded("slow", None, async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(MetaError::Timeout { .. })));
    }

    #[test]
    fn test_default_settings() {
        let settings = SyncSettings::default();
        assert_eq!(settings.job_timeout_secs, 300);
        assert_eq!(settings.connect_timeout_secs, 10);
        assert_eq!(settings.row_count_concurrency, 2);
    }

    fn assert_send<T: Send>(_: T) {}

    #[test]
    fn test_job_future_is_send() {
        let store = Arc::new(crate::sync::InMemoryMetadataStore::new());
        let runner = SyncRunner::new(
            SyncJobRegistry::new(store),
            Arc::new(RelationshipEngine::new()),
            SyncSettings::default(),
        );
        let config = DataSourceConfig::new("ds", "sqlite").with_database(":memory:");
        let adapter = AdapterFactory::for_engine(crate::models::EngineType::Sqlite);
        assert_send(runner.run_with(adapter.clone(), config.clone(), SyncType::Full));
        assert_send(runner.execute(adapter, config, "job_x".to_string()));
    }
}
