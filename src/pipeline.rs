use crate::catalog::CatalogClient;
use crate::funnel::classify::needs_lookup;
use crate::funnel::models::{
    CatalogLookupResult, ClassifiedProduct, EntryError, LookupState, PriceListEntry,
};
use crate::funnel::{FunnelReport, aggregate, classify};
use crate::loader::{self, LoadError, LoadedPriceList};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, warn};

const TIMEOUT_DETAIL: &str = "lookup phase timed out before completion";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub workers: usize,
    pub skip_api: bool,
    pub lookup_timeout: Option<Duration>,
    pub base_url: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            skip_api: false,
            lookup_timeout: None,
            base_url: None,
        }
    }
}

#[derive(Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    catalog: CatalogClient,
    http: reqwest::Client,
}

/// One reconciliation run: load → lookup → classify → aggregate, with a
/// per-stage transcript carried into the final report.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: FunnelReport,
    pub stages: Vec<StageReport>,
    pub source_name: String,
}

impl RunOutcome {
    /// Fallback outcome for a run whose source could not be loaded: a
    /// consistent zero-count report carrying the failure as an input error,
    /// so the artifacts are still written.
    pub fn empty(detail: &str) -> Self {
        let report = aggregate(
            Vec::new(),
            vec![EntryError {
                supplier_part: "price list".to_string(),
                detail: detail.to_string(),
            }],
            Vec::new(),
        );
        Self {
            report,
            stages: Vec::new(),
            source_name: "unavailable".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub name: String,
    pub elapsed_ms: u128,
    pub timestamp: DateTime<Utc>,
    pub output: Value,
}

impl StageReport {
    pub fn new(name: &str, elapsed_ms: u128, output: Value) -> Self {
        Self {
            name: name.to_string(),
            elapsed_ms,
            timestamp: Utc::now(),
            output,
        }
    }
}

#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {message}")]
pub struct PipelineError {
    stage: &'static str,
    message: String,
    kind: PipelineErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineErrorKind {
    InvalidInput,
    Internal,
}

impl PipelineError {
    pub fn invalid_input(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::InvalidInput,
        }
    }

    pub fn internal(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::Internal,
        }
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn kind(&self) -> PipelineErrorKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.message
    }
}

#[derive(Debug)]
pub struct StageOutcome<T> {
    pub value: T,
    pub output: Value,
}

impl<T> StageOutcome<T> {
    fn new(value: T, output: Value) -> Self {
        Self { value, output }
    }
}

/// Where the price list comes from: a concrete file, a drop directory in
/// which the newest CSV export wins, or the CSV export URL of a published
/// Google Sheet.
#[derive(Debug, Clone)]
pub enum PriceListSource {
    File(PathBuf),
    Directory(PathBuf),
    Sheet(String),
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let catalog = match &config.base_url {
            Some(base) => CatalogClient::new(base.clone()),
            None => CatalogClient::from_env(),
        };
        Self {
            config,
            catalog,
            http: crate::http::build_client(),
        }
    }

    pub async fn run(&self, source: &PriceListSource) -> Result<RunOutcome, PipelineError> {
        let mut stages = Vec::new();

        let loaded = self
            .capture_stage("load_price_list", &mut stages, self.stage_load(source))
            .await?;
        let source_name = loaded.source_name.clone();

        let lookups = self
            .capture_stage("lookup_catalog", &mut stages, async {
                Ok(self.stage_lookup(&loaded.entries).await)
            })
            .await?;

        let (products, rule_gaps) = self
            .capture_stage("classify", &mut stages, async {
                stage_classify(loaded.entries, &lookups)
            })
            .await?;

        let report = self
            .capture_stage("aggregate", &mut stages, async {
                let report = aggregate(products, loaded.input_errors, rule_gaps);
                let output = json!({
                    "total": report.total,
                    "with_supplier_stock": report.with_supplier_stock,
                    "eligible": report.eligible,
                    "counts": report.counts,
                    "consistent": report.consistent,
                });
                Ok(StageOutcome::new(report, output))
            })
            .await?;

        Ok(RunOutcome {
            report,
            stages,
            source_name,
        })
    }

    /// Query the catalog for every entry the lookup-free rules cannot decide,
    /// with bounded concurrency and an optional phase deadline. Entries whose
    /// lookup has not completed when the deadline fires stay `Failed`; a
    /// per-entry failure never aborts the run.
    async fn stage_lookup(&self, entries: &[PriceListEntry]) -> StageOutcome<Vec<LookupState>> {
        let mut states: Vec<LookupState> = entries
            .iter()
            .map(|entry| match &entry.catalog_id {
                None => LookupState::Done(CatalogLookupResult::NoIdentifier),
                Some(_) if self.config.skip_api || !needs_lookup(entry) => LookupState::Skipped,
                Some(_) => LookupState::Failed(TIMEOUT_DETAIL.to_string()),
            })
            .collect();

        let pending: Vec<(usize, String)> = if self.config.skip_api {
            Vec::new()
        } else {
            entries
                .iter()
                .enumerate()
                .filter(|(_, entry)| needs_lookup(entry))
                .filter_map(|(index, entry)| {
                    entry.catalog_id.as_ref().map(|id| (index, id.clone()))
                })
                .collect()
        };
        let attempted = pending.len();

        if attempted > 0 {
            let semaphore = Arc::new(Semaphore::new(self.config.workers.max(1)));
            let mut tasks: JoinSet<(
                usize,
                Result<CatalogLookupResult, crate::catalog::CatalogError>,
            )> = JoinSet::new();
            for (index, id) in pending {
                let client = self.catalog.clone();
                let semaphore = semaphore.clone();
                tasks.spawn(async move {
                    let _permit = semaphore.acquire_owned().await;
                    (index, client.fetch_product(&id).await)
                });
            }

            let collect = async {
                while let Some(joined) = tasks.join_next().await {
                    let Ok((index, result)) = joined else { continue };
                    states[index] = match result {
                        Ok(lookup) => {
                            crate::metrics::lookup_completed("done");
                            LookupState::Done(lookup)
                        }
                        Err(err) => {
                            crate::metrics::lookup_completed("failed");
                            warn!(
                                target = "catmon.pipeline",
                                error = %err,
                                "catalog lookup failed"
                            );
                            LookupState::Failed(err.to_string())
                        }
                    };
                }
            };

            match self.config.lookup_timeout {
                Some(deadline) => {
                    if tokio::time::timeout(deadline, collect).await.is_err() {
                        warn!(
                            target = "catmon.pipeline",
                            timeout_secs = deadline.as_secs(),
                            "lookup phase deadline reached, pending entries marked failed"
                        );
                    }
                }
                None => collect.await,
            }
        }

        let failed = states
            .iter()
            .filter(|state| matches!(state, LookupState::Failed(_)))
            .count();
        let output = json!({
            "entries": entries.len(),
            "attempted": attempted,
            "failed": failed,
            "skip_api": self.config.skip_api,
            "workers": self.config.workers,
        });
        StageOutcome::new(states, output)
    }

    async fn capture_stage<T, Fut>(
        &self,
        name: &'static str,
        stages: &mut Vec<StageReport>,
        fut: Fut,
    ) -> Result<T, PipelineError>
    where
        Fut: Future<Output = Result<StageOutcome<T>, PipelineError>>,
    {
        let started = Instant::now();
        let outcome = fut.await?;
        let elapsed_ms = started.elapsed().as_millis();
        crate::metrics::stage_elapsed(name, elapsed_ms);
        stages.push(StageReport::new(name, elapsed_ms, outcome.output));
        Ok(outcome.value)
    }

    async fn stage_load(
        &self,
        source: &PriceListSource,
    ) -> Result<StageOutcome<LoadedPriceList>, PipelineError> {
        let loaded = match source {
            PriceListSource::File(path) => loader::load(path),
            PriceListSource::Directory(dir) => {
                loader::latest_price_file(dir).and_then(|path| loader::load(&path))
            }
            PriceListSource::Sheet(url) => loader::load_sheet(&self.http, url).await,
        }
        .map_err(|err| match err {
            // Transport problems are our side of the fence, not the caller's.
            LoadError::Fetch(detail) => PipelineError::internal("load_price_list", detail),
            other => PipelineError::invalid_input("load_price_list", other.to_string()),
        })?;
        let output = json!({
            "source": loaded.source_name,
            "entries": loaded.entries.len(),
            "rejected": loaded.input_errors.len(),
        });
        Ok(StageOutcome::new(loaded, output))
    }
}

type Classified = (Vec<ClassifiedProduct>, Vec<EntryError>);

fn stage_classify(
    entries: Vec<PriceListEntry>,
    lookups: &[LookupState],
) -> Result<StageOutcome<Classified>, PipelineError> {
    let mut products = Vec::with_capacity(entries.len());
    let mut rule_gaps = Vec::new();

    for (entry, lookup) in entries.into_iter().zip(lookups) {
        match classify(&entry, lookup) {
            Ok(bucket) => {
                let record = match lookup {
                    LookupState::Done(CatalogLookupResult::Found(record)) => Some(record.clone()),
                    _ => None,
                };
                let failure = match lookup {
                    LookupState::Failed(detail) => Some(detail.clone()),
                    _ => None,
                };
                products.push(ClassifiedProduct {
                    entry,
                    bucket,
                    record,
                    failure,
                });
            }
            Err(err) => {
                // Rule-coverage gap: loud, isolated, never defaulted.
                error!(
                    target = "catmon.pipeline",
                    supplier_part = %entry.supplier_part,
                    error = %err,
                    "classification rule gap"
                );
                rule_gaps.push(EntryError {
                    supplier_part: entry.supplier_part.clone(),
                    detail: err.to_string(),
                });
            }
        }
    }

    let output = json!({
        "classified": products.len(),
        "rule_gaps": rule_gaps.len(),
    });
    Ok(StageOutcome::new((products, rule_gaps), output))
}
