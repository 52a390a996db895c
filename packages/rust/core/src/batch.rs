//! Batch execution over the input table.
//!
//! Products run on a bounded worker pool. Results are collected by awaiting
//! the join handles in input order, so the output order never depends on
//! which product finished first.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use grimoire_shared::{EnrichmentResult, ImageSource, LocalImage, ProductInput};

use crate::generator::{generation_failed, is_placeholder};
use crate::pipeline::EnrichmentPipeline;

// ---------------------------------------------------------------------------
// Stop flag
// ---------------------------------------------------------------------------

/// Cooperative cancellation shared between the runner and a signal handler.
///
/// Once raised, products that have not started are skipped; products already
/// in flight run to completion.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting batch status.
pub trait BatchProgress: Send + Sync {
    /// Called once before any product starts.
    fn started(&self, total: usize);
    /// Called when a product's record is complete.
    fn product_done(&self, result: &EnrichmentResult);
    /// Called when the batch stops, normally or not.
    fn finished(&self, outcome: &BatchOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentBatchProgress;

impl BatchProgress for SilentBatchProgress {
    fn started(&self, _total: usize) {}
    fn product_done(&self, _result: &EnrichmentResult) {}
    fn finished(&self, _outcome: &BatchOutcome) {}
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of a batch run.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Identifier of this run, for log correlation.
    pub run_id: Uuid,
    /// One record per started product, in input order.
    pub results: Vec<EnrichmentResult>,
    /// Products never started because the run was stopped.
    pub skipped: usize,
    /// Whether the stop flag ended the run early.
    pub interrupted: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl BatchOutcome {
    pub fn pages_found(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.source_page().is_some())
            .count()
    }

    pub fn images_found(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.image(), ImageSource::Found(_)))
            .count()
    }

    pub fn images_saved(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.local_image().is_saved())
            .count()
    }

    pub fn descriptions_generated(&self) -> usize {
        self.results
            .iter()
            .filter(|r| !is_placeholder(r.short_description(), r.long_description()))
            .count()
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Runs the enrichment pipeline over many products.
pub struct BatchRunner {
    pipeline: Arc<EnrichmentPipeline>,
    concurrency: usize,
}

impl BatchRunner {
    /// `concurrency` is clamped to at least one; `1` processes products
    /// strictly one after another.
    pub fn new(pipeline: Arc<EnrichmentPipeline>, concurrency: usize) -> Self {
        Self {
            pipeline,
            concurrency: concurrency.max(1),
        }
    }

    /// Enrich every product, stopping early if `stop` is raised.
    #[instrument(skip_all, fields(products = products.len(), concurrency = self.concurrency))]
    pub async fn run(
        &self,
        products: Vec<ProductInput>,
        stop: &StopFlag,
        progress: Arc<dyn BatchProgress>,
    ) -> BatchOutcome {
        let run_id = Uuid::now_v7();
        let started_at = Utc::now();
        let clock = Instant::now();
        let total = products.len();

        info!(%run_id, total, "starting batch");
        progress.started(total);

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(total);

        for product in products {
            if stop.is_stopped() {
                break;
            }
            // The semaphore is never closed.
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            if stop.is_stopped() {
                break;
            }

            let pipeline = self.pipeline.clone();
            let progress = progress.clone();
            let task_input = product.clone();
            let handle = tokio::spawn(async move {
                let result = pipeline.enrich(&task_input).await;
                progress.product_done(&result);
                drop(permit);
                result
            });
            handles.push((product, handle));
        }

        let started = handles.len();
        let mut results = Vec::with_capacity(started);
        for (product, handle) in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    error!(sku = %product.sku, error = %e, "enrichment task failed");
                    let result = placeholder_result(product);
                    progress.product_done(&result);
                    results.push(result);
                }
            }
        }

        let skipped = total - started;
        let interrupted = skipped > 0;
        if interrupted {
            warn!(skipped, "batch stopped before all products started");
        }

        let outcome = BatchOutcome {
            run_id,
            results,
            skipped,
            interrupted,
            started_at,
            finished_at: Utc::now(),
            elapsed: clock.elapsed(),
        };

        info!(
            %run_id,
            completed = outcome.results.len(),
            skipped,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "batch finished"
        );
        progress.finished(&outcome);
        outcome
    }
}

/// Record substituted for a product whose task died.
fn placeholder_result(input: ProductInput) -> EnrichmentResult {
    EnrichmentResult::new(
        input,
        None,
        ImageSource::NotFound,
        LocalImage::NotFound,
        generation_failed(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;

    use crate::llm::{ModelError, TextModel};
    use crate::test_support::{ScriptedSearch, pipeline_with, temp_image_dir};
    use grimoire_shared::PLACEHOLDER_IMAGE_URL;

    const REPLY: &str = "[SHORT DESCRIPTION] ok [LONG DESCRIPTION HTML] <p>ok</p>";

    fn products(n: usize) -> Vec<ProductInput> {
        (0..n)
            .map(|i| ProductInput {
                sku: format!("P{i}"),
                name: format!("Product {i}"),
                quantity: i as i64,
                price: 1.0,
            })
            .collect()
    }

    /// Index encoded in the prompt's product name.
    fn product_index(prompt: &str) -> usize {
        prompt
            .split("'Product ")
            .nth(1)
            .and_then(|rest| rest.split('\'').next())
            .and_then(|n| n.parse().ok())
            .unwrap_or(0)
    }

    /// Model that answers later products sooner and tracks peak concurrency.
    struct StaggeredModel {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        count: usize,
    }

    #[async_trait]
    impl TextModel for StaggeredModel {
        async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let index = product_index(prompt);
            let delay = (self.count - index) as u64 * 5;
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(REPLY.to_string())
        }

        fn name(&self) -> &str {
            "staggered"
        }
    }

    /// Model that panics for one product.
    struct PanickingModel {
        victim: usize,
    }

    #[async_trait]
    impl TextModel for PanickingModel {
        async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
            if product_index(prompt) == self.victim {
                panic!("model exploded");
            }
            Ok(REPLY.to_string())
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    /// Model whose quota is exhausted for one product only.
    struct QuotaModel {
        exhausted_for: usize,
    }

    #[async_trait]
    impl TextModel for QuotaModel {
        async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
            if product_index(prompt) == self.exhausted_for {
                return Err(ModelError::QuotaExceeded("RESOURCE_EXHAUSTED".into()));
            }
            Ok(REPLY.to_string())
        }

        fn name(&self) -> &str {
            "quota"
        }
    }

    /// Model that raises the stop flag when it sees one product.
    struct StoppingModel {
        trigger: usize,
        stop: StopFlag,
        seen: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl TextModel for StoppingModel {
        async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
            let index = product_index(prompt);
            self.seen.lock().unwrap().push(index);
            if index == self.trigger {
                self.stop.stop();
            }
            Ok(REPLY.to_string())
        }

        fn name(&self) -> &str {
            "stopping"
        }
    }

    struct CountingProgress {
        total: AtomicUsize,
        done: AtomicUsize,
        finished: AtomicBool,
    }

    impl BatchProgress for CountingProgress {
        fn started(&self, total: usize) {
            self.total.store(total, Ordering::SeqCst);
        }
        fn product_done(&self, _result: &EnrichmentResult) {
            self.done.fetch_add(1, Ordering::SeqCst);
        }
        fn finished(&self, _outcome: &BatchOutcome) {
            self.finished.store(true, Ordering::SeqCst);
        }
    }

    fn runner(model: Arc<dyn TextModel>, concurrency: usize) -> BatchRunner {
        let search = ScriptedSearch::new(Ok(None), Ok(None));
        let pipeline = pipeline_with(search, model, &temp_image_dir());
        BatchRunner::new(Arc::new(pipeline), concurrency)
    }

    #[tokio::test]
    async fn results_follow_input_order_under_concurrency() {
        let model = Arc::new(StaggeredModel {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            count: 8,
        });
        let progress = Arc::new(CountingProgress {
            total: AtomicUsize::new(0),
            done: AtomicUsize::new(0),
            finished: AtomicBool::new(false),
        });

        let outcome = runner(model.clone(), 3)
            .run(products(8), &StopFlag::new(), progress.clone())
            .await;

        let skus: Vec<&str> = outcome.results.iter().map(|r| r.sku()).collect();
        assert_eq!(skus, vec!["P0", "P1", "P2", "P3", "P4", "P5", "P6", "P7"]);
        assert!(model.peak.load(Ordering::SeqCst) <= 3);
        assert!(!outcome.interrupted);
        assert_eq!(outcome.skipped, 0);
        assert_eq!(outcome.descriptions_generated(), 8);
        assert_eq!(outcome.images_found(), 0);
        assert_eq!(progress.total.load(Ordering::SeqCst), 8);
        assert_eq!(progress.done.load(Ordering::SeqCst), 8);
        assert!(progress.finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn sequential_mode_never_overlaps() {
        let model = Arc::new(StaggeredModel {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            count: 4,
        });

        let outcome = runner(model.clone(), 1)
            .run(products(4), &StopFlag::new(), Arc::new(SilentBatchProgress))
            .await;

        assert_eq!(outcome.results.len(), 4);
        assert_eq!(model.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panicking_task_gets_placeholder_record() {
        let outcome = runner(Arc::new(PanickingModel { victim: 1 }), 2)
            .run(products(3), &StopFlag::new(), Arc::new(SilentBatchProgress))
            .await;

        assert_eq!(outcome.results.len(), 3);
        let failed = &outcome.results[1];
        assert_eq!(failed.sku(), "P1");
        assert_eq!(failed.stock(), 1);
        assert_eq!(failed.image_url(), PLACEHOLDER_IMAGE_URL);
        assert_eq!(failed.short_description(), generation_failed().short);
        assert_eq!(outcome.results[2].short_description(), "ok");
        assert_eq!(outcome.descriptions_generated(), 2);
    }

    #[tokio::test]
    async fn quota_error_on_first_row_does_not_stop_the_batch() {
        let outcome = runner(Arc::new(QuotaModel { exhausted_for: 0 }), 2)
            .run(products(4), &StopFlag::new(), Arc::new(SilentBatchProgress))
            .await;

        let skus: Vec<&str> = outcome.results.iter().map(|r| r.sku()).collect();
        assert_eq!(skus, vec!["P0", "P1", "P2", "P3"]);
        assert!(!outcome.interrupted);
        assert_eq!(outcome.skipped, 0);

        let first = &outcome.results[0];
        assert_eq!(first.short_description(), generation_failed().short);
        assert_eq!(first.long_description(), generation_failed().long);
        for result in &outcome.results[1..] {
            assert_eq!(result.short_description(), "ok");
        }
        assert_eq!(outcome.descriptions_generated(), 3);
    }

    #[tokio::test]
    async fn stop_skips_unstarted_products() {
        let stop = StopFlag::new();
        let model = Arc::new(StoppingModel {
            trigger: 1,
            stop: stop.clone(),
            seen: Mutex::new(Vec::new()),
        });

        let outcome = runner(model.clone(), 1)
            .run(products(5), &stop, Arc::new(SilentBatchProgress))
            .await;

        let skus: Vec<&str> = outcome.results.iter().map(|r| r.sku()).collect();
        assert_eq!(skus, vec!["P0", "P1"]);
        assert_eq!(outcome.skipped, 3);
        assert!(outcome.interrupted);
        assert_eq!(*model.seen.lock().unwrap(), vec![0, 1]);
    }

    #[tokio::test]
    async fn stop_before_start_runs_nothing() {
        let stop = StopFlag::new();
        stop.stop();

        let outcome = runner(Arc::new(PanickingModel { victim: 99 }), 4)
            .run(products(3), &stop, Arc::new(SilentBatchProgress))
            .await;

        assert!(outcome.results.is_empty());
        assert_eq!(outcome.skipped, 3);
        assert!(outcome.interrupted);
    }

    #[tokio::test]
    async fn empty_input_is_an_empty_outcome() {
        let outcome = runner(Arc::new(PanickingModel { victim: 99 }), 4)
            .run(Vec::new(), &StopFlag::new(), Arc::new(SilentBatchProgress))
            .await;

        assert!(outcome.results.is_empty());
        assert!(!outcome.interrupted);
        assert!(outcome.finished_at >= outcome.started_at);
    }
}
