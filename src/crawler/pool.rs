//! Long-lived enrichment worker pool
//!
//! A fixed number of worker tasks pull jobs from one shared queue. Each
//! dispatched batch gets its own outcome channel, so the caller consumes
//! results in completion order and remains their only owner.

use crate::crawler::enricher::{CompanyEnricher, EnrichmentOutcome, RawCompany};
use crate::HarvestError;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

struct Job {
    raw: RawCompany,
    region: Arc<str>,
    reply: mpsc::UnboundedSender<EnrichmentOutcome>,
}

/// Pool of `width` tasks running [`CompanyEnricher::enrich`]
///
/// Must be created inside a Tokio runtime.
pub struct EnrichmentPool {
    jobs: mpsc::Sender<Job>,
    workers: Vec<JoinHandle<()>>,
}

impl EnrichmentPool {
    pub fn new(enricher: Arc<CompanyEnricher>, width: usize) -> Self {
        let width = width.max(1);
        let (jobs, queue) = mpsc::channel::<Job>(width);
        let queue = Arc::new(Mutex::new(queue));

        let workers = (0..width)
            .map(|id| {
                let queue = Arc::clone(&queue);
                let enricher = Arc::clone(&enricher);
                tokio::spawn(run_worker(id, queue, enricher))
            })
            .collect();

        Self { jobs, workers }
    }

    /// Number of worker tasks
    pub fn width(&self) -> usize {
        self.workers.len()
    }

    /// Queues every company of `batch` and returns the stream of their outcomes
    ///
    /// The stream ends once every queued job has reported. If the pool shuts
    /// down mid-batch, the stream ends early and yields fewer outcomes than
    /// `batch.len()`.
    pub fn dispatch(
        &self,
        region: &str,
        batch: Vec<RawCompany>,
    ) -> mpsc::UnboundedReceiver<EnrichmentOutcome> {
        let (reply, outcomes) = mpsc::unbounded_channel();
        let jobs = self.jobs.clone();
        let region: Arc<str> = Arc::from(region);

        tokio::spawn(async move {
            for raw in batch {
                let job = Job {
                    raw,
                    region: Arc::clone(&region),
                    reply: reply.clone(),
                };
                if jobs.send(job).await.is_err() {
                    tracing::error!("Enrichment pool closed while dispatching {}", region);
                    break;
                }
            }
        });

        outcomes
    }

    /// Stops accepting jobs and waits for the workers to drain the queue
    pub async fn shutdown(self) -> Result<(), HarvestError> {
        drop(self.jobs);
        for worker in self.workers {
            worker.await?;
        }
        Ok(())
    }
}

async fn run_worker(
    id: usize,
    queue: Arc<Mutex<mpsc::Receiver<Job>>>,
    enricher: Arc<CompanyEnricher>,
) {
    loop {
        let job = queue.lock().await.recv().await;
        let Some(job) = job else {
            break;
        };

        let outcome = enricher.enrich(job.raw, &job.region).await;
        // The region may already have given up on this batch
        let _ = job.reply.send(outcome);
    }
    tracing::trace!("Enrichment worker {} stopped", id);
}
