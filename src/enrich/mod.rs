//! Optional block enrichment through an external service.
//!
//! The runner hands selected region blocks to an [`Enricher`] from a bounded
//! pool of worker threads. A rate-limited request is retried with linear
//! backoff; any other failure leaves the block untouched. Successful results
//! replace the block in its parent's structure while holding the document
//! lock.

use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded};
use thiserror::Error;

use crate::error::{Error, Result};
use crate::geometry::Polygon;
use crate::model::{BlockContent, BlockId, BlockType, Document, Page, RegionContent, SourceMethod};

/// Default number of concurrent enrichment workers.
pub const DEFAULT_MAX_CONCURRENCY: usize = 3;

/// Default number of retries after a rate-limit response.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// A block offered for enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichRequest {
    pub block_id: BlockId,

    /// Block whose structure lists `block_id`
    pub parent: BlockId,

    pub block_type: BlockType,
    pub polygon: Polygon,

    /// Plain text under the block
    pub text: String,
}

/// Replacement produced by an enricher.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedBlock {
    /// Type of the replacement block
    pub block_type: BlockType,

    /// Markup rendered verbatim in place of the original block
    pub html: String,
}

/// Errors an enricher can report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnrichError {
    #[error("rate limited")]
    RateLimited,

    #[error("request timed out")]
    Timeout,

    #[error("enrichment failed: {0}")]
    Failed(String),
}

/// An external service that rewrites a single block.
pub trait Enricher: Send + Sync {
    /// Enrich one block. `Ok(None)` keeps the block as is.
    fn enrich(
        &self,
        request: &EnrichRequest,
        timeout: Duration,
    ) -> std::result::Result<Option<EnrichedBlock>, EnrichError>;
}

/// Options for the enrichment runner.
#[derive(Debug, Clone)]
pub struct EnrichOptions {
    /// Worker threads pulling from the request queue
    pub max_concurrency: usize,

    /// Retries after a rate-limit response before giving up
    pub max_retries: u32,

    /// Backoff unit; attempt `n` sleeps `n * retry_wait`
    pub retry_wait: Duration,

    /// Per-request timeout passed to the enricher
    pub timeout: Duration,
}

impl EnrichOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_concurrency(mut self, workers: usize) -> Self {
        self.max_concurrency = workers.max(1);
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_wait(mut self, wait: Duration) -> Self {
        self.retry_wait = wait;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_wait: Duration::from_secs(3),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Outcome counts of one enrichment run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichStats {
    pub attempted: usize,
    pub replaced: usize,
    pub unchanged: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Replaced,
    Unchanged,
    Failed,
}

/// Runs an [`Enricher`] over a document with bounded concurrency.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentRunner {
    options: EnrichOptions,
}

impl EnrichmentRunner {
    pub fn new(options: EnrichOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EnrichOptions {
        &self.options
    }

    /// Enrich every reachable block whose type is in `targets`.
    ///
    /// Each block is handled by exactly one worker.
    pub fn run(&self, document: &Mutex<Document>, enricher: &dyn Enricher, targets: &[BlockType]) -> EnrichStats {
        let requests = match document.lock() {
            Ok(doc) => collect_requests(&doc, targets),
            Err(poisoned) => collect_requests(&poisoned.into_inner(), targets),
        };
        let mut stats = EnrichStats {
            attempted: requests.len(),
            ..Default::default()
        };
        if requests.is_empty() {
            return stats;
        }

        let workers = self.options.max_concurrency.max(1).min(requests.len());
        log::debug!("Enriching {} block(s) with {} worker(s)", requests.len(), workers);

        let (request_tx, request_rx) = bounded::<EnrichRequest>(workers);
        let (outcome_tx, outcome_rx) = unbounded::<Outcome>();

        thread::scope(|scope| {
            for _ in 0..workers {
                let request_rx = request_rx.clone();
                let outcome_tx = outcome_tx.clone();
                scope.spawn(move || {
                    for request in request_rx {
                        let outcome = self.process(document, enricher, &request);
                        if outcome_tx.send(outcome).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(request_rx);
            drop(outcome_tx);

            for request in requests {
                if request_tx.send(request).is_err() {
                    break;
                }
            }
            drop(request_tx);
        });

        for outcome in outcome_rx.iter() {
            match outcome {
                Outcome::Replaced => stats.replaced += 1,
                Outcome::Unchanged => stats.unchanged += 1,
                Outcome::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Retry loop for a single block.
    fn process(&self, document: &Mutex<Document>, enricher: &dyn Enricher, request: &EnrichRequest) -> Outcome {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match enricher.enrich(request, self.options.timeout) {
                Ok(Some(enriched)) => {
                    return match apply(document, request, enriched) {
                        Ok(()) => Outcome::Replaced,
                        Err(e) => {
                            log::warn!("Could not replace {}: {}", request.block_id, e);
                            Outcome::Failed
                        }
                    };
                }
                Ok(None) => return Outcome::Unchanged,
                Err(EnrichError::RateLimited) if attempt <= self.options.max_retries => {
                    let wait = self.options.retry_wait * attempt;
                    log::debug!(
                        "{} rate limited, retrying in {:?} (attempt {})",
                        request.block_id,
                        wait,
                        attempt
                    );
                    thread::sleep(wait);
                }
                Err(e) => {
                    log::warn!(
                        "Leaving {} unchanged after {} attempt(s): {}",
                        request.block_id,
                        attempt,
                        e
                    );
                    return Outcome::Failed;
                }
            }
        }
    }
}

/// Swap the requested block for a new one carrying the enriched markup.
fn apply(document: &Mutex<Document>, request: &EnrichRequest, enriched: EnrichedBlock) -> Result<()> {
    let mut doc = match document.lock() {
        Ok(doc) => doc,
        Err(poisoned) => {
            log::warn!("Document lock poisoned, continuing with its last state");
            poisoned.into_inner()
        }
    };
    let page = doc
        .get_page_mut(request.block_id.page)
        .ok_or_else(|| Error::Enrichment(format!("{} no longer resolves", request.block_id)))?;

    let structure = page
        .get_block(request.block_id)
        .map(|block| block.structure.clone())
        .ok_or_else(|| Error::Enrichment(format!("{} no longer resolves", request.block_id)))?;

    let content = BlockContent::Region(RegionContent {
        html: Some(enriched.html),
        ..Default::default()
    });
    let new_id = page.allocate(enriched.block_type, request.polygon, content, SourceMethod::Heuristic)?;
    if let Some(block) = page.get_block_mut(new_id) {
        block.structure = structure;
    }
    page.replace_block(request.parent, request.block_id, new_id)
}

/// Reachable, non-ignored region blocks of the target types, in reading order.
pub fn collect_requests(doc: &Document, targets: &[BlockType]) -> Vec<EnrichRequest> {
    let mut requests = Vec::new();
    for page in &doc.pages {
        collect_from(page, page.id(), targets, &mut requests);
    }
    requests
}

fn collect_from(page: &Page, parent: BlockId, targets: &[BlockType], out: &mut Vec<EnrichRequest>) {
    for id in page.children(parent) {
        if !id.block_type.is_region() {
            continue;
        }
        let Some(block) = page.get_block(*id) else {
            continue;
        };
        if targets.contains(&id.block_type) && !block.ignore_for_output {
            out.push(EnrichRequest {
                block_id: *id,
                parent,
                block_type: id.block_type,
                polygon: block.polygon,
                text: page.raw_text(*id),
            });
        }
        collect_from(page, *id, targets, out);
    }
}
