//! Bounded-concurrency job scheduler
//!
//! Jobs wait in a FIFO queue. Whenever slots are free, exactly that many jobs
//! are admitted and spawned; each completion frees its slot, bumps the
//! processed counter and admits more work. Jobs may be enqueued at any time.
//!
//! Must be used from within a Tokio runtime.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

use super::select_best_image;
use crate::analysis::{AnalysisResult, ConsensusEngine};
use crate::capture::ProcessingJob;
use crate::knowledge::TrainingExample;

/// Default number of jobs allowed to run at once
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 2;

/// Result of one finished job
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub group_id: String,
    /// Photo that was analysed (empty if the group had none)
    pub image_name: String,
    pub result: AnalysisResult,
}

/// Work performed for each admitted job
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, job: ProcessingJob) -> JobOutcome;
}

/// Picks the best photo of a group and analyses it
pub struct AnalysisRunner {
    engine: Arc<ConsensusEngine>,
    examples: Arc<RwLock<Vec<TrainingExample>>>,
}

impl AnalysisRunner {
    /// `examples` is read when each job starts, so corrections added while
    /// the batch runs apply to jobs admitted afterwards
    pub fn new(engine: Arc<ConsensusEngine>, examples: Arc<RwLock<Vec<TrainingExample>>>) -> Self {
        Self { engine, examples }
    }
}

#[async_trait]
impl JobRunner for AnalysisRunner {
    async fn run(&self, job: ProcessingJob) -> JobOutcome {
        let Some(best) = select_best_image(self.engine.extractor(), &job.images).await else {
            return JobOutcome {
                group_id: job.group_id,
                image_name: String::new(),
                result: AnalysisResult::rejected("group has no photos", None),
            };
        };

        let examples = self.examples.read().clone();
        let result = self.engine.analyze(best, &examples).await;

        JobOutcome {
            image_name: best.name.clone(),
            group_id: job.group_id,
            result,
        }
    }
}

#[derive(Default)]
struct QueueState {
    queue: VecDeque<ProcessingJob>,
    active: usize,
    processed: usize,
    total_enqueued: usize,
}

impl QueueState {
    fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.active == 0
    }
}

struct Inner {
    max_concurrent: usize,
    runner: Arc<dyn JobRunner>,
    state: Mutex<QueueState>,
    outcomes: mpsc::UnboundedSender<JobOutcome>,
    idle: Notify,
}

/// Releases a job's slot when the job task ends, including by panic
struct SlotGuard {
    inner: Arc<Inner>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let idle = {
            let mut state = self.inner.state.lock();
            state.active -= 1;
            state.processed += 1;
            state.is_idle()
        };

        pump(&self.inner);

        if idle {
            self.inner.idle.notify_waiters();
        }
    }
}

/// Admit as many queued jobs as there are free slots
fn pump(inner: &Arc<Inner>) {
    let batch: Vec<ProcessingJob> = {
        let mut state = inner.state.lock();
        let free = inner.max_concurrent.saturating_sub(state.active);
        let admit = free.min(state.queue.len());
        state.active += admit;
        state.queue.drain(..admit).collect()
    };

    for job in batch {
        debug!("Admitting job {}", job.group_id);
        let guard = SlotGuard { inner: inner.clone() };
        tokio::spawn(async move {
            let outcome = guard.inner.runner.run(job).await;
            if guard.inner.outcomes.send(outcome).is_err() {
                warn!("Job outcome dropped: receiver closed");
            }
            drop(guard);
        });
    }
}

/// FIFO job queue with a concurrency cap
#[derive(Clone)]
pub struct JobScheduler {
    inner: Arc<Inner>,
}

impl JobScheduler {
    /// Create a scheduler and the channel its outcomes arrive on
    pub fn new(
        max_concurrent: usize,
        runner: impl JobRunner + 'static,
    ) -> (Self, mpsc::UnboundedReceiver<JobOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let max_concurrent = max_concurrent.max(1);
        info!("Job scheduler running up to {} jobs at once", max_concurrent);

        let scheduler = Self {
            inner: Arc::new(Inner {
                max_concurrent,
                runner: Arc::new(runner),
                state: Mutex::new(QueueState::default()),
                outcomes: tx,
                idle: Notify::new(),
            }),
        };
        (scheduler, rx)
    }

    pub fn enqueue(&self, job: ProcessingJob) {
        self.enqueue_all(std::iter::once(job));
    }

    pub fn enqueue_all(&self, jobs: impl IntoIterator<Item = ProcessingJob>) {
        {
            let mut state = self.inner.state.lock();
            for job in jobs {
                state.queue.push_back(job);
                state.total_enqueued += 1;
            }
        }
        pump(&self.inner);
    }

    pub fn max_concurrent(&self) -> usize {
        self.inner.max_concurrent
    }

    /// Jobs finished so far
    pub fn processed(&self) -> usize {
        self.inner.state.lock().processed
    }

    /// Jobs currently running
    pub fn active(&self) -> usize {
        self.inner.state.lock().active
    }

    /// Jobs waiting for a slot
    pub fn queued(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    pub fn total_enqueued(&self) -> usize {
        self.inner.state.lock().total_enqueued
    }

    pub fn is_idle(&self) -> bool {
        self.inner.state.lock().is_idle()
    }

    /// Resolve once nothing is queued or running
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }
}
