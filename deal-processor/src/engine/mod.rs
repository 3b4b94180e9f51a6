use crate::config::ProcessorConfig;
use crate::error::{ConfigError, StartError, SubmitError};
use crate::queue::{QueueClosed, WorkQueue};
use crate::tracker::ResultTracker;
use crate::validator::Validator;
use log::{debug, error, info, warn};
use retry::RetryPolicy;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use trading::{Broker, ExecutionOutcome, TradeRequest, TradeResult, TradeStatus};

pub mod retry;

/// Continuation invoked by the worker once a request's result is recorded.
pub type ResultCallback = Box<dyn FnOnce(&TradeResult) + Send + 'static>;

/// A request in transit through the queue.
struct WorkItem {
    request: TradeRequest,
    sequence: u64,
    callback: Option<ResultCallback>,
}

/// Per-worker processing state.
///
/// `Idle -> Dequeuing -> Validating -> Executing -> Recording -> Idle`, until
/// the queue reports no more work and the worker enters `Stopped`.
/// Rejected requests skip `Executing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Dequeuing,
    Validating,
    Executing,
    Recording,
    Stopped,
}

/// State shared by every worker of a pool.
struct Shared {
    queue: WorkQueue<WorkItem>,
    validator: Validator,
    broker: Arc<dyn Broker>,
    tracker: Arc<ResultTracker>,
    retry: RetryPolicy,
}

enum Lifecycle {
    Idle,
    Running(Vec<JoinHandle<()>>),
    Stopped,
}

/// Central deal processor.
///
/// Producers call [`DealProcessor::submit`] from any thread; a fixed pool of
/// worker threads drains the queue, validates, executes with retry and
/// records exactly one [`TradeResult`] per accepted request.
pub struct DealProcessor {
    config: ProcessorConfig,
    shared: Arc<Shared>,
    lifecycle: Mutex<Lifecycle>,
    accepting: AtomicBool,
}

impl DealProcessor {
    pub fn new(broker: Arc<dyn Broker>, config: ProcessorConfig) -> Result<Self, ConfigError> {
        Self::with_tracker(broker, config, Arc::new(ResultTracker::new()))
    }

    /// Builds a processor recording into an externally owned tracker.
    pub fn with_tracker(
        broker: Arc<dyn Broker>,
        config: ProcessorConfig,
        tracker: Arc<ResultTracker>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let shared = Shared {
            queue: WorkQueue::new(),
            validator: Validator::new(broker.clone()),
            broker,
            tracker,
            retry: config.retry_policy(),
        };
        Ok(Self {
            config,
            shared: Arc::new(shared),
            lifecycle: Mutex::new(Lifecycle::Idle),
            accepting: AtomicBool::new(false),
        })
    }

    /// Spawns the worker pool. A no-op if the pool is already running.
    pub fn start(&self) -> Result<(), StartError> {
        let mut lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        match *lifecycle {
            Lifecycle::Running(_) => return Ok(()),
            Lifecycle::Stopped => return Err(StartError::AlreadyStopped),
            Lifecycle::Idle => {}
        }

        info!(
            "DealProcessor starting with {} worker threads",
            self.config.workers
        );
        let mut handles = Vec::with_capacity(self.config.workers);
        for id in 0..self.config.workers {
            let worker = Worker::new(id, self.shared.clone());
            let spawned = thread::Builder::new()
                .name(worker.name.clone())
                .spawn(move || worker.run());

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    error!("Failed to spawn worker {}: {}", id, source);
                    self.shared.queue.shutdown();
                    join_all(handles);
                    *lifecycle = Lifecycle::Stopped;
                    return Err(StartError::Spawn { worker: id, source });
                }
            }
        }

        *lifecycle = Lifecycle::Running(handles);
        self.accepting.store(true, Ordering::SeqCst);
        info!("DealProcessor started successfully");
        Ok(())
    }

    /// Submits a request with an optional completion callback.
    ///
    /// Accepted only while the processor is running.
    pub fn submit(
        &self,
        request: TradeRequest,
        callback: Option<ResultCallback>,
    ) -> Result<(), SubmitError> {
        if !self.accepting.load(Ordering::SeqCst) {
            error!(
                "Cannot submit request - processor not running: {}",
                request.request_id()
            );
            return Err(SubmitError::NotRunning(request.request_id().clone()));
        }

        info!("Request received: {}", request);
        let item = WorkItem {
            request,
            sequence: self.shared.tracker.next_sequence(),
            callback,
        };
        self.shared
            .queue
            .enqueue(item)
            .map_err(|QueueClosed(item)| {
                error!(
                    "Cannot submit request - processor shutting down: {}",
                    item.request.request_id()
                );
                SubmitError::NotRunning(item.request.request_id().clone())
            })
    }

    /// Submits a request and returns a channel yielding its result.
    pub fn submit_with_receipt(
        &self,
        request: TradeRequest,
    ) -> Result<Receiver<TradeResult>, SubmitError> {
        let (tx, rx) = mpsc::channel();
        self.submit(
            request,
            Some(Box::new(move |result: &TradeResult| {
                // The caller may have dropped the receiver.
                let _ = tx.send(result.clone());
            })),
        )?;
        Ok(rx)
    }

    /// Stops accepting requests, drains the queue and joins every worker.
    ///
    /// Blocks until all workers have exited. Idempotent.
    pub fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        self.accepting.store(false, Ordering::SeqCst);

        match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Running(handles) => {
                info!(
                    "DealProcessor shutting down... draining queue ({} pending)",
                    self.shared.queue.depth()
                );
                self.shared.queue.shutdown();
                join_all(handles);
                info!("DealProcessor stopped. All workers joined.");
            }
            Lifecycle::Idle | Lifecycle::Stopped => self.shared.queue.shutdown(),
        }
    }

    pub fn tracker(&self) -> &Arc<ResultTracker> {
        &self.shared.tracker
    }

    pub fn queue_depth(&self) -> usize {
        self.shared.queue.depth()
    }

    pub fn is_running(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    pub fn worker_count(&self) -> usize {
        self.config.workers
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }
}

impl Drop for DealProcessor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn join_all(handles: Vec<JoinHandle<()>>) {
    let current = thread::current().id();
    for handle in handles {
        // Dropping the processor from a callback stops it on one of its own workers.
        if handle.thread().id() == current {
            debug!("Skipping join of current worker thread");
            continue;
        }
        if handle.join().is_err() {
            error!("Worker thread terminated by panic");
        }
    }
}

struct Worker {
    name: String,
    state: WorkerState,
    shared: Arc<Shared>,
}

impl Worker {
    fn new(id: usize, shared: Arc<Shared>) -> Self {
        Self {
            name: format!("deal-worker-{}", id),
            state: WorkerState::Idle,
            shared,
        }
    }

    fn transition(&mut self, next: WorkerState) {
        debug!("{} {:?} -> {:?}", self.name, self.state, next);
        self.state = next;
    }

    fn run(mut self) {
        info!("{} started", self.name);

        loop {
            self.transition(WorkerState::Dequeuing);
            let Some(item) = self.shared.queue.dequeue() else {
                break;
            };
            let WorkItem {
                request,
                sequence,
                callback,
            } = item;

            let result = self.process_guarded(&request).with_sequence(sequence);

            self.transition(WorkerState::Recording);
            self.shared.tracker.record(result.clone());

            if let Some(callback) = callback {
                let notified = panic::catch_unwind(AssertUnwindSafe(|| callback(&result)));
                if notified.is_err() {
                    error!(
                        "{} completion callback panicked for {}",
                        self.name,
                        result.request_id()
                    );
                }
            }
            self.transition(WorkerState::Idle);
        }

        self.transition(WorkerState::Stopped);
        info!("{} stopped", self.name);
    }

    /// Processes a request, turning a panic in the validator or broker into a result.
    fn process_guarded(&mut self, request: &TradeRequest) -> TradeResult {
        match panic::catch_unwind(AssertUnwindSafe(|| self.process(request))) {
            Ok(result) => result,
            Err(_) => {
                error!("{} panicked while processing {}", self.name, request.request_id());
                TradeResult::failed(
                    request,
                    TradeStatus::ConnectionError,
                    "Broker call panicked during processing",
                )
            }
        }
    }

    /// Validate, then execute with retry.
    fn process(&mut self, request: &TradeRequest) -> TradeResult {
        self.transition(WorkerState::Validating);
        debug!("{} validating: {}", self.name, request.request_id());
        if let Some(rejection) = self.shared.validator.validate(request) {
            warn!("{} validation failed: {}", self.name, rejection);
            return rejection;
        }
        debug!("{} validation passed: {}", self.name, request.request_id());

        self.transition(WorkerState::Executing);
        let result = self.execute_with_retry(request);
        if result.is_success() {
            info!("{} EXECUTED: {}", self.name, result);
        } else {
            error!("{} FAILED: {}", self.name, result);
        }
        result
    }

    fn execute_with_retry(&self, request: &TradeRequest) -> TradeResult {
        let policy = &self.shared.retry;
        let mut attempt: u32 = 0;

        loop {
            if attempt > 0 {
                let delay = policy.backoff(attempt);
                warn!(
                    "{} retrying {} (attempt {}/{}, delay={}ms)",
                    self.name,
                    request.request_id(),
                    attempt + 1,
                    policy.max_attempts(),
                    delay.as_millis()
                );
                thread::sleep(delay);
            }

            debug!("{} executing: {}", self.name, request);
            let failure = match self.shared.broker.execute(request) {
                ExecutionOutcome::Filled(fill) => {
                    return TradeResult::filled(request, &fill).with_retry_count(attempt);
                }
                ExecutionOutcome::Failed(failure) => failure,
            };

            if !policy.should_retry(&failure) {
                return TradeResult::from_failure(request, &failure).with_retry_count(attempt);
            }
            if attempt >= policy.max_retries() {
                return TradeResult::failed(
                    request,
                    TradeStatus::RetryExhausted,
                    format!(
                        "All {} attempts failed. Last error: {}",
                        policy.max_attempts(),
                        failure.reason
                    ),
                )
                .with_retry_count(attempt);
            }

            warn!("{} transient failure: {}", self.name, failure.reason);
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests;
