use super::*;
use crate::testing::ScriptedBroker;
use std::time::Duration;
use trading::{
    AccountInfo, ExecutionFailure, FailureKind, InstrumentSpec, RequestId, Side, SubmitterId,
};

fn config(workers: usize, max_retries: u32, base_ms: u64) -> ProcessorConfig {
    ProcessorConfig::new(workers, max_retries, Duration::from_millis(base_ms))
}

fn create_processor(broker: Arc<ScriptedBroker>, config: ProcessorConfig) -> DealProcessor {
    let processor = DealProcessor::new(broker, config).unwrap();
    processor.start().unwrap();
    processor
}

fn eurusd(id: &str) -> TradeRequest {
    TradeRequest::new("Client-1", Side::Buy, "EURUSD", 0.1).with_request_id(id)
}

fn connection_timeout() -> ExecutionFailure {
    ExecutionFailure::transient(FailureKind::Connection, "server connection timeout")
}

fn result_of(processor: &DealProcessor, id: &str) -> TradeResult {
    processor
        .tracker()
        .get_by_request_id(&RequestId::new(id))
        .unwrap()
}

/// Panics inside `execute`.
struct PanickingBroker;

impl Broker for PanickingBroker {
    fn symbol_info(&self, symbol: &str) -> Option<InstrumentSpec> {
        Some(InstrumentSpec::new(symbol, 1.0, 1.1, 0.01, 100.0, 0.01, 5))
    }

    fn account_info(&self, _login: u64) -> Option<AccountInfo> {
        None
    }

    fn execute(&self, _request: &TradeRequest) -> ExecutionOutcome {
        panic!("gateway crashed");
    }

    fn ticket_info(&self, _ticket: &str) -> Option<ExecutionOutcome> {
        None
    }
}

#[test]
fn test_successful_execution_is_recorded_once() {
    let broker = Arc::new(ScriptedBroker::with_default_symbol());
    let processor = create_processor(broker.clone(), config(2, 3, 10));

    processor.submit(eurusd("r-1"), None).unwrap();
    processor.stop();

    let result = result_of(&processor, "r-1");
    assert!(result.is_success());
    assert_eq!(result.retry_count(), 0);
    assert!(result.ticket().is_some());
    assert_eq!(result.price(), Some(1.08465));
    assert_eq!(processor.tracker().len(), 1);
    assert_eq!(broker.executions(), 1);
}

#[test]
fn test_single_worker_dequeues_in_fifo_order() {
    let broker = Arc::new(ScriptedBroker::with_default_symbol());
    let processor = create_processor(broker, config(1, 0, 1));
    let order = Arc::new(Mutex::new(Vec::new()));

    for id in ["r1", "r2", "r3", "r4", "r5"] {
        let order = order.clone();
        processor
            .submit(
                eurusd(id),
                Some(Box::new(move |r: &TradeResult| {
                    order.lock().unwrap().push(r.request_id().to_string());
                })),
            )
            .unwrap();
    }
    processor.stop();

    assert_eq!(*order.lock().unwrap(), vec!["r1", "r2", "r3", "r4", "r5"]);
}

#[test]
fn test_transient_failures_retried_until_success() {
    let broker = Arc::new(
        ScriptedBroker::with_default_symbol().fail_next([connection_timeout(), connection_timeout()]),
    );
    let base = 50;
    let processor = create_processor(broker.clone(), config(1, 3, base));

    let rx = processor.submit_with_receipt(eurusd("retry-1")).unwrap();
    let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();

    assert_eq!(result.status(), TradeStatus::Success);
    assert_eq!(result.retry_count(), 2);
    assert_eq!(broker.executions(), 3);

    let gaps = broker.call_gaps();
    assert_eq!(gaps.len(), 2);
    let base = Duration::from_millis(base);
    assert!(gaps[0] >= base, "first backoff too short: {:?}", gaps[0]);
    assert!(gaps[1] >= base * 2, "second backoff too short: {:?}", gaps[1]);
    assert!(gaps[1] >= gaps[0], "backoff not monotonic: {:?}", gaps);
    assert!(gaps[1] < base * 2 + Duration::from_millis(500));
}

#[test]
fn test_exhaustion_after_max_retries() {
    let broker = Arc::new(ScriptedBroker::with_default_symbol().always_fail(connection_timeout()));
    let processor = create_processor(broker.clone(), config(1, 2, 1));

    processor.submit(eurusd("doomed"), None).unwrap();
    processor.stop();

    let result = result_of(&processor, "doomed");
    assert_eq!(result.status(), TradeStatus::RetryExhausted);
    assert_eq!(result.retry_count(), 2);
    assert_eq!(broker.executions(), 3);
    assert_eq!(
        result.error(),
        Some("All 3 attempts failed. Last error: server connection timeout")
    );
    assert!(result.ticket().is_none());
}

#[test]
fn test_zero_retries_exhausts_after_single_attempt() {
    let broker = Arc::new(ScriptedBroker::with_default_symbol().always_fail(connection_timeout()));
    let processor = create_processor(broker.clone(), config(1, 0, 1));

    processor.submit(eurusd("once"), None).unwrap();
    processor.stop();

    assert_eq!(result_of(&processor, "once").status(), TradeStatus::RetryExhausted);
    assert_eq!(broker.executions(), 1);
}

#[test]
fn test_permanent_failure_is_not_retried() {
    let broker = Arc::new(ScriptedBroker::with_default_symbol().fail_next([
        ExecutionFailure::permanent(FailureKind::Margin, "Insufficient margin"),
    ]));
    let processor = create_processor(broker.clone(), config(1, 3, 1));

    processor.submit(eurusd("margin"), None).unwrap();
    processor.stop();

    let result = result_of(&processor, "margin");
    assert_eq!(result.status(), TradeStatus::MarginError);
    assert_eq!(result.retry_count(), 0);
    assert_eq!(result.error(), Some("Insufficient margin"));
    assert_eq!(broker.executions(), 1);
}

#[test]
fn test_rejections_retried_only_when_configured() {
    let rejected = ExecutionFailure::permanent(FailureKind::Rejected, "Trading disabled");

    let broker = Arc::new(ScriptedBroker::with_default_symbol().always_fail(rejected.clone()));
    let processor = create_processor(broker.clone(), config(1, 2, 1));
    processor.submit(eurusd("rej"), None).unwrap();
    processor.stop();
    assert_eq!(result_of(&processor, "rej").status(), TradeStatus::Rejected);
    assert_eq!(broker.executions(), 1);

    let broker = Arc::new(ScriptedBroker::with_default_symbol().always_fail(rejected));
    let processor = create_processor(broker.clone(), config(1, 2, 1).with_retry_rejections(true));
    processor.submit(eurusd("rej"), None).unwrap();
    processor.stop();
    assert_eq!(result_of(&processor, "rej").status(), TradeStatus::RetryExhausted);
    assert_eq!(broker.executions(), 3);
}

#[test]
fn test_invalid_volume_never_reaches_execute() {
    let broker = Arc::new(ScriptedBroker::with_default_symbol());
    let processor = create_processor(broker.clone(), config(2, 3, 1));

    let zero = TradeRequest::new("Client-1", Side::Sell, "EURUSD", 0.0).with_request_id("zero");
    processor.submit(zero, None).unwrap();
    processor.stop();

    let result = result_of(&processor, "zero");
    assert_eq!(result.status(), TradeStatus::InvalidParams);
    assert_eq!(result.retry_count(), 0);
    assert_eq!(broker.executions(), 0);
}

#[test]
fn test_duplicate_request_executed_once() {
    let broker = Arc::new(ScriptedBroker::with_default_symbol());
    let processor = Arc::new(create_processor(broker.clone(), config(4, 0, 1)));
    let receipts = Arc::new(Mutex::new(Vec::new()));

    let producers: Vec<_> = (0..2)
        .map(|_| {
            let p = processor.clone();
            let receipts = receipts.clone();
            thread::spawn(move || {
                let rx = p.submit_with_receipt(eurusd("same-id")).unwrap();
                receipts.lock().unwrap().push(rx);
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    let statuses: Vec<TradeStatus> = receipts
        .lock()
        .unwrap()
        .iter()
        .map(|rx| rx.recv_timeout(Duration::from_secs(5)).unwrap().status())
        .collect();
    processor.stop();

    assert_eq!(statuses.iter().filter(|s| **s == TradeStatus::Duplicate).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == TradeStatus::Success).count(), 1);
    assert_eq!(broker.executions(), 1);
    assert!(result_of(&processor, "same-id").is_success());
}

#[test]
fn test_stop_drains_every_queued_request() {
    let broker = Arc::new(ScriptedBroker::with_default_symbol().with_latency(Duration::from_millis(2)));
    let processor = create_processor(broker, config(2, 0, 1));

    for i in 0..50 {
        processor.submit(eurusd(&format!("d-{}", i)), None).unwrap();
    }
    processor.stop();

    assert_eq!(processor.tracker().len(), 50);
    assert_eq!(processor.queue_depth(), 0);
    assert_eq!(processor.tracker().stats().successful(), 50);
}

#[test]
fn test_submit_rejected_outside_running_window() {
    let broker = Arc::new(ScriptedBroker::with_default_symbol());
    let processor = DealProcessor::new(broker, config(1, 0, 1)).unwrap();

    assert_eq!(
        processor.submit(eurusd("early"), None),
        Err(SubmitError::NotRunning(RequestId::new("early")))
    );

    processor.start().unwrap();
    assert!(processor.is_running());
    processor.stop();
    assert!(!processor.is_running());

    assert!(processor.submit(eurusd("late"), None).is_err());
    assert!(processor.tracker().is_empty());
}

#[test]
fn test_lifecycle_is_idempotent() {
    let broker = Arc::new(ScriptedBroker::with_default_symbol());
    let processor = DealProcessor::new(broker, config(3, 0, 1)).unwrap();

    processor.start().unwrap();
    processor.start().unwrap();
    processor.stop();
    processor.stop();

    assert!(matches!(processor.start(), Err(StartError::AlreadyStopped)));
}

#[test]
fn test_stop_without_start_returns() {
    let broker = Arc::new(ScriptedBroker::with_default_symbol());
    let processor = DealProcessor::new(broker, config(2, 0, 1)).unwrap();
    processor.stop();
    assert!(!processor.is_running());
}

#[test]
fn test_zero_workers_rejected_at_construction() {
    let broker = Arc::new(ScriptedBroker::with_default_symbol());
    assert!(DealProcessor::new(broker, config(0, 0, 1)).is_err());
}

#[test]
fn test_panicking_callback_does_not_kill_worker() {
    let broker = Arc::new(ScriptedBroker::with_default_symbol());
    let processor = create_processor(broker, config(1, 0, 1));

    processor
        .submit(
            eurusd("boom"),
            Some(Box::new(|_: &TradeResult| panic!("client went away"))),
        )
        .unwrap();
    let rx = processor.submit_with_receipt(eurusd("after")).unwrap();

    assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap().is_success());
    processor.stop();
    assert_eq!(processor.tracker().len(), 2);
}

#[test]
fn test_panicking_broker_still_produces_result() {
    let processor = DealProcessor::new(Arc::new(PanickingBroker), config(1, 3, 1)).unwrap();
    processor.start().unwrap();

    processor.submit(eurusd("p-1"), None).unwrap();
    processor.submit(eurusd("p-2"), None).unwrap();
    processor.stop();

    for id in ["p-1", "p-2"] {
        let result = result_of(&processor, id);
        assert_eq!(result.status(), TradeStatus::ConnectionError);
        assert!(result.error().is_some());
    }
}

#[test]
fn test_results_queryable_by_submitter_in_submission_order() {
    let broker = Arc::new(ScriptedBroker::with_default_symbol().with_latency(Duration::from_millis(1)));
    let processor = create_processor(broker, config(4, 0, 1));

    let ids: Vec<String> = (0..20).map(|i| format!("s-{:02}", i)).collect();
    for id in &ids {
        processor.submit(eurusd(id), None).unwrap();
    }
    processor.stop();

    let recorded: Vec<String> = processor
        .tracker()
        .get_by_submitter(&SubmitterId::new("Client-1"))
        .iter()
        .map(|r| r.request_id().to_string())
        .collect();
    assert_eq!(recorded, ids);
}

#[test]
fn test_shared_tracker_is_injected() {
    let tracker = Arc::new(ResultTracker::new());
    let broker = Arc::new(ScriptedBroker::with_default_symbol());
    let processor = DealProcessor::with_tracker(broker, config(1, 0, 1), tracker.clone()).unwrap();
    processor.start().unwrap();

    processor.submit(eurusd("t-1"), None).unwrap();
    processor.stop();

    assert!(Arc::ptr_eq(processor.tracker(), &tracker));
    assert_eq!(tracker.len(), 1);
}

#[test]
fn test_duplicate_from_second_submitter_is_recorded() {
    let broker = Arc::new(ScriptedBroker::with_default_symbol());
    let processor = create_processor(broker.clone(), config(1, 0, 1));

    processor.submit(eurusd("shared"), None).unwrap();
    let reused = TradeRequest::new("Client-B", Side::Sell, "EURUSD", 0.1).with_request_id("shared");
    processor.submit(reused, None).unwrap();
    processor.stop();

    assert_eq!(broker.executions(), 1);
    let original = result_of(&processor, "shared");
    assert!(original.is_success());
    assert_eq!(original.submitter_id().as_str(), "Client-1");

    let tracker = processor.tracker();
    let client_b = tracker.get_by_submitter(&SubmitterId::new("Client-B"));
    assert_eq!(client_b.len(), 1);
    assert_eq!(client_b[0].status(), TradeStatus::Duplicate);

    let stats = tracker.stats();
    assert_eq!(stats.total(), 2);
    assert_eq!(stats.duplicates(), 1);
    assert_eq!(tracker.len(), 2);
}

#[test]
fn test_dropping_last_handle_inside_callback() {
    let broker = Arc::new(ScriptedBroker::with_default_symbol().with_latency(Duration::from_millis(50)));
    let processor = Arc::new(create_processor(broker, config(2, 0, 1)));
    let tracker = processor.tracker().clone();
    let keep_alive = processor.clone();
    let (done_tx, done_rx) = std::sync::mpsc::channel();

    processor
        .submit(
            eurusd("last-owner"),
            Some(Box::new(move |result: &TradeResult| {
                let success = result.is_success();
                // Last strong reference, so the processor stops on this worker.
                drop(keep_alive);
                let _ = done_tx.send(success);
            })),
        )
        .unwrap();
    processor.submit(eurusd("queued"), None).unwrap();
    drop(processor);

    assert!(done_rx.recv_timeout(Duration::from_secs(5)).unwrap());
    assert!(tracker.get_by_request_id(&RequestId::new("last-owner")).unwrap().is_success());
    assert!(tracker.get_by_request_id(&RequestId::new("queued")).unwrap().is_success());
}

#[test]
fn test_processors_sharing_tracker_keep_one_sequence() {
    let tracker = Arc::new(ResultTracker::new());
    let processors: Vec<DealProcessor> = (0..2)
        .map(|_| {
            let broker = Arc::new(ScriptedBroker::with_default_symbol());
            let processor =
                DealProcessor::with_tracker(broker, config(1, 0, 1), tracker.clone()).unwrap();
            processor.start().unwrap();
            processor
        })
        .collect();

    let ids: Vec<String> = (0..10).map(|i| format!("x-{:02}", i)).collect();
    for (i, id) in ids.iter().enumerate() {
        processors[i % 2].submit(eurusd(id), None).unwrap();
    }
    for processor in &processors {
        processor.stop();
    }

    let recorded = tracker.get_by_submitter(&SubmitterId::new("Client-1"));
    let mut sequences: Vec<u64> = recorded.iter().map(|r| r.sequence()).collect();
    sequences.dedup();
    assert_eq!(sequences.len(), ids.len());

    let order: Vec<String> = recorded.iter().map(|r| r.request_id().to_string()).collect();
    assert_eq!(order, ids);
}
