//! Thread-safe store of final trade results.
//!
//! Every worker records into it concurrently while clients query it; a single
//! `RwLock` guards the result map together with the per-submitter index so
//! the two never disagree.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use trading::{RequestId, SubmitterId, TradeResult, TradeStatus};

/// Result counts per terminal status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionStats {
    total: usize,
    by_status: BTreeMap<TradeStatus, usize>,
}

impl ExecutionStats {
    fn add(&mut self, status: TradeStatus) {
        self.total += 1;
        *self.by_status.entry(status).or_default() += 1;
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn count(&self, status: TradeStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn by_status(&self) -> &BTreeMap<TradeStatus, usize> {
        &self.by_status
    }

    pub fn successful(&self) -> usize {
        self.count(TradeStatus::Success)
    }

    /// Requests the broker or the retry policy turned down.
    pub fn rejected(&self) -> usize {
        self.count(TradeStatus::Rejected)
            + self.count(TradeStatus::MarginError)
            + self.count(TradeStatus::RetryExhausted)
    }

    /// Requests that failed on bad parameters or connectivity.
    pub fn errors(&self) -> usize {
        self.count(TradeStatus::ConnectionError) + self.count(TradeStatus::InvalidParams)
    }

    pub fn duplicates(&self) -> usize {
        self.count(TradeStatus::Duplicate)
    }

    /// Share of successful requests in percent.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            100.0 * self.successful() as f64 / self.total as f64
        }
    }
}

/// Request id to broker ticket mapping of a successful trade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketRecord {
    pub request_id: RequestId,
    pub ticket: String,
    pub price: f64,
}

#[derive(Default)]
struct Inner {
    results: HashMap<RequestId, TradeResult>,
    by_submitter: HashMap<SubmitterId, Vec<RequestId>>,
    /// `Duplicate` rejections, kept apart since their id belongs to another request.
    duplicates: HashMap<SubmitterId, Vec<TradeResult>>,
}

impl Inner {
    fn submitter_results(&self, id: &SubmitterId) -> impl Iterator<Item = &TradeResult> {
        let keyed = self
            .by_submitter
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|req| self.results.get(req));
        keyed.chain(self.duplicates.get(id).into_iter().flatten())
    }

    fn every_result(&self) -> impl Iterator<Item = &TradeResult> {
        self.results
            .values()
            .chain(self.duplicates.values().flatten())
    }
}

#[derive(Default)]
pub struct ResultTracker {
    inner: RwLock<Inner>,
    sequence: AtomicU64,
}

impl ResultTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hands out the next submission sequence number.
    ///
    /// Shared by every processor recording into this tracker, so results stay
    /// totally ordered by submission.
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }

    /// Stores a result.
    ///
    /// `Duplicate` rejections are kept alongside, never under their request id,
    /// so they never displace the outcome of the request they duplicate. Any
    /// other second record for the same request id replaces the first.
    pub fn record(&self, result: TradeResult) {
        let mut inner = self.write();
        if result.status() == TradeStatus::Duplicate {
            inner
                .duplicates
                .entry(result.submitter_id().clone())
                .or_default()
                .push(result);
            return;
        }
        let id = result.request_id().clone();
        let submitter = result.submitter_id().clone();

        if let Some(previous) = inner.results.insert(id.clone(), result) {
            if previous.submitter_id() == &submitter {
                return;
            }
            if let Some(ids) = inner.by_submitter.get_mut(previous.submitter_id()) {
                ids.retain(|existing| existing != &id);
            }
        }
        inner.by_submitter.entry(submitter).or_default().push(id);
    }

    pub fn get_by_request_id(&self, id: &RequestId) -> Option<TradeResult> {
        self.read().results.get(id).cloned()
    }

    /// All results of a submitter, duplicates included, in submission order.
    pub fn get_by_submitter(&self, id: &SubmitterId) -> Vec<TradeResult> {
        let inner = self.read();
        let mut results: Vec<TradeResult> = inner.submitter_results(id).cloned().collect();
        results.sort_by_key(|r| r.sequence());
        results
    }

    pub fn stats(&self) -> ExecutionStats {
        let inner = self.read();
        let mut stats = ExecutionStats::default();
        for result in inner.every_result() {
            stats.add(result.status());
        }
        stats
    }

    pub fn submitter_stats(&self, id: &SubmitterId) -> ExecutionStats {
        let inner = self.read();
        let mut stats = ExecutionStats::default();
        for result in inner.submitter_results(id) {
            stats.add(result.status());
        }
        stats
    }

    /// Submitters with at least one recorded result, sorted by id.
    pub fn submitters(&self) -> Vec<SubmitterId> {
        let inner = self.read();
        let mut ids: Vec<SubmitterId> = inner
            .by_submitter
            .keys()
            .chain(inner.duplicates.keys())
            .cloned()
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Ticket mapping of every successful trade, sorted by request id.
    pub fn tickets(&self) -> Vec<TicketRecord> {
        let inner = self.read();
        let mut tickets: Vec<TicketRecord> = inner
            .results
            .values()
            .filter_map(|r| match (r.ticket(), r.price()) {
                (Some(ticket), Some(price)) => Some(TicketRecord {
                    request_id: r.request_id().clone(),
                    ticket: ticket.to_string(),
                    price,
                }),
                _ => None,
            })
            .collect();
        tickets.sort_by(|a, b| a.request_id.cmp(&b.request_id));
        tickets
    }

    /// Snapshot of every recorded result, in submission order.
    pub fn all(&self) -> Vec<TradeResult> {
        let mut results: Vec<TradeResult> = self.read().every_result().cloned().collect();
        results.sort_by_key(|r| r.sequence());
        results
    }

    /// Number of recorded results, duplicates included.
    pub fn len(&self) -> usize {
        let inner = self.read();
        inner.results.len() + inner.duplicates.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
