//! Test doubles for exercising the processor without a simulated market.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use trading::{
    AccountInfo, Broker, ExecutionFailure, ExecutionOutcome, Fill, InstrumentSpec, TradeRequest,
};

/// A call-counting [`Broker`] whose execution outcomes are scripted.
///
/// Each `execute` call pops the next scripted failure; once the script is
/// empty it falls back to the default (a fill unless [`ScriptedBroker::always_fail`]
/// was used). Execution instants are recorded so tests can measure backoff.
pub struct ScriptedBroker {
    symbols: HashMap<String, InstrumentSpec>,
    script: Mutex<VecDeque<ExecutionFailure>>,
    fallback: Option<ExecutionFailure>,
    latency: Duration,
    symbol_lookups: AtomicUsize,
    executions: AtomicUsize,
    calls: Mutex<Vec<Instant>>,
    fills: Mutex<HashMap<String, Fill>>,
    next_ticket: AtomicU64,
}

impl Default for ScriptedBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBroker {
    pub fn new() -> Self {
        Self {
            symbols: HashMap::new(),
            script: Mutex::new(VecDeque::new()),
            fallback: None,
            latency: Duration::ZERO,
            symbol_lookups: AtomicUsize::new(0),
            executions: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            fills: Mutex::new(HashMap::new()),
            next_ticket: AtomicU64::new(1),
        }
    }

    /// A broker offering a single EURUSD-like symbol with a 0.01 lot step.
    pub fn with_default_symbol() -> Self {
        Self::new().with_symbol(InstrumentSpec::new(
            "EURUSD", 1.08450, 1.08465, 0.01, 100.0, 0.01, 5,
        ))
    }

    pub fn with_symbol(mut self, spec: InstrumentSpec) -> Self {
        self.symbols.insert(spec.symbol().to_string(), spec);
        self
    }

    /// Queues failures returned by the next `execute` calls, in order.
    pub fn fail_next(self, failures: impl IntoIterator<Item = ExecutionFailure>) -> Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(failures);
        self
    }

    /// Every unscripted `execute` call fails with `failure`.
    pub fn always_fail(mut self, failure: ExecutionFailure) -> Self {
        self.fallback = Some(failure);
        self
    }

    /// Blocks every `execute` call for `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn symbol_lookups(&self) -> usize {
        self.symbol_lookups.load(Ordering::SeqCst)
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    /// Instants of every `execute` call, in call order.
    pub fn call_instants(&self) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Gaps between consecutive `execute` calls.
    pub fn call_gaps(&self) -> Vec<Duration> {
        self.call_instants()
            .windows(2)
            .map(|w| w[1].duration_since(w[0]))
            .collect()
    }
}

impl Broker for ScriptedBroker {
    fn symbol_info(&self, symbol: &str) -> Option<InstrumentSpec> {
        self.symbol_lookups.fetch_add(1, Ordering::SeqCst);
        self.symbols.get(symbol).cloned()
    }

    fn account_info(&self, login: u64) -> Option<AccountInfo> {
        Some(AccountInfo::new(login, 100_000.0, "USD"))
    }

    fn execute(&self, request: &TradeRequest) -> ExecutionOutcome {
        self.executions.fetch_add(1, Ordering::SeqCst);
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Instant::now());

        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }

        let scripted = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(failure) = scripted.or_else(|| self.fallback.clone()) {
            return ExecutionOutcome::Failed(failure);
        }

        let price = self
            .symbols
            .get(request.symbol())
            .map(|s| s.ask())
            .unwrap_or(1.0);
        let fill = Fill {
            ticket: self.next_ticket.fetch_add(1, Ordering::SeqCst).to_string(),
            request_id: request.request_id().clone(),
            symbol: request.symbol().to_string(),
            side: request.side(),
            volume: request.volume(),
            price,
            executed_at: trading::now_millis(),
        };
        self.fills
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(fill.ticket.clone(), fill.clone());
        ExecutionOutcome::Filled(fill)
    }

    fn ticket_info(&self, ticket: &str) -> Option<ExecutionOutcome> {
        self.fills
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(ticket)
            .cloned()
            .map(ExecutionOutcome::Filled)
    }

    fn symbols(&self) -> Vec<String> {
        self.symbols.keys().cloned().collect()
    }
}
