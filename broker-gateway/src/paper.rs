use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use trading::{
    AccountInfo, Broker, BrokerError, ExecutionFailure, ExecutionOutcome, FailureKind, Fill,
    InstrumentSpec, Side, TradeRequest,
};

/// Login of the demo account every paper broker starts with.
pub const DEMO_LOGIN: u64 = 12345;

const DEMO_BALANCE: f64 = 100_000.0;
const FIRST_TICKET: u64 = 100_000;
/// Margin reserved per lot.
const MARGIN_PER_LOT: f64 = 1000.0;
/// Share of the reserved margin charged against equity.
const EQUITY_IMPACT: f64 = 0.001;
/// Full width of the quote jitter applied by `symbol_info`.
const QUOTE_JITTER: f64 = 0.0010;
/// Full width of the execution slippage.
const SLIPPAGE: f64 = 0.00005;

fn default_book() -> Vec<InstrumentSpec> {
    vec![
        InstrumentSpec::new("EURUSD", 1.08450, 1.08465, 0.01, 100.0, 0.01, 5),
        InstrumentSpec::new("GBPUSD", 1.26320, 1.26340, 0.01, 100.0, 0.01, 5),
        InstrumentSpec::new("USDJPY", 149.850, 149.865, 0.01, 100.0, 0.01, 3),
        InstrumentSpec::new("AUDUSD", 0.65230, 0.65248, 0.01, 100.0, 0.01, 5),
        InstrumentSpec::new("USDCAD", 1.35720, 1.35738, 0.01, 100.0, 0.01, 5),
        InstrumentSpec::new("XAUUSD", 2035.50, 2036.00, 0.01, 50.0, 0.01, 2),
    ]
}

struct Ledger {
    account: AccountInfo,
    used_margin: f64,
}

/// Simulated trade server.
///
/// Every `execute` call sleeps for a random latency, may fail with a
/// transient connection error, then runs the server-side checks a real
/// dealer endpoint would: symbol lookup, trade permission, lot limits and
/// free margin. Fills are booked under sequential tickets and can be looked
/// up afterwards with [`Broker::ticket_info`].
pub struct PaperBroker {
    symbols: BTreeMap<String, InstrumentSpec>,
    failure_rate: f64,
    latency_ms: (u64, u64),
    rng: Mutex<StdRng>,
    ledger: Mutex<Ledger>,
    fills: Mutex<HashMap<String, Fill>>,
    next_ticket: AtomicU64,
    connected: AtomicBool,
}

impl Default for PaperBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl PaperBroker {
    /// A broker with the default symbol book, a 5% failure rate and
    /// 10-100 ms latency.
    pub fn new() -> Self {
        Self {
            symbols: default_book()
                .into_iter()
                .map(|spec| (spec.symbol().to_string(), spec))
                .collect(),
            failure_rate: 0.05,
            latency_ms: (10, 100),
            rng: Mutex::new(StdRng::from_entropy()),
            ledger: Mutex::new(Ledger {
                account: AccountInfo::new(DEMO_LOGIN, DEMO_BALANCE, "USD"),
                used_margin: 0.0,
            }),
            fills: Mutex::new(HashMap::new()),
            next_ticket: AtomicU64::new(FIRST_TICKET),
            connected: AtomicBool::new(false),
        }
    }

    /// Probability in `[0, 1]` that an execution fails with a connection error.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Uniform latency range applied to `connect` and `execute`.
    pub fn with_latency(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.latency_ms = (min_ms.min(max_ms), min_ms.max(max_ms));
        self
    }

    /// Makes quotes, failures and latency reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Adds or replaces a symbol in the book.
    pub fn with_symbol(mut self, spec: InstrumentSpec) -> Self {
        self.symbols.insert(spec.symbol().to_string(), spec);
        self
    }

    /// Uniform sample in `[0, 1)`. The lock is released on return.
    fn sample(&self) -> f64 {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen::<f64>()
    }

    fn simulate_latency(&self) {
        let (min, max) = self.latency_ms;
        if max == 0 {
            return;
        }
        let ms = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_range(min..=max);
        thread::sleep(Duration::from_millis(ms));
    }

    fn should_fail(&self) -> bool {
        self.failure_rate > 0.0 && self.sample() < self.failure_rate
    }

    fn fill_price(&self, spec: &InstrumentSpec, side: Side) -> f64 {
        let base = match side {
            Side::Buy => spec.ask(),
            Side::Sell => spec.bid(),
        };
        base + (self.sample() - 0.5) * SLIPPAGE
    }

    /// Server-side checks, in the order the trade server applies them.
    fn check(&self, request: &TradeRequest) -> Result<&InstrumentSpec, ExecutionFailure> {
        let symbol = request.symbol();
        let spec = self.symbols.get(symbol).ok_or_else(|| {
            ExecutionFailure::permanent(
                FailureKind::InvalidParams,
                format!("Symbol '{}' not found", symbol),
            )
        })?;

        if !spec.is_tradeable() {
            return Err(ExecutionFailure::permanent(
                FailureKind::Rejected,
                format!("Trading disabled for symbol '{}'", symbol),
            ));
        }

        let volume = request.volume();
        if !spec.volume_in_range(volume) {
            return Err(ExecutionFailure::permanent(
                FailureKind::InvalidParams,
                format!(
                    "Volume {} outside allowed range [{}, {}]",
                    volume,
                    spec.min_volume(),
                    spec.max_volume()
                ),
            ));
        }
        if !spec.is_step_aligned(volume) {
            return Err(ExecutionFailure::permanent(
                FailureKind::InvalidParams,
                format!("Volume {} not aligned to step {}", volume, spec.volume_step()),
            ));
        }

        Ok(spec)
    }

    /// Reserves margin for `volume` lots, failing if free margin is short.
    fn reserve_margin(&self, volume: f64) -> Result<(), ExecutionFailure> {
        let required = volume * MARGIN_PER_LOT;
        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        if ledger.account.free_margin < required {
            return Err(ExecutionFailure::permanent(
                FailureKind::Margin,
                format!(
                    "Insufficient margin. Required: ${:.2}, Available: ${:.2}",
                    required, ledger.account.free_margin
                ),
            ));
        }

        ledger.used_margin += required;
        ledger.account.free_margin -= required;
        ledger.account.equity -= required * EQUITY_IMPACT;
        ledger.account.margin_level = ledger.account.equity / ledger.used_margin * 100.0;
        Ok(())
    }
}

impl Broker for PaperBroker {
    fn symbol_info(&self, symbol: &str) -> Option<InstrumentSpec> {
        let spec = self.symbols.get(symbol)?;
        Some(spec.shifted((self.sample() - 0.5) * QUOTE_JITTER))
    }

    fn account_info(&self, login: u64) -> Option<AccountInfo> {
        let ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        (ledger.account.login == login).then(|| ledger.account.clone())
    }

    fn execute(&self, request: &TradeRequest) -> ExecutionOutcome {
        self.simulate_latency();

        if self.should_fail() {
            return ExecutionOutcome::Failed(ExecutionFailure::transient(
                FailureKind::Connection,
                "Trade server connection timeout",
            ));
        }

        let spec = match self.check(request) {
            Ok(spec) => spec,
            Err(failure) => return ExecutionOutcome::Failed(failure),
        };
        if let Err(failure) = self.reserve_margin(request.volume()) {
            return ExecutionOutcome::Failed(failure);
        }

        let fill = Fill {
            ticket: self.next_ticket.fetch_add(1, Ordering::SeqCst).to_string(),
            request_id: request.request_id().clone(),
            symbol: spec.symbol().to_string(),
            side: request.side(),
            volume: request.volume(),
            price: self.fill_price(spec, request.side()),
            executed_at: trading::now_millis(),
        };
        debug!("Booked ticket #{} for {}", fill.ticket, fill.request_id);

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

    fn connect(&self, server: &str, login: u64, _password: &str) -> Result<(), BrokerError> {
        if server.is_empty() {
            return Err(BrokerError::ConnectionRefused {
                server: server.to_string(),
                reason: "empty server address".to_string(),
            });
        }
        self.simulate_latency();
        self.ledger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .account
            .login = login;
        self.connected.store(true, Ordering::SeqCst);
        info!("Paper broker connected to {} as #{}", server, login);
        Ok(())
    }

    fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            info!("Paper broker disconnected");
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn symbols(&self) -> Vec<String> {
        self.symbols.keys().cloned().collect()
    }
}
