use crate::model::{
    account::AccountInfo, execution::ExecutionOutcome, instrument::InstrumentSpec,
    request::TradeRequest,
};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by broker session management.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BrokerError {
    #[error("Connection to {server} refused: {reason}")]
    ConnectionRefused { server: String, reason: String },
    #[error("Not connected to a trade server")]
    NotConnected,
}

/// Execution backend the deal processor runs requests against.
///
/// Every call is synchronous and may block the calling worker. Implementations
/// must be safe to call concurrently from several workers and are responsible
/// for their own internal consistency (margin bookkeeping, ticket ledger).
pub trait Broker: Send + Sync {
    /// Looks up the specification and live prices of a symbol.
    ///
    /// # Returns
    ///
    /// * `None` if the symbol is unknown to the broker.
    fn symbol_info(&self, symbol: &str) -> Option<InstrumentSpec>;

    /// Looks up balance and margin information of an account.
    fn account_info(&self, login: u64) -> Option<AccountInfo>;

    /// Executes a trade request.
    ///
    /// Failures are classified here, once, as transient or permanent.
    fn execute(&self, request: &TradeRequest) -> ExecutionOutcome;

    /// Looks up a previously executed deal by its ticket.
    fn ticket_info(&self, ticket: &str) -> Option<ExecutionOutcome>;

    /// Opens a session with the trade server.
    fn connect(&self, _server: &str, _login: u64, _password: &str) -> Result<(), BrokerError> {
        Ok(())
    }

    /// Closes the session with the trade server.
    fn disconnect(&self) {}

    fn is_connected(&self) -> bool {
        true
    }

    /// Names of all symbols the broker offers.
    fn symbols(&self) -> Vec<String> {
        Vec::new()
    }
}

impl<B: Broker + ?Sized> Broker for Arc<B> {
    fn symbol_info(&self, symbol: &str) -> Option<InstrumentSpec> {
        (**self).symbol_info(symbol)
    }

    fn account_info(&self, login: u64) -> Option<AccountInfo> {
        (**self).account_info(login)
    }

    fn execute(&self, request: &TradeRequest) -> ExecutionOutcome {
        (**self).execute(request)
    }

    fn ticket_info(&self, ticket: &str) -> Option<ExecutionOutcome> {
        (**self).ticket_info(ticket)
    }

    fn connect(&self, server: &str, login: u64, password: &str) -> Result<(), BrokerError> {
        (**self).connect(server, login, password)
    }

    fn disconnect(&self) {
        (**self).disconnect()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn symbols(&self) -> Vec<String> {
        (**self).symbols()
    }
}
