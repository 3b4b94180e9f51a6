use crate::args::Args;
use crate::client::{ClientConfig, ClientSimulator};
use deal_processor::{DealProcessor, ProcessorConfig, ResultTracker};
use log::{error, info};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use trading::Broker;

/// A load profile: how many clients, how fast they submit and how the
/// processor is sized.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub name: &'static str,
    pub client_prefix: &'static str,
    pub clients: usize,
    pub requests_per_client: usize,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub send_bad_requests: bool,
    pub processor: ProcessorConfig,
}

impl Scenario {
    /// Several clients submitting at a human pace.
    pub fn normal() -> Self {
        Self {
            name: "normal",
            client_prefix: "Client",
            clients: 5,
            requests_per_client: 10,
            min_delay_ms: 50,
            max_delay_ms: 200,
            send_bad_requests: true,
            processor: ProcessorConfig::new(4, 3, Duration::from_millis(100)),
        }
    }

    /// Many clients submitting as fast as they can.
    pub fn burst() -> Self {
        Self {
            name: "burst",
            client_prefix: "Burst",
            clients: 10,
            requests_per_client: 20,
            min_delay_ms: 1,
            max_delay_ms: 10,
            send_bad_requests: true,
            processor: ProcessorConfig::new(8, 2, Duration::from_millis(50)),
        }
    }

    /// Picks the scenario named on the command line and applies the
    /// configuration file, environment and CLI overrides on top of it.
    pub fn from_args(args: &Args) -> anyhow::Result<Self> {
        let mut scenario = if args.burst {
            Self::burst()
        } else {
            Self::normal()
        };
        scenario.processor = ProcessorConfig::load_over(&scenario.processor, args.config.as_deref())?;
        if let Some(clients) = args.clients {
            scenario.clients = clients;
        }
        if let Some(requests) = args.requests {
            scenario.requests_per_client = requests;
        }
        Ok(scenario)
    }

    pub fn total_requests(&self) -> usize {
        self.clients * self.requests_per_client
    }
}

/// What a finished run produced.
pub struct RunReport {
    pub scenario: &'static str,
    pub submitted: usize,
    pub accepted: usize,
    /// Results delivered to clients through completion callbacks.
    pub delivered: usize,
    pub submit_elapsed: Duration,
    pub total_elapsed: Duration,
    pub tracker: Arc<ResultTracker>,
}

impl RunReport {
    /// Accepted requests without a recorded result.
    pub fn lost(&self) -> usize {
        self.accepted.saturating_sub(self.tracker.len())
    }

    pub fn throughput(&self) -> f64 {
        let secs = self.total_elapsed.as_secs_f64();
        if secs > 0.0 {
            self.accepted as f64 / secs
        } else {
            0.0
        }
    }
}

/// Runs `scenario` against `broker`: starts a processor, launches every
/// client thread at once, then stops the processor once all clients are done.
///
/// `stop` drains the queue, so every accepted request has its result recorded
/// when this returns.
pub fn run(
    scenario: &Scenario,
    broker: Arc<dyn Broker>,
    seed: Option<u64>,
) -> anyhow::Result<RunReport> {
    info!(
        "=== {} SIMULATION: {} clients, {} requests each ===",
        scenario.name.to_uppercase(),
        scenario.clients,
        scenario.requests_per_client
    );

    let processor = DealProcessor::new(broker, scenario.processor.clone())?;
    processor.start()?;

    let mut clients: Vec<ClientSimulator> = (1..=scenario.clients)
        .map(|i| {
            ClientSimulator::new(ClientConfig {
                client_id: format!("{}-{}", scenario.client_prefix, i),
                requests: scenario.requests_per_client,
                min_delay_ms: scenario.min_delay_ms,
                max_delay_ms: scenario.max_delay_ms,
                send_bad_requests: scenario.send_bad_requests,
                seed: seed.map(|s| s.wrapping_add(i as u64)),
            })
        })
        .collect();

    let started = Instant::now();
    info!("Launching {} client threads simultaneously...", clients.len());

    let processor_ref = &processor;
    let accepted: usize = thread::scope(|s| {
        let handles: Vec<_> = clients
            .iter_mut()
            .map(|client| s.spawn(move || client.run(processor_ref)))
            .collect();
        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(accepted) => accepted,
                Err(_) => {
                    error!("Client thread panicked");
                    0
                }
            })
            .sum()
    });

    let submit_elapsed = started.elapsed();
    info!("All clients finished submitting requests");

    processor.stop();
    let total_elapsed = started.elapsed();

    let delivered = clients.iter().map(|c| c.results().len()).sum();
    Ok(RunReport {
        scenario: scenario.name,
        submitted: scenario.total_requests(),
        accepted,
        delivered,
        submit_elapsed,
        total_elapsed,
        tracker: processor.tracker().clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_builtin_profiles() {
        let normal = Scenario::normal();
        assert_eq!(normal.total_requests(), 50);
        assert_eq!(normal.processor.workers, 4);
        assert_eq!(normal.processor.max_retries, 3);
        assert_eq!(normal.processor.retry_base_ms, 100);

        let burst = Scenario::burst();
        assert_eq!(burst.total_requests(), 200);
        assert_eq!(burst.processor.workers, 8);
        assert_eq!(burst.processor.max_retries, 2);
        assert_eq!(burst.processor.retry_base_ms, 50);
        assert_eq!((burst.min_delay_ms, burst.max_delay_ms), (1, 10));
    }

    #[test]
    fn test_cli_overrides_apply_on_top_of_scenario() {
        let args = Args::parse_from(["demo-runner", "--burst", "--clients", "3", "--requests", "7"]);
        let scenario = Scenario::from_args(&args).unwrap();

        assert_eq!(scenario.name, "burst");
        assert_eq!(scenario.clients, 3);
        assert_eq!(scenario.requests_per_client, 7);
        assert_eq!(scenario.processor.workers, 8);
    }
}
