use anyhow::Context;
use broker_gateway::PaperBroker;
use clap::Parser;
use demo_runner::args::Args;
use demo_runner::report;
use demo_runner::scenario::{self, Scenario};
use log::info;
use std::sync::Arc;
use trading::Broker;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let scenario = Scenario::from_args(&args)?;
    info!(
        "=== Deal Processor Demo [{} mode, {} workers] ===",
        scenario.name, scenario.processor.workers
    );

    let mut broker = PaperBroker::new().with_failure_rate(args.failure_rate);
    if let Some(seed) = args.seed {
        broker = broker.with_seed(seed);
    }
    let broker = Arc::new(broker);

    info!("Connecting to trade server {}...", args.server);
    broker
        .connect(&args.server, args.login, "demo_password")
        .context("Failed to connect to trade server")?;
    info!("Connected to trade server successfully");
    log_market(broker.as_ref(), args.login);

    let report = scenario::run(&scenario, broker.clone(), args.seed)?;

    let mut out = String::new();
    report::write_timing(&mut out, &report)?;
    report::write_summary(&mut out, &report.tracker)?;
    print!("{}", out);

    if args.json {
        for result in report.tracker.all() {
            println!("{}", serde_json::to_string(&result)?);
        }
    }

    broker.disconnect();
    info!("Disconnected from trade server. Demo complete.");
    Ok(())
}

fn log_market(broker: &dyn Broker, login: u64) {
    let symbols = broker.symbols();
    info!("Available symbols: {}", symbols.len());
    for symbol in symbols {
        if let Some(spec) = broker.symbol_info(&symbol) {
            let digits = spec.digits() as usize;
            info!(
                "  {} Bid={:.*} Ask={:.*} Volume=[{}-{}]",
                symbol,
                digits,
                spec.bid(),
                digits,
                spec.ask(),
                spec.min_volume(),
                spec.max_volume()
            );
        }
    }

    if let Some(account) = broker.account_info(login) {
        info!(
            "Account #{} Balance=${:.2} FreeMargin=${:.2}",
            account.login, account.balance, account.free_margin
        );
    }
}
