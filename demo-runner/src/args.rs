use broker_gateway::DEMO_LOGIN;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Run the burst scenario (10 clients x 20 requests, minimal pacing)
    #[arg(long)]
    pub burst: bool,

    /// TOML file overriding the scenario's processor settings.
    /// `DEAL_PROCESSOR_*` environment variables override the file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Probability that the paper broker drops an execution with a connection timeout
    #[arg(long, default_value_t = 0.05)]
    pub failure_rate: f64,

    /// Number of client threads (overrides the scenario)
    #[arg(long)]
    pub clients: Option<usize>,

    /// Requests per client (overrides the scenario)
    #[arg(long)]
    pub requests: Option<usize>,

    /// Seed for the broker and the clients, for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print every recorded result as a JSON line after the summary
    #[arg(long)]
    pub json: bool,

    /// Trade server address
    #[arg(long, default_value = "paper.demo")]
    pub server: String,

    /// Manager account login
    #[arg(long, default_value_t = DEMO_LOGIN)]
    pub login: u64,
}
