//! dhlab binary.
//!
//! # Usage
//!
//! ```bash
//! # Classic exchange over Z*_23
//! dhlab exchange --alice 6 --bob 15
//!
//! # Adversary in the middle, then again with signed public keys
//! dhlab intercept --alice 6 --bob 15 --eve 9
//! dhlab intercept --alice 6 --bob 15 --eve 9 --signed
//!
//! # Rotation under a usage policy, reproducible
//! dhlab --seed 7 rotate --ticks 60 --usage 5 --usage-per-tick 1
//!
//! # Timings, pedagogical core against the real provider
//! dhlab --json bench --exchange-ops 1000
//! ```

use clap::Parser;
use dhlab_cli::{Cli, SystemEnv, run};
use dhlab_harness::SimEnv;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let output = match cli.seed {
        Some(seed) => {
            tracing::debug!(seed, "using seeded environment");
            run(&cli, SimEnv::with_seed(seed)).await?
        },
        None => run(&cli, SystemEnv::new()).await?,
    };

    emit(&output);

    Ok(())
}

#[allow(clippy::print_stdout)]
fn emit(output: &str) {
    println!("{output}");
}
