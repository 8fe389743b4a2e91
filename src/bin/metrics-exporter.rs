//! this binary serves the ClickHouse business and performance metrics in the Prometheus
//! text format
//! to see the list of options, type: `metrics-exporter --help`

use std::process::exit;
use std::str::FromStr;

use clap::{crate_version, App, Arg, ArgMatches};
use ecomlab::config::{clickhouse_args, parse_addr, ClickHouseConfig};
use ecomlab::{server, HttpClickHouse, QueryEngine, Result};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

const DEFAULT_ADDRESS: &str = "0.0.0.0:8080";

fn main() {
    let matches = App::new("metrics-exporter")
        .version(crate_version!())
        .about("exports e-commerce metrics read from ClickHouse for Prometheus")
        .arg(Arg::with_name("addr")
            .long("addr")
            .value_name("IP_ADDR:PORT")
            .help("sets the IP_ADDR:PORT that the exporter listens on")
            .default_value(DEFAULT_ADDRESS))
        .args(&clickhouse_args())
        .arg(Arg::with_name("log-level")
            .long("log-level")
            .value_name("LEVEL")
            .help("maximum level of the log messages written to STDERR")
            .default_value("info"))
        .get_matches();

    subscriber_config(matches.value_of("log-level").unwrap_or("info"));

    if let Err(e) = run(&matches) {
        eprintln!("{:?}", e);
        exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<()> {
    let addr = parse_addr(matches.value_of("addr").unwrap_or(DEFAULT_ADDRESS))?;
    let engine = HttpClickHouse::new(ClickHouseConfig::from_matches(matches)?);

    info!("metrics-exporter {}", env!("CARGO_PKG_VERSION"));
    info!("ClickHouse at {}", engine.config().base_url());
    if !engine.ping() {
        warn!("ClickHouse is not reachable yet, scrapes will report the error");
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server::run(addr, server::exporter_router(engine)))
}

/// configures a tracing subscriber that will log to STDERR
fn subscriber_config(level: &str) {
    let level = Level::from_str(level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        // log to stderr instead of stdout
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting tracing default subscriber failed");
}
