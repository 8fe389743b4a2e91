//! this binary serves the HTML dashboard over the ClickHouse offers table
//! to see the list of options, type: `dashboard --help`

use std::process::exit;
use std::str::FromStr;

use clap::{crate_version, App, Arg, ArgMatches};
use ecomlab::config::{clickhouse_args, parse_addr, ClickHouseConfig};
use ecomlab::{server, HttpClickHouse, Result};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

const DEFAULT_ADDRESS: &str = "0.0.0.0:5000";

fn main() {
    let matches = App::new("dashboard")
        .version(crate_version!())
        .about("an HTML dashboard of the e-commerce offers stored in ClickHouse")
        .arg(Arg::with_name("addr")
            .long("addr")
            .value_name("IP_ADDR:PORT")
            .help("sets the IP_ADDR:PORT that the dashboard listens on")
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

    info!("dashboard {}", env!("CARGO_PKG_VERSION"));
    match engine.server_version() {
        Ok(version) => info!("connected to ClickHouse {}", version),
        Err(e) => warn!("ClickHouse is not reachable yet: {}", e),
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server::run(addr, server::dashboard_router(engine)))
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
