//! this binary benchmarks raw queries against their materialized views and runs a
//! concurrent load test, then writes a JSON results file and a text report
//! to see the list of options, type: `ch-loadtest --help`

use std::fs;
use std::path::PathBuf;
use std::process::exit;
use std::str::FromStr;

use chrono::Local;
use clap::{arg_enum, crate_version, value_t, App, Arg, ArgMatches};
use ecomlab::config::{clickhouse_args, parse_positive, ClickHouseConfig};
use ecomlab::loadtest::{
    generate_report, query_pairs, run_basic_suite, run_concurrent_load, save_results, Environment,
    LoadTestResult,
};
use ecomlab::{
    HttpClickHouse, LabError, NaiveThreadPool, QueryEngine, RayonThreadPool, Result,
    SharedQueueThreadPool, ThreadPool,
};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

arg_enum! {
    #[allow(non_camel_case_types)]
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    enum Pool {
        shared,
        rayon,
        naive
    }
}

/// ['Opt'] holds parsed and validated options from the command line
#[derive(Debug)]
struct Opt {
    users: usize,
    queries_per_user: usize,
    iterations: usize,
    pool: Pool,
    results: PathBuf,
    report: PathBuf,
}

impl Opt {
    /// validates the counts, returns [`LabError::Parsing`] if one of them is not positive
    fn build(matches: &ArgMatches) -> Result<Opt> {
        let count = |name: &str| parse_positive(name, matches.value_of(name).unwrap_or_default());
        Ok(Opt {
            users: count("users")?,
            queries_per_user: count("queries-per-user")?,
            iterations: count("iterations")?,
            pool: value_t!(matches, "pool", Pool).unwrap_or(Pool::shared),
            results: PathBuf::from(matches.value_of("results").unwrap_or("performance_results.json")),
            report: PathBuf::from(matches.value_of("report").unwrap_or("performance_report.txt")),
        })
    }
}

fn main() {
    let matches = App::new("ch-loadtest")
        .version(crate_version!())
        .about("benchmarks ClickHouse materialized views against the raw offers table")
        .args(&clickhouse_args())
        .arg(Arg::with_name("users")
            .long("users")
            .value_name("N")
            .help("number of simulated concurrent users")
            .default_value("5"))
        .arg(Arg::with_name("queries-per-user")
            .long("queries-per-user")
            .value_name("N")
            .help("queries issued by each simulated user")
            .default_value("3"))
        .arg(Arg::with_name("iterations")
            .long("iterations")
            .value_name("N")
            .help("runs of each benchmarked query")
            .default_value("10"))
        .arg(Arg::with_name("pool")
            .long("pool")
            .value_name("POOL")
            .help("thread pool running the simulated users")
            .possible_values(&Pool::variants())
            .default_value("shared"))
        .arg(Arg::with_name("results")
            .long("results")
            .value_name("FILE")
            .help("where the JSON results are written")
            .default_value("performance_results.json"))
        .arg(Arg::with_name("report")
            .long("report")
            .value_name("FILE")
            .help("where the text report is written")
            .default_value("performance_report.txt"))
        .arg(Arg::with_name("log-level")
            .long("log-level")
            .value_name("LEVEL")
            .help("maximum level of the log messages written to STDERR")
            .default_value("info"))
        .get_matches();

    subscriber_config(matches.value_of("log-level").unwrap_or("info"));

    let result = Opt::build(&matches)
        .and_then(|opt| ClickHouseConfig::from_matches(&matches).map(|cfg| (opt, cfg)))
        .and_then(|(opt, cfg)| run(opt, HttpClickHouse::new(cfg)));
    if let Err(e) = result {
        eprintln!("{:?}", e);
        exit(1);
    }
}

fn run(opt: Opt, engine: HttpClickHouse) -> Result<()> {
    info!("ch-loadtest {}", env!("CARGO_PKG_VERSION"));
    if !engine.ping() {
        return Err(LabError::StringErr(format!(
            "ClickHouse at {} is not reachable",
            engine.config().base_url()
        )));
    }
    let environment = Environment::probe(&engine);
    info!(
        "ClickHouse {}, {}, {} materialized views",
        environment.clickhouse_version, environment.dataset_size, environment.materialized_views
    );

    let entries = run_basic_suite(&engine, &query_pairs(), opt.iterations)?;

    info!("load test on the {} pool", opt.pool);
    let load = match opt.pool {
        Pool::shared => load_test::<SharedQueueThreadPool>(&engine, &opt),
        Pool::rayon => load_test::<RayonThreadPool>(&engine, &opt),
        Pool::naive => load_test::<NaiveThreadPool>(&engine, &opt),
    }?;

    let now = Local::now();
    save_results(&opt.results, now, &environment, &entries, Some(&load))?;
    let report = generate_report(now, &environment, &entries, Some(&load));
    fs::write(&opt.report, &report)?;
    info!("report saved to {}", opt.report.display());
    println!("{}", report);
    Ok(())
}

fn load_test<P: ThreadPool>(engine: &HttpClickHouse, opt: &Opt) -> Result<LoadTestResult> {
    let pool = P::new(opt.users)?;
    run_concurrent_load(engine, &pool, opt.users, opt.queries_per_user)
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
