//! this binary runs the MongoDB part of the lab: loading the offers dataset as a category
//! tree plus products, creating indexes and running the lab queries
//! to see the list of options, type: `mongo-lab --help`

use std::io;
use std::path::PathBuf;
use std::process::exit;
use std::str::FromStr;

use clap::{crate_version, App, Arg, ArgMatches};
use ecomlab::config::{parse_positive, MongoConfig, DEFAULT_DATABASE, DEFAULT_MONGO_URI};
use ecomlab::mongo::format::print_section;
use ecomlab::mongo::{run_menu, MenuChoice, Runner};
use ecomlab::{LabError, Result};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

const DEFAULT_DATASET: &str = "data/offers.csv";

/// ['Opt'] holds parsed and validated options from the command line
#[derive(Debug)]
struct Opt {
    config: MongoConfig,
    dataset: PathBuf,
    /// run one menu entry and exit instead of prompting
    run: Option<MenuChoice>,
}

impl Opt {
    /// # Errors
    /// returns [`LabError::Parsing`] if the batch size or the `--run` entry is invalid
    fn build(matches: &ArgMatches) -> Result<Opt> {
        let run = match matches.value_of("run") {
            Some(n) => Some(MenuChoice::from_number(n).ok_or_else(|| {
                LabError::Parsing(format!("--run expects a menu entry from 1 to 8, got '{}'", n))
            })?),
            None => None,
        };
        Ok(Opt {
            config: MongoConfig {
                uri: matches.value_of("uri").unwrap_or(DEFAULT_MONGO_URI).to_string(),
                database: matches.value_of("database").unwrap_or(DEFAULT_DATABASE).to_string(),
                batch_size: parse_positive("batch-size", matches.value_of("batch-size").unwrap_or_default())?,
            },
            dataset: PathBuf::from(matches.value_of("data").unwrap_or(DEFAULT_DATASET)),
            run,
        })
    }
}

fn main() {
    let matches = App::new("mongo-lab")
        .version(crate_version!())
        .about("stores marketplace offers in MongoDB as a category tree and runs the lab queries")
        .arg(Arg::with_name("uri")
            .long("uri")
            .value_name("MONGODB_URI")
            .help("MongoDB connection string")
            .default_value(DEFAULT_MONGO_URI))
        .arg(Arg::with_name("database")
            .long("database")
            .value_name("NAME")
            .default_value(DEFAULT_DATABASE))
        .arg(Arg::with_name("data")
            .long("data")
            .value_name("CSV_FILE")
            .help("the offers dataset")
            .default_value(DEFAULT_DATASET))
        .arg(Arg::with_name("batch-size")
            .long("batch-size")
            .value_name("N")
            .help("documents per insert")
            .default_value("1000"))
        .arg(Arg::with_name("run")
            .long("run")
            .value_name("ENTRY")
            .help("runs one menu entry (1-8) and exits with its code"))
        .arg(Arg::with_name("log-level")
            .long("log-level")
            .value_name("LEVEL")
            .help("maximum level of the log messages written to STDERR")
            .default_value("info"))
        .get_matches();

    subscriber_config(matches.value_of("log-level").unwrap_or("info"));

    let opt = match Opt::build(&matches) {
        Ok(opt) => opt,
        Err(err) => {
            eprintln!("{:?}", err);
            exit(1);
        }
    };
    exit(run(opt));
}

fn run(opt: Opt) -> i32 {
    info!("mongo-lab {}", env!("CARGO_PKG_VERSION"));
    info!("dataset: {}", opt.dataset.display());
    let mut runner = Runner::new(opt.config, &opt.dataset);

    let code = match opt.run {
        Some(choice) => runner.run(choice),
        None => {
            print_section("MONGODB LAB");
            let stdin = io::stdin();
            let mut stdout = io::stdout();
            match run_menu(stdin.lock(), &mut stdout, |choice| runner.run(choice)) {
                Ok(code) => code,
                Err(e) => {
                    eprintln!("{:?}", e);
                    1
                }
            }
        }
    };
    runner.close();
    code
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
