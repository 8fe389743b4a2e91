//! The numbered menu of `mongo-lab`.
use std::io::{BufRead, Write};
use std::path::Path;

use tracing::{debug, error};

use super::database::MongoConnection;
use super::scripts;
use crate::config::MongoConfig;
use crate::{LabError, Result};

/// One entry of the menu
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MenuChoice {
    AnalyzeDataset,
    LoadData,
    CreateIndexes,
    CategoryNavigation,
    ProductQueries,
    Analytics,
    ShowIndexes,
    FullSequence,
}

impl MenuChoice {
    pub const ALL: [MenuChoice; 8] = [
        MenuChoice::AnalyzeDataset,
        MenuChoice::LoadData,
        MenuChoice::CreateIndexes,
        MenuChoice::CategoryNavigation,
        MenuChoice::ProductQueries,
        MenuChoice::Analytics,
        MenuChoice::ShowIndexes,
        MenuChoice::FullSequence,
    ];

    /// parses the number typed by the user, `1` to `8`
    pub fn from_number(s: &str) -> Option<Self> {
        match s.trim().parse::<usize>() {
            Ok(n) if (1..=Self::ALL.len()).contains(&n) => Some(Self::ALL[n - 1]),
            _ => None,
        }
    }

    pub fn number(self) -> usize {
        Self::ALL.iter().position(|c| *c == self).map_or(0, |i| i + 1)
    }

    pub fn label(self) -> &'static str {
        match self {
            MenuChoice::AnalyzeDataset => "Analyze the source dataset",
            MenuChoice::LoadData => "Load data into MongoDB",
            MenuChoice::CreateIndexes => "Create indexes",
            MenuChoice::CategoryNavigation => "Queries: category navigation",
            MenuChoice::ProductQueries => "Queries: products and categories",
            MenuChoice::Analytics => "Aggregations and analytics",
            MenuChoice::ShowIndexes => "Show indexes and collection sizes",
            MenuChoice::FullSequence => "Run the full sequence and exit",
        }
    }

    /// whether this entry needs a database connection
    pub fn needs_database(self) -> bool {
        self != MenuChoice::AnalyzeDataset
    }
}

fn print_menu<W: Write>(out: &mut W) -> std::io::Result<()> {
    writeln!(out, "\n MENU:")?;
    for choice in MenuChoice::ALL.iter() {
        writeln!(out, "  {}. {}", choice.number(), choice.label())?;
    }
    write!(out, "\n Choose an action (1-8): ")?;
    out.flush()
}

/// Runs the menu loop over `input`, handing each valid choice to `dispatch`.
///
/// Invalid choices print a message and prompt again. End of input leaves the loop with
/// `0`. [`MenuChoice::FullSequence`] leaves it with whatever code `dispatch` returned.
pub fn run_menu<R, W, F>(input: R, out: &mut W, mut dispatch: F) -> Result<i32>
where
    R: BufRead,
    W: Write,
    F: FnMut(MenuChoice) -> i32,
{
    let mut lines = input.lines();
    loop {
        print_menu(out)?;
        let line = match lines.next() {
            Some(line) => line?,
            None => {
                writeln!(out)?;
                return Ok(0);
            }
        };
        match MenuChoice::from_number(&line) {
            Some(MenuChoice::FullSequence) => return Ok(dispatch(MenuChoice::FullSequence)),
            Some(choice) => {
                let code = dispatch(choice);
                debug!(choice = choice.number(), code, "menu action finished");
            }
            None => writeln!(out, " Invalid choice. Enter a number from 1 to 8.")?,
        }
    }
}

/// Executes menu entries against one dataset file and a lazily opened MongoDB
/// connection.
pub struct Runner<'a> {
    config: MongoConfig,
    dataset: &'a Path,
    conn: Option<MongoConnection>,
}

impl<'a> Runner<'a> {
    pub fn new(config: MongoConfig, dataset: &'a Path) -> Self {
        Self { config, dataset, conn: None }
    }

    fn connection(&mut self) -> Result<&MongoConnection> {
        if self.conn.is_none() {
            self.conn = Some(MongoConnection::open(self.config.clone())?);
        }
        self.conn.as_ref().ok_or(LabError::NotConnected)
    }

    /// runs `choice` and returns its exit code, `0` on success
    pub fn run(&mut self, choice: MenuChoice) -> i32 {
        let dataset = self.dataset;
        if !choice.needs_database() {
            return exit_code(choice, scripts::analyze_dataset(dataset));
        }
        let conn = match self.connection() {
            Ok(conn) => conn,
            Err(e) => {
                error!("could not connect to MongoDB: {}", e);
                return 1;
            }
        };
        let outcome = match choice {
            MenuChoice::AnalyzeDataset => scripts::analyze_dataset(dataset),
            MenuChoice::LoadData => scripts::load_data(conn, dataset),
            MenuChoice::CreateIndexes => scripts::create_indexes(conn),
            MenuChoice::CategoryNavigation => scripts::category_navigation(conn),
            MenuChoice::ProductQueries => scripts::product_queries(conn),
            MenuChoice::Analytics => scripts::analytics(conn),
            MenuChoice::ShowIndexes => scripts::show_indexes(conn),
            MenuChoice::FullSequence => return scripts::run_full_sequence(conn, dataset),
        };
        exit_code(choice, outcome)
    }

    /// closes the connection if one was opened
    pub fn close(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            conn.close();
        }
    }
}

fn exit_code(choice: MenuChoice, outcome: Result<()>) -> i32 {
    match outcome {
        Ok(()) => 0,
        Err(e) => {
            error!("'{}' failed: {}", choice.label(), e);
            1
        }
    }
}
