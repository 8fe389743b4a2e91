//! The MongoDB part of the lab: the offers dataset stored as a materialized path category
//! tree plus products that embed their category and breadcrumb trail.
pub mod database;
pub mod format;
pub mod menu;
pub mod models;
pub mod scripts;
pub mod services;

pub use self::database::{MongoConnection, MongoOps, QueryResult};
pub use self::menu::{run_menu, MenuChoice, Runner};
