use std::time::Instant;

use bson::{doc, Bson, Document};
use mongodb::error::ErrorKind;
use mongodb::options::{FindOptions, IndexOptions};
use mongodb::sync::{Client, Collection, Database};
use mongodb::IndexModel;
use tracing::{debug, info, instrument};

use super::models::{match_all, missing_indexes, IndexSpec};
use crate::config::MongoConfig;
use crate::{LabError, Result};

// server error code for a collection that does not exist yet
const NAMESPACE_NOT_FOUND: i32 = 26;

/// A connection to the lab database.
///
/// The connection is opened with [`connect`](MongoConnection::connect) and released with
/// [`close`](MongoConnection::close); asking for a collection in between fails with
/// [`LabError::NotConnected`].
pub struct MongoConnection {
    config: MongoConfig,
    client: Option<Client>,
    db: Option<Database>,
}

impl MongoConnection {
    pub fn new(config: MongoConfig) -> Self {
        Self { config, client: None, db: None }
    }

    /// creates and connects in one step
    pub fn open(config: MongoConfig) -> Result<Self> {
        let mut conn = Self::new(config);
        conn.connect()?;
        Ok(conn)
    }

    /// Connects and pings the server. Does nothing if already connected.
    #[instrument(skip(self), fields(database = %self.config.database))]
    pub fn connect(&mut self) -> Result<()> {
        if self.client.is_some() {
            return Ok(());
        }
        let client = Client::with_uri_str(&self.config.uri)?;
        let db = client.database(&self.config.database);
        db.run_command(doc! { "ping": 1 }, None)?;
        info!("connected to MongoDB");
        self.client = Some(client);
        self.db = Some(db);
        Ok(())
    }

    /// drops the client; the connection can be opened again with `connect`
    pub fn close(&mut self) {
        if self.client.take().is_some() {
            debug!("MongoDB connection closed");
        }
        self.db = None;
    }

    pub fn is_connected(&self) -> bool {
        self.db.is_some()
    }

    pub fn config(&self) -> &MongoConfig {
        &self.config
    }

    pub fn database(&self) -> Result<&Database> {
        self.db.as_ref().ok_or(LabError::NotConnected)
    }

    pub fn collection(&self, name: &str) -> Result<Collection<Document>> {
        Ok(self.database()?.collection::<Document>(name))
    }
}

/// Documents returned by one operation and how long it took
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub documents: Vec<Document>,
    pub execution_time_ms: f64,
    /// number of documents affected; equals `documents.len()` for reads
    pub count: usize,
    pub query_info: String,
}

impl QueryResult {
    pub fn read(documents: Vec<Document>, started: Instant, query_info: String) -> Self {
        Self {
            count: documents.len(),
            documents,
            execution_time_ms: elapsed_ms(started),
            query_info,
        }
    }

    pub fn execution_time_sec(&self) -> f64 {
        self.execution_time_ms / 1000.0
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Outcome of an index creation pass
#[derive(Debug, Clone, PartialEq)]
pub struct IndexOutcome {
    pub created: Vec<String>,
    pub already_present: Vec<String>,
    pub execution_time_ms: f64,
}

/// Size figures of a collection, in bytes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectionStats {
    pub count: u64,
    pub size: f64,
    pub total_index_size: f64,
}

impl CollectionStats {
    pub fn from_document(stats: &Document) -> Self {
        Self {
            count: number(stats, "count") as u64,
            size: number(stats, "size"),
            total_index_size: number(stats, "totalIndexSize"),
        }
    }

    pub fn size_mb(&self) -> f64 {
        self.size / 1024.0 / 1024.0
    }

    pub fn index_mb(&self) -> f64 {
        self.total_index_size / 1024.0 / 1024.0
    }
}

/// reads a numeric field whatever integer or float width the server chose
fn number(d: &Document, key: &str) -> f64 {
    match d.get(key) {
        Some(Bson::Int32(v)) => *v as f64,
        Some(Bson::Int64(v)) => *v as f64,
        Some(Bson::Double(v)) => *v,
        _ => 0.0,
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// The basic, timed operations the lab scripts are built from
pub struct MongoOps<'a> {
    conn: &'a MongoConnection,
}

impl<'a> MongoOps<'a> {
    pub fn new(conn: &'a MongoConnection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &MongoConnection {
        self.conn
    }

    /// runs a find, optionally limited to `limit` documents
    pub fn find(&self, collection: &str, filter: Document, limit: Option<i64>) -> Result<QueryResult> {
        let started = Instant::now();
        let coll = self.conn.collection(collection)?;
        let options = limit.map(|l| FindOptions::builder().limit(l).build());
        let info = filter.to_string();
        let documents = coll.find(filter, options)?.collect::<mongodb::error::Result<Vec<_>>>()?;
        Ok(QueryResult::read(documents, started, info))
    }

    pub fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> Result<QueryResult> {
        let started = Instant::now();
        let coll = self.conn.collection(collection)?;
        let info = format!("Aggregation with {} stages", pipeline.len());
        let documents = coll.aggregate(pipeline, None)?.collect::<mongodb::error::Result<Vec<_>>>()?;
        Ok(QueryResult::read(documents, started, info))
    }

    /// Replaces the contents of `collection` with `documents`, inserted `batch_size` at a time.
    #[instrument(skip(self, documents), fields(total = documents.len()))]
    pub fn insert_many(&self, collection: &str, documents: Vec<Document>, batch_size: usize) -> Result<QueryResult> {
        let started = Instant::now();
        let coll = self.conn.collection(collection)?;
        let removed = coll.delete_many(match_all(), None)?;
        debug!(removed = removed.deleted_count, "collection cleared");

        let total = documents.len();
        for batch in documents.chunks(batch_size.max(1)) {
            coll.insert_many(batch, None)?;
        }
        info!("inserted {} documents into {}", total, collection);
        Ok(QueryResult {
            documents: vec![],
            execution_time_ms: elapsed_ms(started),
            count: total,
            query_info: format!("Inserted {} docs", total),
        })
    }

    /// names of the indexes on `collection`; empty if the collection does not exist
    pub fn index_names(&self, collection: &str) -> Result<Vec<String>> {
        match self.conn.collection(collection)?.list_index_names() {
            Ok(names) => Ok(names),
            Err(e) if matches!(*e.kind, ErrorKind::Command(ref c) if c.code == NAMESPACE_NOT_FOUND) => {
                Ok(vec![])
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Creates the indexes of `specs` that do not exist yet. Running it again creates
    /// nothing.
    pub fn create_indexes(&self, collection: &str, specs: &[IndexSpec]) -> Result<IndexOutcome> {
        let started = Instant::now();
        let coll = self.conn.collection(collection)?;
        let existing = self.index_names(collection)?;

        let mut created = Vec::new();
        for spec in missing_indexes(&existing, specs) {
            let model = IndexModel::builder()
                .keys(spec.keys_document())
                .options(IndexOptions::builder().name(spec.name()).build())
                .build();
            let result = coll.create_index(model, None)?;
            debug!(index = %result.index_name, "index created");
            created.push(result.index_name);
        }
        let already_present = specs
            .iter()
            .map(IndexSpec::name)
            .filter(|n| existing.contains(n))
            .collect();
        Ok(IndexOutcome { created, already_present, execution_time_ms: elapsed_ms(started) })
    }

    /// the index names and key documents of `collection`
    pub fn list_indexes(&self, collection: &str) -> Result<Vec<(String, Document)>> {
        let cursor = self.conn.collection(collection)?.list_indexes(None)?;
        let mut out = Vec::new();
        for model in cursor {
            let model = model?;
            let name = model
                .options
                .as_ref()
                .and_then(|o| o.name.clone())
                .unwrap_or_default();
            out.push((name, model.keys));
        }
        Ok(out)
    }

    pub fn collection_stats(&self, collection: &str) -> Result<CollectionStats> {
        let stats = self
            .conn
            .database()?
            .run_command(doc! { "collStats": collection }, None)?;
        Ok(CollectionStats::from_document(&stats))
    }

    /// the query planner output for `filter` limited to one document
    pub fn explain_query(&self, collection: &str, filter: Document) -> Result<Document> {
        let cmd = doc! {
            "explain": { "find": collection, "filter": filter, "limit": 1 },
            "verbosity": "queryPlanner",
        };
        Ok(self.conn.database()?.run_command(cmd, None)?)
    }
}
