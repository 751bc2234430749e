//! Shared fixtures for integration tests.
//!
//! `CountingSource` wraps a file-backed SQLite [`DataSource`] and counts every
//! acquire, release, commit and rollback so tests can assert connection and
//! transaction bookkeeping. [`Faults`] makes commit, rollback or release fail
//! on demand.

#![allow(dead_code)]

use db_template::{DbError, DbResult};
use db_template::config::DataSourceConfig;
use db_template::db::{
    Connection, ConnectionSource, DataSource, DbConnection, ResourceRegistry, StatementExecutor,
    scalar,
};
use db_template::models::{DatabaseType, LogicalUnit, Row, StatementSpec};
use db_template::tx::TransactionBoundary;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tempfile::TempDir;

#[derive(Debug, Default)]
pub struct Counters {
    acquired: AtomicUsize,
    released: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

impl Counters {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    /// Connections acquired but not yet released.
    pub fn outstanding(&self) -> usize {
        self.acquired() - self.released()
    }
}

/// Switches that make the wrapped operations fail.
///
/// A failed commit or rollback leaves the real transaction untouched. A failed
/// release still hands the connection back to the pool before reporting the
/// error, so the pool itself never leaks.
#[derive(Debug, Default)]
pub struct Faults {
    commit: AtomicBool,
    rollback: AtomicBool,
    release: AtomicBool,
}

impl Faults {
    pub fn fail_commit(&self) {
        self.commit.store(true, Ordering::SeqCst);
    }

    pub fn fail_rollback(&self) {
        self.rollback.store(true, Ordering::SeqCst);
    }

    pub fn fail_release(&self) {
        self.release.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.commit.store(false, Ordering::SeqCst);
        self.rollback.store(false, Ordering::SeqCst);
        self.release.store(false, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, operation: &str) -> DbResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(DbError::data_access(format!("injected {operation} failure"), None));
        }
        Ok(())
    }
}

pub struct CountingConnection {
    inner: DbConnection,
    counters: Arc<Counters>,
    faults: Arc<Faults>,
}

impl Connection for CountingConnection {
    fn db_type(&self) -> DatabaseType {
        self.inner.db_type()
    }

    fn is_auto_commit(&self) -> bool {
        self.inner.is_auto_commit()
    }

    async fn set_auto_commit(&mut self, auto_commit: bool) -> DbResult<()> {
        self.inner.set_auto_commit(auto_commit).await
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.counters.commits.fetch_add(1, Ordering::SeqCst);
        Faults::check(&self.faults.commit, "commit")?;
        self.inner.commit().await
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
        Faults::check(&self.faults.rollback, "rollback")?;
        self.inner.rollback().await
    }

    async fn execute_update(&mut self, spec: &StatementSpec) -> DbResult<u64> {
        self.inner.execute_update(spec).await
    }

    async fn execute_query(&mut self, spec: &StatementSpec) -> DbResult<Vec<Row>> {
        self.inner.execute_query(spec).await
    }
}

pub struct CountingSource {
    inner: DataSource,
    counters: Arc<Counters>,
    faults: Arc<Faults>,
}

impl CountingSource {
    pub fn counters(&self) -> &Arc<Counters> {
        &self.counters
    }

    pub fn faults(&self) -> &Arc<Faults> {
        &self.faults
    }
}

impl ConnectionSource for CountingSource {
    type Connection = CountingConnection;

    async fn acquire(&self) -> DbResult<CountingConnection> {
        let inner = self.inner.acquire().await?;
        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(CountingConnection {
            inner,
            counters: Arc::clone(&self.counters),
            faults: Arc::clone(&self.faults),
        })
    }

    async fn release(&self, conn: CountingConnection) -> DbResult<()> {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
        self.inner.release(conn.inner).await?;
        Faults::check(&self.faults.release, "release")
    }
}

/// Executor and boundary over one counting SQLite pool.
pub struct TestDb {
    pub source: Arc<CountingSource>,
    pub executor: StatementExecutor<CountingSource>,
    pub boundary: TransactionBoundary<CountingSource>,
    _dir: TempDir,
}

impl TestDb {
    pub fn counters(&self) -> &Arc<Counters> {
        self.source.counters()
    }

    pub fn faults(&self) -> &Arc<Faults> {
        self.source.faults()
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry<CountingConnection>> {
        self.executor.registry()
    }
}

pub async fn setup() -> TestDb {
    let dir = tempfile::tempdir().unwrap();
    let url = format!(
        "sqlite:{}?max_connections=4&statement_timeout=10",
        dir.path().join("test.db").display()
    );
    let config = DataSourceConfig::parse(&url).unwrap();
    let inner = DataSource::connect(&config).await.unwrap();

    let source = Arc::new(CountingSource {
        inner,
        counters: Arc::new(Counters::default()),
        faults: Arc::new(Faults::default()),
    });
    let executor = StatementExecutor::new(Arc::clone(&source), Arc::new(ResourceRegistry::new()));
    let boundary = TransactionBoundary::for_executor(&executor);

    TestDb {
        source,
        executor,
        boundary,
        _dir: dir,
    }
}

/// Database with an `accounts` table holding account 1 (balance 10) and
/// account 2 (balance 20). Balances may not go negative. Connection counters
/// are reset afterwards.
pub async fn setup_accounts() -> TestDb {
    let db = setup().await;
    let unit = LogicalUnit::new();
    db.executor
        .execute(
            &unit,
            "CREATE TABLE accounts (
                id INTEGER PRIMARY KEY,
                balance INTEGER NOT NULL CHECK (balance >= 0)
            )",
        )
        .await
        .unwrap();
    db.executor
        .execute(
            &unit,
            "INSERT INTO accounts (id, balance) VALUES (1, 10), (2, 20)",
        )
        .await
        .unwrap();

    db.counters().acquired.store(0, Ordering::SeqCst);
    db.counters().released.store(0, Ordering::SeqCst);
    db
}

pub async fn balance<P: ConnectionSource>(executor: &StatementExecutor<P>, id: i64) -> i64 {
    executor
        .query_single(
            &LogicalUnit::new(),
            StatementSpec::new("SELECT balance FROM accounts WHERE id = ?", [id]),
            scalar(),
        )
        .await
        .unwrap()
}
