//! Common test utilities for ignite-r2dbc integration tests.
//!
//! The tests run against the in-process [`MemoryEngine`], so they need no
//! external database. [`RecordingEngine`] wraps it and records every query in
//! the order the driver issued it. [`SlowEngine`] makes every engine call
//! block its thread for a while.
//!
//! # Running Integration Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test --test integration_tests
//!
//! # Run a specific integration test
//! cargo test --test integration_tests test_bind_and_select_by_name
//! ```

#![allow(dead_code)]

use futures_util::StreamExt;
use ignite_r2dbc::engine::memory::MemoryEngine;
use ignite_r2dbc::engine::{
    CompletionCallback, FieldMeta, NativeCursor, NativeError, NativeQuery, ProductInfo,
    SqlEngine, TransactionConcurrency, TransactionInfo, TransactionIsolation,
};
use ignite_r2dbc::{ConnectionFactory, IgniteConnection, QueryResult, ResultStream, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Schema
// ============================================================================

/// DDL of the table most tests work on.
pub const CREATE_CITY: &str = "CREATE TABLE CITY (ID INT PRIMARY KEY, NAME VARCHAR NOT NULL)";

/// Count query against the city table.
pub const COUNT_CITY: &str = "SELECT COUNT(*) FROM CITY";

// ============================================================================
// Recording Engine
// ============================================================================

/// Engine wrapper that records each query before delegating it.
#[derive(Clone, Default)]
pub struct RecordingEngine {
    inner: Arc<MemoryEngine>,
    queries: Arc<Mutex<Vec<(String, Vec<Value>)>>>,
}

impl RecordingEngine {
    /// Create a recorder around a fresh memory engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queries issued so far, as `(sql, args)` pairs.
    pub fn queries(&self) -> Vec<(String, Vec<Value>)> {
        self.queries.lock().unwrap().clone()
    }

    /// Forget recorded queries.
    pub fn clear(&self) {
        self.queries.lock().unwrap().clear();
    }
}

impl SqlEngine for RecordingEngine {
    fn query(&self, query: &NativeQuery) -> Result<Box<dyn NativeCursor>, NativeError> {
        self.queries
            .lock()
            .unwrap()
            .push((query.sql.clone(), query.args.clone()));
        self.inner.query(query)
    }

    fn tx_start(
        &self,
        concurrency: TransactionConcurrency,
        isolation: TransactionIsolation,
    ) -> Result<(), NativeError> {
        self.inner.tx_start(concurrency, isolation)
    }

    fn tx_commit(&self, on_complete: CompletionCallback) {
        self.inner.tx_commit(on_complete)
    }

    fn tx_rollback(&self, on_complete: CompletionCallback) {
        self.inner.tx_rollback(on_complete)
    }

    fn current_transaction(&self) -> Option<TransactionInfo> {
        self.inner.current_transaction()
    }

    fn product_info(&self) -> ProductInfo {
        self.inner.product_info()
    }

    fn close(&self) -> Result<(), NativeError> {
        self.inner.close()
    }
}

// ============================================================================
// Slow Engine
// ============================================================================

/// Engine wrapper that blocks the calling thread on every query and record read.
pub struct SlowEngine {
    inner: MemoryEngine,
    delay: Duration,
}

impl SlowEngine {
    /// Wrap a fresh memory engine, sleeping `delay` per blocking call.
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryEngine::new(),
            delay,
        }
    }
}

struct SlowCursor {
    inner: Box<dyn NativeCursor>,
    delay: Duration,
}

impl NativeCursor for SlowCursor {
    fn is_query(&self) -> bool {
        self.inner.is_query()
    }

    fn fields(&self) -> &[FieldMeta] {
        self.inner.fields()
    }

    fn next_record(&mut self) -> Option<Result<Vec<Value>, NativeError>> {
        std::thread::sleep(self.delay);
        self.inner.next_record()
    }

    fn close(&mut self) {
        self.inner.close()
    }
}

impl SqlEngine for SlowEngine {
    fn query(&self, query: &NativeQuery) -> Result<Box<dyn NativeCursor>, NativeError> {
        std::thread::sleep(self.delay);
        let inner = self.inner.query(query)?;
        Ok(Box::new(SlowCursor {
            inner,
            delay: self.delay,
        }))
    }

    fn tx_start(
        &self,
        concurrency: TransactionConcurrency,
        isolation: TransactionIsolation,
    ) -> Result<(), NativeError> {
        self.inner.tx_start(concurrency, isolation)
    }

    fn tx_commit(&self, on_complete: CompletionCallback) {
        self.inner.tx_commit(on_complete)
    }

    fn tx_rollback(&self, on_complete: CompletionCallback) {
        self.inner.tx_rollback(on_complete)
    }

    fn current_transaction(&self) -> Option<TransactionInfo> {
        self.inner.current_transaction()
    }

    fn product_info(&self) -> ProductInfo {
        self.inner.product_info()
    }

    fn close(&self) -> Result<(), NativeError> {
        self.inner.close()
    }
}

// ============================================================================
// Connection Helpers
// ============================================================================

/// Open a connection on a fresh memory engine.
pub fn get_test_connection() -> IgniteConnection {
    ConnectionFactory::new(Arc::new(MemoryEngine::new())).create()
}

/// Open a connection on a recording engine and return both.
pub fn get_recording_connection() -> (IgniteConnection, RecordingEngine) {
    let engine = RecordingEngine::new();
    let connection = ConnectionFactory::new(Arc::new(engine.clone())).create();
    (connection, engine)
}

// ============================================================================
// Stream Helpers
// ============================================================================

/// Drain a result stream, failing the test on the first error.
pub async fn collect_results(stream: ResultStream) -> Vec<QueryResult> {
    stream
        .map(|result| result.expect("Execution failed"))
        .collect()
        .await
}

/// Update counts of a drained result stream.
pub async fn update_counts(stream: ResultStream) -> Vec<Option<i64>> {
    collect_results(stream)
        .await
        .iter()
        .map(QueryResult::rows_updated)
        .collect()
}

/// Read the single value of a one-row, one-column query result.
pub async fn single_value(result: &mut QueryResult) -> Value {
    let mut rows = result.rows();
    let row = rows
        .next()
        .await
        .expect("Expected one row")
        .expect("Failed to fetch row");
    assert!(rows.next().await.is_none(), "Expected exactly one row");
    row.value(0).expect("Expected one column").clone()
}
