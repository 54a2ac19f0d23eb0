//! Execution bridge between the async driver surface and the engine.
//!
//! The engine's API is synchronous: queries and transaction start block, while
//! commit and rollback report through a completion callback. The bridge runs
//! the blocking begin on the blocking thread pool and turns each completion
//! callback into a one-shot channel the caller awaits.

use crate::connection::ConnectionOptions;
use crate::engine::{
    CompletionCallback, GeneratedKeys, NativeQuery, ProductInfo, SqlEngine,
    TransactionConcurrency, TransactionIsolation,
};
use crate::error::{ArgumentError, EngineError, EngineOperation, IgniteError, Result};
use crate::query::{Binding, QueryResult};
use crate::spi::IsolationLevel;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

/// Map an isolation level to the engine's native level.
///
/// The engine has no READ UNCOMMITTED; it runs as READ COMMITTED. Custom levels
/// have no native counterpart.
pub fn native_isolation(level: &IsolationLevel) -> Result<TransactionIsolation, ArgumentError> {
    match level {
        IsolationLevel::ReadUncommitted | IsolationLevel::ReadCommitted => {
            Ok(TransactionIsolation::ReadCommitted)
        }
        IsolationLevel::RepeatableRead => Ok(TransactionIsolation::RepeatableRead),
        IsolationLevel::Serializable => Ok(TransactionIsolation::Serializable),
        IsolationLevel::Custom(_) => Err(ArgumentError::UnsupportedIsolationLevel(level.clone())),
    }
}

/// How a running transaction ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    Commit,
    Rollback,
}

impl Completion {
    fn operation(self) -> EngineOperation {
        match self {
            Completion::Commit => EngineOperation::Commit,
            Completion::Rollback => EngineOperation::Rollback,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Completion::Commit => "commit",
            Completion::Rollback => "rollback",
        }
    }
}

/// One engine session shared by the statements of a connection.
pub struct ExecutionBridge {
    engine: Arc<dyn SqlEngine>,
    concurrency: TransactionConcurrency,
    tx_timeout: Option<Duration>,
}

impl ExecutionBridge {
    /// Create a bridge over `engine`.
    pub fn new(engine: Arc<dyn SqlEngine>, options: &ConnectionOptions) -> Self {
        Self {
            engine,
            concurrency: options.concurrency,
            tx_timeout: options.tx_timeout(),
        }
    }

    /// Run one statement with one row of arguments.
    pub fn execute(
        &self,
        sql: &str,
        binding: &Binding,
        generated_keys: &GeneratedKeys,
    ) -> Result<QueryResult> {
        let query = NativeQuery::new(sql)
            .with_args(binding.values_in_position_order())
            .with_generated_keys(generated_keys.clone());
        debug!(request = %query, "Request");

        let cursor = self
            .engine
            .query(&query)
            .map_err(|e| EngineError::translate(EngineOperation::Query, e))?;

        QueryResult::from_cursor(cursor)
    }

    /// Whether the engine session has a transaction in progress.
    pub fn in_transaction(&self) -> bool {
        self.engine.current_transaction().is_some()
    }

    /// Start a transaction unless one is already running.
    pub async fn begin_transaction(&self, level: &IsolationLevel) -> Result<()> {
        if self.in_transaction() {
            debug!("Transaction already in progress, begin skipped");
            return Ok(());
        }

        let isolation = native_isolation(level)?;
        let engine = Arc::clone(&self.engine);
        let concurrency = self.concurrency;

        tokio::task::spawn_blocking(move || engine.tx_start(concurrency, isolation))
            .await
            .map_err(|e| {
                EngineError::other(EngineOperation::Begin, format!("Begin task failed: {}", e))
            })?
            .map_err(|e| EngineError::translate(EngineOperation::Begin, e))?;

        debug!(
            tx_id = self.engine.current_transaction().map(|tx| tx.id),
            %concurrency,
            ?isolation,
            "Transaction started"
        );
        Ok(())
    }

    /// Commit the running transaction, if any.
    pub async fn commit(&self) -> Result<()> {
        self.complete(Completion::Commit).await
    }

    /// Roll back the running transaction, if any.
    pub async fn rollback(&self) -> Result<()> {
        self.complete(Completion::Rollback).await
    }

    async fn complete(&self, completion: Completion) -> Result<()> {
        let operation = completion.operation();
        let Some(tx) = self.engine.current_transaction() else {
            debug!(%operation, "No transaction in progress, {} skipped", operation);
            return Ok(());
        };

        let (sender, receiver) = oneshot::channel();
        let callback: CompletionCallback = Box::new(move |result| {
            // The receiver is gone if the caller stopped waiting.
            let _ = sender.send(result);
        });

        match completion {
            Completion::Commit => self.engine.tx_commit(callback),
            Completion::Rollback => self.engine.tx_rollback(callback),
        }

        let outcome = match self.tx_timeout {
            Some(limit) => tokio::time::timeout(limit, receiver).await.map_err(|_| {
                IgniteError::Timeout {
                    operation: completion.name(),
                    timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                }
            })?,
            None => receiver.await,
        };

        outcome
            .map_err(|_| EngineError::other(operation, "Completion callback dropped"))?
            .map_err(|e| EngineError::translate(operation, e))?;

        debug!(tx_id = tx.id, %operation, "Transaction completed");
        Ok(())
    }

    /// Engine product information.
    pub fn product_info(&self) -> ProductInfo {
        self.engine.product_info()
    }

    /// Close the engine session.
    pub fn close(&self) -> Result<()> {
        self.engine
            .close()
            .map_err(|e| EngineError::translate(EngineOperation::Close, e))?;
        Ok(())
    }
}

impl std::fmt::Debug for ExecutionBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionBridge")
            .field("engine", &"<SqlEngine>")
            .field("concurrency", &self.concurrency)
            .field("tx_timeout", &self.tx_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::protocol::mock::{FakeCursor, MockEngine};
    use crate::engine::{NativeError, TransactionInfo};
    use crate::types::Value;
    use mockall::predicate::eq;

    fn info() -> TransactionInfo {
        TransactionInfo {
            id: 7,
            isolation: TransactionIsolation::ReadCommitted,
            concurrency: TransactionConcurrency::Pessimistic,
        }
    }

    fn bridge(engine: MockEngine) -> ExecutionBridge {
        ExecutionBridge::new(Arc::new(engine), &ConnectionOptions::default())
    }

    #[test]
    fn test_isolation_mapping() {
        assert_eq!(
            native_isolation(&IsolationLevel::ReadUncommitted),
            Ok(TransactionIsolation::ReadCommitted)
        );
        assert_eq!(
            native_isolation(&IsolationLevel::ReadCommitted),
            Ok(TransactionIsolation::ReadCommitted)
        );
        assert_eq!(
            native_isolation(&IsolationLevel::RepeatableRead),
            Ok(TransactionIsolation::RepeatableRead)
        );
        assert_eq!(
            native_isolation(&IsolationLevel::Serializable),
            Ok(TransactionIsolation::Serializable)
        );

        let custom = IsolationLevel::Custom("SNAPSHOT".to_string());
        assert_eq!(
            native_isolation(&custom),
            Err(ArgumentError::UnsupportedIsolationLevel(custom.clone()))
        );
    }

    #[test]
    fn test_execute_passes_arguments_in_position_order() {
        let mut engine = MockEngine::new();
        engine
            .expect_query()
            .withf(|query| {
                query.sql == "INSERT INTO T VALUES (?, ?)"
                    && query.args == vec![Value::Integer(0), Value::from("A")]
            })
            .times(1)
            .returning(|_| Ok(Box::new(FakeCursor::update(1))));

        let mut binding = Binding::new();
        binding.add(1, Value::from("A")).add(0, Value::Integer(0));

        let result = bridge(engine)
            .execute("INSERT INTO T VALUES (?, ?)", &binding, &GeneratedKeys::None)
            .unwrap();
        assert_eq!(result.rows_updated(), Some(1));
    }

    #[test]
    fn test_execute_translates_failure() {
        let mut engine = MockEngine::new();
        engine
            .expect_query()
            .returning(|_| Err(NativeError::with_code(42000, "Syntax error")));

        let err = bridge(engine)
            .execute("SELEC 1", &Binding::new(), &GeneratedKeys::None)
            .unwrap_err();
        match err {
            IgniteError::Engine(e) => {
                assert_eq!(e.operation, EngineOperation::Query);
                assert_eq!(e.code, Some(42000));
                assert_eq!(e.message, "Syntax error");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_begin_starts_transaction() {
        let mut engine = MockEngine::new();
        let mut started = false;
        engine
            .expect_current_transaction()
            .returning(move || {
                // First check happens before the start.
                let current = if started { Some(info()) } else { None };
                started = true;
                current
            });
        engine
            .expect_tx_start()
            .with(
                eq(TransactionConcurrency::Pessimistic),
                eq(TransactionIsolation::ReadCommitted),
            )
            .times(1)
            .returning(|_, _| Ok(()));

        bridge(engine)
            .begin_transaction(&IsolationLevel::ReadUncommitted)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_begin_inside_transaction_is_noop() {
        let mut engine = MockEngine::new();
        engine
            .expect_current_transaction()
            .returning(|| Some(info()));
        engine.expect_tx_start().times(0);

        bridge(engine)
            .begin_transaction(&IsolationLevel::Serializable)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_begin_with_custom_level_fails() {
        let mut engine = MockEngine::new();
        engine.expect_current_transaction().returning(|| None);
        engine.expect_tx_start().times(0);

        let err = bridge(engine)
            .begin_transaction(&IsolationLevel::Custom("SNAPSHOT".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IgniteError::Argument(ArgumentError::UnsupportedIsolationLevel(_))
        ));
    }

    #[tokio::test]
    async fn test_begin_failure_translated() {
        let mut engine = MockEngine::new();
        engine.expect_current_transaction().returning(|| None);
        engine
            .expect_tx_start()
            .returning(|_, _| Err(NativeError::new("Node stopping")));

        let err = bridge(engine)
            .begin_transaction(&IsolationLevel::ReadCommitted)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IgniteError::Engine(EngineError { operation: EngineOperation::Begin, .. })
        ));
    }

    #[tokio::test]
    async fn test_commit_and_rollback_outside_transaction_are_noops() {
        let mut engine = MockEngine::new();
        engine.expect_current_transaction().returning(|| None);
        engine.expect_tx_commit().times(0);
        engine.expect_tx_rollback().times(0);

        let bridge = bridge(engine);
        bridge.commit().await.unwrap();
        bridge.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_commit_waits_for_callback() {
        let mut engine = MockEngine::new();
        engine
            .expect_current_transaction()
            .returning(|| Some(info()));
        engine.expect_tx_commit().times(1).returning(|on_complete| {
            std::thread::spawn(move || on_complete(Ok(())));
        });

        bridge(engine).commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_commit_and_rollback_reach_their_own_engine_call() {
        let mut engine = MockEngine::new();
        engine
            .expect_current_transaction()
            .returning(|| Some(info()));
        engine.expect_tx_rollback().times(0);
        engine
            .expect_tx_commit()
            .times(1)
            .returning(|on_complete| on_complete(Ok(())));
        bridge(engine).commit().await.unwrap();

        let mut engine = MockEngine::new();
        engine
            .expect_current_transaction()
            .returning(|| Some(info()));
        engine.expect_tx_commit().times(0);
        engine
            .expect_tx_rollback()
            .times(1)
            .returning(|on_complete| on_complete(Ok(())));
        bridge(engine).rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_rollback_failure_translated() {
        let mut engine = MockEngine::new();
        engine
            .expect_current_transaction()
            .returning(|| Some(info()));
        engine
            .expect_tx_rollback()
            .times(1)
            .returning(|on_complete| on_complete(Err(NativeError::with_code(25000, "Tx timed out"))));

        let err = bridge(engine).rollback().await.unwrap_err();
        match err {
            IgniteError::Engine(e) => {
                assert_eq!(e.operation, EngineOperation::Rollback);
                assert_eq!(e.code, Some(25000));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dropped_callback_is_engine_error() {
        let mut engine = MockEngine::new();
        engine
            .expect_current_transaction()
            .returning(|| Some(info()));
        engine.expect_tx_commit().returning(drop);

        let err = bridge(engine).commit().await.unwrap_err();
        assert!(matches!(
            err,
            IgniteError::Engine(EngineError { operation: EngineOperation::Commit, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_timeout() {
        let mut engine = MockEngine::new();
        engine
            .expect_current_transaction()
            .returning(|| Some(info()));
        // Keep the callback alive without ever firing it.
        let parked = Arc::new(std::sync::Mutex::new(Vec::new()));
        let keep = Arc::clone(&parked);
        engine
            .expect_tx_commit()
            .returning(move |on_complete| keep.lock().unwrap().push(on_complete));

        let options = ConnectionOptions::builder()
            .tx_timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        let bridge = ExecutionBridge::new(Arc::new(engine), &options);

        let err = bridge.commit().await.unwrap_err();
        assert!(matches!(
            err,
            IgniteError::Timeout {
                operation: "commit",
                timeout_ms: 50
            }
        ));
        assert_eq!(parked.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_close_translates_failure() {
        let mut engine = MockEngine::new();
        engine
            .expect_close()
            .times(1)
            .returning(|| Err(NativeError::new("Already closed")));

        assert!(matches!(
            bridge(engine).close().unwrap_err(),
            IgniteError::Engine(EngineError { operation: EngineOperation::Close, .. })
        ));
    }
}
