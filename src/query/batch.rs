//! Batches of parameterless SQL texts.

use crate::connection::ExecutionBridge;
use crate::engine::GeneratedKeys;
use crate::query::binding::Binding;
use crate::query::results::ResultStream;
use crate::query::statement::{dispatch, ExecutionPlan};
use std::sync::Arc;
use tracing::trace;

/// Ordered list of SQL texts executed one after another.
///
/// Each text runs exactly once, as a whole and without arguments.
pub struct Batch {
    bridge: Arc<ExecutionBridge>,
    statements: Vec<String>,
}

impl Batch {
    pub(crate) fn new(bridge: Arc<ExecutionBridge>) -> Self {
        Self {
            bridge,
            statements: Vec::new(),
        }
    }

    /// Append a SQL text.
    pub fn add(&mut self, sql: impl Into<String>) -> &mut Self {
        self.statements.push(sql.into());
        self
    }

    /// Number of texts.
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Whether no text was added.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Run every text in insertion order.
    pub fn execute(&self) -> ResultStream {
        trace!(executions = self.statements.len(), "Executing batch");
        let plan = ExecutionPlan::new(self.statements.clone(), vec![Binding::new()]);
        dispatch(Arc::clone(&self.bridge), plan, GeneratedKeys::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionOptions;
    use crate::engine::protocol::mock::{FakeCursor, MockEngine};
    use crate::engine::NativeError;
    use crate::error::IgniteError;
    use futures_util::StreamExt;
    use std::sync::Mutex;

    fn batch(engine: MockEngine) -> Batch {
        let bridge = ExecutionBridge::new(Arc::new(engine), &ConnectionOptions::default());
        Batch::new(Arc::new(bridge))
    }

    #[tokio::test]
    async fn test_batch_runs_each_text_once_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let mut engine = MockEngine::new();
        engine.expect_query().times(3).returning(move |query| {
            assert!(query.args.is_empty());
            log.lock().unwrap().push(query.sql.clone());
            Ok(Box::new(FakeCursor::update(1)))
        });

        let mut batch = batch(engine);
        batch
            .add("INSERT INTO T VALUES (1)")
            .add("INSERT INTO T VALUES (2); INSERT INTO T VALUES (3)")
            .add("DELETE FROM T");
        assert_eq!(batch.len(), 3);

        let counts: Vec<Option<i64>> = batch
            .execute()
            .map(|r| r.unwrap().rows_updated())
            .collect()
            .await;

        assert_eq!(counts, vec![Some(1), Some(1), Some(1)]);
        // Texts are not split.
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "INSERT INTO T VALUES (1)",
                "INSERT INTO T VALUES (2); INSERT INTO T VALUES (3)",
                "DELETE FROM T",
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let mut engine = MockEngine::new();
        engine.expect_query().times(0);

        let batch = batch(engine);
        assert!(batch.is_empty());
        assert_eq!(batch.execute().count().await, 0);
    }

    #[tokio::test]
    async fn test_batch_stops_at_failure() {
        let mut engine = MockEngine::new();
        engine
            .expect_query()
            .times(1)
            .returning(|_| Err(NativeError::new("Syntax error")));

        let mut batch = batch(engine);
        batch.add("BAD").add("DELETE FROM T");

        let results: Vec<_> = batch.execute().collect().await;
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(IgniteError::Engine(_))));
    }
}
