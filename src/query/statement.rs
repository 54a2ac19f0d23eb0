//! SQL statement handling and execution.
//!
//! A [`Statement`] owns SQL text and the parameter rows bound to it. The text
//! may hold several `;`-separated statements; each one runs once per bound
//! row, statements in the outer loop and rows in the inner loop.
//!
//! # Example
//!
//! ```
//! use futures_util::StreamExt;
//! use ignite_r2dbc::engine::memory::MemoryEngine;
//! use ignite_r2dbc::r2dbc::ConnectionFactory;
//! use ignite_r2dbc::spi::Connection;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> ignite_r2dbc::Result<()> {
//! let connection = ConnectionFactory::new(Arc::new(MemoryEngine::new())).create();
//! let mut statement = connection.create_statement(
//!     "CREATE TABLE T (ID INT PRIMARY KEY, NAME VARCHAR); INSERT INTO T VALUES (?1, ?2)",
//! );
//! statement.bind("?1", 1)?.bind("?2", "A")?;
//!
//! let mut results = statement.execute();
//! while let Some(result) = results.next().await {
//!     assert!(result?.rows_updated().is_some());
//! }
//! # Ok(())
//! # }
//! ```

use crate::connection::ExecutionBridge;
use crate::engine::GeneratedKeys;
use crate::error::{EngineError, EngineOperation, Result};
use crate::query::binding::{Binding, Bindings, ParameterIndex};
use crate::query::results::ResultStream;
use crate::types::{Value, ValueType};
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::trace;

/// Split SQL text into statements on top-level `;`.
///
/// Semicolons inside single-quoted literals, double-quoted identifiers,
/// `--` line comments and `/* */` block comments do not split. Fragments are
/// trimmed and empty ones are dropped.
pub fn split_statements(sql: &str) -> Vec<String> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mode {
        Code,
        Literal,
        Identifier,
        LineComment,
        BlockComment,
    }

    let mut statements = Vec::new();
    let mut current = String::new();
    let mut mode = Mode::Code;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match (mode, c) {
            (Mode::Code, ';') => {
                push_fragment(&mut statements, &current);
                current.clear();
                continue;
            }
            (Mode::Code, '\'') => mode = Mode::Literal,
            (Mode::Code, '"') => mode = Mode::Identifier,
            (Mode::Code, '-') if chars.peek() == Some(&'-') => mode = Mode::LineComment,
            // Both delimiter characters are consumed so `/*/` stays open.
            (Mode::Code, '/') if chars.peek() == Some(&'*') => {
                current.push(c);
                current.extend(chars.next());
                mode = Mode::BlockComment;
                continue;
            }
            (Mode::BlockComment, '*') if chars.peek() == Some(&'/') => {
                current.push(c);
                current.extend(chars.next());
                mode = Mode::Code;
                continue;
            }
            // A doubled quote is an escaped quote and keeps the mode.
            (Mode::Literal, '\'') | (Mode::Identifier, '"') => {
                if chars.peek() == Some(&c) {
                    current.push(c);
                    chars.next();
                } else {
                    mode = Mode::Code;
                }
            }
            (Mode::LineComment, '\n') => mode = Mode::Code,
            _ => {}
        }
        current.push(c);
    }
    push_fragment(&mut statements, &current);

    statements
}

fn push_fragment(statements: &mut Vec<String>, fragment: &str) {
    let fragment = fragment.trim();
    if !fragment.is_empty() {
        statements.push(fragment.to_string());
    }
}

/// Ordered (statement, binding) pairs of one execution.
///
/// Pair `k` is statement `k / m` with binding `k % m`, `m` being the number of
/// bindings.
pub(crate) struct ExecutionPlan {
    statements: Vec<String>,
    bindings: Vec<Binding>,
    next: usize,
}

impl ExecutionPlan {
    pub(crate) fn new(statements: Vec<String>, bindings: Vec<Binding>) -> Self {
        Self {
            statements,
            bindings,
            next: 0,
        }
    }

    /// Total number of executions.
    pub(crate) fn len(&self) -> usize {
        self.statements.len() * self.bindings.len()
    }
}

impl Iterator for ExecutionPlan {
    type Item = (String, Binding);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.len() {
            return None;
        }
        let m = self.bindings.len();
        let pair = (
            self.statements[self.next / m].clone(),
            self.bindings[self.next % m].clone(),
        );
        self.next += 1;
        Some(pair)
    }
}

/// Run `plan` lazily: one execution per poll, stopping after the first error.
///
/// Each execution runs on the blocking thread pool.
pub(crate) fn dispatch(
    bridge: Arc<ExecutionBridge>,
    plan: ExecutionPlan,
    generated_keys: GeneratedKeys,
) -> ResultStream {
    stream::unfold(Some(plan), move |state| {
        let bridge = Arc::clone(&bridge);
        let generated_keys = generated_keys.clone();
        async move {
            let mut plan = state?;
            let (sql, binding) = plan.next()?;
            let outcome = tokio::task::spawn_blocking(move || {
                bridge.execute(&sql, &binding, &generated_keys)
            })
            .await
            .unwrap_or_else(|e| {
                let message = format!("Query task failed: {}", e);
                Err(EngineError::other(EngineOperation::Query, message).into())
            });
            match outcome {
                Ok(result) => Some((Ok(result), Some(plan))),
                Err(e) => Some((Err(e), None)),
            }
        }
    })
    .boxed()
}

/// A SQL statement with bound parameter rows.
pub struct Statement {
    bridge: Arc<ExecutionBridge>,
    sql: String,
    statements: Vec<String>,
    bindings: Bindings,
    generated_keys: GeneratedKeys,
}

impl Statement {
    pub(crate) fn new(bridge: Arc<ExecutionBridge>, sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let statements = split_statements(&sql);
        Self {
            bridge,
            sql,
            statements,
            bindings: Bindings::new(),
            generated_keys: GeneratedKeys::None,
        }
    }

    /// Original SQL text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Statements the text splits into.
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Bind `value` in the current row.
    ///
    /// `id` is a zero-based position or a `?N` / `$N` name. An invalid name
    /// fails here and binds nothing.
    pub fn bind<I, V>(&mut self, id: I, value: V) -> Result<&mut Self>
    where
        I: ParameterIndex,
        V: Into<Value>,
    {
        let position = id.position()?;
        self.bindings.add(position, value.into());
        Ok(self)
    }

    /// Bind NULL in the current row. `value_type` is informational.
    pub fn bind_null<I: ParameterIndex>(&mut self, id: I, value_type: ValueType) -> Result<&mut Self> {
        let position = id.position()?;
        trace!(position, ?value_type, "Binding NULL");
        self.bindings.add(position, Value::Null);
        Ok(self)
    }

    /// Close the current row of bindings.
    pub fn add(&mut self) -> &mut Self {
        self.bindings.finish_row();
        self
    }

    /// Ask the engine to return generated values.
    ///
    /// An empty list requests all generated columns.
    pub fn return_generated_values(&mut self, columns: &[&str]) -> &mut Self {
        self.generated_keys = if columns.is_empty() {
            GeneratedKeys::All
        } else {
            GeneratedKeys::Columns(columns.iter().map(|c| c.to_string()).collect())
        };
        self
    }

    /// Run every statement once per bound row.
    ///
    /// Executions happen as the returned stream is polled; dropping it stops
    /// the remaining ones. The first failure ends the stream.
    pub fn execute(&self) -> ResultStream {
        let plan = ExecutionPlan::new(self.statements.clone(), self.bindings.snapshot());
        trace!(executions = plan.len(), sql = %self.sql, "Executing statement");
        dispatch(Arc::clone(&self.bridge), plan, self.generated_keys.clone())
    }
}

impl std::fmt::Debug for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql)
            .field("bindings", &self.bindings)
            .field("generated_keys", &self.generated_keys)
            .finish()
    }
}
