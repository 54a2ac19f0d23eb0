//! Execution results and row streaming.
//!
//! Every execution yields one [`QueryResult`]: either an update count or a lazy
//! stream of rows backed by the engine cursor. The cursor is closed exactly
//! once: when it runs dry, when a read fails, or when the stream or result is
//! dropped early.

use crate::engine::NativeCursor;
use crate::error::{EngineError, EngineOperation, Result};
use crate::query::row::{ColumnSource, Row, RowMetadata};
use crate::types::Value;
use futures_util::stream::{BoxStream, Stream};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;
use tracing::trace;

/// Ordered stream of execution results.
pub type ResultStream = BoxStream<'static, Result<QueryResult>>;

/// Owns an engine cursor and closes it exactly once.
pub(crate) struct CursorGuard {
    cursor: Option<Box<dyn NativeCursor>>,
}

impl CursorGuard {
    pub(crate) fn new(cursor: Box<dyn NativeCursor>) -> Self {
        Self {
            cursor: Some(cursor),
        }
    }

    /// Next record. The cursor is closed once it is exhausted or failed.
    pub(crate) fn next_record(&mut self) -> Option<std::result::Result<Vec<Value>, EngineError>> {
        let cursor = self.cursor.as_mut()?;
        match cursor.next_record() {
            Some(Ok(record)) => Some(Ok(record)),
            Some(Err(e)) => {
                self.close();
                Some(Err(EngineError::translate(EngineOperation::Fetch, e)))
            }
            None => {
                self.close();
                None
            }
        }
    }

    pub(crate) fn close(&mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            cursor.close();
            trace!("Cursor closed");
        }
    }
}

impl Drop for CursorGuard {
    fn drop(&mut self) {
        self.close();
    }
}

enum Outcome {
    Update(Option<i64>),
    Rows {
        metadata: RowMetadata,
        cursor: Option<CursorGuard>,
    },
}

/// Outcome of one execution.
pub struct QueryResult {
    outcome: Outcome,
}

impl QueryResult {
    /// Classify a cursor.
    ///
    /// A query-shaped cursor becomes a rows result. Anything else is an update
    /// whose count is the first field of the first record; the cursor is read
    /// once and closed.
    pub(crate) fn from_cursor(cursor: Box<dyn NativeCursor>) -> Result<Self> {
        if cursor.is_query() {
            let metadata = RowMetadata::new(ColumnSource::from_fields(cursor.fields()));
            return Ok(Self {
                outcome: Outcome::Rows {
                    metadata,
                    cursor: Some(CursorGuard::new(cursor)),
                },
            });
        }

        let mut guard = CursorGuard::new(cursor);
        let count = match guard.next_record() {
            Some(record) => record?.first().and_then(Value::as_i64),
            None => None,
        };
        guard.close();

        Ok(Self::update(count))
    }

    /// Update result with an optional count.
    pub(crate) fn update(count: Option<i64>) -> Self {
        Self {
            outcome: Outcome::Update(count),
        }
    }

    /// Whether this result carries rows.
    pub fn is_rows(&self) -> bool {
        matches!(self.outcome, Outcome::Rows { .. })
    }

    /// Affected-row count of an update result.
    ///
    /// `None` for rows results and for updates whose count is unknown.
    pub fn rows_updated(&self) -> Option<i64> {
        match self.outcome {
            Outcome::Update(count) => count,
            Outcome::Rows { .. } => None,
        }
    }

    /// Shape of the rows, for rows results.
    pub fn metadata(&self) -> Option<&RowMetadata> {
        match &self.outcome {
            Outcome::Rows { metadata, .. } => Some(metadata),
            Outcome::Update(_) => None,
        }
    }

    /// Stream the rows through `f`.
    ///
    /// The rows can be consumed once. Later calls, and calls on update
    /// results, return an empty stream.
    pub fn map_rows<T, F>(&mut self, f: F) -> RowStream<T>
    where
        F: FnMut(&Row, &RowMetadata) -> T + Send + 'static,
    {
        let (metadata, cursor) = match &mut self.outcome {
            Outcome::Rows { metadata, cursor } => (metadata.clone(), cursor.take()),
            Outcome::Update(_) => (RowMetadata::default(), None),
        };

        RowStream {
            state: cursor.map_or(PullState::Done, PullState::Idle),
            metadata,
            mapper: Box::new(f),
        }
    }

    /// Stream the rows as they are.
    pub fn rows(&mut self) -> RowStream<Row> {
        self.map_rows(|row, _| row.clone())
    }
}

impl fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Update(count) => f
                .debug_struct("QueryResult")
                .field("rows_updated", count)
                .finish(),
            Outcome::Rows { metadata, cursor } => f
                .debug_struct("QueryResult")
                .field("columns", &metadata.len())
                .field("consumed", &cursor.is_none())
                .finish(),
        }
    }
}

type Pull = (CursorGuard, Option<std::result::Result<Vec<Value>, EngineError>>);

enum PullState {
    Idle(CursorGuard),
    Pending(JoinHandle<Pull>),
    Done,
}

/// Lazy row stream. Each poll reads one record from the cursor on the
/// blocking thread pool.
///
/// Dropping the stream while a read is in flight closes the cursor once that
/// read returns.
pub struct RowStream<T> {
    state: PullState,
    metadata: RowMetadata,
    mapper: Box<dyn FnMut(&Row, &RowMetadata) -> T + Send>,
}

impl<T> RowStream<T> {
    /// Shape of the rows.
    pub fn metadata(&self) -> &RowMetadata {
        &self.metadata
    }
}

impl<T> Stream for RowStream<T> {
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            match std::mem::replace(&mut this.state, PullState::Done) {
                PullState::Done => return Poll::Ready(None),
                PullState::Idle(mut guard) => {
                    this.state = PullState::Pending(tokio::task::spawn_blocking(move || {
                        let record = guard.next_record();
                        (guard, record)
                    }));
                }
                PullState::Pending(mut handle) => {
                    let (guard, record) = match Pin::new(&mut handle).poll(cx) {
                        Poll::Pending => {
                            this.state = PullState::Pending(handle);
                            return Poll::Pending;
                        }
                        Poll::Ready(Ok(pull)) => pull,
                        Poll::Ready(Err(e)) => {
                            let message = format!("Fetch task failed: {}", e);
                            let error = EngineError::other(EngineOperation::Fetch, message);
                            return Poll::Ready(Some(Err(error.into())));
                        }
                    };

                    return match record {
                        Some(Ok(values)) => {
                            this.state = PullState::Idle(guard);
                            let row = Row::new(values, Arc::clone(this.metadata.source()));
                            Poll::Ready(Some(Ok((this.mapper)(&row, &this.metadata))))
                        }
                        Some(Err(e)) => Poll::Ready(Some(Err(e.into()))),
                        None => Poll::Ready(None),
                    };
                }
            }
        }
    }
}
