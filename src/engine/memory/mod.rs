//! In-process SQL engine.
//!
//! `MemoryEngine` implements [`SqlEngine`] over plain Rust collections. It
//! understands a small SQL subset:
//!
//! - `CREATE TABLE [IF NOT EXISTS] t (col TYPE [PRIMARY KEY] [NOT NULL], ...) [WITH "..."]`
//! - `DROP TABLE [IF EXISTS] t`
//! - `INSERT INTO t [(cols)] VALUES (...), (...)`
//! - `SELECT * | COUNT(*) | cols FROM t [WHERE col = value]`
//! - `UPDATE t SET col = value, ... [WHERE col = value]`
//! - `DELETE FROM t [WHERE col = value]`
//!
//! Values may be literals or placeholders (`?`, `?N`, `$N`). Unquoted
//! identifiers are upper-cased.
//!
//! Transactions work on a private copy of the catalog that replaces the
//! committed one on commit. Commit and rollback complete on a separate thread,
//! like a remote engine would.
//!
//! # Example
//!
//! ```
//! use ignite_r2dbc::engine::memory::MemoryEngine;
//! use ignite_r2dbc::engine::{NativeQuery, SqlEngine};
//!
//! let engine = MemoryEngine::new();
//! engine.query(&NativeQuery::new("CREATE TABLE T (ID INT PRIMARY KEY)")).unwrap();
//! let cursor = engine.query(&NativeQuery::new("INSERT INTO T VALUES (1)")).unwrap();
//! assert!(!cursor.is_query());
//! ```

mod parser;

use crate::engine::protocol::{
    CompletionCallback, FieldMeta, NativeCursor, NativeError, NativeQuery, ProductInfo,
    SqlEngine, TransactionConcurrency, TransactionInfo, TransactionIsolation,
};
use crate::types::{Nullability, TypeMapper, Value, ValueType};
use parser::{ColumnDef, Command, Expr, Filter, Projection};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use tracing::{debug, warn};

pub use parser::SYNTAX_ERROR;

/// Value violates a NOT NULL column.
pub const NOT_NULL_VIOLATION: i32 = 23502;
/// Primary key already present.
pub const DUPLICATE_KEY: i32 = 23505;
/// Value does not fit the column type.
pub const DATA_CONVERSION_ERROR: i32 = 22018;
/// Table does not exist.
pub const TABLE_NOT_FOUND: i32 = 42102;
/// Table already exists.
pub const TABLE_ALREADY_EXISTS: i32 = 42101;
/// Column does not exist.
pub const COLUMN_NOT_FOUND: i32 = 42122;
/// Placeholder without a supplied argument.
pub const PARAMETER_NOT_SET: i32 = 90012;
/// Transaction state does not allow the operation.
pub const INVALID_TRANSACTION_STATE: i32 = 25000;
/// Engine has been closed.
pub const ENGINE_CLOSED: i32 = 8003;

#[derive(Debug, Clone)]
struct Table {
    columns: Vec<ColumnDef>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    fn column_index(&self, name: &str) -> Result<usize, NativeError> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| {
                NativeError::with_code(COLUMN_NOT_FOUND, format!("Column \"{}\" not found", name))
            })
    }

    fn primary_key(&self) -> Option<usize> {
        self.columns.iter().position(|c| c.primary_key)
    }

    fn field(&self, index: usize) -> FieldMeta {
        let column = &self.columns[index];
        let nullability = if column.not_null {
            Nullability::NO_NULLS
        } else {
            Nullability::NULLABLE
        };
        FieldMeta::new(column.name.clone(), column.type_name.clone())
            .with_precision(column.precision, column.scale)
            .with_nullability(nullability)
    }

    /// Fail if any two rows share a primary key value.
    fn check_unique<'a>(
        &self,
        rows: impl Iterator<Item = &'a Vec<Value>>,
    ) -> Result<(), NativeError> {
        let Some(key) = self.primary_key() else {
            return Ok(());
        };

        let mut seen = std::collections::HashSet::new();
        for row in rows {
            if !seen.insert(&row[key]) {
                return Err(NativeError::with_code(
                    DUPLICATE_KEY,
                    format!(
                        "Duplicate primary key value {}",
                        row[key]
                    ),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
struct Catalog {
    tables: HashMap<String, Table>,
}

impl Catalog {
    fn table(&self, name: &str) -> Result<&Table, NativeError> {
        self.tables.get(name).ok_or_else(|| table_not_found(name))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table, NativeError> {
        self.tables.get_mut(name).ok_or_else(|| table_not_found(name))
    }
}

fn table_not_found(name: &str) -> NativeError {
    NativeError::with_code(TABLE_NOT_FOUND, format!("Table \"{}\" not found", name))
}

struct ActiveTransaction {
    info: TransactionInfo,
    working: Catalog,
}

#[derive(Default)]
struct EngineState {
    committed: Catalog,
    transaction: Option<ActiveTransaction>,
    next_tx_id: u64,
    closed: bool,
}

impl EngineState {
    fn catalog_mut(&mut self) -> &mut Catalog {
        match self.transaction.as_mut() {
            Some(tx) => &mut tx.working,
            None => &mut self.committed,
        }
    }

    fn ensure_open(&self) -> Result<(), NativeError> {
        if self.closed {
            Err(NativeError::with_code(ENGINE_CLOSED, "Engine is closed"))
        } else {
            Ok(())
        }
    }

    fn commit(&mut self) -> Result<(), NativeError> {
        let tx = self.transaction.take().ok_or_else(no_transaction)?;
        self.committed = tx.working;
        debug!(tx_id = tx.info.id, "Transaction committed");
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), NativeError> {
        let tx = self.transaction.take().ok_or_else(no_transaction)?;
        debug!(tx_id = tx.info.id, "Transaction rolled back");
        Ok(())
    }
}

fn no_transaction() -> NativeError {
    NativeError::with_code(INVALID_TRANSACTION_STATE, "No transaction in progress")
}

fn lock_state(state: &Mutex<EngineState>) -> Result<MutexGuard<'_, EngineState>, NativeError> {
    state
        .lock()
        .map_err(|_| NativeError::new("Engine state lock poisoned"))
}

/// Single-session in-process SQL engine.
#[derive(Default)]
pub struct MemoryEngine {
    state: Arc<Mutex<EngineState>>,
}

impl MemoryEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    fn complete_async(
        &self,
        operation: &'static str,
        on_complete: CompletionCallback,
        apply: fn(&mut EngineState) -> Result<(), NativeError>,
    ) {
        let state = Arc::clone(&self.state);
        let spawned = thread::Builder::new()
            .name(format!("memory-engine-{}", operation))
            .spawn(move || {
                let result = lock_state(&state).and_then(|mut guard| apply(&mut guard));
                on_complete(result);
            });

        if let Err(e) = spawned {
            warn!(operation, error = %e, "Failed to spawn completion thread");
        }
    }
}

impl SqlEngine for MemoryEngine {
    fn query(&self, query: &NativeQuery) -> Result<Box<dyn NativeCursor>, NativeError> {
        let command = parser::parse(&query.sql)?;
        let mut params = Params::new(&query.args);

        let mut state = lock_state(&self.state)?;
        state.ensure_open()?;
        let outcome = execute(state.catalog_mut(), command, &mut params)?;

        Ok(Box::new(outcome.into_cursor()))
    }

    fn tx_start(
        &self,
        concurrency: TransactionConcurrency,
        isolation: TransactionIsolation,
    ) -> Result<(), NativeError> {
        let mut state = lock_state(&self.state)?;
        state.ensure_open()?;

        if state.transaction.is_some() {
            return Err(NativeError::with_code(
                INVALID_TRANSACTION_STATE,
                "Transaction has already been started",
            ));
        }

        state.next_tx_id += 1;
        let info = TransactionInfo {
            id: state.next_tx_id,
            isolation,
            concurrency,
        };
        debug!(tx_id = info.id, %concurrency, ?isolation, "Transaction started");

        let working = state.committed.clone();
        state.transaction = Some(ActiveTransaction { info, working });
        Ok(())
    }

    fn tx_commit(&self, on_complete: CompletionCallback) {
        self.complete_async("commit", on_complete, EngineState::commit);
    }

    fn tx_rollback(&self, on_complete: CompletionCallback) {
        self.complete_async("rollback", on_complete, EngineState::rollback);
    }

    fn current_transaction(&self) -> Option<TransactionInfo> {
        let state = lock_state(&self.state).ok()?;
        state.transaction.as_ref().map(|tx| tx.info.clone())
    }

    fn product_info(&self) -> ProductInfo {
        ProductInfo {
            name: "Memory Engine".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    fn close(&self) -> Result<(), NativeError> {
        let mut state = lock_state(&self.state)?;
        if let Some(tx) = state.transaction.take() {
            debug!(tx_id = tx.info.id, "Discarding open transaction on close");
        }
        state.closed = true;
        Ok(())
    }
}

/// Positional argument resolution. Bare `?` placeholders consume arguments
/// left to right; `?N` and `$N` address argument `N` directly.
struct Params<'a> {
    args: &'a [Value],
    next: usize,
}

impl<'a> Params<'a> {
    fn new(args: &'a [Value]) -> Self {
        Self { args, next: 0 }
    }

    fn resolve(&mut self, expr: &Expr) -> Result<Value, NativeError> {
        let index = match expr {
            Expr::Literal(value) => return Ok(value.clone()),
            Expr::Param(Some(ordinal)) => ordinal - 1,
            Expr::Param(None) => {
                self.next += 1;
                self.next - 1
            }
        };

        self.args.get(index).cloned().ok_or_else(|| {
            NativeError::with_code(
                PARAMETER_NOT_SET,
                format!("Parameter #{} is not set", index + 1),
            )
        })
    }
}

enum Outcome {
    Count(i64),
    Rows {
        fields: Vec<FieldMeta>,
        records: Vec<Vec<Value>>,
    },
}

impl Outcome {
    fn into_cursor(self) -> MemoryCursor {
        match self {
            Outcome::Count(count) => MemoryCursor {
                query: false,
                fields: Vec::new(),
                records: vec![vec![Value::Integer(count)]].into_iter(),
                closed: false,
            },
            Outcome::Rows { fields, records } => MemoryCursor {
                query: true,
                fields,
                records: records.into_iter(),
                closed: false,
            },
        }
    }
}

fn execute(catalog: &mut Catalog, command: Command, params: &mut Params<'_>) -> Result<Outcome, NativeError> {
    match command {
        Command::CreateTable {
            name,
            if_not_exists,
            columns,
        } => {
            if catalog.tables.contains_key(&name) {
                return if if_not_exists {
                    Ok(Outcome::Count(0))
                } else {
                    Err(NativeError::with_code(
                        TABLE_ALREADY_EXISTS,
                        format!("Table \"{}\" already exists", name),
                    ))
                };
            }

            for (i, column) in columns.iter().enumerate() {
                if columns[..i].iter().any(|c| c.name == column.name) {
                    return Err(NativeError::with_code(
                        SYNTAX_ERROR,
                        format!("Duplicate column name \"{}\"", column.name),
                    ));
                }
            }

            catalog.tables.insert(
                name,
                Table {
                    columns,
                    rows: Vec::new(),
                },
            );
            Ok(Outcome::Count(0))
        }

        Command::DropTable { name, if_exists } => {
            if catalog.tables.remove(&name).is_none() && !if_exists {
                return Err(table_not_found(&name));
            }
            Ok(Outcome::Count(0))
        }

        Command::Insert {
            table,
            columns,
            rows,
        } => {
            let table = catalog.table_mut(&table)?;
            let targets = match columns {
                Some(names) => names
                    .iter()
                    .map(|name| table.column_index(name))
                    .collect::<Result<Vec<_>, _>>()?,
                None => (0..table.columns.len()).collect(),
            };

            let mut inserted = Vec::with_capacity(rows.len());
            for exprs in &rows {
                if exprs.len() != targets.len() {
                    return Err(NativeError::with_code(
                        SYNTAX_ERROR,
                        "Column count does not match value count",
                    ));
                }

                let mut record = vec![Value::Null; table.columns.len()];
                for (&target, expr) in targets.iter().zip(exprs) {
                    record[target] = params.resolve(expr)?;
                }
                for (column, value) in table.columns.iter().zip(record.iter_mut()) {
                    *value = coerce(column, std::mem::replace(value, Value::Null))?;
                }
                inserted.push(record);
            }

            table.check_unique(table.rows.iter().chain(inserted.iter()))?;
            let count = inserted.len() as i64;
            table.rows.extend(inserted);
            Ok(Outcome::Count(count))
        }

        Command::Select {
            table,
            projection,
            filter,
        } => {
            let table = catalog.table(&table)?;
            let predicate = Predicate::new(table, filter.as_ref(), params)?;
            let matching = table.rows.iter().filter(|row| predicate.matches(row));

            match projection {
                Projection::CountAll => Ok(Outcome::Rows {
                    fields: vec![FieldMeta::new("COUNT(*)", "BIGINT")
                        .with_nullability(Nullability::NO_NULLS)],
                    records: vec![vec![Value::Integer(matching.count() as i64)]],
                }),
                Projection::All => Ok(Outcome::Rows {
                    fields: (0..table.columns.len()).map(|i| table.field(i)).collect(),
                    records: matching.cloned().collect(),
                }),
                Projection::Columns(names) => {
                    let indices = names
                        .iter()
                        .map(|name| table.column_index(name))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(Outcome::Rows {
                        fields: indices.iter().map(|&i| table.field(i)).collect(),
                        records: matching
                            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                            .collect(),
                    })
                }
            }
        }

        Command::Update {
            table,
            assignments,
            filter,
        } => {
            let table = catalog.table_mut(&table)?;
            let mut changes = Vec::with_capacity(assignments.len());
            for (name, expr) in &assignments {
                let index = table.column_index(name)?;
                let value = coerce(&table.columns[index], params.resolve(expr)?)?;
                changes.push((index, value));
            }
            let predicate = Predicate::new(table, filter.as_ref(), params)?;

            let mut updated = table.rows.clone();
            let mut count = 0i64;
            for row in updated.iter_mut().filter(|row| predicate.matches(row)) {
                for (index, value) in &changes {
                    row[*index] = value.clone();
                }
                count += 1;
            }

            table.check_unique(updated.iter())?;
            table.rows = updated;
            Ok(Outcome::Count(count))
        }

        Command::Delete { table, filter } => {
            let table = catalog.table_mut(&table)?;
            let predicate = Predicate::new(table, filter.as_ref(), params)?;
            let before = table.rows.len();
            table.rows.retain(|row| !predicate.matches(row));
            Ok(Outcome::Count((before - table.rows.len()) as i64))
        }
    }
}

/// Resolved `WHERE col = value`; no filter matches everything.
struct Predicate {
    condition: Option<(usize, Value)>,
}

impl Predicate {
    fn new(table: &Table, filter: Option<&Filter>, params: &mut Params<'_>) -> Result<Self, NativeError> {
        let condition = match filter {
            Some(filter) => Some((
                table.column_index(&filter.column)?,
                params.resolve(&filter.value)?,
            )),
            None => None,
        };
        Ok(Self { condition })
    }

    fn matches(&self, row: &[Value]) -> bool {
        match &self.condition {
            Some((index, expected)) => sql_equals(&row[*index], expected),
            None => true,
        }
    }
}

fn sql_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Integer(i), Value::Float(f)) | (Value::Float(f), Value::Integer(i)) => {
            *i as f64 == *f
        }
        _ => left == right,
    }
}

fn coerce(column: &ColumnDef, value: Value) -> Result<Value, NativeError> {
    if value.is_null() {
        return if column.not_null {
            Err(NativeError::with_code(
                NOT_NULL_VIOLATION,
                format!("NULL not allowed for column \"{}\"", column.name),
            ))
        } else {
            Ok(Value::Null)
        };
    }

    let mismatch = |value: &Value| {
        NativeError::with_code(
            DATA_CONVERSION_ERROR,
            format!(
                "Cannot store {} in column \"{}\" of type {}",
                value.kind(),
                column.name,
                column.type_name
            ),
        )
    };

    match (TypeMapper::resolve(&column.type_name), value) {
        (None, value) => Ok(value),
        (Some(ValueType::Float), Value::Integer(i)) => Ok(Value::Float(i as f64)),
        (Some(ValueType::String), Value::String(s)) => {
            let limit = column.precision;
            if limit > 0 && s.chars().count() > limit as usize {
                return Err(NativeError::with_code(
                    DATA_CONVERSION_ERROR,
                    format!("Value too long for column \"{}\" ({})", column.name, limit),
                ));
            }
            Ok(Value::String(s))
        }
        (Some(ValueType::Integer), value @ Value::Integer(_))
        | (Some(ValueType::Float), value @ Value::Float(_))
        | (Some(ValueType::Boolean), value @ Value::Boolean(_))
        | (Some(ValueType::Binary), value @ Value::Binary(_))
        | (
            Some(ValueType::Date | ValueType::Time | ValueType::Timestamp),
            value @ Value::String(_),
        ) => Ok(value),
        (Some(_), value) => Err(mismatch(&value)),
    }
}

struct MemoryCursor {
    query: bool,
    fields: Vec<FieldMeta>,
    records: std::vec::IntoIter<Vec<Value>>,
    closed: bool,
}

impl NativeCursor for MemoryCursor {
    fn is_query(&self) -> bool {
        self.query
    }

    fn fields(&self) -> &[FieldMeta] {
        &self.fields
    }

    fn next_record(&mut self) -> Option<Result<Vec<Value>, NativeError>> {
        if self.closed {
            return None;
        }
        self.records.next().map(Ok)
    }

    fn close(&mut self) {
        self.closed = true;
        self.records = Vec::new().into_iter();
    }
}
