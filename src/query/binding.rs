//! Parameter bindings.
//!
//! A [`Binding`] is one row of arguments for one execution. [`Bindings`] collects
//! rows incrementally: bind calls accumulate into the current row until
//! [`Bindings::finish_row`] closes it.

use crate::error::ArgumentError;
use crate::types::Value;
use std::collections::BTreeMap;
use std::mem;

/// Parameter values keyed by zero-based position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Binding {
    values: BTreeMap<usize, Value>,
}

impl Binding {
    /// Create an empty binding.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value at `position`, replacing any earlier value there.
    pub fn add(&mut self, position: usize, value: Value) -> &mut Self {
        self.values.insert(position, value);
        self
    }

    /// Value at `position`.
    pub fn get(&self, position: usize) -> Option<&Value> {
        self.values.get(&position)
    }

    /// Number of bound positions.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Bound values in ascending position order.
    ///
    /// This is the exact argument list of one native execution.
    pub fn values_in_position_order(&self) -> Vec<Value> {
        self.values.values().cloned().collect()
    }
}

#[derive(Debug, Clone)]
enum RowState {
    Accumulating(Binding),
    BetweenRows,
}

/// Ordered sequence of bindings, built one row at a time.
#[derive(Debug, Clone)]
pub struct Bindings {
    rows: Vec<Binding>,
    state: RowState,
}

impl Bindings {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            state: RowState::BetweenRows,
        }
    }

    /// Bind `value` at `position` in the current row, opening a row if needed.
    pub fn add(&mut self, position: usize, value: Value) {
        if let RowState::BetweenRows = self.state {
            self.state = RowState::Accumulating(Binding::new());
        }
        if let RowState::Accumulating(binding) = &mut self.state {
            binding.add(position, value);
        }
    }

    /// Close the current row. Does nothing between rows.
    pub fn finish_row(&mut self) {
        if let RowState::Accumulating(binding) = mem::replace(&mut self.state, RowState::BetweenRows)
        {
            self.rows.push(binding);
        }
    }

    /// Number of closed rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Rows to execute, including the open one.
    ///
    /// Without any row the result is a single empty binding, so that a
    /// parameterless statement still executes once.
    pub fn snapshot(&self) -> Vec<Binding> {
        let mut rows = self.rows.clone();
        if let RowState::Accumulating(binding) = &self.state {
            rows.push(binding.clone());
        }
        if rows.is_empty() {
            rows.push(Binding::new());
        }
        rows
    }
}

impl Default for Bindings {
    fn default() -> Self {
        Self::new()
    }
}

/// Something that identifies a parameter position.
///
/// Integers are zero-based positions. Names use a marker followed by a
/// one-based ordinal: `"?1"` and `"$1"` both address position 0.
pub trait ParameterIndex {
    /// Resolve to a zero-based position.
    fn position(&self) -> Result<usize, ArgumentError>;
}

impl ParameterIndex for usize {
    fn position(&self) -> Result<usize, ArgumentError> {
        Ok(*self)
    }
}

impl ParameterIndex for &str {
    fn position(&self) -> Result<usize, ArgumentError> {
        parse_identifier(self)
    }
}

impl ParameterIndex for String {
    fn position(&self) -> Result<usize, ArgumentError> {
        parse_identifier(self)
    }
}

/// Parse `?N` / `$N` (N >= 1) into position `N - 1`.
pub fn parse_identifier(identifier: &str) -> Result<usize, ArgumentError> {
    let invalid = || ArgumentError::InvalidIdentifier {
        identifier: identifier.to_string(),
    };

    let digits = identifier
        .strip_prefix('?')
        .or_else(|| identifier.strip_prefix('$'))
        .ok_or_else(invalid)?;

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    match digits.parse::<usize>() {
        Ok(ordinal) if ordinal >= 1 => Ok(ordinal - 1),
        _ => Err(invalid()),
    }
}
