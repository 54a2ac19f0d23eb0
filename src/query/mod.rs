//! Statements, bindings and results.

pub mod batch;
pub mod binding;
pub mod results;
pub mod row;
pub mod statement;

pub use batch::Batch;
pub use binding::{parse_identifier, Binding, Bindings, ParameterIndex};
pub use results::{QueryResult, ResultStream, RowStream};
pub use row::{ColumnMetadata, ColumnNames, ColumnSource, Row, RowMetadata};
pub use statement::{split_statements, Statement};
