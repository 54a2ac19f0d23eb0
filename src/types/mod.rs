//! Value model and type mapping.

mod mapping;
mod value;

pub use mapping::{Nullability, TypeMapper, ValueType};
pub use value::{FromValue, Value};
