pub mod value;

pub use value::{ReturnType, Value, ValueType};
