use serde::{Deserialize, Serialize};

/// The four data types a program can declare.
///
/// Address partitions are laid out in this exact order inside every memory
/// segment, so `partition_index` doubles as the partition offset multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Int,
    Float,
    Char,
    Bool,
}

impl ValueType {
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Char => "char",
            ValueType::Bool => "bool",
        }
    }

    /// Fixed partition order: int, float, char, bool.
    pub fn partition_index(self) -> usize {
        match self {
            ValueType::Int => 0,
            ValueType::Float => 1,
            ValueType::Char => 2,
            ValueType::Bool => 3,
        }
    }

    pub fn from_partition_index(index: usize) -> Option<ValueType> {
        match index {
            0 => Some(ValueType::Int),
            1 => Some(ValueType::Float),
            2 => Some(ValueType::Char),
            3 => Some(ValueType::Bool),
            _ => None,
        }
    }

    pub fn all() -> [ValueType; 4] {
        [
            ValueType::Int,
            ValueType::Float,
            ValueType::Char,
            ValueType::Bool,
        ]
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Declared return type of a function. `Void` has no value partition,
/// everything else maps onto a `ValueType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnType {
    Void,
    Int,
    Float,
    Char,
}

impl ReturnType {
    pub fn name(self) -> &'static str {
        match self {
            ReturnType::Void => "void",
            ReturnType::Int => "int",
            ReturnType::Float => "float",
            ReturnType::Char => "char",
        }
    }

    pub fn value_type(self) -> Option<ValueType> {
        match self {
            ReturnType::Void => None,
            ReturnType::Int => Some(ValueType::Int),
            ReturnType::Float => Some(ValueType::Float),
            ReturnType::Char => Some(ValueType::Char),
        }
    }
}

impl std::fmt::Display for ReturnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A concrete value, as stored in the constant table and moved through
/// run-time memory cells.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Float(f64),
    Char(char),
    Bool(bool),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Char(_) => ValueType::Char,
            Value::Bool(_) => ValueType::Bool,
        }
    }

    /// Hashable identity for constant deduplication. Floats key by their
    /// bit pattern, everything else by its natural representation.
    pub fn dedup_key(&self) -> (ValueType, u64) {
        let bits = match self {
            Value::Int(n) => *n as u64,
            Value::Float(n) => n.to_bits(),
            Value::Char(c) => *c as u64,
            Value::Bool(b) => *b as u64,
        };
        (self.value_type(), bits)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Char(c) => write!(f, "{}", c),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_index_round_trip() {
        for ty in ValueType::all() {
            assert_eq!(ValueType::from_partition_index(ty.partition_index()), Some(ty));
        }
        assert_eq!(ValueType::from_partition_index(4), None);
    }

    #[test]
    fn test_return_type_to_value_type() {
        assert_eq!(ReturnType::Void.value_type(), None);
        assert_eq!(ReturnType::Int.value_type(), Some(ValueType::Int));
        assert_eq!(ReturnType::Float.value_type(), Some(ValueType::Float));
        assert_eq!(ReturnType::Char.value_type(), Some(ValueType::Char));
    }

    #[test]
    fn test_dedup_key_distinguishes_types() {
        // 1 as int and 1.0 as float must not share a constant slot
        let int_key = Value::Int(1).dedup_key();
        let float_key = Value::Float(1.0).dedup_key();
        assert_ne!(int_key, float_key);
    }

    #[test]
    fn test_dedup_key_equal_for_equal_literals() {
        assert_eq!(Value::Float(2.5).dedup_key(), Value::Float(2.5).dedup_key());
        assert_eq!(Value::Char('a').dedup_key(), Value::Char('a').dedup_key());
    }

    #[test]
    fn test_display_formats() {
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Float(1.5).to_string(), "1.5");
        assert_eq!(Value::Char('x').to_string(), "x");
        assert_eq!(Value::Bool(true).to_string(), "true");
    }
}
