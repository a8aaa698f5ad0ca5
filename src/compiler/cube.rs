use crate::compiler::quad::Operator;
use crate::lang::ValueType;

/// The semantic cube: a total function from (left, right, operator) to the
/// result type of the operation, or `None` for a type error.
///
/// Totality is structural: the `match`es below cover every type pair for
/// every typed operator, so a lookup can never be "missing" the way a table
/// key can. Callers must consult this for every binary and assignment
/// operation instead of comparing operand types directly.
///
/// Notable entries, kept from the source language:
/// - `int / int` yields `float` (division is always real division);
/// - `char + char` and `char - char` yield `char`;
/// - logical operators accept numeric operands (non-zero is true);
/// - assignment permits exactly one widening, `float <- int`.
pub fn result_type(left: ValueType, right: ValueType, operator: Operator) -> Option<ValueType> {
    use ValueType::*;
    match operator {
        Operator::Plus | Operator::Minus | Operator::Times | Operator::Divide => {
            match (left, right) {
                (Int, Int) => {
                    if operator == Operator::Divide {
                        Some(Float)
                    } else {
                        Some(Int)
                    }
                }
                (Int, Float) | (Float, Int) | (Float, Float) => Some(Float),
                (Char, Char) => match operator {
                    Operator::Plus | Operator::Minus => Some(Char),
                    _ => None,
                },
                _ => None,
            }
        }
        Operator::Lt | Operator::Gt => match (left, right) {
            (Int | Float, Int | Float) => Some(Bool),
            (Char, Char) => Some(Bool),
            _ => None,
        },
        Operator::Eq | Operator::Neq => match (left, right) {
            (Int | Float, Int | Float) => Some(Bool),
            (Char, Char) => Some(Bool),
            (Bool, Bool) => Some(Bool),
            _ => None,
        },
        Operator::And | Operator::Or => match (left, right) {
            (Int | Float, Int | Float) => Some(Bool),
            (Bool, Bool) => Some(Bool),
            _ => None,
        },
        Operator::Assign => match (left, right) {
            (Int, Int) => Some(Int),
            (Float, Float) | (Float, Int) => Some(Float),
            (Char, Char) => Some(Char),
            (Bool, Bool) => Some(Bool),
            _ => None,
        },
        // Control, I/O and call-protocol operators carry no operand types.
        Operator::Goto
        | Operator::GotoF
        | Operator::GotoT
        | Operator::Read
        | Operator::Write
        | Operator::Era
        | Operator::Parameter
        | Operator::Gosub
        | Operator::EndFun => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_is_total_over_typed_operators() {
        // 4 types x 4 types x 11 operators: every triple answers, some with
        // a type and some with None, but never by panicking.
        let mut defined = 0;
        for left in ValueType::all() {
            for right in ValueType::all() {
                for operator in Operator::typed() {
                    if result_type(left, right, operator).is_some() {
                        defined += 1;
                    }
                }
            }
        }
        assert!(defined > 0);
    }

    #[test]
    fn test_int_arithmetic() {
        assert_eq!(
            result_type(ValueType::Int, ValueType::Int, Operator::Plus),
            Some(ValueType::Int)
        );
        assert_eq!(
            result_type(ValueType::Int, ValueType::Int, Operator::Times),
            Some(ValueType::Int)
        );
    }

    #[test]
    fn test_int_division_yields_float() {
        assert_eq!(
            result_type(ValueType::Int, ValueType::Int, Operator::Divide),
            Some(ValueType::Float)
        );
    }

    #[test]
    fn test_mixed_numeric_promotes_to_float_both_ways() {
        // The table is consulted for both orders; here they coincide.
        assert_eq!(
            result_type(ValueType::Int, ValueType::Float, Operator::Plus),
            Some(ValueType::Float)
        );
        assert_eq!(
            result_type(ValueType::Float, ValueType::Int, Operator::Plus),
            Some(ValueType::Float)
        );
    }

    #[test]
    fn test_relational_yields_bool() {
        assert_eq!(
            result_type(ValueType::Int, ValueType::Float, Operator::Lt),
            Some(ValueType::Bool)
        );
        assert_eq!(
            result_type(ValueType::Char, ValueType::Char, Operator::Neq),
            Some(ValueType::Bool)
        );
    }

    #[test]
    fn test_char_arithmetic() {
        assert_eq!(
            result_type(ValueType::Char, ValueType::Char, Operator::Plus),
            Some(ValueType::Char)
        );
        assert_eq!(
            result_type(ValueType::Char, ValueType::Char, Operator::Times),
            None
        );
        assert_eq!(
            result_type(ValueType::Char, ValueType::Int, Operator::Times),
            None
        );
    }

    #[test]
    fn test_bool_operators() {
        assert_eq!(
            result_type(ValueType::Bool, ValueType::Bool, Operator::And),
            Some(ValueType::Bool)
        );
        assert_eq!(
            result_type(ValueType::Bool, ValueType::Bool, Operator::Eq),
            Some(ValueType::Bool)
        );
        assert_eq!(
            result_type(ValueType::Bool, ValueType::Bool, Operator::Plus),
            None
        );
        assert_eq!(
            result_type(ValueType::Bool, ValueType::Bool, Operator::Lt),
            None
        );
    }

    #[test]
    fn test_assignment_entries() {
        assert_eq!(
            result_type(ValueType::Int, ValueType::Int, Operator::Assign),
            Some(ValueType::Int)
        );
        assert_eq!(
            result_type(ValueType::Float, ValueType::Int, Operator::Assign),
            Some(ValueType::Float)
        );
        // Narrowing is not permitted
        assert_eq!(
            result_type(ValueType::Int, ValueType::Float, Operator::Assign),
            None
        );
        assert_eq!(
            result_type(ValueType::Char, ValueType::Int, Operator::Assign),
            None
        );
    }

    #[test]
    fn test_untyped_operators_have_no_result() {
        assert_eq!(
            result_type(ValueType::Int, ValueType::Int, Operator::Goto),
            None
        );
        assert_eq!(
            result_type(ValueType::Bool, ValueType::Bool, Operator::Gosub),
            None
        );
    }
}
