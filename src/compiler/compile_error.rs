use crate::compiler::memory::Segment;
use crate::compiler::quad::Operator;
use crate::lang::ValueType;

/// Everything that can abort a compilation.
///
/// The first group is user-facing (bad source program); the second group
/// (`BackpatchOutOfRange`, `StackUnderflow`, `UnbalancedStacks`,
/// `UnresolvedJump`) signals a broken invariant inside the semantic action
/// engine and always indicates a bug, never a recoverable condition.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    TypeMismatch {
        operator: Operator,
        left: ValueType,
        right: ValueType,
        scope: String,
    },
    NonBooleanCondition {
        found: ValueType,
        scope: String,
    },
    NonNumericControl {
        name: String,
        found: ValueType,
    },
    UndeclaredVariable {
        name: String,
        scope: String,
    },
    UndeclaredFunction {
        name: String,
    },
    DuplicateVariable {
        name: String,
        scope: String,
    },
    DuplicateFunction {
        name: String,
    },
    ArgumentCountMismatch {
        function: String,
        expected: usize,
        got: usize,
    },
    ArgumentTypeMismatch {
        function: String,
        index: usize,
        expected: ValueType,
        got: ValueType,
    },
    VoidInExpression {
        function: String,
    },
    ReturnOutsideFunction,
    ReturnInVoidFunction {
        function: String,
    },
    UnresolvedFunctionEntry {
        name: String,
    },
    OutOfMemory {
        segment: Segment,
        ty: ValueType,
    },
    BackpatchOutOfRange {
        index: usize,
        len: usize,
    },
    StackUnderflow {
        stack: &'static str,
    },
    UnbalancedStacks {
        stack: &'static str,
        depth: usize,
    },
    UnresolvedJump {
        index: usize,
    },
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::TypeMismatch {
                operator,
                left,
                right,
                scope,
            } => write!(
                f,
                "type mismatch in '{}': '{}' is not defined for {} and {}",
                scope,
                operator.symbol(),
                left,
                right
            ),
            CompileError::NonBooleanCondition { found, scope } => write!(
                f,
                "condition in '{}' must be bool, found {}",
                scope, found
            ),
            CompileError::NonNumericControl { name, found } => write!(
                f,
                "loop control variable '{}' must be int or float, found {}",
                name, found
            ),
            CompileError::UndeclaredVariable { name, scope } => {
                write!(f, "undeclared variable '{}' in scope '{}'", name, scope)
            }
            CompileError::UndeclaredFunction { name } => {
                write!(f, "undeclared function '{}'", name)
            }
            CompileError::DuplicateVariable { name, scope } => {
                write!(f, "duplicate variable '{}' in scope '{}'", name, scope)
            }
            CompileError::DuplicateFunction { name } => {
                write!(f, "duplicate function '{}'", name)
            }
            CompileError::ArgumentCountMismatch {
                function,
                expected,
                got,
            } => write!(
                f,
                "call to '{}' expects {} argument(s), got {}",
                function, expected, got
            ),
            CompileError::ArgumentTypeMismatch {
                function,
                index,
                expected,
                got,
            } => write!(
                f,
                "argument {} of call to '{}' must be {}, got {}",
                index, function, expected, got
            ),
            CompileError::VoidInExpression { function } => write!(
                f,
                "void function '{}' cannot be used inside an expression",
                function
            ),
            CompileError::ReturnOutsideFunction => {
                write!(f, "'return' outside of a function body")
            }
            CompileError::ReturnInVoidFunction { function } => {
                write!(f, "'return' with a value in void function '{}'", function)
            }
            CompileError::UnresolvedFunctionEntry { name } => write!(
                f,
                "function '{}' has no entry address yet (body not compiled)",
                name
            ),
            CompileError::OutOfMemory { segment, ty } => write!(
                f,
                "out of memory: {} partition of the {} segment is exhausted",
                ty,
                segment.name()
            ),
            CompileError::BackpatchOutOfRange { index, len } => write!(
                f,
                "internal error: backpatch target {} outside program of {} quadruple(s)",
                index, len
            ),
            CompileError::StackUnderflow { stack } => {
                write!(f, "internal error: {} stack underflow", stack)
            }
            CompileError::UnbalancedStacks { stack, depth } => write!(
                f,
                "internal error: {} stack still holds {} entr(ies) at seal time",
                stack, depth
            ),
            CompileError::UnresolvedJump { index } => {
                write!(f, "internal error: unresolved jump at quadruple {}", index)
            }
        }
    }
}

impl std::error::Error for CompileError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mismatch_display() {
        let err = CompileError::TypeMismatch {
            operator: Operator::Times,
            left: ValueType::Char,
            right: ValueType::Int,
            scope: "global".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("type mismatch"));
        assert!(msg.contains("*"));
        assert!(msg.contains("char"));
        assert!(msg.contains("int"));
    }

    #[test]
    fn test_undeclared_variable_carries_scope() {
        let err = CompileError::UndeclaredVariable {
            name: "x".to_string(),
            scope: "area".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'x'"));
        assert!(msg.contains("'area'"));
    }

    #[test]
    fn test_argument_count_mismatch_display() {
        let err = CompileError::ArgumentCountMismatch {
            function: "f".to_string(),
            expected: 1,
            got: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("'f'"));
        assert!(msg.contains("1"));
        assert!(msg.contains("2"));
    }

    #[test]
    fn test_out_of_memory_names_partition() {
        let err = CompileError::OutOfMemory {
            segment: Segment::Temporary,
            ty: ValueType::Bool,
        };
        let msg = err.to_string();
        assert!(msg.contains("bool"));
        assert!(msg.contains("temporary"));
    }

    #[test]
    fn test_error_implements_std_error() {
        let err = CompileError::ReturnOutsideFunction;
        let _: &dyn std::error::Error = &err;
    }
}
