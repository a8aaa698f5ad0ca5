use crate::lang::ValueType;

/// What went wrong during execution.
#[derive(Debug, Clone, PartialEq)]
pub enum VmFault {
    AddressOutOfBounds {
        addr: u32,
    },
    ReadOnlyMemoryViolation {
        addr: u32,
    },
    UninitializedMemory {
        addr: u32,
    },
    TypeFault {
        addr: u32,
        expected: ValueType,
        found: ValueType,
    },
    NonBooleanJumpCondition {
        found: ValueType,
    },
    InvalidJumpTarget {
        target: i64,
    },
    InvalidOperand {
        expected: &'static str,
    },
    DivisionByZero,
    InvalidCharResult {
        code: i64,
    },
    InvalidInput {
        input: String,
        expected: ValueType,
    },
    UnknownFunction {
        id: i64,
    },
    NoPendingFrame,
    CallStackUnderflow,
    MalformedMemoryLayout,
    Io(String),
}

impl std::fmt::Display for VmFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VmFault::AddressOutOfBounds { addr } => {
                write!(f, "address {} is outside every memory segment", addr)
            }
            VmFault::ReadOnlyMemoryViolation { addr } => {
                write!(f, "write to read-only constant address {}", addr)
            }
            VmFault::UninitializedMemory { addr } => {
                write!(f, "read of uninitialized address {}", addr)
            }
            VmFault::TypeFault {
                addr,
                expected,
                found,
            } => write!(
                f,
                "address {} holds {} but received {}",
                addr, expected, found
            ),
            VmFault::NonBooleanJumpCondition { found } => {
                write!(f, "conditional jump on a non-bool value of type {}", found)
            }
            VmFault::InvalidJumpTarget { target } => {
                write!(f, "jump target {} is outside the program", target)
            }
            VmFault::InvalidOperand { expected } => {
                write!(f, "malformed instruction: expected {} operand", expected)
            }
            VmFault::DivisionByZero => write!(f, "division by zero"),
            VmFault::InvalidCharResult { code } => {
                write!(f, "char arithmetic produced invalid code point {}", code)
            }
            VmFault::InvalidInput { input, expected } => {
                write!(f, "cannot read {} from input {:?}", expected, input)
            }
            VmFault::UnknownFunction { id } => write!(f, "call to unknown function id {}", id),
            VmFault::NoPendingFrame => {
                write!(f, "param or gosub without a preceding era")
            }
            VmFault::CallStackUnderflow => write!(f, "endfun with no active call"),
            VmFault::MalformedMemoryLayout => {
                write!(f, "program memory layout is malformed")
            }
            VmFault::Io(message) => write!(f, "i/o error: {}", message),
        }
    }
}

/// A fault pinned to the quadruple that raised it.
#[derive(Debug, Clone, PartialEq)]
pub struct VmError {
    pub fault: VmFault,
    pub quad: usize,
}

impl VmFault {
    pub fn at(self, quad: usize) -> VmError {
        VmError { fault: self, quad }
    }
}

impl std::fmt::Display for VmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "runtime error at quadruple {}: {}", self.quad, self.fault)
    }
}

impl std::error::Error for VmError {}
