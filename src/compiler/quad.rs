use serde::{Deserialize, Serialize};

use crate::compiler::compile_error::CompileError;
use crate::compiler::directory::FunctionEntry;
use crate::compiler::memory::MemoryConfig;
use crate::lang::Value;

/// The closed operator set of the intermediate representation.
///
/// The first eleven variants are "typed": the semantic cube defines a result
/// type for them. The rest are control flow, I/O and the call protocol.
/// Adding a variant here requires extending both the cube and the VM
/// dispatch; their exhaustive `match`es make a missing arm a compile error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    // arithmetic
    Plus,
    Minus,
    Times,
    Divide,
    // relational
    Lt,
    Gt,
    Eq,
    Neq,
    // logical
    And,
    Or,
    // assignment
    Assign,
    // control
    Goto,
    GotoF,
    GotoT,
    // I/O
    Read,
    Write,
    // call protocol
    Era,
    Parameter,
    Gosub,
    EndFun,
}

impl Operator {
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Times => "*",
            Operator::Divide => "/",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Eq => "==",
            Operator::Neq => "!=",
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::Assign => "=",
            Operator::Goto => "goto",
            Operator::GotoF => "gotof",
            Operator::GotoT => "gotot",
            Operator::Read => "read",
            Operator::Write => "write",
            Operator::Era => "era",
            Operator::Parameter => "param",
            Operator::Gosub => "gosub",
            Operator::EndFun => "endfun",
        }
    }

    /// True for operators whose `result` field is a quadruple index.
    pub fn is_jump(self) -> bool {
        matches!(self, Operator::Goto | Operator::GotoF | Operator::GotoT)
    }

    /// The eleven operators the semantic cube is total over.
    pub fn typed() -> [Operator; 11] {
        [
            Operator::Plus,
            Operator::Minus,
            Operator::Times,
            Operator::Divide,
            Operator::Lt,
            Operator::Gt,
            Operator::Eq,
            Operator::Neq,
            Operator::And,
            Operator::Or,
            Operator::Assign,
        ]
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// One quadruple slot. The operator alone determines which slots are
/// populated: arithmetic fills all three, `goto` only `result`, and so on.
/// `Imm` carries compile-time literals: jump targets, function ids and
/// parameter slot indices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Empty,
    Address(u32),
    Imm(i64),
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Empty => write!(f, "_"),
            Operand::Address(addr) => write!(f, "{}", addr),
            Operand::Imm(n) => write!(f, "#{}", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quadruple {
    pub operator: Operator,
    pub left: Operand,
    pub right: Operand,
    pub result: Operand,
}

impl Quadruple {
    pub fn new(operator: Operator, left: Operand, right: Operand, result: Operand) -> Self {
        Quadruple {
            operator,
            left,
            right,
            result,
        }
    }
}

impl std::fmt::Display for Quadruple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:<7} {:>6}, {:>6}, {:>6}",
            self.operator.symbol(),
            self.left,
            self.right,
            self.result
        )
    }
}

/// The in-progress quadruple list: append-only, plus in-place mutation of
/// the `result` field for backpatching. `seal` ends that mutability and
/// checks backpatch closure.
#[derive(Debug, Default)]
pub struct QuadProgram {
    quads: Vec<Quadruple>,
}

impl QuadProgram {
    pub fn new() -> Self {
        QuadProgram { quads: Vec::new() }
    }

    /// Current instruction count; also the index the next `push` will get,
    /// which is what every jump target computation uses.
    pub fn len(&self) -> usize {
        self.quads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    /// Appends a quadruple and returns its index.
    pub fn push(&mut self, quad: Quadruple) -> usize {
        self.quads.push(quad);
        self.quads.len() - 1
    }

    pub fn quads(&self) -> &[Quadruple] {
        &self.quads
    }

    /// Backpatch: overwrite the `result` field of the quadruple at `index`
    /// with a jump target.
    pub fn patch_result(&mut self, index: usize, target: usize) -> Result<(), CompileError> {
        let len = self.quads.len();
        match self.quads.get_mut(index) {
            Some(quad) => {
                quad.result = Operand::Imm(target as i64);
                Ok(())
            }
            None => Err(CompileError::BackpatchOutOfRange { index, len }),
        }
    }

    /// Verifies backpatch closure (every jump resolved, every target inside
    /// `[0, len]`; `len` itself is the halt address) and returns the
    /// immutable instruction list.
    pub fn seal(self) -> Result<Vec<Quadruple>, CompileError> {
        let len = self.quads.len();
        for (index, quad) in self.quads.iter().enumerate() {
            if quad.operator.is_jump() {
                match quad.result {
                    Operand::Imm(target) if (0..=len as i64).contains(&target) => {}
                    _ => return Err(CompileError::UnresolvedJump { index }),
                }
            }
        }
        Ok(self.quads)
    }
}

/// The sealed compilation artifact: the complete compiler-to-VM contract.
/// Serializable so compile and run can be separated by a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledProgram {
    pub quads: Vec<Quadruple>,
    pub functions: Vec<FunctionEntry>,
    pub constants: Vec<(Value, u32)>,
    pub config: MemoryConfig,
}

impl CompiledProgram {
    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goto_to(target: Option<usize>) -> Quadruple {
        let result = match target {
            Some(t) => Operand::Imm(t as i64),
            None => Operand::Empty,
        };
        Quadruple::new(Operator::Goto, Operand::Empty, Operand::Empty, result)
    }

    #[test]
    fn test_push_returns_index() {
        let mut program = QuadProgram::new();
        assert_eq!(program.push(goto_to(None)), 0);
        assert_eq!(program.push(goto_to(None)), 1);
        assert_eq!(program.len(), 2);
    }

    #[test]
    fn test_patch_result_overwrites_target() {
        let mut program = QuadProgram::new();
        let idx = program.push(goto_to(None));
        program.push(goto_to(Some(0)));
        program.patch_result(idx, 2).unwrap();
        assert_eq!(program.quads()[idx].result, Operand::Imm(2));
    }

    #[test]
    fn test_patch_out_of_range_is_an_error() {
        let mut program = QuadProgram::new();
        program.push(goto_to(None));
        let err = program.patch_result(7, 0).unwrap_err();
        assert_eq!(err, CompileError::BackpatchOutOfRange { index: 7, len: 1 });
    }

    #[test]
    fn test_seal_rejects_unresolved_jump() {
        let mut program = QuadProgram::new();
        program.push(goto_to(Some(1)));
        program.push(goto_to(None));
        let err = program.seal().unwrap_err();
        assert_eq!(err, CompileError::UnresolvedJump { index: 1 });
    }

    #[test]
    fn test_seal_rejects_target_past_end() {
        let mut program = QuadProgram::new();
        program.push(goto_to(Some(5)));
        assert!(matches!(
            program.seal(),
            Err(CompileError::UnresolvedJump { index: 0 })
        ));
    }

    #[test]
    fn test_seal_accepts_halt_target() {
        // One past the end is where a jump out of a trailing conditional
        // lands.
        let mut program = QuadProgram::new();
        program.push(goto_to(Some(1)));
        let quads = program.seal().unwrap();
        assert_eq!(quads.len(), 1);
    }

    #[test]
    fn test_seal_accepts_resolved_program() {
        let mut program = QuadProgram::new();
        let idx = program.push(goto_to(None));
        program.push(Quadruple::new(
            Operator::Write,
            Operand::Empty,
            Operand::Empty,
            Operand::Address(9_000),
        ));
        program.patch_result(idx, 1).unwrap();
        let quads = program.seal().unwrap();
        assert_eq!(quads.len(), 2);
    }

    #[test]
    fn test_quadruple_display_shape() {
        let quad = Quadruple::new(
            Operator::Plus,
            Operand::Address(1_000),
            Operand::Address(9_000),
            Operand::Address(13_000),
        );
        let text = quad.to_string();
        assert!(text.starts_with("+"));
        assert!(text.contains("1000"));
        assert!(text.contains("13000"));
    }

    #[test]
    fn test_compiled_program_postcard_round_trip() {
        let program = CompiledProgram {
            quads: vec![
                goto_to(Some(1)),
                Quadruple::new(
                    Operator::Write,
                    Operand::Empty,
                    Operand::Empty,
                    Operand::Address(9_000),
                ),
            ],
            functions: Vec::new(),
            constants: vec![(Value::Int(5), 9_000)],
            config: MemoryConfig::default(),
        };
        let bytes = program.to_bytes().unwrap();
        let decoded = CompiledProgram::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, program);
    }
}
