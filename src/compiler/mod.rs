pub mod compile_error;
pub mod cube;
pub mod directory;
pub mod listing;
pub mod memory;
pub mod quad;
pub mod semantics;

pub use compile_error::CompileError;
pub use quad::{CompiledProgram, Operand, Operator, QuadProgram, Quadruple};
pub use semantics::SemanticActions;

use crate::frontend::lexer::{Lexer, LexerError};
use crate::frontend::parser::{Parser, ParserError};

/// Any error a source file can produce on its way to a sealed program.
#[derive(Debug)]
pub enum SourceError {
    Lex(LexerError),
    Parse(ParserError),
    Semantic(CompileError),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Lex(e) => write!(f, "lexical error: {}", e),
            SourceError::Parse(e) => write!(f, "syntax error: {}", e),
            SourceError::Semantic(e) => write!(f, "semantic error: {}", e),
        }
    }
}

impl std::error::Error for SourceError {}

impl From<LexerError> for SourceError {
    fn from(e: LexerError) -> Self {
        SourceError::Lex(e)
    }
}

impl From<ParserError> for SourceError {
    fn from(e: ParserError) -> Self {
        match e {
            ParserError::Semantic(inner) => SourceError::Semantic(inner),
            other => SourceError::Parse(other),
        }
    }
}

/// Source text to sealed program, all three stages.
pub fn compile_source(source: &str) -> Result<CompiledProgram, SourceError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser::new(tokens);
    let program = parser.parse_program()?;
    Ok(program)
}
