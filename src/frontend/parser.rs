use crate::compiler::compile_error::CompileError;
use crate::compiler::quad::{CompiledProgram, Operator};
use crate::compiler::semantics::SemanticActions;
use crate::frontend::lexer::{Span, Spanned};
use crate::frontend::token::Token;
use crate::lang::{ReturnType, Value, ValueType};

#[derive(Debug)]
pub enum ParserError {
    Syntax {
        message: String,
        line: usize,
        col: usize,
    },
    Semantic(CompileError),
}

impl std::fmt::Display for ParserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParserError::Syntax { message, line, col } => {
                write!(f, "{}:{}: {}", line, col, message)
            }
            ParserError::Semantic(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ParserError {}

impl From<CompileError> for ParserError {
    fn from(e: CompileError) -> Self {
        ParserError::Semantic(e)
    }
}

const LOGICAL: [Operator; 2] = [Operator::And, Operator::Or];
const RELATIONAL: [Operator; 4] = [Operator::Lt, Operator::Gt, Operator::Eq, Operator::Neq];
const ADDITIVE: [Operator; 2] = [Operator::Plus, Operator::Minus];
const MULTIPLICATIVE: [Operator; 2] = [Operator::Times, Operator::Divide];

/// Recursive-descent parser.
///
/// The parser owns no intermediate tree: it recognizes the sentence
/// structure and calls one `SemanticActions` method per neuralgic point,
/// so quadruples come out as a side effect of a successful parse.
/// Precedence lives in the tier functions below: each tier reduces only its
/// own operator set, right after parsing that tier's right operand.
pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    actions: SemanticActions,
}

impl Parser {
    pub fn new(tokens: Vec<Spanned>) -> Self {
        Parser {
            tokens,
            pos: 0,
            actions: SemanticActions::new(),
        }
    }

    // =========================================================================
    // Cursor helpers
    // =========================================================================

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1).map(|s| &s.token)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn here(&self) -> Span {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|s| s.span)
            .unwrap_or(Span { line: 1, col: 1 })
    }

    fn syntax_error(&self, message: String) -> ParserError {
        let span = self.here();
        ParserError::Syntax {
            message,
            line: span.line,
            col: span.col,
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), ParserError> {
        match self.current() {
            Some(found) if *found == token => {
                self.advance();
                Ok(())
            }
            Some(found) => Err(self.syntax_error(format!(
                "expected {}, found {}",
                token.describe(),
                found.describe()
            ))),
            None => Err(self.syntax_error(format!(
                "expected {}, found end of input",
                token.describe()
            ))),
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParserError> {
        match self.current() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            Some(found) => {
                Err(self.syntax_error(format!("expected identifier, found {}", found.describe())))
            }
            None => Err(self.syntax_error("expected identifier, found end of input".to_string())),
        }
    }

    fn check(&self, token: &Token) -> bool {
        self.current() == Some(token)
    }

    // =========================================================================
    // Program structure
    // =========================================================================

    /// `program id; var-decls function* main() { var-decls statements }`
    pub fn parse_program(&mut self) -> Result<CompiledProgram, ParserError> {
        self.expect(Token::Program)?;
        self.expect_ident()?;
        self.expect(Token::Semicolon)?;
        self.actions.begin_program();

        self.parse_var_decls()?;
        while matches!(
            self.current(),
            Some(Token::Void | Token::Int | Token::FloatKw | Token::Char)
        ) {
            self.parse_function()?;
        }

        self.expect(Token::Main)?;
        self.expect(Token::LParen)?;
        self.expect(Token::RParen)?;
        self.actions.start_main()?;
        self.expect(Token::LBrace)?;
        self.parse_var_decls()?;
        self.parse_statements()?;
        self.expect(Token::RBrace)?;

        if let Some(found) = self.current() {
            return Err(self.syntax_error(format!(
                "expected end of input after main, found {}",
                found.describe()
            )));
        }
        let actions = std::mem::take(&mut self.actions);
        Ok(actions.seal()?)
    }

    fn parse_value_type(&mut self) -> Result<ValueType, ParserError> {
        let ty = match self.current() {
            Some(Token::Int) => ValueType::Int,
            Some(Token::FloatKw) => ValueType::Float,
            Some(Token::Char) => ValueType::Char,
            Some(Token::Bool) => ValueType::Bool,
            Some(found) => {
                return Err(
                    self.syntax_error(format!("expected a type, found {}", found.describe()))
                );
            }
            None => return Err(self.syntax_error("expected a type, found end of input".to_string())),
        };
        self.advance();
        Ok(ty)
    }

    /// `("var" type id dims? ("," id dims?)* ";")*`
    fn parse_var_decls(&mut self) -> Result<(), ParserError> {
        while self.check(&Token::Var) {
            self.advance();
            let ty = self.parse_value_type()?;
            loop {
                let name = self.expect_ident()?;
                let dims = self.parse_dims()?;
                self.actions.declare_variable(&name, ty, &dims)?;
                if self.check(&Token::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect(Token::Semicolon)?;
        }
        Ok(())
    }

    /// Up to two `[n]` dimension groups. Declared arrays get a contiguous
    /// address block; the grammar has no element access.
    fn parse_dims(&mut self) -> Result<Vec<u32>, ParserError> {
        let mut dims = Vec::new();
        while self.check(&Token::LBracket) && dims.len() < 2 {
            self.advance();
            match self.current() {
                Some(&Token::Integer(n)) if n > 0 => match u32::try_from(n) {
                    Ok(dim) => {
                        dims.push(dim);
                        self.advance();
                    }
                    Err(_) => {
                        return Err(self.syntax_error(format!(
                            "array dimension {} is too large (max {})",
                            n,
                            u32::MAX
                        )));
                    }
                },
                _ => {
                    return Err(self.syntax_error(
                        "array dimension must be a positive integer literal".to_string(),
                    ));
                }
            }
            self.expect(Token::RBracket)?;
        }
        Ok(dims)
    }

    /// `ret-type id(params) { var-decls statements }`
    fn parse_function(&mut self) -> Result<(), ParserError> {
        let return_type = match self.current() {
            Some(Token::Void) => ReturnType::Void,
            Some(Token::Int) => ReturnType::Int,
            Some(Token::FloatKw) => ReturnType::Float,
            Some(Token::Char) => ReturnType::Char,
            _ => return Err(self.syntax_error("expected a function declaration".to_string())),
        };
        self.advance();
        let name = self.expect_ident()?;
        self.actions.enter_function(&name, return_type)?;

        self.expect(Token::LParen)?;
        let mut params = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                let ty = self.parse_value_type()?;
                let param = self.expect_ident()?;
                params.push((param, ty));
                if self.check(&Token::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(Token::RParen)?;
        self.actions.declare_parameters(&params)?;

        self.expect(Token::LBrace)?;
        self.parse_var_decls()?;
        self.actions.mark_function_entry();
        self.parse_statements()?;
        self.expect(Token::RBrace)?;
        self.actions.end_function();
        Ok(())
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn parse_statements(&mut self) -> Result<(), ParserError> {
        while self.current().is_some() && !self.check(&Token::RBrace) {
            self.parse_statement()?;
        }
        Ok(())
    }

    fn parse_block(&mut self) -> Result<(), ParserError> {
        self.expect(Token::LBrace)?;
        self.parse_statements()?;
        self.expect(Token::RBrace)
    }

    fn parse_statement(&mut self) -> Result<(), ParserError> {
        match self.current() {
            Some(Token::Ident(_)) => match self.peek() {
                Some(Token::LParen) => self.parse_call_statement(),
                _ => self.parse_assignment(),
            },
            Some(Token::Read) => self.parse_read(),
            Some(Token::Write) => self.parse_write(),
            Some(Token::If) => self.parse_if(),
            Some(Token::While) => self.parse_while(),
            Some(Token::For) => self.parse_for(),
            Some(Token::Return) => self.parse_return(),
            Some(found) => {
                Err(self.syntax_error(format!("expected a statement, found {}", found.describe())))
            }
            None => Err(self.syntax_error("expected a statement, found end of input".to_string())),
        }
    }

    /// `id = expression;`: the target rides the operand stack under the
    /// expression until `finish_assignment` pops both.
    fn parse_assignment(&mut self) -> Result<(), ParserError> {
        let name = self.expect_ident()?;
        self.actions.push_variable(&name)?;
        self.expect(Token::Assign)?;
        self.parse_expression()?;
        self.actions.finish_assignment()?;
        self.expect(Token::Semicolon)
    }

    fn parse_call_statement(&mut self) -> Result<(), ParserError> {
        let name = self.expect_ident()?;
        let args = self.parse_call_args()?;
        self.actions.call_function(&name, &args)?;
        self.expect(Token::Semicolon)
    }

    /// `read(id, ...);`
    fn parse_read(&mut self) -> Result<(), ParserError> {
        self.expect(Token::Read)?;
        self.expect(Token::LParen)?;
        loop {
            let name = self.expect_ident()?;
            self.actions.read_into(&name)?;
            if self.check(&Token::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(Token::RParen)?;
        self.expect(Token::Semicolon)
    }

    /// `write(expression, ...);`
    fn parse_write(&mut self) -> Result<(), ParserError> {
        self.expect(Token::Write)?;
        self.expect(Token::LParen)?;
        loop {
            self.parse_expression()?;
            self.actions.write_value()?;
            if self.check(&Token::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(Token::RParen)?;
        self.expect(Token::Semicolon)
    }

    fn parse_if(&mut self) -> Result<(), ParserError> {
        self.expect(Token::If)?;
        self.expect(Token::LParen)?;
        self.parse_expression()?;
        self.expect(Token::RParen)?;
        self.actions.start_if()?;
        self.parse_block()?;
        if self.check(&Token::Else) {
            self.advance();
            self.actions.start_else()?;
            self.parse_block()?;
        }
        self.actions.end_if()?;
        Ok(())
    }

    fn parse_while(&mut self) -> Result<(), ParserError> {
        self.expect(Token::While)?;
        self.expect(Token::LParen)?;
        self.actions.start_while();
        self.parse_expression()?;
        self.actions.while_condition()?;
        self.expect(Token::RParen)?;
        self.parse_block()?;
        self.actions.end_while()?;
        Ok(())
    }

    /// `for id = expression to expression { ... }`
    fn parse_for(&mut self) -> Result<(), ParserError> {
        self.expect(Token::For)?;
        let name = self.expect_ident()?;
        self.actions.start_for(&name)?;
        self.expect(Token::Assign)?;
        self.parse_expression()?;
        self.actions.for_initial()?;
        self.expect(Token::To)?;
        self.parse_expression()?;
        self.actions.for_bound()?;
        self.parse_block()?;
        self.actions.end_for()?;
        Ok(())
    }

    fn parse_return(&mut self) -> Result<(), ParserError> {
        self.expect(Token::Return)?;
        self.parse_expression()?;
        self.actions.return_value()?;
        self.expect(Token::Semicolon)
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn parse_expression(&mut self) -> Result<(), ParserError> {
        self.parse_comparison()?;
        while let Some(op) = self.current_operator(&LOGICAL) {
            self.advance();
            self.actions.push_operator(op);
            self.parse_comparison()?;
            self.actions.reduce_pending(&LOGICAL)?;
        }
        Ok(())
    }

    fn parse_comparison(&mut self) -> Result<(), ParserError> {
        self.parse_additive()?;
        while let Some(op) = self.current_operator(&RELATIONAL) {
            self.advance();
            self.actions.push_operator(op);
            self.parse_additive()?;
            self.actions.reduce_pending(&RELATIONAL)?;
        }
        Ok(())
    }

    fn parse_additive(&mut self) -> Result<(), ParserError> {
        self.parse_multiplicative()?;
        while let Some(op) = self.current_operator(&ADDITIVE) {
            self.advance();
            self.actions.push_operator(op);
            self.parse_multiplicative()?;
            self.actions.reduce_pending(&ADDITIVE)?;
        }
        Ok(())
    }

    fn parse_multiplicative(&mut self) -> Result<(), ParserError> {
        self.parse_factor()?;
        while let Some(op) = self.current_operator(&MULTIPLICATIVE) {
            self.advance();
            self.actions.push_operator(op);
            self.parse_factor()?;
            self.actions.reduce_pending(&MULTIPLICATIVE)?;
        }
        Ok(())
    }

    /// Maps the current token to an operator, but only within `tier` so the
    /// caller's loop stays at its own precedence level.
    fn current_operator(&self, tier: &[Operator]) -> Option<Operator> {
        let op = match self.current()? {
            Token::Plus => Operator::Plus,
            Token::Minus => Operator::Minus,
            Token::Star => Operator::Times,
            Token::Slash => Operator::Divide,
            Token::Lt => Operator::Lt,
            Token::Gt => Operator::Gt,
            Token::EqEq => Operator::Eq,
            Token::NotEq => Operator::Neq,
            Token::AndAnd => Operator::And,
            Token::OrOr => Operator::Or,
            _ => return None,
        };
        tier.contains(&op).then_some(op)
    }

    fn parse_factor(&mut self) -> Result<(), ParserError> {
        match self.current() {
            Some(Token::LParen) => {
                self.advance();
                self.actions.open_paren();
                self.parse_expression()?;
                self.expect(Token::RParen)?;
                self.actions.close_paren()?;
                Ok(())
            }
            Some(&Token::Integer(n)) => {
                self.advance();
                self.actions.push_literal(Value::Int(n))?;
                Ok(())
            }
            Some(&Token::Float(x)) => {
                self.advance();
                self.actions.push_literal(Value::Float(x))?;
                Ok(())
            }
            Some(&Token::CharLit(c)) => {
                self.advance();
                self.actions.push_literal(Value::Char(c))?;
                Ok(())
            }
            Some(Token::True) => {
                self.advance();
                self.actions.push_literal(Value::Bool(true))?;
                Ok(())
            }
            Some(Token::False) => {
                self.advance();
                self.actions.push_literal(Value::Bool(false))?;
                Ok(())
            }
            // unary minus folds into the numeric literal it precedes
            Some(Token::Minus) => {
                self.advance();
                match self.current() {
                    Some(&Token::Integer(n)) => {
                        self.advance();
                        self.actions.push_literal(Value::Int(-n))?;
                        Ok(())
                    }
                    Some(&Token::Float(x)) => {
                        self.advance();
                        self.actions.push_literal(Value::Float(-x))?;
                        Ok(())
                    }
                    _ => Err(self
                        .syntax_error("expected a numeric literal after unary '-'".to_string())),
                }
            }
            Some(Token::Ident(_)) => {
                let name = self.expect_ident()?;
                if self.check(&Token::LParen) {
                    let args = self.parse_call_args()?;
                    self.actions.call_expression(&name, &args)?;
                } else {
                    self.actions.push_variable(&name)?;
                }
                Ok(())
            }
            Some(found) => Err(self.syntax_error(format!(
                "expected an expression, found {}",
                found.describe()
            ))),
            None => Err(self.syntax_error("expected an expression, found end of input".to_string())),
        }
    }

    /// Parses `(expr, ...)` and collects each argument off the operand
    /// stack. The paren sentinel keeps pending operators of the enclosing
    /// expression from reducing across the call.
    fn parse_call_args(&mut self) -> Result<Vec<(u32, ValueType)>, ParserError> {
        self.expect(Token::LParen)?;
        self.actions.open_paren();
        let mut args = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                self.parse_expression()?;
                args.push(self.actions.pop_operand()?);
                if self.check(&Token::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.actions.close_paren()?;
        self.expect(Token::RParen)?;
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_source;
    use crate::compiler::quad::Operand;
    use crate::compiler::SourceError;

    fn compile(source: &str) -> CompiledProgram {
        compile_source(source).unwrap()
    }

    #[test]
    fn test_straight_line_program_compiles() {
        let program = compile(
            "program demo;
             var int x;
             main() {
                 x = 2 + 3;
                 write(x);
             }",
        );
        let ops: Vec<Operator> = program.quads.iter().map(|q| q.operator).collect();
        assert_eq!(
            ops,
            vec![
                Operator::Goto,
                Operator::Plus,
                Operator::Assign,
                Operator::Write,
            ]
        );
        // The prologue lands on the first quadruple of main
        assert_eq!(program.quads[0].result, Operand::Imm(1));
    }

    #[test]
    fn test_precedence_from_source() {
        // a + b * c: multiply first, then add consuming its temporary
        let program = compile(
            "program demo;
             var int a, b, c, r;
             main() { r = a + b * c; }",
        );
        assert_eq!(program.quads[1].operator, Operator::Times);
        assert_eq!(program.quads[2].operator, Operator::Plus);
        assert_eq!(program.quads[2].right, program.quads[1].result);
    }

    #[test]
    fn test_parens_override_precedence() {
        // (a + b) * c: add first
        let program = compile(
            "program demo;
             var int a, b, c, r;
             main() { r = (a + b) * c; }",
        );
        assert_eq!(program.quads[1].operator, Operator::Plus);
        assert_eq!(program.quads[2].operator, Operator::Times);
        assert_eq!(program.quads[2].left, program.quads[1].result);
    }

    #[test]
    fn test_relational_binds_looser_than_additive() {
        // x + 1 > y parses as (x + 1) > y
        let program = compile(
            "program demo;
             var int x, y;
             main() { if (x + 1 > y) { write(1); } }",
        );
        assert_eq!(program.quads[1].operator, Operator::Plus);
        assert_eq!(program.quads[2].operator, Operator::Gt);
    }

    #[test]
    fn test_char_times_int_is_rejected_with_no_emission() {
        let err = compile_source(
            "program demo;
             var char c;
             var int r;
             main() { r = c * 2; }",
        )
        .unwrap_err();
        match err {
            SourceError::Semantic(CompileError::TypeMismatch { operator, .. }) => {
                assert_eq!(operator, Operator::Times);
            }
            other => panic!("expected a type mismatch, got {}", other),
        }
    }

    #[test]
    fn test_undeclared_variable_is_rejected() {
        let err = compile_source(
            "program demo;
             main() { ghost = 1; }",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SourceError::Semantic(CompileError::UndeclaredVariable { .. })
        ));
    }

    #[test]
    fn test_missing_semicolon_is_a_syntax_error() {
        let err = compile_source(
            "program demo;
             var int x;
             main() { x = 1 }",
        )
        .unwrap_err();
        match err {
            SourceError::Parse(ParserError::Syntax { message, .. }) => {
                assert!(message.contains("';'"), "{}", message);
            }
            other => panic!("expected a syntax error, got {}", other),
        }
    }

    #[test]
    fn test_call_protocol_from_source() {
        let program = compile(
            "program demo;
             void show(int n) { write(n); }
             main() { show(5); }",
        );
        let ops: Vec<Operator> = program.quads.iter().map(|q| q.operator).collect();
        assert_eq!(
            ops,
            vec![
                Operator::Goto,
                Operator::Write,
                Operator::EndFun,
                Operator::Era,
                Operator::Parameter,
                Operator::Gosub,
            ]
        );
        assert_eq!(program.quads[5].result, Operand::Imm(1));
    }

    #[test]
    fn test_argument_count_mismatch_from_source() {
        let err = compile_source(
            "program demo;
             void show(int n) { write(n); }
             main() { show(1, 2); }",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SourceError::Semantic(CompileError::ArgumentCountMismatch {
                expected: 1,
                got: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_pending_operator_does_not_reduce_into_call_arguments() {
        // a + f(b): the outer + must wait for the call to produce its
        // operand, not swallow a and b.
        let program = compile(
            "program demo;
             var int a, b, r;
             int f(int n) { return n; }
             main() { r = a + f(b); }",
        );
        let plus = program
            .quads
            .iter()
            .find(|q| q.operator == Operator::Plus)
            .unwrap();
        let gosub_pos = program
            .quads
            .iter()
            .position(|q| q.operator == Operator::Gosub)
            .unwrap();
        let plus_pos = program
            .quads
            .iter()
            .position(|q| q == plus)
            .unwrap();
        assert!(plus_pos > gosub_pos);
    }

    #[test]
    fn test_array_declaration_allocates_a_block() {
        let program = compile(
            "program demo;
             var int grid[2][3];
             var int after;
             main() { after = 0; }",
        );
        // grid occupies 6 slots starting at 1000; the next int lands at 1006
        let assign = program
            .quads
            .iter()
            .find(|q| q.operator == Operator::Assign)
            .unwrap();
        assert_eq!(assign.result, Operand::Address(1_006));
    }

    #[test]
    fn test_duplicate_variable_is_rejected() {
        let err = compile_source(
            "program demo;
             var int x;
             var float x;
             main() { }",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SourceError::Semantic(CompileError::DuplicateVariable { .. })
        ));
    }

    #[test]
    fn test_return_outside_function_is_rejected() {
        let err = compile_source(
            "program demo;
             main() { return 1; }",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SourceError::Semantic(CompileError::ReturnOutsideFunction)
        ));
    }

    #[test]
    fn test_array_dimension_past_u32_is_rejected() {
        // 2^32 would wrap to 0 under a plain cast
        let err = compile_source(
            "program demo;
             var int m[4294967296];
             main() { }",
        )
        .unwrap_err();
        match err {
            SourceError::Parse(ParserError::Syntax { message, .. }) => {
                assert!(message.contains("too large"), "{}", message);
            }
            other => panic!("expected a syntax error, got {}", other),
        }
    }

    #[test]
    fn test_array_size_product_overflow_is_rejected() {
        // 100000 * 100000 exceeds u32; must fail, not wrap
        let err = compile_source(
            "program demo;
             var int m[100000][100000];
             main() { }",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SourceError::Semantic(CompileError::OutOfMemory { .. })
        ));
    }

    #[test]
    fn test_trailing_tokens_after_main_are_rejected() {
        let err = compile_source(
            "program demo;
             main() { } extra",
        )
        .unwrap_err();
        assert!(matches!(err, SourceError::Parse(ParserError::Syntax { .. })));
    }
}
