/// Tokens of the source language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Integer(i64),
    Float(f64),
    CharLit(char),
    True,
    False,

    // Keywords
    Program,
    Var,
    Int,
    FloatKw,
    Char,
    Bool,
    Void,
    Main,
    If,
    Else,
    While,
    For,
    To,
    Read,
    Write,
    Return,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Lt,
    Gt,
    EqEq,
    NotEq,
    AndAnd,
    OrOr,
    Assign,

    // Delimiters
    Semicolon,
    Comma,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    // Identifier
    Ident(String),
}

impl Token {
    /// Keyword lookup for a completed identifier-shaped lexeme.
    pub fn keyword(word: &str) -> Option<Token> {
        let token = match word {
            "program" => Token::Program,
            "var" => Token::Var,
            "int" => Token::Int,
            "float" => Token::FloatKw,
            "char" => Token::Char,
            "bool" => Token::Bool,
            "void" => Token::Void,
            "main" => Token::Main,
            "if" => Token::If,
            "else" => Token::Else,
            "while" => Token::While,
            "for" => Token::For,
            "to" => Token::To,
            "read" => Token::Read,
            "write" => Token::Write,
            "return" => Token::Return,
            "true" => Token::True,
            "false" => Token::False,
            _ => return None,
        };
        Some(token)
    }

    /// Human-readable name for error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Integer(n) => format!("integer literal {}", n),
            Token::Float(x) => format!("float literal {}", x),
            Token::CharLit(c) => format!("char literal '{}'", c),
            Token::True => "'true'".to_string(),
            Token::False => "'false'".to_string(),
            Token::Program => "'program'".to_string(),
            Token::Var => "'var'".to_string(),
            Token::Int => "'int'".to_string(),
            Token::FloatKw => "'float'".to_string(),
            Token::Char => "'char'".to_string(),
            Token::Bool => "'bool'".to_string(),
            Token::Void => "'void'".to_string(),
            Token::Main => "'main'".to_string(),
            Token::If => "'if'".to_string(),
            Token::Else => "'else'".to_string(),
            Token::While => "'while'".to_string(),
            Token::For => "'for'".to_string(),
            Token::To => "'to'".to_string(),
            Token::Read => "'read'".to_string(),
            Token::Write => "'write'".to_string(),
            Token::Return => "'return'".to_string(),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::Lt => "'<'".to_string(),
            Token::Gt => "'>'".to_string(),
            Token::EqEq => "'=='".to_string(),
            Token::NotEq => "'!='".to_string(),
            Token::AndAnd => "'&&'".to_string(),
            Token::OrOr => "'||'".to_string(),
            Token::Assign => "'='".to_string(),
            Token::Semicolon => "';'".to_string(),
            Token::Comma => "','".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::LBrace => "'{'".to_string(),
            Token::RBrace => "'}'".to_string(),
            Token::LBracket => "'['".to_string(),
            Token::RBracket => "']'".to_string(),
            Token::Ident(name) => format!("identifier '{}'", name),
        }
    }
}
