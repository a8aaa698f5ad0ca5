use crate::frontend::token::Token;

#[derive(Debug, Clone, Copy)]
pub struct Span {
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub span: Span,
}

#[derive(Debug)]
pub struct LexerError {
    pub message: String,
    pub line: usize,
    pub col: usize,
}

impl std::fmt::Display for LexerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.col, self.message)
    }
}

impl std::error::Error for LexerError {}

pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current();
        if ch == Some('\n') {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        self.pos += 1;
        ch
    }

    fn span(&self) -> Span {
        Span {
            line: self.line,
            col: self.col,
        }
    }

    fn error(&self, message: String) -> LexerError {
        LexerError {
            message,
            line: self.line,
            col: self.col,
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.current() {
                Some(' ' | '\t' | '\r' | '\n') => {
                    self.advance();
                }
                // line comment
                Some('/') if self.peek() == Some('/') => {
                    while let Some(ch) = self.current() {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn read_number(&mut self) -> Result<Token, LexerError> {
        let mut digits = String::new();
        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        // a '.' followed by a digit makes this a float literal
        if self.current() == Some('.') && self.peek().is_some_and(|c| c.is_ascii_digit()) {
            digits.push('.');
            self.advance();
            while let Some(ch) = self.current() {
                if ch.is_ascii_digit() {
                    digits.push(ch);
                    self.advance();
                } else {
                    break;
                }
            }
            let value = digits
                .parse::<f64>()
                .map_err(|_| self.error(format!("malformed float literal: {}", digits)))?;
            return Ok(Token::Float(value));
        }
        let value = digits
            .parse::<i64>()
            .map_err(|_| self.error(format!("integer literal out of range: {}", digits)))?;
        Ok(Token::Integer(value))
    }

    fn read_char_literal(&mut self) -> Result<Token, LexerError> {
        self.advance(); // opening quote
        let ch = match self.current() {
            Some('\\') => {
                self.advance();
                let escaped = match self.current() {
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some('\\') => '\\',
                    Some('\'') => '\'',
                    Some('0') => '\0',
                    Some(other) => {
                        return Err(self.error(format!("unknown escape sequence: \\{}", other)));
                    }
                    None => return Err(self.error("unterminated char literal".to_string())),
                };
                self.advance();
                escaped
            }
            Some('\'') => return Err(self.error("empty char literal".to_string())),
            Some(ch) => {
                self.advance();
                ch
            }
            None => return Err(self.error("unterminated char literal".to_string())),
        };
        match self.current() {
            Some('\'') => {
                self.advance();
                Ok(Token::CharLit(ch))
            }
            _ => Err(self.error("unterminated char literal".to_string())),
        }
    }

    fn read_word(&mut self) -> Token {
        let mut word = String::new();
        while let Some(ch) = self.current() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                word.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        Token::keyword(&word).unwrap_or(Token::Ident(word))
    }

    fn read_symbol(&mut self) -> Result<Token, LexerError> {
        let ch = match self.current() {
            Some(ch) => ch,
            None => return Err(self.error("unexpected end of input".to_string())),
        };
        let token = match ch {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '<' => Token::Lt,
            '>' => Token::Gt,
            ';' => Token::Semicolon,
            ',' => Token::Comma,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '=' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Token::EqEq
                } else {
                    Token::Assign
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Token::NotEq
                } else {
                    return Err(self.error("expected '=' after '!'".to_string()));
                }
            }
            '&' => {
                if self.peek() == Some('&') {
                    self.advance();
                    Token::AndAnd
                } else {
                    return Err(self.error("expected '&' after '&'".to_string()));
                }
            }
            '|' => {
                if self.peek() == Some('|') {
                    self.advance();
                    Token::OrOr
                } else {
                    return Err(self.error("expected '|' after '|'".to_string()));
                }
            }
            other => return Err(self.error(format!("unexpected character: {:?}", other))),
        };
        self.advance();
        Ok(token)
    }

    pub fn tokenize(mut self) -> Result<Vec<Spanned>, LexerError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let Some(ch) = self.current() else {
                break;
            };
            let span = self.span();
            let token = if ch.is_ascii_digit() {
                self.read_number()?
            } else if ch == '\'' {
                self.read_char_literal()?
            } else if ch.is_ascii_alphabetic() || ch == '_' {
                self.read_word()
            } else {
                self.read_symbol()?
            };
            tokens.push(Spanned { token, span });
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            tokens("program demo; var int x;"),
            vec![
                Token::Program,
                Token::Ident("demo".to_string()),
                Token::Semicolon,
                Token::Var,
                Token::Int,
                Token::Ident("x".to_string()),
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn test_numeric_literals() {
        assert_eq!(
            tokens("42 3.5 7"),
            vec![Token::Integer(42), Token::Float(3.5), Token::Integer(7)]
        );
    }

    #[test]
    fn test_integer_then_dot_is_not_a_float() {
        // "1." with no following digit stays an integer; the dot is a lex
        // error on its own.
        let err = Lexer::new("1.").tokenize().unwrap_err();
        assert!(err.message.contains("unexpected character"));
    }

    #[test]
    fn test_char_literals_and_escapes() {
        assert_eq!(
            tokens(r"'a' '\n' '\\'"),
            vec![
                Token::CharLit('a'),
                Token::CharLit('\n'),
                Token::CharLit('\\'),
            ]
        );
    }

    #[test]
    fn test_unterminated_char_literal() {
        let err = Lexer::new("'a").tokenize().unwrap_err();
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn test_two_char_operators() {
        assert_eq!(
            tokens("== != && || = < >"),
            vec![
                Token::EqEq,
                Token::NotEq,
                Token::AndAnd,
                Token::OrOr,
                Token::Assign,
                Token::Lt,
                Token::Gt,
            ]
        );
    }

    #[test]
    fn test_lone_ampersand_is_an_error() {
        let err = Lexer::new("a & b").tokenize().unwrap_err();
        assert!(err.message.contains("expected '&'"));
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            tokens("x = 1; // trailing words\ny"),
            vec![
                Token::Ident("x".to_string()),
                Token::Assign,
                Token::Integer(1),
                Token::Semicolon,
                Token::Ident("y".to_string()),
            ]
        );
    }

    #[test]
    fn test_spans_track_lines_and_columns() {
        let spanned = Lexer::new("x\n  y").tokenize().unwrap();
        assert_eq!(spanned[0].span.line, 1);
        assert_eq!(spanned[0].span.col, 1);
        assert_eq!(spanned[1].span.line, 2);
        assert_eq!(spanned[1].span.col, 3);
    }

    #[test]
    fn test_true_false_are_keywords() {
        assert_eq!(tokens("true false"), vec![Token::True, Token::False]);
    }
}
