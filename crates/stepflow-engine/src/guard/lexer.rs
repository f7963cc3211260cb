//! Lexer: tokenizes guard expressions.

use super::GuardError;

/// A token produced by the lexer
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The raw text of the token (unescaped contents for strings)
    pub text: String,
    /// Character offset of the token (0-based)
    pub pos: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, pos: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            pos,
        }
    }
}

/// Token types
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    // Keywords
    And,
    Or,
    Not,
    In,
    True,
    False,
    Null,

    // Identifiers and literals
    Identifier,
    String,
    Integer,
    Float,

    // Operators
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    // Structural
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,

    // End of input
    Eof,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::And => write!(f, "'and'"),
            Self::Or => write!(f, "'or'"),
            Self::Not => write!(f, "'not'"),
            Self::In => write!(f, "'in'"),
            Self::True => write!(f, "true"),
            Self::False => write!(f, "false"),
            Self::Null => write!(f, "null"),
            Self::Identifier => write!(f, "identifier"),
            Self::String => write!(f, "string literal"),
            Self::Integer | Self::Float => write!(f, "number"),
            Self::Eq => write!(f, "'=='"),
            Self::NotEq => write!(f, "'!='"),
            Self::Lt => write!(f, "'<'"),
            Self::LtEq => write!(f, "'<='"),
            Self::Gt => write!(f, "'>'"),
            Self::GtEq => write!(f, "'>='"),
            Self::Plus => write!(f, "'+'"),
            Self::Minus => write!(f, "'-'"),
            Self::Star => write!(f, "'*'"),
            Self::Slash => write!(f, "'/'"),
            Self::Percent => write!(f, "'%'"),
            Self::Dot => write!(f, "'.'"),
            Self::Comma => write!(f, "','"),
            Self::LParen => write!(f, "'('"),
            Self::RParen => write!(f, "')'"),
            Self::LBracket => write!(f, "'['"),
            Self::RBracket => write!(f, "']'"),
            Self::Eof => write!(f, "end of input"),
        }
    }
}

/// Lexer for guard expressions
pub struct Lexer {
    input: Vec<char>,
    pos: usize,
}

impl Lexer {
    /// Create a new lexer from input text
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(&mut self) -> Result<Vec<Token>, GuardError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();

            if self.pos >= self.input.len() {
                tokens.push(Token::new(TokenKind::Eof, "", self.pos));
                break;
            }

            let token = self.next_token()?;
            tokens.push(token);
        }

        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token, GuardError> {
        let ch = self.input[self.pos];
        let start = self.pos;

        let two = |lexer: &mut Self, kind: TokenKind, text: &str| -> Result<Token, GuardError> {
            lexer.pos += 2;
            Ok(Token::new(kind, text, start))
        };
        let one = |lexer: &mut Self, kind: TokenKind| -> Result<Token, GuardError> {
            lexer.pos += 1;
            Ok(Token::new(kind, ch.to_string(), start))
        };

        match ch {
            '=' if self.peek_at(1) == Some('=') => two(self, TokenKind::Eq, "=="),
            '!' if self.peek_at(1) == Some('=') => two(self, TokenKind::NotEq, "!="),
            '<' if self.peek_at(1) == Some('=') => two(self, TokenKind::LtEq, "<="),
            '>' if self.peek_at(1) == Some('=') => two(self, TokenKind::GtEq, ">="),
            '<' => one(self, TokenKind::Lt),
            '>' => one(self, TokenKind::Gt),
            '+' => one(self, TokenKind::Plus),
            '-' => one(self, TokenKind::Minus),
            '*' => one(self, TokenKind::Star),
            '/' => one(self, TokenKind::Slash),
            '%' => one(self, TokenKind::Percent),
            '.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.read_number(),
            '.' => one(self, TokenKind::Dot),
            ',' => one(self, TokenKind::Comma),
            '(' => one(self, TokenKind::LParen),
            ')' => one(self, TokenKind::RParen),
            '[' => one(self, TokenKind::LBracket),
            ']' => one(self, TokenKind::RBracket),
            '"' | '\'' => self.read_string(ch),
            c if c.is_ascii_digit() => self.read_number(),
            c if c.is_alphabetic() || c == '_' => Ok(self.read_identifier_or_keyword()),
            _ => Err(GuardError::Syntax {
                pos: start,
                message: format!("unexpected character '{}'", ch),
            }),
        }
    }

    fn read_string(&mut self, quote: char) -> Result<Token, GuardError> {
        let start = self.pos;
        self.pos += 1; // skip opening quote

        let mut text = String::new();
        loop {
            let Some(c) = self.input.get(self.pos).copied() else {
                return Err(GuardError::Syntax {
                    pos: start,
                    message: "unterminated string literal".into(),
                });
            };
            self.pos += 1;
            if c == quote {
                break;
            }
            if c == '\\' {
                let escaped = self.input.get(self.pos).copied().ok_or(GuardError::Syntax {
                    pos: start,
                    message: "unterminated string literal".into(),
                })?;
                self.pos += 1;
                text.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => other,
                });
            } else {
                text.push(c);
            }
        }

        Ok(Token::new(TokenKind::String, text, start))
    }

    fn read_number(&mut self) -> Result<Token, GuardError> {
        let start = self.pos;
        let mut text = String::new();
        let mut is_float = false;

        while let Some(c) = self.input.get(self.pos).copied() {
            if c.is_ascii_digit() || c == '_' {
                if c != '_' {
                    text.push(c);
                }
            } else if c == '.' && !is_float && self.peek_at(1) != Some('.') {
                is_float = true;
                text.push(c);
            } else if (c == 'e' || c == 'E') && !text.is_empty() {
                is_float = true;
                text.push(c);
                if let Some(sign @ ('+' | '-')) = self.peek_at(1) {
                    self.pos += 1;
                    text.push(sign);
                }
            } else {
                break;
            }
            self.pos += 1;
        }

        let kind = if is_float {
            text.parse::<f64>().map_err(|_| GuardError::Syntax {
                pos: start,
                message: format!("invalid number '{}'", text),
            })?;
            TokenKind::Float
        } else {
            text.parse::<i64>().map_err(|_| GuardError::Syntax {
                pos: start,
                message: format!("integer '{}' out of range", text),
            })?;
            TokenKind::Integer
        };

        Ok(Token::new(kind, text, start))
    }

    fn read_identifier_or_keyword(&mut self) -> Token {
        let start = self.pos;
        let mut text = String::new();

        while let Some(c) = self.input.get(self.pos).copied() {
            if c.is_alphanumeric() || c == '_' {
                text.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }

        let kind = match text.as_str() {
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "in" => TokenKind::In,
            "true" | "True" => TokenKind::True,
            "false" | "False" => TokenKind::False,
            "null" | "None" => TokenKind::Null,
            _ => TokenKind::Identifier,
        };

        Token::new(kind, text, start)
    }

    fn skip_whitespace(&mut self) {
        while self
            .input
            .get(self.pos)
            .is_some_and(|c| c.is_whitespace())
        {
            self.pos += 1;
        }
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_comparison_tokens() {
        assert_eq!(
            kinds("state.x >= 5"),
            vec![
                TokenKind::Identifier,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::GtEq,
                TokenKind::Integer,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_and_capitalized_spellings() {
        assert_eq!(
            kinds("not True and None or false"),
            vec![
                TokenKind::Not,
                TokenKind::True,
                TokenKind::And,
                TokenKind::Null,
                TokenKind::Or,
                TokenKind::False,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_literals() {
        let tokens = Lexer::new(r#"'it''s' "a\"b\n""#).tokenize().unwrap();
        assert_eq!(tokens[0].text, "it");
        assert_eq!(tokens[1].text, "s");
        assert_eq!(tokens[2].kind, TokenKind::String);
        assert_eq!(tokens[2].text, "a\"b\n");
    }

    #[test]
    fn test_numbers() {
        let tokens = Lexer::new("42 3.5 .5 1e3 1_000").tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Integer);
        assert_eq!(tokens[1].kind, TokenKind::Float);
        assert_eq!(tokens[2].kind, TokenKind::Float);
        assert_eq!(tokens[2].text, ".5");
        assert_eq!(tokens[3].kind, TokenKind::Float);
        assert_eq!(tokens[4].text, "1000");
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("state.name == 'abc").tokenize().unwrap_err();
        assert!(err.to_string().contains("unterminated"));
    }

    #[test]
    fn test_unexpected_character() {
        let err = Lexer::new("state.x = 1").tokenize().unwrap_err();
        assert!(matches!(err, GuardError::Syntax { pos: 8, .. }));
    }
}
