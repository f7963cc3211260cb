//! Parser: recursive descent parser for guard expressions.
//!
//! Produces an [`Expr`] tree. The only name an expression may reference is
//! `state`; anything else is rejected here, before evaluation.

use serde_json::Value;

use super::lexer::{Lexer, Token, TokenKind};
use super::GuardError;

/// The single binding visible to guard expressions.
pub const STATE_BINDING: &str = "state";

/// Deepest nesting of brackets, calls and prefix operators.
pub const MAX_DEPTH: usize = 64;

/// Longest accepted expression, in tokens. Bounds the depth of left-leaning
/// operator chains, which the parser builds without recursing.
pub const MAX_TOKENS: usize = 256;

/// Guard expression tree
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal(Value),
    List(Vec<Expr>),
    /// The `state` binding.
    State,
    /// `target.name`
    Field(Box<Expr>, String),
    /// `target[index]`
    Index(Box<Expr>, Box<Expr>),
    /// `target.get(key[, default])`
    Get {
        target: Box<Expr>,
        key: Box<Expr>,
        default: Option<Box<Expr>>,
    },
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    /// Chained comparison: `a < b <= c` holds when every adjacent pair holds.
    Compare {
        first: Box<Expr>,
        rest: Vec<(CompareOp, Expr)>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    In,
    NotIn,
}

/// Parser for guard expressions
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    /// Parse guard text into an expression tree
    pub fn parse(input: &str) -> Result<Expr, GuardError> {
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize()?;
        // the trailing Eof token is not counted
        if let Some(tok) = tokens.get(MAX_TOKENS) {
            if tok.kind != TokenKind::Eof {
                return Err(GuardError::Syntax {
                    pos: tok.pos,
                    message: format!("expression too long (more than {} tokens)", MAX_TOKENS),
                });
            }
        }
        let mut parser = Self {
            tokens,
            pos: 0,
            depth: 0,
        };

        if parser.check(TokenKind::Eof) {
            return Err(GuardError::Syntax {
                pos: 0,
                message: "empty expression".into(),
            });
        }

        let expr = parser.parse_or()?;
        if !parser.check(TokenKind::Eof) {
            let tok = parser.peek();
            return Err(GuardError::Syntax {
                pos: tok.pos,
                message: format!("unexpected '{}' after expression", tok.text),
            });
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr, GuardError> {
        let mut left = self.parse_and()?;
        while self.check(TokenKind::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, GuardError> {
        let mut left = self.parse_not()?;
        while self.check(TokenKind::And) {
            self.advance();
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, GuardError> {
        if self.check(TokenKind::Not) {
            self.advance();
            let operand = self.nested(Self::parse_not)?;
            return Ok(Expr::Not(Box::new(operand)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, GuardError> {
        let first = self.parse_additive()?;
        let mut rest = Vec::new();

        loop {
            let op = match self.peek_kind() {
                TokenKind::Eq => CompareOp::Eq,
                TokenKind::NotEq => CompareOp::NotEq,
                TokenKind::Lt => CompareOp::Lt,
                TokenKind::LtEq => CompareOp::LtEq,
                TokenKind::Gt => CompareOp::Gt,
                TokenKind::GtEq => CompareOp::GtEq,
                TokenKind::In => CompareOp::In,
                TokenKind::Not if self.peek_kind_at(1) == TokenKind::In => {
                    self.advance();
                    CompareOp::NotIn
                }
                _ => break,
            };
            self.advance();
            rest.push((op, self.parse_additive()?));
        }

        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, GuardError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => ArithOp::Add,
                TokenKind::Minus => ArithOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = Expr::Arith(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, GuardError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => ArithOp::Mul,
                TokenKind::Slash => ArithOp::Div,
                TokenKind::Percent => ArithOp::Rem,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Arith(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, GuardError> {
        if self.check(TokenKind::Minus) {
            self.advance();
            let operand = self.nested(Self::parse_unary)?;
            return Ok(Expr::Neg(Box::new(operand)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, GuardError> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect(TokenKind::Identifier)?.text.clone();
                    if self.check(TokenKind::LParen) {
                        expr = self.parse_method_call(expr, &name)?;
                    } else {
                        expr = Expr::Field(Box::new(expr), name);
                    }
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.nested(Self::parse_or)?;
                    self.expect(TokenKind::RBracket)?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                TokenKind::LParen => {
                    let tok = self.peek();
                    return Err(GuardError::Syntax {
                        pos: tok.pos,
                        message: "only .get(...) may be called".into(),
                    });
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_method_call(&mut self, target: Expr, name: &str) -> Result<Expr, GuardError> {
        let open = self.expect(TokenKind::LParen)?.pos;
        if name != "get" {
            return Err(GuardError::Syntax {
                pos: open,
                message: format!("unsupported method '{}'; only .get(...) may be called", name),
            });
        }

        let key = self.nested(Self::parse_or)?;
        let default = if self.check(TokenKind::Comma) {
            self.advance();
            Some(Box::new(self.nested(Self::parse_or)?))
        } else {
            None
        };
        self.expect(TokenKind::RParen)?;

        Ok(Expr::Get {
            target: Box::new(target),
            key: Box::new(key),
            default,
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, GuardError> {
        let tok = self.advance().clone();
        match tok.kind {
            TokenKind::Integer => {
                let n: i64 = tok.text.parse().map_err(|_| GuardError::Syntax {
                    pos: tok.pos,
                    message: format!("invalid integer '{}'", tok.text),
                })?;
                Ok(Expr::Literal(Value::from(n)))
            }
            TokenKind::Float => {
                let n: f64 = tok.text.parse().map_err(|_| GuardError::Syntax {
                    pos: tok.pos,
                    message: format!("invalid number '{}'", tok.text),
                })?;
                Ok(Expr::Literal(Value::from(n)))
            }
            TokenKind::String => Ok(Expr::Literal(Value::String(tok.text))),
            TokenKind::True => Ok(Expr::Literal(Value::Bool(true))),
            TokenKind::False => Ok(Expr::Literal(Value::Bool(false))),
            TokenKind::Null => Ok(Expr::Literal(Value::Null)),
            TokenKind::Identifier if tok.text == STATE_BINDING => Ok(Expr::State),
            TokenKind::Identifier => Err(GuardError::UnknownName(tok.text)),
            TokenKind::LParen => {
                let inner = self.nested(Self::parse_or)?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                let mut items = Vec::new();
                if !self.check(TokenKind::RBracket) {
                    loop {
                        items.push(self.nested(Self::parse_or)?);
                        if !self.check(TokenKind::Comma) {
                            break;
                        }
                        self.advance();
                        // trailing comma
                        if self.check(TokenKind::RBracket) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBracket)?;
                Ok(Expr::List(items))
            }
            TokenKind::Eof => Err(GuardError::Syntax {
                pos: tok.pos,
                message: "unexpected end of input".into(),
            }),
            _ => Err(GuardError::Syntax {
                pos: tok.pos,
                message: format!("unexpected '{}'", tok.text),
            }),
        }
    }

    // ── Helpers ─────────────────────────────────────────────────

    /// Run `parse` one nesting level deeper, failing past [`MAX_DEPTH`].
    fn nested(
        &mut self,
        parse: fn(&mut Self) -> Result<Expr, GuardError>,
    ) -> Result<Expr, GuardError> {
        if self.depth >= MAX_DEPTH {
            return Err(GuardError::Syntax {
                pos: self.peek().pos,
                message: "expression nested too deeply".into(),
            });
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_kind_at(&self, offset: usize) -> TokenKind {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        self.tokens[idx].kind
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn advance(&mut self) -> &Token {
        let idx = self.pos.min(self.tokens.len() - 1);
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        &self.tokens[idx]
    }

    fn expect(&mut self, kind: TokenKind) -> Result<&Token, GuardError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let tok = self.peek();
            Err(GuardError::Syntax {
                pos: tok.pos,
                message: if tok.kind == TokenKind::Eof {
                    format!("expected {}, found end of input", kind)
                } else {
                    format!("expected {}, found '{}'", kind, tok.text)
                },
            })
        }
    }
}
