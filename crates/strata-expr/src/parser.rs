//! Recursive descent parser producing the expression tree.
//!
//! Precedence, loosest first: assignment, `?:`, `||`, `&&`, equality, comparison,
//! additive, multiplicative, unary.

use crate::builtin::Builtin;
use crate::error::{Error, Result};
use crate::lexer::{tokenize, Spanned, Token};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Literal(Value),
    Variable(String),
    Assign(String, Box<Node>),
    Unary(UnaryOp, Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    Conditional(Box<Node>, Box<Node>, Box<Node>),
    Call(Builtin, Vec<Node>),
}

pub(crate) fn parse(source: &str) -> Result<Node> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let node = parser.assignment()?;
    match parser.tokens.get(parser.pos) {
        None => Ok(node),
        Some((token, position)) => Err(Error::UnexpectedToken {
            position: *position,
            found: token.describe(),
        }),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn next(&mut self) -> Result<Spanned> {
        let token = self.tokens.get(self.pos).cloned().ok_or(Error::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<()> {
        let (found, position) = self.next()?;
        if found == token {
            Ok(())
        } else {
            Err(Error::UnexpectedToken {
                position,
                found: found.describe(),
            })
        }
    }

    fn assignment(&mut self) -> Result<Node> {
        if let (Some((Token::Ident(name), _)), Some((Token::Assign, _))) =
            (self.tokens.get(self.pos), self.tokens.get(self.pos + 1))
        {
            let name = name.clone();
            self.pos += 2;
            let value = self.assignment()?;
            return Ok(Node::Assign(name, Box::new(value)));
        }
        self.conditional()
    }

    fn conditional(&mut self) -> Result<Node> {
        let cond = self.binary(0)?;
        if !self.eat(&Token::Question) {
            return Ok(cond);
        }
        let then = self.assignment()?;
        self.expect(Token::Colon)?;
        let otherwise = self.assignment()?;
        Ok(Node::Conditional(
            Box::new(cond),
            Box::new(then),
            Box::new(otherwise),
        ))
    }

    /// Binary operators by precedence level, loosest first.
    fn binary(&mut self, level: usize) -> Result<Node> {
        const LEVELS: usize = 6;
        if level == LEVELS {
            return self.unary();
        }
        let mut left = self.binary(level + 1)?;
        while let Some(op) = self.peek().and_then(|t| binary_op(t, level)) {
            self.pos += 1;
            let right = self.binary(level + 1)?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Node> {
        if self.eat(&Token::Minus) {
            return Ok(Node::Unary(UnaryOp::Neg, Box::new(self.unary()?)));
        }
        if self.eat(&Token::Not) {
            return Ok(Node::Unary(UnaryOp::Not, Box::new(self.unary()?)));
        }
        if self.eat(&Token::Plus) {
            return self.unary();
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Node> {
        let (token, position) = self.next()?;
        match token {
            Token::Int(i) => Ok(Node::Literal(Value::Int(i))),
            Token::Float(f) => Ok(Node::Literal(Value::Float(f))),
            Token::Str(s) => Ok(Node::Literal(Value::Str(s))),
            Token::LParen => {
                let inner = self.assignment()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(name) => {
                if self.eat(&Token::LParen) {
                    return self.call(name);
                }
                Ok(match name.to_ascii_lowercase().as_str() {
                    "true" => Node::Literal(Value::Bool(true)),
                    "false" => Node::Literal(Value::Bool(false)),
                    "null" => Node::Literal(Value::Null),
                    _ => Node::Variable(name),
                })
            }
            other => Err(Error::UnexpectedToken {
                position,
                found: other.describe(),
            }),
        }
    }

    fn call(&mut self, name: String) -> Result<Node> {
        let builtin = Builtin::lookup(&name).ok_or_else(|| Error::UnknownFunction(name.clone()))?;
        let mut args = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                args.push(self.assignment()?);
                if self.eat(&Token::Comma) {
                    continue;
                }
                self.expect(Token::RParen)?;
                break;
            }
        }
        builtin.check_arity(args.len())?;
        Ok(Node::Call(builtin, args))
    }
}

fn binary_op(token: &Token, level: usize) -> Option<BinaryOp> {
    let op = match (level, token) {
        (0, Token::Or) => BinaryOp::Or,
        (1, Token::And) => BinaryOp::And,
        (2, Token::Eq) => BinaryOp::Eq,
        (2, Token::Ne) => BinaryOp::Ne,
        (3, Token::Lt) => BinaryOp::Lt,
        (3, Token::Le) => BinaryOp::Le,
        (3, Token::Gt) => BinaryOp::Gt,
        (3, Token::Ge) => BinaryOp::Ge,
        (4, Token::Plus) => BinaryOp::Add,
        (4, Token::Minus) => BinaryOp::Sub,
        (5, Token::Star) => BinaryOp::Mul,
        (5, Token::Slash) => BinaryOp::Div,
        (5, Token::Percent) => BinaryOp::Rem,
        _ => return None,
    };
    Some(op)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(i: i64) -> Box<Node> {
        Box::new(Node::Literal(Value::Int(i)))
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            parse("1 + 2 * 3").unwrap(),
            Node::Binary(
                BinaryOp::Add,
                int(1),
                Box::new(Node::Binary(BinaryOp::Mul, int(2), int(3)))
            )
        );
        assert_eq!(
            parse("1 - 2 - 3").unwrap(),
            Node::Binary(
                BinaryOp::Sub,
                Box::new(Node::Binary(BinaryOp::Sub, int(1), int(2))),
                int(3)
            )
        );
    }

    #[test]
    fn test_assignment_and_conditional() {
        let node = parse("x = mute ? 1 : 0").unwrap();
        let Node::Assign(name, value) = node else {
            panic!("expected assignment");
        };
        assert_eq!(name, "x");
        assert!(matches!(*value, Node::Conditional(..)));
    }

    #[test]
    fn test_literals_are_case_insensitive() {
        assert_eq!(parse("TRUE").unwrap(), Node::Literal(Value::Bool(true)));
        assert_eq!(parse("Null").unwrap(), Node::Literal(Value::Null));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse("1 +"), Err(Error::UnexpectedEnd));
        assert!(matches!(parse("(1"), Err(Error::UnexpectedEnd)));
        assert!(matches!(
            parse("1 2"),
            Err(Error::UnexpectedToken { position: 2, .. })
        ));
        assert_eq!(
            parse("launch(1)"),
            Err(Error::UnknownFunction("launch".into()))
        );
        assert!(matches!(parse("max(1)"), Err(Error::Arity { .. })));
    }
}
