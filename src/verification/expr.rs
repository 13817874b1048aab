//! Closed-grammar arithmetic evaluator for equation answers.
//!
//! Grammar:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('+' | '-') unary | primary
//! primary := NUMBER | '(' expr ')'
//! NUMBER  := DIGITS ('.' DIGITS?)? | '.' DIGITS
//! ```
//!
//! There are no names, calls, or exponentiation; anything outside the grammar is
//! an [`ExprError`]. Evaluation is in `f64`.

use super::error::ExprError;

/// Maximum combined depth of parentheses and unary signs.
pub const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

/// Parses and evaluates `input`.
pub fn evaluate(input: &str) -> Result<f64, ExprError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ExprError::Empty);
    }

    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if parser.pos != tokens.len() {
        return Err(ExprError::UnexpectedToken {
            position: parser.pos,
        });
    }
    if !value.is_finite() {
        return Err(ExprError::NonFinite);
    }
    Ok(value)
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(offset, ch)) = chars.peek() {
        let token = match ch {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '0'..='9' | '.' => {
                let start = offset;
                let mut end = offset;
                while let Some(&(i, c)) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' {
                        end = i + c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                Token::Number(parse_number(&input[start..end])?)
            }
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '(' => Token::LParen,
            ')' => Token::RParen,
            other => {
                return Err(ExprError::UnexpectedChar { ch: other, offset });
            }
        };
        if !matches!(token, Token::Number(_)) {
            chars.next();
        }
        tokens.push(token);
    }

    Ok(tokens)
}

fn parse_number(literal: &str) -> Result<f64, ExprError> {
    let invalid = || ExprError::InvalidNumber {
        literal: literal.to_string(),
    };

    let dots = literal.matches('.').count();
    if dots > 1 || literal == "." {
        return Err(invalid());
    }
    // Integer literals with a leading zero ("07") are not valid source numbers.
    if dots == 0
        && literal.len() > 1
        && literal.starts_with('0')
        && literal.bytes().any(|b| b != b'0')
    {
        return Err(invalid());
    }

    literal.parse::<f64>().map_err(|_| invalid())
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn descend(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::TooDeep { max: MAX_DEPTH });
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<f64, ExprError> {
        let mut value = self.term()?;
        while let Some(op @ (Token::Plus | Token::Minus)) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == Token::Plus {
                value + rhs
            } else {
                value - rhs
            };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, ExprError> {
        let mut value = self.unary()?;
        while let Some(op @ (Token::Star | Token::Slash)) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            value = if op == Token::Star {
                value * rhs
            } else {
                if rhs == 0.0 {
                    return Err(ExprError::DivisionByZero);
                }
                value / rhs
            };
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<f64, ExprError> {
        match self.peek() {
            Some(Token::Plus) => {
                self.pos += 1;
                self.descend()?;
                let value = self.unary()?;
                self.depth -= 1;
                Ok(value)
            }
            Some(Token::Minus) => {
                self.pos += 1;
                self.descend()?;
                let value = self.unary()?;
                self.depth -= 1;
                Ok(-value)
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<f64, ExprError> {
        let position = self.pos;
        match self.advance() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::LParen) => {
                self.descend()?;
                let value = self.expr()?;
                match self.advance() {
                    Some(Token::RParen) => {
                        self.depth -= 1;
                        Ok(value)
                    }
                    Some(_) => Err(ExprError::UnexpectedToken {
                        position: self.pos - 1,
                    }),
                    None => Err(ExprError::UnexpectedEnd),
                }
            }
            Some(_) => Err(ExprError::UnexpectedToken { position }),
            None => Err(ExprError::UnexpectedEnd),
        }
    }
}
