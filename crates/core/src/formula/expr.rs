//! Hand-rolled scanner and recursive-descent parser for the arithmetic
//! formula grammar.
//!
//! Supported tokens: numeric literals, `+ - * /`, parentheses, commas,
//! bracket-delimited variable references (`[level]`), and the built-in
//! functions `floor`, `ceil`, `round`, `min`, `max`. Anything else is a
//! syntax error: the grammar is closed, so a stored formula can never
//! smuggle in identifier resolution or code execution.

use std::collections::HashMap;

use super::FormulaError;

// ── Tokens ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Variable(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
}

/// Scan an expression into tokens, tracking byte positions for errors.
pub(crate) fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, FormulaError> {
    let mut tokens = Vec::new();
    let bytes: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' => {
                tokens.push((i, Token::Plus));
                i += 1;
            }
            '-' => {
                tokens.push((i, Token::Minus));
                i += 1;
            }
            '*' => {
                tokens.push((i, Token::Star));
                i += 1;
            }
            '/' => {
                tokens.push((i, Token::Slash));
                i += 1;
            }
            '(' => {
                tokens.push((i, Token::LParen));
                i += 1;
            }
            ')' => {
                tokens.push((i, Token::RParen));
                i += 1;
            }
            ',' => {
                tokens.push((i, Token::Comma));
                i += 1;
            }
            '[' => {
                let start = i;
                i += 1;
                let mut name = String::new();
                while i < bytes.len() && bytes[i] != ']' {
                    name.push(bytes[i]);
                    i += 1;
                }
                if i >= bytes.len() {
                    return Err(FormulaError::Syntax {
                        position: start,
                        detail: "unterminated variable reference".to_string(),
                    });
                }
                let name = name.trim().to_string();
                if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                {
                    return Err(FormulaError::Syntax {
                        position: start,
                        detail: format!("invalid variable name '[{name}]'"),
                    });
                }
                tokens.push((start, Token::Variable(name)));
                i += 1; // consume ']'
            }
            '0'..='9' | '.' => {
                let start = i;
                let mut literal = String::new();
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == '.') {
                    literal.push(bytes[i]);
                    i += 1;
                }
                let value: f64 = literal.parse().map_err(|_| FormulaError::Syntax {
                    position: start,
                    detail: format!("invalid number '{literal}'"),
                })?;
                tokens.push((start, Token::Number(value)));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                let mut ident = String::new();
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == '_') {
                    ident.push(bytes[i]);
                    i += 1;
                }
                tokens.push((start, Token::Ident(ident)));
            }
            other => {
                return Err(FormulaError::Syntax {
                    position: i,
                    detail: format!("unexpected character '{other}'"),
                })
            }
        }
    }

    Ok(tokens)
}

// ── AST ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Func {
    Floor,
    Ceil,
    Round,
    Min,
    Max,
}

impl Func {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "floor" => Some(Self::Floor),
            "ceil" => Some(Self::Ceil),
            "round" => Some(Self::Round),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Expr {
    Number(f64),
    Variable(String),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Call(Func, Vec<Expr>),
}

// ── Parser ───────────────────────────────────────────────────────────

/// Parse a token stream into an expression tree without evaluating it.
pub(crate) fn parse(tokens: &[(usize, Token)]) -> Result<Expr, FormulaError> {
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expression()?;
    if let Some((position, token)) = parser.peek_raw() {
        return Err(FormulaError::Syntax {
            position: *position,
            detail: format!("unexpected trailing token {token:?}"),
        });
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: &'a [(usize, Token)],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek_raw(&self) -> Option<&'a (usize, Token)> {
        self.tokens.get(self.pos)
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn advance(&mut self) -> Option<&'a (usize, Token)> {
        let t = self.tokens.get(self.pos);
        self.pos += 1;
        t
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), FormulaError> {
        match self.advance() {
            Some((_, t)) if t == expected => Ok(()),
            Some((position, t)) => Err(FormulaError::Syntax {
                position: *position,
                detail: format!("expected {what}, found {t:?}"),
            }),
            None => Err(FormulaError::Syntax {
                position: self.end_position(),
                detail: format!("expected {what}, found end of expression"),
            }),
        }
    }

    fn end_position(&self) -> usize {
        self.tokens.last().map(|(p, _)| p + 1).unwrap_or(0)
    }

    // expression := term (('+' | '-') term)*
    fn expression(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.term()?;
        while let Some(token) = self.peek() {
            match token {
                Token::Plus => {
                    self.advance();
                    left = Expr::Add(Box::new(left), Box::new(self.term()?));
                }
                Token::Minus => {
                    self.advance();
                    left = Expr::Sub(Box::new(left), Box::new(self.term()?));
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // term := unary (('*' | '/') unary)*
    fn term(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.unary()?;
        while let Some(token) = self.peek() {
            match token {
                Token::Star => {
                    self.advance();
                    left = Expr::Mul(Box::new(left), Box::new(self.unary()?));
                }
                Token::Slash => {
                    self.advance();
                    left = Expr::Div(Box::new(left), Box::new(self.unary()?));
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // unary := '-' unary | primary
    fn unary(&mut self) -> Result<Expr, FormulaError> {
        if let Some(Token::Minus) = self.peek() {
            self.advance();
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, FormulaError> {
        match self.advance() {
            Some((_, Token::Number(n))) => Ok(Expr::Number(*n)),
            Some((_, Token::Variable(name))) => Ok(Expr::Variable(name.clone())),
            Some((_, Token::LParen)) => {
                let inner = self.expression()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Some((position, Token::Ident(name))) => {
                let func = Func::from_name(name)
                    .ok_or_else(|| FormulaError::UnknownFunction(name.clone()))?;
                self.expect(&Token::LParen, "'(' after function name")?;
                let mut args = vec![self.expression()?];
                while let Some(Token::Comma) = self.peek() {
                    self.advance();
                    args.push(self.expression()?);
                }
                self.expect(&Token::RParen, "')'")?;
                check_arity(func, name, args.len(), *position)?;
                Ok(Expr::Call(func, args))
            }
            Some((position, token)) => Err(FormulaError::Syntax {
                position: *position,
                detail: format!("unexpected token {token:?}"),
            }),
            None => Err(FormulaError::Syntax {
                position: self.end_position(),
                detail: "unexpected end of expression".to_string(),
            }),
        }
    }
}

fn check_arity(func: Func, name: &str, got: usize, position: usize) -> Result<(), FormulaError> {
    let ok = match func {
        Func::Floor | Func::Ceil | Func::Round => got == 1,
        Func::Min | Func::Max => got >= 2,
    };
    if ok {
        Ok(())
    } else {
        Err(FormulaError::Syntax {
            position,
            detail: format!("wrong number of arguments for '{name}' ({got})"),
        })
    }
}

// ── Evaluation ───────────────────────────────────────────────────────

/// Evaluate a parsed expression. Undefined variables read as `0`.
pub(crate) fn eval(expr: &Expr, variables: &HashMap<String, f64>) -> Result<f64, FormulaError> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::Variable(name) => Ok(variables.get(name).copied().unwrap_or(0.0)),
        Expr::Neg(inner) => Ok(-eval(inner, variables)?),
        Expr::Add(l, r) => Ok(eval(l, variables)? + eval(r, variables)?),
        Expr::Sub(l, r) => Ok(eval(l, variables)? - eval(r, variables)?),
        Expr::Mul(l, r) => Ok(eval(l, variables)? * eval(r, variables)?),
        Expr::Div(l, r) => {
            let denominator = eval(r, variables)?;
            if denominator == 0.0 {
                return Err(FormulaError::DivisionByZero);
            }
            Ok(eval(l, variables)? / denominator)
        }
        Expr::Call(func, args) => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval(arg, variables)?);
            }
            Ok(match func {
                Func::Floor => values[0].floor(),
                Func::Ceil => values[0].ceil(),
                Func::Round => values[0].round(),
                Func::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
                Func::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            })
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn run(input: &str, vars: &[(&str, f64)]) -> Result<f64, FormulaError> {
        let vars: HashMap<String, f64> =
            vars.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        let tokens = tokenize(input)?;
        let expr = parse(&tokens)?;
        eval(&expr, &vars)
    }

    #[test]
    fn precedence_multiplication_before_addition() {
        assert_eq!(run("2 + 3 * 4", &[]).unwrap(), 14.0);
    }

    #[test]
    fn parentheses_override_precedence() {
        assert_eq!(run("(2 + 3) * 4", &[]).unwrap(), 20.0);
    }

    #[test]
    fn unary_minus() {
        assert_eq!(run("-5 + 2", &[]).unwrap(), -3.0);
        assert_eq!(run("2 * -3", &[]).unwrap(), -6.0);
    }

    #[test]
    fn variable_substitution() {
        assert_eq!(run("[level] * 2", &[("level", 10.0)]).unwrap(), 20.0);
    }

    #[test]
    fn undefined_variable_reads_zero() {
        assert_eq!(run("[missing] + 7", &[]).unwrap(), 7.0);
    }

    #[test]
    fn nested_function_calls() {
        assert_eq!(
            run("max(floor([v] / 10), min(3, 5))", &[("v", 87.0)]).unwrap(),
            8.0
        );
    }

    #[test]
    fn floor_ceil_round() {
        assert_eq!(run("floor(7.9)", &[]).unwrap(), 7.0);
        assert_eq!(run("ceil(7.1)", &[]).unwrap(), 8.0);
        assert_eq!(run("round(7.5)", &[]).unwrap(), 8.0);
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert_matches!(run("1 / 0", &[]), Err(FormulaError::DivisionByZero));
    }

    #[test]
    fn division_by_zero_variable() {
        assert_matches!(run("1 / [level]", &[]), Err(FormulaError::DivisionByZero));
    }

    #[test]
    fn unknown_function_rejected() {
        assert_matches!(run("system(1)", &[]), Err(FormulaError::UnknownFunction(_)));
    }

    #[test]
    fn stray_characters_rejected() {
        assert_matches!(run("[level]; 2", &[]), Err(FormulaError::Syntax { .. }));
        assert_matches!(run("\"id\"", &[]), Err(FormulaError::Syntax { .. }));
    }

    #[test]
    fn unterminated_variable_rejected() {
        assert_matches!(run("[level", &[]), Err(FormulaError::Syntax { .. }));
    }

    #[test]
    fn trailing_tokens_rejected() {
        assert_matches!(run("1 2", &[]), Err(FormulaError::Syntax { .. }));
    }

    #[test]
    fn wrong_arity_rejected() {
        assert_matches!(run("floor(1, 2)", &[]), Err(FormulaError::Syntax { .. }));
        assert_matches!(run("min(1)", &[]), Err(FormulaError::Syntax { .. }));
    }
}
