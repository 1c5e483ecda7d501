use super::lexer::{tokenize, Tok, Token};
use super::value::Value;
use super::ExprError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

impl CmpOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::In => "in",
            CmpOp::NotIn => "notin",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    pub root: String,
    pub segments: Vec<PathSegment>,
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.root)?;
        for seg in &self.segments {
            match seg {
                PathSegment::Key(k) => write!(f, ".{k}")?,
                PathSegment::Index(i) => write!(f, "[{i}]")?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Path(Path),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        op: CmpOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

pub(crate) fn parse(src: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(src)?;
    let mut p = Parser { tokens, pos: 0 };
    let expr = p.parse_or()?;
    match p.peek() {
        Tok::Eof => Ok(expr),
        other => Err(p.error(format!("unexpected trailing {other:?}"))),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        // tokenize always ends with Eof, and the parser never advances past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)].tok
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].offset
    }

    fn advance(&mut self) -> Tok {
        let tok = self.peek().clone();
        if tok != Tok::Eof {
            self.pos += 1;
        }
        tok
    }

    fn error(&self, message: String) -> ExprError {
        ExprError::Parse {
            offset: self.offset(),
            message,
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_and()?;
        while *self.peek() == Tok::Or {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_cmp()?;
        while *self.peek() == Tok::And {
            self.advance();
            let rhs = self.parse_cmp()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// Comparisons do not chain: `a < b < c` is rejected.
    fn parse_cmp(&mut self) -> Result<Expr, ExprError> {
        let lhs = self.parse_unary()?;
        let Some(op) = self.cmp_op() else {
            return Ok(lhs);
        };
        self.advance();
        let rhs = self.parse_unary()?;
        if self.cmp_op().is_some() {
            return Err(self.error("comparison operators cannot be chained".to_string()));
        }
        Ok(Expr::Compare {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn cmp_op(&self) -> Option<CmpOp> {
        Some(match self.peek() {
            Tok::Eq => CmpOp::Eq,
            Tok::Ne => CmpOp::Ne,
            Tok::Lt => CmpOp::Lt,
            Tok::Le => CmpOp::Le,
            Tok::Gt => CmpOp::Gt,
            Tok::Ge => CmpOp::Ge,
            Tok::Ident(w) if w == "in" => CmpOp::In,
            Tok::Ident(w) if w == "notin" => CmpOp::NotIn,
            _ => return None,
        })
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if *self.peek() == Tok::Not {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        let at = self.offset();
        match self.advance() {
            Tok::Int(n) => Ok(Expr::Literal(Value::Int(n))),
            Tok::Float(f) => Ok(Expr::Literal(Value::Float(f))),
            Tok::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Tok::LParen => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Tok::RParen => Ok(inner),
                    other => Err(self.error(format!("expected ')', found {other:?}"))),
                }
            }
            Tok::Ident(word) => match word.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                "in" | "notin" => Err(ExprError::Parse {
                    offset: at,
                    message: format!("operator `{word}` needs a left operand"),
                }),
                _ => self.parse_path(word).map(Expr::Path),
            },
            Tok::Eof => Err(ExprError::Parse {
                offset: at,
                message: "unexpected end of expression".to_string(),
            }),
            other => Err(ExprError::Parse {
                offset: at,
                message: format!("unexpected {other:?}"),
            }),
        }
    }

    fn parse_path(&mut self, root: String) -> Result<Path, ExprError> {
        let mut segments = Vec::new();
        loop {
            match self.peek() {
                Tok::Dot => {
                    self.advance();
                    match self.advance() {
                        Tok::Ident(name) => segments.push(PathSegment::Key(name)),
                        Tok::Int(n) if n >= 0 => segments.push(PathSegment::Key(n.to_string())),
                        other => {
                            return Err(self.error(format!("expected name after '.', found {other:?}")))
                        }
                    }
                }
                Tok::LBracket => {
                    self.advance();
                    let idx = match self.advance() {
                        Tok::Int(n) if n >= 0 => n as usize,
                        other => {
                            return Err(self.error(format!(
                                "expected non-negative integer index, found {other:?}"
                            )))
                        }
                    };
                    match self.advance() {
                        Tok::RBracket => segments.push(PathSegment::Index(idx)),
                        other => return Err(self.error(format!("expected ']', found {other:?}"))),
                    }
                }
                _ => return Ok(Path { root, segments }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_and_binds_tighter_than_or() {
        let e = parse("a || b && c").unwrap();
        assert!(matches!(e, Expr::Or(_, rhs) if matches!(*rhs, Expr::And(_, _))));
    }

    #[test]
    fn path_with_indexes() {
        let e = parse("response.body.items[2].name").unwrap();
        let Expr::Path(p) = e else { panic!("not a path") };
        assert_eq!(p.to_string(), "response.body.items[2].name");
    }

    #[test]
    fn membership_operators() {
        assert!(matches!(
            parse("x notin list").unwrap(),
            Expr::Compare { op: CmpOp::NotIn, .. }
        ));
    }

    #[test]
    fn malformed_inputs() {
        for src in ["", "a ==", "(a", "a b", "a[1", "a[x]", "a < b < c", "in x", "a."] {
            assert!(
                matches!(parse(src), Err(ExprError::Parse { .. })),
                "expected parse error for {src:?}"
            );
        }
    }
}
