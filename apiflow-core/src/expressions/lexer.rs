use super::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Tok {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub tok: Tok,
    pub offset: usize,
}

pub(crate) fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

pub(crate) fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

pub(crate) fn tokenize(src: &str) -> Result<Vec<Token>, ExprError> {
    let mut out = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(i, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let two = |next: char| src[i + c.len_utf8()..].starts_with(next);

        let tok = match c {
            '.' => single(&mut chars, Tok::Dot),
            '[' => single(&mut chars, Tok::LBracket),
            ']' => single(&mut chars, Tok::RBracket),
            '(' => single(&mut chars, Tok::LParen),
            ')' => single(&mut chars, Tok::RParen),
            '=' if two('=') => double(&mut chars, Tok::Eq),
            '!' if two('=') => double(&mut chars, Tok::Ne),
            '!' => single(&mut chars, Tok::Not),
            '<' if two('=') => double(&mut chars, Tok::Le),
            '<' => single(&mut chars, Tok::Lt),
            '>' if two('=') => double(&mut chars, Tok::Ge),
            '>' => single(&mut chars, Tok::Gt),
            '&' if two('&') => double(&mut chars, Tok::And),
            '|' if two('|') => double(&mut chars, Tok::Or),
            '"' => lex_string(src, &mut chars, i)?,
            // Digits after a dot are a path segment, so `a.0.1` is two of them.
            c if c.is_ascii_digit() && matches!(out.last(), Some(Token { tok: Tok::Dot, .. })) => {
                lex_index(src, &mut chars, i)?
            }
            c if c.is_ascii_digit() => lex_number(src, &mut chars, i)?,
            '-' if src[i + 1..].starts_with(|d: char| d.is_ascii_digit()) => {
                lex_number(src, &mut chars, i)?
            }
            c if is_ident_start(c) => {
                let mut end = i;
                while let Some(&(j, d)) = chars.peek() {
                    if !is_ident_continue(d) {
                        break;
                    }
                    end = j + d.len_utf8();
                    chars.next();
                }
                Tok::Ident(src[i..end].to_string())
            }
            other => {
                return Err(ExprError::Parse {
                    offset: i,
                    message: format!("unexpected character {other:?}"),
                })
            }
        };
        out.push(Token { tok, offset: i });
    }

    out.push(Token {
        tok: Tok::Eof,
        offset: src.len(),
    });
    Ok(out)
}

type Chars<'a> = std::iter::Peekable<std::str::CharIndices<'a>>;

fn single(chars: &mut Chars<'_>, tok: Tok) -> Tok {
    chars.next();
    tok
}

fn double(chars: &mut Chars<'_>, tok: Tok) -> Tok {
    chars.next();
    chars.next();
    tok
}

fn lex_number(src: &str, chars: &mut Chars<'_>, start: usize) -> Result<Tok, ExprError> {
    let mut end = start;
    let mut seen_dot = false;
    let mut first = true;
    while let Some(&(j, d)) = chars.peek() {
        let accept = d.is_ascii_digit()
            || (first && d == '-')
            || (d == '.'
                && !seen_dot
                && src[j + 1..].starts_with(|n: char| n.is_ascii_digit()));
        if !accept {
            break;
        }
        seen_dot |= d == '.';
        first = false;
        end = j + 1;
        chars.next();
    }
    let text = &src[start..end];
    let bad = |e: String| ExprError::Parse {
        offset: start,
        message: format!("invalid number {text:?}: {e}"),
    };
    if seen_dot {
        text.parse::<f64>().map(Tok::Float).map_err(|e| bad(e.to_string()))
    } else {
        text.parse::<i64>().map(Tok::Int).map_err(|e| bad(e.to_string()))
    }
}

fn lex_index(src: &str, chars: &mut Chars<'_>, start: usize) -> Result<Tok, ExprError> {
    let mut end = start;
    while let Some(&(j, d)) = chars.peek() {
        if !d.is_ascii_digit() {
            break;
        }
        end = j + 1;
        chars.next();
    }
    let text = &src[start..end];
    text.parse::<i64>().map(Tok::Int).map_err(|e| ExprError::Parse {
        offset: start,
        message: format!("invalid path index {text:?}: {e}"),
    })
}

fn lex_string(src: &str, chars: &mut Chars<'_>, start: usize) -> Result<Tok, ExprError> {
    chars.next();
    let mut out = String::new();
    while let Some((j, c)) = chars.next() {
        match c {
            '"' => return Ok(Tok::Str(out)),
            '\\' => {
                let (_, esc) = chars.next().ok_or(ExprError::Parse {
                    offset: j,
                    message: "dangling escape".to_string(),
                })?;
                match esc {
                    '"' => out.push('"'),
                    '\\' => out.push('\\'),
                    '/' => out.push('/'),
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    other => {
                        return Err(ExprError::Parse {
                            offset: j,
                            message: format!("unknown escape \\{other}"),
                        })
                    }
                }
            }
            other => out.push(other),
        }
    }
    Err(ExprError::Parse {
        offset: start,
        message: format!("unterminated string {:?}", &src[start..]),
    })
}
