//! Expression classification and keyword-name sanitization.
//!
//! Only plain access chains can be lifted out of an f-string into a keyword
//! argument: a name followed by any mix of `.attr`, `["key"]` and `[0]`.
//! Everything else (calls, operators, conditionals, computed subscripts)
//! is complex and disqualifies the interpolation.

/// Python keywords that cannot be used as keyword-argument names
const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Attr(String),
    Key(String),
    Index(String),
}

/// A parsed `name(.attr | ["key"] | [0])*` expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessChain {
    pub base: String,
    pub accesses: Vec<Access>,
}

impl AccessChain {
    /// Parse an expression as an access chain; `None` when it is anything else.
    pub fn parse(expr: &str) -> Option<Self> {
        let mut lexer = Lexer::new(expr);
        lexer.skip_ws();
        let base = lexer.identifier()?;
        if is_keyword(&base) {
            return None;
        }

        let mut accesses = Vec::new();
        loop {
            lexer.skip_ws();
            match lexer.peek() {
                None => break,
                Some('.') => {
                    lexer.bump();
                    lexer.skip_ws();
                    let attr = lexer.identifier()?;
                    if is_keyword(&attr) {
                        return None;
                    }
                    accesses.push(Access::Attr(attr));
                }
                Some('[') => {
                    lexer.bump();
                    lexer.skip_ws();
                    let access = match lexer.peek()? {
                        '\'' | '"' => Access::Key(lexer.string_literal()?),
                        c if c.is_ascii_digit() => Access::Index(lexer.digits()?),
                        _ => return None,
                    };
                    lexer.skip_ws();
                    if lexer.bump()? != ']' {
                        return None;
                    }
                    accesses.push(access);
                }
                Some(_) => return None,
            }
        }

        Some(Self { base, accesses })
    }

    /// Keyword-argument name for this chain, if it forms a valid identifier.
    pub fn sanitized(&self) -> Option<String> {
        let mut name = self.base.clone();
        for access in &self.accesses {
            name.push('_');
            match access {
                Access::Attr(s) | Access::Key(s) | Access::Index(s) => name.push_str(s),
            }
        }
        if is_identifier(&name) && !is_keyword(&name) {
            Some(name)
        } else {
            None
        }
    }
}

/// Whether `expr` must not be turned into a keyword argument.
pub fn is_complex(expr: &str) -> bool {
    AccessChain::parse(expr).is_none()
}

/// Convert an access chain into an identifier: `user.data['score']` -> `user_data_score`.
///
/// Returns `None` when the expression is complex or the result would not be
/// a valid identifier (e.g. a key containing spaces); callers treat that as
/// complex.
pub fn sanitize(expr: &str) -> Option<String> {
    AccessChain::parse(expr)?.sanitized()
}

pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_alphanumeric())
}

pub fn is_keyword(name: &str) -> bool {
    PYTHON_KEYWORDS.contains(&name)
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        self.chars.next()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn identifier(&mut self) -> Option<String> {
        let first = self.peek()?;
        if !(first == '_' || first.is_alphabetic()) {
            return None;
        }
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if c == '_' || c.is_alphanumeric() {
                ident.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Some(ident)
    }

    fn digits(&mut self) -> Option<String> {
        let mut digits = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                digits.push(c);
                self.bump();
            } else {
                break;
            }
        }
        (!digits.is_empty()).then_some(digits)
    }

    /// Unprefixed single-line string literal without escapes
    fn string_literal(&mut self) -> Option<String> {
        let quote = self.bump()?;
        let mut value = String::new();
        loop {
            match self.bump()? {
                c if c == quote => return Some(value),
                '\\' | '\n' => return None,
                c => value.push(c),
            }
        }
    }
}
