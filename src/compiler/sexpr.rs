//! Reader for the S-expression unit source notation.

use std::fmt;

/// Deepest list nesting a unit source may use
pub const MAX_NESTING: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Symbol(String),
    Str(String),
    Int(i64),
    List(Vec<Node>),
}

/// A value with its 1-based line and 0-based column
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub value: Value,
    pub line: usize,
    pub column: usize,
}

impl Node {
    pub fn as_list(&self) -> Option<&[Node]> {
        match &self.value {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match &self.value {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match &self.value {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Head symbol of a list form, e.g. `rule` in `(rule ...)`
    pub fn head(&self) -> Option<&str> {
        self.as_list()?.first()?.as_symbol()
    }

    /// Arguments of a list form after the head
    pub fn args(&self) -> &[Node] {
        match self.as_list() {
            Some([_, rest @ ..]) => rest,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

/// Read every top-level form in `text`
pub fn read_all(text: &str) -> Result<Vec<Node>, SyntaxError> {
    let mut cursor = Cursor::new(text);
    let mut forms = Vec::new();
    loop {
        cursor.skip_trivia();
        if cursor.peek().is_none() {
            return Ok(forms);
        }
        forms.push(cursor.node()?);
    }
}

struct Cursor<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
    depth: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
            line: 1,
            column: 0,
            depth: 0,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError {
            line: self.line,
            column: self.column,
            message: message.into(),
        }
    }

    /// Whitespace and `;` line comments
    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else if c == ';' {
                while let Some(c) = self.advance() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn node(&mut self) -> Result<Node, SyntaxError> {
        let (line, column) = (self.line, self.column);
        let value = match self.peek() {
            Some('(') => {
                if self.depth >= MAX_NESTING {
                    return Err(self.error(format!("nesting too deep, limit is {}", MAX_NESTING)));
                }
                self.advance();
                self.depth += 1;
                let mut items = Vec::new();
                loop {
                    self.skip_trivia();
                    match self.peek() {
                        Some(')') => {
                            self.advance();
                            break;
                        }
                        Some(_) => items.push(self.node()?),
                        None => return Err(self.error("unterminated list")),
                    }
                }
                self.depth -= 1;
                Value::List(items)
            }
            Some(')') => return Err(self.error("unexpected ')'")),
            Some('"') => {
                self.advance();
                Value::Str(self.string()?)
            }
            Some(_) => self.atom()?,
            None => return Err(self.error("unexpected end of input")),
        };
        Ok(Node {
            value,
            line,
            column,
        })
    }

    fn string(&mut self) -> Result<String, SyntaxError> {
        let mut out = String::new();
        loop {
            match self.advance() {
                Some('"') => return Ok(out),
                Some('\\') => {
                    let c = match self.advance() {
                        Some('n') => '\n',
                        Some('r') => '\r',
                        Some('t') => '\t',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some('u') => self.unicode_escape()?,
                        Some(other) => return Err(self.error(format!("unknown escape \\{}", other))),
                        None => return Err(self.error("unterminated string")),
                    };
                    out.push(c);
                }
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn unicode_escape(&mut self) -> Result<char, SyntaxError> {
        if self.advance() != Some('{') {
            return Err(self.error("expected '{' after \\u"));
        }
        let mut digits = String::new();
        loop {
            match self.advance() {
                Some('}') => break,
                Some(c) if c.is_ascii_hexdigit() => digits.push(c),
                _ => return Err(self.error("malformed unicode escape")),
            }
        }
        u32::from_str_radix(&digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error(format!("invalid code point {}", digits)))
    }

    fn atom(&mut self) -> Result<Value, SyntaxError> {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, '(' | ')' | '"' | ';') {
                break;
            }
            text.push(c);
            self.advance();
        }
        let numeric = text.strip_prefix('-').unwrap_or(&text);
        if !numeric.is_empty() && numeric.chars().all(|c| c.is_ascii_digit()) {
            return text
                .parse()
                .map(Value::Int)
                .map_err(|_| self.error(format!("integer out of range: {}", text)));
        }
        Ok(Value::Symbol(text))
    }
}
