//! Parser for the textual predicate language.
//!
//! Grammar (keywords are case-insensitive):
//!
//! ```text
//! or       := and (("OR" | "||") and)*
//! and      := unary (("AND" | "&&") unary)*
//! unary    := ("NOT" | "!") unary | primary
//! primary  := "(" or ")" | "TRUEPREDICATE" | "FALSEPREDICATE"
//!           | identifier operator ["[c]"] literal
//! operator := "==" | "=" | "!=" | "<>" | "<" | "<=" | ">" | ">="
//!           | "BEGINSWITH" | "ENDSWITH" | "CONTAINS" | "LIKE"
//! literal  := 'string' | "string" | integer | true | false | nil | null
//! ```
//!
//! The parser produces an unresolved [`Condition`]; column names are only
//! checked when the condition is compiled against a schema.
//!
//! Nesting is capped at [`MAX_DEPTH`]: both parentheses/`NOT` levels and the
//! height of the resulting condition tree. Compiling and evaluating a
//! condition recurse over the tree, so the cap bounds their stack use too.

use grantview_core::{EngineError, Result, Value};

/// Deepest nesting a predicate may have.
pub const MAX_DEPTH: usize = 256;

/// A condition together with the height of its tree.
type Parsed = (Condition, usize);

/// Comparison operators of the predicate language.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    BeginsWith,
    EndsWith,
    Contains,
    Like,
}

impl Operator {
    /// Returns true for the string-only operators.
    pub fn is_text(self) -> bool {
        matches!(
            self,
            Operator::BeginsWith | Operator::EndsWith | Operator::Contains | Operator::Like
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::BeginsWith => "BEGINSWITH",
            Operator::EndsWith => "ENDSWITH",
            Operator::Contains => "CONTAINS",
            Operator::Like => "LIKE",
        }
    }
}

/// A parsed, not yet schema-checked predicate.
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    /// TRUEPREDICATE / FALSEPREDICATE
    Const(bool),
    /// `column op literal`
    Compare {
        column: String,
        op: Operator,
        case_insensitive: bool,
        value: Value,
        /// Byte offset of the column name, for error reporting
        position: usize,
    },
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
}

/// Parses predicate text into a [`Condition`].
pub fn parse(input: &str) -> Result<Condition> {
    let mut parser = Parser::new(input);
    parser.skip_whitespace();
    if parser.at_end() {
        return Err(EngineError::parse("Expected a predicate", 0));
    }
    let (condition, _) = parser.parse_or()?;
    parser.skip_whitespace();
    if !parser.at_end() {
        return Err(EngineError::parse(
            format!("Unexpected input '{}'", parser.rest()),
            parser.pos,
        ));
    }
    Ok(condition)
}

/// Parser state.
struct Parser<'a> {
    input: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            depth: 0,
        }
    }

    fn too_deep(&self) -> EngineError {
        EngineError::parse("Predicate nested too deeply", self.pos)
    }

    /// Runs `parse` one nesting level down.
    fn nested(&mut self, parse: impl FnOnce(&mut Self) -> Result<Parsed>) -> Result<Parsed> {
        if self.depth >= MAX_DEPTH {
            return Err(self.too_deep());
        }
        self.depth += 1;
        let parsed = parse(self);
        self.depth -= 1;
        parsed
    }

    /// Joins two operands, rejecting trees taller than [`MAX_DEPTH`].
    fn join(
        &self,
        (left, left_height): Parsed,
        (right, right_height): Parsed,
        combine: fn(Box<Condition>, Box<Condition>) -> Condition,
    ) -> Result<Parsed> {
        let height = left_height.max(right_height) + 1;
        if height > MAX_DEPTH {
            return Err(self.too_deep());
        }
        Ok((combine(Box::new(left), Box::new(right)), height))
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        self.skip_whitespace();
        match self.peek() {
            Some(c) if c == expected => {
                self.advance();
                Ok(())
            }
            Some(c) => Err(EngineError::parse(
                format!("Expected '{}', found '{}'", expected, c),
                self.pos,
            )),
            None => Err(EngineError::parse(
                format!("Expected '{}', found end of input", expected),
                self.pos,
            )),
        }
    }

    /// Consumes `symbol` if the input continues with it.
    fn eat_symbol(&mut self, symbol: &str) -> bool {
        self.skip_whitespace();
        if self.rest().starts_with(symbol) {
            self.pos += symbol.len();
            true
        } else {
            false
        }
    }

    /// Consumes `keyword` (ignoring case) if it appears as a whole word.
    fn eat_keyword(&mut self, keyword: &str) -> bool {
        self.skip_whitespace();
        let end = self.pos + keyword.len();
        let matches = self
            .input
            .get(self.pos..end)
            .map_or(false, |word| word.eq_ignore_ascii_case(keyword));
        if !matches {
            return false;
        }
        let boundary = self.input[end..]
            .chars()
            .next()
            .map_or(true, |c| !is_identifier_char(c));
        if boundary {
            self.pos = end;
        }
        boundary
    }

    fn parse_or(&mut self) -> Result<Parsed> {
        let mut left = self.parse_and()?;
        while self.eat_symbol("||") || self.eat_keyword("OR") {
            let right = self.parse_and()?;
            left = self.join(left, right, Condition::Or)?;
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Parsed> {
        let mut left = self.parse_unary()?;
        while self.eat_symbol("&&") || self.eat_keyword("AND") {
            let right = self.parse_unary()?;
            left = self.join(left, right, Condition::And)?;
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Parsed> {
        let negated = if self.eat_keyword("NOT") {
            true
        } else {
            self.skip_whitespace();
            let bang = self.rest().starts_with('!') && !self.rest().starts_with("!=");
            if bang {
                self.advance();
            }
            bang
        };
        if !negated {
            return self.parse_primary();
        }
        let (inner, height) = self.nested(Self::parse_unary)?;
        if height >= MAX_DEPTH {
            return Err(self.too_deep());
        }
        Ok((Condition::Not(Box::new(inner)), height + 1))
    }

    fn parse_primary(&mut self) -> Result<Parsed> {
        if self.eat_symbol("(") {
            let inner = self.nested(Self::parse_or)?;
            self.expect(')')?;
            return Ok(inner);
        }
        if self.eat_keyword("TRUEPREDICATE") {
            return Ok((Condition::Const(true), 1));
        }
        if self.eat_keyword("FALSEPREDICATE") {
            return Ok((Condition::Const(false), 1));
        }

        let position = self.pos;
        let column = self.parse_identifier()?;
        let op = self.parse_operator()?;
        let case_insensitive = self.parse_modifier()?;
        let value = self.parse_literal()?;
        let condition = Condition::Compare {
            column,
            op,
            case_insensitive,
            value,
            position,
        };
        Ok((condition, 1))
    }

    fn parse_identifier(&mut self) -> Result<String> {
        self.skip_whitespace();
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_alphabetic() || c == '_' => self.advance(),
            Some(c) => {
                return Err(EngineError::parse(
                    format!("Expected a column name, found '{}'", c),
                    start,
                ))
            }
            None => {
                return Err(EngineError::parse(
                    "Expected a column name, found end of input",
                    start,
                ))
            }
        }
        while let Some(c) = self.peek() {
            if is_identifier_char(c) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn parse_operator(&mut self) -> Result<Operator> {
        // Longest symbols first so "<=" is not read as "<".
        const SYMBOLS: [(&str, Operator); 8] = [
            ("==", Operator::Eq),
            ("!=", Operator::Ne),
            ("<>", Operator::Ne),
            ("<=", Operator::Le),
            (">=", Operator::Ge),
            ("=", Operator::Eq),
            ("<", Operator::Lt),
            (">", Operator::Gt),
        ];
        const KEYWORDS: [(&str, Operator); 4] = [
            ("BEGINSWITH", Operator::BeginsWith),
            ("ENDSWITH", Operator::EndsWith),
            ("CONTAINS", Operator::Contains),
            ("LIKE", Operator::Like),
        ];

        for (symbol, op) in SYMBOLS {
            if self.eat_symbol(symbol) {
                return Ok(op);
            }
        }
        for (keyword, op) in KEYWORDS {
            if self.eat_keyword(keyword) {
                return Ok(op);
            }
        }
        Err(EngineError::parse("Expected a comparison operator", self.pos))
    }

    /// Parses an optional `[c]` case-insensitivity modifier.
    fn parse_modifier(&mut self) -> Result<bool> {
        if !self.eat_symbol("[") {
            return Ok(false);
        }
        self.skip_whitespace();
        match self.peek() {
            Some('c') | Some('C') => self.advance(),
            _ => return Err(EngineError::parse("Unknown operator modifier", self.pos)),
        }
        self.expect(']')?;
        Ok(true)
    }

    fn parse_literal(&mut self) -> Result<Value> {
        self.skip_whitespace();
        match self.peek() {
            Some(quote @ ('\'' | '"')) => self.parse_string_literal(quote).map(Value::String),
            Some(c) if c.is_ascii_digit() || c == '-' => self.parse_integer(),
            Some(_) => {
                if self.eat_keyword("true") {
                    Ok(Value::Boolean(true))
                } else if self.eat_keyword("false") {
                    Ok(Value::Boolean(false))
                } else if self.eat_keyword("nil") || self.eat_keyword("null") {
                    Ok(Value::Null)
                } else {
                    Err(EngineError::parse("Expected a literal value", self.pos))
                }
            }
            None => Err(EngineError::parse(
                "Expected a literal value, found end of input",
                self.pos,
            )),
        }
    }

    fn parse_integer(&mut self) -> Result<Value> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.advance();
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }
        let text = &self.input[start..self.pos];
        text.parse::<i64>()
            .map(Value::Int64)
            .map_err(|_| EngineError::parse(format!("Invalid integer '{}'", text), start))
    }

    fn parse_string_literal(&mut self, quote: char) -> Result<String> {
        let start = self.pos;
        self.advance();
        let mut result = String::new();
        loop {
            match self.peek() {
                Some(c) if c == quote => {
                    self.advance();
                    return Ok(result);
                }
                Some('\\') => {
                    self.advance();
                    match self.peek() {
                        Some('n') => result.push('\n'),
                        Some('t') => result.push('\t'),
                        Some(c) => result.push(c),
                        None => break,
                    }
                    self.advance();
                }
                Some(c) => {
                    result.push(c);
                    self.advance();
                }
                None => break,
            }
        }
        Err(EngineError::parse("Unterminated string literal", start))
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
