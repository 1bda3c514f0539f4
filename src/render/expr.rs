use super::compare::{compare_values, is_truthy};
use crate::log::{Error, INVALID_EXPRESSION};
use serde_json::{Number, Value};

/// The comparison operators recognized in expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    Greater,
    Lesser,
    GreaterOrEqual,
    LesserOrEqual,
}

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal value.
    Literal(Value),
    /// A dotted lookup path such as `item.name`.
    Path(Vec<String>),
    /// An array of expressions.
    Array(Vec<Expr>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(Operator, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Evaluate the expression against the given variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when a comparison is applied to incompatible
    /// operand types.
    pub fn eval(&self, lookup: &dyn Fn(&str) -> Option<Value>) -> Result<Value, Error> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Path(segments) => {
                let mut value = lookup(&segments[0]).unwrap_or(Value::Null);
                for key in &segments[1..] {
                    value = match value {
                        Value::Object(mut object) => {
                            object.remove(key.as_str()).unwrap_or(Value::Null)
                        }
                        _ => Value::Null,
                    };
                }
                Ok(value)
            }
            Expr::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(item.eval(lookup)?);
                }
                Ok(Value::Array(values))
            }
            Expr::Not(inner) => Ok(Value::Bool(!is_truthy(&inner.eval(lookup)?))),
            Expr::And(left, right) => {
                let result = is_truthy(&left.eval(lookup)?) && is_truthy(&right.eval(lookup)?);
                Ok(Value::Bool(result))
            }
            Expr::Or(left, right) => {
                let result = is_truthy(&left.eval(lookup)?) || is_truthy(&right.eval(lookup)?);
                Ok(Value::Bool(result))
            }
            Expr::Compare(operator, left, right) => {
                let left = left.eval(lookup)?;
                let right = right.eval(lookup)?;
                compare_values(&left, *operator, &right).map(Value::Bool)
            }
        }
    }
}

/// Parse expression code.
///
/// # Errors
///
/// Returns an [`Error`] pointing into the code when it is not a valid
/// expression.
pub fn parse_expression(code: &str) -> Result<Expr, Error> {
    let mut parser = Parser::new(code);
    let expr = parser.parse_or()?;
    parser.finish()?;
    Ok(expr)
}

/// Parse iteration code in the shape `name in expression`.
///
/// # Errors
///
/// Returns an [`Error`] when the loop variable or the `in` keyword is
/// missing, or the selection is not a valid expression.
pub fn parse_iteration(code: &str) -> Result<(String, Expr), Error> {
    let mut parser = Parser::new(code);
    parser.skip_whitespace();
    let name = match parser.identifier() {
        Some(name) => name,
        None => return Err(parser.error("expected a loop variable name")),
    };
    parser.skip_whitespace();
    if !parser.keyword("in") {
        return Err(parser.error("expected `in` after the loop variable"));
    }

    let expr = parser.parse_or()?;
    parser.finish()?;
    Ok((name, expr))
}

struct Parser<'code> {
    code: &'code str,
    offset: usize,
}

impl<'code> Parser<'code> {
    fn new(code: &'code str) -> Self {
        Self { code, offset: 0 }
    }

    fn rest(&self) -> &'code str {
        &self.code[self.offset..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) {
        if let Some(next) = self.peek() {
            self.offset += next.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn take(&mut self, expected: &str) -> bool {
        if self.rest().starts_with(expected) {
            self.offset += expected.len();
            return true;
        }
        false
    }

    /// Consume the given word when it appears at a word boundary.
    fn keyword(&mut self, word: &str) -> bool {
        if !self.rest().starts_with(word) {
            return false;
        }
        let boundary = self.rest()[word.len()..]
            .chars()
            .next()
            .map(|next| !unicode_ident::is_xid_continue(next))
            .unwrap_or(true);
        if boundary {
            self.offset += word.len();
            return true;
        }
        false
    }

    fn identifier(&mut self) -> Option<String> {
        let first = self.peek()?;
        if first != '_' && !unicode_ident::is_xid_start(first) {
            return None;
        }

        let mut name = String::new();
        name.push(first);
        self.bump();
        while let Some(next) = self.peek() {
            if !unicode_ident::is_xid_continue(next) {
                break;
            }
            name.push(next);
            self.bump();
        }
        Some(name)
    }

    fn error(&self, help: &str) -> Error {
        let end = self
            .rest()
            .char_indices()
            .nth(1)
            .map(|(index, _)| self.offset + index)
            .unwrap_or(self.code.len());
        let end = end.max(self.offset.min(self.code.len()));

        Error::build(INVALID_EXPRESSION)
            .pointer(self.code, self.offset.min(self.code.len())..end)
            .help(help.to_string())
    }

    fn finish(&mut self) -> Result<(), Error> {
        self.skip_whitespace();
        if self.offset < self.code.len() {
            return Err(self.error("unexpected trailing input"));
        }
        Ok(())
    }

    fn parse_or(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_and()?;
        loop {
            self.skip_whitespace();
            if self.keyword("or") {
                let right = self.parse_and()?;
                left = Expr::Or(Box::new(left), Box::new(right));
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_and(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_not()?;
        loop {
            self.skip_whitespace();
            if self.keyword("and") {
                let right = self.parse_not()?;
                left = Expr::And(Box::new(left), Box::new(right));
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_not(&mut self) -> Result<Expr, Error> {
        self.skip_whitespace();
        if self.take("!") || self.keyword("not") {
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, Error> {
        let left = self.parse_term()?;
        self.skip_whitespace();
        match self.operator() {
            Some(operator) => {
                let right = self.parse_term()?;
                Ok(Expr::Compare(operator, Box::new(left), Box::new(right)))
            }
            None => Ok(left),
        }
    }

    fn operator(&mut self) -> Option<Operator> {
        // Two character symbols are tried before their one character
        // prefixes.
        let symbols = [
            ("==", Operator::Equal),
            ("!=", Operator::NotEqual),
            ("<=", Operator::LesserOrEqual),
            (">=", Operator::GreaterOrEqual),
            ("<", Operator::Lesser),
            (">", Operator::Greater),
        ];
        for (symbol, operator) in symbols {
            if self.take(symbol) {
                return Some(operator);
            }
        }

        let words = [
            ("eq", Operator::Equal),
            ("ne", Operator::NotEqual),
            ("le", Operator::LesserOrEqual),
            ("ge", Operator::GreaterOrEqual),
            ("lt", Operator::Lesser),
            ("gt", Operator::Greater),
        ];
        for (word, operator) in words {
            if self.keyword(word) {
                return Some(operator);
            }
        }
        None
    }

    fn parse_term(&mut self) -> Result<Expr, Error> {
        self.skip_whitespace();
        match self.peek() {
            Some('[') => self.parse_array(),
            Some('\'') => self.parse_string('\''),
            Some('"') => self.parse_string('"'),
            Some(next) if next.is_ascii_digit() || next == '-' => self.parse_number(),
            Some(next) if next == '_' || unicode_ident::is_xid_start(next) => self.parse_path(),
            _ => Err(self.error("expected a value")),
        }
    }

    fn parse_array(&mut self) -> Result<Expr, Error> {
        self.bump();
        self.skip_whitespace();

        let mut items = vec![];
        if self.take("]") {
            return Ok(Expr::Array(items));
        }
        loop {
            items.push(self.parse_or()?);
            self.skip_whitespace();
            if self.take(",") {
                continue;
            }
            if self.take("]") {
                return Ok(Expr::Array(items));
            }
            return Err(self.error("expected `,` or `]` in array"));
        }
    }

    fn parse_string(&mut self, quote: char) -> Result<Expr, Error> {
        self.bump();
        let mut text = String::new();
        loop {
            match self.peek() {
                Some(next) if next == quote => {
                    self.bump();
                    return Ok(Expr::Literal(Value::String(text)));
                }
                Some(next) => {
                    text.push(next);
                    self.bump();
                }
                None => return Err(self.error("unterminated string literal")),
            }
        }
    }

    fn parse_number(&mut self) -> Result<Expr, Error> {
        let begin = self.offset;
        if self.peek() == Some('-') {
            self.bump();
        }
        let mut fractional = false;
        while let Some(next) = self.peek() {
            if next.is_ascii_digit() {
                self.bump();
            } else if next == '.' && !fractional {
                // Only a digit continues a fraction, so `1.name` is not
                // swallowed here.
                let digit_follows = self.rest()[1..]
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_digit());
                if !digit_follows {
                    break;
                }
                fractional = true;
                self.bump();
            } else {
                break;
            }
        }

        let literal = &self.code[begin..self.offset];
        if literal.is_empty() || literal == "-" {
            return Err(self.error("expected a number"));
        }
        if fractional {
            let parsed: f64 = literal
                .parse()
                .map_err(|_| self.error("expected a number"))?;
            let number = Number::from_f64(parsed).ok_or_else(|| self.error("expected a number"))?;
            Ok(Expr::Literal(Value::Number(number)))
        } else {
            let parsed: i64 = literal
                .parse()
                .map_err(|_| self.error("expected a number"))?;
            Ok(Expr::Literal(Value::Number(Number::from(parsed))))
        }
    }

    fn parse_path(&mut self) -> Result<Expr, Error> {
        let first = match self.identifier() {
            Some(first) => first,
            None => return Err(self.error("expected an identifier")),
        };
        match first.as_str() {
            "true" => return Ok(Expr::Literal(Value::Bool(true))),
            "false" => return Ok(Expr::Literal(Value::Bool(false))),
            "null" => return Ok(Expr::Literal(Value::Null)),
            _ => {}
        }

        let mut segments = vec![first];
        while self.take(".") {
            match self.identifier() {
                Some(segment) => segments.push(segment),
                None => return Err(self.error("expected an identifier after `.`")),
            }
        }
        Ok(Expr::Path(segments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(code: &str, lookup: &dyn Fn(&str) -> Option<Value>) -> Value {
        parse_expression(code).unwrap().eval(lookup).unwrap()
    }

    fn none(_: &str) -> Option<Value> {
        None
    }

    #[test]
    fn test_literals() {
        assert_eq!(eval("5", &none), json!(5));
        assert_eq!(eval("-3", &none), json!(-3));
        assert_eq!(eval("2.5", &none), json!(2.5));
        assert_eq!(eval("'text'", &none), json!("text"));
        assert_eq!(eval("true", &none), json!(true));
        assert_eq!(eval("null", &none), json!(null));
        assert_eq!(eval("[1, 2, 3]", &none), json!([1, 2, 3]));
    }

    #[test]
    fn test_path_lookup() {
        let lookup = |name: &str| {
            (name == "item").then(|| json!({"name": "left", "size": 2}))
        };

        assert_eq!(eval("item.name", &lookup), json!("left"));
        assert_eq!(eval("item.missing", &lookup), json!(null));
        assert_eq!(eval("missing.name", &lookup), json!(null));
    }

    #[test]
    fn test_comparisons() {
        let lookup = |name: &str| (name == "x").then(|| json!(6));

        assert_eq!(eval("x gt 5", &lookup), json!(true));
        assert_eq!(eval("x > 5", &lookup), json!(true));
        assert_eq!(eval("x le 5", &lookup), json!(false));
        assert_eq!(eval("x == 6", &lookup), json!(true));
        assert_eq!(eval("x ne 6", &lookup), json!(false));
    }

    #[test]
    fn test_boolean_operators() {
        let lookup = |name: &str| (name == "x").then(|| json!(6));

        assert_eq!(eval("x gt 5 and x lt 10", &lookup), json!(true));
        assert_eq!(eval("x gt 9 or x lt 7", &lookup), json!(true));
        assert_eq!(eval("not x gt 5", &lookup), json!(false));
        assert_eq!(eval("!false", &none), json!(true));
    }

    #[test]
    fn test_iteration() {
        let (name, expr) = parse_iteration("item in [1, 2]").unwrap();

        assert_eq!(name, "item");
        assert_eq!(expr.eval(&none).unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_iteration_missing_in() {
        let error = parse_iteration("item of items").unwrap_err();

        assert_eq!(error.get_reason(), INVALID_EXPRESSION);
    }

    #[test]
    fn test_trailing_input() {
        let error = parse_expression("5 5").unwrap_err();

        assert_eq!(error.get_reason(), INVALID_EXPRESSION);
    }

    #[test]
    fn test_keyword_prefix_identifier() {
        // `order` starts with `or` but is a plain identifier.
        let lookup = |name: &str| (name == "order").then(|| json!("asc"));

        assert_eq!(eval("order", &lookup), json!("asc"));
    }
}
