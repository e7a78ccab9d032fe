use std::{iter::Peekable, vec::IntoIter};

use serde_json::Value;

use crate::{
    env::{Env, FunctionSignature},
    errors::JqError,
    query::{BinaryOp, Expr},
    token::{Token, TokenType},
};

use TokenType::*;

const EOQ_TOKEN: Token = Token {
    kind: Eoq,
    span: (0, 0),
};

type Tokens = Peekable<IntoIter<Token>>;

const PRECEDENCE_LOWEST: u8 = 1;
const PRECEDENCE_ALTERNATIVE: u8 = 2;
const PRECEDENCE_COMMA: u8 = 3;
const PRECEDENCE_LOGICAL_OR: u8 = 4;
const PRECEDENCE_LOGICAL_AND: u8 = 5;
const PRECEDENCE_RELATIONAL: u8 = 6;
const PRECEDENCE_SUM: u8 = 7;
const PRECEDENCE_PRODUCT: u8 = 8;

/// A recursive-descent parser for jq programs.
///
/// Built-in filter calls are validated against the parser's [`Env`]
/// while parsing, so an unknown name or a bad argument count is a
/// compile error rather than a surprise at evaluation time.
pub struct Parser {
    env: Env,
}

impl Parser {
    pub fn new(env: Env) -> Self {
        Parser { env }
    }

    pub fn parse(&self, tokens: Vec<Token>) -> Result<Expr, JqError> {
        let mut it = tokens.into_iter().peekable();
        let expr = self.parse_expression(&mut it, PRECEDENCE_LOWEST)?;

        // the grammar must consume every token up to end-of-query
        match it.next() {
            Some(Token { kind: Eoq, .. }) | None => Ok(expr),
            Some(token) => Err(JqError::syntax(
                format!("expected end of query, found {}", token.kind),
                token.span.0,
            )),
        }
    }

    fn parse_expression(&self, it: &mut Tokens, precedence: u8) -> Result<Expr, JqError> {
        let mut left = self.parse_postfix(it)?;

        loop {
            let peeked = self.precedence(&it.peek().unwrap_or(&EOQ_TOKEN).kind);
            if peeked < precedence {
                break;
            }
            left = self.parse_infix_expression(it, left)?;
        }

        Ok(left)
    }

    fn parse_infix_expression(&self, it: &mut Tokens, left: Expr) -> Result<Expr, JqError> {
        let token = it.next().unwrap();
        let precedence = self.precedence(&token.kind);
        // parse the right operand one level up for left associativity
        let right = self.parse_expression(it, precedence + 1)?;

        let op = match token.kind {
            Pipe => {
                return Ok(Expr::Pipe {
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            Comma => {
                return Ok(Expr::Comma {
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            DoubleSlash => {
                return Ok(Expr::Alternative {
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            Or => BinaryOp::Or,
            And => BinaryOp::And,
            Eq => BinaryOp::Eq,
            Ne => BinaryOp::Ne,
            Lt => BinaryOp::Lt,
            Le => BinaryOp::Le,
            Gt => BinaryOp::Gt,
            Ge => BinaryOp::Ge,
            Plus => BinaryOp::Add,
            Minus => BinaryOp::Sub,
            Star => BinaryOp::Mul,
            Slash => BinaryOp::Div,
            Percent => BinaryOp::Mod,
            kind => {
                return Err(JqError::syntax(
                    format!("unexpected infix operator {}", kind),
                    token.span.0,
                ))
            }
        };

        Ok(Expr::Op {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    /// A term followed by any number of access suffixes (`.key`,
    /// `.[...]`, `[...]`) and `?` postfixes.
    fn parse_postfix(&self, it: &mut Tokens) -> Result<Expr, JqError> {
        let mut expr = self.parse_term(it)?;

        loop {
            match it.peek().unwrap_or(&EOQ_TOKEN).kind {
                Dot => {
                    let dot = it.next().unwrap();
                    let access = match it.peek().unwrap_or(&EOQ_TOKEN) {
                        Token {
                            kind: Ident { value },
                            ..
                        } => {
                            let name = value.to_string();
                            it.next();
                            Expr::Key { name }
                        }
                        Token {
                            kind: Str { value },
                            span,
                        } => {
                            let name = unescape_string(value, span.0)?;
                            it.next();
                            Expr::Key { name }
                        }
                        Token { kind: LBracket, .. } => self.parse_bracket_access(it)?,
                        token => {
                            return Err(JqError::syntax(
                                format!("expected a field name after '.', found {}", token.kind),
                                dot.span.1,
                            ))
                        }
                    };
                    expr = chain(expr, access);
                }
                LBracket => {
                    let access = self.parse_bracket_access(it)?;
                    expr = chain(expr, access);
                }
                Question => {
                    it.next();
                    expr = Expr::Optional {
                        expr: Box::new(expr),
                    };
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_term(&self, it: &mut Tokens) -> Result<Expr, JqError> {
        match it.peek().unwrap_or(&EOQ_TOKEN) {
            Token { kind: Dot, .. } => {
                it.next();
                match it.peek().unwrap_or(&EOQ_TOKEN) {
                    Token {
                        kind: Ident { value },
                        ..
                    } => {
                        let name = value.to_string();
                        it.next();
                        Ok(Expr::Key { name })
                    }
                    Token {
                        kind: Str { value },
                        span,
                    } => {
                        let name = unescape_string(value, span.0)?;
                        it.next();
                        Ok(Expr::Key { name })
                    }
                    Token { kind: LBracket, .. } => self.parse_bracket_access(it),
                    _ => Ok(Expr::Identity),
                }
            }
            Token { kind: DotDot, .. } => {
                it.next();
                Ok(Expr::Recurse)
            }
            Token {
                kind: Number { value },
                span,
            } => {
                let value = parse_number(value, span.0)?;
                it.next();
                Ok(Expr::Literal { value })
            }
            Token {
                kind: Str { value },
                span,
            } => {
                let value = Value::String(unescape_string(value, span.0)?);
                it.next();
                Ok(Expr::Literal { value })
            }
            Token { kind: True, .. } => {
                it.next();
                Ok(Expr::Literal {
                    value: Value::Bool(true),
                })
            }
            Token { kind: False, .. } => {
                it.next();
                Ok(Expr::Literal {
                    value: Value::Bool(false),
                })
            }
            Token { kind: Null, .. } => {
                it.next();
                Ok(Expr::Literal { value: Value::Null })
            }
            Token {
                kind: Variable { name },
                ..
            } => {
                let name = name.to_string();
                it.next();
                Ok(Expr::Variable { name })
            }
            Token { kind: LParen, .. } => {
                let token = it.next().unwrap();
                let expr = self.parse_expression(it, PRECEDENCE_LOWEST)?;
                self.expect(it, RParen, "unbalanced parentheses", token.span.0)?;
                Ok(expr)
            }
            Token { kind: LBracket, .. } => {
                let token = it.next().unwrap();
                if it.peek().unwrap_or(&EOQ_TOKEN).kind == RBracket {
                    it.next();
                    Ok(Expr::Array { expr: None })
                } else {
                    let expr = self.parse_expression(it, PRECEDENCE_LOWEST)?;
                    self.expect(it, RBracket, "unclosed array construction", token.span.0)?;
                    Ok(Expr::Array {
                        expr: Some(Box::new(expr)),
                    })
                }
            }
            Token { kind: LBrace, .. } => self.parse_object(it),
            Token { kind: If, .. } => {
                it.next();
                self.parse_if(it)
            }
            Token { kind: Try, .. } => {
                it.next();
                let body = self.parse_expression(it, PRECEDENCE_LOGICAL_OR)?;
                let handler = if it.peek().unwrap_or(&EOQ_TOKEN).kind == Catch {
                    it.next();
                    Some(Box::new(self.parse_expression(it, PRECEDENCE_LOGICAL_OR)?))
                } else {
                    None
                };
                Ok(Expr::TryCatch {
                    body: Box::new(body),
                    handler,
                })
            }
            Token { kind: Not, .. } => {
                it.next();
                Ok(Expr::Call {
                    name: String::from("not"),
                    args: Vec::new(),
                })
            }
            Token {
                kind: Ident { value },
                span,
            } => {
                let name = value.to_string();
                let index = span.0;
                it.next();
                self.parse_call(it, name, index)
            }
            token => Err(JqError::syntax(
                format!("unexpected {}", token.kind),
                token.span.0,
            )),
        }
    }

    /// A bracketed access after a `.` or an expression: the iterator
    /// `[]`, an index list `[i, j]`, a slice `[lo:hi]`, or a quoted
    /// key `["key"]`.
    fn parse_bracket_access(&self, it: &mut Tokens) -> Result<Expr, JqError> {
        #[cfg(debug_assertions)]
        debug_assert!(
            matches!(it.peek(), Some(Token { kind: LBracket, .. })),
            "expected the start of a bracketed access"
        );

        let token = it.next().unwrap(); // LBracket

        match it.peek().unwrap_or(&EOQ_TOKEN) {
            Token { kind: RBracket, .. } => {
                it.next();
                Ok(Expr::Index {
                    indices: Vec::new(),
                })
            }
            Token {
                kind: Str { value },
                span,
            } => {
                let name = unescape_string(value, span.0)?;
                it.next();
                self.expect(it, RBracket, "unclosed bracketed access", token.span.0)?;
                Ok(Expr::Key { name })
            }
            Token { kind: Colon, .. } => {
                it.next();
                if it.peek().unwrap_or(&EOQ_TOKEN).kind == RBracket {
                    it.next();
                    Ok(Expr::Slice {
                        start: None,
                        end: None,
                    })
                } else {
                    let end = self.parse_signed_index(it)?;
                    self.expect(it, RBracket, "unclosed bracketed access", token.span.0)?;
                    Ok(Expr::Slice {
                        start: None,
                        end: Some(end),
                    })
                }
            }
            Token {
                kind: Number { .. } | Minus,
                ..
            } => {
                let first = self.parse_signed_index(it)?;
                match it.peek().unwrap_or(&EOQ_TOKEN) {
                    Token { kind: RBracket, .. } => {
                        it.next();
                        Ok(Expr::Index {
                            indices: vec![first],
                        })
                    }
                    Token { kind: Colon, .. } => {
                        it.next();
                        if it.peek().unwrap_or(&EOQ_TOKEN).kind == RBracket {
                            it.next();
                            Ok(Expr::Slice {
                                start: Some(first),
                                end: None,
                            })
                        } else {
                            let end = self.parse_signed_index(it)?;
                            self.expect(it, RBracket, "unclosed bracketed access", token.span.0)?;
                            Ok(Expr::Slice {
                                start: Some(first),
                                end: Some(end),
                            })
                        }
                    }
                    Token { kind: Comma, .. } => {
                        let mut indices = vec![first];
                        while it.peek().unwrap_or(&EOQ_TOKEN).kind == Comma {
                            it.next();
                            indices.push(self.parse_signed_index(it)?);
                        }
                        self.expect(it, RBracket, "unclosed bracketed access", token.span.0)?;
                        Ok(Expr::Index { indices })
                    }
                    t => Err(JqError::syntax(
                        format!("expected ',', ':' or ']', found {}", t.kind),
                        t.span.0,
                    )),
                }
            }
            Token { kind: Eoq, .. } => Err(JqError::syntax(
                String::from("unclosed bracketed access"),
                token.span.0,
            )),
            t => Err(JqError::syntax(
                format!("unexpected {} in bracketed access", t.kind),
                t.span.0,
            )),
        }
    }

    fn parse_signed_index(&self, it: &mut Tokens) -> Result<i64, JqError> {
        let negative = if it.peek().unwrap_or(&EOQ_TOKEN).kind == Minus {
            it.next();
            true
        } else {
            false
        };

        match it.peek().unwrap_or(&EOQ_TOKEN) {
            Token {
                kind: Number { value },
                span,
            } => {
                let index = value.parse::<i64>().map_err(|_| {
                    JqError::syntax(String::from("expected an integer index"), span.0)
                })?;
                it.next();
                Ok(if negative { -index } else { index })
            }
            t => Err(JqError::syntax(
                format!("expected an integer index, found {}", t.kind),
                t.span.0,
            )),
        }
    }

    fn parse_if(&self, it: &mut Tokens) -> Result<Expr, JqError> {
        let cond = self.parse_expression(it, PRECEDENCE_LOWEST)?;
        self.expect_keyword(it, Then, "expected 'then'")?;
        let then = self.parse_expression(it, PRECEDENCE_LOWEST)?;
        let alt = self.parse_else(it)?;
        Ok(Expr::If {
            cond: Box::new(cond),
            then: Box::new(then),
            alt: Box::new(alt),
        })
    }

    fn parse_else(&self, it: &mut Tokens) -> Result<Expr, JqError> {
        let token = it.next().unwrap_or(EOQ_TOKEN);
        match token.kind {
            // elif chains desugar to nested conditionals
            Elif => self.parse_if(it),
            Else => {
                let alt = self.parse_expression(it, PRECEDENCE_LOWEST)?;
                self.expect_keyword(it, End, "expected 'end'")?;
                Ok(alt)
            }
            kind => Err(JqError::syntax(
                format!("expected 'elif' or 'else', found {}", kind),
                token.span.0,
            )),
        }
    }

    fn parse_object(&self, it: &mut Tokens) -> Result<Expr, JqError> {
        let token = it.next().unwrap(); // LBrace
        let mut entries = Vec::new();

        if it.peek().unwrap_or(&EOQ_TOKEN).kind == RBrace {
            it.next();
            return Ok(Expr::Object { entries });
        }

        loop {
            entries.push(self.parse_object_entry(it)?);

            match it.next().unwrap_or(EOQ_TOKEN) {
                Token { kind: RBrace, .. } => break,
                Token { kind: Comma, .. } => continue,
                Token { kind: Eoq, .. } => {
                    return Err(JqError::syntax(
                        String::from("unclosed object construction"),
                        token.span.0,
                    ))
                }
                t => {
                    return Err(JqError::syntax(
                        format!("expected ',' or '}}', found {}", t.kind),
                        t.span.0,
                    ))
                }
            }
        }

        Ok(Expr::Object { entries })
    }

    fn parse_object_entry(&self, it: &mut Tokens) -> Result<(Expr, Option<Expr>), JqError> {
        match it.peek().unwrap_or(&EOQ_TOKEN) {
            Token {
                kind: Ident { value },
                ..
            } => {
                let name = value.to_string();
                it.next();
                if it.peek().unwrap_or(&EOQ_TOKEN).kind == Colon {
                    it.next();
                    let value = self.parse_expression(it, PRECEDENCE_LOGICAL_OR)?;
                    Ok((literal_key(name), Some(value)))
                } else {
                    // {foo} is shorthand for foo: .foo
                    Ok((literal_key(name), None))
                }
            }
            Token {
                kind: Str { value },
                span,
            } => {
                let name = unescape_string(value, span.0)?;
                it.next();
                self.expect_keyword(it, Colon, "expected ':'")?;
                let value = self.parse_expression(it, PRECEDENCE_LOGICAL_OR)?;
                Ok((literal_key(name), Some(value)))
            }
            Token {
                kind: Variable { name },
                ..
            } => {
                let name = name.to_string();
                it.next();
                // {$name} is shorthand for name: $name
                Ok((literal_key(name.clone()), Some(Expr::Variable { name })))
            }
            Token { kind: LParen, .. } => {
                let token = it.next().unwrap();
                let key = self.parse_expression(it, PRECEDENCE_LOWEST)?;
                self.expect(it, RParen, "unbalanced parentheses", token.span.0)?;
                self.expect_keyword(it, Colon, "expected ':'")?;
                let value = self.parse_expression(it, PRECEDENCE_LOGICAL_OR)?;
                Ok((key, Some(value)))
            }
            token => Err(JqError::syntax(
                format!("unexpected object key {}", token.kind),
                token.span.0,
            )),
        }
    }

    fn parse_call(&self, it: &mut Tokens, name: String, index: usize) -> Result<Expr, JqError> {
        let mut args = Vec::new();

        if it.peek().unwrap_or(&EOQ_TOKEN).kind == LParen {
            it.next();
            while it.peek().unwrap_or(&EOQ_TOKEN).kind != RParen {
                args.push(self.parse_expression(it, PRECEDENCE_LOWEST)?);
                match it.peek().unwrap_or(&EOQ_TOKEN) {
                    Token { kind: Semicolon, .. } => {
                        it.next();
                    }
                    Token { kind: RParen, .. } => break,
                    Token { kind: Eoq, .. } => {
                        return Err(JqError::syntax(
                            format!("unclosed arguments to {}()", name),
                            index,
                        ))
                    }
                    t => {
                        return Err(JqError::syntax(
                            format!("expected ';' or ')', found {}", t.kind),
                            t.span.0,
                        ))
                    }
                }
            }
            self.expect(it, RParen, "unbalanced parentheses", index)?;
        }

        match self.env.functions.get(name.as_str()) {
            None => Err(JqError::name(format!("unknown function '{}'", name), index)),
            Some(sig) if !sig.arity.contains(&args.len()) => {
                Err(JqError::typ(arity_error(&name, sig, args.len()), index))
            }
            Some(_) => Ok(Expr::Call { name, args }),
        }
    }

    fn expect(
        &self,
        it: &mut Tokens,
        kind: TokenType,
        msg: &str,
        index: usize,
    ) -> Result<Token, JqError> {
        match it.next().unwrap_or(EOQ_TOKEN) {
            token if token.kind == kind => Ok(token),
            Token { kind: Eoq, .. } => Err(JqError::syntax(String::from(msg), index)),
            token => Err(JqError::syntax(
                format!("{}, found {}", msg, token.kind),
                token.span.0,
            )),
        }
    }

    fn expect_keyword(&self, it: &mut Tokens, kind: TokenType, msg: &str) -> Result<(), JqError> {
        let token = it.next().unwrap_or(EOQ_TOKEN);
        if token.kind == kind {
            Ok(())
        } else {
            Err(JqError::syntax(
                format!("{}, found {}", msg, token.kind),
                token.span.0,
            ))
        }
    }

    fn precedence(&self, kind: &TokenType) -> u8 {
        match kind {
            Pipe => PRECEDENCE_LOWEST,
            DoubleSlash => PRECEDENCE_ALTERNATIVE,
            Comma => PRECEDENCE_COMMA,
            Or => PRECEDENCE_LOGICAL_OR,
            And => PRECEDENCE_LOGICAL_AND,
            Eq | Ne | Lt | Le | Gt | Ge => PRECEDENCE_RELATIONAL,
            Plus | Minus => PRECEDENCE_SUM,
            Star | Slash | Percent => PRECEDENCE_PRODUCT,
            _ => 0,
        }
    }
}

fn chain(expr: Expr, access: Expr) -> Expr {
    match expr {
        Expr::Identity => access,
        expr => Expr::Pipe {
            left: Box::new(expr),
            right: Box::new(access),
        },
    }
}

fn literal_key(name: String) -> Expr {
    Expr::Literal {
        value: Value::String(name),
    }
}

fn arity_error(name: &str, sig: &FunctionSignature, got: usize) -> String {
    let (min, max) = (*sig.arity.start(), *sig.arity.end());
    if min == max {
        match max {
            0 => format!("{}() takes no arguments but {} were given", name, got),
            1 => format!("{}() takes 1 argument but {} were given", name, got),
            n => format!("{}() takes {} arguments but {} were given", name, n, got),
        }
    } else {
        format!(
            "{}() takes at most {} argument but {} were given",
            name, max, got
        )
    }
}

fn parse_number(value: &str, index: usize) -> Result<Value, JqError> {
    // integers stay integers so results print the way jq prints them
    if value.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = value.parse::<i64>() {
            return Ok(Value::from(n));
        }
    }

    let f = value
        .parse::<f64>()
        .map_err(|_| JqError::syntax(String::from("invalid number literal"), index))?;
    Ok(serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number))
}

fn unescape_string(value: &str, token_index: usize) -> Result<String, JqError> {
    let chars = value.chars().collect::<Vec<char>>();
    let length = chars.len();
    let mut rv = String::new();
    let mut index: usize = 0;

    while index < length {
        let start_index = token_index + index; // for error reporting

        match chars[index] {
            '\\' => {
                if index + 1 >= length {
                    return Err(JqError::syntax(String::from("invalid escape"), start_index));
                }

                index += 1;

                match chars[index] {
                    '"' => rv.push('"'),
                    '\\' => rv.push('\\'),
                    '/' => rv.push('/'),
                    'b' => rv.push('\x08'),
                    'f' => rv.push('\x0C'),
                    'n' => rv.push('\n'),
                    'r' => rv.push('\r'),
                    't' => rv.push('\t'),
                    'u' => {
                        // expect four hex digits
                        if index + 4 >= length {
                            return Err(JqError::syntax(
                                String::from("invalid \\uXXXX escape"),
                                start_index,
                            ));
                        }

                        index += 1;

                        let digits = chars
                            .get(index..index + 4)
                            .unwrap()
                            .iter()
                            .collect::<String>();

                        let mut codepoint = u32::from_str_radix(&digits, 16).map_err(|_| {
                            JqError::syntax(String::from("invalid \\uXXXX escape"), start_index)
                        })?;

                        if index + 5 < length && chars[index + 4] == '\\' && chars[index + 5] == 'u'
                        {
                            // expect a surrogate pair
                            if index + 9 >= length {
                                return Err(JqError::syntax(
                                    String::from("invalid \\uXXXX escape"),
                                    start_index,
                                ));
                            }

                            let digits = &chars
                                .get(index + 6..index + 10)
                                .unwrap()
                                .iter()
                                .collect::<String>();

                            let low_surrogate = u32::from_str_radix(digits, 16).map_err(|_| {
                                JqError::syntax(String::from("invalid \\uXXXX escape"), start_index)
                            })?;

                            codepoint =
                                0x10000 + (((codepoint & 0x03FF) << 10) | (low_surrogate & 0x03FF));

                            index += 6;
                        }

                        let unescaped = char::from_u32(codepoint).ok_or_else(|| {
                            JqError::syntax(String::from("invalid \\uXXXX escape"), start_index)
                        })?;

                        rv.push(unescaped);
                        index += 3;
                    }
                    _ => {
                        return Err(JqError::syntax(String::from("invalid escape"), start_index));
                    }
                }
            }
            c => rv.push(c),
        }

        index += 1;
    }

    Ok(rv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use serde_json::json;

    fn parse(program: &str) -> Expr {
        Parser::new(Env::standard())
            .parse(lex(program).unwrap())
            .unwrap()
    }

    fn parse_err(program: &str) -> JqError {
        Parser::new(Env::standard())
            .parse(lex(program).unwrap())
            .unwrap_err()
    }

    fn key(name: &str) -> Expr {
        Expr::Key {
            name: name.to_string(),
        }
    }

    fn lit(value: Value) -> Expr {
        Expr::Literal { value }
    }

    fn pipe(left: Expr, right: Expr) -> Expr {
        Expr::Pipe {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn op(left: Expr, op_: BinaryOp, right: Expr) -> Expr {
        Expr::Op {
            left: Box::new(left),
            op: op_,
            right: Box::new(right),
        }
    }

    #[test]
    fn identity() {
        assert_eq!(parse("."), Expr::Identity);
    }

    #[test]
    fn recursive_descent() {
        assert_eq!(parse(".."), Expr::Recurse);
        assert_eq!(parse(".. | .name"), pipe(Expr::Recurse, key("name")));
    }

    #[test]
    fn shorthand_key() {
        assert_eq!(parse(".foo"), key("foo"));
    }

    #[test]
    fn quoted_key() {
        assert_eq!(parse(r#"."foo bar""#), key("foo bar"));
        assert_eq!(parse(r#".["foo bar"]"#), key("foo bar"));
    }

    #[test]
    fn chained_keys_become_pipes() {
        assert_eq!(parse(".user.name"), pipe(key("user"), key("name")));
    }

    #[test]
    fn optional_postfix() {
        assert_eq!(
            parse(".foo?"),
            Expr::Optional {
                expr: Box::new(key("foo"))
            }
        );
        assert_eq!(
            parse(".a?.b"),
            pipe(
                Expr::Optional {
                    expr: Box::new(key("a"))
                },
                key("b")
            )
        );
    }

    #[test]
    fn iterator_and_indexes() {
        assert_eq!(
            parse(".[]"),
            Expr::Index {
                indices: Vec::new()
            }
        );
        assert_eq!(parse(".[0]"), Expr::Index { indices: vec![0] });
        assert_eq!(parse(".[-1]"), Expr::Index { indices: vec![-1] });
        assert_eq!(
            parse(".[0, 2, -3]"),
            Expr::Index {
                indices: vec![0, 2, -3]
            }
        );
    }

    #[test]
    fn slices() {
        assert_eq!(
            parse(".[1:3]"),
            Expr::Slice {
                start: Some(1),
                end: Some(3)
            }
        );
        assert_eq!(
            parse(".[2:]"),
            Expr::Slice {
                start: Some(2),
                end: None
            }
        );
        assert_eq!(
            parse(".[:5]"),
            Expr::Slice {
                start: None,
                end: Some(5)
            }
        );
        assert_eq!(
            parse(".[:]"),
            Expr::Slice {
                start: None,
                end: None
            }
        );
        assert_eq!(
            parse(".[-2:]"),
            Expr::Slice {
                start: Some(-2),
                end: None
            }
        );
    }

    #[test]
    fn access_suffixes_chain() {
        assert_eq!(
            parse(".users[0].name"),
            pipe(
                pipe(key("users"), Expr::Index { indices: vec![0] }),
                key("name")
            )
        );
    }

    #[test]
    fn literals() {
        assert_eq!(parse("42"), lit(json!(42)));
        assert_eq!(parse("3.14"), lit(json!(3.14)));
        assert_eq!(parse("1e3"), lit(json!(1000.0)));
        assert_eq!(parse(r#""hello""#), lit(json!("hello")));
        assert_eq!(parse("true"), lit(json!(true)));
        assert_eq!(parse("false"), lit(json!(false)));
        assert_eq!(parse("null"), lit(json!(null)));
    }

    #[test]
    fn string_escapes() {
        assert_eq!(parse(r#""a\nb""#), lit(json!("a\nb")));
        assert_eq!(parse(r#""say \"hi\"""#), lit(json!("say \"hi\"")));
        assert_eq!(parse(r#""A""#), lit(json!("A")));
        assert_eq!(parse(r#""😀""#), lit(json!("\u{1F600}")));
    }

    #[test]
    fn variables() {
        assert_eq!(
            parse("$foo"),
            Expr::Variable {
                name: "foo".to_string()
            }
        );
    }

    #[test]
    fn array_construction() {
        assert_eq!(parse("[]"), Expr::Array { expr: None });
        assert_eq!(
            parse("[.foo, .bar]"),
            Expr::Array {
                expr: Some(Box::new(Expr::Comma {
                    left: Box::new(key("foo")),
                    right: Box::new(key("bar")),
                }))
            }
        );
    }

    #[test]
    fn object_construction() {
        assert_eq!(parse("{}"), Expr::Object { entries: vec![] });
        assert_eq!(
            parse("{name: .name, age: 30}"),
            Expr::Object {
                entries: vec![
                    (lit(json!("name")), Some(key("name"))),
                    (lit(json!("age")), Some(lit(json!(30)))),
                ]
            }
        );
    }

    #[test]
    fn object_shorthand_entries() {
        assert_eq!(
            parse("{foo}"),
            Expr::Object {
                entries: vec![(lit(json!("foo")), None)]
            }
        );
        assert_eq!(
            parse("{$name}"),
            Expr::Object {
                entries: vec![(
                    lit(json!("name")),
                    Some(Expr::Variable {
                        name: "name".to_string()
                    })
                )]
            }
        );
    }

    #[test]
    fn object_computed_and_quoted_keys() {
        assert_eq!(
            parse(r#"{(.k): 1, "two words": 2}"#),
            Expr::Object {
                entries: vec![
                    (key("k"), Some(lit(json!(1)))),
                    (lit(json!("two words")), Some(lit(json!(2)))),
                ]
            }
        );
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(
            parse("1 + 2 * 3"),
            op(
                lit(json!(1)),
                BinaryOp::Add,
                op(lit(json!(2)), BinaryOp::Mul, lit(json!(3)))
            )
        );
        assert_eq!(
            parse("(1 + 2) * 3"),
            op(
                op(lit(json!(1)), BinaryOp::Add, lit(json!(2))),
                BinaryOp::Mul,
                lit(json!(3))
            )
        );
    }

    #[test]
    fn left_associativity() {
        assert_eq!(
            parse("10 - 2 - 3"),
            op(
                op(lit(json!(10)), BinaryOp::Sub, lit(json!(2))),
                BinaryOp::Sub,
                lit(json!(3))
            )
        );
    }

    #[test]
    fn logical_precedence() {
        assert_eq!(
            parse("true and false or null"),
            op(
                op(lit(json!(true)), BinaryOp::And, lit(json!(false))),
                BinaryOp::Or,
                lit(json!(null))
            )
        );
    }

    #[test]
    fn comma_binds_tighter_than_pipe() {
        assert_eq!(
            parse(".a | .b, .c"),
            pipe(
                key("a"),
                Expr::Comma {
                    left: Box::new(key("b")),
                    right: Box::new(key("c")),
                }
            )
        );
    }

    #[test]
    fn alternative_spans_commas() {
        assert_eq!(
            parse(".a, .b // .c, .d"),
            Expr::Alternative {
                left: Box::new(Expr::Comma {
                    left: Box::new(key("a")),
                    right: Box::new(key("b")),
                }),
                right: Box::new(Expr::Comma {
                    left: Box::new(key("c")),
                    right: Box::new(key("d")),
                }),
            }
        );
    }

    #[test]
    fn conditionals() {
        assert_eq!(
            parse("if .a then .b else .c end"),
            Expr::If {
                cond: Box::new(key("a")),
                then: Box::new(key("b")),
                alt: Box::new(key("c")),
            }
        );
    }

    #[test]
    fn elif_desugars_to_nested_if() {
        assert_eq!(
            parse("if .a then 1 elif .b then 2 else 3 end"),
            Expr::If {
                cond: Box::new(key("a")),
                then: Box::new(lit(json!(1))),
                alt: Box::new(Expr::If {
                    cond: Box::new(key("b")),
                    then: Box::new(lit(json!(2))),
                    alt: Box::new(lit(json!(3))),
                }),
            }
        );
    }

    #[test]
    fn try_catch() {
        assert_eq!(
            parse("try .a"),
            Expr::TryCatch {
                body: Box::new(key("a")),
                handler: None,
            }
        );
        assert_eq!(
            parse("try .a catch .b"),
            Expr::TryCatch {
                body: Box::new(key("a")),
                handler: Some(Box::new(key("b"))),
            }
        );
    }

    #[test]
    fn builtin_calls() {
        assert_eq!(
            parse("length"),
            Expr::Call {
                name: "length".to_string(),
                args: vec![]
            }
        );
        assert_eq!(
            parse("map(.name)"),
            Expr::Call {
                name: "map".to_string(),
                args: vec![key("name")]
            }
        );
        assert_eq!(
            parse("not"),
            Expr::Call {
                name: "not".to_string(),
                args: vec![]
            }
        );
    }

    #[test]
    fn display_is_canonical() {
        for program in [
            ".",
            "..",
            ".foo",
            ".[0,2]",
            ".[1:3]",
            "[.foo, .bar]",
            "{name: .name}",
            "if .a then .b else .c end",
            "try .a catch .b",
            "map(.name)",
        ] {
            let expr = parse(program);
            let rendered = expr.to_string();
            assert_eq!(parse(&rendered), expr, "{} -> {}", program, rendered);
        }
    }

    #[test]
    fn unknown_function() {
        let err = parse_err("nosuchthing");
        assert_eq!(err.msg, "unknown function 'nosuchthing'");
    }

    #[test]
    fn arity_checking() {
        assert_eq!(
            parse_err("map()").msg,
            "map() takes 1 argument but 0 were given"
        );
        assert_eq!(
            parse_err("map(.a; .b)").msg,
            "map() takes 1 argument but 2 were given"
        );
        assert_eq!(
            parse_err("length(1)").msg,
            "length() takes no arguments but 1 were given"
        );
        assert_eq!(
            parse_err("flatten(1; 2)").msg,
            "flatten() takes at most 1 argument but 2 were given"
        );
    }

    #[test]
    fn trailing_input() {
        let err = parse_err("1 2");
        assert_eq!(err.msg, "expected end of query, found '2'");
        assert_eq!(err.index, 2);
    }

    #[test]
    fn unsupported_forms_are_rejected() {
        assert!(parse_err(".a = 1").msg.starts_with("expected end of query"));
        assert!(parse_err("reduce .[] as $x (0; .)")
            .msg
            .starts_with("unexpected 'reduce'"));
        assert!(parse_err(". as $x | $x")
            .msg
            .starts_with("expected end of query"));
    }

    #[test]
    fn error_positions() {
        let err = parse_err(".foo | [1");
        assert_eq!(err.msg, "unclosed array construction");
        assert_eq!(err.index, 7);
    }

    #[test]
    fn unbalanced_parens() {
        let err = parse_err("(1 + 2");
        assert_eq!(err.msg, "unbalanced parentheses");
    }

    #[test]
    fn bad_object_key() {
        let err = parse_err("{1: 2}");
        assert!(err.msg.starts_with("unexpected object key"));
    }
}
