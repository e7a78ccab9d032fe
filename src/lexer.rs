use crate::{
    errors::JqError,
    token::{Token, TokenType, EOQ},
};

use std::str::CharIndices;

enum State {
    Error,
    EndOfQuery,
    LexExpression,
    LexInsideString,
}

/// A jq program tokenizer, producing a vector of tokens.
struct Lexer<'q> {
    query: &'q str,
    tokens: Vec<Token>,

    chars: CharIndices<'q>,
    start: usize,
    pos: usize,
}

impl<'q> Lexer<'q> {
    fn new(query: &'q str) -> Self {
        Self {
            query,
            tokens: Vec::new(),
            start: 0,
            pos: 0,
            chars: query.char_indices(),
        }
    }

    fn run(&mut self) {
        let mut state = State::LexExpression;
        loop {
            match state {
                State::Error | State::EndOfQuery => break,
                State::LexExpression => state = lex_expression(self),
                State::LexInsideString => state = lex_string(self),
            }
        }
    }

    fn emit(&mut self, t: TokenType) {
        self.tokens.push(Token::new(t, self.start, self.pos));
        self.start = self.pos;
    }

    fn value(&self) -> &str {
        self.query
            .get(self.start..self.pos)
            .expect("lexer error: slice out of bounds or not on codepoint boundary")
    }

    fn boxed_value(&self) -> Box<str> {
        self.value().to_string().into_boxed_str()
    }

    fn next(&mut self) -> Option<char> {
        if let Some((pos, ch)) = self.chars.next() {
            self.pos = pos + ch.len_utf8();

            #[cfg(debug_assertions)]
            debug_assert!(
                self.pos <= self.query.len(),
                "current position is out of bounds"
            );

            Some(ch)
        } else {
            None
        }
    }

    fn ignore(&mut self) {
        self.start = self.pos;
    }

    fn peek(&mut self) -> char {
        if let Some((_, ch)) = self.chars.clone().next() {
            ch
        } else {
            EOQ
        }
    }

    fn accept(&mut self, ch: char) -> bool {
        if self.peek() == ch {
            self.next();
            true
        } else {
            false
        }
    }

    fn accept_if(&mut self, pred: impl FnOnce(char) -> bool) -> bool {
        if pred(self.peek()) {
            self.next();
            true
        } else {
            false
        }
    }

    fn accept_run(&mut self, pred: impl Fn(char) -> bool) -> bool {
        let mut accepted = false;
        while pred(self.peek()) {
            self.next();
            accepted = true;
        }
        accepted
    }

    fn ignore_whitespace(&mut self) -> bool {
        #[cfg(debug_assertions)]
        debug_assert!(
            self.pos == self.start,
            "must emit or ignore before eating whitespace"
        );

        if self.accept_run(is_whitespace_char) {
            self.ignore();
            true
        } else {
            false
        }
    }

    fn error(&mut self, msg: String) -> State {
        self.tokens.push(Token::new(
            TokenType::Error {
                msg: msg.into_boxed_str(),
            },
            self.start,
            self.pos,
        ));
        State::Error
    }
}

pub fn tokenize(query: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(query);
    lexer.run();
    lexer.tokens
}

pub fn lex(query: &str) -> Result<Vec<Token>, JqError> {
    let tokens = tokenize(query);

    match tokens.last() {
        Some(Token {
            kind: TokenType::Error { msg },
            span,
            ..
        }) => Err(JqError::lex((*msg).to_string(), span.0)),
        _ => Ok(tokens),
    }
}

fn lex_expression(l: &mut Lexer) -> State {
    l.ignore_whitespace();

    match l.peek() {
        EOQ => {
            l.next();
            l.emit(TokenType::Eoq);
            State::EndOfQuery
        }
        '"' => {
            l.next();
            State::LexInsideString
        }
        '.' => {
            l.next();
            if l.accept('.') {
                l.emit(TokenType::DotDot);
            } else {
                l.emit(TokenType::Dot);
            }
            State::LexExpression
        }
        '|' => {
            l.next();
            if l.accept('=') {
                l.emit(TokenType::PipeAssign);
            } else {
                l.emit(TokenType::Pipe);
            }
            State::LexExpression
        }
        '=' => {
            l.next();
            if l.accept('=') {
                l.emit(TokenType::Eq);
            } else {
                l.emit(TokenType::Assign);
            }
            State::LexExpression
        }
        '!' => {
            l.next();
            if l.accept('=') {
                l.emit(TokenType::Ne);
                State::LexExpression
            } else {
                l.error(String::from("unexpected '!', did you mean '!='?"))
            }
        }
        '<' => {
            l.next();
            if l.accept('=') {
                l.emit(TokenType::Le);
            } else {
                l.emit(TokenType::Lt);
            }
            State::LexExpression
        }
        '>' => {
            l.next();
            if l.accept('=') {
                l.emit(TokenType::Ge);
            } else {
                l.emit(TokenType::Gt);
            }
            State::LexExpression
        }
        '/' => {
            l.next();
            if l.accept('/') {
                l.emit(TokenType::DoubleSlash);
            } else {
                l.emit(TokenType::Slash);
            }
            State::LexExpression
        }
        '$' => {
            l.next();
            if l.accept_if(is_ident_first) {
                l.accept_run(is_ident_char);
                let name: Box<str> = l.value()[1..].into();
                l.emit(TokenType::Variable { name });
                State::LexExpression
            } else {
                let msg = format!("expected an identifier after '$', found '{}'", l.peek());
                l.error(msg)
            }
        }
        ',' | ':' | ';' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '+' | '-' | '*' | '%' => {
            let ch = l.next().unwrap_or(EOQ);
            l.emit(match ch {
                ',' => TokenType::Comma,
                ':' => TokenType::Colon,
                ';' => TokenType::Semicolon,
                '?' => TokenType::Question,
                '(' => TokenType::LParen,
                ')' => TokenType::RParen,
                '[' => TokenType::LBracket,
                ']' => TokenType::RBracket,
                '{' => TokenType::LBrace,
                '}' => TokenType::RBrace,
                '+' => TokenType::Plus,
                '-' => TokenType::Minus,
                '*' => TokenType::Star,
                _ => TokenType::Percent,
            });
            State::LexExpression
        }
        ch => {
            if is_digit(ch) {
                lex_number(l)
            } else if l.accept_if(is_ident_first) {
                l.accept_run(is_ident_char);
                l.emit(match l.value() {
                    "true" => TokenType::True,
                    "false" => TokenType::False,
                    "null" => TokenType::Null,
                    "and" => TokenType::And,
                    "or" => TokenType::Or,
                    "not" => TokenType::Not,
                    "if" => TokenType::If,
                    "then" => TokenType::Then,
                    "elif" => TokenType::Elif,
                    "else" => TokenType::Else,
                    "end" => TokenType::End,
                    "as" => TokenType::As,
                    "reduce" => TokenType::Reduce,
                    "foreach" => TokenType::Foreach,
                    "try" => TokenType::Try,
                    "catch" => TokenType::Catch,
                    "def" => TokenType::Def,
                    value => TokenType::Ident {
                        value: value.to_string().into_boxed_str(),
                    },
                });
                State::LexExpression
            } else {
                l.next();
                let msg = format!("unexpected character '{}'", ch);
                l.error(msg)
            }
        }
    }
}

fn lex_number(l: &mut Lexer) -> State {
    l.accept_run(is_digit);

    if l.accept('.') {
        // a fraction
        if !l.accept_run(is_digit) {
            return l.error(String::from(
                "a fractional digit is required after a decimal point",
            ));
        }
    }

    // exponent
    if l.accept('e') || l.accept('E') {
        l.accept_if(|ch| ch == '+' || ch == '-');
        if !l.accept_run(is_digit) {
            return l.error(String::from("at least one exponent digit is required"));
        }
    }

    l.emit(TokenType::Number {
        value: l.boxed_value(),
    });
    State::LexExpression
}

fn lex_string(l: &mut Lexer) -> State {
    l.ignore(); // ignore open quote

    loop {
        match l.peek() {
            '\\' => {
                l.next();
                if !l.accept_if(is_escape_char) {
                    return l.error(String::from("invalid escape sequence"));
                }
            }
            EOQ => {
                let msg = format!("unclosed string starting at index {}", l.start);
                return l.error(msg);
            }
            '"' => {
                l.emit(TokenType::Str {
                    value: l.boxed_value(),
                });
                l.next();
                l.ignore(); // ignore closing quote
                return State::LexExpression;
            }
            _ => {
                l.next();
            }
        }
    }
}

fn is_ident_first(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

fn is_digit(ch: char) -> bool {
    ch.is_ascii_digit()
}

fn is_escape_char(ch: char) -> bool {
    matches!(ch, '"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u')
}

fn is_whitespace_char(ch: char) -> bool {
    matches!(ch, ' ' | '\n' | '\r' | '\t')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(value: &str, start: usize, end: usize) -> Token {
        Token::new(
            TokenType::Ident {
                value: value.to_string().into_boxed_str(),
            },
            start,
            end,
        )
    }

    #[test]
    fn basic_field_access() {
        let query = ".foo.bar";
        let tokens = tokenize(query);
        assert_eq!(
            tokens,
            vec![
                Token::new(TokenType::Dot, 0, 1),
                ident("foo", 1, 4),
                Token::new(TokenType::Dot, 4, 5),
                ident("bar", 5, 8),
                Token::new(TokenType::Eoq, 8, 8),
            ]
        )
    }

    #[test]
    fn pipe_and_builtin() {
        let query = ".items | length";
        let tokens = tokenize(query);
        assert_eq!(
            tokens,
            vec![
                Token::new(TokenType::Dot, 0, 1),
                ident("items", 1, 6),
                Token::new(TokenType::Pipe, 7, 8),
                ident("length", 9, 15),
                Token::new(TokenType::Eoq, 15, 15),
            ]
        )
    }

    #[test]
    fn multi_character_operators() {
        let query = "== != <= >= |= // ..";
        let tokens = tokenize(query);
        assert_eq!(
            tokens,
            vec![
                Token::new(TokenType::Eq, 0, 2),
                Token::new(TokenType::Ne, 3, 5),
                Token::new(TokenType::Le, 6, 8),
                Token::new(TokenType::Ge, 9, 11),
                Token::new(TokenType::PipeAssign, 12, 14),
                Token::new(TokenType::DoubleSlash, 15, 17),
                Token::new(TokenType::DotDot, 18, 20),
                Token::new(TokenType::Eoq, 20, 20),
            ]
        )
    }

    #[test]
    fn single_character_prefixes() {
        let query = "= < > | / .";
        let tokens = tokenize(query);
        assert_eq!(
            tokens,
            vec![
                Token::new(TokenType::Assign, 0, 1),
                Token::new(TokenType::Lt, 2, 3),
                Token::new(TokenType::Gt, 4, 5),
                Token::new(TokenType::Pipe, 6, 7),
                Token::new(TokenType::Slash, 8, 9),
                Token::new(TokenType::Dot, 10, 11),
                Token::new(TokenType::Eoq, 11, 11),
            ]
        )
    }

    #[test]
    fn bracketed_index() {
        let query = ".[0]";
        let tokens = tokenize(query);
        assert_eq!(
            tokens,
            vec![
                Token::new(TokenType::Dot, 0, 1),
                Token::new(TokenType::LBracket, 1, 2),
                Token::new(
                    TokenType::Number {
                        value: "0".to_string().into_boxed_str()
                    },
                    2,
                    3
                ),
                Token::new(TokenType::RBracket, 3, 4),
                Token::new(TokenType::Eoq, 4, 4),
            ]
        )
    }

    #[test]
    fn number_forms() {
        let query = "42 3.14 1e3 2.5e-1";
        let tokens = tokenize(query);
        let values: Vec<&str> = tokens
            .iter()
            .filter_map(|t| match &t.kind {
                TokenType::Number { value } => Some(value.as_ref()),
                _ => None,
            })
            .collect();
        assert_eq!(values, vec!["42", "3.14", "1e3", "2.5e-1"]);
    }

    #[test]
    fn number_missing_fraction() {
        let query = "1.";
        let tokens = tokenize(query);
        assert_eq!(
            tokens,
            vec![Token::new(
                TokenType::Error {
                    msg: "a fractional digit is required after a decimal point"
                        .to_string()
                        .into_boxed_str()
                },
                0,
                2
            )]
        )
    }

    #[test]
    fn number_missing_exponent() {
        let query = "1e";
        let tokens = tokenize(query);
        assert!(matches!(
            tokens.last(),
            Some(Token {
                kind: TokenType::Error { .. },
                ..
            })
        ));
    }

    #[test]
    fn string_with_escapes() {
        let query = r#""a\nb""#;
        let tokens = tokenize(query);
        assert_eq!(
            tokens,
            vec![
                Token::new(
                    TokenType::Str {
                        value: r"a\nb".to_string().into_boxed_str()
                    },
                    1,
                    5
                ),
                Token::new(TokenType::Eoq, 6, 6),
            ]
        )
    }

    #[test]
    fn unclosed_string() {
        let query = r#""abc"#;
        let tokens = tokenize(query);
        assert_eq!(
            tokens,
            vec![Token::new(
                TokenType::Error {
                    msg: "unclosed string starting at index 1"
                        .to_string()
                        .into_boxed_str()
                },
                1,
                4
            )]
        )
    }

    #[test]
    fn invalid_escape() {
        let query = r#""a\qb""#;
        let tokens = tokenize(query);
        assert!(matches!(
            tokens.last(),
            Some(Token {
                kind: TokenType::Error { .. },
                ..
            })
        ));
    }

    #[test]
    fn variables() {
        let query = "$foo";
        let tokens = tokenize(query);
        assert_eq!(
            tokens,
            vec![
                Token::new(
                    TokenType::Variable {
                        name: "foo".to_string().into_boxed_str()
                    },
                    0,
                    4
                ),
                Token::new(TokenType::Eoq, 4, 4),
            ]
        )
    }

    #[test]
    fn dollar_without_name() {
        let query = "$ .foo";
        let tokens = tokenize(query);
        assert_eq!(
            tokens,
            vec![Token::new(
                TokenType::Error {
                    msg: "expected an identifier after '$', found ' '"
                        .to_string()
                        .into_boxed_str()
                },
                0,
                1
            )]
        )
    }

    #[test]
    fn keywords_and_literals() {
        let query = "if then elif else end and or not try catch true false null";
        let kinds: Vec<TokenType> = tokenize(query).into_iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenType::If,
                TokenType::Then,
                TokenType::Elif,
                TokenType::Else,
                TokenType::End,
                TokenType::And,
                TokenType::Or,
                TokenType::Not,
                TokenType::Try,
                TokenType::Catch,
                TokenType::True,
                TokenType::False,
                TokenType::Null,
                TokenType::Eoq,
            ]
        )
    }

    #[test]
    fn reserved_keywords_lex() {
        let query = "reduce foreach as def";
        let kinds: Vec<TokenType> = tokenize(query).into_iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenType::Reduce,
                TokenType::Foreach,
                TokenType::As,
                TokenType::Def,
                TokenType::Eoq,
            ]
        )
    }

    #[test]
    fn unexpected_character() {
        let query = ".foo @";
        let tokens = tokenize(query);
        assert_eq!(
            tokens.last(),
            Some(&Token::new(
                TokenType::Error {
                    msg: "unexpected character '@'".to_string().into_boxed_str()
                },
                5,
                6
            ))
        )
    }

    #[test]
    fn bare_bang() {
        let query = "1 ! 2";
        let tokens = tokenize(query);
        assert!(matches!(
            tokens.last(),
            Some(Token {
                kind: TokenType::Error { .. },
                ..
            })
        ));
    }

    #[test]
    fn lex_surfaces_trailing_error() {
        assert!(lex(".foo").is_ok());
        let err = lex(r#""abc"#).unwrap_err();
        assert_eq!(err.kind, crate::errors::JqErrorType::LexerError);
        assert_eq!(err.msg, "unclosed string starting at index 1");
    }
}
