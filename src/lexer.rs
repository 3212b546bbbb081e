use std::fmt;
use std::io::BufRead;

#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    Eof,
    Def,
    Extern,
    Identifier(String),
    Number(String),
    Operator(char),
}

impl Token {
    /// textual payload of the token, absent for tokens fully described by their kind
    pub fn value(&self) -> Option<String> {
        match self {
            Token::Identifier(text) | Token::Number(text) => Some(text.clone()),
            Token::Operator(op) => Some(op.to_string()),
            Token::Eof | Token::Def | Token::Extern => None,
        }
    }

    pub fn is_operator(&self, c: char) -> bool {
        *self == Token::Operator(c)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Eof => write!(f, "end of input"),
            Token::Def => write!(f, "'def'"),
            Token::Extern => write!(f, "'extern'"),
            Token::Identifier(name) => write!(f, "identifier '{}'", name),
            Token::Number(text) => write!(f, "number '{}'", text),
            Token::Operator(op) => write!(f, "{:?}", op),
        }
    }
}

/// Anything the lexer can pull characters from. `None` marks the end of input.
pub trait CharSource {
    fn next_char(&mut self) -> Option<char>;
}

impl<I: Iterator<Item = char>> CharSource for I {
    fn next_char(&mut self) -> Option<char> {
        self.next()
    }
}

/// Decodes characters from a buffered reader one line at a time.
pub struct ReaderSource<R> {
    reader: R,
    line: Vec<char>,
    pos: usize,
}

impl<R: BufRead> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
            pos: 0,
        }
    }

    fn fill(&mut self) -> bool {
        let mut buf = Vec::new();
        match self.reader.read_until(b'\n', &mut buf) {
            Ok(0) => false,
            Ok(_) => {
                // invalid UTF-8 decodes to U+FFFD, which lexes as an operator
                self.line = String::from_utf8_lossy(&buf).chars().collect();
                self.pos = 0;
                true
            }
            Err(err) => {
                // the lexer has no failure mode, so a broken reader just ends the input
                tracing::warn!("failed to read source: {}", err);
                false
            }
        }
    }
}

impl<R: BufRead> Iterator for ReaderSource<R> {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        while self.pos >= self.line.len() {
            if !self.fill() {
                return None;
            }
        }
        let c = self.line[self.pos];
        self.pos += 1;
        Some(c)
    }
}

// the C locale's isspace set; `is_ascii_whitespace` leaves out vertical tab
fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c')
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_number_char(c: char) -> bool {
    c.is_ascii_digit() || c == '.'
}

/// Pull-based lexer; `last_char` is the single character of lookahead.
pub struct Lexer<S> {
    source: S,
    last_char: Option<char>,
}

impl<'a> Lexer<std::str::Chars<'a>> {
    pub fn from_str(input: &'a str) -> Self {
        Lexer::new(input.chars())
    }
}

impl<S: CharSource> Lexer<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            last_char: Some(' '),
        }
    }

    fn advance(&mut self) -> Option<char> {
        self.last_char = self.source.next_char();
        self.last_char
    }

    fn consume_while(&mut self, first: char, pred: fn(char) -> bool) -> String {
        let mut text = String::new();
        text.push(first);
        while let Some(c) = self.advance() {
            if !pred(c) {
                break;
            }
            text.push(c);
        }
        text
    }

    pub fn next_token(&mut self) -> Token {
        let token = loop {
            while matches!(self.last_char, Some(c) if is_space(c)) {
                self.advance();
            }

            let c = match self.last_char {
                Some(c) => c,
                None => break Token::Eof,
            };

            if c.is_ascii_alphabetic() {
                let ident = self.consume_while(c, is_ident_char);
                break match ident.as_str() {
                    "def" => Token::Def,
                    "extern" => Token::Extern,
                    _ => Token::Identifier(ident),
                };
            }

            if is_number_char(c) {
                // no validation here, `1.2.3` is one token and the parser decides what it means
                break Token::Number(self.consume_while(c, is_number_char));
            }

            if c == '#' {
                while let Some(c) = self.advance() {
                    if c == '\n' || c == '\r' {
                        break;
                    }
                }
                continue;
            }

            self.advance();
            break Token::Operator(c);
        };

        tracing::trace!("lexed {}", token);
        token
    }
}

impl<S: CharSource> Iterator for Lexer<S> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        match self.next_token() {
            Token::Eof => None,
            tok => Some(tok),
        }
    }
}

/// lex the whole input, not including the trailing `Token::Eof`
pub fn lex(input: &str) -> Vec<Token> {
    Lexer::from_str(input).collect()
}
