//! Lexer for script source code
//!
//! Converts source text into a stream of tokens.

use std::iter::Peekable;
use std::str::CharIndices;

use serde::{Deserialize, Serialize};

use crate::value::JsString;

/// Source span information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }
}

impl Default for Span {
    fn default() -> Self {
        Self {
            start: 0,
            end: 0,
            line: 1,
            column: 1,
        }
    }
}

/// Reserved words
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    True,
    False,
    Null,
    Let,
    Const,
    Var,
    Function,
    Return,
    If,
    Else,
    For,
    While,
    Do,
    Break,
    Continue,
    Switch,
    Case,
    Default,
    Try,
    Catch,
    Finally,
    Throw,
    New,
    This,
    Super,
    Class,
    Extends,
    Import,
    Export,
    Typeof,
    Instanceof,
    In,
    Void,
    Delete,
    Await,
    Async,
}

// Contextual words (of, from, as, get, set, static) are not listed and lex as identifiers
const KEYWORDS: &[(&str, Keyword)] = &[
    ("true", Keyword::True),
    ("false", Keyword::False),
    ("null", Keyword::Null),
    ("let", Keyword::Let),
    ("const", Keyword::Const),
    ("var", Keyword::Var),
    ("function", Keyword::Function),
    ("return", Keyword::Return),
    ("if", Keyword::If),
    ("else", Keyword::Else),
    ("for", Keyword::For),
    ("while", Keyword::While),
    ("do", Keyword::Do),
    ("break", Keyword::Break),
    ("continue", Keyword::Continue),
    ("switch", Keyword::Switch),
    ("case", Keyword::Case),
    ("default", Keyword::Default),
    ("try", Keyword::Try),
    ("catch", Keyword::Catch),
    ("finally", Keyword::Finally),
    ("throw", Keyword::Throw),
    ("new", Keyword::New),
    ("this", Keyword::This),
    ("super", Keyword::Super),
    ("class", Keyword::Class),
    ("extends", Keyword::Extends),
    ("import", Keyword::Import),
    ("export", Keyword::Export),
    ("typeof", Keyword::Typeof),
    ("instanceof", Keyword::Instanceof),
    ("in", Keyword::In),
    ("void", Keyword::Void),
    ("delete", Keyword::Delete),
    ("await", Keyword::Await),
    ("async", Keyword::Async),
];

impl Keyword {
    pub fn lookup(word: &str) -> Option<Keyword> {
        KEYWORDS
            .iter()
            .find(|(text, _)| *text == word)
            .map(|(_, keyword)| *keyword)
    }

    /// Source text of the keyword, also accepted as a property name (`obj.default`)
    pub fn as_str(self) -> &'static str {
        KEYWORDS
            .iter()
            .find(|(_, keyword)| *keyword == self)
            .map_or("", |(text, _)| text)
    }
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    String(JsString),
    /// Raw text chunks and the source text of every `${...}` substitution
    Template(Vec<JsString>, Vec<(String, Span)>),
    Identifier(JsString),
    Keyword(Keyword),
    /// Pattern and flags; only produced by [`Lexer::rescan_regexp`]
    RegExp(String, String),

    // Arithmetic and comparison
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    StarStar,
    PlusPlus,
    MinusMinus,
    EqEq,
    EqEqEq,
    BangEq,
    BangEqEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    // Bitwise and logical
    LtLt,
    GtGt,
    GtGtGt,
    Amp,
    AmpAmp,
    Pipe,
    PipePipe,
    Caret,
    Tilde,
    Bang,
    Question,
    QuestionQuestion,
    QuestionDot,

    // Assignment
    Eq,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    StarStarEq,
    AmpAmpEq,
    PipePipeEq,
    QuestionQuestionEq,

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Dot,
    DotDotDot,
    Comma,
    Colon,
    Semicolon,
    Arrow,

    Eof,
    Invalid(char),
    /// String or template literal missing its closing delimiter
    Unterminated,
}

const MAX_PUNCTUATOR_LEN: usize = 4;

const PUNCTUATORS: &[(&str, TokenKind)] = &[
    ("(", TokenKind::LParen),
    (")", TokenKind::RParen),
    ("{", TokenKind::LBrace),
    ("}", TokenKind::RBrace),
    ("[", TokenKind::LBracket),
    ("]", TokenKind::RBracket),
    (".", TokenKind::Dot),
    ("...", TokenKind::DotDotDot),
    (",", TokenKind::Comma),
    (":", TokenKind::Colon),
    (";", TokenKind::Semicolon),
    ("=>", TokenKind::Arrow),
    ("+", TokenKind::Plus),
    ("-", TokenKind::Minus),
    ("*", TokenKind::Star),
    ("/", TokenKind::Slash),
    ("%", TokenKind::Percent),
    ("**", TokenKind::StarStar),
    ("++", TokenKind::PlusPlus),
    ("--", TokenKind::MinusMinus),
    ("==", TokenKind::EqEq),
    ("===", TokenKind::EqEqEq),
    ("!=", TokenKind::BangEq),
    ("!==", TokenKind::BangEqEq),
    ("<", TokenKind::Lt),
    ("<=", TokenKind::LtEq),
    (">", TokenKind::Gt),
    (">=", TokenKind::GtEq),
    ("<<", TokenKind::LtLt),
    (">>", TokenKind::GtGt),
    (">>>", TokenKind::GtGtGt),
    ("&", TokenKind::Amp),
    ("&&", TokenKind::AmpAmp),
    ("|", TokenKind::Pipe),
    ("||", TokenKind::PipePipe),
    ("^", TokenKind::Caret),
    ("~", TokenKind::Tilde),
    ("!", TokenKind::Bang),
    ("?", TokenKind::Question),
    ("??", TokenKind::QuestionQuestion),
    ("?.", TokenKind::QuestionDot),
    ("=", TokenKind::Eq),
    ("+=", TokenKind::PlusEq),
    ("-=", TokenKind::MinusEq),
    ("*=", TokenKind::StarEq),
    ("/=", TokenKind::SlashEq),
    ("%=", TokenKind::PercentEq),
    ("**=", TokenKind::StarStarEq),
    ("&&=", TokenKind::AmpAmpEq),
    ("||=", TokenKind::PipePipeEq),
    ("??=", TokenKind::QuestionQuestionEq),
];

impl TokenKind {
    fn punctuator(text: &str) -> Option<TokenKind> {
        PUNCTUATORS
            .iter()
            .find(|(candidate, _)| *candidate == text)
            .map(|(_, kind)| kind.clone())
    }

    /// Source text of a keyword or punctuator token
    pub fn text(&self) -> Option<&'static str> {
        if let TokenKind::Keyword(keyword) = self {
            return Some(keyword.as_str());
        }
        PUNCTUATORS
            .iter()
            .find(|(_, kind)| kind == self)
            .map(|(text, _)| *text)
    }
}

/// A token with its source location
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn eof(pos: usize, line: u32, column: u32) -> Self {
        Self {
            kind: TokenKind::Eof,
            span: Span::new(pos, pos, line, column),
        }
    }
}

/// Lexer state checkpoint for backtracking
#[derive(Clone)]
pub struct LexerCheckpoint {
    current_pos: usize,
    line: u32,
    column: u32,
    saw_newline: bool,
}

/// Lexer for tokenizing script source code
pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    /// Base offset added to char_indices positions after a restore
    chars_base_offset: usize,
    current_pos: usize,
    line: u32,
    column: u32,
    start_pos: usize,
    start_line: u32,
    start_column: u32,
    /// Tracks if we just saw a newline (for ASI)
    saw_newline: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            chars_base_offset: 0,
            current_pos: 0,
            line: 1,
            column: 1,
            start_pos: 0,
            start_line: 1,
            start_column: 1,
            saw_newline: false,
        }
    }

    /// Create a checkpoint of the current lexer state for backtracking
    pub fn checkpoint(&self) -> LexerCheckpoint {
        LexerCheckpoint {
            current_pos: self.current_pos,
            line: self.line,
            column: self.column,
            saw_newline: self.saw_newline,
        }
    }

    /// Restore the lexer state from a checkpoint
    pub fn restore(&mut self, checkpoint: LexerCheckpoint) {
        self.current_pos = checkpoint.current_pos;
        self.line = checkpoint.line;
        self.column = checkpoint.column;
        self.saw_newline = checkpoint.saw_newline;
        self.chars_base_offset = checkpoint.current_pos;
        self.chars = self
            .source
            .get(checkpoint.current_pos..)
            .unwrap_or("")
            .char_indices()
            .peekable();
    }

    /// Get the next token from the source
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        self.start_pos = self.current_pos;
        self.start_line = self.line;
        self.start_column = self.column;

        let Some(ch) = self.peek() else {
            return Token::eof(self.current_pos, self.line, self.column);
        };

        let kind = match ch {
            '"' | '\'' => {
                self.advance();
                self.scan_string(ch)
            }
            '`' => {
                self.advance();
                self.scan_template_literal()
            }
            '0'..='9' => {
                self.advance();
                self.scan_number(ch)
            }
            '.' if matches!(self.peek_next(), Some('0'..='9')) => {
                self.advance();
                self.scan_number('.')
            }
            c if is_id_start(c) => {
                self.advance();
                self.scan_identifier(c)
            }
            _ => self.scan_punctuator(),
        };

        Token::new(kind, self.make_span())
    }

    /// Re-read the `/` or `/=` token at `span` as a regular expression literal.
    ///
    /// The lexer cannot tell division from a regexp on its own; the parser
    /// calls this when a slash shows up where an expression must start.
    pub fn rescan_regexp(&mut self, span: Span) -> Token {
        self.restore(LexerCheckpoint {
            current_pos: span.start,
            line: span.line,
            column: span.column,
            saw_newline: self.saw_newline,
        });
        self.start_pos = span.start;
        self.start_line = span.line;
        self.start_column = span.column;
        self.advance();

        let mut pattern = String::new();
        let mut in_class = false;
        loop {
            match self.advance() {
                Some((_, '/')) if !in_class => break,
                Some((_, '\\')) => {
                    pattern.push('\\');
                    match self.advance() {
                        Some((_, c)) if c != '\n' => pattern.push(c),
                        _ => return Token::new(TokenKind::Unterminated, self.make_span()),
                    }
                }
                Some((_, '\n')) | None => return Token::new(TokenKind::Unterminated, self.make_span()),
                Some((_, c)) => {
                    match c {
                        '[' => in_class = true,
                        ']' => in_class = false,
                        _ => {}
                    }
                    pattern.push(c);
                }
            }
        }

        let mut flags = String::new();
        while let Some(ch) = self.peek().filter(char::is_ascii_alphabetic) {
            flags.push(ch);
            self.advance();
        }
        Token::new(TokenKind::RegExp(pattern, flags), self.make_span())
    }

    /// Check if there was a newline before the current token
    pub fn had_newline_before(&self) -> bool {
        self.saw_newline
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if let Some((pos, ch)) = result {
            self.current_pos = self.chars_base_offset + pos + ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        result
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn peek_next(&self) -> Option<char> {
        let slice = self.source.get(self.current_pos..)?;
        let mut iter = slice.chars();
        iter.next();
        iter.next()
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn make_span(&self) -> Span {
        Span::new(
            self.start_pos,
            self.current_pos,
            self.start_line,
            self.start_column,
        )
    }

    fn skip_whitespace_and_comments(&mut self) {
        self.saw_newline = false;

        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r' | '\u{000B}' | '\u{000C}' | '\u{00A0}' | '\u{FEFF}') => {
                    self.advance();
                }
                Some('\n') => {
                    self.saw_newline = true;
                    self.advance();
                }
                Some('/') => match self.peek_next() {
                    Some('/') => {
                        while let Some(ch) = self.peek() {
                            if ch == '\n' {
                                break;
                            }
                            self.advance();
                        }
                    }
                    Some('*') => {
                        self.advance(); // /
                        self.advance(); // *
                        loop {
                            match self.advance() {
                                Some((_, '*')) if self.peek() == Some('/') => {
                                    self.advance();
                                    break;
                                }
                                Some((_, '\n')) => self.saw_newline = true,
                                Some(_) => {}
                                None => break,
                            }
                        }
                    }
                    _ => break,
                },
                _ => break,
            }
        }
    }

    /// Longest punctuator starting at the current position
    fn scan_punctuator(&mut self) -> TokenKind {
        let rest = self.source.get(self.current_pos..).unwrap_or("");
        let found = (1..=MAX_PUNCTUATOR_LEN).rev().find_map(|len| {
            let text = rest.get(..len)?;
            // `a?.5:b` is a conditional, not an optional chain
            if text == "?." && rest.as_bytes().get(2).is_some_and(u8::is_ascii_digit) {
                return None;
            }
            TokenKind::punctuator(text).map(|kind| (len, kind))
        });

        match found {
            Some((len, kind)) => {
                // Punctuators are ASCII, one char per byte
                for _ in 0..len {
                    self.advance();
                }
                kind
            }
            None => match self.advance() {
                Some((_, c)) => TokenKind::Invalid(c),
                None => TokenKind::Eof,
            },
        }
    }

    fn scan_escape(&mut self, value: &mut String) -> bool {
        match self.advance() {
            Some((_, 'n')) => value.push('\n'),
            Some((_, 'r')) => value.push('\r'),
            Some((_, 't')) => value.push('\t'),
            Some((_, 'b')) => value.push('\x08'),
            Some((_, 'f')) => value.push('\x0C'),
            Some((_, 'v')) => value.push('\x0B'),
            Some((_, '0')) => value.push('\0'),
            Some((_, 'x')) => {
                if let Some(ch) = self.scan_hex_escape(2).and_then(char::from_u32) {
                    value.push(ch);
                }
            }
            Some((_, 'u')) => {
                if self.match_char('{') {
                    let mut hex_str = String::new();
                    while let Some(ch) = self.peek() {
                        self.advance();
                        if ch == '}' {
                            break;
                        }
                        hex_str.push(ch);
                    }
                    if let Some(ch) = u32::from_str_radix(&hex_str, 16)
                        .ok()
                        .and_then(char::from_u32)
                    {
                        value.push(ch);
                    }
                } else if let Some(ch) = self.scan_hex_escape(4).and_then(char::from_u32) {
                    value.push(ch);
                }
            }
            // Line continuation
            Some((_, '\n')) => {}
            Some((_, c)) => value.push(c),
            None => return false,
        }
        true
    }

    fn scan_string(&mut self, quote: char) -> TokenKind {
        let mut value = String::new();

        loop {
            match self.advance() {
                Some((_, c)) if c == quote => break,
                Some((_, '\\')) => {
                    if !self.scan_escape(&mut value) {
                        return TokenKind::Unterminated;
                    }
                }
                Some((_, '\n')) | None => return TokenKind::Unterminated,
                Some((_, c)) => value.push(c),
            }
        }

        TokenKind::String(JsString::from(value))
    }

    fn scan_hex_escape(&mut self, count: usize) -> Option<u32> {
        let mut hex_str = String::new();
        for _ in 0..count {
            let ch = self.peek().filter(char::is_ascii_hexdigit)?;
            hex_str.push(ch);
            self.advance();
        }
        u32::from_str_radix(&hex_str, 16).ok()
    }

    /// Scan a whole template literal. Substitutions are not tokenized here:
    /// their source text is captured and parsed when the template runs.
    fn scan_template_literal(&mut self) -> TokenKind {
        let mut quasis = Vec::new();
        let mut expressions = Vec::new();
        let mut value = String::new();

        loop {
            match self.advance() {
                Some((_, '`')) => {
                    quasis.push(JsString::from(std::mem::take(&mut value)));
                    return TokenKind::Template(quasis, expressions);
                }
                Some((_, '$')) if self.peek() == Some('{') => {
                    self.advance();
                    quasis.push(JsString::from(std::mem::take(&mut value)));
                    let start = self.current_pos;
                    let (line, column) = (self.line, self.column);
                    let Some(end) = self.skip_substitution() else {
                        return TokenKind::Unterminated;
                    };
                    let source = self.source.get(start..end).unwrap_or("").to_string();
                    expressions.push((source, Span::new(start, end, line, column)));
                }
                Some((_, '\\')) => {
                    if !self.scan_escape(&mut value) {
                        return TokenKind::Unterminated;
                    }
                }
                Some((_, c)) => value.push(c),
                None => return TokenKind::Unterminated,
            }
        }
    }

    /// Advance past a `${...}` body, returning the byte offset of its closing brace
    fn skip_substitution(&mut self) -> Option<usize> {
        let mut depth = 0usize;
        loop {
            let (pos, ch) = self.advance()?;
            match ch {
                '{' => depth += 1,
                '}' if depth == 0 => return Some(self.chars_base_offset + pos),
                '}' => depth -= 1,
                '"' | '\'' => {
                    if self.scan_string(ch) == TokenKind::Unterminated {
                        return None;
                    }
                }
                '`' => {
                    if self.scan_template_literal() == TokenKind::Unterminated {
                        return None;
                    }
                }
                _ => {}
            }
        }
    }

    fn scan_digits(&mut self, radix: u32, out: &mut String) {
        while let Some(ch) = self.peek() {
            if ch.is_digit(radix) {
                out.push(ch);
                self.advance();
            } else if ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn scan_number(&mut self, first: char) -> TokenKind {
        let mut num_str = String::new();

        if first == '0' {
            let radix = match self.peek() {
                Some('x' | 'X') => Some(16),
                Some('o' | 'O') => Some(8),
                Some('b' | 'B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.advance();
                self.scan_digits(radix, &mut num_str);
                return match u64::from_str_radix(&num_str, radix) {
                    Ok(n) => TokenKind::Number(n as f64),
                    Err(_) => TokenKind::Invalid('0'),
                };
            }
        }

        if first == '.' {
            num_str.push_str("0.");
            self.scan_digits(10, &mut num_str);
        } else {
            num_str.push(first);
            self.scan_digits(10, &mut num_str);
            // A dot followed by a digit or exponent continues the number; `1..toString()` style is not supported
            if self.peek() == Some('.') && matches!(self.peek_next(), Some('0'..='9' | 'e' | 'E'))
            {
                self.advance();
                num_str.push('.');
                self.scan_digits(10, &mut num_str);
            }
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            num_str.push('e');
            self.advance();
            if let Some(sign @ ('+' | '-')) = self.peek() {
                num_str.push(sign);
                self.advance();
            }
            self.scan_digits(10, &mut num_str);
        }

        match num_str.parse() {
            Ok(n) => TokenKind::Number(n),
            Err(_) => TokenKind::Invalid(first),
        }
    }

    fn scan_identifier(&mut self, first: char) -> TokenKind {
        let mut name = String::new();
        name.push(first);

        while let Some(ch) = self.peek() {
            if is_id_continue(ch) {
                name.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        match Keyword::lookup(&name) {
            Some(keyword) => TokenKind::Keyword(keyword),
            None => TokenKind::Identifier(JsString::from(name)),
        }
    }
}

fn is_id_start(ch: char) -> bool {
    ch == '_' || ch == '$' || ch.is_alphabetic()
}

fn is_id_continue(ch: char) -> bool {
    ch == '_' || ch == '$' || ch.is_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(value: &str) -> JsString {
        JsString::from(value)
    }

    fn lex(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(source);
        let mut tokens = vec![];
        loop {
            let token = lexer.next_token();
            if token.kind == TokenKind::Eof {
                break;
            }
            tokens.push(token.kind);
        }
        tokens
    }

    #[test]
    fn test_numbers() {
        assert_eq!(lex("42"), vec![TokenKind::Number(42.0)]);
        assert_eq!(lex("3.5"), vec![TokenKind::Number(3.5)]);
        assert_eq!(lex("1e3"), vec![TokenKind::Number(1000.0)]);
        assert_eq!(lex("0xff"), vec![TokenKind::Number(255.0)]);
        assert_eq!(lex("0b1010"), vec![TokenKind::Number(10.0)]);
        assert_eq!(lex("1_000"), vec![TokenKind::Number(1000.0)]);
        assert_eq!(lex(".5"), vec![TokenKind::Number(0.5)]);
    }

    #[test]
    fn test_strings() {
        assert_eq!(lex(r#""a\nb""#), vec![TokenKind::String(s("a\nb"))]);
        assert_eq!(lex(r"'A\x42'"), vec![TokenKind::String(s("AB"))]);
        assert_eq!(lex("\"open"), vec![TokenKind::Unterminated]);
    }

    #[test]
    fn test_template_captures_substitution_source() {
        let tokens = lex("`a ${x + 1} b ${ {c: '}'}.c }`");
        let [TokenKind::Template(quasis, exprs)] = tokens.as_slice() else {
            panic!("expected a single template token, got {:?}", tokens);
        };
        assert_eq!(quasis, &vec![s("a "), s(" b "), s("")]);
        let sources: Vec<&str> = exprs.iter().map(|(src, _)| src.as_str()).collect();
        assert_eq!(sources, vec!["x + 1", " {c: '}'}.c "]);
    }

    #[test]
    fn test_operators_and_keywords() {
        assert_eq!(
            lex("a ?. b ?? c ** d"),
            vec![
                TokenKind::Identifier(s("a")),
                TokenKind::QuestionDot,
                TokenKind::Identifier(s("b")),
                TokenKind::QuestionQuestion,
                TokenKind::Identifier(s("c")),
                TokenKind::StarStar,
                TokenKind::Identifier(s("d")),
            ]
        );
        assert_eq!(
            lex("x ? .5 : 1"),
            vec![
                TokenKind::Identifier(s("x")),
                TokenKind::Question,
                TokenKind::Number(0.5),
                TokenKind::Colon,
                TokenKind::Number(1.0),
            ]
        );
        assert_eq!(lex("of"), vec![TokenKind::Identifier(s("of"))]);
        assert_eq!(lex("a >>>= b").get(1), Some(&TokenKind::GtGtGt));
    }

    #[test]
    fn test_regexp_rescan() {
        let source = "x = /[/]a\\/b+/gi.test(y)";
        let mut lexer = Lexer::new(source);
        lexer.next_token();
        lexer.next_token();
        let slash = lexer.next_token();
        assert_eq!(slash.kind, TokenKind::Slash);
        let regexp = lexer.rescan_regexp(slash.span);
        assert_eq!(
            regexp.kind,
            TokenKind::RegExp("[/]a\\/b+".to_string(), "gi".to_string())
        );
        assert_eq!(lexer.next_token().kind, TokenKind::Dot);

        let mut lexer = Lexer::new("/open");
        let slash = lexer.next_token();
        assert_eq!(lexer.rescan_regexp(slash.span).kind, TokenKind::Unterminated);
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            lex("const instanceof inner"),
            vec![
                TokenKind::Keyword(Keyword::Const),
                TokenKind::Keyword(Keyword::Instanceof),
                TokenKind::Identifier(s("inner")),
            ]
        );
        assert_eq!(Keyword::Default.as_str(), "default");
        assert_eq!(TokenKind::QuestionQuestionEq.text(), Some("??="));
        assert_eq!(TokenKind::Keyword(Keyword::Null).text(), Some("null"));
    }

    #[test]
    fn test_comments_and_newlines() {
        let mut lexer = Lexer::new("a // comment\n/* block\n */ b");
        assert_eq!(lexer.next_token().kind, TokenKind::Identifier(s("a")));
        let b = lexer.next_token();
        assert_eq!(b.kind, TokenKind::Identifier(s("b")));
        assert!(lexer.had_newline_before());
        assert_eq!(b.span.line, 3);
    }
}
