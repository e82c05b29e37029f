//! Lexer for Snake
//!
//! Converts source code into a stream of tokens, including the
//! NEWLINE / INDENT / DEDENT layout tokens of the indentation grammar.

use std::iter::Peekable;
use std::str::Chars;

use log::debug;

use crate::frontend::token::{Token, TokenKind};
use crate::utils::{Error, Result, Span};

/// Columns a tab counts for when measuring indentation
const TAB_WIDTH: usize = 4;

/// The lexer state
pub struct Lexer {
    /// Source code as chars
    source: Vec<char>,
    /// Current position in source
    pos: usize,
    /// 1-based line of `pos`
    line: usize,
    /// 1-based column of `pos`
    col: usize,
    /// Start of the current token
    start: usize,
    start_line: usize,
    start_col: usize,
    /// File ID for span tracking
    file_id: usize,
    /// Open indentation levels, innermost last
    indent_stack: Vec<usize>,
    /// DEDENT tokens still owed after a multi-level unindent
    pending_dedents: usize,
    /// True before the first token of a line has been produced
    at_line_start: bool,
    /// Nesting depth of (), [] and {}
    bracket_depth: usize,
    /// Char offset of `source` within its file
    origin: usize,
}

impl Lexer {
    /// Create a new lexer for the given source code
    pub fn new(source: &str, file_id: usize) -> Self {
        Self {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            start: 0,
            start_line: 1,
            start_col: 1,
            file_id,
            indent_stack: vec![0],
            pending_dedents: 0,
            at_line_start: true,
            bracket_depth: 0,
            origin: 0,
        }
    }

    /// Create a lexer for a fragment embedded at a known position of a
    /// file (template string segments). Spans point into the enclosing file.
    pub fn with_origin(source: &str, file_id: usize, offset: usize, line: usize, column: usize) -> Self {
        let mut lexer = Self::new(source, file_id);
        lexer.line = line;
        lexer.col = column;
        lexer.start_line = line;
        lexer.start_col = column;
        lexer.origin = offset;
        lexer.at_line_start = false;
        lexer
    }

    /// Get the current character without advancing
    fn peek(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    /// Get the next character without advancing
    fn peek_next(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    /// Advance to the next character
    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    /// Consume `expected` if it is the next character
    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn mark_start(&mut self) {
        self.start = self.pos;
        self.start_line = self.line;
        self.start_col = self.col;
    }

    /// Create a span from start to current position
    fn make_span(&self) -> Span {
        Span::new(
            self.origin + self.start,
            self.origin + self.pos,
            self.start_line,
            self.start_col,
            self.file_id,
        )
    }

    /// Create a token with the current span
    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.make_span())
    }

    fn error(&self, reason: impl Into<String>) -> Error {
        Error::Lex { reason: reason.into(), span: self.make_span() }
    }

    /// Skip spaces and comments inside a line. Inside brackets line breaks
    /// are plain whitespace too.
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '\n' if self.bracket_depth > 0 => {
                    self.advance();
                }
                '\\' if self.peek_next() == Some('\n') => {
                    // explicit line continuation
                    self.advance();
                    self.advance();
                }
                '#' => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    /// Measure the indentation of the next non-blank line and emit the
    /// matching INDENT / DEDENT. Returns `None` when the indentation is
    /// unchanged or the input is exhausted.
    fn handle_line_start(&mut self) -> Result<Option<Token>> {
        loop {
            let mut indent = 0;
            while let Some(c) = self.peek() {
                match c {
                    ' ' => indent += 1,
                    '\t' => indent += TAB_WIDTH,
                    '\r' => {}
                    _ => break,
                }
                self.advance();
            }

            match self.peek() {
                // blank line
                Some('\n') => {
                    self.advance();
                }
                // comment-only line
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                None => return Ok(None),
                Some(_) => {
                    self.at_line_start = false;
                    self.mark_start();
                    let current = self.indent_stack.last().copied().unwrap_or(0);

                    if indent > current {
                        self.indent_stack.push(indent);
                        return Ok(Some(self.make_token(TokenKind::Indent)));
                    }
                    if indent < current {
                        let mut dedents = 0;
                        while self.indent_stack.len() > 1
                            && indent < self.indent_stack.last().copied().unwrap_or(0)
                        {
                            self.indent_stack.pop();
                            dedents += 1;
                        }
                        if self.indent_stack.last().copied().unwrap_or(0) != indent {
                            return Err(self.error(
                                "unindent does not match any outer indentation level",
                            ));
                        }
                        self.pending_dedents = dedents - 1;
                        return Ok(Some(self.make_token(TokenKind::Dedent)));
                    }
                    return Ok(None);
                }
            }
        }
    }

    /// Read an identifier, keyword, or the `f` prefix of a template string
    fn read_identifier(&mut self) -> Result<Token> {
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        let text: String = self.source[self.start..self.pos].iter().collect();

        if text == "f" {
            if let Some(quote @ ('"' | '\'')) = self.peek() {
                return self.read_fstring(quote);
            }
        }

        let kind = TokenKind::keyword_from_str(&text).unwrap_or(TokenKind::Ident(text));
        Ok(self.make_token(kind))
    }

    fn read_digits(&mut self, radix: u32) {
        while let Some(c) = self.peek() {
            if c.is_digit(radix) || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Read a number literal (integer or float)
    fn read_number(&mut self) -> Result<Token> {
        // Check for hex literal
        if self.peek() == Some('0') && matches!(self.peek_next(), Some('x') | Some('X')) {
            self.advance(); // 0
            self.advance(); // x
            self.read_digits(16);

            let text: String = self.source[self.start + 2..self.pos]
                .iter()
                .filter(|&&c| c != '_')
                .collect();
            let value = i64::from_str_radix(&text, 16)
                .map_err(|_| self.error(format!("invalid hex literal '0x{}'", text)))?;
            return Ok(self.make_token(TokenKind::IntLit(value)));
        }

        let mut is_float = false;
        self.read_digits(10);

        // Check for decimal point
        if self.peek() == Some('.') && self.peek_next().map_or(false, |c| c.is_ascii_digit()) {
            is_float = true;
            self.advance(); // consume '.'
            self.read_digits(10);
        }

        // Check for exponent
        if matches!(self.peek(), Some('e') | Some('E')) {
            let signed = matches!(self.peek_next(), Some('+') | Some('-'));
            let digit_at = if signed { self.pos + 2 } else { self.pos + 1 };
            if self.source.get(digit_at).map_or(false, |c| c.is_ascii_digit()) {
                is_float = true;
                self.advance();
                if signed {
                    self.advance();
                }
                self.read_digits(10);
            }
        }

        let text: String = self.source[self.start..self.pos]
            .iter()
            .filter(|&&c| c != '_')
            .collect();

        if is_float {
            let value = text
                .parse()
                .map_err(|_| self.error(format!("invalid float literal '{}'", text)))?;
            Ok(self.make_token(TokenKind::FloatLit(value)))
        } else {
            let value = text
                .parse()
                .map_err(|_| self.error(format!("integer literal '{}' is too large", text)))?;
            Ok(self.make_token(TokenKind::IntLit(value)))
        }
    }

    /// Read a string literal delimited by `quote`
    fn read_string(&mut self, quote: char) -> Result<Token> {
        self.advance(); // consume opening quote
        let body_start = self.pos;

        loop {
            match self.peek() {
                None | Some('\n') => return Err(self.error("unterminated string literal")),
                Some(c) if c == quote => break,
                Some('\\') => {
                    self.advance();
                    if self.advance().is_none() {
                        return Err(self.error("unterminated string literal"));
                    }
                }
                Some(_) => {
                    self.advance();
                }
            }
        }

        let raw: String = self.source[body_start..self.pos].iter().collect();
        self.advance(); // consume closing quote
        let value = unescape(&raw).map_err(|reason| self.error(reason))?;
        Ok(self.make_token(TokenKind::StringLit(value)))
    }

    /// Read the raw body of `f"..."`. Escapes are left in place for the
    /// parser, which splits the body into text and `{expr}` segments.
    fn read_fstring(&mut self, quote: char) -> Result<Token> {
        self.advance(); // consume opening quote
        let body_start = self.pos;

        loop {
            match self.peek() {
                None | Some('\n') => return Err(self.error("unterminated template string")),
                Some(c) if c == quote => break,
                Some('\\') => {
                    self.advance();
                    if self.advance().is_none() {
                        return Err(self.error("unterminated template string"));
                    }
                }
                Some(_) => {
                    self.advance();
                }
            }
        }

        let body: String = self.source[body_start..self.pos].iter().collect();
        self.advance(); // consume closing quote
        Ok(self.make_token(TokenKind::FString(body)))
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Token> {
        if self.pending_dedents > 0 {
            self.pending_dedents -= 1;
            return Ok(self.make_token(TokenKind::Dedent));
        }

        if self.at_line_start && self.bracket_depth == 0 {
            if let Some(token) = self.handle_line_start()? {
                return Ok(token);
            }
        }

        self.skip_whitespace();
        self.mark_start();

        let c = match self.advance() {
            Some(c) => c,
            None => return Ok(Token::eof(self.make_span())),
        };

        if c == '\n' {
            self.at_line_start = true;
            return Ok(self.make_token(TokenKind::Newline));
        }

        // Identifiers and keywords
        if c.is_alphabetic() || c == '_' {
            return self.read_identifier();
        }

        // Numbers
        if c.is_ascii_digit() {
            self.pos = self.start;
            self.col = self.start_col;
            return self.read_number();
        }

        // String literals
        if c == '"' || c == '\'' {
            self.pos = self.start;
            self.col = self.start_col;
            return self.read_string(c);
        }

        // Operators and punctuation
        let kind = match c {
            '+' => {
                if self.eat('=') {
                    TokenKind::PlusEq
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                if self.eat('>') {
                    TokenKind::Arrow
                } else if self.eat('=') {
                    TokenKind::MinusEq
                } else {
                    TokenKind::Minus
                }
            }
            '*' => {
                if self.eat('*') {
                    TokenKind::StarStar
                } else if self.eat('=') {
                    TokenKind::StarEq
                } else {
                    TokenKind::Star
                }
            }
            '/' => {
                if self.eat('/') {
                    TokenKind::SlashSlash
                } else if self.eat('=') {
                    TokenKind::SlashEq
                } else {
                    TokenKind::Slash
                }
            }
            '%' => {
                if self.eat('=') {
                    TokenKind::PercentEq
                } else {
                    TokenKind::Percent
                }
            }
            '=' => {
                if self.eat('=') {
                    TokenKind::EqEq
                } else {
                    TokenKind::Eq
                }
            }
            '!' => {
                if self.eat('=') {
                    TokenKind::Ne
                } else {
                    TokenKind::Not
                }
            }
            '<' => {
                if self.eat('=') {
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            '&' if self.eat('&') => TokenKind::And,
            '|' if self.eat('|') => TokenKind::Or,
            '.' => TokenKind::Dot,
            ':' => TokenKind::Colon,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '(' | '[' | '{' => {
                self.bracket_depth += 1;
                match c {
                    '(' => TokenKind::LParen,
                    '[' => TokenKind::LBracket,
                    _ => TokenKind::LBrace,
                }
            }
            ')' | ']' | '}' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                match c {
                    ')' => TokenKind::RParen,
                    ']' => TokenKind::RBracket,
                    _ => TokenKind::RBrace,
                }
            }
            _ => return Err(self.error(format!("unexpected character '{}'", c))),
        };

        Ok(self.make_token(kind))
    }

    /// Tokenize the entire source and return all tokens.
    ///
    /// The stream always ends with NEWLINE (if the last line had content),
    /// one DEDENT per open indentation level, then EOF.
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens: Vec<Token> = Vec::new();
        loop {
            let token = self.next_token()?;
            if token.kind == TokenKind::Eof {
                let span = token.span;
                let needs_newline = tokens
                    .last()
                    .map_or(false, |t| !matches!(t.kind, TokenKind::Newline | TokenKind::Dedent));
                if needs_newline {
                    tokens.push(Token::new(TokenKind::Newline, span));
                }
                while self.indent_stack.len() > 1 {
                    self.indent_stack.pop();
                    tokens.push(Token::new(TokenKind::Dedent, span));
                }
                tokens.push(token);
                break;
            }
            tokens.push(token);
        }
        debug!("lexed {} tokens from file {}", tokens.len(), self.file_id);
        Ok(tokens)
    }
}

/// Decode the backslash escapes of a string body with host semantics.
/// Unrecognized escapes keep their backslash, as in Python.
pub fn unescape(raw: &str) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(escape) = chars.next() else {
            out.push('\\');
            break;
        };
        match escape {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            '\\' | '\'' | '"' => out.push(escape),
            // line continuation
            '\n' => {}
            '0'..='7' => {
                let mut code = escape as u32 - '0' as u32;
                for _ in 0..2 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(digit) => {
                            code = code * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(code).ok_or_else(|| format!("invalid octal escape \\{:o}", code))?);
            }
            'x' => out.push(hex_escape(&mut chars, 'x', 2)?),
            'u' => out.push(hex_escape(&mut chars, 'u', 4)?),
            'U' => out.push(hex_escape(&mut chars, 'U', 8)?),
            'N' => return Err("named unicode escapes (\\N{...}) are not supported".to_string()),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Ok(out)
}

/// `\x`, `\u` and `\U` take exactly `digits` hex digits
fn hex_escape(chars: &mut Peekable<Chars<'_>>, kind: char, digits: usize) -> std::result::Result<char, String> {
    let mut code: u32 = 0;
    for _ in 0..digits {
        let digit = chars
            .peek()
            .and_then(|c| c.to_digit(16))
            .ok_or_else(|| format!("truncated \\{} escape: expected {} hex digits", kind, digits))?;
        chars.next();
        code = code * 16 + digit;
    }
    char::from_u32(code).ok_or_else(|| format!("\\{} escape {:X} is not a valid character", kind, code))
}

/// Tokenize `source` belonging to file `file_id`
pub fn tokenize(source: &str, file_id: usize) -> Result<Vec<Token>> {
    Lexer::new(source, file_id).tokenize()
}
