//! Token definitions for Snake

use std::fmt;

use crate::utils::Span;

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn eof(span: Span) -> Self {
        Self { kind: TokenKind::Eof, span }
    }
}

/// Token kinds
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // ============ Layout ============
    /// End of a logical line
    Newline,
    /// Indentation increased
    Indent,
    /// Indentation decreased
    Dedent,
    /// End of file
    Eof,

    // ============ Keywords ============
    /// def
    Def,
    /// return
    Return,
    /// if
    If,
    /// elif
    Elif,
    /// else
    Else,
    /// while
    While,
    /// for
    For,
    /// in
    In,
    /// is
    Is,
    /// break
    Break,
    /// continue
    Continue,
    /// pass
    Pass,
    /// struct
    Struct,
    /// enum
    Enum,
    /// const
    Const,
    /// import
    Import,
    /// from
    From,
    /// as
    As,
    /// try
    Try,
    /// except
    Except,
    /// finally
    Finally,
    /// raise
    Raise,
    /// orelse (fallback expression)
    Orelse,
    /// `and` or `&&`
    And,
    /// `or` or `||`
    Or,
    /// `not` or `!`
    Not,
    /// True
    True,
    /// False
    False,
    /// None
    None,

    // ============ Identifiers and Literals ============
    /// Identifier (variable name, function name, etc.)
    Ident(String),
    /// Integer literal
    IntLit(i64),
    /// Floating-point literal
    FloatLit(f64),
    /// String literal (escapes processed)
    StringLit(String),
    /// Templated string `f"..."`, raw body between the quotes
    FString(String),

    // ============ Operators ============
    /// +
    Plus,
    /// -
    Minus,
    /// *
    Star,
    /// **
    StarStar,
    /// /
    Slash,
    /// //
    SlashSlash,
    /// %
    Percent,
    /// =
    Eq,
    /// ==
    EqEq,
    /// !=
    Ne,
    /// <
    Lt,
    /// <=
    Le,
    /// >
    Gt,
    /// >=
    Ge,
    /// +=
    PlusEq,
    /// -=
    MinusEq,
    /// *=
    StarEq,
    /// /=
    SlashEq,
    /// %=
    PercentEq,
    /// ->
    Arrow,
    /// .
    Dot,

    // ============ Delimiters ============
    /// (
    LParen,
    /// )
    RParen,
    /// [
    LBracket,
    /// ]
    RBracket,
    /// {
    LBrace,
    /// }
    RBrace,
    /// ,
    Comma,
    /// :
    Colon,
    /// ;
    Semicolon,
}

impl TokenKind {
    /// Try to convert an identifier to a keyword.
    ///
    /// The symbolic spellings `&&`, `||` and `!` are produced by the lexer
    /// directly as `And`, `Or` and `Not`.
    pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
        match s {
            "def" => Some(TokenKind::Def),
            "return" => Some(TokenKind::Return),
            "if" => Some(TokenKind::If),
            "elif" => Some(TokenKind::Elif),
            "else" => Some(TokenKind::Else),
            "while" => Some(TokenKind::While),
            "for" => Some(TokenKind::For),
            "in" => Some(TokenKind::In),
            "is" => Some(TokenKind::Is),
            "break" => Some(TokenKind::Break),
            "continue" => Some(TokenKind::Continue),
            "pass" => Some(TokenKind::Pass),
            "struct" => Some(TokenKind::Struct),
            "enum" => Some(TokenKind::Enum),
            "const" => Some(TokenKind::Const),
            "import" => Some(TokenKind::Import),
            "from" => Some(TokenKind::From),
            "as" => Some(TokenKind::As),
            "try" => Some(TokenKind::Try),
            "except" => Some(TokenKind::Except),
            "finally" => Some(TokenKind::Finally),
            "raise" => Some(TokenKind::Raise),
            "orelse" => Some(TokenKind::Orelse),
            "and" => Some(TokenKind::And),
            "or" => Some(TokenKind::Or),
            "not" => Some(TokenKind::Not),
            "True" => Some(TokenKind::True),
            "False" => Some(TokenKind::False),
            "None" => Some(TokenKind::None),
            _ => None,
        }
    }

    /// Get the precedence of a binary operator (for Pratt parsing).
    /// Returns None if not a binary operator.
    ///
    /// `not` sits at level 3 as a prefix operator and unary `-`/`+` at 7;
    /// the parser handles both.
    pub fn binary_precedence(&self) -> Option<u8> {
        match self {
            // Logical OR (lowest)
            TokenKind::Or => Some(1),

            // Logical AND
            TokenKind::And => Some(2),

            // Comparison, membership, identity
            TokenKind::EqEq
            | TokenKind::Ne
            | TokenKind::Lt
            | TokenKind::Le
            | TokenKind::Gt
            | TokenKind::Ge
            | TokenKind::In
            | TokenKind::Is => Some(4),

            // Additive
            TokenKind::Plus | TokenKind::Minus => Some(5),

            // Multiplicative
            TokenKind::Star | TokenKind::Slash | TokenKind::SlashSlash | TokenKind::Percent => {
                Some(6)
            }

            // Power binds tighter than unary minus on its left
            TokenKind::StarStar => Some(8),

            _ => None,
        }
    }

    /// Whether this token ends a logical line or block
    pub fn is_line_end(&self) -> bool {
        matches!(self, TokenKind::Newline | TokenKind::Dedent | TokenKind::Eof)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Newline => "end of line",
            TokenKind::Indent => "indent",
            TokenKind::Dedent => "dedent",
            TokenKind::Eof => "end of file",
            TokenKind::Def => "'def'",
            TokenKind::Return => "'return'",
            TokenKind::If => "'if'",
            TokenKind::Elif => "'elif'",
            TokenKind::Else => "'else'",
            TokenKind::While => "'while'",
            TokenKind::For => "'for'",
            TokenKind::In => "'in'",
            TokenKind::Is => "'is'",
            TokenKind::Break => "'break'",
            TokenKind::Continue => "'continue'",
            TokenKind::Pass => "'pass'",
            TokenKind::Struct => "'struct'",
            TokenKind::Enum => "'enum'",
            TokenKind::Const => "'const'",
            TokenKind::Import => "'import'",
            TokenKind::From => "'from'",
            TokenKind::As => "'as'",
            TokenKind::Try => "'try'",
            TokenKind::Except => "'except'",
            TokenKind::Finally => "'finally'",
            TokenKind::Raise => "'raise'",
            TokenKind::Orelse => "'orelse'",
            TokenKind::And => "'and'",
            TokenKind::Or => "'or'",
            TokenKind::Not => "'not'",
            TokenKind::True => "'True'",
            TokenKind::False => "'False'",
            TokenKind::None => "'None'",
            TokenKind::Ident(name) => return write!(f, "identifier '{}'", name),
            TokenKind::IntLit(v) => return write!(f, "integer {}", v),
            TokenKind::FloatLit(v) => return write!(f, "float {}", v),
            TokenKind::StringLit(_) => "string literal",
            TokenKind::FString(_) => "template string",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::StarStar => "'**'",
            TokenKind::Slash => "'/'",
            TokenKind::SlashSlash => "'//'",
            TokenKind::Percent => "'%'",
            TokenKind::Eq => "'='",
            TokenKind::EqEq => "'=='",
            TokenKind::Ne => "'!='",
            TokenKind::Lt => "'<'",
            TokenKind::Le => "'<='",
            TokenKind::Gt => "'>'",
            TokenKind::Ge => "'>='",
            TokenKind::PlusEq => "'+='",
            TokenKind::MinusEq => "'-='",
            TokenKind::StarEq => "'*='",
            TokenKind::SlashEq => "'/='",
            TokenKind::PercentEq => "'%='",
            TokenKind::Arrow => "'->'",
            TokenKind::Dot => "'.'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::Comma => "','",
            TokenKind::Colon => "':'",
            TokenKind::Semicolon => "';'",
        };
        f.write_str(text)
    }
}
