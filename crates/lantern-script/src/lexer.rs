//! Lexer for lantern scripts.
//!
//! Newlines are significant: they terminate statements. Inside brackets they
//! are dropped so list and map literals may span lines.

use logos::Logos;
use text_size::{TextRange, TextSize};

/// Token kinds of the scripting language.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    #[regex(r"[ \t\r]+")]
    Whitespace,

    /// `# ...` up to the end of the line.
    #[regex(r"#[^\n]*", allow_greedy = true)]
    Comment,

    #[token("\n")]
    Newline,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,

    #[token("=")]
    Assign,
    #[token("==")]
    Eq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEq,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEq,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,

    #[token("fn")]
    KwFn,
    #[token("let")]
    KwLet,
    #[token("set")]
    KwSet,
    #[token("if")]
    KwIf,
    #[token("else")]
    KwElse,
    #[token("while")]
    KwWhile,
    #[token("return")]
    KwReturn,
    #[token("print")]
    KwPrint,
    #[token("end")]
    KwEnd,
    #[token("new")]
    KwNew,
    #[token("and")]
    KwAnd,
    #[token("or")]
    KwOr,
    #[token("not")]
    KwNot,
    #[token("true")]
    KwTrue,
    #[token("false")]
    KwFalse,
    #[token("nil")]
    KwNil,

    #[regex(r"[0-9]+")]
    IntLiteral,

    #[regex(r"[0-9]+\.[0-9]+")]
    FloatLiteral,

    /// Double-quoted string with backslash escapes.
    #[regex(r#""([^"\\\n]|\\.)*""#)]
    StringLiteral,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    Error,
}

impl TokenKind {
    #[must_use]
    pub fn is_trivia(self) -> bool {
        matches!(self, TokenKind::Whitespace | TokenKind::Comment)
    }

    fn opens(self) -> bool {
        matches!(self, TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace)
    }

    fn closes(self) -> bool {
        matches!(self, TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub range: TextRange,
}

impl Token {
    #[must_use]
    pub fn new(kind: TokenKind, range: TextRange) -> Self {
        Self { kind, range }
    }

    #[must_use]
    pub fn text<'src>(&self, source: &'src str) -> &'src str {
        &source[self.range]
    }
}

/// Iterator over all tokens, trivia included. Unrecognized input becomes
/// [`TokenKind::Error`].
pub struct Lexer<'src> {
    inner: logos::Lexer<'src, TokenKind>,
}

impl<'src> Lexer<'src> {
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        Self {
            inner: TokenKind::lexer(source),
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        let kind = self.inner.next()?.unwrap_or(TokenKind::Error);
        let span = self.inner.span();
        let range = TextRange::new(offset(span.start), offset(span.end));
        Some(Token::new(kind, range))
    }
}

fn offset(value: usize) -> TextSize {
    TextSize::from(u32::try_from(value).unwrap_or(u32::MAX))
}

/// Tokens the parser consumes: no trivia, no newlines inside brackets.
#[must_use]
pub fn significant_tokens(source: &str) -> Vec<Token> {
    let mut depth = 0_usize;
    let mut tokens = Vec::new();
    for token in Lexer::new(source) {
        if token.kind.is_trivia() {
            continue;
        }
        if token.kind.opens() {
            depth += 1;
        } else if token.kind.closes() {
            depth = depth.saturating_sub(1);
        } else if token.kind == TokenKind::Newline && depth > 0 {
            continue;
        }
        tokens.push(token);
    }
    tokens
}
