//! Recursive-descent parser.

use std::path::Path;
use std::sync::Arc;

use lantern_debug::canonical_unit_path;
use smol_str::SmolStr;
use text_size::TextSize;

use crate::ast::{BinaryOp, Expr, Function, Script, Stmt, StmtKind, UnaryOp};
use crate::error::ScriptError;
use crate::lexer::{significant_tokens, Token, TokenKind};

type ParseResult<T> = Result<T, ScriptError>;

/// Parse `source` as the unit `unit`.
pub fn parse(unit: &str, source: &str) -> ParseResult<Script> {
    let tokens = significant_tokens(source);
    let lines = LineIndex::new(source);
    if let Some(bad) = tokens.iter().find(|token| token.kind == TokenKind::Error) {
        return Err(ScriptError::Lex {
            line: lines.line(bad.range.start()),
            text: bad.text(source).into(),
        });
    }
    let mut parser = Parser {
        source,
        unit: unit.into(),
        tokens,
        pos: 0,
        lines,
    };
    parser.script()
}

/// Read and parse a script file under its canonical unit identity.
pub fn parse_file(path: impl AsRef<Path>) -> ParseResult<Script> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&canonical_unit_path(path), &source)
}

struct LineIndex {
    starts: Vec<TextSize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut starts = vec![TextSize::from(0)];
        for (idx, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                starts.push(TextSize::from(u32::try_from(idx + 1).unwrap_or(u32::MAX)));
            }
        }
        Self { starts }
    }

    fn line(&self, offset: TextSize) -> u32 {
        let idx = match self.starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        };
        u32::try_from(idx + 1).unwrap_or(u32::MAX)
    }
}

struct Parser<'src> {
    source: &'src str,
    unit: SmolStr,
    tokens: Vec<Token>,
    pos: usize,
    lines: LineIndex,
}

impl Parser<'_> {
    fn script(&mut self) -> ParseResult<Script> {
        let mut functions = Vec::new();
        let mut body = Vec::new();
        loop {
            self.skip_newlines();
            match self.peek() {
                None => break,
                Some(TokenKind::KwFn) => functions.push(Arc::new(self.function()?)),
                Some(_) => body.push(self.statement()?),
            }
        }
        Ok(Script {
            unit: self.unit.clone(),
            functions,
            body,
        })
    }

    fn function(&mut self) -> ParseResult<Function> {
        let line = self.current_line();
        self.expect(TokenKind::KwFn, "'fn'")?;
        let name = self.ident("function name")?;
        self.expect(TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        if !self.eat(TokenKind::RParen) {
            loop {
                params.push(self.ident("parameter name")?);
                if self.eat(TokenKind::RParen) {
                    break;
                }
                self.expect(TokenKind::Comma, "',' or ')'")?;
            }
        }
        let body = self.block()?;
        self.expect(TokenKind::KwEnd, "'end'")?;
        self.end_of_statement()?;
        Ok(Function {
            name,
            params,
            body,
            line,
            unit: self.unit.clone(),
        })
    }

    /// Statements up to, not including, `end` or `else`.
    fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut body = Vec::new();
        loop {
            self.skip_newlines();
            match self.peek() {
                Some(TokenKind::KwEnd | TokenKind::KwElse) => return Ok(body),
                Some(TokenKind::KwFn) => {
                    return Err(self.error("functions may only be declared at top level"));
                }
                None => return Err(self.error("expected 'end'")),
                Some(_) => body.push(self.statement()?),
            }
        }
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        let line = self.current_line();
        let kind = match self.peek() {
            Some(TokenKind::KwLet) => {
                self.bump();
                let name = self.ident("variable name")?;
                self.expect(TokenKind::Assign, "'='")?;
                StmtKind::Let {
                    name,
                    value: self.expr()?,
                }
            }
            Some(TokenKind::KwSet) => {
                self.bump();
                let target = self.postfix()?;
                if !matches!(target, Expr::Var(_) | Expr::Index { .. } | Expr::Field { .. }) {
                    return Err(ScriptError::parse(line, "invalid assignment target"));
                }
                self.expect(TokenKind::Assign, "'='")?;
                StmtKind::Set {
                    target,
                    value: self.expr()?,
                }
            }
            Some(TokenKind::KwIf) => return self.if_statement(),
            Some(TokenKind::KwWhile) => {
                self.bump();
                let cond = self.expr()?;
                let body = self.block()?;
                self.expect(TokenKind::KwEnd, "'end'")?;
                StmtKind::While { cond, body }
            }
            Some(TokenKind::KwReturn) => {
                self.bump();
                if self.at_statement_end() {
                    StmtKind::Return(None)
                } else {
                    StmtKind::Return(Some(self.expr()?))
                }
            }
            Some(TokenKind::KwPrint) => {
                self.bump();
                StmtKind::Print(self.expr()?)
            }
            _ => StmtKind::Expr(self.expr()?),
        };
        self.end_of_statement()?;
        Ok(Stmt { line, kind })
    }

    /// `if`, with `else if` chains sharing the final `end`.
    fn if_statement(&mut self) -> ParseResult<Stmt> {
        let line = self.current_line();
        self.expect(TokenKind::KwIf, "'if'")?;
        let cond = self.expr()?;
        let then_body = self.block()?;
        let else_body = if self.eat(TokenKind::KwElse) {
            if self.peek() == Some(TokenKind::KwIf) {
                let nested = self.if_statement()?;
                return Ok(Stmt {
                    line,
                    kind: StmtKind::If {
                        cond,
                        then_body,
                        else_body: vec![nested],
                    },
                });
            }
            let body = self.block()?;
            self.expect(TokenKind::KwEnd, "'end'")?;
            body
        } else {
            self.expect(TokenKind::KwEnd, "'end'")?;
            Vec::new()
        };
        self.end_of_statement()?;
        Ok(Stmt {
            line,
            kind: StmtKind::If {
                cond,
                then_body,
                else_body,
            },
        })
    }

    fn expr(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.and_expr()?;
        while self.eat(TokenKind::KwOr) {
            let rhs = self.and_expr()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.not_expr()?;
        while self.eat(TokenKind::KwAnd) {
            let rhs = self.not_expr()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> ParseResult<Expr> {
        if self.eat(TokenKind::KwNot) {
            let operand = self.not_expr()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let lhs = self.additive()?;
        let op = match self.peek() {
            Some(TokenKind::Eq) => BinaryOp::Eq,
            Some(TokenKind::NotEq) => BinaryOp::NotEq,
            Some(TokenKind::Less) => BinaryOp::Less,
            Some(TokenKind::LessEq) => BinaryOp::LessEq,
            Some(TokenKind::Greater) => BinaryOp::Greater,
            Some(TokenKind::GreaterEq) => BinaryOp::GreaterEq,
            _ => return Ok(lhs),
        };
        self.bump();
        let rhs = self.additive()?;
        Ok(binary(op, lhs, rhs))
    }

    fn additive(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn multiplicative(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Star) => BinaryOp::Mul,
                Some(TokenKind::Slash) => BinaryOp::Div,
                Some(TokenKind::Percent) => BinaryOp::Rem,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if self.eat(TokenKind::Minus) {
            let operand = self.unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(TokenKind::LBracket) {
                let index = self.expr()?;
                self.expect(TokenKind::RBracket, "']'")?;
                expr = Expr::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.eat(TokenKind::Dot) {
                let name = self.ident("field name")?;
                expr = Expr::Field {
                    target: Box::new(expr),
                    name,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let Some(token) = self.tokens.get(self.pos).copied() else {
            return Err(self.error("expected expression"));
        };
        let text = token.text(self.source);
        let expr = match token.kind {
            TokenKind::KwNil => Expr::Nil,
            TokenKind::KwTrue => Expr::Bool(true),
            TokenKind::KwFalse => Expr::Bool(false),
            TokenKind::IntLiteral => match text.parse() {
                Ok(value) => Expr::Int(value),
                Err(_) => return Err(self.error("integer literal out of range")),
            },
            TokenKind::FloatLiteral => match text.parse() {
                Ok(value) => Expr::Float(value),
                Err(_) => return Err(self.error("invalid float literal")),
            },
            TokenKind::StringLiteral => Expr::Str(unescape(&text[1..text.len() - 1])),
            TokenKind::Ident => {
                self.bump();
                let name = SmolStr::from(text);
                if self.eat(TokenKind::LParen) {
                    let args = self.arguments()?;
                    return Ok(Expr::Call { name, args });
                }
                return Ok(Expr::Var(name));
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                return Ok(inner);
            }
            TokenKind::LBracket => {
                self.bump();
                let mut items = Vec::new();
                if !self.eat(TokenKind::RBracket) {
                    loop {
                        items.push(self.expr()?);
                        if self.eat(TokenKind::RBracket) {
                            break;
                        }
                        self.expect(TokenKind::Comma, "',' or ']'")?;
                    }
                }
                return Ok(Expr::List(items));
            }
            TokenKind::LBrace => {
                self.bump();
                let mut entries = Vec::new();
                if !self.eat(TokenKind::RBrace) {
                    loop {
                        let key = self.expr()?;
                        self.expect(TokenKind::Colon, "':'")?;
                        entries.push((key, self.expr()?));
                        if self.eat(TokenKind::RBrace) {
                            break;
                        }
                        self.expect(TokenKind::Comma, "',' or '}'")?;
                    }
                }
                return Ok(Expr::Map(entries));
            }
            TokenKind::KwNew => {
                self.bump();
                let type_name = self.ident("type name")?;
                self.expect(TokenKind::LBrace, "'{'")?;
                let mut fields = Vec::new();
                if !self.eat(TokenKind::RBrace) {
                    loop {
                        let name = self.ident("field name")?;
                        self.expect(TokenKind::Colon, "':'")?;
                        fields.push((name, self.expr()?));
                        if self.eat(TokenKind::RBrace) {
                            break;
                        }
                        self.expect(TokenKind::Comma, "',' or '}'")?;
                    }
                }
                return Ok(Expr::New { type_name, fields });
            }
            _ => return Err(self.error(format!("unexpected '{}'", text.escape_debug()))),
        };
        self.bump();
        Ok(expr)
    }

    fn arguments(&mut self) -> ParseResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.eat(TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat(TokenKind::RParen) {
                return Ok(args);
            }
            self.expect(TokenKind::Comma, "',' or ')'")?;
        }
    }

    fn peek(&self) -> Option<TokenKind> {
        self.tokens.get(self.pos).map(|token| token.kind)
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek() == Some(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> ParseResult<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn ident(&mut self, what: &str) -> ParseResult<SmolStr> {
        match self.tokens.get(self.pos) {
            Some(token) if token.kind == TokenKind::Ident => {
                let name = SmolStr::from(token.text(self.source));
                self.bump();
                Ok(name)
            }
            _ => Err(self.error(format!("expected {what}"))),
        }
    }

    fn skip_newlines(&mut self) {
        while self.eat(TokenKind::Newline) {}
    }

    fn at_statement_end(&self) -> bool {
        matches!(
            self.peek(),
            None | Some(TokenKind::Newline | TokenKind::KwEnd | TokenKind::KwElse)
        )
    }

    fn end_of_statement(&mut self) -> ParseResult<()> {
        match self.peek() {
            None => Ok(()),
            Some(TokenKind::Newline) => {
                self.bump();
                Ok(())
            }
            Some(_) => Err(self.error("expected end of line")),
        }
    }

    fn current_line(&self) -> u32 {
        match self.tokens.get(self.pos).or_else(|| self.tokens.last()) {
            Some(token) => self.lines.line(token.range.start()),
            None => 1,
        }
    }

    fn error(&self, message: impl Into<SmolStr>) -> ScriptError {
        ScriptError::parse(self.current_line(), message)
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
