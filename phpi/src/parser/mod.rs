//! Recursive-descent parser
//!
//! Precedence, lowest first: `or`, `xor`, `and`, assignment, `?:`, `??`,
//! `||`, `&&`, `|`, `^`, `&`, equality, relational, `.`, shifts, additive,
//! multiplicative, prefix operators, `**`. Assignment is recognised right
//! after a variable operand, which is what makes `1 + $a = 2` legal.

mod interpolate;

#[cfg(test)]
mod tests;

use crate::ast::{
    ArrayItem, BinOp, Callee, CastType, CondBlock, ConstItem, Expr, ForeachLoop, FunctionDef,
    IncDecOp, IncludeKind, LineIndex, MagicConst, NodeIdGen, Param, Program, Span, Spanned, Stmt,
    TypeHint, UnOp, VarName,
};
use crate::error::{CompileError, Result};
use crate::lexer::{Number, Token};
use std::mem::discriminant;

/// Parse tokens into AST
#[tracing::instrument(level = "debug", skip_all, fields(filename = filename))]
pub fn parse(
    filename: &str,
    source: &str,
    tokens: Vec<(Token, Span)>,
    ids: &mut NodeIdGen,
) -> Result<Program> {
    let eof = Span::new(source.len(), source.len());
    let mut parser = Parser::new(tokens, ids, eof);
    let mut statements = Vec::new();
    while !parser.at_end() {
        statements.push(parser.statement()?);
    }
    tracing::debug!(statements = statements.len(), "parsed program");
    Ok(Program {
        filename: filename.to_string(),
        statements,
        lines: LineIndex::new(source),
    })
}

struct Parser<'a> {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    ids: &'a mut NodeIdGen,
    eof: Span,
    prev_end: usize,
}

enum AssignKind {
    Plain,
    Compound(BinOp),
    Coalesce,
}

type BinaryLevel = fn(&Token) -> Option<BinOp>;

/// Left-associative binary levels from `||` down to multiplicative
const BINARY_LEVELS: &[BinaryLevel] = &[
    |t| matches!(t, Token::PipePipe).then_some(BinOp::Or),
    |t| matches!(t, Token::AmpAmp).then_some(BinOp::And),
    |t| matches!(t, Token::Pipe).then_some(BinOp::BitOr),
    |t| matches!(t, Token::Caret).then_some(BinOp::BitXor),
    |t| matches!(t, Token::Amp).then_some(BinOp::BitAnd),
    |t| match t {
        Token::EqEq => Some(BinOp::Eq),
        Token::NotEq => Some(BinOp::Ne),
        Token::EqEqEq => Some(BinOp::Identical),
        Token::NotEqEq => Some(BinOp::NotIdentical),
        Token::Spaceship => Some(BinOp::Spaceship),
        _ => None,
    },
    |t| match t {
        Token::Lt => Some(BinOp::Lt),
        Token::Le => Some(BinOp::Le),
        Token::Gt => Some(BinOp::Gt),
        Token::Ge => Some(BinOp::Ge),
        _ => None,
    },
    |t| matches!(t, Token::Dot).then_some(BinOp::Concat),
    |t| match t {
        Token::Shl => Some(BinOp::Shl),
        Token::Shr => Some(BinOp::Shr),
        _ => None,
    },
    |t| match t {
        Token::Plus => Some(BinOp::Add),
        Token::Minus => Some(BinOp::Sub),
        _ => None,
    },
    |t| match t {
        Token::Star => Some(BinOp::Mul),
        Token::Slash => Some(BinOp::Div),
        Token::Percent => Some(BinOp::Mod),
        _ => None,
    },
];

fn assign_kind(token: &Token) -> Option<AssignKind> {
    let op = match token {
        Token::Assign => return Some(AssignKind::Plain),
        Token::CoalesceAssign => return Some(AssignKind::Coalesce),
        Token::PlusAssign => BinOp::Add,
        Token::MinusAssign => BinOp::Sub,
        Token::StarAssign => BinOp::Mul,
        Token::SlashAssign => BinOp::Div,
        Token::DotAssign => BinOp::Concat,
        Token::PercentAssign => BinOp::Mod,
        Token::PowAssign => BinOp::Pow,
        Token::AmpAssign => BinOp::BitAnd,
        Token::PipeAssign => BinOp::BitOr,
        Token::CaretAssign => BinOp::BitXor,
        Token::ShlAssign => BinOp::Shl,
        Token::ShrAssign => BinOp::Shr,
        _ => return None,
    };
    Some(AssignKind::Compound(op))
}

/// Type named inside a `(type)` cast
fn cast_type(name: &str) -> Option<CastType> {
    match name.to_ascii_lowercase().as_str() {
        "int" | "integer" => Some(CastType::Int),
        "float" | "double" | "real" => Some(CastType::Float),
        "string" | "binary" => Some(CastType::String),
        "bool" | "boolean" => Some(CastType::Bool),
        _ => None,
    }
}

fn include_kind(token: &Token) -> Option<IncludeKind> {
    match token {
        Token::Include => Some(IncludeKind::Include),
        Token::IncludeOnce => Some(IncludeKind::IncludeOnce),
        Token::Require => Some(IncludeKind::Require),
        Token::RequireOnce => Some(IncludeKind::RequireOnce),
        _ => None,
    }
}

/// Token description used in "unexpected ..." messages
fn describe(token: &Token) -> String {
    match token {
        Token::Variable(name) => format!("variable \"${name}\""),
        Token::Ident(name) => format!("identifier \"{name}\""),
        Token::Number(Number::Int(n)) => format!("integer \"{n}\""),
        Token::Number(Number::Float(n)) => format!("floating-point number \"{n}\""),
        Token::SingleQuoted(s) => format!("single-quoted string \"{s}\""),
        Token::DoubleQuoted(s) => format!("double-quoted string \"{s}\""),
        Token::InlineHtml(_) => "inline html".to_string(),
        other => format!("token \"{other}\""),
    }
}

fn binary(left: Spanned<Expr>, op: BinOp, right: Spanned<Expr>) -> Spanned<Expr> {
    let span = left.span.merge(right.span);
    Spanned::new(
        Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
        span,
    )
}

impl<'a> Parser<'a> {
    fn new(tokens: Vec<(Token, Span)>, ids: &'a mut NodeIdGen, eof: Span) -> Self {
        Parser {
            tokens,
            pos: 0,
            ids,
            eof,
            prev_end: 0,
        }
    }

    // ---- token cursor ----

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|(t, _)| t)
    }

    /// `(type)` at the cursor
    fn cast_ahead(&self) -> Option<CastType> {
        if !self.check(&Token::LParen) || !matches!(self.peek_nth(2), Some(Token::RParen)) {
            return None;
        }
        match self.peek_nth(1)? {
            Token::Array => Some(CastType::Array),
            Token::Ident(name) => cast_type(name),
            _ => None,
        }
    }

    fn span(&self) -> Span {
        self.tokens.get(self.pos).map(|(_, s)| *s).unwrap_or(self.eof)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn check(&self, kind: &Token) -> bool {
        self.peek()
            .is_some_and(|t| discriminant(t) == discriminant(kind))
    }

    fn advance(&mut self) -> Option<Span> {
        let span = self.tokens.get(self.pos).map(|(_, s)| *s)?;
        self.pos += 1;
        self.prev_end = span.end;
        Some(span)
    }

    fn eat(&mut self, kind: &Token) -> Option<Span> {
        if self.check(kind) { self.advance() } else { None }
    }

    fn expect(&mut self, kind: &Token) -> Result<Span> {
        match self.eat(kind) {
            Some(span) => Ok(span),
            None => Err(self.expected(&format!("\"{kind}\""))),
        }
    }

    /// Span from `start` up to the end of the last consumed token
    fn from(&self, start: Span) -> Span {
        Span::new(start.start, self.prev_end.max(start.start))
    }

    fn unexpected(&self) -> CompileError {
        let found = self
            .peek()
            .map(describe)
            .unwrap_or_else(|| "end of file".to_string());
        CompileError::parser(format!("syntax error, unexpected {found}"), self.span())
    }

    fn expected(&self, what: &str) -> CompileError {
        let found = self
            .peek()
            .map(describe)
            .unwrap_or_else(|| "end of file".to_string());
        CompileError::parser(
            format!("syntax error, unexpected {found}, expecting {what}"),
            self.span(),
        )
    }

    // ---- statements ----

    fn statement(&mut self) -> Result<Spanned<Stmt>> {
        let start = self.span();
        let Some(token) = self.peek().cloned() else {
            return Err(self.unexpected());
        };
        let stmt = match token {
            Token::InlineHtml(text) => {
                self.advance();
                Stmt::InlineHtml(text)
            }
            Token::OpenTagEcho | Token::Echo => {
                self.advance();
                let exprs = self.expr_list()?;
                self.end_statement()?;
                Stmt::Echo(exprs)
            }
            Token::LBrace => {
                self.advance();
                Stmt::Block(self.block_rest()?)
            }
            Token::If => self.if_statement()?,
            Token::While => self.while_statement()?,
            Token::Do => self.do_while_statement()?,
            Token::For => self.for_statement()?,
            Token::Foreach => self.foreach_statement()?,
            Token::Break => {
                self.advance();
                Stmt::Break(self.loop_level("break")?)
            }
            Token::Continue => {
                self.advance();
                Stmt::Continue(self.loop_level("continue")?)
            }
            Token::Return => {
                self.advance();
                let value = if self.check(&Token::Semicolon) || self.at_end() {
                    None
                } else {
                    Some(self.expr()?)
                };
                self.end_statement()?;
                Stmt::Return(value)
            }
            Token::Function if matches!(self.peek_nth(1), Some(Token::Ident(_))) => {
                Stmt::FunctionDef(self.function_def()?)
            }
            Token::Const => self.const_statement()?,
            Token::Global => self.global_statement()?,
            Token::Unset => self.unset_statement()?,
            Token::Semicolon => {
                self.advance();
                Stmt::Empty
            }
            _ => {
                let expr = self.expr()?;
                self.end_statement()?;
                Stmt::Expr(expr)
            }
        };
        Ok(Spanned::new(stmt, self.from(start)))
    }

    fn end_statement(&mut self) -> Result<()> {
        self.expect(&Token::Semicolon).map(|_| ())
    }

    /// Statements up to and including the closing `}`
    fn block_rest(&mut self) -> Result<Vec<Spanned<Stmt>>> {
        let mut stmts = Vec::new();
        while !self.check(&Token::RBrace) {
            if self.at_end() {
                return Err(self.expected("\"}\""));
            }
            stmts.push(self.statement()?);
        }
        self.advance();
        Ok(stmts)
    }

    /// Body of an alternative-syntax construct, up to (not including) one of `ends`
    fn alt_body(&mut self, ends: &[Token]) -> Result<Box<Spanned<Stmt>>> {
        let start = self.span();
        let mut stmts = Vec::new();
        while !ends.iter().any(|end| self.check(end)) {
            if self.at_end() {
                let last = ends.last().map(Token::to_string).unwrap_or_default();
                return Err(self.expected(&format!("\"{last}\"")));
            }
            stmts.push(self.statement()?);
        }
        Ok(Box::new(Spanned::new(Stmt::Block(stmts), self.from(start))))
    }

    fn paren_expr(&mut self) -> Result<Spanned<Expr>> {
        self.expect(&Token::LParen)?;
        let expr = self.expr()?;
        self.expect(&Token::RParen)?;
        Ok(expr)
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        self.expect(&Token::If)?;
        let cond = self.paren_expr()?;
        if self.eat(&Token::Colon).is_some() {
            return self.alt_if(cond);
        }

        let body = Box::new(self.statement()?);
        let mut branches = vec![CondBlock { cond, body }];
        let mut else_branch = None;
        loop {
            if self.eat(&Token::ElseIf).is_some() {
                let cond = self.paren_expr()?;
                let body = Box::new(self.statement()?);
                branches.push(CondBlock { cond, body });
            } else if self.eat(&Token::Else).is_some() {
                else_branch = Some(Box::new(self.statement()?));
                break;
            } else {
                break;
            }
        }
        Ok(Stmt::If {
            branches,
            else_branch,
        })
    }

    /// `if (c): ... elseif (c): ... else: ... endif;`
    fn alt_if(&mut self, cond: Spanned<Expr>) -> Result<Stmt> {
        let ends = [Token::ElseIf, Token::Else, Token::EndIf];
        let body = self.alt_body(&ends)?;
        let mut branches = vec![CondBlock { cond, body }];
        let mut else_branch = None;
        loop {
            if self.eat(&Token::ElseIf).is_some() {
                let cond = self.paren_expr()?;
                self.expect(&Token::Colon)?;
                let body = self.alt_body(&ends)?;
                branches.push(CondBlock { cond, body });
            } else if self.eat(&Token::Else).is_some() {
                self.expect(&Token::Colon)?;
                else_branch = Some(self.alt_body(&[Token::EndIf])?);
                break;
            } else {
                break;
            }
        }
        self.expect(&Token::EndIf)?;
        self.end_statement()?;
        Ok(Stmt::If {
            branches,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> Result<Stmt> {
        self.expect(&Token::While)?;
        let cond = self.paren_expr()?;
        let body = if self.eat(&Token::Colon).is_some() {
            let body = self.alt_body(&[Token::EndWhile])?;
            self.expect(&Token::EndWhile)?;
            self.end_statement()?;
            body
        } else {
            Box::new(self.statement()?)
        };
        Ok(Stmt::While(CondBlock { cond, body }))
    }

    fn do_while_statement(&mut self) -> Result<Stmt> {
        self.expect(&Token::Do)?;
        let body = Box::new(self.statement()?);
        self.expect(&Token::While)?;
        let cond = self.paren_expr()?;
        self.end_statement()?;
        Ok(Stmt::DoWhile(CondBlock { cond, body }))
    }

    fn for_statement(&mut self) -> Result<Stmt> {
        self.expect(&Token::For)?;
        self.expect(&Token::LParen)?;
        let init = self.for_exprs(&Token::Semicolon)?;
        self.expect(&Token::Semicolon)?;
        let cond = self.for_exprs(&Token::Semicolon)?;
        self.expect(&Token::Semicolon)?;
        let step = self.for_exprs(&Token::RParen)?;
        self.expect(&Token::RParen)?;

        let body = if self.eat(&Token::Colon).is_some() {
            let body = self.alt_body(&[Token::EndFor])?;
            self.expect(&Token::EndFor)?;
            self.end_statement()?;
            body
        } else {
            Box::new(self.statement()?)
        };
        Ok(Stmt::For {
            init,
            cond,
            step,
            body,
        })
    }

    fn foreach_statement(&mut self) -> Result<Stmt> {
        self.expect(&Token::Foreach)?;
        self.expect(&Token::LParen)?;
        let subject = self.expr()?;
        self.expect(&Token::As)?;
        let first = self.foreach_target()?;
        let (key, value) = match self.eat(&Token::FatArrow) {
            Some(_) => (Some(first), self.foreach_target()?),
            None => (None, first),
        };
        self.expect(&Token::RParen)?;

        let body = if self.eat(&Token::Colon).is_some() {
            let body = self.alt_body(&[Token::EndForeach])?;
            self.expect(&Token::EndForeach)?;
            self.end_statement()?;
            body
        } else {
            Box::new(self.statement()?)
        };
        Ok(Stmt::Foreach(ForeachLoop {
            subject,
            key,
            value,
            body,
        }))
    }

    /// Variable a `foreach` assigns each key or value to
    fn foreach_target(&mut self) -> Result<Spanned<Expr>> {
        if !matches!(self.peek(), Some(Token::Variable(_) | Token::Dollar)) {
            return Err(self.expected("variable"));
        }
        self.postfix()
    }

    fn for_exprs(&mut self, end: &Token) -> Result<Vec<Spanned<Expr>>> {
        if self.check(end) {
            return Ok(Vec::new());
        }
        self.expr_list()
    }

    /// Optional positive level after `break`/`continue`, then `;`
    fn loop_level(&mut self, keyword: &str) -> Result<u32> {
        let level = match self.peek() {
            Some(Token::Number(Number::Int(n))) => {
                let n = *n;
                let span = self.span();
                self.advance();
                u32::try_from(n).ok().filter(|n| *n >= 1).ok_or_else(|| {
                    CompileError::parser(
                        format!("'{keyword}' operator accepts only positive integers"),
                        span,
                    )
                })?
            }
            _ => 1,
        };
        self.end_statement()?;
        Ok(level)
    }

    fn function_def(&mut self) -> Result<FunctionDef> {
        let start = self.expect(&Token::Function)?;
        let name = self.ident()?;
        self.expect(&Token::LParen)?;
        let mut params = Vec::new();
        while !self.check(&Token::RParen) {
            params.push(self.param()?);
            if self.eat(&Token::Comma).is_none() {
                break;
            }
        }
        self.expect(&Token::RParen)?;
        if let Some(early) = params.iter().rev().skip(1).find(|p| p.variadic) {
            return Err(CompileError::parser(
                "Only the last parameter can be variadic",
                early.name.span,
            ));
        }

        let ret_ty = match self.eat(&Token::Colon) {
            Some(_) => Some(self.type_hint()?),
            None => None,
        };
        self.expect(&Token::LBrace)?;
        let body = self.block_rest()?;
        Ok(FunctionDef {
            id: self.ids.fresh(),
            name,
            params,
            ret_ty,
            body,
            span: self.from(start),
        })
    }

    fn param(&mut self) -> Result<Param> {
        let ty = match self.peek() {
            Some(Token::Variable(_) | Token::Ellipsis) => None,
            _ => Some(self.type_hint()?),
        };
        let variadic = self.eat(&Token::Ellipsis).is_some();
        let name = match self.peek() {
            Some(Token::Variable(name)) => format!("${name}"),
            _ => return Err(self.expected("variable")),
        };
        let span = self.span();
        self.advance();
        let default = match self.eat(&Token::Assign) {
            Some(_) if variadic => {
                return Err(CompileError::parser(
                    "Variadic parameter cannot have a default value",
                    span,
                ));
            }
            Some(_) => Some(self.expr()?),
            None => None,
        };
        Ok(Param {
            name: Spanned::new(name, span),
            ty,
            default,
            variadic,
        })
    }

    fn type_hint(&mut self) -> Result<TypeHint> {
        let nullable = self.eat(&Token::Question).is_some();
        let mut types = vec![self.type_name()?];
        while self.eat(&Token::Pipe).is_some() {
            types.push(self.type_name()?);
        }
        if nullable {
            types.push("null".to_string());
        }
        Ok(TypeHint::new(types))
    }

    fn type_name(&mut self) -> Result<String> {
        let name = match self.peek() {
            Some(Token::Ident(name)) => name.to_ascii_lowercase(),
            Some(Token::Array) => "array".to_string(),
            _ => return Err(self.expected("type")),
        };
        self.advance();
        Ok(name)
    }

    fn ident(&mut self) -> Result<Spanned<String>> {
        let name = match self.peek() {
            Some(Token::Ident(name)) => name.clone(),
            _ => return Err(self.expected("identifier")),
        };
        let span = self.span();
        self.advance();
        Ok(Spanned::new(name, span))
    }

    fn const_statement(&mut self) -> Result<Stmt> {
        self.expect(&Token::Const)?;
        let mut items = Vec::new();
        loop {
            let name = self.ident()?;
            self.expect(&Token::Assign)?;
            let value = self.expr()?;
            items.push(ConstItem { name, value });
            if self.eat(&Token::Comma).is_none() {
                break;
            }
        }
        self.end_statement()?;
        Ok(Stmt::Const(items))
    }

    fn global_statement(&mut self) -> Result<Stmt> {
        self.expect(&Token::Global)?;
        let mut names = Vec::new();
        loop {
            let name = match self.peek() {
                Some(Token::Variable(name)) => name.clone(),
                _ => return Err(self.expected("variable")),
            };
            let span = self.span();
            self.advance();
            names.push(Spanned::new(name, span));
            if self.eat(&Token::Comma).is_none() {
                break;
            }
        }
        self.end_statement()?;
        Ok(Stmt::Global(names))
    }

    fn unset_statement(&mut self) -> Result<Stmt> {
        self.expect(&Token::Unset)?;
        let targets = self.call_args()?;
        if let Some(bad) = targets.iter().find(|t| !t.node.is_variable()) {
            return Err(CompileError::parser(
                "Cannot use unset() on the result of an expression",
                bad.span,
            ));
        }
        self.end_statement()?;
        Ok(Stmt::Unset(targets))
    }

    // ---- expressions ----

    fn expr(&mut self) -> Result<Spanned<Expr>> {
        self.keyword_or()
    }

    fn expr_list(&mut self) -> Result<Vec<Spanned<Expr>>> {
        let mut exprs = vec![self.expr()?];
        while self.eat(&Token::Comma).is_some() {
            exprs.push(self.expr()?);
        }
        Ok(exprs)
    }

    fn keyword_or(&mut self) -> Result<Spanned<Expr>> {
        let mut left = self.keyword_xor()?;
        while self.eat(&Token::LogicalOr).is_some() {
            let right = self.keyword_xor()?;
            left = binary(left, BinOp::Or, right);
        }
        Ok(left)
    }

    fn keyword_xor(&mut self) -> Result<Spanned<Expr>> {
        let mut left = self.keyword_and()?;
        while self.eat(&Token::LogicalXor).is_some() {
            let right = self.keyword_and()?;
            left = binary(left, BinOp::Xor, right);
        }
        Ok(left)
    }

    fn keyword_and(&mut self) -> Result<Spanned<Expr>> {
        let mut left = self.ternary()?;
        while self.eat(&Token::LogicalAnd).is_some() {
            let right = self.ternary()?;
            left = binary(left, BinOp::And, right);
        }
        Ok(left)
    }

    /// Assignment-level expression: the right-hand side of `=`, `print`'s operand
    fn ternary(&mut self) -> Result<Spanned<Expr>> {
        let mut cond = self.coalesce()?;
        while self.eat(&Token::Question).is_some() {
            let then_branch = match self.eat(&Token::Colon) {
                Some(_) => None,
                None => {
                    let then = self.ternary()?;
                    self.expect(&Token::Colon)?;
                    Some(Box::new(then))
                }
            };
            let else_branch = self.coalesce()?;
            let span = cond.span.merge(else_branch.span);
            cond = Spanned::new(
                Expr::Ternary {
                    cond: Box::new(cond),
                    then_branch,
                    else_branch: Box::new(else_branch),
                },
                span,
            );
        }
        Ok(cond)
    }

    fn coalesce(&mut self) -> Result<Spanned<Expr>> {
        let left = self.binary_level(0)?;
        if self.eat(&Token::Coalesce).is_none() {
            return Ok(left);
        }
        let right = self.coalesce()?;
        let span = left.span.merge(right.span);
        Ok(Spanned::new(
            Expr::Coalesce {
                left: Box::new(left),
                right: Box::new(right),
            },
            span,
        ))
    }

    fn binary_level(&mut self, level: usize) -> Result<Spanned<Expr>> {
        let Some(op_of) = BINARY_LEVELS.get(level) else {
            return self.unary();
        };
        let mut left = self.binary_level(level + 1)?;
        while let Some(op) = self.peek().and_then(op_of) {
            self.advance();
            let right = self.binary_level(level + 1)?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Spanned<Expr>> {
        let start = self.span();
        let Some(token) = self.peek().cloned() else {
            return Err(self.unexpected());
        };

        let unary_op = match token {
            Token::Bang => Some(UnOp::Not),
            Token::Minus => Some(UnOp::Neg),
            Token::Plus => Some(UnOp::Plus),
            Token::Tilde => Some(UnOp::BitNot),
            _ => None,
        };
        let node = if let Some(op) = unary_op {
            self.advance();
            let expr = self.unary()?;
            Expr::Unary {
                op,
                expr: Box::new(expr),
            }
        } else if let Some(ty) = self.cast_ahead() {
            for _ in 0..3 {
                self.advance();
            }
            let expr = self.unary()?;
            Expr::Cast {
                ty,
                expr: Box::new(expr),
            }
        } else {
            match token {
                Token::At => {
                    self.advance();
                    Expr::Silence(Box::new(self.unary()?))
                }
                Token::Inc | Token::Dec => {
                    self.advance();
                    let target = self.unary()?;
                    if !target.node.is_variable() {
                        return Err(CompileError::parser(
                            "Cannot increment/decrement the result of an expression",
                            target.span,
                        ));
                    }
                    Expr::IncDec {
                        op: if token == Token::Inc { IncDecOp::Inc } else { IncDecOp::Dec },
                        prefix: true,
                        target: Box::new(target),
                    }
                }
                Token::Print => {
                    self.advance();
                    Expr::Print(Box::new(self.ternary()?))
                }
                _ => match include_kind(&token) {
                    Some(kind) => {
                        self.advance();
                        Expr::Include {
                            kind,
                            path: Box::new(self.ternary()?),
                        }
                    }
                    None => return self.pow(),
                },
            }
        };
        Ok(Spanned::new(node, self.from(start)))
    }

    /// `**` is right-associative and binds tighter than prefix operators on its left
    fn pow(&mut self) -> Result<Spanned<Expr>> {
        let base = self.postfix()?;
        if self.eat(&Token::Pow).is_none() {
            return Ok(base);
        }
        let exponent = self.unary()?;
        Ok(binary(base, BinOp::Pow, exponent))
    }

    fn postfix(&mut self) -> Result<Spanned<Expr>> {
        let start = self.span();
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::LBracket).is_some() {
                let index = if self.check(&Token::RBracket) {
                    None
                } else {
                    Some(Box::new(self.expr()?))
                };
                self.expect(&Token::RBracket)?;
                expr = Spanned::new(
                    Expr::Subscript {
                        base: Box::new(expr),
                        index,
                    },
                    self.from(start),
                );
            } else if self.check(&Token::LParen) && expr.node.is_variable() {
                let args = self.call_args()?;
                expr = Spanned::new(
                    Expr::Call {
                        callee: Callee::Dynamic(Box::new(expr)),
                        args,
                    },
                    self.from(start),
                );
            } else {
                break;
            }
        }

        if !expr.node.is_variable() {
            return Ok(expr);
        }

        let incdec = match self.peek() {
            Some(Token::Inc) => Some(IncDecOp::Inc),
            Some(Token::Dec) => Some(IncDecOp::Dec),
            _ => None,
        };
        if let Some(op) = incdec {
            self.advance();
            return Ok(Spanned::new(
                Expr::IncDec {
                    op,
                    prefix: false,
                    target: Box::new(expr),
                },
                self.from(start),
            ));
        }

        let Some(kind) = self.peek().and_then(assign_kind) else {
            return Ok(expr);
        };
        self.advance();
        let target = Box::new(expr);
        let value = Box::new(self.ternary()?);
        let node = match kind {
            AssignKind::Plain => Expr::Assign { target, value },
            AssignKind::Compound(op) => Expr::CompoundAssign { op, target, value },
            AssignKind::Coalesce => Expr::CoalesceAssign { target, value },
        };
        Ok(Spanned::new(node, self.from(start)))
    }

    fn primary(&mut self) -> Result<Spanned<Expr>> {
        let start = self.span();
        let Some(token) = self.peek().cloned() else {
            return Err(self.unexpected());
        };

        let node = match token {
            Token::Number(Number::Int(n)) => {
                self.advance();
                Expr::Int(n)
            }
            Token::Number(Number::Float(f)) => {
                self.advance();
                Expr::Float(f)
            }
            Token::SingleQuoted(s) => {
                self.advance();
                Expr::Str(s)
            }
            Token::DoubleQuoted(raw) => {
                self.advance();
                self.interpolate(&raw, start.start + 1)?
            }
            Token::Variable(name) => {
                self.advance();
                Expr::Variable(VarName::Simple(name))
            }
            Token::Dollar => return self.variable_variable(),
            Token::LBracket => {
                self.advance();
                Expr::Array(self.array_items(&Token::RBracket)?)
            }
            Token::Array => {
                self.advance();
                self.expect(&Token::LParen)?;
                Expr::Array(self.array_items(&Token::RParen)?)
            }
            Token::LParen => {
                self.advance();
                let inner = self.expr()?;
                self.expect(&Token::RParen)?;
                inner.node
            }
            Token::Ident(name) => {
                self.advance();
                self.named(name)?
            }
            Token::Isset => {
                self.advance();
                let args = self.call_args()?;
                if args.is_empty() {
                    return Err(CompileError::parser(
                        "syntax error, isset() expects at least one argument",
                        self.from(start),
                    ));
                }
                Expr::Isset(args)
            }
            Token::Empty => {
                self.advance();
                Expr::Empty(Box::new(self.paren_expr()?))
            }
            Token::Eval => {
                self.advance();
                Expr::Eval(Box::new(self.paren_expr()?))
            }
            Token::Exit | Token::Die => {
                self.advance();
                let code = if self.eat(&Token::LParen).is_some() {
                    if self.eat(&Token::RParen).is_some() {
                        None
                    } else {
                        let code = self.expr()?;
                        self.expect(&Token::RParen)?;
                        Some(Box::new(code))
                    }
                } else {
                    None
                };
                Expr::Exit(code)
            }
            _ => return Err(self.unexpected()),
        };
        Ok(Spanned::new(node, self.from(start)))
    }

    /// Bare identifier: call, literal keyword, magic constant or named constant
    fn named(&mut self, name: String) -> Result<Expr> {
        if self.check(&Token::LParen) {
            let args = self.call_args()?;
            return Ok(Expr::Call {
                callee: Callee::Name(name),
                args,
            });
        }
        Ok(match name.to_ascii_lowercase().as_str() {
            "true" => Expr::Bool(true),
            "false" => Expr::Bool(false),
            "null" => Expr::Null,
            "__line__" => Expr::Magic(MagicConst::Line),
            "__file__" => Expr::Magic(MagicConst::File),
            "__dir__" => Expr::Magic(MagicConst::Dir),
            "__function__" => Expr::Magic(MagicConst::Function),
            _ => Expr::Const(name),
        })
    }

    /// `$$name`, `$$$name`, `${expr}`
    fn variable_variable(&mut self) -> Result<Spanned<Expr>> {
        let start = self.expect(&Token::Dollar)?;
        let inner = if self.eat(&Token::LBrace).is_some() {
            let inner = self.expr()?;
            self.expect(&Token::RBrace)?;
            inner
        } else {
            match self.peek() {
                Some(Token::Variable(name)) => {
                    let name = name.clone();
                    let span = self.span();
                    self.advance();
                    Spanned::new(Expr::Variable(VarName::Simple(name)), span)
                }
                Some(Token::Dollar) => self.variable_variable()?,
                _ => return Err(self.expected("variable")),
            }
        };
        Ok(Spanned::new(
            Expr::Variable(VarName::Dynamic(Box::new(inner))),
            self.from(start),
        ))
    }

    fn call_args(&mut self) -> Result<Vec<Spanned<Expr>>> {
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        while !self.check(&Token::RParen) {
            args.push(self.expr()?);
            if self.eat(&Token::Comma).is_none() {
                break;
            }
        }
        self.expect(&Token::RParen)?;
        Ok(args)
    }

    fn array_items(&mut self, close: &Token) -> Result<Vec<ArrayItem>> {
        let mut items = Vec::new();
        while !self.check(close) {
            let first = self.expr()?;
            let item = match self.eat(&Token::FatArrow) {
                Some(_) => ArrayItem {
                    key: Some(first),
                    value: self.expr()?,
                },
                None => ArrayItem {
                    key: None,
                    value: first,
                },
            };
            items.push(item);
            if self.eat(&Token::Comma).is_none() {
                break;
            }
        }
        self.expect(close)?;
        Ok(items)
    }
}
