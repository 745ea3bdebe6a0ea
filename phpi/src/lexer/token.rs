//! Token definitions

use logos::{FilterResult, Lexer, Logos, Skip};

/// Numeric literal value; integer literals that overflow become floats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

/// Token inside a `<?php ... ?>` section, plus the markers the tag scanner adds
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r\f]+")]
pub enum Token {
    // Produced by the tag scanner, never by logos itself
    /// Text outside of PHP tags
    InlineHtml(String),
    /// `<?=`
    OpenTagEcho,

    #[regex(r"//|#", line_comment)]
    #[token("/*", block_comment)]
    Comment,
    #[token("?>")]
    CloseTag,

    // Keywords
    #[token("and", ignore(ascii_case))]
    LogicalAnd,
    #[token("array", ignore(ascii_case))]
    Array,
    #[token("as", ignore(ascii_case))]
    As,
    #[token("break", ignore(ascii_case))]
    Break,
    #[token("const", ignore(ascii_case))]
    Const,
    #[token("continue", ignore(ascii_case))]
    Continue,
    #[token("die", ignore(ascii_case))]
    Die,
    #[token("do", ignore(ascii_case))]
    Do,
    #[token("echo", ignore(ascii_case))]
    Echo,
    #[token("else", ignore(ascii_case))]
    Else,
    #[token("elseif", ignore(ascii_case))]
    ElseIf,
    #[token("empty", ignore(ascii_case))]
    Empty,
    #[token("endfor", ignore(ascii_case))]
    EndFor,
    #[token("endforeach", ignore(ascii_case))]
    EndForeach,
    #[token("endif", ignore(ascii_case))]
    EndIf,
    #[token("endwhile", ignore(ascii_case))]
    EndWhile,
    #[token("eval", ignore(ascii_case))]
    Eval,
    #[token("exit", ignore(ascii_case))]
    Exit,
    #[token("for", ignore(ascii_case))]
    For,
    #[token("foreach", ignore(ascii_case))]
    Foreach,
    #[token("function", ignore(ascii_case))]
    Function,
    #[token("global", ignore(ascii_case))]
    Global,
    #[token("if", ignore(ascii_case))]
    If,
    #[token("include", ignore(ascii_case))]
    Include,
    #[token("include_once", ignore(ascii_case))]
    IncludeOnce,
    #[token("isset", ignore(ascii_case))]
    Isset,
    #[token("or", ignore(ascii_case))]
    LogicalOr,
    #[token("print", ignore(ascii_case))]
    Print,
    #[token("require", ignore(ascii_case))]
    Require,
    #[token("require_once", ignore(ascii_case))]
    RequireOnce,
    #[token("return", ignore(ascii_case))]
    Return,
    #[token("unset", ignore(ascii_case))]
    Unset,
    #[token("while", ignore(ascii_case))]
    While,
    #[token("xor", ignore(ascii_case))]
    LogicalXor,

    // Literals
    #[regex(r"[0-9]+(_[0-9]+)*\.([0-9]+(_[0-9]+)*)?([eE][+-]?[0-9]+)?", lex_float, priority = 3)]
    #[regex(r"\.[0-9]+(_[0-9]+)*([eE][+-]?[0-9]+)?", lex_float, priority = 3)]
    #[regex(r"[0-9]+(_[0-9]+)*[eE][+-]?[0-9]+", lex_float, priority = 3)]
    #[regex(r"0[xX][0-9a-fA-F]+(_[0-9a-fA-F]+)*", |lex| lex_radix(lex, 16), priority = 3)]
    #[regex(r"0[oO][0-7]+(_[0-7]+)*", |lex| lex_radix(lex, 8), priority = 3)]
    #[regex(r"0[bB][01]+(_[01]+)*", |lex| lex_radix(lex, 2), priority = 3)]
    #[regex(r"[0-9]+(_[0-9]+)*", lex_decimal, priority = 2)]
    Number(Number),

    #[regex(r"'([^'\\]|\\(.|\n))*'", lex_single_quoted)]
    SingleQuoted(String),

    /// Raw body of a double-quoted string; escapes and interpolation are
    /// resolved by the parser
    #[regex(r#""([^"\\]|\\(.|\n))*""#, |lex| { let s = lex.slice(); s[1..s.len() - 1].to_string() })]
    DoubleQuoted(String),

    #[regex(r"\$[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice()[1..].to_string())]
    Variable(String),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string(), priority = 1)]
    Ident(String),

    // Assignment
    #[token("=")]
    Assign,
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token("*=")]
    StarAssign,
    #[token("/=")]
    SlashAssign,
    #[token(".=")]
    DotAssign,
    #[token("%=")]
    PercentAssign,
    #[token("**=")]
    PowAssign,
    #[token("&=")]
    AmpAssign,
    #[token("|=")]
    PipeAssign,
    #[token("^=")]
    CaretAssign,
    #[token("<<=")]
    ShlAssign,
    #[token(">>=")]
    ShrAssign,
    #[token("??=")]
    CoalesceAssign,

    // Operators
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
    #[token("**")]
    Pow,
    #[token(".")]
    Dot,
    #[token("++")]
    Inc,
    #[token("--")]
    Dec,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("&&")]
    AmpAmp,
    #[token("||")]
    PipePipe,
    #[token("!")]
    Bang,
    #[token("==")]
    EqEq,
    #[token("!=")]
    #[token("<>")]
    NotEq,
    #[token("===")]
    EqEqEq,
    #[token("!==")]
    NotEqEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,
    #[token("<=>")]
    Spaceship,
    #[token("??")]
    Coalesce,
    #[token("?")]
    Question,
    #[token(":")]
    Colon,
    #[token("@")]
    At,
    #[token("$")]
    Dollar,
    #[token("=>")]
    FatArrow,
    #[token("...")]
    Ellipsis,

    // Delimiters
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
    #[token(";")]
    Semicolon,
}

/// Skip a `//` or `#` comment; it ends at the newline or right before `?>`
fn line_comment(lex: &mut Lexer<Token>) -> Skip {
    let rest = lex.remainder();
    let mut end = rest.find('\n').unwrap_or(rest.len());
    if let Some(tag) = rest[..end].find("?>") {
        end = tag;
    }
    lex.bump(end);
    Skip
}

/// Skip a `/* */` comment; an unterminated one is an error
fn block_comment(lex: &mut Lexer<Token>) -> FilterResult<(), ()> {
    let rest = lex.remainder();
    match rest.find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            FilterResult::Skip
        }
        None => {
            lex.bump(rest.len());
            FilterResult::Error(())
        }
    }
}

fn lex_float(lex: &mut Lexer<Token>) -> Option<Number> {
    lex.slice().replace('_', "").parse::<f64>().ok().map(Number::Float)
}

fn lex_radix(lex: &mut Lexer<Token>, radix: u32) -> Option<Number> {
    let digits = lex.slice()[2..].replace('_', "");
    Some(integer_or_float(&digits, radix))
}

/// Decimal literal, or octal when written with a leading zero (`017`)
fn lex_decimal(lex: &mut Lexer<Token>) -> Option<Number> {
    let digits = lex.slice().replace('_', "");
    if digits.len() > 1 && digits.starts_with('0') {
        if digits.bytes().any(|b| b > b'7') {
            return None;
        }
        return Some(integer_or_float(&digits[1..], 8));
    }
    Some(integer_or_float(&digits, 10))
}

fn integer_or_float(digits: &str, radix: u32) -> Number {
    match i64::from_str_radix(digits, radix) {
        Ok(n) => Number::Int(n),
        Err(_) if radix == 10 => Number::Float(digits.parse().unwrap_or(f64::INFINITY)),
        Err(_) => Number::Float(
            digits
                .chars()
                .filter_map(|c| c.to_digit(radix))
                .fold(0.0, |acc, d| acc * radix as f64 + d as f64),
        ),
    }
}

fn lex_single_quoted(lex: &mut Lexer<Token>) -> String {
    let s = lex.slice();
    let inner = &s[1..s.len() - 1];
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some('\'') | Some('\\') => {
                    if let Some(escaped) = chars.next() {
                        result.push(escaped);
                    }
                }
                _ => result.push('\\'),
            }
        } else {
            result.push(c);
        }
    }
    result
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::InlineHtml(_) => write!(f, "inline html"),
            Token::OpenTagEcho => write!(f, "<?="),
            Token::Comment => write!(f, "comment"),
            Token::CloseTag => write!(f, "?>"),
            Token::LogicalAnd => write!(f, "and"),
            Token::Array => write!(f, "array"),
            Token::As => write!(f, "as"),
            Token::Break => write!(f, "break"),
            Token::Const => write!(f, "const"),
            Token::Continue => write!(f, "continue"),
            Token::Die => write!(f, "die"),
            Token::Do => write!(f, "do"),
            Token::Echo => write!(f, "echo"),
            Token::Else => write!(f, "else"),
            Token::ElseIf => write!(f, "elseif"),
            Token::Empty => write!(f, "empty"),
            Token::EndFor => write!(f, "endfor"),
            Token::EndForeach => write!(f, "endforeach"),
            Token::EndIf => write!(f, "endif"),
            Token::EndWhile => write!(f, "endwhile"),
            Token::Eval => write!(f, "eval"),
            Token::Exit => write!(f, "exit"),
            Token::For => write!(f, "for"),
            Token::Foreach => write!(f, "foreach"),
            Token::Function => write!(f, "function"),
            Token::Global => write!(f, "global"),
            Token::If => write!(f, "if"),
            Token::Include => write!(f, "include"),
            Token::IncludeOnce => write!(f, "include_once"),
            Token::Isset => write!(f, "isset"),
            Token::LogicalOr => write!(f, "or"),
            Token::Print => write!(f, "print"),
            Token::Require => write!(f, "require"),
            Token::RequireOnce => write!(f, "require_once"),
            Token::Return => write!(f, "return"),
            Token::Unset => write!(f, "unset"),
            Token::While => write!(f, "while"),
            Token::LogicalXor => write!(f, "xor"),
            Token::Number(Number::Int(n)) => write!(f, "{n}"),
            Token::Number(Number::Float(n)) => write!(f, "{n}"),
            Token::SingleQuoted(s) => write!(f, "'{s}'"),
            Token::DoubleQuoted(s) => write!(f, "\"{s}\""),
            Token::Variable(name) => write!(f, "${name}"),
            Token::Ident(name) => write!(f, "{name}"),
            Token::Assign => write!(f, "="),
            Token::PlusAssign => write!(f, "+="),
            Token::MinusAssign => write!(f, "-="),
            Token::StarAssign => write!(f, "*="),
            Token::SlashAssign => write!(f, "/="),
            Token::DotAssign => write!(f, ".="),
            Token::PercentAssign => write!(f, "%="),
            Token::PowAssign => write!(f, "**="),
            Token::AmpAssign => write!(f, "&="),
            Token::PipeAssign => write!(f, "|="),
            Token::CaretAssign => write!(f, "^="),
            Token::ShlAssign => write!(f, "<<="),
            Token::ShrAssign => write!(f, ">>="),
            Token::CoalesceAssign => write!(f, "??="),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Pow => write!(f, "**"),
            Token::Dot => write!(f, "."),
            Token::Inc => write!(f, "++"),
            Token::Dec => write!(f, "--"),
            Token::Amp => write!(f, "&"),
            Token::Pipe => write!(f, "|"),
            Token::Caret => write!(f, "^"),
            Token::Tilde => write!(f, "~"),
            Token::Shl => write!(f, "<<"),
            Token::Shr => write!(f, ">>"),
            Token::AmpAmp => write!(f, "&&"),
            Token::PipePipe => write!(f, "||"),
            Token::Bang => write!(f, "!"),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::EqEqEq => write!(f, "==="),
            Token::NotEqEq => write!(f, "!=="),
            Token::Lt => write!(f, "<"),
            Token::Le => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Ge => write!(f, ">="),
            Token::Spaceship => write!(f, "<=>"),
            Token::Coalesce => write!(f, "??"),
            Token::Question => write!(f, "?"),
            Token::Colon => write!(f, ":"),
            Token::At => write!(f, "@"),
            Token::Dollar => write!(f, "$"),
            Token::FatArrow => write!(f, "=>"),
            Token::Ellipsis => write!(f, "..."),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::Comma => write!(f, ","),
            Token::Semicolon => write!(f, ";"),
        }
    }
}
