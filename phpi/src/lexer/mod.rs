//! Lexer implementation using logos
//!
//! A script is a sequence of inline text and `<?php ... ?>` sections. The tag
//! scanner here splits the two; logos only ever sees the code sections.

mod token;

pub use token::{Number, Token};

use crate::ast::Span;
use crate::error::{CompileError, Result};
use logos::Logos;

/// Tokenize a whole script
pub fn tokenize(source: &str) -> Result<Vec<(Token, Span)>> {
    let mut tokens = Vec::new();
    scan_sections(source, 0, &mut tokens)?;
    Ok(tokens)
}

/// Tokenize source that starts in code mode, as `eval()` receives it; a
/// `?>` switches to inline text as usual
pub fn tokenize_code(source: &str) -> Result<Vec<(Token, Span)>> {
    let mut tokens = Vec::new();
    let resume = lex_code(source, 0, &mut tokens)?;
    scan_sections(source, resume, &mut tokens)?;
    Ok(tokens)
}

/// Split `source[pos..]` into inline text and code sections
fn scan_sections(source: &str, mut pos: usize, tokens: &mut Vec<(Token, Span)>) -> Result<()> {
    while pos < source.len() {
        let rest = &source[pos..];
        let Some((tag_start, tag)) = find_open_tag(rest) else {
            tokens.push((Token::InlineHtml(rest.to_string()), Span::new(pos, source.len())));
            break;
        };

        if tag_start > 0 {
            tokens.push((
                Token::InlineHtml(rest[..tag_start].to_string()),
                Span::new(pos, pos + tag_start),
            ));
        }

        let code_start = pos + tag_start + tag.len();
        if tag == OpenTag::Echo {
            tokens.push((Token::OpenTagEcho, Span::new(pos + tag_start, code_start)));
        }

        pos = lex_code(source, code_start, tokens)?;
    }
    Ok(())
}

/// Tokenize a bare code fragment (no open tag) whose first byte sits at
/// `offset` in the enclosing file, e.g. the `{$expr}` part of a string
pub fn tokenize_fragment(code: &str, offset: usize) -> Result<Vec<(Token, Span)>> {
    let mut tokens = Vec::new();
    for (result, range) in Token::lexer(code).spanned() {
        let span = Span::from(range.clone()).offset(offset);
        match result {
            Ok(Token::CloseTag) | Err(_) => return Err(lex_error(&code[range], span)),
            Ok(token) => tokens.push((token, span)),
        }
    }
    Ok(tokens)
}

fn lex_error(slice: &str, span: Span) -> CompileError {
    if slice.starts_with("/*") {
        return CompileError::lexer("Unterminated comment", Span::new(span.start, span.start + 2));
    }
    CompileError::lexer(format!("unexpected character: {slice:?}"), span)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenTag {
    Php,
    Echo,
}

impl OpenTag {
    fn len(self) -> usize {
        match self {
            OpenTag::Php => "<?php".len(),
            OpenTag::Echo => "<?=".len(),
        }
    }
}

/// Locate the next `<?php` (followed by whitespace or end of input) or `<?=`
fn find_open_tag(text: &str) -> Option<(usize, OpenTag)> {
    let mut search = 0;
    while let Some(found) = text[search..].find("<?") {
        let at = search + found;
        let after = &text[at + 2..];
        if after.starts_with('=') {
            return Some((at, OpenTag::Echo));
        }
        if after.get(..3).is_some_and(|word| word.eq_ignore_ascii_case("php")) {
            match after[3..].chars().next() {
                None => return Some((at, OpenTag::Php)),
                Some(c) if c.is_whitespace() => return Some((at, OpenTag::Php)),
                _ => {}
            }
        }
        search = at + 2;
    }
    None
}

/// Lex one code section starting at `start`; returns the offset where inline
/// text resumes (after `?>` and one directly following newline)
fn lex_code(source: &str, start: usize, tokens: &mut Vec<(Token, Span)>) -> Result<usize> {
    let mut lexer = Token::lexer(&source[start..]);

    while let Some(result) = lexer.next() {
        let span = Span::from(lexer.span()).offset(start);
        match result {
            Ok(Token::CloseTag) => {
                // A closing tag implies the end of the statement
                tokens.push((Token::Semicolon, span));
                let mut resume = span.end;
                if source[resume..].starts_with("\r\n") {
                    resume += 2;
                } else if source[resume..].starts_with('\n') {
                    resume += 1;
                }
                return Ok(resume);
            }
            Ok(token) => tokens.push((token, span)),
            Err(_) => return Err(lex_error(lexer.slice(), span)),
        }
    }

    Ok(source.len())
}
