//! Double-quoted string bodies: escape sequences and variable interpolation

use super::Parser;
use crate::ast::{Expr, Span, Spanned, StrPart, VarName};
use crate::error::{CompileError, Result};
use crate::lexer;

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn is_name_char(b: u8) -> bool {
    is_name_start(b) || b.is_ascii_digit()
}

fn scan_name(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < bytes.len() && is_name_char(bytes[end]) {
        end += 1;
    }
    end
}

/// Index of the `}` closing the `{` at `open`
fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = open;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(_) if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}

/// Decode the escape at `bytes[i] == b'\\'`; returns the index after it
fn unescape(bytes: &[u8], i: usize, out: &mut Vec<u8>) -> usize {
    let Some(&next) = bytes.get(i + 1) else {
        out.push(b'\\');
        return i + 1;
    };
    let simple = match next {
        b'n' => Some(b'\n'),
        b't' => Some(b'\t'),
        b'r' => Some(b'\r'),
        b'v' => Some(0x0b),
        b'e' => Some(0x1b),
        b'f' => Some(0x0c),
        b'\\' => Some(b'\\'),
        b'$' => Some(b'$'),
        b'"' => Some(b'"'),
        _ => None,
    };
    if let Some(b) = simple {
        out.push(b);
        return i + 2;
    }

    match next {
        b'0'..=b'7' => {
            let mut end = i + 1;
            while end < bytes.len() && end < i + 4 && (b'0'..=b'7').contains(&bytes[end]) {
                end += 1;
            }
            let value = bytes[i + 1..end]
                .iter()
                .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
            out.push((value & 0xff) as u8);
            end
        }
        b'x' if bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit) => {
            let mut end = i + 2;
            while end < bytes.len() && end < i + 4 && bytes[end].is_ascii_hexdigit() {
                end += 1;
            }
            let digits = String::from_utf8_lossy(&bytes[i + 2..end]);
            out.push(u8::from_str_radix(&digits, 16).unwrap_or(0));
            end
        }
        b'u' if bytes.get(i + 2) == Some(&b'{') => {
            let close = bytes[i + 3..].iter().position(|b| *b == b'}').map(|p| p + i + 3);
            let decoded = close.and_then(|close| {
                let digits = std::str::from_utf8(&bytes[i + 3..close]).ok()?;
                let code = u32::from_str_radix(digits, 16).ok()?;
                char::from_u32(code).map(|c| (c, close))
            });
            match decoded {
                Some((c, close)) => {
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                    close + 1
                }
                None => {
                    out.push(b'\\');
                    i + 1
                }
            }
        }
        _ => {
            out.push(b'\\');
            i + 1
        }
    }
}

impl Parser<'_> {
    /// Build the expression for a double-quoted string whose body starts at
    /// file offset `base`
    pub(super) fn interpolate(&mut self, raw: &str, base: usize) -> Result<Expr> {
        let bytes = raw.as_bytes();
        let mut parts = Vec::new();
        let mut literal: Vec<u8> = Vec::new();
        let mut i = 0;

        while i < bytes.len() {
            let next = bytes.get(i + 1).copied();
            match bytes[i] {
                b'\\' => i = unescape(bytes, i, &mut literal),
                b'$' if next.is_some_and(is_name_start) => {
                    flush(&mut literal, &mut parts);
                    let (expr, end) = self.simple_interpolation(raw, i, base);
                    parts.push(StrPart::Expr(expr));
                    i = end;
                }
                b'$' if next == Some(b'{') => {
                    flush(&mut literal, &mut parts);
                    let close = self.closing_brace(bytes, i + 1, base)?;
                    let inner = &raw[i + 2..close];
                    let span = Span::new(base + i, base + close + 1);
                    let name = if !inner.is_empty() && scan_name(inner.as_bytes(), 0) == inner.len() {
                        VarName::Simple(inner.to_string())
                    } else {
                        VarName::Dynamic(Box::new(self.sub_expression(inner, base + i + 2)?))
                    };
                    parts.push(StrPart::Expr(Spanned::new(Expr::Variable(name), span)));
                    i = close + 1;
                }
                b'{' if next == Some(b'$') => {
                    flush(&mut literal, &mut parts);
                    let close = self.closing_brace(bytes, i, base)?;
                    let expr = self.sub_expression(&raw[i + 1..close], base + i + 1)?;
                    parts.push(StrPart::Expr(expr));
                    i = close + 1;
                }
                b => {
                    literal.push(b);
                    i += 1;
                }
            }
        }
        flush(&mut literal, &mut parts);

        Ok(match parts.as_slice() {
            [] => Expr::Str(String::new()),
            [StrPart::Lit(text)] => Expr::Str(text.clone()),
            _ => Expr::Interpolated(parts),
        })
    }

    fn closing_brace(&self, bytes: &[u8], open: usize, base: usize) -> Result<usize> {
        matching_brace(bytes, open).ok_or_else(|| {
            CompileError::parser(
                "syntax error, unexpected end of string, expecting \"}\"",
                Span::new(base + open, base + bytes.len()),
            )
        })
    }

    /// `$name`, optionally followed by one `[key]` where the key is a bare
    /// word, an integer or a `$variable`
    fn simple_interpolation(&mut self, raw: &str, dollar: usize, base: usize) -> (Spanned<Expr>, usize) {
        let bytes = raw.as_bytes();
        let name_end = scan_name(bytes, dollar + 1);
        let var = Spanned::new(
            Expr::Variable(VarName::Simple(raw[dollar + 1..name_end].to_string())),
            Span::new(base + dollar, base + name_end),
        );
        if bytes.get(name_end) != Some(&b'[') {
            return (var, name_end);
        }

        let key_start = name_end + 1;
        let (key, key_end) = match bytes.get(key_start) {
            Some(b'$') if bytes.get(key_start + 1).is_some_and(|b| is_name_start(*b)) => {
                let end = scan_name(bytes, key_start + 1);
                let key = Expr::Variable(VarName::Simple(raw[key_start + 1..end].to_string()));
                (key, end)
            }
            Some(b) if b.is_ascii_digit() || *b == b'-' => {
                let mut end = key_start + 1;
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
                (Expr::Str(raw[key_start..end].to_string()), end)
            }
            Some(b) if is_name_start(*b) => {
                let end = scan_name(bytes, key_start);
                (Expr::Str(raw[key_start..end].to_string()), end)
            }
            _ => return (var, name_end),
        };
        if bytes.get(key_end) != Some(&b']') {
            return (var, name_end);
        }

        let key = Spanned::new(key, Span::new(base + key_start, base + key_end));
        let span = Span::new(base + dollar, base + key_end + 1);
        let subscript = Expr::Subscript {
            base: Box::new(var),
            index: Some(Box::new(key)),
        };
        (Spanned::new(subscript, span), key_end + 1)
    }

    /// Parse an embedded expression with its own token stream
    fn sub_expression(&mut self, code: &str, offset: usize) -> Result<Spanned<Expr>> {
        let tokens = lexer::tokenize_fragment(code, offset)?;
        let end = offset + code.len();
        let mut sub = Parser::new(tokens, &mut *self.ids, Span::new(end, end));
        let expr = sub.expr()?;
        if !sub.at_end() {
            return Err(sub.unexpected());
        }
        Ok(expr)
    }
}

fn flush(literal: &mut Vec<u8>, parts: &mut Vec<StrPart>) {
    if !literal.is_empty() {
        let text = String::from_utf8_lossy(literal).into_owned();
        parts.push(StrPart::Lit(text));
        literal.clear();
    }
}
