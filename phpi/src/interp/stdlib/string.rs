//! String functions
//!
//! Strings are UTF-8; byte-oriented functions (`strlen`, `ord`, `bin2hex`,
//! `substr`, the digests) work on the encoded bytes, case mapping only
//! touches ASCII letters.

use super::{Context, NativeFn};
use crate::interp::env::Environment;
use crate::interp::error::{MEMORY_LIMIT, PhpError, PhpResult};
use crate::interp::validator::ParamValidator;
use crate::interp::value::Value;
use sha1::{Digest, Sha1};
use std::fmt::Write;

pub fn register(env: &mut Environment) {
    let functions: [(&str, NativeFn); 21] = [
        ("bin2hex", bin2hex),
        ("chr", chr),
        ("hex2bin", hex2bin),
        ("implode", implode),
        ("join", implode),
        ("lcfirst", lcfirst),
        ("md5", md5),
        ("nl2br", nl2br),
        ("ord", ord),
        ("quotemeta", quotemeta),
        ("str_contains", str_contains),
        ("str_ends_with", str_ends_with),
        ("str_repeat", str_repeat),
        ("str_starts_with", str_starts_with),
        ("strlen", strlen),
        ("strrev", strrev),
        ("strtolower", strtolower),
        ("strtoupper", strtoupper),
        ("sha1", sha1),
        ("substr", substr),
        ("ucfirst", ucfirst),
    ];
    for (name, function) in functions {
        env.register_native(name, function);
    }
}

/// Bind a single `string $string` parameter
fn string_arg(name: &str, args: Vec<Value>) -> PhpResult<String> {
    let [string] = ParamValidator::new(name)
        .param("$string", &["string"])
        .bind(args)?;
    Ok(string.to_php_string())
}

/// Bind `string $haystack, string $needle`
fn haystack_needle(name: &str, args: Vec<Value>) -> PhpResult<(String, String)> {
    let [haystack, needle] = ParamValidator::new(name)
        .param("$haystack", &["string"])
        .param("$needle", &["string"])
        .bind(args)?;
    Ok((haystack.to_php_string(), needle.to_php_string()))
}

fn bin2hex(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let string = string_arg("bin2hex", args)?;
    let mut hex = String::with_capacity(string.len() * 2);
    for byte in string.bytes() {
        let _ = write!(hex, "{byte:02x}");
    }
    Ok(Value::Str(hex))
}

fn chr(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [codepoint] = ParamValidator::new("chr")
        .param("$codepoint", &["int"])
        .bind(args)?;
    let byte = codepoint.to_int().rem_euclid(256) as u8;
    Ok(Value::Str(String::from_utf8_lossy(&[byte]).into_owned()))
}

fn ord(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [character] = ParamValidator::new("ord")
        .param("$character", &["string"])
        .bind(args)?;
    let byte = character.to_php_string().bytes().next().unwrap_or(0);
    Ok(Value::Int(byte as i64))
}

fn map_first(s: &str, f: impl FnOnce(&u8) -> u8) -> String {
    let mut bytes = s.as_bytes().to_vec();
    if let Some(first) = bytes.first_mut() {
        *first = f(first);
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

fn lcfirst(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let string = string_arg("lcfirst", args)?;
    Ok(Value::Str(map_first(&string, u8::to_ascii_lowercase)))
}

fn ucfirst(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let string = string_arg("ucfirst", args)?;
    Ok(Value::Str(map_first(&string, u8::to_ascii_uppercase)))
}

fn quotemeta(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let string = string_arg("quotemeta", args)?;
    let mut quoted = String::with_capacity(string.len());
    for c in string.chars() {
        if matches!(c, '.' | '\\' | '+' | '*' | '?' | '[' | '^' | ']' | '$' | '(' | ')') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    Ok(Value::Str(quoted))
}

fn str_contains(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let (haystack, needle) = haystack_needle("str_contains", args)?;
    Ok(Value::Bool(haystack.contains(&needle)))
}

fn str_starts_with(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let (haystack, needle) = haystack_needle("str_starts_with", args)?;
    Ok(Value::Bool(haystack.starts_with(&needle)))
}

fn str_ends_with(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let (haystack, needle) = haystack_needle("str_ends_with", args)?;
    Ok(Value::Bool(haystack.ends_with(&needle)))
}

fn str_repeat(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [string, times] = ParamValidator::new("str_repeat")
        .param("$string", &["string"])
        .param("$times", &["int"])
        .bind(args)?;
    let times = times.to_int();
    if times < 0 {
        return Err(PhpError::error(
            "Uncaught ValueError: str_repeat(): Argument #2 ($times) must be greater than or equal to 0",
        ));
    }
    let string = string.to_php_string();
    if string.is_empty() || times == 0 {
        return Ok(Value::str(""));
    }
    match string.len().checked_mul(times as usize) {
        Some(size) if size <= MEMORY_LIMIT => Ok(Value::Str(string.repeat(times as usize))),
        Some(size) => Err(PhpError::memory_exhausted(size)),
        None => Err(PhpError::memory_exhausted(
            (string.len() as u128) * (times as u128),
        )),
    }
}

/// `substr($string, $offset, $length = null)` on bytes
fn substr(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [string, offset, length] = ParamValidator::new("substr")
        .param("$string", &["string"])
        .param("$offset", &["int"])
        .optional("$length", &["int"], Value::Null)
        .bind(args)?;
    let string = string.to_php_string();
    let bytes = string.as_bytes();
    let length = (!length.is_null()).then(|| length.to_int());
    let (start, end) = substr_range(bytes.len(), offset.to_int(), length);
    Ok(Value::Str(String::from_utf8_lossy(&bytes[start..end]).into_owned()))
}

/// Byte range selected by `substr` offsets, clamped to the string
fn substr_range(len: usize, offset: i64, length: Option<i64>) -> (usize, usize) {
    let len = len as i64;
    let start = if offset < 0 {
        (len + offset).max(0)
    } else {
        offset.min(len)
    };
    let available = len - start;
    let take = match length {
        None => available,
        Some(length) if length < 0 => (available + length).max(0),
        Some(length) => length.min(available),
    };
    (start as usize, (start + take) as usize)
}

fn hex2bin(ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let string = string_arg("hex2bin", args)?;
    if string.len() % 2 != 0 {
        ctx.warn(PhpError::warning(
            "hex2bin(): Hexadecimal input string must have an even length",
        ));
        return Ok(Value::Bool(false));
    }
    match hex::decode(&string) {
        Ok(bytes) => Ok(Value::Str(String::from_utf8_lossy(&bytes).into_owned())),
        Err(_) => {
            ctx.warn(PhpError::warning("hex2bin(): Input string must be hexadecimal string"));
            Ok(Value::Bool(false))
        }
    }
}

/// Bind `$string, $binary = false` for the digest functions
fn digest_args(name: &str, args: Vec<Value>) -> PhpResult<(String, bool)> {
    let [string, binary] = ParamValidator::new(name)
        .param("$string", &["string"])
        .optional("$binary", &["bool"], Value::Bool(false))
        .bind(args)?;
    Ok((string.to_php_string(), binary.to_bool()))
}

fn digest_value(digest: &[u8], binary: bool) -> Value {
    if binary {
        Value::Str(String::from_utf8_lossy(digest).into_owned())
    } else {
        Value::Str(hex::encode(digest))
    }
}

fn md5(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let (string, binary) = digest_args("md5", args)?;
    let digest = md5::compute(string.as_bytes());
    Ok(digest_value(&digest.0, binary))
}

fn sha1(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let (string, binary) = digest_args("sha1", args)?;
    let digest = Sha1::digest(string.as_bytes());
    Ok(digest_value(&digest, binary))
}

/// Insert a line break tag before every `\r\n`, `\n\r`, `\n` or `\r`
fn nl2br(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [string, use_xhtml] = ParamValidator::new("nl2br")
        .param("$string", &["string"])
        .optional("$use_xhtml", &["bool"], Value::Bool(true))
        .bind(args)?;
    let tag = if use_xhtml.to_bool() { "<br />" } else { "<br>" };
    let string = string.to_php_string();
    let mut out = String::with_capacity(string.len());
    let mut chars = string.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\n' && c != '\r' {
            out.push(c);
            continue;
        }
        out.push_str(tag);
        out.push(c);
        let pair = if c == '\n' { '\r' } else { '\n' };
        if chars.peek() == Some(&pair) {
            out.push(pair);
            chars.next();
        }
    }
    Ok(Value::Str(out))
}

fn strlen(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    Ok(Value::Int(string_arg("strlen", args)?.len() as i64))
}

fn strrev(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    Ok(Value::Str(string_arg("strrev", args)?.chars().rev().collect()))
}

fn strtolower(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    Ok(Value::Str(string_arg("strtolower", args)?.to_ascii_lowercase()))
}

fn strtoupper(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    Ok(Value::Str(string_arg("strtoupper", args)?.to_ascii_uppercase()))
}

/// `implode($separator, $array)` or `implode($array)`
fn implode(ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [separator, array] = ParamValidator::new("implode")
        .param("$separator", &["array", "string"])
        .optional("$array", &["array"], Value::Null)
        .bind(args)?;
    let (separator, pieces) = match (separator, array) {
        (Value::Array(pieces), Value::Null) => (String::new(), pieces),
        (separator, Value::Array(pieces)) => (separator.to_php_string(), pieces),
        (separator, _) => {
            return Err(PhpError::type_error(format!(
                "implode(): Argument #1 ($pieces) must be of type array, {} given",
                separator.debug_type()
            )));
        }
    };
    let mut parts = Vec::with_capacity(pieces.len());
    for piece in pieces.values() {
        if let Value::Array(_) = piece {
            ctx.warn(PhpError::warning("Array to string conversion"));
        }
        parts.push(piece.to_php_string());
    }
    Ok(Value::Str(parts.join(&separator)))
}

#[cfg(test)]
mod tests {
    use super::super::testing::{fatal, run};

    #[test]
    fn test_byte_functions() {
        assert_eq!(run("echo bin2hex('abc'), ' ', ord('A'), ' ', chr(66), chr(322), ' ', strlen('héllo');"), "616263 65 BB 6");
    }

    #[test]
    fn test_case_functions() {
        assert_eq!(
            run("echo strtolower('HeLLo'), strtoupper('abc'), ucfirst('word'), lcfirst('ABC'), strrev('abc');"),
            "helloABCWordaBCcba"
        );
    }

    #[test]
    fn test_search_functions() {
        assert_eq!(
            run("var_dump(str_contains('abc', ''), str_starts_with('abc', 'ab'), str_ends_with('abc', 'b'));"),
            "bool(true)\nbool(true)\nbool(false)\n"
        );
    }

    #[test]
    fn test_quotemeta_and_repeat() {
        assert_eq!(run("echo quotemeta('1+1=2?'), str_repeat('ab', 3);"), "1\\+1=2\\?ababab");
        assert_eq!(
            fatal("str_repeat('x', -1);"),
            "Uncaught ValueError: str_repeat(): Argument #2 ($times) must be greater than or equal to 0"
        );
    }

    #[test]
    fn test_repeat_beyond_memory_limit_is_fatal() {
        assert_eq!(run("echo strlen(str_repeat('', PHP_INT_MAX)), strlen(str_repeat('ab', 0));"), "00");
        assert_eq!(
            fatal("str_repeat('ab', PHP_INT_MAX);"),
            "Allowed memory size of 134217728 bytes exhausted (tried to allocate 18446744073709551614 bytes)"
        );
        assert_eq!(
            fatal("str_repeat('x', 200000000);"),
            "Allowed memory size of 134217728 bytes exhausted (tried to allocate 200000000 bytes)"
        );
    }

    #[test]
    fn test_substr() {
        assert_eq!(
            run("echo substr('abcdef', 1), '|', substr('abcdef', -2), '|', substr('abcdef', 1, 3), '|', substr('abcdef', 0, -1), '|', substr('abc', 5), '|', substr('abc', 1, -5), '|', substr('abc', -10, 1);"),
            "bcdef|ef|bcd|abcde|||a"
        );
        assert_eq!(run("echo substr('abc', 1, null);"), "bc");
    }

    #[test]
    fn test_hex2bin() {
        assert_eq!(run("echo hex2bin('6869'), bin2hex(hex2bin('0041'));"), "hi0041");
        assert_eq!(
            run("var_dump(hex2bin('abc'));"),
            "\nWarning: hex2bin(): Hexadecimal input string must have an even length in test.php:1:16\nbool(false)\n"
        );
        assert_eq!(
            run("var_dump(hex2bin('zz'));"),
            "\nWarning: hex2bin(): Input string must be hexadecimal string in test.php:1:16\nbool(false)\n"
        );
    }

    #[test]
    fn test_digests() {
        assert_eq!(
            run("echo md5(''), ' ', md5('hello');"),
            "d41d8cd98f00b204e9800998ecf8427e 5d41402abc4b2a76b9719d911017c592"
        );
        assert_eq!(run("echo sha1('abc');"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn test_nl2br() {
        assert_eq!(run("echo nl2br(\"a\\nb\\r\\nc\");"), "a<br />\nb<br />\r\nc");
        assert_eq!(run("echo nl2br(\"a\\n\\n\", false);"), "a<br>\n<br>\n");
    }

    #[test]
    fn test_implode() {
        assert_eq!(run("echo implode(', ', [1, 2.5, true, null]), '|', implode(['a', 'b']);"), "1, 2.5, 1, |ab");
        assert_eq!(
            fatal("implode(', ');"),
            "Uncaught TypeError: implode(): Argument #1 ($pieces) must be of type array, string given"
        );
    }

    #[test]
    fn test_string_coercion_of_arguments() {
        assert_eq!(run("echo strlen(12345), strtoupper(true);"), "51");
        assert_eq!(
            fatal("strlen([]);"),
            "Uncaught TypeError: strlen(): Argument #1 ($string) must be of type string, array given"
        );
    }
}
